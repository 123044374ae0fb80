/*!
 * Interactive command shell over the namespace store
 */

use std::io::{self, BufRead, Write};

use log::debug;

use crate::namespace::Namespace;

const HELP: &str = "\
Commands:
  mkdir <path>
  touch <path>
  ls [path]
  cd [path]
  pwd
  rm <path>            (remove file)
  rmdir <path>         (remove empty dir)
  write <path> <text>  (overwrite file contents)
  cat <path>
  tree [path]
  save <file>          (persist to host file)
  load <file>          (replace tree from host file)
  help
  exit
";

/// Whether the shell should keep reading commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// Split off the first whitespace-delimited word.
///
/// The remainder keeps its inner spacing; only the single separator after
/// the word is dropped.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(end) => {
            let rest = &input[end..];
            let mut chars = rest.chars();
            chars.next();
            (&input[..end], chars.as_str())
        }
        None => (input, ""),
    }
}

/// Command interpreter bound to one namespace
pub struct Shell<'fs> {
    fs: &'fs mut Namespace,
}

impl<'fs> Shell<'fs> {
    pub fn new(fs: &'fs mut Namespace) -> Self {
        Self { fs }
    }

    /// Prompt showing the working directory
    pub fn prompt(&self) -> String {
        format!("{} $ ", self.fs.current_directory_path())
    }

    /// Read commands from `input` until `exit` or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, output: &mut W) -> io::Result<()> {
        output.write_all(HELP.as_bytes())?;

        let mut buf = Vec::new();
        loop {
            write!(output, "{}", self.prompt())?;
            output.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                writeln!(output)?;
                break;
            }

            // Undecodable input is reported and skipped
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim_end_matches(&['\n', '\r'][..]),
                Err(err) => {
                    writeln!(output, "error: input is not valid UTF-8 ({})", err)?;
                    continue;
                }
            };
            if self.execute(line, output)? == Control::Exit {
                break;
            }
        }
        Ok(())
    }

    /// Execute a single command line
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<Control> {
        let (command, rest) = split_word(line);
        let (arg, _) = split_word(rest);
        debug!("shell command {:?} arg {:?}", command, arg);

        match command {
            "" => {}
            "exit" | "quit" => return Ok(Control::Exit),
            "help" => out.write_all(HELP.as_bytes())?,
            "pwd" => writeln!(out, "{}", self.fs.current_directory_path())?,
            "ls" => match self.fs.list(arg) {
                Ok(entries) => {
                    for entry in entries {
                        writeln!(out, "{}", entry)?;
                    }
                }
                Err(err) => writeln!(out, "ls: {}", err)?,
            },
            "cd" => {
                if let Err(err) = self.fs.change_directory(arg) {
                    writeln!(out, "cd: {}", err)?;
                }
            }
            "tree" => match self.fs.tree(arg) {
                Ok(rendered) => out.write_all(rendered.as_bytes())?,
                Err(err) => writeln!(out, "tree: {}", err)?,
            },
            "mkdir" | "touch" | "rm" | "rmdir" | "cat" | "save" | "load" if arg.is_empty() => {
                writeln!(out, "{}: missing operand", command)?;
            }
            "mkdir" => {
                if let Err(err) = self.fs.make_directory(arg) {
                    writeln!(out, "mkdir: {}", err)?;
                }
            }
            "touch" => {
                if let Err(err) = self.fs.create_or_touch_file(arg) {
                    writeln!(out, "touch: {}", err)?;
                }
            }
            "rm" => {
                if let Err(err) = self.fs.remove_file(arg) {
                    writeln!(out, "rm: {}", err)?;
                }
            }
            "rmdir" => {
                if let Err(err) = self.fs.remove_directory(arg) {
                    writeln!(out, "rmdir: {}", err)?;
                }
            }
            "cat" => match self.fs.read_file(arg) {
                Ok(content) => writeln!(out, "{}", content)?,
                Err(err) => writeln!(out, "cat: {}", err)?,
            },
            "write" => {
                let (path, text) = split_word(rest);
                if path.is_empty() {
                    writeln!(out, "write: missing operand")?;
                } else if let Err(err) = self.fs.write_file(path, text) {
                    writeln!(out, "write: {}", err)?;
                }
            }
            "save" => match self.fs.save(arg) {
                Ok(()) => writeln!(out, "saved to {}", arg)?,
                Err(err) => writeln!(out, "save: {}", err)?,
            },
            "load" => match self.fs.load(arg) {
                Ok(()) => writeln!(out, "loaded from {}", arg)?,
                Err(err) => writeln!(out, "load: {}", err)?,
            },
            other => writeln!(out, "unknown command: {}", other)?,
        }

        Ok(Control::Continue)
    }
}
