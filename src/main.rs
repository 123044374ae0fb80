/*!
 * Command-line interface for simos
 */

use std::io::{self, BufWriter, Write};

use clap::{CommandFactory, Parser};
use log::info;

use simos::config::{Args, Config, Mode};
use simos::error::ResultExt;
use simos::namespace::Namespace;
use simos::report::Reporter;
use simos::shell::Shell;
use simos::workload::Workload;

fn main() -> io::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Create configuration
    let config = Config::from_args(args);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    // Validate configuration
    config.validate()?;

    if let Mode::Completions(shell) = config.mode {
        let mut command = Args::command();
        clap_complete::generate(shell, &mut command, "simos", &mut io::stdout());
        return Ok(());
    }

    let mut fs = Namespace::new();
    if let Some(path) = config.state_to_load() {
        fs.load(path)
            .with_context(|| format!("Failed to load state from {}", path.display()))?;
    }

    match &config.mode {
        Mode::Shell => {
            let stdin = io::stdin();
            let mut stdout = BufWriter::new(io::stdout());
            Shell::new(&mut fs).run(stdin.lock(), &mut stdout)?;
            stdout.flush()?;
        }
        Mode::Run {
            workload,
            save,
            trace,
            format,
        } => {
            let workload = match workload {
                Some(path) => Workload::from_file(path)
                    .with_context(|| format!("Failed to read workload {}", path.display()))?,
                None => Workload::demo(),
            };

            info!(
                "workload has {} process(es), {} setup dir(s)",
                workload.processes.len(),
                workload.setup.len()
            );
            let summary = workload.run(&mut fs)?;

            if *trace {
                for event in &summary.trace {
                    println!("{}", event);
                }
            }

            let reporter = Reporter::new(*format);
            reporter.print_report(&summary)?;

            fs.save(save)
                .with_context(|| format!("Failed to save state to {}", save.display()))?;
            println!("\nNamespace saved to {}", save.display());
        }
        Mode::Completions(_) => {}
    }

    Ok(())
}
