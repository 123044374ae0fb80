/*!
 * Process and program model
 *
 * A process is a named program in flight: an ordered list of
 * instructions, a program counter and a lifecycle state. The shape also
 * carries the priority/burst pair used by the standalone schedulers so the
 * same definitions can be shared with them.
 */

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// Logical simulation time
pub type Tick = u64;

/// Process identifier
pub type Pid = u32;

/// File-store operations a process can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyscallOp {
    /// Create or overwrite a file: `[path, content]`
    Write,
    /// Read a file: `[path]`
    Read,
    /// Remove a file: `[path]`
    Delete,
    /// Create a file or refresh its modification time: `[path]`
    Touch,
}

impl SyscallOp {
    /// Minimum number of arguments the operation needs
    pub fn arity(self) -> usize {
        match self {
            SyscallOp::Write => 2,
            SyscallOp::Read | SyscallOp::Delete | SyscallOp::Touch => 1,
        }
    }
}

/// A request from a process to the namespace store.
///
/// The operation is kept as a plain name so that programs naming an
/// unsupported call can still be described; the engine rejects them at
/// dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Syscall {
    /// Operation name ("write", "read", "delete", "touch")
    pub name: String,
    /// Positional string arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Simulated I/O latency charged after a successful call
    #[serde(default)]
    pub io_latency: Tick,
}

impl Syscall {
    pub fn new<I, S>(name: impl Into<String>, args: I, io_latency: Tick) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
            io_latency,
        }
    }

    /// `write path content`
    pub fn write(path: &str, content: &str, io_latency: Tick) -> Self {
        Self::new("write", [path, content], io_latency)
    }

    /// `read path`
    pub fn read(path: &str, io_latency: Tick) -> Self {
        Self::new("read", [path], io_latency)
    }

    /// `delete path`
    pub fn delete(path: &str, io_latency: Tick) -> Self {
        Self::new("delete", [path], io_latency)
    }

    /// `touch path`
    pub fn touch(path: &str, io_latency: Tick) -> Self {
        Self::new("touch", [path], io_latency)
    }
}

impl fmt::Display for Syscall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {:?}", arg)?;
        }
        write!(f, " (latency={})", self.io_latency)
    }
}

/// One step of a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
    /// Consume the given number of clock units
    Cpu(Tick),
    /// Perform a namespace operation
    Syscall(Syscall),
    /// Block until the given number of units have passed
    Sleep(Tick),
}

impl Instruction {
    pub fn cpu(duration: Tick) -> Self {
        Instruction::Cpu(duration)
    }

    pub fn syscall(call: Syscall) -> Self {
        Instruction::Syscall(call)
    }

    pub fn sleep(duration: Tick) -> Self {
        Instruction::Sleep(duration)
    }
}

/// Reason a syscall terminated its process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fewer arguments than the operation needs
    #[error("{op}: expected at least {expected} argument(s), got {got}")]
    MissingArguments {
        op: SyscallOp,
        expected: usize,
        got: usize,
    },

    /// The operation name is not one the store supports
    #[error("unknown syscall {0:?}")]
    UnknownSyscall(String),

    /// The store rejected the operation
    #[error("{op}: {reason}")]
    Rejected { op: SyscallOp, reason: String },
}

/// How a process finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Ran off the end of its program
    Completed,
    /// Killed by a failing syscall
    Faulted(Fault),
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Completed => write!(f, "completed"),
            ExitStatus::Faulted(fault) => write!(f, "faulted: {}", fault),
        }
    }
}

/// Lifecycle state of a process.
///
/// `New -> Ready -> Running -> {Ready | Waiting | Terminated}`,
/// `Waiting -> Ready`. The wake time only exists while waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Waiting { until: Tick },
    Terminated(ExitStatus),
}

impl ProcessState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, ProcessState::Terminated(_))
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::New => write!(f, "NEW"),
            ProcessState::Ready => write!(f, "READY"),
            ProcessState::Running => write!(f, "RUNNING"),
            ProcessState::Waiting { until } => write!(f, "WAITING(until {})", until),
            ProcessState::Terminated(_) => write!(f, "TERMINATED"),
        }
    }
}

/// A simulated process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    /// Unique identifier
    pub pid: Pid,
    /// Display name
    pub name: String,
    /// Time at which the process becomes Ready
    pub arrival: Tick,
    /// CPU burst used by the standalone schedulers
    pub burst: Tick,
    /// Priority used by the standalone schedulers
    pub priority: i32,
    /// Lifecycle state
    pub state: ProcessState,
    /// Instructions to execute in order
    pub program: Vec<Instruction>,
    /// Index of the next instruction
    pub pc: usize,
    /// Clock value at first dispatch
    pub start_time: Option<Tick>,
    /// Clock value at termination
    pub completion_time: Option<Tick>,
    /// Resource identifiers held by the process (not populated by the engine)
    pub resources: BTreeSet<String>,
}

impl Process {
    /// Create a process in the New state with an empty program
    pub fn new(pid: Pid, name: impl Into<String>, arrival: Tick) -> Self {
        Self {
            pid,
            name: name.into(),
            arrival,
            burst: 0,
            priority: 0,
            state: ProcessState::New,
            program: Vec::new(),
            pc: 0,
            start_time: None,
            completion_time: None,
            resources: BTreeSet::new(),
        }
    }

    /// Replace the program
    pub fn with_program(mut self, program: Vec<Instruction>) -> Self {
        self.program = program;
        self
    }

    /// Set the scheduler interop fields
    pub fn with_scheduling(mut self, burst: Tick, priority: i32) -> Self {
        self.burst = burst;
        self.priority = priority;
        self
    }

    /// Append an instruction
    pub fn push(&mut self, instruction: Instruction) {
        self.program.push(instruction);
    }

    /// Instruction at the program counter, if any remain
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.program.get(self.pc)
    }

    /// Whether the program counter is past the last instruction
    pub fn is_exhausted(&self) -> bool {
        self.pc >= self.program.len()
    }

    /// Static dispatch key: earlier arrival first, then lower pid
    pub fn priority_key(&self) -> (Tick, Pid) {
        (self.arrival, self.pid)
    }

    /// Exit status once terminated
    pub fn exit_status(&self) -> Option<&ExitStatus> {
        match &self.state {
            ProcessState::Terminated(status) => Some(status),
            _ => None,
        }
    }

    /// `completion - arrival`, once terminated
    pub fn turnaround(&self) -> Option<Tick> {
        self.completion_time
            .map(|done| done.saturating_sub(self.arrival))
    }

    /// `start - arrival`, once dispatched
    pub fn response(&self) -> Option<Tick> {
        self.start_time
            .map(|start| start.saturating_sub(self.arrival))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn syscall_op_parses_lowercase_names() {
        assert_eq!(SyscallOp::from_str("write").unwrap(), SyscallOp::Write);
        assert_eq!(SyscallOp::from_str("delete").unwrap(), SyscallOp::Delete);
        assert!(SyscallOp::from_str("chmod").is_err());
        assert_eq!(SyscallOp::Touch.to_string(), "touch");
        assert_eq!(SyscallOp::Write.arity(), 2);
    }

    #[test]
    fn instruction_json_shape() {
        let program: Vec<Instruction> = serde_json::from_str(
            r#"[{"cpu":2},{"syscall":{"name":"read","args":["/a"]}},{"sleep":4}]"#,
        )
        .unwrap();
        assert_eq!(
            program,
            vec![
                Instruction::cpu(2),
                Instruction::syscall(Syscall::read("/a", 0)),
                Instruction::sleep(4),
            ]
        );
    }

    #[test]
    fn syscall_display_quotes_args() {
        let call = Syscall::write("/tmp/a.txt", "hi", 3);
        assert_eq!(call.to_string(), r#"write "/tmp/a.txt" "hi" (latency=3)"#);
    }

    #[test]
    fn process_builders_and_timing() {
        let mut p = Process::new(7, "P7", 2).with_scheduling(5, 1);
        assert_eq!(p.state, ProcessState::New);
        assert!(p.is_exhausted());
        p.push(Instruction::cpu(1));
        assert_eq!(p.current_instruction(), Some(&Instruction::Cpu(1)));
        assert_eq!(p.priority_key(), (2, 7));

        p.start_time = Some(4);
        p.completion_time = Some(9);
        assert_eq!(p.response(), Some(2));
        assert_eq!(p.turnaround(), Some(7));
        assert!(p.exit_status().is_none());
    }
}
