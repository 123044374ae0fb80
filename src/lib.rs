/*!
 * simos - Educational operating-system simulator
 *
 * Pairs a simulated hierarchical file store (directories, files, metadata,
 * JSON persistence) with a discrete-event engine that runs processes whose
 * system calls are resolved against that store.
 */

pub mod config;
pub mod engine;
pub mod error;
pub mod namespace;
pub mod process;
pub mod report;
pub mod shell;
pub mod utils;
pub mod workload;


// Re-export main components for easier access
pub use config::{Args, Config};
pub use engine::{Engine, Outcome, SimulationSummary, TraceEvent};
pub use error::{Result, SimError};
pub use namespace::{Namespace, NamespaceError, NamespaceResult};
pub use process::{ExitStatus, Fault, Instruction, Process, ProcessState, Syscall, SyscallOp};
pub use report::{ReportFormat, Reporter};
pub use shell::Shell;
pub use workload::Workload;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
