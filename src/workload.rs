/*!
 * Workload definitions for the execution engine
 *
 * A workload lists directories to create before the run and the processes
 * to simulate. It is read from JSON:
 *
 * ```json
 * {
 *   "setup": ["/tmp"],
 *   "processes": [
 *     { "pid": 1, "name": "P1", "arrival": 0,
 *       "program": [ {"cpu": 2},
 *                    {"syscall": {"name": "write", "args": ["/tmp/a.txt", "hi"], "io_latency": 3}},
 *                    {"sleep": 1} ] }
 *   ]
 * }
 * ```
 */

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{Engine, SimulationSummary};
use crate::error::Result;
use crate::namespace::{Namespace, NamespaceError};
use crate::process::{Instruction, Pid, Process, Syscall, Tick};

/// Errors that can occur while loading or preparing a workload
#[derive(Error, Debug)]
pub enum WorkloadError {
    /// Two processes share a pid
    #[error("Duplicate pid: {0}")]
    DuplicatePid(Pid),

    /// A setup directory could not be created
    #[error("Failed to create {path}: {source}")]
    Setup {
        path: String,
        #[source]
        source: NamespaceError,
    },

    /// IO error while reading the workload file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The workload file is not valid JSON or does not match the schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One process as written in a workload file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub pid: Pid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arrival: Tick,
    #[serde(default)]
    pub burst: Tick,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub program: Vec<Instruction>,
}

impl ProcessSpec {
    /// Build the process; an empty name becomes `P<pid>`
    pub fn to_process(&self) -> Process {
        let name = if self.name.is_empty() {
            format!("P{}", self.pid)
        } else {
            self.name.clone()
        };
        Process::new(self.pid, name, self.arrival)
            .with_scheduling(self.burst, self.priority)
            .with_program(self.program.clone())
    }
}

/// A complete simulation input
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Workload {
    /// Directories created (in order) before the run; existing ones are kept
    #[serde(default)]
    pub setup: Vec<String>,
    /// Processes to simulate
    #[serde(default)]
    pub processes: Vec<ProcessSpec>,
}

impl Workload {
    /// Parse and validate a workload from JSON
    pub fn from_json(json: &str) -> std::result::Result<Self, WorkloadError> {
        let workload: Workload = serde_json::from_str(json)?;
        workload.validate()?;
        Ok(workload)
    }

    /// Read a workload file
    pub fn from_file(path: &Path) -> std::result::Result<Self, WorkloadError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The two-process demonstration: P1 writes a file and reads it back,
    /// P2 arrives a unit later and reads the same file
    pub fn demo() -> Self {
        Self {
            setup: vec!["/tmp".to_string()],
            processes: vec![
                ProcessSpec {
                    pid: 1,
                    name: "P1".to_string(),
                    arrival: 0,
                    burst: 0,
                    priority: 0,
                    program: vec![
                        Instruction::cpu(2),
                        Instruction::syscall(Syscall::write("/tmp/a.txt", "hello-from-p1", 3)),
                        Instruction::cpu(1),
                        Instruction::syscall(Syscall::read("/tmp/a.txt", 2)),
                    ],
                },
                ProcessSpec {
                    pid: 2,
                    name: "P2".to_string(),
                    arrival: 1,
                    burst: 0,
                    priority: 0,
                    program: vec![
                        Instruction::cpu(1),
                        Instruction::syscall(Syscall::read("/tmp/a.txt", 1)),
                        Instruction::cpu(1),
                    ],
                },
            ],
        }
    }

    /// Reject duplicate pids
    pub fn validate(&self) -> std::result::Result<(), WorkloadError> {
        let mut seen = BTreeSet::new();
        for spec in &self.processes {
            if !seen.insert(spec.pid) {
                return Err(WorkloadError::DuplicatePid(spec.pid));
            }
        }
        Ok(())
    }

    /// Create the setup directories in `fs`
    pub fn prepare(&self, fs: &mut Namespace) -> std::result::Result<(), WorkloadError> {
        for path in &self.setup {
            if fs.stat(path).map(|node| node.is_dir()).unwrap_or(false) {
                continue;
            }
            fs.make_directory(path)
                .map_err(|source| WorkloadError::Setup {
                    path: path.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Fresh process values for the engine
    pub fn processes(&self) -> Vec<Process> {
        self.processes.iter().map(ProcessSpec::to_process).collect()
    }

    /// Prepare `fs` and run the workload to completion
    pub fn run(&self, fs: &mut Namespace) -> Result<SimulationSummary> {
        self.prepare(fs)?;

        let mut engine = Engine::new(fs);
        for process in self.processes() {
            engine.add_process(process)?;
        }

        info!("running workload with {} process(es)", self.processes.len());
        Ok(engine.run())
    }
}
