/*!
 * Discrete-event execution engine
 *
 * Drives a set of processes against a borrowed [`Namespace`] on a single
 * logical clock. Each iteration wakes arrivals and finished waits, picks
 * the Ready process with the smallest `(arrival, pid)` key and executes
 * exactly one of its instructions. When nothing is Ready the clock jumps
 * to the next arrival or wake time.
 *
 * Timing rules:
 * - `Cpu(d)` advances the clock by `d`.
 * - `Sleep(d)` waits until `clock + d` and charges one unit to issue.
 * - A syscall charges one unit to issue whatever its result; a successful
 *   call with latency `l` then waits until `clock + l`, measured after the
 *   issue cost. A failing call terminates the process at the pre-issue clock.
 */

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use serde::Serialize;

use crate::ensure;
use crate::error::Result;
use crate::namespace::{Namespace, NamespaceError};
use crate::process::{
    ExitStatus, Fault, Instruction, Pid, Process, ProcessState, Syscall, SyscallOp, Tick,
};

/// Something that happened during a simulation, in clock order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A New process reached its arrival time
    Arrived { at: Tick, pid: Pid },
    /// A Waiting process reached its wake time
    Woke { at: Tick, pid: Pid },
    /// A process was selected to run one instruction
    Dispatched { at: Tick, pid: Pid },
    /// CPU burst from `from` to `to`
    Cpu { pid: Pid, from: Tick, to: Tick },
    /// A process went to sleep
    Sleep { at: Tick, pid: Pid, until: Tick },
    /// A syscall succeeded; `output` holds the content returned by reads
    Syscall {
        at: Tick,
        pid: Pid,
        call: String,
        output: Option<String>,
    },
    /// A process is waiting for simulated I/O
    Blocked { at: Tick, pid: Pid, until: Tick },
    /// A syscall failed and killed its process
    Faulted { at: Tick, pid: Pid, fault: Fault },
    /// A process finished
    Terminated { at: Tick, pid: Pid },
    /// Nothing was Ready; the clock jumped forward
    Idle { from: Tick, to: Tick },
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEvent::Arrived { at, pid } => write!(f, "t={}: PID {} arrived -> READY", at, pid),
            TraceEvent::Woke { at, pid } => write!(f, "t={}: PID {} I/O done -> READY", at, pid),
            TraceEvent::Dispatched { at, pid } => write!(f, "t={}: PID {} START running", at, pid),
            TraceEvent::Cpu { pid, from, to } => {
                write!(f, "t={} -> {}: PID {} CPU({})", from, to, pid, to - from)
            }
            TraceEvent::Sleep { at, pid, until } => {
                write!(f, "t={}: PID {} SLEEP until {}", at, pid, until)
            }
            TraceEvent::Syscall {
                at,
                pid,
                call,
                output,
            } => {
                write!(f, "t={}: PID {} SYSCALL {}", at, pid, call)?;
                if let Some(output) = output {
                    write!(f, " -> {:?}", output)?;
                }
                Ok(())
            }
            TraceEvent::Blocked { at, pid, until } => {
                write!(f, "t={}: PID {} BLOCKED until {}", at, pid, until)
            }
            TraceEvent::Faulted { at, pid, fault } => {
                write!(f, "t={}: PID {} FAULT {} (terminating)", at, pid, fault)
            }
            TraceEvent::Terminated { at, pid } => write!(f, "t={}: PID {} TERMINATED", at, pid),
            TraceEvent::Idle { from, to } => write!(f, "t={} -> {}: idle", from, to),
        }
    }
}

/// How a simulation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every process terminated
    Completed,
    /// Some processes can never become Ready again
    Deadlocked { stuck: Vec<Pid> },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed => write!(f, "completed"),
            Outcome::Deadlocked { stuck } => {
                let pids: Vec<String> = stuck.iter().map(|p| p.to_string()).collect();
                write!(f, "deadlocked (PIDs {})", pids.join(", "))
            }
        }
    }
}

/// Counters collected while running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Instructions dispatched (including terminal dispatches of exhausted programs)
    pub dispatches: u64,
    /// Syscalls issued, successful or not
    pub syscalls: u64,
    /// Processes killed by a failing syscall
    pub faults: u64,
}

/// Final record of one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    pub pid: Pid,
    pub name: String,
    pub arrival: Tick,
    pub start_time: Option<Tick>,
    pub completion_time: Option<Tick>,
    pub turnaround: Option<Tick>,
    pub response: Option<Tick>,
    /// Final lifecycle state name
    pub state: String,
    /// Exit description, if the process terminated
    pub exit: Option<String>,
    #[serde(skip)]
    pub status: Option<ExitStatus>,
}

impl From<&Process> for ProcessSummary {
    fn from(process: &Process) -> Self {
        Self {
            pid: process.pid,
            name: process.name.clone(),
            arrival: process.arrival,
            start_time: process.start_time,
            completion_time: process.completion_time,
            turnaround: process.turnaround(),
            response: process.response(),
            state: process.state.to_string(),
            exit: process.exit_status().map(ToString::to_string),
            status: process.exit_status().cloned(),
        }
    }
}

/// Result of [`Engine::run`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationSummary {
    /// Clock value when the loop stopped
    pub end_time: Tick,
    /// Whether every process finished
    pub outcome: Outcome,
    /// Counters
    pub stats: EngineStats,
    /// Per-process results in dispatch-key order
    pub processes: Vec<ProcessSummary>,
    /// Ordered event log
    #[serde(skip)]
    pub trace: Vec<TraceEvent>,
}

impl SimulationSummary {
    /// Summary for a single process
    pub fn process(&self, pid: Pid) -> Option<&ProcessSummary> {
        self.processes.iter().find(|p| p.pid == pid)
    }

    /// Pids in the order they were dispatched, one entry per dispatch
    pub fn dispatch_order(&self) -> Vec<Pid> {
        self.trace
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Dispatched { pid, .. } => Some(*pid),
                _ => None,
            })
            .collect()
    }
}

/// What a single loop iteration did
enum Step {
    Dispatched,
    Advanced,
    Finished,
    Deadlocked(Vec<Pid>),
}

/// The execution engine.
///
/// Borrows the namespace for the duration of the simulation; processes are
/// owned by the engine.
pub struct Engine<'fs> {
    fs: &'fs mut Namespace,
    processes: Vec<Process>,
    clock: Tick,
    stats: EngineStats,
    trace: Vec<TraceEvent>,
}

impl<'fs> Engine<'fs> {
    /// Create an engine driving `fs`
    pub fn new(fs: &'fs mut Namespace) -> Self {
        Self {
            fs,
            processes: Vec::new(),
            clock: 0,
            stats: EngineStats::default(),
            trace: Vec::new(),
        }
    }

    /// Register a process; it is reset to the New state with its program
    /// counter at the start
    pub fn add_process(&mut self, mut process: Process) -> Result<()> {
        ensure!(
            self.processes.iter().all(|p| p.pid != process.pid),
            InvalidArgument,
            "duplicate pid {}",
            process.pid
        );

        process.state = ProcessState::New;
        process.pc = 0;
        process.start_time = None;
        process.completion_time = None;
        self.processes.push(process);
        Ok(())
    }

    /// Current logical time
    pub fn clock(&self) -> Tick {
        self.clock
    }

    /// Registered processes
    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    /// Run until every process terminates or no progress is possible
    pub fn run(&mut self) -> SimulationSummary {
        self.processes.sort_by_key(Process::priority_key);
        self.clock = self
            .processes
            .iter()
            .map(|p| p.arrival)
            .min()
            .unwrap_or(0);
        self.stats = EngineStats::default();
        self.trace.clear();

        info!(
            "starting simulation with {} process(es) at t={}",
            self.processes.len(),
            self.clock
        );

        let outcome = loop {
            match self.step() {
                Step::Dispatched | Step::Advanced => continue,
                Step::Finished => break Outcome::Completed,
                Step::Deadlocked(stuck) => {
                    warn!("deadlock at t={}: PIDs {:?} can never run", self.clock, stuck);
                    break Outcome::Deadlocked { stuck };
                }
            }
        };

        info!("simulation {} at t={}", outcome, self.clock);

        SimulationSummary {
            end_time: self.clock,
            outcome,
            stats: self.stats,
            processes: self.processes.iter().map(ProcessSummary::from).collect(),
            trace: self.trace.clone(),
        }
    }

    fn record(&mut self, event: TraceEvent) {
        debug!("{}", event);
        self.trace.push(event);
    }

    fn step(&mut self) -> Step {
        self.wake();

        if self.processes.iter().all(|p| p.state.is_terminated()) {
            return Step::Finished;
        }

        if let Some(index) = self.select() {
            self.dispatch(index);
            return Step::Dispatched;
        }

        match self.next_event_time() {
            Some(at) => {
                let to = at.max(self.clock);
                self.record(TraceEvent::Idle {
                    from: self.clock,
                    to,
                });
                self.clock = to;
                Step::Advanced
            }
            None => Step::Deadlocked(
                self.processes
                    .iter()
                    .filter(|p| !p.state.is_terminated())
                    .map(|p| p.pid)
                    .collect(),
            ),
        }
    }

    /// Move finished waits and due arrivals to Ready
    fn wake(&mut self) {
        let now = self.clock;
        let mut events = Vec::new();

        for process in &mut self.processes {
            match process.state {
                ProcessState::Waiting { until } if until <= now => {
                    process.state = ProcessState::Ready;
                    events.push(TraceEvent::Woke {
                        at: now,
                        pid: process.pid,
                    });
                }
                ProcessState::New if process.arrival <= now => {
                    process.state = ProcessState::Ready;
                    events.push(TraceEvent::Arrived {
                        at: now,
                        pid: process.pid,
                    });
                }
                _ => {}
            }
        }

        for event in events {
            self.record(event);
        }
    }

    /// Ready process with the smallest static key
    fn select(&self) -> Option<usize> {
        self.processes
            .iter()
            .enumerate()
            .filter(|(_, p)| p.state == ProcessState::Ready)
            .min_by_key(|(_, p)| p.priority_key())
            .map(|(index, _)| index)
    }

    /// Earliest pending arrival or wake time
    fn next_event_time(&self) -> Option<Tick> {
        self.processes
            .iter()
            .filter_map(|p| match p.state {
                ProcessState::New => Some(p.arrival),
                ProcessState::Waiting { until } => Some(until),
                _ => None,
            })
            .min()
    }

    fn terminate(&mut self, index: usize, status: ExitStatus, at: Tick) {
        let process = &mut self.processes[index];
        process.state = ProcessState::Terminated(status);
        process.completion_time = Some(at);
        let pid = process.pid;
        self.record(TraceEvent::Terminated { at, pid });
    }

    /// Execute one instruction of the process at `index`
    fn dispatch(&mut self, index: usize) {
        let now = self.clock;
        let process = &mut self.processes[index];
        let pid = process.pid;
        process.state = ProcessState::Running;
        process.start_time.get_or_insert(now);
        let instruction = process.current_instruction().cloned();

        self.stats.dispatches += 1;
        self.record(TraceEvent::Dispatched { at: now, pid });

        match instruction {
            None => {
                self.terminate(index, ExitStatus::Completed, now);
                return;
            }
            Some(Instruction::Cpu(duration)) => {
                self.clock = now.saturating_add(duration);
                self.processes[index].pc += 1;
                self.record(TraceEvent::Cpu {
                    pid,
                    from: now,
                    to: self.clock,
                });
            }
            Some(Instruction::Sleep(duration)) => {
                let until = now.saturating_add(duration);
                let process = &mut self.processes[index];
                process.state = ProcessState::Waiting { until };
                process.pc += 1;
                self.clock = now.saturating_add(1);
                self.record(TraceEvent::Sleep { at: now, pid, until });
            }
            Some(Instruction::Syscall(call)) => self.syscall(index, &call),
        }

        let process = &self.processes[index];
        if process.state == ProcessState::Running {
            if process.is_exhausted() {
                self.terminate(index, ExitStatus::Completed, self.clock);
            } else {
                self.processes[index].state = ProcessState::Ready;
            }
        }
    }

    fn syscall(&mut self, index: usize, call: &Syscall) {
        let issued_at = self.clock;
        let pid = self.processes[index].pid;
        let result = perform(self.fs, call);

        self.stats.syscalls += 1;
        self.clock = issued_at.saturating_add(1);

        match result {
            Err(fault) => {
                warn!("t={}: PID {} syscall failed: {}", issued_at, pid, fault);
                self.stats.faults += 1;
                self.record(TraceEvent::Faulted {
                    at: issued_at,
                    pid,
                    fault: fault.clone(),
                });
                self.terminate(index, ExitStatus::Faulted(fault), issued_at);
            }
            Ok(output) => {
                self.record(TraceEvent::Syscall {
                    at: issued_at,
                    pid,
                    call: call.to_string(),
                    output,
                });

                let process = &mut self.processes[index];
                process.pc += 1;
                if call.io_latency > 0 {
                    let until = self.clock.saturating_add(call.io_latency);
                    process.state = ProcessState::Waiting { until };
                    self.record(TraceEvent::Blocked {
                        at: self.clock,
                        pid,
                        until,
                    });
                }
            }
        }
    }
}

/// Route a syscall to the namespace, returning read content on success
fn perform(fs: &mut Namespace, call: &Syscall) -> std::result::Result<Option<String>, Fault> {
    let op = SyscallOp::from_str(&call.name)
        .map_err(|_| Fault::UnknownSyscall(call.name.clone()))?;

    if call.args.len() < op.arity() {
        return Err(Fault::MissingArguments {
            op,
            expected: op.arity(),
            got: call.args.len(),
        });
    }

    let rejected = |err: NamespaceError| Fault::Rejected {
        op,
        reason: err.to_string(),
    };
    let path = call.args[0].as_str();

    match op {
        SyscallOp::Write => fs.write_file(path, &call.args[1]).map(|_| None),
        SyscallOp::Read => fs.read_file(path).map(Some),
        SyscallOp::Delete => fs.remove_file(path).map(|_| None),
        SyscallOp::Touch => fs.create_or_touch_file(path).map(|_| None),
    }
    .map_err(rejected)
}
