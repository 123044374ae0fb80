/*!
 * Reporting functionality for simos
 *
 * Renders simulation results as console tables using the tabled library,
 * or as JSON for scripting.
 */

use clap::ValueEnum;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::engine::{Outcome, SimulationSummary};
use crate::error::Result;
use crate::process::Tick;

/// Format of the report output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
    /// Pretty-printed JSON
    Json,
}

/// Report generator for simulation results
pub struct Reporter {
    format: ReportFormat,
}

fn tick_or_dash(value: Option<Tick>) -> String {
    value.map_or_else(|| "-".to_string(), |t| t.to_string())
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Generate a report string for a finished simulation
    pub fn generate_report(&self, summary: &SimulationSummary) -> Result<String> {
        match self.format {
            ReportFormat::ConsoleTable => Ok(self.generate_console_report(summary)),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(summary)?),
        }
    }

    /// Print the report to stdout
    pub fn print_report(&self, summary: &SimulationSummary) -> Result<()> {
        println!("\n{}", self.generate_report(summary)?);
        Ok(())
    }

    // Per-process timing table
    fn create_process_table(&self, summary: &SimulationSummary) -> String {
        #[derive(Tabled)]
        struct ProcessRow {
            #[tabled(rename = "PID")]
            pid: u32,

            #[tabled(rename = "Name")]
            name: String,

            #[tabled(rename = "Arrival")]
            arrival: Tick,

            #[tabled(rename = "Start")]
            start: String,

            #[tabled(rename = "Completion")]
            completion: String,

            #[tabled(rename = "Turnaround")]
            turnaround: String,

            #[tabled(rename = "Response")]
            response: String,

            #[tabled(rename = "Exit")]
            exit: String,
        }

        let rows: Vec<ProcessRow> = summary
            .processes
            .iter()
            .map(|p| ProcessRow {
                pid: p.pid,
                name: p.name.clone(),
                arrival: p.arrival,
                start: tick_or_dash(p.start_time),
                completion: tick_or_dash(p.completion_time),
                turnaround: tick_or_dash(p.turnaround),
                response: tick_or_dash(p.response),
                exit: p.exit.clone().unwrap_or_else(|| p.state.clone()),
            })
            .collect();

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    // Run-level summary table
    fn create_summary_table(&self, summary: &SimulationSummary) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let finished = summary
            .processes
            .iter()
            .filter(|p| p.completion_time.is_some())
            .count();

        let rows = vec![
            SummaryRow {
                key: "End Time".to_string(),
                value: format!("t={}", summary.end_time),
            },
            SummaryRow {
                key: "Outcome".to_string(),
                value: summary.outcome.to_string(),
            },
            SummaryRow {
                key: "Processes Finished".to_string(),
                value: format!("{} / {}", finished, summary.processes.len()),
            },
            SummaryRow {
                key: "Dispatches".to_string(),
                value: summary.stats.dispatches.to_string(),
            },
            SummaryRow {
                key: "Syscalls".to_string(),
                value: summary.stats.syscalls.to_string(),
            },
            SummaryRow {
                key: "Faults".to_string(),
                value: summary.stats.faults.to_string(),
            },
        ];

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    // Generate a console table report
    fn generate_console_report(&self, summary: &SimulationSummary) -> String {
        let process_table = self.create_process_table(summary);
        let summary_table = self.create_summary_table(summary);

        let summary_title = match summary.outcome {
            Outcome::Completed => "SIMULATION COMPLETE",
            Outcome::Deadlocked { .. } => "SIMULATION STOPPED: DEADLOCK",
        };

        format!(
            "PROCESSES\n{}\n\n{}\n{}",
            process_table, summary_title, summary_table
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;
    use crate::workload::Workload;

    fn demo_summary() -> SimulationSummary {
        let mut fs = Namespace::new();
        Workload::demo().run(&mut fs).unwrap()
    }

    #[test]
    fn console_report_lists_processes() {
        let report = Reporter::new(ReportFormat::ConsoleTable)
            .generate_report(&demo_summary())
            .unwrap();
        assert!(report.contains("PROCESSES"));
        assert!(report.contains("Turnaround"));
        assert!(report.contains("P1"));
        assert!(report.contains("P2"));
        assert!(report.contains("SIMULATION COMPLETE"));
        assert!(report.contains("completed"));
    }

    #[test]
    fn json_report_is_parseable() {
        let report = Reporter::new(ReportFormat::Json)
            .generate_report(&demo_summary())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["outcome"], "completed");
        assert_eq!(value["processes"].as_array().unwrap().len(), 2);
        assert!(value.get("trace").is_none());
    }
}
