//! Check status: the single observable result of a run.
//!
//! Accumulates rule-application counters, the termination cause, the
//! inconsistency witness when one exists, and timings. Serializes to JSON
//! for machine-readable reports.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why the engine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// Worklist drained with no negative self-loop: consistent.
    FixedPoint,
    /// A negative self-loop under an unknown-free label was derived.
    NegativeLoop,
    /// The wall-clock budget expired between cycles.
    Timeout,
}

/// Result and accounting of one check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckStatus {
    /// Whether the network is consistent (STN/CSTN) or dynamically
    /// controllable (STNU/CSTNU). Meaningful only when `finished`.
    pub consistency: bool,
    /// Whether the check ran to a definitive answer.
    pub finished: bool,
    /// Whether the wall-clock budget expired.
    pub timeout: bool,

    /// Worklist cycles executed (one dequeue each).
    pub cycles: u64,
    /// Total rule applications that changed some payload.
    pub propagation_calls: u64,
    /// Labeled-propagation (LP) applications.
    pub labeled_value_propagation_calls: u64,
    /// Observation label-modification (R0) applications.
    pub r0_calls: u64,
    /// Third-observer label-modification (R3) applications.
    pub r3_calls: u64,
    /// STNU lower-case rule applications.
    pub lower_case_calls: u64,
    /// STNU upper-case propagations.
    pub upper_case_calls: u64,
    /// STNU cross-case rule applications.
    pub cross_case_calls: u64,
    /// STNU letter-removal applications.
    pub letter_removal_calls: u64,

    /// Node carrying the negative self-loop, when inconsistent.
    pub negative_loop_node: Option<String>,
    /// Nodes of the witness cycle, when one was reconstructed.
    pub negative_cycle: Vec<String>,

    /// Why the engine stopped, once it has.
    pub termination: Option<Termination>,
    /// Wall-clock start of the check.
    pub started_at: DateTime<Utc>,
    /// Total wall-clock time of the check.
    pub execution_time: Duration,
}

impl Default for CheckStatus {
    fn default() -> Self {
        CheckStatus::new()
    }
}

impl CheckStatus {
    pub fn new() -> CheckStatus {
        CheckStatus {
            consistency: false,
            finished: false,
            timeout: false,
            cycles: 0,
            propagation_calls: 0,
            labeled_value_propagation_calls: 0,
            r0_calls: 0,
            r3_calls: 0,
            lower_case_calls: 0,
            upper_case_calls: 0,
            cross_case_calls: 0,
            letter_removal_calls: 0,
            negative_loop_node: None,
            negative_cycle: Vec::new(),
            termination: None,
            started_at: Utc::now(),
            execution_time: Duration::ZERO,
        }
    }

    /// One-word outcome for logs and the CLI.
    pub fn outcome(&self) -> &'static str {
        if !self.finished {
            if self.timeout { "timeout" } else { "unfinished" }
        } else if self.consistency {
            "consistent"
        } else {
            "inconsistent"
        }
    }

    /// JSON report for machine consumption.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "outcome: {}", self.outcome())?;
        writeln!(
            f,
            "cycles: {}, rule applications: {} (LP {}, R0 {}, R3 {}, LC {}, UC {}, CC {}, LR {})",
            self.cycles,
            self.propagation_calls,
            self.labeled_value_propagation_calls,
            self.r0_calls,
            self.r3_calls,
            self.lower_case_calls,
            self.upper_case_calls,
            self.cross_case_calls,
            self.letter_removal_calls,
        )?;
        if let Some(n) = &self.negative_loop_node {
            writeln!(f, "negative loop at: {n}")?;
            if !self.negative_cycle.is_empty() {
                writeln!(f, "witness cycle: {}", self.negative_cycle.join(" -> "))?;
            }
        }
        write!(f, "elapsed: {:?}", self.execution_time)
    }
}
