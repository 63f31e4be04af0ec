//! Engine options.
//!
//! A plain options struct with documented defaults; every field maps to one
//! behavioral switch of the checker. Options are validated once, when a
//! check starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TnError;

/// Configuration for one consistency/controllability check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOptions {
    /// Minimum delay between observing a proposition and reacting to it.
    /// Zero means instantaneous reaction; a positive value switches the
    /// observation rules to their strict variants and weakens third-party
    /// bounds by this amount.
    pub reaction_time: i32,

    /// Wall-clock budget in seconds. On expiry the engine halts between
    /// worklist cycles with `timeout = true, finished = false`.
    pub timeout_seconds: u64,

    /// Restrict labeled propagation to derivations ending at the zero
    /// timepoint. Sound, and considerably faster on large instances.
    pub propagation_only_to_z: bool,

    /// After the check, strip unknown-literal entries and remove edges
    /// whose payload emptied.
    pub cleaned: bool,

    /// Whether propagation respects node labels (derived values must hold
    /// under both endpoint scenarios). Disable only for legacy inputs whose
    /// node labels are meaningless.
    pub with_node_labels: bool,

    /// Whether extended conjunction may introduce unknown literals during
    /// propagation. When off, unknown-bearing derivations are skipped.
    pub with_unknown: bool,

    /// Finite horizon used during initialization. When absent, computed as
    /// the sum of absolute edge weights (a safe over-approximation of any
    /// longest path).
    pub horizon: Option<i32>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            reaction_time: 0,
            timeout_seconds: 1800,
            propagation_only_to_z: false,
            cleaned: false,
            with_node_labels: true,
            with_unknown: true,
            horizon: None,
        }
    }
}

impl CheckOptions {
    /// The wall-clock budget as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Check every option against its documented range.
    pub fn validate(&self) -> Result<(), TnError> {
        if self.reaction_time < 0 {
            return Err(TnError::InvalidOption(format!(
                "reaction_time must be >= 0, got {}",
                self.reaction_time
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(TnError::InvalidOption(
                "timeout_seconds must be > 0".to_string(),
            ));
        }
        if let Some(h) = self.horizon
            && h <= 0
        {
            return Err(TnError::InvalidOption(format!(
                "horizon must be > 0, got {h}"
            )));
        }
        Ok(())
    }
}
