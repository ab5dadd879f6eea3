//! Solver configuration.
//!
//! Everything has a default, so an empty TOML document is a valid config:
//!
//! ```
//! use std::time::Duration;
//! use technician_routing::config::{AcceptorConfig, SolverConfig};
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     random_seed = 7
//!
//!     [termination]
//!     spent_limit_seconds = 5
//!     unimproved_iteration_limit = 20000
//!
//!     [acceptor]
//!     type = "late_acceptance"
//!     size = 200
//! "#).unwrap();
//!
//! assert_eq!(config.termination.spent_limit(), Some(Duration::from_secs(5)));
//! assert_eq!(config.acceptor, AcceptorConfig::LateAcceptance { size: 200 });
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constraints::ConstraintSet;

/// Default time budget of a solve.
pub const DEFAULT_SPENT_LIMIT_SECONDS: u64 = 30;

/// Default late acceptance size.
pub const DEFAULT_LATE_ACCEPTANCE_SIZE: usize = 400;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub termination: TerminationConfig,
    pub acceptor: AcceptorConfig,
    /// Candidate moves sampled per step; the best of them is offered to the acceptor.
    pub candidates_per_step: usize,
    /// Seed for move sampling. Same seed and plan give the same search.
    pub random_seed: u64,
    pub environment_mode: EnvironmentMode,
    /// Minimum visit count per technician. `None` leaves the constraint out.
    pub technician_must_work: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            termination: TerminationConfig::default(),
            acceptor: AcceptorConfig::default(),
            candidates_per_step: 1,
            random_seed: 0,
            environment_mode: EnvironmentMode::default(),
            technician_must_work: None,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates_per_step == 0 {
            return Err(ConfigError::Invalid("candidates_per_step must be at least 1".into()));
        }
        match self.acceptor {
            AcceptorConfig::LateAcceptance { size: 0 } => {
                Err(ConfigError::Invalid("late acceptance size must be at least 1".into()))
            }
            AcceptorConfig::SimulatedAnnealing { starting_temperature }
                if !(starting_temperature > 0.0) =>
            {
                Err(ConfigError::Invalid("starting temperature must be positive".into()))
            }
            _ => Ok(()),
        }
    }

    pub fn with_spent_limit(mut self, limit: Duration) -> Self {
        self.termination.spent_limit_seconds = None;
        self.termination.spent_limit_millis = Some(limit.as_millis() as u64);
        self
    }

    pub fn with_iteration_limit(mut self, limit: u64) -> Self {
        self.termination.iteration_limit = Some(limit);
        self
    }

    pub fn with_unimproved_iteration_limit(mut self, limit: u64) -> Self {
        self.termination.unimproved_iteration_limit = Some(limit);
        self
    }

    pub fn with_acceptor(mut self, acceptor: AcceptorConfig) -> Self {
        self.acceptor = acceptor;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_candidates_per_step(mut self, candidates: usize) -> Self {
        self.candidates_per_step = candidates;
        self
    }

    pub fn with_environment_mode(mut self, mode: EnvironmentMode) -> Self {
        self.environment_mode = mode;
        self
    }

    /// The constraints this configuration scores with.
    pub fn constraint_set(&self) -> ConstraintSet {
        match self.technician_must_work {
            Some(min_visits) => ConstraintSet::default().with_technician_must_work(min_visits),
            None => ConstraintSet::default(),
        }
    }
}

/// When a search run stops. The first limit reached wins; cancellation is
/// always honoured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    pub spent_limit_seconds: Option<u64>,
    /// Finer-grained alternative to `spent_limit_seconds`; takes precedence.
    pub spent_limit_millis: Option<u64>,
    /// Stop after this many steps without a new best score.
    pub unimproved_iteration_limit: Option<u64>,
    pub iteration_limit: Option<u64>,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            spent_limit_seconds: Some(DEFAULT_SPENT_LIMIT_SECONDS),
            spent_limit_millis: None,
            unimproved_iteration_limit: None,
            iteration_limit: None,
        }
    }
}

impl TerminationConfig {
    pub fn spent_limit(&self) -> Option<Duration> {
        self.spent_limit_millis
            .map(Duration::from_millis)
            .or_else(|| self.spent_limit_seconds.map(Duration::from_secs))
    }
}

/// Acceptance criterion of the local search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcceptorConfig {
    /// Only improving or equal moves.
    HillClimbing,
    /// Accept when not worse than the current score or the score `size` steps ago.
    LateAcceptance { size: usize },
    /// Accept worse moves with a probability that cools down over the time budget.
    SimulatedAnnealing { starting_temperature: f64 },
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        AcceptorConfig::LateAcceptance {
            size: DEFAULT_LATE_ACCEPTANCE_SIZE,
        }
    }
}

/// How much self-checking the search does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentMode {
    #[default]
    Reproducible,
    /// Verify chains and compare incremental against full scores after
    /// every committed move.
    FullAssert,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = SolverConfig::from_toml_str("").unwrap();
        assert_eq!(config, SolverConfig::default());
        assert_eq!(config.termination.spent_limit(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_parses_all_acceptors() {
        let hill = SolverConfig::from_toml_str("[acceptor]\ntype = \"hill_climbing\"").unwrap();
        assert_eq!(hill.acceptor, AcceptorConfig::HillClimbing);

        let annealing = SolverConfig::from_toml_str(
            "[acceptor]\ntype = \"simulated_annealing\"\nstarting_temperature = 2.5",
        )
        .unwrap();
        assert_eq!(
            annealing.acceptor,
            AcceptorConfig::SimulatedAnnealing {
                starting_temperature: 2.5
            }
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            SolverConfig::from_toml_str("candidates_per_step = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SolverConfig::from_toml_str("[acceptor]\ntype = \"late_acceptance\"\nsize = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SolverConfig::from_toml_str("random_seed = \"x\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_millis_take_precedence() {
        let config = SolverConfig::new().with_spent_limit(Duration::from_millis(250));
        assert_eq!(config.termination.spent_limit(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_must_work_registers_constraint() {
        let config = SolverConfig::from_toml_str("technician_must_work = 2").unwrap();
        assert_eq!(config.constraint_set().len(), 4);
        assert_eq!(SolverConfig::default().constraint_set().len(), 3);
    }
}
