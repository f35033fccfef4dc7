//! Run configuration.

use serde::{Deserialize, Serialize};

use super::partition::Partitioning;
use crate::collections::huge::MemoryBudget;
use crate::error::{Error, Result};

/// Settings of one Pregel run.
///
/// Missing fields take their default when deserialized:
///
/// ```
/// use pregel_engine::pregel::PregelConfig;
///
/// let config: PregelConfig = serde_json::from_str(r#"{ "max_iterations": 5 }"#).unwrap();
/// assert_eq!(config.max_iterations, 5);
/// assert_eq!(config.concurrency, PregelConfig::default().concurrency);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PregelConfig {
    /// Upper bound on the number of supersteps.
    pub max_iterations: usize,
    /// Worker threads, and the maximum number of partitions.
    pub concurrency: usize,
    /// How nodes are split across workers.
    pub partitioning: Partitioning,
    /// Limit for the run's up-front memory estimation and its allocations.
    pub memory_budget: MemoryBudget,
}

impl Default for PregelConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            concurrency: 4,
            partitioning: Partitioning::Range,
            memory_budget: MemoryBudget::unlimited(),
        }
    }
}

impl PregelConfig {
    /// Sets [`Self::max_iterations`].
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets [`Self::concurrency`].
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets [`Self::partitioning`].
    pub fn partitioning(mut self, partitioning: Partitioning) -> Self {
        self.partitioning = partitioning;
        self
    }

    /// Sets [`Self::memory_budget`].
    pub fn memory_budget(mut self, memory_budget: MemoryBudget) -> Self {
        self.memory_budget = memory_budget;
        self
    }

    /// Rejects settings no run can execute with.
    ///
    /// # Errors
    /// [`Error::InvalidConfig`] if `concurrency` or `max_iterations` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_validation() {
        let config = PregelConfig::default()
            .max_iterations(7)
            .concurrency(2)
            .partitioning(Partitioning::Degree)
            .memory_budget(MemoryBudget::bytes(1 << 20));
        assert!(config.validate().is_ok());
        assert_eq!(config.partitioning, Partitioning::Degree);
        assert_eq!(config.memory_budget.limit(), Some(1 << 20));

        assert!(matches!(
            config.clone().concurrency(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            config.max_iterations(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn json_round_trip() {
        let config = PregelConfig::default().partitioning(Partitioning::Degree);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"degree\""));
        let back: PregelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
