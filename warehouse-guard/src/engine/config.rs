use crate::logging::LogConfig;

/// Execution settings for [`AnomalyEngine`](super::AnomalyEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run evaluators concurrently on the blocking pool
    pub parallel: bool,
    /// Maximum number of evaluators in flight when running in parallel
    pub max_concurrency: usize,
    /// Logging verbosity for the run
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_concurrency: num_cpus::get(),
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration that evaluates one rule at a time.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Enables or disables concurrent evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the concurrency bound. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Concurrency bound actually used.
    pub fn effective_concurrency(&self) -> usize {
        if self.parallel {
            self.max_concurrency.max(1)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_bounds() {
        assert!(EngineConfig::default().effective_concurrency() >= 1);
        assert_eq!(EngineConfig::sequential().effective_concurrency(), 1);
        let zero = EngineConfig::default().with_max_concurrency(0);
        assert_eq!(zero.effective_concurrency(), 1);
        let four = EngineConfig::default()
            .with_parallel(true)
            .with_max_concurrency(4);
        assert_eq!(four.effective_concurrency(), 4);
    }
}
