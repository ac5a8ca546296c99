//! Teller configuration.

/// Configuration for the command surface.
#[derive(Debug, Clone)]
pub struct TellerConfig {
    /// How many times a version-conflicted debit append is retried before
    /// the operation surfaces `Conflict`.
    pub max_commit_retries: u32,
}

impl Default for TellerConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: 3,
        }
    }
}

impl TellerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(retries) = std::env::var("COREBANK_MAX_COMMIT_RETRIES") {
            if let Ok(retries) = retries.parse() {
                config.max_commit_retries = retries;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_commit_retries > 100 {
            return Err("Retry budget above 100 masks persistent contention".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TellerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_commit_retries, 3);
    }

    #[test]
    fn test_excessive_retry_budget_is_rejected() {
        let config = TellerConfig {
            max_commit_retries: 1000,
        };
        assert!(config.validate().is_err());
    }
}
