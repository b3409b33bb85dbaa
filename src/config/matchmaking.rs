//! Default match-search parameters

use crate::error::QueueResult;
use crate::matching::finder::MatchRequest;
use serde::{Deserialize, Serialize};

/// Parameters used when a caller asks for a match without specifying them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchmakingConfig {
    /// Rating spread accepted with no wait
    pub base_range: f64,
    /// Extra spread accepted per second waited
    pub range_expansion: f64,
    /// Players per team
    pub team_size: usize,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            base_range: 100.0,
            range_expansion: 10.0,
            team_size: 5,
        }
    }
}

impl MatchmakingConfig {
    /// The validated search request these defaults describe
    pub fn request(&self) -> QueueResult<MatchRequest> {
        MatchRequest::new(self.team_size, self.base_range, self.range_expansion)
    }

    pub fn validate(&self) -> QueueResult<()> {
        self.request().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatchmakingConfig::default();
        assert_eq!(config.base_range, 100.0);
        assert_eq!(config.range_expansion, 10.0);
        assert_eq!(config.team_size, 5);
        assert!(config.validate().is_ok());
        assert_eq!(config.request().unwrap().window_len(), 10);
    }

    #[test]
    fn test_invalid_defaults_rejected() {
        let config = MatchmakingConfig {
            team_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MatchmakingConfig {
            range_expansion: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
