//! Loop Configuration
//!
//! Limits and switches for a [`Loop`](crate::Loop). The defaults are
//! generous; they exist to turn a runaway cycle of reactions into an error
//! instead of a hang.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a [`Loop`](crate::Loop).
///
/// # Example
///
/// ```rust
/// use trellis_core::LoopConfig;
///
/// let config = LoopConfig::from_json(r#"{ "max_reactions_per_iteration": 64 }"#).unwrap();
/// assert_eq!(config.max_reactions_per_iteration, 64);
/// assert!(config.warn_on_action_result);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    /// Maximum number of push-node recomputations in one `iterate()`.
    pub max_reactions_per_iteration: usize,

    /// Maximum number of action/reaction passes in one `iterate()`.
    pub max_passes: usize,

    /// Log a warning when an action body returns a value.
    pub warn_on_action_result: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_reactions_per_iteration: 100_000,
            max_passes: 1_000,
            warn_on_action_result: true,
        }
    }
}

impl LoopConfig {
    /// Parse and validate a configuration from JSON. Missing fields take
    /// their default values.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all limits are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_reactions_per_iteration == 0 {
            return Err(Error::Config(
                "max_reactions_per_iteration must be greater than zero".into(),
            ));
        }
        if self.max_passes == 0 {
            return Err(Error::Config("max_passes must be greater than zero".into()));
        }
        Ok(())
    }
}
