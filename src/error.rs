//! Engine outcome errors. Infrastructure failures travel as `anyhow`
//! errors with context, as elsewhere in the crate; these variants are the
//! outcomes callers are expected to branch on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or contradictory operator configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The upstream provider could not supply an indicator this cycle.
    #[error("indicator {id} unavailable")]
    IndicatorUnavailable { id: String },

    /// Every fallback tier came up empty.
    #[error("no price available for category: {category}")]
    NoPriceAvailable { category: String },

    #[error("{0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        EngineError::Store(e)
    }
}

impl EngineError {
    pub fn is_no_price(&self) -> bool {
        matches!(self, EngineError::NoPriceAvailable { .. })
    }
}
