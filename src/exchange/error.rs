//! Failure taxonomy for venue calls.

use super::types::Venue;
use thiserror::Error;

/// Errors raised by venue adapters.
///
/// All of them are recoverable at the cycle boundary: the engine logs them
/// and tries again on the next tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    /// Order book or mark price could not be loaded
    #[error("market data unavailable on {venue}: {reason}")]
    MarketDataUnavailable { venue: Venue, reason: String },

    /// Account is not initialized or the position could not be read
    #[error("account unavailable on {venue}: {reason}")]
    AccountUnavailable { venue: Venue, reason: String },

    /// The venue declined or failed to execute a submitted order
    #[error("order rejected by {venue}: {reason}")]
    OrderRejected { venue: Venue, reason: String },
}

impl VenueError {
    pub fn market_data(venue: Venue, reason: impl Into<String>) -> Self {
        VenueError::MarketDataUnavailable {
            venue,
            reason: reason.into(),
        }
    }

    pub fn account(venue: Venue, reason: impl Into<String>) -> Self {
        VenueError::AccountUnavailable {
            venue,
            reason: reason.into(),
        }
    }

    pub fn rejected(venue: Venue, reason: impl Into<String>) -> Self {
        VenueError::OrderRejected {
            venue,
            reason: reason.into(),
        }
    }

    /// Venue the failure originated from.
    pub fn venue(&self) -> Venue {
        match self {
            VenueError::MarketDataUnavailable { venue, .. }
            | VenueError::AccountUnavailable { venue, .. }
            | VenueError::OrderRejected { venue, .. } => *venue,
        }
    }

    /// Short operation label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            VenueError::MarketDataUnavailable { .. } => "market_data_unavailable",
            VenueError::AccountUnavailable { .. } => "account_unavailable",
            VenueError::OrderRejected { .. } => "order_rejected",
        }
    }
}
