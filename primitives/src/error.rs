use thiserror::Error;

/// Domain-level error shared by every component in the ad-serving core.
///
/// This is intentionally agnostic of HTTP: the `adserver` crate's
/// `ResponseError` maps each variant to a status code at the edge.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("impression token has expired")]
    Expired,

    #[error("invalid state transition: cannot apply {event} to an impression in {from} state")]
    InvalidTransition { from: String, event: String },

    #[error("wallet {wallet} has insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet: String,
        balance: String,
        requested: String,
    },

    #[error("budget exceeded for {entity} {id}: spending {spent} would exceed budget {budget}")]
    BudgetExceeded {
        entity: &'static str,
        id: String,
        spent: String,
        budget: String,
    },

    #[error("upstream notification failed: {0}")]
    UpstreamFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
