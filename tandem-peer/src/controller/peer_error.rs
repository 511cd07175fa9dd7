use tandem_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("stale session: {0}")]
    StaleSession(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A description could not be created or applied. Starts recovery.
    #[error("negotiation failed: {0:#}")]
    Negotiation(#[from] anyhow::Error),

    #[error("candidate rejected: {0:#}")]
    Candidate(#[source] anyhow::Error),
}

impl PeerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PeerError::StaleSession(_) => ErrorKind::StaleSession,
            PeerError::InvalidState(_) => ErrorKind::InvalidState,
            PeerError::Negotiation(_) | PeerError::Candidate(_) => ErrorKind::Negotiation,
        }
    }
}
