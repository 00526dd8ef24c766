use ulid::Ulid;

#[derive(Debug)]
pub enum EngineError {
    /// Referenced activity is not in the registry.
    UnknownActivity(Ulid),
    InvalidPartySize(u32),
    /// Unknown check-in id.
    NotFound(Ulid),
    AlreadyClosed(Ulid),
    AlreadyExists(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::UnknownActivity(_) => "unknown_activity",
            EngineError::InvalidPartySize(_) => "invalid_party_size",
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyClosed(_) => "already_closed",
            EngineError::AlreadyExists(_) => "already_exists",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "wal_error",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownActivity(id) => write!(f, "unknown activity: {id}"),
            EngineError::InvalidPartySize(n) => {
                write!(f, "invalid party size {n}: must be at least 1")
            }
            EngineError::NotFound(id) => write!(f, "check-in not found: {id}"),
            EngineError::AlreadyClosed(id) => write!(f, "check-in already closed: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
