use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DmregError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("User does not exist: {0}")]
    UserNotFound(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("You are not a member of thread {0}")]
    NotAMember(String),
    #[error("Thread does not exist: {0}")]
    ThreadNotFound(String),
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("Dangling reference: {0}")]
    DanglingReference(String),
    /// Lost a creation race for a user pair. Resolved inside the dedup
    /// resolver and never returned from a public entry point.
    #[error("Thread already exists for pair {0}")]
    DuplicateThread(String),
}

impl DmregError {
    /// Stable snake_case code for envelopes and audit events.
    pub fn code(&self) -> &'static str {
        match self {
            DmregError::RusqliteError(_) => "sqlite",
            DmregError::IoError(_) => "io",
            DmregError::ConfigError(_) => "config",
            DmregError::ValidationError(_) => "validation",
            DmregError::Conflict(_) => "conflict",
            DmregError::StoreUnavailable(_) => "store_unavailable",
            DmregError::Unauthenticated(_) => "unauthenticated",
            DmregError::UserNotFound(_) => "user_not_found",
            DmregError::InvalidTarget(_) => "invalid_target",
            DmregError::NotAMember(_) => "not_a_member",
            DmregError::ThreadNotFound(_) => "thread_not_found",
            DmregError::IntegrityViolation(_) => "integrity_violation",
            DmregError::DanglingReference(_) => "dangling_reference",
            DmregError::DuplicateThread(_) => "duplicate_thread",
        }
    }

    /// Errors that mean an invariant is broken somewhere else in the system.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            DmregError::IntegrityViolation(_) | DmregError::DanglingReference(_)
        )
    }
}
