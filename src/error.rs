//! Crate error types.
//!
//! Per-frame operations (attach, detach, get, destroy) never return an error;
//! they are value-returning (`Option`/`bool`) so a bad entity id or a missing
//! component is an ordinary outcome, not a failure. `EcsError` covers the
//! conditions that are only legal to hit at startup: malformed group specs,
//! unregistered component kinds, and config loading.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EcsError {
    /// A group was requested with an empty component-kind list.
    #[error("group spec is empty")]
    EmptyGroup,

    /// A kind id that was never registered with this world.
    #[error("component kind {kind} is not registered with this world")]
    UnknownKind { kind: u16 },

    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Type alias for results in this crate.
pub type EcsResult<T> = Result<T, EcsError>;
