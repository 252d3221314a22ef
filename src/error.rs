//! Crate-wide error type and `Result` alias.
//!
//! There's no `thiserror`/`anyhow` dependency here, on purpose: the variants are hand-written and
//! map one-to-one onto the error kinds a caller needs to distinguish (compile-time query errors,
//! runtime source errors, driver configuration errors).

use std::fmt;

/// All errors produced by this crate.
#[derive(Debug)]
pub enum Error {
    /// A leaf predicate (`eq`/`ne`) was built from a compound relation instead of a bare field
    /// reference.
    RelationMalformed(String),
    /// The surface query text failed to compile: a parse error, an alias error, or a data-source
    /// build error encountered while compiling.
    TextQueryCompileError(String),
    /// A data source could not be constructed: unknown type, bad options, bad filter.
    DataSourceBuildError(String),
    /// A data source failed while producing records.
    DataSourceError(String),
    /// The driver-level configuration could not be loaded or is invalid.
    ConfigurationError(String),
    /// Wraps an I/O failure from the driver shell (reading query text, config, or output).
    Io(String),
}

/// A `Result` using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelationMalformed(msg) => write!(f, "relation malformed: {msg}"),
            Self::TextQueryCompileError(msg) => write!(f, "query compile error: {msg}"),
            Self::DataSourceBuildError(msg) => write!(f, "data source build error: {msg}"),
            Self::DataSourceError(msg) => write!(f, "data source error: {msg}"),
            Self::ConfigurationError(msg) => write!(f, "configuration error: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::DataSourceError(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::DataSourceError(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

/// Shorthand for building a [`Error::DataSourceBuildError`] from a format string, mirroring the
/// teacher crate's `errinput!` helper for its own "this doesn't make sense" construction sites.
#[macro_export]
macro_rules! errinput {
    ($($arg:tt)*) => {
        $crate::error::Error::DataSourceBuildError(format!($($arg)*))
    };
}

/// Shorthand for building a [`Error::ConfigurationError`] from a format string.
#[macro_export]
macro_rules! errconfig {
    ($($arg:tt)*) => {
        $crate::error::Error::ConfigurationError(format!($($arg)*))
    };
}
