//! Error types for medialens.

use thiserror::Error;

/// Result type alias using medialens's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for profile loading and caps handling.
///
/// Loader-level errors are recoverable: the loader logs them and keeps
/// going, producing as complete a catalog as possible.
#[derive(Error, Debug)]
pub enum Error {
    /// A caps literal could not be parsed.
    #[error("malformed caps literal `{literal}`: {reason}")]
    CapsParse {
        /// The offending literal.
        literal: String,
        /// What went wrong.
        reason: String,
    },

    /// A profile-definition document is not well-formed XML.
    #[error("invalid profile document: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A `parent` or `base-profile` reference to an id that was never declared.
    #[error("unknown {kind} reference: {id}")]
    UnknownReference {
        /// Reference kind ("restriction" or "profile").
        kind: &'static str,
        /// The id that could not be resolved.
        id: String,
    },

    /// A container-less profile was given more than one stream restriction.
    #[error("invalid profile {0}: container-less profiles can hold only one stream restriction")]
    InvalidProfile(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error reported by the external metadata-discovery service.
///
/// These cross the discoverer boundary verbatim; the matcher is never
/// consulted when discovery itself failed.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The URI could not be parsed or is not supported.
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// Discovery did not finish within the configured timeout.
    #[error("metadata discovery timed out")]
    Timeout,

    /// The service is already processing another URI.
    #[error("discoverer is busy")]
    Busy,

    /// Decoders needed to inspect the media are not available.
    #[error("missing decoder plugins: {0:?}")]
    MissingPlugins(Vec<String>),

    /// Any other service failure.
    #[error("discovery failed: {0}")]
    Failed(String),
}
