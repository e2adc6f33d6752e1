//! Error types for fpl-curate
//!
//! Parse, archive and import failures are recoverable: callers turn them
//! into warnings or an unlocked curation, never a process exit.

use crate::meta::MetaParseError;
use crate::services::archive::ArchiveError;
use thiserror::Error;

/// Curation pipeline error type
#[derive(Debug, Error)]
pub enum CurateError {
    /// Curation is locked by an in-flight import or export
    #[error("Curation is locked: {0}")]
    Locked(String),

    /// No curation with this key in the working set
    #[error("Curation not found: {0}")]
    NotFound(String),

    /// Meta file could not be parsed
    #[error("Meta error: {0}")]
    Meta(#[from] MetaParseError),

    /// Archive could not be read or written
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The content store refused the curation
    #[error("Import rejected: {0}")]
    ImportRejected(String),

    /// Curations folder could not be watched
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// fpl-common error
    #[error("Common error: {0}")]
    Common(#[from] fpl_common::Error),
}

/// Result type for curation pipeline operations
pub type CurateResult<T> = Result<T, CurateError>;
