//! # FPL Common Library
//!
//! Shared code for the launcher curation tooling including:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Event types (CurateEvent enum) and the EventBus
//! - Atomic file write helpers

pub mod config;
pub mod error;
pub mod events;
pub mod fs_utils;

pub use error::{Error, Result};
