//! Data models for the curation pipeline
//!
//! - Curation records and their add-apps
//! - Content manifest entries
//! - Versioned image records

pub mod curation;
pub mod image;

pub use curation::{
    AddApp, AddAppField, AddAppKind, AddAppMeta, ContentEntry, Curation, SourceType,
    EXTRAS_APPLICATION_PATH, MESSAGE_APPLICATION_PATH,
};
pub use image::{ImageKind, ImageOrigin, ImageRecord};
