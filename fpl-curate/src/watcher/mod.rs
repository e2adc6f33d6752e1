//! Curations folder watcher
//!
//! - `source`: filesystem event sources (notify-backed, or a channel for tests)
//! - `debounce`: per-path write-stability queue
//! - `reconciler`: applies settled events to the curation store

pub mod debounce;
pub mod reconciler;
pub mod source;

pub use debounce::DebounceQueue;
pub use reconciler::Reconciler;
pub use source::{ChannelEventSource, FsEvent, FsEventKind, FsEventSource, NotifyEventSource};
