//! In-flight curation state
//!
//! - [`actions`]: tagged union of every state transition
//! - [`reducer`]: pure `(state, action) -> state` transition function
//! - [`store`]: shared async handle that dispatches and announces changes

pub mod actions;
pub mod reducer;
pub mod store;

pub use actions::CurationAction;
pub use reducer::{reduce, CurationsState};
pub use store::{CurationStore, TryLock};
