//! Curation state actions

use crate::meta::{MetaField, ParsedMeta};
use crate::models::{AddAppField, AddAppKind, ContentEntry, Curation, ImageKind, ImageRecord};

/// Every transition of the working set
///
/// Mutations of a locked curation are ignored, except removal and the two
/// lock actions.
#[derive(Debug, Clone)]
pub enum CurationAction {
    /// Add a curation (ignored if its key is already present)
    AddCuration(Curation),
    RemoveCuration {
        key: String,
    },
    /// Set one meta property; an empty value clears it
    EditCurationMeta {
        key: String,
        property: String,
        value: String,
    },
    /// Replace meta and add-apps with a freshly parsed record
    SetCurationMeta {
        key: String,
        parsed: ParsedMeta,
    },
    EditAddAppMeta {
        curation_key: String,
        key: String,
        field: AddAppField,
        value: String,
    },
    NewAddApp {
        key: String,
        kind: AddAppKind,
    },
    RemoveAddApp {
        curation_key: String,
        key: String,
    },
    ChangeCurationLock {
        key: String,
        locked: bool,
    },
    ChangeCurationLockAll {
        locked: bool,
    },
    SetCurationContent {
        key: String,
        content: Vec<ContentEntry>,
    },
    SetCurationLogo {
        key: String,
        image: ImageRecord,
    },
    SetCurationScreenshot {
        key: String,
        image: ImageRecord,
    },
    AddUnusedDir {
        key: String,
        dir: String,
    },
    RemoveUnusedDir {
        key: String,
        dir: String,
    },
    /// Order by title A-Z, untitled last
    SortCurations,
}

impl CurationAction {
    pub fn edit_meta(key: impl Into<String>, field: MetaField, value: impl Into<String>) -> Self {
        CurationAction::EditCurationMeta {
            key: key.into(),
            property: field.key().to_string(),
            value: value.into(),
        }
    }

    pub fn set_image(key: impl Into<String>, kind: ImageKind, image: ImageRecord) -> Self {
        let key = key.into();
        match kind {
            ImageKind::Logo => CurationAction::SetCurationLogo { key, image },
            ImageKind::Screenshot => CurationAction::SetCurationScreenshot { key, image },
        }
    }

    /// Curation key the action targets (`None` for whole-set actions)
    pub fn target_key(&self) -> Option<&str> {
        match self {
            CurationAction::AddCuration(curation) => Some(&curation.key),
            CurationAction::RemoveCuration { key }
            | CurationAction::EditCurationMeta { key, .. }
            | CurationAction::SetCurationMeta { key, .. }
            | CurationAction::NewAddApp { key, .. }
            | CurationAction::ChangeCurationLock { key, .. }
            | CurationAction::SetCurationContent { key, .. }
            | CurationAction::SetCurationLogo { key, .. }
            | CurationAction::SetCurationScreenshot { key, .. }
            | CurationAction::AddUnusedDir { key, .. }
            | CurationAction::RemoveUnusedDir { key, .. } => Some(key),
            CurationAction::EditAddAppMeta { curation_key, .. }
            | CurationAction::RemoveAddApp { curation_key, .. } => Some(curation_key),
            CurationAction::ChangeCurationLockAll { .. } | CurationAction::SortCurations => None,
        }
    }

    /// Action name, for logging
    pub fn name(&self) -> &'static str {
        match self {
            CurationAction::AddCuration(_) => "add-curation",
            CurationAction::RemoveCuration { .. } => "remove-curation",
            CurationAction::EditCurationMeta { .. } => "edit-curation-meta",
            CurationAction::SetCurationMeta { .. } => "set-curation-meta",
            CurationAction::EditAddAppMeta { .. } => "edit-addapp-meta",
            CurationAction::NewAddApp { .. } => "new-addapp",
            CurationAction::RemoveAddApp { .. } => "remove-addapp",
            CurationAction::ChangeCurationLock { .. } => "change-curation-lock",
            CurationAction::ChangeCurationLockAll { .. } => "change-curation-lock-all",
            CurationAction::SetCurationContent { .. } => "set-curation-content",
            CurationAction::SetCurationLogo { .. } => "set-curation-logo",
            CurationAction::SetCurationScreenshot { .. } => "set-curation-screenshot",
            CurationAction::AddUnusedDir { .. } => "add-unused-dir",
            CurationAction::RemoveUnusedDir { .. } => "remove-unused-dir",
            CurationAction::SortCurations => "sort-curations",
        }
    }
}
