//! Default meta values
//!
//! Applied after parsing: any field that is absent is filled in. The
//! application path default is looked up by the platform *after* the
//! platform itself has been defaulted.

use super::{CurationMeta, MetaField};
use fpl_common::config::MetaDefaultsConfig;
use std::collections::{BTreeMap, HashMap};

/// Defaults injected into freshly parsed meta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaDefaults {
    pub language: String,
    pub play_mode: String,
    pub status: String,
    pub platform: String,
    pub library: String,
    /// Platform → application path
    pub application_paths: BTreeMap<String, String>,
}

impl From<&MetaDefaultsConfig> for MetaDefaults {
    fn from(config: &MetaDefaultsConfig) -> Self {
        Self {
            language: config.language.clone(),
            play_mode: config.play_mode.clone(),
            status: config.status.clone(),
            platform: config.platform.clone(),
            library: config.library.clone(),
            application_paths: config.application_paths.clone(),
        }
    }
}

impl MetaDefaults {
    /// Merge a platform → application path table under the configured one
    ///
    /// Entries already configured win.
    pub fn with_fallback_paths(mut self, paths: BTreeMap<String, String>) -> Self {
        for (platform, path) in paths {
            self.application_paths.entry(platform).or_insert(path);
        }
        self
    }
}

/// Fill every absent field of `meta` from `defaults`
pub fn apply_defaults(meta: &mut CurationMeta, defaults: &MetaDefaults) {
    let simple = [
        (MetaField::Language, &defaults.language),
        (MetaField::PlayMode, &defaults.play_mode),
        (MetaField::Status, &defaults.status),
        (MetaField::Platform, &defaults.platform),
        (MetaField::Library, &defaults.library),
    ];
    for (field, value) in simple {
        if !meta.has_field(field) {
            meta.set_field(field, value.as_str());
        }
    }

    if !meta.has_field(MetaField::ApplicationPath) {
        let path = meta
            .field(MetaField::Platform)
            .and_then(|platform| defaults.application_paths.get(platform))
            .cloned();
        if let Some(path) = path {
            meta.set_field(MetaField::ApplicationPath, path);
        }
    }
}

/// Find the most used application path for each platform
///
/// Input is `(platform, application_path)` pairs from existing entries.
/// Ties resolve to the path seen first.
pub fn most_used_application_paths<'a, I>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    // platform → (path → (count, first seen))
    let mut counts: HashMap<&str, HashMap<&str, (usize, usize)>> = HashMap::new();
    for (order, (platform, path)) in entries.into_iter().enumerate() {
        let entry = counts
            .entry(platform)
            .or_default()
            .entry(path)
            .or_insert((0, order));
        entry.0 += 1;
    }

    counts
        .into_iter()
        .filter_map(|(platform, paths)| {
            paths
                .into_iter()
                .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
                .map(|(path, _)| (platform.to_string(), path.to_string()))
        })
        .collect()
}
