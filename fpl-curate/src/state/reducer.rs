//! Pure curation state transitions
//!
//! `reduce` never mutates its input. A transition that changes one curation
//! allocates a new curation list and a new record for that curation only;
//! every other record, and every nested part that did not change, is the
//! same `Arc` as before. A transition that changes nothing returns a state
//! whose list is the same `Arc` as the input's.

use super::actions::CurationAction;
use crate::meta::ParsedMeta;
use crate::models::{AddApp, AddAppKind, AddAppMeta, Curation, ImageRecord};
use std::cmp::Ordering;
use std::sync::Arc;

/// Working set of in-flight curations
#[derive(Debug, Clone, Default)]
pub struct CurationsState {
    pub curations: Arc<Vec<Arc<Curation>>>,
}

impl CurationsState {
    pub fn new(curations: Vec<Curation>) -> Self {
        Self {
            curations: Arc::new(curations.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Arc<Curation>> {
        self.curations.iter().find(|c| c.key == key)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.curations.iter().position(|c| c.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index_of(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.curations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Curation>> {
        self.curations.iter()
    }

    pub fn keys(&self) -> Vec<String> {
        self.curations.iter().map(|c| c.key.clone()).collect()
    }

    /// True when `other` holds the very same curation list
    pub fn same_as(&self, other: &CurationsState) -> bool {
        Arc::ptr_eq(&self.curations, &other.curations)
    }
}

/// Apply `action` to `state`
pub fn reduce(state: &CurationsState, action: CurationAction) -> CurationsState {
    match action {
        CurationAction::AddCuration(curation) => {
            if state.contains(&curation.key) {
                return state.clone();
            }
            let mut next = (*state.curations).clone();
            next.push(Arc::new(curation));
            CurationsState {
                curations: Arc::new(next),
            }
        }

        CurationAction::RemoveCuration { key } => match state.index_of(&key) {
            Some(index) => {
                let mut next = (*state.curations).clone();
                next.remove(index);
                CurationsState {
                    curations: Arc::new(next),
                }
            }
            None => state.clone(),
        },

        CurationAction::EditCurationMeta {
            key,
            property,
            value,
        } => update_unlocked(state, &key, |c| {
            if c.meta.get(&property).unwrap_or_default() == value {
                return None;
            }
            let mut meta = (*c.meta).clone();
            meta.set(property, value);
            Some(Curation {
                meta: Arc::new(meta),
                ..c.clone()
            })
        }),

        CurationAction::SetCurationMeta { key, parsed } => {
            update_unlocked(state, &key, |c| set_meta(c, parsed))
        }

        CurationAction::EditAddAppMeta {
            curation_key,
            key,
            field,
            value,
        } => update_unlocked(state, &curation_key, |c| {
            let index = c.add_apps.iter().position(|a| a.key == key)?;
            let current = &c.add_apps[index];
            if current.meta.get(field) == value {
                return None;
            }
            let mut meta = current.meta.clone();
            meta.set(field, value);
            let mut add_apps = (*c.add_apps).clone();
            add_apps[index] = Arc::new(AddApp {
                key: current.key.clone(),
                meta,
            });
            Some(Curation {
                add_apps: Arc::new(add_apps),
                ..c.clone()
            })
        }),

        CurationAction::NewAddApp { key, kind } => update_unlocked(state, &key, |c| {
            let meta = match kind {
                AddAppKind::Extras => AddAppMeta::extras(""),
                AddAppKind::Message => AddAppMeta::message(""),
                AddAppKind::Normal => AddAppMeta::default(),
            };
            let mut add_apps = (*c.add_apps).clone();
            add_apps.push(Arc::new(AddApp::new(meta)));
            Some(Curation {
                add_apps: Arc::new(add_apps),
                ..c.clone()
            })
        }),

        CurationAction::RemoveAddApp { curation_key, key } => {
            update_unlocked(state, &curation_key, |c| {
                let index = c.add_apps.iter().position(|a| a.key == key)?;
                let mut add_apps = (*c.add_apps).clone();
                add_apps.remove(index);
                Some(Curation {
                    add_apps: Arc::new(add_apps),
                    ..c.clone()
                })
            })
        }

        CurationAction::ChangeCurationLock { key, locked } => update_any(state, &key, |c| {
            if c.locked == locked {
                return None;
            }
            Some(Curation {
                locked,
                ..c.clone()
            })
        }),

        CurationAction::ChangeCurationLockAll { locked } => {
            if state.curations.iter().all(|c| c.locked == locked) {
                return state.clone();
            }
            let next = state
                .curations
                .iter()
                .map(|c| {
                    if c.locked == locked {
                        Arc::clone(c)
                    } else {
                        Arc::new(Curation {
                            locked,
                            ..(**c).clone()
                        })
                    }
                })
                .collect();
            CurationsState {
                curations: Arc::new(next),
            }
        }

        CurationAction::SetCurationContent { key, content } => update_unlocked(state, &key, |c| {
            Some(Curation {
                content: Arc::new(content),
                ..c.clone()
            })
        }),

        CurationAction::SetCurationLogo { key, image } => update_unlocked(state, &key, |c| {
            Some(Curation {
                thumbnail: next_image(&c.thumbnail, image),
                ..c.clone()
            })
        }),

        CurationAction::SetCurationScreenshot { key, image } => {
            update_unlocked(state, &key, |c| {
                Some(Curation {
                    screenshot: next_image(&c.screenshot, image),
                    ..c.clone()
                })
            })
        }

        CurationAction::AddUnusedDir { key, dir } => update_unlocked(state, &key, |c| {
            if c.unused_dirs.contains(&dir) {
                return None;
            }
            let mut dirs = (*c.unused_dirs).clone();
            dirs.push(dir);
            Some(Curation {
                unused_dirs: Arc::new(dirs),
                ..c.clone()
            })
        }),

        CurationAction::RemoveUnusedDir { key, dir } => update_unlocked(state, &key, |c| {
            let index = c.unused_dirs.iter().position(|d| *d == dir)?;
            let mut dirs = (*c.unused_dirs).clone();
            dirs.remove(index);
            Some(Curation {
                unused_dirs: Arc::new(dirs),
                ..c.clone()
            })
        }),

        CurationAction::SortCurations => {
            let mut sorted = (*state.curations).clone();
            sorted.sort_by(|a, b| compare_titles(a, b));
            let unchanged = sorted
                .iter()
                .zip(state.curations.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b));
            if unchanged {
                state.clone()
            } else {
                CurationsState {
                    curations: Arc::new(sorted),
                }
            }
        }
    }
}

/// Replace the curation at `key` with `f`'s result, unless it is locked
fn update_unlocked<F>(state: &CurationsState, key: &str, f: F) -> CurationsState
where
    F: FnOnce(&Curation) -> Option<Curation>,
{
    match state.index_of(key) {
        Some(index) if !state.curations[index].locked => {
            let next = f(&state.curations[index]);
            replace_at(state, index, next)
        }
        _ => state.clone(),
    }
}

/// Replace the curation at `key` with `f`'s result, even if locked
fn update_any<F>(state: &CurationsState, key: &str, f: F) -> CurationsState
where
    F: FnOnce(&Curation) -> Option<Curation>,
{
    match state.index_of(key) {
        Some(index) => {
            let next = f(&state.curations[index]);
            replace_at(state, index, next)
        }
        None => state.clone(),
    }
}

fn replace_at(state: &CurationsState, index: usize, next: Option<Curation>) -> CurationsState {
    match next {
        Some(curation) => {
            let mut curations = (*state.curations).clone();
            curations[index] = Arc::new(curation);
            CurationsState {
                curations: Arc::new(curations),
            }
        }
        None => state.clone(),
    }
}

/// Incoming image with a version strictly above the one it replaces
fn next_image(previous: &ImageRecord, incoming: ImageRecord) -> ImageRecord {
    let version = incoming.version.max(previous.version + 1);
    ImageRecord { version, ..incoming }
}

fn set_meta(c: &Curation, parsed: ParsedMeta) -> Option<Curation> {
    let meta_changed = *c.meta != parsed.meta;
    let add_apps = merge_add_apps(&c.add_apps, parsed.add_apps);
    if !meta_changed && add_apps.is_none() {
        return None;
    }

    let mut next = c.clone();
    if meta_changed {
        next.meta = Arc::new(parsed.meta);
    }
    if let Some(add_apps) = add_apps {
        next.add_apps = add_apps;
    }
    Some(next)
}

/// New add-app list for `incoming`, or `None` when nothing differs
///
/// Keys are kept by position so an edited add-app stays the same add-app.
fn merge_add_apps(
    previous: &Arc<Vec<Arc<AddApp>>>,
    incoming: Vec<AddAppMeta>,
) -> Option<Arc<Vec<Arc<AddApp>>>> {
    let unchanged = previous.len() == incoming.len()
        && previous.iter().zip(&incoming).all(|(p, m)| p.meta == *m);
    if unchanged {
        return None;
    }

    let merged = incoming
        .into_iter()
        .enumerate()
        .map(|(i, meta)| match previous.get(i) {
            Some(prev) if prev.meta == meta => Arc::clone(prev),
            Some(prev) => Arc::new(AddApp {
                key: prev.key.clone(),
                meta,
            }),
            None => Arc::new(AddApp::new(meta)),
        })
        .collect();
    Some(Arc::new(merged))
}

fn compare_titles(a: &Curation, b: &Curation) -> Ordering {
    match (a.meta.title(), b.meta.title()) {
        (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
