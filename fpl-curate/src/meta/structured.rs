//! Structured `meta.yaml` parser and writer
//!
//! Keys are display names (`Title`, `Launch Command`, ...) matched
//! case-insensitively on read. List values are joined with `"; "`. Add-apps
//! live under `Additional Applications`, keyed by label.

use super::{CurationMeta, MetaField, MetaParseError, ParsedMeta};
use crate::models::AddAppMeta;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

/// Key holding the add-app mapping
pub const ADD_APPS_KEY: &str = "Additional Applications";

/// Display names in write order
const DISPLAY_FIELDS: &[(&str, MetaField)] = &[
    ("Title", MetaField::Title),
    ("Alternate Titles", MetaField::AlternateTitles),
    ("Library", MetaField::Library),
    ("Series", MetaField::Series),
    ("Developer", MetaField::Developer),
    ("Publisher", MetaField::Publisher),
    ("Play Mode", MetaField::PlayMode),
    ("Release Date", MetaField::ReleaseDate),
    ("Version", MetaField::Version),
    ("Languages", MetaField::Language),
    ("Extreme", MetaField::Extreme),
    ("Tags", MetaField::Tags),
    ("Tag Categories", MetaField::TagCategories),
    ("Source", MetaField::Source),
    ("Platform", MetaField::Platform),
    ("Status", MetaField::Status),
    ("Application Path", MetaField::ApplicationPath),
    ("Launch Command", MetaField::LaunchCommand),
    ("Mount Parameters", MetaField::MountParameters),
    ("Game Notes", MetaField::Notes),
    ("Original Description", MetaField::OriginalDescription),
    ("Curation Notes", MetaField::CurationNotes),
];

/// Lower-cased keys accepted on read, lowest priority first
///
/// A later key overwrites an earlier one mapping to the same field.
const READ_KEYS: &[(&str, MetaField)] = &[
    ("author notes", MetaField::CurationNotes),
    ("notes", MetaField::Notes),
    ("genre", MetaField::Tags),
    ("genres", MetaField::Tags),
];

/// Aliases that outrank their display name
const OVERRIDE_KEYS: &[(&str, MetaField)] = &[("animation notes", MetaField::Notes)];

const EXTRAS_LABEL: &str = "Extras";
const MESSAGE_LABEL: &str = "Message";

/// Parse a structured meta document
///
/// An empty document yields an empty record.
pub fn parse_structured_meta(text: &str) -> Result<ParsedMeta, MetaParseError> {
    let root: Value = serde_yaml::from_str(text)?;
    let mapping = match root {
        Value::Null => return Ok(ParsedMeta::default()),
        Value::Mapping(m) => m,
        _ => return Err(MetaParseError::NotAMapping),
    };

    // Treat field names case-insensitively, dropping empty values
    let mut lower: HashMap<String, &Value> = HashMap::new();
    for (key, value) in &mapping {
        if let Some(key) = key.as_str() {
            lower.insert(key.to_lowercase(), value);
        }
    }

    let mut meta = CurationMeta::new();
    let display = DISPLAY_FIELDS
        .iter()
        .map(|(name, field)| (name.to_lowercase(), *field));
    let ordered: Vec<(String, MetaField)> = READ_KEYS
        .iter()
        .map(|(k, f)| (k.to_string(), *f))
        .chain(display)
        .chain(OVERRIDE_KEYS.iter().map(|(k, f)| (k.to_string(), *f)))
        .collect();

    for (key, field) in ordered {
        let Some(value) = lower.get(&key) else {
            continue;
        };
        let text = value_to_string(field, value)?;
        if text.is_empty() {
            continue;
        }
        let text = if field == MetaField::Library {
            text.to_lowercase()
        } else {
            text
        };
        meta.set_field(field, text);
    }

    let add_apps = match lower.get(&ADD_APPS_KEY.to_lowercase()) {
        Some(Value::Mapping(apps)) => parse_add_apps(apps)?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(MetaParseError::InvalidValue {
                field: ADD_APPS_KEY.to_string(),
                reason: "expected a mapping".to_string(),
            })
        }
    };

    Ok(ParsedMeta { meta, add_apps })
}

fn parse_add_apps(apps: &Mapping) -> Result<Vec<AddAppMeta>, MetaParseError> {
    let mut parsed = Vec::with_capacity(apps.len());
    for (label, value) in apps {
        let label = scalar_to_string(label).unwrap_or_default();
        let special = match value {
            Value::Mapping(_) => None,
            _ => special_label(&label),
        };
        let add_app = match special {
            Some(EXTRAS_LABEL) => AddAppMeta::extras(scalar_to_string(value).unwrap_or_default()),
            Some(_) => AddAppMeta::message(scalar_to_string(value).unwrap_or_default()),
            None => {
                let mut add_app = AddAppMeta {
                    heading: label.clone(),
                    ..AddAppMeta::default()
                };
                if let Value::Mapping(props) = value {
                    for (key, prop) in props {
                        let key = key.as_str().unwrap_or_default().to_lowercase();
                        let prop = scalar_to_string(prop).unwrap_or_default();
                        match key.as_str() {
                            "heading" => add_app.heading = prop,
                            "application path" => add_app.application_path = prop,
                            "launch command" => add_app.launch_command = prop,
                            _ => {}
                        }
                    }
                }
                add_app
            }
        };
        parsed.push(add_app);
    }
    Ok(parsed)
}

/// `Extras` or `Message`, optionally with a ` (N)` suffix
fn special_label(label: &str) -> Option<&'static str> {
    let base = label
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once(" ("))
        .filter(|(_, n)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .map_or(label, |(base, _)| base);
    if base.eq_ignore_ascii_case(EXTRAS_LABEL) {
        Some(EXTRAS_LABEL)
    } else if base.eq_ignore_ascii_case(MESSAGE_LABEL) {
        Some(MESSAGE_LABEL)
    } else {
        None
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(t) => scalar_to_string(&t.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn value_to_string(field: MetaField, value: &Value) -> Result<String, MetaParseError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) if field == MetaField::Extreme => {
            Ok(if *b { "Yes" } else { "No" }.to_string())
        }
        Value::Sequence(items) => Ok(items
            .iter()
            .filter_map(scalar_to_string)
            .collect::<Vec<_>>()
            .join("; ")),
        Value::Mapping(_) => Err(MetaParseError::InvalidValue {
            field: field.key().to_string(),
            reason: "expected a string or list".to_string(),
        }),
        other => Ok(scalar_to_string(other).unwrap_or_default()),
    }
}

/// Serialize a record to a structured meta document
///
/// Empty fields are omitted. Normal add-apps are keyed by heading, extras
/// and message add-apps by `Extras` / `Message`; repeated labels get a
/// ` (2)`, ` (3)`, ... suffix.
pub fn serialize_structured_meta(
    meta: &CurationMeta,
    add_apps: &[AddAppMeta],
) -> Result<String, MetaParseError> {
    let mut root = Mapping::new();
    for (display, field) in DISPLAY_FIELDS {
        if let Some(value) = meta.field(*field) {
            root.insert(Value::from(*display), Value::from(value));
        }
    }

    if !add_apps.is_empty() {
        root.insert(Value::from(ADD_APPS_KEY), Value::Mapping(add_apps_mapping(add_apps)));
    }

    Ok(serde_yaml::to_string(&Value::Mapping(root))?)
}

fn add_apps_mapping(add_apps: &[AddAppMeta]) -> Mapping {
    let mut apps = Mapping::new();
    for add_app in add_apps {
        if add_app.is_extras() || add_app.is_message() {
            let base = if add_app.is_extras() { EXTRAS_LABEL } else { MESSAGE_LABEL };
            let label = free_label(&apps, base);
            apps.insert(Value::from(label), Value::from(add_app.launch_command.as_str()));
            continue;
        }

        let base = if add_app.heading.is_empty() {
            "Additional Application"
        } else {
            add_app.heading.as_str()
        };
        let label = free_label(&apps, base);

        let mut props = Mapping::new();
        props.insert(Value::from("Heading"), Value::from(add_app.heading.as_str()));
        props.insert(
            Value::from("Application Path"),
            Value::from(add_app.application_path.as_str()),
        );
        props.insert(
            Value::from("Launch Command"),
            Value::from(add_app.launch_command.as_str()),
        );
        apps.insert(Value::from(label), Value::Mapping(props));
    }
    apps
}

/// `base`, or `base (2)`, `base (3)`, ... whichever is not taken yet
fn free_label(apps: &Mapping, base: &str) -> String {
    let mut label = base.to_string();
    let mut index = 2;
    while apps.contains_key(label.as_str()) {
        label = format!("{} ({})", base, index);
        index += 1;
    }
    label
}
