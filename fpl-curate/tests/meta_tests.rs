//! Meta file parsing and writing

mod helpers;

use fpl_curate::meta::defaults::apply_defaults;
use fpl_curate::meta::structured::{parse_structured_meta, serialize_structured_meta};
use fpl_curate::meta::{parse_meta, CurationMeta, MetaField, MetaFormat};
use fpl_curate::models::AddAppMeta;
use helpers::test_defaults;

#[test]
fn test_legacy_title_and_launch_command() {
    let parsed = parse_meta(MetaFormat::Legacy, b"Title: Foo\nLaunch Command: foo.exe\n").unwrap();

    assert_eq!(parsed.meta.title(), Some("Foo"));
    assert_eq!(parsed.meta.field(MetaField::LaunchCommand), Some("foo.exe"));
    assert_eq!(parsed.meta.len(), 2);
    assert!(parsed.add_apps.is_empty());
}

#[test]
fn test_legacy_first_occurrence_wins() {
    let parsed = parse_meta(MetaFormat::Legacy, b"Title: First\nTitle: Second\n").unwrap();
    assert_eq!(parsed.meta.title(), Some("First"));
}

#[test]
fn test_legacy_unknown_fields_and_bad_lines_skipped() {
    let text = b"no colon here\nFavourite Colour: blue\nDeveloper: Someone\n";
    let parsed = parse_meta(MetaFormat::Legacy, text).unwrap();

    assert_eq!(parsed.meta.field(MetaField::Developer), Some("Someone"));
    assert_eq!(parsed.meta.len(), 1);
}

#[test]
fn test_legacy_genre_maps_to_tags() {
    let parsed = parse_meta(MetaFormat::Legacy, b"Genre: Action; Puzzle\n").unwrap();
    assert_eq!(parsed.meta.field(MetaField::Tags), Some("Action; Puzzle"));
}

#[test]
fn test_byte_order_mark_dropped() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"Title: Marked\n");

    let parsed = parse_meta(MetaFormat::Legacy, &bytes).unwrap();
    assert_eq!(parsed.meta.title(), Some("Marked"));
}

#[test]
fn test_invalid_utf8_is_an_error() {
    assert!(parse_meta(MetaFormat::Legacy, &[0xFF, 0xFE, 0x00]).is_err());
}

#[test]
fn test_structured_lists_joined() {
    let text = "Title: Bar\nTags:\n  - Action\n  - Puzzle\nLanguages: en\n";
    let parsed = parse_structured_meta(text).unwrap();

    assert_eq!(parsed.meta.title(), Some("Bar"));
    assert_eq!(parsed.meta.field(MetaField::Tags), Some("Action; Puzzle"));
    assert_eq!(parsed.meta.field(MetaField::Language), Some("en"));
}

#[test]
fn test_structured_keys_case_insensitive() {
    let parsed = parse_structured_meta("title: lower\nLAUNCH COMMAND: http://x/y.swf\n").unwrap();

    assert_eq!(parsed.meta.title(), Some("lower"));
    assert_eq!(
        parsed.meta.field(MetaField::LaunchCommand),
        Some("http://x/y.swf")
    );
}

#[test]
fn test_structured_empty_document() {
    let parsed = parse_structured_meta("").unwrap();
    assert!(parsed.meta.is_empty());
    assert!(parsed.add_apps.is_empty());
}

#[test]
fn test_structured_non_mapping_rejected() {
    assert!(parse_structured_meta("- just\n- a list\n").is_err());
}

#[test]
fn test_structured_round_trip_with_add_apps() {
    let meta: CurationMeta = [
        (MetaField::Title.key(), "Round Trip"),
        (MetaField::Platform.key(), "Flash"),
        (MetaField::LaunchCommand.key(), "http://example.com/game.swf"),
    ]
    .into_iter()
    .collect();
    let add_apps = vec![AddAppMeta::extras("Bonus"), AddAppMeta::message("Read me")];

    let document = serialize_structured_meta(&meta, &add_apps).unwrap();
    let parsed = parse_structured_meta(&document).unwrap();

    assert_eq!(parsed.meta, meta);
    assert_eq!(parsed.add_apps.len(), 2);
    assert!(parsed.add_apps.iter().any(|a| a.is_extras()));
    assert!(parsed.add_apps.iter().any(|a| a.is_message()));
}

#[test]
fn test_serialize_omits_empty_fields() {
    let mut meta = CurationMeta::new();
    meta.set_field(MetaField::Title, "Only Title");
    meta.set_field(MetaField::Developer, "");

    let document = serialize_structured_meta(&meta, &[]).unwrap();
    assert!(document.contains("Title"));
    assert!(!document.contains("Developer"));
}

#[test]
fn test_defaults_fill_absent_fields_only() {
    let mut meta = CurationMeta::new();
    meta.set_field(MetaField::Platform, "Shockwave");
    meta.set_field(MetaField::Status, "Partial");

    apply_defaults(&mut meta, &test_defaults());

    assert_eq!(meta.field(MetaField::Platform), Some("Shockwave"));
    assert_eq!(meta.field(MetaField::Status), Some("Partial"));
    assert_eq!(meta.field(MetaField::Language), Some("en"));
    assert_eq!(meta.field(MetaField::Library), Some("arcade"));
    // No application path is known for Shockwave
    assert_eq!(meta.field(MetaField::ApplicationPath), None);
}

#[test]
fn test_defaults_application_path_follows_defaulted_platform() {
    let mut meta = CurationMeta::new();
    apply_defaults(&mut meta, &test_defaults());

    assert_eq!(meta.field(MetaField::Platform), Some("Flash"));
    assert_eq!(
        meta.field(MetaField::ApplicationPath),
        Some("FPSoftware\\Flash\\flashplayer.exe")
    );
}
