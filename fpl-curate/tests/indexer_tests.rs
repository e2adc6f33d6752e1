//! Archive and folder indexing

mod helpers;

use fpl_curate::meta::MetaFormat;
use fpl_curate::models::{ContentEntry, SourceType};
use fpl_curate::services::{
    index_archive_listing, index_content_folder, ArchiveTool, ContentTreeNode, CurationLoader,
    NodeKind, ZipArchiveTool,
};
use helpers::{test_defaults, write_zip, CurationFolder};
use tempfile::TempDir;

#[tokio::test]
async fn test_archive_index_diverts_meta() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("k.zip");
    write_zip(
        &archive,
        &[
            ("k/content/a.txt", &b"0123456789"[..]),
            ("k/meta.txt", &b"Title: X"[..]),
        ],
    );

    let index = ZipArchiveTool.index(&archive).await.unwrap();

    assert_eq!(index.content, vec![ContentEntry::new("a.txt", 10)]);
    assert_eq!(index.meta.unwrap().meta.title(), Some("X"));
    assert_eq!(index.meta_format, Some(MetaFormat::Legacy));
    assert!(index.errors.is_empty());
}

#[test]
fn test_listing_routes_images_and_ignores_strays() {
    let index = index_archive_listing([
        ("k/", &b""[..]),
        ("k/content/", &b""[..]),
        ("k/content/www.example.com/", &b""[..]),
        ("k/content/www.example.com/game.swf", &b"swf!"[..]),
        ("k/logo.png", &b"png"[..]),
        ("k/ss.png", &b"png2"[..]),
        ("k/notes/readme.txt", &b"hi"[..]),
        ("k/meta.yaml", &b"Title: Structured\n"[..]),
        ("k/meta.txt", &b"Title: Legacy\n"[..]),
    ]);

    assert_eq!(
        index.content,
        vec![
            ContentEntry::folder("www.example.com"),
            ContentEntry::new("www.example.com/game.swf", 4),
        ]
    );
    assert!(index.thumbnail.exists);
    assert_eq!(index.thumbnail.data(), Some(&b"png"[..]));
    assert_eq!(index.screenshot.data(), Some(&b"png2"[..]));
    assert_eq!(index.meta_format, Some(MetaFormat::Structured));
    assert_eq!(index.meta.unwrap().meta.title(), Some("Structured"));
}

#[test]
fn test_listing_reports_bad_meta_without_failing() {
    let index = index_archive_listing([
        ("k/content/a.txt", &b"a"[..]),
        ("k/meta.yaml", &b"Title: [unclosed"[..]),
    ]);

    assert_eq!(index.content.len(), 1);
    assert!(index.meta.is_none());
    assert_eq!(index.errors.len(), 1);
}

#[tokio::test]
async fn test_folder_index_sorted_with_folders() {
    let dir = TempDir::new().unwrap();
    let folder = CurationFolder::new(dir.path(), "k")
        .content("b.txt", "bb")
        .content("a/inner.txt", "i")
        .dir("content/empty");

    let content = index_content_folder(&folder.path().join("content")).await;

    assert_eq!(
        content,
        vec![
            ContentEntry::folder("a"),
            ContentEntry::new("a/inner.txt", 1),
            ContentEntry::new("b.txt", 2),
            ContentEntry::folder("empty"),
        ]
    );
    assert!(content[0].is_directory());
    assert!(!content[2].is_directory());
}

#[tokio::test]
async fn test_missing_content_folder_is_empty() {
    let dir = TempDir::new().unwrap();
    assert!(index_content_folder(&dir.path().join("nope")).await.is_empty());
}

#[test]
fn test_tree_counts_descendants() {
    let tree = ContentTreeNode::from_entries(&[
        ContentEntry::new("www.example.com/games/a.swf", 100),
        ContentEntry::new("www.example.com/games/b.swf", 50),
        ContentEntry::new("top.txt", 5),
    ]);

    assert_eq!(tree.kind, NodeKind::Directory);
    // www.example.com, games, a.swf, b.swf, top.txt
    assert_eq!(tree.count, 5);
    assert_eq!(tree.total_size(), 155);

    let host = tree.children.iter().find(|c| c.name == "www.example.com").unwrap();
    assert_eq!(host.count, 3);
    assert_eq!(host.children[0].children.len(), 2);
}

#[tokio::test]
async fn test_extracted_archive_loads_as_curation() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("game.zip");
    write_zip(
        &archive,
        &[
            ("Some Game/", &b""[..]),
            ("Some Game/content/www.example.com/game.swf", &b"swfdata"[..]),
            ("Some Game/meta.yaml", &b"Title: Some Game\n"[..]),
            ("Some Game/logo.png", &b"logo"[..]),
        ],
    );

    let loader = CurationLoader::new(dir.path().join("Working"), test_defaults());
    let curation = loader.load_archive(&ZipArchiveTool, &archive).await.unwrap();

    assert_eq!(curation.source_type, SourceType::Archive);
    assert_eq!(curation.source, archive);
    assert_eq!(curation.meta.title(), Some("Some Game"));
    assert!(curation.thumbnail.exists);
    assert!(!curation.screenshot.exists);
    assert!(curation
        .content
        .contains(&ContentEntry::new("www.example.com/game.swf", 7)));
    assert!(dir.path().join("Working").join(&curation.key).join("content").is_dir());
}

#[tokio::test]
async fn test_export_then_index() {
    let dir = TempDir::new().unwrap();
    let folder = CurationFolder::new(dir.path(), "k")
        .file("meta.yaml", "Title: Packed\n")
        .content("a.txt", "aaa");
    let destination = dir.path().join("out").join("k.zip");

    let written = ZipArchiveTool.compress(folder.path(), "k", &destination).await.unwrap();
    assert!(written >= 3);

    let index = ZipArchiveTool.index(&destination).await.unwrap();
    assert!(index.content.contains(&ContentEntry::new("a.txt", 3)));
    assert_eq!(index.meta.unwrap().meta.title(), Some("Packed"));
}
