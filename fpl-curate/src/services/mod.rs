//! Service modules for the curation pipeline
//!
//! Leaves first:
//! - Content indexing (folders and archive entry listings) and content trees
//! - Archive extraction and export
//! - Curation folder loading
//! - Collision detection against the install root
//! - Warning generation and the import/export pipeline
//! - Folder-based content store used by the CLI

pub mod archive;
pub mod collision_detector;
pub mod content_indexer;
pub mod content_tree;
pub mod import_pipeline;
pub mod install_importer;
pub mod loader;
pub mod warnings;

pub use archive::{ArchiveError, ArchiveTool, ExtractedCuration, ZipArchiveTool};
pub use collision_detector::{
    CollisionCheck, CollisionDetector, CollisionOutcome, ContentCollision, InstallRootResolver,
    JoinedInstallRoot,
};
pub use content_indexer::{
    index_archive_listing, index_content_folder, ArchiveIndexer, CurationIndex, EntryRoute,
    CONTENT_FOLDER, EXTRAS_FOLDER,
};
pub use content_tree::{ContentTreeNode, NodeKind};
pub use import_pipeline::{
    CurationImporter, ImportOptions, ImportOutcome, ImportPipeline, ImportRejection,
    ImportRequest, SkipReason,
};
pub use install_importer::InstallFolderImporter;
pub use loader::{find_meta_file, unused_dirs, CurationLoader, MetaFile};
pub use warnings::{CurationWarnings, LaunchCommandProblem, WarningContext, WrittenWarning};
