//! Hierarchical view of a content manifest

use crate::models::ContentEntry;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// One node of a content tree
///
/// `count` is the number of descendants (children, grandchildren, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentTreeNode {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub count: usize,
    pub children: Vec<ContentTreeNode>,
}

impl ContentTreeNode {
    fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Directory,
            size: 0,
            count: 0,
            children: Vec::new(),
        }
    }

    /// Build the tree rooted at `content` from a flat manifest
    ///
    /// Intermediate folders missing from the manifest are created.
    pub fn from_entries(entries: &[ContentEntry]) -> Self {
        let mut root = Self::directory("content");
        for entry in entries {
            let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                continue;
            }
            root.insert(&segments, entry.is_directory(), entry.size);
        }
        root.recount();
        root
    }

    /// Build the tree for the content folder at `content_root`
    pub async fn from_folder(content_root: &Path) -> Self {
        let entries = super::content_indexer::index_content_folder(content_root).await;
        Self::from_entries(&entries)
    }

    fn insert(&mut self, segments: &[&str], is_directory: bool, size: u64) {
        let (name, rest) = match segments.split_first() {
            Some(split) => split,
            None => return,
        };

        let index = match self.children.iter().position(|c| c.name == *name) {
            Some(index) => index,
            None => {
                let node = if rest.is_empty() && !is_directory {
                    Self {
                        name: name.to_string(),
                        kind: NodeKind::File,
                        size,
                        count: 0,
                        children: Vec::new(),
                    }
                } else {
                    Self::directory(name)
                };
                self.children.push(node);
                self.children.len() - 1
            }
        };

        if !rest.is_empty() {
            self.children[index].insert(rest, is_directory, size);
        }
    }

    fn recount(&mut self) -> usize {
        let mut count = self.children.len();
        for child in &mut self.children {
            count += child.recount();
        }
        self.count = count;
        count
    }

    /// Total size of all files under this node
    pub fn total_size(&self) -> u64 {
        match self.kind {
            NodeKind::File => self.size,
            NodeKind::Directory => self.children.iter().map(|c| c.total_size()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_counts_descendants() {
        let tree = ContentTreeNode::from_entries(&[
            ContentEntry::new("a.txt", 10),
            ContentEntry::new("b/", 0),
            ContentEntry::new("b/c/", 0),
            ContentEntry::new("b/c/d.swf", 3),
        ]);

        assert_eq!(tree.name, "content");
        assert_eq!(tree.count, 4);
        assert_eq!(tree.children.len(), 2);

        let b = &tree.children[1];
        assert_eq!(b.kind, NodeKind::Directory);
        assert_eq!(b.count, 2);
        assert_eq!(tree.total_size(), 13);
    }

    #[test]
    fn test_missing_parent_folders_are_created() {
        let tree = ContentTreeNode::from_entries(&[ContentEntry::new("x/y/z.bin", 5)]);
        assert_eq!(tree.count, 3);
        assert_eq!(tree.children[0].children[0].children[0].kind, NodeKind::File);
    }
}
