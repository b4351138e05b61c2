use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use proto::{
    DfsError,
    types::{ChunkRecord, DirEntry, EntryKind},
};
use serde::{Deserialize, Serialize};

/// Normalized namespace path. Empty components collapse, `.` and `..` are
/// rejected, the leading `/` is optional.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamespacePath {
    components: Vec<String>,
}

impl NamespacePath {
    pub fn parse(raw: &str) -> Result<Self, DfsError> {
        let mut components = Vec::new();
        for component in raw.split('/').filter(|c| !c.is_empty()) {
            if component == "." || component == ".." {
                return Err(DfsError::invalid_path(raw, "dot components are not allowed"));
            }
            components.push(component.to_owned());
        }
        Ok(NamespacePath { components })
    }
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }
    fn parent_depth(&self) -> usize {
        self.components.len().saturating_sub(1)
    }
    fn prefix(&self, depth: usize) -> String {
        format!("/{}", self.components[..=depth].join("/"))
    }
    fn file_in_the_way(&self, depth: usize) -> DfsError {
        DfsError::invalid_path(self.to_string(), format!("{} is a file", self.prefix(depth)))
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.components.join("/"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NamespaceEntry {
    Directory {
        children: BTreeMap<String, NamespaceEntry>,
    },
    File(FileEntry),
}

impl NamespaceEntry {
    fn empty_directory() -> Self {
        NamespaceEntry::Directory {
            children: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_id: String,
    /// Number of chunks the writer declared for the whole file.
    #[serde(default)]
    pub chunk_count: Option<u64>,
    /// Sorted by sequence index.
    #[serde(default)]
    pub chunks: Vec<ChunkRecord>,
}

impl FileEntry {
    pub fn new(file_id: String) -> Self {
        FileEntry {
            file_id,
            chunk_count: None,
            chunks: vec![],
        }
    }
    /// Inserts at the record's sequence index; an existing record for the same
    /// index is replaced.
    pub fn upsert(&mut self, record: ChunkRecord) {
        match self
            .chunks
            .binary_search_by_key(&record.sequence_index, |r| r.sequence_index)
        {
            Ok(position) => self.chunks[position] = record,
            Err(position) => self.chunks.insert(position, record),
        }
    }
}

/// The namespace tree. Serialized exactly like a directory entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "directory")]
pub struct Namespace {
    children: BTreeMap<String, NamespaceEntry>,
}

type Children = BTreeMap<String, NamespaceEntry>;

/// Directory reached after the first `depth` components; `None` if missing.
fn walk<'a>(
    mut dir: &'a Children,
    path: &NamespacePath,
    depth: usize,
) -> Result<Option<&'a Children>, DfsError> {
    for (index, name) in path.components[..depth].iter().enumerate() {
        match dir.get(name) {
            None => return Ok(None),
            Some(NamespaceEntry::Directory { children }) => dir = children,
            Some(NamespaceEntry::File(_)) => return Err(path.file_in_the_way(index)),
        }
    }
    Ok(Some(dir))
}

fn walk_mut<'a>(
    mut dir: &'a mut Children,
    path: &NamespacePath,
    depth: usize,
) -> Result<Option<&'a mut Children>, DfsError> {
    for (index, name) in path.components[..depth].iter().enumerate() {
        match dir.get_mut(name) {
            None => return Ok(None),
            Some(NamespaceEntry::Directory { children }) => dir = children,
            Some(NamespaceEntry::File(_)) => return Err(path.file_in_the_way(index)),
        }
    }
    Ok(Some(dir))
}

// creates the missing directories on the way
fn walk_creating<'a>(
    mut dir: &'a mut Children,
    path: &NamespacePath,
    depth: usize,
) -> Result<&'a mut Children, DfsError> {
    for (index, name) in path.components[..depth].iter().enumerate() {
        let entry = dir
            .entry(name.clone())
            .or_insert_with(NamespaceEntry::empty_directory);
        dir = match entry {
            NamespaceEntry::Directory { children } => children,
            NamespaceEntry::File(_) => return Err(path.file_in_the_way(index)),
        };
    }
    Ok(dir)
}

impl Namespace {
    /// `chunk_count` is the number of chunks the creator intends to write, if
    /// known; a download checks the records against it.
    pub fn create_file(
        &mut self,
        path: &NamespacePath,
        file_id: String,
        chunk_count: Option<u64>,
    ) -> Result<(), DfsError> {
        self.insert_file(
            path,
            FileEntry {
                chunk_count,
                ..FileEntry::new(file_id)
            },
        )
    }

    pub fn append_chunk(
        &mut self,
        path: &NamespacePath,
        record: ChunkRecord,
        chunk_count: Option<u64>,
        new_file_id: impl FnOnce() -> String,
    ) -> Result<(), DfsError> {
        let Some(name) = path.file_name() else {
            return Err(DfsError::invalid_path("/", "the root is a directory"));
        };
        let parent = walk_creating(&mut self.children, path, path.parent_depth())?;
        let entry = parent
            .entry(name.to_owned())
            .or_insert_with(|| NamespaceEntry::File(FileEntry::new(new_file_id())));
        match entry {
            NamespaceEntry::Directory { .. } => {
                Err(DfsError::invalid_path(path.to_string(), "is a directory"))
            }
            NamespaceEntry::File(file) => {
                file.upsert(record);
                if chunk_count.is_some() {
                    file.chunk_count = chunk_count;
                }
                Ok(())
            }
        }
    }

    pub fn file(&self, path: &NamespacePath) -> Result<&FileEntry, DfsError> {
        let Some(name) = path.file_name() else {
            return Err(DfsError::not_found("/"));
        };
        match walk(&self.children, path, path.parent_depth())?.and_then(|dir| dir.get(name)) {
            Some(NamespaceEntry::File(file)) => Ok(file),
            Some(NamespaceEntry::Directory { .. }) | None => {
                Err(DfsError::not_found(path.to_string()))
            }
        }
    }

    pub fn file_mut(&mut self, path: &NamespacePath) -> Result<&mut FileEntry, DfsError> {
        let Some(name) = path.file_name() else {
            return Err(DfsError::not_found("/"));
        };
        match walk_mut(&mut self.children, path, path.parent_depth())?
            .and_then(|dir| dir.get_mut(name))
        {
            Some(NamespaceEntry::File(file)) => Ok(file),
            Some(NamespaceEntry::Directory { .. }) | None => {
                Err(DfsError::not_found(path.to_string()))
            }
        }
    }

    pub fn remove_file(&mut self, path: &NamespacePath) -> Result<FileEntry, DfsError> {
        let not_found = || DfsError::not_found(path.to_string());
        let name = path.file_name().ok_or_else(not_found)?;
        let parent = walk_mut(&mut self.children, path, path.parent_depth())?.ok_or_else(not_found)?;
        match parent.remove(name) {
            Some(NamespaceEntry::File(file)) => Ok(file),
            Some(directory) => {
                parent.insert(name.to_owned(), directory);
                Err(not_found())
            }
            None => Err(not_found()),
        }
    }

    pub fn move_file(&mut self, src: &NamespacePath, dst: &NamespacePath) -> Result<(), DfsError> {
        self.file(src)?;
        self.ensure_absent(dst)?;
        let entry = self.remove_file(src)?;
        self.insert_file(dst, entry)
    }

    /// The copy shares chunk ids with the source under a fresh file id.
    pub fn copy_file(
        &mut self,
        src: &NamespacePath,
        dst: &NamespacePath,
        file_id: String,
    ) -> Result<(), DfsError> {
        let mut entry = self.file(src)?.clone();
        self.ensure_absent(dst)?;
        entry.file_id = file_id;
        self.insert_file(dst, entry)
    }

    /// Every file path, depth first with children in name order.
    pub fn list_all(&self) -> Vec<String> {
        let mut paths = vec![];
        self.visit_files(|path, _| paths.push(path.to_owned()));
        paths
    }

    pub fn list_directory(&self, path: &NamespacePath) -> Result<Vec<DirEntry>, DfsError> {
        let children = walk(&self.children, path, path.components.len())?
            .ok_or_else(|| DfsError::not_found(path.to_string()))?;
        Ok(children
            .iter()
            .map(|(name, entry)| DirEntry {
                name: name.clone(),
                kind: match entry {
                    NamespaceEntry::Directory { .. } => EntryKind::Directory,
                    NamespaceEntry::File(_) => EntryKind::File,
                },
            })
            .collect())
    }

    pub fn referenced_chunks(&self) -> HashSet<String> {
        let mut chunk_ids = HashSet::new();
        self.visit_files(|_, file| {
            chunk_ids.extend(file.chunks.iter().map(|record| record.chunk_id.clone()));
        });
        chunk_ids
    }

    pub fn visit_files(&self, mut visitor: impl FnMut(&str, &FileEntry)) {
        fn visit(prefix: &str, children: &Children, visitor: &mut dyn FnMut(&str, &FileEntry)) {
            for (name, entry) in children {
                let path = format!("{prefix}/{name}");
                match entry {
                    NamespaceEntry::Directory { children } => visit(&path, children, visitor),
                    NamespaceEntry::File(file) => visitor(&path, file),
                }
            }
        }
        visit("", &self.children, &mut visitor);
    }

    fn ensure_absent(&self, path: &NamespacePath) -> Result<(), DfsError> {
        let Some(name) = path.file_name() else {
            return Err(DfsError::already_exists("/"));
        };
        match walk(&self.children, path, path.parent_depth())? {
            Some(parent) if parent.contains_key(name) => {
                Err(DfsError::already_exists(path.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn insert_file(&mut self, path: &NamespacePath, entry: FileEntry) -> Result<(), DfsError> {
        let Some(name) = path.file_name() else {
            return Err(DfsError::already_exists("/"));
        };
        let parent = walk_creating(&mut self.children, path, path.parent_depth())?;
        if parent.contains_key(name) {
            return Err(DfsError::already_exists(path.to_string()));
        }
        parent.insert(name.to_owned(), NamespaceEntry::File(entry));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> NamespacePath {
        NamespacePath::parse(raw).unwrap()
    }

    fn record(chunk_id: &str, storage_node_id: u64, sequence_index: u64) -> ChunkRecord {
        ChunkRecord {
            chunk_id: chunk_id.to_owned(),
            storage_node_id,
            sequence_index,
            degraded: false,
        }
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(path("//b///a.txt").to_string(), "/b/a.txt");
        assert_eq!(path("b/a.txt").to_string(), "/b/a.txt");
        assert!(path("/").is_root());
        assert!(matches!(
            NamespacePath::parse("/b/../a.txt"),
            Err(DfsError::InvalidPath { .. })
        ));
        assert!(NamespacePath::parse("/./a.txt").is_err());
    }

    #[test]
    fn create_rejects_existing_files_and_directories() {
        let mut namespace = Namespace::default();
        namespace.create_file(&path("/b/a.txt"), "f1".into(), None).unwrap();
        assert_eq!(
            namespace.create_file(&path("/b/a.txt"), "f2".into(), None),
            Err(DfsError::already_exists("/b/a.txt"))
        );
        assert_eq!(
            namespace.create_file(&path("/b"), "f3".into(), None),
            Err(DfsError::already_exists("/b"))
        );
        assert!(matches!(
            namespace.create_file(&path("/b/a.txt/c"), "f4".into(), None),
            Err(DfsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn appends_keep_sequence_order_and_replace_retries() {
        let mut namespace = Namespace::default();
        let file = path("/a.txt");
        for (chunk_id, sequence_index) in [("a.txt_chunk_3", 2), ("a.txt_chunk_1", 0), ("a.txt_chunk_2", 1)] {
            namespace
                .append_chunk(&file, record(chunk_id, 1, sequence_index), Some(3), || "f1".into())
                .unwrap();
        }
        // a retried append for index 1 lands on another node
        namespace
            .append_chunk(&file, record("a.txt_chunk_2", 2, 1), Some(3), || "unused".into())
            .unwrap();

        let entry = namespace.file(&file).unwrap();
        assert_eq!(entry.file_id, "f1");
        assert_eq!(entry.chunk_count, Some(3));
        let order: Vec<_> = entry.chunks.iter().map(|r| (r.sequence_index, r.storage_node_id)).collect();
        assert_eq!(order, vec![(0, 1), (1, 2), (2, 1)]);
    }

    #[test]
    fn appending_to_a_directory_is_invalid() {
        let mut namespace = Namespace::default();
        namespace.create_file(&path("/b/a.txt"), "f1".into(), None).unwrap();
        let result = namespace.append_chunk(&path("/b"), record("b_chunk_1", 1, 0), None, || "f2".into());
        assert!(matches!(result, Err(DfsError::InvalidPath { .. })));
    }

    #[test]
    fn lists_files_depth_first_in_name_order() {
        let mut namespace = Namespace::default();
        for raw in ["/z.txt", "/b/a.txt", "/a.txt", "/b/c/d.txt"] {
            namespace.create_file(&path(raw), raw.into(), None).unwrap();
        }
        assert_eq!(
            namespace.list_all(),
            vec!["/a.txt", "/b/a.txt", "/b/c/d.txt", "/z.txt"]
        );
        let entries = namespace.list_directory(&path("/b")).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry { name: "a.txt".into(), kind: EntryKind::File },
                DirEntry { name: "c".into(), kind: EntryKind::Directory },
            ]
        );
        assert_eq!(namespace.list_directory(&path("/")).unwrap().len(), 3);
        assert!(matches!(
            namespace.list_directory(&path("/missing")),
            Err(DfsError::NotFound { .. })
        ));
        assert!(matches!(
            namespace.list_directory(&path("/a.txt")),
            Err(DfsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn move_keeps_records_and_checks_both_ends() {
        let mut namespace = Namespace::default();
        let src = path("/a.txt");
        namespace
            .append_chunk(&src, record("a.txt_chunk_1", 1, 0), Some(1), || "f1".into())
            .unwrap();
        namespace.create_file(&path("/taken.txt"), "f2".into(), None).unwrap();

        assert_eq!(
            namespace.move_file(&path("/missing.txt"), &path("/x.txt")),
            Err(DfsError::not_found("/missing.txt"))
        );
        assert_eq!(
            namespace.move_file(&src, &path("/taken.txt")),
            Err(DfsError::already_exists("/taken.txt"))
        );
        assert!(matches!(
            namespace.move_file(&src, &path("/a.txt/inner")),
            Err(DfsError::InvalidPath { .. })
        ));

        namespace.move_file(&src, &path("/b/a.txt")).unwrap();
        assert_eq!(namespace.file(&src), Err(DfsError::not_found("/a.txt")));
        let moved = namespace.file(&path("/b/a.txt")).unwrap();
        assert_eq!(moved.file_id, "f1");
        assert_eq!(moved.chunks[0].chunk_id, "a.txt_chunk_1");
    }

    #[test]
    fn copies_share_chunks_until_every_reference_is_gone() {
        let mut namespace = Namespace::default();
        let src = path("/a.txt");
        namespace
            .append_chunk(&src, record("a.txt_chunk_1", 1, 0), Some(1), || "f1".into())
            .unwrap();
        namespace.copy_file(&src, &path("/c.txt"), "f2".into()).unwrap();

        let copy = namespace.file(&path("/c.txt")).unwrap();
        assert_eq!(copy.file_id, "f2");
        assert_eq!(copy.chunks, namespace.file(&src).unwrap().chunks);

        namespace.remove_file(&src).unwrap();
        assert!(namespace.referenced_chunks().contains("a.txt_chunk_1"));
        namespace.remove_file(&path("/c.txt")).unwrap();
        assert!(namespace.referenced_chunks().is_empty());
    }

    #[test]
    fn removing_a_directory_is_not_found() {
        let mut namespace = Namespace::default();
        namespace.create_file(&path("/b/a.txt"), "f1".into(), None).unwrap();
        assert_eq!(namespace.remove_file(&path("/b")), Err(DfsError::not_found("/b")));
        assert!(namespace.file(&path("/b/a.txt")).is_ok());
    }

    #[test]
    fn serializes_as_a_tagged_tree() {
        let mut namespace = Namespace::default();
        namespace.create_file(&path("/b/a.txt"), "f1".into(), None).unwrap();
        let value = serde_json::to_value(&namespace).unwrap();
        assert_eq!(value["type"], "directory");
        assert_eq!(value["children"]["b"]["type"], "directory");
        assert_eq!(value["children"]["b"]["children"]["a.txt"]["type"], "file");
        assert_eq!(value["children"]["b"]["children"]["a.txt"]["file_id"], "f1");
        let back: Namespace = serde_json::from_value(value).unwrap();
        assert_eq!(back, namespace);
    }
}
