use async_trait::async_trait;
use metaforged_common::text::normalize_name;
use metaforged_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Names of the entries directly below one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

/// Directory enumeration over a local or virtual filesystem.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn list(&self, path: &str) -> Result<Listing>;
}

/// The local filesystem, enumerated with `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn list(&self, path: &str) -> Result<Listing> {
        let mut listing = Listing::default();
        let mut entries = tokio::fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                listing.dirs.push(name);
            } else {
                listing.files.push(name);
            }
        }
        listing.dirs.sort();
        listing.files.sort();
        Ok(listing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Normalized name; files are indexed by their stem.
    pub name: String,
    pub path: String,
    /// 0 for direct children of the indexed folder.
    pub depth: u8,
    pub is_dir: bool,
}

/// Normalized name to path mapping for one folder, built by a single
/// listing pass down to a fixed depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderIndex {
    pub root: String,
    pub entries: Vec<FolderEntry>,
}

impl FolderIndex {
    /// List `root` and its subdirectories down to `max_depth` levels below,
    /// never deeper than [`MAX_DEPTH`](super::MAX_DEPTH).
    ///
    /// Failing to list `root` itself is an error; unreadable subdirectories
    /// are skipped.
    pub async fn build(fs: &dyn Filesystem, root: &str, max_depth: u8) -> Result<Self> {
        let max_depth = max_depth.min(super::MAX_DEPTH);
        let mut index = FolderIndex {
            root: root.to_string(),
            entries: Vec::new(),
        };
        let mut pending = vec![(root.to_string(), 0u8)];

        while let Some((dir, depth)) = pending.pop() {
            let listing = match fs.list(&dir).await {
                Ok(listing) => listing,
                Err(e) if depth == 0 => {
                    return Err(Error::unavailable(format!("cannot list {dir}: {e}")))
                }
                Err(e) => {
                    warn!(path = %dir, error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            for name in &listing.dirs {
                let path = join_dir(&dir, name);
                if depth < max_depth {
                    pending.push((path.clone(), depth + 1));
                }
                index.entries.push(FolderEntry {
                    name: normalize_name(name),
                    path,
                    depth,
                    is_dir: true,
                });
            }
            for name in &listing.files {
                index.entries.push(FolderEntry {
                    name: normalize_name(file_stem(name)),
                    path: join_file(&dir, name),
                    depth,
                    is_dir: false,
                });
            }
        }

        index
            .entries
            .sort_by(|a, b| (a.depth, &a.path).cmp(&(b.depth, &b.path)));
        debug!(root, entries = index.entries.len(), "Built folder index");
        Ok(index)
    }

    pub fn at_depth(&self, depth: u8) -> impl Iterator<Item = &FolderEntry> {
        self.entries.iter().filter(move |e| e.depth == depth)
    }

    pub fn max_depth(&self) -> u8 {
        self.entries.iter().map(|e| e.depth).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Separator used by `parent`, so virtual paths like `smb://host/share/`
/// and Windows paths keep their own style.
fn separator(parent: &str) -> char {
    if parent.contains('\\') && !parent.contains('/') {
        '\\'
    } else {
        '/'
    }
}

fn join_file(parent: &str, name: &str) -> String {
    let sep = separator(parent);
    if parent.ends_with(sep) {
        format!("{parent}{name}")
    } else {
        format!("{parent}{sep}{name}")
    }
}

/// Directory paths carry a trailing separator.
fn join_dir(parent: &str, name: &str) -> String {
    let mut path = join_file(parent, name);
    path.push(separator(parent));
    path
}

fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}
