//! Where level documents and images come from.

use crate::error::{MapError, MapResult};
use macroquad::texture::Image;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Fetches documents and decoded images by path.
///
/// Implementations must be shareable across threads: tile sets are decoded
/// concurrently.
pub trait AssetSource: Send + Sync {
    /// Read a UTF-8 document.
    fn read_text(&self, path: &Path) -> MapResult<String>;
    /// Load and decode an image to RGBA8.
    fn load_image(&self, path: &Path) -> MapResult<Image>;
}

/// Reads from the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAssets;

impl AssetSource for FsAssets {
    fn read_text(&self, path: &Path) -> MapResult<String> {
        std::fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn load_image(&self, path: &Path) -> MapResult<Image> {
        let bytes = std::fs::read(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Image::from_file_with_format(&bytes, None).map_err(|e| MapError::Image {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// In-memory documents and images, keyed by normalised path.
#[derive(Default)]
pub struct MemoryAssets {
    texts: HashMap<PathBuf, String>,
    images: HashMap<PathBuf, Image>,
}

impl MemoryAssets {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document.
    pub fn with_text(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.texts.insert(normalize(path.as_ref()), text.into());
        self
    }

    /// Register an already decoded image.
    pub fn with_image(mut self, path: impl AsRef<Path>, image: Image) -> Self {
        self.images.insert(normalize(path.as_ref()), image);
        self
    }

    fn missing(path: &Path) -> MapError {
        MapError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not in memory store"),
        }
    }
}

impl AssetSource for MemoryAssets {
    fn read_text(&self, path: &Path) -> MapResult<String> {
        self.texts
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| Self::missing(path))
    }

    fn load_image(&self, path: &Path) -> MapResult<Image> {
        self.images
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| Self::missing(path))
    }
}

/// Resolve `rel` against the directory that contains `owner`.
pub fn resolve_relative(owner: &Path, rel: &str) -> PathBuf {
    let rel = Path::new(rel);
    if rel.is_absolute() {
        return normalize(rel);
    }
    let base = owner.parent().unwrap_or_else(|| Path::new(""));
    normalize(&base.join(rel))
}

/// Collapse `.` and `..` without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
