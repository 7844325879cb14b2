use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ArchiveError;

pub const ASSETS_DIR: &str = "assets";

/// Filesystem access scoped to the static tree root.
///
/// All paths handed to it are relative; anything that would climb out of
/// the root is refused.
#[derive(Clone, Debug)]
pub struct FileManager {
    base_dir: PathBuf,
}

impl FileManager {
    pub fn new(base_dir: &Path) -> io::Result<Self> {
        let manager = Self {
            base_dir: base_dir.to_path_buf(),
        };
        manager.create_directories()?;
        Ok(manager)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.base_dir.join(ASSETS_DIR)
    }

    pub fn create_directories(&self) -> io::Result<()> {
        fs::create_dir_all(self.assets_dir())
    }

    /// Absolute location of `relative` inside the root.
    pub fn resolve(&self, relative: &Path) -> io::Result<PathBuf> {
        let escapes = relative.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        });
        if escapes || relative.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes static root: {relative:?}"),
            ));
        }
        Ok(self.base_dir.join(relative))
    }

    pub fn exists(&self, relative: &Path) -> bool {
        self.resolve(relative).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn read_to_string(&self, relative: &Path) -> io::Result<String> {
        fs::read_to_string(self.resolve(relative)?)
    }

    /// Whole-file replace: the bytes land in a temp file next to the target
    /// and are renamed over it, so readers never see a partial file.
    pub fn write_atomic(&self, relative: &Path, content: &[u8]) -> io::Result<PathBuf> {
        let path = self.resolve(relative)?;
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(content)?;
        temp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    /// Deletes everything under the root, then recreates the empty layout.
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.base_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.create_directories()
    }

    /// Number of captured `.html` files.
    pub fn html_file_count(&self) -> usize {
        self.files()
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
            })
            .count()
    }

    /// Total size in bytes of every file in the tree.
    pub fn tree_size_bytes(&self) -> u64 {
        self.files()
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }

    /// Packs the whole tree into a ZIP file at `dest`, entries named by
    /// their path under the root. `dest` must lie outside the tree. Returns
    /// the number of files packed.
    pub fn write_archive(&self, dest: &Path) -> Result<usize, ArchiveError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ArchiveError::Io { path, source }
        };

        let parent = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(io_err(parent))?;
        let root = fs::canonicalize(&self.base_dir).map_err(io_err(&self.base_dir))?;
        if fs::canonicalize(parent).map_err(io_err(parent))?.starts_with(&root) {
            return Err(ArchiveError::InsideTree(dest.to_path_buf()));
        }

        let mut entries: Vec<(String, PathBuf)> = self
            .files()
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.base_dir).ok()?;
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((name, entry.into_path()))
            })
            .collect();
        entries.sort();

        let temp = NamedTempFile::new_in(parent).map_err(io_err(parent))?;
        let mut writer = ZipWriter::new(temp);
        for (name, path) in &entries {
            writer.start_file(
                name.as_str(),
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            )?;
            let mut file = fs::File::open(path).map_err(io_err(path))?;
            io::copy(&mut file, &mut writer).map_err(io_err(dest))?;
            debug!(entry = %name, "archived");
        }
        writer
            .finish()?
            .persist(dest)
            .map_err(|e| ArchiveError::Io {
                path: dest.to_path_buf(),
                source: e.error,
            })?;
        Ok(entries.len())
    }

    fn files(&self) -> impl Iterator<Item = walkdir::DirEntry> {
        WalkDir::new(&self.base_dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable entry in static tree: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
    }
}

/// `1536` → `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
