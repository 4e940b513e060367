//! # Bundle Packaging
//!
//! Builds distributable archives from serialized document bundles: a fixed
//! descriptor template is copied into a scratch area, the source bundles
//! are injected under the template's entry-id content directory, and the
//! whole tree is compressed and renamed to the requested extension.
//!
//! Scratch directories are `TempDir`-scoped and removed on every exit
//! path, success or failure.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Errors surfaced while building a distributable archive.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The descriptor template is missing or has no entry-id directory.
    #[error("descriptor template is unusable: {detail}")]
    TemplateStructure { detail: String },

    /// An empty source list: there is nothing to package.
    #[error("no source bundles were given")]
    NoBundles,

    /// A named source bundle directory does not exist.
    #[error("source bundle not found: {}", .path.display())]
    MissingBundle { path: PathBuf },

    /// Filesystem failure, with the path it happened on.
    #[error("i/o failure at {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("archive construction failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl PackageError {
    fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PackageError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Builds distributable archives around one or more `.ca` bundles.
pub struct BundlePackager {
    /// Name of the container directory the bundles are injected into,
    /// below `<entry-id>/versions/0/contents/`.
    pub container_name: String,
}

impl Default for BundlePackager {
    fn default() -> Self {
        Self {
            container_name: "OpenPoster.wallpaper".to_string(),
        }
    }
}

impl BundlePackager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(container_name: impl Into<String>) -> Self {
        Self {
            container_name: container_name.into(),
        }
    }

    /// Wraps the given source bundles into a compressed distributable at
    /// `output_path`, whose extension is taken as requested (the archive
    /// is produced as a zip and renamed).
    pub fn build_distributable(
        &self,
        source_bundles: &[PathBuf],
        template_dir: &Path,
        output_path: &Path,
    ) -> Result<PathBuf, PackageError> {
        if source_bundles.is_empty() {
            return Err(PackageError::NoBundles);
        }
        for bundle in source_bundles {
            if !bundle.is_dir() {
                return Err(PackageError::MissingBundle {
                    path: bundle.clone(),
                });
            }
        }
        if !template_dir.is_dir() {
            return Err(PackageError::TemplateStructure {
                detail: format!(
                    "descriptor template directory not found: {}",
                    template_dir.display()
                ),
            });
        }

        // Scratch area; dropped (and removed) on every exit path.
        let scratch = tempfile::tempdir()
            .map_err(|e| PackageError::io(std::env::temp_dir(), e))?;

        // 1. Copy the descriptor template.
        let descriptors = scratch.path().join("descriptors");
        copy_dir(template_dir, &descriptors)?;

        // 2. Locate the entry-id directory within the copied template.
        let entry_id = find_entry_id(&descriptors)?;
        debug!(entry_id = %entry_id, "using descriptor entry");

        // 3. Inject each source bundle into the nested content directory.
        let contents = descriptors
            .join(&entry_id)
            .join("versions")
            .join("0")
            .join("contents")
            .join(&self.container_name);
        fs::create_dir_all(&contents).map_err(|e| PackageError::io(&contents, e))?;
        for bundle in source_bundles {
            let Some(basename) = bundle.file_name() else {
                return Err(PackageError::MissingBundle {
                    path: bundle.clone(),
                });
            };
            copy_dir(bundle, &contents.join(basename))?;
            debug!(bundle = %bundle.display(), "injected source bundle");
        }

        // 4. Compress the scratch tree and take the requested extension.
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PackageError::io(parent, e))?;
            }
        }
        let zip_path = output_path.with_extension("zip");
        zip_dir(scratch.path(), &zip_path)?;
        if zip_path != output_path {
            fs::rename(&zip_path, output_path).map_err(|e| PackageError::io(output_path, e))?;
        }

        info!(archive = %output_path.display(), "built distributable archive");
        Ok(output_path.to_path_buf())
    }
}

/// The entry id is the first top-level subdirectory of the descriptor
/// template that is not a dot-entry.
fn find_entry_id(descriptors: &Path) -> Result<String, PackageError> {
    for entry in fs::read_dir(descriptors).map_err(|e| PackageError::io(descriptors, e))? {
        let entry = entry.map_err(|e| PackageError::io(descriptors, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if entry.path().is_dir() && !name.starts_with('.') {
            return Ok(name.to_string());
        }
    }
    Err(PackageError::TemplateStructure {
        detail: "no entry-id directory inside descriptor template".to_string(),
    })
}

fn copy_dir(src: &Path, dest: &Path) -> Result<(), PackageError> {
    fs::create_dir_all(dest).map_err(|e| PackageError::io(dest, e))?;
    for entry in fs::read_dir(src).map_err(|e| PackageError::io(src, e))? {
        let entry = entry.map_err(|e| PackageError::io(src, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| PackageError::io(&from, e))?;
        }
    }
    Ok(())
}

fn zip_dir(root: &Path, archive_path: &Path) -> Result<(), PackageError> {
    let file = File::create(archive_path).map_err(|e| PackageError::io(archive_path, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else {
            zip.start_file(name, options)?;
            let bytes = fs::read(entry.path()).map_err(|e| PackageError::io(entry.path(), e))?;
            zip.write_all(&bytes).map_err(|e| PackageError::io(archive_path, e))?;
        }
    }
    zip.finish()?;
    Ok(())
}
