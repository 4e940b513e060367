//! Asset-resolution seam consumed by renderers and preview surfaces.
//!
//! Content lookup is the consumer's responsibility; the document model
//! only exposes its named blobs. These resolvers bridge the two.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use caml_data::CaDocument;

/// Resolves a content reference (e.g. `assets/frame.png`) to raw bytes.
pub trait AssetResolver {
    fn load_bytes(&self, path: &str) -> anyhow::Result<Vec<u8>>;
}

/// Resolves references against a plain directory root.
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetResolver for DirAssets {
    fn load_bytes(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let full = self.root.join(path);
        fs::read(&full).with_context(|| format!("failed to read asset {}", full.display()))
    }
}

/// Resolves references from a document's in-memory asset table first,
/// falling back to the bundle directory the document was loaded from.
pub struct DocumentAssets<'a> {
    document: &'a CaDocument,
}

impl<'a> DocumentAssets<'a> {
    pub fn new(document: &'a CaDocument) -> Self {
        Self { document }
    }
}

impl AssetResolver for DocumentAssets<'_> {
    fn load_bytes(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        if let Some(bytes) = self.document.resolve_asset(path) {
            return Ok(bytes.to_vec());
        }
        if let Some(bundle) = &self.document.path {
            let full = bundle.join(path);
            return fs::read(&full)
                .with_context(|| format!("failed to read asset {}", full.display()));
        }
        anyhow::bail!("asset not found: {path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caml_data::Layer;

    #[test]
    fn dir_resolver_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/a.png"), b"bytes").unwrap();

        let resolver = DirAssets::new(dir.path());
        assert_eq!(resolver.load_bytes("assets/a.png").unwrap(), b"bytes");
        assert!(resolver.load_bytes("assets/missing.png").is_err());
    }

    #[test]
    fn document_resolver_prefers_in_memory_table() {
        let mut doc = CaDocument::new("main.caml", Layer::new("root", "Root"));
        doc.assets.insert("a.png".to_string(), b"table".to_vec());

        let resolver = DocumentAssets::new(&doc);
        assert_eq!(resolver.load_bytes("assets/a.png").unwrap(), b"table");
        assert!(resolver.load_bytes("assets/other.png").is_err());
    }
}
