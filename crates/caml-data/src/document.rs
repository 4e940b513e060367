//! # Document Bundle
//!
//! Owns the root layer tree plus the document-level pieces of a `.ca`
//! bundle: the opaque property-list manifest and the named asset blobs.
//!
//! ## Responsibilities
//! - **Load**: manifest-first bundle reading (`index.xml` names the root
//!   markup document), optional `assets/` enumeration, recursive layer
//!   parse.
//! - **Save**: staged write with swap-in; a failed save never leaves a
//!   partial bundle at the destination.
//! - **Lookup**: id-based layer search across the whole tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CamlError;
use crate::layer::Layer;
use crate::xml::{XmlElement, CAML_NS};

/// An in-memory `.ca` bundle.
///
/// The manifest is read-modify-write opaque: keys this model does not
/// understand still round-trip verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CaDocument {
    /// Bundle directory this document was loaded from, when it was.
    pub path: Option<PathBuf>,
    pub manifest: plist::Dictionary,
    /// Named binary blobs from the bundle's `assets/` directory, keyed by
    /// file basename. No cross-references are validated.
    pub assets: BTreeMap<String, Vec<u8>>,
    pub root: Layer,
}

impl CaDocument {
    /// Creates a fresh document with a minimal manifest.
    pub fn new(root_document: impl Into<String>, root: Layer) -> Self {
        let mut manifest = plist::Dictionary::new();
        manifest.insert(
            "rootDocument".to_string(),
            plist::Value::String(root_document.into()),
        );
        Self {
            path: None,
            manifest,
            assets: BTreeMap::new(),
            root,
        }
    }

    /// Loads a bundle directory.
    ///
    /// A missing manifest is the only unconditionally fatal bundle-shape
    /// error; a missing or empty `assets/` directory simply yields an
    /// empty asset map.
    pub fn load(bundle: impl AsRef<Path>) -> Result<CaDocument, CamlError> {
        let bundle = bundle.as_ref();

        let manifest_path = bundle.join("index.xml");
        if !manifest_path.is_file() {
            return Err(CamlError::ManifestNotFound {
                path: manifest_path,
            });
        }
        let manifest = plist::Value::from_file(&manifest_path)
            .map_err(|e| CamlError::plist(&manifest_path, e))?
            .into_dictionary()
            .ok_or_else(|| {
                CamlError::markup(format!(
                    "{}: manifest is not a dictionary",
                    manifest_path.display()
                ))
            })?;
        let root_document = manifest
            .get("rootDocument")
            .and_then(plist::Value::as_string)
            .ok_or_else(|| {
                CamlError::markup(format!(
                    "{}: manifest has no rootDocument entry",
                    manifest_path.display()
                ))
            })?
            .to_string();

        let mut assets = BTreeMap::new();
        let assets_dir = bundle.join("assets");
        if assets_dir.is_dir() {
            for entry in fs::read_dir(&assets_dir).map_err(|e| CamlError::io(&assets_dir, e))? {
                let entry = entry.map_err(|e| CamlError::io(&assets_dir, e))?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let bytes = fs::read(&path).map_err(|e| CamlError::io(&path, e))?;
                assets.insert(name.to_string(), bytes);
            }
        }

        let markup_path = bundle.join(&root_document);
        let markup =
            fs::read_to_string(&markup_path).map_err(|e| CamlError::io(&markup_path, e))?;
        let document_root = XmlElement::parse(&markup)?;
        let layer_element = document_root.children.first().ok_or_else(|| {
            CamlError::markup(format!(
                "{}: root element contains no layer",
                markup_path.display()
            ))
        })?;
        let root = Layer::from_element(layer_element)?;

        debug!(
            bundle = %bundle.display(),
            root_document = %root_document,
            assets = assets.len(),
            "loaded document bundle"
        );
        Ok(CaDocument {
            path: Some(bundle.to_path_buf()),
            manifest,
            assets,
            root,
        })
    }

    /// The markup filename named by the manifest.
    pub fn root_document_name(&self) -> Option<&str> {
        self.manifest
            .get("rootDocument")
            .and_then(plist::Value::as_string)
    }

    /// Writes the bundle as `dest_dir/bundle_name`.
    ///
    /// The whole bundle is staged in a scratch directory beside the
    /// destination and swapped in only once every write has succeeded, so
    /// a failed save leaves no partial bundle behind. Creating an already
    /// existing destination directory is not an error.
    pub fn save(&self, dest_dir: impl AsRef<Path>, bundle_name: &str) -> Result<PathBuf, CamlError> {
        let dest_dir = dest_dir.as_ref();
        fs::create_dir_all(dest_dir).map_err(|e| CamlError::io(dest_dir, e))?;

        let staging = tempfile::Builder::new()
            .prefix(".castage-")
            .tempdir_in(dest_dir)
            .map_err(|e| CamlError::io(dest_dir, e))?;
        let stage = staging.path();

        // Manifest round-trips verbatim, including keys this model does
        // not understand.
        let manifest_path = stage.join("index.xml");
        plist::Value::Dictionary(self.manifest.clone())
            .to_file_xml(&manifest_path)
            .map_err(|e| CamlError::plist(&manifest_path, e))?;

        if !self.assets.is_empty() {
            let assets_dir = stage.join("assets");
            fs::create_dir_all(&assets_dir).map_err(|e| CamlError::io(&assets_dir, e))?;
            for (name, bytes) in &self.assets {
                let asset_path = assets_dir.join(name);
                fs::write(&asset_path, bytes).map_err(|e| CamlError::io(&asset_path, e))?;
            }
        }

        let root_document = self
            .root_document_name()
            .ok_or_else(|| CamlError::markup("manifest has no rootDocument entry".to_string()))?
            .to_string();
        let mut caml = XmlElement::new("caml");
        caml.set_attr("xmlns", CAML_NS);
        caml.push(self.root.to_element());
        let markup_path = stage.join(&root_document);
        fs::write(&markup_path, caml.to_xml_string()?)
            .map_err(|e| CamlError::io(&markup_path, e))?;

        let target = dest_dir.join(bundle_name);
        if target.is_dir() {
            fs::remove_dir_all(&target).map_err(|e| CamlError::io(&target, e))?;
        } else if target.exists() {
            fs::remove_file(&target).map_err(|e| CamlError::io(&target, e))?;
        }
        let staged = staging.keep();
        if let Err(e) = fs::rename(&staged, &target) {
            let _ = fs::remove_dir_all(&staged);
            return Err(CamlError::io(&target, e));
        }

        info!(bundle = %target.display(), "saved document bundle");
        Ok(target)
    }

    /// Id lookup across the whole tree, pre-order, first match.
    pub fn find_layer(&self, id: &str) -> Option<&Layer> {
        self.root.find_layer(id)
    }

    pub fn find_layer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.root.find_layer_mut(id)
    }

    /// Looks up an asset blob by name.
    pub fn asset(&self, name: &str) -> Option<&[u8]> {
        self.assets.get(name).map(Vec::as_slice)
    }

    /// Resolves a markup content reference such as `assets/frame.png` to
    /// its blob by basename.
    pub fn resolve_asset(&self, path: &str) -> Option<&[u8]> {
        let name = Path::new(path).file_name()?.to_str()?;
        self.asset(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = CaDocument::load(dir.path()).unwrap_err();
        assert!(matches!(err, CamlError::ManifestNotFound { .. }));
    }

    #[test]
    fn manifest_without_root_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = plist::Dictionary::new();
        manifest.insert("version".to_string(), plist::Value::String("1".into()));
        plist::Value::Dictionary(manifest)
            .to_file_xml(dir.path().join("index.xml"))
            .unwrap();

        let err = CaDocument::load(dir.path()).unwrap_err();
        assert!(matches!(err, CamlError::MalformedMarkup { .. }));
    }

    #[test]
    fn save_creates_bundle_and_resolves_assets() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = CaDocument::new("main.caml", Layer::new("root", "Root"));
        doc.assets
            .insert("bg.png".to_string(), vec![0x89, 0x50, 0x4e, 0x47]);

        let bundle = doc.save(dir.path(), "Scene.ca").unwrap();
        assert!(bundle.join("index.xml").is_file());
        assert!(bundle.join("main.caml").is_file());
        assert!(bundle.join("assets/bg.png").is_file());

        let loaded = CaDocument::load(&bundle).unwrap();
        assert_eq!(loaded.root_document_name(), Some("main.caml"));
        assert_eq!(
            loaded.resolve_asset("assets/bg.png"),
            Some(&[0x89u8, 0x50, 0x4e, 0x47][..])
        );
        // No stray staging directories survive.
        let extras: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != "Scene.ca")
            .collect();
        assert!(extras.is_empty(), "stray entries: {extras:?}");
    }

    #[test]
    fn save_without_assets_omits_assets_dir() {
        let dir = tempfile::tempdir().unwrap();
        let doc = CaDocument::new("main.caml", Layer::new("root", "Root"));
        let bundle = doc.save(dir.path(), "Scene.ca").unwrap();
        assert!(!bundle.join("assets").exists());
    }

    #[test]
    fn unknown_manifest_keys_roundtrip_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = CaDocument::new("main.caml", Layer::new("root", "Root"));
        doc.manifest.insert(
            "vendorExtension".to_string(),
            plist::Value::String("kept".into()),
        );

        let bundle = doc.save(dir.path(), "Scene.ca").unwrap();
        let loaded = CaDocument::load(&bundle).unwrap();
        assert_eq!(
            loaded
                .manifest
                .get("vendorExtension")
                .and_then(plist::Value::as_string),
            Some("kept")
        );
    }
}
