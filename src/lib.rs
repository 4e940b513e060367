//! # Poster Engine
//!
//! Engine-level surface over the CAML document model: packaging of
//! serialized `.ca` bundles into distributable archives, and the
//! asset-resolution seam renderers consume.
//!
//! The document model itself (layers, animations, states, transitions,
//! bundle load/save) lives in the [`caml_data`] crate and is re-exported
//! here.

pub mod assets;
pub mod bundle;

pub use assets::{AssetResolver, DirAssets, DocumentAssets};
pub use bundle::{BundlePackager, PackageError};
pub use caml_data::{
    Animation, CaDocument, CamlError, Layer, LayerContents, LayerKind, State, StateTransition,
};
