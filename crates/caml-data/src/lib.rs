//! # CAML Document Model
//!
//! Data structures for Core Animation (`.ca`) scene documents: the layer
//! tree with its animations, states and transitions, the attribute codec
//! the markup round-trips through, and the bundle-level document type.
//!
//! The parsing contract is permissive on purpose: only layer identity and
//! geometry are hard-required, every other attribute is optional, and a
//! field absent at load stays absent at save.

pub mod animation;
pub mod codec;
pub mod document;
pub mod error;
pub mod layer;
pub mod state;
pub mod xml;

pub use animation::{
    Animation, AnimationTiming, CaNumber, CgPoint, KeyframeAnimation, MatchMoveAnimation,
    SpringAnimation,
};
pub use document::CaDocument;
pub use error::CamlError;
pub use layer::{Layer, LayerContents, LayerKind, TextAttrs};
pub use state::{
    State, StateAddAnimation, StateElement, StateSetValue, StateTransition, TransitionElement,
};
pub use xml::{XmlElement, CAML_NS};
