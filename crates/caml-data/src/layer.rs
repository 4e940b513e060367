//! # Layer Tree
//!
//! The scene tree entity: geometry, appearance, optional contents and text
//! attributes, ordered id-keyed sublayers, animations, states and state
//! transitions.
//!
//! ## Responsibilities
//! - **Hierarchy**: id-keyed sublayer map with a parallel order vector.
//!   The two always agree; the add/remove API enforces it, not callers.
//! - **Lookup**: pre-order depth-first `find_layer`, own-list
//!   `find_animation`.
//! - **Markup**: `from_element`/`to_element` mirror each other; optional
//!   attributes absent at load stay absent at save.

use std::collections::HashMap;

use tracing::debug;

use crate::animation::Animation;
use crate::codec;
use crate::error::CamlError;
use crate::state::{State, StateTransition};
use crate::xml::XmlElement;

/// Layer kind, carried by the `class` attribute in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerKind {
    /// Plain layer, no `class` attribute.
    Basic,
    /// `class="CATextLayer"`, unlocks the text attribute group.
    Text,
    /// Any other `class` value, preserved verbatim.
    Custom(String),
}

impl LayerKind {
    fn from_class(class: Option<String>) -> Self {
        match class {
            None => LayerKind::Basic,
            Some(class) if class == "CATextLayer" => LayerKind::Text,
            Some(class) => LayerKind::Custom(class),
        }
    }

    fn class_attr(&self) -> Option<&str> {
        match self {
            LayerKind::Basic => None,
            LayerKind::Text => Some("CATextLayer"),
            LayerKind::Custom(class) => Some(class),
        }
    }
}

/// Text-specific attributes, present only on `LayerKind::Text` layers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextAttrs {
    pub string: Option<String>,
    pub font_size: Option<String>,
    pub font_family: Option<String>,
    pub alignment_mode: Option<String>,
    pub color: Option<String>,
    pub wrapped: Option<String>,
}

/// The `<contents>` child of a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerContents {
    /// `<contents type="CGImage" src="..."/>` image reference.
    Image { src: Option<String> },
    /// Any other contents payload, carried opaquely.
    Other(XmlElement),
}

/// A node in the scene tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Unique within the owning document by convention; only direct-sibling
    /// collisions are rejected.
    pub id: String,
    pub name: String,
    /// `"x y"` split into components. Required at load.
    pub position: [String; 2],
    /// `"x y w h"` split into components. Required at load.
    pub bounds: [String; 4],
    pub hidden: bool,
    pub kind: LayerKind,
    pub anchor_point: Option<String>,
    pub transform: Option<String>,
    pub geometry_flipped: Option<String>,
    pub opacity: Option<String>,
    pub z_position: Option<String>,
    pub background_color: Option<String>,
    pub corner_radius: Option<String>,
    pub contents: Option<LayerContents>,
    /// Present only when `kind` is `Text`.
    pub text: Option<TextAttrs>,
    pub animations: Vec<Animation>,
    /// States in document order; lookup is by name scan.
    pub states: Vec<State>,
    pub state_transitions: Vec<StateTransition>,

    sublayers: HashMap<String, Layer>,
    sublayer_order: Vec<String>,
}

impl Layer {
    /// Creates a layer with defaulted geometry for programmatic insertion.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position: ["0".to_string(), "0".to_string()],
            bounds: [
                "0".to_string(),
                "0".to_string(),
                "0".to_string(),
                "0".to_string(),
            ],
            hidden: false,
            kind: LayerKind::Basic,
            anchor_point: None,
            transform: None,
            geometry_flipped: None,
            opacity: None,
            z_position: None,
            background_color: None,
            corner_radius: None,
            contents: None,
            text: None,
            animations: Vec::new(),
            states: Vec::new(),
            state_transitions: Vec::new(),
            sublayers: HashMap::new(),
            sublayer_order: Vec::new(),
        }
    }

    /// Builds a layer (recursively) from its markup element.
    ///
    /// `id`, `name`, `position` and `bounds` are structurally required;
    /// everything else is soft-optional. Unrecognized sublayer tags are
    /// skipped.
    pub fn from_element(el: &XmlElement) -> Result<Layer, CamlError> {
        let id = codec::require(el, "id")?;
        let name = required(el, &id, "name")?;
        let position = required_vector::<2>(el, &id, "position")?;
        let bounds = required_vector::<4>(el, &id, "bounds")?;

        let kind = LayerKind::from_class(codec::get_string(el, "class"));
        let text = if kind == LayerKind::Text {
            Some(TextAttrs {
                string: codec::get_string(el, "string"),
                font_size: codec::get_string(el, "fontSize"),
                font_family: codec::get_string(el, "fontFamily"),
                alignment_mode: codec::get_string(el, "alignmentMode"),
                color: codec::get_string(el, "color"),
                wrapped: codec::get_string(el, "wrapped"),
            })
        } else {
            None
        };

        let contents = el.find_child("contents").map(|c| {
            if c.attr("type") == Some("CGImage") {
                LayerContents::Image {
                    src: codec::get_string(c, "src"),
                }
            } else {
                LayerContents::Other(c.clone())
            }
        });

        let mut layer = Layer {
            id,
            name,
            position,
            bounds,
            hidden: codec::get_flag(el, "hidden"),
            kind,
            anchor_point: codec::get_string(el, "anchorPoint"),
            transform: codec::get_string(el, "transform"),
            geometry_flipped: codec::get_string(el, "geometryFlipped"),
            opacity: codec::get_string(el, "opacity"),
            z_position: codec::get_string(el, "zPosition"),
            background_color: codec::get_string(el, "backgroundColor"),
            corner_radius: codec::get_string(el, "cornerRadius"),
            contents,
            text,
            animations: Vec::new(),
            states: Vec::new(),
            state_transitions: Vec::new(),
            sublayers: HashMap::new(),
            sublayer_order: Vec::new(),
        };

        if let Some(sublayers) = el.find_child("sublayers") {
            for child in &sublayers.children {
                if child.name == "CALayer" {
                    layer.add_sublayer(Layer::from_element(child)?)?;
                } else {
                    debug!(tag = %child.name, parent = %layer.id, "skipping unsupported sublayer element");
                }
            }
        }

        if let Some(states) = el.find_child("states") {
            layer.states = states.children.iter().map(State::from_element).collect();
        }

        if let Some(transitions) = el.find_child("stateTransitions") {
            layer.state_transitions = transitions
                .children
                .iter()
                .map(StateTransition::from_element)
                .collect();
        }

        if let Some(animations) = el.find_child("animations") {
            layer.animations = animations
                .children
                .iter()
                .filter_map(Animation::from_element)
                .collect();
        }

        Ok(layer)
    }

    /// Serializes the layer (and subtree). Mirrors `from_element`: every
    /// `None` is omitted, children are emitted in order-vector order.
    pub fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new("CALayer");
        el.set_attr("id", &self.id);
        el.set_attr("name", &self.name);
        el.set_attr("position", self.position.join(" "));
        el.set_attr("bounds", self.bounds.join(" "));
        if self.hidden {
            el.set_attr("hidden", "true");
        }
        codec::set_opt(&mut el, "transform", self.transform.as_deref());
        codec::set_opt(&mut el, "anchorPoint", self.anchor_point.as_deref());
        codec::set_opt(&mut el, "geometryFlipped", self.geometry_flipped.as_deref());
        codec::set_opt(&mut el, "opacity", self.opacity.as_deref());
        codec::set_opt(&mut el, "zPosition", self.z_position.as_deref());
        codec::set_opt(&mut el, "backgroundColor", self.background_color.as_deref());
        codec::set_opt(&mut el, "cornerRadius", self.corner_radius.as_deref());
        codec::set_opt(&mut el, "class", self.kind.class_attr());

        if self.kind == LayerKind::Text {
            if let Some(text) = &self.text {
                codec::set_opt(&mut el, "string", text.string.as_deref());
                codec::set_opt(&mut el, "fontSize", text.font_size.as_deref());
                codec::set_opt(&mut el, "fontFamily", text.font_family.as_deref());
                codec::set_opt(&mut el, "alignmentMode", text.alignment_mode.as_deref());
                codec::set_opt(&mut el, "color", text.color.as_deref());
                codec::set_opt(&mut el, "wrapped", text.wrapped.as_deref());
            }
        }

        match &self.contents {
            Some(LayerContents::Image { src }) => {
                let mut contents = XmlElement::new("contents");
                contents.set_attr("type", "CGImage");
                codec::set_opt(&mut contents, "src", src.as_deref());
                el.push(contents);
            }
            Some(LayerContents::Other(raw)) => el.push(raw.clone()),
            None => {}
        }

        if !self.sublayer_order.is_empty() {
            let mut sublayers = XmlElement::new("sublayers");
            for child in self.sublayers_in_order() {
                sublayers.push(child.to_element());
            }
            el.push(sublayers);
        }

        if !self.states.is_empty() {
            let mut states = XmlElement::new("states");
            for state in &self.states {
                states.push(state.to_element());
            }
            el.push(states);
        }

        if !self.state_transitions.is_empty() {
            let mut transitions = XmlElement::new("stateTransitions");
            for transition in &self.state_transitions {
                transitions.push(transition.to_element());
            }
            el.push(transitions);
        }

        if !self.animations.is_empty() {
            let mut animations = XmlElement::new("animations");
            for animation in &self.animations {
                animations.push(animation.to_element());
            }
            el.push(animations);
        }

        el
    }

    /// Appends a sublayer, keeping the id map and the order vector in step.
    /// Returns the stored node so callers can insert-then-edit.
    ///
    /// Rejects a direct-sibling id collision; ids elsewhere in the tree are
    /// not checked.
    pub fn add_sublayer(&mut self, layer: Layer) -> Result<&mut Layer, CamlError> {
        let id = layer.id.clone();
        if self.sublayers.contains_key(&id) {
            return Err(CamlError::DuplicateId { id });
        }
        self.sublayer_order.push(id.clone());
        Ok(self.sublayers.entry(id).or_insert(layer))
    }

    /// Removes the first layer with the given id, searching direct children
    /// before recursing into each subtree. Returns whether a removal
    /// happened.
    pub fn remove_sublayer(&mut self, id: &str) -> bool {
        let direct = self
            .sublayer_order
            .iter()
            .position(|key| self.sublayers.get(key).is_some_and(|c| c.id == id));
        if let Some(pos) = direct {
            let key = self.sublayer_order.remove(pos);
            self.sublayers.remove(&key);
            return true;
        }

        let order: Vec<String> = self.sublayer_order.clone();
        for key in order {
            if let Some(child) = self.sublayers.get_mut(&key) {
                if child.remove_sublayer(id) {
                    return true;
                }
            }
        }
        false
    }

    /// Pre-order depth-first search below this layer; first match wins.
    /// Duplicate ids elsewhere in the tree are neither detected nor
    /// rejected.
    pub fn find_layer(&self, id: &str) -> Option<&Layer> {
        for key in &self.sublayer_order {
            if let Some(child) = self.sublayers.get(key) {
                if child.id == id {
                    return Some(child);
                }
                if let Some(found) = child.find_layer(id) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Mutable counterpart of [`find_layer`](Self::find_layer), same
    /// traversal order.
    pub fn find_layer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        let pos = self.sublayer_order.iter().position(|key| {
            self.sublayers
                .get(key)
                .is_some_and(|c| c.id == id || c.find_layer(id).is_some())
        })?;
        let key = self.sublayer_order[pos].clone();
        let child = self.sublayers.get_mut(&key)?;
        if child.id == id {
            Some(child)
        } else {
            child.find_layer_mut(id)
        }
    }

    /// First animation in this layer's own list with the given key path.
    /// Does not search descendants.
    pub fn find_animation(&self, key_path: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.key_path() == key_path)
    }

    /// First state with the given name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name.as_deref() == Some(name))
    }

    pub fn sublayer(&self, id: &str) -> Option<&Layer> {
        self.sublayers.get(id)
    }

    pub fn sublayer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.sublayers.get_mut(id)
    }

    /// Direct sublayer ids in document order.
    pub fn sublayer_ids(&self) -> &[String] {
        &self.sublayer_order
    }

    pub fn sublayer_count(&self) -> usize {
        self.sublayer_order.len()
    }

    /// Direct sublayers in document order.
    pub fn sublayers_in_order(&self) -> impl Iterator<Item = &Layer> {
        self.sublayer_order
            .iter()
            .filter_map(|key| self.sublayers.get(key))
    }

    /// Overwrites the attribute named by an inspector/state key path.
    /// Unknown key paths are ignored.
    pub fn set_attribute(&mut self, key_path: &str, value: &str) {
        match key_path {
            "position" => {
                if let Some(position) = codec::split_vector::<2>(value) {
                    self.position = position;
                }
            }
            "position.x" => self.position[0] = value.to_string(),
            "position.y" => self.position[1] = value.to_string(),
            "bounds" => {
                if let Some(bounds) = codec::split_vector::<4>(value) {
                    self.bounds = bounds;
                }
            }
            "hidden" => self.hidden = matches!(value, "1" | "true"),
            "anchorPoint" => self.anchor_point = Some(value.to_string()),
            "transform" => self.transform = Some(value.to_string()),
            "geometryFlipped" => self.geometry_flipped = Some(value.to_string()),
            "opacity" => self.opacity = Some(value.to_string()),
            "zPosition" => self.z_position = Some(value.to_string()),
            "backgroundColor" => self.background_color = Some(value.to_string()),
            "cornerRadius" => self.corner_radius = Some(value.to_string()),
            "string" => self.text_mut().string = Some(value.to_string()),
            "fontSize" => self.text_mut().font_size = Some(value.to_string()),
            "fontFamily" => self.text_mut().font_family = Some(value.to_string()),
            "alignmentMode" => self.text_mut().alignment_mode = Some(value.to_string()),
            "color" => self.text_mut().color = Some(value.to_string()),
            "wrapped" => self.text_mut().wrapped = Some(value.to_string()),
            other => debug!(key_path = %other, layer = %self.id, "ignoring unknown key path"),
        }
    }

    /// Clears an optional attribute; it will be omitted at serialize time.
    /// Structural attributes (id, name, position, bounds) cannot be cleared.
    pub fn clear_attribute(&mut self, key_path: &str) {
        match key_path {
            "hidden" => self.hidden = false,
            "anchorPoint" => self.anchor_point = None,
            "transform" => self.transform = None,
            "geometryFlipped" => self.geometry_flipped = None,
            "opacity" => self.opacity = None,
            "zPosition" => self.z_position = None,
            "backgroundColor" => self.background_color = None,
            "cornerRadius" => self.corner_radius = None,
            "string" => self.clear_text(|t| t.string = None),
            "fontSize" => self.clear_text(|t| t.font_size = None),
            "fontFamily" => self.clear_text(|t| t.font_family = None),
            "alignmentMode" => self.clear_text(|t| t.alignment_mode = None),
            "color" => self.clear_text(|t| t.color = None),
            "wrapped" => self.clear_text(|t| t.wrapped = None),
            other => debug!(key_path = %other, layer = %self.id, "ignoring unknown key path"),
        }
    }

    fn text_mut(&mut self) -> &mut TextAttrs {
        self.text.get_or_insert_with(TextAttrs::default)
    }

    fn clear_text(&mut self, clear: impl FnOnce(&mut TextAttrs)) {
        if let Some(text) = self.text.as_mut() {
            clear(text);
        }
    }
}

fn required(el: &XmlElement, id: &str, key: &str) -> Result<String, CamlError> {
    codec::get_string(el, key).ok_or_else(|| missing(el, id, key))
}

fn required_vector<const N: usize>(
    el: &XmlElement,
    id: &str,
    key: &str,
) -> Result<[String; N], CamlError> {
    // Wrong component count is as unusable as absence for geometry
    // consumers.
    codec::get_vector::<N>(el, key).ok_or_else(|| missing(el, id, key))
}

fn missing(el: &XmlElement, id: &str, key: &str) -> CamlError {
    CamlError::MissingAttribute {
        element: format!("{} \"{}\"", el.name, id),
        attribute: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Layer {
        // root -> a -> (a1, a2), b -> b1
        let mut root = Layer::new("root", "Root");
        let mut a = Layer::new("a", "A");
        a.add_sublayer(Layer::new("a1", "A1")).unwrap();
        a.add_sublayer(Layer::new("a2", "A2")).unwrap();
        let mut b = Layer::new("b", "B");
        b.add_sublayer(Layer::new("b1", "B1")).unwrap();
        root.add_sublayer(a).unwrap();
        root.add_sublayer(b).unwrap();
        root
    }

    fn assert_invariant(layer: &Layer) {
        assert_eq!(layer.sublayer_ids().len(), layer.sublayer_count());
        for id in layer.sublayer_ids() {
            assert!(layer.sublayer(id).is_some(), "order entry {id} missing from map");
        }
        for child in layer.sublayers_in_order() {
            assert_invariant(child);
        }
    }

    #[test]
    fn add_rejects_direct_sibling_duplicate_only() {
        let mut root = tree();
        let err = root.add_sublayer(Layer::new("a", "again")).unwrap_err();
        assert!(matches!(err, CamlError::DuplicateId { id } if id == "a"));

        // Duplicating a non-sibling id elsewhere in the tree is accepted.
        root.add_sublayer(Layer::new("a1", "shadow")).unwrap();
        assert_invariant(&root);
    }

    #[test]
    fn order_and_map_stay_in_step_across_mutation() {
        let mut root = tree();
        assert_invariant(&root);

        assert!(root.remove_sublayer("a1"));
        assert!(root.remove_sublayer("b"));
        assert!(!root.remove_sublayer("nope"));
        assert_invariant(&root);
        assert_eq!(root.sublayer_ids(), ["a"]);

        root.add_sublayer(Layer::new("c", "C")).unwrap();
        assert_eq!(root.sublayer_ids(), ["a", "c"]);
        assert_invariant(&root);
    }

    #[test]
    fn find_layer_is_preorder_first_match() {
        let mut root = tree();
        // Same id under two different subtrees: "dup" under a1 and under b.
        root.find_layer_mut("a1")
            .unwrap()
            .add_sublayer(Layer::new("dup", "first"))
            .unwrap();
        root.find_layer_mut("b")
            .unwrap()
            .add_sublayer(Layer::new("dup", "second"))
            .unwrap();

        for _ in 0..3 {
            assert_eq!(root.find_layer("dup").unwrap().name, "first");
        }
        assert_eq!(root.find_layer_mut("dup").unwrap().name, "first");
    }

    #[test]
    fn remove_prefers_direct_children() {
        let mut root = tree();
        root.find_layer_mut("a")
            .unwrap()
            .add_sublayer(Layer::new("x", "deep"))
            .unwrap();
        root.add_sublayer(Layer::new("x", "shallow")).unwrap();

        assert!(root.remove_sublayer("x"));
        // The direct child went first; the nested one survives.
        assert!(root.find_layer("x").is_some());
        assert_eq!(root.find_layer("x").unwrap().name, "deep");
    }

    #[test]
    fn find_animation_searches_own_list_only() {
        let mut root = tree();
        let anim = Animation::Spring(crate::animation::SpringAnimation::new("opacity"));
        root.find_layer_mut("a").unwrap().animations.push(anim);

        assert!(root.find_animation("opacity").is_none());
        let a = root.find_layer("a").unwrap();
        assert!(a.find_animation("opacity").is_some());
        assert!(a.find_animation("position").is_none());
    }

    #[test]
    fn load_requires_geometry() {
        let el = XmlElement::parse(r#"<CALayer id="L" name="n" position="1 2"/>"#).unwrap();
        let err = Layer::from_element(&el).unwrap_err();
        assert!(
            matches!(&err, CamlError::MissingAttribute { attribute, .. } if attribute == "bounds"),
            "unexpected error: {err:?}"
        );

        // Wrong arity on a required vector is treated the same as absence.
        let el = XmlElement::parse(r#"<CALayer id="L" name="n" position="1" bounds="0 0 1 1"/>"#)
            .unwrap();
        assert!(Layer::from_element(&el).is_err());
    }

    #[test]
    fn unknown_sublayer_tags_are_skipped() {
        let el = XmlElement::parse(
            r#"<CALayer id="r" name="r" position="0 0" bounds="0 0 10 10"><sublayers><CALayer id="k" name="k" position="0 0" bounds="0 0 1 1"/><CAEmitterLayer id="e" name="e" position="0 0" bounds="0 0 1 1"/></sublayers></CALayer>"#,
        )
        .unwrap();
        let layer = Layer::from_element(&el).unwrap();
        assert_eq!(layer.sublayer_ids(), ["k"]);
    }

    #[test]
    fn set_and_clear_attribute_preserve_absence_semantics() {
        let mut layer = Layer::new("L", "L");
        assert!(layer.opacity.is_none());

        layer.set_attribute("opacity", "0.5");
        assert_eq!(layer.opacity.as_deref(), Some("0.5"));
        layer.set_attribute("position.x", "42");
        assert_eq!(layer.position[0], "42");
        layer.set_attribute("bounds", "0 0 100 50");
        assert_eq!(layer.bounds[3], "50");
        // Malformed vector value leaves the previous geometry untouched.
        layer.set_attribute("bounds", "oops");
        assert_eq!(layer.bounds[2], "100");

        layer.clear_attribute("opacity");
        assert!(layer.opacity.is_none());
        let out = layer.to_element();
        assert_eq!(out.attr("opacity"), None, "cleared attribute must be omitted");
    }

    #[test]
    fn text_attributes_only_serialize_on_text_layers() {
        let mut layer = Layer::new("L", "L");
        layer.set_attribute("string", "Hello");
        assert_eq!(layer.to_element().attr("string"), None);

        layer.kind = LayerKind::Text;
        let out = layer.to_element();
        assert_eq!(out.attr("class"), Some("CATextLayer"));
        assert_eq!(out.attr("string"), Some("Hello"));
    }

    #[test]
    fn hidden_flag_roundtrip() {
        let el = XmlElement::parse(r#"<CALayer id="L" name="n" position="0 0" bounds="0 0 1 1" hidden="1"/>"#)
            .unwrap();
        let layer = Layer::from_element(&el).unwrap();
        assert!(layer.hidden);
        assert_eq!(layer.to_element().attr("hidden"), Some("true"));

        let mut shown = Layer::new("M", "m");
        shown.hidden = false;
        assert_eq!(shown.to_element().attr("hidden"), None);
    }
}
