//! # States and Transitions
//!
//! Named snapshots of property overrides and animation attachments
//! (`LKState`), plus directed edges between states carrying transient
//! spring animations (`LKStateTransition`).
//!
//! Applying a state is the only supported way states touch the structural
//! model: `SetValue` overwrites a target attribute, `AddAnimation` appends
//! to the target's animation list (cumulative, never replacing). Removing
//! animations when leaving a state is the renderer's policy, not the
//! model's.

use tracing::debug;

use crate::animation::Animation;
use crate::codec;
use crate::layer::Layer;
use crate::xml::XmlElement;

/// A property override inside a state (`LKStateSetValue`).
///
/// The value itself lives on a nested `<value value=".." type=".."/>`
/// child in markup.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSetValue {
    pub target_id: Option<String>,
    pub key_path: Option<String>,
    pub value: Option<String>,
    pub value_type: Option<String>,
}

/// An animation attachment inside a state (`LKStateAddAnimation`).
/// Carries keyframe and spring animations only.
#[derive(Debug, Clone, PartialEq)]
pub struct StateAddAnimation {
    pub target_id: Option<String>,
    pub key_path: Option<String>,
    pub animations: Vec<Animation>,
}

/// One element of a state, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum StateElement {
    SetValue(StateSetValue),
    AddAnimation(StateAddAnimation),
}

/// A named snapshot of overrides and attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: Option<String>,
    /// Whether the source carried an `elements` child at all; an empty
    /// `<elements/>` round-trips as empty, an absent one as absent.
    pub has_elements: bool,
    pub elements: Vec<StateElement>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            has_elements: false,
            elements: Vec::new(),
        }
    }

    pub fn from_element(el: &XmlElement) -> State {
        let elements_child = el.find_child("elements");
        let mut elements = Vec::new();
        if let Some(container) = elements_child {
            for child in &container.children {
                match child.name.as_str() {
                    "LKStateSetValue" => {
                        let value_child = child.children.first();
                        elements.push(StateElement::SetValue(StateSetValue {
                            target_id: codec::get_string(child, "targetId"),
                            key_path: codec::get_string(child, "keyPath"),
                            value: value_child.and_then(|v| codec::get_string(v, "value")),
                            value_type: value_child.and_then(|v| codec::get_string(v, "type")),
                        }));
                    }
                    "LKStateAddAnimation" => {
                        let animations = child
                            .find_children("animation")
                            .filter_map(Animation::from_element)
                            .filter(|a| match a {
                                Animation::Keyframe(_) | Animation::Spring(_) => true,
                                Animation::MatchMove(_) => {
                                    debug!("skipping match-move animation inside state attachment");
                                    false
                                }
                            })
                            .collect();
                        elements.push(StateElement::AddAnimation(StateAddAnimation {
                            target_id: codec::get_string(child, "targetId"),
                            key_path: codec::get_string(child, "keyPath"),
                            animations,
                        }));
                    }
                    other => debug!(tag = %other, "skipping unsupported state element"),
                }
            }
        }

        State {
            name: codec::get_string(el, "name"),
            has_elements: elements_child.is_some(),
            elements,
        }
    }

    pub fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new("LKState");
        codec::set_opt(&mut el, "name", self.name.as_deref());

        if self.has_elements || !self.elements.is_empty() {
            let mut container = XmlElement::new("elements");
            for element in &self.elements {
                container.push(match element {
                    StateElement::SetValue(sv) => {
                        let mut e = XmlElement::new("LKStateSetValue");
                        codec::set_opt(&mut e, "targetId", sv.target_id.as_deref());
                        codec::set_opt(&mut e, "keyPath", sv.key_path.as_deref());
                        let mut value = XmlElement::new("value");
                        codec::set_opt(&mut value, "value", sv.value.as_deref());
                        codec::set_opt(&mut value, "type", sv.value_type.as_deref());
                        e.push(value);
                        e
                    }
                    StateElement::AddAnimation(aa) => {
                        let mut e = XmlElement::new("LKStateAddAnimation");
                        codec::set_opt(&mut e, "targetId", aa.target_id.as_deref());
                        codec::set_opt(&mut e, "keyPath", aa.key_path.as_deref());
                        for animation in &aa.animations {
                            e.push(animation.to_element());
                        }
                        e
                    }
                });
            }
            el.push(container);
        }
        el
    }

    /// Applies every element of this state to the tree rooted at `root`.
    ///
    /// Targets are located by id from the given root (which may itself be
    /// the target). Missing targets and incomplete elements are skipped.
    pub fn apply_to(&self, root: &mut Layer) {
        for element in &self.elements {
            match element {
                StateElement::SetValue(sv) => {
                    let (Some(target_id), Some(key_path), Some(value)) =
                        (&sv.target_id, &sv.key_path, &sv.value)
                    else {
                        continue;
                    };
                    match target_layer_mut(root, target_id) {
                        Some(target) => target.set_attribute(key_path, value),
                        None => debug!(target = %target_id, "set-value target not found"),
                    }
                }
                StateElement::AddAnimation(aa) => {
                    let Some(target_id) = &aa.target_id else {
                        continue;
                    };
                    match target_layer_mut(root, target_id) {
                        Some(target) => {
                            target.animations.extend(aa.animations.iter().cloned());
                        }
                        None => debug!(target = %target_id, "add-animation target not found"),
                    }
                }
            }
        }
    }
}

fn target_layer_mut<'a>(root: &'a mut Layer, id: &str) -> Option<&'a mut Layer> {
    if root.id == id {
        Some(root)
    } else {
        root.find_layer_mut(id)
    }
}

/// One per-target override inside a transition
/// (`LKStateTransitionElement`); spring animations only.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionElement {
    pub key: Option<String>,
    pub target_id: Option<String>,
    pub animations: Vec<Animation>,
}

impl TransitionElement {
    pub fn from_element(el: &XmlElement) -> TransitionElement {
        TransitionElement {
            key: codec::get_string(el, "key"),
            target_id: codec::get_string(el, "targetId"),
            animations: el
                .find_children("animation")
                .filter_map(Animation::from_element)
                .filter(|a| match a {
                    Animation::Spring(_) => true,
                    _ => {
                        debug!("skipping non-spring animation inside transition element");
                        false
                    }
                })
                .collect(),
        }
    }

    pub fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new("LKStateTransitionElement");
        codec::set_opt(&mut el, "key", self.key.as_deref());
        codec::set_opt(&mut el, "targetId", self.target_id.as_deref());
        for animation in &self.animations {
            el.push(animation.to_element());
        }
        el
    }
}

/// A directed edge between two named states. `"*"` is the wildcard state
/// matching any source or destination.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub has_elements: bool,
    pub elements: Vec<TransitionElement>,
}

impl StateTransition {
    pub fn from_element(el: &XmlElement) -> StateTransition {
        let elements_child = el.find_child("elements");
        StateTransition {
            from_state: codec::get_string(el, "fromState"),
            to_state: codec::get_string(el, "toState"),
            has_elements: elements_child.is_some(),
            elements: elements_child
                .map(|container| {
                    container
                        .children
                        .iter()
                        .map(TransitionElement::from_element)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new("LKStateTransition");
        codec::set_opt(&mut el, "fromState", self.from_state.as_deref());
        codec::set_opt(&mut el, "toState", self.to_state.as_deref());
        if self.has_elements || !self.elements.is_empty() {
            let mut container = XmlElement::new("elements");
            for element in &self.elements {
                container.push(element.to_element());
            }
            el.push(container);
        }
        el
    }

    /// Whether this transition covers the given source state name,
    /// honouring the `"*"` wildcard.
    pub fn matches_from(&self, state: &str) -> bool {
        matches!(self.from_state.as_deref(), Some("*") | None)
            || self.from_state.as_deref() == Some(state)
    }

    /// Whether this transition covers the given destination state name.
    pub fn matches_to(&self, state: &str) -> bool {
        matches!(self.to_state.as_deref(), Some("*"))
            || self.to_state.as_deref() == Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;

    fn state_from(xml: &str) -> State {
        State::from_element(&XmlElement::parse(xml).unwrap())
    }

    #[test]
    fn set_value_overwrites_target_attribute() {
        let mut root = Layer::new("root", "Root");
        let mut child = Layer::new("L1", "Child");
        child.opacity = Some("1".to_string());
        root.add_sublayer(child).unwrap();

        let state = state_from(
            r#"<LKState name="Dim"><elements><LKStateSetValue targetId="L1" keyPath="opacity"><value value="0.5" type="real"/></LKStateSetValue></elements></LKState>"#,
        );
        state.apply_to(&mut root);
        assert_eq!(root.find_layer("L1").unwrap().opacity.as_deref(), Some("0.5"));

        // Applying again is idempotent for overwrites.
        state.apply_to(&mut root);
        assert_eq!(root.find_layer("L1").unwrap().opacity.as_deref(), Some("0.5"));
    }

    #[test]
    fn set_value_can_target_the_root_itself() {
        let mut root = Layer::new("root", "Root");
        let state = state_from(
            r#"<LKState name="S"><elements><LKStateSetValue targetId="root" keyPath="opacity"><value value="0" type="real"/></LKStateSetValue></elements></LKState>"#,
        );
        state.apply_to(&mut root);
        assert_eq!(root.opacity.as_deref(), Some("0"));
    }

    #[test]
    fn add_animation_is_cumulative() {
        let mut root = Layer::new("root", "Root");
        root.add_sublayer(Layer::new("L1", "Child")).unwrap();

        let state = state_from(
            r#"<LKState name="Bounce"><elements><LKStateAddAnimation targetId="L1" keyPath="position.y"><animation type="CASpringAnimation" keyPath="position.y" damping="10"/></LKStateAddAnimation></elements></LKState>"#,
        );
        state.apply_to(&mut root);
        state.apply_to(&mut root);
        assert_eq!(root.find_layer("L1").unwrap().animations.len(), 2);
    }

    #[test]
    fn add_animation_drops_match_move() {
        let state = state_from(
            r#"<LKState name="S"><elements><LKStateAddAnimation targetId="L1" keyPath="position"><animation type="CAMatchMoveAnimation" keyPath="position"/><animation type="CAKeyframeAnimation" keyPath="position"/></LKStateAddAnimation></elements></LKState>"#,
        );
        let StateElement::AddAnimation(aa) = &state.elements[0] else {
            panic!("expected add-animation element");
        };
        assert_eq!(aa.animations.len(), 1);
        assert!(matches!(aa.animations[0], Animation::Keyframe(_)));
    }

    #[test]
    fn elements_presence_roundtrips() {
        let bare = state_from(r#"<LKState name="Empty"/>"#);
        assert!(!bare.has_elements);
        assert!(bare.to_element().find_child("elements").is_none());

        let empty = state_from(r#"<LKState name="Empty"><elements/></LKState>"#);
        assert!(empty.has_elements);
        assert!(empty.to_element().find_child("elements").is_some());
    }

    #[test]
    fn set_value_without_value_child_stays_absent() {
        let state = state_from(
            r#"<LKState name="S"><elements><LKStateSetValue targetId="L1" keyPath="opacity"/></elements></LKState>"#,
        );
        let StateElement::SetValue(sv) = &state.elements[0] else {
            panic!("expected set-value element");
        };
        assert_eq!(sv.value, None);
        assert_eq!(sv.value_type, None);

        let out = state.to_element();
        let value = out
            .find_child("elements")
            .and_then(|e| e.children.first())
            .and_then(|sv| sv.children.first())
            .unwrap();
        assert!(value.attrs.is_empty(), "absent value must not serialize a placeholder");
    }

    #[test]
    fn states_built_in_code_serialize_like_loaded_ones() {
        let mut state = State::new("Highlight");
        state.elements.push(StateElement::SetValue(StateSetValue {
            target_id: Some("L1".to_string()),
            key_path: Some("opacity".to_string()),
            value: Some("0.25".to_string()),
            value_type: Some("real".to_string()),
        }));

        let out = state.to_element();
        assert_eq!(out.name, "LKState");
        assert_eq!(out.attr("name"), Some("Highlight"));
        let elements = out.find_child("elements").unwrap();
        assert_eq!(elements.children.len(), 1);
        assert_eq!(elements.children[0].name, "LKStateSetValue");
    }

    #[test]
    fn transition_wildcard_matching() {
        let el = XmlElement::parse(
            r#"<LKStateTransition fromState="*" toState="Expanded"><elements><LKStateTransitionElement key="opacity" targetId="L1"><animation type="CASpringAnimation" keyPath="opacity" damping="50" stiffness="300"/><animation type="CAKeyframeAnimation" keyPath="opacity"/></LKStateTransitionElement></elements></LKStateTransition>"#,
        )
        .unwrap();
        let transition = StateTransition::from_element(&el);

        assert!(transition.matches_from("anything"));
        assert!(transition.matches_to("Expanded"));
        assert!(!transition.matches_to("Collapsed"));
        // Transition elements accept spring animations only.
        assert_eq!(transition.elements[0].animations.len(), 1);

        let out = transition.to_element();
        assert_eq!(out.attr("fromState"), Some("*"));
        assert_eq!(out.attr("toState"), Some("Expanded"));
    }
}
