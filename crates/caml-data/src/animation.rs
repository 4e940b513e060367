//! # Animation Nodes
//!
//! The three animation kinds a layer (or state/transition element) can
//! carry, discriminated by the `type` attribute on the markup element.
//!
//! ## Key Types
//! - `Animation`: closed variant over Keyframe, Spring, MatchMove.
//! - `AnimationTiming`: the shared timing attributes every kind embeds.
//! - `CaNumber` / `CgPoint`: typed value leaves inside keyframe lists.
//!
//! Every timing/flag field is kept as a raw optional string; a field absent
//! at load stays absent at save.

use tracing::debug;

use crate::codec;
use crate::xml::XmlElement;

/// Shared timing attributes common to all animation kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTiming {
    /// Animated key path. The source format treats this as defaulted:
    /// an element without `keyPath` animates `position`.
    pub key_path: String,
    pub begin_time: Option<String>,
    pub duration: Option<String>,
    pub fill_mode: Option<String>,
    pub removed_on_completion: Option<String>,
    pub repeat_count: Option<String>,
    pub repeat_duration: Option<String>,
    pub speed: Option<String>,
    pub time_offset: Option<String>,
    pub timing_function: Option<String>,
}

impl AnimationTiming {
    pub fn new(key_path: impl Into<String>) -> Self {
        Self {
            key_path: key_path.into(),
            begin_time: None,
            duration: None,
            fill_mode: None,
            removed_on_completion: None,
            repeat_count: None,
            repeat_duration: None,
            speed: None,
            time_offset: None,
            timing_function: None,
        }
    }

    fn from_element(el: &XmlElement) -> Self {
        Self {
            key_path: codec::get_string(el, "keyPath").unwrap_or_else(|| "position".to_string()),
            begin_time: codec::get_string(el, "beginTime"),
            duration: codec::get_string(el, "duration"),
            fill_mode: codec::get_string(el, "fillMode"),
            removed_on_completion: codec::get_string(el, "removedOnCompletion"),
            repeat_count: codec::get_string(el, "repeatCount"),
            repeat_duration: codec::get_string(el, "repeatDuration"),
            speed: codec::get_string(el, "speed"),
            time_offset: codec::get_string(el, "timeOffset"),
            timing_function: codec::get_string(el, "timingFunction"),
        }
    }

    fn write_into(&self, el: &mut XmlElement) {
        el.set_attr("keyPath", &self.key_path);
        codec::set_opt(el, "beginTime", self.begin_time.as_deref());
        codec::set_opt(el, "duration", self.duration.as_deref());
        codec::set_opt(el, "fillMode", self.fill_mode.as_deref());
        codec::set_opt(el, "removedOnCompletion", self.removed_on_completion.as_deref());
        codec::set_opt(el, "repeatCount", self.repeat_count.as_deref());
        codec::set_opt(el, "repeatDuration", self.repeat_duration.as_deref());
        codec::set_opt(el, "speed", self.speed.as_deref());
        codec::set_opt(el, "timeOffset", self.time_offset.as_deref());
        codec::set_opt(el, "timingFunction", self.timing_function.as_deref());
    }
}

/// A typed numeric leaf (`<real value="0.5"/>`, `<integer value="1"/>`, ...).
/// The element tag is preserved verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CaNumber {
    pub tag: String,
    pub value: Option<String>,
}

impl CaNumber {
    pub fn real(value: impl Into<String>) -> Self {
        Self {
            tag: "real".to_string(),
            value: Some(value.into()),
        }
    }

    fn from_element(el: &XmlElement) -> Self {
        Self {
            tag: el.name.clone(),
            value: codec::get_string(el, "value"),
        }
    }

    fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new(self.tag.clone());
        codec::set_opt(&mut el, "value", self.value.as_deref());
        el
    }
}

/// A `<CGPoint value="x y"/>` leaf inside a match-move source point list.
#[derive(Debug, Clone, PartialEq)]
pub struct CgPoint {
    pub value: Option<String>,
}

impl CgPoint {
    fn from_element(el: &XmlElement) -> Self {
        Self {
            value: codec::get_string(el, "value"),
        }
    }

    fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new("CGPoint");
        codec::set_opt(&mut el, "value", self.value.as_deref());
        el
    }
}

/// Keyframe animation: value lists sampled over key times.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeAnimation {
    /// Source element tag; keyframe animations also appear as `<p>`
    /// property elements carrying a `key` attribute.
    pub element_tag: String,
    pub key: Option<String>,
    pub timing: AnimationTiming,
    pub calculation_mode: Option<String>,
    pub additive: Option<String>,
    pub cumulative: Option<String>,
    pub key_times: Vec<CaNumber>,
    pub values: Vec<CaNumber>,
    /// Timing function child elements, carried opaquely.
    pub timing_functions: Vec<XmlElement>,
}

impl KeyframeAnimation {
    pub fn new(key_path: impl Into<String>) -> Self {
        Self {
            element_tag: "animation".to_string(),
            key: None,
            timing: AnimationTiming::new(key_path),
            calculation_mode: None,
            additive: None,
            cumulative: None,
            key_times: Vec::new(),
            values: Vec::new(),
            timing_functions: Vec::new(),
        }
    }

    fn from_element(el: &XmlElement) -> Self {
        let element_tag = el.name.clone();
        let key = if element_tag == "p" {
            codec::get_string(el, "key")
        } else {
            None
        };

        let mut anim = Self {
            element_tag,
            key,
            timing: AnimationTiming::from_element(el),
            calculation_mode: codec::get_string(el, "calculationMode"),
            additive: codec::get_string(el, "additive"),
            cumulative: codec::get_string(el, "cumulative"),
            key_times: Vec::new(),
            values: Vec::new(),
            timing_functions: Vec::new(),
        };
        if let Some(list) = el.find_child("keyTimes") {
            anim.key_times = list.children.iter().map(CaNumber::from_element).collect();
        }
        if let Some(list) = el.find_child("timingFunctions") {
            anim.timing_functions = list.children.clone();
        }
        if let Some(list) = el.find_child("values") {
            anim.values = list.children.iter().map(CaNumber::from_element).collect();
        }
        anim
    }

    fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new(self.element_tag.clone());
        el.set_attr("type", "CAKeyframeAnimation");
        self.timing.write_into(&mut el);
        codec::set_opt(&mut el, "calculationMode", self.calculation_mode.as_deref());
        codec::set_opt(&mut el, "additive", self.additive.as_deref());
        codec::set_opt(&mut el, "cumulative", self.cumulative.as_deref());
        if self.element_tag == "p" {
            codec::set_opt(&mut el, "key", self.key.as_deref());
        }

        if !self.key_times.is_empty() {
            let mut list = XmlElement::new("keyTimes");
            list.children = self.key_times.iter().map(CaNumber::to_element).collect();
            el.push(list);
        }
        if !self.timing_functions.is_empty() {
            let mut list = XmlElement::new("timingFunctions");
            list.children = self.timing_functions.clone();
            el.push(list);
        }
        if !self.values.is_empty() {
            let mut list = XmlElement::new("values");
            list.children = self.values.iter().map(CaNumber::to_element).collect();
            el.push(list);
        }
        el
    }
}

/// Spring animation: physical parameters, evaluation left to consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct SpringAnimation {
    pub element_tag: String,
    pub timing: AnimationTiming,
    pub damping: Option<String>,
    pub mass: Option<String>,
    pub stiffness: Option<String>,
    pub velocity: Option<String>,
    /// Vendor extension attribute (`mica_autorecalculatesDuration`).
    pub autorecalculates_duration: Option<String>,
}

impl SpringAnimation {
    pub fn new(key_path: impl Into<String>) -> Self {
        Self {
            element_tag: "animation".to_string(),
            timing: AnimationTiming::new(key_path),
            damping: None,
            mass: None,
            stiffness: None,
            velocity: None,
            autorecalculates_duration: None,
        }
    }

    fn from_element(el: &XmlElement) -> Self {
        Self {
            element_tag: el.name.clone(),
            timing: AnimationTiming::from_element(el),
            damping: codec::get_string(el, "damping"),
            mass: codec::get_string(el, "mass"),
            stiffness: codec::get_string(el, "stiffness"),
            velocity: codec::get_string(el, "velocity"),
            autorecalculates_duration: codec::get_string(el, "mica_autorecalculatesDuration"),
        }
    }

    fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new(self.element_tag.clone());
        el.set_attr("type", "CASpringAnimation");
        self.timing.write_into(&mut el);
        codec::set_opt(&mut el, "damping", self.damping.as_deref());
        codec::set_opt(&mut el, "mass", self.mass.as_deref());
        codec::set_opt(&mut el, "stiffness", self.stiffness.as_deref());
        codec::set_opt(&mut el, "velocity", self.velocity.as_deref());
        codec::set_opt(
            &mut el,
            "mica_autorecalculatesDuration",
            self.autorecalculates_duration.as_deref(),
        );
        el
    }
}

/// Match-move animation: binds a layer's movement to a source layer's
/// sampled points.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchMoveAnimation {
    pub element_tag: String,
    pub timing: AnimationTiming,
    pub additive: Option<String>,
    pub applies_x: Option<String>,
    pub applies_y: Option<String>,
    pub applies_scale: Option<String>,
    pub applies_rotation: Option<String>,
    pub targets_superlayer: Option<String>,
    pub uses_normalized_coordinates: Option<String>,
    /// `<sourceLayer .../>` child, carried opaquely.
    pub source_layer: Option<XmlElement>,
    pub source_points: Vec<CgPoint>,
    /// `<animationType .../>` child, carried opaquely.
    pub animation_type: Option<XmlElement>,
}

impl MatchMoveAnimation {
    pub fn new(key_path: impl Into<String>) -> Self {
        Self {
            element_tag: "animation".to_string(),
            timing: AnimationTiming::new(key_path),
            additive: None,
            applies_x: None,
            applies_y: None,
            applies_scale: None,
            applies_rotation: None,
            targets_superlayer: None,
            uses_normalized_coordinates: None,
            source_layer: None,
            source_points: Vec::new(),
            animation_type: None,
        }
    }

    fn from_element(el: &XmlElement) -> Self {
        let mut anim = Self {
            element_tag: el.name.clone(),
            timing: AnimationTiming::from_element(el),
            additive: codec::get_string(el, "additive"),
            applies_x: codec::get_string(el, "appliesX"),
            applies_y: codec::get_string(el, "appliesY"),
            applies_scale: codec::get_string(el, "appliesScale"),
            applies_rotation: codec::get_string(el, "appliesRotation"),
            targets_superlayer: codec::get_string(el, "targetsSuperlayer"),
            uses_normalized_coordinates: codec::get_string(el, "usesNormalizedCoordinates"),
            source_layer: el.find_child("sourceLayer").cloned(),
            source_points: Vec::new(),
            animation_type: el.find_child("animationType").cloned(),
        };
        if let Some(list) = el.find_child("sourcePoints") {
            anim.source_points = list.children.iter().map(CgPoint::from_element).collect();
        }
        anim
    }

    fn to_element(&self) -> XmlElement {
        let mut el = XmlElement::new(self.element_tag.clone());
        el.set_attr("type", "CAMatchMoveAnimation");
        self.timing.write_into(&mut el);
        codec::set_opt(&mut el, "additive", self.additive.as_deref());
        codec::set_opt(&mut el, "appliesX", self.applies_x.as_deref());
        codec::set_opt(&mut el, "appliesY", self.applies_y.as_deref());
        codec::set_opt(&mut el, "appliesScale", self.applies_scale.as_deref());
        codec::set_opt(&mut el, "appliesRotation", self.applies_rotation.as_deref());
        codec::set_opt(&mut el, "targetsSuperlayer", self.targets_superlayer.as_deref());
        codec::set_opt(
            &mut el,
            "usesNormalizedCoordinates",
            self.uses_normalized_coordinates.as_deref(),
        );

        if let Some(source_layer) = &self.source_layer {
            el.push(source_layer.clone());
        }
        if !self.source_points.is_empty() {
            let mut list = XmlElement::new("sourcePoints");
            list.children = self.source_points.iter().map(CgPoint::to_element).collect();
            el.push(list);
        }
        if let Some(animation_type) = &self.animation_type {
            el.push(animation_type.clone());
        }
        el
    }
}

/// An animation of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Animation {
    Keyframe(KeyframeAnimation),
    Spring(SpringAnimation),
    MatchMove(MatchMoveAnimation),
}

impl Animation {
    /// Builds an animation from a markup element, dispatching on its `type`
    /// attribute. Unknown kinds yield `None` and are skipped by callers.
    pub fn from_element(el: &XmlElement) -> Option<Animation> {
        match el.attr("type") {
            Some("CAKeyframeAnimation") => {
                Some(Animation::Keyframe(KeyframeAnimation::from_element(el)))
            }
            Some("CASpringAnimation") => {
                Some(Animation::Spring(SpringAnimation::from_element(el)))
            }
            Some("CAMatchMoveAnimation") => {
                Some(Animation::MatchMove(MatchMoveAnimation::from_element(el)))
            }
            other => {
                debug!(kind = ?other, tag = %el.name, "skipping unsupported animation element");
                None
            }
        }
    }

    pub fn to_element(&self) -> XmlElement {
        match self {
            Animation::Keyframe(a) => a.to_element(),
            Animation::Spring(a) => a.to_element(),
            Animation::MatchMove(a) => a.to_element(),
        }
    }

    pub fn timing(&self) -> &AnimationTiming {
        match self {
            Animation::Keyframe(a) => &a.timing,
            Animation::Spring(a) => &a.timing,
            Animation::MatchMove(a) => &a.timing,
        }
    }

    pub fn key_path(&self) -> &str {
        &self.timing().key_path
    }
}
