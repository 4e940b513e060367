//! # Attribute Codec
//!
//! Typed reads and writes of scalar and vector attributes on markup
//! elements.
//!
//! The contract is deliberately asymmetric: reads tolerate garbage (a
//! malformed vector resolves to `None`, never an error), writes omit the
//! key entirely when the value is absent. Writing an empty placeholder for
//! an absent field would corrupt the absent-vs-present distinction the
//! round-trip invariant depends on.

use crate::error::CamlError;
use crate::xml::XmlElement;

/// Reads an optional string attribute.
pub fn get_string(el: &XmlElement, key: &str) -> Option<String> {
    el.attr(key).map(str::to_owned)
}

/// Reads a whitespace-separated `N`-component vector attribute.
///
/// Fails soft: an absent key or a component count other than `N` yields
/// `None`.
pub fn get_vector<const N: usize>(el: &XmlElement, key: &str) -> Option<[String; N]> {
    split_vector(el.attr(key)?)
}

/// Splits a raw attribute value into exactly `N` whitespace-separated
/// components; any other count yields `None`.
pub fn split_vector<const N: usize>(raw: &str) -> Option<[String; N]> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_owned).collect();
    parts.try_into().ok()
}

/// Reads a boolean flag attribute; `"1"` and `"true"` are truthy, anything
/// else (including absence) is false.
pub fn get_flag(el: &XmlElement, key: &str) -> bool {
    matches!(el.attr(key), Some("1") | Some("true"))
}

/// Writes the attribute only when a value is present.
pub fn set_opt(el: &mut XmlElement, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        el.set_attr(key, value);
    }
}

/// Reads a required string attribute, failing with the element's tag as
/// context.
pub fn require(el: &XmlElement, key: &str) -> Result<String, CamlError> {
    get_string(el, key).ok_or_else(|| CamlError::MissingAttribute {
        element: el.name.clone(),
        attribute: key.to_string(),
    })
}
