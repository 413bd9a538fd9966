//! Parsing and formatting of layer names.
//!
//! A layer is identified only by its name. Several layers can be shown on top of each other by
//! joining their names with `|`, and every part can carry a transparency suffix in curly braces:
//!
//! ```text
//! combined_layer := segment ("|" segment)*
//! segment        := name ("{" float "}")?       ; float in [0, 1]
//! ```
//!
//! `"A|B{0.5}"` shows layer `B` with 50% opacity on top of layer `A`.

use std::collections::HashSet;
use std::fmt::Display;

use log::warn;
use thiserror::Error;

/// Universal layer. Artists and callbacks on this layer are part of every layer.
pub const ALL_LAYER: &str = "all";
/// Prefix of the layers holding the artists of inset maps.
pub const INSET_PREFIX: &str = "__inset_";
/// Private layer holding the figure and axes background.
pub const BG_LAYER: &str = "__BG__";
/// Private layer holding the axes spines.
pub const SPINES_LAYER: &str = "__SPINES__";

/// Layer name format errors.
#[derive(Debug, Error, PartialEq)]
pub enum LayerNameError {
    /// A transparency suffix was opened with `{` but not closed with `}`.
    #[error("transparency suffix of layer {0:?} is not closed with '}}'")]
    UnclosedAlpha(String),
    /// The transparency suffix is not a number.
    #[error("invalid transparency suffix in layer {0:?}")]
    InvalidAlpha(String),
    /// Transparency outside of `[0, 1]`.
    #[error("transparency of layer {name:?} must be in [0, 1], got {alpha}")]
    AlphaOutOfRange {
        /// Layer name.
        name: String,
        /// The rejected value.
        alpha: f64,
    },
    /// Names starting with `__` are reserved for internal layers.
    #[error("layer names starting with '__' are reserved, got {0:?}")]
    Reserved(String),
    /// The name contains one of the characters used by the combined layer syntax.
    #[error("layer name {0:?} must not contain '{{' or '}}'")]
    InvalidCharacter(String),
}

/// One part of a combined layer name.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSegment {
    /// Simple layer name.
    pub name: String,
    /// Opacity of the layer.
    pub alpha: f64,
}

impl From<&str> for LayerSegment {
    fn from(name: &str) -> Self {
        Self {
            name: name.to_string(),
            alpha: 1.0,
        }
    }
}

impl From<String> for LayerSegment {
    fn from(name: String) -> Self {
        Self { name, alpha: 1.0 }
    }
}

impl From<&String> for LayerSegment {
    fn from(name: &String) -> Self {
        Self::from(name.as_str())
    }
}

impl<S: Into<String>> From<(S, f64)> for LayerSegment {
    fn from((name, alpha): (S, f64)) -> Self {
        Self {
            name: name.into(),
            alpha,
        }
    }
}

/// Input accepted by [`validate_name`]. Anything that is not a string is converted into one.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerInput {
    /// A string.
    Text(String),
    /// Anything else, already formatted.
    Other(String),
}

impl From<&str> for LayerInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for LayerInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

macro_rules! layer_input_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for LayerInput {
                fn from(value: $t) -> Self {
                    Self::Other(value.to_string())
                }
            }
        )*
    };
}

layer_input_from_display!(i32, i64, u32, u64, usize, f32, f64);

/// Splits a single layer name into the name and its transparency. Transparency defaults to 1.
pub fn parse_single(layer: &str) -> Result<(String, f64), LayerNameError> {
    let Some((name, rest)) = layer.split_once('{') else {
        return Ok((layer.to_string(), 1.0));
    };

    let Some(alpha) = rest.strip_suffix('}') else {
        return Err(LayerNameError::UnclosedAlpha(layer.to_string()));
    };

    let alpha = alpha
        .trim()
        .parse::<f64>()
        .map_err(|_| LayerNameError::InvalidAlpha(layer.to_string()))?;

    Ok((name.to_string(), alpha))
}

/// Splits a combined layer name into the simple names and their transparencies.
pub fn parse_multi(layer: &str) -> Result<(Vec<String>, Vec<f64>), LayerNameError> {
    let mut names = vec![];
    let mut alphas = vec![];
    for segment in layer.split('|') {
        let (name, alpha) = parse_single(segment)?;
        names.push(name);
        alphas.push(alpha);
    }

    Ok((names, alphas))
}

/// Simple layer names of a combined layer name, ignoring transparency.
///
/// Segments with malformed transparency are returned with the suffix stripped at the first `{`.
pub fn simple_names(layer: &str) -> Vec<String> {
    layer
        .split('|')
        .map(|segment| match segment.split_once('{') {
            Some((name, _)) => name.to_string(),
            None => segment.to_string(),
        })
        .collect()
}

/// Returns true if the layer name is combined of several layers or carries a transparency.
pub fn is_combined(layer: &str) -> bool {
    layer.contains('|') || layer.contains('{')
}

/// Returns true if all simple layers of `a` are also contained in `b`. Transparency is ignored.
pub fn is_subset(a: &str, b: &str) -> bool {
    let (Ok((names_a, _)), Ok((names_b, _))) = (parse_multi(a), parse_multi(b)) else {
        return false;
    };

    let names_b: HashSet<&str> = names_b.iter().map(String::as_str).collect();
    names_a.iter().all(|name| names_b.contains(name.as_str()))
}

/// Joins layers into a combined layer name.
///
/// ```
/// use eomaps::layer_name::combine;
///
/// assert_eq!(combine(["A", "B"]).unwrap(), "A|B");
/// assert_eq!(combine([("A", 1.0), ("B", 0.5)]).unwrap(), "A|B{0.5}");
/// ```
pub fn combine<I, S>(items: I) -> Result<String, LayerNameError>
where
    I: IntoIterator<Item = S>,
    S: Into<LayerSegment>,
{
    let mut parts = vec![];
    for item in items {
        let LayerSegment { name, alpha } = item.into();
        if !(0.0..=1.0).contains(&alpha) {
            return Err(LayerNameError::AlphaOutOfRange { name, alpha });
        }

        if alpha == 1.0 {
            parts.push(name);
        } else {
            parts.push(format!("{name}{{{alpha}}}"));
        }
    }

    Ok(parts.join("|"))
}

/// Checks that `layer` can be used as the name of a user layer.
///
/// Non-string input is converted to a string with a warning.
pub fn validate_name(layer: impl Into<LayerInput>) -> Result<String, LayerNameError> {
    let name = match layer.into() {
        LayerInput::Text(name) => name,
        LayerInput::Other(name) => {
            warn!("The layer name {name} is not a string and was converted to \"{name}\"");
            name
        }
    };

    if name.starts_with("__") && !name.starts_with(INSET_PREFIX) {
        return Err(LayerNameError::Reserved(name));
    }

    if name.contains('{') || name.contains('}') {
        return Err(LayerNameError::InvalidCharacter(name));
    }

    Ok(name)
}

/// Returns true for internal layers (names starting with `__`).
pub fn is_private(layer: &str) -> bool {
    layer.starts_with("__")
}

/// Name of the layer holding the artists of inset maps shown on `layer`.
pub fn inset_layer(layer: impl Display) -> String {
    format!("{INSET_PREFIX}{layer}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_single_layer() {
        assert_eq!(parse_single("A").expect("valid"), ("A".to_string(), 1.0));
        assert_eq!(
            parse_single("A{0.25}").expect("valid"),
            ("A".to_string(), 0.25)
        );
        assert_matches!(parse_single("A{0.25"), Err(LayerNameError::UnclosedAlpha(_)));
        assert_matches!(parse_single("A{x}"), Err(LayerNameError::InvalidAlpha(_)));
    }

    #[test]
    fn parse_multi_layer() {
        let (names, alphas) = parse_multi("A|B{0.5}|C").expect("valid");
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(alphas, [1.0, 0.5, 1.0]);
    }

    #[test]
    fn round_trip() {
        for layer in ["A", "A|B", "A|B{0.5}", "A{0.3}|B{0.75}|C", "base|__inset_x{0.1}"] {
            let (names, alphas) = parse_multi(layer).expect("valid");
            let combined = combine(names.into_iter().zip(alphas)).expect("valid");
            assert_eq!(combined, layer);
        }
    }

    #[test]
    fn subset_ignores_transparency() {
        assert!(is_subset("A{0.3}|B", "A|B|C"));
        assert!(is_subset("A|B", "A|B|C"));
        assert!(!is_subset("A|D", "A|B"));
        assert!(is_subset("B", "A|B{0.1}"));
        assert!(!is_subset("A{", "A"));
    }

    #[test]
    fn combine_checks_alpha() {
        assert_eq!(combine(["A", "B"]).expect("valid"), "A|B");
        assert_matches!(
            combine([("A", 1.5)]),
            Err(LayerNameError::AlphaOutOfRange { .. })
        );
        assert_matches!(
            combine([("A", -0.1)]),
            Err(LayerNameError::AlphaOutOfRange { .. })
        );
    }

    #[test]
    fn reserved_names() {
        assert_matches!(validate_name("__foo"), Err(LayerNameError::Reserved(_)));
        assert_eq!(validate_name("__inset_foo").expect("valid"), "__inset_foo");
        assert_matches!(
            validate_name("a{b"),
            Err(LayerNameError::InvalidCharacter(_))
        );
        assert_eq!(validate_name(5).expect("valid"), "5");
    }

    #[test]
    fn combined_detection() {
        assert!(is_combined("A|B"));
        assert!(is_combined("A{0.5}"));
        assert!(!is_combined("A"));
        assert_eq!(simple_names("A{0.5}|B"), ["A", "B"]);
    }
}
