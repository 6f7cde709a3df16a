//! Styling descriptions authored outside the compositor, and their
//! translation into renderer paint values.
//!
//! A [`StyleSpec`] arrives as JSON tagged by `kind`:
//!
//! ```json
//! { "kind": "simple", "stroke": "rgba(0,0,0,0.8)", "fill": null, "weight": 1.5 }
//! { "kind": "categorical", "property": "type",
//!   "stroke": { "default": "#333", "values": { "forest": "#228b22" } } }
//! { "kind": "graduated", "property": "pop",
//!   "rules": [ { "min": 0, "max": 10, "fill": "#aaa" } ] }
//! ```
//!
//! [`resolve_paint`] turns a style (or its absence) into a [`ResolvedPaint`]:
//! one color value and one opacity per channel plus the line width.

pub mod color;
pub mod expression;

use serde::de::{IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::settings::PaintDefaults;
use color::{TRANSPARENT, fallback_color, split_color_alpha};
use expression::{PaintValue, build_categorical_expression, build_graduated_expression};

// ============================================================================
// StyleSpec
// ============================================================================

/// How to paint one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StyleSpec {
    Simple(SimpleStyle),
    Categorical(CategoricalStyle),
    Graduated(GraduatedStyle),
}

/// A single stroke/fill pair for every feature.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct SimpleStyle {
    /// Stroke color. `None` means explicitly no stroke color.
    #[serde(deserialize_with = "lenient_color")]
    pub stroke: Option<String>,
    /// Fill color. `None` means explicitly no fill color.
    #[serde(deserialize_with = "lenient_color")]
    pub fill: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub weight: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub opacity: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub fill_opacity: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub stroke_enabled: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub fill_enabled: Option<bool>,
}

/// Colors chosen by the value of one feature property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct CategoricalStyle {
    #[serde(deserialize_with = "lenient_string")]
    pub property: String,
    pub stroke: Option<CategoryColors>,
    pub fill: Option<CategoryColors>,
    #[serde(deserialize_with = "lenient_number")]
    pub weight: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub opacity: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub fill_opacity: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub stroke_enabled: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub fill_enabled: Option<bool>,
}

/// Per-value colors for one channel of a [`CategoricalStyle`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct CategoryColors {
    /// Color for values with no entry.
    #[serde(deserialize_with = "lenient_color")]
    pub default: Option<String>,
    /// Value to color entries, in document order.
    #[serde(
        serialize_with = "serialize_entries",
        deserialize_with = "deserialize_entries"
    )]
    #[cfg_attr(
        feature = "jsonschema",
        schemars(with = "std::collections::BTreeMap<String, Option<String>>")
    )]
    pub values: Vec<CategoryEntry>,
}

/// One `value -> color` entry of a categorical style.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub value: String,
    pub color: Option<String>,
}

impl CategoryEntry {
    pub fn new(value: impl Into<String>, color: Option<String>) -> Self {
        Self {
            value: value.into(),
            color,
        }
    }

    /// The entry's color, if present and non-empty.
    pub fn color(&self) -> Option<&str> {
        non_empty(self.color.as_deref())
    }
}

/// Colors chosen by numeric ranges of one feature property.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct GraduatedStyle {
    #[serde(deserialize_with = "lenient_string")]
    pub property: String,
    /// Range rules, evaluated first-match in order. Entries that are not
    /// rule objects are dropped.
    #[serde(deserialize_with = "lenient_rules")]
    pub rules: Vec<GraduatedRule>,
    #[serde(deserialize_with = "lenient_number")]
    pub weight: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub opacity: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub fill_opacity: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub fill_enabled: Option<bool>,
}

/// One inclusive `[min, max]` rule of a graduated style.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct GraduatedRule {
    #[serde(deserialize_with = "lenient_number")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub max: Option<f64>,
    #[serde(deserialize_with = "lenient_color")]
    pub stroke: Option<String>,
    #[serde(deserialize_with = "lenient_color")]
    pub fill: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub stroke_enabled: Option<bool>,
}

impl GraduatedRule {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    pub fn with_stroke(mut self, color: impl Into<String>) -> Self {
        self.stroke = Some(color.into());
        self
    }

    pub fn with_fill(mut self, color: impl Into<String>) -> Self {
        self.fill = Some(color.into());
        self
    }

    pub fn with_stroke_enabled(mut self, enabled: bool) -> Self {
        self.stroke_enabled = Some(enabled);
        self
    }

    /// The `(min, max)` bounds when both are present and finite.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min.is_finite() && max.is_finite() => Some((min, max)),
            _ => None,
        }
    }

    /// The rule's color for `channel`, if present and non-empty.
    pub fn color(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Stroke => non_empty(self.stroke.as_deref()),
            Channel::Fill => non_empty(self.fill.as_deref()),
        }
    }
}

/// The two colorable channels of a vector layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Stroke,
    Fill,
}

// ============================================================================
// Resolution
// ============================================================================

/// Effective paint for one layer, before it is split across paint layers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPaint {
    pub stroke_color: PaintValue,
    pub stroke_opacity: f64,
    pub fill_color: PaintValue,
    pub fill_opacity: f64,
    pub line_width: f64,
    pub stroke_enabled: bool,
    pub fill_enabled: bool,
}

impl StyleSpec {
    fn weight(&self) -> Option<f64> {
        match self {
            Self::Simple(s) => s.weight,
            Self::Categorical(s) => s.weight,
            Self::Graduated(s) => s.weight,
        }
    }

    fn opacity(&self) -> Option<f64> {
        match self {
            Self::Simple(s) => s.opacity,
            Self::Categorical(s) => s.opacity,
            Self::Graduated(s) => s.opacity,
        }
    }

    fn fill_opacity(&self) -> Option<f64> {
        match self {
            Self::Simple(s) => s.fill_opacity,
            Self::Categorical(s) => s.fill_opacity,
            Self::Graduated(s) => s.fill_opacity,
        }
    }

    /// Whether outlines are drawn. A graduated style strokes if any rule
    /// does not explicitly disable it.
    pub fn stroke_enabled(&self) -> bool {
        match self {
            Self::Simple(s) => s.stroke_enabled != Some(false),
            Self::Categorical(s) => s.stroke_enabled != Some(false),
            Self::Graduated(s) => s.rules.iter().any(|r| r.stroke_enabled != Some(false)),
        }
    }

    /// Whether polygon interiors are drawn.
    pub fn fill_enabled(&self) -> bool {
        match self {
            Self::Simple(s) => s.fill_enabled != Some(false),
            Self::Categorical(s) => s.fill_enabled != Some(false),
            Self::Graduated(s) => s.fill_enabled != Some(false),
        }
    }
}

/// Resolves the single representative color of a channel.
///
/// - no style: `fallback`
/// - simple: the literal, or transparent when absent
/// - categorical: the first entry with a color, else the channel default,
///   else transparent (also when the whole channel is absent)
/// - graduated: the first rule carrying the channel, else `fallback`
pub fn effective_color(style: Option<&StyleSpec>, channel: Channel, fallback: &str) -> String {
    let resolved = match style {
        None => Some(fallback),
        Some(StyleSpec::Simple(s)) => match channel {
            Channel::Stroke => non_empty(s.stroke.as_deref()),
            Channel::Fill => non_empty(s.fill.as_deref()),
        },
        Some(StyleSpec::Categorical(s)) => category_colors(s, channel).and_then(|colors| {
            colors
                .values
                .iter()
                .find_map(CategoryEntry::color)
                .or_else(|| non_empty(colors.default.as_deref()))
        }),
        Some(StyleSpec::Graduated(s)) => s
            .rules
            .iter()
            .find_map(|r| r.color(channel))
            .or(Some(fallback)),
    };
    resolved.unwrap_or(TRANSPARENT).to_string()
}

fn category_colors(style: &CategoricalStyle, channel: Channel) -> Option<&CategoryColors> {
    match channel {
        Channel::Stroke => style.stroke.as_ref(),
        Channel::Fill => style.fill.as_ref(),
    }
}

/// Resolves the paint for a layer from its style, or from the per-id
/// fallback palette when it has none.
///
/// For simple styles, alpha embedded in an `rgba()` color is moved into
/// the channel opacity (declared opacity times color alpha). Expression
/// colors keep their declared opacity.
pub fn resolve_paint(id: &str, style: Option<&StyleSpec>, defaults: &PaintDefaults) -> ResolvedPaint {
    let palette_color = fallback_color(id);
    // A present style never falls back to the palette.
    let channel_fallback = if style.is_some() { TRANSPARENT } else { palette_color.as_str() };

    let line_width = finite_or(style.and_then(StyleSpec::weight), defaults.weight);
    let line_opacity = finite_or(style.and_then(StyleSpec::opacity), defaults.opacity);
    let fill_opacity = finite_or(style.and_then(StyleSpec::fill_opacity), defaults.fill_opacity);

    let (stroke_color, stroke_opacity) =
        channel_paint(style, Channel::Stroke, channel_fallback, line_opacity);
    let (fill_color, fill_opacity) =
        channel_paint(style, Channel::Fill, channel_fallback, fill_opacity);

    ResolvedPaint {
        stroke_color,
        stroke_opacity,
        fill_color,
        fill_opacity,
        line_width,
        stroke_enabled: style.is_none_or(StyleSpec::stroke_enabled),
        fill_enabled: style.is_none_or(StyleSpec::fill_enabled),
    }
}

fn channel_paint(
    style: Option<&StyleSpec>,
    channel: Channel,
    fallback: &str,
    opacity: f64,
) -> (PaintValue, f64) {
    let color = effective_color(style, channel, fallback);

    match style {
        Some(StyleSpec::Simple(_)) => {
            let split = split_color_alpha(&color);
            (PaintValue::Color(split.color), split.alpha * opacity)
        }
        Some(StyleSpec::Categorical(s)) if !s.property.is_empty() => {
            let colors = category_colors(s, channel);
            let default = colors
                .and_then(|c| non_empty(c.default.as_deref()))
                .unwrap_or(color.as_str());
            let values = colors.map(|c| c.values.as_slice()).unwrap_or_default();
            let expr = build_categorical_expression(&s.property, values, default);
            (expr.into(), opacity)
        }
        Some(StyleSpec::Graduated(s)) if !s.property.is_empty() => {
            let expr = build_graduated_expression(&s.property, &s.rules, channel, &color);
            (expr.into(), opacity)
        }
        _ => (PaintValue::Color(color), opacity),
    }
}

fn finite_or(value: Option<f64>, fallback: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(fallback)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

// ============================================================================
// Serde Helpers
// ============================================================================

/// Accepts a number or a numeric string; anything else (including `null`,
/// empty strings and non-finite values) reads as absent.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let n = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(n.filter(|n| n.is_finite()))
}

/// Accepts a string; any other value reads as absent.
fn lenient_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }))
}

/// Accepts a string; any other value reads as empty.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_color(deserializer)?.unwrap_or_default())
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_bool()))
}

/// Keeps the rule objects of a list; `null`, scalars and a non-list value
/// are dropped.
fn lenient_rules<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<GraduatedRule>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Array(items)) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(serde_json::Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn serialize_entries<S: Serializer>(entries: &[CategoryEntry], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for entry in entries {
        map.serialize_entry(&entry.value, &entry.color)?;
    }
    map.end()
}

fn deserialize_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<CategoryEntry>, D::Error> {
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<CategoryEntry>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of category values to colors")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_bool<E: serde::de::Error>(self, _: bool) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_i64<E: serde::de::Error>(self, _: i64) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_u64<E: serde::de::Error>(self, _: u64) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_f64<E: serde::de::Error>(self, _: f64) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_str<E: serde::de::Error>(self, _: &str) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            while access.next_element::<IgnoredAny>()?.is_some() {}
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((value, color)) = access.next_entry::<String, serde_json::Value>()? {
                let color = match color {
                    serde_json::Value::String(color) => Some(color),
                    _ => None,
                };
                entries.push(CategoryEntry { value, color });
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(EntriesVisitor)
}
