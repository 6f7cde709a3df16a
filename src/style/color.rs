//! CSS color helpers: alpha splitting, the per-id fallback palette and the
//! intensity ramp used by the department overlay.

use palette::{Mix, Srgb};

/// Fully transparent color, used when a style explicitly disables a channel.
pub const TRANSPARENT: &str = "rgba(0,0,0,0)";

/// Fallback colors for layers that come without any style.
const FALLBACK_PALETTE: [Srgb<u8>; 7] = [
    Srgb::new(0x60, 0xa5, 0xfa),
    Srgb::new(0x34, 0xd3, 0x99),
    Srgb::new(0xfb, 0xbf, 0x24),
    Srgb::new(0xfb, 0x71, 0x85),
    Srgb::new(0xa7, 0x8b, 0xfa),
    Srgb::new(0x22, 0xd3, 0xee),
    Srgb::new(0xf9, 0x73, 0x16),
];

const EMBER: Srgb<u8> = Srgb::new(245, 158, 11);
const RED: Srgb<u8> = Srgb::new(239, 68, 68);

// ============================================================================
// Alpha Splitting
// ============================================================================

/// A color string with its alpha channel split out.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitColor {
    /// The color without alpha (`rgb(r,g,b)`), or the input when untouched.
    pub color: String,
    /// Alpha in `[0, 1]`.
    pub alpha: f64,
}

/// Splits an `rgba(r,g,b,a)` string into an opaque `rgb(r,g,b)` color and
/// its alpha.
///
/// Channels are rounded and clamped to `[0, 255]`, alpha is clamped to
/// `[0, 1]`. Any other form (`rgb()`, hex, named colors, malformed `rgba()`)
/// is returned unchanged with alpha 1.
///
/// # Example
///
/// ```
/// use maplayer_compositor::split_color_alpha;
///
/// let split = split_color_alpha("rgba(255, 0, 0, 0.5)");
/// assert_eq!(split.color, "rgb(255,0,0)");
/// assert_eq!(split.alpha, 0.5);
///
/// let hex = split_color_alpha("#ff0000");
/// assert_eq!(hex.color, "#ff0000");
/// assert_eq!(hex.alpha, 1.0);
/// ```
pub fn split_color_alpha(color: &str) -> SplitColor {
    match parse_rgba(color) {
        Some(([r, g, b], a)) => {
            let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
            SplitColor {
                color: format!("rgb({},{},{})", channel(r), channel(g), channel(b)),
                alpha: a.clamp(0.0, 1.0),
            }
        }
        None => SplitColor {
            color: color.to_string(),
            alpha: 1.0,
        },
    }
}

/// Parses `rgba(<num>,<num>,<num>,<num>)` where every number is an unsigned
/// decimal (`12` or `12.5`). The function name is case-insensitive and
/// whitespace is allowed around every token.
fn parse_rgba(color: &str) -> Option<([f64; 3], f64)> {
    let s = color.trim();
    let (head, rest) = s.split_at_checked(4)?;
    if !head.eq_ignore_ascii_case("rgba") {
        return None;
    }
    let inner = rest.trim_start().strip_prefix('(')?.strip_suffix(')')?;

    let mut values = [0.0f64; 4];
    let mut parts = inner.split(',');
    for slot in values.iter_mut() {
        *slot = parse_unsigned_decimal(parts.next()?.trim())?;
    }
    if parts.next().is_some() {
        return None;
    }

    Some(([values[0], values[1], values[2]], values[3]))
}

fn parse_unsigned_decimal(token: &str) -> Option<f64> {
    let (int, frac) = match token.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (token, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(int) || frac.is_some_and(|f| !digits(f)) {
        return None;
    }
    token.parse().ok()
}

// ============================================================================
// Fallback Palette
// ============================================================================

/// Deterministic hash of a layer id: `h = h * 31 + code_unit`, wrapping at
/// 32 bits.
///
/// Hashes UTF-16 code units so ids map to the same palette slot as in the
/// web client that authored them.
pub fn layer_id_hash(id: &str) -> u32 {
    id.encode_utf16()
        .fold(0u32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as u32))
}

/// Returns the fallback color for a layer id as a `#rrggbb` string.
///
/// The same id always maps to the same color. An empty id hashes as `"layer"`.
pub fn fallback_color(id: &str) -> String {
    let key = if id.is_empty() { "layer" } else { id };
    let slot = layer_id_hash(key) as usize % FALLBACK_PALETTE.len();
    format!("#{:x}", FALLBACK_PALETTE[slot])
}

// ============================================================================
// Intensity Ramp
// ============================================================================

/// Maps an intensity in `[0, 1]` onto the ember-to-red ramp.
///
/// Values outside the range are clamped. Returns an `rgb(r,g,b)` string.
pub fn color_for_intensity(intensity: f64) -> String {
    let t = if intensity.is_nan() {
        0.0
    } else {
        intensity.clamp(0.0, 1.0)
    };
    let from: Srgb<f64> = EMBER.into_format();
    let to: Srgb<f64> = RED.into_format();
    let mixed = from.mix(to, t);
    let channel = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    format!(
        "rgb({},{},{})",
        channel(mixed.red),
        channel(mixed.green),
        channel(mixed.blue)
    )
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any in-range rgba() string splits into its rounded channels and alpha.
        #[test]
        fn rgba_roundtrips_channels(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255, a in 0.0f64..=1.0) {
            let input = format!("rgba({r}, {g}, {b}, {a})");
            let split = split_color_alpha(&input);
            prop_assert_eq!(split.color, format!("rgb({r},{g},{b})"));
            prop_assert!((split.alpha - a).abs() < 1e-9, "alpha {} != {}", split.alpha, a);
        }

        /// Hex strings are never decomposed.
        #[test]
        fn hex_passes_through(value in 0u32..0x0100_0000) {
            let input = format!("#{value:06x}");
            let split = split_color_alpha(&input);
            prop_assert_eq!(split.color, input);
            prop_assert_eq!(split.alpha, 1.0);
        }
    }
}
