//! Chart styling: named colors per heater and the RGB/HSL arithmetic used
//! to derive target and fill colors from them.

use lunadeck_types::{ChartDataSet, ChartSeries};

/// Lightness added to a heater's color for its target line, in percent.
const TARGET_LIGHTEN: f64 = 25.0;

/// Alpha of the area fill under a value line.
const FILL_ALPHA: f64 = 0.1;

const NAMED_COLORS: &[(&str, &str)] = &[
    ("extruder", "#ff5252"),
    ("extruder1", "#d67600"),
    ("extruder2", "#830ee3"),
    ("extruder3", "#b366f2"),
    ("heater_bed", "#1fb0ff"),
    ("chamber", "#43b9ad"),
];

/// Base color for a series label, if it has one.
#[must_use]
pub fn named_color(label: &str) -> Option<&'static str> {
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, color)| *color)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rgb {
    r: f64,
    g: f64,
    b: f64,
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(f64::from)
    };
    Some(Rgb {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

/// (hue, saturation, lightness), each in 0..=1.
fn to_hsl(rgb: Rgb) -> (f64, f64, f64) {
    let (r, g, b) = (rgb.r / 255.0, rgb.g / 255.0, rgb.b / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if (max - r).abs() < f64::EPSILON {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = if t < 0.0 {
        t + 1.0
    } else if t > 1.0 {
        t - 1.0
    } else {
        t
    };
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn from_hsl(h: f64, s: f64, l: f64) -> Rgb {
    if s.abs() < f64::EPSILON {
        let v = l * 255.0;
        return Rgb { r: v, g: v, b: v };
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Rgb {
        r: hue_to_rgb(p, q, h + 1.0 / 3.0) * 255.0,
        g: hue_to_rgb(p, q, h) * 255.0,
        b: hue_to_rgb(p, q, h - 1.0 / 3.0) * 255.0,
    }
}

// Channels are clamped to 0..=255 before the cast
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn format_rgb(rgb: Rgb, alpha: Option<f64>) -> String {
    let (r, g, b) = (channel(rgb.r), channel(rgb.g), channel(rgb.b));
    match alpha {
        Some(a) => format!("rgba({r}, {g}, {b}, {a})"),
        None => format!("rgb({r}, {g}, {b})"),
    }
}

/// `#rrggbb` as `rgb(r, g, b)`.
#[must_use]
pub fn rgb_string(hex: &str) -> Option<String> {
    parse_hex(hex).map(|rgb| format_rgb(rgb, None))
}

/// `#rrggbb` as `rgba(r, g, b, a)`.
#[must_use]
pub fn rgba_string(hex: &str, alpha: f64) -> Option<String> {
    parse_hex(hex).map(|rgb| format_rgb(rgb, Some(alpha.clamp(0.0, 1.0))))
}

/// Raise lightness by `amount` percent and return the `rgb(..)` string.
#[must_use]
pub fn lighten(hex: &str, amount: f64) -> Option<String> {
    let (h, s, l) = to_hsl(parse_hex(hex)?);
    let l = (l + amount / 100.0).clamp(0.0, 1.0);
    Some(format_rgb(from_hsl(h, s, l), None))
}

/// Style one series: target lines are lighter and unfilled, value lines are
/// filled with a translucent copy of their color. Unnamed labels get no
/// colors at all.
pub(super) fn dataset(series: &ChartSeries) -> ChartDataSet {
    let mut set = ChartDataSet {
        data: series.data.clone(),
        label: series.label.clone(),
        display: false,
        radius: series.radius,
        span_gaps: true,
        border_width: 1,
        fill: None,
        border_color: None,
        background_color: None,
    };

    let is_target = series.label.contains("Target");
    let base = if is_target {
        named_color(&series.label.replace("Target", ""))
    } else {
        named_color(&series.label)
    };

    if let Some(color) = base {
        if is_target {
            set.fill = Some(false);
            set.border_color = lighten(color, TARGET_LIGHTEN);
        } else {
            set.fill = Some(true);
            set.border_color = rgb_string(color);
            set.background_color = rgba_string(color, FILL_ALPHA);
        }
    }
    set
}
