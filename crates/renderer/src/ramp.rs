//! Color ramps.

use serde::{Deserialize, Serialize};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }

        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Linear color interpolation
fn interpolate_color(color1: Color, color2: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;

    Color::new(
        ((color1.r as f64 * t_inv) + (color2.r as f64 * t)) as u8,
        ((color1.g as f64 * t_inv) + (color2.g as f64 * t)) as u8,
        ((color1.b as f64 * t_inv) + (color2.b as f64 * t)) as u8,
        ((color1.a as f64 * t_inv) + (color2.a as f64 * t)) as u8,
    )
}

const HOT: &[(f64, Color)] = &[
    (0.0, Color::rgb(0, 0, 0)),
    (0.4, Color::rgb(255, 0, 0)),
    (0.8, Color::rgb(255, 255, 0)),
    (1.0, Color::rgb(255, 255, 255)),
];

const COOL: &[(f64, Color)] = &[
    (0.0, Color::rgb(4, 20, 40)),
    (0.5, Color::rgb(0, 128, 255)),
    (1.0, Color::rgb(0, 255, 255)),
];

const VIRIDIS: &[(f64, Color)] = &[
    (0.0, Color::rgb(68, 1, 84)),
    (0.25, Color::rgb(59, 82, 139)),
    (0.5, Color::rgb(33, 145, 140)),
    (0.75, Color::rgb(94, 201, 98)),
    (1.0, Color::rgb(253, 231, 37)),
];

const GREYSCALE: &[(f64, Color)] = &[
    (0.0, Color::rgb(0, 0, 0)),
    (1.0, Color::rgb(255, 255, 255)),
];

/// Named gradient over [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorRamp {
    #[default]
    Hot,
    Cool,
    Viridis,
    Greyscale,
}

impl ColorRamp {
    /// Stops as `(position, color)`, positions ascending from 0 to 1.
    pub fn stops(&self) -> &'static [(f64, Color)] {
        match self {
            Self::Hot => HOT,
            Self::Cool => COOL,
            Self::Viridis => VIRIDIS,
            Self::Greyscale => GREYSCALE,
        }
    }

    /// Color at `t`, clamped to [0, 1]. NaN samples the low end.
    pub fn sample(&self, t: f64) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let stops = self.stops();

        for pair in stops.windows(2) {
            let (lo, lo_color) = pair[0];
            let (hi, hi_color) = pair[1];
            if t <= hi {
                return interpolate_color(lo_color, hi_color, (t - lo) / (hi - lo));
            }
        }

        stops[stops.len() - 1].1
    }
}
