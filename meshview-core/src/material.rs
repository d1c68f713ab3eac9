/// Display modes, colors and the shading configurations derived from them
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How the current mesh is shaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Normal,
    Wireframe,
    #[serde(rename = "x-ray", alias = "xray")]
    XRay,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [DisplayMode::Normal, DisplayMode::Wireframe, DisplayMode::XRay];

    pub fn next(self) -> Self {
        match self {
            DisplayMode::Normal => DisplayMode::Wireframe,
            DisplayMode::Wireframe => DisplayMode::XRay,
            DisplayMode::XRay => DisplayMode::Normal,
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisplayMode::Normal => "normal",
            DisplayMode::Wireframe => "wireframe",
            DisplayMode::XRay => "x-ray",
        })
    }
}

impl FromStr for DisplayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(DisplayMode::Normal),
            "wireframe" => Ok(DisplayMode::Wireframe),
            "x-ray" | "xray" => Ok(DisplayMode::XRay),
            other => Err(format!("unknown display mode '{other}'")),
        }
    }
}

/// Linear RGB color with components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        (c(self.r), c(self.g), c(self.b))
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    /// Blend `self` over `below` with the given coverage.
    pub fn over(self, below: Color, alpha: f32) -> Self {
        Self::new(
            self.r * alpha + below.r * (1.0 - alpha),
            self.g * alpha + below.g * (1.0 - alpha),
            self.b * alpha + below.b * (1.0 - alpha),
        )
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parses `#rrggbb`, `rrggbb` or `#rgb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()
            .ok_or_else(|| format!("invalid color '{s}'"))?;
        match digits.as_slice() {
            [r1, r0, g1, g0, b1, b0] => Ok(Color::from_rgb8(r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0)),
            [r, g, b] => Ok(Color::from_rgb8(r * 17, g * 17, b * 17)),
            _ => Err(format!("invalid color '{s}'")),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, g, b) = self.to_rgb8();
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

/// Which faces are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Front,
    Double,
}

/// Lighting model
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shading {
    Standard { metalness: f32, roughness: f32 },
    Phong { shininess: f32 },
}

pub const XRAY_OPACITY: f32 = 0.5;

/// A surface's shading configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub mode: DisplayMode,
    pub shading: Shading,
    pub color: Color,
    pub wireframe: bool,
    pub transparent: bool,
    pub opacity: f32,
    pub depth_write: bool,
    pub side: Side,
}

impl Material {
    /// Shading configuration for a display mode and base color
    pub fn for_mode(mode: DisplayMode, color: Color) -> Self {
        let standard = Shading::Standard {
            metalness: 0.3,
            roughness: 0.5,
        };
        match mode {
            DisplayMode::Normal => Self {
                mode,
                shading: standard,
                color,
                wireframe: false,
                transparent: false,
                opacity: 1.0,
                depth_write: true,
                side: Side::Front,
            },
            DisplayMode::Wireframe => Self {
                wireframe: true,
                mode,
                ..Self::for_mode(DisplayMode::Normal, color)
            },
            DisplayMode::XRay => Self {
                mode,
                shading: Shading::Phong { shininess: 30.0 },
                color,
                wireframe: false,
                transparent: true,
                opacity: XRAY_OPACITY,
                depth_write: false,
                side: Side::Double,
            },
        }
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Fraction of light reflected as highlight, used by simple renderers.
    pub fn specular(&self) -> f32 {
        match self.shading {
            Shading::Standard { metalness, roughness } => metalness * (1.0 - roughness),
            Shading::Phong { shininess } => (shininess / 200.0).min(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_table() {
        let color = Color::new(0.0, 0.5, 1.0);

        let normal = Material::for_mode(DisplayMode::Normal, color);
        assert!(!normal.wireframe && !normal.transparent && normal.depth_write);
        assert_eq!(normal.opacity, 1.0);

        let wire = Material::for_mode(DisplayMode::Wireframe, color);
        assert!(wire.wireframe && !wire.transparent && wire.depth_write);
        assert_eq!(wire.shading, normal.shading);

        let xray = Material::for_mode(DisplayMode::XRay, color);
        assert!(xray.transparent && !xray.depth_write && !xray.wireframe);
        assert_eq!(xray.side, Side::Double);
        assert!((xray.opacity - 0.5).abs() < 1e-6);

        for mode in DisplayMode::ALL {
            let m = Material::for_mode(mode, color);
            assert_eq!(m.mode, mode);
            assert_eq!(m.color, color);
        }
    }

    #[test]
    fn test_set_color_keeps_mode() {
        let mut m = Material::for_mode(DisplayMode::XRay, Color::new(1.0, 0.0, 0.0));
        m.set_color(Color::new(0.0, 1.0, 0.0));
        assert_eq!(m.mode, DisplayMode::XRay);
        assert_eq!(m.color, Color::new(0.0, 1.0, 0.0));
        assert!(m.transparent);
    }

    #[test]
    fn test_color_parsing() {
        let c: Color = "#00b8d4".parse().unwrap();
        assert_eq!(c.to_rgb8(), (0x00, 0xb8, 0xd4));
        assert_eq!(c.to_string(), "#00b8d4");
        assert_eq!("fff".parse::<Color>().unwrap(), Color::new(1.0, 1.0, 1.0));
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
    }

    #[test]
    fn test_display_mode_parsing() {
        assert_eq!("X-Ray".parse::<DisplayMode>().unwrap(), DisplayMode::XRay);
        assert_eq!("wireframe".parse::<DisplayMode>().unwrap(), DisplayMode::Wireframe);
        assert!("solid".parse::<DisplayMode>().is_err());
        assert_eq!(DisplayMode::XRay.next(), DisplayMode::Normal);
    }
}
