// THEORY:
// The `ColorScale` turns a scalar sample into a fill color. It is a sequential
// scale: a continuous function from a numeric domain (by default [0, 100]) onto a
// gradient defined by a handful of evenly spaced color stops.
//
// Key architectural principles:
// 1.  **Normalize, Then Interpolate**: A value is first mapped to `t` in [0, 1]
//     relative to the domain, then located between two neighboring stops and
//     linearly blended. Values outside the domain clamp to the end colors, so an
//     out-of-range sample still renders as the extreme of the gradient.
// 2.  **Palettes as Data**: Each palette is a short list of stops. Viridis is the
//     default; the classic blue→yellow→red heat ramp is also available.
// 3.  **Shared Blending**: `Rgb::lerp` is used both here and by the cell binding
//     when it animates a cell from one color to the next.

/// A packed 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self::new((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Blends `self` toward `other`; `t` is clamped to [0, 1].
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let mix = |a: u8, b: u8| -> u8 { (a as f64 + (b as f64 - a as f64) * t).round() as u8 };
        Rgb {
            red: mix(self.red, other.red),
            green: mix(self.green, other.green),
            blue: mix(self.blue, other.blue),
        }
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.red, self.green, self.blue, 255]
    }
}

const VIRIDIS: [Rgb; 9] = [
    Rgb::from_hex(0x440154),
    Rgb::from_hex(0x472d7b),
    Rgb::from_hex(0x3b528b),
    Rgb::from_hex(0x2c728e),
    Rgb::from_hex(0x21918c),
    Rgb::from_hex(0x28ae80),
    Rgb::from_hex(0x5ec962),
    Rgb::from_hex(0xaddc30),
    Rgb::from_hex(0xfde725),
];

const HEAT: [Rgb; 3] = [
    Rgb::new(0, 0, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(255, 0, 0),
];

/// The gradients a scale can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Palette {
    #[default]
    Viridis,
    Heat,
}

impl Palette {
    pub fn stops(self) -> &'static [Rgb] {
        match self {
            Palette::Viridis => &VIRIDIS,
            Palette::Heat => &HEAT,
        }
    }
}

/// A sequential color scale over a numeric domain.
#[derive(Debug, Clone)]
pub struct ColorScale {
    domain: (f64, f64),
    stops: &'static [Rgb],
}

impl ColorScale {
    pub fn new(domain: (f64, f64), palette: Palette) -> Self {
        Self {
            domain,
            stops: palette.stops(),
        }
    }

    /// Position of `value` within the domain, clamped to [0, 1].
    pub fn normalize(&self, value: f64) -> f64 {
        let (low, high) = self.domain;
        let span = high - low;
        if span == 0.0 || !span.is_finite() {
            return 0.0;
        }
        let t = (value - low) / span;
        if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
    }

    pub fn color(&self, value: f64) -> Rgb {
        self.interpolate(self.normalize(value))
    }

    /// Samples the gradient at `t` in [0, 1].
    pub fn interpolate(&self, t: f64) -> Rgb {
        match self.stops {
            [] => Rgb::default(),
            [only] => *only,
            stops => {
                let segments = (stops.len() - 1) as f64;
                let scaled = t.clamp(0.0, 1.0) * segments;
                let index = (scaled.floor() as usize).min(stops.len() - 2);
                stops[index].lerp(stops[index + 1], scaled - index as f64)
            }
        }
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        Self::new((0.0, 100.0), Palette::Viridis)
    }
}
