use crate::error::{GanvizError, GanvizResult};

/// A single gradient control point: position in `[0, 1]` plus RGB in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlPoint {
    pub pos: f32,
    pub rgb: [f32; 3],
}

/// Piecewise-linear color gradient over `[0, 1]`.
///
/// Values outside the domain clamp to the endpoint colors.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawColorMap")]
pub struct ColorMap {
    name: String,
    points: Vec<ControlPoint>,
}

/// Deserialization shadow; funnels loaded maps through [`ColorMap::new`].
#[derive(serde::Deserialize)]
struct RawColorMap {
    name: String,
    points: Vec<ControlPoint>,
}

impl TryFrom<RawColorMap> for ColorMap {
    type Error = GanvizError;

    fn try_from(raw: RawColorMap) -> GanvizResult<Self> {
        ColorMap::new(raw.name, raw.points)
    }
}

impl ColorMap {
    /// Create a gradient from control points sorted by position.
    pub fn new(name: impl Into<String>, points: Vec<ControlPoint>) -> GanvizResult<Self> {
        if points.len() < 2 {
            return Err(GanvizError::validation(
                "a color map needs at least two control points",
            ));
        }
        for pair in points.windows(2) {
            if pair[1].pos <= pair[0].pos {
                return Err(GanvizError::validation(
                    "color map control points must be strictly increasing",
                ));
            }
        }
        let first = points[0].pos;
        let last = points[points.len() - 1].pos;
        if first != 0.0 || last != 1.0 {
            return Err(GanvizError::validation(
                "color map control points must span [0, 1]",
            ));
        }
        Ok(Self {
            name: name.into(),
            points,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample the gradient at `t` (clamped into `[0, 1]`).
    pub fn sample(&self, t: f32) -> [f32; 3] {
        let t = t.clamp(0.0, 1.0);
        let mut i = 0;
        while i + 2 < self.points.len() && self.points[i + 1].pos < t {
            i += 1;
        }
        let a = self.points[i];
        let b = self.points[i + 1];
        let span = b.pos - a.pos;
        let frac = if span > 0.0 { (t - a.pos) / span } else { 0.0 };
        [
            a.rgb[0] + frac * (b.rgb[0] - a.rgb[0]),
            a.rgb[1] + frac * (b.rgb[1] - a.rgb[1]),
            a.rgb[2] + frac * (b.rgb[2] - a.rgb[2]),
        ]
    }

    /// Sample the gradient as 8-bit RGB.
    pub fn sample_u8(&self, t: f32) -> [u8; 3] {
        let [r, g, b] = self.sample(t);
        [to_u8(r), to_u8(g), to_u8(b)]
    }

    /// Map a raw data value through the gradient given color limits.
    ///
    /// A degenerate range (`lo == hi`) maps everything to the low end.
    pub fn map(&self, value: f32, clim: (f32, f32)) -> [u8; 3] {
        let (lo, hi) = clim;
        let t = if hi > lo { (value - lo) / (hi - lo) } else { 0.0 };
        self.sample_u8(t)
    }

    /// Quantize the gradient into an `ncolors`-entry lookup table.
    pub fn lut(&self, ncolors: usize) -> Vec<[u8; 3]> {
        let n = ncolors.max(2);
        (0..n)
            .map(|i| self.sample_u8(i as f32 / (n - 1) as f32))
            .collect()
    }
}

fn to_u8(x: f32) -> u8 {
    (x * 255.0).round().clamp(0.0, 255.0) as u8
}

// Built-in tables are static and already sorted; bypass the public validation.
fn from_table(name: &str, table: &[(f32, f32, f32, f32)]) -> ColorMap {
    ColorMap {
        name: name.to_string(),
        points: table
            .iter()
            .map(|&(pos, r, g, b)| ControlPoint { pos, rgb: [r, g, b] })
            .collect(),
    }
}

/// Color map similar to the one used for the Planck CMB map.
///
/// Eleven fixed control points, deep blue through white to deep red.
pub fn planck_cmap() -> ColorMap {
    const TABLE: [(f32, f32, f32, f32); 11] = [
        (0.0, 0.00, 0.00, 0.50),
        (0.1, 0.00, 0.00, 0.67),
        (0.2, 0.00, 0.00, 0.83),
        (0.3, 0.00, 0.30, 1.00),
        (0.4, 0.00, 0.70, 1.00),
        (0.5, 1.00, 1.00, 1.00),
        (0.6, 1.00, 0.70, 0.00),
        (0.7, 1.00, 0.30, 0.00),
        (0.8, 0.83, 0.00, 0.00),
        (0.9, 0.67, 0.00, 0.00),
        (1.0, 0.50, 0.00, 0.00),
    ];
    from_table("planck", &TABLE)
}

/// Approximate matplotlib "plasma", piecewise-linear through five anchors.
pub fn plasma_cmap() -> ColorMap {
    const TABLE: [(f32, f32, f32, f32); 5] = [
        (0.00, 0.050, 0.030, 0.530),
        (0.25, 0.417, 0.001, 0.658),
        (0.50, 0.798, 0.125, 0.424),
        (0.75, 0.973, 0.434, 0.098),
        (1.00, 0.940, 0.975, 0.131),
    ];
    from_table("plasma", &TABLE)
}

/// Black-to-white linear ramp.
pub fn grayscale_cmap() -> ColorMap {
    const TABLE: [(f32, f32, f32, f32); 2] = [(0.0, 0.0, 0.0, 0.0), (1.0, 1.0, 1.0, 1.0)];
    from_table("grayscale", &TABLE)
}
