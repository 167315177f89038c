//! Colormaps: continuous palettes and the level-binned maps used for filled
//! contours.
//!
//! Palettes come from a handful of built-in definitions or from RGBA table
//! files (`cmap_{name}.rgba`, a header row then four columns in 0..1).
//! [`get_colormap_norm`] turns a palette into a [`DiscreteColormap`] with one
//! colour per level: values in `[levels[i], levels[i+1])` take colour `i`,
//! values at or above the last level take the last colour and values below
//! the first level are left unfilled.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use forecast_common::ForecastConfig;
use tracing::debug;

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::levels::{is_increasing, linspace};

/// A control point of one channel: `below` is the value approached from the
/// left of `x`, `above` the value from the right.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Node {
    x: f64,
    below: f64,
    above: f64,
}

impl Node {
    const fn new(x: f64, below: f64, above: f64) -> Self {
        Self { x, below, above }
    }
}

/// Channel definition as `(x, below, above)` triples.
type ChannelDef = &'static [(f64, f64, f64)];

const GIST_STERN: [ChannelDef; 3] = [
    &[(0.0, 0.0, 0.0), (0.0547, 1.0, 1.0), (0.250, 0.027, 0.250), (1.0, 1.0, 1.0)],
    &[(0.0, 0.0, 0.0), (1.0, 1.0, 1.0)],
    &[(0.0, 0.0, 0.0), (0.5, 1.0, 1.0), (0.735, 0.0, 0.0), (1.0, 1.0, 1.0)],
];

const CMRMAP: [ChannelDef; 3] = [
    &[
        (0.000, 0.00, 0.00),
        (0.125, 0.15, 0.15),
        (0.250, 0.30, 0.30),
        (0.375, 0.60, 0.60),
        (0.500, 1.00, 1.00),
        (0.625, 0.90, 0.90),
        (0.750, 0.90, 0.90),
        (0.875, 0.90, 0.90),
        (1.000, 1.00, 1.00),
    ],
    &[
        (0.000, 0.00, 0.00),
        (0.125, 0.15, 0.15),
        (0.250, 0.15, 0.15),
        (0.375, 0.20, 0.20),
        (0.500, 0.25, 0.25),
        (0.625, 0.50, 0.50),
        (0.750, 0.75, 0.75),
        (0.875, 0.90, 0.90),
        (1.000, 1.00, 1.00),
    ],
    &[
        (0.000, 0.00, 0.00),
        (0.125, 0.50, 0.50),
        (0.250, 0.75, 0.75),
        (0.375, 0.50, 0.50),
        (0.500, 0.15, 0.15),
        (0.625, 0.00, 0.00),
        (0.750, 0.10, 0.10),
        (0.875, 0.50, 0.50),
        (1.000, 1.00, 1.00),
    ],
];

const BLUES: [&str; 9] = [
    "#f7fbff", "#deebf7", "#c6dbef", "#9ecae1", "#6baed6", "#4292c6", "#2171b5", "#08519c",
    "#08306b",
];

const PURD: [&str; 9] = [
    "#f7f4f9", "#e7e1ef", "#d4b9da", "#c994c7", "#df65b0", "#e7298a", "#ce1256", "#980043",
    "#67001f",
];

/// Fixed colours of the `snow_discrete` map, one per level.
pub const SNOW_DISCRETE: [&str; 11] = [
    "#DBF069", "#5AE463", "#E3BE45", "#65F8CA", "#32B8EB", "#1D64DE", "#E97BE4", "#F4F476",
    "#E78340", "#D73782", "#702072",
];

/// Continuous colour ramp over 0..1.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub name: String,
    /// Red, green, blue and alpha
    channels: [Vec<Node>; 4],
}

impl Palette {
    /// Evenly spaced colours, linearly interpolated.
    pub fn from_colors(name: impl Into<String>, colors: &[Color]) -> RenderResult<Self> {
        let name = name.into();
        if colors.is_empty() {
            return Err(RenderError::Palette {
                name,
                reason: "no colours".to_string(),
            });
        }

        let xs = if colors.len() == 1 {
            vec![0.0, 1.0]
        } else {
            linspace(0.0, 1.0, colors.len())
        };
        let pick = |k: usize| colors[k.min(colors.len() - 1)];
        let channel = |get: fn(&Color) -> u8| -> Vec<Node> {
            xs.iter()
                .enumerate()
                .map(|(k, &x)| {
                    let v = get(&pick(k)) as f64 / 255.0;
                    Node::new(x, v, v)
                })
                .collect()
        };

        Ok(Self {
            channels: [channel(|c| c.r), channel(|c| c.g), channel(|c| c.b), channel(|c| c.a)],
            name,
        })
    }

    /// Number of colour nodes of the ramp.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }

    fn segmented(name: &str, def: &[ChannelDef; 3]) -> Self {
        let channel = |d: ChannelDef| d.iter().map(|&(x, b, a)| Node::new(x, b, a)).collect();
        Self {
            name: name.to_string(),
            channels: [
                channel(def[0]),
                channel(def[1]),
                channel(def[2]),
                vec![Node::new(0.0, 1.0, 1.0), Node::new(1.0, 1.0, 1.0)],
            ],
        }
    }

    /// Built-in palette by name; a `_r` suffix reverses it.
    pub fn builtin(name: &str) -> Option<Self> {
        if let Some(base) = name.strip_suffix("_r") {
            return Self::builtin(base).map(|p| p.reversed());
        }

        let from_hex = |hex: &[&str]| -> Option<Self> {
            let colors: Option<Vec<Color>> = hex.iter().map(|h| Color::from_hex(h)).collect();
            Self::from_colors(name, &colors?).ok()
        };

        match name {
            "Blues" => from_hex(&BLUES),
            "PuRd" => from_hex(&PURD),
            "gist_stern" => Some(Self::segmented(name, &GIST_STERN)),
            "CMRmap" => Some(Self::segmented(name, &CMRMAP)),
            _ => None,
        }
    }

    /// Continuous palette from an RGBA table file.
    pub fn from_table(name: impl Into<String>, path: &Path) -> RenderResult<Self> {
        let colors = read_color_table(path)?;
        Self::from_colors(name, &colors)
    }

    /// The same ramp running from 1 to 0.
    pub fn reversed(&self) -> Self {
        let flip = |nodes: &Vec<Node>| -> Vec<Node> {
            nodes
                .iter()
                .rev()
                .map(|n| Node::new(1.0 - n.x, n.above, n.below))
                .collect()
        };
        let name = match self.name.strip_suffix("_r") {
            Some(base) => base.to_string(),
            None => format!("{}_r", self.name),
        };
        Self {
            name,
            channels: [
                flip(&self.channels[0]),
                flip(&self.channels[1]),
                flip(&self.channels[2]),
                flip(&self.channels[3]),
            ],
        }
    }

    /// Colour at `t` in 0..1 (clamped).
    pub fn sample(&self, t: f64) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let [r, g, b, a] = &self.channels;
        Color::from_unit(
            channel_value(r, t),
            channel_value(g, t),
            channel_value(b, t),
            channel_value(a, t),
        )
    }

    /// `n` colours from end to end.
    pub fn sample_n(&self, n: usize) -> Vec<Color> {
        linspace(0.0, 1.0, n).into_iter().map(|t| self.sample(t)).collect()
    }

    /// `n` opaque colours at the interior points of `n + 2` even steps, so
    /// the extreme ends of the ramp are never used.
    pub fn interior_colors(&self, n: usize) -> Vec<Color> {
        let points = linspace(0.0, 1.0, n + 2);
        points[1..=n].iter().map(|&t| self.sample(t).opaque()).collect()
    }
}

fn channel_value(nodes: &[Node], t: f64) -> f64 {
    let k = nodes.partition_point(|n| n.x < t);
    if k == 0 {
        return nodes.first().map_or(0.0, |n| n.above);
    }
    if k >= nodes.len() {
        return nodes.last().map_or(0.0, |n| n.below);
    }
    let (left, right) = (nodes[k - 1], nodes[k]);
    let span = right.x - left.x;
    if span <= 0.0 {
        return right.below;
    }
    let frac = (t - left.x) / span;
    left.above + frac * (right.below - left.above)
}

/// Read an RGBA table: a header row, then `r,g,b,a` rows in 0..1.
pub fn read_color_table(path: &Path) -> RenderResult<Vec<Color>> {
    let file = std::fs::File::open(path)?;
    let colors = parse_color_table(file, &path.display().to_string())?;
    debug!(path = %path.display(), colors = colors.len(), "Loaded colour table");
    Ok(colors)
}

/// Parse an RGBA table from any reader; `name` is only used in errors.
pub fn parse_color_table<R: Read>(reader: R, name: &str) -> RenderResult<Vec<Color>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut colors = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let values: Vec<f64> = record
            .iter()
            .filter(|field| !field.is_empty())
            .map(|field| field.parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| RenderError::Palette {
                name: name.to_string(),
                reason: format!("row {}: {}", row + 1, e),
            })?;
        if values.len() != 4 {
            return Err(RenderError::Palette {
                name: name.to_string(),
                reason: format!("row {} has {} columns, expected 4", row + 1, values.len()),
            });
        }
        colors.push(Color::from_unit(values[0], values[1], values[2], values[3]));
    }

    if colors.is_empty() {
        return Err(RenderError::Palette {
            name: name.to_string(),
            reason: "table has no colours".to_string(),
        });
    }
    Ok(colors)
}

/// The first `n` colours of a list, starting over when it is shorter.
pub fn cycle_colors(colors: &[Color], n: usize) -> Vec<Color> {
    if colors.is_empty() {
        return Vec::new();
    }
    colors.iter().cycle().take(n).map(|c| c.opaque()).collect()
}

/// Named colour schemes for filled contours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColormapKind {
    Rain,
    Snow,
    SnowDiscrete,
    RainAcc,
    RainNew,
    Winds,
    RainAccWxcharts,
    SnowWxcharts,
    WindsWxcharts,
}

impl ColormapKind {
    pub const ALL: [ColormapKind; 9] = [
        ColormapKind::Rain,
        ColormapKind::Snow,
        ColormapKind::SnowDiscrete,
        ColormapKind::RainAcc,
        ColormapKind::RainNew,
        ColormapKind::Winds,
        ColormapKind::RainAccWxcharts,
        ColormapKind::SnowWxcharts,
        ColormapKind::WindsWxcharts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColormapKind::Rain => "rain",
            ColormapKind::Snow => "snow",
            ColormapKind::SnowDiscrete => "snow_discrete",
            ColormapKind::RainAcc => "rain_acc",
            ColormapKind::RainNew => "rain_new",
            ColormapKind::Winds => "winds",
            ColormapKind::RainAccWxcharts => "rain_acc_wxcharts",
            ColormapKind::SnowWxcharts => "snow_wxcharts",
            ColormapKind::WindsWxcharts => "winds_wxcharts",
        }
    }

    /// Table file backing the scheme, if it is not built in.
    pub fn table(&self) -> Option<&'static str> {
        match self {
            ColormapKind::RainNew => Some("prec"),
            ColormapKind::Winds => Some("winds"),
            ColormapKind::RainAccWxcharts => Some("rain_acc_wxcharts"),
            ColormapKind::SnowWxcharts => Some("snow_wxcharts"),
            ColormapKind::WindsWxcharts => Some("winds_wxcharts"),
            _ => None,
        }
    }
}

impl fmt::Display for ColormapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColormapKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColormapKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| RenderError::UnknownColormap(s.to_string()))
    }
}

/// One colour per level with an open-ended top bin.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteColormap {
    levels: Vec<f64>,
    colors: Vec<Color>,
}

impl DiscreteColormap {
    /// `colors` must hold exactly one colour per level; the last one is used
    /// for everything at or above the last level.
    pub fn from_levels_and_colors(levels: &[f64], colors: Vec<Color>) -> RenderResult<Self> {
        if levels.len() < 2 {
            return Err(RenderError::Levels(format!(
                "need at least 2 levels, got {}",
                levels.len()
            )));
        }
        if !is_increasing(levels) {
            return Err(RenderError::Levels("levels must be increasing".to_string()));
        }
        if colors.len() != levels.len() {
            return Err(RenderError::Levels(format!(
                "{} levels need {} colours, got {}",
                levels.len(),
                levels.len(),
                colors.len()
            )));
        }
        Ok(Self {
            levels: levels.to_vec(),
            colors,
        })
    }

    /// Bin colours taken from a continuous palette at the bin midpoints,
    /// normalised over the level range.
    pub fn from_palette(palette: &Palette, levels: &[f64]) -> RenderResult<Self> {
        if levels.len() < 2 {
            return Err(RenderError::Levels(format!(
                "need at least 2 levels, got {}",
                levels.len()
            )));
        }
        let (lo, hi) = (levels[0], levels[levels.len() - 1]);
        let mut colors: Vec<Color> = levels
            .windows(2)
            .map(|w| palette.sample(((w[0] + w[1]) / 2.0 - lo) / (hi - lo)))
            .collect();
        colors.push(palette.sample(1.0));
        Self::from_levels_and_colors(levels, colors)
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Index of the colour for `value`; `None` below the first level or for
    /// NaN.
    #[inline]
    pub fn band(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < self.levels[0] {
            return None;
        }
        Some(self.levels.partition_point(|l| *l <= value) - 1)
    }

    pub fn color_for(&self, value: f64) -> Option<Color> {
        self.band(value).map(|i| self.colors[i])
    }

    /// Colour for values past the last level.
    pub fn over_color(&self) -> Color {
        self.colors[self.colors.len() - 1]
    }
}

/// Binned colormap of the given kind for `levels`.
pub fn get_colormap_norm(
    kind: ColormapKind,
    levels: &[f64],
    config: &ForecastConfig,
) -> RenderResult<DiscreteColormap> {
    let n = levels.len();
    let builtin = |name: &str| {
        Palette::builtin(name)
            .map(|p| p.interior_colors(n))
            .ok_or_else(|| RenderError::UnknownColormap(name.to_string()))
    };

    let colors = match kind {
        ColormapKind::Rain => builtin("Blues")?,
        ColormapKind::Snow => builtin("PuRd")?,
        ColormapKind::RainAcc => builtin("gist_stern_r")?,
        ColormapKind::SnowDiscrete => SNOW_DISCRETE
            .iter()
            .filter_map(|h| Color::from_hex(h))
            .collect(),
        ColormapKind::RainNew
        | ColormapKind::Winds
        | ColormapKind::RainAccWxcharts
        | ColormapKind::SnowWxcharts
        | ColormapKind::WindsWxcharts => {
            let table = kind
                .table()
                .ok_or_else(|| RenderError::UnknownColormap(kind.name().to_string()))?;
            let colors = read_color_table(&config.palette_path(table))?;
            cycle_colors(&colors, n)
        }
    };

    debug!(colormap = %kind, levels = n, "Built colormap");
    DiscreteColormap::from_levels_and_colors(levels, colors)
}

/// Continuous palette from the table `cmap_{name}.rgba`.
pub fn get_colormap(name: &str, config: &ForecastConfig) -> RenderResult<Palette> {
    Palette::from_table(name, &config.palette_path(name))
}

/// Cut `palette` down to the `min..max` part of its range, resampled to
/// `n` colours.
pub fn truncate_colormap(palette: &Palette, min: f64, max: f64, n: usize) -> RenderResult<Palette> {
    let colors: Vec<Color> = linspace(min, max, n)
        .into_iter()
        .map(|t| palette.sample(t))
        .collect();
    Palette::from_colors(format!("trunc({},{:.2},{:.2})", palette.name, min, max), &colors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        let cmap = DiscreteColormap::from_levels_and_colors(
            &[0.0, 1.0, 2.0],
            vec![Color::BLACK, Color::GRAY, Color::WHITE],
        )
        .unwrap();
        assert_eq!(cmap.band(-0.1), None);
        assert_eq!(cmap.band(f64::NAN), None);
        assert_eq!(cmap.band(0.0), Some(0));
        assert_eq!(cmap.band(0.99), Some(0));
        assert_eq!(cmap.band(1.0), Some(1));
        assert_eq!(cmap.band(2.0), Some(2));
        assert_eq!(cmap.band(1e9), Some(2));
        assert_eq!(cmap.over_color(), Color::WHITE);
    }

    #[test]
    fn test_color_count_must_match() {
        let err = DiscreteColormap::from_levels_and_colors(&[0.0, 1.0, 2.0], vec![Color::BLACK]);
        assert!(matches!(err, Err(RenderError::Levels(_))));
        let err = DiscreteColormap::from_levels_and_colors(&[1.0, 0.0], vec![Color::BLACK; 2]);
        assert!(matches!(err, Err(RenderError::Levels(_))));
    }

    #[test]
    fn test_reversed_palette() {
        let p = Palette::builtin("Blues").unwrap();
        let r = Palette::builtin("Blues_r").unwrap();
        assert_eq!(r.name, "Blues_r");
        assert_eq!(p.sample(0.0), r.sample(1.0));
        assert_eq!(p.sample(0.3), r.sample(0.7));
    }

    #[test]
    fn test_gist_stern_discontinuity() {
        let p = Palette::builtin("gist_stern").unwrap();
        // red drops to 0.027 just below 0.25 and restarts at 0.25 above it
        assert!(p.sample(0.2499).r < 12);
        assert!(p.sample(0.2501).r > 60);
        assert_eq!(p.sample(1.0), Color::WHITE);
    }

    #[test]
    fn test_interior_colors_skip_ends() {
        let p = Palette::builtin("Blues").unwrap();
        let colors = p.interior_colors(3);
        assert_eq!(colors.len(), 3);
        assert_ne!(colors[0], p.sample(0.0));
        assert_ne!(colors[2], p.sample(1.0));
        assert_eq!(colors[1], p.sample(0.5));
    }

    #[test]
    fn test_parse_color_table() {
        let table = "r,g,b,a\n1.0,0.0,0.0,1.0\n0.0,0.5,1.0,1.0\n";
        let colors = parse_color_table(table.as_bytes(), "test").unwrap();
        assert_eq!(colors, vec![Color::rgb(255, 0, 0), Color::rgb(0, 128, 255)]);

        let bad = "r,g,b,a\n1.0,0.0,0.0\n";
        assert!(matches!(
            parse_color_table(bad.as_bytes(), "bad"),
            Err(RenderError::Palette { .. }) | Err(RenderError::Csv(_))
        ));
    }

    #[test]
    fn test_cycle_colors() {
        let colors = [Color::BLACK, Color::WHITE.with_alpha(0.2)];
        assert_eq!(
            cycle_colors(&colors, 3),
            vec![Color::BLACK, Color::WHITE, Color::BLACK]
        );
        assert_eq!(cycle_colors(&colors, 1), vec![Color::BLACK]);
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in ColormapKind::ALL {
            assert_eq!(kind.name().parse::<ColormapKind>().unwrap(), kind);
        }
        assert!(matches!(
            "jet".parse::<ColormapKind>(),
            Err(RenderError::UnknownColormap(_))
        ));
    }
}
