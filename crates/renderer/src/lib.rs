//! Drawing of the forecast figures.
//!
//! Provides the building blocks the plotting programs stack on a map:
//! - Basemap layers (boundary, land, graticule, coastlines, borders)
//! - Discrete colormaps from builtin palettes or colour tables
//! - Filled and line contours (marching squares)
//! - High/low markers, wind arrows, colorbar and annotations
//! - PNG output

pub mod annotate;
pub mod basemap;
pub mod canvas;
pub mod color;
pub mod colormap;
pub mod contour;
pub mod error;
pub mod extrema;
pub mod levels;
pub mod png;
pub mod quiver;
pub mod text;

pub use annotate::{
    add_vals_on_map, annotation, annotation_forecast, annotation_run, draw_colorbar, Location,
};
pub use basemap::{draw_basemap, BasemapLayers};
pub use canvas::Canvas;
pub use color::Color;
pub use colormap::{
    get_colormap, get_colormap_norm, truncate_colormap, ColormapKind, DiscreteColormap, Palette,
};
pub use contour::{
    fill_contours, line_contours, place_labels, render_labels, stroke_contours, LineStyle,
};
pub use error::{RenderError, RenderResult};
pub use extrema::{draw_extrema, find_extrema, marker, Extremum, ExtremumPoint};
pub use levels::{arange, levels_between, linspace};
pub use png::{encode_png, write_png};
pub use quiver::{draw_quiver, QuiverStyle};
pub use text::{load_font, HAlign, TextStyle, VAlign};
