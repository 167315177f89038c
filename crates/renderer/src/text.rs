//! Map text: TrueType rendering on the finished frame, with a stroked
//! seven-segment fallback when no font file could be loaded.

use std::path::PathBuf;

use image::RgbaImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{point, Font, Scale};
use tiny_skia::{LineCap, LineJoin, PathBuilder, Pixmap, Stroke, Transform};
use tracing::{debug, warn};

use crate::color::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// How a piece of text is drawn. Sizes are in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f32,
    pub color: Color,
    pub halign: HAlign,
    pub valign: VAlign,
    /// One pixel halo around the glyphs
    pub outline: Option<Color>,
    /// White box with a thin black border behind the text
    pub framed: bool,
}

impl TextStyle {
    /// Centred on the anchor, no halo, no frame.
    pub fn new(size_pt: f32, color: Color) -> Self {
        Self {
            size_pt,
            color,
            halign: HAlign::Center,
            valign: VAlign::Center,
            outline: None,
            framed: false,
        }
    }

    pub fn aligned(mut self, halign: HAlign, valign: VAlign) -> Self {
        self.halign = halign;
        self.valign = valign;
        self
    }

    pub fn outlined(mut self, color: Color) -> Self {
        self.outline = Some(color);
        self
    }

    pub fn framed(mut self) -> Self {
        self.framed = true;
        self
    }
}

/// Text waiting to be drawn at pixel position (`x`, `y`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub style: TextStyle,
}

/// First font among `candidates` that exists and parses.
pub fn load_font(candidates: &[PathBuf]) -> Option<Font<'static>> {
    for path in candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        match Font::try_from_vec(bytes) {
            Some(font) => {
                debug!(path = %path.display(), "Loaded map font");
                return Some(font);
            }
            None => warn!(path = %path.display(), "Font file could not be parsed"),
        }
    }
    warn!(
        tried = candidates.len(),
        "No usable font found, map text falls back to stroked digits"
    );
    None
}

/// Advance width and line height of `text`, in pixels.
pub fn text_extent(font: &Font<'_>, scale: Scale, text: &str) -> (f32, f32) {
    let v = font.v_metrics(scale);
    let width = font
        .layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0);
    (width, v.ascent - v.descent)
}

fn anchor_offset(width: f32, height: f32, style: &TextStyle) -> (f32, f32) {
    let dx = match style.halign {
        HAlign::Left => 0.0,
        HAlign::Center => -width / 2.0,
        HAlign::Right => -width,
    };
    let dy = match style.valign {
        VAlign::Top => 0.0,
        VAlign::Center => -height / 2.0,
        VAlign::Bottom => -height,
    };
    (dx, dy)
}

/// Draw `item` on the image with the TrueType font.
pub fn draw_text_item(image: &mut RgbaImage, font: &Font<'_>, item: &TextItem, px_per_pt: f32) {
    let size = item.style.size_pt * px_per_pt;
    let scale = Scale::uniform(size);
    let (width, height) = text_extent(font, scale, &item.text);
    let (dx, dy) = anchor_offset(width, height, &item.style);
    let left = (item.x + dx).round() as i32;
    let top = (item.y + dy).round() as i32;

    if item.style.framed {
        let pad = (size * 0.3).ceil() as i32;
        let w = width.ceil() as u32 + 2 * pad as u32;
        let h = height.ceil() as u32 + 2 * pad as u32;
        let rect = Rect::at(left - pad, top - pad).of_size(w.max(1), h.max(1));
        draw_filled_rect_mut(image, rect, Color::WHITE.to_image());
        draw_hollow_rect_mut(image, rect, Color::BLACK.to_image());
    }

    if let Some(halo) = item.style.outline {
        for (ox, oy) in [(-1, 0), (1, 0), (0, -1), (0, 1), (-1, -1), (1, 1), (-1, 1), (1, -1)] {
            draw_text_mut(
                image,
                halo.to_image(),
                left + ox,
                top + oy,
                scale,
                font,
                &item.text,
            );
        }
    }

    draw_text_mut(
        image,
        item.style.color.to_image(),
        left,
        top,
        scale,
        font,
        &item.text,
    );
}

/// Unit-box strokes of a glyph, (0, 0) top left and (1, 1) bottom right.
fn segment_glyph(ch: char) -> &'static [((f32, f32), (f32, f32))] {
    const TOP: ((f32, f32), (f32, f32)) = ((0.0, 0.0), (1.0, 0.0));
    const MID: ((f32, f32), (f32, f32)) = ((0.0, 0.5), (1.0, 0.5));
    const BOT: ((f32, f32), (f32, f32)) = ((0.0, 1.0), (1.0, 1.0));
    const UL: ((f32, f32), (f32, f32)) = ((0.0, 0.0), (0.0, 0.5));
    const LL: ((f32, f32), (f32, f32)) = ((0.0, 0.5), (0.0, 1.0));
    const UR: ((f32, f32), (f32, f32)) = ((1.0, 0.0), (1.0, 0.5));
    const LR: ((f32, f32), (f32, f32)) = ((1.0, 0.5), (1.0, 1.0));
    const LEFT: ((f32, f32), (f32, f32)) = ((0.0, 0.0), (0.0, 1.0));
    const RIGHT: ((f32, f32), (f32, f32)) = ((1.0, 0.0), (1.0, 1.0));
    const CENTRE: ((f32, f32), (f32, f32)) = ((0.5, 0.0), (0.5, 1.0));

    match ch {
        '0' => &[TOP, RIGHT, BOT, LEFT],
        '1' => &[CENTRE],
        '2' => &[TOP, UR, MID, LL, BOT],
        '3' => &[TOP, RIGHT, BOT, MID],
        '4' => &[UL, MID, RIGHT],
        '5' => &[TOP, UL, MID, LR, BOT],
        '6' => &[TOP, LEFT, BOT, LR, MID],
        '7' => &[TOP, ((1.0, 0.0), (0.5, 1.0))],
        '8' => &[TOP, RIGHT, BOT, LEFT, MID],
        '9' => &[MID, UR, TOP, UL, LR],
        '-' => &[MID],
        '.' => &[((0.5, 0.85), (0.5, 0.95))],
        'H' => &[LEFT, RIGHT, MID],
        'L' => &[LEFT, BOT],
        _ => &[],
    }
}

/// Stroke `item` straight onto the pixmap with segment glyphs. Characters
/// without a glyph leave a gap.
pub fn draw_segment_text(pixmap: &mut Pixmap, item: &TextItem, px_per_pt: f32) {
    let text = item.text.trim();
    let height = item.style.size_pt * px_per_pt;
    let char_width = height * 0.6;
    let spacing = height * 0.15;
    let count = text.chars().count() as f32;
    let width = (count * (char_width + spacing) - spacing).max(0.0);
    let (dx, dy) = anchor_offset(width, height, &item.style);
    let (left, top) = (item.x + dx, item.y + dy);

    let mut stroke = Stroke::default();
    stroke.width = (char_width * 0.15).max(0.8);
    stroke.line_cap = LineCap::Round;
    stroke.line_join = LineJoin::Round;
    let paint = item.style.color.paint(true);

    let mut pb = PathBuilder::new();
    for (i, ch) in text.chars().enumerate() {
        let x0 = left + i as f32 * (char_width + spacing);
        for &((ax, ay), (bx, by)) in segment_glyph(ch) {
            pb.move_to(x0 + ax * char_width, top + ay * height);
            pb.line_to(x0 + bx * char_width, top + by * height);
        }
    }
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}
