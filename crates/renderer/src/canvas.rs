//! Layered figure surface.
//!
//! A [`Canvas`] keeps three pixmaps: the static background (map boundary,
//! land, graticule, anything drawn once per chunk), the static overlay drawn
//! above the data (coastlines and borders) and the per-step frame. Each
//! step starts from a copy of the background, so clearing the previous
//! step's layers never requires redrawing the map.

use std::path::Path;

use image::RgbaImage;
use rusttype::Font;
use tiny_skia::{Pixmap, PixmapPaint, Transform};
use tracing::debug;

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::png;
use crate::text::{draw_segment_text, draw_text_item, TextItem, TextStyle};

pub struct Canvas {
    width: u32,
    height: u32,
    dpi: f32,
    background: Pixmap,
    overlay: Pixmap,
    frame: Pixmap,
    static_text: Vec<TextItem>,
    frame_text: Vec<TextItem>,
    font: Option<Font<'static>>,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dpi", &self.dpi)
            .field("font", &self.font.is_some())
            .field("frame_text", &self.frame_text.len())
            .finish()
    }
}

fn new_pixmap(width: u32, height: u32) -> RenderResult<Pixmap> {
    Pixmap::new(width, height).ok_or(RenderError::Pixmap { width, height })
}

impl Canvas {
    /// White figure of `width` x `height` pixels. `dpi` converts the point
    /// sizes used for text and line widths.
    pub fn new(width: u32, height: u32, dpi: f32, font: Option<Font<'static>>) -> RenderResult<Self> {
        let mut background = new_pixmap(width, height)?;
        background.fill(Color::WHITE.to_skia());
        let overlay = new_pixmap(width, height)?;
        let frame = background.clone();

        Ok(Self {
            width,
            height,
            dpi,
            background,
            overlay,
            frame,
            static_text: Vec::new(),
            frame_text: Vec::new(),
            font,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Points to pixels at the canvas resolution.
    #[inline]
    pub fn points(&self, pt: f32) -> f32 {
        pt * self.dpi / 72.0
    }

    pub fn background_mut(&mut self) -> &mut Pixmap {
        &mut self.background
    }

    pub fn overlay_mut(&mut self) -> &mut Pixmap {
        &mut self.overlay
    }

    pub fn frame_mut(&mut self) -> &mut Pixmap {
        &mut self.frame
    }

    pub fn frame(&self) -> &Pixmap {
        &self.frame
    }

    /// Drop everything drawn since the last frame started.
    pub fn clear_transient(&mut self) {
        self.frame = self.background.clone();
        self.frame_text.clear();
    }

    /// Start a new step from the cached background.
    pub fn begin_frame(&mut self) {
        self.clear_transient();
    }

    /// Text that belongs to the current step only.
    pub fn add_text(&mut self, text: impl Into<String>, x: f32, y: f32, style: TextStyle) {
        self.frame_text.push(TextItem {
            text: text.into(),
            x,
            y,
            style,
        });
    }

    /// Text kept on every following frame, e.g. colorbar ticks.
    pub fn add_static_text(&mut self, text: impl Into<String>, x: f32, y: f32, style: TextStyle) {
        self.static_text.push(TextItem {
            text: text.into(),
            x,
            y,
            style,
        });
    }

    pub fn frame_text(&self) -> &[TextItem] {
        &self.frame_text
    }

    /// Compose the current frame: data layers, then the overlay, then text.
    pub fn render(&self) -> RenderResult<RgbaImage> {
        let mut composed = self.frame.clone();
        composed.draw_pixmap(
            0,
            0,
            self.overlay.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );

        let px_per_pt = self.points(1.0);
        let texts = self.static_text.iter().chain(&self.frame_text);
        if self.font.is_none() {
            for item in texts.clone() {
                draw_segment_text(&mut composed, item, px_per_pt);
            }
        }

        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for px in composed.pixels() {
            let c = px.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        let mut image = RgbaImage::from_raw(self.width, self.height, rgba).ok_or(
            RenderError::Pixmap {
                width: self.width,
                height: self.height,
            },
        )?;

        if let Some(font) = &self.font {
            for item in texts {
                draw_text_item(&mut image, font, item, px_per_pt);
            }
        }
        Ok(image)
    }

    /// Render the current frame and write it as PNG.
    pub fn save_png(&self, path: &Path) -> RenderResult<()> {
        let image = self.render()?;
        png::write_png(path, image.as_raw(), self.width as usize, self.height as usize)?;
        debug!(path = %path.display(), "Frame saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Rect;

    fn pixel(image: &RgbaImage, x: u32, y: u32) -> [u8; 4] {
        image.get_pixel(x, y).0
    }

    #[test]
    fn test_begin_frame_restores_background() {
        let mut canvas = Canvas::new(20, 10, 100.0, None).unwrap();
        let land = Rect::from_xywh(0.0, 0.0, 10.0, 10.0).unwrap();
        canvas
            .background_mut()
            .fill_rect(land, &Color::LIGHTGRAY.paint(false), Transform::identity(), None);
        canvas.begin_frame();

        let data = Rect::from_xywh(5.0, 0.0, 10.0, 10.0).unwrap();
        canvas
            .frame_mut()
            .fill_rect(data, &Color::CORAL.paint(false), Transform::identity(), None);
        canvas.add_text("L", 5.0, 5.0, TextStyle::new(8.0, Color::BLACK));
        let first = canvas.render().unwrap();
        assert_eq!(pixel(&first, 7, 5), [255, 127, 80, 255]);

        canvas.begin_frame();
        assert!(canvas.frame_text().is_empty());
        let second = canvas.render().unwrap();
        assert_eq!(pixel(&second, 7, 5), [211, 211, 211, 255]);
        assert_eq!(pixel(&second, 15, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn test_overlay_is_drawn_over_data() {
        let mut canvas = Canvas::new(10, 10, 100.0, None).unwrap();
        let line = Rect::from_xywh(0.0, 4.0, 10.0, 2.0).unwrap();
        canvas
            .overlay_mut()
            .fill_rect(line, &Color::BLACK.paint(false), Transform::identity(), None);
        canvas.begin_frame();
        let all = Rect::from_xywh(0.0, 0.0, 10.0, 10.0).unwrap();
        canvas
            .frame_mut()
            .fill_rect(all, &Color::ROYALBLUE.paint(false), Transform::identity(), None);

        let image = canvas.render().unwrap();
        assert_eq!(pixel(&image, 3, 5), [0, 0, 0, 255]);
        assert_eq!(pixel(&image, 3, 1), [65, 105, 225, 255]);
    }

    #[test]
    fn test_points_to_pixels() {
        let canvas = Canvas::new(4, 4, 144.0, None).unwrap();
        assert_eq!(canvas.points(0.5), 1.0);
    }

    #[test]
    fn test_zero_size_fails() {
        assert!(matches!(
            Canvas::new(0, 10, 100.0, None),
            Err(RenderError::Pixmap { .. })
        ));
    }
}
