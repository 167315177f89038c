//! Tests for PNG encoding of finished frames.
//!
//! Covers the choice between indexed and RGBA output, transparency and the
//! file writer.

use renderer::png::{encode_png, write_png};

// ============================================================================
// Helper functions
// ============================================================================

/// Colour type byte of the IHDR chunk.
fn color_type(png: &[u8]) -> u8 {
    png[25]
}

fn has_chunk(png: &[u8], name: &[u8; 4]) -> bool {
    png.windows(4).any(|w| w == name)
}

/// A frame like a precipitation map: background plus a few contour bands.
fn banded_frame(width: usize, height: usize, bands: usize) -> Vec<u8> {
    let palette = [
        [255, 255, 255, 255],
        [245, 245, 245, 255],
        [211, 211, 211, 255],
        [198, 219, 239, 255],
        [107, 174, 214, 255],
        [33, 113, 181, 255],
        [8, 48, 107, 255],
    ];
    let mut pixels = Vec::with_capacity(width * height * 4);
    for _y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&palette[(x * bands / width) % palette.len()]);
        }
    }
    pixels
}

// ============================================================================
// Format selection
// ============================================================================

#[test]
fn test_few_colours_are_indexed() {
    let pixels = banded_frame(64, 32, 5);
    let png = encode_png(&pixels, 64, 32).unwrap();

    assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    assert_eq!(color_type(&png), 3);
    assert!(has_chunk(&png, b"PLTE"));
    assert!(!has_chunk(&png, b"tRNS"));
}

#[test]
fn test_many_colours_fall_back_to_rgba() {
    let (width, height) = (32, 32);
    let mut pixels = Vec::with_capacity(width * height * 4);
    for i in 0..width * height {
        pixels.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 7, 255]);
    }
    let png = encode_png(&pixels, width, height).unwrap();
    assert_eq!(color_type(&png), 6);
    assert!(!has_chunk(&png, b"PLTE"));
}

#[test]
fn test_transparent_entries_get_trns() {
    let pixels = [0, 0, 0, 0, 255, 0, 0, 255];
    let png = encode_png(&pixels, 2, 1).unwrap();
    assert_eq!(color_type(&png), 3);
    assert!(has_chunk(&png, b"tRNS"));
}

#[test]
fn test_exactly_256_colours_stay_indexed() {
    let mut pixels = Vec::with_capacity(256 * 4);
    for i in 0..256u32 {
        pixels.extend_from_slice(&[i as u8, i as u8, i as u8, 255]);
    }
    let png = encode_png(&pixels, 16, 16).unwrap();
    assert_eq!(color_type(&png), 3);

    pixels.extend_from_slice(&[1, 2, 3, 255]);
    let png = encode_png(&pixels, 257, 1).unwrap();
    assert_eq!(color_type(&png), 6);
}

// ============================================================================
// Decoding round trip and errors
// ============================================================================

#[test]
fn test_large_frame_decodes_to_same_pixels() {
    // above the parallel palette threshold
    let (width, height) = (200, 120);
    let pixels = banded_frame(width, height, 7);
    let png = encode_png(&pixels, width, height).unwrap();

    let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (width as u32, height as u32));
    assert_eq!(decoded.as_raw(), &pixels);
}

#[test]
fn test_wrong_buffer_length_is_rejected() {
    assert!(encode_png(&[0, 0, 0], 1, 1).is_err());
}

#[test]
fn test_write_png_creates_folders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("euratl").join("winds10m_0003.png");
    write_png(&path, &banded_frame(8, 8, 2), 8, 8).unwrap();
    assert!(path.exists());
}
