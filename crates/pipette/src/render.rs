use pipette_common::{Rgb, SampledColor};
use tiny_skia::{BlendMode, Paint, Path, PathBuilder, PixmapMut, Stroke, Transform};
use wayland_client::QueueHandle;

use crate::pointer::CursorState;
use crate::pool::{BYTES_PER_PIXEL, PREVIEW_SIZE};
use crate::screencopy::CaptureGeometry;
use crate::state::State;
use crate::surface::OutputSurface;

/// Distance from the cursor to the preview's top-left corner.
pub const PREVIEW_CURSOR_OFFSET: i32 = PREVIEW_SIZE as i32 / 2;

const RING_CENTER: f32 = PREVIEW_SIZE as f32 / 2.0;
const RING_RADIUS: f32 = 30.0;
const OUTLINE_WIDTH: f32 = 22.0;
const FILL_WIDTH: f32 = 20.0;

/// Byte offset of the captured pixel shown at cursor `(x, y)`.
///
/// A y-inverted frame stores rows bottom-up, so the row is mirrored as
/// `height - y`. Rows and columns are clamped into the frame; for the
/// inverted `y == 0` case that lands on the last row.
pub fn sample_offset(geometry: &CaptureGeometry, y_invert: bool, x: i32, y: i32) -> usize {
    let max_col = geometry.width.saturating_sub(1) as i64;
    let max_row = geometry.height.saturating_sub(1) as i64;

    let row = if y_invert {
        geometry.height as i64 - y as i64
    } else {
        y as i64
    };
    let row = row.clamp(0, max_row) as usize;
    let col = (x as i64).clamp(0, max_col) as usize;

    row * geometry.stride as usize + col * BYTES_PER_PIXEL
}

pub fn sample(
    background: &[u8],
    geometry: &CaptureGeometry,
    y_invert: bool,
    x: i32,
    y: i32,
) -> Option<SampledColor> {
    let offset = sample_offset(geometry, y_invert, x, y);
    let bytes = background.get(offset..offset + BYTES_PER_PIXEL)?;
    let bytes: [u8; 4] = bytes.try_into().ok()?;
    Some(SampledColor::from_le_bytes(bytes, geometry.format))
}

/// Clears the preview region and draws the swatch ring: an `outline` ring
/// with `color` stroked slightly narrower on top.
pub fn paint_preview(preview: &mut [u8], color: Rgb, outline: Rgb) {
    preview.fill(0);

    let len = preview.len();
    let Some(mut pixmap) = PixmapMut::from_bytes(preview, PREVIEW_SIZE, PREVIEW_SIZE) else {
        log::error!("[render] preview region has {} bytes", len);
        return;
    };
    let Some(ring) = PathBuilder::from_circle(RING_CENTER, RING_CENTER, RING_RADIUS) else {
        return;
    };

    stroke_ring(&mut pixmap, &ring, outline, OUTLINE_WIDTH);
    stroke_ring(&mut pixmap, &ring, color, FILL_WIDTH);
}

fn stroke_ring(pixmap: &mut PixmapMut<'_>, ring: &Path, color: Rgb, width: f32) {
    let mut paint = Paint::default();
    // wl_shm ARGB8888 is BGRA in memory; tiny-skia writes RGBA.
    paint.set_color_rgba8(color.b, color.g, color.r, 0xFF);
    paint.blend_mode = BlendMode::Source;
    paint.anti_alias = true;

    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    pixmap.stroke_path(ring, &paint, &stroke, Transform::identity(), None);
}

impl OutputSurface {
    /// Moves the swatch under the cursor, samples the screenshot there and
    /// repaints. Returns `None` unless the capture has completed.
    pub fn render(
        &mut self,
        cursor: &CursorState,
        outline: Rgb,
        qh: &QueueHandle<State>,
    ) -> Option<SampledColor> {
        if !self.phase.can_render() {
            return None;
        }
        let handles = self.handles.as_ref()?;
        let pool = self.pool.as_mut()?;
        let geometry = self.capture.geometry?;

        let color = sample(
            pool.background(),
            &geometry,
            self.capture.y_invert,
            cursor.x,
            cursor.y,
        )?;

        handles.subsurface.set_position(
            cursor.x - PREVIEW_CURSOR_OFFSET,
            cursor.y - PREVIEW_CURSOR_OFFSET,
        );
        // A subsurface only moves on its next commit.
        handles.preview.attach(None, 0, 0);
        handles.preview.commit();

        let buffer: &_ = self
            .preview_buffer
            .get_or_insert_with(|| pool.create_preview_buffer(qh));

        paint_preview(pool.preview_mut(), color.rgb(), outline);

        handles.preview.set_buffer_scale(1);
        handles.preview.attach(Some(buffer), 0, 0);
        handles.preview.damage(0, 0, i32::MAX, i32::MAX);
        handles.preview.commit();
        handles.surface.commit();

        log::trace!(
            "[output {}] ({}, {}) -> {}",
            self.id,
            cursor.x,
            cursor.y,
            color.to_hex(true)
        );
        Some(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{PoolLayout, PREVIEW_STRIDE};
    use pipette_common::PixelFormat;

    const WIDTH: u32 = 1920;
    const HEIGHT: u32 = 1080;

    fn full_hd() -> CaptureGeometry {
        CaptureGeometry {
            format: PixelFormat::Xrgb8888,
            width: WIDTH,
            height: HEIGHT,
            stride: WIDTH * 4,
        }
    }

    /// Every pixel encodes its own position: blue = x, green = y, red = y >> 8.
    fn gradient(geometry: &CaptureGeometry) -> Vec<u8> {
        let mut data = vec![0u8; geometry.byte_len()];
        for y in 0..geometry.height as usize {
            for x in 0..geometry.width as usize {
                let offset = y * geometry.stride as usize + x * 4;
                data[offset] = x as u8;
                data[offset + 1] = y as u8;
                data[offset + 2] = (y >> 8) as u8;
            }
        }
        data
    }

    fn pixel(preview: &[u8], x: usize, y: usize) -> [u8; 4] {
        let offset = y * PREVIEW_STRIDE as usize + x * 4;
        preview[offset..offset + 4].try_into().unwrap()
    }

    fn preview_buffer() -> Vec<u8> {
        vec![0u8; PoolLayout::new(1, 1).preview.len]
    }

    #[test]
    fn test_sample_offset_upright() {
        let offset = sample_offset(&full_hd(), false, 960, 540);
        assert_eq!(offset, 540 * 1920 * 4 + 960 * 4);
    }

    #[test]
    fn test_sample_offset_inverted() {
        let geometry = full_hd();
        assert_eq!(
            sample_offset(&geometry, true, 100, 40),
            (1080 - 40) * 1920 * 4 + 100 * 4
        );
    }

    #[test]
    fn test_inverted_origin_is_clamped() {
        let geometry = full_hd();
        let offset = sample_offset(&geometry, true, 0, 0);
        assert_eq!(offset, 1079 * 1920 * 4);
        assert!(offset + 4 <= geometry.byte_len());
    }

    #[test]
    fn test_out_of_frame_cursor_is_clamped() {
        let geometry = full_hd();
        assert_eq!(sample_offset(&geometry, false, -5, -5), 0);
        assert_eq!(
            sample_offset(&geometry, false, 5000, 5000),
            1079 * 1920 * 4 + 1919 * 4
        );
    }

    #[test]
    fn test_inverted_row_matches_mirrored_upright_row() {
        let geometry = full_hd();
        let background = gradient(&geometry);
        for (x, y) in [(0, 1), (960, 540), (1919, 1079), (17, 300)] {
            let inverted = sample(&background, &geometry, true, x, y);
            let upright = sample(&background, &geometry, false, x, HEIGHT as i32 - y);
            assert_eq!(inverted, upright);
        }
    }

    #[test]
    fn test_full_hd_centre_sample() {
        let geometry = full_hd();
        let mut background = gradient(&geometry);
        let offset = 540 * 1920 * 4 + 960 * 4;
        background[offset..offset + 4].copy_from_slice(&[0x56, 0x34, 0x12, 0xFF]);

        let color = sample(&background, &geometry, false, 960, 540).unwrap();
        assert_eq!(color.packed, 0xFF12_3456);
        assert_eq!(color.to_hex(true), "#123456");
    }

    #[test]
    fn test_sample_with_padded_stride() {
        let geometry = CaptureGeometry {
            format: PixelFormat::Xrgb8888,
            width: 3,
            height: 2,
            stride: 16,
        };
        let mut background = vec![0u8; geometry.byte_len()];
        background[16 + 8..16 + 12].copy_from_slice(&[1, 2, 3, 0]);
        let color = sample(&background, &geometry, false, 2, 1).unwrap();
        assert_eq!(color.rgb(), Rgb::new(3, 2, 1));
    }

    #[test]
    fn test_short_background_yields_nothing() {
        let geometry = full_hd();
        assert!(sample(&[0u8; 16], &geometry, false, 960, 540).is_none());
    }

    #[test]
    fn test_preview_ring_colors() {
        let mut preview = preview_buffer();
        paint_preview(&mut preview, Rgb::new(0xFF, 0x80, 0x10), Rgb::black());

        // Inside the fill stroke, stored as BGRA.
        assert_eq!(pixel(&preview, 80, 50), [0x10, 0x80, 0xFF, 0xFF]);
        assert_eq!(pixel(&preview, 50, 20), [0x10, 0x80, 0xFF, 0xFF]);

        // Just outside the fill stroke only the outline shows.
        let edge = pixel(&preview, 90, 50);
        assert!(edge[0] < 0x40 && edge[1] < 0x40 && edge[2] < 0x40);
        assert!(edge[3] > 0xC0);
    }

    #[test]
    fn test_preview_outside_ring_is_cleared() {
        let mut preview = vec![0xEEu8; PoolLayout::new(1, 1).preview.len];
        paint_preview(&mut preview, Rgb::new(0xFF, 0xFF, 0xFF), Rgb::black());

        for y in 0..PREVIEW_SIZE as usize {
            for x in 0..PREVIEW_SIZE as usize {
                let dx = x as f32 + 0.5 - RING_CENTER;
                let dy = y as f32 + 0.5 - RING_CENTER;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance > RING_RADIUS + OUTLINE_WIDTH / 2.0 + 1.5
                    || distance < RING_RADIUS - OUTLINE_WIDTH / 2.0 - 1.5
                {
                    assert_eq!(pixel(&preview, x, y), [0, 0, 0, 0], "pixel {},{}", x, y);
                }
            }
        }
    }

    #[test]
    fn test_repaint_is_idempotent() {
        let color = Rgb::new(0x12, 0x34, 0x56);
        let mut first = preview_buffer();
        paint_preview(&mut first, color, Rgb::black());
        let mut second = first.clone();
        paint_preview(&mut second, color, Rgb::black());
        assert_eq!(first, second);
    }

    #[test]
    fn test_repaint_replaces_previous_color() {
        let mut preview = preview_buffer();
        paint_preview(&mut preview, Rgb::new(0xFF, 0, 0), Rgb::black());
        paint_preview(&mut preview, Rgb::new(0, 0, 0xFF), Rgb::black());
        assert_eq!(pixel(&preview, 80, 50), [0xFF, 0, 0, 0xFF]);
    }
}
