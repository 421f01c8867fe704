use std::path::Path;

use image::RgbImage;
use ndarray::{ArrayView2, ArrayView3};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::{
    cmap::ColorMap,
    error::{GanvizError, GanvizResult},
};

/// Destination rectangle in surface pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Text anchoring for [`Surface::draw_text`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    Center,
}

/// An owned RGB canvas.
///
/// This is the explicit drawing handle every ganviz operation works
/// against; there is no process-global "current" surface. The pixel
/// buffer is tightly packed RGB8, row-major from the top-left.
#[derive(Clone, Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> GanvizResult<Self> {
        if width == 0 || height == 0 {
            return Err(GanvizError::validation(
                "surface width/height must be non-zero",
            ));
        }
        Ok(Self {
            width,
            height,
            data: vec![0u8; (width as usize) * (height as usize) * 3],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&mut self, rgb: [u8; 3]) {
        for px in self.data.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
    }

    /// Read a pixel. `(x, y)` must lie inside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for a {}x{} surface",
            self.width,
            self.height
        );
        let i = ((y * self.width + x) * 3) as usize;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x < self.width && y < self.height {
            let i = ((y * self.width + x) * 3) as usize;
            self.data[i..i + 3].copy_from_slice(&rgb);
        }
    }

    /// Blit a 2D scalar array at 1:1 scale through a color map.
    ///
    /// Array rows map to surface rows starting at `(x0, y0)`; pixels
    /// falling outside the surface are clipped.
    pub fn blit(
        &mut self,
        array: ArrayView2<'_, f32>,
        x0: u32,
        y0: u32,
        cmap: &ColorMap,
        clim: (f32, f32),
    ) {
        for ((r, c), &v) in array.indexed_iter() {
            self.put_pixel(x0 + c as u32, y0 + r as u32, cmap.map(v, clim));
        }
    }

    /// Blit a 2D scalar array into `rect`, nearest-neighbor scaled,
    /// through a color map.
    pub fn blit_scaled(
        &mut self,
        array: ArrayView2<'_, f32>,
        rect: Rect,
        cmap: &ColorMap,
        clim: (f32, f32),
    ) {
        let (src_h, src_w) = array.dim();
        if src_h == 0 || src_w == 0 || rect.width == 0 || rect.height == 0 {
            return;
        }
        for dy in 0..rect.height {
            let sy = (dy as usize * src_h) / rect.height as usize;
            for dx in 0..rect.width {
                let sx = (dx as usize * src_w) / rect.width as usize;
                let rgb = cmap.map(array[[sy, sx]], clim);
                self.put_pixel(rect.x + dx, rect.y + dy, rgb);
            }
        }
    }

    /// Blit an `[H, W, C]` color array (`C` = 3 or 4, values in `[0, 1]`)
    /// verbatim at `(x0, y0)`. RGBA input is alpha-composited over the
    /// existing surface pixels.
    pub fn blit_rgb(&mut self, array: ArrayView3<'_, f32>, x0: u32, y0: u32) -> GanvizResult<()> {
        let (h, w, c) = array.dim();
        if c != 3 && c != 4 {
            return Err(GanvizError::invalid_shape(format!(
                "color blit expects 3 or 4 channels, got {c}"
            )));
        }
        for r in 0..h {
            for col in 0..w {
                let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                let rgb = [
                    to_byte(array[[r, col, 0]]),
                    to_byte(array[[r, col, 1]]),
                    to_byte(array[[r, col, 2]]),
                ];
                let (x, y) = (x0 + col as u32, y0 + r as u32);
                if c == 4 {
                    let a = array[[r, col, 3]].clamp(0.0, 1.0);
                    if x < self.width && y < self.height {
                        let bg = self.pixel(x, y);
                        let mixed = [
                            to_byte(array[[r, col, 0]] * a + (bg[0] as f32 / 255.0) * (1.0 - a)),
                            to_byte(array[[r, col, 1]] * a + (bg[1] as f32 / 255.0) * (1.0 - a)),
                            to_byte(array[[r, col, 2]] * a + (bg[2] as f32 / 255.0) * (1.0 - a)),
                        ];
                        self.put_pixel(x, y, mixed);
                    }
                } else {
                    self.put_pixel(x, y, rgb);
                }
            }
        }
        Ok(())
    }

    /// Paint a vertical line of `width` pixels centered on the
    /// fractional column position `pos` (e.g. `7.5` covers columns 7
    /// and 8 at width 2), spanning rows `[y0, y1)`.
    pub fn draw_vline(&mut self, pos: f32, y0: u32, y1: u32, width: u32, color: [u8; 3]) {
        let first = (pos - width as f32 / 2.0).ceil() as i64;
        for dx in 0..width as i64 {
            let x = first + dx;
            if x < 0 {
                continue;
            }
            for y in y0..y1.min(self.height) {
                self.put_pixel(x as u32, y, color);
            }
        }
    }

    /// Horizontal counterpart of [`Surface::draw_vline`].
    pub fn draw_hline(&mut self, pos: f32, x0: u32, x1: u32, width: u32, color: [u8; 3]) {
        let first = (pos - width as f32 / 2.0).ceil() as i64;
        for dy in 0..width as i64 {
            let y = first + dy;
            if y < 0 {
                continue;
            }
            for x in x0..x1.min(self.width) {
                self.put_pixel(x, y as u32, color);
            }
        }
    }

    /// Draw text with the plotters font stack.
    ///
    /// Fails when no usable system font is available; callers that must
    /// render on font-less hosts should skip annotations instead.
    pub fn draw_text(
        &mut self,
        text: &str,
        pos: (i32, i32),
        size: u32,
        color: [u8; 3],
        anchor: Anchor,
    ) -> GanvizResult<()> {
        let (w, h) = (self.width, self.height);
        let backend = BitMapBackend::with_buffer(&mut self.data, (w, h));
        let area = backend.into_drawing_area();
        let pa = match anchor {
            Anchor::TopLeft => Pos::new(HPos::Left, VPos::Top),
            Anchor::TopCenter => Pos::new(HPos::Center, VPos::Top),
            Anchor::Center => Pos::new(HPos::Center, VPos::Center),
        };
        let rgb = RGBColor(color[0], color[1], color[2]);
        let style = TextStyle::from(("sans-serif", size).into_font())
            .color(&rgb)
            .pos(pa);
        area.draw(&Text::new(text.to_string(), pos, style))
            .map_err(|e| GanvizError::render(format!("text draw failed: {e}")))?;
        area.present()
            .map_err(|e| GanvizError::render(format!("surface present failed: {e}")))?;
        Ok(())
    }

    /// Consume the surface into an `image` buffer.
    pub fn into_image(self) -> RgbImage {
        // Buffer length is width*height*3 by construction.
        RgbImage::from_raw(self.width, self.height, self.data)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> GanvizResult<()> {
        image::save_buffer(
            path.as_ref(),
            &self.data,
            self.width,
            self.height,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| GanvizError::encode(format!("failed to save surface: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmap::grayscale_cmap;
    use ndarray::Array2;

    #[test]
    fn new_rejects_zero_dimensions() {
        assert!(Surface::new(0, 8).is_err());
        assert!(Surface::new(8, 0).is_err());
    }

    #[test]
    fn fill_sets_every_pixel() {
        let mut s = Surface::new(4, 3).unwrap();
        s.fill([7, 8, 9]);
        assert_eq!(s.pixel(0, 0), [7, 8, 9]);
        assert_eq!(s.pixel(3, 2), [7, 8, 9]);
    }

    #[test]
    fn blit_maps_values_through_clim() {
        let mut s = Surface::new(2, 2).unwrap();
        let a = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 0.5, 1.0]).unwrap();
        s.blit(a.view(), 0, 0, &grayscale_cmap(), (0.0, 1.0));
        assert_eq!(s.pixel(0, 0), [0, 0, 0]);
        assert_eq!(s.pixel(1, 0), [255, 255, 255]);
        assert_eq!(s.pixel(0, 1), [128, 128, 128]);
    }

    #[test]
    fn blit_clips_at_surface_edge() {
        let mut s = Surface::new(2, 2).unwrap();
        let a = Array2::from_elem((4, 4), 1.0f32);
        s.blit(a.view(), 1, 1, &grayscale_cmap(), (0.0, 1.0));
        assert_eq!(s.pixel(0, 0), [0, 0, 0]);
        assert_eq!(s.pixel(1, 1), [255, 255, 255]);
    }

    #[test]
    fn blit_scaled_upsamples_nearest() {
        let mut s = Surface::new(4, 4).unwrap();
        let a = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        s.blit_scaled(a.view(), Rect::new(0, 0, 4, 4), &grayscale_cmap(), (0.0, 1.0));
        // Each source pixel covers a 2x2 block.
        assert_eq!(s.pixel(0, 0), [0, 0, 0]);
        assert_eq!(s.pixel(1, 1), [0, 0, 0]);
        assert_eq!(s.pixel(2, 0), [255, 255, 255]);
        assert_eq!(s.pixel(0, 3), [255, 255, 255]);
        assert_eq!(s.pixel(3, 3), [0, 0, 0]);
    }

    #[test]
    fn vline_at_half_pixel_boundary_covers_both_columns() {
        let mut s = Surface::new(16, 16).unwrap();
        s.draw_vline(7.5, 0, 16, 2, [255, 0, 0]);
        assert_eq!(s.pixel(7, 0), [255, 0, 0]);
        assert_eq!(s.pixel(8, 15), [255, 0, 0]);
        assert_eq!(s.pixel(6, 0), [0, 0, 0]);
        assert_eq!(s.pixel(9, 0), [0, 0, 0]);
    }

    #[test]
    fn hline_spans_requested_extent_only() {
        let mut s = Surface::new(8, 8).unwrap();
        s.draw_hline(3.5, 2, 6, 2, [1, 2, 3]);
        assert_eq!(s.pixel(2, 3), [1, 2, 3]);
        assert_eq!(s.pixel(5, 4), [1, 2, 3]);
        assert_eq!(s.pixel(1, 3), [0, 0, 0]);
        assert_eq!(s.pixel(6, 3), [0, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn pixel_outside_the_surface_panics() {
        let s = Surface::new(2, 2).unwrap();
        s.pixel(2, 0);
    }

    #[test]
    fn draw_text_returns_instead_of_panicking() {
        let mut s = Surface::new(32, 16).unwrap();
        // Hosts without a usable font stack get an Err, never a panic.
        match s.draw_text("ok", (2, 2), 10, [255, 255, 255], Anchor::TopLeft) {
            Ok(()) | Err(GanvizError::Render(_)) => {}
            other => panic!("unexpected draw_text result: {other:?}"),
        }
    }

    #[test]
    fn save_writes_a_png() {
        let dir = std::path::PathBuf::from("target").join("ganviz_tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("surface.png");
        let mut s = Surface::new(4, 4).unwrap();
        s.fill([0, 128, 255]);
        s.save(&path).unwrap();
        let back = image::open(&path).unwrap().into_rgb8();
        assert_eq!(back.get_pixel(2, 2).0, [0, 128, 255]);
    }

    #[test]
    fn into_image_preserves_pixels() {
        let mut s = Surface::new(3, 1).unwrap();
        s.put_pixel(1, 0, [10, 20, 30]);
        let img = s.into_image();
        assert_eq!(img.get_pixel(1, 0).0, [10, 20, 30]);
    }
}
