use ndarray::{Array3, ArrayView4, ArrayViewD, Axis, s};

use crate::{
    cmap::{ColorMap, grayscale_cmap},
    error::{GanvizError, GanvizResult},
    surface::Surface,
};

/// Rendering options shared by the tiling entry points.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DrawOptions {
    /// Gradient applied to single-channel data.
    pub cmap: ColorMap,
    /// Explicit color limits; defaults to the data min/max.
    pub clim: Option<(f32, f32)>,
    /// Separator line width in pixels.
    pub line_width: u32,
    /// Separator line color.
    pub line_color: [u8; 3],
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            cmap: grayscale_cmap(),
            clim: None,
            line_width: 2,
            line_color: [255, 0, 0],
        }
    }
}

/// Promote a batch to `[n, H, W, C]` form.
///
/// Accepted ranks: 2 (`[H, W]`, a single grayscale image), 3
/// (`[n, H, W]`), 4 (`[n, H, W, C]` with `C` in {1, 3, 4}). Anything
/// else is `InvalidShape`.
fn as_batch<'a>(images: ArrayViewD<'a, f32>) -> GanvizResult<ArrayView4<'a, f32>> {
    let promoted = match images.ndim() {
        0 | 1 => {
            return Err(GanvizError::invalid_shape(format!(
                "image batch must have rank 2..=4, got rank {}",
                images.ndim()
            )));
        }
        2 => images.insert_axis(Axis(0)).insert_axis(Axis(3)),
        3 => images.insert_axis(Axis(3)),
        4 => images,
        n => {
            return Err(GanvizError::invalid_shape(format!(
                "image batch has too many dimensions (rank {n})"
            )));
        }
    };
    let batch = promoted
        .into_dimensionality()
        .map_err(|e| GanvizError::invalid_shape(format!("batch promotion failed: {e}")))?;
    let channels = batch.len_of(Axis(3));
    if !matches!(channels, 1 | 3 | 4) {
        return Err(GanvizError::invalid_shape(format!(
            "image batch must have 1, 3 or 4 channels, got {channels}"
        )));
    }
    Ok(batch)
}

/// Arrange a batch of images on an `nx` x `ny` grid.
///
/// Cell `(i, j)` of the canvas receives batch element `i + j*nx`; cells
/// past the end of the batch stay zero-filled. Returns the
/// `[nx*H, ny*W, C]` canvas.
pub fn tile_images(
    images: ArrayViewD<'_, f32>,
    nx: usize,
    ny: usize,
) -> GanvizResult<Array3<f32>> {
    if nx == 0 || ny == 0 {
        return Err(GanvizError::validation("tile grid nx/ny must be non-zero"));
    }
    let batch = as_batch(images)?;
    let (n, h, w, c) = batch.dim();

    let mut canvas = Array3::<f32>::zeros((nx * h, ny * w, c));
    'fill: for j in 0..ny {
        for i in 0..nx {
            let idx = i + j * nx;
            if idx >= n {
                // Every later cell index is out of range too.
                tracing::warn!(
                    images = n,
                    cells = nx * ny,
                    "not enough images to tile the entire area"
                );
                break 'fill;
            }
            canvas
                .slice_mut(s![i * h..(i + 1) * h, j * w..(j + 1) * w, ..])
                .assign(&batch.index_axis(Axis(0), idx));
        }
    }
    Ok(canvas)
}

/// Tile a batch onto a surface and overlay grid separator lines.
///
/// When `surface` is `None`, a canvas of exactly the mosaic size is
/// allocated; an explicit surface must be at least that large. The
/// surface handle is returned for further composition.
pub fn draw_images(
    images: ArrayViewD<'_, f32>,
    nx: usize,
    ny: usize,
    opts: &DrawOptions,
    surface: Option<Surface>,
) -> GanvizResult<Surface> {
    let canvas = tile_images(images, nx, ny)?;
    let (th, tw, c) = canvas.dim();
    let (th_px, tw_px) = (th as u32, tw as u32);

    let mut surface = match surface {
        Some(s) => {
            if s.width() < tw_px || s.height() < th_px {
                return Err(GanvizError::validation(format!(
                    "surface {}x{} is smaller than the {}x{} mosaic",
                    s.width(),
                    s.height(),
                    tw_px,
                    th_px
                )));
            }
            s
        }
        None => Surface::new(tw_px.max(1), th_px.max(1))?,
    };

    if c == 1 {
        let clim = opts.clim.unwrap_or_else(|| min_max(canvas.iter().copied()));
        surface.blit(canvas.index_axis(Axis(2), 0), 0, 0, &opts.cmap, clim);
    } else {
        surface.blit_rgb(canvas.view(), 0, 0)?;
    }

    let h = th / nx;
    let w = tw / ny;
    for j in 1..ny {
        surface.draw_vline(
            (j * w) as f32 - 0.5,
            0,
            th_px,
            opts.line_width,
            opts.line_color,
        );
    }
    for i in 1..nx {
        surface.draw_hline(
            (i * h) as f32 - 0.5,
            0,
            tw_px,
            opts.line_width,
            opts.line_color,
        );
    }

    Ok(surface)
}

/// Min/max of an f32 stream, ignoring NaNs; `(0, 0)` when empty.
pub(crate) fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for v in values {
        if v.is_nan() {
            continue;
        }
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo.is_infinite() { (0.0, 0.0) } else { (lo, hi) }
}
