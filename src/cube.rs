use ndarray::{Array2, ArrayView3, Axis, s};

use crate::{
    error::{GanvizError, GanvizResult},
    surface::Surface,
    tile::{DrawOptions, min_max},
};

/// Size-policy collaborator: decides how many cube slices go on one
/// mosaic row given the cube's leading dimension.
pub trait RowPolicy {
    fn images_per_row(&self, x_dim: usize) -> usize;
}

/// Stock heuristic: the power of two nearest to `sqrt(x)`, clamped to
/// `[1, x]`, so mosaics come out roughly square with power-of-two rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRowPolicy;

impl RowPolicy for DefaultRowPolicy {
    fn images_per_row(&self, x_dim: usize) -> usize {
        if x_dim <= 1 {
            return 1;
        }
        let target = (x_dim as f64).sqrt();
        let exp = target.log2().round().max(0.0) as u32;
        (1usize << exp.min(usize::BITS - 1)).clamp(1, x_dim)
    }
}

/// Fixed row width, mostly for tests and callers with a known layout.
#[derive(Clone, Copy, Debug)]
pub struct FixedRowPolicy(pub usize);

impl RowPolicy for FixedRowPolicy {
    fn images_per_row(&self, _x_dim: usize) -> usize {
        self.0
    }
}

/// Flatten a cube's leading-axis slices into one 2D mosaic.
///
/// An `[X, Y, Z]` cube becomes `[(X/r)*Y, r*Z]` with `r` slices per
/// row, `r` supplied by the policy. Slice `m` lands at mosaic block
/// `(m / r, m % r)`. When `X` is not an exact multiple of `r` the
/// trailing slices are dropped with a warning.
pub fn tile_cube_to_2d(
    cube: ArrayView3<'_, f32>,
    policy: &dyn RowPolicy,
) -> GanvizResult<Array2<f32>> {
    let (x_dim, y_dim, z_dim) = cube.dim();
    let per_row = policy.images_per_row(x_dim);
    if per_row == 0 || per_row > x_dim {
        return Err(GanvizError::invalid_shape(format!(
            "row policy returned {per_row} images per row for a cube of depth {x_dim}"
        )));
    }

    let rows = x_dim / per_row;
    let dropped = x_dim - rows * per_row;
    if dropped > 0 {
        tracing::warn!(
            dropped,
            depth = x_dim,
            per_row,
            "cube depth is not a multiple of the row width; trailing slices are dropped"
        );
    }

    let mut mosaic = Array2::<f32>::zeros((rows * y_dim, per_row * z_dim));
    for row in 0..rows {
        for col in 0..per_row {
            let m = row * per_row + col;
            mosaic
                .slice_mut(s![
                    row * y_dim..(row + 1) * y_dim,
                    col * z_dim..(col + 1) * z_dim
                ])
                .assign(&cube.index_axis(Axis(0), m));
        }
    }
    Ok(mosaic)
}

/// Tile a cube and render the mosaic onto a surface, no decorations.
///
/// Allocates an exact-size surface when none is given and returns the
/// handle.
pub fn tile_and_plot_3d_image(
    cube: ArrayView3<'_, f32>,
    policy: &dyn RowPolicy,
    opts: &DrawOptions,
    surface: Option<Surface>,
) -> GanvizResult<Surface> {
    let mosaic = tile_cube_to_2d(cube, policy)?;
    let (h, w) = mosaic.dim();
    let (h_px, w_px) = (h as u32, w as u32);

    let mut surface = match surface {
        Some(s) => {
            if s.width() < w_px || s.height() < h_px {
                return Err(GanvizError::validation(format!(
                    "surface {}x{} is smaller than the {}x{} mosaic",
                    s.width(),
                    s.height(),
                    w_px,
                    h_px
                )));
            }
            s
        }
        None => Surface::new(w_px.max(1), h_px.max(1))?,
    };

    let clim = opts.clim.unwrap_or_else(|| min_max(mosaic.iter().copied()));
    surface.blit(mosaic.view(), 0, 0, &opts.cmap, clim);
    Ok(surface)
}
