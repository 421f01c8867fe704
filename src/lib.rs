//! Visualization utilities for generative-model outputs.
//!
//! Three independent tool groups:
//!
//! - **Tiling** ([`tile`], [`cube`]): arrange a batch of images, or the
//!   slices of a volumetric cube, into a single 2D mosaic and render it
//!   onto an explicit [`Surface`] handle.
//! - **Animation** ([`anim`], [`encode`]): build real-vs-fake comparison
//!   clips from volumetric samples and export them as GIF or (via a
//!   system `ffmpeg`) MP4, with per-sample title cards.
//! - **Charts** ([`cmap`], [`shade`]): fixed color gradients (including
//!   the Planck CMB table) and mean-curve-with-shaded-band plots.
//!
//! Everything is synchronous and single-threaded; there is no ambient
//! "current figure" state, so callers own every surface and clip they
//! create.

// deny rather than forbid: ndarray's s! expansion carries a local allow.
#![deny(unsafe_code)]

pub mod anim;
pub mod cmap;
pub mod cube;
pub mod encode;
pub mod error;
pub mod shade;
pub mod surface;
pub mod tile;

pub use anim::{
    AnimationOptions, Clip, animate_cube, color_limits, comparison_clip, cube_to_animation,
    export_clip, frame_index, save_animation, title_clip,
};
pub use cmap::{ColorMap, ControlPoint, grayscale_cmap, planck_cmap, plasma_cmap};
pub use cube::{DefaultRowPolicy, FixedRowPolicy, RowPolicy, tile_and_plot_3d_image, tile_cube_to_2d};
pub use encode::{EncodeConfig, FfmpegSink, GifSink, OutputFormat, VideoSink, is_ffmpeg_on_path};
pub use error::{GanvizError, GanvizResult};
pub use shade::{ShadeBand, ShadedSeries, plot_with_shade, shaded_series};
pub use surface::{Anchor, Rect, Surface};
pub use tile::{DrawOptions, draw_images, tile_images};
