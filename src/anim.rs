use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::{Array3, ArrayView3, Axis};

use crate::{
    cmap::{ColorMap, plasma_cmap},
    encode::{OutputFormat, open_sink},
    error::{GanvizError, GanvizResult},
    surface::{Anchor, Rect, Surface},
    tile::min_max,
};

/// Settings for comparison/title clips and their export.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationOptions {
    /// Output frame rate; also drives the slice-per-frame sampling.
    pub fps: u32,
    /// Total frame width in pixels.
    pub width: u32,
    /// Total frame height in pixels.
    pub height: u32,
    /// Gradient for the volumetric slices.
    pub cmap: ColorMap,
    /// Explicit color limits; defaults to the sample-set min/max.
    pub clim: Option<(f32, f32)>,
    /// Panel names: real, downsampled, fake.
    pub names: [String; 3],
    /// Panel label size in pixels.
    pub font_size: u32,
    /// Title-card text size in pixels.
    pub title_font_size: u32,
    /// Draw panel labels and frame counters. Disable on hosts without
    /// a usable system font.
    pub annotate: bool,
    /// Frame background color.
    pub background: [u8; 3],
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            fps: 16,
            width: 960,
            height: 576,
            cmap: plasma_cmap(),
            clim: None,
            names: [
                "Real".to_string(),
                "Downsampled".to_string(),
                "Fake".to_string(),
            ],
            font_size: 20,
            title_font_size: 80,
            annotate: true,
            background: [16, 16, 16],
        }
    }
}

type FrameFn = Box<dyn Fn(f64) -> GanvizResult<RgbImage>>;

/// A time-indexed frame source: a duration plus a generator closure.
///
/// Frames are produced on demand at export time and never retained,
/// so clips stay cheap to build and concatenate.
pub struct Clip {
    duration: f64,
    frame: FrameFn,
}

impl Clip {
    pub fn new(
        duration: f64,
        frame: impl Fn(f64) -> GanvizResult<RgbImage> + 'static,
    ) -> GanvizResult<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(GanvizError::validation(
                "clip duration must be finite and positive",
            ));
        }
        Ok(Self {
            duration,
            frame: Box::new(frame),
        })
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Render the frame for output time `t` seconds.
    pub fn frame_at(&self, t: f64) -> GanvizResult<RgbImage> {
        (self.frame)(t)
    }

    /// Chain clips back to back; each segment sees a local time base.
    pub fn concat(clips: Vec<Clip>) -> GanvizResult<Clip> {
        if clips.is_empty() {
            return Err(GanvizError::validation("cannot concatenate zero clips"));
        }
        let total: f64 = clips.iter().map(Clip::duration).sum();
        let frame = move |t: f64| {
            let mut offset = 0.0;
            for (i, clip) in clips.iter().enumerate() {
                let local = t - offset;
                let last = i == clips.len() - 1;
                if local < clip.duration || last {
                    return clip.frame_at(local.min(clip.duration));
                }
                offset += clip.duration;
            }
            unreachable!("concat clip list is non-empty")
        };
        Clip::new(total, frame)
    }
}

impl std::fmt::Debug for Clip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clip")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

/// Source slice index for output time `t`.
///
/// `round(t*fps)` divided by the panel's resolution factor, wrapped
/// modulo the panel's own length so every panel loops in step.
pub fn frame_index(t: f64, fps: u32, len: usize, factor: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let ind = (t * f64::from(fps)).round().max(0.0) as usize;
    (ind / factor.max(1)) % len
}

/// Shared color limits: min/max across every array present.
pub fn color_limits(arrays: &[ArrayView3<'_, f32>]) -> (f32, f32) {
    min_max(arrays.iter().flat_map(|a| a.iter().copied()))
}

struct Panel {
    name: String,
    data: Array3<f32>,
    factor: usize,
}

/// Build a side-by-side Real / (Downsampled) / Fake comparison clip.
///
/// Preconditions: `real` and `fake` must agree in shape; a downsampled
/// cube's depth must evenly divide the full-resolution depth. Both are
/// `ShapeMismatch` and fire before any frame is rendered.
pub fn comparison_clip(
    real: ArrayView3<'_, f32>,
    fake: ArrayView3<'_, f32>,
    downsampled: Option<ArrayView3<'_, f32>>,
    opts: &AnimationOptions,
) -> GanvizResult<Clip> {
    if real.dim() != fake.dim() {
        return Err(GanvizError::shape_mismatch(format!(
            "real cube {:?} vs fake cube {:?}",
            real.dim(),
            fake.dim()
        )));
    }
    let dim = fake.len_of(Axis(0));
    if dim == 0 {
        return Err(GanvizError::invalid_shape("cubes must have non-zero depth"));
    }

    let mut panels = vec![Panel {
        name: opts.names[0].clone(),
        data: real.to_owned(),
        factor: 1,
    }];
    if let Some(down) = downsampled {
        let dim_down = down.len_of(Axis(0));
        if dim_down == 0 || dim % dim_down != 0 {
            return Err(GanvizError::shape_mismatch(format!(
                "downsampled depth {dim_down} must evenly divide the full depth {dim}"
            )));
        }
        panels.push(Panel {
            name: opts.names[1].clone(),
            data: down.to_owned(),
            factor: dim / dim_down,
        });
    }
    panels.push(Panel {
        name: opts.names[2].clone(),
        data: fake.to_owned(),
        factor: 1,
    });

    let clim = opts.clim.unwrap_or_else(|| {
        let views: Vec<_> = panels.iter().map(|p| p.data.view()).collect();
        color_limits(&views)
    });

    let opts = opts.clone();
    let duration = dim as f64 / f64::from(opts.fps);
    Clip::new(duration, move |t| {
        let mut surface = Surface::new(opts.width, opts.height)?;
        surface.fill(opts.background);

        let npanels = panels.len() as u32;
        let panel_w = opts.width / npanels;
        let strip = if opts.annotate {
            opts.font_size + 12
        } else {
            0
        };
        let pad = 8u32;

        for (k, panel) in panels.iter().enumerate() {
            let depth = panel.data.len_of(Axis(0));
            let ind = frame_index(t, opts.fps, depth, panel.factor);
            let slice = panel.data.index_axis(Axis(0), ind);
            let (src_h, src_w) = slice.dim();

            let x0 = k as u32 * panel_w;
            let avail = Rect::new(
                x0 + pad,
                strip + pad,
                panel_w.saturating_sub(2 * pad).max(1),
                opts.height.saturating_sub(strip + 2 * pad).max(1),
            );
            let dst = fit_rect(avail, src_w as u32, src_h as u32);
            surface.blit_scaled(slice, dst, &opts.cmap, clim);

            if opts.annotate {
                surface.draw_text(
                    &format!("{} {depth}x{depth}x{depth}", panel.name),
                    ((x0 + panel_w / 2) as i32, pad as i32),
                    opts.font_size,
                    [255, 255, 255],
                    Anchor::TopCenter,
                )?;
            }
        }
        Ok(surface.into_image())
    })
}

/// A one-second card with a centered white title.
pub fn title_clip(title: &str, opts: &AnimationOptions) -> GanvizResult<Clip> {
    let title = title.to_string();
    let opts = opts.clone();
    Clip::new(1.0, move |_t| {
        let mut surface = Surface::new(opts.width, opts.height)?;
        surface.fill(opts.background);
        if opts.annotate {
            surface.draw_text(
                &title,
                (opts.width as i32 / 2, opts.height as i32 / 2),
                opts.title_font_size,
                [255, 255, 255],
                Anchor::Center,
            )?;
        }
        Ok(surface.into_image())
    })
}

/// Single-cube playback: one panel, one frame per leading-axis slice,
/// an optional title prefix before the frame counter.
pub fn cube_to_animation(
    cube: ArrayView3<'_, f32>,
    title: Option<&str>,
    opts: &AnimationOptions,
) -> GanvizResult<Clip> {
    let dim = cube.len_of(Axis(0));
    if dim == 0 {
        return Err(GanvizError::invalid_shape("cube must have non-zero depth"));
    }
    let clim = opts.clim.unwrap_or_else(|| color_limits(&[cube]));
    let data = cube.to_owned();
    let title = title.map(str::to_string);
    let opts = opts.clone();
    let duration = dim as f64 / f64::from(opts.fps);
    Clip::new(duration, move |t| {
        let mut surface = Surface::new(opts.width, opts.height)?;
        surface.fill(opts.background);

        let ind = frame_index(t, opts.fps, dim, 1);
        let slice = data.index_axis(Axis(0), ind);
        let (src_h, src_w) = slice.dim();
        let strip = if opts.annotate {
            opts.font_size + 12
        } else {
            0
        };
        let pad = 8u32;
        let avail = Rect::new(
            pad,
            strip + pad,
            opts.width.saturating_sub(2 * pad).max(1),
            opts.height.saturating_sub(strip + 2 * pad).max(1),
        );
        surface.blit_scaled(slice, fit_rect(avail, src_w as u32, src_h as u32), &opts.cmap, clim);

        if opts.annotate {
            let label = match &title {
                Some(prefix) => format!("{prefix} - Frame no. {ind}"),
                None => format!("Frame no. {ind}"),
            };
            surface.draw_text(
                &label,
                (opts.width as i32 / 2, pad as i32),
                opts.font_size,
                [255, 255, 255],
                Anchor::TopCenter,
            )?;
        }
        Ok(surface.into_image())
    })
}

/// Sample a clip at the given frame rate and drive it into a sink.
///
/// Blocking; runs to completion or fails. Returns the resolved output
/// path (extension auto-appended).
pub fn export_clip(
    clip: &Clip,
    path: impl AsRef<Path>,
    format: OutputFormat,
    opts: &AnimationOptions,
) -> GanvizResult<PathBuf> {
    let fps = opts.fps;
    let probe = clip.frame_at(0.0)?;
    let (mut sink, out_path) = open_sink(path, format, probe.width(), probe.height(), fps)?;

    let total = (clip.duration() * f64::from(fps)).round().max(1.0) as u64;
    tracing::debug!(frames = total, fps, path = %out_path.display(), "exporting clip");
    for k in 0..total {
        let t = k as f64 / f64::from(fps);
        let frame = clip.frame_at(t)?;
        sink.write_frame(&frame)?;
    }
    sink.finish()?;
    Ok(out_path)
}

/// Animate a single cube straight to a file.
pub fn animate_cube(
    cube: ArrayView3<'_, f32>,
    title: Option<&str>,
    path: impl AsRef<Path>,
    format: OutputFormat,
    opts: &AnimationOptions,
) -> GanvizResult<PathBuf> {
    let clip = cube_to_animation(cube, title, opts)?;
    export_clip(&clip, path, format, opts)
}

/// Batched comparison export: per-sample title cards interleaved with
/// comparison clips, concatenated as `[title 1, clip 1, title 2, ...]`.
///
/// All shape preconditions are validated before the output file is
/// touched.
pub fn save_animation(
    reals: &[ArrayView3<'_, f32>],
    fakes: &[ArrayView3<'_, f32>],
    downsampled: Option<&[ArrayView3<'_, f32>]>,
    path: impl AsRef<Path>,
    format: OutputFormat,
    opts: &AnimationOptions,
) -> GanvizResult<PathBuf> {
    if reals.is_empty() || reals.len() != fakes.len() {
        return Err(GanvizError::validation(format!(
            "sample counts must match and be non-zero: {} real vs {} fake",
            reals.len(),
            fakes.len()
        )));
    }
    if let Some(downs) = downsampled
        && downs.len() != reals.len()
    {
        return Err(GanvizError::validation(format!(
            "sample counts must match: {} real vs {} downsampled",
            reals.len(),
            downs.len()
        )));
    }

    let mut clips = Vec::with_capacity(reals.len() * 2);
    for i in 0..reals.len() {
        let down = downsampled.map(|d| d[i].view());
        // Build the comparison first so shape errors surface before
        // any clip of this sample is queued.
        let comparison = comparison_clip(reals[i].view(), fakes[i].view(), down, opts)?;
        clips.push(title_clip(&format!("Sample {}", i + 1), opts)?);
        clips.push(comparison);
    }

    let all = Clip::concat(clips)?;
    export_clip(&all, path, format, opts)
}

/// Largest rectangle of the source aspect ratio centered in `avail`.
fn fit_rect(avail: Rect, src_w: u32, src_h: u32) -> Rect {
    if src_w == 0 || src_h == 0 {
        return avail;
    }
    let scale = (f64::from(avail.width) / f64::from(src_w))
        .min(f64::from(avail.height) / f64::from(src_h));
    let w = ((f64::from(src_w) * scale).floor() as u32).clamp(1, avail.width);
    let h = ((f64::from(src_h) * scale).floor() as u32).clamp(1, avail.height);
    Rect::new(
        avail.x + (avail.width - w) / 2,
        avail.y + (avail.height - h) / 2,
        w,
        h,
    )
}
