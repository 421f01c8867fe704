use std::sync::{Arc, Mutex};

use ganviz::{
    DrawOptions, FixedRowPolicy, GanvizError, Surface, draw_images, tile_cube_to_2d, tile_images,
};
use ndarray::{ArrayD, IxDyn, s};

fn grayscale_batch(n: usize, h: usize, w: usize, value: f32) -> ArrayD<f32> {
    let mut a = ArrayD::<f32>::zeros(IxDyn(&[n, h, w]));
    a.fill(value);
    a
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn log_of(f: impl FnOnce()) -> String {
    let log = CapturedLog::default();
    let sink = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    String::from_utf8(log.0.lock().unwrap().clone()).unwrap()
}

#[test]
fn four_images_on_a_2x2_grid_make_a_16x16_canvas_with_separators() {
    let batch = grayscale_batch(4, 8, 8, 1.0);
    let opts = DrawOptions {
        clim: Some((0.0, 1.0)),
        ..DrawOptions::default()
    };
    let surface = draw_images(batch.view(), 2, 2, &opts, None).unwrap();

    assert_eq!((surface.width(), surface.height()), (16, 16));

    // Separator lines straddle the 7.5 boundary: columns/rows 7 and 8
    // are red, their neighbours keep the image data (white).
    for k in 0..16 {
        assert_eq!(surface.pixel(7, k), [255, 0, 0], "vertical line col 7");
        assert_eq!(surface.pixel(8, k), [255, 0, 0], "vertical line col 8");
        assert_eq!(surface.pixel(k, 7), [255, 0, 0], "horizontal line row 7");
        assert_eq!(surface.pixel(k, 8), [255, 0, 0], "horizontal line row 8");
    }
    assert_eq!(surface.pixel(0, 0), [255, 255, 255]);
    assert_eq!(surface.pixel(15, 15), [255, 255, 255]);
    assert_eq!(surface.pixel(6, 0), [255, 255, 255]);
    assert_eq!(surface.pixel(9, 15), [255, 255, 255]);
}

#[test]
fn underfilled_grid_keeps_zero_background_without_failing() {
    // 3 images on a 2x2 grid: cell (1,1) stays background.
    let batch = grayscale_batch(3, 4, 4, 1.0);
    let opts = DrawOptions {
        clim: Some((0.0, 1.0)),
        line_width: 0,
        ..DrawOptions::default()
    };
    let surface = draw_images(batch.view(), 2, 2, &opts, None).unwrap();

    // Filled cells render white, the empty cell renders black.
    assert_eq!(surface.pixel(0, 0), [255, 255, 255]);
    assert_eq!(surface.pixel(0, 5), [255, 255, 255]);
    assert_eq!(surface.pixel(5, 0), [255, 255, 255]);
    assert_eq!(surface.pixel(6, 6), [0, 0, 0]);
}

#[test]
fn underfilled_grid_warns_about_missing_images() {
    let batch = grayscale_batch(3, 2, 2, 1.0);
    let log = log_of(|| {
        tile_images(batch.view(), 2, 2).unwrap();
    });
    assert!(log.contains("not enough images"), "log was: {log}");
}

#[test]
fn cube_truncation_warns_about_dropped_slices() {
    let cube = ndarray::Array3::<f32>::zeros((7, 2, 2));
    let log = log_of(|| {
        tile_cube_to_2d(cube.view(), &FixedRowPolicy(3)).unwrap();
    });
    assert!(log.contains("trailing slices are dropped"), "log was: {log}");
}

#[test]
fn exact_fill_stays_silent() {
    let batch = grayscale_batch(4, 2, 2, 1.0);
    let log = log_of(|| {
        tile_images(batch.view(), 2, 2).unwrap();
    });
    assert!(!log.contains("WARN"), "log was: {log}");
}

#[test]
fn rank_one_input_is_invalid_shape() {
    let v = ArrayD::<f32>::zeros(IxDyn(&[16]));
    match draw_images(v.view(), 2, 2, &DrawOptions::default(), None) {
        Err(GanvizError::InvalidShape(_)) => {}
        other => panic!("expected InvalidShape, got {other:?}"),
    }
}

#[test]
fn explicit_surface_is_returned_for_further_composition() {
    let batch = grayscale_batch(1, 4, 4, 1.0);
    let canvas = Surface::new(32, 32).unwrap();
    let opts = DrawOptions {
        clim: Some((0.0, 1.0)),
        ..DrawOptions::default()
    };
    let surface = draw_images(batch.view(), 1, 1, &opts, Some(canvas)).unwrap();
    // The oversized handle comes back untouched outside the mosaic.
    assert_eq!((surface.width(), surface.height()), (32, 32));
    assert_eq!(surface.pixel(0, 0), [255, 255, 255]);
    assert_eq!(surface.pixel(20, 20), [0, 0, 0]);
}

#[test]
fn cube_mosaic_matches_block_layout() {
    let mut cube = ndarray::Array3::<f32>::zeros((6, 2, 2));
    for m in 0..6 {
        cube.slice_mut(s![m, .., ..]).fill(m as f32);
    }
    let mosaic = tile_cube_to_2d(cube.view(), &FixedRowPolicy(3)).unwrap();
    assert_eq!(mosaic.dim(), (4, 6));
    assert_eq!(mosaic[[0, 0]], 0.0);
    assert_eq!(mosaic[[0, 4]], 2.0);
    assert_eq!(mosaic[[2, 0]], 3.0);
    assert_eq!(mosaic[[3, 5]], 5.0);
}
