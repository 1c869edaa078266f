//! Animated GIF previews of a Hounsfield volume.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, GrayImage, Luma};
use ndarray::{Array3, ArrayView2};

use crate::error::PrepError;

/// Every fifth slice becomes a preview frame.
pub(crate) const FRAME_STRIDE: usize = 5;

/// Upper edge of the default display window, in Hounsfield units. Soft
/// tissue and most contrast sits below this; denser bone clips to white.
pub(crate) const DEFAULT_WINDOW_MAX: i16 = 500;

/// Frame delay in milliseconds.
const FRAME_DELAY_MS: u32 = 100;

/// Write an animated grayscale GIF that loops over the volume.
///
/// Takes every [`FRAME_STRIDE`]-th slice starting from the first, windowed
/// between the global volume minimum and `window_max`. Returns the number
/// of frames written.
pub(crate) fn write_gif(
    volume: &Array3<i16>,
    path: &Path,
    window_max: i16,
) -> Result<usize, PrepError> {
    let floor = volume.iter().copied().min().unwrap_or(0);

    let file = File::create(path).map_err(|source| PrepError::CreateOutput {
        path: path.to_path_buf(),
        source,
    })?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.set_repeat(Repeat::Infinite)?;

    let mut frames = 0;
    for plane in volume.outer_iter().step_by(FRAME_STRIDE) {
        let gray = rescale_to_window(plane, f64::from(floor), f64::from(window_max));
        let rgba = DynamicImage::ImageLuma8(gray).to_rgba8();
        let frame = Frame::from_parts(rgba, 0, 0, Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1));
        encoder.encode_frame(frame)?;
        frames += 1;
    }

    Ok(frames)
}

/// Map HU values in `[lo, hi]` linearly onto the 8-bit grayscale range,
/// clipping values outside the window. A degenerate window produces an
/// all-black frame.
fn rescale_to_window(plane: ArrayView2<'_, i16>, lo: f64, hi: f64) -> GrayImage {
    let (rows, cols) = plane.dim();
    let span = hi - lo;
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        if span <= 0.0 {
            return Luma([0]);
        }
        let v = f64::from(plane[[y as usize, x as usize]]);
        let t = ((v - lo) / span).clamp(0.0, 1.0);
        Luma([(t * 255.0).round() as u8])
    })
}
