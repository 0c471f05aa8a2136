//! Image output.
//!
//! Writes a [`PixelBuffer`] as a binary P6 pixmap through [`ppm_writer`].
//! Alpha is dropped. With `yflip` the last buffer row becomes the first
//! image row.

use std::path::Path;

use crate::render::PixelBuffer;
use crate::util::{Error, Result};

/// Write `pixels` to `path`.
pub fn write_image(path: impl AsRef<Path>, pixels: &PixelBuffer, yflip: bool) -> Result<()> {
    write_pixels(
        path,
        &pixels.data,
        pixels.width,
        pixels.height,
        pixels.ncomp,
        yflip,
    )
}

/// Write raw interleaved pixels (3 or 4 channels) to `path`.
pub fn write_pixels(
    path: impl AsRef<Path>,
    data: &[u8],
    width: u32,
    height: u32,
    ncomp: usize,
    yflip: bool,
) -> Result<()> {
    let path = path.as_ref();
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    ppm_writer::write_ppm(path, data, width as usize, height as usize, ncomp, yflip).map_err(
        |source| Error::OutputFile {
            path: path.to_path_buf(),
            source,
        },
    )?;
    tracing::info!("wrote {}x{} image to {}", width, height, path.display());
    Ok(())
}
