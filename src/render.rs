//! Render pipeline driver.
//!
//! One run is a fixed sequence against a single execution context:
//!
//! ```text
//! camera frame -> context (1 ray type, 1 entry point, print buffer)
//!     -> raygen + miss -> scene graph + parameters -> output buffer
//!     -> launch -> scoped map -> PixelBuffer
//! ```
//!
//! Every step is fatal on failure. Nothing is retried.

use std::path::PathBuf;

use crate::camera::{compute_frame_with, BoundingDescriptor};
use crate::config::{PipelineOptions, RenderSettings, RunConfig};
use crate::engine::{names, BufferFormat, Engine, ExecutionContext, MappedBuffer, ProgramSet};
use crate::image::write_image;
use crate::scene::{assemble_scene, SceneParameters};
use crate::util::{Error, Result};

/// Output image size. Both dimensions are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    width: u32,
    height: u32,
}

impl ImageSpec {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Caller-owned copy of a rendered image.
///
/// Rows are stored in launch order: row 0 is launch row 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Channels per pixel.
    pub ncomp: usize,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * self.ncomp;
        let start = y as usize * stride;
        &self.data[start..start + stride]
    }

    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = x as usize * self.ncomp;
        &self.row(y)[start..start + self.ncomp]
    }
}

/// Render one image of the plate scene.
///
/// Every precondition is checked before the engine creates a context.
#[tracing::instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn render<E: Engine>(
    engine: &E,
    descriptor: &BoundingDescriptor,
    image: ImageSpec,
    programs: &ProgramSet,
    options: &PipelineOptions,
) -> Result<PixelBuffer> {
    let (width, height) = (image.width(), image.height());
    let frame = compute_frame_with(descriptor, width, height, &options.camera)?;
    options.scene.validate()?;
    tracing::info!("camera frame computed (aspect {:.3})", image.aspect());
    tracing::debug!("eye {} U {} V {} W {}", frame.eye, frame.u, frame.v, frame.w);

    let mut ctx = engine.create_context()?;
    ctx.set_ray_type_count(1)?;
    ctx.set_entry_point_count(1)?;
    ctx.set_print(options.print);

    let raygen = ctx.create_program(&programs.raygen)?;
    ctx.set_ray_generation_program(options.entry_point, raygen)?;
    let miss = ctx.create_program(&programs.miss)?;
    ctx.set_miss_program(0, miss)?;

    let params = SceneParameters::new(frame, options.scene_epsilon);
    assemble_scene(&mut ctx, programs, &params, &options.scene)?;

    let output = ctx.create_buffer(BufferFormat::UnsignedByte4, width, height)?;
    ctx.variables_mut().set_buffer(names::OUTPUT_BUFFER, output);

    ctx.launch(options.entry_point, width, height)?;
    tracing::info!("launch complete");

    let mapped = MappedBuffer::map(&ctx, output)?;
    let ncomp = BufferFormat::UnsignedByte4.element_size();
    let expected = width as usize * height as usize * ncomp;
    if mapped.len() != expected {
        return Err(Error::launch(format!(
            "output buffer holds {} bytes, expected {expected}",
            mapped.len()
        )));
    }
    let data = mapped.to_vec();
    drop(mapped);

    Ok(PixelBuffer {
        width,
        height,
        ncomp,
        data,
    })
}

/// Render with `settings` and write the image to the run's output path.
///
/// Returns the path written.
pub fn render_to_file<E: Engine>(
    engine: &E,
    run: &RunConfig,
    programs: &ProgramSet,
    settings: &RenderSettings,
) -> Result<PathBuf> {
    let descriptor = settings.descriptor()?;
    let image = settings.image()?;
    let pixels = render(engine, &descriptor, image, programs, &settings.pipeline)?;

    let path = run.output_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| Error::OutputFile {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    write_image(&path, &pixels, settings.yflip)?;
    Ok(path)
}
