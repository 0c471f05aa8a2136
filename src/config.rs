//! Run configuration.
//!
//! The only external input is the `PREFIX` environment variable naming a
//! writable output root. Everything else is a named default in
//! [`RenderSettings`].

use std::env;
use std::path::{Path, PathBuf};

use crate::camera::{BoundingDescriptor, CameraConfig};
use crate::engine::PrintConfig;
use crate::render::ImageSpec;
use crate::scene::SceneSpec;
use crate::util::{Error, Result, Vec3};

/// Environment variable naming the output root.
pub const PREFIX_VAR: &str = "PREFIX";
/// Run name: output file stem and scene program module.
pub const RUN_NAME: &str = "TitaniumPlate";
/// Primitive program module.
pub const PRIMITIVE_NAME: &str = "discwithholes";

/// Where a run reads programs from and writes its image to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub prefix: PathBuf,
    pub name: String,
    pub primitive: String,
}

impl RunConfig {
    /// Read the output root from `PREFIX`.
    pub fn from_env() -> Result<Self> {
        match env::var_os(PREFIX_VAR) {
            Some(prefix) if !prefix.is_empty() => Self::new(prefix),
            _ => Err(Error::MissingEnv(PREFIX_VAR)),
        }
    }

    /// Config rooted at `prefix`, which must be an existing directory.
    pub fn new(prefix: impl Into<PathBuf>) -> Result<Self> {
        let prefix = prefix.into();
        if !prefix.is_dir() {
            return Err(Error::OutputRootMissing(prefix));
        }
        Ok(Self {
            prefix,
            name: RUN_NAME.to_string(),
            primitive: PRIMITIVE_NAME.to_string(),
        })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// `<prefix>/ptx/<target>_generated_<stem>.cu.ptx`
    pub fn ptx_path(&self, target: &str, stem: &str) -> PathBuf {
        self.prefix
            .join("ptx")
            .join(format!("{target}_generated_{stem}.cu.ptx"))
    }

    /// `<prefix>/ppm/<stem>.ppm`
    pub fn ppm_path(&self, stem: &str) -> PathBuf {
        self.prefix.join("ppm").join(format!("{stem}.ppm"))
    }

    /// Image path for this run.
    pub fn output_path(&self) -> PathBuf {
        self.ppm_path(&self.name)
    }
}

/// What the render pipeline needs beyond the descriptor and image size.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub camera: CameraConfig,
    /// Ray t-min, guarding against self-intersection.
    pub scene_epsilon: f32,
    pub print: PrintConfig,
    pub scene: SceneSpec,
    pub entry_point: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            scene_epsilon: 0.1,
            print: PrintConfig::default(),
            scene: SceneSpec::default(),
            entry_point: 0,
        }
    }
}

/// Render parameters with the defaults of a standard plate run.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub center: Vec3,
    pub extent: f32,
    /// Write the bottom buffer row first-to-last as the top image row.
    pub yflip: bool,
    pub pipeline: PipelineOptions,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            center: Vec3::ZERO,
            extent: 0.5,
            yflip: true,
            pipeline: PipelineOptions::default(),
        }
    }
}

impl RenderSettings {
    pub fn descriptor(&self) -> Result<BoundingDescriptor> {
        BoundingDescriptor::new(self.center, self.extent)
    }

    pub fn image(&self) -> Result<ImageSpec> {
        ImageSpec::new(self.width, self.height)
    }
}
