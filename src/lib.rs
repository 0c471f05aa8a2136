//! # disc-trace
//!
//! Frames a camera on a bounding volume, assembles a one-primitive
//! ray-traced scene, runs a single blocking launch and writes the result as
//! a binary pixmap.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math re-exports, bounding boxes and rays
//! - [`camera`] - Camera frame from a center/extent descriptor
//! - [`engine`] - Execution engine interface and the CPU engine
//! - [`scene`] - Scene graph assembly and parameter binding
//! - [`render`] - The ordered render pipeline
//! - [`image`] - Pixmap output
//! - [`config`] - Environment, output paths and render defaults
//!
//! ## Example
//!
//! ```ignore
//! use disc_trace::prelude::*;
//!
//! let run = RunConfig::from_env()?;
//! let programs = ProgramSet::for_run(&run);
//! let path = render_to_file(&CpuEngine::new(), &run, &programs, &RenderSettings::default())?;
//! println!("{}", path.display());
//! ```

pub mod util;
pub mod camera;
pub mod engine;
pub mod scene;
pub mod render;
pub mod image;
pub mod config;

// Re-export commonly used types
pub use util::{Error, ErrorCategory, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, ErrorCategory, Result};
    pub use crate::camera::{compute_frame, compute_frame_with, BoundingDescriptor, CameraConfig, CameraFrame};
    pub use crate::engine::cpu::CpuEngine;
    pub use crate::engine::{Engine, ExecutionContext, MappedBuffer, ProgramSet};
    pub use crate::scene::{assemble_scene, SceneGraph, SceneParameters, SceneSpec};
    pub use crate::render::{render, render_to_file, ImageSpec, PixelBuffer};
    pub use crate::image::write_image;
    pub use crate::config::{PipelineOptions, RenderSettings, RunConfig};
}
