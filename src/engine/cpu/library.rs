//! Program registry for the software engine.
//!
//! Programs are plain Rust functions registered under a module name and an
//! entry symbol. Each kind has its own signature; the engine checks the
//! kind whenever a program is attached to a slot.

use std::collections::HashMap;

use super::device::{DeviceCtx, Hit};
use super::programs;
use crate::engine::{ProgramId, Variables};
use crate::util::{Aabb, Error, Ray, Result, UVec2, Vec3};

/// Produces the `output_buffer` element for one launch index.
pub type RayGenFn = fn(&DeviceCtx<'_>, UVec2) -> Result<[u8; 4]>;
/// Result colour for a ray that hit nothing.
pub type MissFn = fn(&Variables, &Ray) -> Result<Vec3>;
/// Result colour at the nearest hit.
pub type ClosestHitFn = fn(&Variables, &Ray, &Hit) -> Result<Vec3>;
/// Bounds of one primitive, read from geometry-scope variables.
pub type BoundsFn = fn(&Variables, u32) -> Result<Aabb>;
/// Hit test of one primitive within `[t_min, t_max]`.
pub type IntersectFn = fn(&Variables, u32, &Ray, f32, f32) -> Result<Option<Hit>>;

#[derive(Debug, Clone, Copy)]
pub enum Program {
    RayGen(RayGenFn),
    Miss(MissFn),
    ClosestHit(ClosestHitFn),
    Bounds(BoundsFn),
    Intersect(IntersectFn),
}

impl Program {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RayGen(_) => "ray generation",
            Self::Miss(_) => "miss",
            Self::ClosestHit(_) => "closest hit",
            Self::Bounds(_) => "bounding box",
            Self::Intersect(_) => "intersection",
        }
    }
}

/// Programs by module, then symbol.
#[derive(Debug, Clone, Default)]
pub struct ProgramLibrary {
    modules: HashMap<String, HashMap<String, Program>>,
}

impl ProgramLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding the built-in plate scene and disc primitive modules.
    pub fn builtin() -> Self {
        let mut lib = Self::new();
        programs::register(&mut lib);
        lib
    }

    pub fn register(&mut self, module: &str, symbol: &str, program: Program) -> &mut Self {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(symbol.to_string(), program);
        self
    }

    pub fn resolve(&self, id: &ProgramId) -> Result<Program> {
        self.modules
            .get(&id.module.name)
            .and_then(|m| m.get(&id.symbol))
            .copied()
            .ok_or_else(|| Error::ProgramNotFound {
                module: id.module.name.clone(),
                symbol: id.symbol.clone(),
            })
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}
