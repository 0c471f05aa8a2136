//! Program identifiers.
//!
//! A program is addressed by the module it lives in and its entry symbol.
//! [`ProgramSet`] resolves all five programs the pipeline needs once, from
//! the run configuration, so call sites never build names or paths.

use std::fmt;
use std::path::PathBuf;

use crate::config::RunConfig;

pub const RAYGEN: &str = "raygen";
pub const MISS: &str = "miss";
pub const CLOSEST_HIT_RADIANCE: &str = "closest_hit_radiance0";
pub const BOUNDS: &str = "bounds";
pub const INTERSECT: &str = "intersect";

/// A compiled program module: its name and where its code lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRef {
    pub name: String,
    pub path: PathBuf,
}

impl ModuleRef {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// One entry symbol inside a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramId {
    pub module: ModuleRef,
    pub symbol: String,
}

impl ProgramId {
    pub fn new(module: &ModuleRef, symbol: impl Into<String>) -> Self {
        Self {
            module: module.clone(),
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.module.name, self.symbol)
    }
}

/// Every program a render needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSet {
    pub raygen: ProgramId,
    pub miss: ProgramId,
    pub closest_hit: ProgramId,
    pub bounds: ProgramId,
    pub intersect: ProgramId,
}

impl ProgramSet {
    /// Standard symbols from a scene module and a primitive module.
    pub fn new(scene: &ModuleRef, primitive: &ModuleRef) -> Self {
        Self {
            raygen: ProgramId::new(scene, RAYGEN),
            miss: ProgramId::new(scene, MISS),
            closest_hit: ProgramId::new(scene, CLOSEST_HIT_RADIANCE),
            bounds: ProgramId::new(primitive, BOUNDS),
            intersect: ProgramId::new(primitive, INTERSECT),
        }
    }

    /// Modules for the configured run, located under the output root.
    pub fn for_run(config: &RunConfig) -> Self {
        let scene = ModuleRef::new(&config.name, config.ptx_path(&config.name, &config.name));
        let primitive = ModuleRef::new(
            &config.primitive,
            config.ptx_path(&config.name, &config.primitive),
        );
        Self::new(&scene, &primitive)
    }
}
