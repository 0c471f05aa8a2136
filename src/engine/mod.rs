//! Execution engine interface.
//!
//! The render pipeline talks to a ray-tracing runtime only through the
//! [`Engine`] and [`ExecutionContext`] traits: program loading by
//! [`ProgramId`], object creation behind typed handles, named parameter
//! binding through [`Variables`], output buffers and a blocking launch.
//!
//! [`cpu`] provides a software implementation.
//!
//! ## Object order
//! ```text
//! context -> ray types / entry points -> programs -> geometry / material
//!         -> instance -> group + acceleration -> variables -> buffer
//!         -> launch -> map / unmap
//! ```

pub mod cpu;
mod handles;
mod program;
mod variables;

pub use handles::*;
pub use program::*;
pub use variables::*;

use std::ops::Deref;

use crate::util::{Aabb, Result, UVec2};

/// Element format of a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    /// Four unsigned 8-bit channels per element.
    UnsignedByte4,
}

impl BufferFormat {
    pub fn element_size(self) -> usize {
        match self {
            Self::UnsignedByte4 => 4,
        }
    }
}

/// Everything needed to create a geometry object.
#[derive(Debug, Clone)]
pub struct GeometryDesc {
    pub primitive_count: u32,
    pub bounds: ProgramHandle,
    pub intersect: ProgramHandle,
    /// Shape parameters visible to the bounds and intersection programs.
    pub variables: Variables,
}

/// A material's shading program for one ray type.
#[derive(Debug, Clone, Copy)]
pub struct MaterialDesc {
    pub ray_type: u32,
    pub closest_hit: ProgramHandle,
}

/// Debug print configuration for device programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintConfig {
    pub enabled: bool,
    /// Capacity in bytes; output beyond it is dropped.
    pub buffer_size: usize,
    /// Restrict printing to one launch index.
    pub launch_index: Option<UVec2>,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: 4096,
            launch_index: None,
        }
    }
}

/// A ray-tracing runtime able to create execution contexts.
pub trait Engine {
    type Context: ExecutionContext;

    fn create_context(&self) -> Result<Self::Context>;
}

/// One execution context and every object it owns.
///
/// Methods must be called in the order listed in the module docs; engines
/// reject out-of-order use where they can detect it.
pub trait ExecutionContext {
    fn set_ray_type_count(&mut self, count: u32) -> Result<()>;
    fn set_entry_point_count(&mut self, count: u32) -> Result<()>;
    fn set_print(&mut self, config: PrintConfig);

    /// Resolve a program by module and symbol.
    fn create_program(&mut self, id: &ProgramId) -> Result<ProgramHandle>;
    fn set_ray_generation_program(&mut self, entry_point: u32, program: ProgramHandle) -> Result<()>;
    fn set_miss_program(&mut self, ray_type: u32, program: ProgramHandle) -> Result<()>;

    fn create_geometry(&mut self, desc: GeometryDesc) -> Result<GeometryHandle>;
    fn create_material(&mut self, desc: MaterialDesc) -> Result<MaterialHandle>;
    fn create_geometry_instance(
        &mut self,
        geometry: GeometryHandle,
        materials: &[MaterialHandle],
    ) -> Result<InstanceHandle>;
    /// Acceleration structure by builder name, e.g. `"Trbvh"`.
    fn create_acceleration(&mut self, builder: &str) -> Result<AccelerationHandle>;
    fn create_geometry_group(
        &mut self,
        children: &[InstanceHandle],
        acceleration: AccelerationHandle,
    ) -> Result<GroupHandle>;

    /// Bounds of a built geometry's primitives, as seen by the acceleration builder.
    fn geometry_bounds(&self, geometry: GeometryHandle) -> Result<Aabb>;

    /// Context-scope parameters.
    fn variables(&self) -> &Variables;
    fn variables_mut(&mut self) -> &mut Variables;

    fn create_buffer(&mut self, format: BufferFormat, width: u32, height: u32) -> Result<BufferHandle>;

    /// Run `entry_point` over `width x height` and block until done.
    fn launch(&mut self, entry_point: u32, width: u32, height: u32) -> Result<()>;

    /// Prefer [`MappedBuffer::map`], which always unmaps.
    fn map_buffer(&self, buffer: BufferHandle) -> Result<&[u8]>;
    fn unmap_buffer(&self, buffer: BufferHandle);
}

/// Read access to a mapped buffer. Unmaps on drop.
pub struct MappedBuffer<'a, C: ExecutionContext + ?Sized> {
    ctx: &'a C,
    handle: BufferHandle,
    data: &'a [u8],
}

impl<'a, C: ExecutionContext + ?Sized> MappedBuffer<'a, C> {
    pub fn map(ctx: &'a C, handle: BufferHandle) -> Result<Self> {
        let data = ctx.map_buffer(handle)?;
        Ok(Self { ctx, handle, data })
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }
}

impl<C: ExecutionContext + ?Sized> Deref for MappedBuffer<'_, C> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data
    }
}

impl<C: ExecutionContext + ?Sized> Drop for MappedBuffer<'_, C> {
    fn drop(&mut self) {
        self.ctx.unmap_buffer(self.handle);
    }
}
