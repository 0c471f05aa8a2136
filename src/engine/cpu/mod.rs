//! Software execution engine.
//!
//! Implements [`ExecutionContext`] on the CPU: programs are Rust functions
//! from a [`ProgramLibrary`], acceleration structures are BVHs built on the
//! first launch, and launches run rows in parallel with rayon.
//!
//! ## Architecture
//! ```text
//! bounds programs -> BVH build (SAH) -> raygen per launch index
//!     -> trace: BVH traversal + intersect -> closest hit | miss -> output_buffer
//! ```

pub mod bvh;
mod device;
mod library;
mod objects;
mod print;
pub mod programs;

pub use device::{DeviceCtx, Hit};
pub use library::*;
pub use objects::AccelKind;
pub use print::PrintBuffer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use smallvec::SmallVec;

use self::objects::{Acceleration, Geometry, Group, Instance, Material, SceneObjects};
use crate::engine::{
    names, AccelerationHandle, BufferFormat, BufferHandle, Engine, ExecutionContext, GeometryDesc,
    GeometryHandle, GroupHandle, InstanceHandle, MaterialDesc, MaterialHandle, PrintConfig,
    ProgramHandle, ProgramId, Variables,
};
use crate::util::{Aabb, Error, Result, UVec2};

/// Engine creating [`CpuContext`]s that share one program library.
#[derive(Debug, Clone)]
pub struct CpuEngine {
    library: Arc<ProgramLibrary>,
}

impl CpuEngine {
    /// Engine with the built-in programs.
    pub fn new() -> Self {
        Self::with_library(ProgramLibrary::builtin())
    }

    pub fn with_library(library: ProgramLibrary) -> Self {
        Self {
            library: Arc::new(library),
        }
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for CpuEngine {
    type Context = CpuContext;

    fn create_context(&self) -> Result<CpuContext> {
        tracing::debug!("creating cpu context (threads: {})", rayon::current_num_threads());
        Ok(CpuContext::new(self.library.clone()))
    }
}

struct Buffer {
    format: BufferFormat,
    width: u32,
    height: u32,
    data: Vec<[u8; 4]>,
    mapped: AtomicBool,
}

/// A software execution context.
pub struct CpuContext {
    library: Arc<ProgramLibrary>,
    ray_type_count: u32,
    entry_point_count: u32,
    print: PrintBuffer,
    programs: Vec<Program>,
    raygen: Vec<Option<RayGenFn>>,
    objects: SceneObjects,
    buffers: Vec<Buffer>,
    variables: Variables,
    launches: u32,
}

fn check_handle<T>(items: &[T], kind: &'static str, index: u32) -> Result<usize> {
    let i = index as usize;
    if i < items.len() {
        Ok(i)
    } else {
        Err(Error::InvalidHandle { kind, index })
    }
}

fn wrong_kind(expected: &str, program: &Program) -> Error {
    Error::engine(format!("expected a {expected} program, got {}", program.kind()))
}

impl CpuContext {
    pub fn new(library: Arc<ProgramLibrary>) -> Self {
        Self {
            library,
            ray_type_count: 0,
            entry_point_count: 0,
            print: PrintBuffer::new(PrintConfig {
                enabled: false,
                ..PrintConfig::default()
            }),
            programs: Vec::new(),
            raygen: Vec::new(),
            objects: SceneObjects::default(),
            buffers: Vec::new(),
            variables: Variables::new(),
            launches: 0,
        }
    }

    pub fn ray_type_count(&self) -> u32 {
        self.ray_type_count
    }

    pub fn entry_point_count(&self) -> u32 {
        self.entry_point_count
    }

    /// Number of completed launches.
    pub fn launch_count(&self) -> u32 {
        self.launches
    }

    pub fn group_children(&self, group: GroupHandle) -> Result<usize> {
        let g = check_handle(&self.objects.groups, GroupHandle::KIND, group.index())?;
        Ok(self.objects.groups[g].children.len())
    }

    fn program(&self, handle: ProgramHandle) -> Result<Program> {
        let i = check_handle(&self.programs, ProgramHandle::KIND, handle.index())?;
        Ok(self.programs[i])
    }

    fn before_programs(&self, what: &str) -> Result<()> {
        if self.programs.is_empty() {
            Ok(())
        } else {
            Err(Error::engine(format!("{what} must be set before programs are created")))
        }
    }

    fn output_buffer(&self, width: u32, height: u32) -> Result<usize> {
        let handle = self
            .variables
            .buffer(names::OUTPUT_BUFFER)
            .map_err(|e| Error::launch(format!("{}: {e}", names::OUTPUT_BUFFER)))?;
        let i = check_handle(&self.buffers, BufferHandle::KIND, handle.index())?;
        let buf = &self.buffers[i];
        if (buf.width, buf.height) != (width, height) {
            return Err(Error::launch(format!(
                "launch {width}x{height} does not match output buffer {}x{}",
                buf.width, buf.height
            )));
        }
        Ok(i)
    }

    /// `top_object` must name a live group with at least one child.
    fn top_object(&self) -> Result<usize> {
        let handle = self
            .variables
            .group(names::TOP_OBJECT)
            .map_err(|e| Error::launch(format!("{}: {e}", names::TOP_OBJECT)))?;
        let g = check_handle(&self.objects.groups, GroupHandle::KIND, handle.index())
            .map_err(|e| Error::launch(format!("{}: {e}", names::TOP_OBJECT)))?;
        if self.objects.groups[g].children.is_empty() {
            return Err(Error::launch(format!("{} has no children", names::TOP_OBJECT)));
        }
        Ok(g)
    }

    fn flush_print(&self) {
        let (text, dropped) = self.print.drain();
        for line in text.lines() {
            tracing::info!(target: "device", "{line}");
        }
        if dropped > 0 {
            tracing::warn!(
                "device print buffer full ({} bytes), {dropped} message(s) dropped",
                self.print.config().buffer_size
            );
        }
    }
}

impl ExecutionContext for CpuContext {
    fn set_ray_type_count(&mut self, count: u32) -> Result<()> {
        self.before_programs("ray type count")?;
        self.ray_type_count = count;
        self.objects.miss = vec![None; count as usize];
        Ok(())
    }

    fn set_entry_point_count(&mut self, count: u32) -> Result<()> {
        self.before_programs("entry point count")?;
        self.entry_point_count = count;
        self.raygen = vec![None; count as usize];
        Ok(())
    }

    fn set_print(&mut self, config: PrintConfig) {
        self.print = PrintBuffer::new(config);
    }

    fn create_program(&mut self, id: &ProgramId) -> Result<ProgramHandle> {
        let program = self.library.resolve(id)?;
        tracing::debug!("loaded {} program {id} from {}", program.kind(), id.module.path.display());
        self.programs.push(program);
        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn set_ray_generation_program(&mut self, entry_point: u32, program: ProgramHandle) -> Result<()> {
        let f = match self.program(program)? {
            Program::RayGen(f) => f,
            other => return Err(wrong_kind("ray generation", &other)),
        };
        let slot = self
            .raygen
            .get_mut(entry_point as usize)
            .ok_or_else(|| Error::engine(format!("entry point {entry_point} out of range")))?;
        *slot = Some(f);
        Ok(())
    }

    fn set_miss_program(&mut self, ray_type: u32, program: ProgramHandle) -> Result<()> {
        let f = match self.program(program)? {
            Program::Miss(f) => f,
            other => return Err(wrong_kind("miss", &other)),
        };
        let slot = self
            .objects
            .miss
            .get_mut(ray_type as usize)
            .ok_or_else(|| Error::engine(format!("ray type {ray_type} out of range")))?;
        *slot = Some(f);
        Ok(())
    }

    fn create_geometry(&mut self, desc: GeometryDesc) -> Result<GeometryHandle> {
        if desc.primitive_count == 0 {
            return Err(Error::engine("geometry needs at least one primitive"));
        }
        let bounds = match self.program(desc.bounds)? {
            Program::Bounds(f) => f,
            other => return Err(wrong_kind("bounding box", &other)),
        };
        let intersect = match self.program(desc.intersect)? {
            Program::Intersect(f) => f,
            other => return Err(wrong_kind("intersection", &other)),
        };
        self.objects.geometries.push(Geometry {
            primitive_count: desc.primitive_count,
            bounds,
            intersect,
            variables: desc.variables,
        });
        Ok(GeometryHandle(self.objects.geometries.len() as u32 - 1))
    }

    fn create_material(&mut self, desc: MaterialDesc) -> Result<MaterialHandle> {
        if desc.ray_type >= self.ray_type_count {
            return Err(Error::engine(format!(
                "ray type {} out of range (count {})",
                desc.ray_type, self.ray_type_count
            )));
        }
        let closest_hit = match self.program(desc.closest_hit)? {
            Program::ClosestHit(f) => f,
            other => return Err(wrong_kind("closest hit", &other)),
        };
        let mut slots: SmallVec<[_; 1]> = SmallVec::from_elem(None, self.ray_type_count as usize);
        slots[desc.ray_type as usize] = Some(closest_hit);
        self.objects.materials.push(Material { closest_hit: slots });
        Ok(MaterialHandle(self.objects.materials.len() as u32 - 1))
    }

    fn create_geometry_instance(
        &mut self,
        geometry: GeometryHandle,
        materials: &[MaterialHandle],
    ) -> Result<InstanceHandle> {
        let geometry = check_handle(&self.objects.geometries, GeometryHandle::KIND, geometry.index())?;
        if materials.is_empty() {
            return Err(Error::engine("geometry instance needs at least one material"));
        }
        let materials = materials
            .iter()
            .map(|m| check_handle(&self.objects.materials, MaterialHandle::KIND, m.index()))
            .collect::<Result<SmallVec<[usize; 1]>>>()?;
        self.objects.instances.push(Instance { geometry, materials });
        Ok(InstanceHandle(self.objects.instances.len() as u32 - 1))
    }

    fn create_acceleration(&mut self, builder: &str) -> Result<AccelerationHandle> {
        let kind = AccelKind::from_builder(builder)?;
        self.objects.accelerations.push(Acceleration {
            kind,
            builder: builder.to_string(),
        });
        Ok(AccelerationHandle(self.objects.accelerations.len() as u32 - 1))
    }

    fn create_geometry_group(
        &mut self,
        children: &[InstanceHandle],
        acceleration: AccelerationHandle,
    ) -> Result<GroupHandle> {
        if children.is_empty() {
            return Err(Error::EmptyScene);
        }
        let acceleration = check_handle(
            &self.objects.accelerations,
            AccelerationHandle::KIND,
            acceleration.index(),
        )?;
        let children = children
            .iter()
            .map(|c| check_handle(&self.objects.instances, InstanceHandle::KIND, c.index()))
            .collect::<Result<SmallVec<[usize; 1]>>>()?;
        self.objects.groups.push(Group {
            children,
            acceleration,
            prims: Vec::new(),
            bvh: None,
        });
        Ok(GroupHandle(self.objects.groups.len() as u32 - 1))
    }

    fn geometry_bounds(&self, geometry: GeometryHandle) -> Result<Aabb> {
        let g = check_handle(&self.objects.geometries, GeometryHandle::KIND, geometry.index())?;
        let geometry = &self.objects.geometries[g];
        let mut bounds = Aabb::EMPTY;
        for primitive in 0..geometry.primitive_count {
            bounds.grow(&geometry.primitive_bounds(primitive)?);
        }
        Ok(bounds)
    }

    fn variables(&self) -> &Variables {
        &self.variables
    }

    fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    fn create_buffer(&mut self, format: BufferFormat, width: u32, height: u32) -> Result<BufferHandle> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        self.buffers.push(Buffer {
            format,
            width,
            height,
            data: vec![[0; 4]; width as usize * height as usize],
            mapped: AtomicBool::new(false),
        });
        Ok(BufferHandle(self.buffers.len() as u32 - 1))
    }

    #[tracing::instrument(skip(self))]
    fn launch(&mut self, entry_point: u32, width: u32, height: u32) -> Result<()> {
        if entry_point >= self.entry_point_count {
            return Err(Error::launch(format!(
                "entry point {entry_point} out of range (count {})",
                self.entry_point_count
            )));
        }
        let raygen = self.raygen[entry_point as usize]
            .ok_or_else(|| Error::launch(format!("no ray generation program at entry point {entry_point}")))?;
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        if self.ray_type_count == 0 {
            return Err(Error::launch("no ray types configured"));
        }
        if let Some(i) = self.buffers.iter().position(|b| b.mapped.load(Ordering::Acquire)) {
            return Err(Error::launch(format!("buffer {i} is mapped")));
        }
        let out = self.output_buffer(width, height)?;
        self.top_object()?;

        self.objects.build_accelerations()?;

        // Move the output storage out so programs can borrow the rest of the context.
        let mut pixels = std::mem::take(&mut self.buffers[out].data);
        let dev = DeviceCtx {
            variables: &self.variables,
            objects: &self.objects,
            print: &self.print,
            launch_dim: UVec2::new(width, height),
        };
        let result = pixels
            .par_chunks_mut(width as usize)
            .enumerate()
            .try_for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    *px = raygen(&dev, UVec2::new(x as u32, y as u32))?;
                }
                Ok::<(), Error>(())
            });
        self.buffers[out].data = pixels;
        self.flush_print();

        result.map_err(|e| match e {
            Error::Launch(_) => e,
            other => Error::launch(other.to_string()),
        })?;
        self.launches += 1;
        tracing::debug!("launch complete");
        Ok(())
    }

    fn map_buffer(&self, buffer: BufferHandle) -> Result<&[u8]> {
        let i = check_handle(&self.buffers, BufferHandle::KIND, buffer.index())?;
        let buf = &self.buffers[i];
        if buf.mapped.swap(true, Ordering::AcqRel) {
            return Err(Error::BufferMapped(buffer.index()));
        }
        debug_assert_eq!(buf.format.element_size(), std::mem::size_of::<[u8; 4]>());
        Ok(bytemuck::cast_slice(&buf.data))
    }

    fn unmap_buffer(&self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.get(buffer.index() as usize) {
            buf.mapped.store(false, Ordering::Release);
        }
    }
}
