//! What a running program sees: launch dimensions, context variables,
//! scene tracing and the print buffer.

use std::fmt;

use super::objects::SceneObjects;
use super::print::PrintBuffer;
use crate::engine::{GroupHandle, Variables};
use crate::util::{Error, Ray, Result, UVec2, Vec3};

/// A reported intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    /// Geometric normal at the hit, unit length.
    pub normal: Vec3,
    /// Index into the instance's material list.
    pub material: u32,
}

/// Per-launch view of a context, shared by all launch indices.
pub struct DeviceCtx<'a> {
    pub(crate) variables: &'a Variables,
    pub(crate) objects: &'a SceneObjects,
    pub(crate) print: &'a PrintBuffer,
    pub(crate) launch_dim: UVec2,
}

impl<'a> DeviceCtx<'a> {
    #[inline]
    pub fn variables(&self) -> &'a Variables {
        self.variables
    }

    #[inline]
    pub fn launch_dim(&self) -> UVec2 {
        self.launch_dim
    }

    /// Append to the print buffer if `index` is allowed to print.
    #[inline]
    pub fn print(&self, index: UVec2, args: fmt::Arguments<'_>) {
        self.print.print(index, args);
    }

    /// Trace `ray` against `group` and return the shaded result.
    ///
    /// Runs the closest-hit program of the nearest hit's material for
    /// `ray_type`, or the miss program for `ray_type` if nothing is hit.
    /// A missing program leaves the result black.
    pub fn trace(&self, group: GroupHandle, ray: &Ray, ray_type: u32, t_min: f32) -> Result<Vec3> {
        let objects = self.objects;
        let group = objects
            .groups
            .get(group.index() as usize)
            .ok_or(Error::InvalidHandle {
                kind: GroupHandle::KIND,
                index: group.index(),
            })?;
        let bvh = group
            .bvh
            .as_ref()
            .ok_or_else(|| Error::launch("acceleration structure not built"))?;

        let mut nearest = None;
        bvh.traverse(ray, t_min, f32::INFINITY, |slot, t_max| {
            let prim = group.prims[slot];
            let instance = &objects.instances[prim.instance];
            let geometry = &objects.geometries[instance.geometry];
            let hit = (geometry.intersect)(&geometry.variables, prim.primitive, ray, t_min, t_max)?;
            Ok(hit.filter(|h| h.t >= t_min && h.t <= t_max).map(|h| {
                nearest = Some((h, prim));
                h.t
            }))
        })?;

        match nearest {
            Some((hit, prim)) => {
                let instance = &objects.instances[prim.instance];
                let material = instance
                    .materials
                    .get(hit.material as usize)
                    .map(|&m| &objects.materials[m])
                    .ok_or_else(|| {
                        Error::launch(format!("hit reported material {} out of range", hit.material))
                    })?;
                match material.closest_hit.get(ray_type as usize).copied().flatten() {
                    Some(closest_hit) => closest_hit(self.variables, ray, &hit),
                    None => Ok(Vec3::ZERO),
                }
            }
            None => match objects.miss.get(ray_type as usize).copied().flatten() {
                Some(miss) => miss(self.variables, ray),
                None => Ok(Vec3::ZERO),
            },
        }
    }
}
