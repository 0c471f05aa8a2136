//! Object storage for a software execution context.

use smallvec::SmallVec;

use super::bvh::{build_bvh, Bvh};
use super::library::{BoundsFn, ClosestHitFn, IntersectFn, MissFn};
use crate::engine::Variables;
use crate::util::{Aabb, Error, Result};

pub(crate) struct Geometry {
    pub primitive_count: u32,
    pub bounds: BoundsFn,
    pub intersect: IntersectFn,
    pub variables: Variables,
}

impl Geometry {
    pub fn primitive_bounds(&self, primitive: u32) -> Result<Aabb> {
        (self.bounds)(&self.variables, primitive)
    }
}

pub(crate) struct Material {
    /// Indexed by ray type.
    pub closest_hit: SmallVec<[Option<ClosestHitFn>; 1]>,
}

pub(crate) struct Instance {
    pub geometry: usize,
    pub materials: SmallVec<[usize; 1]>,
}

/// Acceleration strategy selected by builder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelKind {
    /// Binned SAH hierarchy.
    Bvh,
    /// Linear scan over every primitive.
    NoAccel,
}

impl AccelKind {
    pub fn from_builder(name: &str) -> Result<Self> {
        match name {
            "Trbvh" | "Sbvh" | "Bvh" | "Lbvh" => Ok(Self::Bvh),
            "NoAccel" => Ok(Self::NoAccel),
            other => Err(Error::UnknownAcceleration(other.to_string())),
        }
    }
}

pub(crate) struct Acceleration {
    pub kind: AccelKind,
    pub builder: String,
}

/// One primitive of one instance, as stored in a group's hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrimRef {
    pub instance: usize,
    pub primitive: u32,
}

pub(crate) struct Group {
    pub children: SmallVec<[usize; 1]>,
    pub acceleration: usize,
    pub prims: Vec<PrimRef>,
    /// Built on first launch.
    pub bvh: Option<Bvh>,
}

/// Everything programs can reach while tracing.
#[derive(Default)]
pub(crate) struct SceneObjects {
    pub geometries: Vec<Geometry>,
    pub materials: Vec<Material>,
    pub instances: Vec<Instance>,
    pub accelerations: Vec<Acceleration>,
    pub groups: Vec<Group>,
    /// Miss program per ray type.
    pub miss: Vec<Option<MissFn>>,
}

impl SceneObjects {
    /// Build the hierarchy of every group that does not have one yet.
    pub fn build_accelerations(&mut self) -> Result<()> {
        for group in self.groups.iter_mut().filter(|g| g.bvh.is_none()) {
            let mut prims = Vec::new();
            let mut aabbs = Vec::new();
            for &inst in &group.children {
                let geometry = &self.geometries[self.instances[inst].geometry];
                for primitive in 0..geometry.primitive_count {
                    aabbs.push(geometry.primitive_bounds(primitive)?);
                    prims.push(PrimRef {
                        instance: inst,
                        primitive,
                    });
                }
            }

            let accel = &self.accelerations[group.acceleration];
            let bvh = match accel.kind {
                AccelKind::Bvh => build_bvh(&aabbs),
                AccelKind::NoAccel => Bvh::flat(&aabbs),
            };
            tracing::debug!(
                builder = %accel.builder,
                prims = prims.len(),
                nodes = bvh.nodes.len(),
                bounds = ?bvh.bounds(),
                "acceleration built"
            );
            group.prims = prims;
            group.bvh = Some(bvh);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_names() {
        assert_eq!(AccelKind::from_builder("Trbvh").unwrap(), AccelKind::Bvh);
        assert_eq!(AccelKind::from_builder("Sbvh").unwrap(), AccelKind::Bvh);
        assert_eq!(AccelKind::from_builder("NoAccel").unwrap(), AccelKind::NoAccel);
        assert!(matches!(
            AccelKind::from_builder("KdTree"),
            Err(Error::UnknownAcceleration(name)) if name == "KdTree"
        ));
    }
}
