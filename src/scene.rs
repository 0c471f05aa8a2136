//! Scene graph assembly.
//!
//! Builds the single geometry, material, instance and accelerated group of a
//! plate scene inside an [`ExecutionContext`] and binds the camera and scene
//! parameters the programs read.

use crate::camera::CameraFrame;
use crate::engine::{
    names, AccelerationHandle, ExecutionContext, GeometryDesc, GeometryHandle, GroupHandle,
    InstanceHandle, MaterialDesc, MaterialHandle, ProgramSet, Variables,
};
use crate::util::{Error, Result, Vec3, Vec4};

/// Ray type index of radiance rays, the only ray type.
pub const RADIANCE_RAY_TYPE: u32 = 0;

/// Shape parameters of the disc primitive, in unit model coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySpec {
    pub primitive_count: u32,
    /// Disc center in `xyz`, radius in `w`.
    pub shape: Vec4,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl Default for GeometrySpec {
    fn default() -> Self {
        Self {
            primitive_count: 1,
            shape: Vec4::new(0.0, 0.0, 0.0, 0.5),
            bounds_min: Vec3::splat(-0.5),
            bounds_max: Vec3::splat(0.5),
        }
    }
}

impl GeometrySpec {
    fn variables(&self) -> Variables {
        let mut vars = Variables::new();
        vars.set_float4(names::DISC_SHAPE, self.shape)
            .set_float3(names::DISC_MIN, self.bounds_min)
            .set_float3(names::DISC_MAX, self.bounds_max);
        vars
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialSpec {
    /// Ray type slot the shading program is bound to.
    pub ray_type: u32,
}

impl Default for MaterialSpec {
    fn default() -> Self {
        Self {
            ray_type: RADIANCE_RAY_TYPE,
        }
    }
}

/// What to put in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSpec {
    pub geometry: GeometrySpec,
    pub material: MaterialSpec,
    /// Number of geometry instances under the root group. Only 1 is supported.
    pub instances: u32,
    /// Acceleration builder name.
    pub acceleration: String,
}

impl Default for SceneSpec {
    fn default() -> Self {
        Self {
            geometry: GeometrySpec::default(),
            material: MaterialSpec::default(),
            instances: 1,
            acceleration: "Trbvh".to_string(),
        }
    }
}

impl SceneSpec {
    /// Reject scenes outside the one-instance, one-primitive, one-ray-type contract.
    pub fn validate(&self) -> Result<()> {
        match self.instances {
            0 => return Err(Error::EmptyScene),
            1 => {}
            n => return Err(Error::unsupported(format!("{n} geometry instances"))),
        }
        if self.geometry.primitive_count != 1 {
            return Err(Error::unsupported(format!(
                "{} primitives per geometry",
                self.geometry.primitive_count
            )));
        }
        if self.material.ray_type != RADIANCE_RAY_TYPE {
            return Err(Error::unsupported(format!(
                "material bound to ray type {}",
                self.material.ray_type
            )));
        }
        Ok(())
    }
}

/// Context-wide parameters bound alongside the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneParameters {
    pub camera: CameraFrame,
    pub scene_epsilon: f32,
    pub radiance_ray_type: u32,
}

impl SceneParameters {
    pub fn new(camera: CameraFrame, scene_epsilon: f32) -> Self {
        Self {
            camera,
            scene_epsilon,
            radiance_ray_type: RADIANCE_RAY_TYPE,
        }
    }

    pub fn bind(&self, vars: &mut Variables) {
        vars.set_float3(names::EYE, self.camera.eye)
            .set_float3(names::U, self.camera.u)
            .set_float3(names::V, self.camera.v)
            .set_float3(names::W, self.camera.w)
            .set_float(names::SCENE_EPSILON, self.scene_epsilon)
            .set_uint(names::RADIANCE_RAY_TYPE, self.radiance_ray_type);
    }
}

/// Handles of an assembled scene. `root` is bound as `top_object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneGraph {
    pub root: GroupHandle,
    pub instance: InstanceHandle,
    pub material: MaterialHandle,
    pub geometry: GeometryHandle,
    pub acceleration: AccelerationHandle,
}

/// Build the scene in `ctx` and bind it with `params`.
///
/// The context must already be configured for one ray type.
#[tracing::instrument(skip_all, fields(acceleration = %spec.acceleration))]
pub fn assemble_scene<C: ExecutionContext + ?Sized>(
    ctx: &mut C,
    programs: &ProgramSet,
    params: &SceneParameters,
    spec: &SceneSpec,
) -> Result<SceneGraph> {
    spec.validate()?;

    let bounds = ctx.create_program(&programs.bounds)?;
    let intersect = ctx.create_program(&programs.intersect)?;
    let geometry = ctx.create_geometry(GeometryDesc {
        primitive_count: spec.geometry.primitive_count,
        bounds,
        intersect,
        variables: spec.geometry.variables(),
    })?;

    let closest_hit = ctx.create_program(&programs.closest_hit)?;
    let material = ctx.create_material(MaterialDesc {
        ray_type: spec.material.ray_type,
        closest_hit,
    })?;

    let instance = ctx.create_geometry_instance(geometry, &[material])?;
    let acceleration = ctx.create_acceleration(&spec.acceleration)?;
    let root = ctx.create_geometry_group(&[instance], acceleration)?;

    let vars = ctx.variables_mut();
    vars.set_group(names::TOP_OBJECT, root);
    params.bind(vars);
    for (name, value) in vars.iter() {
        tracing::trace!("{name} = {value:?}");
    }

    let world = ctx.geometry_bounds(geometry)?;
    tracing::debug!("geometry bounds {world:?}");
    tracing::info!("scene assembled: 1 instance under {}", spec.acceleration);

    Ok(SceneGraph {
        root,
        instance,
        material,
        geometry,
        acceleration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{compute_frame, BoundingDescriptor};
    use crate::config::{PRIMITIVE_NAME, RUN_NAME};
    use crate::engine::cpu::{CpuContext, CpuEngine};
    use crate::engine::{Engine, ModuleRef};

    fn setup() -> (CpuContext, ProgramSet, SceneParameters) {
        let mut ctx = CpuEngine::new().create_context().unwrap();
        ctx.set_ray_type_count(1).unwrap();
        ctx.set_entry_point_count(1).unwrap();
        let programs = ProgramSet::new(
            &ModuleRef::new(RUN_NAME, "scene.ptx"),
            &ModuleRef::new(PRIMITIVE_NAME, "disc.ptx"),
        );
        let desc = BoundingDescriptor::new(Vec3::ZERO, 0.5).unwrap();
        let params = SceneParameters::new(compute_frame(&desc, 8, 6).unwrap(), 0.1);
        (ctx, programs, params)
    }

    #[test]
    fn test_assemble_binds_parameters() {
        let (mut ctx, programs, params) = setup();
        let scene = assemble_scene(&mut ctx, &programs, &params, &SceneSpec::default()).unwrap();

        let vars = ctx.variables();
        assert_eq!(vars.group(names::TOP_OBJECT).unwrap(), scene.root);
        assert_eq!(vars.float3(names::EYE).unwrap(), params.camera.eye);
        assert_eq!(vars.float3(names::W).unwrap(), params.camera.w);
        assert_eq!(vars.float(names::SCENE_EPSILON).unwrap(), 0.1);
        assert_eq!(vars.uint(names::RADIANCE_RAY_TYPE).unwrap(), 0);
        assert_eq!(ctx.group_children(scene.root).unwrap(), 1);
    }

    #[test]
    fn test_zero_instances_rejected() {
        let (mut ctx, programs, params) = setup();
        let spec = SceneSpec {
            instances: 0,
            ..SceneSpec::default()
        };
        let err = assemble_scene(&mut ctx, &programs, &params, &spec).unwrap_err();
        assert!(matches!(err, Error::EmptyScene));
        assert!(!ctx.variables().contains(names::TOP_OBJECT));
    }

    #[test]
    fn test_out_of_contract_scenes() {
        let mut spec = SceneSpec::default();
        spec.instances = 2;
        assert!(matches!(spec.validate(), Err(Error::Unsupported(_))));

        let mut spec = SceneSpec::default();
        spec.geometry.primitive_count = 3;
        assert!(matches!(spec.validate(), Err(Error::Unsupported(_))));

        let mut spec = SceneSpec::default();
        spec.material.ray_type = 1;
        assert!(matches!(spec.validate(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_unknown_acceleration() {
        let (mut ctx, programs, params) = setup();
        let spec = SceneSpec {
            acceleration: "Octree".to_string(),
            ..SceneSpec::default()
        };
        let err = assemble_scene(&mut ctx, &programs, &params, &spec).unwrap_err();
        assert!(matches!(err, Error::UnknownAcceleration(ref n) if n == "Octree"));
    }
}
