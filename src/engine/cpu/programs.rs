//! Built-in programs: the plate scene module and the disc primitive module.

use std::f32::consts::TAU;

use super::device::{DeviceCtx, Hit};
use super::library::{Program, ProgramLibrary};
use crate::config::{PRIMITIVE_NAME, RUN_NAME};
use crate::engine::{names, Variables, BOUNDS, CLOSEST_HIT_RADIANCE, INTERSECT, MISS, RAYGEN};
use crate::util::{Aabb, Ray, Result, UVec2, Vec2, Vec3};

/// Colour returned for rays that leave the scene.
pub const BACKGROUND: Vec3 = Vec3::new(0.1, 0.1, 0.12);

/// Holes are evenly spaced on a ring around the disc center.
const HOLE_COUNT: u32 = 6;
/// Ring radius as a fraction of the disc radius.
const HOLE_RING: f32 = 0.55;
/// Hole radius as a fraction of the disc radius.
const HOLE_RADIUS: f32 = 0.15;

pub(crate) fn register(lib: &mut ProgramLibrary) {
    lib.register(RUN_NAME, RAYGEN, Program::RayGen(raygen))
        .register(RUN_NAME, MISS, Program::Miss(miss))
        .register(RUN_NAME, CLOSEST_HIT_RADIANCE, Program::ClosestHit(closest_hit_radiance))
        .register(PRIMITIVE_NAME, BOUNDS, Program::Bounds(disc_bounds))
        .register(PRIMITIVE_NAME, INTERSECT, Program::Intersect(disc_intersect));
}

/// Quantize a linear colour to RGBA8 with opaque alpha.
pub fn to_rgba8(c: Vec3) -> [u8; 4] {
    let c = (c.clamp(Vec3::ZERO, Vec3::ONE) * 255.99).as_uvec3();
    [c.x as u8, c.y as u8, c.z as u8, 255]
}

/// Pinhole camera: one ray through the center of each pixel.
fn raygen(dev: &DeviceCtx<'_>, index: UVec2) -> Result<[u8; 4]> {
    let vars = dev.variables();
    let eye = vars.float3(names::EYE)?;
    let u = vars.float3(names::U)?;
    let v = vars.float3(names::V)?;
    let w = vars.float3(names::W)?;
    let epsilon = vars.float(names::SCENE_EPSILON)?;
    let ray_type = vars.uint(names::RADIANCE_RAY_TYPE)?;
    let top = vars.group(names::TOP_OBJECT)?;

    let dim = dev.launch_dim();
    let d = (index.as_vec2() + 0.5) / dim.as_vec2() * 2.0 - 1.0;
    let direction = (u * d.x + v * d.y + w).normalize();

    if index == UVec2::ZERO {
        dev.print(
            index,
            format_args!("raygen launch {}x{} eye {} dir {}\n", dim.x, dim.y, eye, direction),
        );
    }

    let color = dev.trace(top, &Ray::new(eye, direction), ray_type, epsilon)?;
    Ok(to_rgba8(color))
}

fn miss(_vars: &Variables, _ray: &Ray) -> Result<Vec3> {
    Ok(BACKGROUND)
}

/// Normal shading, with the normal turned to face the viewer.
fn closest_hit_radiance(_vars: &Variables, ray: &Ray, hit: &Hit) -> Result<Vec3> {
    let n = if hit.normal.dot(ray.direction) > 0.0 {
        -hit.normal
    } else {
        hit.normal
    };
    Ok(n * 0.5 + 0.5)
}

fn disc_bounds(vars: &Variables, _primitive: u32) -> Result<Aabb> {
    Ok(Aabb::new(vars.float3(names::DISC_MIN)?, vars.float3(names::DISC_MAX)?))
}

/// Disc in the plane `z = shape.z` with radius `shape.w`, minus a ring of
/// circular holes.
fn disc_intersect(
    vars: &Variables,
    _primitive: u32,
    ray: &Ray,
    t_min: f32,
    t_max: f32,
) -> Result<Option<Hit>> {
    let shape = vars.float4(names::DISC_SHAPE)?;
    let center = shape.truncate();
    let radius = shape.w;

    if ray.direction.z.abs() < 1e-12 {
        return Ok(None);
    }
    let t = (center.z - ray.origin.z) / ray.direction.z;
    if !(t_min..=t_max).contains(&t) {
        return Ok(None);
    }

    let p = ray.at(t).truncate() - center.truncate();
    if p.length_squared() > radius * radius || in_hole(p, radius) {
        return Ok(None);
    }

    Ok(Some(Hit {
        t,
        normal: Vec3::Z,
        material: 0,
    }))
}

fn in_hole(p: Vec2, radius: f32) -> bool {
    let ring = radius * HOLE_RING;
    let hole = radius * HOLE_RADIUS;
    (0..HOLE_COUNT).any(|k| {
        let angle = k as f32 * TAU / HOLE_COUNT as f32;
        let c = Vec2::new(angle.cos(), angle.sin()) * ring;
        p.distance_squared(c) < hole * hole
    })
}
