//! Named parameter bindings.
//!
//! Programs read their inputs by name. Each context and each geometry owns a
//! [`Variables`] map from name to a tagged [`ParamValue`]; typed getters fail
//! with [`Error::VariableNotFound`] or [`Error::TypeMismatch`].

use std::collections::BTreeMap;

use super::handles::{BufferHandle, GroupHandle};
use crate::util::{Error, Result, Vec3, Vec4};

/// Well-known parameter names shared by the driver and the programs.
pub mod names {
    pub const EYE: &str = "eye";
    pub const U: &str = "U";
    pub const V: &str = "V";
    pub const W: &str = "W";
    pub const SCENE_EPSILON: &str = "scene_epsilon";
    pub const RADIANCE_RAY_TYPE: &str = "radiance_ray_type";
    pub const OUTPUT_BUFFER: &str = "output_buffer";
    pub const TOP_OBJECT: &str = "top_object";
    pub const DISC_SHAPE: &str = "disc_shape";
    pub const DISC_MIN: &str = "disc_min";
    pub const DISC_MAX: &str = "disc_max";
}

/// A typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Float3(Vec3),
    Float4(Vec4),
    Uint(u32),
    Group(GroupHandle),
    Buffer(BufferHandle),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Float3(_) => "float3",
            Self::Float4(_) => "float4",
            Self::Uint(_) => "uint",
            Self::Group(_) => "group",
            Self::Buffer(_) => "buffer",
        }
    }
}

/// Map from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: BTreeMap<String, ParamValue>,
}

macro_rules! typed_access {
    ($set:ident, $get:ident, $variant:ident, $ty:ty, $tag:literal) => {
        pub fn $set(&mut self, name: impl Into<String>, value: $ty) -> &mut Self {
            self.set(name, ParamValue::$variant(value))
        }

        pub fn $get(&self, name: &str) -> Result<$ty> {
            match self.lookup(name)? {
                ParamValue::$variant(v) => Ok(*v),
                other => Err(Error::TypeMismatch {
                    name: name.to_string(),
                    expected: $tag,
                    actual: other.type_name(),
                }),
            }
        }
    };
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    fn lookup(&self, name: &str) -> Result<&ParamValue> {
        self.values
            .get(name)
            .ok_or_else(|| Error::VariableNotFound(name.to_string()))
    }

    typed_access!(set_float, float, Float, f32, "float");
    typed_access!(set_float3, float3, Float3, Vec3, "float3");
    typed_access!(set_float4, float4, Float4, Vec4, "float4");
    typed_access!(set_uint, uint, Uint, u32, "uint");
    typed_access!(set_group, group, Group, GroupHandle, "group");
    typed_access!(set_buffer, buffer, Buffer, BufferHandle, "buffer");

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_roundtrip() {
        let mut vars = Variables::new();
        vars.set_float(names::SCENE_EPSILON, 0.1)
            .set_float3(names::EYE, Vec3::new(1.0, 2.0, 3.0))
            .set_uint(names::RADIANCE_RAY_TYPE, 0)
            .set_group(names::TOP_OBJECT, GroupHandle(4));

        assert_eq!(vars.len(), 4);
        assert_eq!(vars.float(names::SCENE_EPSILON).unwrap(), 0.1);
        assert_eq!(vars.float3(names::EYE).unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(vars.uint(names::RADIANCE_RAY_TYPE).unwrap(), 0);
        assert_eq!(vars.group(names::TOP_OBJECT).unwrap(), GroupHandle(4));
    }

    #[test]
    fn test_missing_and_mismatch() {
        let mut vars = Variables::new();
        vars.set_float(names::U, 1.0);

        assert!(matches!(vars.float3("nope"), Err(Error::VariableNotFound(n)) if n == "nope"));
        match vars.float3(names::U) {
            Err(Error::TypeMismatch { expected, actual, .. }) => {
                assert_eq!(expected, "float3");
                assert_eq!(actual, "float");
            }
            other => panic!("expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_rebind_replaces() {
        let mut vars = Variables::new();
        vars.set_uint("n", 1);
        vars.set_float("n", 2.0);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("n"), Some(&ParamValue::Float(2.0)));
    }

    #[test]
    fn test_iter_sorted_by_name() {
        let mut vars = Variables::new();
        vars.set_uint("b", 2).set_uint("a", 1).set_float("c", 3.0);
        let names: Vec<&str> = vars.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(vars.iter().nth(1).map(|(_, v)| *v), Some(ParamValue::Uint(2)));
    }
}
