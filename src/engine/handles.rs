//! Opaque handles to objects owned by an execution context.

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub const KIND: &'static str = $kind;

            /// Raw slot index inside the owning context.
            #[inline]
            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

define_handle!(
    /// Handle to a loaded program
    ProgramHandle, "program"
);
define_handle!(
    /// Handle to a geometry object
    GeometryHandle, "geometry"
);
define_handle!(
    /// Handle to a material
    MaterialHandle, "material"
);
define_handle!(
    /// Handle to a geometry instance (geometry + materials)
    InstanceHandle, "instance"
);
define_handle!(
    /// Handle to an acceleration structure
    AccelerationHandle, "acceleration"
);
define_handle!(
    /// Handle to a geometry group
    GroupHandle, "group"
);
define_handle!(
    /// Handle to a device buffer
    BufferHandle, "buffer"
);
