/*!
    Hardware surface identifiers.
*/

/**
    Opaque handle to one hardware video-memory surface.

    The handle's lifetime is owned by whoever created the surface; this type
    is only a name for it.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceHandle(pub u64);

/**
    One entry of a surface pool: an index and the surface it names.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceSlot {
    pub index: u32,
    pub handle: SurfaceHandle,
}

impl SurfaceSlot {
    pub const fn new(index: u32, handle: SurfaceHandle) -> Self {
        Self { index, handle }
    }
}
