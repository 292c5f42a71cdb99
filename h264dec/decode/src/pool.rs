/*!
    Hardware surface pool.
*/

use std::sync::Arc;

use h264dec_types::{Error, Result, SurfaceHandle, SurfaceSlot};
use tracing::{debug, warn};

use crate::backend::DecoderBackend;
use crate::hw::{AccelerationService, DeviceGuard, VideoDesc};

/**
    A surface that is destroyed when dropped.
*/
struct OwnedSurface {
    service: Arc<dyn AccelerationService>,
    slot: SurfaceSlot,
}

impl Drop for OwnedSurface {
    fn drop(&mut self) {
        self.service.destroy_surface(self.slot.handle);
    }
}

/**
    Fixed-size set of hardware surfaces used as decoder render targets.

    Slot `i` is stored at position `i`. The pool size is fixed from a
    successful [`SurfacePool::allocate`] until [`SurfacePool::free`].
*/
#[derive(Default)]
pub struct SurfacePool {
    surfaces: Vec<OwnedSurface>,
}

impl SurfacePool {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Create `count` surfaces on the device, highest index first.

        If any creation fails, every surface created so far is destroyed and
        the pool stays empty.
    */
    pub fn allocate(&mut self, device: &DeviceGuard, desc: &VideoDesc, count: u32) -> Result<()> {
        if !self.surfaces.is_empty() {
            return Err(Error::unexpected("surface pool is already allocated"));
        }
        if count == 0 {
            return Err(Error::allocation("surface count must be at least 1"));
        }

        let service = device.service();
        let mut created = Vec::with_capacity(count as usize);
        for index in (0..count).rev() {
            match service.create_surface(device.raw(), desc) {
                Ok(handle) => created.push(OwnedSurface {
                    service: Arc::clone(service),
                    slot: SurfaceSlot::new(index, handle),
                }),
                Err(e) => {
                    warn!(
                        index,
                        created = created.len(),
                        "surface creation failed, rolling back pool"
                    );
                    drop(created);
                    return Err(Error::allocation(format!(
                        "surface {index} of {count}: {e}"
                    )));
                }
            }
        }

        created.reverse();
        self.surfaces = created;
        debug!(
            count,
            width = desc.width,
            height = desc.height,
            format = %desc.format,
            "allocated surface pool"
        );
        Ok(())
    }

    /**
        Release every surface. The backend, if any, is flushed first so it no
        longer holds frames that reference the surfaces.
    */
    pub fn free(&mut self, backend: Option<&mut (dyn DecoderBackend + 'static)>) {
        if let Some(backend) = backend {
            backend.flush();
        }
        if !self.surfaces.is_empty() {
            debug!(count = self.surfaces.len(), "freeing surface pool");
        }
        self.surfaces.clear();
    }

    pub fn surface_at(&self, index: u32) -> Option<&SurfaceSlot> {
        self.surfaces.get(index as usize).map(|s| &s.slot)
    }

    /**
        Surface handles in slot index order.
    */
    pub fn handles(&self) -> Vec<SurfaceHandle> {
        self.surfaces.iter().map(|s| s.slot.handle).collect()
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl Drop for SurfacePool {
    fn drop(&mut self) {
        self.free(None);
    }
}
