/*!
    Output buffers and the allocators that hand them out.
*/

use std::sync::{Arc, Weak};

use h264dec_types::{Error, RefTime, Result, SurfaceHandle, SurfaceSlot};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::dispatch::DecodeState;

/**
    Storage behind an output buffer.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Host memory for software-decoded pictures.
    Host(Vec<u8>),
    /// A pool surface; the buffer borrows the slot, the pool owns it.
    Surface(SurfaceSlot),
}

/**
    Interfaces an output buffer may be queried for.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// The hardware surface backing the buffer.
    VideoSurface,
    Other(u128),
}

#[derive(Debug, Default)]
struct FreeSlots {
    payloads: Vec<Payload>,
    committed: bool,
}

/// Storage not currently held downstream, with a wakeup for waiting takers.
#[derive(Debug, Default)]
struct FreeList {
    slots: Mutex<FreeSlots>,
    returned: Condvar,
}

impl FreeList {
    fn committed(payloads: Vec<Payload>) -> Self {
        Self {
            slots: Mutex::new(FreeSlots {
                payloads,
                committed: true,
            }),
            returned: Condvar::new(),
        }
    }
}

type SharedFreeList = Arc<FreeList>;

/**
    One output picture on its way downstream.

    Dropping the buffer returns its storage to the allocator it came from,
    unless that allocator has been freed since.
*/
#[derive(Debug)]
pub struct OutputBuffer {
    pub start: RefTime,
    pub stop: RefTime,
    pub actual_len: usize,
    /// Renderer surface index written by the legacy accelerator.
    pub accel_surface: Option<u32>,
    payload: Payload,
    home: Weak<FreeList>,
}

impl OutputBuffer {
    fn new(payload: Payload, home: Weak<FreeList>) -> Self {
        let actual_len = match &payload {
            Payload::Host(data) => data.len(),
            Payload::Surface(_) => 0,
        };
        Self {
            start: RefTime(0),
            stop: RefTime::UNKNOWN,
            actual_len,
            accel_surface: None,
            payload,
            home,
        }
    }

    /**
        A buffer that belongs to no allocator.
    */
    pub fn detached(payload: Payload) -> Self {
        Self::new(payload, Weak::new())
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /**
        The pool slot bound to this buffer, for zero-copy handoff.
    */
    pub fn surface(&self) -> Option<SurfaceSlot> {
        match self.payload {
            Payload::Surface(slot) => Some(slot),
            Payload::Host(_) => None,
        }
    }

    pub fn host_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.payload {
            Payload::Host(data) => Some(data),
            Payload::Surface(_) => None,
        }
    }

    /**
        Query the buffer for a service. Only surface-bound buffers expose
        [`ServiceId::VideoSurface`].
    */
    pub fn service(&self, id: ServiceId) -> Result<SurfaceHandle> {
        match (id, self.surface()) {
            (ServiceId::VideoSurface, Some(slot)) => Ok(slot.handle),
            (ServiceId::VideoSurface, None) => {
                Err(Error::unsupported("buffer is not backed by a surface"))
            }
            (ServiceId::Other(guid), _) => Err(Error::unsupported(format!(
                "service {guid:032x} is not provided"
            ))),
        }
    }
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        let Some(home) = self.home.upgrade() else {
            return;
        };
        let mut slots = home.slots.lock();
        if slots.committed {
            let payload = std::mem::replace(&mut self.payload, Payload::Host(Vec::new()));
            slots.payloads.push(payload);
            home.returned.notify_one();
        }
    }
}

/**
    Source of output buffers for the dispatch loop.
*/
pub trait OutputAllocator: Send + Sync {
    /// Take a free buffer, waiting for one to come back from downstream if
    /// all are held. Fails once the allocator is freed.
    fn get_buffer(&self) -> Result<OutputBuffer>;

    /// Take a free buffer without waiting; fails when every buffer is held.
    fn try_get_buffer(&self) -> Result<OutputBuffer>;

    /// Release the allocator's storage. Outstanding buffers are discarded
    /// when dropped.
    fn free(&self);

    /// Number of buffers the allocator was built with.
    fn len(&self) -> usize;

    fn free_count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn take_buffer(list: &SharedFreeList) -> Result<OutputBuffer> {
    let mut slots = list.slots.lock();
    loop {
        if !slots.committed {
            return Err(Error::unexpected("allocator is not committed"));
        }
        if let Some(payload) = slots.payloads.pop() {
            return Ok(OutputBuffer::new(payload, Arc::downgrade(list)));
        }
        list.returned.wait(&mut slots);
    }
}

fn try_take_buffer(list: &SharedFreeList) -> Result<OutputBuffer> {
    let mut slots = list.slots.lock();
    if !slots.committed {
        return Err(Error::unexpected("allocator is not committed"));
    }
    match slots.payloads.pop() {
        Some(payload) => Ok(OutputBuffer::new(payload, Arc::downgrade(list))),
        None => Err(Error::allocation("no free output buffer")),
    }
}

/// Decommit the list. Waiting takers wake up and fail.
fn release(list: &SharedFreeList) {
    let mut slots = list.slots.lock();
    slots.committed = false;
    slots.payloads.clear();
    list.returned.notify_all();
}

/**
    Allocator of host-memory buffers for the software path.
*/
pub struct HostAllocator {
    list: SharedFreeList,
    count: usize,
}

impl HostAllocator {
    pub fn new(count: u32, size: u32) -> Self {
        let payloads = (0..count)
            .map(|_| Payload::Host(vec![0; size as usize]))
            .collect();
        Self {
            list: Arc::new(FreeList::committed(payloads)),
            count: count as usize,
        }
    }
}

impl OutputAllocator for HostAllocator {
    fn get_buffer(&self) -> Result<OutputBuffer> {
        take_buffer(&self.list)
    }

    fn try_get_buffer(&self) -> Result<OutputBuffer> {
        try_take_buffer(&self.list)
    }

    fn free(&self) {
        release(&self.list);
    }

    fn len(&self) -> usize {
        self.count
    }

    fn free_count(&self) -> usize {
        self.list.slots.lock().payloads.len()
    }
}

/**
    Allocator whose buffers are bound one-to-one to pool surfaces.
*/
pub struct SurfaceAllocator {
    state: Arc<Mutex<DecodeState>>,
    list: SharedFreeList,
    count: u32,
}

impl SurfaceAllocator {
    pub fn new(state: Arc<Mutex<DecodeState>>, count: u32) -> Self {
        Self {
            state,
            list: Arc::default(),
            count,
        }
    }

    /**
        Bind one buffer to each pool slot, highest index first.

        Fails without keeping any buffer if the pool is missing a slot.
    */
    pub fn allocate(&self) -> Result<()> {
        let state = self.state.lock();
        let mut payloads = Vec::with_capacity(self.count as usize);
        for index in (0..self.count).rev() {
            let Some(slot) = state.pool.surface_at(index) else {
                warn!(index, count = self.count, "pool has no surface for slot");
                return Err(Error::unexpected(format!("no pool surface for slot {index}")));
            };
            payloads.push(Payload::Surface(*slot));
        }

        let mut slots = self.list.slots.lock();
        slots.payloads = payloads;
        slots.committed = true;
        self.list.returned.notify_all();
        debug!(count = self.count, "surface allocator committed");
        Ok(())
    }
}

impl OutputAllocator for SurfaceAllocator {
    fn get_buffer(&self) -> Result<OutputBuffer> {
        take_buffer(&self.list)
    }

    fn try_get_buffer(&self) -> Result<OutputBuffer> {
        try_take_buffer(&self.list)
    }

    /**
        Flush the backend, then release the pool surfaces.
    */
    fn free(&self) {
        release(&self.list);
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.pool.free(state.backend.as_deref_mut());
    }

    fn len(&self) -> usize {
        self.count as usize
    }

    fn free_count(&self) -> usize {
        self.list.slots.lock().payloads.len()
    }
}

/**
    Buffer requirements exchanged with the downstream allocator.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorProperties {
    pub buffers: u32,
    pub size: u32,
    pub align: u32,
    pub prefix: u32,
}

/**
    The downstream side of buffer negotiation.
*/
pub trait BufferNegotiator {
    /// Request properties; returns what was actually granted.
    fn set_properties(&self, requested: AllocatorProperties) -> Result<AllocatorProperties>;
}

static_assertions::assert_impl_all!(OutputBuffer: Send, Sync);
static_assertions::assert_impl_all!(HostAllocator: Send, Sync);
