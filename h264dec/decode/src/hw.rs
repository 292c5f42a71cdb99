/*!
    Hardware collaborators and owned hardware resources.

    Everything that talks to a GPU, a driver or a renderer goes through the
    traits in this module. Handles with externally managed lifetimes are
    wrapped so they are released exactly once, on every exit path.
*/

use std::fmt;
use std::sync::Arc;

use h264dec_types::{DecoderId, FourCc, Result, SurfaceHandle};

use crate::codec::AccelBuffer;

/**
    Graphics driver version: four 16-bit ordinals packed into a `u64`
    (major, minor, build, revision from high to low).

    Ordering is lexicographic over the four ordinals.
*/
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriverVersion(pub u64);

impl DriverVersion {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self(
            (major as u64) << 48 | (minor as u64) << 32 | (build as u64) << 16 | revision as u64,
        )
    }

    pub const fn parts(self) -> [u16; 4] {
        [
            (self.0 >> 48) as u16,
            (self.0 >> 32) as u16,
            (self.0 >> 16) as u16,
            self.0 as u16,
        ]
    }

    /**
        Returns true if this version is at least `major.minor.build.revision`.
    */
    pub const fn reached(self, major: u16, minor: u16, build: u16, revision: u16) -> bool {
        self.0 >= Self::new(major, minor, build, revision).0
    }
}

impl fmt::Debug for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.parts();
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

/**
    Operating system generation, which decides scheduling depth and some
    driver thresholds.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// Before the composited-desktop driver model
    Legacy,
    /// Composited-desktop driver model and later
    Modern,
}

/**
    Source of process-wide hardware facts.
*/
pub trait SystemInfo {
    fn vendor_id(&self) -> u32;
    fn device_id(&self) -> u32;
    fn driver_version(&self) -> DriverVersion;
    fn os_family(&self) -> OsFamily;
}

/**
    Snapshot of the hardware facts, queried once and passed by reference.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HardwareInfo {
    pub vendor: u32,
    pub device: u32,
    pub driver: DriverVersion,
    pub os: OsFamily,
}

impl HardwareInfo {
    pub fn query(system: &dyn SystemInfo) -> Self {
        Self {
            vendor: system.vendor_id(),
            device: system.device_id(),
            driver: system.driver_version(),
            os: system.os_family(),
        }
    }
}

/**
    Raw device handle as issued by an [`AccelerationService`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawDevice(pub u64);

/**
    Description of the uncompressed pictures a hardware decoder writes.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoDesc {
    pub width: u32,
    pub height: u32,
    pub format: FourCc,
}

/// Configuration accepts raw slice data without start codes.
pub const BITSTREAM_RAW_SHORT_SLICE: u32 = 2;

/**
    One decoder configuration offered by the acceleration service.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderConfiguration {
    pub id: u32,
    pub bitstream_raw: u32,
}

impl DecoderConfiguration {
    pub fn is_short_slice(&self) -> bool {
        self.bitstream_raw == BITSTREAM_RAW_SHORT_SLICE
    }
}

/**
    Platform video acceleration service (modern hardware path).
*/
pub trait AccelerationService: Send + Sync {
    fn open_device(&self) -> Result<RawDevice>;
    fn close_device(&self, device: RawDevice);
    fn decoder_ids(&self, device: RawDevice) -> Result<Vec<DecoderId>>;
    fn render_targets(&self, device: RawDevice, id: DecoderId) -> Result<Vec<FourCc>>;
    fn configurations(
        &self,
        device: RawDevice,
        id: DecoderId,
        desc: &VideoDesc,
    ) -> Result<Vec<DecoderConfiguration>>;
    fn create_surface(&self, device: RawDevice, desc: &VideoDesc) -> Result<SurfaceHandle>;
    fn destroy_surface(&self, surface: SurfaceHandle);
    fn create_decoder(
        &self,
        device: RawDevice,
        id: DecoderId,
        desc: &VideoDesc,
        config: &DecoderConfiguration,
        surfaces: &[SurfaceHandle],
    ) -> Result<Box<dyn HwVideoDecoder>>;
}

/**
    A hardware decoder instance created by an [`AccelerationService`].
*/
pub trait HwVideoDecoder: Send {
    fn begin_frame(&mut self, target: SurfaceHandle) -> Result<()>;
    fn execute(&mut self, buffers: &[AccelBuffer]) -> Result<()>;
    fn end_frame(&mut self) -> Result<()>;
}

/**
    Device handle that is closed when dropped.
*/
pub struct DeviceGuard {
    service: Arc<dyn AccelerationService>,
    raw: RawDevice,
}

impl DeviceGuard {
    /**
        Open a device on the service.
    */
    pub fn open(service: Arc<dyn AccelerationService>) -> Result<Self> {
        let raw = service.open_device()?;
        Ok(Self { service, raw })
    }

    pub fn raw(&self) -> RawDevice {
        self.raw
    }

    pub fn service(&self) -> &Arc<dyn AccelerationService> {
        &self.service
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.service.close_device(self.raw);
    }
}

impl fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceGuard").field("raw", &self.raw).finish()
    }
}

/**
    Kind of surface a renderer can be asked to allocate.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceType {
    DecoderRenderTarget,
    ProcessorRenderTarget,
    SoftwareRenderTarget,
}

/**
    Renderer-side video memory configuration.
*/
pub trait VideoMemoryConfiguration {
    /// Surface type at `index` in the renderer's preference list.
    fn surface_type(&self, index: usize) -> Option<SurfaceType>;
    fn set_surface_type(&self, surface_type: SurfaceType) -> Result<()>;
}

/**
    Uncompressed picture description used by the legacy accelerator.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UncompDataInfo {
    pub width: u32,
    pub height: u32,
    pub pixel_format: FourCc,
}

/**
    Compressed buffer requirements reported by the legacy accelerator.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompBufferInfo {
    pub count: u32,
    pub size: u32,
}

/**
    Renderer-owned legacy video accelerator.

    Surfaces belong to the renderer and are addressed by index.
*/
pub trait VideoAccelerator: Send {
    fn uncompressed_formats(&self, id: DecoderId) -> Result<Vec<FourCc>>;
    fn compressed_buffer_info(
        &self,
        id: DecoderId,
        uncomp: &UncompDataInfo,
    ) -> Result<Vec<CompBufferInfo>>;
    fn begin_frame(&mut self, surface_index: u32) -> Result<()>;
    fn execute(&mut self, buffers: &[AccelBuffer]) -> Result<()>;
    fn end_frame(&mut self, surface_index: u32) -> Result<()>;
}

/**
    The downstream renderer, as seen from the output pin.
*/
pub trait Renderer {
    /// Modern acceleration service, if the renderer exposes one.
    fn acceleration_service(&self) -> Option<Arc<dyn AccelerationService>>;
    fn video_memory(&self) -> Option<&dyn VideoMemoryConfiguration>;
}
