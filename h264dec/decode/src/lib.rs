/*!
    Hardware-accelerated H.264 decode filter.

    This crate turns compressed H.264 samples into decoded pictures. It
    negotiates the best decode strategy with the downstream renderer and
    falls back to software decoding when hardware is unavailable or known
    to mishandle the stream.

    # Backends

    - Legacy hardware: the renderer activates its own accelerator and pulls
      surface requirements from the filter.
    - Modern hardware: the filter opens a device on the renderer's
      acceleration service, allocates a surface pool and creates a decoder.
    - Software: the codec library decodes into host memory.

    Hardware tiers are opt-in:

    ```ignore
    use h264dec_decode::{DecoderConfig, H264DecoderFilter, HwTier};

    // Software only
    let config = DecoderConfig::new();

    // Prefer hardware, either tier
    let config = DecoderConfig::with_hw_accel();

    // Only the modern tier
    let config = DecoderConfig::with_hw_tier(HwTier::Modern);

    let mut filter = H264DecoderFilter::new(library, config, &system);
    filter.set_input_type(input)?;
    filter.complete_input_connect()?;
    filter.set_output_type(output)?;
    let backend = filter.complete_output_connect(&renderer)?;
    filter.decide_buffer_size(&downstream_allocator, requested)?;

    for sample in samples {
        filter.receive(sample, &mut downstream)?;
    }
    filter.end_of_stream(&mut downstream)?;
    ```

    # Hardware Compatibility

    Some GPUs and drivers decode certain streams incorrectly.
    [`HardwareCapabilityAdvisor`] classifies each stream against a table
    of vendor rules before either hardware tier is tried.
*/

pub use h264dec_types::{Error, MediaSample, MediaType, Result, StreamDescriptor, StreamSignal};

mod advisor;
mod backend;
mod buffer;
mod codec;
mod config;
mod dispatch;
mod filter;
mod formats;
mod hw;
mod negotiator;
mod pool;

#[cfg(test)]
mod mock;

pub use advisor::{
    Compatibility, HardwareCapabilityAdvisor, PCI_VENDOR_ATI, PCI_VENDOR_NVIDIA,
    PCI_VENDOR_S3_GRAPHICS, RefFrameAllowance, VENDOR_RULES, VendorRule, max_ref_frames,
};
pub use backend::{
    BackendKind, DecodeStatus, DecoderBackend, Display, LegacyBackend, ModernBackend,
    ReorderQueue, SoftwareBackend,
};
pub use buffer::{
    AllocatorProperties, BufferNegotiator, HostAllocator, OutputAllocator, OutputBuffer, Payload,
    ServiceId, SurfaceAllocator,
};
pub use codec::{
    AccelBuffer, AccelBufferKind, AcceleratorSink, BitstreamContext, CodecLibrary, CodecStatus,
    DecodeTarget, INPUT_PADDING, PictureInfo, SampleTimes, StreamParams,
};
pub use config::{DecoderConfig, HwTier, LEGACY_SURFACE_COUNT, MODERN_SURFACE_COUNT, RefFramePolicy};
pub use dispatch::{DecodeState, Downstream};
pub use filter::{
    ConnectMode, FilterState, H264DecoderFilter, PinDirection, RESTRICTED_MODE_H264_E,
    UncompSurfacesInfo,
};
pub use formats::{build_output_types, check_transform, is_recognized};
pub use hw::{
    AccelerationService, BITSTREAM_RAW_SHORT_SLICE, CompBufferInfo, DecoderConfiguration,
    DeviceGuard, DriverVersion, HardwareInfo, HwVideoDecoder, OsFamily, RawDevice, Renderer,
    SurfaceType, SystemInfo, UncompDataInfo, VideoAccelerator, VideoDesc,
    VideoMemoryConfiguration,
};
pub use negotiator::BackendNegotiator;
pub use pool::SurfacePool;
