/*!
    Backend negotiation.

    Picks the decode strategy for a connected stream: the renderer's legacy
    accelerator if it activated one, else a decoder from the modern
    acceleration service, else software.
*/

use std::sync::Arc;

use h264dec_types::{DecoderId, Error, FourCc, Result, StreamDescriptor};
use tracing::{debug, info, warn};

use crate::advisor::{Compatibility, HardwareCapabilityAdvisor};
use crate::backend::{LegacyBackend, ModernBackend, SoftwareBackend};
use crate::config::{DecoderConfig, HwTier};
use crate::formats::is_recognized;
use crate::hw::{
    AccelerationService, DecoderConfiguration, DeviceGuard, HardwareInfo, HwVideoDecoder,
    Renderer, SurfaceType, UncompDataInfo, VideoAccelerator, VideoDesc, VideoMemoryConfiguration,
};
use crate::pool::SurfacePool;

/**
    Chooses and builds decode backends.
*/
#[derive(Clone, Debug)]
pub struct BackendNegotiator {
    config: DecoderConfig,
    advisor: HardwareCapabilityAdvisor,
}

impl BackendNegotiator {
    pub fn new(config: DecoderConfig, hardware: HardwareInfo) -> Self {
        let advisor = HardwareCapabilityAdvisor::new(hardware, config.ref_frame_policy);
        Self { config, advisor }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn advisor(&self) -> &HardwareCapabilityAdvisor {
        &self.advisor
    }

    /**
        Number of decode surfaces for this platform.
    */
    pub fn surface_count(&self) -> u32 {
        self.config.surface_count(self.advisor.hardware().os)
    }

    fn hardware_allowed(&self, tier: HwTier, stream: &StreamDescriptor) -> Result<Compatibility> {
        if !self.config.allows(tier) {
            return Err(Error::unsupported(format!("{tier:?} hardware tier is disabled")));
        }
        self.advisor.check(stream)
    }

    /**
        Build a legacy backend for an accelerator the renderer offered.

        The compressed buffer requirements are queried for the stream's own
        geometry and pixel format.
    */
    pub fn activate_legacy(
        &self,
        id: DecoderId,
        pixel_format: FourCc,
        accel: Box<dyn VideoAccelerator>,
        stream: &StreamDescriptor,
    ) -> Result<LegacyBackend> {
        if !is_recognized(id) {
            return Err(Error::unsupported(format!("decoder {id} is not recognized")));
        }
        self.hardware_allowed(HwTier::Legacy, stream)?;

        let uncomp = UncompDataInfo {
            width: stream.width,
            height: stream.height,
            pixel_format,
        };
        let buffers = accel.compressed_buffer_info(id, &uncomp)?;
        debug!(decoder = %id, buffer_types = buffers.len(), "legacy buffer info");

        info!(decoder = %id, "legacy hardware acceleration activated");
        Ok(LegacyBackend::new(id, accel))
    }

    /**
        Negotiate a modern hardware backend with the renderer's acceleration
        service.

        On success the pool holds the decoder's surfaces. On failure the pool
        is left empty and the device is closed.
    */
    pub fn negotiate_modern(
        &self,
        renderer: &dyn Renderer,
        stream: &StreamDescriptor,
        pool: &mut SurfacePool,
    ) -> Result<ModernBackend> {
        self.hardware_allowed(HwTier::Modern, stream)?;

        let service = renderer
            .acceleration_service()
            .ok_or_else(|| Error::unsupported("renderer has no acceleration service"))?;
        let device = DeviceGuard::open(service)?;

        let memory = renderer
            .video_memory()
            .ok_or_else(|| Error::unsupported("renderer has no video memory configuration"))?;

        let service = Arc::clone(device.service());
        let candidates: Vec<_> = service
            .decoder_ids(device.raw())?
            .into_iter()
            .filter(|id| is_recognized(*id))
            .collect();
        debug!(candidates = candidates.len(), "enumerated hardware decoders");

        let mut memory_configured = false;
        for id in candidates {
            let (desc, config) = match candidate_target(service.as_ref(), &device, id, stream) {
                Ok(target) => target,
                Err(e) => {
                    warn!(decoder = %id, error = %e, "hardware decoder candidate skipped");
                    continue;
                }
            };
            // The renderer is only reconfigured once a decoder qualifies.
            if !memory_configured {
                select_decoder_render_target(memory)?;
                memory_configured = true;
            }
            match self.open_decoder(&device, id, &desc, &config, pool) {
                Ok(decoder) => {
                    info!(
                        decoder = %id,
                        short_slice = config.is_short_slice(),
                        surfaces = pool.len(),
                        "modern hardware acceleration activated"
                    );
                    return Ok(ModernBackend::new(
                        id,
                        decoder,
                        config.is_short_slice(),
                        device,
                    ));
                }
                Err(e) => warn!(decoder = %id, error = %e, "hardware decoder candidate failed"),
            }
        }
        Err(Error::unsupported("no compatible hardware decoder"))
    }

    fn open_decoder(
        &self,
        device: &DeviceGuard,
        id: DecoderId,
        desc: &VideoDesc,
        config: &DecoderConfiguration,
        pool: &mut SurfacePool,
    ) -> Result<Box<dyn HwVideoDecoder>> {
        pool.allocate(device, desc, self.surface_count())?;
        match device
            .service()
            .create_decoder(device.raw(), id, desc, config, &pool.handles())
        {
            Ok(decoder) => Ok(decoder),
            Err(e) => {
                pool.free(None);
                Err(Error::allocation(format!("decoder creation: {e}")))
            }
        }
    }

    /**
        The fallback backend. Always available.
    */
    pub fn software(&self) -> SoftwareBackend {
        info!("software decoding selected");
        SoftwareBackend::new()
    }
}

fn select_decoder_render_target(memory: &dyn VideoMemoryConfiguration) -> Result<()> {
    let offered = (0..)
        .map_while(|i| memory.surface_type(i))
        .any(|t| t == SurfaceType::DecoderRenderTarget);
    if !offered {
        return Err(Error::unsupported(
            "renderer cannot allocate decoder render targets",
        ));
    }
    memory.set_surface_type(SurfaceType::DecoderRenderTarget)
}

/// NV12 render target and preferred configuration for one candidate.
fn candidate_target(
    service: &dyn AccelerationService,
    device: &DeviceGuard,
    id: DecoderId,
    stream: &StreamDescriptor,
) -> Result<(VideoDesc, DecoderConfiguration)> {
    let (desc, configs) = find_nv12_target(service, device, id, stream)?;
    let config = configs
        .iter()
        .find(|c| c.is_short_slice())
        .or_else(|| configs.first())
        .copied()
        .ok_or_else(|| Error::unsupported("no decoder configuration"))?;
    Ok((desc, config))
}

fn find_nv12_target(
    service: &dyn AccelerationService,
    device: &DeviceGuard,
    id: DecoderId,
    stream: &StreamDescriptor,
) -> Result<(VideoDesc, Vec<DecoderConfiguration>)> {
    let targets = service.render_targets(device.raw(), id)?;
    for format in targets.into_iter().filter(|f| *f == FourCc::NV12) {
        let desc = VideoDesc {
            width: stream.width,
            height: stream.height,
            format,
        };
        match service.configurations(device.raw(), id, &desc) {
            Ok(configs) if !configs.is_empty() => return Ok((desc, configs)),
            Ok(_) => debug!(decoder = %id, "render target has no configurations"),
            Err(e) => debug!(decoder = %id, error = %e, "configuration query failed"),
        }
    }
    Err(Error::unsupported(format!(
        "decoder {id} has no usable NV12 render target"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DecoderBackend;
    use crate::hw::OsFamily;
    use crate::mock::{MockAccelerator, MockRenderer, MockService, MockVideoMemory};
    use h264dec_types::{AspectRatio, ProfileLevel, RefTime};

    const NVIDIA_OK: HardwareInfo = HardwareInfo {
        vendor: 0x10de,
        device: 0x0640,
        driver: crate::hw::DriverVersion::new(8, 0, 0, 0),
        os: OsFamily::Modern,
    };

    fn stream(level: i32) -> StreamDescriptor {
        StreamDescriptor {
            width: 1280,
            height: 720,
            aspect: AspectRatio::of_frame(1280, 720),
            profile_level: ProfileLevel(level),
            ref_frame_count: 4,
            avg_frame_duration: RefTime(400_000),
        }
    }

    fn negotiator() -> BackendNegotiator {
        BackendNegotiator::new(DecoderConfig::with_hw_accel(), NVIDIA_OK)
    }

    #[test]
    fn modern_prefers_short_slice_configuration() {
        let service = Arc::new(MockService::new().with_configurations(vec![
            DecoderConfiguration {
                id: 1,
                bitstream_raw: 1,
            },
            DecoderConfiguration {
                id: 2,
                bitstream_raw: 2,
            },
        ]));
        let renderer = MockRenderer::modern(service.clone());
        let mut pool = SurfacePool::new();

        let backend = negotiator()
            .negotiate_modern(&renderer, &stream(41), &mut pool)
            .unwrap();
        assert!(backend.short_slice());
        assert_eq!(backend.decoder_id(), Some(DecoderId::H264_E));
        assert_eq!(pool.len(), 22);
        assert!(format!("{backend:?}").starts_with("ModernBackend { id: "));
        assert_eq!(service.created_decoders()[0].config.id, 2);
        assert_eq!(service.created_decoders()[0].surfaces, 22);
        assert_eq!(
            renderer.selected_surface_type(),
            Some(SurfaceType::DecoderRenderTarget)
        );
    }

    #[test]
    fn falls_back_to_first_configuration() {
        let service = Arc::new(MockService::new().with_configurations(vec![
            DecoderConfiguration {
                id: 7,
                bitstream_raw: 1,
            },
        ]));
        let renderer = MockRenderer::modern(service.clone());
        let mut pool = SurfacePool::new();
        let backend = negotiator()
            .negotiate_modern(&renderer, &stream(41), &mut pool)
            .unwrap();
        assert!(!backend.short_slice());
        assert_eq!(service.created_decoders()[0].config.id, 7);
    }

    #[test]
    fn no_recognized_decoders_leaves_pool_empty() {
        let service = Arc::new(MockService::new().with_decoder_ids(vec![DecoderId(0xdead)]));
        let renderer = MockRenderer::modern(service.clone());
        let mut pool = SurfacePool::new();
        let err = negotiator()
            .negotiate_modern(&renderer, &stream(41), &mut pool)
            .unwrap_err();
        assert!(err.is_recoverable());
        assert!(pool.is_empty());
        assert!(service.created_surfaces().is_empty());
        assert_eq!(service.close_calls(), 1);
    }

    #[test]
    fn failed_candidate_continues_to_next() {
        let service = Arc::new(
            MockService::new()
                .with_decoder_ids(vec![DecoderId::H264_F, DecoderId::H264_E])
                .fail_decoder_for(DecoderId::H264_F),
        );
        let renderer = MockRenderer::modern(service.clone());
        let mut pool = SurfacePool::new();
        let backend = negotiator()
            .negotiate_modern(&renderer, &stream(41), &mut pool)
            .unwrap();
        assert_eq!(backend.decoder_id(), Some(DecoderId::H264_E));
        // The first candidate's surfaces were released before the second
        // allocated its own.
        assert_eq!(service.live_surfaces().len(), 22);
    }

    #[test]
    fn surface_failure_closes_device() {
        let service = Arc::new(MockService::new().fail_surface_after(5));
        let renderer = MockRenderer::modern(service.clone());
        let mut pool = SurfacePool::new();
        let err = negotiator()
            .negotiate_modern(&renderer, &stream(41), &mut pool)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
        assert!(pool.is_empty());
        assert!(service.live_surfaces().is_empty());
        assert!(service.open_devices().is_empty());
    }

    #[test]
    fn video_memory_failure_fails_tier() {
        let service = Arc::new(MockService::new());
        let renderer = MockRenderer::modern(service.clone())
            .with_video_memory(MockVideoMemory::new(vec![SurfaceType::SoftwareRenderTarget]));
        let mut pool = SurfacePool::new();
        assert!(
            negotiator()
                .negotiate_modern(&renderer, &stream(41), &mut pool)
                .is_err()
        );
        assert!(service.created_surfaces().is_empty());
        assert!(service.created_decoders().is_empty());
        assert_eq!(renderer.selected_surface_type(), None);
        assert_eq!(service.close_calls(), 1);
    }

    #[test]
    fn renderer_untouched_when_no_decoder_qualifies() {
        let memory = || MockVideoMemory::new(vec![SurfaceType::DecoderRenderTarget]);

        let service = Arc::new(MockService::new().with_render_targets(vec![FourCc::YV12]));
        let renderer = MockRenderer::modern(service.clone()).with_video_memory(memory());
        let mut pool = SurfacePool::new();
        assert!(
            negotiator()
                .negotiate_modern(&renderer, &stream(41), &mut pool)
                .is_err()
        );
        assert_eq!(service.decoder_id_queries(), 1);
        assert_eq!(renderer.selected_surface_type(), None);
        assert!(pool.is_empty());

        let service = Arc::new(MockService::new().with_decoder_ids(vec![DecoderId(7)]));
        let renderer = MockRenderer::modern(service.clone()).with_video_memory(memory());
        assert!(
            negotiator()
                .negotiate_modern(&renderer, &stream(41), &mut pool)
                .is_err()
        );
        assert_eq!(renderer.selected_surface_type(), None);

        let service = Arc::new(MockService::new());
        let renderer = MockRenderer::modern(service.clone()).with_video_memory(memory());
        negotiator()
            .negotiate_modern(&renderer, &stream(41), &mut pool)
            .unwrap();
        assert_eq!(
            renderer.selected_surface_type(),
            Some(SurfaceType::DecoderRenderTarget)
        );
    }

    #[test]
    fn level_51_veto_blocks_modern() {
        let intel = HardwareInfo {
            vendor: 0x8086,
            ..NVIDIA_OK
        };
        let n = BackendNegotiator::new(DecoderConfig::with_hw_accel(), intel);
        let service = Arc::new(MockService::new());
        let renderer = MockRenderer::modern(service.clone());
        let mut pool = SurfacePool::new();
        let err = n
            .negotiate_modern(&renderer, &stream(51), &mut pool)
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityVetoed { .. }));
        assert!(service.open_devices().is_empty());
        assert_eq!(service.close_calls(), 0);
    }

    #[test]
    fn disabled_tier_is_unsupported() {
        let n = BackendNegotiator::new(DecoderConfig::new(), NVIDIA_OK);
        let renderer = MockRenderer::modern(Arc::new(MockService::new()));
        let mut pool = SurfacePool::new();
        let err = n
            .negotiate_modern(&renderer, &stream(41), &mut pool)
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[test]
    fn legacy_activation_uses_stream_geometry() {
        let accel = MockAccelerator::new();
        let queries = accel.comp_queries();
        let backend = negotiator()
            .activate_legacy(
                DecoderId::H264_E,
                FourCc::NV12,
                Box::new(accel),
                &stream(41),
            )
            .unwrap();
        assert_eq!(backend.decoder_id(), Some(DecoderId::H264_E));
        assert!(format!("{backend:?}").starts_with("LegacyBackend { id: "));
        assert_eq!(
            queries.lock()[0],
            UncompDataInfo {
                width: 1280,
                height: 720,
                pixel_format: FourCc::NV12
            }
        );
    }

    #[test]
    fn legacy_activation_is_vetoed_too() {
        let intel = HardwareInfo {
            vendor: 0x8086,
            ..NVIDIA_OK
        };
        let n = BackendNegotiator::new(DecoderConfig::with_hw_accel(), intel);
        let err = n
            .activate_legacy(
                DecoderId::H264_E,
                FourCc::NV12,
                Box::new(MockAccelerator::new()),
                &stream(51),
            )
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityVetoed { .. }));
    }

    #[test]
    fn surface_count_follows_os() {
        let legacy_os = HardwareInfo {
            os: OsFamily::Legacy,
            ..NVIDIA_OK
        };
        assert_eq!(negotiator().surface_count(), 22);
        assert_eq!(
            BackendNegotiator::new(DecoderConfig::with_hw_accel(), legacy_os).surface_count(),
            16
        );
    }
}
