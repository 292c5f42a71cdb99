/*!
    The H.264 decode filter.

    Ties the pieces together: pin connection and media type negotiation,
    backend selection, output buffer negotiation and streaming.
*/

use std::sync::Arc;

use h264dec_types::{
    DecoderId, Error, FourCc, MediaSample, MediaType, RefTime, Result, StreamDescriptor,
    StreamSignal, image_size_420,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, DecoderBackend, LegacyBackend};
use crate::buffer::{
    AllocatorProperties, BufferNegotiator, HostAllocator, OutputAllocator, SurfaceAllocator,
};
use crate::codec::CodecLibrary;
use crate::config::{DecoderConfig, HwTier};
use crate::dispatch::{DecodeDispatch, DecodeState, Downstream};
use crate::formats::{build_output_types, check_transform, is_recognized};
use crate::hw::{HardwareInfo, Renderer, SystemInfo, VideoAccelerator};
use crate::negotiator::BackendNegotiator;

/// Restricted-mode tag reported with a legacy H.264 connection.
pub const RESTRICTED_MODE_H264_E: u32 = 0x68;

/**
    Connection state of the filter.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterState {
    Unconnected,
    InputConnected,
    NegotiatingOutput,
    Active(BackendKind),
    /// Output disconnected; the input type is kept for the next connection.
    TornDown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PinDirection {
    Input,
    Output,
}

/**
    Answer to the renderer's uncompressed surface query.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UncompSurfacesInfo {
    pub min_surfaces: u32,
    pub max_surfaces: u32,
    pub pixel_format: FourCc,
}

/**
    Connection mode returned when the renderer activates its accelerator.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectMode {
    pub decoder_id: DecoderId,
    pub restricted_mode: u32,
}

/// What the renderer told us while activating its legacy accelerator.
#[derive(Default)]
struct LegacyActivation {
    decoder_id: Option<DecoderId>,
    pixel_format: Option<FourCc>,
    granted_surfaces: u32,
    backend: Option<LegacyBackend>,
}

/**
    H.264 decode filter.

    Connection methods take `&mut self` and run on the control thread while
    the filter is stopped. [`H264DecoderFilter::receive`] runs on the
    streaming thread; flushes and end of stream may arrive concurrently from
    the control thread.
*/
pub struct H264DecoderFilter {
    library: Arc<dyn CodecLibrary>,
    negotiator: BackendNegotiator,
    state: Arc<Mutex<DecodeState>>,
    filter_state: FilterState,
    input_type: Option<MediaType>,
    output_types: Vec<MediaType>,
    output_type: Option<MediaType>,
    stream: Option<StreamDescriptor>,
    legacy: Mutex<LegacyActivation>,
    allocator: Option<Arc<dyn OutputAllocator>>,
}

impl H264DecoderFilter {
    /**
        Create a filter. Hardware facts are queried once, here.
    */
    pub fn new(library: Arc<dyn CodecLibrary>, config: DecoderConfig, system: &dyn SystemInfo) -> Self {
        let hardware = HardwareInfo::query(system);
        info!(
            vendor = format_args!("{:#06x}", hardware.vendor),
            device = format_args!("{:#06x}", hardware.device),
            driver = %hardware.driver,
            os = ?hardware.os,
            prefer_hw = config.prefer_hw,
            "creating H.264 decode filter"
        );
        Self {
            library,
            negotiator: BackendNegotiator::new(config, hardware),
            state: Arc::default(),
            filter_state: FilterState::Unconnected,
            input_type: None,
            output_types: Vec::new(),
            output_type: None,
            stream: None,
            legacy: Mutex::default(),
            allocator: None,
        }
    }

    pub fn filter_state(&self) -> FilterState {
        self.filter_state
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        match self.filter_state {
            FilterState::Active(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn negotiator(&self) -> &BackendNegotiator {
        &self.negotiator
    }

    pub fn stream(&self) -> Option<&StreamDescriptor> {
        self.stream.as_ref()
    }

    pub fn input_type(&self) -> Option<&MediaType> {
        self.input_type.as_ref()
    }

    pub fn output_type(&self) -> Option<&MediaType> {
        self.output_type.as_ref()
    }

    /**
        Output media types offered for the connected input, in preference
        order.
    */
    pub fn output_types(&self) -> &[MediaType] {
        &self.output_types
    }

    pub fn allocator(&self) -> Option<&Arc<dyn OutputAllocator>> {
        self.allocator.as_ref()
    }

    /// Number of surfaces currently held by the pool.
    pub fn pool_len(&self) -> usize {
        self.state.lock().pool_len()
    }

    /*
        Input pin
    */

    pub fn check_input_type(&self, media_type: &MediaType) -> Result<()> {
        if !media_type.is_video() {
            return Err(Error::type_rejected("input is not a video type"));
        }
        if !self.library.is_subtype_supported(media_type) {
            return Err(Error::type_rejected(format!(
                "subtype {:?} is not supported by the codec library",
                media_type.subtype
            )));
        }
        Ok(())
    }

    /**
        Accept an input type and build the output types offered for it.
    */
    pub fn set_input_type(&mut self, media_type: MediaType) -> Result<()> {
        if self.filter_state != FilterState::Unconnected {
            return Err(Error::unexpected("input is already connected"));
        }
        self.check_input_type(&media_type)?;
        self.output_types = build_output_types(&media_type)?;
        debug!(
            subtype = ?media_type.subtype,
            width = media_type.video.width,
            height = media_type.video.height,
            outputs = self.output_types.len(),
            "input type set"
        );
        self.input_type = Some(media_type);
        self.filter_state = FilterState::InputConnected;
        Ok(())
    }

    /**
        Create the pre-decode bitstream context for the connected input.
    */
    pub fn complete_input_connect(&mut self) -> Result<()> {
        self.build_context()
    }

    fn build_context(&mut self) -> Result<()> {
        let input = self.input_type.as_ref().ok_or(Error::NotConnected)?;
        let ctx = self
            .library
            .create_context(input)
            .map_err(|e| Error::type_rejected(format!("cannot create bitstream context: {e}")))?;
        let params = ctx.params();
        let stream = StreamDescriptor::from_media_type(input, params.profile_level, params.ref_frame_count);
        debug!(
            level = %stream.profile_level,
            refs = stream.ref_frame_count,
            aspect = %stream.aspect,
            "bitstream context created"
        );
        self.stream = Some(stream);
        self.state.lock().context = Some(ctx);
        Ok(())
    }

    /*
        Output pin
    */

    pub fn check_output_type(&self, media_type: &MediaType) -> Result<()> {
        let input = self.input_type.as_ref().ok_or(Error::NotConnected)?;
        self.check_input_type(input)?;
        check_transform(input, media_type)?;

        if !self.output_types.iter().any(|t| t.subtype == media_type.subtype) {
            return Err(Error::type_rejected(format!(
                "output subtype {:?} is not offered",
                media_type.subtype
            )));
        }
        if let Some(current) = &self.output_type
            && current.plane_family() != media_type.plane_family()
        {
            return Err(Error::type_rejected("output plane layout cannot change"));
        }
        if let Some(backend) = self.state.lock().backend.as_deref()
            && !backend.accepts_output(media_type.subtype)
        {
            return Err(Error::type_rejected(format!(
                "{} backend cannot produce {:?}",
                backend.kind(),
                media_type.subtype
            )));
        }
        Ok(())
    }

    pub fn set_output_type(&mut self, media_type: MediaType) -> Result<()> {
        self.check_output_type(&media_type)?;
        debug!(subtype = ?media_type.subtype, kind = ?media_type.format_kind, "output type set");
        self.output_type = Some(media_type);
        if matches!(
            self.filter_state,
            FilterState::InputConnected | FilterState::TornDown
        ) {
            self.filter_state = FilterState::NegotiatingOutput;
        }
        Ok(())
    }

    /*
        Legacy acceleration, driven by the renderer during output connection
    */

    /**
        Tell the renderer how many uncompressed surfaces to allocate and in
        which format.
    */
    pub fn uncomp_surfaces_info(
        &mut self,
        decoder_id: DecoderId,
        accel: &dyn VideoAccelerator,
    ) -> Result<UncompSurfacesInfo> {
        if !is_recognized(decoder_id) {
            return Err(Error::unsupported(format!("decoder {decoder_id} is not recognized")));
        }
        let pixel_format = accel
            .uncompressed_formats(decoder_id)?
            .into_iter()
            .find(|f| *f == FourCc::NV12)
            .ok_or_else(|| Error::unsupported("accelerator offers no NV12 format"))?;

        let count = self.negotiator.surface_count();
        let legacy = self.legacy.get_mut();
        legacy.decoder_id = Some(decoder_id);
        legacy.pixel_format = Some(pixel_format);
        Ok(UncompSurfacesInfo {
            min_surfaces: count,
            max_surfaces: count,
            pixel_format,
        })
    }

    /**
        Record the surface count the renderer actually allocated.
    */
    pub fn set_uncomp_surfaces_info(&mut self, granted: u32) -> Result<()> {
        debug!(granted, "renderer allocated uncompressed surfaces");
        self.legacy.get_mut().granted_surfaces = granted;
        Ok(())
    }

    /**
        The renderer activated its accelerator for `decoder_id`.

        Builds the legacy backend; it is finished when the output connection
        completes.
    */
    pub fn create_video_accelerator_data(
        &mut self,
        decoder_id: DecoderId,
        accel: Box<dyn VideoAccelerator>,
    ) -> Result<ConnectMode> {
        let mode = ConnectMode {
            decoder_id,
            restricted_mode: RESTRICTED_MODE_H264_E,
        };
        let active_id = match self.active_backend() {
            Some(BackendKind::LegacyHw) => self.state.lock().backend.as_deref().and_then(|b| b.decoder_id()),
            _ => None,
        };
        let legacy = self.legacy.get_mut();
        let pending_id = legacy.backend.as_ref().and_then(|b| b.decoder_id());
        if active_id == Some(decoder_id) || pending_id == Some(decoder_id) {
            return Ok(mode);
        }

        let stream = self.stream.ok_or(Error::NotConnected)?;
        let pixel_format = legacy.pixel_format.unwrap_or(FourCc::NV12);
        let backend = self
            .negotiator
            .activate_legacy(decoder_id, pixel_format, accel, &stream)?;

        let legacy = self.legacy.get_mut();
        legacy.decoder_id = Some(decoder_id);
        legacy.pixel_format = Some(pixel_format);
        legacy.backend = Some(backend);
        Ok(mode)
    }

    /*
        Backend selection
    */

    /**
        Pick the decode backend once the output pin is connected.

        A legacy activation from the renderer wins if it can be finished;
        otherwise the modern tier is tried; software is the fallback.
    */
    pub fn complete_output_connect(&mut self, renderer: &dyn Renderer) -> Result<BackendKind> {
        if self.output_type.is_none() {
            return Err(Error::NotConnected);
        }
        if let FilterState::Active(kind) = self.filter_state {
            return Err(Error::unexpected(format!(
                "{kind} backend is already active"
            )));
        }
        if self.state.lock().context.is_none() {
            self.build_context()?;
        }
        let stream = self.stream.ok_or(Error::NotConnected)?;

        let shared = Arc::clone(&self.state);
        let mut state = shared.lock();
        let backend = self.select_backend(renderer, &stream, &mut state);
        let kind = backend.kind();
        state.backend = Some(backend);
        drop(state);

        info!(backend = %kind, "decode backend active");
        self.filter_state = FilterState::Active(kind);
        Ok(kind)
    }

    fn select_backend(
        &mut self,
        renderer: &dyn Renderer,
        stream: &StreamDescriptor,
        state: &mut DecodeState,
    ) -> Box<dyn DecoderBackend> {
        let legacy = self.legacy.get_mut();
        if let Some(mut backend) = legacy.backend.take() {
            backend.set_surface_count(legacy.granted_surfaces);
            let pixel_format = legacy.pixel_format.unwrap_or(FourCc::NV12);
            match backend.init(pixel_format, stream.avg_frame_duration) {
                Ok(()) => return Box::new(backend),
                Err(e) => warn!(error = %e, "legacy acceleration failed, trying next tier"),
            }
        }

        if self.negotiator.config().allows(HwTier::Modern) {
            match self
                .negotiator
                .negotiate_modern(renderer, stream, &mut state.pool)
            {
                Ok(backend) => return Box::new(backend),
                Err(e) if e.is_recoverable() => {
                    info!(error = %e, "modern hardware unavailable, trying next tier")
                }
                Err(e) => warn!(error = %e, "modern hardware negotiation failed"),
            }
        }

        Box::new(self.negotiator.software())
    }

    /**
        Agree on output buffers with the downstream allocator and build the
        allocator the streaming thread draws from.
    */
    pub fn decide_buffer_size(
        &mut self,
        downstream: &dyn BufferNegotiator,
        requested: AllocatorProperties,
    ) -> Result<AllocatorProperties> {
        let output = self.output_type.as_ref().ok_or(Error::NotConnected)?;
        let size = image_size_420(output.video.width, output.video.height).ok_or_else(|| {
            Error::type_rejected(format!(
                "output size {}x{} is too large",
                output.video.width, output.video.height
            ))
        })?;
        let needs_surfaces = self
            .state
            .lock()
            .backend
            .as_deref()
            .map(|b| b.needs_surface_allocator())
            .ok_or_else(|| Error::unexpected("no active decode backend"))?;

        let count = if needs_surfaces {
            self.negotiator.surface_count()
        } else {
            requested.buffers.max(1)
        };
        let wanted = AllocatorProperties {
            buffers: count,
            size,
            align: requested.align.max(1),
            prefix: 0,
        };
        let actual = downstream.set_properties(wanted)?;
        if actual.buffers < wanted.buffers || actual.size < wanted.size {
            warn!(
                requested_count = wanted.buffers,
                requested_size = wanted.size,
                actual_count = actual.buffers,
                actual_size = actual.size,
                "downstream granted too little"
            );
            return Err(Error::BufferNegotiation {
                requested_count: wanted.buffers,
                requested_size: wanted.size,
                actual_count: actual.buffers,
                actual_size: actual.size,
            });
        }

        let allocator: Arc<dyn OutputAllocator> = if needs_surfaces {
            let allocator = SurfaceAllocator::new(Arc::clone(&self.state), count);
            allocator.allocate()?;
            Arc::new(allocator)
        } else {
            Arc::new(HostAllocator::new(actual.buffers, actual.size))
        };
        debug!(
            buffers = actual.buffers,
            size = actual.size,
            surfaces = needs_surfaces,
            "output buffers negotiated"
        );
        self.allocator = Some(allocator);
        Ok(actual)
    }

    /*
        Streaming
    */

    fn dispatch(&self) -> DecodeDispatch<'_> {
        DecodeDispatch {
            state: &self.state,
            allocator: self.allocator.as_deref(),
            padding: self.library.input_padding(),
            avg_frame_duration: self.stream.map_or(RefTime(0), |s| s.avg_frame_duration),
        }
    }

    /**
        Decode one input sample, forwarding every picture that becomes ready.

        Returns the number of buffers delivered.
    */
    pub fn receive(&self, sample: MediaSample, downstream: &mut dyn Downstream) -> Result<usize> {
        self.dispatch().receive(sample, downstream)
    }

    pub fn new_segment(&self, start: RefTime, stop: RefTime, rate: f64) {
        debug!(start = start.0, stop = stop.0, rate, "new segment");
        self.dispatch().new_segment();
    }

    pub fn end_of_stream(&self, downstream: &mut dyn Downstream) -> Result<usize> {
        self.dispatch().end_of_stream(downstream)
    }

    pub fn handle_signal(&self, signal: StreamSignal, downstream: &mut dyn Downstream) -> Result<usize> {
        match signal {
            StreamSignal::NewSegment { start, stop, rate } => {
                self.new_segment(start, stop, rate);
                Ok(0)
            }
            StreamSignal::EndOfStream => self.end_of_stream(downstream),
        }
    }

    /*
        Teardown
    */

    /**
        Disconnect a pin.

        Disconnecting the output releases the backend, the pool and the
        bitstream context. Disconnecting the input also forgets the input
        type.
    */
    pub fn break_connect(&mut self, direction: PinDirection) {
        self.tear_down_output();
        match direction {
            PinDirection::Output => {
                if self.input_type.is_some() {
                    self.filter_state = FilterState::TornDown;
                }
            }
            PinDirection::Input => {
                self.input_type = None;
                self.output_types.clear();
                self.stream = None;
                self.filter_state = FilterState::Unconnected;
            }
        }
        debug!(?direction, state = ?self.filter_state, "pin disconnected");
    }

    fn tear_down_output(&mut self) {
        if let Some(allocator) = self.allocator.take() {
            allocator.free();
        }
        self.state.lock().tear_down();
        *self.legacy.get_mut() = LegacyActivation::default();
        self.output_type = None;
    }
}

static_assertions::assert_impl_all!(H264DecoderFilter: Send, Sync);
