/*!
    Fake collaborators for tests.
*/

use std::collections::VecDeque;
use std::sync::Arc;

use h264dec_types::{
    DecoderId, Error, FourCc, MediaSample, MediaType, ProfileLevel, RefTime, Result, Subtype,
    SurfaceHandle,
};
use parking_lot::Mutex;

use crate::buffer::{AllocatorProperties, BufferNegotiator, OutputBuffer};
use crate::codec::{
    AccelBuffer, AccelBufferKind, BitstreamContext, CodecLibrary, CodecStatus, DecodeTarget,
    PictureInfo, StreamParams,
};
use crate::dispatch::Downstream;
use crate::hw::{
    AccelerationService, CompBufferInfo, DecoderConfiguration, DriverVersion, HwVideoDecoder,
    OsFamily, RawDevice, Renderer, SurfaceType, SystemInfo, UncompDataInfo, VideoAccelerator,
    VideoDesc, VideoMemoryConfiguration,
};

/*
    Acceleration service
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwCall {
    Begin(SurfaceHandle),
    Execute(usize),
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreatedDecoder {
    pub id: DecoderId,
    pub config: DecoderConfiguration,
    pub surfaces: usize,
}

#[derive(Default)]
struct ServiceLog {
    next_device: u64,
    next_surface: u64,
    open_devices: Vec<RawDevice>,
    close_calls: usize,
    created: Vec<SurfaceHandle>,
    destroyed: Vec<SurfaceHandle>,
    live: Vec<SurfaceHandle>,
    decoder_id_queries: usize,
    decoders: Vec<CreatedDecoder>,
}

pub struct MockService {
    log: Mutex<ServiceLog>,
    hw_calls: Arc<Mutex<Vec<HwCall>>>,
    decoder_ids: Vec<DecoderId>,
    render_targets: Vec<FourCc>,
    configurations: Vec<DecoderConfiguration>,
    fail_surface_after: Option<usize>,
    fail_decoder_for: Option<DecoderId>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            log: Mutex::default(),
            hw_calls: Arc::default(),
            decoder_ids: vec![DecoderId::H264_E],
            render_targets: vec![FourCc::YV12, FourCc::NV12],
            configurations: vec![DecoderConfiguration {
                id: 1,
                bitstream_raw: 2,
            }],
            fail_surface_after: None,
            fail_decoder_for: None,
        }
    }

    pub fn with_decoder_ids(mut self, ids: Vec<DecoderId>) -> Self {
        self.decoder_ids = ids;
        self
    }

    pub fn with_configurations(mut self, configs: Vec<DecoderConfiguration>) -> Self {
        self.configurations = configs;
        self
    }

    pub fn with_render_targets(mut self, targets: Vec<FourCc>) -> Self {
        self.render_targets = targets;
        self
    }

    /// Surface creation fails once `n` surfaces have been created in total.
    pub fn fail_surface_after(mut self, n: usize) -> Self {
        self.fail_surface_after = Some(n);
        self
    }

    pub fn fail_decoder_for(mut self, id: DecoderId) -> Self {
        self.fail_decoder_for = Some(id);
        self
    }

    pub fn open_devices(&self) -> Vec<RawDevice> {
        self.log.lock().open_devices.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.log.lock().close_calls
    }

    pub fn created_surfaces(&self) -> Vec<SurfaceHandle> {
        self.log.lock().created.clone()
    }

    pub fn destroyed_surfaces(&self) -> Vec<SurfaceHandle> {
        self.log.lock().destroyed.clone()
    }

    pub fn live_surfaces(&self) -> Vec<SurfaceHandle> {
        self.log.lock().live.clone()
    }

    pub fn decoder_id_queries(&self) -> usize {
        self.log.lock().decoder_id_queries
    }

    pub fn created_decoders(&self) -> Vec<CreatedDecoder> {
        self.log.lock().decoders.clone()
    }

    pub fn hw_calls(&self) -> Vec<HwCall> {
        self.hw_calls.lock().clone()
    }
}

impl AccelerationService for MockService {
    fn open_device(&self) -> Result<RawDevice> {
        let mut log = self.log.lock();
        log.next_device += 1;
        let device = RawDevice(log.next_device);
        log.open_devices.push(device);
        Ok(device)
    }

    fn close_device(&self, device: RawDevice) {
        let mut log = self.log.lock();
        log.open_devices.retain(|d| *d != device);
        log.close_calls += 1;
    }

    fn decoder_ids(&self, _device: RawDevice) -> Result<Vec<DecoderId>> {
        self.log.lock().decoder_id_queries += 1;
        Ok(self.decoder_ids.clone())
    }

    fn render_targets(&self, _device: RawDevice, _id: DecoderId) -> Result<Vec<FourCc>> {
        Ok(self.render_targets.clone())
    }

    fn configurations(
        &self,
        _device: RawDevice,
        _id: DecoderId,
        _desc: &VideoDesc,
    ) -> Result<Vec<DecoderConfiguration>> {
        Ok(self.configurations.clone())
    }

    fn create_surface(&self, _device: RawDevice, _desc: &VideoDesc) -> Result<SurfaceHandle> {
        let mut log = self.log.lock();
        if self.fail_surface_after.is_some_and(|n| log.created.len() >= n) {
            return Err(Error::allocation("out of video memory"));
        }
        log.next_surface += 1;
        let handle = SurfaceHandle(log.next_surface);
        log.created.push(handle);
        log.live.push(handle);
        Ok(handle)
    }

    fn destroy_surface(&self, surface: SurfaceHandle) {
        let mut log = self.log.lock();
        log.destroyed.push(surface);
        log.live.retain(|s| *s != surface);
    }

    fn create_decoder(
        &self,
        _device: RawDevice,
        id: DecoderId,
        _desc: &VideoDesc,
        config: &DecoderConfiguration,
        surfaces: &[SurfaceHandle],
    ) -> Result<Box<dyn HwVideoDecoder>> {
        if self.fail_decoder_for == Some(id) {
            return Err(Error::allocation("decoder creation refused"));
        }
        self.log.lock().decoders.push(CreatedDecoder {
            id,
            config: *config,
            surfaces: surfaces.len(),
        });
        Ok(Box::new(MockDecoder {
            calls: Arc::clone(&self.hw_calls),
        }))
    }
}

struct MockDecoder {
    calls: Arc<Mutex<Vec<HwCall>>>,
}

impl HwVideoDecoder for MockDecoder {
    fn begin_frame(&mut self, target: SurfaceHandle) -> Result<()> {
        self.calls.lock().push(HwCall::Begin(target));
        Ok(())
    }

    fn execute(&mut self, buffers: &[AccelBuffer]) -> Result<()> {
        self.calls.lock().push(HwCall::Execute(buffers.len()));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.calls.lock().push(HwCall::End);
        Ok(())
    }
}

/*
    Renderer
*/

pub struct MockVideoMemory {
    types: Vec<SurfaceType>,
    selected: Mutex<Option<SurfaceType>>,
}

impl MockVideoMemory {
    pub fn new(types: Vec<SurfaceType>) -> Self {
        Self {
            types,
            selected: Mutex::default(),
        }
    }
}

impl VideoMemoryConfiguration for MockVideoMemory {
    fn surface_type(&self, index: usize) -> Option<SurfaceType> {
        self.types.get(index).copied()
    }

    fn set_surface_type(&self, surface_type: SurfaceType) -> Result<()> {
        if !self.types.contains(&surface_type) {
            return Err(Error::unsupported("surface type not offered"));
        }
        *self.selected.lock() = Some(surface_type);
        Ok(())
    }
}

pub struct MockRenderer {
    service: Option<Arc<MockService>>,
    memory: Option<MockVideoMemory>,
}

impl MockRenderer {
    /// A renderer with no modern acceleration service.
    pub fn plain() -> Self {
        Self {
            service: None,
            memory: None,
        }
    }

    pub fn modern(service: Arc<MockService>) -> Self {
        Self {
            service: Some(service),
            memory: Some(MockVideoMemory::new(vec![
                SurfaceType::DecoderRenderTarget,
                SurfaceType::ProcessorRenderTarget,
            ])),
        }
    }

    pub fn with_video_memory(mut self, memory: MockVideoMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn selected_surface_type(&self) -> Option<SurfaceType> {
        self.memory.as_ref().and_then(|m| *m.selected.lock())
    }
}

impl Renderer for MockRenderer {
    fn acceleration_service(&self) -> Option<Arc<dyn AccelerationService>> {
        self.service
            .clone()
            .map(|s| s as Arc<dyn AccelerationService>)
    }

    fn video_memory(&self) -> Option<&dyn VideoMemoryConfiguration> {
        self.memory.as_ref().map(|m| m as &dyn VideoMemoryConfiguration)
    }
}

/*
    Legacy accelerator
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelCall {
    Begin(u32),
    Execute(usize),
    End(u32),
}

pub struct MockAccelerator {
    formats: Vec<FourCc>,
    calls: Arc<Mutex<Vec<AccelCall>>>,
    comp_queries: Arc<Mutex<Vec<UncompDataInfo>>>,
}

impl MockAccelerator {
    pub fn new() -> Self {
        Self {
            formats: vec![FourCc::YUY2, FourCc::NV12],
            calls: Arc::default(),
            comp_queries: Arc::default(),
        }
    }

    pub fn with_formats(mut self, formats: Vec<FourCc>) -> Self {
        self.formats = formats;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<AccelCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn comp_queries(&self) -> Arc<Mutex<Vec<UncompDataInfo>>> {
        Arc::clone(&self.comp_queries)
    }
}

impl VideoAccelerator for MockAccelerator {
    fn uncompressed_formats(&self, _id: DecoderId) -> Result<Vec<FourCc>> {
        Ok(self.formats.clone())
    }

    fn compressed_buffer_info(
        &self,
        _id: DecoderId,
        uncomp: &UncompDataInfo,
    ) -> Result<Vec<CompBufferInfo>> {
        self.comp_queries.lock().push(*uncomp);
        Ok(vec![CompBufferInfo {
            count: 4,
            size: uncomp.width * uncomp.height,
        }])
    }

    fn begin_frame(&mut self, surface_index: u32) -> Result<()> {
        self.calls.lock().push(AccelCall::Begin(surface_index));
        Ok(())
    }

    fn execute(&mut self, buffers: &[AccelBuffer]) -> Result<()> {
        self.calls.lock().push(AccelCall::Execute(buffers.len()));
        Ok(())
    }

    fn end_frame(&mut self, surface_index: u32) -> Result<()> {
        self.calls.lock().push(AccelCall::End(surface_index));
        Ok(())
    }
}

/*
    Codec library
*/

#[derive(Debug, Default)]
pub struct ContextLog {
    pub decode_calls: usize,
    pub times: Vec<(RefTime, RefTime)>,
    pub inputs: Vec<Vec<u8>>,
    pub flushes: usize,
    pub short_slice: Vec<bool>,
}

pub const DEFAULT_PARAMS: StreamParams = StreamParams {
    width: 1280,
    height: 720,
    profile_level: ProfileLevel(41),
    ref_frame_count: 4,
    reorder_depth: 0,
};

/**
    A bitstream context that plays back scripted results. Once the script
    runs out, every call consumes all input and yields one picture.
*/
pub struct MockContext {
    params: StreamParams,
    script: VecDeque<CodecStatus>,
    log: Arc<Mutex<ContextLog>>,
    next_poc: i32,
    fail: bool,
}

impl Default for MockContext {
    fn default() -> Self {
        Self::with_params(DEFAULT_PARAMS)
    }
}

impl MockContext {
    pub fn with_params(params: StreamParams) -> Self {
        Self {
            params,
            script: VecDeque::new(),
            log: Arc::default(),
            next_poc: 0,
            fail: false,
        }
    }

    pub fn scripted(script: impl IntoIterator<Item = CodecStatus>) -> Self {
        Self::default().then(script)
    }

    pub fn then(mut self, script: impl IntoIterator<Item = CodecStatus>) -> Self {
        self.script.extend(script);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn log(&self) -> Arc<Mutex<ContextLog>> {
        Arc::clone(&self.log)
    }

    pub fn saw_short_slice(&self) -> bool {
        self.log.lock().short_slice.iter().any(|s| *s)
    }

    fn next_status(&mut self, consumed: usize) -> CodecStatus {
        if let Some(status) = self.script.pop_front() {
            return status;
        }
        let poc = self.next_poc;
        self.next_poc += 2;
        CodecStatus::Picture {
            consumed,
            picture: PictureInfo {
                poc,
                is_idr: poc == 0,
                times: None,
            },
        }
    }
}

impl BitstreamContext for MockContext {
    fn params(&self) -> StreamParams {
        self.params
    }

    fn update_time(&mut self, start: RefTime, stop: RefTime) {
        self.log.lock().times.push((start, stop));
    }

    fn flush_buffers(&mut self) {
        self.log.lock().flushes += 1;
    }

    fn decode(&mut self, data: &[u8], target: DecodeTarget<'_>) -> Result<CodecStatus> {
        {
            let mut log = self.log.lock();
            log.decode_calls += 1;
            log.inputs.push(data.to_vec());
        }
        if self.fail {
            return Err(Error::codec("corrupt slice data"));
        }

        let status = self.next_status(data.len());
        if matches!(status, CodecStatus::Picture { .. }) {
            match target {
                DecodeTarget::Host(buf) => {
                    let n = buf.len().min(data.len());
                    buf[..n].copy_from_slice(&data[..n]);
                }
                DecodeTarget::Accelerated(sink) => {
                    self.log.lock().short_slice.push(sink.short_slice_format());
                    sink.begin_picture()?;
                    sink.submit(&[AccelBuffer {
                        kind: AccelBufferKind::Bitstream,
                        data: data.to_vec(),
                    }])?;
                    sink.end_picture()?;
                }
            }
        }
        Ok(status)
    }
}

pub struct MockLibrary {
    params: StreamParams,
    script: Mutex<Vec<CodecStatus>>,
    fail_create: bool,
    contexts: Mutex<Vec<Arc<Mutex<ContextLog>>>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_PARAMS)
    }

    pub fn with_params(params: StreamParams) -> Self {
        Self {
            params,
            script: Mutex::default(),
            fail_create: false,
            contexts: Mutex::default(),
        }
    }

    /// Results played back by the next context created.
    pub fn with_script(self, script: impl IntoIterator<Item = CodecStatus>) -> Self {
        self.script.lock().extend(script);
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts.lock().len()
    }

    pub fn last_context(&self) -> Option<Arc<Mutex<ContextLog>>> {
        self.contexts.lock().last().cloned()
    }
}

impl CodecLibrary for MockLibrary {
    fn is_subtype_supported(&self, media_type: &MediaType) -> bool {
        matches!(media_type.subtype, Subtype::H264 | Subtype::Avc1)
    }

    fn create_context(&self, _media_type: &MediaType) -> Result<Box<dyn BitstreamContext>> {
        if self.fail_create {
            return Err(Error::codec("missing sequence header"));
        }
        let script = std::mem::take(&mut *self.script.lock());
        let ctx = MockContext::with_params(self.params).then(script);
        self.contexts.lock().push(ctx.log());
        Ok(Box::new(ctx))
    }
}

/*
    Downstream
*/

#[derive(Default)]
pub struct MockDownstream {
    pub delivered: Vec<OutputBuffer>,
    pub passed: Vec<MediaSample>,
}

impl Downstream for MockDownstream {
    fn deliver(&mut self, buffer: OutputBuffer) -> Result<()> {
        self.delivered.push(buffer);
        Ok(())
    }

    fn pass_through(&mut self, sample: MediaSample) -> Result<()> {
        self.passed.push(sample);
        Ok(())
    }
}

/**
    Downstream allocator that grants what it is asked for, or a fixed grant.
*/
#[derive(Default)]
pub struct MockNegotiator {
    pub grant: Option<AllocatorProperties>,
    pub requests: Mutex<Vec<AllocatorProperties>>,
}

impl BufferNegotiator for MockNegotiator {
    fn set_properties(&self, requested: AllocatorProperties) -> Result<AllocatorProperties> {
        self.requests.lock().push(requested);
        Ok(self.grant.unwrap_or(requested))
    }
}

/*
    System information
*/

pub struct MockSystem {
    pub vendor: u32,
    pub device: u32,
    pub driver: DriverVersion,
    pub os: OsFamily,
}

impl MockSystem {
    pub fn nvidia() -> Self {
        Self {
            vendor: 0x10de,
            device: 0x0640,
            driver: DriverVersion::new(8, 17, 12, 5896),
            os: OsFamily::Modern,
        }
    }
}

impl SystemInfo for MockSystem {
    fn vendor_id(&self) -> u32 {
        self.vendor
    }

    fn device_id(&self) -> u32 {
        self.device
    }

    fn driver_version(&self) -> DriverVersion {
        self.driver
    }

    fn os_family(&self) -> OsFamily {
        self.os
    }
}
