use std::fmt;

use h264dec_types::{DecoderId, Error, Result, Subtype, SurfaceHandle};
use tracing::trace;

use crate::backend::{
    BackendKind, DecodeStatus, DecoderBackend, Display, ReorderQueue, complete, reorder_display,
};
use crate::buffer::OutputBuffer;
use crate::codec::{
    AccelBuffer, AcceleratorSink, BitstreamContext, DecodeTarget, PictureInfo, SampleTimes,
};
use crate::hw::{DeviceGuard, HwVideoDecoder};

/**
    Decoding through a hardware decoder created by the acceleration service.

    Each picture is written into the pool surface bound to the output
    buffer. Frames are held until they can be shown in picture order.
*/
pub struct ModernBackend {
    id: DecoderId,
    decoder: Box<dyn HwVideoDecoder>,
    short_slice: bool,
    reorder: ReorderQueue,
    pending: Option<PictureInfo>,
    // Closed after the decoder is dropped.
    device: DeviceGuard,
}

impl ModernBackend {
    pub fn new(
        id: DecoderId,
        decoder: Box<dyn HwVideoDecoder>,
        short_slice: bool,
        device: DeviceGuard,
    ) -> Self {
        Self {
            id,
            decoder,
            short_slice,
            reorder: ReorderQueue::default(),
            pending: None,
            device,
        }
    }

    pub fn short_slice(&self) -> bool {
        self.short_slice
    }

    pub fn device(&self) -> &DeviceGuard {
        &self.device
    }
}

impl fmt::Debug for ModernBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModernBackend")
            .field("id", &self.id)
            .field("short_slice", &self.short_slice)
            .field("held", &self.reorder.len())
            .field("device", &self.device)
            .finish()
    }
}

struct SurfaceSink<'a> {
    decoder: &'a mut dyn HwVideoDecoder,
    target: SurfaceHandle,
    short_slice: bool,
}

impl AcceleratorSink for SurfaceSink<'_> {
    fn short_slice_format(&self) -> bool {
        self.short_slice
    }

    fn begin_picture(&mut self) -> Result<()> {
        self.decoder.begin_frame(self.target)
    }

    fn submit(&mut self, buffers: &[AccelBuffer]) -> Result<()> {
        self.decoder.execute(buffers)
    }

    fn end_picture(&mut self) -> Result<()> {
        self.decoder.end_frame()
    }
}

impl DecoderBackend for ModernBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ModernHw
    }

    fn decoder_id(&self) -> Option<DecoderId> {
        Some(self.id)
    }

    fn needs_surface_allocator(&self) -> bool {
        true
    }

    fn accepts_output(&self, subtype: Subtype) -> bool {
        matches!(
            subtype,
            Subtype::Nv12 | Subtype::DxvaH264E | Subtype::DxvaH264F
        )
    }

    fn decode(
        &mut self,
        ctx: &mut dyn BitstreamContext,
        input: &[u8],
        times: SampleTimes,
        out: &mut OutputBuffer,
    ) -> Result<DecodeStatus> {
        let Some(slot) = out.surface() else {
            return Err(Error::unexpected(
                "hardware decoding needs a surface-bound buffer",
            ));
        };
        self.reorder.set_depth(ctx.params().reorder_depth as usize);

        let mut sink = SurfaceSink {
            decoder: self.decoder.as_mut(),
            target: slot.handle,
            short_slice: self.short_slice,
        };
        let status = ctx.decode(input, DecodeTarget::Accelerated(&mut sink))?;
        let (status, picture) = complete(status, times, out);
        if let Some(picture) = picture {
            trace!(surface = slot.index, poc = picture.poc, "decoded picture");
            self.pending = Some(picture);
        }
        Ok(status)
    }

    fn display_next_frame(&mut self, buffer: OutputBuffer) -> Result<Display> {
        Ok(reorder_display(&mut self.reorder, &mut self.pending, buffer))
    }

    fn flush(&mut self) {
        self.pending = None;
        self.reorder.flush();
    }

    fn drain(&mut self) -> Vec<OutputBuffer> {
        self.reorder.drain()
    }
}
