use std::fmt;

use h264dec_types::{DecoderId, Error, FourCc, RefTime, Result, Subtype};
use tracing::{debug, trace};

use crate::backend::{
    BackendKind, DecodeStatus, DecoderBackend, Display, ReorderQueue, complete, reorder_display,
};
use crate::buffer::OutputBuffer;
use crate::codec::{
    AccelBuffer, AcceleratorSink, BitstreamContext, DecodeTarget, PictureInfo, SampleTimes,
};
use crate::hw::VideoAccelerator;

/**
    Decoding through the renderer's video accelerator.

    The renderer owns the surfaces; this backend addresses them by index,
    cycling through the count the renderer granted. It is created while the
    renderer negotiates acceleration and finished by [`LegacyBackend::init`]
    once the output pin is connected.
*/
pub struct LegacyBackend {
    id: DecoderId,
    accel: Box<dyn VideoAccelerator>,
    surface_count: u32,
    next_surface: u32,
    pixel_format: Option<FourCc>,
    avg_frame_duration: RefTime,
    reorder: ReorderQueue,
    pending: Option<PictureInfo>,
}

impl LegacyBackend {
    pub fn new(id: DecoderId, accel: Box<dyn VideoAccelerator>) -> Self {
        Self {
            id,
            accel,
            surface_count: 0,
            next_surface: 0,
            pixel_format: None,
            avg_frame_duration: RefTime(0),
            reorder: ReorderQueue::default(),
            pending: None,
        }
    }

    /**
        Record how many uncompressed surfaces the renderer granted.
    */
    pub fn set_surface_count(&mut self, count: u32) {
        self.surface_count = count;
        self.next_surface = 0;
    }

    pub fn surface_count(&self) -> u32 {
        self.surface_count
    }

    pub fn avg_frame_duration(&self) -> RefTime {
        self.avg_frame_duration
    }

    pub fn is_initialized(&self) -> bool {
        self.pixel_format.is_some()
    }

    /**
        Finish the backend with the negotiated uncompressed format.
    */
    pub fn init(&mut self, pixel_format: FourCc, avg_frame_duration: RefTime) -> Result<()> {
        if self.surface_count == 0 {
            return Err(Error::allocation("renderer granted no surfaces"));
        }
        if pixel_format != FourCc::NV12 {
            return Err(Error::unsupported(format!(
                "uncompressed format {pixel_format} is not supported"
            )));
        }
        self.pixel_format = Some(pixel_format);
        self.avg_frame_duration = avg_frame_duration;
        debug!(
            decoder = %self.id,
            surfaces = self.surface_count,
            format = %pixel_format,
            "legacy accelerator ready"
        );
        Ok(())
    }
}

impl fmt::Debug for LegacyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyBackend")
            .field("id", &self.id)
            .field("surface_count", &self.surface_count)
            .field("next_surface", &self.next_surface)
            .field("pixel_format", &self.pixel_format)
            .field("held", &self.reorder.len())
            .finish()
    }
}

struct IndexSink<'a> {
    accel: &'a mut dyn VideoAccelerator,
    index: u32,
}

impl AcceleratorSink for IndexSink<'_> {
    fn short_slice_format(&self) -> bool {
        false
    }

    fn begin_picture(&mut self) -> Result<()> {
        self.accel.begin_frame(self.index)
    }

    fn submit(&mut self, buffers: &[AccelBuffer]) -> Result<()> {
        self.accel.execute(buffers)
    }

    fn end_picture(&mut self) -> Result<()> {
        self.accel.end_frame(self.index)
    }
}

impl DecoderBackend for LegacyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LegacyHw
    }

    fn decoder_id(&self) -> Option<DecoderId> {
        Some(self.id)
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
        if !self.is_initialized() {
            return Err(Error::unexpected("legacy accelerator is not initialized"));
        }
        self.reorder.set_depth(ctx.params().reorder_depth as usize);

        let index = self.next_surface;
        let mut sink = IndexSink {
            accel: self.accel.as_mut(),
            index,
        };
        let status = ctx.decode(input, DecodeTarget::Accelerated(&mut sink))?;
        let (status, picture) = complete(status, times, out);
        if let Some(picture) = picture {
            trace!(surface = index, poc = picture.poc, "decoded picture");
            out.accel_surface = Some(index);
            self.next_surface = (index + 1) % self.surface_count;
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
