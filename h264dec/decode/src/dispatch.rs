/*!
    The per-sample decode loop.
*/

use h264dec_types::{Error, MediaSample, RefTime, Result, complete_stop};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::backend::{DecodeStatus, DecoderBackend, Display};
use crate::buffer::{OutputAllocator, OutputBuffer};
use crate::codec::{BitstreamContext, SampleTimes};
use crate::pool::SurfacePool;

/**
    State shared by the streaming thread and the control thread, guarded by
    the decode lock.
*/
#[derive(Default)]
pub struct DecodeState {
    pub(crate) context: Option<Box<dyn BitstreamContext>>,
    pub(crate) backend: Option<Box<dyn DecoderBackend>>,
    pub(crate) pool: SurfacePool,
}

impl DecodeState {
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /**
        Flush the backend, release the pool and drop the backend and the
        bitstream context, in that order.
    */
    pub(crate) fn tear_down(&mut self) {
        self.pool.free(self.backend.as_deref_mut());
        self.backend = None;
        self.context = None;
    }
}

/**
    Receives decoded pictures and passed-through samples.
*/
pub trait Downstream {
    fn deliver(&mut self, buffer: OutputBuffer) -> Result<()>;
    fn pass_through(&mut self, sample: MediaSample) -> Result<()>;
}

/**
    Walks one compressed sample, which may hold several coded pictures.
*/
struct DecodeCursor {
    sample: MediaSample,
    offset: usize,
    remaining: usize,
    times: SampleTimes,
}

impl DecodeCursor {
    /// Zero `padding` bytes past the payload and start at its first byte.
    fn padded(mut sample: MediaSample, padding: usize, stop: RefTime) -> Self {
        if sample.zero_padding(padding) {
            debug!(len = sample.actual_len, "grew sample buffer for padding");
        }
        let remaining = sample.payload().len();
        let times = SampleTimes {
            start: sample.start,
            stop,
        };
        Self {
            sample,
            offset: 0,
            remaining,
            times,
        }
    }

    /// Unconsumed payload. The zeroed padding follows it in the sample buffer.
    fn input(&self) -> &[u8] {
        &self.sample.data[self.offset..self.offset + self.remaining]
    }

    fn advance(&mut self, consumed: usize) {
        let n = consumed.min(self.remaining);
        self.offset += n;
        self.remaining -= n;
    }
}

/**
    One call's view of the filter: the shared decode state and the output
    allocator chosen at output connection.
*/
pub(crate) struct DecodeDispatch<'a> {
    pub state: &'a Mutex<DecodeState>,
    pub allocator: Option<&'a dyn OutputAllocator>,
    pub padding: usize,
    pub avg_frame_duration: RefTime,
}

impl DecodeDispatch<'_> {
    /**
        Decode one sample and forward every picture that becomes ready.

        Returns the number of buffers forwarded.
    */
    pub fn receive(&self, sample: MediaSample, downstream: &mut dyn Downstream) -> Result<usize> {
        if !sample.is_media() {
            downstream.pass_through(sample)?;
            return Ok(0);
        }

        let mut sample = sample;
        {
            let mut state = self.state.lock();
            if state.backend.is_none() {
                return Err(Error::unexpected("no active decode backend"));
            }
            let ctx = state
                .context
                .as_deref_mut()
                .ok_or_else(|| Error::unexpected("no bitstream context"))?;
            let stop = complete_stop(sample.start, sample.stop, self.avg_frame_duration);
            ctx.update_time(sample.start, stop);
            sample.stop = stop;
        }
        let allocator = self
            .allocator
            .ok_or_else(|| Error::unexpected("no output allocator"))?;

        let stop = sample.stop;
        let mut cursor = DecodeCursor::padded(sample, self.padding, stop);
        let mut forwarded = 0;

        while cursor.remaining > 0 {
            let mut out = allocator.get_buffer()?;

            let display = {
                let mut guard = self.state.lock();
                let state = &mut *guard;
                let backend = state
                    .backend
                    .as_deref_mut()
                    .ok_or_else(|| Error::unexpected("backend torn down while streaming"))?;
                let ctx = state
                    .context
                    .as_deref_mut()
                    .ok_or_else(|| Error::unexpected("no bitstream context"))?;

                match backend.decode(ctx, cursor.input(), cursor.times, &mut out)? {
                    DecodeStatus::NeedMoreInput => return Ok(forwarded),
                    DecodeStatus::Decoded { consumed, produced } => {
                        cursor.advance(consumed);
                        if produced {
                            backend.display_next_frame(out)?
                        } else if consumed == 0 {
                            warn!(
                                remaining = cursor.remaining,
                                "decoder made no progress, dropping rest of sample"
                            );
                            return Ok(forwarded);
                        } else {
                            continue;
                        }
                    }
                }
            };

            match display {
                Display::Unordered(buffer) => {
                    downstream.deliver(buffer)?;
                    forwarded += 1;
                }
                Display::Ready(buffers) => {
                    for buffer in buffers {
                        downstream.deliver(buffer)?;
                        forwarded += 1;
                    }
                }
            }
        }
        Ok(forwarded)
    }

    /**
        Discard partially decoded and held pictures.
    */
    pub fn new_segment(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(ctx) = state.context.as_deref_mut() {
            ctx.flush_buffers();
        }
        if let Some(backend) = state.backend.as_deref_mut() {
            backend.flush();
        }
        debug!("flushed decoder for new segment");
    }

    /**
        Forward every frame the backend still holds.
    */
    pub fn end_of_stream(&self, downstream: &mut dyn Downstream) -> Result<usize> {
        let held = {
            let mut state = self.state.lock();
            match state.backend.as_deref_mut() {
                Some(backend) => backend.drain(),
                None => Vec::new(),
            }
        };
        let count = held.len();
        for buffer in held {
            downstream.deliver(buffer)?;
        }
        debug!(count, "drained held frames at end of stream");
        Ok(count)
    }
}
