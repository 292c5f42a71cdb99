/*!
    Decode backends.

    A backend is one strategy for turning coded pictures into output
    pictures. Exactly one backend is active while the output is connected.
*/

use std::fmt;

use h264dec_types::{DecoderId, Result, Subtype};

use crate::buffer::OutputBuffer;
use crate::codec::{BitstreamContext, CodecStatus, PictureInfo, SampleTimes};

pub mod legacy;
pub mod modern;
pub mod software;

pub use legacy::LegacyBackend;
pub use modern::ModernBackend;
pub use software::SoftwareBackend;

/**
    Which decode strategy a backend implements.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Renderer-driven acceleration
    LegacyHw,
    /// Acceleration service with a decoder-owned surface pool
    ModernHw,
    /// Host-memory decoding
    Software,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LegacyHw => "legacy hardware",
            Self::ModernHw => "modern hardware",
            Self::Software => "software",
        })
    }
}

/**
    Outcome of one backend decode step.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The codec needs more data before it can do anything with this input.
    NeedMoreInput,
    /// `consumed` bytes were used; `produced` is true if the output buffer
    /// now holds a picture.
    Decoded { consumed: usize, produced: bool },
}

/**
    What a backend wants done with a freshly decoded buffer.
*/
#[derive(Debug)]
pub enum Display {
    /// No ordering opinion: forward the buffer as is.
    Unordered(OutputBuffer),
    /// Forward these buffers, in order (possibly none).
    Ready(Vec<OutputBuffer>),
}

/**
    Common contract of the decode strategies.
*/
pub trait DecoderBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Hardware decoder identity, if any.
    fn decoder_id(&self) -> Option<DecoderId>;

    /// Whether output buffers must be bound to pool surfaces.
    fn needs_surface_allocator(&self) -> bool {
        false
    }

    /// Whether the backend can produce the given output subtype.
    fn accepts_output(&self, subtype: Subtype) -> bool;

    fn decode(
        &mut self,
        ctx: &mut dyn BitstreamContext,
        input: &[u8],
        times: SampleTimes,
        out: &mut OutputBuffer,
    ) -> Result<DecodeStatus>;

    fn display_next_frame(&mut self, buffer: OutputBuffer) -> Result<Display> {
        Ok(Display::Unordered(buffer))
    }

    /// Discard held frames and reorder state.
    fn flush(&mut self);

    /// Release all held frames in display order.
    fn drain(&mut self) -> Vec<OutputBuffer> {
        Vec::new()
    }
}

/**
    Map a codec result to a decode status, stamping the output buffer when a
    picture was produced.

    Returns the picture so the caller can order it.
*/
pub(crate) fn complete(
    status: CodecStatus,
    times: SampleTimes,
    out: &mut OutputBuffer,
) -> (DecodeStatus, Option<PictureInfo>) {
    match status {
        CodecStatus::NeedMoreInput => (DecodeStatus::NeedMoreInput, None),
        CodecStatus::Consumed { consumed } => (
            DecodeStatus::Decoded {
                consumed,
                produced: false,
            },
            None,
        ),
        CodecStatus::Picture { consumed, picture } => {
            let t = picture.times.unwrap_or(times);
            out.start = t.start;
            out.stop = t.stop;
            (
                DecodeStatus::Decoded {
                    consumed,
                    produced: true,
                },
                Some(picture),
            )
        }
    }
}

/**
    Holds decoded hardware frames until they can be shown in picture order.

    Up to `depth` frames are held; an IDR picture releases everything held
    before it.
*/
#[derive(Debug, Default)]
pub struct ReorderQueue {
    held: Vec<(i32, OutputBuffer)>,
    depth: usize,
}

impl ReorderQueue {
    pub fn new(depth: usize) -> Self {
        Self {
            held: Vec::new(),
            depth,
        }
    }

    pub fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /**
        Add a decoded frame; returns the frames now ready for display.
    */
    pub fn push(&mut self, picture: PictureInfo, buffer: OutputBuffer) -> Vec<OutputBuffer> {
        let mut ready = if picture.is_idr {
            self.drain()
        } else {
            Vec::new()
        };

        let at = self.held.partition_point(|(poc, _)| *poc <= picture.poc);
        self.held.insert(at, (picture.poc, buffer));

        while self.held.len() > self.depth {
            let (_, buffer) = self.held.remove(0);
            ready.push(buffer);
        }
        ready
    }

    /**
        Remove every held frame in picture order.
    */
    pub fn drain(&mut self) -> Vec<OutputBuffer> {
        self.held.drain(..).map(|(_, buffer)| buffer).collect()
    }

    /**
        Drop every held frame.
    */
    pub fn flush(&mut self) {
        self.held.clear();
    }
}

/**
    Next display step for a hardware backend: order the picture it just
    produced, if the codec reported one.
*/
pub(crate) fn reorder_display(
    queue: &mut ReorderQueue,
    pending: &mut Option<PictureInfo>,
    buffer: OutputBuffer,
) -> Display {
    match pending.take() {
        Some(picture) => Display::Ready(queue.push(picture, buffer)),
        None => Display::Unordered(buffer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Payload;
    use h264dec_types::RefTime;

    fn pic(poc: i32, is_idr: bool) -> PictureInfo {
        PictureInfo {
            poc,
            is_idr,
            times: None,
        }
    }

    fn tagged(start: i64) -> OutputBuffer {
        let mut buffer = OutputBuffer::detached(Payload::Host(Vec::new()));
        buffer.start = RefTime(start);
        buffer
    }

    fn starts(buffers: &[OutputBuffer]) -> Vec<i64> {
        buffers.iter().map(|b| b.start.0).collect()
    }

    #[test]
    fn reorders_by_poc() {
        let mut q = ReorderQueue::new(2);
        assert!(q.push(pic(0, true), tagged(0)).is_empty());
        assert!(q.push(pic(4, false), tagged(4)).is_empty());
        assert_eq!(starts(&q.push(pic(2, false), tagged(2))), vec![0]);
        assert_eq!(starts(&q.push(pic(6, false), tagged(6))), vec![2]);
        assert_eq!(starts(&q.drain()), vec![4, 6]);
        assert!(q.is_empty());
    }

    #[test]
    fn idr_releases_held_frames_first() {
        let mut q = ReorderQueue::new(4);
        q.push(pic(2, false), tagged(2));
        q.push(pic(0, false), tagged(0));
        let ready = q.push(pic(0, true), tagged(100));
        assert_eq!(starts(&ready), vec![0, 2]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn zero_depth_passes_through() {
        let mut q = ReorderQueue::new(0);
        assert_eq!(starts(&q.push(pic(8, false), tagged(8))), vec![8]);
        assert!(q.is_empty());
    }

    #[test]
    fn flush_discards() {
        let mut q = ReorderQueue::new(3);
        q.push(pic(1, false), tagged(1));
        q.flush();
        assert!(q.drain().is_empty());
    }

    #[test]
    fn complete_stamps_picture_times() {
        let times = SampleTimes {
            start: RefTime(10),
            stop: RefTime(20),
        };
        let mut out = OutputBuffer::detached(Payload::Host(Vec::new()));
        let (status, picture) = complete(
            CodecStatus::Picture {
                consumed: 7,
                picture: pic(0, true),
            },
            times,
            &mut out,
        );
        assert_eq!(
            status,
            DecodeStatus::Decoded {
                consumed: 7,
                produced: true
            }
        );
        assert!(picture.is_some());
        assert_eq!(out.start, RefTime(10));
        assert_eq!(out.stop, RefTime(20));

        let (status, picture) = complete(CodecStatus::NeedMoreInput, times, &mut out);
        assert_eq!(status, DecodeStatus::NeedMoreInput);
        assert!(picture.is_none());
    }
}
