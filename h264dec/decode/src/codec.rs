/*!
    The external codec library.

    The library owns the H.264 bitstream arithmetic. For hardware paths it
    does not reconstruct pixels itself; it fills acceleration buffers and
    hands them to an [`AcceleratorSink`] provided by the active backend.
*/

use h264dec_types::{MediaType, ProfileLevel, RefTime, Result};

/// Zeroed bytes the codec may read past the end of the payload.
pub const INPUT_PADDING: usize = 64;

/**
    Codec library entry points.
*/
pub trait CodecLibrary: Send + Sync {
    /// Whether the library can parse this compressed input type.
    fn is_subtype_supported(&self, media_type: &MediaType) -> bool;

    /// Create the pre-decode bitstream context for a connected input type.
    fn create_context(&self, media_type: &MediaType) -> Result<Box<dyn BitstreamContext>>;

    fn input_padding(&self) -> usize {
        INPUT_PADDING
    }
}

/**
    Stream parameters known to the bitstream context.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamParams {
    pub width: u32,
    pub height: u32,
    pub profile_level: ProfileLevel,
    pub ref_frame_count: u32,
    /// Pictures that may precede a picture in decode order but follow it in
    /// display order.
    pub reorder_depth: u32,
}

/**
    Presentation interval of a sample or picture.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleTimes {
    pub start: RefTime,
    pub stop: RefTime,
}

/**
    A picture the codec finished decoding.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PictureInfo {
    /// Picture order count, the display order key.
    pub poc: i32,
    /// Instantaneous decoder refresh: no later picture references earlier ones.
    pub is_idr: bool,
    /// Picture timing, when the codec tracked it.
    pub times: Option<SampleTimes>,
}

/**
    Outcome of one codec decode call.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecStatus {
    /// Input consumed but no picture can be completed until more arrives.
    NeedMoreInput,
    /// Bytes consumed without completing a picture (parameter sets, SEI).
    Consumed { consumed: usize },
    /// A coded picture was decoded.
    Picture { consumed: usize, picture: PictureInfo },
}

/**
    Acceleration buffer types submitted to hardware.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccelBufferKind {
    PictureParameters,
    InverseQuantization,
    SliceControl,
    Bitstream,
}

/**
    One filled acceleration buffer.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccelBuffer {
    pub kind: AccelBufferKind,
    pub data: Vec<u8>,
}

/**
    Where decoded pixels go.
*/
pub enum DecodeTarget<'a> {
    /// Software reconstruction into a host buffer.
    Host(&'a mut [u8]),
    /// Hardware reconstruction; the codec submits buffers to the sink.
    Accelerated(&'a mut dyn AcceleratorSink),
}

/**
    Hardware hooks invoked by the codec while decoding one picture.
*/
pub trait AcceleratorSink {
    /// Whether slices are submitted without start codes.
    fn short_slice_format(&self) -> bool;
    fn begin_picture(&mut self) -> Result<()>;
    fn submit(&mut self, buffers: &[AccelBuffer]) -> Result<()>;
    fn end_picture(&mut self) -> Result<()>;
}

/**
    Pre-decode bitstream context created at input connection.
*/
pub trait BitstreamContext: Send {
    fn params(&self) -> StreamParams;

    /// Timing of the sample about to be decoded.
    fn update_time(&mut self, start: RefTime, stop: RefTime);

    /// Discard partially assembled pictures and reference state.
    fn flush_buffers(&mut self);

    /// Decode from the start of `data`.
    fn decode(&mut self, data: &[u8], target: DecodeTarget<'_>) -> Result<CodecStatus>;
}
