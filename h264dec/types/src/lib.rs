/*!
    Shared types for the H.264 decode filter.

    This crate defines the vocabulary that crosses the boundary between the
    decode filter and its collaborators. It has no dependency on any
    hardware API or codec library.

    # Core Types

    - [`RefTime`] - Media time in 100 ns ticks
    - [`MediaSample`] - Compressed input sample
    - [`StreamDescriptor`] - Parameters of the connected stream

    # Format Types

    - [`MediaType`], [`VideoFormat`] and [`FormatKind`] - Pin media types
    - [`Subtype`], [`FourCc`] and [`PlaneFamily`] - Subtype identification
    - [`AspectRatio`] - Picture aspect ratio
    - [`DecoderId`] and [`ProfileLevel`] - Hardware decoder identity and stream level

    # Hardware

    - [`SurfaceHandle`] and [`SurfaceSlot`] - Pool-addressed video-memory surfaces

    # Error Handling

    - [`Error`] and [`Result`] - Common error types

    # Stream Control

    - [`StreamSignal`] - New segment and end of stream
*/

mod aspect;
mod codec;
mod error;
mod format;
mod media_type;
mod sample;
mod signal;
mod stream;
mod surface;
mod timestamp;

pub use aspect::AspectRatio;
pub use codec::{DecoderId, ProfileLevel};
pub use error::{Error, Result};
pub use format::{DXVA2_MODE_H264_E, DXVA2_MODE_H264_F, FourCc, PlaneFamily, Subtype};
pub use media_type::{
    FormatKind, INTERLACE_DISPLAY_BOB_OR_WEAVE, INTERLACE_IS_INTERLACED, MajorType, MediaType,
    Rect, VideoFormat,
};
pub use sample::{MediaSample, SampleStream};
pub use signal::StreamSignal;
pub use stream::{StreamDescriptor, image_size_420};
pub use surface::{SurfaceHandle, SurfaceSlot};
pub use timestamp::{RefTime, complete_stop};
