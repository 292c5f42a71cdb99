/*!
    Stream descriptor.
*/

use crate::{AspectRatio, MediaType, ProfileLevel, RefTime};

/**
    Parameters of the connected compressed stream.

    Geometry and timing come from the upstream media type; the level and
    reference-frame count come from the pre-decode bitstream context.
    Immutable once the input pin is connected.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub width: u32,
    pub height: u32,
    pub aspect: AspectRatio,
    pub profile_level: ProfileLevel,
    pub ref_frame_count: u32,
    pub avg_frame_duration: RefTime,
}

impl StreamDescriptor {
    /**
        Build a descriptor from an input media type and the values reported
        by the bitstream context.
    */
    pub fn from_media_type(
        media_type: &MediaType,
        profile_level: ProfileLevel,
        ref_frame_count: u32,
    ) -> Self {
        let video = &media_type.video;
        Self {
            width: video.width,
            height: video.height,
            aspect: video.picture_aspect(),
            profile_level,
            ref_frame_count,
            avg_frame_duration: video.avg_time_per_frame,
        }
    }

    /**
        Size in bytes of one 12 bits-per-pixel output image, or None if it
        does not fit in 32 bits.
    */
    pub fn image_size(&self) -> Option<u32> {
        image_size_420(self.width, self.height)
    }
}

/**
    Size in bytes of a 12 bits-per-pixel image.

    Returns None if the size does not fit in 32 bits.
*/
pub const fn image_size_420(width: u32, height: u32) -> Option<u32> {
    let Some(bits) = (width as u64 * height as u64).checked_mul(12) else {
        return None;
    };
    let bytes = bits >> 3;
    if bytes > u32::MAX as u64 {
        None
    } else {
        Some(bytes as u32)
    }
}
