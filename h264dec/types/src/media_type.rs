/*!
    Media types exchanged during pin connection.
*/

use crate::{AspectRatio, FourCc, PlaneFamily, RefTime, Subtype};

/**
    Major type of a media stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MajorType {
    Video,
    Audio,
    Other,
}

/**
    Layout of the format block.

    `VideoInfo2` adds an explicit picture aspect ratio and interlace flags.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatKind {
    VideoInfo,
    VideoInfo2,
}

/**
    A rectangle in pixel coordinates.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /**
        Rectangle covering a whole frame.
    */
    pub const fn frame(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width as i32,
            bottom: height as i32,
        }
    }

    /**
        Returns true if the rectangle has no extent set.
    */
    pub const fn is_empty(&self) -> bool {
        self.right == 0 || self.bottom == 0
    }
}

/// Stream may be interlaced.
pub const INTERLACE_IS_INTERLACED: u32 = 0x01;
/// Renderer may bob or weave.
pub const INTERLACE_DISPLAY_BOB_OR_WEAVE: u32 = 0x80;

/**
    Video format block (the union of both header layouts).
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// Picture aspect ratio. Only carried by `VideoInfo2` blocks.
    pub aspect: Option<AspectRatio>,
    /// Pixels per meter, encoding the aspect in `VideoInfo` blocks.
    pub pels_per_meter: (u32, u32),
    pub avg_time_per_frame: RefTime,
    pub bit_rate: u32,
    pub bit_error_rate: u32,
    pub source: Rect,
    pub target: Rect,
    pub interlace_flags: u32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: FourCc,
    pub size_image: u32,
}

impl VideoFormat {
    /**
        A format block for a frame of the given size with defaults for every
        other field.
    */
    pub fn new(width: u32, height: u32, compression: FourCc) -> Self {
        Self {
            width,
            height,
            aspect: None,
            pels_per_meter: (0, 0),
            avg_time_per_frame: RefTime(0),
            bit_rate: 0,
            bit_error_rate: 0,
            source: Rect::default(),
            target: Rect::default(),
            interlace_flags: 0,
            planes: 1,
            bit_count: 0,
            compression,
            size_image: 0,
        }
    }

    /**
        Picture aspect ratio, falling back to square pixels.
    */
    pub fn picture_aspect(&self) -> AspectRatio {
        self.aspect
            .unwrap_or_else(|| AspectRatio::of_frame(self.width, self.height))
    }
}

/**
    A full media type: major type, subtype and format block.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaType {
    pub major: MajorType,
    pub subtype: Subtype,
    pub format_kind: FormatKind,
    pub video: VideoFormat,
}

impl MediaType {
    /**
        Create a video media type.
    */
    pub fn video(subtype: Subtype, format_kind: FormatKind, video: VideoFormat) -> Self {
        Self {
            major: MajorType::Video,
            subtype,
            format_kind,
            video,
        }
    }

    /**
        Returns true if this is a video media type.
    */
    pub fn is_video(&self) -> bool {
        self.major == MajorType::Video
    }

    /**
        Plane-count family of the format block.
    */
    pub fn plane_family(&self) -> PlaneFamily {
        PlaneFamily::from_planes(self.video.planes)
    }
}
