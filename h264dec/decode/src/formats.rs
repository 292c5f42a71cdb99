/*!
    Output media types offered by the filter.
*/

use h264dec_types::{
    AspectRatio, DecoderId, Error, FormatKind, FourCc, INTERLACE_DISPLAY_BOB_OR_WEAVE,
    INTERLACE_IS_INTERLACED, MediaType, Rect, Result, Subtype, VideoFormat, image_size_420,
};

/// Bits per pixel advertised for every output layout.
const OUTPUT_BIT_COUNT: u16 = 12;

#[derive(Clone, Copy, Debug)]
struct OutputFormat {
    subtype: Subtype,
    planes: u16,
    compression: FourCc,
}

const fn hardware(subtype: Subtype, fourcc: &[u8; 4]) -> OutputFormat {
    OutputFormat {
        subtype,
        planes: 1,
        compression: FourCc::from_bytes(*fourcc),
    }
}

const fn software(subtype: Subtype, compression: FourCc) -> OutputFormat {
    OutputFormat {
        subtype,
        planes: 3,
        compression,
    }
}

// Renderers match on different spellings of the "dxva" tag.
const OUTPUT_FORMATS: [OutputFormat; 8] = [
    hardware(Subtype::DxvaH264E, b"dxva"),
    hardware(Subtype::DxvaH264F, b"dxva"),
    hardware(Subtype::Nv12, b"dxva"),
    hardware(Subtype::Nv12, b"DXVA"),
    hardware(Subtype::Nv12, b"DxVA"),
    hardware(Subtype::Nv12, b"DXvA"),
    software(Subtype::Yv12, FourCc::YV12),
    software(Subtype::Yuy2, FourCc::YUY2),
];

/**
    Build the output media types for a connected input type.

    Every table entry is offered twice, as a `VideoInfo` and a `VideoInfo2`
    format block.
*/
pub fn build_output_types(input: &MediaType) -> Result<Vec<MediaType>> {
    let src = &input.video;
    if src.width == 0 || src.height == 0 {
        return Err(Error::type_rejected(format!(
            "input has no picture size ({}x{})",
            src.width, src.height
        )));
    }
    let size_image = image_size_420(src.width, src.height).ok_or_else(|| {
        Error::type_rejected(format!(
            "input picture size {}x{} is too large",
            src.width, src.height
        ))
    })?;
    let aspect = src.picture_aspect();
    let pels_per_meter = aspect.pels_per_meter(src.width, src.height).ok_or_else(|| {
        Error::type_rejected(format!(
            "aspect ratio {aspect} is out of range for {}x{}",
            src.width, src.height
        ))
    })?;
    let (source, target) = if src.source.is_empty() {
        let frame = Rect::frame(src.width, src.height);
        (frame, frame)
    } else {
        (src.source, src.target)
    };

    let base = VideoFormat {
        width: src.width,
        height: src.height,
        aspect: None,
        pels_per_meter: (0, 0),
        avg_time_per_frame: src.avg_time_per_frame,
        bit_rate: src.bit_rate,
        bit_error_rate: src.bit_error_rate,
        source,
        target,
        interlace_flags: 0,
        planes: 1,
        bit_count: OUTPUT_BIT_COUNT,
        compression: FourCc::NV12,
        size_image,
    };

    let mut types = Vec::with_capacity(OUTPUT_FORMATS.len() * 2);
    for format in OUTPUT_FORMATS {
        let entry = VideoFormat {
            planes: format.planes,
            compression: format.compression,
            ..base
        };
        types.push(MediaType::video(
            format.subtype,
            FormatKind::VideoInfo,
            video_info(entry, pels_per_meter),
        ));
        types.push(MediaType::video(
            format.subtype,
            FormatKind::VideoInfo2,
            video_info2(entry, aspect),
        ));
    }
    Ok(types)
}

fn video_info(mut format: VideoFormat, pels_per_meter: (u32, u32)) -> VideoFormat {
    format.pels_per_meter = pels_per_meter;
    format
}

fn video_info2(mut format: VideoFormat, aspect: AspectRatio) -> VideoFormat {
    format.aspect = Some(aspect);
    format.interlace_flags = INTERLACE_IS_INTERLACED | INTERLACE_DISPLAY_BOB_OR_WEAVE;
    format
}

/**
    Returns true if the hardware decoder identity is one the filter drives.
*/
pub fn is_recognized(id: DecoderId) -> bool {
    id == DecoderId::H264_E || id == DecoderId::H264_F
}

/**
    Check that an input type may be transformed into an output type.

    Raw planar 4:2:0 inputs only convert to planar 4:2:0 or YUY2; YUY2 input
    only passes through as YUY2. Compressed inputs may use any output.
*/
pub fn check_transform(input: &MediaType, output: &MediaType) -> Result<()> {
    if !output.is_video() {
        return Err(Error::type_rejected("output is not a video type"));
    }
    let allowed = match input.subtype {
        s if s.is_planar_420() => output.subtype.is_planar_420() || output.subtype == Subtype::Yuy2,
        Subtype::Yuy2 => output.subtype == Subtype::Yuy2,
        _ => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(Error::type_rejected(format!(
            "cannot convert {:?} to {:?}",
            input.subtype, output.subtype
        )))
    }
}
