/*!
    FourCC codes, media subtypes and plane families.
*/

use std::fmt;

/**
    A four character code, stored in little-endian byte order as it appears
    in bitmap headers.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub u32);

impl FourCc {
    pub const NV12: Self = Self::from_bytes(*b"NV12");
    pub const YV12: Self = Self::from_bytes(*b"YV12");
    pub const YUY2: Self = Self::from_bytes(*b"YUY2");
    pub const I420: Self = Self::from_bytes(*b"I420");
    pub const IYUV: Self = Self::from_bytes(*b"IYUV");
    pub const H264: Self = Self::from_bytes(*b"H264");
    pub const AVC1: Self = Self::from_bytes(*b"AVC1");

    /**
        Build a code from its four characters.
    */
    pub const fn from_bytes(b: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(b))
    }

    /**
        The four characters of this code.
    */
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() { b as char } else { '.' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Trailing bytes shared by every FourCC-derived subtype GUID.
const FOURCC_GUID_BASE: u128 = 0x0000_0010_8000_00aa_0038_9b71;

/// DXVA2 H.264 variable-length decoding, no film grain.
pub const DXVA2_MODE_H264_E: u128 = 0x1b81be68_a0c7_11d3_b984_00c04f2e73c5;
/// DXVA2 H.264 variable-length decoding, film grain.
pub const DXVA2_MODE_H264_F: u128 = 0x1b81be69_a0c7_11d3_b984_00c04f2e73c5;

/**
    Media subtypes the filter deals with.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Subtype {
    /// Compressed H.264 with start codes
    H264,
    /// Compressed H.264 in length-prefixed form
    Avc1,
    /// DXVA2 H.264 mode E (hardware surface)
    DxvaH264E,
    /// DXVA2 H.264 mode F (hardware surface)
    DxvaH264F,
    /// Semi-planar YUV 4:2:0
    Nv12,
    /// Planar YVU 4:2:0
    Yv12,
    /// Planar YUV 4:2:0
    I420,
    /// Planar YUV 4:2:0, alias of I420
    Iyuv,
    /// Packed YUV 4:2:2
    Yuy2,
    /// Any other subtype
    Other(u128),
}

impl Subtype {
    /**
        Subtype identified by a FourCC-derived GUID.
    */
    pub const fn fourcc_guid(code: FourCc) -> u128 {
        ((code.0 as u128) << 96) | FOURCC_GUID_BASE
    }

    /**
        The subtype's GUID.
    */
    pub const fn guid(self) -> u128 {
        match self {
            Self::H264 => Self::fourcc_guid(FourCc::H264),
            Self::Avc1 => Self::fourcc_guid(FourCc::AVC1),
            Self::DxvaH264E => DXVA2_MODE_H264_E,
            Self::DxvaH264F => DXVA2_MODE_H264_F,
            Self::Nv12 => Self::fourcc_guid(FourCc::NV12),
            Self::Yv12 => Self::fourcc_guid(FourCc::YV12),
            Self::I420 => Self::fourcc_guid(FourCc::I420),
            Self::Iyuv => Self::fourcc_guid(FourCc::IYUV),
            Self::Yuy2 => Self::fourcc_guid(FourCc::YUY2),
            Self::Other(guid) => guid,
        }
    }

    /**
        Map a GUID back to a known subtype.
    */
    pub fn from_guid(guid: u128) -> Self {
        [
            Self::H264,
            Self::Avc1,
            Self::DxvaH264E,
            Self::DxvaH264F,
            Self::Nv12,
            Self::Yv12,
            Self::I420,
            Self::Iyuv,
            Self::Yuy2,
        ]
        .into_iter()
        .find(|s| s.guid() == guid)
        .unwrap_or(Self::Other(guid))
    }

    /**
        Returns true for uncompressed planar 4:2:0 subtypes.
    */
    pub const fn is_planar_420(self) -> bool {
        matches!(self, Self::Yv12 | Self::I420 | Self::Iyuv)
    }
}

/**
    Plane-count family of an uncompressed output layout.

    Hardware layouts describe a single surface plane; software layouts are
    multi-plane host memory.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaneFamily {
    Hardware,
    Software,
}

impl PlaneFamily {
    /**
        Family of a bitmap plane count.
    */
    pub const fn from_planes(planes: u16) -> Self {
        if planes <= 1 {
            Self::Hardware
        } else {
            Self::Software
        }
    }

    /**
        Bitmap plane count advertised for this family.
    */
    pub const fn planes(self) -> u16 {
        match self {
            Self::Hardware => 1,
            Self::Software => 3,
        }
    }
}
