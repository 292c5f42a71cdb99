/*!
    Decoder identities and H.264 profile levels.
*/

use std::fmt;

use crate::Subtype;
use crate::format::{DXVA2_MODE_H264_E, DXVA2_MODE_H264_F};

/**
    Identity of a hardware decoder device (a decoder profile GUID).
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoderId(pub u128);

impl DecoderId {
    pub const H264_E: Self = Self(DXVA2_MODE_H264_E);
    pub const H264_F: Self = Self(DXVA2_MODE_H264_F);

    /**
        The media subtype carrying the same GUID.
    */
    pub fn subtype(self) -> Subtype {
        Subtype::from_guid(self.0)
    }
}

impl fmt::Debug for DecoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for DecoderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{{{:08x}-{:04x}-{:04x}-{:04x}-{:012x}}}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

/**
    H.264 level as declared by the stream, times ten (level 5.1 is `51`).

    Negative values mean the level is not known yet.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileLevel(pub i32);

impl ProfileLevel {
    pub const UNKNOWN: Self = Self(-1);
    pub const LEVEL_4_1: Self = Self(41);
    pub const LEVEL_5_1: Self = Self(51);

    /**
        Returns true if the level has been parsed from the stream.
    */
    pub const fn is_known(self) -> bool {
        self.0 >= 0
    }

    /**
        Returns true if decoding requires level 5.1 support or higher.
    */
    pub const fn requires_level_51(self) -> bool {
        self.0 >= Self::LEVEL_5_1.0
    }
}

impl fmt::Display for ProfileLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}.{}", self.0 / 10, self.0 % 10)
        } else {
            write!(f, "unknown")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_id_display() {
        assert_eq!(
            format!("{}", DecoderId::H264_E),
            "{1b81be68-a0c7-11d3-b984-00c04f2e73c5}"
        );
    }

    #[test]
    fn decoder_id_subtype() {
        assert_eq!(DecoderId::H264_F.subtype(), Subtype::DxvaH264F);
        assert_eq!(DecoderId(7).subtype(), Subtype::Other(7));
    }

    #[test]
    fn level_gate() {
        assert!(!ProfileLevel::LEVEL_4_1.requires_level_51());
        assert!(ProfileLevel::LEVEL_5_1.requires_level_51());
        assert!(ProfileLevel(52).requires_level_51());
        assert!(!ProfileLevel::UNKNOWN.requires_level_51());
    }

    #[test]
    fn level_display() {
        assert_eq!(format!("{}", ProfileLevel(41)), "4.1");
        assert_eq!(format!("{}", ProfileLevel::UNKNOWN), "unknown");
    }
}
