/*!
    Hardware capability advisor.

    Decides whether the graphics hardware can be trusted with a stream,
    based on the stream level and reference frame count and on per-vendor
    driver thresholds.
*/

use std::ops::BitOr;

use h264dec_types::{Error, ProfileLevel, Result, StreamDescriptor};
use tracing::debug;

use crate::config::RefFramePolicy;
use crate::hw::{DriverVersion, HardwareInfo, OsFamily};

pub const PCI_VENDOR_NVIDIA: u32 = 0x10de;
pub const PCI_VENDOR_ATI: u32 = 0x1002;
pub const PCI_VENDOR_S3_GRAPHICS: u32 = 0x5333;

/// Level 4.1 decoded picture buffer size, in macroblock-pixel units.
const DPB_41_PIXELS: u64 = 8_388_608;
/// Reference frame ceiling before any vendor allowance.
const MAX_REF_FRAMES_DEFAULT: u32 = 11;

/**
    Hardware compatibility verdict, a bitmask.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Compatibility(u32);

impl Compatibility {
    pub const COMPATIBLE: Self = Self(0);
    /// Stream needs level 5.1 and no vendor gate passed.
    pub const LEVEL_UNSUPPORTED: Self = Self(1);
    /// Stream uses more reference frames than the hardware allows.
    pub const TOO_MANY_REF_FRAMES: Self = Self(2);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_compatible(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Compatibility {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/**
    Reference frame ceiling granted once a vendor rule passes.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefFrameAllowance {
    /// Keep the resolution-derived ceiling.
    Computed,
    Fixed(u32),
    /// `hd` frames for widths of at least `hd_width`, else `sd`.
    ByWidth { hd_width: u32, hd: u32, sd: u32 },
}

impl RefFrameAllowance {
    fn apply(self, width: u32, computed: u32) -> u32 {
        match self {
            Self::Computed => computed,
            Self::Fixed(n) => n,
            Self::ByWidth { hd_width, hd, sd } => {
                if width >= hd_width {
                    hd
                } else {
                    sd
                }
            }
        }
    }
}

/**
    One row of the level 5.1 allow-list.

    A rule applies when the vendor matches, the OS family matches (if set)
    and the device class matches (if set); it passes when the driver has
    reached `min_driver` (if set).
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VendorRule {
    pub vendor: u32,
    pub os: Option<OsFamily>,
    /// Accepted values of the device id's high byte (empty = any device).
    pub device_classes: &'static [u32],
    pub min_driver: Option<DriverVersion>,
    pub allowance: RefFrameAllowance,
}

impl VendorRule {
    fn applies_to(&self, hw: &HardwareInfo) -> bool {
        self.vendor == hw.vendor
            && self.os.is_none_or(|os| os == hw.os)
            && (self.device_classes.is_empty() || self.device_classes.contains(&(hw.device >> 8)))
    }

    fn passes(&self, hw: &HardwareInfo) -> bool {
        self.min_driver.is_none_or(|min| hw.driver >= min)
    }
}

/**
    Known level 5.1 support by vendor.
*/
pub const VENDOR_RULES: &[VendorRule] = &[
    VendorRule {
        vendor: PCI_VENDOR_NVIDIA,
        os: Some(OsFamily::Modern),
        device_classes: &[],
        min_driver: Some(DriverVersion::new(7, 15, 11, 7800)),
        allowance: RefFrameAllowance::ByWidth {
            hd_width: 1280,
            hd: 16,
            sd: 11,
        },
    },
    VendorRule {
        vendor: PCI_VENDOR_NVIDIA,
        os: Some(OsFamily::Legacy),
        device_classes: &[],
        min_driver: Some(DriverVersion::new(6, 14, 11, 7800)),
        allowance: RefFrameAllowance::Fixed(14),
    },
    VendorRule {
        vendor: PCI_VENDOR_S3_GRAPHICS,
        os: None,
        device_classes: &[],
        min_driver: None,
        allowance: RefFrameAllowance::Computed,
    },
    // HD4xxx and HD5xxx
    VendorRule {
        vendor: PCI_VENDOR_ATI,
        os: None,
        device_classes: &[0x68, 0x94],
        min_driver: Some(DriverVersion::new(8, 14, 1, 6105)),
        allowance: RefFrameAllowance::Fixed(16),
    },
];

/**
    Resolution-derived reference frame ceiling: the level 4.1 DPB size
    divided by the frame area, capped at 11.
*/
pub fn max_ref_frames(width: u32, height: u32) -> u32 {
    let area = width as u64 * height as u64;
    if area == 0 {
        return MAX_REF_FRAMES_DEFAULT;
    }
    (DPB_41_PIXELS / area).min(MAX_REF_FRAMES_DEFAULT as u64) as u32
}

/**
    Scores streams against the installed graphics hardware.
*/
#[derive(Clone, Debug)]
pub struct HardwareCapabilityAdvisor {
    hardware: HardwareInfo,
    rules: &'static [VendorRule],
    policy: RefFramePolicy,
}

impl HardwareCapabilityAdvisor {
    pub fn new(hardware: HardwareInfo, policy: RefFramePolicy) -> Self {
        Self::with_rules(hardware, VENDOR_RULES, policy)
    }

    pub fn with_rules(
        hardware: HardwareInfo,
        rules: &'static [VendorRule],
        policy: RefFramePolicy,
    ) -> Self {
        Self {
            hardware,
            rules,
            policy,
        }
    }

    pub fn hardware(&self) -> &HardwareInfo {
        &self.hardware
    }

    /**
        Classify a stream.

        An unknown level skips vendor evaluation entirely and reports the
        stream as compatible.
    */
    pub fn classify(
        &self,
        width: u32,
        height: u32,
        level: ProfileLevel,
        ref_frame_count: u32,
    ) -> Compatibility {
        if !level.is_known() {
            return Compatibility::COMPATIBLE;
        }

        let computed = max_ref_frames(width, height);
        let passed = self
            .rules
            .iter()
            .find(|rule| rule.applies_to(&self.hardware) && rule.passes(&self.hardware));
        let max_refs = passed.map_or(computed, |rule| rule.allowance.apply(width, computed));

        let mut verdict = Compatibility::COMPATIBLE;
        if level.requires_level_51() && passed.is_none() {
            verdict = verdict | Compatibility::LEVEL_UNSUPPORTED;
        }
        if ref_frame_count > max_refs {
            verdict = verdict | Compatibility::TOO_MANY_REF_FRAMES;
        }
        verdict
    }

    /**
        Returns true if the verdict blocks hardware decoding under the
        configured policy.
    */
    pub fn vetoes(&self, verdict: Compatibility) -> bool {
        verdict.contains(Compatibility::LEVEL_UNSUPPORTED)
            || (self.policy == RefFramePolicy::Enforce
                && verdict.contains(Compatibility::TOO_MANY_REF_FRAMES))
    }

    /**
        Classify a connected stream and fail with a veto if hardware must not
        be used.
    */
    pub fn check(&self, stream: &StreamDescriptor) -> Result<Compatibility> {
        let verdict = self.classify(
            stream.width,
            stream.height,
            stream.profile_level,
            stream.ref_frame_count,
        );
        debug!(
            vendor = self.hardware.vendor,
            driver = %self.hardware.driver,
            level = %stream.profile_level,
            refs = stream.ref_frame_count,
            verdict = verdict.bits(),
            "classified stream for hardware decode"
        );
        if self.vetoes(verdict) {
            return Err(Error::vetoed(format!(
                "{}x{} level {} with {} reference frames (verdict {:#x})",
                stream.width,
                stream.height,
                stream.profile_level,
                stream.ref_frame_count,
                verdict.bits()
            )));
        }
        Ok(verdict)
    }
}
