/*!
    Decoder configuration types.
*/

use serde::{Deserialize, Serialize};

use h264dec_types::{Error, Result};

use crate::hw::OsFamily;

/// Surfaces allocated on the modern OS family.
pub const MODERN_SURFACE_COUNT: u32 = 22;
/// Surfaces allocated otherwise.
pub const LEGACY_SURFACE_COUNT: u32 = 16;

/**
    Hardware decoding tier.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwTier {
    /// Renderer-driven acceleration negotiated during pin connection
    Legacy,
    /// Acceleration service exposed by the renderer
    Modern,
}

/**
    What to do when a stream uses more reference frames than the hardware
    is believed to handle.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefFramePolicy {
    /// Report it, keep the hardware path.
    #[default]
    Informational,
    /// Treat it like an unsupported level and fall through to the next tier.
    Enforce,
}

/**
    Configuration for the decode filter.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Prefer hardware decoding if available.
    pub prefer_hw: bool,
    /// Restrict hardware decoding to one tier (None = any).
    pub hw_tier: Option<HwTier>,
    /// Reference frame count enforcement.
    pub ref_frame_policy: RefFramePolicy,
    /// Override the platform surface count.
    pub surface_count: Option<u32>,
}

impl DecoderConfig {
    /**
        Create a new config with default settings (software decoding).
    */
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Create a config that prefers hardware acceleration.
    */
    pub fn with_hw_accel() -> Self {
        Self {
            prefer_hw: true,
            ..Self::default()
        }
    }

    /**
        Create a config restricted to one hardware tier.
    */
    pub fn with_hw_tier(tier: HwTier) -> Self {
        Self {
            prefer_hw: true,
            hw_tier: Some(tier),
            ..Self::default()
        }
    }

    /**
        Parse a config from JSON. Missing fields take their defaults.
    */
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        if config.surface_count == Some(0) {
            return Err(Error::config("surface_count must be at least 1"));
        }
        Ok(config)
    }

    /**
        Serialize this config to pretty JSON.
    */
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /**
        Returns true if negotiation may try the given hardware tier.
    */
    pub fn allows(&self, tier: HwTier) -> bool {
        self.prefer_hw && self.hw_tier.is_none_or(|t| t == tier)
    }

    /**
        Number of hardware surfaces to allocate on this platform.
    */
    pub fn surface_count(&self, os: OsFamily) -> u32 {
        self.surface_count.unwrap_or(match os {
            OsFamily::Modern => MODERN_SURFACE_COUNT,
            OsFamily::Legacy => LEGACY_SURFACE_COUNT,
        })
    }
}
