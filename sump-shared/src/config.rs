//! Capture configuration and the parameters derived from it once the device
//! has been identified

use crate::error::ConfigError;
use crate::protocol::{Flags, MAX_DIVIDER};
use crate::session::MetadataEntry;

pub const DEFAULT_NUM_PROBES: u32 = 32;
pub const DEFAULT_SAMPLE_MEMORY: u32 = 1 << 16;
pub const DEFAULT_CLOCK_HZ: u32 = 100_000_000;
pub const DEFAULT_BEFORE_TRIGGER: u32 = 4;

/// Channels per group
pub const GROUP_WIDTH: u32 = 8;
/// The flags command has room for four groups
pub const MAX_PROBES: u32 = 32;

/// Capabilities of the device, either defaults, from the command line or
/// from the extended metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    pub clk_freq_hz: u32,
    pub sample_memory: u32,
    pub num_probes: u32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        DeviceCaps {
            clk_freq_hz: DEFAULT_CLOCK_HZ,
            sample_memory: DEFAULT_SAMPLE_MEMORY,
            num_probes: DEFAULT_NUM_PROBES,
        }
    }
}

impl DeviceCaps {
    /// Fold a metadata entry into the capabilities. Returns true if it
    /// changed a field.
    pub fn apply(&mut self, entry: &MetadataEntry) -> bool {
        match *entry {
            MetadataEntry::U32 { id: 0, value } => self.num_probes = value,
            MetadataEntry::U32 { id: 1, value } => self.sample_memory = value,
            MetadataEntry::U32 { id: 3, value } => self.clk_freq_hz = value,
            _ => return false,
        }
        true
    }
}

/// Number of channel groups a device with `num_probes` probes has
pub fn max_groups(num_probes: u32) -> u32 {
    (num_probes + GROUP_WIDTH - 1) / GROUP_WIDTH
}

/// Capture settings as requested by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Mask of channel groups to enable, 0 for all groups
    pub group_enable: u32,
    pub trigger_mask: u32,
    pub trigger_value: u32,
    pub clk_divisor: u32,
    /// Samples to capture, 0 for as many as fit in device memory
    pub samples: u32,
    pub before_trig: u32,
    /// Overrides `before_trig` when set
    pub after_trig: Option<u32>,
    pub rle: bool,
    pub ext_meta: bool,
    pub caps: DeviceCaps,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            group_enable: 0,
            trigger_mask: 0,
            trigger_value: 0,
            clk_divisor: 1,
            samples: 0,
            before_trig: DEFAULT_BEFORE_TRIGGER,
            after_trig: None,
            rle: false,
            ext_meta: false,
            caps: DeviceCaps::default(),
        }
    }
}

impl CaptureConfig {
    /// Checks that can be made before talking to the device
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_divisor()?;
        // Metadata may still provide the clock
        if !self.ext_meta && self.caps.clk_freq_hz == 0 {
            return Err(ConfigError::ZeroClockFrequency);
        }
        if !self.ext_meta && self.caps.num_probes > MAX_PROBES {
            return Err(ConfigError::TooManyProbes(self.caps.num_probes));
        }
        Ok(())
    }

    /// Derive the capture parameters against the final device capabilities
    pub fn finalize(&self, caps: DeviceCaps) -> Result<CaptureParams, ConfigError> {
        self.validate_divisor()?;

        if caps.num_probes > MAX_PROBES {
            return Err(ConfigError::TooManyProbes(caps.num_probes));
        }
        let max_groups = max_groups(caps.num_probes);
        let group_mask = (1u32 << max_groups) - 1;

        let mut group_enable = self.group_enable;
        if group_enable == 0 {
            group_enable = group_mask;
        }

        let num_groups_enabled = (group_enable & group_mask).count_ones();
        if num_groups_enabled == 0 {
            return Err(ConfigError::NoGroupsEnabled {
                enable: group_enable,
                mask: group_mask,
            });
        }

        let mut samples = self.samples;
        if samples == 0 {
            samples = caps.sample_memory / num_groups_enabled;
        }

        let mut before_trig = self.before_trig;
        if let Some(after_trig) = self.after_trig {
            before_trig = samples - after_trig.min(samples);
        }

        if group_enable > group_mask {
            log::warn!(
                "Requested more channel groups (0x{:X}) than available (0x{:X})",
                group_enable,
                group_mask
            );
        }

        if caps.clk_freq_hz == 0 {
            return Err(ConfigError::ZeroClockFrequency);
        }

        Ok(CaptureParams {
            group_enable: group_enable & group_mask,
            group_mask,
            max_groups,
            num_groups_enabled,
            trigger_mask: self.trigger_mask,
            trigger_value: self.trigger_value,
            clk_divisor: self.clk_divisor,
            samples,
            before_trig,
            rle: self.rle,
            caps,
        })
    }

    fn validate_divisor(&self) -> Result<(), ConfigError> {
        if self.clk_divisor == 0 || self.clk_divisor - 1 > MAX_DIVIDER {
            Err(ConfigError::InvalidDivisor(self.clk_divisor))
        } else {
            Ok(())
        }
    }
}

/// Finalized, read only parameters for one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureParams {
    /// Enabled groups, restricted to the groups the device has
    pub group_enable: u32,
    pub group_mask: u32,
    pub max_groups: u32,
    /// Bytes per sample
    pub num_groups_enabled: u32,
    pub trigger_mask: u32,
    pub trigger_value: u32,
    pub clk_divisor: u32,
    pub samples: u32,
    pub before_trig: u32,
    pub rle: bool,
    pub caps: DeviceCaps,
}

impl CaptureParams {
    /// Flags for the capture, disabling every group that is not enabled
    pub fn flags(&self) -> Flags {
        Flags {
            group_disable: (!self.group_enable & self.group_mask) as u8,
            rle: self.rle,
            ..Flags::default()
        }
    }

    /// Largest number of samples the device memory holds
    pub fn max_samples(&self) -> u32 {
        self.caps.sample_memory / self.num_groups_enabled
    }

    /// Time between two samples, in seconds
    pub fn sample_period(&self) -> f64 {
        f64::from(self.clk_divisor) / f64::from(self.caps.clk_freq_hz)
    }
}
