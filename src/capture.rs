use std::convert::TryFrom;
use std::io::{Read, Write};

use sump_shared::protocol::TRIGGER_STAGES;
use sump_shared::{
    CaptureParams, Command, ConfigError, Error, SampleBuffer, SumpLink, TriggerStageConfig,
};

/// Sample and trigger position counts after clamping to the device memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureWindow {
    pub samples: u32,
    pub before_trigger: u32,
}

impl CaptureWindow {
    pub fn new(params: &CaptureParams) -> Result<Self, ConfigError> {
        let max_samples = params.max_samples();
        let mut samples = params.samples;
        if samples > max_samples {
            log::warn!(
                "Requested more samples than the maximum ({}).",
                max_samples
            );
            samples = max_samples;
        }

        let mut before_trigger = params.before_trig;
        if before_trigger > samples {
            log::warn!(
                "Requested more samples before trigger ({}) than number captured ({}).",
                before_trigger,
                samples
            );
            before_trigger = samples;
        }

        let window = CaptureWindow {
            samples,
            before_trigger,
        };
        window.command()?;
        Ok(window)
    }

    /// Read and delay counts, in units of four samples
    pub fn command(&self) -> Result<Command, ConfigError> {
        let too_large = |_| ConfigError::SampleCountTooLarge(self.samples);
        Ok(Command::SetReadDelayCounts {
            read_count: u16::try_from(self.samples / 4).map_err(too_large)?,
            delay_count: u16::try_from((self.samples - self.before_trigger) / 4)
                .map_err(too_large)?,
        })
    }

    /// Bytes the device sends back for this capture
    pub fn byte_len(&self, params: &CaptureParams) -> usize {
        self.samples as usize * params.num_groups_enabled as usize
    }
}

fn send_trigger_stage<P: Read + Write>(
    link: &mut SumpLink<P>,
    stage: u8,
    mask: u32,
    value: u32,
    config: TriggerStageConfig,
) -> Result<(), Error> {
    link.send_command(Command::SetTriggerMask { stage, mask })?;
    link.send_command(Command::SetTriggerValue { stage, value })?;
    link.send_command(Command::SetTriggerConfig { stage, config })?;
    Ok(())
}

fn configure_triggers<P: Read + Write>(
    link: &mut SumpLink<P>,
    params: &CaptureParams,
) -> Result<(), Error> {
    let start = TriggerStageConfig {
        start: true,
        ..TriggerStageConfig::default()
    };

    if params.trigger_mask == 0 {
        return send_trigger_stage(link, 0, 0, 0, start);
    }

    send_trigger_stage(link, 0, params.trigger_mask, params.trigger_value, start)?;

    // Unused stages pass straight through
    let passthrough = TriggerStageConfig {
        level: 3,
        ..TriggerStageConfig::default()
    };
    for stage in 1..TRIGGER_STAGES {
        send_trigger_stage(link, stage, 0, 0, passthrough)?;
    }
    Ok(())
}

/// Configure the device, start a capture and read back the samples
pub fn command_capture<P: Read + Write>(
    link: &mut SumpLink<P>,
    params: &CaptureParams,
) -> Result<SampleBuffer, Error> {
    let window = CaptureWindow::new(params)?;
    let counts = window.command()?;

    log::info!(
        "Capturing {} samples ({} before trigger) from groups 0x{:X}",
        window.samples,
        window.before_trigger,
        params.group_enable
    );

    link.reset()?;
    link.send_command(Command::SetDivider(params.clk_divisor - 1))?;
    configure_triggers(link, params)?;
    link.send_command(counts)?;
    link.send_command(Command::SetFlags(params.flags()))?;
    link.send_command(Command::Run)?;

    let raw = link.read_bytes(window.byte_len(params))?;
    log::debug!("Read {} bytes of sample data", raw.len());

    Ok(SampleBuffer::from_device(&raw, params.num_groups_enabled as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sump_shared::link::mock::MockPort;
    use sump_shared::{CaptureConfig, DeviceCaps, Flags};

    fn link(rx: Vec<u8>) -> SumpLink<MockPort> {
        SumpLink::new(MockPort::new(&rx))
    }

    fn params(config: CaptureConfig, caps: DeviceCaps) -> CaptureParams {
        config.finalize(caps).unwrap()
    }

    fn stage(stage: u8, mask: u32, value: u32, config: TriggerStageConfig) -> Vec<Command> {
        vec![
            Command::SetTriggerMask { stage, mask },
            Command::SetTriggerValue { stage, value },
            Command::SetTriggerConfig { stage, config },
        ]
    }

    #[test]
    fn untriggered_capture_sequence() {
        let params = params(
            CaptureConfig {
                clk_divisor: 11,
                samples: 8,
                group_enable: 0b0011,
                ..CaptureConfig::default()
            },
            DeviceCaps::default(),
        );
        let raw: Vec<u8> = (0..16).collect();
        let mut link = link(raw);

        let samples = command_capture(&mut link, &params).unwrap();

        let mut expected = vec![Command::Reset; 5];
        expected.push(Command::SetDivider(10));
        expected.extend(stage(
            0,
            0,
            0,
            TriggerStageConfig {
                start: true,
                ..TriggerStageConfig::default()
            },
        ));
        expected.push(Command::SetReadDelayCounts {
            read_count: 2,
            delay_count: 1,
        });
        expected.push(Command::SetFlags(Flags {
            group_disable: 0b1100,
            ..Flags::default()
        }));
        expected.push(Command::Run);
        assert_eq!(link.get_ref().sent_commands(), expected);

        assert_eq!(samples.len(), 8);
        assert_eq!(samples.iter().next(), Some(&[14u8, 15][..]));
    }

    #[test]
    fn triggered_capture_configures_all_stages() {
        let params = params(
            CaptureConfig {
                trigger_mask: 0x1,
                trigger_value: 0x1,
                samples: 4,
                before_trig: 0,
                rle: true,
                ..CaptureConfig::default()
            },
            DeviceCaps::default(),
        );
        let mut link = link(vec![0; 16]);

        command_capture(&mut link, &params).unwrap();

        let mut expected = vec![Command::Reset; 5];
        expected.push(Command::SetDivider(0));
        expected.extend(stage(
            0,
            0x1,
            0x1,
            TriggerStageConfig {
                start: true,
                ..TriggerStageConfig::default()
            },
        ));
        for n in 1..4 {
            expected.extend(stage(
                n,
                0,
                0,
                TriggerStageConfig {
                    level: 3,
                    ..TriggerStageConfig::default()
                },
            ));
        }
        expected.push(Command::SetReadDelayCounts {
            read_count: 1,
            delay_count: 1,
        });
        expected.push(Command::SetFlags(Flags {
            rle: true,
            ..Flags::default()
        }));
        expected.push(Command::Run);
        assert_eq!(link.get_ref().sent_commands(), expected);
    }

    #[test]
    fn window_clamps_to_device_memory() {
        let params = params(
            CaptureConfig {
                samples: 10_000,
                before_trig: 20_000,
                ..CaptureConfig::default()
            },
            DeviceCaps {
                sample_memory: 16_384,
                ..DeviceCaps::default()
            },
        );
        let window = CaptureWindow::new(&params).unwrap();
        assert_eq!(
            window,
            CaptureWindow {
                samples: 4096,
                before_trigger: 4096,
            }
        );
        assert_eq!(
            window.command(),
            Ok(Command::SetReadDelayCounts {
                read_count: 1024,
                delay_count: 0,
            })
        );
        assert_eq!(window.byte_len(&params), 16_384);
    }

    #[test]
    fn counts_truncate_toward_zero() {
        let window = CaptureWindow {
            samples: 103,
            before_trigger: 2,
        };
        assert_eq!(
            window.command(),
            Ok(Command::SetReadDelayCounts {
                read_count: 25,
                delay_count: 25,
            })
        );
    }

    #[test]
    fn oversized_capture_is_rejected_before_sending() {
        let params = params(
            CaptureConfig {
                group_enable: 0b1,
                ..CaptureConfig::default()
            },
            DeviceCaps {
                sample_memory: 1 << 20,
                ..DeviceCaps::default()
            },
        );
        let mut link = link(Vec::new());

        let err = command_capture(&mut link, &params).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::SampleCountTooLarge(_))
        ));
        assert!(link.get_ref().tx.is_empty());
    }

    #[test]
    fn short_sample_data_is_a_transport_error() {
        let params = params(
            CaptureConfig {
                samples: 8,
                ..CaptureConfig::default()
            },
            DeviceCaps::default(),
        );
        let mut link = link(vec![0; 5]);
        assert!(matches!(
            command_capture(&mut link, &params),
            Err(Error::Transport(_))
        ));
    }
}
