//! SUMP binary command frames
//!
//! Every command is either a single opcode byte or an opcode followed by a
//! 32-bit little-endian operand.

pub const OP_RESET: u8 = 0x00;
pub const OP_RUN: u8 = 0x01;
pub const OP_IDENTIFY: u8 = 0x02;
pub const OP_GET_METADATA: u8 = 0x04;
pub const OP_SET_DIVIDER: u8 = 0x80;
pub const OP_SET_READ_DELAY_COUNTS: u8 = 0x81;
pub const OP_SET_FLAGS: u8 = 0x82;
pub const OP_SET_TRIGGER_MASK: u8 = 0xC0;
pub const OP_SET_TRIGGER_VALUE: u8 = 0xC1;
pub const OP_SET_TRIGGER_CONFIG: u8 = 0xC2;

/// Number of trigger stages in the device trigger chain
pub const TRIGGER_STAGES: u8 = 4;
/// Largest divider value that fits the 24 bit divider field
pub const MAX_DIVIDER: u32 = 0x00FF_FFFF;

const FLAG_DEMUX: u8 = 0x01;
const FLAG_FILTER: u8 = 0x02;
const FLAG_EXTERNAL: u8 = 0x40;
const FLAG_INVERTED: u8 = 0x80;
const FLAG_RLE: u8 = 0x01;

const TRIGGER_SERIAL: u8 = 0x04;
const TRIGGER_START: u8 = 0x08;

/// An encoded command, ready to be written to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; 5],
    len: usize,
}

impl Frame {
    fn short(opcode: u8) -> Self {
        Frame {
            bytes: [opcode, 0, 0, 0, 0],
            len: 1,
        }
    }

    fn long(opcode: u8, operand: [u8; 4]) -> Self {
        let [b1, b2, b3, b4] = operand;
        Frame {
            bytes: [opcode, b1, b2, b3, b4],
            len: 5,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    /// The little-endian operand, for five byte frames
    pub fn operand(&self) -> Option<u32> {
        if self.len == 5 {
            let [_, b1, b2, b3, b4] = self.bytes;
            Some(u32::from_le_bytes([b1, b2, b3, b4]))
        } else {
            None
        }
    }
}

/// Capture flags sent with [`Command::SetFlags`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// One bit per channel group, set to disable the group. Four bits wide.
    pub group_disable: u8,
    pub demux: bool,
    pub filter: bool,
    pub external: bool,
    pub inverted: bool,
    pub rle: bool,
}

/// Per stage trigger configuration sent with [`Command::SetTriggerConfig`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerStageConfig {
    pub delay: u16,
    /// Trigger level the stage is armed at, 0..=3
    pub level: u8,
    /// Serial mode input channel, 0..=31
    pub channel: u8,
    pub serial: bool,
    /// Start the capture when this stage matches
    pub start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Run,
    Identify,
    GetMetadata,
    /// Divider is the clock divisor minus one, at most 24 bits
    SetDivider(u32),
    /// Both counts are in units of four samples
    SetReadDelayCounts { read_count: u16, delay_count: u16 },
    SetFlags(Flags),
    SetTriggerMask { stage: u8, mask: u32 },
    SetTriggerValue { stage: u8, value: u32 },
    SetTriggerConfig { stage: u8, config: TriggerStageConfig },
}

fn stage_opcode(base: u8, stage: u8) -> u8 {
    assert!(stage < TRIGGER_STAGES, "trigger stage {} out of range", stage);
    base | (stage << 2)
}

impl Command {
    /// Encode the command into its wire frame.
    ///
    /// Panics if an operand is outside the range the frame can carry.
    pub fn encode(&self) -> Frame {
        match *self {
            Command::Reset => Frame::short(OP_RESET),
            Command::Run => Frame::short(OP_RUN),
            Command::Identify => Frame::short(OP_IDENTIFY),
            Command::GetMetadata => Frame::short(OP_GET_METADATA),
            Command::SetDivider(div) => {
                assert!(div <= MAX_DIVIDER, "divider 0x{:X} wider than 24 bits", div);
                Frame::long(OP_SET_DIVIDER, div.to_le_bytes())
            }
            Command::SetReadDelayCounts {
                read_count,
                delay_count,
            } => {
                let [r0, r1] = read_count.to_le_bytes();
                let [d0, d1] = delay_count.to_le_bytes();
                Frame::long(OP_SET_READ_DELAY_COUNTS, [r0, r1, d0, d1])
            }
            Command::SetFlags(flags) => {
                assert!(
                    flags.group_disable <= 0x0F,
                    "group disable mask 0x{:X} wider than 4 bits",
                    flags.group_disable
                );
                let mut b1 = flags.group_disable << 2;
                if flags.demux {
                    b1 |= FLAG_DEMUX;
                }
                if flags.filter {
                    b1 |= FLAG_FILTER;
                }
                if flags.external {
                    b1 |= FLAG_EXTERNAL;
                }
                if flags.inverted {
                    b1 |= FLAG_INVERTED;
                }
                let b2 = if flags.rle { FLAG_RLE } else { 0 };
                Frame::long(OP_SET_FLAGS, [b1, b2, 0, 0])
            }
            Command::SetTriggerMask { stage, mask } => {
                Frame::long(stage_opcode(OP_SET_TRIGGER_MASK, stage), mask.to_le_bytes())
            }
            Command::SetTriggerValue { stage, value } => {
                Frame::long(stage_opcode(OP_SET_TRIGGER_VALUE, stage), value.to_le_bytes())
            }
            Command::SetTriggerConfig { stage, config } => {
                assert!(config.level <= 3, "trigger level {} out of range", config.level);
                assert!(config.channel <= 31, "trigger channel {} out of range", config.channel);
                let [d0, d1] = config.delay.to_le_bytes();
                let b3 = ((config.channel & 0x0F) << 4) | config.level;
                let mut b4 = config.channel >> 4;
                if config.serial {
                    b4 |= TRIGGER_SERIAL;
                }
                if config.start {
                    b4 |= TRIGGER_START;
                }
                Frame::long(stage_opcode(OP_SET_TRIGGER_CONFIG, stage), [d0, d1, b3, b4])
            }
        }
    }

    /// Decode the command at the start of `bytes`.
    ///
    /// Returns the command and the number of bytes it occupied, or `None`
    /// if the bytes do not start with a complete, known command.
    pub fn decode(bytes: &[u8]) -> Option<(Command, usize)> {
        let opcode = *bytes.first()?;

        if opcode & 0x80 == 0 {
            let cmd = match opcode {
                OP_RESET => Command::Reset,
                OP_RUN => Command::Run,
                OP_IDENTIFY => Command::Identify,
                OP_GET_METADATA => Command::GetMetadata,
                _ => return None,
            };
            return Some((cmd, 1));
        }

        let operand = bytes.get(1..5)?;
        let (b1, b2, b3, b4) = (operand[0], operand[1], operand[2], operand[3]);
        let word = u32::from_le_bytes([b1, b2, b3, b4]);

        let cmd = match opcode {
            OP_SET_DIVIDER => Command::SetDivider(word & MAX_DIVIDER),
            OP_SET_READ_DELAY_COUNTS => Command::SetReadDelayCounts {
                read_count: u16::from_le_bytes([b1, b2]),
                delay_count: u16::from_le_bytes([b3, b4]),
            },
            OP_SET_FLAGS => Command::SetFlags(Flags {
                group_disable: (b1 >> 2) & 0x0F,
                demux: b1 & FLAG_DEMUX != 0,
                filter: b1 & FLAG_FILTER != 0,
                external: b1 & FLAG_EXTERNAL != 0,
                inverted: b1 & FLAG_INVERTED != 0,
                rle: b2 & FLAG_RLE != 0,
            }),
            op if op & 0xF0 == 0xC0 => {
                let stage = (op >> 2) & 0x03;
                match op & 0x03 {
                    0 => Command::SetTriggerMask { stage, mask: word },
                    1 => Command::SetTriggerValue { stage, value: word },
                    2 => Command::SetTriggerConfig {
                        stage,
                        config: TriggerStageConfig {
                            delay: u16::from_le_bytes([b1, b2]),
                            level: b3 & 0x0F,
                            channel: (b3 >> 4) | ((b4 & 0x01) << 4),
                            serial: b4 & TRIGGER_SERIAL != 0,
                            start: b4 & TRIGGER_START != 0,
                        },
                    },
                    _ => return None,
                }
            }
            _ => return None,
        };

        Some((cmd, 5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_commands() {
        assert_eq!(Command::Reset.encode().as_bytes(), &[0x00]);
        assert_eq!(Command::Run.encode().as_bytes(), &[0x01]);
        assert_eq!(Command::Identify.encode().as_bytes(), &[0x02]);
        assert_eq!(Command::GetMetadata.encode().as_bytes(), &[0x04]);
        assert_eq!(Command::Reset.encode().operand(), None);
    }

    #[test]
    fn divider_uses_low_three_bytes() {
        let frame = Command::SetDivider(0x12_3456).encode();
        assert_eq!(frame.as_bytes(), &[0x80, 0x56, 0x34, 0x12, 0x00]);
        assert_eq!(frame.operand(), Some(0x12_3456));
    }

    #[test]
    #[should_panic]
    fn divider_wider_than_24_bits_panics() {
        Command::SetDivider(0x0100_0000).encode();
    }

    #[test]
    fn read_delay_counts_layout() {
        let frame = Command::SetReadDelayCounts {
            read_count: 0x1234,
            delay_count: 0xABCD,
        }
        .encode();
        assert_eq!(frame.as_bytes(), &[0x81, 0x34, 0x12, 0xCD, 0xAB]);
    }

    #[test]
    fn flags_layout() {
        let frame = Command::SetFlags(Flags {
            group_disable: 0b1010,
            demux: true,
            filter: false,
            external: true,
            inverted: true,
            rle: true,
        })
        .encode();
        assert_eq!(frame.as_bytes(), &[0x82, 0x28 | 0x01 | 0x40 | 0x80, 0x01, 0, 0]);

        let frame = Command::SetFlags(Flags::default()).encode();
        assert_eq!(frame.as_bytes(), &[0x82, 0, 0, 0, 0]);
    }

    #[test]
    #[should_panic]
    fn flags_group_disable_wider_than_4_bits_panics() {
        Command::SetFlags(Flags {
            group_disable: 0x10,
            ..Flags::default()
        })
        .encode();
    }

    #[test]
    fn trigger_mask_and_value_for_every_stage() {
        for stage in 0..TRIGGER_STAGES {
            let mask = 0xDEAD_BEEF ^ u32::from(stage);
            let frame = Command::SetTriggerMask { stage, mask }.encode();
            assert_eq!(frame.opcode(), 0xC0 | (stage << 2));
            assert_eq!(frame.operand(), Some(mask));

            let frame = Command::SetTriggerValue { stage, value: mask }.encode();
            assert_eq!(frame.opcode(), 0xC1 | (stage << 2));
            assert_eq!(frame.operand(), Some(mask));
        }
    }

    #[test]
    #[should_panic]
    fn trigger_stage_out_of_range_panics() {
        Command::SetTriggerMask { stage: 4, mask: 0 }.encode();
    }

    #[test]
    fn trigger_config_layout() {
        let frame = Command::SetTriggerConfig {
            stage: 2,
            config: TriggerStageConfig {
                delay: 0x0102,
                level: 3,
                channel: 0x1A,
                serial: true,
                start: true,
            },
        }
        .encode();
        assert_eq!(frame.as_bytes(), &[0xCA, 0x02, 0x01, 0xA3, 0x01 | 0x04 | 0x08]);

        let frame = Command::SetTriggerConfig {
            stage: 0,
            config: TriggerStageConfig {
                start: true,
                ..TriggerStageConfig::default()
            },
        }
        .encode();
        assert_eq!(frame.as_bytes(), &[0xC2, 0, 0, 0, 0x08]);
    }

    #[test]
    fn decode_recovers_operands() {
        let commands = [
            Command::Reset,
            Command::GetMetadata,
            Command::SetDivider(10),
            Command::SetReadDelayCounts {
                read_count: 4096,
                delay_count: 4095,
            },
            Command::SetFlags(Flags {
                group_disable: 0b0110,
                rle: true,
                ..Flags::default()
            }),
            Command::SetTriggerMask {
                stage: 3,
                mask: 0x8000_0001,
            },
            Command::SetTriggerValue {
                stage: 1,
                value: 0x55,
            },
            Command::SetTriggerConfig {
                stage: 1,
                config: TriggerStageConfig {
                    delay: 7,
                    level: 3,
                    channel: 17,
                    serial: false,
                    start: false,
                },
            },
        ];

        for cmd in commands.iter() {
            let frame = cmd.encode();
            let (decoded, len) = Command::decode(frame.as_bytes()).unwrap();
            assert_eq!(decoded, *cmd);
            assert_eq!(len, frame.as_bytes().len());
        }
    }

    #[test]
    fn decode_rejects_incomplete_or_unknown() {
        assert_eq!(Command::decode(&[]), None);
        assert_eq!(Command::decode(&[0x80, 0x01]), None);
        assert_eq!(Command::decode(&[0x7F]), None);
        assert_eq!(Command::decode(&[0xC3, 0, 0, 0, 0]), None);
    }
}
