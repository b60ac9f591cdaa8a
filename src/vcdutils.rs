use std::io::{self, Write};
use std::str::FromStr;

use heapless::Vec as BoundedVec;
use vcd::{self, IdCode, SimulationCommand, TimescaleUnit, Value};

use sump_shared::{ConfigError, SampleBuffer};

use crate::args::parse_number;

pub const MAX_VCD_VALUES: usize = 32;
pub const MAX_VCD_VALUE_BITS: usize = 32;
pub const MAX_VCD_NAME_LEN: usize = 32;

const VERSION: &str = "Sump dumper";

/// A named value made up of one or more sample bits.
///
/// Parsed from `name=mask[,mask...]`. The bits of each mask are taken from
/// most to least significant, masks in the order given, and the resulting
/// list is the msb to lsb order of the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcdValue {
    name: heapless::String<MAX_VCD_NAME_LEN>,
    mask: u32,
    bitmasks: BoundedVec<u32, MAX_VCD_VALUE_BITS>,
}

impl VcdValue {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All sample bits used by the value
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn width(&self) -> u32 {
        self.bitmasks.len() as u32
    }

    fn bit(sample: u32, mask: u32) -> Value {
        if sample & mask != 0 {
            Value::V1
        } else {
            Value::V0
        }
    }

    fn bits(&self, sample: u32) -> Vec<Value> {
        self.bitmasks.iter().map(|&mask| Self::bit(sample, mask)).collect()
    }
}

impl FromStr for VcdValue {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidVcdValue(s.to_string());

        let mut parts = s.splitn(2, '=');
        let name = parts.next().ok_or_else(invalid)?;
        let masks = parts.next().ok_or_else(invalid)?;

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let mut value = VcdValue {
            name: heapless::String::new(),
            mask: 0,
            bitmasks: BoundedVec::new(),
        };
        value.name.push_str(name).map_err(|_| invalid())?;

        for mask in masks.split(',') {
            let mask = parse_number(mask).map_err(|_| invalid())?;
            if mask & value.mask != 0 {
                log::warn!("Overlapping value bits in VCD spec '{}'", s);
            }
            value.mask |= mask;

            for bit in (0..32).rev().map(|n| 1u32 << n) {
                if mask & bit != 0 {
                    value
                        .bitmasks
                        .push(bit)
                        .map_err(|_| ConfigError::TooManyVcdBits(name.to_string()))?;
                }
            }
        }

        if value.bitmasks.is_empty() {
            return Err(invalid());
        }

        Ok(value)
    }
}

/// Collect values into the bounded list the VCD writer takes
pub fn bounded_values(
    values: Vec<VcdValue>,
) -> Result<BoundedVec<VcdValue, MAX_VCD_VALUES>, ConfigError> {
    let mut bounded = BoundedVec::new();
    for value in values {
        bounded
            .push(value)
            .map_err(|_| ConfigError::TooManyVcdValues)?;
    }
    Ok(bounded)
}

const UNITS: [TimescaleUnit; 6] = [
    TimescaleUnit::S,
    TimescaleUnit::MS,
    TimescaleUnit::US,
    TimescaleUnit::NS,
    TimescaleUnit::PS,
    TimescaleUnit::FS,
];

/// Timescale chosen so that one sample period is at least 100 time units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timescale {
    /// 1, 10 or 100
    pub multiplier: u32,
    pub unit: TimescaleUnit,
    /// Sample period in timescale units
    pub period: f64,
    /// Sample period in timescale units is `scaled_divisor / clk_freq_hz`
    scaled_divisor: u128,
    clk_freq_hz: u32,
}

impl Timescale {
    pub fn infer(clk_divisor: u32, clk_freq_hz: u32) -> Result<Self, ConfigError> {
        let out_of_range = || ConfigError::TimescaleOutOfRange {
            divisor: clk_divisor,
            clk_freq_hz,
        };
        if clk_freq_hz == 0 {
            return Err(ConfigError::ZeroClockFrequency);
        }

        // Step by powers of ten until divisor / freq scaled is >= 100
        let divisor = u128::from(clk_divisor);
        let target = 100 * u128::from(clk_freq_hz);
        let mut scale: u128 = 1;
        let mut steps = 0u32;
        while divisor * scale < target {
            scale *= 10;
            steps += 1;
        }

        let tier = (steps + 2) / 3;
        let unit = *UNITS.get(tier as usize).ok_or_else(out_of_range)?;
        let multiplier = 10u32.pow(tier * 3 - steps);
        let scaled_divisor = divisor * scale;
        let period = scaled_divisor as f64 / f64::from(clk_freq_hz);

        Ok(Timescale {
            multiplier,
            unit,
            period,
            scaled_divisor,
            clk_freq_hz,
        })
    }

    /// Timestamp of sample `index` in timescale units
    pub fn timestamp(&self, index: usize) -> u64 {
        (index as u128 * self.scaled_divisor / u128::from(self.clk_freq_hz)) as u64
    }
}

pub struct VcdWriter<W: Write> {
    vcd: vcd::Writer<W>,
    ids: Vec<IdCode>,
}

impl<W: Write> VcdWriter<W> {
    /// Write the header and the initial all zero state of every value
    pub fn new(writer: W, values: &[VcdValue], timescale: &Timescale) -> io::Result<Self> {
        let mut vcd = vcd::Writer::new(writer);

        let date = chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string();
        vcd.date(&date)?;
        vcd.version(VERSION)?;
        vcd.timescale(timescale.multiplier, timescale.unit)?;

        vcd.add_module("top")?;
        let mut ids = Vec::with_capacity(values.len());
        for value in values {
            ids.push(vcd.add_wire(value.width(), value.name())?);
        }
        vcd.upscope()?;
        vcd.enddefinitions()?;

        vcd.begin(SimulationCommand::Dumpvars)?;
        for (value, &id) in values.iter().zip(&ids) {
            write_value(&mut vcd, id, value, 0)?;
        }
        vcd.end()?;

        Ok(VcdWriter { vcd, ids })
    }

    /// Write the changes between consecutive samples. Every value is written
    /// at the last sample so the dump ends with a complete state.
    pub fn write_samples(
        &mut self,
        values: &[VcdValue],
        samples: &SampleBuffer,
        timescale: &Timescale,
    ) -> io::Result<()> {
        let last = samples.len().saturating_sub(1);
        let mut prev = 0u32;

        for (i, cur) in samples.words().enumerate() {
            let changed = prev ^ cur;
            let mut stamped = false;

            for (value, &id) in values.iter().zip(&self.ids) {
                if i == last || changed & value.mask() != 0 {
                    if !stamped {
                        self.vcd.timestamp(timescale.timestamp(i))?;
                        stamped = true;
                    }
                    write_value(&mut self.vcd, id, value, cur)?;
                }
            }

            prev = cur;
        }

        Ok(())
    }
}

fn write_value<W: Write>(
    vcd: &mut vcd::Writer<W>,
    id: IdCode,
    value: &VcdValue,
    sample: u32,
) -> io::Result<()> {
    if value.width() == 1 {
        vcd.change_scalar(id, VcdValue::bit(sample, value.mask()))
    } else {
        vcd.change_vector(id, &value.bits(sample))
    }
}
