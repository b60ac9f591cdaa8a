use std::io::{self, Write};

use heapless::Vec as BoundedVec;

use sump_shared::{CaptureParams, ConfigError, SampleBuffer};

use crate::vcdutils::{Timescale, VcdValue, VcdWriter, MAX_VCD_VALUES};

/// Requested output format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// One line of uppercase hex per sample
    Hex,
    /// Sample bytes as captured
    Raw,
    Vcd(BoundedVec<VcdValue, MAX_VCD_VALUES>),
}

/// Output format bound to the parameters of a capture
#[derive(Debug)]
pub enum Renderer {
    Hex,
    Raw,
    Vcd {
        values: BoundedVec<VcdValue, MAX_VCD_VALUES>,
        timescale: Timescale,
    },
}

impl Renderer {
    pub fn new(mode: OutputMode, params: &CaptureParams) -> Result<Self, ConfigError> {
        Ok(match mode {
            OutputMode::Hex => Renderer::Hex,
            OutputMode::Raw => Renderer::Raw,
            OutputMode::Vcd(values) => {
                let timescale = Timescale::infer(params.clk_divisor, params.caps.clk_freq_hz)?;
                log::info!(
                    "Captured at {}Hz, period = {} * {}{}",
                    1.0 / params.sample_period(),
                    timescale.period,
                    timescale.multiplier,
                    timescale.unit
                );
                Renderer::Vcd { values, timescale }
            }
        })
    }

    pub fn render<W: Write>(&self, mut out: W, samples: &SampleBuffer) -> io::Result<()> {
        match self {
            Renderer::Hex => write_hex(&mut out, samples)?,
            Renderer::Raw => write_raw(&mut out, samples)?,
            Renderer::Vcd { values, timescale } => {
                let mut vcd = VcdWriter::new(&mut out, values, timescale)?;
                vcd.write_samples(values, samples, timescale)?;
            }
        }
        out.flush()
    }
}

fn write_raw<W: Write>(out: &mut W, samples: &SampleBuffer) -> io::Result<()> {
    for sample in samples.iter() {
        out.write_all(sample)?;
    }
    Ok(())
}

fn write_hex<W: Write>(out: &mut W, samples: &SampleBuffer) -> io::Result<()> {
    for sample in samples.iter() {
        for byte in sample {
            write!(out, "{:02X}", byte)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcdutils::bounded_values;
    use sump_shared::{CaptureConfig, DeviceCaps};

    fn params() -> CaptureParams {
        let config = CaptureConfig {
            clk_divisor: 11,
            samples: 2,
            ..CaptureConfig::default()
        };
        config.finalize(DeviceCaps::default()).unwrap()
    }

    fn render(mode: OutputMode, samples: &SampleBuffer) -> Vec<u8> {
        let renderer = Renderer::new(mode, &params()).unwrap();
        let mut out = Vec::new();
        renderer.render(&mut out, samples).unwrap();
        out
    }

    #[test]
    fn hex_lines_in_chronological_order() {
        let samples = SampleBuffer::from_device(&[0xAB, 0x0C, 0x01, 0xF2], 2);
        let out = render(OutputMode::Hex, &samples);
        assert_eq!(String::from_utf8(out).unwrap(), "01F2\nAB0C\n");
    }

    #[test]
    fn raw_bytes_in_chronological_order() {
        let samples = SampleBuffer::from_device(&[0xAB, 0x0C, 0x01, 0xF2], 2);
        let out = render(OutputMode::Raw, &samples);
        assert_eq!(out, vec![0x01, 0xF2, 0xAB, 0x0C]);
    }

    #[test]
    fn vcd_uses_capture_timing() {
        let values = bounded_values(vec!["clk=0x1".parse().unwrap()]).unwrap();
        let samples = SampleBuffer::from_device(&[0x00, 0x01], 1);
        let out = String::from_utf8(render(OutputMode::Vcd(values), &samples)).unwrap();
        assert!(out.contains("$scope module top $end\n$var wire 1 ! clk $end\n$upscope $end"));
        assert!(out.ends_with("#0\n1!\n#110\n0!\n"));
    }
}
