use std::io::{self, BufWriter};
use std::path::PathBuf;
use structopt::StructOpt;

mod args;
mod capture;
mod output;
mod vcdutils;

use sump_shared::{session, CaptureConfig, DeviceCaps, Error, SumpLink};

use crate::args::{parse_frequency, parse_memory_size, parse_number, parse_trigger};
use crate::output::{OutputMode, Renderer};
use crate::vcdutils::{bounded_values, VcdValue};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "sump-dump",
    about = "Capture samples from a SUMP logic analyser",
    after_help = "Default mode is to dump sample data to stdout as hex, one sample per line.\n\
                  Example: sump-dump /dev/ttyUSB1 --trigger 0x1=0x1 --groups 3 --divisor 11 --raw"
)]
struct Opt {
    /// Serial device of the analyser
    #[structopt(parse(from_os_str))]
    tty: PathBuf,
    #[structopt(short, long)]
    debug: bool,
    /// Mask of channel groups to enable, each group is a block of 8 channels (default = all groups)
    #[structopt(long, parse(try_from_str = parse_number), default_value = "0")]
    groups: u32,
    /// Trigger condition <mask>=<value>: capture starts when (channels & mask) == value
    #[structopt(long, parse(try_from_str = parse_trigger))]
    trigger: Option<(u32, u32)>,
    /// Clock divisor to use for capture rate
    #[structopt(long, parse(try_from_str = parse_number), default_value = "1")]
    divisor: u32,
    /// Number of samples to capture (default = max possible)
    #[structopt(long, parse(try_from_str = parse_number), default_value = "0")]
    samples: u32,
    /// Number of samples (out of those captured) to return preceding the trigger
    #[structopt(long, parse(try_from_str = parse_number), default_value = "4")]
    before: u32,
    /// Number of samples (out of those captured) to return after the trigger, takes precedence over --before
    #[structopt(long, parse(try_from_str = parse_number))]
    after: Option<u32>,
    /// Enable RLE sample compression (experimental, samples are not decoded)
    #[structopt(long)]
    rle: bool,
    /// Dump sample data in binary to stdout
    #[structopt(long, conflicts_with = "vcd")]
    raw: bool,
    /// Dump samples in VCD format, adding the named value made of the given bits.
    /// e.g. --vcd clock=0x1 --vcd data=0x6,0x80
    #[structopt(long, number_of_values = 1)]
    vcd: Vec<VcdValue>,
    /// Read device settings from the extended metadata command (0x04)
    #[structopt(long)]
    extmeta: bool,
    /// Bytes of sample memory provided by the device (SI k & M suffixes allowed)
    #[structopt(long, parse(try_from_str = parse_memory_size), default_value = "65536")]
    sample_memory: u32,
    /// Capture clock frequency (SI k & M suffixes allowed)
    #[structopt(long, parse(try_from_str = parse_frequency), default_value = "100M")]
    clk_freq: u32,
    /// Number of probes provided by the device
    #[structopt(long, parse(try_from_str = parse_number), default_value = "32")]
    num_probes: u32,
}

impl Opt {
    fn capture_config(&self) -> CaptureConfig {
        let (trigger_mask, trigger_value) = self.trigger.unwrap_or((0, 0));
        CaptureConfig {
            group_enable: self.groups,
            trigger_mask,
            trigger_value,
            clk_divisor: self.divisor,
            samples: self.samples,
            before_trig: self.before,
            after_trig: self.after,
            rle: self.rle,
            ext_meta: self.extmeta,
            caps: DeviceCaps {
                clk_freq_hz: self.clk_freq,
                sample_memory: self.sample_memory,
                num_probes: self.num_probes,
            },
        }
    }

    fn output_mode(&self) -> Result<OutputMode, Error> {
        if !self.vcd.is_empty() {
            Ok(OutputMode::Vcd(bounded_values(self.vcd.clone())?))
        } else if self.raw {
            Ok(OutputMode::Raw)
        } else {
            Ok(OutputMode::Hex)
        }
    }
}

fn run(opt: &Opt) -> Result<(), Error> {
    let config = opt.capture_config();
    config.validate()?;
    let mode = opt.output_mode()?;

    if config.rle {
        log::warn!("RLE compressed samples are written without decompression");
    }

    let mut link = SumpLink::connect(&opt.tty)?;
    session::identify(&mut link)?;

    let mut caps = config.caps;
    if config.ext_meta {
        session::load_metadata(&mut link, &mut caps)?;
    }

    let params = config.finalize(caps)?;
    log::info!(
        "{} probes, {} bytes sample memory, {}Hz clock, {} of {} groups enabled",
        params.caps.num_probes,
        params.caps.sample_memory,
        params.caps.clk_freq_hz,
        params.num_groups_enabled,
        params.max_groups
    );

    let renderer = Renderer::new(mode, &params)?;
    let samples = capture::command_capture(&mut link, &params)?;

    let stdout = io::stdout();
    renderer.render(BufWriter::new(stdout.lock()), &samples)?;

    Ok(())
}

fn main() {
    let opt = Opt::from_args();

    let loglevel = if opt.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new().filter_level(loglevel).init();

    if let Err(e) = run(&opt) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
