//! Device identification and extended metadata

use std::fmt;
use std::io::{Read, Write};

use crate::config::DeviceCaps;
use crate::error::Error;
use crate::link::SumpLink;
use crate::protocol::Command;

/// Reply to the identify command
pub const IDENT: &[u8; 4] = b"1ALS";

/// Longest metadata string kept, including its terminator
pub const MAX_METADATA_STRING: usize = 256;

/// Reset the device and check that it identifies as a SUMP analyser
pub fn identify<P: Read + Write>(link: &mut SumpLink<P>) -> Result<(), Error> {
    link.reset()?;
    link.send_command(Command::Identify)?;

    let reply = link.read_bytes(IDENT.len())?;
    if reply.as_slice() != IDENT {
        return Err(Error::UnrecognizedDevice(
            String::from_utf8_lossy(&reply).into_owned(),
        ));
    }

    log::info!("Sump device found OK");
    Ok(())
}

/// One tagged entry of the extended metadata block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEntry {
    Str { id: u8, value: String },
    U32 { id: u8, value: u32 },
    U8 { id: u8, value: u8 },
}

impl MetadataEntry {
    pub fn id(&self) -> u8 {
        match *self {
            MetadataEntry::Str { id, .. } => id,
            MetadataEntry::U32 { id, .. } => id,
            MetadataEntry::U8 { id, .. } => id,
        }
    }

    /// Human readable name of the field, for the fields the SUMP protocol defines
    pub fn field_name(&self) -> Option<&'static str> {
        let name = match (self, self.id()) {
            (MetadataEntry::Str { .. }, 1) => "device name",
            (MetadataEntry::Str { .. }, 2) => "firmware version",
            (MetadataEntry::Str { .. }, 3) => "ancillary version",
            (MetadataEntry::U32 { .. }, 0) => "number of probes",
            (MetadataEntry::U32 { .. }, 1) => "sample memory",
            (MetadataEntry::U32 { .. }, 2) => "dynamic memory",
            (MetadataEntry::U32 { .. }, 3) => "maximum sample rate",
            (MetadataEntry::U32 { .. }, 4) => "protocol version",
            (MetadataEntry::U8 { .. }, 0) => "number of probes",
            (MetadataEntry::U8 { .. }, 1) => "protocol version",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for MetadataEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataEntry::Str { id, value } => write!(f, "str[{}] = \"{}\"", id, value)?,
            MetadataEntry::U32 { id, value } => write!(f, "u32[{}] = 0x{:08X}", id, value)?,
            MetadataEntry::U8 { id, value } => write!(f, "u8[{}] = 0x{:02X}", id, value)?,
        }
        if let Some(name) = self.field_name() {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

/// Streaming decoder over the device's metadata reply.
///
/// Yields entries until the terminating zero tag. An unknown entry kind is
/// yielded once as [`Error::UnexpectedMetadataKind`] and ends the stream, as
/// does any transport error.
pub struct MetadataReader<'a, P> {
    link: &'a mut SumpLink<P>,
    done: bool,
}

/// Request the extended metadata block from the device
pub fn read_extended_metadata<P: Read + Write>(
    link: &mut SumpLink<P>,
) -> Result<MetadataReader<'_, P>, Error> {
    link.send_command(Command::GetMetadata)?;
    Ok(MetadataReader { link, done: false })
}

impl<'a, P: Read + Write> MetadataReader<'a, P> {
    fn read_string(&mut self) -> Result<String, Error> {
        let mut buf = Vec::with_capacity(MAX_METADATA_STRING);
        loop {
            let byte = self.link.read_byte()?;
            if byte == 0 {
                break;
            }
            buf.push(byte);
            if buf.len() == MAX_METADATA_STRING - 1 {
                // Keep the stream framed by draining up to the terminator
                let mut dropped = 0usize;
                while self.link.read_byte()? != 0 {
                    dropped += 1;
                }
                if dropped > 0 {
                    log::warn!("Truncating excessively long extended metadata string");
                }
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn read_entry(&mut self) -> Result<Option<MetadataEntry>, Error> {
        let tag = self.link.read_byte()?;
        if tag == 0 {
            return Ok(None);
        }

        let id = tag & 0x1F;
        let entry = match tag >> 5 {
            0 => MetadataEntry::Str {
                id,
                value: self.read_string()?,
            },
            1 => {
                let bytes = self.link.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                MetadataEntry::U32 { id, value }
            }
            2 => MetadataEntry::U8 {
                id,
                value: self.link.read_byte()?,
            },
            kind => return Err(Error::UnexpectedMetadataKind { kind, tag }),
        };

        Ok(Some(entry))
    }
}

impl<'a, P: Read + Write> Iterator for MetadataReader<'a, P> {
    type Item = Result<MetadataEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read the extended metadata and fold the capability fields into `caps`.
///
/// An unexpected entry kind stops decoding with a warning; fields not yet
/// seen keep their configured values.
pub fn load_metadata<P: Read + Write>(
    link: &mut SumpLink<P>,
    caps: &mut DeviceCaps,
) -> Result<(), Error> {
    for entry in read_extended_metadata(link)? {
        match entry {
            Ok(entry) => {
                log::info!("{}", entry);
                if caps.apply(&entry) {
                    log::debug!("Device capabilities now {:?}", caps);
                }
            }
            Err(e @ Error::UnexpectedMetadataKind { .. }) => {
                log::warn!("{}", e);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
