use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::protocol::Command;

pub const BAUD_RATE: u32 = 115_200;

/// Number of resets needed to bring the device out of any partial command
pub const RESET_REPEAT: usize = 5;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Duplex byte link to a SUMP device
pub struct SumpLink<P> {
    port: P,
}

impl SumpLink<Box<dyn SerialPort>> {
    /// Open the serial device at `path` in 8N1 mode without flow control
    pub fn connect<Pa: AsRef<Path>>(path: Pa) -> Result<Self, serialport::Error> {
        let path = path.as_ref().to_string_lossy();
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(POLL_TIMEOUT)
            .open()?;

        Ok(SumpLink::new(port))
    }
}

impl<P: Read + Write> SumpLink<P> {
    pub fn new(port: P) -> Self {
        SumpLink { port }
    }

    pub fn send_command(&mut self, cmd: Command) -> io::Result<()> {
        let frame = cmd.encode();
        log::debug!("> {:02X?}", frame.as_bytes());
        self.port.write_all(frame.as_bytes())?;
        self.port.flush()
    }

    pub fn reset(&mut self) -> io::Result<()> {
        for _ in 0..RESET_REPEAT {
            self.send_command(Command::Reset)?;
        }
        Ok(())
    }

    /// Block until exactly `len` bytes have been received
    pub fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0; len];
        let mut offset = 0;

        while offset < len {
            match self.port.read(&mut buf[offset..]) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(readlen) => offset += readlen,
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(buf)
    }

    pub fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(_) => return Ok(byte[0]),
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn get_ref(&self) -> &P {
        &self.port
    }
}

/// In-memory port for exercising the protocol without a device
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::io::{self, Cursor, Read, Write};

    use crate::protocol::Command;

    /// Scripted device: reads come from `rx`, writes are recorded in `tx`
    pub struct MockPort {
        pub rx: Cursor<Vec<u8>>,
        pub tx: Vec<u8>,
    }

    impl MockPort {
        pub fn new(rx: &[u8]) -> Self {
            MockPort {
                rx: Cursor::new(rx.to_vec()),
                tx: Vec::new(),
            }
        }

        pub fn sent_commands(&self) -> Vec<Command> {
            let mut cmds = Vec::new();
            let mut rest = &self.tx[..];
            while !rest.is_empty() {
                let (cmd, len) = Command::decode(rest).expect("undecodable command");
                cmds.push(cmd);
                rest = &rest[len..];
            }
            cmds
        }

        pub fn unread(&self) -> usize {
            self.rx.get_ref().len() - self.rx.position() as usize
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.rx.read(buf)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.tx.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
