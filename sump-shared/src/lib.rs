pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod samples;
pub mod session;

pub use config::{CaptureConfig, CaptureParams, DeviceCaps};
pub use error::{ConfigError, Error};
pub use link::SumpLink;
pub use protocol::{Command, Flags, TriggerStageConfig};
pub use samples::SampleBuffer;
