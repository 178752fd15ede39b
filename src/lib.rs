pub mod config;
pub mod error;
pub mod meter;
pub mod orchestrator;
pub mod payload;
pub mod probe;
pub mod session;

pub use config::{DownloadMode, TestConfig};
pub use error::{EngineError, Result};
pub use orchestrator::SpeedTest;
pub use session::{Speed, TestSession, TestStatus};
