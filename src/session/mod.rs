pub mod config;
pub mod registry;
pub mod session;
pub mod stats;

pub use config::{SessionConfig, SessionMode};
pub use registry::{RegistrySettings, SessionRegistry, StartError, StopError};
pub use session::{AssistSession, SessionOptions};
pub use stats::{SessionDiagnostics, SessionInfo};
