pub mod device;
pub mod remote;
pub mod session;

pub use device::{RecordingObserver, TestDevice};
pub use remote::MemoryRemote;
pub use session::{AuthScript, ScriptedAuth, SharedSession, Toggle};
