pub mod app_state;
pub mod registry;

pub use app_state::{AppState, now_ms};
pub use registry::{DisconnectReason, Session, SessionHandle, SessionInfo, SessionListener, SessionRegistry};
