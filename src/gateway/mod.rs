pub mod constants;
pub mod rtp;
pub mod speak;
pub mod transport;

pub use rtp::{RtpTransport, RtpTransportFactory};
pub use speak::{LoopExit, speak_loop};
pub use transport::{TransportError, TransportFactory, VoiceTransport};
