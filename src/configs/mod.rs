pub mod base;
pub mod logging;
pub mod player;
pub mod server;
pub mod services;

pub use base::*;
pub use logging::*;
pub use player::*;
pub use server::*;
pub use services::*;
