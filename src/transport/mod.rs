pub mod error;
pub mod http_server;
pub mod middleware;
pub mod routes;

pub use error::{ApiError, ApiResult, WithPath};
pub use http_server::router;
