//! HTTP surface for the upload forwarder.
//!
//! `POST /api/detect-age` relays a photo to the prediction service behind an
//! origin guard. `GET /api/health` is unguarded.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::{api_router, build_router};
pub use server::{start_server, start_server_on, ApiServer, ServerError, ServerSession};
pub use types::ApiContext;
