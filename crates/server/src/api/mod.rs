pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod satisfied;
pub mod status;
pub mod webhook;

pub use routes::create_router;
