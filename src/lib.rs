pub mod api;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod rate;
pub mod registry;
pub mod security;
pub mod server;
pub mod session;
pub mod storage;

pub use error::WarpError;
pub use server::{router, AppState, WarpServer};
