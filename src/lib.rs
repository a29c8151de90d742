// src/lib.rs

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod reaper;
pub mod registry;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;

pub use routes::create_router;
