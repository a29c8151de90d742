// src/handlers/mod.rs

pub mod connection;
pub mod progress;
