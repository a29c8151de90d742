// src/models/mod.rs

pub mod client;
pub mod event;
pub mod question;
