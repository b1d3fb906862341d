// src/lib.rs

pub mod camera;
pub mod config;
pub mod error;
pub mod inference;
pub mod landmarks;
pub mod messages;
pub mod pipeline;
pub mod preprocessing;
pub mod recognition;
pub mod server;
pub mod session;
pub mod types;
