//! Library crate for portprobe-rs exposing the scanning engine and its collaborators.
pub mod config;
pub mod error;
pub mod observer;
pub mod payloads;
pub mod probe;
pub mod report;
pub mod scanner;
pub mod server;
pub mod services;
pub mod types;
