//! Execution client for a Judge0-compatible engine.

pub mod client;
pub mod mappers;
pub mod models;

pub use client::Judge0Client;
