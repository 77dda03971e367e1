pub mod artifact;
pub mod cache;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod source;
