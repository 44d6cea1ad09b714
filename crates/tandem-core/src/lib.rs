//! Tandem Core - Real-time deck engine and shared types for the Tandem DJ tools

pub mod audio;
pub mod config;
pub mod controller;
pub mod decode;
pub mod engine;
pub mod music;
pub mod track;
pub mod types;

pub use types::*;
