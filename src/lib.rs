//
// lib.rs
// Tag2Dcm-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//

// Compositing pipeline, in stage order.
pub mod loader;
pub mod window;
pub mod labels;
pub mod palette;
pub mod composite;
pub mod encode;
pub mod pipeline;

// Shared types and supporting utilities.
pub mod batch;
pub mod cli;
pub mod config;
pub mod detect;
pub mod dicom_access;
pub mod error;
pub mod explorer;
pub mod models;
pub mod paths;
pub mod raw;
pub mod render;

pub use cli::{run as run_cli, Cli, Commands};
pub use config::Tag2DcmOptions;
pub use error::{Result, Tag2DcmError};
pub use models::OutputArtifactSet;
