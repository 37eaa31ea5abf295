//! netdeploy library
//!
//! Core modules for the one-shot remote deployment reconciler: inspect a
//! remote host over a shell channel, merge the observed node state with the
//! desired configuration, render deployment artifacts and drive an
//! upload-build-restart sequence.

pub mod channel;
pub mod config;
pub mod deploy;
pub mod errors;
pub mod inspect;
pub mod logs;
pub mod render;
pub mod report;
pub mod status;
