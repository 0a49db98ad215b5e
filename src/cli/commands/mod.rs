//! CLI command implementations.

pub mod action;
pub mod circuit;
pub mod document;
pub mod init;
pub mod status;
pub mod step;
