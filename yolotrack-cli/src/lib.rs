//! Shared plumbing for the `download-data` and `train-yolo` binaries:
//! command-line parsing and tracing setup.

pub mod args;
pub mod logging;
