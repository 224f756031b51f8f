//! The two one-shot pipelines: dataset download and tracked training.
//!
//! Each takes its collaborators as trait objects and runs strictly in
//! sequence. Configuration is resolved before any collaborator is contacted.

pub mod download;
pub mod train;
