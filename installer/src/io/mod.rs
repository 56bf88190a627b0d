//! Side-effecting collaborators: the platform, media, config, and the filesystem.

pub mod atomic;
pub mod config;
pub mod files;
pub mod media;
pub mod platform;
pub mod store;
