//! Shared helpers used across the appicon workspace.
//!
//! Nothing in here knows about AppImages. The crate holds the small pieces
//! the config loader and the CLI both need: byte-size parsing, XDG path
//! resolution, and filesystem writes that never leave half-written files.

pub mod bytes;
pub mod error;
pub mod fs;
pub mod path;
