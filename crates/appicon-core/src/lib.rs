//! Icon extraction for type-2 AppImages.
//!
//! The pipeline checks the AppImage marker, finds the squashfs image the
//! runtime ELF carries after its own content, reads `.DirIcon` out of it and
//! confirms the bytes are an image:
//!
//! ```no_run
//! use appicon_core::{get_icon, Settings};
//!
//! if let Some(icon) = get_icon("/opt/Firefox.AppImage", &Settings::default()) {
//!     std::fs::write(format!("firefox.{}", icon.extension()), &icon.data).unwrap();
//! }
//! ```

pub mod backing;
pub mod detect;
pub mod elf;
pub mod endian;
pub mod error;
pub mod extract;
pub mod icon;
pub mod locate;
pub mod settings;
pub mod sniff;
pub mod superblock;
pub mod thumbnail;

pub use detect::is_appimage;
pub use error::{IconError, Result};
pub use icon::{get_icon, inspect, try_get_icon, IconBytes, Inspection};
pub use settings::Settings;
pub use sniff::IconFormat;
pub use thumbnail::{AppImageThumbnailer, Thumbnailer};
