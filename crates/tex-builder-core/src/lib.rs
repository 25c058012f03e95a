//! Core library for building texture atlases.
//!
//! - Packing: guillotine free-list placement on canvases that start at the first asset's
//!   power-of-two size and double until the configured maximum; oversized assets get a
//!   canvas of their own
//! - Pipeline: `pack_images` takes in-memory images and returns trimmed pages
//! - Incremental builds: a signed `Manifest` records every placement and source timestamp;
//!   `RebuildOracle` compares it against the current inputs
//!
//! Quick example:
//! ```ignore
//! use image::ImageReader;
//! use tex_builder_core::{InputImage, ScanOptions, Settings, pack_images};
//! # fn main() -> anyhow::Result<()> {
//! let img1 = ImageReader::open("a.png")?.decode()?;
//! let img2 = ImageReader::open("b.png")?.decode()?;
//! let inputs = vec![
//!   InputImage { key: "a.png".into(), image: img1 },
//!   InputImage { key: "b.png".into(), image: img2 },
//! ];
//! let settings = Settings::builder().with_max_dimensions(1024, 1024).build();
//! let out = pack_images(inputs, &settings, &ScanOptions::default(), "atlas")?;
//! println!("pages: {}", out.pages.len());
//! # Ok(()) }
//! ```

pub mod canvas;
pub mod compositing;
pub mod config;
pub mod error;
pub mod manifest;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod rebuild;
pub mod scan;
pub mod signing;

pub use canvas::*;
pub use config::*;
pub use error::*;
pub use manifest::*;
pub use model::*;
pub use pipeline::*;
pub use rebuild::*;
pub use signing::*;

/// Convenience prelude for common types and functions.
/// Importing `tex_builder_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::canvas::Canvas;
    pub use crate::config::{ForcedSettings, ScanOptions, Settings, SettingsBuilder};
    pub use crate::manifest::{Manifest, ModificationRecord};
    pub use crate::model::{PackStats, Page, Rect, SubImage};
    pub use crate::packer::{pack, PackItem, Packer};
    pub use crate::rebuild::RebuildOracle;
    pub use crate::signing::{Authenticator, KeyedDigestAuthenticator};
    pub use crate::{pack_images, InputImage, OutputPage, PackOutput};
}
