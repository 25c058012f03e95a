use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::prev_pow2;

/// Packing settings. These are the values persisted in the manifest and restored on
/// later runs unless the caller forces them (see [`ForcedSettings`]).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Horizontal gap kept between a sub-image and its left neighbour.
    pub padding_width: u32,
    /// Vertical gap kept between a sub-image and the neighbour above it.
    pub padding_height: u32,
    /// Maximum canvas width in pixels.
    pub output_width: u32,
    /// Maximum canvas height in pixels.
    pub output_height: u32,
    /// Allow 90° rotation when an asset only fits sideways.
    pub allow_rotation: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            padding_width: 1,
            padding_height: 1,
            output_width: 2048,
            output_height: 2048,
            allow_rotation: false,
        }
    }
}

impl Settings {
    /// Rejects a maximum canvas size of zero on either axis.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::TexBuilderError;

        if self.output_width == 0 || self.output_height == 0 {
            return Err(TexBuilderError::InvalidDimensions {
                width: self.output_width,
                height: self.output_height,
            });
        }
        Ok(())
    }

    /// Largest power-of-two canvas extents allowed by `output_width`/`output_height`.
    /// Canvases grow by doubling, so a non power-of-two maximum is rounded down.
    pub fn max_canvas_size(&self) -> (u32, u32) {
        (prev_pow2(self.output_width), prev_pow2(self.output_height))
    }

    /// Replace every field the caller did not force with the stored value.
    pub fn merge(&mut self, stored: &Settings, forced: &ForcedSettings) {
        if !forced.allow_rotation {
            self.allow_rotation = stored.allow_rotation;
        }
        if !forced.padding {
            self.padding_width = stored.padding_width;
            self.padding_height = stored.padding_height;
        }
        if !forced.max_size {
            self.output_width = stored.output_width;
            self.output_height = stored.output_height;
        }
    }
}

/// Which settings the caller explicitly specified for this run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForcedSettings {
    pub padding: bool,
    pub allow_rotation: bool,
    pub max_size: bool,
}

/// Controls how input paths are enumerated and how files are named.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Descend into subdirectories of input directories.
    pub recursive: bool,
    /// Prefix stripped from asset keys to form sub-image names.
    pub root_dir: Option<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            root_dir: None,
        }
    }
}

/// Builder for `Settings` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SettingsBuilder {
    cfg: Settings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            cfg: Settings::default(),
        }
    }
    pub fn with_max_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.output_width = w;
        self.cfg.output_height = h;
        self
    }
    pub fn padding(mut self, w: u32, h: u32) -> Self {
        self.cfg.padding_width = w;
        self.cfg.padding_height = h;
        self
    }
    pub fn allow_rotation(mut self, v: bool) -> Self {
        self.cfg.allow_rotation = v;
        self
    }
    pub fn build(self) -> Settings {
        self.cfg
    }
}

impl Settings {
    /// Create a fluent builder for `Settings`.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }
}
