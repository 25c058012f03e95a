use crate::config::{ScanOptions, Settings};
use crate::error::{Result, TexBuilderError};
use crate::manifest::Manifest;
use crate::model::{PackStats, Page};
use crate::packer::{self, PackItem};
use crate::scan::{last_modified_nanos, sub_image_name};
use image::{DynamicImage, RgbaImage};
use std::path::Path;
use tracing::{info, instrument};

/// In-memory image to pack (key + decoded image).
pub struct InputImage {
    pub key: String,
    pub image: DynamicImage,
}

/// Output RGBA page and its logical page record.
pub struct OutputPage {
    pub page: Page,
    pub rgba: RgbaImage,
}

/// Output of a packing run: finished pages and the settings they were built with.
pub struct PackOutput {
    pub settings: Settings,
    pub pages: Vec<OutputPage>,
}

impl PackOutput {
    pub fn stats(&self) -> PackStats {
        let pages: Vec<Page> = self.pages.iter().map(|p| p.page.clone()).collect();
        PackStats::from_pages(&pages)
    }

    /// Manifest for these pages, with timestamps read from each sub-image's source file.
    pub fn manifest(&self) -> Manifest {
        let pages: Vec<Page> = self.pages.iter().map(|p| p.page.clone()).collect();
        Manifest::from_pages(&pages, &self.settings, |key| {
            last_modified_nanos(Path::new(key)).ok()
        })
    }
}

/// File name of page `index` in the group `output_name`.
pub fn page_filename(output_name: &str, index: usize) -> String {
    format!("{output_name}_{index:03}.png")
}

#[instrument(skip_all, fields(output = output_name, inputs = inputs.len()))]
/// Packs `inputs` into power-of-two pages using `settings` and returns the trimmed pages.
///
/// Notes:
/// - Sorting is stable for deterministic results.
/// - Sub-image names are the input keys relative to `scan.root_dir`.
pub fn pack_images(
    inputs: Vec<InputImage>,
    settings: &Settings,
    scan: &ScanOptions,
    output_name: &str,
) -> Result<PackOutput> {
    settings.validate()?;

    if inputs.is_empty() {
        return Err(TexBuilderError::Empty);
    }

    let root = scan.root_dir.as_deref();
    let items: Vec<PackItem> = inputs
        .into_iter()
        .map(|inp| {
            let name = sub_image_name(&inp.key, root);
            PackItem::new(inp.key, name, inp.image.into_rgba8())
        })
        .collect();

    let canvases = packer::pack(items, *settings)?;

    let mut pages = Vec::with_capacity(canvases.len());
    for (id, mut canvas) in canvases.into_iter().enumerate() {
        let (width, height) = canvas.finalize();
        let single_image = canvas.is_single_image();
        let (sub_images, rgba) = canvas.into_parts();
        let filename = page_filename(output_name, id);
        info!(%filename, width, height, sub_images = sub_images.len(), "page ready");
        pages.push(OutputPage {
            page: Page {
                id,
                filename,
                width,
                height,
                single_image,
                sub_images,
            },
            rgba,
        });
    }

    Ok(PackOutput {
        settings: *settings,
        pages,
    })
}
