use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::config::Settings;
use crate::error::{Result, TexBuilderError};
use crate::model::Page;
use crate::signing::Authenticator;

/// Schema version written into every manifest.
pub const MANIFEST_VERSION: &str = "1";

/// Sub-image name -> last modification time (nanoseconds since the Unix epoch).
pub type ModificationRecord = BTreeMap<String, u64>;

/// Persisted description of one atlas group: the settings it was built with, every output
/// page and where each sub-image landed. Doubles as the cache record for rebuild checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    /// Signature over the manifest serialized without this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub sub_images: Vec<SubImageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubImageEntry {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub rotated: bool,
    #[serde(default)]
    pub last_modified: u64,
}

impl Manifest {
    /// Build a manifest for finished pages. `last_modified` maps an asset key to the
    /// modification time of its source; `None` records `0`, which later runs ignore.
    pub fn from_pages<F>(pages: &[Page], settings: &Settings, mut last_modified: F) -> Self
    where
        F: FnMut(&str) -> Option<u64>,
    {
        let images = pages
            .iter()
            .map(|page| ImageEntry {
                filename: page.filename.clone(),
                width: page.width,
                height: page.height,
                sub_images: page
                    .sub_images
                    .iter()
                    .map(|s| SubImageEntry {
                        name: s.name.clone(),
                        x: s.rect.x,
                        y: s.rect.y,
                        w: s.rect.w,
                        h: s.rect.h,
                        rotated: s.rotated,
                        last_modified: last_modified(&s.key).unwrap_or(0),
                    })
                    .collect(),
            })
            .collect();
        Self {
            version: MANIFEST_VERSION.into(),
            settings: Some(*settings),
            images,
            signature: None,
        }
    }

    /// Modification times of every sub-image with a name and a non-zero timestamp.
    pub fn modification_record(&self) -> ModificationRecord {
        self.images
            .iter()
            .flat_map(|img| img.sub_images.iter())
            .filter(|s| !s.name.is_empty() && s.last_modified > 0)
            .map(|s| (s.name.clone(), s.last_modified))
            .collect()
    }

    /// Bytes covered by the signature: the manifest without its signature field.
    pub fn signed_payload(&self) -> Result<Vec<u8>> {
        let unsigned = Manifest {
            signature: None,
            ..self.clone()
        };
        Ok(serde_json::to_vec(&unsigned)?)
    }

    pub fn sign(&mut self, auth: &dyn Authenticator) -> Result<()> {
        let payload = self.signed_payload()?;
        self.signature = Some(auth.sign(&payload)?);
        Ok(())
    }

    /// True when a signature is present and matches the rest of the document.
    pub fn verify(&self, auth: &dyn Authenticator) -> bool {
        let Some(sig) = &self.signature else {
            return false;
        };
        match self.signed_payload() {
            Ok(payload) => auth.verify(&payload, sig),
            Err(_) => false,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// Sign and write the manifest. The document goes to a sibling temporary file first and
    /// is renamed over `path`, so a failed write leaves the previous manifest intact.
    pub fn write_signed(&mut self, path: &Path, auth: &dyn Authenticator) -> Result<()> {
        self.sign(auth)
            .map_err(|e| TexBuilderError::Signing(e.to_string()))?;
        let serialized = serde_json::to_vec_pretty(self)?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = tmp_path(path);
        if let Err(e) = fs::write(&tmp, &serialized).and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        trace!(path = %path.display(), "saved manifest");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}
