use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::{ForcedSettings, ScanOptions, Settings};
use crate::manifest::{Manifest, ModificationRecord};
use crate::scan::{asset_key, last_modified_nanos, sub_image_name, walk_inputs};
use crate::signing::Authenticator;

/// Decides whether an atlas group must be rebuilt, based on the manifest of the previous build.
///
/// Every failure mode (missing or malformed manifest, bad signature, unreadable inputs) folds
/// into "rebuild".
#[derive(Debug, Clone, Default)]
pub struct RebuildOracle {
    record: ModificationRecord,
    settings: Option<Settings>,
    authentic: bool,
}

impl RebuildOracle {
    /// Load the manifest at `path`. Anything that cannot be read or parsed yields an empty
    /// oracle, which always asks for a rebuild.
    pub fn load(path: &Path, auth: &dyn Authenticator) -> Self {
        match Manifest::read(path) {
            Ok(manifest) => Self::from_manifest(&manifest, auth),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no usable manifest");
                Self::default()
            }
        }
    }

    pub fn from_manifest(manifest: &Manifest, auth: &dyn Authenticator) -> Self {
        let authentic = manifest.verify(auth);
        if !authentic {
            warn!("manifest signature missing or invalid");
        }
        Self {
            record: manifest.modification_record(),
            settings: manifest.settings,
            authentic,
        }
    }

    pub fn record(&self) -> &ModificationRecord {
        &self.record
    }

    pub fn stored_settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn is_authentic(&self) -> bool {
        self.authentic
    }

    /// True when any input image is new, modified or removed since the recorded build.
    pub fn requires_build(&self, inputs: &[PathBuf], scan: &ScanOptions) -> bool {
        if self.record.is_empty() {
            debug!("no previous build recorded");
            return true;
        }
        if !self.authentic {
            return true;
        }

        let root = scan.root_dir.as_deref();
        let mut examined = 0usize;
        for entry in walk_inputs(inputs, scan.recursive) {
            let path = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "input scan failed; rebuilding");
                    return true;
                }
            };
            let current = match last_modified_nanos(&path) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot read modification time; rebuilding");
                    return true;
                }
            };
            let name = sub_image_name(&asset_key(&path), root);
            match self.record.get(&name) {
                Some(&recorded) if recorded == current => examined += 1,
                Some(_) => {
                    debug!(%name, "modified since last build");
                    return true;
                }
                None => {
                    debug!(%name, "new since last build");
                    return true;
                }
            }
        }

        if examined != self.record.len() {
            debug!(
                examined,
                recorded = self.record.len(),
                "inputs removed since last build"
            );
            return true;
        }
        false
    }

    /// Apply settings stored in the manifest to every field the caller did not force.
    pub fn merge_settings(&self, settings: &mut Settings, forced: &ForcedSettings) {
        if let Some(stored) = &self.settings {
            settings.merge(stored, forced);
        }
    }
}
