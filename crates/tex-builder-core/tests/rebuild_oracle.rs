use image::{DynamicImage, Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tex_builder_core::prelude::*;
use tex_builder_core::scan::{asset_key, walk_inputs};

const KEY: &str = "test-key";

struct Fixture {
    tmp: TempDir,
    input: PathBuf,
    manifest: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        let manifest = tmp.path().join("out").join("atlas.json");
        fs::create_dir_all(input.join("sub")).unwrap();
        write_png(&input.join("a.png"), 16, 16);
        write_png(&input.join("sub").join("b.png"), 8, 24);
        Self {
            tmp,
            input,
            manifest,
        }
    }

    fn inputs(&self) -> Vec<PathBuf> {
        vec![self.input.clone()]
    }

    /// Pack the current inputs and write a signed manifest, like a real build does.
    fn build(&self, settings: &Settings, scan: &ScanOptions) -> Manifest {
        let images: Vec<InputImage> = walk_inputs(&self.inputs(), scan.recursive)
            .map(|p| {
                let p = p.unwrap();
                InputImage {
                    key: asset_key(&p),
                    image: image::open(&p).unwrap(),
                }
            })
            .collect();
        let out = pack_images(images, settings, scan, "atlas").unwrap();
        let mut manifest = out.manifest();
        manifest
            .write_signed(&self.manifest, &KeyedDigestAuthenticator::new(KEY))
            .unwrap();
        manifest
    }

    fn oracle(&self) -> RebuildOracle {
        RebuildOracle::load(&self.manifest, &KeyedDigestAuthenticator::new(KEY))
    }
}

fn write_png(path: &Path, w: u32, h: u32) {
    let img = RgbaImage::from_pixel(w, h, Rgba([12, 34, 56, 255]));
    DynamicImage::ImageRgba8(img).save(path).unwrap();
}

fn touch(path: &Path, offset_secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    let when = SystemTime::now() + Duration::from_secs(offset_secs);
    file.set_modified(when).unwrap();
}

#[test]
fn missing_manifest_requires_build() {
    let fx = Fixture::new();
    let oracle = fx.oracle();
    assert!(oracle.record().is_empty());
    assert!(oracle.stored_settings().is_none());
    assert!(oracle.requires_build(&fx.inputs(), &ScanOptions::default()));
}

#[test]
fn unchanged_inputs_skip_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    let oracle = fx.oracle();
    assert!(oracle.is_authentic());
    assert_eq!(oracle.record().len(), 2);
    assert_eq!(oracle.stored_settings(), Some(&Settings::default()));
    assert!(!oracle.requires_build(&fx.inputs(), &scan));
    assert!(!fx.manifest.with_extension("json.tmp").exists());
}

#[test]
fn modified_input_requires_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    touch(&fx.input.join("sub").join("b.png"), 3600);
    assert!(fx.oracle().requires_build(&fx.inputs(), &scan));
}

#[test]
fn deleted_input_requires_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    fs::remove_file(fx.input.join("a.png")).unwrap();
    assert!(fx.oracle().requires_build(&fx.inputs(), &scan));
}

#[test]
fn new_input_requires_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    write_png(&fx.input.join("c.png"), 4, 4);
    assert!(fx.oracle().requires_build(&fx.inputs(), &scan));
}

#[test]
fn non_image_and_hidden_files_are_ignored() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    fs::write(fx.input.join("notes.txt"), "not an image").unwrap();
    fs::create_dir_all(fx.input.join(".cache")).unwrap();
    write_png(&fx.input.join(".cache").join("thumb.png"), 4, 4);
    assert!(!fx.oracle().requires_build(&fx.inputs(), &scan));
}

#[test]
fn tampered_settings_fail_signature_and_force_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    let mut manifest = fx.build(&Settings::default(), &scan);

    // hand-edit the stored settings but keep the old signature
    if let Some(s) = manifest.settings.as_mut() {
        s.padding_width = 9;
        s.allow_rotation = true;
    }
    fs::write(&fx.manifest, serde_json::to_vec_pretty(&manifest).unwrap()).unwrap();

    let oracle = fx.oracle();
    assert!(!oracle.is_authentic());
    assert!(oracle.requires_build(&fx.inputs(), &scan));

    // stored settings are still merged into everything the caller did not force
    let mut settings = Settings::default();
    let forced = ForcedSettings {
        allow_rotation: true,
        ..Default::default()
    };
    oracle.merge_settings(&mut settings, &forced);
    assert_eq!(settings.padding_width, 9);
    assert!(!settings.allow_rotation);
}

#[test]
fn stored_settings_restore_unforced_fields() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    let stored = Settings::builder()
        .with_max_dimensions(512, 256)
        .padding(4, 2)
        .allow_rotation(true)
        .build();
    fx.build(&stored, &scan);

    let mut settings = Settings::builder().with_max_dimensions(1024, 1024).build();
    let forced = ForcedSettings {
        max_size: true,
        ..Default::default()
    };
    fx.oracle().merge_settings(&mut settings, &forced);
    assert_eq!((settings.output_width, settings.output_height), (1024, 1024));
    assert_eq!((settings.padding_width, settings.padding_height), (4, 2));
    assert!(settings.allow_rotation);
}

#[test]
fn signature_from_other_key_is_rejected() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    let oracle = RebuildOracle::load(&fx.manifest, &KeyedDigestAuthenticator::new("other"));
    assert!(!oracle.is_authentic());
    assert!(oracle.requires_build(&fx.inputs(), &scan));
}

#[test]
fn corrupt_manifest_requires_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    fs::write(&fx.manifest, b"{\"version\": \"1\", \"images\": [").unwrap();
    let oracle = fx.oracle();
    assert!(oracle.record().is_empty());
    assert!(oracle.requires_build(&fx.inputs(), &scan));
}

#[test]
fn non_recursive_scan_only_sees_top_level() {
    let fx = Fixture::new();
    let flat = ScanOptions {
        recursive: false,
        ..Default::default()
    };
    fx.build(&Settings::default(), &flat);

    let oracle = fx.oracle();
    assert_eq!(oracle.record().len(), 1);
    assert!(!oracle.requires_build(&fx.inputs(), &flat));
    // a recursive scan finds sub/b.png, which the flat build never recorded
    assert!(oracle.requires_build(&fx.inputs(), &ScanOptions::default()));
}

#[test]
fn names_are_recorded_relative_to_root() {
    let fx = Fixture::new();
    let scan = ScanOptions {
        recursive: true,
        root_dir: Some(fx.input.clone()),
    };
    fx.build(&Settings::default(), &scan);

    let oracle = fx.oracle();
    let names: Vec<&str> = oracle.record().keys().map(String::as_str).collect();
    assert_eq!(names, ["a.png", "sub/b.png"]);
    assert!(!oracle.requires_build(&fx.inputs(), &scan));
}

#[test]
fn rewrite_replaces_previous_manifest() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);
    write_png(&fx.input.join("c.png"), 4, 4);
    assert!(fx.oracle().requires_build(&fx.inputs(), &scan));

    fx.build(&Settings::default(), &scan);
    let oracle = fx.oracle();
    assert_eq!(oracle.record().len(), 3);
    assert!(!oracle.requires_build(&fx.inputs(), &scan));
}

#[test]
fn failed_write_keeps_previous_manifest() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    let previous = fx.build(&Settings::default(), &scan);

    // a directory in the way of the temporary file makes the write fail
    let tmp = fx.manifest.with_extension("json.tmp");
    fs::create_dir_all(&tmp).unwrap();
    write_png(&fx.input.join("c.png"), 4, 4);
    let mut next = previous.clone();
    next.images.clear();
    assert!(next
        .write_signed(&fx.manifest, &KeyedDigestAuthenticator::new(KEY))
        .is_err());

    let on_disk = Manifest::read(&fx.manifest).unwrap();
    assert_eq!(on_disk, previous);
    assert!(on_disk.verify(&KeyedDigestAuthenticator::new(KEY)));
    assert!(tmp.is_dir());
    let oracle = fx.oracle();
    assert!(oracle.is_authentic());
    assert_eq!(oracle.record().len(), 2);
}

#[cfg(unix)]
#[test]
fn dangling_link_in_inputs_requires_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);
    assert!(!fx.oracle().requires_build(&fx.inputs(), &scan));

    std::os::unix::fs::symlink(fx.input.join("gone.png"), fx.input.join("ghost.png")).unwrap();
    assert!(fx.oracle().requires_build(&fx.inputs(), &scan));
}

#[cfg(unix)]
#[test]
fn directory_link_loop_requires_build() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    fx.build(&Settings::default(), &scan);

    std::os::unix::fs::symlink(&fx.input, fx.input.join("sub").join("again")).unwrap();
    assert!(walk_inputs(&fx.inputs(), true).any(|e| e.is_err()));
    assert!(fx.oracle().requires_build(&fx.inputs(), &scan));
}

#[cfg(unix)]
#[test]
fn linked_image_is_packed_like_a_file() {
    let fx = Fixture::new();
    let scan = ScanOptions::default();
    let elsewhere = fx.tmp.path().join("shared.png");
    write_png(&elsewhere, 4, 4);
    std::os::unix::fs::symlink(&elsewhere, fx.input.join("linked.png")).unwrap();

    fx.build(&Settings::default(), &scan);
    let oracle = fx.oracle();
    assert_eq!(oracle.record().len(), 3);
    assert!(!oracle.requires_build(&fx.inputs(), &scan));
}
