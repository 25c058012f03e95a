//! Input enumeration and naming.
//!
//! The rebuild check and the input loader walk the same file set through [`walk_inputs`], so a
//! manifest written after a build always describes exactly what the next check will see.

use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::{DirEntry, WalkDir};

/// Extensions recognised as image assets (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub fn is_image_file(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str())
    )
}

/// Directories whose name starts with `.` are never scanned.
pub fn is_hidden_dir_name(name: &str) -> bool {
    name.starts_with('.')
}

fn is_hidden_dir(e: &DirEntry) -> bool {
    e.file_type().is_dir() && e.file_name().to_str().is_some_and(is_hidden_dir_name)
}

/// Lazily enumerate image files under `inputs`.
///
/// Plain files are yielded as-is when they look like images. Directories are walked in file
/// name order, one level deep unless `recursive`, following symlinks. Inputs that do not exist
/// are skipped; walk errors (dangling links, link loops, unreadable directories) are passed
/// through so callers can decide how to treat them.
pub fn walk_inputs(
    inputs: &[PathBuf],
    recursive: bool,
) -> impl Iterator<Item = walkdir::Result<PathBuf>> + '_ {
    let max_depth = if recursive { usize::MAX } else { 1 };
    inputs
        .iter()
        .filter(|p| p.exists())
        .flat_map(move |input| {
            WalkDir::new(input)
                .follow_links(true)
                .max_depth(max_depth)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e))
                .filter_map(|entry| match entry {
                    Ok(e) if e.file_type().is_file() && is_image_file(e.path()) => {
                        Some(Ok(e.into_path()))
                    }
                    Ok(_) => None,
                    Err(err) => Some(Err(err)),
                })
        })
}

/// Asset key for a path: the path with `/` separators.
pub fn asset_key(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

/// Sub-image name for an asset key: the key with `root` stripped (ASCII case-insensitive).
/// Keys outside the root are returned unchanged.
pub fn sub_image_name(key: &str, root: Option<&Path>) -> String {
    let Some(root) = root else {
        return key.to_string();
    };
    let mut prefix = asset_key(root);
    if prefix.is_empty() {
        return key.to_string();
    }
    if !prefix.ends_with('/') {
        prefix.push('/');
    }
    match key.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(&prefix) => key[prefix.len()..].to_string(),
        _ => key.to_string(),
    }
}

/// Last modification time of `p` in nanoseconds since the Unix epoch.
pub fn last_modified_nanos(p: &Path) -> io::Result<u64> {
    let modified = std::fs::metadata(p)?.modified()?;
    let since = modified.duration_since(UNIX_EPOCH).map_err(io::Error::other)?;
    Ok(since.as_nanos() as u64)
}

/// Immediate non-hidden subdirectories of `dir`, sorted by name.
pub fn visible_subdirectories(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().is_some_and(is_hidden_dir_name) {
            continue;
        }
        out.push(entry.path());
    }
    out.sort();
    Ok(out)
}
