//! Collision-free save paths.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// A resolved save target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniquePath {
    pub dir: PathBuf,
    pub name: String,
    pub path: PathBuf,
}

/// Picks a file path that does not collide with anything already on disk.
///
/// The session calls this only while holding its creation lock, so two adds
/// never race on the same name.
pub trait PathAllocator: Send + Sync {
    fn unique_path(&self, dir: &Path, name: &str) -> Result<UniquePath>;
}

const FALLBACK_NAME: &str = "download.bin";

/// Makes a server-supplied name safe to use as a single path component.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Trims leading/trailing spaces and dots
/// - Limits length to 255 bytes (Linux NAME_MAX)
/// - Falls back to `download.bin` when nothing is left
pub fn sanitize_file_name(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '\0' || c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == ' ' || c == '.');

    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let out = &trimmed[..take];
    if out.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        out.to_string()
    }
}

/// Splits `name` into stem and extension (with its dot).
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    }
}

/// [`PathAllocator`] backed by the local filesystem.
///
/// Returns `dir/name` when free, otherwise the first free `stem (i).ext`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPathAllocator;

impl PathAllocator for FsPathAllocator {
    fn unique_path(&self, dir: &Path, name: &str) -> Result<UniquePath> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create save dir: {}", dir.display()))?;

        let name = sanitize_file_name(name);
        let (stem, ext) = split_name(&name);
        let mut candidate = name.clone();
        let mut i = 0u32;
        loop {
            let path = dir.join(&candidate);
            let taken = path
                .try_exists()
                .with_context(|| format!("probe path: {}", path.display()))?;
            if !taken {
                return Ok(UniquePath {
                    dir: dir.to_path_buf(),
                    name: candidate,
                    path,
                });
            }
            i = i.checked_add(1).context("no free file name")?;
            candidate = format!("{stem} ({i}){ext}");
        }
    }
}
