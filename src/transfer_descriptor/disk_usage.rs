use std::fs;
use std::path::Path;

use log::{debug, trace};

/// Sum of the sizes of every file named by `paths` or found beneath them.
///
/// Files count once. Directories are walked recursively without following
/// symlinked directories; symlinked files count with their target's size.
/// Missing paths and entries whose size cannot be read are skipped.
pub fn total_size<P: AsRef<Path>>(paths: &[P]) -> u64 {
    let total = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            match fs::metadata(p) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(meta) if meta.is_dir() => directory_size(p),
                Ok(_) => 0,
                Err(e) => {
                    debug!("Skipping {} in size accounting: {}", p.display(), e);
                    0
                }
            }
        })
        .sum();
    debug!("Expected transfer size: {} bytes", total);
    total
}

fn directory_size(dir: &Path) -> u64 {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut total = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(_) => continue,
        };
        if file_type.is_dir() {
            total += directory_size(&path);
            continue;
        }
        // follows symlinks; broken links and directory links are skipped
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => total += meta.len(),
            Ok(_) => {}
            Err(e) => trace!("Skipping {}: {}", path.display(), e),
        }
    }
    total
}
