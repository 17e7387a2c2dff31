use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use log::warn;

/// Bytes read from the end of a log when building a tail.
pub const TAIL_WINDOW_BYTES: u64 = 256 * 1024;

/// Last `lines` lines of a log file, decoded lossily.
///
/// Only the final [`TAIL_WINDOW_BYTES`] of the file are read, so a line cut
/// by the window start is dropped. A log that does not exist yet reads as
/// empty.
pub fn tail_lines(path: &Path, lines: usize) -> String {
    let bytes = match read_window(path, TAIL_WINDOW_BYTES) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return String::new(),
        Err(e) => {
            warn!("Failed to read log {}: {}", path.display(), e);
            return String::new();
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

fn read_window(path: &Path, window: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len <= window {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        return Ok(bytes);
    }

    // one byte earlier tells whether the window starts on a line boundary
    file.seek(SeekFrom::Start(len - window - 1))?;
    let mut bytes = Vec::new();
    file.take(window + 1).read_to_end(&mut bytes)?;
    let skip = match bytes.iter().position(|&b| b == b'\n') {
        Some(newline) => newline + 1,
        None => bytes.len(),
    };
    Ok(bytes.split_off(skip))
}
