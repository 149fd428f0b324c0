/// Login auto-start via the user's shell startup script (`~/.profile`).
///
/// Making a launch permanent appends the permission command and the daemon
/// command to the script.  Re-applying it is a no-op as long as any existing
/// line already mentions the same device token; the check is plain substring
/// containment, so a token that is a substring of another device's name also
/// counts as present.
///
/// Entries can be removed again with [`forget`].
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{LaunchError, Result};

/// Result of [`persist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// The lines were written to the end of the script.
    Appended,
    /// A line already mentions the token; nothing was written.
    AlreadyPresent,
}

/// Appends `lines` to `script` unless some existing line contains `token`.
/// The script is created if it does not exist.
pub fn persist(script: &Path, token: &str, lines: &[&str]) -> Result<Persisted> {
    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(script)
        .map_err(|source| LaunchError::PermissionDenied {
            path: script.to_path_buf(),
            source,
        })?;

    if contains_token(&file, token)? {
        debug!("{} already mentions {token}", script.display());
        return Ok(Persisted::AlreadyPresent);
    }

    let mut entry = String::new();
    for line in lines {
        entry.push('\n');
        entry.push_str(line);
    }
    entry.push('\n');
    file.write_all(entry.as_bytes())?;
    file.flush()?;

    info!("Added {} line(s) to {}", lines.len(), script.display());
    Ok(Persisted::Appended)
}

/// Removes every line of `script` that contains `token`.
/// Returns how many lines were removed; a missing script counts as zero.
pub fn forget(script: &Path, token: &str) -> Result<usize> {
    let content = match fs::read_to_string(script) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(LaunchError::PermissionDenied {
                path: script.to_path_buf(),
                source,
            })
        }
    };

    let mut removed = 0;
    let mut kept = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        if line.contains(token) {
            removed += 1;
        } else {
            kept.push_str(line);
        }
    }

    if removed > 0 {
        fs::write(script, kept).map_err(|source| LaunchError::PermissionDenied {
            path: script.to_path_buf(),
            source,
        })?;
        info!("Removed {removed} line(s) from {}", script.display());
    }
    Ok(removed)
}

fn contains_token(file: &File, token: &str) -> Result<bool> {
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(false);
        }
        if String::from_utf8_lossy(&buf).contains(token) {
            return Ok(true);
        }
    }
}
