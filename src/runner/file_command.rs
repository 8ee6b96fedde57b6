//! Runner file commands
//!
//! State and outputs are handed to the runner by appending heredoc entries to
//! the files named by `GITHUB_STATE` and `GITHUB_OUTPUT`:
//!
//! ```text
//! name<<ghadelimiter_<uuid>
//! value
//! ghadelimiter_<uuid>
//! ```

use crate::error::{CacheError, CacheResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Append `name=value` to a file command
pub fn issue(path: &Path, name: &str, value: &str) -> CacheResult<()> {
    let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
    let entry = format_entry(name, value, &delimiter)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CacheError::io(format!("opening file command {}", path.display()), e))?;

    file.write_all(entry.as_bytes())
        .map_err(|e| CacheError::io(format!("writing file command {}", path.display()), e))
}

/// Render one heredoc entry
fn format_entry(name: &str, value: &str, delimiter: &str) -> CacheResult<String> {
    for (field, content) in [("name", name), ("value", value)] {
        if content.contains(delimiter) {
            return Err(CacheError::FileCommandDelimiter {
                name: field.to_string(),
                delimiter: delimiter.to_string(),
            });
        }
    }

    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}
