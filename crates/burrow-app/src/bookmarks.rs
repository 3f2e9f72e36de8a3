//! Bookmark file access.
//!
//! Bookmarks are stored as ordinary gopher menu lines in a flat text
//! file, so the file is itself a valid menu: the `bookmarks` command
//! just feeds it back through the menu codec.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use burrow_core::menu;
use burrow_types::{Item, Result};

const BOOKMARK_FILE: &str = ".burrow-bookmarks.txt";

/// Default bookmark file location in the user's home directory.
pub fn default_path() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(BOOKMARK_FILE)
}

/// Append one item to the bookmark file, creating it on first use.
/// `name` overrides the item's display name when non-empty.
pub fn append(path: &Path, item: &Item, name: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(menu::serialize_line(item, name).as_bytes())?;
    Ok(())
}

/// Read the bookmark file; `None` when it does not exist yet.
pub fn read(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(std::fs::read_to_string(path)?))
}
