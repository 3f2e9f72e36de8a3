//! External handler resolution.
//!
//! Maps a fetched item to the command template that should display it.
//! Resolution never executes anything: the template (with its single
//! `%s` file placeholder) is handed to the caller, which owns the
//! subprocess boundary.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use burrow_types::{BurrowError, Item, ItemType, Result};

/// How many bytes of a file to sniff for magic-number detection.
const SNIFF_LEN: usize = 512;

/// Instance-scoped handler table and MIME resolution.
///
/// The table is owned by the navigation engine that uses it; there is
/// no process-wide mutable handler state.
#[derive(Debug, Clone)]
pub struct HandlerResolver {
    /// MIME type (exact or `type/*` wildcard) to command template.
    handlers: BTreeMap<String, String>,
    /// Template used when nothing in the table matches.
    fallback: String,
}

impl Default for HandlerResolver {
    fn default() -> Self {
        let mut handlers = BTreeMap::new();
        handlers.insert("text/plain".to_string(), "cat %s".to_string());
        handlers.insert("text/html".to_string(), "lynx --dump %s".to_string());
        handlers.insert("image/*".to_string(), "feh %s".to_string());
        handlers.insert("audio/*".to_string(), "mpg123 %s".to_string());
        handlers.insert("application/pdf".to_string(), "xpdf %s".to_string());
        Self {
            handlers,
            fallback: "strings %s".to_string(),
        }
    }
}

impl HandlerResolver {
    /// Resolve the command template for an item. `file` is the already
    /// downloaded response, used only for magic-byte probing when both
    /// the item type and the path extension are inconclusive.
    pub fn resolve(&self, item: &Item, file: Option<&Path>) -> String {
        match self.mime_for(item, file) {
            Some(mime) => self.command_for(&mime),
            None => self.fallback.clone(),
        }
    }

    /// Set (or replace) the handler template for a MIME type or
    /// `type/*` wildcard. The template must carry the `%s` placeholder.
    pub fn set(&mut self, mime: &str, template: &str) -> Result<()> {
        if !mime.contains('/') {
            return Err(BurrowError::Config(format!(
                "not a MIME type or type/* wildcard: {mime}"
            )));
        }
        if !template.contains("%s") {
            return Err(BurrowError::Config(format!(
                "handler template needs a %s file placeholder: {template}"
            )));
        }
        self.handlers.insert(mime.to_string(), template.to_string());
        Ok(())
    }

    /// Look up the template configured for a MIME type, exact key only.
    pub fn get(&self, mime: &str) -> Option<&str> {
        self.handlers.get(mime).map(String::as_str)
    }

    /// All configured handlers, sorted by MIME type.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.handlers
            .iter()
            .map(|(mime, template)| (mime.as_str(), template.as_str()))
    }

    /// Best-effort MIME type for an item.
    fn mime_for(&self, item: &Item, file: Option<&Path>) -> Option<String> {
        // 1. Unambiguous item types map directly.
        match item.item_type {
            ItemType::Text | ItemType::Menu | ItemType::Search => {
                return Some("text/plain".to_string());
            },
            ItemType::Html => return Some("text/html".to_string()),
            ItemType::Gif => return Some("image/gif".to_string()),
            _ => {},
        }

        // 2. Extension-based guess, with the server's broad category
        //    hints (I = image, s = sound) overriding a disagreeing guess.
        let guess = mime_guess::from_path(&item.path)
            .first_raw()
            .map(str::to_string);
        match item.item_type {
            ItemType::Image => {
                return Some(match guess {
                    Some(mime) if mime.starts_with("image/") => mime,
                    _ => "image/jpeg".to_string(),
                });
            },
            ItemType::Sound => {
                return Some(match guess {
                    Some(mime) if mime.starts_with("audio/") => mime,
                    _ => "audio/x-wav".to_string(),
                });
            },
            _ => {},
        }
        if guess.is_some() {
            return guess;
        }

        // 3. Magic bytes of the downloaded file.
        let buf = read_head(file?)?;
        infer::get(&buf).map(|kind| kind.mime_type().to_string())
    }

    /// Match the handler table: exact MIME key first, then `type/*`.
    fn command_for(&self, mime: &str) -> String {
        if let Some(template) = self.handlers.get(mime) {
            return template.clone();
        }
        let category = mime.split('/').next().unwrap_or_default();
        if let Some(template) = self.handlers.get(&format!("{category}/*")) {
            return template.clone();
        }
        self.fallback.clone()
    }
}

/// Read the first [`SNIFF_LEN`] bytes of a file, or `None` on any error.
fn read_head(path: &Path) -> Option<Vec<u8>> {
    let mut file = std::fs::File::open(path).ok()?;
    let mut buf = vec![0u8; SNIFF_LEN];
    let n = file.read(&mut buf).ok()?;
    buf.truncate(n);
    Some(buf)
}
