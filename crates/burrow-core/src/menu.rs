//! Tab-delimited gopher menu codec.
//!
//! Converts raw menu text into a structured sequence of [`MenuEntry`]
//! variants. Parsing is all-or-nothing at the menu level: a server error
//! line (`3`) aborts immediately, while individually malformed lines are
//! skipped so one bad line cannot invalidate the rest of the menu.

use burrow_types::{BurrowError, Item, ItemType, Result};

/// One line of a parsed menu, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum MenuEntry {
    /// A navigable item. Indexing is 1-based over these entries only.
    Item(Item),
    /// Informational text (`i` lines): rendered, never indexed.
    Info(String),
}

/// A parsed gopher menu.
#[derive(Debug, Clone, Default)]
pub struct Menu {
    /// Entries in the order they appeared on the wire.
    pub entries: Vec<MenuEntry>,
    /// Mirror registrations collected from `+` lines, each against the
    /// most recently parsed navigable item.
    pub mirrors: Vec<(Item, Item)>,
}

impl Menu {
    /// The navigable items, in order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.entries.iter().filter_map(|entry| match entry {
            MenuEntry::Item(item) => Some(item),
            MenuEntry::Info(_) => None,
        })
    }
}

/// Parse one menu line into an [`Item`].
///
/// The line must split into exactly four tab-separated fields
/// (type+name, selector, host, port) after stripping a trailing Gopher+
/// `+` field. The produced item inherits `context_tls` from the menu it
/// came from.
pub fn parse_line(line: &str, context_tls: bool) -> Result<Item> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut fields: Vec<&str> = line.split('\t').collect();

    // Gopher+ servers append a fifth "+" field; skip it gracefully.
    if fields.len() == 5 && fields[4] == "+" {
        fields.pop();
    }
    if fields.len() != 4 {
        return Err(BurrowError::MalformedLine(line.to_string()));
    }

    let mut chars = fields[0].chars();
    let Some(type_char) = chars.next() else {
        return Err(BurrowError::MalformedLine(line.to_string()));
    };
    let name: String = chars.collect();

    let port: u16 = fields[3]
        .trim()
        .parse()
        .map_err(|_| BurrowError::MalformedLine(line.to_string()))?;

    Ok(Item::new(
        fields[2],
        port,
        fields[1],
        ItemType::from_char(type_char),
        name,
        context_tls,
    ))
}

/// Serialize an item back into menu-line format (used for the bookmark
/// file). `display_name` overrides the item's own name when non-empty.
pub fn serialize_line(item: &Item, display_name: &str) -> String {
    let name = if display_name.is_empty() {
        item.name.as_str()
    } else {
        display_name
    };
    format!(
        "{}{}\t{}\t{}\t{}\r\n",
        item.item_type.as_char(),
        name,
        item.path,
        item.host.as_deref().unwrap_or_default(),
        item.port,
    )
}

/// Parse a full menu response.
///
/// Either a complete valid menu is returned or an explicit error, never
/// a truncated menu: a `3` (server error) line aborts with
/// [`BurrowError::ServerReported`] regardless of what follows.
pub fn parse_menu(text: &str, context_tls: bool) -> Result<Menu> {
    let mut menu = Menu::default();
    let mut last_item: Option<Item> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line == "." {
            // Lone dot terminates the menu.
            break;
        }
        if let Some(rest) = line.strip_prefix('3') {
            let message = rest.split('\t').next().unwrap_or_default();
            return Err(BurrowError::ServerReported(message.to_string()));
        }
        if let Some(rest) = line.strip_prefix('i') {
            let text = rest.split('\t').next().unwrap_or_default();
            menu.entries.push(MenuEntry::Info(text.to_string()));
            continue;
        }
        match parse_line(line, context_tls) {
            Ok(item) if item.item_type == ItemType::Mirror => {
                // Redundancy marker: a failover candidate for the item
                // just above it, not a navigable entry.
                if let Some(primary) = &last_item {
                    menu.mirrors.push((primary.clone(), item));
                } else {
                    log::debug!("mirror line with no preceding item, ignoring");
                }
            },
            Ok(item) => {
                last_item = Some(item.clone());
                menu.entries.push(MenuEntry::Item(item));
            },
            Err(e) => {
                // A single bad line must not invalidate the menu.
                log::debug!("skipping menu line: {e}");
            },
        }
    }

    Ok(menu)
}
