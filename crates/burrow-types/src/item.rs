//! The canonical addressable unit in Gopherspace.

/// Item type code from RFC 1436 (plus the common extensions burrow
/// understands). Unknown codes pass through as [`ItemType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// `0` — plain text document.
    Text,
    /// `1` — menu (directory listing).
    Menu,
    /// `7` — search point (index-search server).
    Search,
    /// `8` — telnet session.
    Telnet,
    /// `T` — tn3270 telnet session.
    Telnet3270,
    /// `9` — binary file.
    Binary,
    /// `g` — GIF image.
    Gif,
    /// `I` — image of some other kind.
    Image,
    /// `h` — HTML document.
    Html,
    /// `s` — sound file.
    Sound,
    /// `+` — mirror/redundancy marker (registers a failover candidate).
    Mirror,
    /// Any other code, carried through untouched.
    Other(char),
}

impl ItemType {
    /// Map a single character code to an item type. Total: unknown codes
    /// become [`ItemType::Other`].
    pub fn from_char(c: char) -> Self {
        match c {
            '0' => ItemType::Text,
            '1' => ItemType::Menu,
            '7' => ItemType::Search,
            '8' => ItemType::Telnet,
            'T' => ItemType::Telnet3270,
            '9' => ItemType::Binary,
            'g' => ItemType::Gif,
            'I' => ItemType::Image,
            'h' => ItemType::Html,
            's' => ItemType::Sound,
            '+' => ItemType::Mirror,
            other => ItemType::Other(other),
        }
    }

    /// The wire character for this item type.
    pub fn as_char(self) -> char {
        match self {
            ItemType::Text => '0',
            ItemType::Menu => '1',
            ItemType::Search => '7',
            ItemType::Telnet => '8',
            ItemType::Telnet3270 => 'T',
            ItemType::Binary => '9',
            ItemType::Gif => 'g',
            ItemType::Image => 'I',
            ItemType::Html => 'h',
            ItemType::Sound => 's',
            ItemType::Mirror => '+',
            ItemType::Other(c) => c,
        }
    }

    /// Types whose responses are text and go through the decoder.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ItemType::Text | ItemType::Menu | ItemType::Search | ItemType::Html
        )
    }

    /// Types whose responses parse as tab-delimited menus.
    pub fn is_menu(self) -> bool {
        matches!(self, ItemType::Menu | ItemType::Search)
    }
}

/// An addressable item in Gopherspace.
///
/// Immutable value type: "related" items (parent, retyped copy, mirror
/// substitute) are produced by constructing a new value, never by
/// mutation in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Item {
    /// Server hostname. `None` denotes a local filesystem path.
    pub host: Option<String>,
    /// Server TCP port.
    pub port: u16,
    /// Selector path on the server (or the local path).
    pub path: String,
    /// Item type code.
    pub item_type: ItemType,
    /// Display name.
    pub name: String,
    /// Fetch over TLS (`gophers://`).
    pub tls: bool,
}

/// Default Gopher port.
pub const DEFAULT_PORT: u16 = 70;

impl Item {
    /// Construct a network item.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
        item_type: ItemType,
        name: impl Into<String>,
        tls: bool,
    ) -> Self {
        Self {
            host: Some(host.into()),
            port,
            path: path.into(),
            item_type,
            name: name.into(),
            tls,
        }
    }

    /// Construct an item addressing a local file.
    pub fn local(path: impl Into<String>, item_type: ItemType, name: impl Into<String>) -> Self {
        Self {
            host: None,
            port: 0,
            path: path.into(),
            item_type,
            name: name.into(),
            tls: false,
        }
    }

    /// A copy of this item with a different type code.
    pub fn with_type(&self, item_type: ItemType) -> Self {
        Self {
            item_type,
            ..self.clone()
        }
    }

    /// A copy of this item with the TLS flag forced on.
    pub fn with_tls(&self) -> Self {
        Self {
            tls: true,
            ..self.clone()
        }
    }

    /// The menu one level up: drop a trailing empty segment first, then
    /// the last path segment. Returns `None` when already at the root.
    pub fn parent(&self) -> Option<Item> {
        let trimmed = self.path.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let parent_path = match trimmed.rfind('/') {
            Some(0) => "/".to_string(),
            Some(i) => trimmed[..i].to_string(),
            None => String::new(),
        };
        Some(Self {
            host: self.host.clone(),
            port: self.port,
            path: parent_path,
            item_type: ItemType::Menu,
            name: self.name.clone(),
            tls: self.tls,
        })
    }

    /// The root menu of the server hosting this item.
    pub fn server_root(&self) -> Item {
        let label = match &self.host {
            Some(h) => format!("Root of {h}"),
            None => "Root".to_string(),
        };
        Self {
            host: self.host.clone(),
            port: self.port,
            path: String::new(),
            item_type: ItemType::Menu,
            name: label,
            tls: self.tls,
        }
    }

    /// Render this item as a gopher URL (`gophers://` when TLS).
    pub fn to_url(&self) -> String {
        let Some(host) = &self.host else {
            return format!("file://{}", self.path);
        };
        let scheme = if self.tls { "gophers" } else { "gopher" };
        let host_part = if host.contains(':') {
            // Bare IPv6 address literal needs brackets in a URL.
            format!("[{host}]")
        } else {
            host.clone()
        };
        format!(
            "{scheme}://{host_part}:{}/{}{}",
            self.port,
            self.item_type.as_char(),
            self.path,
        )
    }
}

/// Cheap and cheerful gopher URL detector, used for link extraction from
/// plain text documents.
pub fn looks_like_url(word: &str) -> bool {
    (word.starts_with("gopher://") || word.starts_with("gophers://")) && word.contains('.')
}
