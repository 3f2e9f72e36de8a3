//! Navigation engine: the session state machine.
//!
//! Owns everything that outlives a single fetch -- history, the lookup
//! table, the tour queue, marks, the mirror registry, and the current
//! response file -- and orchestrates transport, decoding, and menu
//! parsing per fetch. It never prints and never spawns processes: every
//! operation returns a [`NavOutcome`] for the shell to display or act
//! on, so the subprocess boundary stays outside the engine.

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use burrow_net::Transport;
use burrow_types::{BurrowError, ClientOptions, Item, ItemType, Result, looks_like_url, url_to_item};

use crate::handler::HandlerResolver;
use crate::menu::{self, Menu, MenuEntry};
use crate::mirror::MirrorRegistry;
use crate::text;

/// Whether a successful fetch is recorded in history.
///
/// `Exempt` is used for "up", back/forward replays, reloads, and the
/// silent peek behind `save <index>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPolicy {
    Record,
    Exempt,
}

/// What the shell should do with the result of an operation.
#[derive(Debug, PartialEq)]
pub enum NavOutcome {
    /// Lines to print (menu renderings, listings).
    Lines(Vec<String>),
    /// A one-line notice.
    Message(String),
    /// A document was saved; run the handler template (one `%s` file
    /// placeholder) against the file. Execution is the caller's concern.
    Dispatch { template: String, file: PathBuf },
    /// The item is a search point and needs a query before fetching.
    QueryNeeded(Item),
    /// Nothing to show.
    Quiet,
}

/// The session engine. One instance per process, created at startup and
/// mutated in place by every command; nothing here is persisted.
pub struct NavigationEngine {
    transport: Transport,
    options: ClientOptions,
    handlers: HandlerResolver,
    mirrors: MirrorRegistry,

    current: Option<Item>,
    history: Vec<Item>,
    hist_index: usize,
    menu: Vec<Item>,
    lookup: Vec<Item>,
    page_offset: usize,
    last_index: Option<usize>,
    tour: VecDeque<Item>,
    marks: HashMap<char, Item>,
    /// The single current-response file, exclusively owned; replacing it
    /// deletes the previous one.
    current_file: Option<NamedTempFile>,
}

impl NavigationEngine {
    /// Create an engine with the given options and a default handler
    /// table.
    pub fn new(options: ClientOptions) -> Self {
        Self {
            transport: Transport::from_options(&options),
            options,
            handlers: HandlerResolver::default(),
            mirrors: MirrorRegistry::default(),
            current: None,
            history: Vec::new(),
            hist_index: 0,
            menu: Vec::new(),
            lookup: Vec::new(),
            page_offset: 0,
            last_index: None,
            tour: VecDeque::new(),
            marks: HashMap::new(),
            current_file: None,
        }
    }

    /// Current client options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Set one option, revalidating and reconfiguring the transport.
    pub fn set_option(&mut self, key: &str, value: &str) -> Result<()> {
        self.options.set(key, value)?;
        self.transport.reconfigure(&self.options);
        Ok(())
    }

    /// The handler table (for the shell's `handler` command).
    pub fn handlers(&self) -> &HandlerResolver {
        &self.handlers
    }

    /// Mutable handler table access.
    pub fn handlers_mut(&mut self) -> &mut HandlerResolver {
        &mut self.handlers
    }

    /// The last successfully fetched addressable item.
    pub fn current(&self) -> Option<&Item> {
        self.current.as_ref()
    }

    /// Path of the current response file, if any.
    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_ref().map(NamedTempFile::path)
    }

    /// Entry `n` (1-based) of the lookup table, without visiting it.
    pub fn lookup_item(&self, n: usize) -> Option<Item> {
        n.checked_sub(1).and_then(|i| self.lookup.get(i)).cloned()
    }

    /// The item a mark letter points at.
    pub fn find_mark(&self, key: &str) -> Option<Item> {
        let mut chars = key.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        self.marks.get(&c).cloned()
    }

    // -----------------------------------------------------------------
    // Fetching
    // -----------------------------------------------------------------

    /// Fetch an item: transport, decode, then menu parse or
    /// save-and-resolve-handler depending on the item type.
    pub fn goto(
        &mut self,
        item: Item,
        query: Option<&str>,
        policy: HistoryPolicy,
    ) -> Result<NavOutcome> {
        // Battloid mode: every network fetch is upgraded to TLS.
        let item = if self.options.tls_only && !item.tls && item.host.is_some() {
            item.with_tls()
        } else {
            item
        };

        if item.item_type == ItemType::Search && query.is_none() {
            return Ok(NavOutcome::QueryNeeded(item));
        }

        // Telnet endpoints have no selector protocol to fetch.
        if matches!(item.item_type, ItemType::Telnet | ItemType::Telnet3270)
            && let Some(host) = &item.host
        {
            return Ok(NavOutcome::Message(format!(
                "Telnet session: connect with `telnet {host} {}`.",
                item.port,
            )));
        }

        let (item, raw) = self.fetch_with_failover(&item, query)?;

        // Unknown type (bare `go example.com`): sniff the payload.
        let item = if item.item_type == ItemType::Other('?') {
            item.with_type(sniff_item_type(&raw, &self.options.encoding))
        } else {
            item
        };

        if item.item_type.is_menu() {
            let decoded = text::decode(&raw, &self.options.encoding)?;
            let outcome = self.show_menu_text(&decoded, item.tls)?;
            // Search results render and replace the lookup table but do
            // not become the current item.
            if item.item_type == ItemType::Menu {
                self.finish(item, policy);
            }
            return Ok(outcome);
        }

        // Document: decode first so a decode failure leaves all state
        // (including the previous response file) untouched.
        let body = if item.item_type.is_textual() {
            text::decode(&raw, &self.options.encoding)?.into_bytes()
        } else {
            raw
        };

        // Replacing the owned temp file deletes the previous one.
        self.current_file = None;
        let mut file = NamedTempFile::new()?;
        file.write_all(&body)?;
        file.flush()?;

        let template = self.handlers.resolve(&item, Some(file.path()));
        let path = file.path().to_path_buf();
        self.current_file = Some(file);
        self.finish(item, policy);
        Ok(NavOutcome::Dispatch {
            template,
            file: path,
        })
    }

    /// Re-fetch the current item.
    pub fn reload(&mut self) -> Result<NavOutcome> {
        match self.current.clone() {
            Some(item) => self.goto(item, None, HistoryPolicy::Exempt),
            None => Ok(nowhere()),
        }
    }

    /// Go up one level in the current item's selector path.
    pub fn up(&mut self) -> Result<NavOutcome> {
        let Some(current) = &self.current else {
            return Ok(nowhere());
        };
        match current.parent() {
            Some(parent) => self.goto(parent, None, HistoryPolicy::Exempt),
            None => Ok(NavOutcome::Message("Already at the root.".to_string())),
        }
    }

    /// Go to the root menu of the server hosting the current item.
    pub fn root(&mut self) -> Result<NavOutcome> {
        match self.current.as_ref().map(Item::server_root) {
            Some(root) => self.goto(root, None, HistoryPolicy::Record),
            None => Ok(nowhere()),
        }
    }

    /// Move back one history entry and re-fetch it. Silent no-op at the
    /// start of history.
    pub fn back(&mut self) -> Result<NavOutcome> {
        if self.history.is_empty() || self.hist_index == 0 {
            return Ok(NavOutcome::Quiet);
        }
        let target = self.history[self.hist_index - 1].clone();
        let outcome = self.goto(target, None, HistoryPolicy::Exempt)?;
        // The pointer moves only once the re-fetch succeeded.
        self.hist_index -= 1;
        Ok(outcome)
    }

    /// Move forward one history entry and re-fetch it. Silent no-op at
    /// the end of history.
    pub fn forward(&mut self) -> Result<NavOutcome> {
        if self.hist_index + 1 >= self.history.len() {
            return Ok(NavOutcome::Quiet);
        }
        let target = self.history[self.hist_index + 1].clone();
        let outcome = self.goto(target, None, HistoryPolicy::Exempt)?;
        self.hist_index += 1;
        Ok(outcome)
    }

    /// Visit entry `n` (1-based) of the lookup table. Out-of-range
    /// reports an error and fetches nothing.
    pub fn visit_index(&mut self, n: usize) -> Result<NavOutcome> {
        let Some(item) = n.checked_sub(1).and_then(|i| self.lookup.get(i)).cloned() else {
            return Ok(NavOutcome::Message(format!("Index {n} out of range.")));
        };
        self.last_index = Some(n);
        self.goto(item, None, HistoryPolicy::Record)
    }

    /// Visit the entry after the most recently visited index.
    pub fn next_item(&mut self) -> Result<NavOutcome> {
        match self.last_index {
            Some(n) => self.visit_index(n + 1),
            None => Ok(NavOutcome::Message("No current index.".to_string())),
        }
    }

    /// Visit the entry before the most recently visited index, against
    /// the current menu.
    pub fn previous_item(&mut self) -> Result<NavOutcome> {
        match self.last_index {
            Some(n) if n > 1 => {
                self.lookup.clone_from(&self.menu);
                self.visit_index(n - 1)
            },
            _ => Ok(NavOutcome::Message("No previous item.".to_string())),
        }
    }

    // -----------------------------------------------------------------
    // Tour and marks
    // -----------------------------------------------------------------

    /// Tour queue management. With arguments, queue lookup entries
    /// (indices, inclusive `a-b` ranges, `*` for everything, `ls`,
    /// `clear`); with none, pop and visit the next waypoint.
    pub fn tour(&mut self, args: &[&str]) -> Result<NavOutcome> {
        if args.is_empty() {
            return match self.tour.pop_front() {
                Some(item) => self.goto(item, None, HistoryPolicy::Record),
                None => Ok(NavOutcome::Message("End of tour.".to_string())),
            };
        }

        match args[0] {
            "ls" => {
                let items: Vec<Item> = self.tour.iter().cloned().collect();
                Ok(NavOutcome::Lines(render_items(&items, 0, true, true)))
            },
            "clear" => {
                self.tour.clear();
                Ok(NavOutcome::Message("Tour cleared.".to_string()))
            },
            "*" => {
                self.tour.extend(self.lookup.iter().cloned());
                Ok(NavOutcome::Quiet)
            },
            _ => {
                let mut notes = Vec::new();
                for arg in args {
                    self.tour_queue_arg(arg, &mut notes);
                }
                if notes.is_empty() {
                    Ok(NavOutcome::Quiet)
                } else {
                    Ok(NavOutcome::Lines(notes))
                }
            },
        }
    }

    fn tour_queue_arg(&mut self, arg: &str, notes: &mut Vec<String>) {
        if let Some((lo, hi)) = arg.split_once('-') {
            match (lo.parse::<usize>(), hi.parse::<usize>()) {
                (Ok(lo), Ok(hi)) if lo <= hi => {
                    for n in lo..=hi {
                        self.tour_queue_index(n, notes);
                    }
                },
                _ => notes.push(format!("Invalid range {arg}, skipping.")),
            }
        } else {
            match arg.parse::<usize>() {
                Ok(n) => self.tour_queue_index(n, notes),
                Err(_) => notes.push(format!("Non-numeric index {arg}, skipping.")),
            }
        }
    }

    fn tour_queue_index(&mut self, n: usize, notes: &mut Vec<String>) {
        match n.checked_sub(1).and_then(|i| self.lookup.get(i)) {
            Some(item) => self.tour.push_back(item.clone()),
            None => notes.push(format!("Invalid index {n}, skipping.")),
        }
    }

    /// Set a single-letter mark on the current item, or list all marks
    /// when called with an empty argument. Setting overwrites silently.
    pub fn mark(&mut self, arg: &str) -> Result<NavOutcome> {
        let arg = arg.trim();
        if arg.is_empty() {
            let mut keys: Vec<&char> = self.marks.keys().collect();
            keys.sort_unstable();
            let lines = keys
                .into_iter()
                .map(|k| {
                    let item = &self.marks[k];
                    format!("[{k}] {} ({})", item.name, item.to_url())
                })
                .collect();
            return Ok(NavOutcome::Lines(lines));
        }

        let mut chars = arg.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Ok(invalid_mark());
        };
        if !c.is_ascii_alphabetic() {
            return Ok(invalid_mark());
        }
        let Some(current) = self.current.clone() else {
            return Ok(nowhere());
        };
        self.marks.insert(c, current);
        Ok(NavOutcome::Quiet)
    }

    // -----------------------------------------------------------------
    // Lookup table commands
    // -----------------------------------------------------------------

    /// List the current menu, resetting the lookup table to it.
    pub fn ls(&mut self) -> Result<NavOutcome> {
        self.lookup.clone_from(&self.menu);
        self.reset_lookup_cursor();
        Ok(NavOutcome::Lines(render_items(&self.lookup, 0, true, false)))
    }

    /// List history, making it the lookup table. History itself is not
    /// modified.
    pub fn history_list(&mut self) -> Result<NavOutcome> {
        self.lookup.clone_from(&self.history);
        self.reset_lookup_cursor();
        Ok(NavOutcome::Lines(render_items(&self.lookup, 0, true, true)))
    }

    /// Case-insensitive substring search over the current lookup table.
    /// A hit replaces the lookup table; no hits leave it untouched.
    pub fn search(&mut self, term: &str) -> Result<NavOutcome> {
        let needle = term.to_lowercase();
        let results: Vec<Item> = self
            .lookup
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        if results.is_empty() {
            return Ok(NavOutcome::Message("No results found.".to_string()));
        }
        self.lookup = results;
        self.reset_lookup_cursor();
        Ok(NavOutcome::Lines(render_items(&self.lookup, 0, true, false)))
    }

    /// Extract gopher URLs from the current response file into the
    /// lookup table.
    pub fn links(&mut self) -> Result<NavOutcome> {
        let Some(file) = &self.current_file else {
            return Ok(NavOutcome::Message("No document to scan.".to_string()));
        };
        let contents = std::fs::read_to_string(file.path())?;
        let mut found = Vec::new();
        for word in contents.split_whitespace() {
            if looks_like_url(word)
                && let Ok(item) = url_to_item(word)
            {
                found.push(item);
            }
        }
        if found.is_empty() {
            return Ok(NavOutcome::Message("No links found.".to_string()));
        }
        self.lookup = found;
        self.reset_lookup_cursor();
        Ok(NavOutcome::Lines(render_items(&self.lookup, 0, false, true)))
    }

    /// Blank-line pagination: the next page of the lookup table.
    pub fn page(&mut self) -> Result<NavOutcome> {
        if self.page_offset >= self.lookup.len() {
            return Ok(NavOutcome::Quiet);
        }
        let end = (self.page_offset + self.options.page_size).min(self.lookup.len());
        let lines = render_items(&self.lookup[self.page_offset..end], self.page_offset, true, false);
        self.page_offset = end;
        Ok(NavOutcome::Lines(lines))
    }

    /// Render externally supplied menu text (the bookmark file) and make
    /// it the current menu and lookup table.
    pub fn show_menu_text(&mut self, decoded: &str, context_tls: bool) -> Result<NavOutcome> {
        let parsed = menu::parse_menu(decoded, context_tls)?;
        for (primary, mirror) in &parsed.mirrors {
            self.mirrors.register(primary, mirror);
        }
        let lines = render_menu(&parsed);
        self.menu = parsed.items().cloned().collect();
        self.lookup.clone_from(&self.menu);
        self.reset_lookup_cursor();
        Ok(NavOutcome::Lines(lines))
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Fetch with at most one mirror failover on a transport-class
    /// error. The alternate's own failure surfaces unretried, so the
    /// failover depth is capped at one.
    fn fetch_with_failover(&self, item: &Item, query: Option<&str>) -> Result<(Item, Vec<u8>)> {
        if item.host.is_none() {
            let bytes = std::fs::read(&item.path).map_err(|e| BurrowError::LocalFile {
                path: item.path.clone(),
                source: e,
            })?;
            return Ok((item.clone(), bytes));
        }

        match self.transport.fetch(item, query) {
            Ok(bytes) => Ok((item.clone(), bytes)),
            Err(e) if e.is_transport() => {
                let Some(alternate) = self.mirrors.find_alternate(item) else {
                    return Err(e);
                };
                log::info!(
                    "fetch of {} failed ({e}); trying mirror {}",
                    item.to_url(),
                    alternate.to_url(),
                );
                let bytes = self.transport.fetch(&alternate, query)?;
                Ok((alternate, bytes))
            },
            Err(e) => Err(e),
        }
    }

    /// Commit a successful fetch: set the current item and, when
    /// recording, truncate the forward history segment and append.
    fn finish(&mut self, item: Item, policy: HistoryPolicy) {
        if policy == HistoryPolicy::Record {
            if !self.history.is_empty() {
                self.history.truncate(self.hist_index + 1);
            }
            // Consecutive duplicates collapse into one entry.
            if self.history.last() != Some(&item) {
                self.history.push(item.clone());
            }
            self.hist_index = self.history.len() - 1;
        }
        self.current = Some(item);
    }

    fn reset_lookup_cursor(&mut self) {
        self.page_offset = 0;
    }
}

/// Guess an unknown item's type from its payload: binary when the bytes
/// do not decode, a menu when the head of the text parses as menu
/// lines, a plain document otherwise.
fn sniff_item_type(raw: &[u8], fallback_label: &str) -> ItemType {
    // NUL bytes never appear in gopher text or menus.
    if raw.contains(&0) {
        return ItemType::Binary;
    }
    let Ok(decoded) = text::decode(raw, fallback_label) else {
        return ItemType::Binary;
    };
    let hits = decoded
        .lines()
        .take(10)
        .filter(|line| menu::parse_line(line, false).is_ok())
        .count();
    if hits > 0 { ItemType::Menu } else { ItemType::Text }
}

/// Render a parsed menu: informational lines verbatim, items with their
/// 1-based lookup indices.
fn render_menu(parsed: &Menu) -> Vec<String> {
    let mut lines = Vec::with_capacity(parsed.entries.len());
    let mut n = 0;
    for entry in &parsed.entries {
        match entry {
            MenuEntry::Info(text) => lines.push(text.clone()),
            MenuEntry::Item(item) => {
                n += 1;
                lines.push(format!("[{n}] {}", item.name));
            },
        }
    }
    lines
}

/// Render a slice of items as an indexed listing. `offset` is the
/// zero-based position of the first entry within the lookup table.
fn render_items(items: &[Item], offset: usize, with_name: bool, with_url: bool) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut line = format!("[{}]", offset + i + 1);
            if with_name {
                line.push(' ');
                line.push_str(&item.name);
            }
            if with_url {
                line.push_str(&format!(" ({})", item.to_url()));
            }
            line
        })
        .collect()
}

fn nowhere() -> NavOutcome {
    NavOutcome::Message("You need to 'go' somewhere, first.".to_string())
}

fn invalid_mark() -> NavOutcome {
    NavOutcome::Message("Invalid mark, must be one letter.".to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Routes;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// Bind a loopback listener so its port can be embedded in menu
    /// bodies before the acceptor starts.
    fn bind() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    /// Answer `hits` requests from a selector-to-response table.
    /// Unknown selectors get a type-3 error.
    fn serve_on(listener: TcpListener, pages: &[(&str, &str)], hits: usize) {
        let routes: Routes<String, String> = pages
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        thread::spawn(move || {
            for _ in 0..hits {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let mut reader = BufReader::new(stream);
                let mut request = String::new();
                if reader.read_line(&mut request).is_err() {
                    continue;
                }
                let selector = request
                    .trim_end_matches(['\r', '\n'])
                    .split('\t')
                    .next()
                    .unwrap_or_default();
                let body = routes
                    .get(selector)
                    .cloned()
                    .unwrap_or_else(|| "3no such selector\terr\t(NULL)\t0\r\n".to_string());
                let mut stream = reader.into_inner();
                let _ = stream.write_all(body.as_bytes());
            }
        });
    }

    /// One-step server for tests whose menus never embed the port.
    fn serve(pages: &[(&str, &str)], hits: usize) -> u16 {
        let (listener, port) = bind();
        serve_on(listener, pages, hits);
        port
    }

    fn engine() -> NavigationEngine {
        let mut options = ClientOptions::default();
        options.connect_timeout = 2;
        options.read_timeout = 2;
        NavigationEngine::new(options)
    }

    fn menu_item(port: u16, path: &str) -> Item {
        Item::new("127.0.0.1", port, path, ItemType::Menu, path, false)
    }

    fn text_item(port: u16, path: &str) -> Item {
        Item::new("127.0.0.1", port, path, ItemType::Text, path, false)
    }

    const ROOT_MENU: &str = "iWelcome\tfake\t(NULL)\t0\r\n\
                             1Docs\t/docs\t127.0.0.1\t70\r\n\
                             0Readme\t/readme.txt\t127.0.0.1\t70\r\n\
                             .\r\n";

    #[test]
    fn goto_menu_populates_state() {
        let port = serve(&[("/", ROOT_MENU)], 1);
        let mut nav = engine();
        let outcome = nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();

        let NavOutcome::Lines(lines) = outcome else {
            panic!("expected rendered menu");
        };
        assert_eq!(lines[0], "Welcome");
        assert_eq!(lines[1], "[1] Docs");
        assert_eq!(lines[2], "[2] Readme");

        assert_eq!(nav.current().unwrap().path, "/");
        assert_eq!(nav.lookup.len(), 2);
        assert_eq!(nav.lookup[0].path, "/docs");
        assert_eq!(nav.history.len(), 1);
        assert_eq!(nav.page_offset, 0);
    }

    #[test]
    fn goto_document_dispatches_handler() {
        let port = serve(&[("/readme.txt", "Hello from gopherspace.\r\n")], 1);
        let mut nav = engine();
        let outcome = nav
            .goto(text_item(port, "/readme.txt"), None, HistoryPolicy::Record)
            .unwrap();

        let NavOutcome::Dispatch { template, file } = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(template, "cat %s");
        let saved = std::fs::read_to_string(&file).unwrap();
        assert_eq!(saved, "Hello from gopherspace.\r\n");
        assert_eq!(nav.current().unwrap().path, "/readme.txt");
        assert_eq!(nav.current_file().unwrap(), file);
    }

    #[test]
    fn response_file_is_replaced_per_fetch() {
        let port = serve(&[("/a", "first\r\n"), ("/b", "second\r\n")], 2);
        let mut nav = engine();
        nav.goto(text_item(port, "/a"), None, HistoryPolicy::Record).unwrap();
        let first = nav.current_file().unwrap().to_path_buf();
        nav.goto(text_item(port, "/b"), None, HistoryPolicy::Record).unwrap();
        assert!(!first.exists(), "old response file must be removed");
        let saved = std::fs::read_to_string(nav.current_file().unwrap()).unwrap();
        assert_eq!(saved, "second\r\n");
    }

    #[test]
    fn server_error_line_aborts_fetch() {
        let port = serve(&[], 1);
        let mut nav = engine();
        let err = nav
            .goto(menu_item(port, "/missing"), None, HistoryPolicy::Record)
            .unwrap_err();
        assert!(matches!(err, BurrowError::ServerReported(_)));
        assert!(nav.current().is_none());
        assert!(nav.history.is_empty());
        assert!(nav.lookup.is_empty());
    }

    #[test]
    fn back_and_forward_restore_current() {
        let pages = [
            ("/a", "iPage A\tf\t(NULL)\t0\r\n"),
            ("/b", "iPage B\tf\t(NULL)\t0\r\n"),
            ("/c", "iPage C\tf\t(NULL)\t0\r\n"),
        ];
        let port = serve(&pages, 5);
        let mut nav = engine();
        nav.goto(menu_item(port, "/a"), None, HistoryPolicy::Record).unwrap();
        nav.goto(menu_item(port, "/b"), None, HistoryPolicy::Record).unwrap();
        nav.goto(menu_item(port, "/c"), None, HistoryPolicy::Record).unwrap();

        nav.back().unwrap();
        assert_eq!(nav.current().unwrap().path, "/b");
        nav.forward().unwrap();
        assert_eq!(nav.current().unwrap().path, "/c");
        // History itself was never mutated by the replays.
        assert_eq!(nav.history.len(), 3);
    }

    #[test]
    fn back_forward_noop_at_bounds() {
        let port = serve(&[("/a", "iA\tf\t(NULL)\t0\r\n")], 1);
        let mut nav = engine();
        assert_eq!(nav.back().unwrap(), NavOutcome::Quiet);
        assert_eq!(nav.forward().unwrap(), NavOutcome::Quiet);

        nav.goto(menu_item(port, "/a"), None, HistoryPolicy::Record).unwrap();
        assert_eq!(nav.back().unwrap(), NavOutcome::Quiet);
        assert_eq!(nav.forward().unwrap(), NavOutcome::Quiet);
        assert_eq!(nav.current().unwrap().path, "/a");
    }

    #[test]
    fn new_goto_truncates_forward_segment() {
        let pages = [
            ("/a", "iA\tf\t(NULL)\t0\r\n"),
            ("/b", "iB\tf\t(NULL)\t0\r\n"),
            ("/c", "iC\tf\t(NULL)\t0\r\n"),
        ];
        let port = serve(&pages, 4);
        let mut nav = engine();
        nav.goto(menu_item(port, "/a"), None, HistoryPolicy::Record).unwrap();
        nav.goto(menu_item(port, "/b"), None, HistoryPolicy::Record).unwrap();
        nav.back().unwrap();
        // Branch: /b is discarded from history.
        nav.goto(menu_item(port, "/c"), None, HistoryPolicy::Record).unwrap();

        let paths: Vec<&str> = nav.history.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/c"]);
        assert_eq!(nav.hist_index, 1);
    }

    #[test]
    fn consecutive_duplicate_history_entries_collapse() {
        let port = serve(&[("/a", "iA\tf\t(NULL)\t0\r\n")], 2);
        let mut nav = engine();
        let item = menu_item(port, "/a");
        nav.goto(item.clone(), None, HistoryPolicy::Record).unwrap();
        nav.goto(item, None, HistoryPolicy::Record).unwrap();
        assert_eq!(nav.history.len(), 1);
    }

    #[test]
    fn exempt_fetches_leave_history_alone() {
        let port = serve(&[("/a", "iA\tf\t(NULL)\t0\r\n")], 1);
        let mut nav = engine();
        nav.goto(menu_item(port, "/a"), None, HistoryPolicy::Exempt).unwrap();
        assert!(nav.history.is_empty());
        assert_eq!(nav.current().unwrap().path, "/a");
    }

    #[test]
    fn out_of_range_index_fetches_nothing() {
        let port = serve(&[("/", ROOT_MENU)], 1);
        let mut nav = engine();
        nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();
        let before = nav.current().cloned();

        let outcome = nav.visit_index(99).unwrap();
        assert!(matches!(outcome, NavOutcome::Message(_)));
        assert_eq!(nav.current().cloned(), before);

        let outcome = nav.visit_index(0).unwrap();
        assert!(matches!(outcome, NavOutcome::Message(_)));
    }

    #[test]
    fn search_item_without_query_asks_for_one() {
        let mut nav = engine();
        let item = Item::new("127.0.0.1", 70, "/v2/vs", ItemType::Search, "v", false);
        let outcome = nav.goto(item.clone(), None, HistoryPolicy::Record).unwrap();
        assert_eq!(outcome, NavOutcome::QueryNeeded(item));
        assert!(nav.current().is_none());
    }

    #[test]
    fn search_results_do_not_become_current() {
        let port = serve(
            &[
                ("/", ROOT_MENU),
                ("/v2/vs", "0Hit one\t/hit1\t127.0.0.1\t70\r\n.\r\n"),
            ],
            2,
        );
        let mut nav = engine();
        nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();

        let search = Item::new("127.0.0.1", port, "/v2/vs", ItemType::Search, "v", false);
        let outcome = nav.goto(search, Some("query"), HistoryPolicy::Record).unwrap();
        assert!(matches!(outcome, NavOutcome::Lines(_)));
        // Lookup replaced by results; current item still the root menu.
        assert_eq!(nav.lookup.len(), 1);
        assert_eq!(nav.lookup[0].path, "/hit1");
        assert_eq!(nav.current().unwrap().path, "/");
        assert_eq!(nav.history.len(), 1);
    }

    #[test]
    fn battloid_mode_upgrades_fetches_to_tls() {
        let mut nav = engine();
        nav.set_option("tls_only", "on").unwrap();
        let item = Item::new("127.0.0.1", 70, "/v2/vs", ItemType::Search, "v", false);
        let NavOutcome::QueryNeeded(upgraded) =
            nav.goto(item, None, HistoryPolicy::Record).unwrap()
        else {
            panic!("expected query request");
        };
        assert!(upgraded.tls);
    }

    #[test]
    fn mirror_failover_rescues_transport_failure() {
        let dead = TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let live_port = serve(&[("/m/foo/bar.txt", "rescued\r\n")], 1);
        let mut nav = engine();
        let primary = Item::new("127.0.0.1", dead_port, "/foo", ItemType::Menu, "p", false);
        let mirror = Item::new("127.0.0.1", live_port, "/m/foo", ItemType::Menu, "m", false);
        nav.mirrors.register(&primary, &mirror);

        let failed = Item::new(
            "127.0.0.1",
            dead_port,
            "/foo/bar.txt",
            ItemType::Text,
            "bar",
            false,
        );
        let outcome = nav.goto(failed, None, HistoryPolicy::Record).unwrap();
        let NavOutcome::Dispatch { file, .. } = outcome else {
            panic!("expected dispatch via mirror");
        };
        assert_eq!(std::fs::read_to_string(file).unwrap(), "rescued\r\n");
        // The alternate item is what got recorded.
        let current = nav.current().unwrap();
        assert_eq!(current.port, live_port);
        assert_eq!(current.path, "/m/foo/bar.txt");
    }

    #[test]
    fn failover_without_registered_mirror_surfaces_error() {
        let dead = TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let mut nav = engine();
        let err = nav
            .goto(text_item(dead_port, "/x"), None, HistoryPolicy::Record)
            .unwrap_err();
        assert!(err.is_transport());
        assert!(nav.current().is_none());
    }

    #[test]
    fn local_file_item_reads_filesystem() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"local document\n").unwrap();
        tmp.flush().unwrap();
        let mut nav = engine();
        let item = Item::local(tmp.path().to_string_lossy(), ItemType::Text, "local");
        let outcome = nav.goto(item, None, HistoryPolicy::Record).unwrap();
        let NavOutcome::Dispatch { file, .. } = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(std::fs::read_to_string(file).unwrap(), "local document\n");
    }

    #[test]
    fn missing_local_file_is_local_file_error() {
        let mut nav = engine();
        let item = Item::local("/no/such/file/anywhere", ItemType::Text, "x");
        let err = nav.goto(item, None, HistoryPolicy::Record).unwrap_err();
        assert!(matches!(err, BurrowError::LocalFile { .. }));
    }

    #[test]
    fn up_goes_to_parent_without_recording() {
        let port = serve(
            &[
                ("/docs/deep", "iDeep\tf\t(NULL)\t0\r\n"),
                ("/docs", "iDocs\tf\t(NULL)\t0\r\n"),
            ],
            2,
        );
        let mut nav = engine();
        nav.goto(menu_item(port, "/docs/deep"), None, HistoryPolicy::Record).unwrap();
        nav.up().unwrap();
        assert_eq!(nav.current().unwrap().path, "/docs");
        assert_eq!(nav.history.len(), 1);
    }

    #[test]
    fn lookup_listing_commands_replace_lookup_and_reset_paging() {
        let port = serve(&[("/", ROOT_MENU)], 1);
        let mut nav = engine();
        nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();
        nav.page().unwrap();
        assert_ne!(nav.page_offset, 0);

        nav.ls().unwrap();
        assert_eq!(nav.page_offset, 0);
        assert_eq!(nav.lookup.len(), 2);

        let outcome = nav.history_list().unwrap();
        let NavOutcome::Lines(lines) = outcome else {
            panic!("expected history listing");
        };
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("gopher://"));
        // History listing swaps the lookup table to history entries.
        assert_eq!(nav.lookup[0].path, "/");
    }

    #[test]
    fn search_filters_lookup_case_insensitive() {
        let port = serve(&[("/", ROOT_MENU)], 1);
        let mut nav = engine();
        nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();

        nav.search("README").unwrap();
        assert_eq!(nav.lookup.len(), 1);
        assert_eq!(nav.lookup[0].name, "Readme");

        // No hits: message, lookup untouched.
        let outcome = nav.search("zzz").unwrap();
        assert!(matches!(outcome, NavOutcome::Message(_)));
        assert_eq!(nav.lookup.len(), 1);
        // Current and history untouched by either call.
        assert_eq!(nav.current().unwrap().path, "/");
        assert_eq!(nav.history.len(), 1);
    }

    #[test]
    fn pagination_slices_and_exhausts() {
        let mut nav = engine();
        nav.lookup = (0..25)
            .map(|i| Item::new("h", 70, format!("/{i}"), ItemType::Menu, format!("i{i}"), false))
            .collect();

        let NavOutcome::Lines(first) = nav.page().unwrap() else {
            panic!();
        };
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], "[1] i0");

        let NavOutcome::Lines(second) = nav.page().unwrap() else {
            panic!();
        };
        assert_eq!(second[0], "[11] i10");

        let NavOutcome::Lines(third) = nav.page().unwrap() else {
            panic!();
        };
        assert_eq!(third.len(), 5);
        assert_eq!(third[4], "[25] i24");

        assert_eq!(nav.page().unwrap(), NavOutcome::Quiet);
    }

    #[test]
    fn tour_queues_and_pops_fifo() {
        let (listener, port) = bind();
        let root = format!(
            "0One\t/one.txt\t127.0.0.1\t{port}\r\n\
             0Two\t/two.txt\t127.0.0.1\t{port}\r\n.\r\n",
        );
        serve_on(
            listener,
            &[("/", &root), ("/one.txt", "one\r\n"), ("/two.txt", "two\r\n")],
            3,
        );
        let mut nav = engine();
        nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();

        nav.tour(&["1-2"]).unwrap();
        assert_eq!(nav.tour.len(), 2);

        nav.tour(&[]).unwrap();
        assert_eq!(nav.current().unwrap().path, "/one.txt");
        nav.tour(&[]).unwrap();
        assert_eq!(nav.current().unwrap().path, "/two.txt");

        let outcome = nav.tour(&[]).unwrap();
        assert_eq!(outcome, NavOutcome::Message("End of tour.".to_string()));
    }

    #[test]
    fn tour_star_ls_and_clear() {
        let port = serve(&[("/", ROOT_MENU)], 1);
        let mut nav = engine();
        nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();

        nav.tour(&["*"]).unwrap();
        assert_eq!(nav.tour.len(), 2);

        let NavOutcome::Lines(listing) = nav.tour(&["ls"]).unwrap() else {
            panic!();
        };
        assert_eq!(listing.len(), 2);

        nav.tour(&["clear"]).unwrap();
        assert!(nav.tour.is_empty());
    }

    #[test]
    fn tour_reports_bad_indices() {
        let mut nav = engine();
        let NavOutcome::Lines(notes) = nav.tour(&["7", "x", "3-1"]).unwrap() else {
            panic!();
        };
        assert_eq!(notes.len(), 3);
        assert!(notes[0].contains("Invalid index 7"));
        assert!(notes[1].contains("Non-numeric"));
        assert!(notes[2].contains("Invalid range"));
        assert!(nav.tour.is_empty());
    }

    #[test]
    fn marks_set_list_and_overwrite() {
        let port = serve(&[("/a", "iA\tf\t(NULL)\t0\r\n"), ("/b", "iB\tf\t(NULL)\t0\r\n")], 2);
        let mut nav = engine();

        // No current item yet.
        let outcome = nav.mark("a").unwrap();
        assert!(matches!(outcome, NavOutcome::Message(_)));

        nav.goto(menu_item(port, "/a"), None, HistoryPolicy::Record).unwrap();
        nav.mark("a").unwrap();
        assert_eq!(nav.find_mark("a").unwrap().path, "/a");

        // Overwrites silently.
        nav.goto(menu_item(port, "/b"), None, HistoryPolicy::Record).unwrap();
        nav.mark("a").unwrap();
        assert_eq!(nav.find_mark("a").unwrap().path, "/b");

        let NavOutcome::Lines(listing) = nav.mark("").unwrap() else {
            panic!();
        };
        assert_eq!(listing.len(), 1);
        assert!(listing[0].starts_with("[a] "));

        assert!(matches!(nav.mark("ab").unwrap(), NavOutcome::Message(_)));
        assert!(matches!(nav.mark("7").unwrap(), NavOutcome::Message(_)));
        assert!(nav.find_mark("q").is_none());
    }

    #[test]
    fn links_extracts_gopher_urls() {
        let body = "Check gopher://example.com/1/stuff and also\r\n\
                    gophers://secure.example.org:7443/0/file.txt here\r\n\
                    but not http://www.example.com/\r\n";
        let port = serve(&[("/doc", body)], 1);
        let mut nav = engine();
        nav.goto(text_item(port, "/doc"), None, HistoryPolicy::Record).unwrap();

        let NavOutcome::Lines(listing) = nav.links().unwrap() else {
            panic!();
        };
        assert_eq!(listing.len(), 2);
        assert_eq!(nav.lookup.len(), 2);
        assert_eq!(nav.lookup[0].host.as_deref(), Some("example.com"));
        assert!(nav.lookup[1].tls);
    }

    #[test]
    fn links_without_document_is_a_message() {
        let mut nav = engine();
        assert!(matches!(nav.links().unwrap(), NavOutcome::Message(_)));
    }

    #[test]
    fn next_and_previous_walk_the_lookup() {
        let (listener, port) = bind();
        let root = format!(
            "0One\t/one.txt\t127.0.0.1\t{port}\r\n\
             0Two\t/two.txt\t127.0.0.1\t{port}\r\n.\r\n",
        );
        serve_on(
            listener,
            &[("/", &root), ("/one.txt", "one\r\n"), ("/two.txt", "two\r\n")],
            4,
        );
        let mut nav = engine();

        // No index visited yet.
        assert!(matches!(nav.next_item().unwrap(), NavOutcome::Message(_)));
        assert!(matches!(nav.previous_item().unwrap(), NavOutcome::Message(_)));

        nav.goto(menu_item(port, "/"), None, HistoryPolicy::Record).unwrap();
        nav.visit_index(1).unwrap();
        assert_eq!(nav.current().unwrap().path, "/one.txt");

        nav.next_item().unwrap();
        assert_eq!(nav.current().unwrap().path, "/two.txt");

        nav.previous_item().unwrap();
        assert_eq!(nav.current().unwrap().path, "/one.txt");
    }

    #[test]
    fn unknown_type_text_root_becomes_a_document() {
        // `go host` with no item type in the URL: a prose root must end
        // up saved as a document, not menu-parsed into nothing.
        let port = serve(&[("/", "Just a plain paragraph of prose.\r\nMore prose.\r\n")], 1);
        let mut nav = engine();
        let item = Item::new("127.0.0.1", port, "/", ItemType::Other('?'), "<direct URL>", false);
        let outcome = nav.goto(item, None, HistoryPolicy::Record).unwrap();

        assert!(matches!(outcome, NavOutcome::Dispatch { .. }));
        let saved = std::fs::read_to_string(nav.current_file().unwrap()).unwrap();
        assert!(saved.contains("plain paragraph of prose"));
        assert_eq!(nav.current().unwrap().item_type, ItemType::Text);
        assert_eq!(nav.history.len(), 1);
    }

    #[test]
    fn unknown_type_menu_root_becomes_a_menu() {
        let port = serve(&[("/", ROOT_MENU)], 1);
        let mut nav = engine();
        let item = Item::new("127.0.0.1", port, "/", ItemType::Other('?'), "<direct URL>", false);
        let outcome = nav.goto(item, None, HistoryPolicy::Record).unwrap();

        assert!(matches!(outcome, NavOutcome::Lines(_)));
        assert_eq!(nav.lookup.len(), 2);
        assert_eq!(nav.current().unwrap().item_type, ItemType::Menu);
    }

    #[test]
    fn sniff_detects_menu_text_and_binary() {
        assert_eq!(
            sniff_item_type(b"1Docs\t/docs\thost\t70\r\n", "iso-8859-1"),
            ItemType::Menu,
        );
        assert_eq!(
            sniff_item_type(b"Just a plain paragraph.\r\n", "iso-8859-1"),
            ItemType::Text,
        );
        assert_eq!(
            sniff_item_type(b"\x00\x01\x89PNG rest of a binary blob", "iso-8859-1"),
            ItemType::Binary,
        );
    }
}
