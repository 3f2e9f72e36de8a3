//! Line-oriented REPL over the navigation engine.
//!
//! The shell owns the terminal and the subprocess boundary: it reads
//! commands, translates them into engine operations, prints the
//! resulting lines, and runs external viewers on saved response files.
//! Session semantics all live in the engine; nothing here mutates
//! navigation state directly.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use burrow_core::{HistoryPolicy, NavOutcome, NavigationEngine};
use burrow_types::{Item, ItemType, Result, url_to_item_with_default};

use crate::bookmarks;

const PROMPT: &str = "burrow> ";

/// Single-letter and short-form command aliases.
const ABBREVS: &[(&str, &str)] = &[
    ("..", "up"),
    ("/", "search"),
    ("b", "back"),
    ("bm", "bookmarks"),
    ("book", "bookmarks"),
    ("f", "fold"),
    ("g", "go"),
    ("h", "history"),
    ("l", "less"),
    ("li", "links"),
    ("m", "mark"),
    ("n", "next"),
    ("p", "previous"),
    ("prev", "previous"),
    ("q", "quit"),
    ("r", "reload"),
    ("s", "save"),
    ("se", "search"),
    ("t", "tour"),
    ("u", "up"),
    ("v", "veronica"),
];

const HELP: &str = "\
Navigation:
  go <url|mark>     fetch a gopher URL (or jump to a mark letter)
  <number>          visit that entry of the last listing
  up / ..           one menu level up          root      server root menu
  back / b          previous history entry     forward   next history entry
  next / previous   adjacent entry in the current menu
  reload / r        re-fetch the current item
  tour [n|a-b|*]    queue entries; bare `tour` visits the next waypoint
  mark [letter]     set a mark (no argument lists marks); `go <letter>` jumps

Listings (each becomes the new numbered listing; blank line pages it):
  ls                current menu               history / h   visited items
  search <text>     filter the listing         links / li    URLs in the document

Documents:
  cat               print the current document       less / fold   view it paged/wrapped
  ! <cmd>           pipe the document through a shell command
  save [n] [file]   save the current (or n-th) item; never overwrites
  url               print the current item's URL

Other:
  add [name]        bookmark the current item        bookmarks / bm  open bookmarks
  veronica <terms>  search gopherspace (Veronica-2)
  handler [mime cmd]  show or set viewer commands (template needs %s)
  set [key value]   show or change client options
  help              this text                        quit / q        exit";

/// Where Veronica-2 lives.
const VERONICA_HOST: &str = "gopher.floodgap.com";
const VERONICA_SELECTOR: &str = "/v2/vs";

/// What `run_command` tells the REPL loop.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    nav: NavigationEngine,
    bookmark_file: PathBuf,
}

impl Shell {
    pub fn new(nav: NavigationEngine, bookmark_file: PathBuf) -> Self {
        Self { nav, bookmark_file }
    }

    /// The interactive loop. Returns on EOF or `quit`; an interrupted
    /// read (Ctrl-C) abandons the pending line and re-prompts.
    pub fn run(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            print!("{PROMPT}");
            std::io::stdout().flush()?;
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {},
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    println!();
                    continue;
                },
                Err(e) => return Err(e.into()),
            }
            if self.run_command(line.trim_end_matches(['\r', '\n'])) == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Execute one command line. Engine errors are printed, never
    /// propagated: every error returns control to the prompt.
    pub fn run_command(&mut self, line: &str) -> Flow {
        let line = line.trim();

        // Blank line pages the current listing.
        if line.is_empty() {
            let outcome = self.nav.page();
            self.show(outcome);
            return Flow::Continue;
        }
        // Bare number: lookup table reference.
        if line.chars().all(|c| c.is_ascii_digit()) {
            match line.parse::<usize>() {
                Ok(n) => {
                    let outcome = self.nav.visit_index(n);
                    self.show(outcome);
                },
                Err(_) => println!("Index out of range."),
            }
            return Flow::Continue;
        }

        // "/term" works without the space.
        if let Some(term) = line.strip_prefix('/')
            && !term.trim().is_empty()
        {
            let outcome = self.nav.search(term.trim());
            self.show(outcome);
            return Flow::Continue;
        }

        let mut words = line.split_whitespace();
        let word = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        let rest = line[word.len()..].trim();

        match expand_abbrev(word) {
            "go" => self.cmd_go(rest),
            "back" => {
                let outcome = self.nav.back();
                self.show(outcome);
            },
            "forward" => {
                let outcome = self.nav.forward();
                self.show(outcome);
            },
            "up" => {
                let outcome = self.nav.up();
                self.show(outcome);
            },
            "root" => {
                let outcome = self.nav.root();
                self.show(outcome);
            },
            "reload" => {
                let outcome = self.nav.reload();
                self.show(outcome);
            },
            "next" => {
                let outcome = self.nav.next_item();
                self.show(outcome);
            },
            "previous" => {
                let outcome = self.nav.previous_item();
                self.show(outcome);
            },
            "tour" => {
                let outcome = self.nav.tour(&args);
                self.show(outcome);
            },
            "mark" => {
                let outcome = self.nav.mark(rest);
                self.show(outcome);
            },
            "ls" => {
                let outcome = self.nav.ls();
                self.show(outcome);
            },
            "history" => {
                let outcome = self.nav.history_list();
                self.show(outcome);
            },
            "search" => {
                if rest.is_empty() {
                    println!("Search for what?");
                } else {
                    let outcome = self.nav.search(rest);
                    self.show(outcome);
                }
            },
            "links" => {
                let outcome = self.nav.links();
                self.show(outcome);
            },
            "veronica" => self.cmd_veronica(rest),
            "url" => match self.nav.current() {
                Some(item) => println!("{}", item.to_url()),
                None => println!("You need to 'go' somewhere, first."),
            },
            "cat" => self.cmd_cat(),
            "less" => self.cmd_view("less -R %s"),
            "fold" => self.cmd_view("fold -w 70 -s %s"),
            "!" => self.cmd_pipe(rest),
            "save" => self.cmd_save(&args),
            "add" => self.cmd_add(rest),
            "bookmarks" => self.cmd_bookmarks(),
            "handler" => self.cmd_handler(&args),
            "set" => self.cmd_set(&args),
            "help" => println!("{HELP}"),
            "quit" | "exit" => return Flow::Quit,
            unknown => println!("Unknown command '{unknown}'. Try 'help'."),
        }
        Flow::Continue
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    fn cmd_go(&mut self, arg: &str) {
        if arg.is_empty() {
            println!("Go where?");
            return;
        }
        // A single letter is a mark jump before it is a hostname.
        if let Some(marked) = self.nav.find_mark(arg) {
            let outcome = self.nav.goto(marked, None, HistoryPolicy::Record);
            self.show(outcome);
            return;
        }
        // No item type in the URL means let the response payload decide
        // (a bare `go host` root can be a menu or a plain document).
        match url_to_item_with_default(&normalize_url(arg), ItemType::Other('?')) {
            Ok(item) => {
                let outcome = self.nav.goto(item, None, HistoryPolicy::Record);
                self.show(outcome);
            },
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_veronica(&mut self, terms: &str) {
        if terms.is_empty() {
            println!("Search for what?");
            return;
        }
        let veronica = Item::new(
            VERONICA_HOST,
            70,
            VERONICA_SELECTOR,
            ItemType::Search,
            "Veronica-2",
            false,
        );
        let outcome = self.nav.goto(veronica, Some(terms), HistoryPolicy::Record);
        self.show(outcome);
    }

    fn cmd_cat(&mut self) {
        let Some(path) = self.nav.current_file() else {
            println!("You need to 'go' somewhere, first.");
            return;
        };
        match std::fs::read_to_string(path) {
            Ok(contents) => print!("{contents}"),
            Err(e) => println!("Error: {e}"),
        }
    }

    /// Run a fixed viewer template against the current response file.
    fn cmd_view(&mut self, template: &str) {
        let Some(path) = self.nav.current_file().map(Path::to_path_buf) else {
            println!("You need to 'go' somewhere, first.");
            return;
        };
        self.dispatch(template, &path);
    }

    /// Pipe the current response file through an arbitrary shell command.
    fn cmd_pipe(&mut self, command: &str) {
        let Some(path) = self.nav.current_file() else {
            println!("You need to 'go' somewhere, first.");
            return;
        };
        if command.is_empty() {
            println!("Pipe through what?");
            return;
        }
        let piped = format!("{command} < {}", path.display());
        match Command::new("sh").arg("-c").arg(&piped).status() {
            Ok(status) if !status.success() => {
                log::debug!("pipe command exited with {status}");
            },
            Ok(_) => {},
            Err(e) => println!("Error: {e}"),
        }
    }

    /// `save [index] [filename]`: copy the current (or silently peeked)
    /// response file to a named destination, refusing to overwrite.
    fn cmd_save(&mut self, args: &[&str]) {
        let (filename, item) = match args {
            [] => (None, None),
            [n] if n.chars().all(|c| c.is_ascii_digit()) => {
                (None, Some(n.parse::<usize>().unwrap_or(usize::MAX)))
            },
            [name] => (Some(name.to_string()), None),
            [n, name, ..] if n.chars().all(|c| c.is_ascii_digit()) => (
                Some(name.to_string()),
                Some(n.parse::<usize>().unwrap_or(usize::MAX)),
            ),
            [name, ..] => (Some(name.to_string()), None),
        };

        // An index argument means a history-exempt peek first.
        if let Some(n) = item {
            let Some(target) = self.nav.lookup_item(n) else {
                println!("Index {n} out of range.");
                return;
            };
            match self.nav.goto(target, None, HistoryPolicy::Exempt) {
                Ok(NavOutcome::Dispatch { .. }) => {},
                Ok(NavOutcome::Lines(_)) => {
                    println!("Can't save a menu; save one of its items instead.");
                    return;
                },
                Ok(_) => {
                    println!("Nothing to save.");
                    return;
                },
                Err(e) => {
                    println!("Error: {e}");
                    return;
                },
            }
        }

        let Some(source) = self.nav.current_file().map(Path::to_path_buf) else {
            println!("You need to 'go' somewhere, first.");
            return;
        };
        let dest = match filename {
            Some(name) => PathBuf::from(name),
            None => match self.nav.current().map(suggest_filename) {
                Some(name) => PathBuf::from(name),
                None => {
                    println!("You need to 'go' somewhere, first.");
                    return;
                },
            },
        };
        if dest.exists() {
            println!("File {} already exists, not overwriting.", dest.display());
            return;
        }
        match std::fs::copy(&source, &dest) {
            Ok(bytes) => println!("Saved {bytes} bytes to {}.", dest.display()),
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_add(&mut self, name: &str) {
        let Some(current) = self.nav.current().cloned() else {
            println!("You need to 'go' somewhere, first.");
            return;
        };
        match bookmarks::append(&self.bookmark_file, &current, name) {
            Ok(()) => println!("Bookmarked {}.", current.name),
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_bookmarks(&mut self) {
        match bookmarks::read(&self.bookmark_file) {
            Ok(Some(contents)) => {
                let outcome = self.nav.show_menu_text(&contents, false);
                self.show(outcome);
            },
            Ok(None) => println!("No bookmarks yet; add some with 'add'."),
            Err(e) => println!("Error: {e}"),
        }
    }

    fn cmd_handler(&mut self, args: &[&str]) {
        match args {
            [] => {
                for (mime, template) in self.nav.handlers().list() {
                    println!("{mime:<24} {template}");
                }
            },
            [mime] => match self.nav.handlers().get(mime) {
                Some(template) => println!("{template}"),
                None => println!("No handler set for {mime}."),
            },
            [mime, template @ ..] => {
                let template = template.join(" ");
                match self.nav.handlers_mut().set(mime, &template) {
                    Ok(()) => {},
                    Err(e) => println!("Error: {e}"),
                }
            },
        }
    }

    fn cmd_set(&mut self, args: &[&str]) {
        match args {
            [] => {
                for key in burrow_types::OPTION_KEYS {
                    if let Ok(value) = self.nav.options().get(key) {
                        println!("{key:<18} {value}");
                    }
                }
            },
            [key] => match self.nav.options().get(key) {
                Ok(value) => println!("{value}"),
                Err(e) => println!("Error: {e}"),
            },
            [key, value, ..] => {
                if let Err(e) = self.nav.set_option(key, value) {
                    println!("Error: {e}");
                }
            },
        }
    }

    // -----------------------------------------------------------------
    // Outcome handling
    // -----------------------------------------------------------------

    /// Print or act on an engine outcome; errors become prompt messages.
    fn show(&mut self, outcome: Result<NavOutcome>) {
        match outcome {
            Ok(NavOutcome::Lines(lines)) => {
                for line in lines {
                    println!("{line}");
                }
            },
            Ok(NavOutcome::Message(message)) => println!("{message}"),
            Ok(NavOutcome::Dispatch { template, file }) => self.dispatch(&template, &file),
            Ok(NavOutcome::QueryNeeded(item)) => self.prompt_query(item),
            Ok(NavOutcome::Quiet) => {},
            Err(e) => println!("Error: {e}"),
        }
    }

    /// Ask for a search query on the spot and re-fetch with it.
    fn prompt_query(&mut self, item: Item) {
        print!("Query term: ");
        if std::io::stdout().flush().is_err() {
            return;
        }
        let mut term = String::new();
        if std::io::stdin().read_line(&mut term).is_err() {
            println!();
            return;
        }
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        let outcome = self.nav.goto(item, Some(term), HistoryPolicy::Record);
        self.show(outcome);
    }

    /// Substitute the file into the handler template and run it in the
    /// foreground. A missing executable is a prompt message, not an
    /// error.
    fn dispatch(&mut self, template: &str, file: &Path) {
        let Some(argv) = build_argv(template, file) else {
            println!("Bad handler template: {template}");
            return;
        };
        let Some((program, args)) = argv.split_first() else {
            return;
        };
        match Command::new(program).args(args).status() {
            Ok(status) if !status.success() => {
                log::debug!("handler '{program}' exited with {status}");
            },
            Ok(_) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!("Handler '{program}' not found; set another with 'handler'.");
            },
            Err(e) => println!("Error running handler '{program}': {e}"),
        }
    }
}

/// Expand a command abbreviation; unknown words pass through.
fn expand_abbrev(word: &str) -> &str {
    ABBREVS
        .iter()
        .find(|(short, _)| *short == word)
        .map_or(word, |(_, full)| full)
}

/// Bare hostnames become gopher URLs; anything with a scheme is left
/// alone for `url_to_item` to accept or reject.
fn normalize_url(arg: &str) -> String {
    if arg.contains("://") {
        arg.to_string()
    } else {
        format!("gopher://{arg}")
    }
}

/// Split a handler template into an argv with the file substituted for
/// `%s`. `None` when the template does not shell-lex.
fn build_argv(template: &str, file: &Path) -> Option<Vec<String>> {
    let command = template.replace("%s", &file.display().to_string());
    let argv = shlex::split(&command)?;
    if argv.is_empty() { None } else { Some(argv) }
}

/// A filename suggestion for `save` without an explicit name: the last
/// selector segment, else the item name, else a fixed default.
fn suggest_filename(item: &Item) -> String {
    let basename = item
        .path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if !basename.is_empty() {
        return basename.to_string();
    }
    if !item.name.is_empty() {
        return item.name.replace([' ', '/'], "_");
    }
    "gopher.out".to_string()
}
