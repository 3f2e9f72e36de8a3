//! burrow entry point.
//!
//! Command-line parsing, option loading, rc-file startup commands, and
//! the Ctrl-C guard all happen here; everything interactive is in
//! [`shell`], everything stateful in `burrow-core`.

mod bookmarks;
mod shell;

use anyhow::Result;
use clap::Parser;

use burrow_core::NavigationEngine;
use burrow_types::ClientOptions;

use shell::{Flow, Shell};

/// Options file (TOML, `ClientOptions` keys) in the home directory.
const OPTIONS_FILE: &str = ".burrow.toml";
/// Startup command queue, one shell command per line.
const RC_FILE: &str = ".burrowrc";

#[derive(Parser)]
#[command(name = "burrow", version, about = "An interactive client for Gopherspace")]
struct Args {
    /// Gopher URL to open at startup.
    url: Option<String>,

    /// Open the bookmark list at startup.
    #[arg(short, long)]
    bookmarks: bool,

    /// Battloid mode: upgrade every fetch to TLS.
    #[arg(short, long)]
    tls: bool,

    /// Resolve IPv4 addresses only.
    #[arg(long, conflicts_with = "ipv6")]
    ipv4: bool,

    /// Prefer IPv6 addresses when resolving hosts.
    #[arg(long)]
    ipv6: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut options = load_options()?;
    if args.tls {
        options.tls_only = true;
    }
    if args.ipv4 {
        options.ipv6 = false;
    }
    if args.ipv6 {
        options.ipv6 = true;
    }

    // Ctrl-C must never kill the session; with a handler installed the
    // pending prompt read simply resumes.
    ctrlc::set_handler(|| {})?;

    let nav = NavigationEngine::new(options);
    let mut shell = Shell::new(nav, bookmarks::default_path());

    for command in startup_commands() {
        log::debug!("rc command: {command}");
        if shell.run_command(&command) == Flow::Quit {
            return Ok(());
        }
    }
    if args.bookmarks && shell.run_command("bookmarks") == Flow::Quit {
        return Ok(());
    }
    if let Some(url) = &args.url {
        let line = format!("go {url}");
        if shell.run_command(&line) == Flow::Quit {
            return Ok(());
        }
    } else if !args.bookmarks {
        println!("Welcome to burrow, an interactive gopher client.");
        println!("Type 'help' for a list of commands, or 'go <url>' to get going.");
    }

    shell.run()?;
    Ok(())
}

/// Load client options from `~/.burrow.toml`; absent file means
/// defaults, a malformed file is a startup error.
fn load_options() -> Result<ClientOptions> {
    let Some(home) = dirs::home_dir() else {
        return Ok(ClientOptions::default());
    };
    match std::fs::read_to_string(home.join(OPTIONS_FILE)) {
        Ok(text) => Ok(ClientOptions::from_toml(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientOptions::default()),
        Err(e) => Err(e.into()),
    }
}

/// Commands queued in `~/.burrowrc`, comments and blanks skipped.
fn startup_commands() -> Vec<String> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    match std::fs::read_to_string(home.join(RC_FILE)) {
        Ok(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect(),
        Err(_) => Vec::new(),
    }
}
