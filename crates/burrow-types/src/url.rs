//! Gopher URL parsing (simplified RFC 4266).
//!
//! Hand-rolled: the two gopher schemes plus the item-type-in-path
//! convention are all we need, and bracketed IPv6 literals have to be
//! handled before the generic `host:port` split anyway.

use crate::error::{BurrowError, Result};
use crate::item::{DEFAULT_PORT, Item, ItemType};

/// Parse a `gopher://` or `gophers://` URL into an [`Item`].
///
/// Per the gopher URL convention, the path's second character is the
/// item type and the remainder the selector; a path of `/` or empty
/// implies a menu at the root selector.
pub fn url_to_item(url: &str) -> Result<Item> {
    url_to_item_with_default(url, ItemType::Menu)
}

/// [`url_to_item`] with a caller-chosen item type for URLs whose path
/// carries none (`/` or empty). Interactive `go` passes
/// [`ItemType::Other`]`('?')` here so the response payload decides
/// whether a bare host is a menu or a document.
pub fn url_to_item_with_default(url: &str, default_type: ItemType) -> Result<Item> {
    let url = url.trim();

    let (tls, rest) = if let Some(rest) = url.strip_prefix("gophers://") {
        (true, rest)
    } else if let Some(rest) = url.strip_prefix("gopher://") {
        (false, rest)
    } else {
        return Err(BurrowError::Url(format!("unsupported scheme: {url}")));
    };

    // Split authority from path.
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(BurrowError::Url(format!("missing host: {url}")));
    }

    let (host, port) = parse_authority(authority, url)?;

    // Item type lives in the path's second character.
    let (item_type, selector) = if path.len() <= 1 {
        (default_type, "/".to_string())
    } else {
        let mut chars = path.chars();
        chars.next(); // leading '/'
        let code = chars.next().unwrap_or('1');
        (ItemType::from_char(code), chars.collect())
    };

    Ok(Item::new(host, port, selector, item_type, "<direct URL>", tls))
}

/// Split `host[:port]`, disambiguating IPv6 address literals first.
fn parse_authority(authority: &str, url: &str) -> Result<(String, u16)> {
    // Bracketed IPv6 literal: [::1] or [::1]:7070
    if let Some(rest) = authority.strip_prefix('[') {
        let Some(end) = rest.find(']') else {
            return Err(BurrowError::Url(format!("unterminated IPv6 literal: {url}")));
        };
        let host = rest[..end].to_string();
        let after = &rest[end + 1..];
        let port = match after.strip_prefix(':') {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| BurrowError::Url(format!("bad port: {url}")))?,
            None if after.is_empty() => DEFAULT_PORT,
            None => return Err(BurrowError::Url(format!("trailing junk after ]: {url}"))),
        };
        return Ok((host, port));
    }

    // A bare authority with more than one colon is an unbracketed IPv6
    // address; treat the whole thing as the host.
    if authority.matches(':').count() > 1 {
        return Ok((authority.to_string(), DEFAULT_PORT));
    }

    match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| BurrowError::Url(format!("bad port: {url}")))?;
            Ok((host.to_string(), port))
        },
        None => Ok((authority.to_string(), DEFAULT_PORT)),
    }
}
