//! Mirror registry: alternate hosts for path prefixes.
//!
//! Menus may advertise redundancy with `+` lines; those register an
//! alternate host/selector prefix here. On a transport failure the
//! navigation engine asks for a substitute item -- at most once per
//! fetch, so mirrors that reference each other cannot loop.

use std::collections::HashMap;

use rand::seq::IndexedRandom;

use burrow_types::Item;

type PrefixKey = (String, u16, String);
type Candidate = (String, u16, String);

/// Registered failover candidates, keyed by `(host, port, path-prefix)`.
#[derive(Debug, Default)]
pub struct MirrorRegistry {
    entries: HashMap<PrefixKey, Vec<Candidate>>,
}

impl MirrorRegistry {
    /// Register `mirror` as an alternate for `primary`'s path prefix.
    /// Items without a host (local files) are ignored.
    pub fn register(&mut self, primary: &Item, mirror: &Item) {
        let (Some(primary_host), Some(mirror_host)) = (&primary.host, &mirror.host) else {
            return;
        };
        let key = (primary_host.clone(), primary.port, primary.path.clone());
        log::debug!(
            "registering mirror {mirror_host}:{}{} for {}:{}{}",
            mirror.port,
            mirror.path,
            key.0,
            key.1,
            key.2,
        );
        self.entries
            .entry(key)
            .or_default()
            .push((mirror_host.clone(), mirror.port, mirror.path.clone()));
    }

    /// Find a substitute for a failed fetch.
    ///
    /// Scans for a registered key with matching host/port whose path is
    /// a prefix of the failed item's path, picks one candidate uniformly
    /// at random, and synthesizes an item with the mirror's host/port
    /// and the mirror's path plus the unmatched suffix. Type, name, and
    /// TLS flag carry over from the failed item.
    pub fn find_alternate(&self, failed: &Item) -> Option<Item> {
        let host = failed.host.as_ref()?;
        for ((key_host, key_port, prefix), candidates) in &self.entries {
            if key_host != host || *key_port != failed.port || !failed.path.starts_with(prefix) {
                continue;
            }
            let (mirror_host, mirror_port, mirror_path) = candidates.choose(&mut rand::rng())?;
            let suffix = &failed.path[prefix.len()..];
            return Some(Item::new(
                mirror_host.clone(),
                *mirror_port,
                format!("{mirror_path}{suffix}"),
                failed.item_type,
                failed.name.clone(),
                failed.tls,
            ));
        }
        None
    }

    /// Number of registered prefixes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether anything has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
