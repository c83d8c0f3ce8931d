//! Key-binding entries and the shared property store.
//!
//! Cooperating editor processes distribute key bindings through one
//! shared append-mostly byte property. Each binding becomes one entry:
//! a big-endian `u16` length covering the rest of the entry, the key
//! name plus NUL, then the chain's flattened frames. The outer length
//! lets a reader skip a whole binding without decoding its chain.
//!
//! [`StoreSync`] implements the reader/writer discipline: compare the
//! previously known store length against the current one, decode only
//! the appended suffix on growth, re-decode everything on shrinkage,
//! and swallow the change notification a writer receives for its own
//! append.

use crate::cmd::Cmd;
use crate::error::WireError;
use crate::wire::{Decoded, flatten, inflate, size};

// ===== BINDING ENTRIES =====

/// Flatten `(key, chain)` pairs in iteration order.
///
/// Fails with [`WireError::Oversize`] when an entry outgrows its `u16`
/// length field.
pub fn flatten_bindings<'a, I>(bindings: I) -> Result<Vec<u8>, WireError>
where
    I: IntoIterator<Item = (&'a str, &'a [Cmd])>,
{
    let mut out = Vec::new();
    for (key, chain) in bindings {
        let entry_len = key.len() + 1 + size(chain);
        if entry_len > u16::MAX as usize {
            return Err(WireError::Oversize { size: entry_len });
        }
        out.extend_from_slice(&(entry_len as u16).to_be_bytes());
        out.extend_from_slice(key.as_bytes());
        out.push(0);
        out.extend_from_slice(&flatten(chain)?);
    }
    Ok(out)
}

/// Result of decoding a whole bindings buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBindings {
    pub bindings: Vec<(String, Vec<Cmd>)>,
    /// First corruption seen, if any. Entries after a bad chain still
    /// decode; a bad entry length stops the walk.
    pub error: Option<WireError>,
}

/// Decode every binding entry in `buf`.
pub fn inflate_bindings(buf: &[u8]) -> DecodedBindings {
    let mut bindings = Vec::new();
    let mut error = None;
    let mut offset = 0usize;
    while offset < buf.len() {
        let Some((entry, next)) = entry_at(buf, offset) else {
            error = error.or(Some(bad_entry(buf, offset)));
            break;
        };
        match split_key(entry) {
            Some((key, frames)) => {
                let decoded = inflate(frames);
                if decoded.error.is_some() {
                    error = error.or(decoded.error);
                }
                bindings.push((key, decoded.cmds));
            }
            None => {
                error = error.or(Some(WireError::Truncated { offset: offset + 2 }));
                break;
            }
        }
        offset = next;
    }
    DecodedBindings { bindings, error }
}

/// Locate one key's chain without decoding the others.
pub fn find_binding(buf: &[u8], key: &str) -> Option<Decoded> {
    let mut offset = 0usize;
    while offset < buf.len() {
        let (entry, next) = entry_at(buf, offset)?;
        if let Some((k, frames)) = split_key(entry) {
            if k == key {
                return Some(inflate(frames));
            }
        }
        offset = next;
    }
    None
}

fn entry_at(buf: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    if buf.len() - offset < 2 {
        return None;
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
    if len == 0 || len > buf.len() - offset - 2 {
        return None;
    }
    Some((&buf[offset + 2..offset + 2 + len], offset + 2 + len))
}

fn bad_entry(buf: &[u8], offset: usize) -> WireError {
    if buf.len() - offset < 2 {
        return WireError::Truncated { offset };
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
    WireError::BadLength { offset, len }
}

fn split_key(entry: &[u8]) -> Option<(String, &[u8])> {
    let nul = entry.iter().position(|&b| b == 0)?;
    let key = String::from_utf8_lossy(&entry[..nul]).into_owned();
    Some((key, &entry[nul + 1..]))
}

// ===== PROPERTY STORE =====

/// The shared byte property the bindings live in.
///
/// The real store is a property on a shared root object; tests use
/// [`MemStore`] or a file. No locking: the append-only entry framing
/// is what keeps interleaved readers coherent.
pub trait PropertyStore {
    /// Current length in bytes.
    fn size(&self) -> usize;

    /// Bytes from `offset` to the end.
    fn read_from(&self, offset: usize) -> Vec<u8>;

    /// Append bytes at the end.
    fn append(&mut self, bytes: &[u8]);

    /// Replace the whole content.
    fn rewrite(&mut self, bytes: &[u8]);
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    bytes: Vec<u8>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }
}

impl PropertyStore for MemStore {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read_from(&self, offset: usize) -> Vec<u8> {
        self.bytes.get(offset..).unwrap_or_default().to_vec()
    }

    fn append(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn rewrite(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
    }
}

// ===== CHANGE TRACKING =====

/// What a process should do after a store change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    /// Own change, or no growth: nothing to decode.
    None,
    /// The store grew; decode only these appended bytes.
    Suffix(Vec<u8>),
    /// The store shrank; re-decode this full content.
    Reload(Vec<u8>),
}

/// Per-process view of the shared store.
///
/// Starts knowing nothing, so the first change notification (or an
/// explicit [`note_change`](Self::note_change) at startup) surfaces the
/// whole existing content as a suffix.
#[derive(Debug, Default)]
pub struct StoreSync {
    known: usize,
    pending: u32,
}

impl StoreSync {
    pub fn new() -> Self {
        StoreSync::default()
    }

    /// Append bytes and expect one self-change notification for them.
    pub fn publish(&mut self, store: &mut dyn PropertyStore, bytes: &[u8]) {
        store.append(bytes);
        self.known += bytes.len();
        self.pending += 1;
        log::debug!(
            "published {} bytes, store now {} bytes",
            bytes.len(),
            self.known
        );
    }

    /// Replace the store content and expect one self-change
    /// notification. Peers observe the shrinkage and reload.
    pub fn publish_rewrite(&mut self, store: &mut dyn PropertyStore, bytes: &[u8]) {
        store.rewrite(bytes);
        self.known = bytes.len();
        self.pending += 1;
        log::debug!("rewrote store to {} bytes", self.known);
    }

    /// Handle a change notification for the store.
    pub fn note_change(&mut self, store: &dyn PropertyStore) -> SyncAction {
        if self.pending > 0 {
            self.pending -= 1;
            log::debug!("ignoring own store change ({} still pending)", self.pending);
            return SyncAction::None;
        }
        let current = store.size();
        let action = if current == self.known {
            SyncAction::None
        } else if current > self.known {
            log::debug!("store grew {} -> {current} bytes", self.known);
            SyncAction::Suffix(store.read_from(self.known))
        } else {
            log::debug!("store shrank {} -> {current} bytes", self.known);
            SyncAction::Reload(store.read_from(0))
        };
        self.known = current;
        action
    }
}

// ===== TESTS =====
