//! Identifiers for components and state cells.

use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process random prefix, so ids minted by different processes (or
/// different page loads) never collide in a shared host document.
static SESSION_PREFIX: LazyLock<u64> = LazyLock::new(|| {
    let mut bytes = [0u8; 8];
    match getrandom::fill(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(err) => {
            tracing::debug!(%err, "no entropy source; using fixed id prefix");
            0x5745_4654_0000_0000
        }
    }
});

static NEXT_COMPONENT: AtomicU64 = AtomicU64::new(1);
static NEXT_CELL: AtomicU64 = AtomicU64::new(1);

/// Opaque 128-bit component identity.
///
/// Assigned once at construction and stable for the component's lifetime.
/// Its [`Display`](fmt::Display) form is the `id` attribute of the
/// component's outermost element in rendered markup.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ComponentId(u128);

impl ComponentId {
    /// Mint a fresh identity.
    pub fn new() -> Self {
        let serial = NEXT_COMPONENT.fetch_add(1, Ordering::Relaxed);
        ComponentId(((*SESSION_PREFIX as u128) << 64) | serial as u128)
    }

    /// The raw 128-bit value.
    pub fn as_u128(self) -> u128 {
        self.0
    }

    /// Parse the host-element form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('w')?;
        if hex.len() != 32 {
            return None;
        }
        u128::from_str_radix(hex, 16).ok().map(ComponentId)
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComponentId {
    // Leading letter keeps the value a valid HTML id and CSS selector.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{:032x}", self.0)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({self})")
    }
}

/// Identity of a single state cell, unique for the process.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct CellId(u64);

impl CellId {
    pub(crate) fn next() -> Self {
        CellId(NEXT_CELL.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}
