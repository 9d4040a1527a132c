//! Zero-sized hash builder for the runtime's internal maps.
//!
//! The state registry and the document's component index are keyed by
//! ids the runtime mints itself, so HashDoS resistance buys nothing there.
//! `FastHashBuilder` uses foldhash with a fixed seed.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

/// A zero-sized `BuildHasher` that uses foldhash with a fixed seed.
///
/// All instances produce identical hash values, so maps built with it carry
/// no per-collection state.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(0x9e37_79b9_7f4a_7c15).build_hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ComponentId;

    #[test]
    fn fast_hash_builder_is_zero_sized() {
        assert_eq!(std::mem::size_of::<FastHashBuilder>(), 0);
    }

    #[test]
    fn component_ids_hash_identically_across_builders() {
        let id = ComponentId::new();
        assert_eq!(FastHashBuilder.hash_one(id), FastHashBuilder.hash_one(id));
    }
}
