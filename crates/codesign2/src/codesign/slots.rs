//! Special hash slots handed to the signature embedder.
//!
//! A code directory reserves a handful of negative-indexed slots for digests
//! of data outside the executable. Only the Info.plist and CodeResources
//! slots are filled here; the embedder owns the rest of the numbering.

use crate::bundle::digest::{Digest, DIGEST_LEN};

/// Info.plist slot
pub const CSSLOT_INFOSLOT: usize = 1;

/// Code requirements slot
pub const CSSLOT_REQUIREMENTS: usize = 2;

/// Resource directory (CodeResources) slot
pub const CSSLOT_RESOURCEDIR: usize = 3;

/// Application-specific slot
pub const CSSLOT_APPLICATION: usize = 4;

/// Entitlements slot (XML format)
pub const CSSLOT_ENTITLEMENTS: usize = 5;

/// Number of special slots, including the unused slot 0.
pub const SPECIAL_SLOT_COUNT: usize = 6;

const EMPTY_SLOT: Digest = [0u8; DIGEST_LEN];

/// Fixed-size table of special slot digests. Unset slots are all zeroes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialSlots {
    hashes: [Digest; SPECIAL_SLOT_COUNT],
}

impl SpecialSlots {
    /// Store `digest` in `slot`. Out-of-range slots are ignored.
    pub fn set(&mut self, slot: usize, digest: Digest) {
        if let Some(entry) = self.hashes.get_mut(slot) {
            *entry = digest;
        }
    }

    /// The digest in `slot`, or `None` if it was never populated.
    pub fn get(&self, slot: usize) -> Option<&Digest> {
        self.hashes.get(slot).filter(|hash| **hash != EMPTY_SLOT)
    }

    /// Populated slots in index order.
    pub fn populated(&self) -> impl Iterator<Item = (usize, &Digest)> {
        self.hashes
            .iter()
            .enumerate()
            .filter(|(_, hash)| **hash != EMPTY_SLOT)
    }

    /// Raw table, zeroes included.
    pub fn as_array(&self) -> &[Digest; SPECIAL_SLOT_COUNT] {
        &self.hashes
    }
}
