//! In-memory slot table.
//!
//! Pure mutation core for the fixed card array: no locking and no I/O,
//! which keeps every invariant unit-testable in isolation. The owning
//! store serializes access and drives persistence.

use crate::checksum::table_checksum;
use crate::defaults::DEFAULT_CARDS;
use crate::error::{LoadError, Result, StoreError};
use crate::record::{CardRecord, MAX_CARDS, RECORD_SIZE, TABLE_SIZE};

/// Fixed-capacity card table, addressed by slot position.
///
/// Duplicate-id policy is strict: an id that occupies any slot with a
/// nonzero id, tombstoned or not, cannot be inserted again. Freed slots
/// are reused first-fit in ascending slot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardTable {
    slots: Box<[CardRecord; MAX_CARDS]>,
}

impl CardTable {
    /// An empty table: every slot never-used.
    pub fn new() -> Self {
        CardTable {
            slots: Box::new([CardRecord::EMPTY; MAX_CARDS]),
        }
    }

    /// Insert a new card, returning the slot index it landed in.
    ///
    /// Scans for the first vacant slot (`id == 0` or tombstoned);
    /// tombstone reuse overwrites the previous occupant's id, name and
    /// timestamp. Fails `RegistryFull` only when every slot holds an
    /// active card.
    pub fn insert(&mut self, id: u32, name: &str, now: u32) -> Result<usize> {
        if id == 0 {
            return Err(StoreError::InvalidCardId);
        }
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        if self.slots.iter().any(|slot| slot.id == id) {
            return Err(StoreError::AlreadyExists(id));
        }

        let index = self
            .slots
            .iter()
            .position(CardRecord::is_vacant)
            .ok_or(StoreError::RegistryFull(MAX_CARDS as u16))?;

        self.slots[index] = CardRecord::new(id, name, now);
        Ok(index)
    }

    /// Tombstone the active card with this id, returning its slot.
    /// Name and timestamp are left intact; the id stays reserved.
    pub fn deactivate(&mut self, id: u32) -> Result<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.id == id && slot.active)
            .ok_or(StoreError::NotFound(id))?;
        self.slots[index].active = false;
        Ok(index)
    }

    /// Update the last-access timestamp of an active card.
    /// Returns whether the card was found.
    pub fn touch(&mut self, id: u32, now: u32) -> bool {
        match self
            .slots
            .iter_mut()
            .find(|slot| slot.id == id && slot.active)
        {
            Some(slot) => {
                slot.last_access = now;
                true
            }
            None => false,
        }
    }

    /// The active card with this id, if any. Tombstones do not match.
    pub fn find_active(&self, id: u32) -> Option<&CardRecord> {
        self.slots.iter().find(|slot| slot.id == id && slot.active)
    }

    /// Live recount of active cards. Never a cached counter.
    pub fn active_count(&self) -> u16 {
        self.slots.iter().filter(|slot| slot.is_live()).count() as u16
    }

    /// Active cards in slot order, silently truncated to `max`.
    pub fn list(&self, max: usize) -> Vec<CardRecord> {
        self.slots
            .iter()
            .filter(|slot| slot.is_live())
            .take(max)
            .copied()
            .collect()
    }

    /// Reset every slot to never-used.
    pub fn clear(&mut self) {
        *self.slots = [CardRecord::EMPTY; MAX_CARDS];
    }

    /// Clear the table and copy the compiled-in default cards into the
    /// first slots, timestamps zeroed.
    pub fn seed_defaults(&mut self) {
        self.clear();
        for (index, (id, name)) in DEFAULT_CARDS.iter().enumerate().take(MAX_CARDS) {
            self.slots[index] = CardRecord::new(*id, name, 0);
        }
    }

    /// Serialize the whole slot array, tombstones and empty slots
    /// included, to the fixed little-endian image.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TABLE_SIZE);
        for slot in self.slots.iter() {
            bytes.extend_from_slice(&slot.to_bytes());
        }
        bytes
    }

    /// Deserialize a full slot-array image.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, LoadError> {
        if bytes.len() != TABLE_SIZE {
            return Err(LoadError::Truncated);
        }
        let mut table = CardTable::new();
        for (index, chunk) in bytes.chunks_exact(RECORD_SIZE).enumerate() {
            let mut record = [0u8; RECORD_SIZE];
            record.copy_from_slice(chunk);
            table.slots[index] = CardRecord::from_bytes(&record);
        }
        Ok(table)
    }

    /// Digest of the serialized slot array.
    pub fn checksum(&self) -> u32 {
        table_checksum(&self.to_bytes())
    }

    #[cfg(test)]
    pub(crate) fn slot(&self, index: usize) -> &CardRecord {
        &self.slots[index]
    }
}

impl Default for CardTable {
    fn default() -> Self {
        Self::new()
    }
}
