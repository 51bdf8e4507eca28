use crate::error::LoadError;

/// Number of card slots in the registry. Compile-time constant: the
/// persisted file size is derived from it, so changing it invalidates
/// existing registry files.
pub const MAX_CARDS: usize = 200;

/// Bounded name storage per card, including the NUL terminator.
pub const CARD_NAME_LEN: usize = 32;

/// Serialized size of one card record:
/// 4 (id) + 1 (active) + 32 (name) + 4 (last_access).
pub const RECORD_SIZE: usize = 4 + 1 + CARD_NAME_LEN + 4;

/// Serialized size of the table header:
/// 2 (active_count) + 2 (capacity) + 4 (checksum) + 4 (reserved).
pub const HEADER_SIZE: usize = 12;

/// Serialized size of the full slot array.
pub const TABLE_SIZE: usize = MAX_CARDS * RECORD_SIZE;

/// Total registry file size: `[header][MAX_CARDS x record]`.
pub const FILE_SIZE: usize = HEADER_SIZE + TABLE_SIZE;

/// One card slot.
///
/// `id == 0` marks a slot that has never held a record. A nonzero id
/// with `active == false` is a tombstone: the id stays reserved but the
/// card no longer grants access. Name and timestamp are left intact on
/// removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardRecord {
    /// 32-bit card number; 0 is the empty-slot sentinel.
    pub id: u32,

    /// Whether the card currently grants access.
    pub active: bool,

    /// NUL-terminated holder name, zero-padded to `CARD_NAME_LEN`.
    name: [u8; CARD_NAME_LEN],

    /// Unix timestamp of the last successful check (0 if never).
    pub last_access: u32,
}

impl CardRecord {
    /// A never-used slot.
    pub const EMPTY: CardRecord = CardRecord {
        id: 0,
        active: false,
        name: [0; CARD_NAME_LEN],
        last_access: 0,
    };

    /// Create an active record with the given name and timestamp.
    pub fn new(id: u32, name: &str, last_access: u32) -> Self {
        let mut record = CardRecord {
            id,
            active: true,
            name: [0; CARD_NAME_LEN],
            last_access,
        };
        record.set_name(name);
        record
    }

    /// Holder name up to the first NUL. Non-UTF-8 content (possible in
    /// a file written by a foreign tool) reads as empty.
    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(CARD_NAME_LEN);
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    /// Store `name`, truncated to `CARD_NAME_LEN - 1` bytes on a char
    /// boundary, NUL-terminated and zero-padded.
    pub fn set_name(&mut self, name: &str) {
        self.name = [0; CARD_NAME_LEN];
        let mut end = name.len().min(CARD_NAME_LEN - 1);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        self.name[..end].copy_from_slice(&name.as_bytes()[..end]);
    }

    /// Slot eligible for first-fit reuse: never used, or tombstoned.
    pub fn is_vacant(&self) -> bool {
        self.id == 0 || !self.active
    }

    /// Slot holding a card that counts toward the active total.
    pub fn is_live(&self) -> bool {
        self.active && self.id != 0
    }

    /// Serialize to the fixed little-endian layout.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.id.to_le_bytes());
        bytes[4] = u8::from(self.active);
        bytes[5..5 + CARD_NAME_LEN].copy_from_slice(&self.name);
        bytes[5 + CARD_NAME_LEN..].copy_from_slice(&self.last_access.to_le_bytes());
        bytes
    }

    /// Deserialize from the fixed little-endian layout.
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let mut name = [0u8; CARD_NAME_LEN];
        name.copy_from_slice(&bytes[5..5 + CARD_NAME_LEN]);
        CardRecord {
            id: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            active: bytes[4] != 0,
            name,
            last_access: u32::from_le_bytes([
                bytes[5 + CARD_NAME_LEN],
                bytes[6 + CARD_NAME_LEN],
                bytes[7 + CARD_NAME_LEN],
                bytes[8 + CARD_NAME_LEN],
            ]),
        }
    }
}

/// Registry file header.
///
/// `active_count` is informational; the live count is always recomputed
/// by scanning the loaded table. `checksum` covers the slot array only,
/// never the header, so the field cannot feed its own computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub active_count: u16,
    pub capacity: u16,
    pub checksum: u32,
    pub reserved: u32,
}

impl TableHeader {
    pub fn new(active_count: u16, checksum: u32) -> Self {
        TableHeader {
            active_count,
            capacity: MAX_CARDS as u16,
            checksum,
            reserved: 0,
        }
    }

    /// Reject headers that cannot describe this build's table.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.capacity != MAX_CARDS as u16 {
            return Err(LoadError::CapacityMismatch {
                stored: self.capacity,
                expected: MAX_CARDS as u16,
            });
        }
        if self.active_count > MAX_CARDS as u16 {
            return Err(LoadError::InvalidCount(self.active_count));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.active_count.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.capacity.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        TableHeader {
            active_count: u16::from_le_bytes([bytes[0], bytes[1]]),
            capacity: u16::from_le_bytes([bytes[2], bytes[3]]),
            checksum: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            reserved: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }
}
