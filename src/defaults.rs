//! Bootstrap card set.
//!
//! Seeded into the first slots on first boot, after any load failure,
//! and on an explicit format. Seeding is always followed by an
//! immediate synchronous save, so the default state is never left
//! un-persisted.

/// Compiled-in default cards: `(id, name)` pairs.
pub const DEFAULT_CARDS: [(u32, &str); 3] = [
    (0x1234_5678, "Admin Card"),
    (0x8765_4321, "User Card 1"),
    (0xABCD_EF00, "User Card 2"),
];
