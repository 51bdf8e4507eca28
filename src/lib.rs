//! Cardstore: fixed-capacity access-card registry
//!
//! An embedded-style card registry: a fixed-slot, checksum-protected
//! record store persisted to a single flash file, with a debounced
//! write-back cache that limits flash wear.
//!
//! ## Features
//!
//! - **Fixed slot table** (200 slots, compile-time constant) with
//!   first-fit tombstone reuse and strict id uniqueness
//! - **Checksummed whole-image persistence**: every save rewrites the
//!   full table; every load validates size, header, and checksum before
//!   touching live state
//! - **Write coalescing**: mutations arm a debounce deadline instead of
//!   hitting the flash; a periodic driver persists once it passes
//! - **Transparent corruption recovery**: an unreadable registry file
//!   falls back to the compiled-in default card set, immediately
//!   re-persisted
//! - **Bounded-wait locking**: one internal mutex, lock timeouts
//!   surface as errors and never mutate shared state
//!
//! ## On-disk layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Registry file (8212 bytes)         │
//! ├─────────────────────────────────────────────┤
//! │ Header (12 bytes)                           │
//! │  - active_count: u16                        │
//! │  - capacity: u16 (always 200)               │
//! │  - checksum: u32 (slot array only)          │
//! │  - reserved: u32                            │
//! ├─────────────────────────────────────────────┤
//! │ 200 × card record (41 bytes each)           │
//! │  - id: u32 (0 = never used)                 │
//! │  - active: u8 (0 = tombstone)               │
//! │  - name: [u8; 32], NUL-terminated           │
//! │  - last_access: u32                         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! All integers little-endian. Tombstones and empty slots are part of
//! the persisted image and of the checksum.
//!
//! ## Example
//!
//! ```no_run
//! use cardstore::{CardStore, Result};
//!
//! fn main() -> Result<()> {
//!     let store = CardStore::open("/var/lib/gate/cards.dat")?;
//!
//!     store.add(0xABCD_1234, "Test Card One")?;
//!     assert!(store.check(0xABCD_1234));
//!
//!     // Periodic driver: persists deferred writes once due.
//!     store.process();
//!
//!     store.close()?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod checksum;
pub mod defaults;
pub mod error;
pub mod io;
pub mod record;
pub mod render;
pub mod store;
pub mod table;

pub use cache::{WriteCache, WriteDecision, DEFAULT_WRITE_TIMEOUT};
pub use error::{LoadError, Result, StoreError};
pub use record::{CardRecord, TableHeader, CARD_NAME_LEN, FILE_SIZE, MAX_CARDS};
pub use store::{CardStore, StoreConfig};
pub use table::CardTable;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
