//! The card store.
//!
//! Owns the in-memory table and the write-coalescing cache behind a
//! single mutex, drives persistence, and exposes the operation surface
//! used by the request handler and the hardware scan path. Construct
//! once at startup and share behind an `Arc`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::cache::{WriteCache, WriteDecision, DEFAULT_WRITE_TIMEOUT};
use crate::error::{LoadError, Result, StoreError};
use crate::io;
use crate::record::{CardRecord, MAX_CARDS};
use crate::render;
use crate::table::CardTable;

/// Bounded lock waits. Routine operations give up after 2s; format may
/// wait longer; list rendering is on the request path and gives up
/// sooner. Initialization runs before any contention exists.
const OP_LOCK_TIMEOUT: Duration = Duration::from_secs(2);
const FORMAT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const RENDER_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

/// Store construction options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Debounce window between a mutation and its durable write.
    /// `Duration::ZERO` disables coalescing: every mutation persists
    /// synchronously before returning.
    pub write_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

struct Inner {
    table: CardTable,
    cache: WriteCache,
}

/// Fixed-capacity access-card registry persisted to a single file.
///
/// All operations serialize on one internal mutex with a bounded wait;
/// a timeout surfaces as [`StoreError::LockTimeout`] and never mutates
/// shared state. In coalesced mode the in-memory table and the file may
/// diverge until the debounce deadline passes and [`CardStore::process`]
/// (or an explicit [`CardStore::flush`]) persists; that window is the
/// accepted cost of limiting flash wear.
pub struct CardStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl CardStore {
    /// Open the registry at `path` with the default configuration.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, StoreConfig::default())
    }

    /// Open the registry at `path`.
    ///
    /// Loads and validates the persisted image. On first boot (file
    /// absent) or on any validation failure the compiled-in defaults
    /// are seeded and immediately persisted; corruption is logged, not
    /// surfaced. Fails only when the storage directory is unavailable
    /// or the reseed itself cannot be written.
    pub fn open_with<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.is_dir() {
            return Err(StoreError::StorageUnavailable(dir));
        }

        let table = match io::load(&path) {
            Ok(table) => {
                info!(
                    "card registry loaded from {} ({} cards)",
                    path.display(),
                    table.active_count()
                );
                table
            }
            Err(LoadError::FileAbsent) => {
                info!("no registry file at {}, seeding defaults", path.display());
                Self::reseed(&path)?
            }
            Err(err) => {
                warn!(
                    "registry at {} unreadable ({}), falling back to defaults",
                    path.display(),
                    err
                );
                Self::reseed(&path)?
            }
        };

        Ok(CardStore {
            path,
            inner: Mutex::new(Inner {
                table,
                cache: WriteCache::new(config.write_timeout),
            }),
        })
    }

    fn reseed(path: &Path) -> Result<CardTable> {
        let mut table = CardTable::new();
        table.seed_defaults();
        io::save(path, &table)?;
        Ok(table)
    }

    fn lock(&self, wait: Duration) -> Result<MutexGuard<'_, Inner>> {
        self.inner.try_lock_for(wait).ok_or(StoreError::LockTimeout)
    }

    /// Register a new card.
    ///
    /// Duplicate-id policy is strict: an id that ever occupied a slot,
    /// tombstoned or not, is rejected with `AlreadyExists`.
    pub fn add(&self, id: u32, name: &str) -> Result<()> {
        let mut inner = self.lock(OP_LOCK_TIMEOUT)?;
        let slot = inner.table.insert(id, name, unix_now())?;
        debug!("card {:#010X} added at slot {}", id, slot);
        self.after_mutation(&mut inner)
    }

    /// Revoke a card: the slot becomes a tombstone, its id stays
    /// reserved.
    pub fn remove(&self, id: u32) -> Result<()> {
        let mut inner = self.lock(OP_LOCK_TIMEOUT)?;
        inner.table.deactivate(id)?;
        debug!("card {:#010X} removed", id);
        self.after_mutation(&mut inner)
    }

    /// Whether `id` currently grants access. Updates the card's
    /// last-access timestamp in memory; the update stays RAM-only until
    /// the next persisted mutation or flush, to keep the hot scan path
    /// off the flash. Fails safe: lock timeout denies access.
    pub fn check(&self, id: u32) -> bool {
        let Some(mut inner) = self.inner.try_lock_for(OP_LOCK_TIMEOUT) else {
            warn!("registry lock timeout during card check, denying access");
            return false;
        };
        inner.table.touch(id, unix_now())
    }

    /// Snapshot of the active card with this id. A tombstoned id is
    /// `NotFound`.
    pub fn get(&self, id: u32) -> Result<CardRecord> {
        let inner = self.lock(OP_LOCK_TIMEOUT)?;
        inner
            .table
            .find_active(id)
            .copied()
            .ok_or(StoreError::NotFound(id))
    }

    /// Live recount of active cards. Fails safe to 0 on lock timeout.
    pub fn count(&self) -> u16 {
        match self.inner.try_lock_for(OP_LOCK_TIMEOUT) {
            Some(inner) => inner.table.active_count(),
            None => {
                warn!("registry lock timeout during count");
                0
            }
        }
    }

    /// Active cards in slot order, silently truncated to `max`.
    pub fn list(&self, max: usize) -> Result<Vec<CardRecord>> {
        let inner = self.lock(OP_LOCK_TIMEOUT)?;
        Ok(inner.table.list(max))
    }

    /// Destructive reset: erase every slot, reseed the default cards,
    /// cancel any pending deferred write, and persist synchronously.
    /// Format is never itself coalesced.
    pub fn format(&self) -> Result<()> {
        let mut inner = self.lock(FORMAT_LOCK_TIMEOUT)?;
        warn!("formatting card registry: existing cards erased, defaults restored");

        inner.table.seed_defaults();
        inner.cache.mark_clean();

        if let Err(err) = io::save(&self.path, &inner.table) {
            // Defaults live only in memory until a flush succeeds.
            inner.cache.mark_dirty();
            return Err(err);
        }
        Ok(())
    }

    /// Reconfigure the debounce window. Shortening while a deferred
    /// write is pending re-arms it immediately; shortening to zero
    /// persists immediately.
    pub fn set_cache_timeout(&self, timeout: Duration) -> Result<()> {
        let mut inner = self.lock(OP_LOCK_TIMEOUT)?;
        if inner.cache.set_timeout(timeout, Instant::now()) == WriteDecision::WriteNow {
            io::save(&self.path, &inner.table)?;
            inner.cache.mark_clean();
        }
        Ok(())
    }

    /// Cancel any pending deferred write and, if the table is dirty,
    /// persist synchronously. The dirty flag clears only on success.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock(OP_LOCK_TIMEOUT)?;
        Self::flush_locked(&self.path, &mut inner)
    }

    /// Periodic driver step. Persists once a deferred write is due;
    /// returns whether a persist was attempted. A failed persist leaves
    /// the signal set, so the next step retries.
    pub fn process(&self) -> bool {
        let Some(mut inner) = self.inner.try_lock_for(OP_LOCK_TIMEOUT) else {
            return false;
        };
        if !inner.cache.ready(Instant::now()) {
            return false;
        }

        match io::save(&self.path, &inner.table) {
            Ok(()) => {
                inner.cache.mark_clean();
                debug!("deferred registry write persisted");
            }
            Err(err) => warn!("deferred registry write failed, will retry: {}", err),
        }
        true
    }

    /// Render the active-card list as compact JSON, bounded by
    /// `capacity` bytes. The snapshot is taken under the lock; the
    /// rendering runs outside it.
    pub fn render_card_list(&self, capacity: usize) -> Result<String> {
        let snapshot = {
            let inner = self.lock(RENDER_LOCK_TIMEOUT)?;
            inner.table.list(MAX_CARDS)
        };
        render::render_card_list(&snapshot, capacity)
    }

    /// Flush pending changes before shutdown. Equivalent to
    /// [`CardStore::flush`]; dropping the store also flushes
    /// best-effort, logging failure only.
    pub fn close(&self) -> Result<()> {
        self.flush()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush_locked(path: &Path, inner: &mut Inner) -> Result<()> {
        inner.cache.disarm();
        if !inner.cache.is_dirty() {
            return Ok(());
        }
        io::save(path, &inner.table)?;
        inner.cache.mark_clean();
        Ok(())
    }

    fn after_mutation(&self, inner: &mut Inner) -> Result<()> {
        match inner.cache.note_mutation(Instant::now()) {
            WriteDecision::Deferred => {
                debug!("registry write deferred for {:?}", inner.cache.timeout());
                Ok(())
            }
            WriteDecision::WriteNow => {
                // Dirty flag stays set if the save fails.
                io::save(&self.path, &inner.table)?;
                inner.cache.mark_clean();
                Ok(())
            }
        }
    }
}

impl Drop for CardStore {
    fn drop(&mut self) {
        if let Some(mut inner) = self.inner.try_lock() {
            if inner.cache.is_dirty() {
                if let Err(err) = Self::flush_locked(&self.path, &mut inner) {
                    warn!("failed to flush card registry on drop: {}", err);
                }
            }
        }
    }
}

fn unix_now() -> u32 {
    chrono::Utc::now()
        .timestamp()
        .clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::DEFAULT_CARDS;
    use tempfile::TempDir;

    fn synchronous() -> StoreConfig {
        StoreConfig {
            write_timeout: Duration::ZERO,
        }
    }

    #[test]
    fn test_first_boot_seeds_and_persists_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cards.dat");

        let store = CardStore::open(&path).unwrap();
        assert_eq!(store.count(), DEFAULT_CARDS.len() as u16);
        assert!(store.check(0x1234_5678));
        drop(store);

        // The seeded set was written, not just held in memory.
        let reopened = CardStore::open(&path).unwrap();
        assert_eq!(reopened.count(), DEFAULT_CARDS.len() as u16);
    }

    #[test]
    fn test_open_fails_without_storage_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("cards.dat");
        assert!(matches!(
            CardStore::open(&path),
            Err(StoreError::StorageUnavailable(_))
        ));
    }

    #[test]
    fn test_add_check_remove_cycle() {
        let dir = TempDir::new().unwrap();
        let store =
            CardStore::open_with(dir.path().join("cards.dat"), synchronous()).unwrap();

        store.add(0xABCD_1234, "Test Card One").unwrap();
        assert!(store.check(0xABCD_1234));
        assert_eq!(store.count(), DEFAULT_CARDS.len() as u16 + 1);

        store.remove(0xABCD_1234).unwrap();
        assert!(!store.check(0xABCD_1234));
        assert!(matches!(
            store.remove(0xABCD_1234),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_add_argument_errors_have_no_side_effects() {
        let dir = TempDir::new().unwrap();
        let store =
            CardStore::open_with(dir.path().join("cards.dat"), synchronous()).unwrap();
        let before = store.count();

        assert!(matches!(store.add(0, "x"), Err(StoreError::InvalidCardId)));
        assert!(matches!(store.add(5, ""), Err(StoreError::EmptyName)));
        assert_eq!(store.count(), before);
    }

    #[test]
    fn test_get_distinguishes_tombstone_from_missing() {
        let dir = TempDir::new().unwrap();
        let store =
            CardStore::open_with(dir.path().join("cards.dat"), synchronous()).unwrap();

        store.add(42, "Holder").unwrap();
        let card = store.get(42).unwrap();
        assert_eq!(card.name(), "Holder");

        store.remove(42).unwrap();
        assert!(matches!(store.get(42), Err(StoreError::NotFound(42))));
        assert!(matches!(store.get(43), Err(StoreError::NotFound(43))));
    }

    #[test]
    fn test_check_timestamp_stays_ram_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cards.dat");
        let store = CardStore::open_with(&path, synchronous()).unwrap();

        store.add(7, "Seven").unwrap();
        let persisted_before = std::fs::read(&path).unwrap();

        assert!(store.check(7));
        let stamped = store.get(7).unwrap().last_access;
        assert!(stamped > 0);

        // check() must not have rewritten the file.
        assert_eq!(std::fs::read(&path).unwrap(), persisted_before);
    }

    #[test]
    fn test_format_restores_defaults_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cards.dat");
        let store = CardStore::open_with(&path, synchronous()).unwrap();

        store.add(0xAAAA_BBBB, "Extra").unwrap();
        store.format().unwrap();

        assert_eq!(store.count(), DEFAULT_CARDS.len() as u16);
        assert!(!store.check(0xAAAA_BBBB));
        drop(store);

        let reopened = CardStore::open(&path).unwrap();
        assert_eq!(reopened.count(), DEFAULT_CARDS.len() as u16);
    }

    #[test]
    fn test_render_card_list_after_format() {
        let dir = TempDir::new().unwrap();
        let store =
            CardStore::open_with(dir.path().join("cards.dat"), synchronous()).unwrap();
        store.format().unwrap();

        let json = store.render_card_list(4096).unwrap();
        assert!(json.starts_with(r#"{"cards":["#));
        assert!(json.contains(r#""id":"0x12345678""#));
        assert!(json.contains(r#""nm":"Admin Card""#));

        assert!(matches!(
            store.render_card_list(4),
            Err(StoreError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_list_truncates_to_caller_capacity() {
        let dir = TempDir::new().unwrap();
        let store =
            CardStore::open_with(dir.path().join("cards.dat"), synchronous()).unwrap();

        let two = store.list(2).unwrap();
        assert_eq!(two.len(), 2);
        let all = store.list(MAX_CARDS).unwrap();
        assert_eq!(all.len(), DEFAULT_CARDS.len());
    }

    #[test]
    fn test_drop_flushes_pending_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cards.dat");

        let config = StoreConfig {
            write_timeout: Duration::from_secs(60),
        };
        let store = CardStore::open_with(&path, config).unwrap();
        store.add(0x5555_6666, "Pending").unwrap();
        drop(store);

        let reopened = CardStore::open(&path).unwrap();
        assert!(reopened.check(0x5555_6666));
    }
}
