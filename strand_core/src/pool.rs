use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::{
  fmt,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
};

use crate::record::{RecordHandle, RecordRef};
use crate::shared_str::SharedStr;

/// The process wide default pool, created lazily on first use and
/// never torn down.
static GLOBAL_POOL: Lazy<StrPool> = Lazy::new(StrPool::new);

/// Mapping from content to its canonical record. Each key aliases the
/// payload of the record stored in its value, so an entry must be
/// erased strictly before its record is freed.
type RecordMap = HashMap<&'static [u8], RecordHandle, FnvBuildHasher>;

/// A pool of canonical string records. The pool stores at most one
/// record per distinct content; handles created through
/// [`StrPool::intern`] share those records and the pool reclaims a
/// record when the last handle bound to it goes away.
///
/// Cloning a `StrPool` produces another view of the same pool, not an
/// independent one.
///
/// ## Example
/// ```
/// use strand_core::StrPool;
///
/// let pool = StrPool::new();
///
/// let a = pool.intern("canonical");
/// let b = pool.intern("canonical");
///
/// assert!(a.ptr_eq(&b));
/// assert_eq!(pool.len(), 1);
///
/// drop(a);
/// drop(b);
/// assert_eq!(pool.len(), 0);
/// ```
pub struct StrPool {
  core: Arc<PoolCore>,
}

impl StrPool {
  /// Create a new empty pool, isolated from every other pool
  pub fn new() -> Self {
    Self {
      core: Arc::new(PoolCore {
        records: Mutex::new(RecordMap::default()),
        bytes_allocated: AtomicUsize::new(0),
      }),
    }
  }

  /// The process wide default pool. [`SharedStr::from_bytes`] and the
  /// `From` constructors intern here.
  pub fn global() -> &'static StrPool {
    &GLOBAL_POOL
  }

  /// Intern `content`, returning a handle bound to this pool's
  /// canonical record for it. Equal content yields handles sharing one
  /// record; empty content yields an empty handle without touching the
  /// pool at all.
  ///
  /// ## Example
  /// ```
  /// use strand_core::StrPool;
  ///
  /// let pool = StrPool::new();
  ///
  /// let greeting = pool.intern("hello");
  /// let empty = pool.intern("");
  ///
  /// assert_eq!(greeting.as_bytes(), b"hello");
  /// assert!(empty.is_empty());
  /// assert_eq!(pool.len(), 1);
  /// ```
  pub fn intern<C: AsRef<[u8]>>(&self, content: C) -> SharedStr {
    let content = content.as_ref();

    if content.is_empty() {
      return SharedStr::default();
    }

    let record = self.core.acquire(content);
    SharedStr::bound(Arc::clone(&self.core), record)
  }

  /// The number of distinct contents currently stored
  pub fn len(&self) -> usize {
    self.core.records.lock().len()
  }

  /// Is the pool currently storing no records
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Does the pool currently hold a record for `content`
  pub fn contains<C: AsRef<[u8]>>(&self, content: C) -> bool {
    self.core.records.lock().contains_key(content.as_ref())
  }

  /// Get the number of bytes held by live records
  pub fn allocated(&self) -> usize {
    self.core.bytes_allocated.load(Ordering::Relaxed)
  }
}

impl Default for StrPool {
  fn default() -> Self {
    Self::new()
  }
}

impl Clone for StrPool {
  fn clone(&self) -> Self {
    Self {
      core: Arc::clone(&self.core),
    }
  }
}

impl fmt::Debug for StrPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StrPool")
      .field("records", &self.len())
      .field("allocated", &self.allocated())
      .finish()
  }
}

/// The shared state behind a pool. Bound handles keep it alive through
/// an `Arc` so a pool value can be dropped while its strings live on.
pub(crate) struct PoolCore {
  /// The intern table, guarded by a single lock
  records: Mutex<RecordMap>,

  /// Total bytes held by live records
  bytes_allocated: AtomicUsize,
}

impl PoolCore {
  /// Look up or create the canonical record for `content` and take one
  /// reference to it. Zero length content is routed to the empty
  /// binding upstream and never reaches the table.
  pub(crate) fn acquire(&self, content: &[u8]) -> RecordRef {
    debug_assert!(!content.is_empty(), "empty content is never interned");

    let mut records = self.records.lock();

    if let Some(handle) = records.get(content) {
      // dedup hit, share the existing record without allocating
      let record = handle.value();
      record.increment();
      return record;
    }

    let handle = RecordHandle::from_bytes(content);
    let record = handle.value();

    self
      .bytes_allocated
      .fetch_add(handle.size(), Ordering::Relaxed);

    #[cfg(feature = "pool_log_acquire")]
    eprintln!(
      "{:p} allocate {} bytes",
      record.as_alloc_ptr(),
      handle.size()
    );

    // The key aliases the record's own payload. The record never moves
    // or mutates while the entry is live, and release erases the entry
    // before the storage goes away.
    records.insert(unsafe { record.deref_static() }, handle);

    record
  }

  /// Drop one reference to `record`, erasing and freeing it when the
  /// last reference goes away.
  ///
  /// While more than one reference is live the decrement stays off the
  /// lock. The transition to zero happens with the table locked: a
  /// concurrent acquire of the same content either lands before the
  /// decrement and keeps the record alive, or waits on the lock and
  /// misses the erased entry. The count can therefore never be revived
  /// mid teardown.
  pub(crate) fn release(&self, record: RecordRef) {
    let mut refs = record.refs();

    loop {
      debug_assert!(refs != 0, "release of an unreferenced record");

      if refs > 1 {
        match record.decrement_if_shared(refs) {
          Ok(()) => return,
          Err(observed) => refs = observed,
        }
      } else {
        let mut records = self.records.lock();

        if record.decrement() == 0 {
          let handle = records
            .remove(record.as_bytes())
            .expect("canonical record missing from its pool");

          self
            .bytes_allocated
            .fetch_sub(handle.size(), Ordering::Relaxed);

          #[cfg(feature = "pool_log_release")]
          eprintln!("{:p} free {} bytes", record.as_alloc_ptr(), handle.size());

          // the entry is gone, releasing the storage is now safe
          drop(handle);
        }

        return;
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  mod acquire {
    use super::*;

    #[test]
    fn creates_one_record_per_content() {
      let pool = StrPool::new();

      let a = pool.core.acquire(b"content");
      let b = pool.core.acquire(b"content");
      let c = pool.core.acquire(b"other");

      assert_eq!(a, b);
      assert_ne!(a, c);
      assert_eq!(pool.len(), 2);
      assert_eq!(a.refs(), 2);
      assert_eq!(c.refs(), 1);

      pool.core.release(a);
      pool.core.release(b);
      pool.core.release(c);
    }

    #[test]
    fn tracks_allocated_bytes() {
      let pool = StrPool::new();
      assert_eq!(pool.allocated(), 0);

      let record = pool.core.acquire(b"accounting");
      assert!(pool.allocated() > b"accounting".len());

      pool.core.release(record);
      assert_eq!(pool.allocated(), 0);
    }
  }

  mod release {
    use super::*;

    #[test]
    fn erases_on_last_reference() {
      let pool = StrPool::new();

      let record = pool.core.acquire(b"short lived");
      assert!(pool.contains(b"short lived"));

      pool.core.release(record);
      assert!(!pool.contains(b"short lived"));
      assert_eq!(pool.len(), 0);
    }

    #[test]
    fn keeps_record_while_referenced() {
      let pool = StrPool::new();

      let a = pool.core.acquire(b"still here");
      let b = pool.core.acquire(b"still here");

      pool.core.release(a);
      assert!(pool.contains(b"still here"));
      assert_eq!(b.refs(), 1);

      pool.core.release(b);
      assert!(!pool.contains(b"still here"));
    }
  }

  mod pool {
    use super::*;

    #[test]
    fn clone_views_the_same_pool() {
      let pool = StrPool::new();
      let view = pool.clone();

      let held = pool.intern("shared view");

      assert_eq!(view.len(), 1);
      assert!(view.contains("shared view"));

      drop(held);
      assert_eq!(view.len(), 0);
    }

    #[test]
    fn global_is_a_single_instance() {
      let first = StrPool::global();
      let second = StrPool::global();

      let held = first.intern("global pool entry");
      assert!(second.contains("global pool entry"));
      drop(held);
    }

    #[test]
    fn empty_content_never_touches_the_table() {
      let pool = StrPool::new();

      let empty = pool.intern("");

      assert!(empty.is_empty());
      assert_eq!(pool.len(), 0);
      assert_eq!(pool.allocated(), 0);
    }
  }
}
