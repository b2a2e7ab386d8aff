use std::{
  borrow::Borrow,
  cmp::Ordering,
  ffi::CStr,
  fmt,
  hash::{Hash, Hasher},
  ops::Deref,
  sync::Arc,
};

use crate::pool::{PoolCore, StrPool};
use crate::record::RecordRef;

/// The terminated payload every empty handle reads from
const EMPTY_PAYLOAD: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"\0") };

/// What a handle is bound to
enum Bind {
  /// No record at all. Construction, clone and drop of empty handles
  /// never reach a pool.
  Empty,

  /// A live canonical record owned by `pool`
  Bound {
    pool: Arc<PoolCore>,
    record: RecordRef,
  },
}

/// An immutable, reference counted, deduplicated byte string.
///
/// Every `SharedStr` holding a given content shares a single canonical
/// record in its pool; the record is freed when the last handle bound
/// to it goes away. Cloning bumps the shared count by reference
/// identity without a pool lookup, and moving a handle never touches
/// the count at all.
///
/// Content is raw bytes. Embedded nul bytes are stored and preserved
/// by [`SharedStr::as_bytes`] and [`SharedStr::to_bytes`]; only the
/// terminator bounded [`SharedStr::as_c_str`] view stops at them.
///
/// ## Example
/// ```
/// use strand_core::SharedStr;
///
/// let a = SharedStr::from("hello");
/// let b = SharedStr::from("hello");
///
/// assert!(a.ptr_eq(&b));
/// assert_eq!(a, b);
/// assert_eq!(a.as_bytes(), b"hello");
/// ```
pub struct SharedStr {
  bind: Bind,
}

impl SharedStr {
  /// Create an empty handle. No pool is touched and nothing is
  /// allocated.
  ///
  /// ## Example
  /// ```
  /// use strand_core::SharedStr;
  ///
  /// let empty = SharedStr::new();
  ///
  /// assert!(empty.is_empty());
  /// assert_eq!(empty.len(), 0);
  /// ```
  pub fn new() -> Self {
    Self { bind: Bind::Empty }
  }

  /// Intern `content` in the process wide default pool. Empty content
  /// produces an empty handle without reaching the pool.
  pub fn from_bytes<C: AsRef<[u8]>>(content: C) -> Self {
    let content = content.as_ref();

    if content.is_empty() {
      return SharedStr::new();
    }

    StrPool::global().intern(content)
  }

  /// Bind a freshly acquired record. The record's count already
  /// includes this handle's reference.
  pub(crate) fn bound(pool: Arc<PoolCore>, record: RecordRef) -> Self {
    Self {
      bind: Bind::Bound { pool, record },
    }
  }

  /// Is this handle empty
  #[inline]
  pub fn is_empty(&self) -> bool {
    matches!(self.bind, Bind::Empty)
  }

  /// The content length in bytes, excluding the terminator
  #[inline]
  pub fn len(&self) -> usize {
    match &self.bind {
      Bind::Empty => 0,
      Bind::Bound { record, .. } => record.len(),
    }
  }

  /// Zero copy view of the full content, length bounded. Embedded nul
  /// bytes are included. The borrow keeps this handle, and with it the
  /// record, alive.
  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    match &self.bind {
      Bind::Empty => &[],
      Bind::Bound { record, .. } => record.as_bytes(),
    }
  }

  /// Zero copy view of the terminated payload. The view ends at the
  /// first nul byte, so content carrying embedded nuls is truncated
  /// here; use [`SharedStr::as_bytes`] or [`SharedStr::to_bytes`] for
  /// the full content.
  ///
  /// ## Example
  /// ```
  /// use strand_core::SharedStr;
  ///
  /// let s = SharedStr::from_bytes(b"ab\0cd");
  ///
  /// assert_eq!(s.as_bytes(), b"ab\0cd");
  /// assert_eq!(s.as_c_str().to_bytes(), b"ab");
  /// ```
  #[inline]
  pub fn as_c_str(&self) -> &CStr {
    match &self.bind {
      Bind::Empty => EMPTY_PAYLOAD,
      Bind::Bound { record, .. } => record.as_c_str(),
    }
  }

  /// An independent owned copy of the full content, length bounded
  pub fn to_bytes(&self) -> Vec<u8> {
    self.as_bytes().to_vec()
  }

  /// Rebind this handle to `content`, interned in the handle's current
  /// pool, or in the process wide default pool when the handle is
  /// empty.
  ///
  /// Assigning content equal to what the handle already holds is a
  /// no-op: the existing record is kept and no release or acquire
  /// runs.
  ///
  /// ## Example
  /// ```
  /// use strand_core::StrPool;
  ///
  /// let pool = StrPool::new();
  /// let mut s = pool.intern("before");
  ///
  /// s.assign("after");
  ///
  /// assert_eq!(s.as_bytes(), b"after");
  /// assert_eq!(pool.len(), 1);
  /// ```
  pub fn assign<C: AsRef<[u8]>>(&mut self, content: C) {
    let content = content.as_ref();

    if self.as_bytes() == content {
      return;
    }

    if content.is_empty() {
      *self = SharedStr::new();
      return;
    }

    let rebound = match &self.bind {
      Bind::Bound { pool, .. } => {
        let record = pool.acquire(content);
        SharedStr::bound(Arc::clone(pool), record)
      }
      Bind::Empty => SharedStr::from_bytes(content),
    };

    *self = rebound;
  }

  /// Diagnostic only: the current count of the bound record, or `None`
  /// for an empty handle. Like `Arc::strong_count` the value can be
  /// stale by the time it is read.
  pub fn ref_count(&self) -> Option<u32> {
    match &self.bind {
      Bind::Empty => None,
      Bind::Bound { record, .. } => Some(record.refs()),
    }
  }

  /// Do `self` and `other` share one canonical record. All empty
  /// handles compare equal to each other.
  ///
  /// ## Example
  /// ```
  /// use strand_core::StrPool;
  ///
  /// let pool = StrPool::new();
  ///
  /// let a = pool.intern("same");
  /// let b = pool.intern("same");
  /// let c = pool.intern("different");
  ///
  /// assert!(a.ptr_eq(&b));
  /// assert!(!a.ptr_eq(&c));
  /// ```
  pub fn ptr_eq(&self, other: &SharedStr) -> bool {
    match (&self.bind, &other.bind) {
      (Bind::Empty, Bind::Empty) => true,
      (Bind::Bound { record: a, .. }, Bind::Bound { record: b, .. }) => a == b,
      _ => false,
    }
  }
}

impl Default for SharedStr {
  #[inline]
  fn default() -> Self {
    SharedStr::new()
  }
}

impl Clone for SharedStr {
  /// Share the record, bumping its count by reference identity. No
  /// pool lookup and no lock. `a = a.clone()` is safe: the increment
  /// lands before the old binding's release, so the count never
  /// transiently reaches zero.
  fn clone(&self) -> Self {
    match &self.bind {
      Bind::Empty => SharedStr::new(),
      Bind::Bound { pool, record } => {
        record.increment();
        SharedStr::bound(Arc::clone(pool), *record)
      }
    }
  }
}

impl Drop for SharedStr {
  fn drop(&mut self) {
    if let Bind::Bound { pool, record } = &self.bind {
      pool.release(*record);
    }
  }
}

impl From<&str> for SharedStr {
  fn from(content: &str) -> Self {
    SharedStr::from_bytes(content)
  }
}

impl From<String> for SharedStr {
  fn from(content: String) -> Self {
    SharedStr::from_bytes(content)
  }
}

impl From<&[u8]> for SharedStr {
  fn from(content: &[u8]) -> Self {
    SharedStr::from_bytes(content)
  }
}

impl Deref for SharedStr {
  type Target = [u8];

  #[inline]
  fn deref(&self) -> &[u8] {
    self.as_bytes()
  }
}

impl AsRef<[u8]> for SharedStr {
  #[inline]
  fn as_ref(&self) -> &[u8] {
    self.as_bytes()
  }
}

impl Borrow<[u8]> for SharedStr {
  #[inline]
  fn borrow(&self) -> &[u8] {
    self.as_bytes()
  }
}

impl PartialEq for SharedStr {
  /// Handles sharing one record are equal without reading content;
  /// handles from unrelated pools fall back to a byte comparison
  #[inline]
  fn eq(&self, other: &SharedStr) -> bool {
    self.ptr_eq(other) || self.as_bytes() == other.as_bytes()
  }
}

impl Eq for SharedStr {}

impl PartialEq<[u8]> for SharedStr {
  #[inline]
  fn eq(&self, other: &[u8]) -> bool {
    self.as_bytes() == other
  }
}

impl PartialEq<str> for SharedStr {
  #[inline]
  fn eq(&self, other: &str) -> bool {
    self.as_bytes() == other.as_bytes()
  }
}

impl PartialEq<&str> for SharedStr {
  #[inline]
  fn eq(&self, other: &&str) -> bool {
    self.as_bytes() == other.as_bytes()
  }
}

impl PartialOrd for SharedStr {
  #[inline]
  fn partial_cmp(&self, other: &SharedStr) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for SharedStr {
  #[inline]
  fn cmp(&self, other: &SharedStr) -> Ordering {
    self.as_bytes().cmp(other.as_bytes())
  }
}

impl Hash for SharedStr {
  #[inline]
  fn hash<H: Hasher>(&self, state: &mut H) {
    Hash::hash(self.as_bytes(), state)
  }
}

impl fmt::Display for SharedStr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&String::from_utf8_lossy(self.as_bytes()), f)
  }
}

impl fmt::Debug for SharedStr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&String::from_utf8_lossy(self.as_bytes()), f)
  }
}
