use std::{
  alloc::{alloc, dealloc, handle_alloc_error},
  ffi::CStr,
  fmt,
  os::raw::c_char,
  ptr::{self, NonNull},
  slice,
  sync::atomic::{AtomicU32, Ordering},
};

use crate::utils::{make_record_layout, record_len_offset, record_payload_offset};

/// The header of a canonical record. The count tracks the number of
/// live handles bound to the record; the pool's own map entry is not
/// counted.
#[derive(Debug)]
#[repr(C)]
pub struct RecordHeader {
  refs: AtomicU32,
}

impl RecordHeader {
  /// Create a header for a freshly allocated record. The count starts
  /// at one for the handle that requested the allocation.
  pub fn new() -> Self {
    Self {
      refs: AtomicU32::new(1),
    }
  }
}

impl Default for RecordHeader {
  fn default() -> Self {
    Self::new()
  }
}

/// A non owning reference to a canonical record. Note this reference
/// is the same size as a single pointer.
///
/// The record is a single contiguous allocation: header, length, then
/// the payload bytes followed by a nul terminator. The payload is
/// never mutated after construction.
pub struct RecordRef {
  /// Pointer to the start of the record allocation
  ptr: NonNull<u8>,
}

impl RecordRef {
  /// Retrieve the header of this record
  #[inline]
  pub fn header(&self) -> &RecordHeader {
    #[allow(clippy::cast_ptr_alignment)]
    unsafe {
      &*(self.ptr.as_ptr() as *const RecordHeader)
    }
  }

  /// Retrieve the stored content length, excluding the terminator
  #[inline]
  pub fn len(&self) -> usize {
    let count = record_len_offset::<RecordHeader>();

    #[allow(clippy::cast_ptr_alignment)]
    unsafe {
      *(self.ptr.as_ptr().add(count) as *const usize)
    }
  }

  /// Retrieve a pointer to the payload bytes
  #[inline]
  fn data(&self) -> *mut u8 {
    let count = record_payload_offset::<RecordHeader>();
    unsafe { self.ptr.as_ptr().add(count) }
  }

  /// Get a raw pointer to the allocation, used for identity checks
  #[inline]
  pub fn as_alloc_ptr(&self) -> *const u8 {
    self.ptr.as_ptr()
  }

  /// View of the full content, length bounded. Embedded nul bytes are
  /// included.
  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    unsafe { slice::from_raw_parts(self.data(), self.len()) }
  }

  /// View of the terminated payload, ending at the first nul byte
  #[inline]
  pub fn as_c_str(&self) -> &CStr {
    unsafe { CStr::from_ptr(self.data() as *const c_char) }
  }

  /// Get a static view of the payload bytes, used as this record's
  /// key in the pool's table.
  ///
  /// ## Safety
  /// The slice is only truly `'static` while the record is live. The
  /// caller must drop the slice strictly before the record's storage
  /// is released.
  pub unsafe fn deref_static(&self) -> &'static [u8] {
    slice::from_raw_parts(self.data(), self.len())
  }

  /// Current reference count
  #[inline]
  pub fn refs(&self) -> u32 {
    self.header().refs.load(Ordering::Acquire)
  }

  /// Add one reference. The caller must already hold a reference or
  /// the table lock, so the count is at least one going in.
  #[inline]
  pub fn increment(&self) {
    self.header().refs.fetch_add(1, Ordering::Relaxed);
  }

  /// Drop one reference, returning the post decrement count. Must be
  /// called with the table lock held, where a zero result is safe to
  /// act on.
  #[inline]
  pub fn decrement(&self) -> u32 {
    let previous = self.header().refs.fetch_sub(1, Ordering::AcqRel);
    debug_assert!(previous != 0, "decrement of an unreferenced record");
    previous - 1
  }

  /// Try to drop one reference outside the table lock. Only valid for
  /// `observed > 1` so the count cannot transition to zero here. On
  /// failure returns the freshly observed count.
  #[inline]
  pub fn decrement_if_shared(&self, observed: u32) -> Result<(), u32> {
    debug_assert!(observed > 1, "lock free decrement may not reach zero");

    self
      .header()
      .refs
      .compare_exchange(observed, observed - 1, Ordering::AcqRel, Ordering::Acquire)
      .map(|_| ())
  }
}

impl Copy for RecordRef {}
impl Clone for RecordRef {
  fn clone(&self) -> Self {
    *self
  }
}

impl PartialEq<RecordRef> for RecordRef {
  /// Records compare by identity, one record exists per content
  #[inline]
  fn eq(&self, other: &RecordRef) -> bool {
    ptr::eq(self.as_alloc_ptr(), other.as_alloc_ptr())
  }
}

impl Eq for RecordRef {}

impl fmt::Debug for RecordRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecordRef")
      .field("refs", &self.refs())
      .field("bytes", &self.as_bytes())
      .finish()
  }
}

impl fmt::Pointer for RecordRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.ptr.fmt(f)
  }
}

unsafe impl Send for RecordRef {}
unsafe impl Sync for RecordRef {}

/// An owning reference to a canonical record. Dropping the handle
/// releases the record's storage, so the pool only drops it after the
/// count reached zero and the table entry is erased.
pub struct RecordHandle(RecordRef);

impl RecordHandle {
  /// Allocate the record for `content`, copying the bytes and
  /// appending the terminator. The count starts at one.
  ///
  /// Allocation failure aborts through `handle_alloc_error`, no
  /// partially constructed record is ever observable.
  pub fn from_bytes(content: &[u8]) -> Self {
    debug_assert!(!content.is_empty(), "empty content has no record");

    let len = content.len();
    let layout = make_record_layout::<RecordHeader>(len);
    let buf = unsafe { alloc(layout) };

    if buf.is_null() {
      handle_alloc_error(layout);
    }

    #[allow(clippy::cast_ptr_alignment)]
    unsafe {
      ptr::write(buf as *mut RecordHeader, RecordHeader::new());
      ptr::write(
        buf.add(record_len_offset::<RecordHeader>()) as *mut usize,
        len,
      );

      let data = buf.add(record_payload_offset::<RecordHeader>());
      ptr::copy_nonoverlapping(content.as_ptr(), data, len);
      ptr::write(data.add(len), 0);

      RecordHandle(RecordRef {
        ptr: NonNull::new_unchecked(buf),
      })
    }
  }

  /// Create a non owning reference to this record
  #[inline]
  pub fn value(&self) -> RecordRef {
    self.0
  }

  /// The size in bytes of the record's allocation
  #[inline]
  pub fn size(&self) -> usize {
    make_record_layout::<RecordHeader>(self.0.len()).size()
  }
}

impl Drop for RecordHandle {
  fn drop(&mut self) {
    unsafe {
      dealloc(
        self.0.ptr.as_ptr(),
        make_record_layout::<RecordHeader>(self.0.len()),
      );
    }
  }
}

unsafe impl Send for RecordHandle {}
unsafe impl Sync for RecordHandle {}
