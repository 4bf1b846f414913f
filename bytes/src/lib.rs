//! Reference-counted byte buffers backing packet data.
//!
//! A [`Buffer`] is a shared allocation with cheap handle cloning. Mutable
//! access is granted only while the handle is the sole owner, which is how
//! packet copy-on-write is enforced one level up. Buffers may optionally be
//! tied to a [`BufferPool`], in which case the storage is handed back to the
//! pool rather than freed when the last handle drops; device drivers use this
//! to keep DMA-able regions in circulation.
//!
//! # Examples
//!
//! ```
//! use millrace_bytes::Buffer;
//!
//! let mut buffer = Buffer::alloc(64);
//! buffer.as_mut_slice().unwrap()[0] = 7;
//!
//! let shared = buffer.clone();
//! assert_eq!(buffer.ref_count(), 2);
//! assert!(buffer.as_mut_slice().is_none());
//!
//! drop(shared);
//! assert!(buffer.is_unique());
//! assert_eq!(buffer.as_slice()[0], 7);
//! ```
#![forbid(missing_docs)]

use std::sync::Arc;

/// A destination for buffer storage released by its last owner.
///
/// Pools are shared across threads; `recycle` is called from whichever thread
/// drops the final buffer handle.
pub trait BufferPool: Send + Sync {
    /// Accepts storage whose last `Buffer` handle has been dropped.
    fn recycle(&self, bytes: Box<[u8]>);
}

struct Inner {
    /// Always `Some` until `Inner` is dropped or recovered.
    bytes: Option<Box<[u8]>>,
    pool: Option<Arc<dyn BufferPool>>,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("bytes", &self.bytes)
            .field("pool", &self.pool.as_ref().map(|_| "<pool>"))
            .finish()
    }
}

impl Inner {
    fn slice(&self) -> &[u8] {
        self.bytes.as_deref().unwrap_or(&[])
    }

    fn slice_mut(&mut self) -> &mut [u8] {
        self.bytes.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let (Some(bytes), Some(pool)) = (self.bytes.take(), self.pool.take()) {
            pool.recycle(bytes);
        }
    }
}

/// A reference-counted byte buffer.
///
/// Cloning a `Buffer` shares the underlying allocation. The contents are
/// readable from any handle; they are writable only through a handle that is
/// the unique owner.
#[derive(Debug)]
pub struct Buffer {
    inner: Arc<Inner>,
}

impl Buffer {
    /// Allocates a zero-filled buffer of `len` bytes.
    pub fn alloc(len: usize) -> Buffer {
        Buffer::from_storage(vec![0u8; len].into_boxed_slice())
    }

    /// Wraps caller-provided storage.
    pub fn from_storage(bytes: Box<[u8]>) -> Buffer {
        Buffer {
            inner: Arc::new(Inner { bytes: Some(bytes), pool: None }),
        }
    }

    /// Wraps caller-provided storage that returns to `pool` when the last
    /// handle drops.
    pub fn from_pool(bytes: Box<[u8]>, pool: Arc<dyn BufferPool>) -> Buffer {
        Buffer {
            inner: Arc::new(Inner { bytes: Some(bytes), pool: Some(pool) }),
        }
    }

    /// The allocation length in bytes.
    pub fn len(&self) -> usize {
        self.inner.slice().len()
    }

    /// True when the allocation is zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access to the full allocation.
    pub fn as_slice(&self) -> &[u8] {
        self.inner.slice()
    }

    /// Write access to the full allocation, available only while this handle
    /// is the sole owner.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.inner).map(Inner::slice_mut)
    }

    /// True when no other handle shares the allocation.
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// The number of handles sharing the allocation.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Recovers the underlying storage if this handle is the sole owner,
    /// or returns the handle unchanged if it is not.
    ///
    /// Recovered storage is detached from any pool; the caller owns it.
    pub fn try_recover(self) -> Result<Box<[u8]>, Buffer> {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.pool = None;
                Ok(inner.bytes.take().unwrap_or_default())
            }
            Err(inner) => Err(Buffer { inner }),
        }
    }
}

impl Clone for Buffer {
    fn clone(&self) -> Buffer {
        Buffer { inner: Arc::clone(&self.inner) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn sharing_blocks_mutation() {
        let mut a = Buffer::alloc(16);
        assert!(a.as_mut_slice().is_some());
        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        assert!(a.as_mut_slice().is_none());
        drop(b);
        assert!(a.as_mut_slice().is_some());
    }

    #[test]
    fn recover_unique_only() {
        let a = Buffer::alloc(8);
        let b = a.clone();
        let a = a.try_recover().unwrap_err();
        drop(b);
        let bytes = a.try_recover().unwrap();
        assert_eq!(bytes.len(), 8);
    }

    struct CountingPool {
        recycled: Mutex<Vec<usize>>,
    }

    impl BufferPool for CountingPool {
        fn recycle(&self, bytes: Box<[u8]>) {
            self.recycled.lock().unwrap().push(bytes.len());
        }
    }

    #[test]
    fn last_drop_recycles_into_pool() {
        let pool = Arc::new(CountingPool { recycled: Mutex::new(Vec::new()) });
        let a = Buffer::from_pool(vec![0u8; 32].into_boxed_slice(), pool.clone());
        let b = a.clone();
        drop(a);
        assert!(pool.recycled.lock().unwrap().is_empty());
        drop(b);
        assert_eq!(*pool.recycled.lock().unwrap(), vec![32]);
    }

    #[test]
    fn recovered_storage_skips_pool() {
        let pool = Arc::new(CountingPool { recycled: Mutex::new(Vec::new()) });
        let a = Buffer::from_pool(vec![0u8; 4].into_boxed_slice(), pool.clone());
        let bytes = a.try_recover().unwrap();
        assert_eq!(bytes.len(), 4);
        assert!(pool.recycled.lock().unwrap().is_empty());
    }
}
