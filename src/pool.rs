//! Reusable buffers and frames.
//!
//! Buffers are pooled per size in a process-wide registry. Frames handed out on
//! the read path come from a single process-wide pool. Pools are capped, so an
//! idle pool never holds more than its capacity, and they are advisory: a
//! checkout from an empty pool simply allocates.

use std::{
    collections::HashMap,
    fmt,
    ops::{Deref, DerefMut},
    sync::{Arc, LazyLock},
};

use parking_lot::Mutex;

use crate::frame::FrameBuf;

/// Number of idle buffers kept per size.
pub const BUFFER_POOL_CAPACITY: usize = 256;

/// Number of idle frames kept.
pub const FRAME_POOL_CAPACITY: usize = 1024;

static BUFFERS: LazyLock<Mutex<HashMap<usize, Arc<Pool<Vec<u8>>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static FRAMES: LazyLock<Arc<Pool<FrameBuf>>> =
    LazyLock::new(|| Arc::new(Pool::new(FRAME_POOL_CAPACITY, FrameBuf::default)));

/// Resets an object before it re-enters a pool.
pub trait Recycle {
    /// Clears any state that must not leak to the next user.
    fn recycle(&mut self);
}

// Scratch buffers are always overwritten before they are read.
impl Recycle for Vec<u8> {
    fn recycle(&mut self) {}
}

/// A capped free list.
pub struct Pool<T> {
    items: Mutex<Vec<T>>,
    capacity: usize,
    init: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.items.lock().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T: Recycle> Pool<T> {
    /// Creates an empty pool keeping at most `capacity` idle items.
    pub fn new(capacity: usize, init: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            capacity,
            init: Box::new(init),
        }
    }

    /// Checks an item out, constructing a new one if the pool is empty.
    pub fn get(self: &Arc<Self>) -> Pooled<T> {
        let item = self.items.lock().pop();

        Pooled {
            item: Some(item.unwrap_or_else(|| (self.init)())),
            pool: Arc::clone(self),
        }
    }

    /// Recycles `item` and keeps it if the pool is below capacity.
    pub fn put(&self, mut item: T) {
        item.recycle();

        let mut items = self.items.lock();

        if items.len() < self.capacity {
            items.push(item);
        }
    }

    /// Returns the number of idle items.
    pub fn idle(&self) -> usize {
        self.items.lock().len()
    }
}

/// An item checked out of a [`Pool`], returned to it on drop.
#[derive(Debug)]
pub struct Pooled<T: Recycle> {
    item: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("Item is only taken on drop"),
        }
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("Item is only taken on drop"),
        }
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.put(item);
        }
    }
}

/// Returns the process-wide pool of `size`-byte buffers, creating it on first use.
pub fn buffers(size: usize) -> Arc<Pool<Vec<u8>>> {
    let mut registry = BUFFERS.lock();

    let pool = registry.entry(size).or_insert_with(|| {
        tracing::debug!(size, "Creating buffer pool");

        Arc::new(Pool::new(BUFFER_POOL_CAPACITY, move || vec![0; size]))
    });

    Arc::clone(pool)
}

/// Checks a frame out of the process-wide frame pool.
pub fn frame() -> Pooled<FrameBuf> {
    FRAMES.get()
}

/// A connection's scratch buffer: owned for its whole life, or borrowed from
/// the size-keyed registry per operation.
#[derive(Debug)]
pub(crate) enum Scratch {
    Owned(Vec<u8>),
    Shared {
        size: usize,
        pool: Arc<Pool<Vec<u8>>>,
    },
}

impl Scratch {
    pub(crate) fn new(size: usize, shared: bool) -> Self {
        match shared {
            false => Scratch::Owned(vec![0; size]),
            true => Scratch::Shared {
                size,
                pool: buffers(size),
            },
        }
    }

    /// Returns a buffer for an operation needing `needed` bytes.
    ///
    /// A one-off buffer is handed out when `needed` exceeds the scratch size, so
    /// neither owned nor pooled buffers grow past it.
    pub(crate) fn checkout(&mut self, needed: usize) -> ScratchBuf<'_> {
        match self {
            Scratch::Owned(buf) if needed > buf.len() => ScratchBuf::OneOff(Vec::new()),
            Scratch::Owned(buf) => ScratchBuf::Owned(buf),
            Scratch::Shared { size, .. } if needed > *size => ScratchBuf::OneOff(Vec::new()),
            Scratch::Shared { pool, .. } => ScratchBuf::Pooled(pool.get()),
        }
    }

    pub(crate) fn release(&mut self) {
        if let Scratch::Owned(buf) = self {
            *buf = Vec::new();
        }
    }
}

#[derive(Debug)]
pub(crate) enum ScratchBuf<'a> {
    Owned(&'a mut Vec<u8>),
    Pooled(Pooled<Vec<u8>>),
    OneOff(Vec<u8>),
}

impl Deref for ScratchBuf<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        match self {
            ScratchBuf::Owned(buf) => buf,
            ScratchBuf::Pooled(buf) => buf,
            ScratchBuf::OneOff(buf) => buf,
        }
    }
}

impl DerefMut for ScratchBuf<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        match self {
            ScratchBuf::Owned(buf) => buf,
            ScratchBuf::Pooled(buf) => buf,
            ScratchBuf::OneOff(buf) => buf,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use crate::{OpCode, frame::Frame};

    #[derive(Debug, Default)]
    struct Counter(usize);

    impl Recycle for Counter {
        fn recycle(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn returned_items_are_recycled_and_reused() {
        let pool = Arc::new(Pool::new(4, Counter::default));

        {
            let mut counter = pool.get();
            counter.0 = 42;
        }

        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.get().0, 0);
    }

    #[test]
    fn idle_items_are_capped() {
        let pool = Arc::new(Pool::new(2, Counter::default));

        let items: Vec<_> = (0..5).map(|_| pool.get()).collect();

        assert_eq!(pool.idle(), 0);

        drop(items);

        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn same_size_same_pool() {
        assert!(Arc::ptr_eq(&buffers(4242), &buffers(4242)));
        assert!(!Arc::ptr_eq(&buffers(4242), &buffers(4243)));
    }

    #[test]
    fn pooled_buffers_have_their_size() {
        assert_eq!(buffers(77).get().len(), 77);
    }

    #[test]
    fn recycled_frame_is_empty() {
        let mut dst = Vec::new();
        let bytes = Frame::new(true, OpCode::Text, b"pooled").marshal(&mut dst);
        let mut src = BytesMut::from(bytes);

        {
            let mut frame = frame();
            assert!(frame.decode(&mut src, None).unwrap());
            assert_eq!(&frame.payload()[..], b"pooled");
        }

        assert_eq!(*frame(), FrameBuf::default());
    }

    #[test]
    fn shared_scratch_hands_out_one_off_buffers_for_large_frames() {
        let mut scratch = Scratch::new(64, true);

        assert!(matches!(scratch.checkout(64), ScratchBuf::Pooled(ref buf) if buf.len() == 64));
        assert!(matches!(scratch.checkout(65), ScratchBuf::OneOff(_)));
    }

    #[test]
    fn owned_scratch_keeps_its_size() {
        let mut scratch = Scratch::new(64, false);

        let payload = [0xAB; 100];
        let frame = Frame::new(true, OpCode::Binary, &payload).with_mask(Some([1, 2, 3, 4]));

        {
            let mut buf = scratch.checkout(frame.size());

            assert!(matches!(buf, ScratchBuf::OneOff(_)));
            assert_eq!(frame.marshal(&mut buf).len(), frame.size());
        }

        let frame = Frame::new(true, OpCode::Binary, &payload[..16]);

        {
            let mut buf = scratch.checkout(frame.size());

            assert!(matches!(buf, ScratchBuf::Owned(_)));
            assert_eq!(frame.marshal(&mut buf).len(), 18);
        }

        assert!(matches!(scratch, Scratch::Owned(ref buf) if buf.len() == 64 && buf.capacity() == 64));
    }

    #[test]
    fn owned_scratch_is_released() {
        let mut scratch = Scratch::new(64, false);

        assert_eq!(scratch.checkout(64).len(), 64);

        scratch.release();

        assert_eq!(scratch.checkout(0).capacity(), 0);
    }
}
