use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    task::Poll,
};

use futures_util::{future::poll_fn, task::AtomicWaker};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Side {
    Read,
    Write,
}

/// One-shot close flag that wakes whoever is blocked on the transport.
#[derive(Debug, Default)]
pub(crate) struct CloseSignal {
    closed: AtomicBool,
    read: AtomicWaker,
    write: AtomicWaker,
}

impl CloseSignal {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sets the flag. Returns `true` only for the caller that flipped it.
    pub(crate) fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);

        if first {
            self.read.wake();
            self.write.wake();
        }

        first
    }

    /// Resolves once the flag is set.
    pub(crate) fn closed(&self, side: Side) -> impl Future<Output = ()> + '_ {
        let waker = match side {
            Side::Read => &self.read,
            Side::Write => &self.write,
        };

        poll_fn(move |cx| {
            waker.register(cx.waker());

            match self.is_closed() {
                true => Poll::Ready(()),
                false => Poll::Pending,
            }
        })
    }
}
