use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;

use crate::buffer::Metadata;
use crate::io::IoMethod;

/// Where the bytes of a buffer live
pub enum Backing<M> {
    /// Driver memory mapped into the process
    Mapped(M),
    /// Memory allocated by the process
    Host(Vec<u8>),
}

impl<M: Deref<Target = [u8]>> Backing<M> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Mapped(map) => map,
            Backing::Host(vec) => vec,
        }
    }
}

impl<M> fmt::Debug for Backing<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backing::Mapped(_) => write!(f, "Mapped"),
            Backing::Host(vec) => write!(f, "Host({} bytes)", vec.len()),
        }
    }
}

/// Ownership of a buffer while a session runs
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferState {
    /// Not handed to the driver yet, or taken back by stopping the stream
    Idle,
    /// Owned by the driver, waiting to be filled
    Queued,
    /// Filled and waiting in the ready-queue
    Ready,
    /// Lent to the consumer as the current frame
    Borrowed,
}

#[derive(Debug)]
pub struct Buffer<M> {
    index: usize,
    backing: Backing<M>,
    state: BufferState,
    meta: Metadata,
}

impl<M: Deref<Target = [u8]>> Buffer<M> {
    pub fn new(index: usize, backing: Backing<M>) -> Self {
        Buffer {
            index,
            backing,
            state: BufferState::Idle,
            meta: Metadata::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    /// Metadata of the last frame this buffer held
    pub fn meta(&self) -> &Metadata {
        &self.meta
    }

    pub fn backing(&self) -> &Backing<M> {
        &self.backing
    }

    /// All bytes of the buffer
    pub fn data(&self) -> &[u8] {
        self.backing.as_slice()
    }

    /// The part of the buffer the driver filled in
    pub fn payload(&self) -> &[u8] {
        let data = self.data();
        match self.meta.bytesused as usize {
            0 => data,
            used => &data[..used.min(data.len())],
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn host_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.backing {
            Backing::Host(vec) => Some(vec),
            Backing::Mapped(_) => None,
        }
    }

    /// Address the driver reports back for user pointer buffers
    pub(crate) fn address(&self) -> usize {
        self.data().as_ptr() as usize
    }
}

/// Why [`BufferPool::check_invariant`] failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// An index appears more than once in the ready-queue
    DuplicateReady(usize),
    /// The ready-queue and the buffer states disagree
    ReadyMismatch(usize),
    /// The borrowed slot and the buffer states disagree
    BorrowMismatch(usize),
    /// Some buffers are accounted for by the stream and some are not
    Unaccounted { idle: usize, total: usize },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::DuplicateReady(i) => write!(f, "buffer {} queued as ready twice", i),
            InvariantViolation::ReadyMismatch(i) => write!(f, "ready-queue disagrees on buffer {}", i),
            InvariantViolation::BorrowMismatch(i) => write!(f, "borrow slot disagrees on buffer {}", i),
            InvariantViolation::Unaccounted { idle, total } => {
                write!(f, "{} of {} buffers idle while streaming", idle, total)
            }
        }
    }
}

/// Fixed set of frame buffers plus the queue of filled ones
///
/// Buffers are addressed by their driver index. Filled buffers wait in a FIFO ready-queue and
/// at most one buffer is lent to the consumer at a time.
pub struct BufferPool<M> {
    method: IoMethod,
    bufs: Vec<Buffer<M>>,
    ready: VecDeque<usize>,
    borrowed: Option<usize>,
}

impl<M: Deref<Target = [u8]>> BufferPool<M> {
    pub fn new(method: IoMethod, bufs: Vec<Buffer<M>>) -> Self {
        let capacity = bufs.len();
        BufferPool {
            method,
            bufs,
            ready: VecDeque::with_capacity(capacity),
            borrowed: None,
        }
    }

    pub fn method(&self) -> IoMethod {
        self.method
    }

    pub fn len(&self) -> usize {
        self.bufs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bufs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Buffer<M>> {
        self.bufs.get(index)
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Buffer<M>> {
        self.bufs.iter()
    }

    /// Indices of filled buffers, oldest first
    pub fn ready(&self) -> impl Iterator<Item = usize> + '_ {
        self.ready.iter().copied()
    }

    pub fn borrowed(&self) -> Option<usize> {
        self.borrowed
    }

    /// Number of buffers in the given state
    pub fn count(&self, state: BufferState) -> usize {
        self.bufs.iter().filter(|buf| buf.state == state).count()
    }

    /// Verifies that every buffer is accounted for exactly once.
    ///
    /// Ready-queue and borrowed slot must agree with the buffer states, no index may be
    /// ready twice, and as soon as any buffer is in use by the stream, none may be idle.
    pub fn check_invariant(&self) -> Result<(), InvariantViolation> {
        for (pos, &index) in self.ready.iter().enumerate() {
            if self.ready.iter().skip(pos + 1).any(|&other| other == index) {
                return Err(InvariantViolation::DuplicateReady(index));
            }
        }

        for buf in &self.bufs {
            let in_ready = self.ready.contains(&buf.index);
            if in_ready != (buf.state == BufferState::Ready) {
                return Err(InvariantViolation::ReadyMismatch(buf.index));
            }
            let is_borrowed = self.borrowed == Some(buf.index);
            if is_borrowed != (buf.state == BufferState::Borrowed) {
                return Err(InvariantViolation::BorrowMismatch(buf.index));
            }
        }

        let idle = self.count(BufferState::Idle);
        if idle != 0 && idle != self.bufs.len() {
            return Err(InvariantViolation::Unaccounted {
                idle,
                total: self.bufs.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn buffer_mut(&mut self, index: usize) -> Option<&mut Buffer<M>> {
        self.bufs.get_mut(index)
    }

    pub(crate) fn mark_queued(&mut self, index: usize) {
        if let Some(buf) = self.bufs.get_mut(index) {
            buf.state = BufferState::Queued;
        }
    }

    /// Appends a freshly dequeued buffer to the ready-queue.
    pub(crate) fn push_ready(&mut self, index: usize, meta: Metadata) {
        if let Some(buf) = self.bufs.get_mut(index) {
            buf.state = BufferState::Ready;
            buf.meta = meta;
            self.ready.push_back(index);
        }
    }

    /// Lends the oldest ready buffer to the consumer.
    ///
    /// Returns `None` if nothing is ready or a buffer is still lent out.
    pub(crate) fn borrow_oldest(&mut self) -> Option<usize> {
        if self.borrowed.is_some() {
            return None;
        }
        let index = self.ready.pop_front()?;
        self.bufs[index].state = BufferState::Borrowed;
        self.borrowed = Some(index);
        Some(index)
    }

    /// Takes the borrowed buffer back from the consumer.
    ///
    /// The buffer keeps the `Borrowed` state until the caller has handed it to the driver.
    pub(crate) fn take_borrowed(&mut self) -> Option<usize> {
        self.borrowed.take()
    }

    /// Puts a buffer back into the borrowed slot after handing it back to the driver failed.
    pub(crate) fn restore_borrowed(&mut self, index: usize) {
        self.borrowed = Some(index);
    }

    /// Drops all queue bookkeeping and returns every buffer to `Idle`.
    pub(crate) fn reset(&mut self) {
        self.ready.clear();
        self.borrowed = None;
        for buf in &mut self.bufs {
            buf.state = BufferState::Idle;
        }
    }

    /// Finds the buffer whose host memory starts at `address`.
    pub(crate) fn index_of_address(&self, address: usize) -> Option<usize> {
        self.bufs
            .iter()
            .find(|buf| buf.address() == address)
            .map(|buf| buf.index)
    }
}

impl<M> fmt::Debug for BufferPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("method", &self.method)
            .field("buffers", &self.bufs.len())
            .field("ready", &self.ready)
            .field("borrowed", &self.borrowed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::sim::SimMapping;

    fn host_pool(n: usize) -> BufferPool<SimMapping> {
        let bufs = (0..n)
            .map(|i| Buffer::new(i, Backing::Host(vec![0; 16])))
            .collect();
        BufferPool::new(IoMethod::UserPointer, bufs)
    }

    #[test]
    fn ready_queue_is_fifo() {
        let mut pool = host_pool(3);
        assert!(pool.check_invariant().is_ok());

        for i in 0..3 {
            pool.mark_queued(i);
        }
        pool.push_ready(2, Metadata::default());
        pool.push_ready(0, Metadata::default());
        assert!(pool.check_invariant().is_ok());

        assert_eq!(pool.borrow_oldest(), Some(2));
        // only one buffer may be lent out
        assert_eq!(pool.borrow_oldest(), None);
        assert_eq!(pool.count(BufferState::Borrowed), 1);
        assert_eq!(pool.ready().collect::<Vec<_>>(), vec![0]);
        assert!(pool.check_invariant().is_ok());
    }

    #[test]
    fn partially_idle_pool_is_rejected() {
        let mut pool = host_pool(2);
        pool.mark_queued(0);
        assert_eq!(
            pool.check_invariant(),
            Err(InvariantViolation::Unaccounted { idle: 1, total: 2 })
        );
    }

    #[test]
    fn payload_honours_bytesused() {
        let mut pool = host_pool(1);
        let mut meta = Metadata::default();
        meta.bytesused = 4;
        pool.mark_queued(0);
        pool.push_ready(0, meta);
        let buf = pool.get(0).unwrap();
        assert_eq!(buf.payload().len(), 4);
        assert_eq!(buf.len(), 16);
    }
}
