//! Thin façade over in-process (thread group) or inter-process (MPI) message passing.
//!
//! Messages are contiguous byte slices. Handles are non-blocking until
//! `.wait()`; the collectives in [`crate::algs::collective`] always drain every
//! handle they post, even on error. Messages between a given (source,
//! destination, tag) triple are delivered in FIFO order.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Typed message tag. Each collective operation uses its own tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Tag offset from this one, for the second phase of a two-phase exchange.
    pub const fn offset(self, by: u16) -> Self {
        CommTag(self.0.wrapping_add(by))
    }
}

/// Non-blocking point-to-point communication within one process group.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Rank of the calling process within the group.
    fn rank(&self) -> usize;
    /// Number of processes in the group.
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of exactly `buf.len()` bytes. The data is returned by `wait`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator; collectives never post messages on it.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

// --- ThreadComm: a group of ranks living on threads of one process ---

type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = DashMap<Key, VecDeque<Bytes>>;

/// Default time a receive waits before reporting a lost message.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// One rank of an in-process communication group.
///
/// Create a whole group with [`ThreadComm::group`] and move one handle into
/// each thread. Groups do not share mailboxes, so independent groups (e.g.
/// concurrently running tests) never see each other's messages.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    timeout: Duration,
}

impl ThreadComm {
    pub fn group(size: usize) -> Vec<ThreadComm> {
        Self::group_with_timeout(size, DEFAULT_RECV_TIMEOUT)
    }

    pub fn group_with_timeout(size: usize, timeout: Duration) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::new());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                timeout,
            })
            .collect()
    }
}

/// Run `f` on every rank of a fresh thread group; results by rank.
#[cfg(test)]
pub(crate) fn on_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ThreadComm) -> R + Sync,
{
    let group = ThreadComm::group(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = group.into_iter().map(|c| s.spawn(|| f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Receive handle of a [`ThreadComm`]; polls the shared mailbox on `wait`.
pub struct LocalHandle {
    key: Key,
    len: usize,
    mailbox: Arc<Mailbox>,
    timeout: Duration,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let start = Instant::now();
        loop {
            let popped = self
                .mailbox
                .get_mut(&self.key)
                .and_then(|mut queue| queue.pop_front());
            if let Some(bytes) = popped {
                let n = self.len.min(bytes.len());
                return Some(bytes[..n].to_vec());
            }
            if start.elapsed() > self.timeout {
                log::warn!(
                    "receive from rank {} (tag {}) timed out on rank {}",
                    self.key.0,
                    self.key.2,
                    self.key.1
                );
                return None;
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        self.mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            len: buf.len(),
            mailbox: Arc::clone(&self.mailbox),
            timeout: self.timeout,
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// MPI communicator handle. Works on the world or on any sub-communicator.
    pub struct MpiComm {
        _universe: Option<Arc<Universe>>,
        pub world: SimpleCommunicator,
        pub rank: usize,
    }

    impl MpiComm {
        /// Initialize MPI and wrap `MPI_COMM_WORLD`. Returns `None` if MPI was
        /// already initialized elsewhere.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            Some(Self {
                _universe: Some(Arc::new(universe)),
                world,
                rank,
            })
        }

        /// Wrap an existing communicator (e.g. a split sub-group).
        pub fn from_communicator(comm: SimpleCommunicator) -> Self {
            let rank = comm.rank() as usize;
            Self {
                _universe: None,
                world: comm,
                rank,
            }
        }
    }

    /// Request over a heap buffer owned by the handle until completion.
    pub struct MpiHandle {
        request: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
        is_recv: bool,
    }

    impl Wait for MpiHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.request.wait();
            // SAFETY: `buf` was leaked from a Box in isend/irecv and the request
            // referencing it has completed.
            let data = unsafe { Box::from_raw(self.buf) };
            self.is_recv.then(|| data.into_vec())
        }
    }

    // SAFETY (both helpers): the box is reclaimed exactly once in `MpiHandle::wait`.
    fn leak_shared(buf: Vec<u8>) -> (*mut [u8], &'static [u8]) {
        let raw = Box::into_raw(buf.into_boxed_slice());
        (raw, unsafe { &*raw })
    }

    fn leak_mut(buf: Vec<u8>) -> (*mut [u8], &'static mut [u8]) {
        let raw = Box::into_raw(buf.into_boxed_slice());
        (raw, unsafe { &mut *raw })
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }
        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let (raw, data) = leak_shared(buf.to_vec());
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, tag as i32);
            MpiHandle {
                request,
                buf: raw,
                is_recv: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let (raw, data) = leak_mut(vec![0u8; buf.len()]);
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, data, tag as i32);
            MpiHandle {
                request,
                buf: raw,
                is_recv: true,
            }
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_comm_round_trip() {
        let group = ThreadComm::group(2);
        let (c0, c1) = (&group[0], &group[1]);
        let mut recv_buf = [0u8; 4];
        let h = c1.irecv(0, 7, &mut recv_buf);
        c0.isend(1, 7, &[1, 2, 3, 4]);
        let data = h.wait().expect("expected data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn thread_comm_is_fifo_per_tag() {
        let group = ThreadComm::group(2);
        for i in 0..5u8 {
            group[0].isend(1, 3, &[i]);
        }
        let got: Vec<u8> = (0..5)
            .map(|_| {
                let mut b = [0u8; 1];
                group[1].irecv(0, 3, &mut b).wait().unwrap()[0]
            })
            .collect();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn groups_are_isolated() {
        let a = ThreadComm::group_with_timeout(2, Duration::from_millis(50));
        let b = ThreadComm::group_with_timeout(2, Duration::from_millis(50));
        a[0].isend(1, 1, &[9]);
        let mut buf = [0u8; 1];
        assert!(b[1].irecv(0, 1, &mut buf).wait().is_none());
        assert_eq!(a[1].irecv(0, 1, &mut buf).wait(), Some(vec![9]));
    }

    #[test]
    fn no_comm_is_a_single_rank() {
        let c = NoComm;
        assert_eq!((c.rank(), c.size()), (0, 1));
    }
}
