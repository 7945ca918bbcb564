//! Blocking collective operations across cooperating processes.
//!
//! Every collective is a rendezvous: all ranks of a group must call the same
//! operation with buffers of the same length, in the same order. The
//! [`ThreadGroup`] backend runs the ranks as threads of one process and turns
//! the usual failure modes of a diverging rank (wrong buffer length, a rank
//! that stopped participating) into errors on every rank instead of a hang.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use tracing::warn;

use crate::errors::{ErrorInfo, QmcError};

/// Elementwise combination applied by a collective reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Elementwise sum.
    Sum,
    /// Elementwise maximum.
    Max,
    /// Elementwise minimum.
    Min,
}

/// Rank-aware handle onto a group of cooperating processes.
pub trait Communicator {
    /// Index of the calling process within the group.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Rank of the coordinating process that receives rooted results.
    fn master(&self) -> usize {
        0
    }

    /// Whether the calling process is the coordinator.
    fn is_master(&self) -> bool {
        self.rank() == self.master()
    }

    /// Combines `data` elementwise across all ranks, leaving the result on every rank.
    fn all_reduce_f64(&self, data: &mut [f64], op: ReduceOp) -> Result<(), QmcError>;

    /// Integer counterpart of [`Communicator::all_reduce_f64`].
    fn all_reduce_i64(&self, data: &mut [i64], op: ReduceOp) -> Result<(), QmcError>;

    /// Combines `data` towards `root`. Returns `true` on the rank holding the result.
    ///
    /// The contents of `data` on every other rank are unspecified afterwards.
    fn reduce_f64(&self, data: &mut [f64], op: ReduceOp, root: usize) -> Result<bool, QmcError> {
        self.all_reduce_f64(data, op)?;
        Ok(self.rank() == root)
    }

    /// Integer counterpart of [`Communicator::reduce_f64`].
    fn reduce_i64(&self, data: &mut [i64], op: ReduceOp, root: usize) -> Result<bool, QmcError> {
        self.all_reduce_i64(data, op)?;
        Ok(self.rank() == root)
    }
}

/// Trivial group containing only the calling process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl Communicator for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_f64(&self, _data: &mut [f64], _op: ReduceOp) -> Result<(), QmcError> {
        Ok(())
    }

    fn all_reduce_i64(&self, _data: &mut [i64], _op: ReduceOp) -> Result<(), QmcError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Payload {
    Real(Vec<f64>),
    Int(Vec<i64>),
}

trait Element: Copy {
    const KIND: &'static str;
    fn wrap(values: Vec<Self>) -> Payload;
    fn unwrap(payload: Payload) -> Option<Vec<Self>>;
    fn fold(op: ReduceOp, acc: Self, value: Self) -> Self;
}

impl Element for f64 {
    const KIND: &'static str = "f64";

    fn wrap(values: Vec<Self>) -> Payload {
        Payload::Real(values)
    }

    fn unwrap(payload: Payload) -> Option<Vec<Self>> {
        match payload {
            Payload::Real(values) => Some(values),
            Payload::Int(_) => None,
        }
    }

    fn fold(op: ReduceOp, acc: Self, value: Self) -> Self {
        match op {
            ReduceOp::Sum => acc + value,
            ReduceOp::Max => acc.max(value),
            ReduceOp::Min => acc.min(value),
        }
    }
}

impl Element for i64 {
    const KIND: &'static str = "i64";

    fn wrap(values: Vec<Self>) -> Payload {
        Payload::Int(values)
    }

    fn unwrap(payload: Payload) -> Option<Vec<Self>> {
        match payload {
            Payload::Int(values) => Some(values),
            Payload::Real(_) => None,
        }
    }

    fn fold(op: ReduceOp, acc: Self, value: Self) -> Self {
        match op {
            ReduceOp::Sum => acc + value,
            ReduceOp::Max => acc.max(value),
            ReduceOp::Min => acc.min(value),
        }
    }
}

#[derive(Debug)]
struct Round {
    slots: Vec<Option<Payload>>,
    arrived: usize,
    read: usize,
    draining: bool,
    departed: Option<usize>,
}

#[derive(Debug)]
struct Shared {
    size: usize,
    round: Mutex<Round>,
    signal: Condvar,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, Round>, QmcError> {
        self.round.lock().map_err(|_| poisoned())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Round>) -> Result<MutexGuard<'a, Round>, QmcError> {
        self.signal.wait(guard).map_err(|_| poisoned())
    }
}

fn poisoned() -> QmcError {
    QmcError::Collective(ErrorInfo::new(
        "lock-poisoned",
        "collective state poisoned by a panicking rank",
    ))
}

fn departed(peer: usize, rank: usize) -> QmcError {
    warn!(peer, rank, "collective abandoned by a departed rank");
    QmcError::Collective(
        ErrorInfo::new(
            "peer-departed",
            "a rank left the group before the collective completed",
        )
        .with_context("peer", peer.to_string())
        .with_context("rank", rank.to_string())
        .with_hint("every rank must visit the same leaves in the same order"),
    )
}

/// Builder for in-process communicator groups whose ranks are threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadGroup;

impl ThreadGroup {
    /// Creates `size` connected communicators, one per rank.
    pub fn new(size: usize) -> Vec<ThreadComm> {
        let shared = Arc::new(Shared {
            size,
            round: Mutex::new(Round {
                slots: vec![None; size],
                arrived: 0,
                read: 0,
                draining: false,
                departed: None,
            }),
            signal: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Runs `body` once per rank on its own scoped thread and collects the
    /// results in rank order. Panics are re-raised on the calling thread.
    pub fn run<R, F>(size: usize, body: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let comms = Self::new(size);
        let body = &body;
        thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| scope.spawn(move || body(comm)))
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

/// One rank of a [`ThreadGroup`].
///
/// Dropping the handle marks the rank as departed; any collective that still
/// waits for it fails with `peer-departed`.
#[derive(Debug)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    fn exchange(&self, payload: Payload) -> Result<Vec<Payload>, QmcError> {
        let shared = &*self.shared;
        let mut round = shared.lock()?;
        // the previous round is still being read by slower ranks
        while round.draining {
            if let Some(peer) = round.departed {
                return Err(departed(peer, self.rank));
            }
            round = shared.wait(round)?;
        }
        if let Some(peer) = round.departed {
            return Err(departed(peer, self.rank));
        }

        round.slots[self.rank] = Some(payload);
        round.arrived += 1;
        if round.arrived == shared.size {
            round.draining = true;
            shared.signal.notify_all();
        } else {
            while !round.draining {
                if let Some(peer) = round.departed {
                    return Err(departed(peer, self.rank));
                }
                round = shared.wait(round)?;
            }
        }

        let gathered: Vec<Payload> = round.slots.iter().flatten().cloned().collect();
        round.read += 1;
        if round.read == shared.size {
            round.slots.iter_mut().for_each(|slot| *slot = None);
            round.arrived = 0;
            round.read = 0;
            round.draining = false;
            shared.signal.notify_all();
        }
        Ok(gathered)
    }

    fn all_reduce<T: Element>(&self, data: &mut [T], op: ReduceOp) -> Result<(), QmcError> {
        let gathered = self.exchange(T::wrap(data.to_vec()))?;
        let mut combined: Option<Vec<T>> = None;
        for (peer, payload) in gathered.into_iter().enumerate() {
            let values = T::unwrap(payload).ok_or_else(|| {
                QmcError::Collective(
                    ErrorInfo::new("payload-kind", "ranks disagree on the element type")
                        .with_context("expected", T::KIND)
                        .with_context("peer", peer.to_string()),
                )
            })?;
            if values.len() != data.len() {
                return Err(QmcError::Collective(
                    ErrorInfo::new("payload-length", "ranks disagree on the buffer length")
                        .with_context("local", data.len().to_string())
                        .with_context("peer", peer.to_string())
                        .with_context("remote", values.len().to_string()),
                ));
            }
            match combined.as_mut() {
                None => combined = Some(values),
                Some(acc) => {
                    for (slot, value) in acc.iter_mut().zip(values) {
                        *slot = T::fold(op, *slot, value);
                    }
                }
            }
        }
        if let Some(result) = combined {
            data.copy_from_slice(&result);
        }
        Ok(())
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn all_reduce_f64(&self, data: &mut [f64], op: ReduceOp) -> Result<(), QmcError> {
        self.all_reduce(data, op)
    }

    fn all_reduce_i64(&self, data: &mut [i64], op: ReduceOp) -> Result<(), QmcError> {
        self.all_reduce(data, op)
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        let mut round = match self.shared.round.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        };
        if round.departed.is_none() {
            round.departed = Some(self.rank);
        }
        self.shared.signal.notify_all();
    }
}
