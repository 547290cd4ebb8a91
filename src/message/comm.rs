use serde::{Deserialize, Serialize};
use crate::error::Error;
use super::util;




/// Label attached to every message, so that a receiver can pick out the
/// message it is waiting for from whatever else has arrived. Transfers
/// belonging to different domains or refinement levels never share a tag,
/// even when the domains live on the same pair of processes.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Reductions among the processes sharing one domain
    Collective { level: usize, domain: usize },
    /// Reductions and barriers among all processes
    World,
    /// Hand-off of the attenuated flux plane between pipeline stages
    Pipeline { level: usize, domain: usize, stage: usize },
    /// Flux face sent from a parent domain to a child domain one level finer
    Flux { level: usize, parent: usize, child: usize },
}




/// An ordered subset of the ranks in a communicator. Collective operations
/// are performed over a group; position zero is the root.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    ranks: Vec<usize>,
}

impl Group {
    pub fn new(ranks: Vec<usize>) -> Self {
        Self { ranks }
    }

    /// The group of all ranks `0..size`.
    ///
    pub fn world(size: usize) -> Self {
        Self { ranks: (0..size).collect() }
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn ranks(&self) -> &[usize] {
        &self.ranks
    }

    /// Return the position of a rank within the group, if it is a member.
    ///
    pub fn position(&self, rank: usize) -> Option<usize> {
        self.ranks.iter().position(|&r| r == rank)
    }

    fn rank_at(&self, position: usize) -> usize {
        self.ranks[position]
    }
}




/// Interface for a group of processes that can exchange messages. The
/// underlying transport can in principle be TCP, in-process channels, or a
/// higher level abstraction like MPI.
///
pub trait Communicator {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peers processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted.
    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error>;

    /// Must be implemented to receive the next message from the given peer
    /// with the given tag. Messages from one peer with one tag arrive in the
    /// order they were sent. This method blocks until the message is ready;
    /// messages arriving in the meantime which do not match are kept for a
    /// later call.
    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error>;

    /// Implements a binomial tree broadcast from the root of the group. The
    /// message buffer must be `Some` if this is the root, and it must be
    /// `None` otherwise.
    ///
    fn broadcast(&self, group: &Group, tag: Tag, value: Option<Vec<u8>>) -> Result<Vec<u8>, Error> {
        let r = position_in(group, self.rank())?;
        let p = group.len();

        let value = match value {
            Some(value) => value,
            None if r == 0 => {
                return Err(Error::Communication("broadcast root has no value to send".into()))
            }
            None => self.recv(group.rank_at(r - (1 << r.trailing_zeros())), tag)?,
        };
        for level in (0..util::ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(group.rank_at(r + one), tag, value.clone())?
            }
        }
        Ok(value)
    }

    /// Implements a binomial tree reduce. All ranks return `None` except for
    /// the root of the group.
    ///
    fn reduce<F>(&self, group: &Group, tag: Tag, f: F, mut value: Vec<u8>) -> Result<Option<Vec<u8>>, Error>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Result<Vec<u8>, Error>,
    {
        let r = position_in(group, self.rank())?;
        let p = group.len();

        for level in 0..util::ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv(group.rank_at(r + one), tag)?)?
                }
            } else {
                self.send(group.rank_at(r - one), tag, value)?;
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce<F>(&self, group: &Group, tag: Tag, f: F, value: Vec<u8>) -> Result<Vec<u8>, Error>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Result<Vec<u8>, Error>,
    {
        let root_value = self.reduce(group, tag, f, value)?;
        self.broadcast(group, tag, root_value)
    }

    /// All-reduce of a floating point value with the given operator.
    ///
    fn all_reduce_f64<F>(&self, group: &Group, tag: Tag, value: f64, f: F) -> Result<f64, Error>
    where
        F: Fn(f64, f64) -> f64,
    {
        let op = |a: Vec<u8>, b: Vec<u8>| {
            Ok(util::f64_to_bytes(f(util::f64_from_bytes(&a)?, util::f64_from_bytes(&b)?)))
        };
        util::f64_from_bytes(&self.all_reduce(group, tag, op, util::f64_to_bytes(value))?)
    }

    fn min_f64(&self, group: &Group, tag: Tag, value: f64) -> Result<f64, Error> {
        self.all_reduce_f64(group, tag, value, f64::min)
    }

    fn max_f64(&self, group: &Group, tag: Tag, value: f64) -> Result<f64, Error> {
        self.all_reduce_f64(group, tag, value, f64::max)
    }

    fn sum_u64(&self, group: &Group, tag: Tag, value: u64) -> Result<u64, Error> {
        let op = |a: Vec<u8>, b: Vec<u8>| {
            Ok(util::u64_to_bytes(util::u64_from_bytes(&a)? + util::u64_from_bytes(&b)?))
        };
        util::u64_from_bytes(&self.all_reduce(group, tag, op, util::u64_to_bytes(value))?)
    }

    /// Block until every member of the group has entered the barrier.
    ///
    fn barrier(&self, group: &Group, tag: Tag) -> Result<(), Error> {
        self.all_reduce(group, tag, |a, _| Ok(a), Vec::new()).map(|_| ())
    }
}

fn position_in(group: &Group, rank: usize) -> Result<usize, Error> {
    group.position(rank).ok_or_else(|| {
        Error::Communication(format!("rank {} is not a member of group {:?}", rank, group.ranks()))
    })
}




/// A communicator bound to one group and tag, for the reductions made
/// repeatedly by every member of a domain.
///
pub struct Collective<'a, C: Communicator> {
    pub comm: &'a C,
    pub group: Group,
    pub tag: Tag,
}

impl<'a, C: Communicator> Collective<'a, C> {
    pub fn new(comm: &'a C, group: Group, tag: Tag) -> Self {
        Self { comm, group, tag }
    }

    pub fn min_f64(&self, value: f64) -> Result<f64, Error> {
        self.comm.min_f64(&self.group, self.tag, value)
    }

    pub fn max_f64(&self, value: f64) -> Result<f64, Error> {
        self.comm.max_f64(&self.group, self.tag, value)
    }

    pub fn sum_u64(&self, value: u64) -> Result<u64, Error> {
        self.comm.sum_u64(&self.group, self.tag, value)
    }
}
