use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
};

use crossbeam_channel::{Receiver, Sender};
use log::debug;

use crate::error::Error;
use super::comm::{Communicator, Tag};




/// A message in flight, labeled with its sender and tag.
///
pub struct Envelope {
    pub source: usize,
    pub tag: Tag,
    pub data: Vec<u8>,
}




/// A communicator for ranks which run as threads of one process, connected
/// by unbounded channels. Messages that arrive ahead of the receive that
/// wants them are buffered by (source, tag) until they are asked for.
///
pub struct LocalCommunicator {
    rank: usize,
    peers: Vec<Sender<Envelope>>,
    inbound: Receiver<Envelope>,
    buffer: RefCell<HashMap<(usize, Tag), VecDeque<Vec<u8>>>>,
}

impl LocalCommunicator {
    /// Create a fully connected group of communicators, one per rank.
    ///
    pub fn group(size: usize) -> Vec<LocalCommunicator> {
        let (sinks, sources): (Vec<_>, Vec<_>) = (0..size).map(|_| crossbeam_channel::unbounded()).unzip();

        sources
            .into_iter()
            .enumerate()
            .map(|(rank, inbound)| LocalCommunicator {
                rank,
                peers: sinks.clone(),
                inbound,
                buffer: RefCell::new(HashMap::new()),
            })
            .collect()
    }

    /// Return the number of messages received but not yet asked for.
    ///
    pub fn buffered_len(&self) -> usize {
        self.buffer.borrow().values().map(|q| q.len()).sum()
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, tag: Tag, message: Vec<u8>) -> Result<(), Error> {
        let peer = self
            .peers
            .get(rank)
            .ok_or_else(|| Error::Communication(format!("no rank {} in a group of {}", rank, self.peers.len())))?;
        peer.send(Envelope { source: self.rank, tag, data: message })
            .map_err(|_| Error::Communication(format!("rank {} has hung up", rank)))
    }

    fn recv(&self, rank: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        if let Some(data) = self.buffer.borrow_mut().get_mut(&(rank, tag)).and_then(|q| q.pop_front()) {
            return Ok(data);
        }
        loop {
            let env = self
                .inbound
                .recv()
                .map_err(|_| Error::Communication(format!("rank {} inbound channel closed", self.rank)))?;

            if env.source == rank && env.tag == tag {
                return Ok(env.data);
            }
            debug!("[{}] buffering message from {} with tag {:?}", self.rank, env.source, env.tag);
            self.buffer
                .borrow_mut()
                .entry((env.source, env.tag))
                .or_insert_with(VecDeque::new)
                .push_back(env.data)
        }
    }
}




/// Run a closure once per rank, each on its own thread of a dedicated pool,
/// handing each invocation the communicator for its rank. The results are
/// returned in rank order.
///
pub fn run_group<F, T>(size: usize, f: F) -> Result<Vec<T>, Error>
where
    F: Fn(LocalCommunicator) -> T + Sync,
    T: Send,
{
    // Every rank may block on a receive, so each needs a thread of its own.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(size + 1)
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let (sink, source) = crossbeam_channel::unbounded();
    let f = &f;

    pool.scope(|scope| {
        for comm in LocalCommunicator::group(size) {
            let sink = sink.clone();
            scope.spawn(move |_| {
                let rank = comm.rank();
                let result = f(comm);
                sink.send((rank, result)).ok();
            });
        }
    });
    drop(sink);

    let mut results: Vec<(usize, T)> = source.iter().collect();
    results.sort_by_key(|(rank, _)| *rank);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::message::comm::Group;

    #[test]
    fn out_of_order_messages_are_buffered() {
        let comms = LocalCommunicator::group(2);
        let a = Tag::Collective { level: 0, domain: 0 };
        let b = Tag::World;
        comms[0].send(1, a, vec![1]).unwrap();
        comms[0].send(1, b, vec![2]).unwrap();
        comms[0].send(1, a, vec![3]).unwrap();
        assert_eq!(comms[1].recv(0, b).unwrap(), vec![2]);
        assert_eq!(comms[1].buffered_len(), 1);
        assert_eq!(comms[1].recv(0, a).unwrap(), vec![1]);
        assert_eq!(comms[1].recv(0, a).unwrap(), vec![3]);
    }

    #[test]
    fn all_reduce_works_for_any_group_size() {
        for size in 1..8 {
            let results = run_group(size, |comm| {
                let group = Group::world(comm.size());
                let max = comm.max_f64(&group, Tag::World, comm.rank() as f64).unwrap();
                let sum = comm.sum_u64(&group, Tag::World, comm.rank() as u64 + 1).unwrap();
                comm.barrier(&group, Tag::World).unwrap();
                (max, sum)
            })
            .unwrap();

            for (max, sum) in results {
                assert_eq!(max, (size - 1) as f64);
                assert_eq!(sum, (size * (size + 1) / 2) as u64);
            }
        }
    }

    #[test]
    fn reductions_over_a_subgroup_leave_others_alone() {
        let results = run_group(4, |comm| {
            let group = Group::new(vec![3, 1]);
            if group.position(comm.rank()).is_some() {
                Some(comm.min_f64(&group, Tag::Collective { level: 0, domain: 7 }, comm.rank() as f64).unwrap())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(results, vec![None, Some(1.0), None, Some(1.0)]);
    }
}
