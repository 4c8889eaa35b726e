//! A fixed set of worker threads fed through a closeable queue.
//!
//! The same pool serves every phase of a run (weight building, multiread
//! resolution, MCMC). Each phase opens a new channel, the calling thread
//! produces work into it, and dropping the sender tells the workers to stop.
use crate::error::Result;
use crossbeam_channel::{bounded, unbounded, Sender};

#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("mixquant-worker-{}", i))
            .build()?;
        debug!("POOL\t{}", threads);
        Ok(Self { pool, threads })
    }
    pub fn threads(&self) -> usize {
        self.threads
    }
    /// Run one queue phase.
    ///
    /// `produce` runs on the calling thread and sends items into the queue
    /// (bounded by `capacity`, unbounded if None). Every worker builds its own
    /// state with `init(worker_index)` and folds the items it receives into it
    /// with `work`. Returns the result of `produce` and the final worker states.
    pub fn run_queue<T, S, R, P, I, W>(
        &self,
        capacity: Option<usize>,
        produce: P,
        init: I,
        work: W,
    ) -> (R, Vec<S>)
    where
        T: Send,
        S: Send,
        P: FnOnce(&Sender<T>) -> R,
        I: Fn(usize) -> S + Sync,
        W: Fn(&mut S, T) + Sync,
    {
        let (sender, receiver) = match capacity {
            Some(capacity) => bounded(capacity),
            None => unbounded(),
        };
        let mut states: Vec<Option<S>> = (0..self.threads).map(|_| None).collect();
        let (init, work) = (&init, &work);
        let result = self.pool.in_place_scope(|scope| {
            for (k, slot) in states.iter_mut().enumerate() {
                let receiver = receiver.clone();
                scope.spawn(move |_| {
                    let mut state = init(k);
                    while let Ok(item) = receiver.recv() {
                        work(&mut state, item);
                    }
                    *slot = Some(state);
                });
            }
            drop(receiver);
            let result = produce(&sender);
            drop(sender);
            result
        });
        (result, states.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn every_item_is_consumed_once() {
        let pool = WorkerPool::new(4).unwrap();
        let (sent, states) = pool.run_queue(
            Some(3),
            |sender| {
                for i in 0..1000u64 {
                    sender.send(i).unwrap();
                }
                1000
            },
            |_| (0u64, 0usize),
            |(sum, count), item| {
                *sum += item;
                *count += 1;
            },
        );
        assert_eq!(sent, 1000);
        assert_eq!(states.len(), 4);
        assert_eq!(states.iter().map(|s| s.1).sum::<usize>(), 1000);
        assert_eq!(states.iter().map(|s| s.0).sum::<u64>(), 999 * 1000 / 2);
    }
    #[test]
    fn empty_queue_closes() {
        let pool = WorkerPool::new(2).unwrap();
        let (_, states) = pool.run_queue(None, |_: &Sender<usize>| (), |k| vec![k], |s, x| s.push(x));
        let mut states = states;
        states.sort();
        assert_eq!(states, vec![vec![0], vec![1]]);
    }
    #[test]
    fn pool_is_reusable() {
        let pool = WorkerPool::new(3).unwrap();
        for round in 0..5usize {
            let (_, states) = pool.run_queue(
                None,
                |sender| (0..10).for_each(|_| sender.send(round).unwrap()),
                |_| 0,
                |s, x| *s += x,
            );
            assert_eq!(states.iter().sum::<usize>(), 10 * round);
        }
    }
}
