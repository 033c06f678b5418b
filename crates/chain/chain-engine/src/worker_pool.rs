//! Fixed-size pool of threads draining the shared gateway event queue.
//!
//! # Delivery
//! The queue is an MPMC channel; each worker holds a clone of the receiver and
//! a pop hands an event to exactly one worker. Every popped event is
//! dispatched exactly once.
//!
//! # Ordering
//! None. With more than one worker, events for different instruments, and
//! even for the same instrument, may be applied in any order.
//!
//! # Shutdown
//! [`WorkerPool::shutdown`] cancels the pool token and joins every worker.
//! A worker finishes the event it is dispatching, then stops at its next
//! check of the token. It never pops again after seeing the token
//! cancelled, so events still queued at that point are left undelivered.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chain_events::{EventHandler, GatewayEvent, dispatch};
use crossbeam_channel::{Receiver, TryRecvError, select};

use crate::cancel::CancelToken;

/// Per-worker totals, returned on shutdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub worker: usize,
    pub processed: u64,
}

pub struct WorkerPool {
    workers: Vec<JoinHandle<WorkerStats>>,
    token: CancelToken,
}

impl WorkerPool {
    /// One worker per hardware thread.
    pub fn default_size() -> usize {
        thread::available_parallelism().map_or(1, |n| n.get())
    }

    pub fn spawn<H>(
        size: usize,
        events: Receiver<GatewayEvent>,
        handler: Arc<H>,
    ) -> io::Result<Self>
    where
        H: EventHandler + ?Sized + 'static,
    {
        let token = CancelToken::new();
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(size),
            token: token.clone(),
        };

        for worker in 0..size.max(1) {
            let events = events.clone();
            let token = token.clone();
            let handler = Arc::clone(&handler);
            // on error `pool` drops here, which stops the workers already running
            let handle = thread::Builder::new()
                .name(format!("chain-worker-{worker}"))
                .spawn(move || run_worker(worker, &events, &token, &*handler))?;
            pool.workers.push(handle);
        }

        tracing::info!(workers = pool.workers.len(), "worker pool started");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancels, then blocks until every worker has exited.
    pub fn shutdown(mut self) -> Vec<WorkerStats> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Vec<WorkerStats> {
        self.token.cancel();
        let stats: Vec<WorkerStats> = self
            .workers
            .drain(..)
            .filter_map(|handle| match handle.join() {
                Ok(stats) => Some(stats),
                Err(_) => {
                    tracing::error!("worker panicked");
                    None
                }
            })
            .collect();
        if !stats.is_empty() {
            let processed: u64 = stats.iter().map(|s| s.processed).sum();
            tracing::info!(workers = stats.len(), processed, "worker pool stopped");
        }
        stats
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn run_worker<H>(
    worker: usize,
    events: &Receiver<GatewayEvent>,
    token: &CancelToken,
    handler: &H,
) -> WorkerStats
where
    H: EventHandler + ?Sized,
{
    let mut stats = WorkerStats {
        worker,
        processed: 0,
    };
    tracing::debug!(worker, "worker started");

    'wait: loop {
        if token.is_cancelled() {
            break;
        }

        // wait point: an event, a closed queue, or cancellation
        let next = select! {
            recv(token.signal()) -> _ => None,
            recv(events) -> msg => msg.ok(),
        };
        let Some(mut event) = next else {
            break;
        };

        // keep draining without going back to the wait point
        loop {
            dispatch(handler, &event);
            stats.processed += 1;

            if token.is_cancelled() {
                break 'wait;
            }
            event = match events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => continue 'wait,
                Err(TryRecvError::Disconnected) => break 'wait,
            };
        }
    }

    tracing::debug!(worker, processed = stats.processed, "worker stopped");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_events::{ContractMetadata, OptionChainParameters, RequestId, TickField, WireId};
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Counter {
        ticks: AtomicU64,
    }

    impl EventHandler for Counter {
        fn on_contract_metadata(&self, _: RequestId, _: &ContractMetadata) {}
        fn on_error(&self, _: i64, _: i32, _: &str) {}
        fn on_option_chain_parameters(&self, _: &OptionChainParameters) {}
        fn on_tick_price(&self, _: WireId, _: TickField, _: f64) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn tick() -> GatewayEvent {
        GatewayEvent::TickPrice {
            wire_id: WireId(1),
            field: TickField::Last,
            price: 1.0,
        }
    }

    #[test]
    fn every_event_processed_once() {
        let (tx, rx) = unbounded();
        let handler = Arc::new(Counter::default());
        let pool = WorkerPool::spawn(4, rx.clone(), Arc::clone(&handler)).unwrap();
        assert_eq!(pool.size(), 4);

        for _ in 0..10_000 {
            tx.send(tick()).unwrap();
        }
        while !rx.is_empty() {
            thread::yield_now();
        }
        // the last popped events may still be in dispatch
        let stats = pool.shutdown();
        let processed: u64 = stats.iter().map(|s| s.processed).sum();
        assert_eq!(processed, 10_000);
        assert_eq!(handler.ticks.load(Ordering::Relaxed), 10_000);
    }

    #[test]
    fn workers_exit_when_queue_closes() {
        let (tx, rx) = unbounded();
        let handler = Arc::new(Counter::default());
        let probe = rx.clone();
        let pool = WorkerPool::spawn(2, rx, Arc::clone(&handler)).unwrap();
        tx.send(tick()).unwrap();
        drop(tx);
        while !probe.is_empty() {
            thread::yield_now();
        }
        let stats = pool.shutdown();
        assert_eq!(stats.len(), 2);
        assert_eq!(handler.ticks.load(Ordering::Relaxed), 1);
    }

    struct Slow(AtomicU64);

    impl EventHandler for Slow {
        fn on_contract_metadata(&self, _: RequestId, _: &ContractMetadata) {}
        fn on_error(&self, _: i64, _: i32, _: &str) {}
        fn on_option_chain_parameters(&self, _: &OptionChainParameters) {}
        fn on_tick_price(&self, _: WireId, _: TickField, _: f64) {
            thread::sleep(Duration::from_millis(2));
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Shutdown with a backlog: workers stop promptly and the rest of the
    /// queue is left undelivered.
    #[test]
    fn shutdown_leaves_queued_events() {
        let (tx, rx) = unbounded();
        for _ in 0..5_000 {
            tx.send(tick()).unwrap();
        }
        let handler = Arc::new(Slow(AtomicU64::new(0)));
        let pool = WorkerPool::spawn(4, rx.clone(), Arc::clone(&handler)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handler.0.load(Ordering::Relaxed) == 0 {
            assert!(Instant::now() < deadline, "no event was dispatched");
            thread::yield_now();
        }

        let started = Instant::now();
        let stats = pool.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2), "join took too long");
        assert_eq!(stats.len(), 4);

        let left = rx.len();
        assert!(left > 0);
        let processed: u64 = stats.iter().map(|s| s.processed).sum();
        assert_eq!(processed + left as u64, 5_000);
        assert_eq!(handler.0.load(Ordering::Relaxed), processed);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(rx.len(), left);
        drop(tx);
    }

    #[test]
    fn zero_size_still_gets_one_worker() {
        let (_tx, rx) = unbounded::<GatewayEvent>();
        let pool = WorkerPool::spawn(0, rx, Arc::new(Counter::default())).unwrap();
        assert_eq!(pool.size(), 1);
        drop(pool);
    }
}
