//! Bounded thread pool for synchronous handlers.
//!
//! Sync handlers must not block the event loop, so they run on a fixed set
//! of named worker threads. Jobs are distributed through a shared channel;
//! shutdown enqueues one stop sentinel per thread and joins them all.

use std::sync::Arc;
use std::sync::mpsc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::InvocationError;

enum Job {
	Run(Box<dyn FnOnce() + Send>),
	Stop,
}

/// Fixed-width pool executing blocking jobs off the event loop.
pub struct SyncPool {
	tx: mpsc::Sender<Job>,
	threads: Vec<std::thread::JoinHandle<()>>,
	width: usize,
}

impl std::fmt::Debug for SyncPool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncPool").field("width", &self.width).finish()
	}
}

impl SyncPool {
	/// Spawns a pool of `width` named worker threads.
	#[must_use]
	pub fn new(width: usize) -> Self {
		let width = width.max(1);
		let (tx, rx) = mpsc::channel::<Job>();
		let rx = Arc::new(Mutex::new(rx));
		let threads = (0..width)
			.map(|index| {
				let rx = rx.clone();
				std::thread::Builder::new()
					.name(format!("tether-sync-{index}"))
					.spawn(move || worker_loop(&rx))
					.expect("failed to spawn sync pool thread")
			})
			.collect();
		debug!(width, "sync pool started");
		Self { tx, threads, width }
	}

	/// Returns the configured pool width.
	#[must_use]
	pub const fn width(&self) -> usize {
		self.width
	}

	/// Runs a blocking job on the pool and waits for its result.
	///
	/// # Errors
	///
	/// [`InvocationError::PoolStopped`] when the pool has shut down.
	pub async fn run<F, R>(&self, job: F) -> Result<R, InvocationError>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		let (tx, rx) = tokio::sync::oneshot::channel();
		self.tx
			.send(Job::Run(Box::new(move || {
				let _ = tx.send(job());
			})))
			.map_err(|_| InvocationError::PoolStopped)?;
		rx.await.map_err(|_| InvocationError::PoolStopped)
	}

	/// Stops all worker threads: one sentinel per thread, then join.
	pub fn shutdown(&mut self) {
		for _ in &self.threads {
			let _ = self.tx.send(Job::Stop);
		}
		for handle in self.threads.drain(..) {
			let _ = handle.join();
		}
		debug!("sync pool stopped");
	}
}

impl Drop for SyncPool {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn worker_loop(rx: &Mutex<mpsc::Receiver<Job>>) {
	loop {
		// Hold the lock only while waiting; the job runs unlocked so the
		// other threads can pick up work concurrently.
		let job = rx.lock().recv();
		match job {
			Ok(Job::Run(job)) => job(),
			Ok(Job::Stop) | Err(_) => break,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use super::*;

	#[tokio::test(flavor = "multi_thread")]
	async fn concurrency_never_exceeds_width() {
		let pool = Arc::new(SyncPool::new(2));
		let active = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));

		let mut pending = Vec::new();
		for _ in 0..8 {
			let pool = pool.clone();
			let active = active.clone();
			let peak = peak.clone();
			pending.push(tokio::spawn(async move {
				pool.run(move || {
					let now = active.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					std::thread::sleep(Duration::from_millis(20));
					active.fetch_sub(1, Ordering::SeqCst);
				})
				.await
				.unwrap();
			}));
		}
		for task in pending {
			task.await.unwrap();
		}

		assert!(peak.load(Ordering::SeqCst) <= 2);
		assert_eq!(active.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn run_returns_the_job_result() {
		let pool = SyncPool::new(1);
		assert_eq!(pool.run(|| 6 * 7).await.unwrap(), 42);
	}

	#[tokio::test]
	async fn stopped_pool_refuses_jobs() {
		let mut pool = SyncPool::new(1);
		pool.shutdown();
		assert!(matches!(
			pool.run(|| ()).await,
			Err(InvocationError::PoolStopped)
		));
	}

	#[test]
	fn width_is_clamped_to_at_least_one() {
		let pool = SyncPool::new(0);
		assert_eq!(pool.width(), 1);
	}
}
