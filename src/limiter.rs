//! Adaptive rate limiter and single-flight request queue.
//!
//! All outbound traffic funnels through one [`RequestQueue`] instance: units execute strictly
//! one at a time, in enqueue order, behind a proactive backoff computed from the most recent
//! quota advertisement. A unit that resolves to [`Error::Throttled`] is pushed back onto the
//! front of the queue with a doubled penalty instead of settling, up to a per-unit requeue
//! budget. This queue-level requeue and the executor's reactive Retry-After retry are
//! independent throttling layers; both are kept deliberately and are worth re-validating
//! together under load.

// std
use std::collections::VecDeque;
// crates.io
use tokio::{sync::oneshot, time};
// self
use crate::{_prelude::*, http::RateLimitUpdate};

/// Default backoff base applied by the quota step function.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::seconds(1);
/// Default number of front-requeues a throttled unit is granted before it settles with the
/// throttle failure.
pub const DEFAULT_REQUEUE_BUDGET: u32 = 3;

/// Snapshot of the backend-advertised request quota.
///
/// `None` fields model "unbounded / not yet advertised". The record starts unbounded at
/// construction and is only ever replaced wholesale by a response that carried the quota
/// headers; responses without them leave the previous advertisement in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
	/// Requests remaining in the current window.
	pub requests_remaining: Option<u64>,
	/// Instant the window resets, when advertised.
	pub reset_at: Option<OffsetDateTime>,
	/// Total ceiling for the window.
	pub total_limit: Option<u64>,
}
impl RateLimitInfo {
	/// Returns `true` when both the remaining count and the ceiling are known.
	pub const fn is_bounded(&self) -> bool {
		self.requests_remaining.is_some() && self.total_limit.is_some()
	}
}

/// Observer notified whenever the stored quota record is replaced.
///
/// Listeners serve display purposes only; dispatch control flow never depends on them.
pub trait RateLimitListener
where
	Self: Send + Sync,
{
	/// Receives the freshly stored quota snapshot.
	fn limit_updated(&self, info: &RateLimitInfo);
}

/// Tracks remaining quota and computes the proactive dispatch backoff.
pub struct RateLimiter {
	base_backoff: Duration,
	info: RwLock<RateLimitInfo>,
	listeners: RwLock<Vec<Arc<dyn RateLimitListener>>>,
}
impl RateLimiter {
	/// Creates a limiter with an unbounded initial quota record.
	pub fn new(base_backoff: Duration) -> Self {
		Self {
			base_backoff,
			info: RwLock::new(RateLimitInfo::default()),
			listeners: RwLock::new(Vec::new()),
		}
	}

	/// Registers a quota observer.
	pub fn subscribe(&self, listener: Arc<dyn RateLimitListener>) {
		self.listeners.write().push(listener);
	}

	/// Replaces the stored quota record with a fresh advertisement and notifies observers.
	///
	/// The remaining count is clamped to the advertised ceiling so the stored record always
	/// satisfies `requests_remaining <= total_limit`.
	pub fn update(&self, update: RateLimitUpdate) {
		let info = RateLimitInfo {
			requests_remaining: Some(update.remaining.min(update.limit)),
			reset_at: update.reset_at,
			total_limit: Some(update.limit),
		};

		*self.info.write() = info.clone();

		for listener in self.listeners.read().iter() {
			listener.limit_updated(&info);
		}
	}

	/// Returns a snapshot of the current quota record, never the live value.
	pub fn snapshot(&self) -> RateLimitInfo {
		self.info.read().clone()
	}

	/// Computes the proactive delay to insert before the next dispatch.
	///
	/// A monotonic step function over the remaining-quota ratio: above one half no delay,
	/// above one fifth the base, above one tenth twice the base, otherwise four times the
	/// base. Unknown quota never delays.
	pub fn backoff_delay(&self) -> Duration {
		let info = self.snapshot();
		let (Some(remaining), Some(limit)) = (info.requests_remaining, info.total_limit) else {
			return Duration::ZERO;
		};
		let pct = if limit == 0 { 0. } else { remaining as f64 / limit as f64 };

		if pct > 0.5 {
			Duration::ZERO
		} else if pct > 0.2 {
			self.base_backoff
		} else if pct > 0.1 {
			2 * self.base_backoff
		} else {
			4 * self.base_backoff
		}
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter")
			.field("base_backoff", &self.base_backoff)
			.field("info", &self.snapshot())
			.field("listeners", &self.listeners.read().len())
			.finish()
	}
}

/// Boxed future produced by one execution of a queued unit.
pub type UnitFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
/// Re-executable unit of work; invoked again from scratch after a front-requeue.
pub type UnitWork<T> = Box<dyn FnMut() -> UnitFuture<T> + Send>;

struct QueuedUnit<T> {
	work: UnitWork<T>,
	settle: oneshot::Sender<Result<T>>,
	requeues_left: u32,
}

struct QueueState<T> {
	units: VecDeque<QueuedUnit<T>>,
	draining: bool,
}

struct QueueInner<T> {
	limiter: RateLimiter,
	state: Mutex<QueueState<T>>,
	// Throttle penalty slept after a front-requeue. Doubles per throttle signal, reverts to
	// the configured base once any unit settles successfully.
	penalty: Mutex<Duration>,
	base_backoff: Duration,
	requeue_budget: u32,
}
impl<T> QueueInner<T> {
	fn pop(&self) -> Option<QueuedUnit<T>> {
		let mut state = self.state.lock();

		match state.units.pop_front() {
			Some(unit) => Some(unit),
			None => {
				// Flag flips under the queue lock, so a concurrent enqueue either sees the
				// drain still active or restarts it; no unit is ever stranded.
				state.draining = false;

				None
			},
		}
	}

	fn double_penalty(&self) -> Duration {
		let mut penalty = self.penalty.lock();

		*penalty = 2 * *penalty;

		*penalty
	}

	fn reset_penalty(&self) {
		*self.penalty.lock() = self.base_backoff;
	}
}

/// Single-flight FIFO queue serializing every outbound unit of work.
///
/// The queue is an explicit component instance: independent clients construct independent
/// queues and never interfere. Cloning is shallow; clones share the same queue and limiter.
pub struct RequestQueue<T> {
	inner: Arc<QueueInner<T>>,
}
impl<T> Clone for RequestQueue<T> {
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<T> RequestQueue<T>
where
	T: 'static + Send,
{
	/// Creates an idle queue with the provided backoff base and per-unit requeue budget.
	pub fn new(base_backoff: Duration, requeue_budget: u32) -> Self {
		Self {
			inner: Arc::new(QueueInner {
				limiter: RateLimiter::new(base_backoff),
				state: Mutex::new(QueueState { units: VecDeque::new(), draining: false }),
				penalty: Mutex::new(base_backoff),
				base_backoff,
				requeue_budget,
			}),
		}
	}

	/// Returns the rate limiter owned by this queue.
	pub fn limiter(&self) -> &RateLimiter {
		&self.inner.limiter
	}

	/// Appends a unit to the tail of the queue and waits for it to settle.
	///
	/// Starts the drain task when none is active. The unit runs on the drain task, not on the
	/// caller's future, so a caller abandoning interest does not stop the unit from executing.
	pub async fn enqueue(&self, work: UnitWork<T>) -> Result<T> {
		let (settle, settled) = oneshot::channel();

		{
			let mut state = self.inner.state.lock();

			state.units.push_back(QueuedUnit {
				work,
				settle,
				requeues_left: self.inner.requeue_budget,
			});

			if !state.draining {
				state.draining = true;

				tokio::spawn(Self::drain(self.inner.clone()));
			}
		}

		settled.await.map_err(|_| Error::QueueShutdown)?
	}

	async fn drain(inner: Arc<QueueInner<T>>) {
		loop {
			let delay = inner.limiter.backoff_delay();

			if delay.is_positive() {
				sleep_for(delay).await;
			}

			let Some(mut unit) = inner.pop() else { break };

			match (unit.work)().await {
				Err(Error::Throttled { .. }) if unit.requeues_left > 0 => {
					unit.requeues_left -= 1;

					let penalty = inner.double_penalty();

					inner.state.lock().units.push_front(unit);
					sleep_for(penalty).await;
				},
				outcome => {
					if outcome.is_ok() {
						inner.reset_penalty();
					}

					let _ = unit.settle.send(outcome);
				},
			}
		}
	}
}
impl<T> Debug for RequestQueue<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.inner.state.lock();

		f.debug_struct("RequestQueue")
			.field("pending", &state.units.len())
			.field("draining", &state.draining)
			.finish()
	}
}

/// Suspends the current task for the given duration; non-positive durations return at once.
pub(crate) async fn sleep_for(duration: Duration) {
	let Ok(duration) = std::time::Duration::try_from(duration) else { return };

	time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn update(remaining: u64, limit: u64) -> RateLimitUpdate {
		RateLimitUpdate { remaining, limit, reset_at: None }
	}

	#[test]
	fn backoff_is_zero_while_quota_is_unknown() {
		let limiter = RateLimiter::new(DEFAULT_BASE_BACKOFF);

		assert_eq!(limiter.backoff_delay(), Duration::ZERO);
	}

	#[test]
	fn backoff_steps_follow_remaining_ratio() {
		let base = DEFAULT_BASE_BACKOFF;
		let limiter = RateLimiter::new(base);
		let cases = [
			(100, 100, Duration::ZERO),
			(51, 100, Duration::ZERO),
			(50, 100, base),
			(21, 100, base),
			(20, 100, 2 * base),
			(11, 100, 2 * base),
			(10, 100, 4 * base),
			(0, 100, 4 * base),
			(0, 0, 4 * base),
		];

		for (remaining, limit, expected) in cases {
			limiter.update(update(remaining, limit));

			assert_eq!(
				limiter.backoff_delay(),
				expected,
				"Backoff mismatch at {remaining}/{limit}.",
			);
		}
	}

	#[test]
	fn update_clamps_remaining_to_the_ceiling() {
		let limiter = RateLimiter::new(DEFAULT_BASE_BACKOFF);

		limiter.update(update(120, 100));

		assert_eq!(limiter.snapshot().requests_remaining, Some(100));
		assert_eq!(limiter.snapshot().total_limit, Some(100));
	}

	#[test]
	fn snapshot_returns_a_detached_copy() {
		let limiter = RateLimiter::new(DEFAULT_BASE_BACKOFF);

		limiter.update(update(40, 100));

		let mut snapshot = limiter.snapshot();

		snapshot.requests_remaining = Some(0);

		assert_eq!(limiter.snapshot().requests_remaining, Some(40));
	}

	#[test]
	fn listeners_observe_every_update() {
		struct Recorder(Mutex<Vec<Option<u64>>>);
		impl RateLimitListener for Recorder {
			fn limit_updated(&self, info: &RateLimitInfo) {
				self.0.lock().push(info.requests_remaining);
			}
		}

		let limiter = RateLimiter::new(DEFAULT_BASE_BACKOFF);
		let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));

		limiter.subscribe(recorder.clone());
		limiter.update(update(9, 10));
		limiter.update(update(8, 10));

		assert_eq!(*recorder.0.lock(), vec![Some(9), Some(8)]);
	}
}
