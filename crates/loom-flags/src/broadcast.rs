// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Generation-counted, latest-value broadcast.
//!
//! A [`BroadcastCell`] stores only the most recent value and a generation
//! counter. Each [`Subscription`] remembers the last generation it saw: if the
//! cell is ahead, `next` returns immediately, otherwise it registers a one-shot
//! waiter and suspends until the next update. Slow subscribers skip straight to
//! the latest value, so memory stays constant no matter how often the cell is
//! updated or how many subscribers there are.
//!
//! Subscriptions only hold a weak reference to the cell. Dropping the cell ends
//! every subscription; dropping a subscription (or the future returned by
//! `next`) removes its waiter.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::lock::Lock;

/// Generation of a freshly created cell. Subscriptions start at zero so their
/// first `next` returns the current value.
pub const INITIAL_GENERATION: u64 = 1;

type Waiter<T> = oneshot::Sender<(u64, T)>;

struct CellState<T> {
	generation: u64,
	value: T,
	waiters: HashMap<u64, Waiter<T>>,
	next_waiter_id: u64,
}

struct CellInner<T> {
	state: Lock<CellState<T>>,
}

enum NextValue<T> {
	Ready(u64, T),
	Wait(u64, oneshot::Receiver<(u64, T)>),
}

impl<T: Clone> CellInner<T> {
	fn next_or_register(&self, seen: u64) -> NextValue<T> {
		self.state.with_lock(|state| {
			if state.generation > seen {
				return NextValue::Ready(state.generation, state.value.clone());
			}
			let id = state.next_waiter_id;
			state.next_waiter_id += 1;
			let (tx, rx) = oneshot::channel();
			state.waiters.insert(id, tx);
			NextValue::Wait(id, rx)
		})
	}
}

impl<T> CellInner<T> {
	fn remove_waiter(&self, id: u64) {
		self.state.with_lock(|state| {
			state.waiters.remove(&id);
		});
	}
}

/// A shared "latest value" slot with any number of independent subscribers.
pub struct BroadcastCell<T> {
	inner: Arc<CellInner<T>>,
}

impl<T> Clone for BroadcastCell<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: Clone> BroadcastCell<T> {
	pub fn new(initial: T) -> Self {
		Self {
			inner: Arc::new(CellInner {
				state: Lock::new(CellState {
					generation: INITIAL_GENERATION,
					value: initial,
					waiters: HashMap::new(),
					next_waiter_id: 0,
				}),
			}),
		}
	}

	/// Replaces the value with `transform(current)`, bumps the generation and
	/// resumes every waiting subscriber. Returns the new generation.
	pub fn update(&self, transform: impl FnOnce(&T) -> T) -> u64 {
		let (generation, resumed) = self.inner.state.with_lock(|state| {
			state.value = transform(&state.value);
			state.generation += 1;
			let resumed = state.waiters.len();
			for (_, waiter) in state.waiters.drain() {
				// The receiver may be mid-cancellation; its guard is about to
				// remove an entry that no longer exists.
				let _ = waiter.send((state.generation, state.value.clone()));
			}
			(state.generation, resumed)
		});
		trace!(generation, resumed, "Broadcast cell updated");
		generation
	}

	/// Shorthand for an update that ignores the previous value.
	pub fn send(&self, value: T) -> u64 {
		self.update(move |_| value)
	}

	pub fn generation(&self) -> u64 {
		self.inner.state.with_lock(|state| state.generation)
	}

	pub fn current(&self) -> T {
		self.inner.state.with_lock(|state| state.value.clone())
	}

	/// Number of subscribers currently suspended in `next`.
	pub fn waiter_count(&self) -> usize {
		self.inner.state.with_lock(|state| state.waiters.len())
	}

	/// Creates a subscription whose first `next` yields the current value.
	pub fn subscribe(&self) -> Subscription<T> {
		Subscription {
			cell: Arc::downgrade(&self.inner),
			generation: 0,
		}
	}

	/// Creates a subscription that skips the current value and waits for the
	/// next update.
	pub fn subscribe_to_updates(&self) -> Subscription<T> {
		let generation = self.generation();
		Subscription {
			cell: Arc::downgrade(&self.inner),
			generation,
		}
	}

	pub fn downgrade(&self) -> WeakBroadcastCell<T> {
		WeakBroadcastCell {
			inner: Arc::downgrade(&self.inner),
		}
	}
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for BroadcastCell<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.inner.state.with_lock(|state| {
			f.debug_struct("BroadcastCell")
				.field("generation", &state.generation)
				.field("value", &state.value)
				.field("waiters", &state.waiters.len())
				.finish()
		})
	}
}

/// A non-owning handle to a [`BroadcastCell`].
pub struct WeakBroadcastCell<T> {
	inner: Weak<CellInner<T>>,
}

impl<T> Clone for WeakBroadcastCell<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Weak::clone(&self.inner),
		}
	}
}

impl<T> WeakBroadcastCell<T> {
	pub fn upgrade(&self) -> Option<BroadcastCell<T>> {
		self.inner.upgrade().map(|inner| BroadcastCell { inner })
	}
}

/// Removes a registered waiter if the `next` future is dropped before it is
/// resumed.
struct WaiterGuard<T> {
	cell: Weak<CellInner<T>>,
	id: u64,
	armed: bool,
}

impl<T> Drop for WaiterGuard<T> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		if let Some(cell) = self.cell.upgrade() {
			cell.remove_waiter(self.id);
		}
	}
}

/// One consumer's view of a [`BroadcastCell`].
pub struct Subscription<T> {
	cell: Weak<CellInner<T>>,
	generation: u64,
}

impl<T: Clone> Subscription<T> {
	/// Waits for a value newer than the last one this subscription returned.
	///
	/// Returns `None` once the cell has been dropped. Dropping the returned
	/// future before it completes unregisters this subscription's waiter and
	/// leaves every other subscriber untouched.
	pub async fn next(&mut self) -> Option<T> {
		let (id, rx) = {
			let cell = self.cell.upgrade()?;
			match cell.next_or_register(self.generation) {
				NextValue::Ready(generation, value) => {
					self.generation = generation;
					return Some(value);
				}
				NextValue::Wait(id, rx) => (id, rx),
			}
		};

		let mut guard = WaiterGuard {
			cell: Weak::clone(&self.cell),
			id,
			armed: true,
		};
		let received = rx.await;
		guard.armed = false;

		match received {
			Ok((generation, value)) => {
				self.generation = generation;
				Some(value)
			}
			// The sender is only dropped without sending when the cell itself
			// goes away.
			Err(_) => None,
		}
	}

	/// Like [`Subscription::next`], but gives up with `None` when `token` is
	/// cancelled.
	pub async fn next_cancellable(&mut self, token: &CancellationToken) -> Option<T> {
		tokio::select! {
			biased;
			_ = token.cancelled() => None,
			value = self.next() => value,
		}
	}

	/// Last generation this subscription returned, or zero before the first.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// True once the underlying cell has been dropped.
	pub fn is_closed(&self) -> bool {
		self.cell.strong_count() == 0
	}

	/// Turns the subscription into a stream that ends when the cell is dropped.
	pub fn into_stream(self) -> BoxStream<'static, T>
	where
		T: Send + 'static,
	{
		stream::unfold(self, |mut subscription| async move {
			let value = subscription.next().await?;
			Some((value, subscription))
		})
		.boxed()
	}
}

impl<T> std::fmt::Debug for Subscription<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("generation", &self.generation)
			.field("closed", &(self.cell.strong_count() == 0))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use tokio_test::{assert_pending, assert_ready, task};

	#[test]
	fn test_initial_state() {
		let cell = BroadcastCell::new("start");
		assert_eq!(cell.generation(), INITIAL_GENERATION);
		assert_eq!(cell.current(), "start");
		assert_eq!(cell.waiter_count(), 0);
	}

	#[test]
	fn test_first_next_returns_current_value() {
		let cell = BroadcastCell::new(7);
		let mut sub = cell.subscribe();
		let mut next = task::spawn(sub.next());
		assert_eq!(assert_ready!(next.poll()), Some(7));
		drop(next);
		assert_eq!(sub.generation(), INITIAL_GENERATION);
	}

	#[test]
	fn test_second_next_suspends_until_update() {
		let cell = BroadcastCell::new(0);
		let mut sub = cell.subscribe();

		let mut first = task::spawn(sub.next());
		assert_eq!(assert_ready!(first.poll()), Some(0));
		drop(first);

		let mut second = task::spawn(sub.next());
		assert_pending!(second.poll());
		assert_eq!(cell.waiter_count(), 1);

		cell.send(5);
		assert!(second.is_woken());
		assert_eq!(assert_ready!(second.poll()), Some(5));
		drop(second);

		assert_eq!(sub.generation(), 2);
		assert_eq!(cell.waiter_count(), 0);
	}

	#[test]
	fn test_slow_subscriber_gets_only_latest() {
		let cell = BroadcastCell::new(0);
		let mut sub = cell.subscribe();
		cell.send(1);
		cell.send(2);
		cell.send(3);

		let mut next = task::spawn(sub.next());
		assert_eq!(assert_ready!(next.poll()), Some(3));
		drop(next);

		let mut next = task::spawn(sub.next());
		assert_pending!(next.poll());
	}

	#[test]
	fn test_dropping_next_removes_only_its_waiter() {
		let cell = BroadcastCell::new(0);
		let mut a = cell.subscribe_to_updates();
		let mut b = cell.subscribe_to_updates();

		let mut wait_a = task::spawn(a.next());
		let mut wait_b = task::spawn(b.next());
		assert_pending!(wait_a.poll());
		assert_pending!(wait_b.poll());
		assert_eq!(cell.waiter_count(), 2);

		drop(wait_a);
		assert_eq!(cell.waiter_count(), 1);

		cell.send(9);
		assert_eq!(assert_ready!(wait_b.poll()), Some(9));
		assert_eq!(cell.waiter_count(), 0);
	}

	#[test]
	fn test_update_transform_sees_previous_value() {
		let cell = BroadcastCell::new(10);
		let generation = cell.update(|v| v + 1);
		assert_eq!(generation, 2);
		assert_eq!(cell.current(), 11);
	}

	#[test]
	fn test_dropped_cell_ends_subscription() {
		let cell = BroadcastCell::new(0);
		let mut sub = cell.subscribe_to_updates();

		let mut wait = task::spawn(sub.next());
		assert_pending!(wait.poll());
		drop(cell);
		assert!(wait.is_woken());
		assert_eq!(assert_ready!(wait.poll()), None);
		drop(wait);
		assert!(sub.is_closed());
	}

	#[test]
	fn test_subscription_does_not_keep_cell_alive() {
		let cell = BroadcastCell::new(0);
		let weak = cell.downgrade();
		let _sub = cell.subscribe();
		drop(cell);
		assert!(weak.upgrade().is_none());
	}

	#[test]
	fn test_next_cancellable() {
		let cell = BroadcastCell::new(0);
		let mut sub = cell.subscribe_to_updates();
		let token = CancellationToken::new();

		let mut wait = task::spawn(sub.next_cancellable(&token));
		assert_pending!(wait.poll());
		assert_eq!(cell.waiter_count(), 1);

		token.cancel();
		assert_eq!(assert_ready!(wait.poll()), None);
		drop(wait);
		assert_eq!(cell.waiter_count(), 0);
	}

	#[tokio::test]
	async fn test_stream_across_tasks() {
		let cell = BroadcastCell::new(0u32);
		let mut stream = cell.subscribe().into_stream();
		assert_eq!(stream.next().await, Some(0));

		let producer = cell.clone();
		let handle = tokio::spawn(async move {
			producer.send(1);
		});
		handle.await.unwrap();

		assert_eq!(stream.next().await, Some(1));
		drop(cell);
		assert_eq!(stream.next().await, None);
	}

	proptest! {
		#[test]
		fn generations_strictly_increase(updates in prop::collection::vec(any::<u8>(), 1..50)) {
			let cell = BroadcastCell::new(0u8);
			let mut sub = cell.subscribe();
			let mut last = 0;
			for value in updates {
				cell.send(value);
				let mut next = task::spawn(sub.next());
				let received = match next.poll() {
					std::task::Poll::Ready(v) => v,
					std::task::Poll::Pending => None,
				};
				drop(next);
				prop_assert_eq!(received, Some(value));
				prop_assert!(sub.generation() > last);
				last = sub.generation();
			}
		}
	}
}
