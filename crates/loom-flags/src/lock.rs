// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Closure-scoped mutual exclusion.
//!
//! Every piece of shared state in the runtime sits behind a [`Lock`], and the
//! only way in is [`Lock::with_lock`]. The guard never escapes the closure, so
//! it cannot be held across an `.await`. The lock is not reentrant: calling
//! `with_lock` on the same lock from inside the closure deadlocks.

use parking_lot::Mutex;

/// A mutex that is only ever held for the duration of a closure.
#[derive(Debug, Default)]
pub struct Lock<T> {
	inner: Mutex<T>,
}

impl<T> Lock<T> {
	pub fn new(value: T) -> Self {
		Self {
			inner: Mutex::new(value),
		}
	}

	/// Runs `body` with exclusive access and returns whatever it returns.
	///
	/// The lock is released on every exit path, including an early `Err`
	/// return from `body` and a panic unwinding out of it.
	pub fn with_lock<R>(&self, body: impl FnOnce(&mut T) -> R) -> R {
		let mut guard = self.inner.lock();
		body(&mut guard)
	}

	/// Like [`Lock::with_lock`], but returns `None` instead of blocking when
	/// the lock is already held.
	pub fn try_with_lock<R>(&self, body: impl FnOnce(&mut T) -> R) -> Option<R> {
		let mut guard = self.inner.try_lock()?;
		Some(body(&mut guard))
	}

	pub fn into_inner(self) -> T {
		self.inner.into_inner()
	}
}
