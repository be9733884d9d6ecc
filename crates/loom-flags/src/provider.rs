// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The provider contract.
//!
//! A provider answers lookups for folded keys, optionally accepts writes, and
//! exposes a stream of change notifications. The runtime never interprets a
//! provider's storage; it only asks questions in list order.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use loom_flags_core::{FlagChange, FlagValue, FlagValueType, KeyPath, Result};

/// Maps a provider's raw key strings onto key paths.
pub type KeyMapper = Arc<dyn Fn(&str) -> KeyPath + Send + Sync>;

/// A provider's change notifications. An `Err` item or the end of the stream
/// means the provider has gone permanently quiet.
pub type ChangeStream = BoxStream<'static, Result<FlagChange>>;

/// A shared, type-erased provider.
pub type SharedProvider = Arc<dyn FlagProvider>;

/// A named source of flag values.
pub trait FlagProvider: Send + Sync {
	/// Stable identifier, independent of the provider's position in a list.
	fn id(&self) -> &str;

	/// Human readable name, for logs and tooling.
	fn name(&self) -> &str {
		self.id()
	}

	/// Returns the stored value, or `None` if this provider has no answer.
	fn lookup(&self, key: &str) -> Option<FlagValue>;

	/// Stores `value` under `key`; `None` deletes it.
	fn set(&self, key: &str, value: Option<FlagValue>) -> Result<()>;

	/// A lazy, unending stream of change notifications.
	///
	/// Each call returns a fresh stream; a stream cannot be restarted once it
	/// ends.
	fn changes(&self, mapper: KeyMapper) -> ChangeStream;
}

/// Typed helpers available on every provider.
pub trait FlagProviderExt: FlagProvider {
	/// Looks up `key` and converts it, treating a type mismatch as absence.
	fn value<T: FlagValueType>(&self, key: &str) -> Option<T> {
		self.lookup(key).and_then(T::from_flag_value)
	}

	fn set_value<T: FlagValueType>(&self, key: &str, value: Option<T>) -> Result<()> {
		self.set(key, value.map(T::into_flag_value))
	}
}

impl<P: FlagProvider + ?Sized> FlagProviderExt for P {}

/// A mapper that takes raw keys verbatim.
pub fn verbatim_keys() -> KeyMapper {
	Arc::new(|key: &str| KeyPath::new(key))
}

/// Re-keys every path in `change` through `mapper`.
pub fn map_change(change: FlagChange, mapper: &KeyMapper) -> FlagChange {
	match change {
		FlagChange::All => FlagChange::All,
		FlagChange::Some(keys) => FlagChange::keys(keys.iter().map(|key| mapper(key.key()))),
	}
}

/// A change stream that never yields, for providers without notifications.
pub fn silent_changes() -> ChangeStream {
	futures::stream::pending().boxed()
}
