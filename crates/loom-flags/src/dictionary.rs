// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory provider backed by a sorted map.

use std::collections::BTreeMap;

use futures::StreamExt;
use loom_flags_core::{FlagChange, FlagValue, Result};
use tracing::debug;
use uuid::Uuid;

use crate::broadcast::BroadcastCell;
use crate::lock::Lock;
use crate::provider::{map_change, ChangeStream, FlagProvider, KeyMapper};

/// A mutable, in-memory set of flag values with its own change broadcast.
///
/// Useful for tests, for overrides set from a debug menu, and as the target
/// of [`Snapshot::save`](crate::Snapshot::save).
pub struct FlagValueDictionary {
	id: String,
	values: Lock<BTreeMap<String, FlagValue>>,
	changes: BroadcastCell<FlagChange>,
}

impl FlagValueDictionary {
	/// An empty dictionary with a generated id.
	pub fn new() -> Self {
		Self::with_id(format!("dictionary-{}", Uuid::new_v4()))
	}

	/// An empty dictionary with a caller-chosen id.
	pub fn with_id(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			values: Lock::new(BTreeMap::new()),
			changes: BroadcastCell::new(FlagChange::All),
		}
	}

	/// A dictionary pre-filled with `values`.
	pub fn from_values<I, K, V>(id: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<FlagValue>,
	{
		let dictionary = Self::with_id(id);
		dictionary.values.with_lock(|map| {
			map.extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
		});
		dictionary
	}

	pub fn get(&self, key: &str) -> Option<FlagValue> {
		self.values.with_lock(|map| map.get(key).cloned())
	}

	/// Stores a value and notifies subscribers.
	pub fn insert(&self, key: impl Into<String>, value: impl Into<FlagValue>) {
		let key = key.into();
		let value = value.into();
		self.values.with_lock(|map| {
			map.insert(key.clone(), value);
		});
		self.notify(key);
	}

	/// Removes a value and notifies subscribers. Returns the removed value.
	pub fn remove(&self, key: &str) -> Option<FlagValue> {
		let removed = self.values.with_lock(|map| map.remove(key));
		if removed.is_some() {
			self.notify(key.to_string());
		}
		removed
	}

	/// Copy of every stored key and value, in key order.
	pub fn contents(&self) -> BTreeMap<String, FlagValue> {
		self.values.with_lock(|map| map.clone())
	}

	pub fn keys(&self) -> Vec<String> {
		self.values.with_lock(|map| map.keys().cloned().collect())
	}

	pub fn len(&self) -> usize {
		self.values.with_lock(|map| map.len())
	}

	pub fn is_empty(&self) -> bool {
		self.values.with_lock(|map| map.is_empty())
	}

	fn notify(&self, key: String) {
		debug!(provider = %self.id, key = %key, "Dictionary value changed");
		self.changes.send(FlagChange::key(key));
	}
}

impl Default for FlagValueDictionary {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for FlagValueDictionary {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlagValueDictionary")
			.field("id", &self.id)
			.field("values", &self.contents())
			.finish()
	}
}

impl FlagProvider for FlagValueDictionary {
	fn id(&self) -> &str {
		&self.id
	}

	fn lookup(&self, key: &str) -> Option<FlagValue> {
		self.get(key)
	}

	fn set(&self, key: &str, value: Option<FlagValue>) -> Result<()> {
		match value {
			Some(value) => self.insert(key, value),
			None => {
				self.values.with_lock(|map| map.remove(key));
				self.notify(key.to_string());
			}
		}
		Ok(())
	}

	fn changes(&self, mapper: KeyMapper) -> ChangeStream {
		self
			.changes
			.subscribe_to_updates()
			.into_stream()
			.map(move |change| Ok(map_change(change, &mapper)))
			.boxed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::{verbatim_keys, FlagProviderExt};
	use tokio_test::{assert_pending, assert_ready, task};

	#[test]
	fn test_lookup_and_set() {
		let dict = FlagValueDictionary::from_values("test", [("a", true)]);
		assert_eq!(dict.value::<bool>("a"), Some(true));
		assert_eq!(dict.lookup("missing"), None);

		dict.set_value("b", Some("hello".to_string())).unwrap();
		assert_eq!(dict.value::<String>("b"), Some("hello".to_string()));

		dict.set("a", None).unwrap();
		assert_eq!(dict.lookup("a"), None);
		assert_eq!(dict.len(), 1);
	}

	#[test]
	fn test_keys_are_sorted() {
		let dict = FlagValueDictionary::from_values("test", [("z", 1), ("a", 2), ("m", 3)]);
		assert_eq!(dict.keys(), vec!["a", "m", "z"]);
	}

	#[test]
	fn test_generated_ids_are_unique() {
		assert_ne!(FlagValueDictionary::new().id(), FlagValueDictionary::new().id());
	}

	#[test]
	fn test_changes_only_report_later_writes() {
		let dict = FlagValueDictionary::with_id("test");
		dict.insert("before", true);

		let mut changes = dict.changes(verbatim_keys());
		let mut next = task::spawn(changes.next());
		assert_pending!(next.poll());

		dict.insert("after", false);
		assert!(next.is_woken());
		let change = assert_ready!(next.poll()).unwrap().unwrap();
		assert_eq!(change, FlagChange::key("after"));
	}

	#[test]
	fn test_delete_notifies() {
		let dict = FlagValueDictionary::from_values("test", [("gone", 1)]);
		let mut changes = dict.changes(verbatim_keys());
		dict.set("gone", None).unwrap();
		let change = assert_ready!(task::spawn(changes.next()).poll()).unwrap().unwrap();
		assert!(change.affects("gone"));
	}
}
