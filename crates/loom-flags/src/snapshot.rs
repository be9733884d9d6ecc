// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Frozen, locally overridable captures of resolved flag values.
//!
//! A [`Snapshot`] is filled once, by walking a flag hierarchy, and from then
//! on only ever reads and writes its own map. It can be persisted into a
//! provider with [`Snapshot::save`] or layered over the live providers as an
//! override, since it is itself a [`FlagProvider`].

use std::collections::{BTreeMap, HashMap, HashSet};

use futures::StreamExt;
use loom_flags_core::{FlagChange, FlagValue, FlagValueType, Result};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::broadcast::{BroadcastCell, Subscription};
use crate::chain::ProviderChain;
use crate::hierarchy::{FlagContainer, FlagInfo, FlagVisitor};
use crate::lock::Lock;
use crate::provider::{map_change, ChangeStream, FlagProvider, KeyMapper};

/// Where a snapshot takes its values from while it is being captured.
#[derive(Clone, Copy)]
pub enum SnapshotSource<'a> {
	/// Resolve each key through the whole chain.
	Chain(&'a ProviderChain),
	/// Ask exactly one provider, bypassing the chain.
	Provider(&'a dyn FlagProvider),
}

impl SnapshotSource<'_> {
	fn lookup(&self, key: &str) -> Option<FlagValue> {
		match self {
			SnapshotSource::Chain(chain) => chain.resolve(key),
			SnapshotSource::Provider(provider) => provider.lookup(key),
		}
	}
}

struct Capture<'a> {
	source: SnapshotSource<'a>,
	only: Option<&'a HashSet<String>>,
	values: HashMap<String, FlagValue>,
}

impl FlagVisitor for Capture<'_> {
	fn visit_flag(&mut self, flag: &FlagInfo) {
		let key = flag.key_path.key();
		if let Some(only) = self.only {
			if !only.contains(key) {
				return;
			}
		}
		if let Some(value) = self.source.lookup(key) {
			self.values.insert(key.to_string(), value);
		}
	}
}

/// A sparse map of folded key to value, with its own change broadcast.
pub struct Snapshot {
	id: String,
	values: Lock<HashMap<String, FlagValue>>,
	changes: BroadcastCell<FlagChange>,
}

impl Snapshot {
	/// An empty snapshot. Every key reads as absent until it is set.
	pub fn new() -> Self {
		Self::from_map(HashMap::new())
	}

	pub fn from_values<I, K, V>(values: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<FlagValue>,
	{
		Self::from_map(
			values
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		)
	}

	/// Walks `root` and records the value `source` gives for every flag,
	/// optionally restricted to the keys in `only`. Keys with no value are
	/// left out.
	pub fn capture<C>(root: &C, source: SnapshotSource<'_>, only: Option<&HashSet<String>>) -> Self
	where
		C: FlagContainer + ?Sized,
	{
		let mut capture = Capture {
			source,
			only,
			values: HashMap::new(),
		};
		root.walk(&mut capture);
		Self::from_map(capture.values)
	}

	fn from_map(values: HashMap<String, FlagValue>) -> Self {
		Self {
			id: format!("snapshot-{}", Uuid::new_v4()),
			values: Lock::new(values),
			changes: BroadcastCell::new(FlagChange::All),
		}
	}

	pub fn get(&self, key: &str) -> Option<FlagValue> {
		self.values.with_lock(|map| map.get(key).cloned())
	}

	pub fn value<T: FlagValueType>(&self, key: &str) -> Option<T> {
		self.get(key).and_then(T::from_flag_value)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.values.with_lock(|map| map.contains_key(key))
	}

	/// Overrides `key` locally and notifies subscribers.
	pub fn insert(&self, key: impl Into<String>, value: impl Into<FlagValue>) {
		let key = key.into();
		let value = value.into();
		self.values.with_lock(|map| {
			map.insert(key.clone(), value);
		});
		self.notify(key);
	}

	/// Drops `key` from the snapshot so it reads as absent again.
	pub fn remove(&self, key: &str) -> Option<FlagValue> {
		let removed = self.values.with_lock(|map| map.remove(key));
		self.notify(key.to_string());
		removed
	}

	/// Every present key and value, in key order.
	pub fn contents(&self) -> BTreeMap<String, FlagValue> {
		self.values.with_lock(|map| {
			map
				.iter()
				.map(|(k, v)| (k.clone(), v.clone()))
				.collect()
		})
	}

	pub fn keys(&self) -> Vec<String> {
		let mut keys = self.values.with_lock(|map| map.keys().cloned().collect::<Vec<_>>());
		keys.sort();
		keys
	}

	pub fn len(&self) -> usize {
		self.values.with_lock(|map| map.len())
	}

	pub fn is_empty(&self) -> bool {
		self.values.with_lock(|map| map.is_empty())
	}

	/// Changes made to this snapshot. The first `next` returns `All`.
	pub fn subscribe(&self) -> Subscription<FlagChange> {
		self.changes.subscribe()
	}

	/// Writes every present key into `destination`, in key order.
	///
	/// Keys the snapshot doesn't hold are not touched. The first failed write
	/// stops the save and is returned; keys written before it stay written.
	#[instrument(skip(self, destination), fields(snapshot = %self.id, destination = %destination.id()))]
	pub fn save(&self, destination: &dyn FlagProvider) -> Result<()> {
		let contents = self.contents();
		for (key, value) in &contents {
			destination.set(key, Some(value.clone()))?;
		}
		debug!(count = contents.len(), "Snapshot saved");
		Ok(())
	}

	fn notify(&self, key: String) {
		self.changes.send(FlagChange::key(key));
	}
}

impl Default for Snapshot {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Snapshot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Snapshot")
			.field("id", &self.id)
			.field("values", &self.contents())
			.finish()
	}
}

impl FlagProvider for Snapshot {
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
				self.remove(key);
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
