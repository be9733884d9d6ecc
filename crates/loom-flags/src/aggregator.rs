// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Owns the provider list and one change listener per provider.
//!
//! Every listener forwards its provider's change notifications into a shared
//! [`BroadcastCell`]. The provider list and the listener table are only ever
//! changed together, inside one critical section, so a reader never sees a
//! list whose listeners disagree with it.

use std::collections::HashMap;

use futures::StreamExt;
use loom_flags_core::{FlagChange, FlagsError, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::broadcast::{BroadcastCell, Subscription, WeakBroadcastCell};
use crate::chain::ProviderChain;
use crate::lock::Lock;
use crate::provider::{KeyMapper, SharedProvider};

/// What a reconfiguration changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconfiguration {
	/// Ids that lost their position, in old-list order.
	pub removed: Vec<String>,
	/// Ids that gained a position, in new-list order.
	pub inserted: Vec<String>,
	/// Whether an `All` change was broadcast.
	pub notified: bool,
}

impl Reconfiguration {
	pub fn is_unchanged(&self) -> bool {
		self.removed.is_empty() && self.inserted.is_empty()
	}
}

struct AggregatorState {
	chain: ProviderChain,
	listeners: HashMap<String, JoinHandle<()>>,
	configured: bool,
}

/// Forwards change notifications from every provider into one broadcast cell.
pub struct ChangeAggregator {
	state: Lock<AggregatorState>,
	changes: BroadcastCell<FlagChange>,
	mapper: KeyMapper,
	runtime: Handle,
}

impl ChangeAggregator {
	/// Creates an aggregator with no providers.
	///
	/// Listener tasks run on the tokio runtime this is called from.
	pub fn new(mapper: KeyMapper) -> Result<Self> {
		let runtime = Handle::try_current().map_err(|_| FlagsError::RuntimeUnavailable)?;
		Ok(Self {
			state: Lock::new(AggregatorState {
				chain: ProviderChain::default(),
				listeners: HashMap::new(),
				configured: false,
			}),
			changes: BroadcastCell::new(FlagChange::All),
			mapper,
			runtime,
		})
	}

	/// The provider list as of now.
	pub fn chain(&self) -> ProviderChain {
		self.state.with_lock(|state| state.chain.clone())
	}

	/// Replaces the provider list.
	///
	/// Providers are matched by id with an order-sensitive diff. Providers
	/// that lost their position get their listener cancelled, providers that
	/// gained one get a fresh listener. Moving a provider counts as both, since
	/// order decides which answer wins. Apart from the very first call, any
	/// difference broadcasts [`FlagChange::All`].
	#[instrument(skip(self, providers), fields(count = providers.len()))]
	pub fn reconfigure(&self, providers: Vec<SharedProvider>) -> Reconfiguration {
		self.modify(move |list| *list = providers).1
	}

	/// Edits the provider list in place and reconfigures, all in one critical
	/// section. `edit` must not call back into this aggregator.
	pub fn modify<R>(
		&self,
		edit: impl FnOnce(&mut Vec<SharedProvider>) -> R,
	) -> (R, Reconfiguration) {
		let (result, mut outcome, first) = self.state.with_lock(|state| {
			let mut providers = state.chain.to_vec();
			let result = edit(&mut providers);

			let old_ids = state.chain.ids();
			let new_ids: Vec<String> = providers.iter().map(|p| p.id().to_string()).collect();
			let diff = diff_by_id(&old_ids, &new_ids);

			for id in &diff.removed {
				if let Some(handle) = state.listeners.remove(id) {
					handle.abort();
					debug!(provider = %id, "Provider listener cancelled");
				}
			}

			for (index, id) in &diff.inserted {
				if let Some(previous) = state.listeners.remove(id) {
					previous.abort();
				}
				let handle = self.spawn_listener(&providers[*index]);
				state.listeners.insert(id.clone(), handle);
			}

			// Duplicate ids can leave a listed provider without a listener.
			for provider in &providers {
				if !state.listeners.contains_key(provider.id()) {
					let handle = self.spawn_listener(provider);
					state.listeners.insert(provider.id().to_string(), handle);
				}
			}

			state.chain = ProviderChain::new(providers);
			let first = !state.configured;
			state.configured = true;

			let outcome = Reconfiguration {
				removed: diff.removed,
				inserted: diff.inserted.into_iter().map(|(_, id)| id).collect(),
				notified: false,
			};
			(result, outcome, first)
		});

		if !first && !outcome.is_unchanged() {
			self.changes.update(|_| FlagChange::All);
			outcome.notified = true;
		}

		info!(
			removed = outcome.removed.len(),
			inserted = outcome.inserted.len(),
			notified = outcome.notified,
			"Provider list reconfigured"
		);
		(result, outcome)
	}

	fn spawn_listener(&self, provider: &SharedProvider) -> JoinHandle<()> {
		let id = provider.id().to_string();
		let changes = provider.changes(self.mapper.clone());
		let cell = self.changes.downgrade();
		debug!(provider = %id, "Provider listener started");
		self.runtime.spawn(listen(id, changes, cell))
	}

	/// Subscribes to the aggregated change feed.
	pub fn subscribe(&self) -> Subscription<FlagChange> {
		self.changes.subscribe()
	}

	/// The aggregated change feed.
	pub fn changes(&self) -> &BroadcastCell<FlagChange> {
		&self.changes
	}

	/// Ids of providers that currently have a listener, sorted.
	pub fn listener_ids(&self) -> Vec<String> {
		self.chain_with_listeners().1
	}

	/// The provider list and the sorted listener ids, read in one critical
	/// section.
	pub fn chain_with_listeners(&self) -> (ProviderChain, Vec<String>) {
		let (chain, mut ids) = self.state.with_lock(|state| {
			let ids: Vec<String> = state.listeners.keys().cloned().collect();
			(state.chain.clone(), ids)
		});
		ids.sort();
		(chain, ids)
	}
}

impl Drop for ChangeAggregator {
	fn drop(&mut self) {
		self.state.with_lock(|state| {
			for (_, handle) in state.listeners.drain() {
				handle.abort();
			}
		});
	}
}

impl std::fmt::Debug for ChangeAggregator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ChangeAggregator")
			.field("chain", &self.chain())
			.field("generation", &self.changes.generation())
			.finish()
	}
}

/// Forwards one provider's notifications until the stream ends, errors, or
/// the cell goes away.
async fn listen(
	provider: String,
	mut changes: crate::provider::ChangeStream,
	cell: WeakBroadcastCell<FlagChange>,
) {
	while let Some(event) = changes.next().await {
		match event {
			Ok(change) => {
				let Some(cell) = cell.upgrade() else {
					break;
				};
				let change = change.normalized();
				cell.update(move |_| change);
			}
			Err(e) => {
				warn!(provider = %provider, error = %e, "Provider change stream failed, ignoring it from now on");
				return;
			}
		}
	}
	debug!(provider = %provider, "Provider change stream ended");
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ListDiff {
	removed: Vec<String>,
	inserted: Vec<(usize, String)>,
}

/// Order-sensitive difference between two id lists, based on their longest
/// common subsequence.
fn diff_by_id(old: &[String], new: &[String]) -> ListDiff {
	let (n, m) = (old.len(), new.len());
	let mut lcs = vec![vec![0usize; m + 1]; n + 1];
	for i in (0..n).rev() {
		for j in (0..m).rev() {
			lcs[i][j] = if old[i] == new[j] {
				lcs[i + 1][j + 1] + 1
			} else {
				lcs[i + 1][j].max(lcs[i][j + 1])
			};
		}
	}

	let mut diff = ListDiff::default();
	let (mut i, mut j) = (0, 0);
	while i < n && j < m {
		if old[i] == new[j] {
			i += 1;
			j += 1;
		} else if lcs[i + 1][j] >= lcs[i][j + 1] {
			diff.removed.push(old[i].clone());
			i += 1;
		} else {
			diff.inserted.push((j, new[j].clone()));
			j += 1;
		}
	}
	diff.removed.extend(old[i..].iter().cloned());
	diff.inserted.extend((j..m).map(|j| (j, new[j].clone())));
	diff
}
