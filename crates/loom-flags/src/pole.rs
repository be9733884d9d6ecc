// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The flag pole: a root flag hierarchy plus the providers that answer for it.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use futures::stream::{self, BoxStream, StreamExt};
use loom_flags_core::{FlagChange, FlagValue, FlagValueType, KeyPath, Result};
use tracing::debug;

use crate::aggregator::{ChangeAggregator, Reconfiguration};
use crate::broadcast::Subscription;
use crate::chain::ProviderChain;
use crate::config::FlagPoleConfig;
use crate::hierarchy::{FlagContainer, FlagVisitor};
use crate::provider::{FlagProvider, KeyMapper, SharedProvider};
use crate::snapshot::{Snapshot, SnapshotSource};

/// Builder for [`FlagPole`].
#[derive(Default)]
pub struct FlagPoleBuilder {
	config: FlagPoleConfig,
	providers: Vec<SharedProvider>,
}

impl FlagPoleBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(mut self, config: FlagPoleConfig) -> Self {
		self.config = config;
		self
	}

	/// Appends a provider; earlier providers win.
	pub fn provider(mut self, provider: SharedProvider) -> Self {
		self.providers.push(provider);
		self
	}

	pub fn providers(mut self, providers: impl IntoIterator<Item = SharedProvider>) -> Self {
		self.providers.extend(providers);
		self
	}

	/// Builds the pole, constructing the root container from the configured
	/// root key path.
	///
	/// Must be called from within a tokio runtime; provider listeners run on
	/// it.
	pub fn build<R, F>(self, root: F) -> Result<FlagPole<R>>
	where
		F: FnOnce(&KeyPath) -> R,
	{
		self.config.validate()?;

		let style = self.config.key_style();
		let mapper: KeyMapper = Arc::new(move |raw: &str| KeyPath::with_style(raw, style.clone()));
		let aggregator = ChangeAggregator::new(mapper)?;
		aggregator.reconfigure(self.providers);

		let root_key_path = self.config.root_key_path();
		Ok(FlagPole {
			root: root(&root_key_path),
			root_key_path,
			config: self.config,
			aggregator: Arc::new(aggregator),
		})
	}
}

/// A flag hierarchy bound to an ordered list of providers.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use loom_flags::{FlagPole, FlagValueDictionary};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> loom_flags::Result<()> {
/// let overrides = Arc::new(FlagValueDictionary::from_values("overrides", [("beta", true)]));
/// let pole = FlagPole::builder().provider(overrides).build(|_| ())?;
///
/// assert_eq!(pole.value::<bool>("beta"), Some(true));
/// assert!(!pole.value_or("missing", false));
/// # Ok(())
/// # }
/// ```
pub struct FlagPole<R> {
	root: R,
	config: FlagPoleConfig,
	root_key_path: KeyPath,
	aggregator: Arc<ChangeAggregator>,
}

impl FlagPole<()> {
	pub fn builder() -> FlagPoleBuilder {
		FlagPoleBuilder::new()
	}
}

impl<R> FlagPole<R> {
	pub fn root(&self) -> &R {
		&self.root
	}

	pub fn config(&self) -> &FlagPoleConfig {
		&self.config
	}

	pub fn root_key_path(&self) -> &KeyPath {
		&self.root_key_path
	}

	pub fn walk(&self, visitor: &mut dyn FlagVisitor)
	where
		R: FlagContainer,
	{
		self.root.walk(visitor);
	}

	// Providers

	/// The provider list as of now.
	pub fn chain(&self) -> ProviderChain {
		self.aggregator.chain()
	}

	/// The provider list and the ids that have a running listener, taken
	/// together.
	pub fn chain_with_listeners(&self) -> (ProviderChain, Vec<String>) {
		self.aggregator.chain_with_listeners()
	}

	pub fn providers(&self) -> Vec<SharedProvider> {
		self.chain().to_vec()
	}

	pub fn set_providers(&self, providers: Vec<SharedProvider>) -> Reconfiguration {
		self.aggregator.reconfigure(providers)
	}

	/// Inserts `provider` at `index`, or at the end if `index` is past it.
	pub fn insert_provider(&self, provider: SharedProvider, index: usize) -> Reconfiguration {
		self
			.aggregator
			.modify(move |list| {
				let index = index.min(list.len());
				list.insert(index, provider);
			})
			.1
	}

	pub fn append_provider(&self, provider: SharedProvider) -> Reconfiguration {
		self.insert_provider(provider, usize::MAX)
	}

	/// Removes the first provider with `id` and returns it.
	pub fn remove_provider(&self, id: &str) -> Option<SharedProvider> {
		let (removed, _) = self.aggregator.modify(|list| {
			let index = list.iter().position(|provider| provider.id() == id)?;
			Some(list.remove(index))
		});
		if removed.is_some() {
			debug!(provider = %id, "Provider removed");
		}
		removed
	}

	// Resolution

	/// The first provider's answer for `key`, or `None` if none has one.
	pub fn resolve(&self, key: &(impl AsRef<str> + ?Sized)) -> Option<FlagValue> {
		self.chain().resolve(key.as_ref())
	}

	/// Typed resolution. An answer of the wrong type is skipped.
	pub fn value<T: FlagValueType>(&self, key: &(impl AsRef<str> + ?Sized)) -> Option<T> {
		self.chain().value(key.as_ref())
	}

	pub fn value_or<T: FlagValueType>(&self, key: &(impl AsRef<str> + ?Sized), default: T) -> T {
		self.value(key).unwrap_or(default)
	}

	// Observation

	/// A subscription to every change; the first `next` returns `All`.
	pub fn subscribe(&self) -> Subscription<FlagChange> {
		self.aggregator.subscribe()
	}

	/// Stream form of [`FlagPole::subscribe`]. Ends when the pole is dropped.
	pub fn changes(&self) -> BoxStream<'static, FlagChange> {
		self.subscribe().into_stream()
	}

	/// Streams the resolved value of `key`.
	///
	/// Yields the current value first, then a new value whenever a change
	/// makes `key` resolve differently. Ends when the pole is dropped.
	pub fn watch<T>(&self, key: &(impl AsRef<str> + ?Sized), default: T) -> BoxStream<'static, T>
	where
		T: FlagValueType + Clone + PartialEq + Send + 'static,
	{
		let watch = Watch {
			aggregator: Arc::downgrade(&self.aggregator),
			subscription: self.aggregator.changes().subscribe_to_updates(),
			key: key.as_ref().to_string(),
			default,
			last: None,
		};

		stream::unfold(watch, |mut watch| async move {
			loop {
				// Every change re-resolves: the feed is conflated, so the key set
				// received may not name a key whose value changed earlier.
				if watch.last.is_some() {
					watch.subscription.next().await?;
				}

				let chain = watch.aggregator.upgrade()?.chain();
				let value = chain
					.value(&watch.key)
					.unwrap_or_else(|| watch.default.clone());
				if watch.last.as_ref() == Some(&value) {
					continue;
				}
				watch.last = Some(value.clone());
				return Some((value, watch));
			}
		})
		.boxed()
	}

	// Snapshots

	/// Captures the resolved value of every declared flag.
	pub fn snapshot(&self) -> Snapshot
	where
		R: FlagContainer,
	{
		Snapshot::capture(&self.root, SnapshotSource::Chain(&self.chain()), None)
	}

	/// Captures the resolved value of the declared flags in `keys`.
	pub fn snapshot_keys<I>(&self, keys: I) -> Snapshot
	where
		R: FlagContainer,
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let only = key_set(keys);
		Snapshot::capture(&self.root, SnapshotSource::Chain(&self.chain()), Some(&only))
	}

	/// Captures what `provider` alone holds for every declared flag.
	pub fn snapshot_of(&self, provider: &dyn FlagProvider) -> Snapshot
	where
		R: FlagContainer,
	{
		Snapshot::capture(&self.root, SnapshotSource::Provider(provider), None)
	}

	pub fn snapshot_of_keys<I>(&self, provider: &dyn FlagProvider, keys: I) -> Snapshot
	where
		R: FlagContainer,
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let only = key_set(keys);
		Snapshot::capture(&self.root, SnapshotSource::Provider(provider), Some(&only))
	}

	pub fn empty_snapshot(&self) -> Snapshot {
		Snapshot::new()
	}

	/// Layers `snapshot` into the provider list at `index`.
	pub fn insert_snapshot(&self, snapshot: Arc<Snapshot>, index: usize) -> Reconfiguration {
		self.insert_provider(snapshot, index)
	}

	/// Writes the keys present in `snapshot` into `provider`.
	pub fn save(&self, snapshot: &Snapshot, provider: &dyn FlagProvider) -> Result<()> {
		snapshot.save(provider)
	}
}

impl<R> std::fmt::Debug for FlagPole<R> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlagPole")
			.field("config", &self.config)
			.field("aggregator", &self.aggregator)
			.finish_non_exhaustive()
	}
}

struct Watch<T> {
	aggregator: Weak<ChangeAggregator>,
	subscription: Subscription<FlagChange>,
	key: String,
	default: T,
	last: Option<T>,
}

fn key_set<I>(keys: I) -> HashSet<String>
where
	I: IntoIterator,
	I::Item: AsRef<str>,
{
	keys
		.into_iter()
		.map(|key| key.as_ref().to_string())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dictionary::FlagValueDictionary;
	use crate::hierarchy::tests::TestFlags;
	use loom_flags_core::{FlagsError, KeyNamingStrategy};
	use std::time::Duration;

	const WAIT: Duration = Duration::from_secs(1);

	fn dict(id: &str, values: &[(&str, FlagValue)]) -> Arc<FlagValueDictionary> {
		Arc::new(FlagValueDictionary::from_values(
			id,
			values.iter().map(|(k, v)| (k.to_string(), v.clone())),
		))
	}

	async fn next_within<T>(stream: &mut BoxStream<'static, T>) -> Option<T> {
		tokio::time::timeout(WAIT, stream.next())
			.await
			.expect("timed out waiting for stream")
	}

	#[test]
	fn test_build_requires_runtime() {
		let err = FlagPole::builder().build(|_| ()).unwrap_err();
		assert!(matches!(err, FlagsError::RuntimeUnavailable));
	}

	#[tokio::test]
	async fn test_build_rejects_invalid_config() {
		let err = FlagPole::builder()
			.config(FlagPoleConfig::default().with_separator(""))
			.build(|_| ())
			.unwrap_err();
		assert!(matches!(err, FlagsError::InvalidConfig(_)));
	}

	#[tokio::test]
	async fn test_root_built_from_configured_key_path() {
		let config = FlagPoleConfig::default()
			.with_prefix("app")
			.with_naming(KeyNamingStrategy::Snake);
		let pole = FlagPole::builder().config(config).build(TestFlags::new).unwrap();
		assert_eq!(pole.root().ui.theme.key_path().key(), "app.ui.color_theme");
		assert_eq!(pole.root_key_path().key(), "app");
	}

	#[tokio::test]
	async fn test_flag_value_uses_default_when_absent() {
		let live = dict("live", &[("enabled", FlagValue::Boolean(true))]);
		let pole = FlagPole::builder().provider(live).build(TestFlags::new).unwrap();
		assert!(pole.root().enabled.value(&pole));
		assert_eq!(pole.root().ui.theme.value(&pole), "light");
		assert_eq!(pole.value_or("ui.COLS", 7), 7);
	}

	#[tokio::test]
	async fn test_provider_management() {
		let pole = FlagPole::builder()
			.providers([dict("a", &[]) as SharedProvider, dict("b", &[]) as SharedProvider])
			.build(|_| ())
			.unwrap();

		pole.insert_provider(dict("first", &[]), 0);
		pole.insert_provider(dict("last", &[]), 99);
		pole.append_provider(dict("tail", &[]));
		assert_eq!(pole.chain().ids(), vec!["first", "a", "b", "last", "tail"]);

		let removed = pole.remove_provider("b").unwrap();
		assert_eq!(removed.id(), "b");
		assert!(pole.remove_provider("b").is_none());
		assert_eq!(pole.providers().len(), 4);
	}

	#[tokio::test]
	async fn test_insert_provider_broadcasts_all() {
		let pole = FlagPole::builder()
			.provider(dict("base", &[("f", FlagValue::Boolean(true))]))
			.build(|_| ())
			.unwrap();
		let mut changes = pole.changes();
		assert_eq!(next_within(&mut changes).await, Some(FlagChange::All));

		let outcome = pole.insert_provider(dict("override", &[("f", FlagValue::Boolean(false))]), 0);
		assert!(outcome.notified);
		assert_eq!(next_within(&mut changes).await, Some(FlagChange::All));
		assert_eq!(pole.value::<bool>("f"), Some(false));
	}

	#[tokio::test]
	async fn test_changes_forwarded_from_provider() {
		let live = dict("live", &[]);
		let pole = FlagPole::builder().provider(live.clone()).build(|_| ()).unwrap();
		let mut sub = pole.subscribe();
		assert_eq!(sub.next().await, Some(FlagChange::All));

		live.insert("enabled", true);
		let change = tokio::time::timeout(WAIT, sub.next()).await.unwrap().unwrap();
		assert!(change.affects("enabled"));
	}

	#[tokio::test]
	async fn test_watch_emits_only_differences() {
		let live = dict("live", &[("enabled", FlagValue::Boolean(true))]);
		let pole = FlagPole::builder().provider(live.clone()).build(|_| ()).unwrap();
		let mut watch = pole.watch("enabled", false);
		assert_eq!(next_within(&mut watch).await, Some(true));

		live.insert("other", 1);
		live.insert("enabled", true);
		live.insert("enabled", false);
		assert_eq!(next_within(&mut watch).await, Some(false));

		live.insert("enabled", false);
		assert!(tokio::time::timeout(Duration::from_millis(50), watch.next())
			.await
			.is_err());

		live.remove("enabled");
		live.insert("enabled", true);
		assert_eq!(next_within(&mut watch).await, Some(true));
	}

	#[tokio::test]
	async fn test_watch_sees_change_followed_by_unrelated_change() {
		let live = dict("live", &[("enabled", FlagValue::Boolean(true))]);
		let pole = FlagPole::builder().provider(live.clone()).build(|_| ()).unwrap();
		let mut watch = pole.watch("enabled", false);
		assert_eq!(next_within(&mut watch).await, Some(true));

		live.insert("enabled", false);
		live.insert("other", 1);
		assert_eq!(pole.value::<bool>("enabled"), Some(false));
		assert_eq!(next_within(&mut watch).await, Some(false));
	}

	#[tokio::test]
	async fn test_watch_ends_when_pole_dropped() {
		let pole = FlagPole::builder().build(|_| ()).unwrap();
		let mut watch = pole.watch("anything", 3i64);
		assert_eq!(next_within(&mut watch).await, Some(3));
		drop(pole);
		assert_eq!(next_within(&mut watch).await, None);
	}

	#[tokio::test]
	async fn test_snapshot_modes() {
		let overrides = dict("overrides", &[("enabled", FlagValue::Boolean(true))]);
		let defaults = dict(
			"defaults",
			&[
				("enabled", FlagValue::Boolean(false)),
				("ui.color-theme", FlagValue::String("dark".to_string())),
			],
		);
		let pole = FlagPole::builder()
			.provider(overrides)
			.provider(defaults.clone())
			.build(TestFlags::new)
			.unwrap();

		let full = pole.snapshot();
		assert_eq!(full.value::<bool>("enabled"), Some(true));
		assert_eq!(full.len(), 2);

		let partial = pole.snapshot_keys(["enabled"]);
		assert_eq!(partial.keys(), vec!["enabled"]);

		let single = pole.snapshot_of(&*defaults);
		assert_eq!(single.value::<bool>("enabled"), Some(false));

		let single_partial = pole.snapshot_of_keys(&*defaults, ["ui.color-theme"]);
		assert_eq!(single_partial.keys(), vec!["ui.color-theme"]);

		assert!(pole.empty_snapshot().is_empty());
	}

	#[tokio::test]
	async fn test_inserted_snapshot_overrides() {
		let live = dict("live", &[("enabled", FlagValue::Boolean(false))]);
		let pole = FlagPole::builder().provider(live.clone()).build(TestFlags::new).unwrap();

		let snapshot = Arc::new(pole.empty_snapshot());
		pole.insert_snapshot(snapshot.clone(), 0);
		assert!(!pole.root().enabled.value(&pole));

		let mut watch = pole.watch("enabled", false);
		assert_eq!(next_within(&mut watch).await, Some(false));

		snapshot.insert("enabled", true);
		assert_eq!(next_within(&mut watch).await, Some(true));

		pole.save(&snapshot, &*live).unwrap();
		assert_eq!(live.get("enabled"), Some(FlagValue::Boolean(true)));
	}
}
