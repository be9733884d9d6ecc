// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! First-answer-wins lookup across an ordered provider list.

use std::sync::Arc;

use loom_flags_core::{FlagValue, FlagValueType};

use crate::provider::SharedProvider;

/// An immutable, cheaply cloned view of a provider list.
///
/// The aggregator swaps in a new chain on every reconfiguration; a chain that
/// was handed out keeps resolving against the list it was taken from.
#[derive(Clone, Default)]
pub struct ProviderChain {
	providers: Arc<Vec<SharedProvider>>,
}

impl ProviderChain {
	pub fn new(providers: Vec<SharedProvider>) -> Self {
		Self {
			providers: Arc::new(providers),
		}
	}

	/// Returns the first provider's answer for `key`, in list order.
	///
	/// `None` means no provider had an answer; the caller's default applies.
	pub fn resolve(&self, key: &str) -> Option<FlagValue> {
		self
			.providers
			.iter()
			.find_map(|provider| provider.lookup(key))
	}

	/// Like [`ProviderChain::resolve`], but skips answers that don't convert
	/// to `T` and keeps looking further down the list.
	pub fn value<T: FlagValueType>(&self, key: &str) -> Option<T> {
		self
			.providers
			.iter()
			.find_map(|provider| provider.lookup(key).and_then(T::from_flag_value))
	}

	/// The provider whose answer `resolve` would return, if any.
	pub fn source_of(&self, key: &str) -> Option<&SharedProvider> {
		self
			.providers
			.iter()
			.find(|provider| provider.lookup(key).is_some())
	}

	pub fn find(&self, id: &str) -> Option<&SharedProvider> {
		self.providers.iter().find(|provider| provider.id() == id)
	}

	pub fn ids(&self) -> Vec<String> {
		self
			.providers
			.iter()
			.map(|provider| provider.id().to_string())
			.collect()
	}

	pub fn providers(&self) -> &[SharedProvider] {
		&self.providers
	}

	pub fn to_vec(&self) -> Vec<SharedProvider> {
		self.providers.as_ref().clone()
	}

	pub fn len(&self) -> usize {
		self.providers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

impl std::fmt::Debug for ProviderChain {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.providers.iter().map(|p| p.id())).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dictionary::FlagValueDictionary;
	use proptest::prelude::*;

	fn dict(id: &str, values: &[(&str, FlagValue)]) -> SharedProvider {
		Arc::new(FlagValueDictionary::from_values(
			id,
			values.iter().map(|(k, v)| (k.to_string(), v.clone())),
		))
	}

	#[test]
	fn test_first_answer_wins() {
		let chain = ProviderChain::new(vec![
			dict("a", &[("f", FlagValue::Boolean(false))]),
			dict("b", &[("f", FlagValue::Boolean(true)), ("g", FlagValue::Integer(2))]),
		]);
		assert_eq!(chain.resolve("f"), Some(FlagValue::Boolean(false)));
		assert_eq!(chain.resolve("g"), Some(FlagValue::Integer(2)));
		assert_eq!(chain.resolve("h"), None);
		assert_eq!(chain.source_of("g").map(|p| p.id()), Some("b"));
	}

	#[test]
	fn test_empty_chain_is_absent() {
		let chain = ProviderChain::default();
		assert!(chain.is_empty());
		assert_eq!(chain.resolve("anything"), None);
	}

	#[test]
	fn test_typed_value_skips_mismatches() {
		let chain = ProviderChain::new(vec![
			dict("a", &[("f", FlagValue::String("not a number".to_string()))]),
			dict("b", &[("f", FlagValue::Integer(42))]),
		]);
		assert_eq!(chain.value::<i64>("f"), Some(42));
		assert_eq!(chain.value::<String>("f"), Some("not a number".to_string()));
	}

	#[test]
	fn test_find_and_ids() {
		let chain = ProviderChain::new(vec![dict("one", &[]), dict("two", &[])]);
		assert_eq!(chain.ids(), vec!["one", "two"]);
		assert!(chain.find("two").is_some());
		assert!(chain.find("three").is_none());
	}

	proptest! {
		#[test]
		fn resolve_matches_first_present(
			layers in prop::collection::vec(prop::option::of(any::<i64>()), 0..8),
		) {
			let providers: Vec<SharedProvider> = layers
				.iter()
				.enumerate()
				.map(|(i, value)| {
					let values: Vec<(&str, FlagValue)> = value
						.iter()
						.map(|v| ("k", FlagValue::Integer(*v)))
						.collect();
					dict(&format!("p{i}"), &values)
				})
				.collect();
			let chain = ProviderChain::new(providers);
			let expected = layers.iter().flatten().next().copied().map(FlagValue::Integer);
			prop_assert_eq!(chain.resolve("k"), expected);
		}
	}
}
