// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only provider over the process environment.

use loom_flags_core::{FlagValue, FlagsError, Result};
use tracing::trace;

use crate::provider::{silent_changes, ChangeStream, FlagProvider, KeyMapper};

/// Serves flags from environment variables.
///
/// The key `checkout.new-flow` under prefix `APP` is read from
/// `APP_CHECKOUT_NEW_FLOW`. Values are always strings; typed lookups parse
/// them. The environment is not watched, so this provider never notifies.
#[derive(Debug, Clone)]
pub struct EnvironmentProvider {
	id: String,
	prefix: Option<String>,
}

impl EnvironmentProvider {
	pub fn new(prefix: impl Into<String>) -> Self {
		let prefix = prefix.into();
		if prefix.is_empty() {
			return Self::without_prefix();
		}
		Self {
			id: format!("environment-{}", prefix.to_ascii_lowercase()),
			prefix: Some(prefix),
		}
	}

	pub fn without_prefix() -> Self {
		Self {
			id: "environment".to_string(),
			prefix: None,
		}
	}

	pub fn prefix(&self) -> Option<&str> {
		self.prefix.as_deref()
	}

	/// The variable name `key` is read from.
	pub fn variable_name(&self, key: &str) -> String {
		let name: String = key
			.chars()
			.map(|c| {
				if c.is_ascii_alphanumeric() {
					c.to_ascii_uppercase()
				} else {
					'_'
				}
			})
			.collect();
		match &self.prefix {
			Some(prefix) => format!("{prefix}_{name}"),
			None => name,
		}
	}
}

impl FlagProvider for EnvironmentProvider {
	fn id(&self) -> &str {
		&self.id
	}

	fn lookup(&self, key: &str) -> Option<FlagValue> {
		let variable = self.variable_name(key);
		let value = std::env::var(&variable).ok()?;
		trace!(provider = %self.id, variable = %variable, "Flag read from environment");
		Some(FlagValue::String(value))
	}

	fn set(&self, _key: &str, _value: Option<FlagValue>) -> Result<()> {
		Err(FlagsError::read_only(&self.id))
	}

	fn changes(&self, _mapper: KeyMapper) -> ChangeStream {
		silent_changes()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::{verbatim_keys, FlagProviderExt};
	use futures::StreamExt;
	use tokio_test::{assert_pending, task};

	#[test]
	fn test_variable_name() {
		let provider = EnvironmentProvider::new("APP");
		assert_eq!(provider.variable_name("a.b-c"), "APP_A_B_C");
		assert_eq!(provider.variable_name("ui.colorTheme"), "APP_UI_COLORTHEME");

		let bare = EnvironmentProvider::without_prefix();
		assert_eq!(bare.variable_name("a.b"), "A_B");
	}

	#[test]
	fn test_empty_prefix_means_none() {
		let provider = EnvironmentProvider::new("");
		assert_eq!(provider.prefix(), None);
		assert_eq!(provider.id(), "environment");
	}

	#[test]
	fn test_lookup_reads_and_parses() {
		std::env::set_var("LOOM_ENV_PROVIDER_TEST_RETRIES", "5");
		std::env::set_var("LOOM_ENV_PROVIDER_TEST_ENABLED", "true");
		let provider = EnvironmentProvider::new("LOOM_ENV_PROVIDER_TEST");

		assert_eq!(provider.value::<i64>("retries"), Some(5));
		assert_eq!(provider.value::<bool>("enabled"), Some(true));
		assert_eq!(
			provider.lookup("retries"),
			Some(FlagValue::String("5".to_string()))
		);
		assert_eq!(provider.lookup("missing"), None);
	}

	#[test]
	fn test_set_is_read_only() {
		let provider = EnvironmentProvider::new("LOOM_ENV_PROVIDER_TEST");
		let err = provider.set("retries", Some(FlagValue::Integer(1))).unwrap_err();
		assert!(matches!(err, FlagsError::ReadOnly { .. }));
		assert!(err.is_write_failure());
	}

	#[test]
	fn test_changes_never_yield() {
		let provider = EnvironmentProvider::new("LOOM_ENV_PROVIDER_TEST");
		let mut changes = provider.changes(verbatim_keys());
		assert_pending!(task::spawn(changes.next()).poll());
	}
}
