// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key folding configuration for a [`FlagPole`](crate::FlagPole).

use loom_flags_core::{
	FlagsError, KeyNamingStrategy, KeyPath, KeySegment, KeyStyle, Result, DEFAULT_SEPARATOR,
};
use serde::{Deserialize, Serialize};

fn default_separator() -> String {
	DEFAULT_SEPARATOR.to_string()
}

/// How flag keys are built.
///
/// ```toml
/// separator = "."
/// naming = "snake"
/// prefix = "myapp"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagPoleConfig {
	/// Joins key segments.
	#[serde(default = "default_separator")]
	pub separator: String,
	/// Folding applied to automatically named segments.
	pub naming: KeyNamingStrategy,
	/// Taken literally and put in front of every key.
	pub prefix: Option<String>,
}

impl Default for FlagPoleConfig {
	fn default() -> Self {
		Self {
			separator: default_separator(),
			naming: KeyNamingStrategy::default(),
			prefix: None,
		}
	}
}

impl FlagPoleConfig {
	pub fn from_toml_str(source: &str) -> Result<Self> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.separator.is_empty() {
			return Err(FlagsError::InvalidConfig(
				"separator must not be empty".to_string(),
			));
		}
		if self.prefix.as_deref() == Some("") {
			return Err(FlagsError::InvalidConfig(
				"prefix must not be empty when set".to_string(),
			));
		}
		Ok(())
	}

	pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
		self.separator = separator.into();
		self
	}

	pub fn with_naming(mut self, naming: KeyNamingStrategy) -> Self {
		self.naming = naming;
		self
	}

	pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.prefix = Some(prefix.into());
		self
	}

	pub fn key_style(&self) -> KeyStyle {
		KeyStyle::new(self.separator.clone(), self.naming)
	}

	/// The key path every declared flag hangs off.
	pub fn root_key_path(&self) -> KeyPath {
		let root = KeyPath::root(self.key_style());
		match &self.prefix {
			Some(prefix) => root.append(KeySegment::custom(prefix.clone())),
			None => root,
		}
	}
}
