// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the flag runtime.
//!
//! A missing value is never an error: providers answer `None` and the caller's
//! own default applies. Errors only describe failed writes, broken upstream
//! notification streams and bad configuration.

use thiserror::Error;

/// Flag runtime errors.
#[derive(Debug, Error)]
pub enum FlagsError {
	/// The provider does not accept writes.
	#[error("provider '{provider}' is read-only")]
	ReadOnly { provider: String },

	/// The value cannot be stored by the target provider.
	#[error("unsupported value for key '{key}': {message}")]
	UnsupportedValue { key: String, message: String },

	/// The provider's backing store failed.
	#[error("storage failure in provider '{provider}': {message}")]
	Storage { provider: String, message: String },

	/// A provider's change notification stream failed.
	#[error("change stream for provider '{provider}' failed: {message}")]
	ChangeStream { provider: String, message: String },

	/// Listener tasks need a tokio runtime to run on.
	#[error("no tokio runtime available to run provider listeners")]
	RuntimeUnavailable,

	/// Configuration failed validation.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// Configuration could not be parsed.
	#[error("configuration parse error: {0}")]
	ConfigParse(#[from] toml::de::Error),
}

impl FlagsError {
	/// Create a read-only error for the given provider.
	pub fn read_only(provider: impl Into<String>) -> Self {
		Self::ReadOnly {
			provider: provider.into(),
		}
	}

	/// Create a storage error for the given provider.
	pub fn storage(provider: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Storage {
			provider: provider.into(),
			message: message.into(),
		}
	}

	/// Create an unsupported value error.
	pub fn unsupported_value(key: impl Into<String>, message: impl Into<String>) -> Self {
		Self::UnsupportedValue {
			key: key.into(),
			message: message.into(),
		}
	}

	/// Create a change stream error for the given provider.
	pub fn change_stream(provider: impl Into<String>, message: impl Into<String>) -> Self {
		Self::ChangeStream {
			provider: provider.into(),
			message: message.into(),
		}
	}

	/// Returns true if this error came from a write the provider refused or
	/// could not complete.
	pub fn is_write_failure(&self) -> bool {
		matches!(
			self,
			FlagsError::ReadOnly { .. } | FlagsError::UnsupportedValue { .. } | FlagsError::Storage { .. }
		)
	}
}

/// Result type alias for flag runtime operations.
pub type Result<T> = std::result::Result<T, FlagsError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_write_failures() {
		assert!(FlagsError::read_only("env").is_write_failure());
		assert!(FlagsError::storage("disk", "full").is_write_failure());
		assert!(FlagsError::unsupported_value("a.b", "bytes").is_write_failure());
	}

	#[test]
	fn test_non_write_failures() {
		assert!(!FlagsError::RuntimeUnavailable.is_write_failure());
		assert!(!FlagsError::change_stream("remote", "closed").is_write_failure());
		assert!(!FlagsError::InvalidConfig("empty separator".to_string()).is_write_failure());
	}

	#[test]
	fn test_display_includes_provider() {
		let err = FlagsError::read_only("environment");
		assert_eq!(err.to_string(), "provider 'environment' is read-only");
	}
}
