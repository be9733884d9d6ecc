// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The scope of a flag change.

use std::collections::HashSet;

use crate::KeyPath;

/// Which flags a change notification covers.
///
/// `Some` with an empty set means nothing useful, so every constructor and
/// [`FlagChange::normalized`] turn it into [`FlagChange::All`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FlagChange {
	/// Any flag may have changed.
	#[default]
	All,
	/// Only these keys changed.
	Some(HashSet<KeyPath>),
}

impl FlagChange {
	/// Builds a change for the given keys, or `All` when there are none.
	pub fn keys<I, K>(keys: I) -> Self
	where
		I: IntoIterator<Item = K>,
		K: Into<KeyPath>,
	{
		FlagChange::Some(keys.into_iter().map(Into::into).collect()).normalized()
	}

	/// Builds a change for a single key.
	pub fn key(key: impl Into<KeyPath>) -> Self {
		FlagChange::keys([key])
	}

	pub fn normalized(self) -> Self {
		match self {
			FlagChange::Some(keys) if keys.is_empty() => FlagChange::All,
			other => other,
		}
	}

	pub fn is_all(&self) -> bool {
		match self {
			FlagChange::All => true,
			FlagChange::Some(keys) => keys.is_empty(),
		}
	}

	/// Returns true if a flag stored under `key` needs to be re-resolved.
	pub fn affects(&self, key: &str) -> bool {
		match self {
			FlagChange::All => true,
			FlagChange::Some(keys) => keys.is_empty() || keys.contains(key),
		}
	}
}
