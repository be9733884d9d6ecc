// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured flag keys.
//!
//! A [`KeyPath`] is built by appending [`KeySegment`]s to a root. Every append
//! folds the segment into a single lookup string using the path's
//! [`KeyStyle`]. Equality and hashing only look at that folded string, so a key
//! read from a provider compares equal to the same key built from segments.
//!
//! ```
//! use loom_flags_core::{KeyPath, KeySegment, KeyStyle};
//!
//! let root = KeyPath::root(KeyStyle::default());
//! let key = root
//!     .append(KeySegment::automatic("checkoutFlow"))
//!     .append(KeySegment::snake("use-new-api"));
//! assert_eq!(key.key(), "checkout-flow.use_new_api");
//! assert_eq!(key, KeyPath::from("checkout-flow.use_new_api"));
//! ```

use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use heck::ToKebabCase;
use serde::{Deserialize, Serialize};

/// Default separator between folded segments.
pub const DEFAULT_SEPARATOR: &str = ".";

/// How `automatic` segments are folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyNamingStrategy {
	/// `newFlow` becomes `new-flow`.
	#[default]
	Kebab,
	/// `newFlow` becomes `new_flow`.
	Snake,
}

impl KeyNamingStrategy {
	/// Folds a name under this strategy.
	pub fn fold(self, name: &str) -> String {
		match self {
			KeyNamingStrategy::Kebab => kebab(name),
			KeyNamingStrategy::Snake => snake(name),
		}
	}
}

/// Separator and naming strategy carried by every key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyStyle {
	pub separator: String,
	pub naming: KeyNamingStrategy,
}

impl KeyStyle {
	pub fn new(separator: impl Into<String>, naming: KeyNamingStrategy) -> Self {
		Self {
			separator: separator.into(),
			naming,
		}
	}
}

impl Default for KeyStyle {
	fn default() -> Self {
		Self::new(DEFAULT_SEPARATOR, KeyNamingStrategy::default())
	}
}

/// One step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
	/// Leaves the key unchanged.
	Root,
	/// Folded by the path's naming strategy.
	Automatic(String),
	/// Always hyphen-cased.
	Kebab(String),
	/// Hyphen-cased, then hyphens become underscores.
	Snake(String),
	/// Appended literally.
	Custom(String),
	/// Replaces everything before it.
	Absolute(String),
}

impl KeySegment {
	pub fn automatic(name: impl Into<String>) -> Self {
		KeySegment::Automatic(name.into())
	}

	pub fn kebab(name: impl Into<String>) -> Self {
		KeySegment::Kebab(name.into())
	}

	pub fn snake(name: impl Into<String>) -> Self {
		KeySegment::Snake(name.into())
	}

	pub fn custom(name: impl Into<String>) -> Self {
		KeySegment::Custom(name.into())
	}

	pub fn absolute(key: impl Into<String>) -> Self {
		KeySegment::Absolute(key.into())
	}
}

/// A folded lookup key plus the style used to extend it.
#[derive(Clone)]
pub struct KeyPath {
	key: String,
	style: Arc<KeyStyle>,
}

impl KeyPath {
	/// An empty root path using `style` for every later append.
	pub fn root(style: KeyStyle) -> Self {
		Self {
			key: String::new(),
			style: Arc::new(style),
		}
	}

	/// A path whose key is taken verbatim, with the default style.
	pub fn new(key: impl Into<String>) -> Self {
		Self::with_style(key, KeyStyle::default())
	}

	/// A path whose key is taken verbatim.
	pub fn with_style(key: impl Into<String>, style: KeyStyle) -> Self {
		Self {
			key: key.into(),
			style: Arc::new(style),
		}
	}

	/// Returns a new path extended by `segment`.
	pub fn append(&self, segment: KeySegment) -> KeyPath {
		let folded = match segment {
			KeySegment::Root => return self.clone(),
			KeySegment::Absolute(key) => {
				return KeyPath {
					key,
					style: Arc::clone(&self.style),
				};
			}
			KeySegment::Automatic(name) => self.style.naming.fold(&name),
			KeySegment::Kebab(name) => kebab(&name),
			KeySegment::Snake(name) => snake(&name),
			KeySegment::Custom(name) => name,
		};

		if folded.is_empty() {
			return self.clone();
		}

		let key = if self.key.is_empty() {
			folded
		} else {
			let mut key =
				String::with_capacity(self.key.len() + self.style.separator.len() + folded.len());
			key.push_str(&self.key);
			key.push_str(&self.style.separator);
			key.push_str(&folded);
			key
		};

		KeyPath {
			key,
			style: Arc::clone(&self.style),
		}
	}

	/// The folded lookup key.
	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn style(&self) -> &KeyStyle {
		&self.style
	}

	/// True for a root path that has not been extended yet.
	pub fn is_root(&self) -> bool {
		self.key.is_empty()
	}

	pub fn into_key(self) -> String {
		self.key
	}
}

fn kebab(name: &str) -> String {
	name.to_kebab_case()
}

fn snake(name: &str) -> String {
	kebab(name).replace('-', "_")
}

impl PartialEq for KeyPath {
	fn eq(&self, other: &Self) -> bool {
		self.key == other.key
	}
}

impl Eq for KeyPath {}

impl Hash for KeyPath {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key.hash(state);
	}
}

impl PartialOrd for KeyPath {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for KeyPath {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.key.cmp(&other.key)
	}
}

impl Borrow<str> for KeyPath {
	fn borrow(&self) -> &str {
		&self.key
	}
}

impl AsRef<str> for KeyPath {
	fn as_ref(&self) -> &str {
		&self.key
	}
}

impl std::fmt::Debug for KeyPath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("KeyPath").field(&self.key).finish()
	}
}

impl std::fmt::Display for KeyPath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.key)
	}
}

impl From<&str> for KeyPath {
	fn from(key: &str) -> Self {
		KeyPath::new(key)
	}
}

impl From<String> for KeyPath {
	fn from(key: String) -> Self {
		KeyPath::new(key)
	}
}
