// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Declared flags and the containers that group them.
//!
//! A flag hierarchy is plain Rust structs: each group builds its children's
//! key paths from its own when it is constructed, and enumerates them in
//! [`FlagContainer::walk`]. Snapshots and tooling discover flags by walking
//! the hierarchy with a [`FlagVisitor`].
//!
//! ```
//! use loom_flags::{Flag, FlagContainer, FlagVisitor};
//! use loom_flags_core::{KeyPath, KeySegment, KeyStyle};
//!
//! struct CheckoutFlags {
//!     key_path: KeyPath,
//!     new_flow: Flag<bool>,
//!     retries: Flag<i64>,
//! }
//!
//! impl CheckoutFlags {
//!     fn new(parent: &KeyPath) -> Self {
//!         let key_path = parent.append(KeySegment::automatic("checkout"));
//!         Self {
//!             new_flow: Flag::new(&key_path, "newFlow", false),
//!             retries: Flag::new(&key_path, "retries", 3),
//!             key_path,
//!         }
//!     }
//! }
//!
//! impl FlagContainer for CheckoutFlags {
//!     fn walk(&self, visitor: &mut dyn FlagVisitor) {
//!         visitor.begin_group(&self.key_path);
//!         self.new_flow.walk(visitor);
//!         self.retries.walk(visitor);
//!         visitor.end_group(&self.key_path);
//!     }
//! }
//!
//! let flags = CheckoutFlags::new(&KeyPath::root(KeyStyle::default()));
//! assert_eq!(flags.new_flow.key_path().key(), "checkout.new-flow");
//! ```

use loom_flags_core::{FlagValue, FlagValueType, KeyPath, KeySegment};

use crate::pole::FlagPole;
use crate::snapshot::Snapshot;

/// What a visitor learns about a declared flag.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagInfo {
	pub key_path: KeyPath,
	pub name: String,
	pub description: Option<String>,
	pub default_value: FlagValue,
}

/// Receives callbacks while a hierarchy is walked.
pub trait FlagVisitor {
	fn begin_group(&mut self, _key_path: &KeyPath) {}

	fn end_group(&mut self, _key_path: &KeyPath) {}

	fn visit_flag(&mut self, flag: &FlagInfo);
}

/// A node in a flag hierarchy that can enumerate its own children.
pub trait FlagContainer: Send + Sync {
	fn walk(&self, visitor: &mut dyn FlagVisitor);
}

/// A hierarchy with no flags.
impl FlagContainer for () {
	fn walk(&self, _visitor: &mut dyn FlagVisitor) {}
}

/// A single declared flag with a hard-coded default.
#[derive(Debug, Clone)]
pub struct Flag<T> {
	key_path: KeyPath,
	name: String,
	description: Option<String>,
	default: T,
}

impl<T> Flag<T>
where
	T: FlagValueType + Clone,
{
	/// Declares a flag named `name` under `parent`, folded with the parent's
	/// naming strategy.
	pub fn new(parent: &KeyPath, name: &str, default: T) -> Self {
		Self::with_segment(parent, KeySegment::automatic(name), name, default)
	}

	/// Declares a flag whose key segment is chosen explicitly.
	pub fn with_segment(parent: &KeyPath, segment: KeySegment, name: &str, default: T) -> Self {
		Self {
			key_path: parent.append(segment),
			name: name.to_string(),
			description: None,
			default,
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn key_path(&self) -> &KeyPath {
		&self.key_path
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	pub fn default_value(&self) -> &T {
		&self.default
	}

	/// The live value, or the default when no provider has an answer.
	pub fn value<R>(&self, pole: &FlagPole<R>) -> T {
		pole
			.value(&self.key_path)
			.unwrap_or_else(|| self.default.clone())
	}

	/// The value captured in `snapshot`, or the default if it has none.
	pub fn value_in(&self, snapshot: &Snapshot) -> T {
		snapshot
			.get(self.key_path.key())
			.and_then(T::from_flag_value)
			.unwrap_or_else(|| self.default.clone())
	}

	pub fn info(&self) -> FlagInfo {
		FlagInfo {
			key_path: self.key_path.clone(),
			name: self.name.clone(),
			description: self.description.clone(),
			default_value: self.default.clone().into_flag_value(),
		}
	}

	pub fn walk(&self, visitor: &mut dyn FlagVisitor) {
		visitor.visit_flag(&self.info());
	}
}

/// Collects every flag key in walk order.
#[derive(Debug, Default)]
pub struct KeyCollector {
	pub keys: Vec<KeyPath>,
}

impl FlagVisitor for KeyCollector {
	fn visit_flag(&mut self, flag: &FlagInfo) {
		self.keys.push(flag.key_path.clone());
	}
}
