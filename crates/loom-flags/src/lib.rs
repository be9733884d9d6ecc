// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag resolution and live updates for Loom.
//!
//! A [`FlagPole`] binds a hierarchy of declared flags to an ordered list of
//! providers. Lookups walk the list and take the first answer; change
//! notifications from every provider are merged into one broadcast that any
//! number of observers can follow independently.
//!
//! # Features
//!
//! - **Ordered resolution**: the first provider with an answer wins
//! - **Live updates**: conflated change broadcasts, cancellable per observer
//! - **Reconfiguration**: swap, insert or remove providers at runtime
//! - **Snapshots**: frozen captures that can be edited, layered and saved
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use loom_flags::{Flag, FlagContainer, FlagPole, FlagValueDictionary, FlagVisitor};
//! use loom_flags::KeyPath;
//!
//! struct AppFlags {
//!     dark_mode: Flag<bool>,
//! }
//!
//! impl FlagContainer for AppFlags {
//!     fn walk(&self, visitor: &mut dyn FlagVisitor) {
//!         self.dark_mode.walk(visitor);
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> loom_flags::Result<()> {
//! let remote = Arc::new(FlagValueDictionary::with_id("remote"));
//! let pole = FlagPole::builder()
//!     .provider(remote.clone())
//!     .build(|root: &KeyPath| AppFlags {
//!         dark_mode: Flag::new(root, "darkMode", false),
//!     })?;
//!
//! let mut dark_mode = pole.watch("dark-mode", false);
//! assert_eq!(dark_mode.next().await, Some(false));
//!
//! remote.insert("dark-mode", true);
//! assert_eq!(dark_mode.next().await, Some(true));
//! assert!(pole.root().dark_mode.value(&pole));
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod broadcast;
mod chain;
mod config;
mod dictionary;
mod env;
mod hierarchy;
mod lock;
mod pole;
mod provider;
mod snapshot;

pub use aggregator::{ChangeAggregator, Reconfiguration};
pub use broadcast::{BroadcastCell, Subscription, WeakBroadcastCell, INITIAL_GENERATION};
pub use chain::ProviderChain;
pub use config::FlagPoleConfig;
pub use dictionary::FlagValueDictionary;
pub use env::EnvironmentProvider;
pub use hierarchy::{Flag, FlagContainer, FlagInfo, FlagVisitor, KeyCollector};
pub use lock::Lock;
pub use pole::{FlagPole, FlagPoleBuilder};
pub use provider::{
	map_change, silent_changes, verbatim_keys, ChangeStream, FlagProvider, FlagProviderExt,
	KeyMapper, SharedProvider,
};
pub use snapshot::{Snapshot, SnapshotSource};

// Re-export core types for convenience
pub use loom_flags_core::{
	FlagChange, FlagValue, FlagValueType, FlagsError, KeyNamingStrategy, KeyPath, KeySegment,
	KeyStyle, Result,
};
