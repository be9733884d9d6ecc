// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom flag runtime.
//!
//! This crate provides the types shared by the runtime (`loom-flags`) and by
//! anything that implements a flag provider outside of it:
//!
//! - [`FlagValue`] / [`FlagValueType`]: type-erased values and typed conversion
//! - [`KeyPath`] / [`KeySegment`]: structured keys folded into lookup strings
//! - [`FlagChange`]: the scope of a change notification
//! - [`FlagsError`]: write, stream and configuration failures
//!
//! # Example
//!
//! ```
//! use loom_flags_core::{FlagChange, FlagValue, FlagValueType, KeyPath, KeySegment, KeyStyle};
//!
//! let key = KeyPath::root(KeyStyle::default()).append(KeySegment::automatic("darkMode"));
//! let change = FlagChange::key(key.clone());
//! assert!(change.affects(key.key()));
//!
//! let stored = FlagValue::String("true".to_string());
//! assert_eq!(bool::from_flag_value(stored), Some(true));
//! ```

pub mod change;
pub mod error;
pub mod key_path;
pub mod value;

pub use change::FlagChange;
pub use error::{FlagsError, Result};
pub use key_path::{KeyNamingStrategy, KeyPath, KeySegment, KeyStyle, DEFAULT_SEPARATOR};
pub use value::{FlagValue, FlagValueType};
