// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Type-erased flag values and typed conversion.
//!
//! Providers store and return [`FlagValue`]s. Readers ask for a concrete type
//! through [`FlagValueType`]; a value that cannot be converted is treated the
//! same as no value at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A flag value as stored by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FlagValue {
	Boolean(bool),
	Integer(i64),
	Float(f64),
	String(String),
	Bytes(Vec<u8>),
	Array(Vec<FlagValue>),
	Dictionary(BTreeMap<String, FlagValue>),
}

impl FlagValue {
	/// Returns the variant name, for logs and error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			FlagValue::Boolean(_) => "boolean",
			FlagValue::Integer(_) => "integer",
			FlagValue::Float(_) => "float",
			FlagValue::String(_) => "string",
			FlagValue::Bytes(_) => "bytes",
			FlagValue::Array(_) => "array",
			FlagValue::Dictionary(_) => "dictionary",
		}
	}

	/// Converts this value into `T`, or `None` if the types don't line up.
	pub fn get<T: FlagValueType>(self) -> Option<T> {
		T::from_flag_value(self)
	}
}

impl std::fmt::Display for FlagValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			FlagValue::Boolean(b) => write!(f, "{b}"),
			FlagValue::Integer(i) => write!(f, "{i}"),
			FlagValue::Float(x) => write!(f, "{x}"),
			FlagValue::String(s) => write!(f, "{s}"),
			FlagValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
			FlagValue::Array(items) => {
				write!(f, "[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{item}")?;
				}
				write!(f, "]")
			}
			FlagValue::Dictionary(entries) => {
				write!(f, "{{")?;
				for (i, (key, value)) in entries.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{key}: {value}")?;
				}
				write!(f, "}}")
			}
		}
	}
}

/// A Rust type that can be stored as a [`FlagValue`].
///
/// String-only backends hand out [`FlagValue::String`] for everything, so the
/// scalar conversions also accept a parseable string.
pub trait FlagValueType: Sized {
	fn into_flag_value(self) -> FlagValue;

	fn from_flag_value(value: FlagValue) -> Option<Self>;
}

impl FlagValueType for FlagValue {
	fn into_flag_value(self) -> FlagValue {
		self
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		Some(value)
	}
}

impl FlagValueType for bool {
	fn into_flag_value(self) -> FlagValue {
		FlagValue::Boolean(self)
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::Boolean(b) => Some(b),
			FlagValue::Integer(0) => Some(false),
			FlagValue::Integer(1) => Some(true),
			FlagValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
				"true" | "yes" | "on" | "1" => Some(true),
				"false" | "no" | "off" | "0" => Some(false),
				_ => None,
			},
			_ => None,
		}
	}
}

impl FlagValueType for String {
	fn into_flag_value(self) -> FlagValue {
		FlagValue::String(self)
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::String(s) => Some(s),
			_ => None,
		}
	}
}

impl FlagValueType for i64 {
	fn into_flag_value(self) -> FlagValue {
		FlagValue::Integer(self)
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::Integer(i) => Some(i),
			FlagValue::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}
}

macro_rules! impl_narrow_integer {
	($($ty:ty),*) => {
		$(
			impl FlagValueType for $ty {
				fn into_flag_value(self) -> FlagValue {
					FlagValue::Integer(i64::from(self))
				}

				fn from_flag_value(value: FlagValue) -> Option<Self> {
					i64::from_flag_value(value).and_then(|i| <$ty>::try_from(i).ok())
				}
			}
		)*
	};
}

impl_narrow_integer!(i8, i16, i32, u8, u16, u32);

impl FlagValueType for f64 {
	fn into_flag_value(self) -> FlagValue {
		FlagValue::Float(self)
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::Float(x) => Some(x),
			FlagValue::Integer(i) => Some(i as f64),
			FlagValue::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}
}

impl FlagValueType for f32 {
	fn into_flag_value(self) -> FlagValue {
		FlagValue::Float(f64::from(self))
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		f64::from_flag_value(value).map(|x| x as f32)
	}
}

impl<T: FlagValueType> FlagValueType for Vec<T> {
	fn into_flag_value(self) -> FlagValue {
		FlagValue::Array(self.into_iter().map(T::into_flag_value).collect())
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::Array(items) => items.into_iter().map(T::from_flag_value).collect(),
			_ => None,
		}
	}
}

impl<T: FlagValueType> FlagValueType for BTreeMap<String, T> {
	fn into_flag_value(self) -> FlagValue {
		FlagValue::Dictionary(
			self
				.into_iter()
				.map(|(k, v)| (k, v.into_flag_value()))
				.collect(),
		)
	}

	fn from_flag_value(value: FlagValue) -> Option<Self> {
		match value {
			FlagValue::Dictionary(entries) => entries
				.into_iter()
				.map(|(k, v)| T::from_flag_value(v).map(|v| (k, v)))
				.collect(),
			_ => None,
		}
	}
}

impl From<bool> for FlagValue {
	fn from(value: bool) -> Self {
		FlagValue::Boolean(value)
	}
}

impl From<i64> for FlagValue {
	fn from(value: i64) -> Self {
		FlagValue::Integer(value)
	}
}

impl From<i32> for FlagValue {
	fn from(value: i32) -> Self {
		FlagValue::Integer(i64::from(value))
	}
}

impl From<f64> for FlagValue {
	fn from(value: f64) -> Self {
		FlagValue::Float(value)
	}
}

impl From<&str> for FlagValue {
	fn from(value: &str) -> Self {
		FlagValue::String(value.to_string())
	}
}

impl From<String> for FlagValue {
	fn from(value: String) -> Self {
		FlagValue::String(value)
	}
}
