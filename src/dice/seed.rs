//! Seeds that fix the output of a [`RandomSource`](super::RandomSource).

use core::fmt;

use serde::{Deserialize, Serialize};

/// An opaque value that determines the entire output stream of a seeded random source.
///
/// Seeds arrive from clients as either JSON numbers or strings. Both are reduced to a 32-bit state with
/// [`Seed::to_u32()`], and the reduction is stable across runs and platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum Seed {
	/// Integral numeric seed
	Int(i64),

	/// Non-integral (or out of `i64` range) numeric seed
	Float(f64),

	/// String seed
	Text(String),
}

impl Seed {
	/// Reduces the seed to the 32-bit state fed to the generator.
	///
	/// Numbers are truncated toward zero and taken modulo 2^32 (non-finite numbers become 0). Strings are folded with
	/// `h = h * 31 + codepoint` in wrapping 32-bit arithmetic.
	///
	/// # Examples
	/// ```
	/// use rodeo_dice::dice::Seed;
	///
	/// assert_eq!(Seed::Int(7).to_u32(), 7);
	/// assert_eq!(Seed::Int(-1).to_u32(), u32::MAX);
	/// assert_eq!(Seed::Float(7.9).to_u32(), 7);
	/// assert_eq!(Seed::from("ab").to_u32(), 97 * 31 + 98);
	/// ```
	#[must_use]
	pub fn to_u32(&self) -> u32 {
		match self {
			Self::Int(n) => reduce_int(*n),
			Self::Float(n) => reduce_float(*n),
			Self::Text(s) => s
				.chars()
				.fold(0u32, |acc, c| acc.wrapping_mul(31).wrapping_add(u32::from(c))),
		}
	}
}

#[expect(
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss,
	reason = "modulo 2^32 reduction is the intent"
)]
const fn reduce_int(n: i64) -> u32 {
	n.rem_euclid(1 << 32) as u32
}

#[expect(
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss,
	reason = "modulo 2^32 reduction is the intent"
)]
fn reduce_float(n: f64) -> u32 {
	if !n.is_finite() {
		return 0;
	}
	n.trunc().rem_euclid(4_294_967_296.0) as u32
}

impl From<&str> for Seed {
	fn from(value: &str) -> Self {
		Self::Text(value.to_owned())
	}
}

impl From<String> for Seed {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<i64> for Seed {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<u32> for Seed {
	fn from(value: u32) -> Self {
		Self::Int(i64::from(value))
	}
}

impl fmt::Display for Seed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(n) => write!(f, "{n}"),
			Self::Float(n) => write!(f, "{n}"),
			Self::Text(s) => write!(f, "{s:?}"),
		}
	}
}
