//! Cost ceiling applied to raw expression text before it is parsed or evaluated.
//!
//! The scan works on the raw bytes and never allocates, so it also protects the parser from malformed input that
//! declares huge amounts of dice.

/// Default ceiling on the total number of dice an expression may declare
pub const DEFAULT_MAX_DICE: u64 = 100;

/// Default ceiling on the length of an expression, in bytes
pub const DEFAULT_MAX_LEN: usize = 1024;

/// Rejects expressions that would be too expensive to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
	max_dice: u64,
	max_len: usize,
}

impl Guard {
	/// Creates a guard with the given ceilings.
	#[must_use]
	pub const fn new(max_dice: u64, max_len: usize) -> Self {
		Self { max_dice, max_len }
	}

	/// Maximum total dice count allowed.
	#[must_use]
	pub const fn max_dice(&self) -> u64 {
		self.max_dice
	}

	/// Checks an expression, returning the total dice count it declares when it is within the ceilings.
	///
	/// Every `<count>d<faces>` occurrence is counted (case-insensitively, with optional whitespace around the `d`), as
	/// is every bare `d<faces>` (which means one die). The scan stops as soon as the running total passes the ceiling.
	///
	/// # Errors
	/// If the expression is too long or declares too many dice, an error variant is returned.
	///
	/// # Examples
	/// ```
	/// use rodeo_dice::guard::{Guard, GuardError};
	///
	/// let guard = Guard::default();
	/// assert_eq!(guard.check("2d6 + d8 + 3"), Ok(3));
	/// assert!(matches!(guard.check("999999d1000000"), Err(GuardError::TooManyDice { .. })));
	/// assert_eq!(guard.check("60d6 + 41d6").unwrap_err().to_string(), "too many dice (>100)");
	/// ```
	pub fn check(&self, expression: &str) -> Result<u64, GuardError> {
		if expression.len() > self.max_len {
			return Err(GuardError::TooLong { limit: self.max_len });
		}

		let mut total: u64 = 0;
		for count in DiceCounts::new(expression.as_bytes()) {
			total = total.saturating_add(count);
			if total > self.max_dice {
				return Err(GuardError::TooManyDice { limit: self.max_dice });
			}
		}
		Ok(total)
	}
}

impl Default for Guard {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_DICE, DEFAULT_MAX_LEN)
	}
}

/// Error returned when an expression is rejected by a [`Guard`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GuardError {
	/// The expression declares more dice than allowed.
	#[error("too many dice (>{limit})")]
	TooManyDice {
		/// The ceiling that was passed
		limit: u64,
	},

	/// The expression text is longer than allowed.
	#[error("expression too long (>{limit} bytes)")]
	TooLong {
		/// The ceiling that was passed
		limit: usize,
	},
}

/// Iterator over the declared dice count of every dice group in a byte string
struct DiceCounts<'a> {
	src: &'a [u8],
	pos: usize,
}

impl<'a> DiceCounts<'a> {
	const fn new(src: &'a [u8]) -> Self {
		Self { src, pos: 0 }
	}

	fn skip_whitespace(&self, mut pos: usize) -> usize {
		while self.src.get(pos).is_some_and(u8::is_ascii_whitespace) {
			pos = pos.saturating_add(1);
		}
		pos
	}

	fn is_d(&self, pos: usize) -> bool {
		matches!(self.src.get(pos), Some(b'd' | b'D'))
	}

	fn is_digit(&self, pos: usize) -> bool {
		self.src.get(pos).is_some_and(u8::is_ascii_digit)
	}

	/// Consumes a run of digits, returning its saturated value and the position after it.
	fn digits(&self, mut pos: usize) -> (u64, usize) {
		let mut value: u64 = 0;
		while let Some(&b) = self.src.get(pos).filter(|b| b.is_ascii_digit()) {
			value = value.saturating_mul(10).saturating_add(u64::from(b - b'0'));
			pos = pos.saturating_add(1);
		}
		(value, pos)
	}
}

impl Iterator for DiceCounts<'_> {
	type Item = u64;

	fn next(&mut self) -> Option<u64> {
		while self.pos < self.src.len() {
			let start = self.pos;

			if self.is_digit(start) {
				let (count, after_count) = self.digits(start);
				let d = self.skip_whitespace(after_count);
				if self.is_d(d) {
					let faces = self.skip_whitespace(d.saturating_add(1));
					if self.is_digit(faces) {
						self.pos = self.digits(faces).1;
						return Some(count);
					}
				}
				self.pos = after_count;
				continue;
			}

			if self.is_d(start) && !self.src.get(start.wrapping_sub(1)).is_some_and(u8::is_ascii_alphanumeric) {
				let faces = self.skip_whitespace(start.saturating_add(1));
				if self.is_digit(faces) {
					self.pos = self.digits(faces).1;
					return Some(1);
				}
			}

			self.pos = start.saturating_add(1);
		}
		None
	}
}
