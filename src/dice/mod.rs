//! All functionality for directly creating dice, rolling them, and working with their resulting rolls.
//!
//! This is the home of the dice "primitives". For using as part of a larger expression, see [`Expr`].
//!
//! [`Expr`]: crate::expr::Expr

pub mod roller;
pub mod seed;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::Describe;
pub use self::{
	roller::{RandomSource, Roller},
	seed::Seed,
};

/// A set of one or more rollable dice with a specific number of faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct Dice {
	/// Number of dice to roll
	pub count: u32,

	/// Number of faces for each die
	pub faces: u32,
}

impl Dice {
	/// Creates a new set of dice with a given count and number of faces.
	///
	/// # Errors
	/// If either the count or the number of faces is zero, an error variant is returned.
	///
	/// # Examples
	/// ```
	/// use rodeo_dice::dice::{Dice, Error};
	///
	/// let dice = Dice::new(2, 6)?;
	/// assert_eq!(dice.to_string(), "2d6");
	/// assert!(matches!(Dice::new(0, 6), Err(Error::NoDice)));
	/// # Ok::<(), Error>(())
	/// ```
	pub const fn new(count: u32, faces: u32) -> Result<Self, Error> {
		if count == 0 {
			return Err(Error::NoDice);
		}
		if faces == 0 {
			return Err(Error::NoFaces);
		}
		Ok(Self { count, faces })
	}

	/// Rolls the dice using the given roller.
	#[must_use]
	pub fn roll(&self, roller: &mut impl Roller) -> Rolled {
		roller.roll(self)
	}
}

impl fmt::Display for Dice {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}d{}", self.count, self.faces)
	}
}

/// Representation of the result from rolling [`Dice`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Rolled {
	/// Number of dice that were rolled
	pub count: u32,

	/// Number of faces on each rolled die
	pub faces: u32,

	/// Each individual face value, in the order it was rolled
	pub rolls: Vec<u32>,
}

impl Rolled {
	/// Creates a new rolled set of dice from a given set of dice and an iterator of values.
	#[must_use]
	pub fn from_dice_and_rolls(dice: &Dice, rolls: impl IntoIterator<Item = u32>) -> Self {
		Self {
			count: dice.count,
			faces: dice.faces,
			rolls: rolls.into_iter().collect(),
		}
	}

	/// Gets the dice this roll was produced from.
	#[must_use]
	pub const fn dice(&self) -> Dice {
		Dice {
			count: self.count,
			faces: self.faces,
		}
	}

	/// Calculates the total of all roll values.
	///
	/// # Errors
	/// If there is an integer overflow while summing the die rolls, an error variant is returned.
	///
	/// # Examples
	/// ```
	/// use rodeo_dice::dice::{roller::{Roller, Val as ValRoller}, Dice};
	///
	/// let rolled = ValRoller(3).roll(&Dice::new(4, 8)?);
	/// assert_eq!(rolled.total()?, 12);
	/// # Ok::<(), rodeo_dice::dice::Error>(())
	/// ```
	pub fn total(&self) -> Result<u64, Error> {
		let mut sum: u64 = 0;
		for &roll in &self.rolls {
			sum = sum.checked_add(u64::from(roll)).ok_or(Error::Overflow(self.dice()))?;
		}
		Ok(sum)
	}

	/// Checks that the rolls are consistent with the dice: one roll per die, each within `1..=faces`.
	#[must_use]
	pub fn is_consistent(&self) -> bool {
		self.rolls.len() == self.count as usize && self.rolls.iter().all(|roll| (1..=self.faces).contains(roll))
	}
}

impl Describe for Rolled {
	/// Builds a string of the dice the roll is from and a list of all of the individual rolled dice.
	///
	/// If `list_limit` is specified and there are more rolls than it, the list of rolled dice will be truncated and
	/// appended with "X more..." (where X is the remaining roll count past the max).
	///
	/// # Examples
	/// ```
	/// use rodeo_dice::{dice::{Dice, Rolled}, expr::Describe};
	///
	/// let rolled = Rolled::from_dice_and_rolls(&Dice::new(4, 6)?, [6, 2, 5, 3]);
	/// assert_eq!(rolled.describe(None), "4d6[6, 2, 5, 3]");
	/// assert_eq!(rolled.describe(Some(2)), "4d6[6, 2, 2 more...]");
	/// # Ok::<(), rodeo_dice::dice::Error>(())
	/// ```
	fn describe(&self, list_limit: Option<usize>) -> String {
		let list_limit = list_limit.unwrap_or(usize::MAX);
		let truncated_rolls = self.rolls.len().saturating_sub(list_limit);

		format!(
			"{}[{}{}]",
			self.dice(),
			self.rolls
				.iter()
				.take(list_limit)
				.map(ToString::to_string)
				.collect::<Vec<_>>()
				.join(", "),
			if truncated_rolls > 0 {
				format!(", {truncated_rolls} more...")
			} else {
				String::new()
			}
		)
	}
}

impl fmt::Display for Rolled {
	/// Formats the value using the given formatter. [Read more][core::fmt::Debug::fmt()]
	///
	/// The output is equivalent to calling [`Self::describe(None)`].
	///
	/// [`Self::describe(None)`]: Self::describe()
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.describe(None))
	}
}

/// An error resulting from a dice operation
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	/// There was an integer overflow when summing roll values.
	#[error("integer overflow while totalling {0}")]
	Overflow(Dice),

	/// A dice group declared zero dice.
	#[error("dice count must be at least 1")]
	NoDice,

	/// A dice group declared dice with zero faces.
	#[error("dice must have at least 1 face")]
	NoFaces,
}
