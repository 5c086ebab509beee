//! Abstractions for rolling dice using various means.

use core::iter::Peekable;

use fastrand::Rng;

use super::{Dice, Rolled, Seed};

/// Rolls dice - what else is there to say?
pub trait Roller {
	/// Rolls a single die, producing a face value in `1..=faces`.
	#[must_use]
	fn roll_die(&mut self, faces: u32) -> u32;

	/// Rolls a set of dice, one draw per die in order.
	#[must_use]
	fn roll(&mut self, dice: &Dice) -> Rolled
	where
		Self: Sized,
	{
		let mut rolls = Vec::with_capacity(dice.count as usize);
		for _ in 0..dice.count {
			rolls.push(self.roll_die(dice.faces));
		}
		Rolled::from_dice_and_rolls(dice, rolls)
	}
}

impl<R: Roller> Roller for &mut R {
	#[inline]
	fn roll_die(&mut self, faces: u32) -> u32 {
		(**self).roll_die(faces)
	}
}

/// Maps a uniform float in `[0, 1)` onto a die face in `1..=faces` as `floor(unit * faces) + 1`.
#[must_use]
#[inline]
#[expect(
	clippy::cast_possible_truncation,
	clippy::cast_sign_loss,
	reason = "unit is in [0, 1), so the product is within 0..faces"
)]
pub fn face_from_unit(unit: f64, faces: u32) -> u32 {
	let face = (unit * f64::from(faces)).floor() as u32;
	face.min(faces.saturating_sub(1)).saturating_add(1)
}

/// Mulberry32: a small 32-bit generator whose whole output stream is fixed by its seed.
///
/// The stream is identical across processes and platforms for the same seed, which is what allows a roll to be
/// re-derived by another party.
///
/// # Examples
/// ```
/// use rodeo_dice::dice::roller::Mulberry32;
///
/// let mut a = Mulberry32::new(42);
/// let mut b = Mulberry32::new(42);
/// for _ in 0..16 {
/// 	let x = a.next_f64();
/// 	assert!((0.0..1.0).contains(&x));
/// 	assert_eq!(x.to_bits(), b.next_f64().to_bits());
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mulberry32 {
	state: u32,
}

impl Mulberry32 {
	/// Creates a generator starting from the given 32-bit state.
	#[must_use]
	#[inline]
	pub const fn new(seed: u32) -> Self {
		Self { state: seed }
	}

	/// Produces the next 32-bit output.
	#[inline]
	pub fn next_u32(&mut self) -> u32 {
		self.state = self.state.wrapping_add(0x6D2B_79F5);
		let mut t = self.state;
		t = (t ^ (t >> 15)).wrapping_mul(t | 1);
		t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61)) ^ t;
		t ^ (t >> 14)
	}

	/// Produces the next float in `[0, 1)`.
	#[inline]
	pub fn next_f64(&mut self) -> f64 {
		f64::from(self.next_u32()) / 4_294_967_296.0
	}
}

impl Roller for Mulberry32 {
	#[inline]
	fn roll_die(&mut self, faces: u32) -> u32 {
		face_from_unit(self.next_f64(), faces)
	}
}

/// Generates rolls with non-reproducible random values using [fastrand].
///
/// # Examples
/// ```
/// use rodeo_dice::dice::{roller::{FastRand as FastRandRoller, Roller}, Dice};
///
/// let mut roller = FastRandRoller::default();
/// let rolled = roller.roll(&Dice::new(4, 6)?);
/// assert!(rolled.is_consistent());
/// # Ok::<(), rodeo_dice::dice::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FastRand(Rng);

impl FastRand {
	/// Creates a new fastrand roller that uses the given RNG instance to generate rolls.
	#[must_use]
	#[inline]
	pub const fn new(rng: Rng) -> Self {
		Self(rng)
	}

	/// Produces the next float in `[0, 1)`.
	#[inline]
	pub fn next_f64(&mut self) -> f64 {
		self.0.f64()
	}
}

impl Roller for FastRand {
	#[inline]
	fn roll_die(&mut self, faces: u32) -> u32 {
		face_from_unit(self.next_f64(), faces)
	}
}

/// The random source used for a single evaluation.
///
/// A seeded source replays the exact same stream for the same seed; an unseeded one draws from process entropy.
/// Sources are created fresh for each evaluation and never shared between rolls.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum RandomSource {
	/// Reproducible stream derived from a [`Seed`]
	Seeded(Mulberry32),

	/// Non-reproducible stream
	Entropy(FastRand),
}

impl RandomSource {
	/// Creates the source for an optional seed.
	///
	/// # Examples
	/// ```
	/// use rodeo_dice::dice::{RandomSource, Seed};
	///
	/// let seed = Seed::from("seed-123");
	/// let mut a = RandomSource::from_seed(Some(&seed));
	/// let mut b = RandomSource::from_seed(Some(&seed));
	/// assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
	/// ```
	#[must_use]
	pub fn from_seed(seed: Option<&Seed>) -> Self {
		match seed {
			Some(seed) => Self::Seeded(Mulberry32::new(seed.to_u32())),
			None => Self::Entropy(FastRand::default()),
		}
	}

	/// Produces the next float in `[0, 1)`.
	#[inline]
	pub fn next_f64(&mut self) -> f64 {
		match self {
			Self::Seeded(rng) => rng.next_f64(),
			Self::Entropy(rng) => rng.next_f64(),
		}
	}

	/// Checks whether the source replays deterministically.
	#[must_use]
	#[inline]
	pub const fn is_seeded(&self) -> bool {
		matches!(self, Self::Seeded(..))
	}
}

impl Roller for RandomSource {
	#[inline]
	fn roll_die(&mut self, faces: u32) -> u32 {
		face_from_unit(self.next_f64(), faces)
	}
}

/// Wraps another roller and counts how many dice it has been asked to roll.
///
/// # Examples
/// ```
/// use rodeo_dice::dice::{roller::{Counting, Max as MaxRoller, Roller}, Dice};
///
/// let mut roller = Counting::new(MaxRoller);
/// let _ = roller.roll(&Dice::new(3, 8)?);
/// assert_eq!(roller.draws(), 3);
/// # Ok::<(), rodeo_dice::dice::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Counting<R> {
	inner: R,
	draws: usize,
}

impl<R: Roller> Counting<R> {
	/// Wraps a roller with a zeroed draw counter.
	#[must_use]
	#[inline]
	pub const fn new(inner: R) -> Self {
		Self { inner, draws: 0 }
	}

	/// Number of dice rolled so far.
	#[must_use]
	#[inline]
	pub const fn draws(&self) -> usize {
		self.draws
	}
}

impl<R: Roller> Roller for Counting<R> {
	#[inline]
	fn roll_die(&mut self, faces: u32) -> u32 {
		self.draws = self.draws.saturating_add(1);
		self.inner.roll_die(faces)
	}
}

/// Generates rolls that always have a specific value.
///
/// # Examples
/// ```
/// use rodeo_dice::dice::{roller::{Roller, Val as ValRoller}, Dice};
///
/// let mut roller = ValRoller(42);
/// let rolled = roller.roll(&Dice::new(4, 6)?);
/// assert!(rolled.rolls.iter().all(|&roll| roll == 42));
/// # Ok::<(), rodeo_dice::dice::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
#[expect(clippy::exhaustive_structs, reason = "Highly unlikely to change")]
pub struct Val(pub u32);

impl Roller for Val {
	/// Rolls a single die, always with one specific value.
	#[inline]
	fn roll_die(&mut self, _faces: u32) -> u32 {
		self.0
	}
}

/// Generates rolls that always have their max value.
///
/// # Examples
/// ```
/// use rodeo_dice::dice::{roller::{Max as MaxRoller, Roller}, Dice};
///
/// let rolled = MaxRoller.roll(&Dice::new(2, 20)?);
/// assert_eq!(rolled.rolls, vec![20, 20]);
/// # Ok::<(), rodeo_dice::dice::Error>(())
/// ```
#[derive(Debug, Default, Clone)]
#[expect(clippy::exhaustive_structs, reason = "Highly unlikely to change")]
pub struct Max;

impl Roller for Max {
	/// Rolls a single die, always with the max value (same as the number of faces).
	#[inline]
	fn roll_die(&mut self, faces: u32) -> u32 {
		faces
	}
}

/// Generates rolls from an iterator of values. Mainly useful for testing purposes.
///
/// # Examples
/// ```
/// use rodeo_dice::dice::{roller::{Iter as IterRoller, Roller}, Dice};
///
/// let mut roller = IterRoller::new(vec![1, 2, 3, 4, 10]);
/// assert_eq!(roller.roll(&Dice::new(5, 10)?).rolls, vec![1, 2, 3, 4, 10]);
/// # Ok::<(), rodeo_dice::dice::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Iter<I: Iterator<Item = u32>>(Peekable<I>);

impl<I: Iterator<Item = u32>> Iter<I> {
	/// Checks whether the iterator still has values available.
	#[inline]
	pub fn can_roll(&mut self) -> bool {
		self.0.peek().is_some()
	}

	/// Creates a new roller that uses the given iterator to provide roll values.
	#[must_use]
	#[inline]
	pub fn new(iter: impl IntoIterator<IntoIter = I>) -> Self {
		Self(iter.into_iter().peekable())
	}
}

impl<I: Iterator<Item = u32>> Roller for Iter<I> {
	/// Rolls a die with the value from the next iteration.
	///
	/// # Panics
	/// If the iterator has finished, this will panic.
	#[inline]
	#[expect(
		clippy::expect_used,
		reason = "Mostly for testing, otherwise manual checking of can_roll() is expected"
	)]
	fn roll_die(&mut self, _faces: u32) -> u32 {
		self.0.next().expect("iterator is finished")
	}
}
