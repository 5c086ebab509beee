//! Data structures for evaluating dice expressions and working with their results.
//!
//! An expression is a flat, left-to-right sequence of terms joined by `+` or `-`. Each term is either a non-negative
//! integer literal or a group of dice. There is no precedence and there are no parentheses.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::dice::{Dice, Error as DiceError, Roller, Rolled};

/// Operator joining a term to the running total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[expect(clippy::exhaustive_enums, reason = "Flat sums only ever add or subtract")]
pub enum Op {
	/// Adds the term's contribution
	#[serde(rename = "+")]
	Add,

	/// Subtracts the term's contribution
	#[serde(rename = "-")]
	Sub,
}

impl Op {
	/// Gets the symbol for the operator.
	#[must_use]
	pub const fn symbol(self) -> char {
		match self {
			Self::Add => '+',
			Self::Sub => '-',
		}
	}
}

impl fmt::Display for Op {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.symbol())
	}
}

/// The value part of an unevaluated term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Value {
	/// Standalone non-negative integer
	Num(i64),

	/// Dice literal
	Dice(Dice),
}

/// One element of an expression: a value and the operator joining it to everything before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Term {
	/// Operator applied to the term's contribution
	pub op: Op,

	/// What the term contributes before the operator is applied
	pub value: Value,
}

impl Term {
	/// Creates a new term.
	#[must_use]
	pub const fn new(op: Op, value: Value) -> Self {
		Self { op, value }
	}
}

/// A parsed dice expression
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Expr {
	/// Terms in source order
	pub terms: Vec<Term>,
}

impl Expr {
	/// Creates an expression from its terms.
	#[must_use]
	pub const fn new(terms: Vec<Term>) -> Self {
		Self { terms }
	}

	/// Evaluates the expression. Literal terms are carried over as-is, while each dice term draws one value per die
	/// from the roller, in term order.
	///
	/// # Examples
	/// ```
	/// use rodeo_dice::{dice::roller::Iter as IterRoller, Expr};
	///
	/// let expr: Expr = "2d6 - 1d4 + 3".parse()?;
	/// let detail = expr.eval(&mut IterRoller::new([6, 2, 3]));
	/// assert_eq!(detail.calc()?, 8);
	/// assert_eq!(detail.to_string(), "2d6[6, 2] - 1d4[3] + 3");
	/// # Ok::<(), Box<dyn std::error::Error>>(())
	/// ```
	#[must_use]
	pub fn eval(&self, roller: &mut impl Roller) -> RollDetail {
		let terms = self
			.terms
			.iter()
			.map(|term| DiceTerm {
				op: term.op,
				result: match term.value {
					Value::Num(x) => TermResult::Num { value: x },
					Value::Dice(dice) => TermResult::Dice(roller.roll(&dice)),
				},
			})
			.collect::<Vec<_>>();
		RollDetail::new(terms)
	}

	/// Evaluates the expression and calculates its total in one go.
	///
	/// # Errors
	/// If the total overflows, an error variant is returned.
	pub fn roll(&self, roller: &mut impl Roller) -> Result<Roll, CalcError> {
		let detail = self.eval(roller);
		let total = detail.calc()?;
		Ok(Roll { detail, total })
	}

	/// Sums the declared dice count across all dice terms.
	#[must_use]
	pub fn dice_count(&self) -> u64 {
		self.terms
			.iter()
			.map(|term| match term.value {
				Value::Dice(dice) => u64::from(dice.count),
				Value::Num(..) => 0,
			})
			.sum()
	}

	/// Checks whether the expression always yields the same total, which is the case when every dice term has only
	/// one face.
	#[must_use]
	pub fn is_deterministic(&self) -> bool {
		self.terms.iter().all(|term| match term.value {
			Value::Num(..) => true,
			Value::Dice(dice) => dice.faces == 1,
		})
	}
}

impl Describe for Expr {
	/// Builds the canonical expression string. Re-parsing the output yields an identical expression.
	fn describe(&self, _list_limit: Option<usize>) -> String {
		describe_terms(self.terms.iter().map(|term| {
			let text = match term.value {
				Value::Num(x) => x.to_string(),
				Value::Dice(dice) => dice.to_string(),
			};
			(term.op, text)
		}))
	}
}

impl fmt::Display for Expr {
	/// Formats the value using the given formatter. [Read more][core::fmt::Debug::fmt()]
	///
	/// The output of this implementation is equivalent to [`Self::describe(None)`].
	///
	/// [`Self::describe(None)`]: Self::describe()
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.describe(None))
	}
}

/// What a single evaluated term produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TermResult {
	/// Standalone integer
	Num {
		/// The literal's value
		value: i64,
	},

	/// Rolled dice, with every individual face value kept
	Dice(Rolled),
}

impl TermResult {
	/// Calculates the unsigned contribution of the term, before its operator is applied.
	///
	/// # Errors
	/// If summing the dice overflows, an error variant is returned.
	pub fn value(&self) -> Result<i64, DiceError> {
		match self {
			Self::Num { value } => Ok(*value),
			Self::Dice(rolled) => {
				i64::try_from(rolled.total()?).map_err(|_err| DiceError::Overflow(rolled.dice()))
			}
		}
	}
}

/// One evaluated element of a roll: the operator joining it to the previous term, and what it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DiceTerm {
	/// Operator applied to this term's contribution
	pub op: Op,

	/// The term's result
	#[serde(flatten)]
	pub result: TermResult,
}

impl DiceTerm {
	/// Creates a new evaluated term.
	#[must_use]
	pub const fn new(op: Op, result: TermResult) -> Self {
		Self { op, result }
	}

	/// Calculates the signed contribution of the term to the total.
	///
	/// # Errors
	/// If the contribution can't be represented, an error variant is returned.
	pub fn contribution(&self) -> Result<i64, DiceError> {
		let value = self.result.value()?;
		Ok(match self.op {
			Op::Add => value,
			Op::Sub => -value,
		})
	}
}

impl Describe for DiceTerm {
	fn describe(&self, list_limit: Option<usize>) -> String {
		match &self.result {
			TermResult::Num { value } => value.to_string(),
			TermResult::Dice(rolled) => rolled.describe(list_limit),
		}
	}
}

/// The full breakdown of an evaluated expression. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollDetail {
	terms: Vec<DiceTerm>,
	ops: Vec<Op>,
}

impl RollDetail {
	/// Creates a breakdown from evaluated terms, deriving the operators between them.
	#[must_use]
	pub fn new(terms: Vec<DiceTerm>) -> Self {
		let ops = terms.iter().skip(1).map(|term| term.op).collect();
		Self { terms, ops }
	}

	/// Evaluated terms in source order.
	#[must_use]
	pub fn terms(&self) -> &[DiceTerm] {
		&self.terms
	}

	/// Operators applied between consecutive terms.
	#[must_use]
	pub fn ops(&self) -> &[Op] {
		&self.ops
	}

	/// Iterates over every rolled dice group.
	pub fn dice(&self) -> impl Iterator<Item = &Rolled> {
		self.terms.iter().filter_map(|term| match &term.result {
			TermResult::Dice(rolled) => Some(rolled),
			TermResult::Num { .. } => None,
		})
	}

	/// Calculates the final total by accumulating every term's contribution left to right.
	///
	/// # Errors
	/// If there is an integer overflow at any point of the accumulation, an error variant is returned.
	pub fn calc(&self) -> Result<i64, CalcError> {
		let mut total: i64 = 0;
		for term in &self.terms {
			let value = term
				.result
				.value()
				.map_err(|err| CalcError::Dice(term.clone(), err))?;
			total = match term.op {
				Op::Add => total.checked_add(value),
				Op::Sub => total.checked_sub(value),
			}
			.ok_or_else(|| CalcError::Overflow(self.clone()))?;
		}
		Ok(total)
	}
}

impl Describe for RollDetail {
	fn describe(&self, list_limit: Option<usize>) -> String {
		describe_terms(
			self.terms
				.iter()
				.map(|term| (term.op, term.describe(list_limit))),
		)
	}
}

impl fmt::Display for RollDetail {
	/// Formats the value using the given formatter. [Read more][core::fmt::Debug::fmt()]
	///
	/// The output of this implementation is equivalent to [`Self::describe(None)`].
	///
	/// [`Self::describe(None)`]: Self::describe()
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.describe(None))
	}
}

/// An evaluated expression together with its total
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Roll {
	/// Per-term breakdown
	pub detail: RollDetail,

	/// Signed sum of every term's contribution
	pub total: i64,
}

/// Error that can occur during [`RollDetail::calc()`]
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum CalcError {
	/// Dice-related error (likely during totalling)
	#[error("dice error while calculating ({0:?}): {1}")]
	Dice(DiceTerm, #[source] DiceError),

	/// Integer overflow while accumulating the total
	#[error("integer overflow while calculating {0}")]
	Overflow(RollDetail),
}

/// Trait to allow creation of expanded descriptions with an optional max number of individual listed results where
/// applicable
pub trait Describe {
	/// Builds a detailed expression string with additional information about non-deterministic elements.
	/// Any elements of the expression that can have a different result between multiple evaluations or multiple results
	/// should list all of the specific individual results that occurred (ideally, up to `list_limit` of them).
	#[must_use]
	fn describe(&self, list_limit: Option<usize>) -> String;
}

/// Joins described terms with their operators. A leading subtraction is written as a bare minus sign.
fn describe_terms(terms: impl Iterator<Item = (Op, String)>) -> String {
	let mut out = String::new();
	for (idx, (op, text)) in terms.enumerate() {
		match (idx, op) {
			(0, Op::Add) => {}
			(0, Op::Sub) => out.push('-'),
			(_, op) => {
				out.push(' ');
				out.push(op.symbol());
				out.push(' ');
			}
		}
		out.push_str(&text);
	}
	out
}
