//! Parser generators for dice notation, built with [chumsky].
//!
//! The grammar is deliberately small: a sequence of terms separated by `+` or `-`, where each term is either a
//! non-negative integer or `<count>d<faces>` (the count may be omitted, meaning one die). The first term may carry a
//! leading sign. Whitespace is allowed around operators.

use core::{fmt, ops::Range, str::FromStr};

use chumsky::prelude::*;

use crate::{
	dice::Dice,
	expr::{Expr, Op, Term, Value},
};

/// Generates a parser that specifically handles dice terms like "d20", "2d6", etc.
pub fn dice_part<'src>() -> impl Parser<'src, &'src str, Dice, extra::Err<Rich<'src, char>>> + Clone {
	text::int::<&'src str, _, _>(10)
		.or_not()
		.then_ignore(just('d'))
		.then(text::int::<&'src str, _, _>(10))
		.try_map(|(count, faces), span| {
			let count = count
				.unwrap_or("1")
				.parse()
				.map_err(|err| Rich::custom(span, format!("Dice count: {err}")))?;
			let faces = faces
				.parse()
				.map_err(|err| Rich::custom(span, format!("Dice faces: {err}")))?;
			Dice::new(count, faces).map_err(|err| Rich::custom(span, err))
		})
}

/// Generates a parser that specifically handles dice terms like "d20", "2d6", etc. and expects end of input
pub fn dice<'src>() -> impl Parser<'src, &'src str, Dice, extra::Err<Rich<'src, char>>> + Clone {
	dice_part().then_ignore(end())
}

/// Generates a parser that handles a full flat sum of dice and integer terms.
pub fn expr_part<'src>() -> impl Parser<'src, &'src str, Expr, extra::Err<Rich<'src, char>>> + Clone {
	// Helper function for operators
	let op = |c| just(c).padded();
	let sign = choice((op('+').to(Op::Add), op('-').to(Op::Sub)));

	// Parser for numbers
	let int = text::int(10)
		.try_map(|s: &str, span| {
			s.parse()
				.map(Value::Num)
				.map_err(|err| Rich::custom(span, format!("Number: {err}")))
		});

	// Dice must be attempted first since both start with digits
	let value = dice_part().map(Value::Dice).or(int).padded();

	sign.clone()
		.or_not()
		.then(value.clone())
		.map(|(op, value)| Term::new(op.unwrap_or(Op::Add), value))
		.then(
			sign.then(value)
				.map(|(op, value)| Term::new(op, value))
				.repeated()
				.collect::<Vec<_>>(),
		)
		.map(|(first, rest)| {
			let mut terms = Vec::with_capacity(rest.len().saturating_add(1));
			terms.push(first);
			terms.extend(rest);
			Expr::new(terms)
		})
}

/// Generates a parser that handles a full flat sum of dice and integer terms and expects end of input
pub fn expr<'src>() -> impl Parser<'src, &'src str, Expr, extra::Err<Rich<'src, char>>> + Clone {
	expr_part().then_ignore(end())
}

/// A single problem found while parsing, with the byte range it applies to
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Issue {
	/// Byte range within the source text
	pub span: Range<usize>,

	/// Description of what was found and what was expected
	pub message: String,
}

/// Error returned when text is not well-formed dice notation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
	/// Every problem the parser reported
	pub issues: Vec<Issue>,
}

impl ParseError {
	fn from_rich(errs: &[Rich<'_, char>]) -> Self {
		Self {
			issues: errs
				.iter()
				.map(|err| Issue {
					span: err.span().start()..err.span().end(),
					message: err.to_string(),
				})
				.collect(),
		}
	}
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"invalid dice expression: {}",
			self.issues
				.iter()
				.map(|issue| issue.message.as_str())
				.collect::<Vec<_>>()
				.join("; ")
		)
	}
}

impl FromStr for Dice {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		// ASCII-only folding keeps byte offsets valid for the caller's text
		let lc = s.to_ascii_lowercase();
		let result = dice().parse(&lc).into_result().map_err(|errs| ParseError::from_rich(&errs));
		result
	}
}

impl FromStr for Expr {
	type Err = ParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		// ASCII-only folding keeps byte offsets valid for the caller's text
		let lc = s.to_ascii_lowercase();
		let result = expr().parse(&lc).into_result().map_err(|errs| ParseError::from_rich(&errs));
		result
	}
}
