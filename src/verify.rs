//! Independent re-derivation of rolls claimed by a non-authoritative party.
//!
//! A client may roll locally for responsiveness, but only the value recomputed here is authoritative. The claimed
//! detail is never used for computation; it is kept next to the server's detail for auditing.

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::{
	dice::{RandomSource, Seed},
	expr::{CalcError, Expr, Roll, RollDetail},
};

/// A roll result computed by someone else
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Claim {
	/// Total the claimant arrived at, as whatever JSON number they sent
	pub total: Number,

	/// Breakdown the claimant reported, in whatever shape they sent it
	pub detail: Option<serde_json::Value>,
}

impl Claim {
	/// Creates a claim.
	#[must_use]
	pub fn new(total: impl Into<Number>, detail: Option<serde_json::Value>) -> Self {
		Self {
			total: total.into(),
			detail,
		}
	}
}

/// Outcome of comparing a claim against the authoritative re-evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Verification {
	/// Total the client claimed
	pub client_total: Number,

	/// Breakdown the client claimed, retained for audit only
	pub client_detail: Option<serde_json::Value>,

	/// Total the server derived
	pub server_total: i64,

	/// Breakdown the server derived
	pub server_detail: RollDetail,

	/// Whether the server total equals the client total
	pub verified: bool,
}

impl Verification {
	/// Compares a claim against a server-side roll. Only the totals are compared, and a claim only verifies when it is
	/// exactly the server's integer total.
	#[must_use]
	pub fn compare(claim: Claim, roll: &Roll) -> Self {
		Self {
			verified: is_exactly(&claim.total, roll.total),
			client_total: claim.total,
			client_detail: claim.detail,
			server_total: roll.total,
			server_detail: roll.detail.clone(),
		}
	}
}

#[expect(clippy::cast_possible_truncation, reason = "only integral values inside the i64 range are cast")]
fn is_exactly(claimed: &Number, total: i64) -> bool {
	if let Some(n) = claimed.as_i64() {
		return n == total;
	}
	if claimed.is_u64() {
		return false;
	}

	// 11.0 names the same integer as 11, 11.5 names none
	claimed.as_f64().is_some_and(|f| {
		f.fract() == 0.0
			&& (-9_223_372_036_854_775_808.0..9_223_372_036_854_775_808.0).contains(&f)
			&& f as i64 == total
	})
}

/// Re-evaluates an expression with a fresh source keyed by the same seed and compares the result with a claim.
///
/// # Errors
/// If the server-side total overflows, an error variant is returned.
///
/// # Examples
/// ```
/// use rodeo_dice::{dice::Seed, verify::{verify, Claim}, Expr};
///
/// let expr: Expr = "2d6+2".parse()?;
/// let seed = Seed::from("verify-seed-1");
/// let (roll, _) = verify(&expr, Some(&seed), Claim::new(0, None))?;
///
/// let (_, verification) = verify(&expr, Some(&seed), Claim::new(roll.total, None))?;
/// assert!(verification.verified);
///
/// let (_, verification) = verify(&expr, Some(&seed), Claim::new(roll.total + 1, None))?;
/// assert!(!verification.verified);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn verify(expr: &Expr, seed: Option<&Seed>, claim: Claim) -> Result<(Roll, Verification), CalcError> {
	let mut source = RandomSource::from_seed(seed);
	let roll = expr.roll(&mut source)?;
	let verification = Verification::compare(claim, &roll);
	Ok((roll, verification))
}
