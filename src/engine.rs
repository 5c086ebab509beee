//! The roll request pipeline: `Received → Guarded → Evaluated/Verified → Recorded → Broadcast → Responded`.
//!
//! Guard and parse failures short-circuit before anything is recorded. Recording is retried; if every attempt fails
//! the roll is still returned, flagged as not durably stored. Broadcasting never fails the roll.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
	broadcast::{RollEvent, Rooms, DEFAULT_ROOM},
	dice::{RandomSource, Roller, Seed},
	expr::{CalcError, Expr, Roll},
	guard::{Guard, GuardError},
	history::{HistoryFilter, HistoryError, HistoryStore, RollRecord},
	parse::ParseError,
	verify::{self, Claim, Verification},
};

/// A request to roll an expression
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[non_exhaustive]
pub struct RollRequest {
	/// Dice notation to evaluate
	pub expression: String,

	/// Seed for a reproducible roll
	#[serde(default)]
	pub seed: Option<Seed>,

	/// Total the client computed locally, if it is claiming one. Any JSON number is accepted; only an exact match with
	/// the server's total verifies.
	#[serde(default, alias = "clientTotal")]
	pub client_total: Option<serde_json::Number>,

	/// Breakdown the client computed locally, kept for audit only
	#[serde(default, alias = "clientDetail")]
	pub client_detail: Option<serde_json::Value>,

	/// Move the roll is made for
	#[serde(default, alias = "moveId")]
	pub move_id: Option<String>,

	/// Room to broadcast the result to
	#[serde(default)]
	pub room: Option<String>,
}

impl RollRequest {
	/// Creates a request for an expression with nothing else set.
	#[must_use]
	pub fn new(expression: impl Into<String>) -> Self {
		Self {
			expression: expression.into(),
			..Self::default()
		}
	}

	/// Sets the seed.
	#[must_use]
	pub fn seed(mut self, seed: impl Into<Seed>) -> Self {
		self.seed = Some(seed.into());
		self
	}

	/// Attaches a client claim.
	#[must_use]
	pub fn claim(mut self, total: impl Into<serde_json::Number>, detail: Option<serde_json::Value>) -> Self {
		self.client_total = Some(total.into());
		self.client_detail = detail;
		self
	}

	/// Sets the move the roll is made for.
	#[must_use]
	pub fn move_id(mut self, move_id: impl Into<String>) -> Self {
		self.move_id = Some(move_id.into());
		self
	}

	/// Sets the room the result is broadcast to.
	#[must_use]
	pub fn room(mut self, room: impl Into<String>) -> Self {
		self.room = Some(room.into());
		self
	}
}

/// The result of a successful roll request
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct RollOutcome {
	/// The record that was created
	pub record: RollRecord,

	/// Whether the record reached the history store
	pub durable: bool,
}

impl RollOutcome {
	/// The verification attached to the record, for claimed rolls.
	#[must_use]
	pub const fn verification(&self) -> Option<&Verification> {
		self.record.verification.as_ref()
	}
}

/// Response body for a roll: the bare record for unclaimed rolls, or the record and its verification for claimed ones
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RollResponse<'a> {
	/// Unclaimed roll
	Direct {
		/// The record
		#[serde(flatten)]
		record: &'a RollRecord,

		/// Present (as `false`) only when the record could not be stored
		#[serde(skip_serializing_if = "is_durable")]
		history_durable: bool,
	},

	/// Claimed roll
	Verified {
		/// The record
		record: &'a RollRecord,

		/// The verification verdict
		verification: &'a Verification,

		/// Present (as `false`) only when the record could not be stored
		#[serde(skip_serializing_if = "is_durable")]
		history_durable: bool,
	},
}

impl<'a> From<&'a RollOutcome> for RollResponse<'a> {
	fn from(outcome: &'a RollOutcome) -> Self {
		match &outcome.record.verification {
			Some(verification) => Self::Verified {
				record: &outcome.record,
				verification,
				history_durable: outcome.durable,
			},
			None => Self::Direct {
				record: &outcome.record,
				history_durable: outcome.durable,
			},
		}
	}
}

#[expect(clippy::trivially_copy_pass_by_ref, reason = "Signature required by serde")]
const fn is_durable(durable: &bool) -> bool {
	*durable
}

/// Errors that reject a roll request. All of them are caller input errors and are never retried.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RollError {
	/// The expression is too expensive to evaluate.
	#[error(transparent)]
	GuardRejected(#[from] GuardError),

	/// The expression is not well-formed dice notation.
	#[error(transparent)]
	Parse(#[from] ParseError),

	/// The expression's total can't be represented.
	#[error(transparent)]
	Eval(#[from] CalcError),
}

/// Guards, parses, and evaluates an expression with the given roller.
///
/// # Errors
/// If the guard rejects the expression, it fails to parse, or its total overflows, an error variant is returned.
/// Guard rejections happen before the roller is touched.
pub fn evaluate(guard: &Guard, expression: &str, roller: &mut impl Roller) -> Result<Roll, RollError> {
	guard.check(expression)?;
	let expr: Expr = expression.parse()?;
	Ok(expr.roll(roller)?)
}

/// Guards and parses an expression, then verifies a claim against it.
///
/// # Errors
/// If the guard rejects the expression, it fails to parse, or its total overflows, an error variant is returned.
pub fn verify_claim(
	guard: &Guard,
	expression: &str,
	seed: Option<&Seed>,
	claim: Claim,
) -> Result<(Roll, Verification), RollError> {
	guard.check(expression)?;
	let expr: Expr = expression.parse()?;
	Ok(verify::verify(&expr, seed, claim)?)
}

/// How failed history appends are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct RetryPolicy {
	/// Attempts after the first one
	pub retries: u32,

	/// Delay before the first retry; doubles on each subsequent one
	pub backoff: Duration,
}

impl RetryPolicy {
	/// Creates a retry policy.
	#[must_use]
	pub const fn new(retries: u32, backoff: Duration) -> Self {
		Self { retries, backoff }
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(3, Duration::from_millis(25))
	}
}

/// Runs roll requests against shared history and rooms.
///
/// Cloning is cheap and every clone shares the same history and rooms.
#[derive(Clone)]
pub struct Engine {
	guard: Guard,
	history: Arc<dyn HistoryStore>,
	rooms: Rooms,
	retry: RetryPolicy,
}

impl Engine {
	/// Creates an engine.
	#[must_use]
	pub fn new(guard: Guard, history: Arc<dyn HistoryStore>, rooms: Rooms, retry: RetryPolicy) -> Self {
		Self {
			guard,
			history,
			rooms,
			retry,
		}
	}

	/// The guard applied to every request.
	#[must_use]
	pub const fn guard(&self) -> &Guard {
		&self.guard
	}

	/// The rooms rolls are broadcast to.
	#[must_use]
	pub const fn rooms(&self) -> &Rooms {
		&self.rooms
	}

	/// Handles a roll request from start to finish.
	///
	/// # Errors
	/// If the guard rejects the expression, it fails to parse, or its total overflows, an error variant is returned and
	/// nothing is recorded or broadcast.
	pub async fn roll(&self, request: RollRequest) -> Result<RollOutcome, RollError> {
		let RollRequest {
			expression,
			seed,
			client_total,
			client_detail,
			move_id,
			room,
		} = request;

		// Fresh source per request, so determinism is scoped to this seed and expression
		let (roll, verification) = match client_total {
			Some(total) => {
				if seed.is_none() {
					tracing::warn!(%expression, "claimed roll without a seed can't be reproduced");
				}
				let claim = Claim::new(total, client_detail);
				let (roll, verification) = verify_claim(&self.guard, &expression, seed.as_ref(), claim)?;
				(roll, Some(verification))
			}
			None => {
				let mut source = RandomSource::from_seed(seed.as_ref());
				(evaluate(&self.guard, &expression, &mut source)?, None)
			}
		};

		let record = RollRecord::new(move_id, expression, seed, roll.detail, roll.total, verification);
		tracing::info!(
			id = %record.id,
			expression = %record.expression,
			total = roll.total,
			verified = ?record.verification.as_ref().map(|v| v.verified),
			"roll evaluated"
		);

		let durable = self.record(&record).await;

		let room = room.as_deref().unwrap_or(DEFAULT_ROOM);
		self.rooms.publish(room, RollEvent::new(record.clone())).await;

		Ok(RollOutcome { record, durable })
	}

	/// Lists recorded rolls.
	///
	/// # Errors
	/// If the history store can't be read, an error variant is returned.
	pub async fn history(&self, filter: &HistoryFilter) -> Result<Vec<RollRecord>, HistoryError> {
		self.history.list(filter).await
	}

	/// Appends a record, retrying failures. Returns whether the record was durably stored.
	async fn record(&self, record: &RollRecord) -> bool {
		let mut delay = self.retry.backoff;
		let mut attempt: u32 = 0;
		loop {
			match self.history.append(record).await {
				Ok(()) => return true,
				Err(err) if attempt < self.retry.retries => {
					attempt = attempt.saturating_add(1);
					tracing::warn!(id = %record.id, attempt, error = %err, "history append failed, retrying");
					tokio::time::sleep(delay).await;
					delay = delay.saturating_mul(2);
				}
				Err(err) => {
					tracing::error!(id = %record.id, error = %err, "history append failed, giving up");
					return false;
				}
			}
		}
	}
}

impl core::fmt::Debug for Engine {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Engine")
			.field("guard", &self.guard)
			.field("rooms", &self.rooms)
			.field("retry", &self.retry)
			.finish_non_exhaustive()
	}
}
