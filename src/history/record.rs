use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{dice::Seed, expr::RollDetail, verify::Verification};

/// Persisted outcome of one roll request. Created exactly once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct RollRecord {
	/// Unique identifier, assigned before the record is appended
	pub id: String,

	/// Move the roll was made for, if any
	pub move_id: Option<String>,

	/// Source text of the expression
	pub expression: String,

	/// Seed the roll was derived from, if any
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub seed: Option<Seed>,

	/// Authoritative breakdown, if one was produced
	pub detail: Option<RollDetail>,

	/// Authoritative total, if one was produced
	pub total: Option<i64>,

	/// Comparison against a client claim, present only for claimed rolls
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub verification: Option<Verification>,

	/// RFC 3339 timestamp (UTC)
	pub created_at: String,
}

impl RollRecord {
	/// Creates a record with a fresh id and the current time.
	#[must_use]
	pub fn new(
		move_id: Option<String>,
		expression: String,
		seed: Option<Seed>,
		detail: RollDetail,
		total: i64,
		verification: Option<Verification>,
	) -> Self {
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			move_id,
			expression,
			seed,
			detail: Some(detail),
			total: Some(total),
			verification,
			created_at: now_rfc3339(),
		}
	}

	/// Whether the record carries a successful verification.
	#[must_use]
	pub fn is_verified(&self) -> bool {
		self.verification.as_ref().is_some_and(|v| v.verified)
	}
}

fn now_rfc3339() -> String {
	OffsetDateTime::now_utc()
		.format(&Rfc3339)
		.unwrap_or_else(|_err| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Narrows the records returned by [`HistoryStore::list()`](super::HistoryStore::list)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct HistoryFilter {
	/// Only records for this move
	pub move_id: Option<String>,

	/// Only the most recent `limit` matching records
	pub limit: Option<usize>,
}

impl HistoryFilter {
	/// Creates a filter that matches everything.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Restricts the filter to one move.
	#[must_use]
	pub fn move_id(mut self, move_id: impl Into<String>) -> Self {
		self.move_id = Some(move_id.into());
		self
	}

	/// Keeps only the most recent `limit` matches.
	#[must_use]
	pub const fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	/// Checks whether a record passes the filter, ignoring the limit.
	#[must_use]
	pub fn matches(&self, record: &RollRecord) -> bool {
		self.move_id
			.as_ref()
			.map_or(true, |move_id| record.move_id.as_ref() == Some(move_id))
	}

	/// Applies the filter to records given in append order.
	#[must_use]
	pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a RollRecord>) -> Vec<RollRecord> {
		let mut matched = records
			.into_iter()
			.filter(|record| self.matches(record))
			.cloned()
			.collect::<Vec<_>>();
		if let Some(limit) = self.limit {
			let skip = matched.len().saturating_sub(limit);
			matched.drain(..skip);
		}
		matched
	}
}
