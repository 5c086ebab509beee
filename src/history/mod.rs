//! Append-only persistence of roll records.
//!
//! Appending is the only mutation a store supports. Stores must tolerate concurrent appends from overlapping roll
//! requests without dropping or interleaving records, and appending the same record id twice must not duplicate it
//! so that failed writes can be retried.

mod jsonl;
mod memory;
mod record;

use async_trait::async_trait;

pub use self::{
	jsonl::JsonlHistory,
	memory::MemoryHistory,
	record::{HistoryFilter, RollRecord},
};

#[cfg(test)]
pub(crate) use self::jsonl::Fault;

/// Storage for roll records.
///
/// Implementations must be `Send + Sync + 'static` to be shared between concurrent roll requests.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
	/// Durably appends a record. Appending a record whose id is already stored succeeds without writing it again.
	async fn append(&self, record: &RollRecord) -> Result<(), HistoryError>;

	/// Lists stored records in append order, narrowed by a filter.
	async fn list(&self, filter: &HistoryFilter) -> Result<Vec<RollRecord>, HistoryError>;
}

/// Errors returned by a [`HistoryStore`]
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum HistoryError {
	/// The underlying file could not be read or written.
	#[error("history i/o error on {path}: {source}")]
	Io {
		/// File the operation was working on
		path: String,

		/// Underlying error
		#[source]
		source: std::io::Error,
	},

	/// A record could not be serialized.
	#[error("failed to serialize roll record {id}: {source}")]
	Serialize {
		/// Id of the record
		id: String,

		/// Underlying error
		#[source]
		source: serde_json::Error,
	},
}
