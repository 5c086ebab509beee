use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{HistoryError, HistoryFilter, HistoryStore, RollRecord};

/// History kept only in memory, for ephemeral servers and tests.
#[derive(Debug, Default)]
pub struct MemoryHistory {
	records: RwLock<Vec<RollRecord>>,
}

impl MemoryHistory {
	/// Creates an empty history.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of records stored.
	pub async fn len(&self) -> usize {
		self.records.read().await.len()
	}

	/// Whether no records are stored.
	pub async fn is_empty(&self) -> bool {
		self.records.read().await.is_empty()
	}
}

#[async_trait]
impl HistoryStore for MemoryHistory {
	async fn append(&self, record: &RollRecord) -> Result<(), HistoryError> {
		let mut records = self.records.write().await;
		if !records.iter().any(|existing| existing.id == record.id) {
			records.push(record.clone());
		}
		Ok(())
	}

	async fn list(&self, filter: &HistoryFilter) -> Result<Vec<RollRecord>, HistoryError> {
		Ok(filter.apply(self.records.read().await.iter()))
	}
}
