use std::{
	collections::HashSet,
	io::{self, ErrorKind},
	path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

use super::{HistoryError, HistoryFilter, HistoryStore, RollRecord};

/// History kept in a newline-delimited JSON file, one record per line.
///
/// Writes are serialized through a lock and each record is written with a single `write_all` followed by a data
/// sync. When a write fails, the file is checked: a line that landed in full counts as stored, and a partial line is
/// cut off again. If the cut itself fails, the next append starts on a fresh line and readers skip lines that don't
/// parse.
#[derive(Debug)]
pub struct JsonlHistory {
	path: PathBuf,
	state: Mutex<WriterState>,

	#[cfg(test)]
	faults: std::sync::Mutex<Vec<Fault>>,
}

#[derive(Debug, Default)]
struct WriterState {
	/// Ids already present in the file
	ids: HashSet<String>,

	/// Whether the file may end without a trailing newline
	needs_separator: bool,
}

impl JsonlHistory {
	/// Opens (or prepares to create) the history file at `path`, indexing the ids it already holds.
	///
	/// # Errors
	/// If the parent directory can't be created or the existing file can't be read, an error variant is returned.
	pub async fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
		let path = path.into();
		if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
			fs::create_dir_all(parent).await.map_err(|source| io_error(parent, source))?;
		}

		let raw = read_or_empty(&path).await?;
		let records = parse_lines(&path, &raw);
		let state = WriterState {
			ids: records.into_iter().map(|record| record.id).collect(),
			needs_separator: !raw.is_empty() && !raw.ends_with('\n'),
		};
		tracing::debug!(path = %path.display(), records = state.ids.len(), "opened roll history");

		Ok(Self {
			path,
			state: Mutex::new(state),
			#[cfg(test)]
			faults: std::sync::Mutex::default(),
		})
	}

	/// Path of the backing file.
	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Opens the file for appending, along with its current length.
	async fn open_end(&self) -> io::Result<(fs::File, u64)> {
		let file = fs::OpenOptions::new()
			.create(true)
			.append(true)
			.open(&self.path)
			.await?;
		let end = file.metadata().await?.len();
		Ok((file, end))
	}

	async fn write_line(&self, file: &mut fs::File, line: &[u8]) -> io::Result<()> {
		tracing::trace!(path = %self.path.display(), bytes = line.len(), "appending roll record");

		#[cfg(test)]
		if let Some(fault) = self.faults.lock().ok().and_then(|mut faults| faults.pop()) {
			return fault.inject(file, line).await;
		}

		file.write_all(line).await?;
		file.flush().await?;
		file.sync_data().await
	}

	/// Looks at what a failed write left behind. Returns `true` if the whole line reached the file, otherwise cuts the
	/// file back to `offset` and returns `false`.
	async fn settle(&self, offset: u64, len: u64) -> io::Result<bool> {
		let file = fs::OpenOptions::new().write(true).open(&self.path).await?;
		if file.metadata().await?.len() >= offset.saturating_add(len) {
			return Ok(true);
		}
		file.set_len(offset).await?;
		file.sync_data().await?;
		Ok(false)
	}

	/// Makes the next write fail the given way.
	#[cfg(test)]
	pub(crate) fn inject_fault(&self, fault: Fault) {
		if let Ok(mut faults) = self.faults.lock() {
			faults.push(fault);
		}
	}
}

/// Ways a write can be made to fail in tests
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
	/// Only the first half of the line reaches the file
	TornWrite,

	/// The whole line reaches the file but the data sync fails
	FailedSync,
}

#[cfg(test)]
impl Fault {
	async fn inject(self, file: &mut fs::File, line: &[u8]) -> io::Result<()> {
		let written = match self {
			Self::TornWrite => line.len() / 2,
			Self::FailedSync => line.len(),
		};
		file.write_all(line.get(..written).unwrap_or(line)).await?;
		file.flush().await?;
		Err(io::Error::other(format!("injected {self:?}")))
	}
}

#[async_trait]
impl HistoryStore for JsonlHistory {
	async fn append(&self, record: &RollRecord) -> Result<(), HistoryError> {
		let mut state = self.state.lock().await;
		if state.ids.contains(&record.id) {
			tracing::debug!(id = %record.id, "roll record already stored");
			return Ok(());
		}

		let json = serde_json::to_string(record).map_err(|source| HistoryError::Serialize {
			id: record.id.clone(),
			source,
		})?;
		let mut line = String::with_capacity(json.len().saturating_add(2));
		if state.needs_separator {
			line.push('\n');
		}
		line.push_str(&json);
		line.push('\n');

		let (mut file, offset) = self.open_end().await.map_err(|source| io_error(&self.path, source))?;
		let Err(source) = self.write_line(&mut file, line.as_bytes()).await else {
			state.needs_separator = false;
			state.ids.insert(record.id.clone());
			return Ok(());
		};
		drop(file);

		let len = u64::try_from(line.len()).unwrap_or(u64::MAX);
		match self.settle(offset, len).await {
			Ok(true) => {
				tracing::warn!(id = %record.id, error = %source, "roll record written but not confirmed synced");
				state.needs_separator = false;
				state.ids.insert(record.id.clone());
				Ok(())
			}
			Ok(false) => Err(io_error(&self.path, source)),
			Err(err) => {
				tracing::warn!(path = %self.path.display(), error = %err, "couldn't cut back a failed roll record write");
				state.needs_separator = true;
				Err(io_error(&self.path, source))
			}
		}
	}

	async fn list(&self, filter: &HistoryFilter) -> Result<Vec<RollRecord>, HistoryError> {
		let _state = self.state.lock().await;
		let raw = read_or_empty(&self.path).await?;
		let records = parse_lines(&self.path, &raw);
		Ok(filter.apply(&records))
	}
}

async fn read_or_empty(path: &Path) -> Result<String, HistoryError> {
	match fs::read_to_string(path).await {
		Ok(raw) => Ok(raw),
		Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
		Err(source) => Err(io_error(path, source)),
	}
}

fn parse_lines(path: &Path, raw: &str) -> Vec<RollRecord> {
	raw.lines()
		.enumerate()
		.filter(|(_, line)| !line.trim().is_empty())
		.filter_map(|(idx, line)| match serde_json::from_str(line) {
			Ok(record) => Some(record),
			Err(err) => {
				tracing::warn!(path = %path.display(), line = idx.saturating_add(1), error = %err, "skipping unreadable roll record");
				None
			}
		})
		.collect()
}

fn io_error(path: &Path, source: io::Error) -> HistoryError {
	HistoryError::Io {
		path: path.display().to_string(),
		source,
	}
}
