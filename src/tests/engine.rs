use std::{
	io,
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
	time::Duration,
};

use async_trait::async_trait;

use crate::{
	broadcast::{Rooms, DEFAULT_ROOM},
	dice::roller::{Counting, Max as MaxRoller},
	engine::{self, Engine, RetryPolicy, RollError, RollRequest, RollResponse},
	guard::{Guard, GuardError},
	history::{HistoryError, HistoryFilter, HistoryStore, MemoryHistory, RollRecord},
};

/// Store that fails a set number of appends before delegating to memory
#[derive(Debug, Default)]
struct FlakyHistory {
	failures: AtomicUsize,
	attempts: AtomicUsize,
	inner: MemoryHistory,
}

impl FlakyHistory {
	fn failing(failures: usize) -> Self {
		Self {
			failures: AtomicUsize::new(failures),
			..Self::default()
		}
	}
}

#[async_trait]
impl HistoryStore for FlakyHistory {
	async fn append(&self, record: &RollRecord) -> Result<(), HistoryError> {
		self.attempts.fetch_add(1, Ordering::SeqCst);
		let remaining = self.failures.load(Ordering::SeqCst);
		if remaining > 0 {
			self.failures.store(remaining - 1, Ordering::SeqCst);
			return Err(HistoryError::Io {
				path: "flaky".to_owned(),
				source: io::Error::other("disk on fire"),
			});
		}
		self.inner.append(record).await
	}

	async fn list(&self, filter: &HistoryFilter) -> Result<Vec<RollRecord>, HistoryError> {
		self.inner.list(filter).await
	}
}

fn engine_with(history: Arc<dyn HistoryStore>) -> Engine {
	Engine::new(
		Guard::default(),
		history,
		Rooms::default(),
		RetryPolicy::new(3, Duration::from_millis(1)),
	)
}

#[test]
fn guard_rejects_before_any_draw() {
	let mut roller = Counting::new(MaxRoller);
	let err = engine::evaluate(&Guard::default(), "999999d1000000", &mut roller).unwrap_err();
	assert!(matches!(err, RollError::GuardRejected(GuardError::TooManyDice { .. })));
	assert!(err.to_string().contains("too many dice"));
	assert_eq!(roller.draws(), 0);
}

#[test]
fn parse_failure_draws_nothing() {
	let mut roller = Counting::new(MaxRoller);
	let err = engine::evaluate(&Guard::default(), "2d6 +", &mut roller).unwrap_err();
	assert!(matches!(err, RollError::Parse(..)));
	assert_eq!(roller.draws(), 0);
}

#[test]
fn evaluate_draws_once_per_die() {
	let mut roller = Counting::new(MaxRoller);
	let roll = engine::evaluate(&Guard::default(), "3d6 + d4 + 2", &mut roller).unwrap();
	assert_eq!(roll.total, 24);
	assert_eq!(roller.draws(), 4);
}

#[test]
fn seeded_sample_is_in_range() {
	let seed = crate::dice::Seed::from("seed-123");
	let mut source = crate::dice::RandomSource::from_seed(Some(&seed));
	let roll = engine::evaluate(&Guard::default(), "2d6+2", &mut source).unwrap();
	assert!((4..=14).contains(&roll.total));
	assert_eq!(roll.total, 7);
}

#[test]
fn prose_is_a_parse_error() {
	let mut roller = Counting::new(MaxRoller);
	let err = engine::evaluate(&Guard::default(), "not a dice expr", &mut roller).unwrap_err();
	assert!(matches!(err, RollError::Parse(..)));
	assert_eq!(roller.draws(), 0);
}

#[tokio::test]
async fn seeded_roll_is_recorded_and_reproducible() {
	let history = Arc::new(MemoryHistory::new());
	let engine = engine_with(Arc::clone(&history) as Arc<dyn HistoryStore>);

	let request = RollRequest::new("2d6+2").seed("verify-seed-1").move_id("hack-and-slash");
	let first = engine.roll(request.clone()).await.unwrap();
	let second = engine.roll(request).await.unwrap();

	assert!(first.durable);
	assert_eq!(first.record.total, Some(11));
	assert_eq!(first.record.detail, second.record.detail);
	assert_ne!(first.record.id, second.record.id);
	assert!(first.verification().is_none());

	let listed = engine.history(&HistoryFilter::new().move_id("hack-and-slash")).await.unwrap();
	assert_eq!(listed.len(), 2);
	assert_eq!(history.len().await, 2);
}

#[tokio::test]
async fn claimed_roll_is_verified() {
	let engine = engine_with(Arc::new(MemoryHistory::new()));

	let honest = engine
		.roll(RollRequest::new("2d6+2").seed("verify-seed-1").claim(11, None))
		.await
		.unwrap();
	assert!(honest.record.is_verified());
	assert_eq!(honest.verification().map(|v| v.server_total), Some(11));

	let dishonest = engine
		.roll(RollRequest::new("2d6+2").seed("verify-seed-1").claim(12, None))
		.await
		.unwrap();
	let verification = dishonest.verification().unwrap();
	assert!(!verification.verified);
	assert_eq!(verification.client_total, serde_json::Number::from(12));
	assert_eq!(verification.server_total, 11);
	assert_eq!(dishonest.record.total, Some(11));
}

#[tokio::test]
async fn fractional_claims_are_compared_exactly() {
	let engine = engine_with(Arc::new(MemoryHistory::new()));
	let claim = |total: f64| {
		RollRequest::new("2d6+2")
			.seed("verify-seed-1")
			.claim(serde_json::Number::from_f64(total).unwrap(), None)
	};

	let whole = engine.roll(claim(11.0)).await.unwrap();
	assert!(whole.record.is_verified());

	for total in [11.5, 10.999_999, 12.0, -11.0, 1e300] {
		let outcome = engine.roll(claim(total)).await.unwrap();
		let verification = outcome.verification().unwrap();
		assert!(!verification.verified, "{total} should not verify");
		assert_eq!(verification.server_total, 11);
	}

	let request: RollRequest =
		serde_json::from_str(r#"{ "expression": "2d6+2", "seed": "verify-seed-1", "clientTotal": 11.5 }"#).unwrap();
	assert_eq!(request.client_total.as_ref().and_then(serde_json::Number::as_f64), Some(11.5));
}

#[tokio::test]
async fn rejected_roll_is_not_recorded_or_broadcast() {
	let history = Arc::new(MemoryHistory::new());
	let engine = engine_with(Arc::clone(&history) as Arc<dyn HistoryStore>);
	let mut rx = engine.rooms().subscribe(DEFAULT_ROOM).await;

	let err = engine.roll(RollRequest::new("999999d1000000")).await.unwrap_err();
	assert!(err.to_string().contains("too many dice"));
	assert!(engine.roll(RollRequest::new("2d6 * 2")).await.is_err());

	assert!(history.is_empty().await);
	assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn roll_is_broadcast_to_its_room() {
	let engine = engine_with(Arc::new(MemoryHistory::new()));
	let mut global = engine.rooms().subscribe(DEFAULT_ROOM).await;
	let mut table = engine.rooms().subscribe("table-7").await;

	let outcome = engine
		.roll(RollRequest::new("1d20").move_id("defy-danger").room("table-7"))
		.await
		.unwrap();
	let event = table.recv().await.unwrap();
	assert_eq!(event.record, outcome.record);
	assert_eq!(event.move_id.as_deref(), Some("defy-danger"));
	assert!(global.try_recv().is_err());

	engine.roll(RollRequest::new("1d20")).await.unwrap();
	assert_eq!(global.recv().await.unwrap().move_id, None);
}

#[tokio::test]
async fn history_append_is_retried() {
	let history = Arc::new(FlakyHistory::failing(2));
	let engine = engine_with(Arc::clone(&history) as Arc<dyn HistoryStore>);

	let outcome = engine.roll(RollRequest::new("1d6")).await.unwrap();
	assert!(outcome.durable);
	assert_eq!(history.attempts.load(Ordering::SeqCst), 3);
	assert_eq!(engine.history(&HistoryFilter::new()).await.unwrap(), vec![outcome.record]);
}

#[tokio::test]
async fn persistent_failure_still_returns_roll() {
	let history = Arc::new(FlakyHistory::failing(usize::MAX));
	let engine = engine_with(Arc::clone(&history) as Arc<dyn HistoryStore>);
	let mut rx = engine.rooms().subscribe(DEFAULT_ROOM).await;

	let outcome = engine.roll(RollRequest::new("2d6")).await.unwrap();
	assert!(!outcome.durable);
	assert_eq!(history.attempts.load(Ordering::SeqCst), 4);
	assert!(rx.recv().await.is_ok());

	let json = serde_json::to_value(RollResponse::from(&outcome)).unwrap();
	assert_eq!(json["history_durable"], false);
}

#[test]
fn response_shapes() {
	let engine = engine_with(Arc::new(MemoryHistory::new()));
	let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

	let direct = rt.block_on(engine.roll(RollRequest::new("1d6 + 1"))).unwrap();
	let json = serde_json::to_value(RollResponse::from(&direct)).unwrap();
	assert_eq!(json["expression"], "1d6 + 1");
	assert!(json.get("history_durable").is_none());
	assert!(json.get("verification").is_none());

	let claimed = rt
		.block_on(engine.roll(RollRequest::new("1d6").seed(7_i64).claim(3, None)))
		.unwrap();
	let json = serde_json::to_value(RollResponse::from(&claimed)).unwrap();
	assert_eq!(json["record"]["id"], claimed.record.id.as_str());
	assert!(json["verification"]["verified"].is_boolean());
}

#[test]
fn request_accepts_camel_case() {
	let request: RollRequest = serde_json::from_str(
		r#"{ "expression": "2d6+2", "seed": "s", "clientTotal": 9, "clientDetail": [1, 2], "moveId": "m" }"#,
	)
	.unwrap();
	assert_eq!(request.client_total, Some(serde_json::Number::from(9)));
	assert_eq!(request.move_id.as_deref(), Some("m"));
	assert!(request.client_detail.is_some());

	let request: RollRequest = serde_json::from_str(r#"{ "expression": "d20", "seed": 42, "move_id": "m" }"#).unwrap();
	assert_eq!(request.seed, Some(crate::dice::Seed::Int(42)));
	assert_eq!(request.move_id.as_deref(), Some("m"));
}
