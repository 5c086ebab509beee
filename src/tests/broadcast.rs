use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::{
	broadcast::{Envelope, RollEvent, Rooms, MOVE_EXECUTED},
	dice::roller::Max as MaxRoller,
	expr::Expr,
	history::RollRecord,
};

fn event(move_id: &str) -> RollEvent {
	let expr: Expr = "1d6".parse().unwrap();
	let roll = expr.roll(&mut MaxRoller).unwrap();
	RollEvent::new(RollRecord::new(
		Some(move_id.to_owned()),
		"1d6".to_owned(),
		None,
		roll.detail,
		roll.total,
		None,
	))
}

#[tokio::test]
async fn subscribers_receive_published_events() {
	let rooms = Rooms::default();
	let mut first = rooms.subscribe("table-1").await;
	let mut second = rooms.subscribe("table-1").await;
	assert_eq!(rooms.subscriber_count("table-1").await, 2);

	let sent = event("volley");
	assert_eq!(rooms.publish("table-1", sent.clone()).await, 2);

	assert_eq!(*first.recv().await.unwrap(), sent);
	assert_eq!(*second.recv().await.unwrap(), sent);
}

#[tokio::test]
async fn rooms_are_isolated() {
	let rooms = Rooms::default();
	let mut one = rooms.subscribe("one").await;
	let mut two = rooms.subscribe("two").await;

	rooms.publish("one", event("defy-danger")).await;
	assert_eq!(one.recv().await.unwrap().move_id.as_deref(), Some("defy-danger"));
	assert!(matches!(two.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn publishing_to_nobody_succeeds() {
	let rooms = Rooms::default();
	assert_eq!(rooms.publish("empty", event("parley")).await, 0);
	assert!(rooms.room_names().await.is_empty());
}

#[tokio::test]
async fn departed_rooms_are_pruned() {
	let rooms = Rooms::default();
	let rx = rooms.subscribe("brief").await;
	assert_eq!(rooms.room_names().await, vec!["brief".to_owned()]);

	drop(rx);
	assert_eq!(rooms.publish("brief", event("spout-lore")).await, 0);
	assert!(rooms.room_names().await.is_empty());
}

#[tokio::test]
async fn leaving_removes_the_room_without_a_publish() {
	let rooms = Rooms::default();
	let first = rooms.subscribe("random-room-name").await;
	let second = rooms.subscribe("random-room-name").await;

	rooms.leave("random-room-name", first).await;
	assert_eq!(rooms.room_names().await, vec!["random-room-name".to_owned()]);
	assert_eq!(rooms.subscriber_count("random-room-name").await, 1);

	rooms.leave("random-room-name", second).await;
	assert!(rooms.room_names().await.is_empty());
}

#[tokio::test]
async fn slow_subscribers_lag() {
	let rooms = Rooms::new(2);
	let mut rx = rooms.subscribe("busy").await;
	for idx in 0..5 {
		rooms.publish("busy", event(&format!("move-{idx}"))).await;
	}

	assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
	assert_eq!(rx.recv().await.unwrap().move_id.as_deref(), Some("move-3"));
}

#[test]
fn envelope_shape() {
	let payload = event("hack-and-slash");
	let json = serde_json::to_value(Envelope::move_executed(&payload)).unwrap();
	assert_eq!(json["event"], MOVE_EXECUTED);
	assert_eq!(json["payload"]["move_id"], "hack-and-slash");
	assert_eq!(json["payload"]["record"]["total"], 6);
	assert!(json["payload"].get("verification").is_none());
}
