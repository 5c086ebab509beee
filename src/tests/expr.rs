use crate::{
	dice::{
		roller::{Counting, Iter as IterRoller, Max as MaxRoller, Val as ValRoller},
		Dice, Rolled,
	},
	expr::{CalcError, DiceTerm, Describe, Expr, Op, RollDetail, Term, TermResult, Value},
};

#[test]
fn literal_sum() {
	let expr = Expr::new(vec![
		Term::new(Op::Add, Value::Num(42)),
		Term::new(Op::Add, Value::Num(69)),
	]);
	assert_eq!(expr.roll(&mut ValRoller(1)).unwrap().total, 111);
}

#[test]
fn literal_difference() {
	let expr = Expr::new(vec![
		Term::new(Op::Add, Value::Num(42)),
		Term::new(Op::Sub, Value::Num(69)),
	]);
	assert_eq!(expr.roll(&mut ValRoller(1)).unwrap().total, -27);
}

#[test]
fn leading_subtraction() {
	let expr = Expr::new(vec![
		Term::new(Op::Sub, Value::Dice(Dice::new(2, 6).unwrap())),
		Term::new(Op::Add, Value::Num(3)),
	]);
	let roll = expr.roll(&mut IterRoller::new([4, 5])).unwrap();
	assert_eq!(roll.total, -6);
	assert_eq!(roll.detail.describe(None), "-2d6[4, 5] + 3");
}

#[test]
fn dice_terms_draw_in_order() {
	let expr = Expr::new(vec![
		Term::new(Op::Add, Value::Dice(Dice::new(2, 6).unwrap())),
		Term::new(Op::Sub, Value::Dice(Dice::new(1, 4).unwrap())),
		Term::new(Op::Add, Value::Num(3)),
	]);
	let detail = expr.eval(&mut IterRoller::new([6, 2, 3]));

	let rolled = detail.dice().collect::<Vec<_>>();
	assert_eq!(rolled.len(), 2);
	assert_eq!(rolled[0].rolls, vec![6, 2]);
	assert_eq!(rolled[1].rolls, vec![3]);
	assert_eq!(detail.ops(), &[Op::Sub, Op::Add]);
	assert_eq!(detail.calc().unwrap(), 8);
}

#[test]
fn literal_only_expression_draws_nothing() {
	let expr = Expr::new(vec![Term::new(Op::Add, Value::Num(5))]);
	let mut roller = Counting::new(MaxRoller);
	assert_eq!(expr.roll(&mut roller).unwrap().total, 5);
	assert_eq!(roller.draws(), 0);
	assert!(expr.is_deterministic());
}

#[test]
fn dice_count_sums_dice_terms() {
	let expr = Expr::new(vec![
		Term::new(Op::Add, Value::Dice(Dice::new(3, 6).unwrap())),
		Term::new(Op::Add, Value::Num(10)),
		Term::new(Op::Sub, Value::Dice(Dice::new(1, 8).unwrap())),
	]);
	assert_eq!(expr.dice_count(), 4);
	assert!(!expr.is_deterministic());
}

#[test]
fn one_faced_dice_are_deterministic() {
	let expr = Expr::new(vec![Term::new(Op::Add, Value::Dice(Dice::new(7, 1).unwrap()))]);
	assert!(expr.is_deterministic());
	assert_eq!(expr.roll(&mut MaxRoller).unwrap().total, 7);
}

#[test]
fn describe_round_trips_through_parser() {
	let expr: Expr = "-D20 +  3d6-2".parse().unwrap();
	assert_eq!(expr.to_string(), "-1d20 + 3d6 - 2");
	assert_eq!(expr.to_string().parse::<Expr>().unwrap(), expr);
}

#[test]
fn describe_truncates_long_lists() {
	let expr: Expr = "5d6 + 1".parse().unwrap();
	let detail = expr.eval(&mut IterRoller::new([1, 2, 3, 4, 5]));
	assert_eq!(detail.describe(Some(2)), "5d6[1, 2, 3 more...] + 1");
}

#[test]
fn overflow_is_reported() {
	let expr = Expr::new(vec![
		Term::new(Op::Add, Value::Num(i64::MAX)),
		Term::new(Op::Add, Value::Num(1)),
	]);
	let err = expr.roll(&mut ValRoller(1)).unwrap_err();
	assert!(matches!(err, CalcError::Overflow(..)));
	assert!(err.to_string().contains("overflow"));
}

#[test]
fn detail_serializes_with_tagged_terms() {
	let detail = RollDetail::new(vec![
		DiceTerm::new(
			Op::Add,
			TermResult::Dice(Rolled::from_dice_and_rolls(&Dice::new(2, 6).unwrap(), [6, 3])),
		),
		DiceTerm::new(Op::Add, TermResult::Num { value: 2 }),
	]);

	let json = serde_json::to_value(&detail).unwrap();
	assert_eq!(
		json,
		serde_json::json!({
			"terms": [
				{ "op": "+", "type": "dice", "count": 2, "faces": 6, "rolls": [6, 3] },
				{ "op": "+", "type": "num", "value": 2 },
			],
			"ops": ["+"],
		})
	);
	assert_eq!(serde_json::from_value::<RollDetail>(json).unwrap(), detail);
}
