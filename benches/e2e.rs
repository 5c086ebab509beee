#![feature(test)]

extern crate test;

use test::Bencher;

use rodeo_dice::{
	dice::Seed,
	engine,
	guard::Guard,
	verify::{verify, Claim},
	Expr, RandomSource,
};

#[bench]
fn e2e_basic(b: &mut Bencher) {
	let guard = Guard::default();
	b.iter(|| engine::evaluate(&guard, "4d8 + 4", &mut RandomSource::from_seed(None)).unwrap());
}

#[bench]
fn e2e_seeded(b: &mut Bencher) {
	let guard = Guard::default();
	let seed = Seed::from("bench");
	b.iter(|| engine::evaluate(&guard, "3d4 + 1d8 - 2", &mut RandomSource::from_seed(Some(&seed))).unwrap());
}

#[bench]
fn e2e_verify(b: &mut Bencher) {
	let expr: Expr = "2d6 + 2".parse().unwrap();
	let seed = Seed::from("verify-seed-1");
	b.iter(|| verify(&expr, Some(&seed), Claim::new(11, None)).unwrap());
}
