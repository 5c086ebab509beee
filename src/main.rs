use std::{path::PathBuf, process::ExitCode};

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rodeo_dice::{
	config::RodeoConfig,
	dice::{RandomSource, Seed},
	engine::{self, RollError},
	expr::Describe,
	history::{HistoryFilter, HistoryStore, JsonlHistory},
	server,
	verify::Claim,
};

#[derive(Debug, Parser)]
#[command(name = "rodeo-dice")]
#[command(about = "Seeded, verifiable dice rolls with history and live broadcast")]
struct Cli {
	/// Log filter (overridden by RUST_LOG)
	#[arg(long, global = true, default_value = "info")]
	log: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Roll an expression locally and print the breakdown
	Roll {
		/// Dice expression; may be left unquoted even with spaces
		#[arg(required = true, num_args = 1..)]
		expression: Vec<String>,

		/// Seed for a reproducible roll (integers are used as numeric seeds)
		#[arg(long)]
		seed: Option<String>,

		/// Total to verify against the roll
		#[arg(long, allow_negative_numbers = true)]
		claim: Option<serde_json::Number>,
	},

	/// Run the HTTP and WebSocket server
	Serve {
		/// Socket address to listen on
		#[arg(long)]
		listen: Option<String>,

		/// Roll history file
		#[arg(long, conflicts_with = "memory")]
		history: Option<PathBuf>,

		/// Keep roll history in memory only
		#[arg(long)]
		memory: bool,
	},

	/// Print recorded rolls as JSON lines
	History {
		/// Roll history file
		#[arg(long)]
		history: Option<PathBuf>,

		/// Only rolls for this move
		#[arg(long)]
		move_id: Option<String>,

		/// Only the most recent N rolls
		#[arg(long)]
		limit: Option<usize>,
	},
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let cfg = match RodeoConfig::load() {
		Ok(cfg) => cfg,
		Err(err) => {
			eprintln!("Configuration error: {err}");
			return ExitCode::FAILURE;
		}
	};

	match cli.command {
		Command::Roll {
			expression,
			seed,
			claim,
		} => roll(&cfg, &expression.join(" "), seed.map(parse_seed), claim),
		Command::Serve {
			listen,
			history,
			memory,
		} => {
			let mut cfg = cfg;
			if let Some(listen) = listen {
				cfg.listen_addr = listen;
			}
			if memory {
				cfg.history_path = None;
			} else if history.is_some() {
				cfg.history_path = history;
			}

			match server::run_server(cfg).await {
				Ok(()) => ExitCode::SUCCESS,
				Err(err) => {
					tracing::error!(error = %err, "server failed");
					ExitCode::FAILURE
				}
			}
		}
		Command::History {
			history,
			move_id,
			limit,
		} => list_history(history.or(cfg.history_path), move_id, limit).await,
	}
}

fn parse_seed(raw: String) -> Seed {
	raw.parse::<i64>().map_or_else(|_| Seed::from(raw), Seed::Int)
}

fn roll(cfg: &RodeoConfig, input: &str, seed: Option<Seed>, claim: Option<serde_json::Number>) -> ExitCode {
	println!("Input: {input}");
	if let Some(seed) = &seed {
		println!("Seed: {seed} (state {:#010x})", seed.to_u32());
	}

	let guard = cfg.guard();
	let result = match claim {
		Some(total) => engine::verify_claim(&guard, input, seed.as_ref(), Claim::new(total, None))
			.map(|(roll, verification)| (roll, Some(verification))),
		None => engine::evaluate(&guard, input, &mut RandomSource::from_seed(seed.as_ref())).map(|roll| (roll, None)),
	};

	match result {
		Ok((roll, verification)) => {
			println!("Rolled: {}", roll.detail.describe(Some(20)));
			println!("Total: {}", roll.total);
			if let Some(verification) = verification {
				println!(
					"Verified: {} (claimed {}, derived {})",
					verification.verified, verification.client_total, verification.server_total
				);
			}
			ExitCode::SUCCESS
		}
		Err(RollError::Parse(err)) => {
			for issue in &err.issues {
				// Issue spans are byte offsets
				let report = Report::build(ReportKind::Error, issue.span.clone())
					.with_config(Config::default().with_index_type(IndexType::Byte))
					.with_message("Invalid dice expression")
					.with_label(Label::new(issue.span.clone()).with_message(&issue.message))
					.finish();
				if report.eprint(Source::from(input)).is_err() {
					eprintln!("Parse error: {}", issue.message);
				}
			}
			ExitCode::FAILURE
		}
		Err(err) => {
			eprintln!("Error: {err}");
			ExitCode::FAILURE
		}
	}
}

async fn list_history(path: Option<PathBuf>, move_id: Option<String>, limit: Option<usize>) -> ExitCode {
	let Some(path) = path else {
		eprintln!("No history file configured");
		return ExitCode::FAILURE;
	};

	let mut filter = HistoryFilter::new();
	if let Some(move_id) = move_id {
		filter = filter.move_id(move_id);
	}
	if let Some(limit) = limit {
		filter = filter.limit(limit);
	}

	let records = match JsonlHistory::open(&path).await {
		Ok(history) => history.list(&filter).await,
		Err(err) => Err(err),
	};

	match records {
		Ok(records) => {
			for record in records {
				match serde_json::to_string(&record) {
					Ok(line) => println!("{line}"),
					Err(err) => eprintln!("Failed to encode record {}: {err}", record.id),
				}
			}
			ExitCode::SUCCESS
		}
		Err(err) => {
			eprintln!("Error: {err}");
			ExitCode::FAILURE
		}
	}
}
