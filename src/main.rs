//! Gobang: a Gomoku MCTS engine.
//!
//! ## Usage
//!
//! - `gobang` / `gobang play` - Play against the engine in the terminal
//! - `gobang play --engine-first` - Let the engine open as black
//! - `gobang selfplay` - Watch the engine play itself
//! - `gobang console` - Line protocol for scripts and front ends

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use gobang_mcts::console::ConsoleEngine;
use gobang_mcts::constants::{EXPLORATION, GRID_NUM};
use gobang_mcts::mcts::{Mcts, SearchConfig};
use gobang_mcts::patterns::{LinePatternTable, Rules};
use gobang_mcts::position::{GameState, format_move, parse_move};

/// Gobang: a Gomoku engine using Monte Carlo Tree Search
#[derive(Parser)]
#[command(name = "gobang")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Seconds per engine move
    #[arg(long, global = true, default_value_t = 5.0)]
    time: f64,

    /// Search threads (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Disable the renju restrictions on black
    #[arg(long, global = true)]
    free_style: bool,

    /// UCB1 exploration constant
    #[arg(long, global = true, default_value_t = EXPLORATION)]
    exploration: f32,

    /// Seed for reproducible searches
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Log filter (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play against the engine
    Play {
        /// Engine plays black and moves first
        #[arg(long)]
        engine_first: bool,
    },
    /// Let the engine play both sides
    Selfplay {
        /// Stop after this many moves
        #[arg(long, default_value_t = GRID_NUM)]
        max_moves: usize,
    },
    /// Run the text protocol on stdin/stdout
    Console,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, cli.log_level.as_str()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    let config = search_config(&cli)?;
    let rules = if cli.free_style { Rules::FREE_STYLE } else { Rules::RENJU };
    log::debug!("building line pattern table ({rules:?})");
    let table = Arc::new(LinePatternTable::new(rules));

    match cli.command {
        Some(Commands::Console) => {
            let mut engine = ConsoleEngine::new(table, config);
            engine.run(io::stdin().lock(), io::stdout().lock())?;
        }
        Some(Commands::Selfplay { max_moves }) => run_selfplay(table, config, max_moves)?,
        Some(Commands::Play { engine_first }) => run_play(table, config, engine_first)?,
        None => run_play(table, config, false)?,
    }
    Ok(())
}

fn search_config(cli: &Cli) -> Result<SearchConfig> {
    if !cli.time.is_finite() || cli.time <= 0.0 {
        bail!("--time must be a positive number of seconds, got {}", cli.time);
    }
    if !cli.exploration.is_finite() || cli.exploration < 0.0 {
        bail!("--exploration must be a non-negative number, got {}", cli.exploration);
    }
    let mut config = SearchConfig::default()
        .with_time_budget(Duration::from_secs_f64(cli.time))
        .with_exploration(cli.exploration);
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    Ok(config)
}

fn run_play(table: Arc<LinePatternTable>, config: SearchConfig, engine_first: bool) -> Result<()> {
    let mut engine = ConsoleEngine::new(table, config).with_auto_reply(true);
    let mut stdout = io::stdout().lock();

    if engine_first {
        let (_, reply) = engine.execute("genmove", &[]);
        writeln!(stdout, "engine: {reply}")?;
    }
    writeln!(stdout, "{}", engine.game())?;
    writeln!(stdout, "Enter a move such as H8, or a command (undo 2, show, quit).")?;

    for line in io::stdin().lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, args): (&str, Vec<&str>) = if parse_move(line).is_some() {
            ("play", vec![line])
        } else {
            let mut parts = line.split_whitespace();
            (parts.next().unwrap_or_default(), parts.collect())
        };
        if command == "quit" {
            break;
        }

        let played_before = engine.game().history().len();
        let (success, message) = engine.execute(command, &args);
        if !success {
            writeln!(stdout, "? {message}")?;
            continue;
        }
        let engine_moved = command == "play" && engine.game().history().len() == played_before + 2;
        if let Some(line) = reply_line(&message, engine_moved) {
            writeln!(stdout, "{line}")?;
        }
        writeln!(stdout, "{}", engine.game())?;

        if engine.game().is_over() {
            writeln!(stdout, "Game over: {}", engine.game().status())?;
            break;
        }
    }
    Ok(())
}

/// Line to print after a command; only a generated reply is credited to the engine.
fn reply_line(message: &str, engine_moved: bool) -> Option<String> {
    if engine_moved {
        Some(format!("engine: {message}"))
    } else if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

fn run_selfplay(table: Arc<LinePatternTable>, config: SearchConfig, max_moves: usize) -> Result<()> {
    let mut game = GameState::new(table);
    let mut mcts = Mcts::new(config);

    while !game.is_over() && game.history().len() < max_moves {
        let Some(mv) = mcts.search(&game) else {
            break;
        };
        let side = game.side();
        game.apply_move(mv)
            .with_context(|| format!("engine chose an invalid move {}", format_move(mv)))?;
        let stats = mcts.last_stats();
        println!(
            "{:>3}. {side} {} ({} sims, win rate {:.3})",
            game.history().len(),
            format_move(mv),
            stats.simulations,
            stats.win_rate
        );
    }

    println!("{game}");
    println!("Result: {}", game.status());
    Ok(())
}
