//! Line-based text protocol for playing against the engine.
//!
//! Each input line is a command with optional arguments. Replies start with
//! `=` on success or `?` on failure, followed by the response text and a
//! blank line.
//!
//! ## Supported Commands
//!
//! - `name`, `version`, `list_commands`, `known_command <cmd>`
//! - `new` - Start a new game
//! - `play <move>` - Play a move for the side to move, e.g. `play H8`
//! - `genmove [seconds]` - Search and play the engine's move
//! - `random` - Play a random empty cell
//! - `undo [n]` - Take back `n` moves (default 1)
//! - `show` - Print the board
//! - `state` - Print the game status
//! - `candidates` - List the moves the search would consider
//! - `quit` - Exit
//!
//! With auto-reply enabled the engine answers every accepted `play` with
//! its own move.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::mcts::{Mcts, SearchConfig};
use crate::patterns::LinePatternTable;
use crate::position::{GameState, format_move, parse_move};

const KNOWN_COMMANDS: &[&str] = &[
    "candidates",
    "genmove",
    "known_command",
    "list_commands",
    "name",
    "new",
    "play",
    "quit",
    "random",
    "show",
    "state",
    "undo",
    "version",
];

/// Game plus search engine driven by text commands.
pub struct ConsoleEngine {
    game: GameState,
    mcts: Mcts,
    rng: fastrand::Rng,
    auto_reply: bool,
}

impl ConsoleEngine {
    pub fn new(table: Arc<LinePatternTable>, config: SearchConfig) -> Self {
        let rng = config.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Self {
            game: GameState::new(table),
            mcts: Mcts::new(config),
            rng,
            auto_reply: false,
        }
    }

    /// Answer each accepted `play` with an engine move.
    pub fn with_auto_reply(mut self, auto_reply: bool) -> Self {
        self.auto_reply = auto_reply;
        self
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(command) = parts.next() else {
                continue;
            };
            let command = command.to_lowercase();
            let args: Vec<&str> = parts.collect();

            let (success, message) = self.execute(&command, &args);
            let prefix = if success { '=' } else { '?' };
            writeln!(output, "{prefix} {message}\n")?;
            output.flush()?;

            if command == "quit" {
                break;
            }
        }
        Ok(())
    }

    /// Execute one command and return (success, response).
    pub fn execute(&mut self, command: &str, args: &[&str]) -> (bool, String) {
        match command {
            "name" => (true, env!("CARGO_PKG_NAME").to_string()),

            "version" => (true, env!("CARGO_PKG_VERSION").to_string()),

            "list_commands" => (true, KNOWN_COMMANDS.join("\n")),

            "known_command" => match args.first() {
                Some(cmd) => {
                    let known = KNOWN_COMMANDS.contains(&cmd.to_lowercase().as_str());
                    (true, known.to_string())
                }
                None => (false, "missing argument".to_string()),
            },

            "quit" => (true, String::new()),

            "new" => {
                self.game.reset();
                self.mcts.reset();
                (true, String::new())
            }

            "play" => {
                let Some(text) = args.first() else {
                    return (false, "missing argument".to_string());
                };
                let Some(id) = parse_move(text) else {
                    return (false, format!("cannot parse move '{text}'"));
                };
                if let Err(err) = self.game.apply_move(id) {
                    return (false, err.to_string());
                }
                if self.auto_reply && !self.game.is_over() {
                    return self.genmove(None);
                }
                (true, self.status_line())
            }

            "genmove" => match args.first().map(|s| s.parse::<f64>()) {
                None => self.genmove(None),
                Some(Ok(secs)) if secs.is_finite() && secs > 0.0 => {
                    self.genmove(Some(Duration::from_secs_f64(secs)))
                }
                Some(_) => (false, "invalid time".to_string()),
            },

            "random" => match self.game.apply_random_move(&mut self.rng) {
                Some(id) => (true, format_move(id)),
                None => (false, "the game is already over".to_string()),
            },

            "undo" => {
                let steps = match args.first().map(|s| s.parse::<usize>()) {
                    None => 1,
                    Some(Ok(n)) => n,
                    Some(Err(_)) => return (false, "invalid count".to_string()),
                };
                self.game.undo(steps);
                (true, String::new())
            }

            "show" => (true, format!("\n{}", self.game)),

            "state" => (true, self.game.status().to_string()),

            "candidates" => {
                let moves: Vec<String> =
                    self.game.candidates().iter().map(|&id| format_move(id)).collect();
                (true, moves.join(" "))
            }

            _ => (false, "unknown command".to_string()),
        }
    }

    fn genmove(&mut self, budget: Option<Duration>) -> (bool, String) {
        let found = match budget {
            Some(budget) => self.mcts.search_within(&self.game, budget),
            None => self.mcts.search(&self.game),
        };
        let Some(id) = found else {
            return (false, "the game is already over".to_string());
        };
        match self.game.apply_move(id) {
            Ok(()) => (true, format!("{} {}", format_move(id), self.status_line())),
            Err(err) => (false, err.to_string()),
        }
    }

    fn status_line(&self) -> String {
        if self.game.is_over() {
            self.game.status().to_string()
        } else {
            String::new()
        }
    }
}
