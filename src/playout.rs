//! Random rollouts for evaluating leaf positions.
//!
//! A rollout plays moves drawn uniformly from the candidate list (which the
//! board has already narrowed to the most urgent tier) until the game ends
//! or the step cap is reached. A truncated rollout counts as a draw.

use crate::constants::DRAW_REWARD;
use crate::grid::Side;
use crate::position::{GameState, GameStatus};

/// Play out `game` in place and return the reward for `side`:
/// 1 for a win, 0 for a loss, [`DRAW_REWARD`] otherwise.
pub fn rollout(game: &mut GameState, rng: &mut fastrand::Rng, side: Side, max_steps: usize) -> f32 {
    for _ in 0..max_steps {
        let Some(mv) = choose_move(game, rng) else {
            break;
        };
        if game.apply_move(mv).is_err() {
            break;
        }
    }
    reward(game.status(), side)
}

/// Uniform pick among the current candidates.
#[inline]
fn choose_move(game: &GameState, rng: &mut fastrand::Rng) -> Option<usize> {
    let candidates = game.candidates();
    if candidates.is_empty() {
        None
    } else {
        Some(candidates[rng.usize(..candidates.len())])
    }
}

/// Reward of a game status for `side`.
#[inline]
pub fn reward(status: GameStatus, side: Side) -> f32 {
    match status.winner() {
        Some(winner) if winner == side => 1.0,
        Some(_) => 0.0,
        None => DRAW_REWARD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Rules;
    use crate::position::parse_move;

    fn setup(moves: &[&str]) -> GameState {
        let mut game = GameState::with_rules(Rules::RENJU);
        for mv in moves {
            game.apply_move(parse_move(mv).unwrap()).unwrap();
        }
        game
    }

    #[test]
    fn test_reward_values() {
        assert_eq!(reward(GameStatus::BlackWin, Side::Black), 1.0);
        assert_eq!(reward(GameStatus::BlackWin, Side::White), 0.0);
        assert_eq!(reward(GameStatus::Draw, Side::White), DRAW_REWARD);
        assert_eq!(reward(GameStatus::Normal, Side::Black), DRAW_REWARD);
    }

    #[test]
    fn test_rollout_finishes_forced_win() {
        // Black has an open four and is to move: the only candidate wins.
        let mut game = setup(&["H4", "A1", "H5", "A3", "H6", "A5", "H7", "A7"]);
        let mut rng = fastrand::Rng::with_seed(1);
        let r = rollout(&mut game, &mut rng, Side::Black, 10);
        assert_eq!(r, 1.0);
        assert_eq!(game.status(), GameStatus::BlackWin);
        assert_eq!(game.turn(), 10);
    }

    #[test]
    fn test_rollout_respects_step_cap() {
        let mut game = setup(&["H8"]);
        let mut rng = fastrand::Rng::with_seed(3);
        let r = rollout(&mut game, &mut rng, Side::White, 0);
        assert_eq!(r, DRAW_REWARD);
        assert_eq!(game.turn(), 2);

        rollout(&mut game, &mut rng, Side::White, 4);
        assert!(game.turn() <= 6);
    }

    #[test]
    fn test_rollout_from_terminal_position() {
        let mut game = setup(&["H4", "A1", "H5", "A3", "H6", "A5", "H7", "A7", "H8"]);
        let mut rng = fastrand::Rng::with_seed(5);
        assert_eq!(rollout(&mut game, &mut rng, Side::White, 60), 0.0);
        assert_eq!(game.turn(), 10);
    }
}
