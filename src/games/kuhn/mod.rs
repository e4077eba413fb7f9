//! Kuhn poker.
//!
//! The smallest non-trivial poker: each player antes one chip and is dealt a
//! single card from a deck of three (Jack < Queen < King, hands 0 < 1 < 2).
//! Player 0 acts first; the actions are *pass* (check/fold) and *bet*
//! (bet/call), with a fixed bet size of one chip. Possible lines:
//!
//! - `pass pass` — showdown for the antes
//! - `bet pass` — player 1 folds, player 0 wins 1
//! - `bet bet` — call, showdown for 2
//! - `pass bet pass` — player 0 folds, loses 1
//! - `pass bet bet` — call, showdown for 2
//!
//! Kuhn poker has a known family of equilibria (the first player bluffs with
//! the Jack at one third of the King's betting rate, the Queen never bets,
//! game value -1/18 for player 0), which makes it the standard correctness
//! fixture for solver code.
//!
//! The deck size is configurable; sizes above 3 keep the same betting
//! structure over a larger card range.

use crate::cfr::game::{Action, Game, GameError, PublicState};

/// Pass (check when the pot is matched, fold when facing a bet).
pub const ACTION_PASS: Action = 0;
/// Bet (open when the pot is matched, call when facing a bet).
pub const ACTION_BET: Action = 1;

/// Two-player Kuhn poker with a configurable deck size.
#[derive(Debug, Clone)]
pub struct KuhnPoker {
    deck_size: usize,
    ante: u32,
}

impl Default for KuhnPoker {
    fn default() -> Self {
        Self {
            deck_size: 3,
            ante: 1,
        }
    }
}

impl KuhnPoker {
    /// Kuhn poker over `deck_size` cards.
    pub fn new(deck_size: usize) -> Self {
        assert!(deck_size >= 2, "kuhn poker needs at least two cards");
        Self {
            deck_size,
            ante: 1,
        }
    }

    /// Builder method: set the per-player ante. Larger antes scale the
    /// stakes without changing the betting structure (the bet stays one
    /// chip).
    pub fn with_ante(mut self, ante: u32) -> Self {
        assert!(ante >= 1, "kuhn poker needs a positive ante");
        self.ante = ante;
        self
    }

    /// The player who took the last action (the one *not* to act).
    fn last_actor(state: &PublicState) -> usize {
        state.opponent()
    }
}

impl Game for KuhnPoker {
    fn num_actions(&self) -> usize {
        2
    }

    fn num_hands(&self) -> usize {
        self.deck_size
    }

    fn initial_state(&self) -> PublicState {
        PublicState {
            last_action: None,
            player_id: 0,
            bets: [self.ante, self.ante],
            round: 0,
        }
    }

    fn is_terminal(&self, state: &PublicState) -> bool {
        if state.round < 2 {
            return false;
        }
        // After two moves the game ends unless the line is "pass bet":
        // a trailing pass always ends it, and matched bets mean a call.
        state.last_action == Some(ACTION_PASS) || state.bets[0] == state.bets[1]
    }

    fn legal_actions(&self, _state: &PublicState) -> Vec<Action> {
        vec![ACTION_PASS, ACTION_BET]
    }

    fn transition(&self, state: &PublicState, action: Action) -> Result<PublicState, GameError> {
        if action > ACTION_BET || self.is_terminal(state) {
            return Err(GameError::InvalidAction {
                action,
                state: *state,
            });
        }

        let mut bets = state.bets;
        if action == ACTION_BET {
            // Matched pot: open for one chip. Unmatched: call.
            bets[state.player_id] = bets[0].max(bets[1])
                + if bets[0] == bets[1] { 1 } else { 0 };
        }
        Ok(PublicState {
            last_action: Some(action),
            player_id: state.opponent(),
            bets,
            round: state.round + 1,
        })
    }

    fn terminal_value(&self, state: &PublicState, hand0: usize, hand1: usize) -> f64 {
        // Both players holding the same card is an impossible deal.
        if hand0 == hand1 {
            return 0.0;
        }

        if state.bets[0] != state.bets[1] {
            // Unmatched pot at a terminal state means the last pass was a
            // fold; the folder forfeits their contribution.
            return if Self::last_actor(state) == 0 {
                -f64::from(state.bets[0])
            } else {
                f64::from(state.bets[1])
            };
        }

        // Showdown: the higher card takes the matched stake.
        let stake = f64::from(state.bets[0]);
        if hand0 > hand1 {
            stake
        } else {
            -stake
        }
    }

    fn action_name(&self, action: Action) -> String {
        match action {
            ACTION_PASS => "pass".to_string(),
            ACTION_BET => "bet".to_string(),
            other => format!("a{}", other),
        }
    }

    fn state_description(&self, state: &PublicState) -> String {
        format!(
            "round {} pot {}+{} player {} to act",
            state.round, state.bets[0], state.bets[1], state.player_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk a betting line from the root.
    fn play(game: &KuhnPoker, line: &[Action]) -> PublicState {
        let mut state = game.initial_state();
        for &action in line {
            state = game.transition(&state, action).unwrap();
        }
        state
    }

    #[test]
    fn test_terminal_detection() {
        let game = KuhnPoker::default();
        let terminal: [&[Action]; 5] = [
            &[ACTION_PASS, ACTION_PASS],
            &[ACTION_BET, ACTION_PASS],
            &[ACTION_BET, ACTION_BET],
            &[ACTION_PASS, ACTION_BET, ACTION_PASS],
            &[ACTION_PASS, ACTION_BET, ACTION_BET],
        ];
        for line in terminal {
            assert!(game.is_terminal(&play(&game, line)), "line {:?}", line);
        }

        let ongoing: [&[Action]; 4] = [
            &[],
            &[ACTION_PASS],
            &[ACTION_BET],
            &[ACTION_PASS, ACTION_BET],
        ];
        for line in ongoing {
            assert!(!game.is_terminal(&play(&game, line)), "line {:?}", line);
        }
    }

    #[test]
    fn test_showdown_payoffs() {
        let game = KuhnPoker::default();

        // pass pass: antes only, higher card wins 1.
        let pp = play(&game, &[ACTION_PASS, ACTION_PASS]);
        assert_eq!(game.terminal_value(&pp, 2, 0), 1.0);
        assert_eq!(game.terminal_value(&pp, 0, 2), -1.0);

        // bet bet and pass bet bet: called pots, winner takes 2.
        let bb = play(&game, &[ACTION_BET, ACTION_BET]);
        assert_eq!(game.terminal_value(&bb, 1, 0), 2.0);
        assert_eq!(game.terminal_value(&bb, 0, 1), -2.0);

        let pbb = play(&game, &[ACTION_PASS, ACTION_BET, ACTION_BET]);
        assert_eq!(game.terminal_value(&pbb, 2, 1), 2.0);
        assert_eq!(game.terminal_value(&pbb, 1, 2), -2.0);
    }

    #[test]
    fn test_fold_payoffs_ignore_cards() {
        let game = KuhnPoker::default();

        // bet pass: player 1 folds, player 0 wins the ante regardless of
        // holdings.
        let bp = play(&game, &[ACTION_BET, ACTION_PASS]);
        assert_eq!(game.terminal_value(&bp, 0, 2), 1.0);
        assert_eq!(game.terminal_value(&bp, 2, 0), 1.0);

        // pass bet pass: player 0 folds and loses the ante.
        let pbp = play(&game, &[ACTION_PASS, ACTION_BET, ACTION_PASS]);
        assert_eq!(game.terminal_value(&pbp, 2, 0), -1.0);
    }

    #[test]
    fn test_impossible_deal_scores_zero() {
        let game = KuhnPoker::default();
        let bb = play(&game, &[ACTION_BET, ACTION_BET]);
        for hand in 0..3 {
            assert_eq!(game.terminal_value(&bb, hand, hand), 0.0);
        }
    }

    #[test]
    fn test_pot_accounting() {
        let game = KuhnPoker::default();
        assert_eq!(play(&game, &[ACTION_BET]).bets, [2, 1]);
        assert_eq!(play(&game, &[ACTION_BET, ACTION_BET]).bets, [2, 2]);
        assert_eq!(play(&game, &[ACTION_PASS, ACTION_BET]).bets, [1, 2]);
        assert_eq!(
            play(&game, &[ACTION_PASS, ACTION_BET, ACTION_BET]).bets,
            [2, 2]
        );
        assert_eq!(
            play(&game, &[ACTION_PASS, ACTION_PASS]).bets,
            [1, 1]
        );
    }

    #[test]
    fn test_invalid_action_rejected() {
        let game = KuhnPoker::default();
        let root = game.initial_state();
        assert!(game.transition(&root, 5).is_err());

        let done = play(&game, &[ACTION_BET, ACTION_PASS]);
        assert!(game.transition(&done, ACTION_PASS).is_err());
    }

    #[test]
    fn test_larger_ante() {
        let game = KuhnPoker::new(3).with_ante(2);
        assert_eq!(game.initial_state().bets, [2, 2]);

        // A bet is still one chip on top of the matched pot.
        assert_eq!(play(&game, &[ACTION_BET]).bets, [3, 2]);
        assert_eq!(play(&game, &[ACTION_BET, ACTION_BET]).bets, [3, 3]);

        // Showdowns pay the matched stake, folds forfeit the contribution.
        let pp = play(&game, &[ACTION_PASS, ACTION_PASS]);
        assert_eq!(game.terminal_value(&pp, 2, 0), 2.0);
        let bb = play(&game, &[ACTION_BET, ACTION_BET]);
        assert_eq!(game.terminal_value(&bb, 0, 2), -3.0);
        let bp = play(&game, &[ACTION_BET, ACTION_PASS]);
        assert_eq!(game.terminal_value(&bp, 0, 2), 2.0);
        let pbp = play(&game, &[ACTION_PASS, ACTION_BET, ACTION_PASS]);
        assert_eq!(game.terminal_value(&pbp, 2, 0), -2.0);
    }

    #[test]
    fn test_larger_deck() {
        let game = KuhnPoker::new(10);
        assert_eq!(game.num_hands(), 10);
        let bb = play(&game, &[ACTION_BET, ACTION_BET]);
        assert_eq!(game.terminal_value(&bb, 9, 3), 2.0);
        assert_eq!(game.terminal_value(&bb, 4, 4), 0.0);
    }
}
