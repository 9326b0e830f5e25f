use super::color::Color;
use super::constants::board_sq;
use super::game::{Game, Move};

/// Occupancy snapshots of both colors, one per step. Snapshot `t` is the board
/// before the move of step `t` was played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardHistory {
    board_size: usize,
    black: Vec<Vec<u8>>,
    white: Vec<Vec<u8>>,
}

impl BoardHistory {
    /// Replays every move of the game. Capture positions are expected to be on the board.
    pub fn replay(game: &Game, board_size: usize) -> Self {
        let board_sq = board_sq(board_size);
        let mut blacks = vec![0u8; board_sq];
        let mut whites = vec![0u8; board_sq];
        let mut black = Vec::with_capacity(game.len());
        let mut white = Vec::with_capacity(game.len());

        let mut to_move = Color::Black;
        for step in game.steps() {
            black.push(blacks.clone());
            white.push(whites.clone());

            let (my_side, opp_side) = match to_move {
                Color::Black => (&mut blacks, &mut whites),
                Color::White => (&mut whites, &mut blacks),
            };

            if let Move::Place(vertex) = step.action {
                my_side[vertex] = 1;
            }

            for &capture in &step.captures {
                opp_side[capture as usize] = 0;
            }

            to_move = to_move.opposite();
        }

        Self {
            board_size,
            black,
            white,
        }
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    pub fn len(&self) -> usize {
        self.black.len()
    }

    pub fn is_empty(&self) -> bool {
        self.black.is_empty()
    }

    pub fn side(&self, color: Color) -> &[Vec<u8>] {
        match color {
            Color::Black => &self.black,
            Color::White => &self.white,
        }
    }

    pub fn snapshot(&self, color: Color, step: usize) -> &[u8] {
        &self.side(color)[step]
    }
}
