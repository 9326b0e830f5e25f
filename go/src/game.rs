use super::constants::{board_sq, policy_size};

/// A single move: either a stone placed on a cell or a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Place(usize),
    Pass,
}

impl Move {
    /// Maps a board position index to a move. The index one past the last cell is pass,
    /// anything beyond that is not a move.
    pub fn from_position(position: usize, board_size: usize) -> Option<Self> {
        let board_sq = board_sq(board_size);
        match position {
            p if p < board_sq => Some(Move::Place(p)),
            p if p == board_sq => Some(Move::Pass),
            _ => None,
        }
    }

    pub fn position(&self, board_size: usize) -> usize {
        match self {
            Move::Place(vertex) => *vertex,
            Move::Pass => board_sq(board_size),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Move::Pass)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub action: Move,
    /// Cells cleared from the opponent's side after the move.
    pub captures: Vec<u16>,
    pub probabilities: Vec<f32>,
}

impl Step {
    pub fn new(action: Move, captures: Vec<u16>, probabilities: Vec<f32>) -> Self {
        Self {
            action,
            captures,
            probabilities,
        }
    }

    /// A step whose distribution puts all of the mass on the move that was played.
    pub fn one_hot(action: Move, captures: Vec<u16>, board_size: usize) -> Self {
        let mut probabilities = vec![0.0; policy_size(board_size)];
        probabilities[action.position(board_size)] = 1.0;

        Self::new(action, captures, probabilities)
    }
}

/// A decoded self-play game. The result is from black's perspective: 1 black won, -1 white won, 0 draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    result: i8,
    steps: Vec<Step>,
}

impl Game {
    pub fn new(result: i8, steps: Vec<Step>) -> Self {
        Self { result, steps }
    }

    pub fn result(&self) -> i8 {
        self.result
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, step: usize) -> &Step {
        &self.steps[step]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The result seen by the player to move at `step`.
    pub fn winner_for_step(&self, step: usize) -> f32 {
        if step % 2 == 0 {
            self.result as f32
        } else {
            (-self.result) as f32
        }
    }
}
