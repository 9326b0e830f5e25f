pub const DEFAULT_BOARD_SIZE: usize = 19;
pub const DEFAULT_HISTORY_STEPS: usize = 8;

pub const MIN_BOARD_SIZE: usize = 2;
pub const MAX_BOARD_SIZE: usize = 25;

pub const NUM_SYMMETRIES: usize = 8;

/// Number of cells on a board, which is also the index of the pass move.
pub const fn board_sq(board_size: usize) -> usize {
    board_size * board_size
}

/// Length of a move probability vector: one entry per cell plus pass.
pub const fn policy_size(board_size: usize) -> usize {
    board_sq(board_size) + 1
}

/// Feature planes of one example: the stone history of both sides plus the two color to move planes.
pub const fn input_channels(history_steps: usize) -> usize {
    history_steps * 2 + 2
}
