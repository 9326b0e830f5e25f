use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use go::{board_sq, input_channels, policy_size, BoardHistory, Color, Game, SymmetryTables};

use super::error::RecordError;

/// One training position. Planes are `(2H + 2) x N²` bytes: H planes of the mover's
/// stones (most recent first), H planes of the opponent's, then the two color to move planes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub planes: Vec<u8>,
    pub probabilities: Vec<f32>,
    pub winner: f32,
}

impl TrainingExample {
    /// Size in bytes of a serialized record. Independent of the symmetry applied.
    pub fn record_len(board_size: usize, history_steps: usize) -> usize {
        input_channels(history_steps) * board_sq(board_size) + (policy_size(board_size) + 1) * 4
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.planes.len() + (self.probabilities.len() + 1) * 4);
        self.write_to(&mut bytes);
        bytes
    }

    /// Appends `[planes][probabilities f32le][winner f32le]`.
    pub fn write_to(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.planes);
        write_f32s(bytes, &self.probabilities);
        write_f32s(bytes, &[self.winner]);
    }

    pub fn from_bytes(
        bytes: &[u8],
        board_size: usize,
        history_steps: usize,
    ) -> Result<Self, RecordError> {
        let expected = Self::record_len(board_size, history_steps);
        if bytes.len() != expected {
            return Err(RecordError::BadLength {
                expected,
                actual: bytes.len(),
            });
        }

        let planes_len = input_channels(history_steps) * board_sq(board_size);
        let (planes, rest) = bytes.split_at(planes_len);
        let (probabilities, winner) = rest.split_at(policy_size(board_size) * 4);

        let mut probs = vec![0.0; policy_size(board_size)];
        LittleEndian::read_f32_into(probabilities, &mut probs);

        Ok(Self {
            planes: planes.to_vec(),
            probabilities: probs,
            winner: LittleEndian::read_f32(winner),
        })
    }
}

fn write_f32s(bytes: &mut Vec<u8>, values: &[f32]) {
    let start = bytes.len();
    bytes.resize(start + values.len() * 4, 0);
    LittleEndian::write_f32_into(values, &mut bytes[start..]);
}

/// Turns a replayed game into symmetry transformed training examples.
#[derive(Clone)]
pub struct ExampleEncoder {
    tables: Arc<SymmetryTables>,
}

impl ExampleEncoder {
    pub fn new(tables: Arc<SymmetryTables>) -> Self {
        Self { tables }
    }

    pub fn board_size(&self) -> usize {
        self.tables.board_size()
    }

    pub fn history_steps(&self) -> usize {
        self.tables.history_steps()
    }

    pub fn record_len(&self) -> usize {
        TrainingExample::record_len(self.board_size(), self.history_steps())
    }

    /// Encodes `step` of `game` under `symmetry`.
    ///
    /// `history` must be the replay of `game` on this encoder's board size, `step` must be
    /// a step of the game and every probability vector must hold N²+1 entries. The
    /// archive reader only produces games that satisfy this.
    pub fn encode(
        &self,
        game: &Game,
        history: &BoardHistory,
        step: usize,
        symmetry: usize,
    ) -> TrainingExample {
        debug_assert_eq!(
            history.board_size(),
            self.board_size(),
            "History was replayed on a different board size"
        );
        debug_assert_eq!(history.len(), game.len(), "History is not a replay of this game");
        debug_assert!(
            step < game.len(),
            "Step {} is out of range for a game of {} steps",
            step,
            game.len()
        );
        debug_assert_eq!(
            game.step(step).probabilities.len(),
            policy_size(self.board_size()),
            "Probabilities of step {} have the wrong length",
            step
        );

        let board_sq = board_sq(self.board_size());
        let history_steps = self.history_steps();

        let to_move = Color::to_move(step);
        let history_planes = self.history_planes(history, step, to_move);

        let mut planes = vec![0u8; input_channels(history_steps) * board_sq];
        let (stones, color_planes) = planes.split_at_mut(history_planes.len());
        self.tables.remap_planes(symmetry, &history_planes, stones);

        // The color planes are uniform, so no symmetry needs to be applied.
        let (first, second) = color_planes.split_at_mut(board_sq);
        first.copy_from_slice(self.tables.flat_plane(to_move.is_black()));
        second.copy_from_slice(self.tables.flat_plane(!to_move.is_black()));

        let step_probabilities = &game.step(step).probabilities;
        let mut probabilities = vec![0.0; step_probabilities.len()];
        self.tables
            .remap_probabilities(symmetry, step_probabilities, &mut probabilities);

        TrainingExample {
            planes,
            probabilities,
            winner: game.winner_for_step(step),
        }
    }

    /// Encodes and serializes in one go, appending the record to `bytes`.
    pub fn encode_into(
        &self,
        game: &Game,
        history: &BoardHistory,
        step: usize,
        symmetry: usize,
        bytes: &mut Vec<u8>,
    ) {
        self.encode(game, history, step, symmetry).write_to(bytes);
    }

    /// The last H snapshots of the mover followed by the last H of the opponent,
    /// walking back from `step`. Positions before the start of the game are empty.
    fn history_planes(&self, history: &BoardHistory, step: usize, to_move: Color) -> Vec<u8> {
        let board_sq = board_sq(self.board_size());
        let history_steps = self.history_steps();
        let mut planes = vec![0u8; history_steps * 2 * board_sq];

        for (side_idx, color) in [to_move, to_move.opposite()].into_iter().enumerate() {
            for h in 0..history_steps.min(step + 1) {
                let plane = side_idx * history_steps + h;
                planes[plane * board_sq..(plane + 1) * board_sq]
                    .copy_from_slice(history.snapshot(color, step - h));
            }
        }

        planes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use go::{Move, Step, NUM_SYMMETRIES};

    fn encoder(board_size: usize, history_steps: usize) -> ExampleEncoder {
        ExampleEncoder::new(Arc::new(SymmetryTables::new(board_size, history_steps)))
    }

    fn two_step_game() -> Game {
        Game::new(
            1,
            vec![
                Step::one_hot(Move::Place(0), vec![], 19),
                Step::one_hot(Move::Place(1), vec![], 19),
            ],
        )
    }

    fn plane(example: &TrainingExample, idx: usize, board_sq: usize) -> &[u8] {
        &example.planes[idx * board_sq..(idx + 1) * board_sq]
    }

    #[test]
    fn test_first_step_has_only_color_planes() {
        let game = two_step_game();
        let history = BoardHistory::replay(&game, 19);
        let example = encoder(19, 8).encode(&game, &history, 0, 0);

        assert_eq!(example.planes.len(), 18 * 361);
        assert!(example.planes[..16 * 361].iter().all(|&v| v == 0));
        assert!(plane(&example, 16, 361).iter().all(|&v| v == 1));
        assert!(plane(&example, 17, 361).iter().all(|&v| v == 0));
        assert_eq!(example.winner, 1.0);
        assert_eq!(example.probabilities[0], 1.0);
    }

    #[test]
    fn test_second_step_is_from_white_perspective() {
        let game = two_step_game();
        let history = BoardHistory::replay(&game, 19);
        let example = encoder(19, 8).encode(&game, &history, 1, 0);

        assert_eq!(example.winner, -1.0);

        // Mover is white with no stones; the opponent's latest plane holds black's stone.
        assert!(plane(&example, 0, 361).iter().all(|&v| v == 0));
        assert_eq!(plane(&example, 8, 361)[0], 1);
        assert_eq!(plane(&example, 8, 361).iter().map(|&v| v as usize).sum::<usize>(), 1);
        assert!(plane(&example, 9, 361).iter().all(|&v| v == 0));

        assert!(plane(&example, 16, 361).iter().all(|&v| v == 0));
        assert!(plane(&example, 17, 361).iter().all(|&v| v == 1));
        assert_eq!(example.probabilities[1], 1.0);
    }

    #[test]
    fn test_history_walks_backward() {
        let steps = (0..4)
            .map(|i| Step::one_hot(Move::Place(i), vec![], 3))
            .collect::<Vec<_>>();
        let game = Game::new(0, steps);
        let history = BoardHistory::replay(&game, 3);
        let example = encoder(3, 2).encode(&game, &history, 3, 0);

        // White to move at step 3 with stones on 1; black has 0 and 2.
        assert_eq!(plane(&example, 0, 9), &[0, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(plane(&example, 1, 9), &[0, 1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(plane(&example, 2, 9), &[1, 0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(plane(&example, 3, 9), &[1, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_symmetry_moves_stones_and_policy_together() {
        let game = two_step_game();
        let history = BoardHistory::replay(&game, 19);
        let example = encoder(19, 8).encode(&game, &history, 1, 1);

        // Mirroring x gathers cell 18 from cell 0.
        assert_eq!(plane(&example, 8, 361)[18], 1);
        assert_eq!(plane(&example, 8, 361)[0], 0);
        assert_eq!(example.probabilities[17], 1.0);
    }

    #[test]
    fn test_pass_probability_survives_symmetry() {
        let game = Game::new(1, vec![Step::one_hot(Move::Pass, vec![], 19)]);
        let history = BoardHistory::replay(&game, 19);
        let encoder = encoder(19, 8);
        for symmetry in 0..NUM_SYMMETRIES {
            let example = encoder.encode(&game, &history, 0, symmetry);
            assert_eq!(example.probabilities[361], 1.0);
        }
    }

    #[test]
    fn test_record_length_is_fixed() {
        let game = two_step_game();
        let history = BoardHistory::replay(&game, 19);
        let encoder = encoder(19, 8);
        assert_eq!(encoder.record_len(), 18 * 361 + 362 * 4 + 4);

        for symmetry in 0..NUM_SYMMETRIES {
            let mut bytes = vec![];
            encoder.encode_into(&game, &history, 1, symmetry, &mut bytes);
            assert_eq!(bytes.len(), encoder.record_len());
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let game = two_step_game();
        let history = BoardHistory::replay(&game, 19);
        let encoder = encoder(19, 8);
        assert_eq!(
            encoder.encode(&game, &history, 1, 6).to_bytes(),
            encoder.encode(&game, &history, 1, 6).to_bytes()
        );
    }

    #[test]
    fn test_record_layout() {
        let example = TrainingExample {
            planes: vec![1; 4 * 4],
            probabilities: vec![0.25, 0.5, 0.0, 0.0, 0.25],
            winner: -1.0,
        };

        let bytes = example.to_bytes();
        assert_eq!(bytes.len(), TrainingExample::record_len(2, 1));
        assert_eq!(&bytes[16..20], &0.25f32.to_le_bytes());
        assert_eq!(&bytes[bytes.len() - 4..], &(-1.0f32).to_le_bytes());
        assert_eq!(TrainingExample::from_bytes(&bytes, 2, 1).unwrap(), example);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_encode_step_past_end_of_game() {
        let game = two_step_game();
        let history = BoardHistory::replay(&game, 19);
        encoder(19, 8).encode(&game, &history, 2, 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "different board size")]
    fn test_encode_history_of_other_board_size() {
        let game = Game::new(1, vec![Step::one_hot(Move::Place(0), vec![], 9)]);
        let history = BoardHistory::replay(&game, 9);
        encoder(19, 8).encode(&game, &history, 0, 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "wrong length")]
    fn test_encode_short_probabilities() {
        let game = Game::new(1, vec![Step::new(Move::Place(0), vec![], vec![1.0])]);
        let history = BoardHistory::replay(&game, 19);
        encoder(19, 8).encode(&game, &history, 0, 0);
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let res = TrainingExample::from_bytes(&[0; 10], 19, 8);
        assert_eq!(
            res,
            Err(RecordError::BadLength {
                expected: 18 * 361 + 363 * 4,
                actual: 10
            })
        );
    }
}
