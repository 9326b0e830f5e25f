use go::{board_sq, input_channels, policy_size};

use super::error::RecordError;
use super::example::TrainingExample;

/// Serialized records decoded into the flat float tensors the training loop feeds on.
/// Planes are cast from bytes to floats.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrainingBatch {
    pub x: Vec<f32>,
    pub yp: Vec<f32>,
    pub yv: Vec<f32>,
}

impl TrainingBatch {
    pub fn from_records<B: AsRef<[u8]>>(
        records: &[B],
        board_size: usize,
        history_steps: usize,
    ) -> Result<Self, RecordError> {
        let num_records = records.len();
        let mut x = Vec::with_capacity(num_records * input_channels(history_steps) * board_sq(board_size));
        let mut yp = Vec::with_capacity(num_records * policy_size(board_size));
        let mut yv = Vec::with_capacity(num_records);

        for record in records {
            let example = TrainingExample::from_bytes(record.as_ref(), board_size, history_steps)?;
            x.extend(example.planes.iter().map(|&v| v as f32));
            yp.extend_from_slice(&example.probabilities);
            yv.push(example.winner);
        }

        Ok(Self { x, yp, yv })
    }

    pub fn len(&self) -> usize {
        self.yv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.yv.is_empty()
    }
}
