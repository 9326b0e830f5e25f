use super::constants::{board_sq, NUM_SYMMETRIES};

/// Remaps a board cell according to one of the 8 symmetries of the square.
/// Symmetries 4-7 transpose first; bit 0 of `symmetry % 4` then mirrors x and bit 1 mirrors y.
pub fn remap_vertex(vertex: usize, symmetry: usize, board_size: usize) -> usize {
    assert!(vertex < board_sq(board_size), "Vertex {} is off the board", vertex);
    assert!(symmetry < NUM_SYMMETRIES, "Symmetry {} is out of range", symmetry);

    let mut x = vertex % board_size;
    let mut y = vertex / board_size;
    let mut symmetry = symmetry;

    if symmetry >= 4 {
        std::mem::swap(&mut x, &mut y);
        symmetry -= 4;
    }

    if symmetry == 1 || symmetry == 3 {
        x = board_size - x - 1;
    }

    if symmetry == 2 || symmetry == 3 {
        y = board_size - y - 1;
    }

    y * board_size + x
}

/// Gather tables for every symmetry, computed once and shared read-only between workers.
#[derive(Debug, Clone)]
pub struct SymmetryTables {
    board_size: usize,
    history_steps: usize,
    position_tables: Vec<Vec<usize>>,
    plane_tables: Vec<Vec<usize>>,
    flat_planes: [Vec<u8>; 2],
}

impl SymmetryTables {
    pub fn new(board_size: usize, history_steps: usize) -> Self {
        let board_sq = board_sq(board_size);
        let num_planes = history_steps * 2;

        // The last element is pass, which every symmetry leaves in place.
        let position_tables = (0..NUM_SYMMETRIES)
            .map(|symmetry| {
                (0..board_sq)
                    .map(|vertex| remap_vertex(vertex, symmetry, board_size))
                    .chain(std::iter::once(board_sq))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let plane_tables = position_tables
            .iter()
            .map(|table| {
                (0..num_planes)
                    .flat_map(|plane| table[..board_sq].iter().map(move |v| v + plane * board_sq))
                    .collect::<Vec<_>>()
            })
            .collect();

        Self {
            board_size,
            history_steps,
            position_tables,
            plane_tables,
            flat_planes: [vec![0; board_sq], vec![1; board_sq]],
        }
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    pub fn history_steps(&self) -> usize {
        self.history_steps
    }

    pub fn position_table(&self, symmetry: usize) -> &[usize] {
        &self.position_tables[symmetry]
    }

    pub fn plane_table(&self, symmetry: usize) -> &[usize] {
        &self.plane_tables[symmetry]
    }

    /// All zero (`false`) or all one (`true`) plane, used for the color to move.
    pub fn flat_plane(&self, filled: bool) -> &[u8] {
        &self.flat_planes[filled as usize]
    }

    /// The symmetry that undoes `symmetry`. Pure reflections are their own inverse;
    /// for the transposing ones the axis mirrors swap.
    pub fn inverse(symmetry: usize) -> usize {
        match symmetry {
            5 => 6,
            6 => 5,
            s => s,
        }
    }

    /// `output[i] = input[table[i]]` over the history planes.
    pub fn remap_planes<T: Copy>(&self, symmetry: usize, input: &[T], output: &mut [T]) {
        gather(self.plane_table(symmetry), input, output);
    }

    /// `output[i] = input[table[i]]` over a move probability vector, pass included.
    pub fn remap_probabilities<T: Copy>(&self, symmetry: usize, input: &[T], output: &mut [T]) {
        gather(self.position_table(symmetry), input, output);
    }
}

fn gather<T: Copy>(table: &[usize], input: &[T], output: &mut [T]) {
    assert_eq!(input.len(), table.len(), "Input does not match table length");
    assert_eq!(output.len(), table.len(), "Output does not match table length");

    for (out, &idx) in output.iter_mut().zip(table) {
        *out = input[idx];
    }
}
