#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// Black makes the first move of every game.
    pub fn to_move(step: usize) -> Self {
        if step % 2 == 0 {
            Color::Black
        } else {
            Color::White
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    pub fn is_black(&self) -> bool {
        matches!(self, Color::Black)
    }
}
