pub mod color;
pub mod game;
pub mod history;
pub mod symmetries;

mod constants;

pub use color::*;
pub use constants::*;
pub use game::*;
pub use history::*;
pub use symmetries::*;
