mod step;
mod turn;
mod verdict;

pub use step::*;
pub use turn::*;
pub use verdict::*;
