pub mod enums;
pub mod outcome;

pub use enums::*;
pub use outcome::*;
