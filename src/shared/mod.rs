pub mod shutdown;
pub mod types;
pub mod utils;

pub use types::*;
