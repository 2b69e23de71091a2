pub mod error;
pub mod language;
pub mod state;

pub use error::*;
pub use language::*;
pub use state::*;
