pub mod errors;
pub mod logger;
pub mod suggest;

pub use suggest::find_best_match;
