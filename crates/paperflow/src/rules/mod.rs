pub mod engine;
pub mod fuzzy;

pub use engine::DocumentRule;
pub use fuzzy::{allow_typos, match_text_allow_typo, match_text_by_distance};
