mod format;
mod grammar;

pub use format::{MIN_SEGMENT_LEN, format_plate};
pub use grammar::{ConfusionRule, PlateGrammar, digit_count};
