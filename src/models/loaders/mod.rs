pub mod pattern_loader;
pub mod submission_loader;

pub use pattern_loader::{load_all_pattern_files, load_pattern_file, parse_patterns};
pub use submission_loader::{load_all_submission_files, load_submission_batch};
