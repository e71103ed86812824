pub mod logging;
pub mod text_index;

pub use text_index::TextIndex;
