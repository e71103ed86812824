pub mod auto_formatter;
pub mod format_validator;
pub mod metrics_collector;
pub mod override_store;
pub mod pattern_detector;
pub mod pattern_library;
pub mod reject_writer;

pub use auto_formatter::AutoFormatter;
pub use format_validator::FormatValidator;
pub use metrics_collector::{MetricsCollector, RetentionPolicy};
pub use override_store::OverrideStore;
pub use pattern_detector::{Detection, PatternDetector};
pub use pattern_library::PatternLibrary;
pub use reject_writer::RejectWriter;
