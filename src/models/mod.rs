pub mod builtin;
pub mod loaders;
pub mod metrics;
pub mod override_record;
pub mod pattern;
pub mod submission;
pub mod validation;

pub use builtin::builtin_patterns;
pub use loaders::{load_all_pattern_files, load_all_submission_files, load_submission_batch};
pub use metrics::{
    AutoFixEvent, ChannelBreakdown, FormatMetrics, MetricsExport, PatternDetectionEvent,
    PatternUsage, TrendBucket, ValidationEvent,
};
pub use override_record::{NewOverride, OverrideRecord};
pub use pattern::{
    FormatPattern, FormatRule, PatternSection, PatternStructure, RuleCheck, SectionConstraint,
    SectionFormat, Severity, FREE_FORM_PATTERN_ID,
};
pub use submission::{AnswerSubmission, SubmissionBatch};
pub use validation::{
    Fix, FixType, FormatSuggestion, Location, TextRange, ValidationResult, ValidationViolation,
};
