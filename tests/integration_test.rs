use std::sync::Arc;

use answer_format_standards::config::Config;
use answer_format_standards::models::builtin::{self, builtin_patterns};
use answer_format_standards::models::metrics::ValidationEvent;
use answer_format_standards::models::pattern::{FormatPattern, RuleCheck, Severity};
use answer_format_standards::models::NewOverride;
use answer_format_standards::services::{
    AutoFormatter, FormatValidator, MetricsCollector, OverrideStore, PatternDetector,
    PatternLibrary, RetentionPolicy,
};
use answer_format_standards::{App, EngineError};
use chrono::Utc;

const SAMPLE_ANSWERS: &[&str] = &[
    "",
    "   \n\t",
    "This is a comparison question but has no table.",
    "## Steps\n\n1. Download the installer\n2. Run it\n3. Restart\n",
    "Here is how it works:\n\n```\nfn main() { println!(\"hi\"); }\n```\n",
    "Just do something with it and then do stuff, etc.",
    "## Pros\n\n- fast\n- cheap\n\n## Cons\n\n- young\n",
    "| a | b |\n| --- | --- |\n| 1 | 2 |\n\nI recommend a.",
    "比较两种方案：没有表格，也没有结论。",
    "Redis vs Memcached\n\n```bash\nredis-server",
    "Unclosed block with a trailing newline:\n```\nSELECT 1;\n",
];

fn validator() -> FormatValidator {
    FormatValidator::default()
}

#[test]
fn test_vacuous_pattern_always_passes() {
    let pattern = FormatPattern::new("anything", "Anything");
    let v = validator();
    for answer in SAMPLE_ANSWERS {
        let result = v.validate(answer, &pattern);
        assert!(result.is_valid, "answer {:?}", answer);
        assert_eq!(result.score, 100);
        assert!(result.violations.is_empty());
    }
}

#[test]
fn test_score_bounds_and_determinism() {
    let v = validator();
    for pattern in builtin_patterns() {
        for answer in SAMPLE_ANSWERS {
            let first = v.validate(answer, &pattern);
            let second = v.validate(answer, &pattern);
            assert!(first.score <= 100);
            assert_eq!(first, second, "pattern {} answer {:?}", pattern.id, answer);
            assert_eq!(v.get_violations(), second.violations);
        }
    }
}

#[test]
fn test_empty_answer_scores_zero() {
    let v = validator();
    for pattern in builtin_patterns() {
        assert!(pattern.has_required_sections());
        let result = v.validate("", &pattern);
        assert_eq!(result.score, 0, "pattern {}", pattern.id);
        assert!(!result.is_valid);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].severity, Severity::Error);
    }
}

#[test]
fn test_format_is_idempotent() {
    let v = Arc::new(validator());
    let formatter = AutoFormatter::new(Arc::clone(&v));
    for pattern in builtin_patterns() {
        for answer in SAMPLE_ANSWERS {
            let before = v.check(answer, &pattern);
            let once = formatter.format(answer, &pattern);
            let after_once = v.check(&once, &pattern);

            let fixed: Vec<&str> = before
                .violations
                .iter()
                .filter(|violation| violation.is_fixable())
                .map(|violation| violation.rule.as_str())
                .filter(|rule| !after_once.violations.iter().any(|w| w.rule == *rule))
                .collect();

            let twice = formatter.format(&once, &pattern);
            let after_twice = v.check(&twice, &pattern);
            for rule in fixed {
                assert!(
                    after_twice.violations.iter().all(|w| w.rule != rule),
                    "rule {} came back for pattern {}",
                    rule,
                    pattern.id
                );
            }
            assert_eq!(twice, once, "pattern {} answer {:?}", pattern.id, answer);
        }
    }
}

#[test]
fn test_override_justification_lifecycle() {
    let store = OverrideStore::new();
    assert!(matches!(
        store.add_override(NewOverride::new("q1", "too short")),
        Err(EngineError::JustificationTooShort { length: 9, .. })
    ));
    assert!(store
        .add_override(NewOverride::new("q1", "ten chars!"))
        .is_ok());
    assert!(store.has_override("q1"));

    store.remove_override("q1").unwrap();
    assert!(!store.has_override("q1"));
}

#[test]
fn test_detect_each_builtin_by_its_own_keywords() {
    let library = Arc::new(PatternLibrary::with_patterns(builtin_patterns()).unwrap());
    let detector = PatternDetector::new(Arc::clone(&library));
    for pattern in library.get_all_patterns() {
        let text = pattern.keywords.join(" ");
        let detected = detector.detect_pattern(&text).unwrap();
        assert_eq!(detected.id, pattern.id);
        assert_eq!(detector.get_confidence(), 1.0);
    }
}

#[test]
fn test_comparison_without_table() {
    let result = validator().validate(
        "This is a comparison question but has no table.",
        &builtin::comparison_table(),
    );
    assert!(result
        .violations
        .iter()
        .any(|v| v.severity == Severity::Error && v.message.contains("table")));
    assert!(result.score < 70);
    assert!(!result.is_valid);
}

#[test]
fn test_untagged_fence_single_warning() {
    let answer = "The snippet below prints a greeting to standard output:\n\n```\nprint('hello')\n```\n";
    let result = validator().validate(answer, &builtin::code_example());
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].severity, Severity::Warning);
    assert_eq!(result.score, 90);
    assert!(result.is_valid);
}

#[test]
fn test_compliance_rate_rounding() {
    let collector = MetricsCollector::new(RetentionPolicy::unbounded());
    let (n, p) = (7usize, 4usize);
    for i in 0..n {
        collector.record_validation(ValidationEvent {
            question_id: format!("q{}", i),
            timestamp: Utc::now(),
            pattern_id: Some("comparison-table".to_string()),
            pattern_name: None,
            score: if i < p { 90 } else { 20 },
            passed: i < p,
            violation_count: 1,
            channel: "faq".to_string(),
        });
    }
    let metrics = collector.get_metrics();
    assert_eq!(
        metrics.compliance_rate,
        (p as f64 / n as f64 * 100.0).round()
    );
    assert_eq!(metrics.compliance_rate, 57.0);
}

#[test]
fn test_duplicate_override_rejected() {
    let store = OverrideStore::new();
    store
        .add_override(NewOverride::new("q1", "approved for the launch post"))
        .unwrap();
    assert_eq!(
        store.add_override(NewOverride::new("q1", "another justification")),
        Err(EngineError::DuplicateOverride {
            question_id: "q1".to_string()
        })
    );
}

#[test]
fn test_failing_custom_rules_degrade_to_info() {
    let v = validator();
    v.register_predicate("broken", |_| Err("lookup table missing".to_string()));
    v.register_predicate("panics", |_| panic!("boom"));

    let pattern = FormatPattern::new("custom", "Custom")
        .with_rule(builtin::rule(
            "broken-rule",
            RuleCheck::Custom {
                predicate: "broken".to_string(),
            },
            Severity::Error,
            "never shown",
        ))
        .with_rule(builtin::rule(
            "panicking-rule",
            RuleCheck::Custom {
                predicate: "panics".to_string(),
            },
            Severity::Error,
            "never shown",
        ))
        .with_rule(builtin::rule(
            "bad-regex",
            RuleCheck::RegexPresent {
                pattern: "(".to_string(),
            },
            Severity::Error,
            "never shown",
        ));

    let result = v.validate("some answer", &pattern);
    assert_eq!(result.violations.len(), 3);
    assert!(result.violations.iter().all(|violation| violation.severity == Severity::Info
        && violation.message.starts_with("Rule evaluation failed")));
    assert_eq!(result.score, 94);
    assert!(result.is_valid);
}

#[test]
fn test_concurrent_recording_and_overrides() {
    let collector = MetricsCollector::new(RetentionPolicy::unbounded());
    let store = OverrideStore::new();

    std::thread::scope(|scope| {
        for t in 0..8 {
            let collector = &collector;
            let store = &store;
            scope.spawn(move || {
                for i in 0..50 {
                    collector.record_validation(ValidationEvent {
                        question_id: format!("t{}-q{}", t, i),
                        timestamp: Utc::now(),
                        pattern_id: None,
                        pattern_name: None,
                        score: 100,
                        passed: true,
                        violation_count: 0,
                        channel: "faq".to_string(),
                    });
                }
                let _ = store.add_override(NewOverride::new("shared", "concurrent reviewers"));
            });
        }
    });

    let metrics = collector.get_metrics();
    assert_eq!(metrics.total_questions, 400);
    assert_eq!(metrics.compliance_rate, 100.0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_app_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let submissions = dir.path().join("submissions");
    std::fs::create_dir(&submissions).unwrap();
    std::fs::write(
        submissions.join("batch.toml"),
        r#"
name = "faq-batch"
channel = "faq"

[[submissions]]
question_id = 1
question_text = "How to install the CLI?"
answer_text = "just run it"

[[submissions]]
question_id = "q2"
question_text = "Compare Redis vs Memcached"
answer_text = "Redis keeps richer data structures and can persist to disk, while Memcached is a simpler pure in-memory cache. I recommend Redis when you need persistence or pub/sub features."

[[submissions]]
question_id = "q3"
question_text = "tell me a joke"
answer_text = "Why did the chicken cross the road?"
channel = "social"
"#,
    )
    .unwrap();

    let path = |name: &str| dir.path().join(name).to_string_lossy().to_string();
    let config = Config {
        pattern_folder: path("missing-patterns"),
        submission_folder: path("submissions"),
        output_log_file: path("report.txt"),
        reject_file: path("rejected.txt"),
        metrics_export_file: path("metrics.json"),
        max_concurrent_submissions: 2,
        ..Default::default()
    };

    let app = App::initialize(config).await.unwrap();
    assert_eq!(app.flow().library().len(), builtin_patterns().len());

    let stats = app.run().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.auto_fixed, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.failed, 0);

    let rejected = std::fs::read_to_string(path("rejected.txt")).unwrap();
    assert!(rejected.contains("题目 1 | 模式 step-by-step"));

    let export: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path("metrics.json")).unwrap()).unwrap();
    assert_eq!(export["validations"].as_array().unwrap().len(), 3);
    assert_eq!(export["autoFixes"].as_array().unwrap().len(), 2);

    let metrics = app.flow().metrics().get_metrics();
    assert_eq!(metrics.compliance_rate, 67.0);
    assert_eq!(metrics.channel_breakdown.len(), 2);
}
