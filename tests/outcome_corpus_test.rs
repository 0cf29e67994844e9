mod common;

use remedy::adapters::sqlite::SqliteOutcomeCorpus;
use remedy::domain::models::{AntiPatternEntry, ParamValue, ParameterVector, SuccessCase};
use remedy::domain::ports::OutcomeCorpus;

fn params(max_edits: f64) -> ParameterVector {
    let mut params = ParameterVector::new();
    params.insert("max_edits".to_string(), ParamValue::Number(max_edits));
    params.insert("verify_after_fix".to_string(), ParamValue::Bool(true));
    params
}

#[tokio::test]
async fn test_solved_cases_exclude_current_archetype() {
    let pool = common::setup_test_db().await;
    let corpus = SqliteOutcomeCorpus::new(pool);

    for (archetype, error) in [
        ("dashboard", "Cannot find module 'chart.js'"),
        ("api", "Cannot find module 'express'"),
        ("form", "Unexpected token '<'"),
    ] {
        corpus
            .record_success(&SuccessCase::new(
                "repair",
                archetype,
                error,
                "dependency-fix",
                params(4.0),
                9.0,
            ))
            .await
            .expect("failed to record success");
    }

    let cases = corpus
        .solved_cases_excluding("repair", "dashboard", 10)
        .await
        .unwrap();
    assert_eq!(cases.len(), 2);
    assert!(cases.iter().all(|c| c.archetype != "dashboard"));

    let api = cases.iter().find(|c| c.archetype == "api").unwrap();
    assert_eq!(api.parameters, params(4.0));
    assert!((api.quality_score - 9.0).abs() < 1e-9);

    let other_context = corpus
        .solved_cases_excluding("build", "dashboard", 10)
        .await
        .unwrap();
    assert!(other_context.is_empty());
}

#[tokio::test]
async fn test_solved_cases_respect_limit() {
    let pool = common::setup_test_db().await;
    let corpus = SqliteOutcomeCorpus::new(pool);

    for i in 0..5 {
        corpus
            .record_success(&SuccessCase::new(
                "repair",
                format!("archetype-{i}"),
                "TypeError: x is undefined",
                "logic-fix",
                params(f64::from(i)),
                8.0,
            ))
            .await
            .unwrap();
    }

    let cases = corpus
        .solved_cases_excluding("repair", "dashboard", 3)
        .await
        .unwrap();
    assert_eq!(cases.len(), 3);
}

#[tokio::test]
async fn test_failure_history_counts_per_option() {
    let pool = common::setup_test_db().await;
    let corpus = SqliteOutcomeCorpus::new(pool);

    for reason in ["still missing export", "type mismatch", ""] {
        corpus
            .record_anti_pattern(&AntiPatternEntry::new(
                "repair",
                "dashboard",
                "stub-fix",
                "TypeError: x is undefined",
                reason,
                1.0,
            ))
            .await
            .unwrap();
    }
    corpus
        .record_anti_pattern(&AntiPatternEntry::new(
            "repair",
            "api",
            "stub-fix",
            "TypeError: y is undefined",
            "unrelated",
            0.5,
        ))
        .await
        .unwrap();

    let history = corpus.failure_history("repair", "dashboard").await.unwrap();
    assert_eq!(history.len(), 1);

    let stub = &history["stub-fix"];
    assert_eq!(stub.count, 3);
    assert_eq!(stub.reasons.len(), 2);
    assert!(stub.reasons.contains(&"type mismatch".to_string()));
    assert!(!stub.reasons.contains(&"unrelated".to_string()));
}
