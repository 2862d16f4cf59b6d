use std::sync::Arc;

use grade_snapshot::fakes::FakeGradingClient;
use grade_snapshot::{
    CourseClassifier, EngineConfig, GradeResolver, GradeSource, MemorySessionStore, PageContext,
    SessionStore, SnapshotStore,
};
use serde_json::json;

fn engine(client: &Arc<FakeGradingClient>) -> (SnapshotStore, Arc<MemorySessionStore>) {
    let session = Arc::new(MemorySessionStore::new());
    let store = SnapshotStore::new(&EngineConfig::default(), client.clone(), session.clone())
        .expect("default config is valid");
    (store, session)
}

#[tokio::test]
async fn sbg_named_course_with_enrollment_score() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .respond("/api/v1/courses/101/assignments", json!([]))
        .with_enrollment("101", json!({ "computed_current_score": 68.5 }));
    let (store, _) = engine(&client);

    let grade = store.resolver().resolve_grade("101").await.unwrap();
    assert_eq!(grade.value, 68.5);
    assert_eq!(grade.source, GradeSource::Enrollment);

    let snapshot = store.populate("101", "Algebra I (SBG)").await.unwrap();
    assert!(snapshot.is_standards_based);
    assert_eq!(snapshot.score, Some(68.5));
    assert_eq!(snapshot.grade_source, GradeSource::Enrollment);

    // Only the resolver searched for the sentinel; the name decided classification.
    assert_eq!(client.calls_to("/api/v1/courses/101/assignments"), 2);
    let config = EngineConfig::default();
    assert!(config.rating_scale.contains_label("Target"));
    assert!((config.rating_scale.percentage_to_points(68.5) - 2.74).abs() < 1e-9);
}

#[tokio::test]
async fn probe_classifies_course_with_sentinel_score() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .with_sentinel("202", 77, "Current Score")
        .with_submission("202", 77, json!({ "score": 2.6 }));
    let (store, session) = engine(&client);

    let snapshot = store.populate("202", "History 101").await.unwrap();
    assert!(snapshot.is_standards_based);
    assert_eq!(snapshot.score, Some(2.6));
    assert_eq!(snapshot.letter_grade, None);
    assert_eq!(snapshot.grade_source, GradeSource::Assignment);

    // The resolver's search doubles as the sentinel check.
    assert_eq!(client.calls_to("/api/v1/courses/202/assignments"), 1);
    assert_eq!(session.get("gsc:sbg:202").as_deref(), Some("true"));
}

#[tokio::test]
async fn traditional_course_is_classified_negative() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .respond("/api/v1/courses/303/assignments", json!([]))
        .with_enrollment(
            "303",
            json!({ "computed_current_score": 92.4, "computed_current_grade": "A-" }),
        );
    let (store, _) = engine(&client);

    let snapshot = store.populate("303", "Chemistry").await.unwrap();
    assert!(!snapshot.is_standards_based);
    assert_eq!(snapshot.letter_grade.as_deref(), Some("A-"));
    assert!(store.should_refresh("303", PageContext::CourseGrades));
    assert!(!store.should_refresh("303", PageContext::Dashboard));
}

#[tokio::test]
async fn rating_label_from_submission_classifies_course() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .with_sentinel("404", 12, "Current Score")
        .with_submission("404", 12, json!({ "score": 3.0, "grade": "Target" }));
    let (store, _) = engine(&client);

    let snapshot = store.populate("404", "Physics").await.unwrap();
    assert!(snapshot.is_standards_based);
    // The letter grade decided it; no probe call after the resolver's search.
    assert_eq!(client.calls_to("/api/v1/courses/404/assignments"), 1);
}

#[tokio::test]
async fn late_sentinel_upgrades_traditional_course() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .respond("/api/v1/courses/12/assignments", json!([]))
        .with_enrollment("12", json!({ "computed_current_score": 80.0 }));
    let (store, session) = engine(&client);

    let first = store.populate("12", "History 101").await.unwrap();
    assert!(!first.is_standards_based);
    assert_eq!(first.grade_source, GradeSource::Enrollment);
    assert_eq!(session.get("gsc:sbg:12"), None);

    client
        .with_sentinel("12", 31, "Current Score")
        .with_submission("12", 31, json!({ "score": 3.0, "grade": "Target" }));
    let second = store.populate("12", "History 101").await.unwrap();
    assert!(second.is_standards_based);
    assert_eq!(second.grade_source, GradeSource::Assignment);
    assert_eq!(second.letter_grade.as_deref(), Some("Target"));
    assert_eq!(store.get("12").unwrap(), second);
    assert!(!store.should_refresh("12", PageContext::AllGrades));
}

#[tokio::test]
async fn back_to_back_populate_is_idempotent() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .respond("/api/v1/courses/5/assignments", json!([]))
        .with_enrollment(
            "5",
            json!({ "grades": { "current_score": 74.0, "current_grade": "C" } }),
        );
    let (store, _) = engine(&client);

    let first = store.populate("5", "Spanish II").await.unwrap();
    let second = store.populate("5", "Spanish II").await.unwrap();
    assert_eq!(first.score, second.score);
    assert_eq!(first.letter_grade, second.letter_grade);
    assert_eq!(first.is_standards_based, second.is_standards_based);
    assert_eq!(first.grade_source, second.grade_source);
}

#[tokio::test]
async fn reads_never_write() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .with_sentinel("6", 1, "Current Score")
        .with_submission("6", 1, json!({ "score": 3.4 }))
        .respond("/api/v1/courses/7/assignments", json!([]))
        .with_enrollment("7", json!({ "computed_current_score": 80.0 }));
    let (store, session) = engine(&client);

    store.populate("6", "Geometry").await.unwrap();
    store.populate("7", "Literature").await.unwrap();
    let stored_sbg = session.get("gsc:snapshot:6");
    let stored_trad = session.get("gsc:snapshot:7");
    let calls = client.call_count();

    for page in PageContext::ALL {
        store.get("6");
        store.should_refresh("6", page);
        store.should_refresh("7", page);
        store.refresh("6", "Geometry", page, false).await;
    }
    store.refresh("7", "Literature", PageContext::Dashboard, false).await;
    store.snapshots();

    assert_eq!(session.get("gsc:snapshot:6"), stored_sbg);
    assert_eq!(session.get("gsc:snapshot:7"), stored_trad);
    assert_eq!(client.call_count(), calls);
}

#[tokio::test]
async fn traditional_course_refreshes_on_grades_pages() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .respond("/api/v1/courses/8/assignments", json!([]))
        .with_enrollment("8", json!({ "computed_current_score": 70.0 }));
    let (store, _) = engine(&client);
    store.populate("8", "Economics").await.unwrap();

    client.with_enrollment("8", json!({ "computed_current_score": 72.5 }));
    let dashboard = store
        .refresh("8", "Economics", PageContext::Dashboard, false)
        .await
        .unwrap();
    assert_eq!(dashboard.score, Some(70.0));

    let grades = store
        .refresh("8", "Economics", PageContext::AllGrades, false)
        .await
        .unwrap();
    assert_eq!(grades.score, Some(72.5));
    assert_eq!(store.get("8").unwrap().score, Some(72.5));
}

#[tokio::test]
async fn resolver_fallback_order() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .with_sentinel("both", 3, "Current Score")
        .with_submission("both", 3, json!({ "score": 2.9 }))
        .with_enrollment("both", json!({ "computed_current_score": 61.0 }))
        .respond("/api/v1/courses/enroll/assignments", json!([]))
        .with_enrollment("enroll", json!({ "computed_current_score": 61.0 }))
        .respond("/api/v1/courses/none/assignments", json!([]))
        .with_enrollment("none", json!({}));
    let resolver = GradeResolver::new(&EngineConfig::default(), client.clone());

    let both = resolver.resolve_grade("both").await.unwrap();
    assert_eq!((both.value, both.source), (2.9, GradeSource::Assignment));

    let enroll = resolver.resolve_grade("enroll").await.unwrap();
    assert_eq!((enroll.value, enroll.source), (61.0, GradeSource::Enrollment));

    assert_eq!(resolver.resolve_grade("none").await, None);
}

#[tokio::test]
async fn name_pattern_precedes_probe() {
    let client = Arc::new(FakeGradingClient::new());
    // The probe would say "not found" if it ran.
    client.respond("/api/v1/courses/9/assignments", json!([]));
    let session = Arc::new(MemorySessionStore::new());
    let classifier =
        CourseClassifier::new(&EngineConfig::default(), client.clone(), session).unwrap();

    assert!(classifier.classify("9", "Standards-Based Biology", None, true).await);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn concurrent_populates_converge() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .respond("/api/v1/courses/10/assignments", json!([]))
        .with_enrollment("10", json!({ "computed_current_score": 55.5 }));
    let (store, _) = engine(&client);

    let (a, b) = tokio::join!(
        store.populate("10", "Music"),
        store.refresh("10", "Music", PageContext::CourseGrades, true)
    );
    assert_eq!(a.unwrap().score, Some(55.5));
    assert_eq!(b.unwrap().score, Some(55.5));
    assert_eq!(store.get("10").unwrap().score, Some(55.5));
}

#[tokio::test]
async fn clear_all_ends_the_session() {
    let client = Arc::new(FakeGradingClient::new());
    client
        .with_sentinel("11", 4, "Current Score")
        .with_submission("11", 4, json!({ "score": 1.5 }));
    let (store, session) = engine(&client);
    store.populate("11", "Drama").await.unwrap();

    assert_eq!(store.clear_all(), 1);
    assert_eq!(store.get("11"), None);
    assert!(session.keys().is_empty());
    assert!(store.should_refresh("11", PageContext::Dashboard));
}
