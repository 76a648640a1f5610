//! End-to-end flows over a real `AppStore` and an in-memory backend.

use std::rc::Rc;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use exam_utils::import::QuestionDraft;
use quizfolio_frontend_rs::{AppStore, SessionFilter};
use satchel::MemoryBackend;

fn store() -> AppStore {
    AppStore::new(Rc::new(MemoryBackend::new()))
}

fn rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(2024)
}

fn draft(topic: &str, text: &str, keywords: &[&str]) -> QuestionDraft {
    QuestionDraft {
        topic: topic.to_string(),
        text: text.to_string(),
        options: vec!["right".to_string(), "wrong".to_string()],
        correct_answer: "right".to_string(),
        explanation: "because".to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        ..Default::default()
    }
}

fn seed_networking_bank(store: &mut AppStore, n: usize) {
    for i in 0..n {
        store
            .add_question(draft("Networking", &format!("Networking Q{i}?"), &["vpc"]))
            .unwrap();
    }
}

#[test]
fn requesting_more_questions_than_exist_is_not_an_error() {
    let mut store = store();
    seed_networking_bank(&mut store, 3);
    store
        .add_question(draft("Storage", "Storage Q?", &["s3"]))
        .unwrap();

    store
        .start_quiz(
            &SessionFilter::Topic("Networking".to_string()),
            5,
            &mut rng(),
        )
        .unwrap();

    let view = store.session_view().unwrap();
    assert_eq!(view.total, 3);
    assert_eq!(view.current_index, 0);
}

#[test]
fn empty_filter_pool_creates_no_session() {
    let mut store = store();
    seed_networking_bank(&mut store, 3);

    let err = store
        .start_quiz(&SessionFilter::Topic("Databases".to_string()), 5, &mut rng())
        .unwrap_err();
    assert_eq!(err.to_string(), "no questions match the requested filter");
    assert!(store.session().is_none());
}

#[test]
fn full_session_scores_and_reviews_match_submissions() {
    let mut store = store();
    seed_networking_bank(&mut store, 3);

    store
        .start_quiz(&SessionFilter::Any, 3, &mut rng())
        .unwrap();

    // Answer correctly, correctly, incorrectly
    let mut expected_markers = Vec::new();
    for turn in 0..3 {
        let question = store.current_question().unwrap().clone();
        let selected = if turn < 2 {
            question.correct_answer.clone()
        } else {
            "wrong".to_string()
        };
        let outcome = store.submit_answer(&selected).unwrap();
        expected_markers.push(outcome.answer.is_correct);
        store.advance().unwrap();
    }
    assert_eq!(expected_markers, vec![true, true, false]);

    let view = store.session_view().unwrap();
    assert!(view.reviewing);
    assert_eq!(view.score.total, 3);
    assert_eq!(view.score.correct, 2);
    assert_eq!(view.score.percentage, 67);

    // Review shows the same markers in order
    let mut markers = Vec::new();
    for i in 0..3 {
        let item = store.review_item().unwrap();
        assert_eq!(item.index, i);
        markers.push(item.answer.is_correct);
        if i < 2 {
            store.review_next().unwrap();
        }
    }
    assert_eq!(markers, expected_markers);

    // Finishing reports the final score and drops the session
    let score = store.finish_quiz().unwrap();
    assert_eq!(score.percentage, 67);
    assert!(store.session().is_none());

    // The answers were merged into global history at submission time
    assert_eq!(store.history().len(), 3);
    assert_eq!(store.history().summary().score.percentage, 67);
}

#[test]
fn wrong_answer_moves_every_keyword_on_the_question() {
    let mut store = store();
    store
        .add_question(draft("Security", "IAM question?", &["iam", "security"]))
        .unwrap();

    store
        .start_quiz(&SessionFilter::Keyword("iam".to_string()), 1, &mut rng())
        .unwrap();
    let outcome = store.submit_answer("wrong").unwrap();
    assert!(!outcome.answer.is_correct);

    let now = Utc::now();
    for keyword in ["iam", "security"] {
        let holding = store.portfolio().holding(keyword).unwrap();
        assert!((holding.credit - 95.0).abs() < 1e-9);
        assert_eq!(store.portfolio().wrong_count(keyword, now), 1);
    }
}

#[test]
fn csv_import_accounts_for_every_row() {
    let mut store = store();

    let rows = [
        "Networking,Q1?,a,b,c,d,a,,net,beginner",
        "Networking,Q2?,a,b,c,d,b,,net,beginner",
        "Storage,only one option,a,,,,a,,s3,beginner",
        "Storage,Q4?,a,b,,,a,,s3,beginner",
        "Security,Q5?,a,b,c,,c,,iam,advanced",
    ];
    let batch = store
        .import_file("bank.csv", &rows.join("\n"), exam_utils::FileType::Csv)
        .unwrap();

    assert_eq!(batch.total, 5);
    assert_eq!(batch.success, 4);
    assert_eq!(batch.failed, 1);
    assert_eq!(store.repository().list_by_batch(batch.id).len(), 4);
    assert_eq!(store.repository().stats().total, 4);
}

#[test]
fn deleting_a_batch_removes_exactly_its_questions() {
    let mut store = store();
    store.add_question(draft("Storage", "Kept?", &[])).unwrap();

    let rows: Vec<String> = (0..10)
        .map(|i| format!("Networking,Imported Q{i}?,a,b,,,a,,,beginner"))
        .collect();
    let batch = store
        .import_file("bank.csv", &rows.join("\n"), exam_utils::FileType::Csv)
        .unwrap();
    assert_eq!(store.repository().stats().total, 11);

    let removed = store.delete_batch(batch.id).unwrap();
    assert_eq!(removed, Some(10));
    assert_eq!(store.repository().stats().total, 1);
    assert!(store.repository().batches().is_empty());
}

#[test]
fn snapshot_round_trip_reproduces_progress() {
    let mut store = store();
    seed_networking_bank(&mut store, 2);
    store
        .start_quiz(&SessionFilter::Any, 2, &mut rng())
        .unwrap();
    store.submit_answer("wrong").unwrap();
    store.advance().unwrap();
    let question = store.current_question().unwrap().clone();
    store.submit_answer(&question.correct_answer).unwrap();
    store.advance().unwrap();
    store.finish_quiz().unwrap();

    let exported = store.export_state().unwrap();

    let mut fresh = AppStore::new(Rc::new(MemoryBackend::new()));
    fresh.import_state(&exported).unwrap();

    assert_eq!(fresh.repository().list_all(), store.repository().list_all());
    assert_eq!(fresh.history().snapshot(), store.history().snapshot());
    assert_eq!(fresh.portfolio().snapshot(), store.portfolio().snapshot());
}

#[test]
fn in_flight_session_survives_a_reload() {
    let backend: Rc<MemoryBackend> = Rc::new(MemoryBackend::new());
    let mut store = AppStore::new(backend.clone());
    seed_networking_bank(&mut store, 3);
    store
        .start_quiz(&SessionFilter::Any, 3, &mut rng())
        .unwrap();
    let first_question = store.current_question().unwrap().clone();
    store.submit_answer("wrong").unwrap();
    store.advance().unwrap();
    let view_before = store.session_view().unwrap();
    drop(store);

    // Reload over the same persisted state, as a browser refresh would
    let resumed = AppStore::new(backend);
    let view_after = resumed.session_view().unwrap();
    assert_eq!(view_after.total, view_before.total);
    assert_eq!(view_after.current_index, 1);
    assert_eq!(view_after.answered, 1);
    assert_ne!(
        resumed.current_question().unwrap().id,
        first_question.id,
        "the cursor moved past the answered question"
    );
}

#[test]
fn repository_edits_do_not_reach_a_frozen_session() {
    let mut store = store();
    seed_networking_bank(&mut store, 2);
    store
        .start_quiz(&SessionFilter::Any, 2, &mut rng())
        .unwrap();
    let in_session = store.current_question().unwrap().clone();

    let mut edited = in_session.clone();
    edited.text = "Edited after the session started".to_string();
    assert!(store.update_question(edited).unwrap());

    // The session still shows the frozen copy
    assert_eq!(store.current_question().unwrap().text, in_session.text);
}

#[test]
fn clear_progress_keeps_the_bank_and_accounts() {
    let mut store = store();
    seed_networking_bank(&mut store, 2);
    store
        .register("sam", "hunter2", &mut rng())
        .unwrap();
    store
        .start_quiz(&SessionFilter::Any, 2, &mut rng())
        .unwrap();
    store.submit_answer("wrong").unwrap();

    store.clear_progress();

    assert_eq!(store.repository().stats().total, 2);
    assert_eq!(store.accounts().usernames(), vec!["sam".to_string()]);
    assert!(store.session().is_none());
    assert_eq!(store.history().len(), 0);
    assert!(store.portfolio().rows().is_empty());
}
