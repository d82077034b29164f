/// Cross-agent scenarios driven through the agent system
///
/// - Assessment completion after a two-exercise plan
/// - Hackathon submission window
/// - Dead-letter aging
/// - Registration to leaderboard
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use mavericks_protocol::EventKind;
use mavericks_server::config::BusSettings;
use mavericks_server::event_bus::{Clock, ManualClock};
use mavericks_server::AgentSystem;
use serde_json::{json, Map, Value};

fn system() -> (AgentSystem, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()));
    (AgentSystem::new(&BusSettings::default(), clock.clone()), clock)
}

fn emit(system: &AgentSystem, kind: &str, user: &str, payload: Value) -> String {
    let id = system.emit_event(kind, user, payload, None, None);
    assert!(!id.is_empty(), "{kind} was not delivered");
    id
}

fn events(system: &AgentSystem, user: &str, kind: &str) -> Vec<mavericks_server::event_bus::Event> {
    system
        .bus()
        .get_events_for_user(user, Some(&[kind.to_string()]), 100)
}

const SOLUTION: &str = "def find_max(numbers):\n    # track the best\n    best = numbers[0]\n    for n in numbers:\n        if n > best:\n            best = n\n    return best\n";

#[test]
fn test_assessment_completion_after_two_exercises() {
    let (system, _clock) = system();
    emit(
        &system,
        EventKind::SKILLS_EXTRACTED,
        "u1",
        json!({
            "extracted_skills": { "programming_languages": ["python"] },
            "skill_vector": { "programming_languages": 0.2 },
        }),
    );
    let state = system.assessment().get_assessment_state("u1").unwrap();
    assert_eq!(state.assessment_plan.exercises.len(), 2);

    emit(&system, EventKind::ASSESSMENT_START_REQUESTED, "u1", json!({}));
    assert_eq!(events(&system, "u1", EventKind::EXERCISE_GENERATED).len(), 1);

    emit(&system, EventKind::EXERCISE_SOLUTION_SUBMITTED, "u1", json!({ "solution_code": "" }));
    let state = system.assessment().get_assessment_state("u1").unwrap();
    assert_eq!(state.exercises_completed, 1);
    let first = state.last_submission.unwrap().score;
    assert!(events(&system, "u1", EventKind::ASSESSMENT_COMPLETED).is_empty());

    emit(
        &system,
        EventKind::EXERCISE_SOLUTION_SUBMITTED,
        "u1",
        json!({ "solution_code": SOLUTION, "completion_time": 12.0 }),
    );
    let state = system.assessment().get_assessment_state("u1").unwrap();
    assert_eq!(state.exercises_completed, 2);
    let second = state.last_submission.unwrap().score;

    let completed = events(&system, "u1", EventKind::ASSESSMENT_COMPLETED);
    assert_eq!(completed.len(), 1);
    let average = completed[0].payload["average_score"].as_f64().unwrap();
    assert_eq!(average, f64::from(first + second) / 2.0);

    // The learning path agent turned the results into a personalized path.
    assert_eq!(events(&system, "u1", EventKind::LEARNING_PERSONALIZED_PATH_READY).len(), 1);

    // A third submission is refused without a second completion.
    emit(&system, EventKind::EXERCISE_SOLUTION_SUBMITTED, "u1", json!({ "solution_code": SOLUTION }));
    assert_eq!(events(&system, "u1", EventKind::ASSESSMENT_COMPLETED).len(), 1);
}

#[test]
fn test_hackathon_join_window() {
    let (system, clock) = system();
    emit(&system, EventKind::HACKATHON_CREATE_REQUESTED, "host", json!({ "duration_hours": 4 }));
    let hackathon_id = system.hackathon().list_hackathons()[0].id.clone();

    emit(&system, EventKind::HACKATHON_JOIN_REQUESTED, "u1", json!({ "hackathon_id": hackathon_id }));
    let submission = json!({
        "description": "A task app with login",
        "code_files": { "app.py": "def create_task():\n    pass" },
    });

    system.process_hackathon_submission("u1", &hackathon_id, submission.clone());
    assert!(events(&system, "u1", EventKind::HACKATHON_SUBMISSION_RECEIVED).is_empty());
    let status = system.hackathon().get_hackathon_status(&hackathon_id).into_value();
    assert_eq!(status["leaderboard"], json!([]));

    let now = clock.now();
    assert!(system.hackathon().reschedule(&hackathon_id, now - Duration::hours(1), now + Duration::hours(2)));
    system.process_hackathon_submission("u1", &hackathon_id, submission);

    let received = events(&system, "u1", EventKind::HACKATHON_SUBMISSION_RECEIVED);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].payload["rank"], 1);
    let status = system.hackathon().get_hackathon_status(&hackathon_id).into_value();
    assert_eq!(status["leaderboard"][0]["user_id"], "u1");
    assert_eq!(status["leaderboard"][0]["rank"], 1);
}

#[test]
fn test_dead_letter_aging() {
    let (system, clock) = system();
    // A streak that is not a number fails the analytics decode.
    let bad_login = json!({ "current_streak": "many" });

    emit(&system, EventKind::USER_DAILY_LOGIN, "u1", bad_login.clone());
    let failed = system.bus().failed_events(10);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].target_agent, "AnalyticsAgent");

    clock.advance(Duration::hours(23));
    emit(&system, EventKind::USER_DAILY_LOGIN, "u2", bad_login);
    assert_eq!(system.bus().sweep_dead_letters(), 0);
    assert_eq!(system.bus().failed_events(10).len(), 2);

    clock.advance(Duration::hours(2));
    assert_eq!(system.bus().sweep_dead_letters(), 1);
    let remaining = system.bus().failed_events(10);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].event.user_id, "u2");
}

#[test]
fn test_registration_feeds_gamification_and_analytics() {
    let (system, clock) = system();
    system.process_user_registration("ada", "ada", Map::new());
    system.process_user_registration("grace", "grace", Map::new());

    for _ in 0..3 {
        system.process_daily_login("grace");
        clock.advance(Duration::days(1));
    }

    let board = system.gamification().get_leaderboard("total_points", 10);
    assert_eq!(board[0].user_id, "grace");
    assert_eq!(board[0].score, 100.0 + 3.0 * 25.0);
    assert_eq!(board[0].streak, 3);
    assert_eq!(board[1].user_id, "ada");

    let points = events(&system, "grace", EventKind::POINTS_AWARDED);
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|event| event.source_agent == "GamificationAgent"));

    let overview = system.analytics().get_platform_overview();
    assert_eq!(overview["overview"]["total_users"], 2.0);
    assert_eq!(overview["overview"]["total_points_awarded"], 75.0);

    let analytics = system.analytics().get_user_analytics("grace").into_value();
    assert_eq!(analytics["performance"]["max_streak"], 3);
}
