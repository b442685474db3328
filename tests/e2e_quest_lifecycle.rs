//! E2E tests for the quest lifecycle over HTTP

mod common;

use common::{TestActor, TestServer};
use reqwest::Method;
use serde_json::{Value, json};

const GUILD: i64 = 10;

#[tokio::test]
async fn test_accept_submit_approve_updates_stats() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);
    let hero = TestActor::member(2, GUILD);

    let quest_id = server
        .create_quest(
            master,
            json!({
                "title": "Clear the mine",
                "description": "Spiders everywhere",
                "rank": "medium",
                "category": "combat",
            }),
        )
        .await;

    let available: Value = server
        .request(Method::GET, "/api/v1/quests/available", hero)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(available.as_array().unwrap().len(), 1);

    let response = server
        .request(Method::POST, &format!("/api/v1/quests/{quest_id}/accept"), hero)
        .json(&json!({ "channel_id": 4242 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let progress: Value = response.json().await.unwrap();
    assert_eq!(progress["channel_id"], 4242);

    let response = server
        .request(Method::POST, &format!("/api/v1/quests/{quest_id}/submit"), hero)
        .json(&json!({ "proof_text": "Mine is clear", "proof_attachments": ["https://img/1.png"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .request(
            Method::POST,
            &format!("/api/v1/quests/{quest_id}/approve/{}", hero.user_id),
            master,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let my_quests: Value = server
        .request(Method::GET, "/api/v1/me/quests", hero)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(my_quests[0]["status"], "approved");
    assert_eq!(my_quests[0]["proof_attachments"][0], "https://img/1.png");

    let leaderboard: Value = server
        .request(Method::GET, "/api/v1/leaderboard", hero)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leaderboard[0]["user_id"], hero.user_id);
    assert_eq!(leaderboard[0]["quests_completed"], 1);

    let totals: Value = server
        .request(Method::GET, "/api/v1/stats", hero)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(totals["total_completed"], 1);
    assert_eq!(totals["total_accepted"], 1);

    let analytics: Value = server
        .request(Method::GET, &format!("/api/v1/quests/{quest_id}/analytics"), hero)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(analytics["total_accepts"], 1);
    assert_eq!(analytics["total_completions"], 1);
    assert_eq!(analytics["success_rate"], 100.0);

    // Approved progress is final
    let response = server
        .request(Method::POST, &format!("/api/v1/quests/{quest_id}/accept"), hero)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_role_gated_quest_reports_required_roles() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);

    let quest_id = server
        .create_quest(
            master,
            json!({ "title": "Veterans only", "required_role_ids": [777, 778] }),
        )
        .await;

    let response = server
        .request(
            Method::POST,
            &format!("/api/v1/quests/{quest_id}/accept"),
            TestActor::member(2, GUILD),
        )
        .header("X-Role-Ids", "1,2")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "missing_role");
    assert_eq!(body["required_role_ids"], json!([777, 778]));

    let response = server
        .request(
            Method::POST,
            &format!("/api/v1/quests/{quest_id}/accept"),
            TestActor::member(2, GUILD),
        )
        .header("X-Role-Ids", "778")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_submit_without_accept_is_not_found() {
    let server = TestServer::new().await;
    let quest_id = server
        .create_quest(TestActor::quest_master(1, GUILD), json!({ "title": "Unclaimed" }))
        .await;

    let response = server
        .request(
            Method::POST,
            &format!("/api/v1/quests/{quest_id}/submit"),
            TestActor::member(2, GUILD),
        )
        .json(&json!({ "proof_text": "I did it" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_template_quest_and_delete() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);

    let templates: Value = server
        .request(Method::GET, "/api/v1/templates", master)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let template_id = templates[0]["template_id"].as_str().unwrap().to_string();

    let response = server
        .request(Method::POST, "/api/v1/quests/from_template", master)
        .json(&json!({ "template_id": template_id, "title": "Seasonal hunt" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let quest: Value = response.json().await.unwrap();
    assert_eq!(quest["title"], "Seasonal hunt");
    let quest_id = quest["quest_id"].as_str().unwrap().to_string();

    let response = server
        .request(Method::POST, "/api/v1/quests/from_template", master)
        .json(&json!({ "template_id": "no_such_template" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = server
        .request(
            Method::DELETE,
            &format!("/api/v1/quests/{quest_id}"),
            TestActor::member(3, GUILD),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = server
        .request(Method::DELETE, &format!("/api/v1/quests/{quest_id}"), master)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = server
        .request(Method::GET, &format!("/api/v1/quests/{quest_id}"), master)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_deadline_expiry_cancels_quest() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);
    let quest_id = server
        .create_quest(master, json!({ "title": "Before sundown" }))
        .await;

    let response = server
        .request(Method::PUT, &format!("/api/v1/quests/{quest_id}/deadline"), master)
        .json(&json!({ "hours": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = server
        .request(Method::PUT, &format!("/api/v1/quests/{quest_id}/deadline"), master)
        .json(&json!({ "hours": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = server
        .request(Method::PUT, &format!("/api/v1/quests/{quest_id}/deadline"), master)
        .json(&json!({ "hours": i64::MAX }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let report = server
        .state
        .scheduler
        .check_deadlines(chrono::Utc::now() + chrono::Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(report.quests_expired, 1);

    let quest: Value = server
        .request(Method::GET, &format!("/api/v1/quests/{quest_id}"), master)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quest["status"], "cancelled");

    let deadline: Value = server
        .request(Method::GET, &format!("/api/v1/quests/{quest_id}/deadline"), master)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deadline["deadline"]["expired"], true);

    let response = server
        .request(
            Method::POST,
            &format!("/api/v1/quests/{quest_id}/accept"),
            TestActor::member(2, GUILD),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn test_recurring_schedule_lifecycle() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);

    let response = server
        .request(Method::POST, "/api/v1/recurring", TestActor::member(2, GUILD))
        .json(&json!({ "template_id": "daily_hunt", "interval": "daily" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let templates: Value = server
        .request(Method::GET, "/api/v1/templates", master)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let template_id = templates[0]["template_id"].as_str().unwrap().to_string();

    let response = server
        .request(Method::POST, "/api/v1/recurring", master)
        .json(&json!({ "template_id": template_id, "interval": "daily", "interval_value": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let schedule: Value = response.json().await.unwrap();
    let schedule_id = schedule["id"].as_str().unwrap().to_string();

    let listed: Value = server
        .request(Method::GET, "/api/v1/recurring", master)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let outsider = TestActor::quest_master(9, 99);
    let response = server
        .request(Method::DELETE, &format!("/api/v1/recurring/{schedule_id}"), outsider)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = server
        .request(Method::DELETE, &format!("/api/v1/recurring/{schedule_id}"), master)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);
}
