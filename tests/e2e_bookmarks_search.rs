//! E2E tests for bookmarks, search, teams and guild analytics

mod common;

use common::{TestActor, TestServer};
use reqwest::Method;
use serde_json::{Value, json};

const GUILD: i64 = 20;

async fn get_json(server: &TestServer, path: &str, actor: TestActor) -> Value {
    let response = server
        .request(Method::GET, path, actor)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200, "GET {path}");
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_bookmark_add_refresh_remove() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);
    let reader = TestActor::member(2, GUILD);
    let quest_id = server
        .create_quest(master, json!({ "title": "Later maybe" }))
        .await;

    let response = server
        .request(Method::POST, &format!("/api/v1/quests/{quest_id}/bookmark"), reader)
        .json(&json!({ "notes": "weekend" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["change"], "created");
    assert_eq!(body["bookmark_count"], 1);

    let response = server
        .request(Method::POST, &format!("/api/v1/quests/{quest_id}/bookmark"), reader)
        .json(&json!({ "notes": "tonight" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["change"], "updated");
    assert_eq!(body["bookmark_count"], 1);

    let bookmarks = get_json(&server, "/api/v1/bookmarks", reader).await;
    assert_eq!(bookmarks.as_array().unwrap().len(), 1);
    assert_eq!(bookmarks[0]["notes"], "tonight");

    let response = server
        .request(Method::DELETE, &format!("/api/v1/quests/{quest_id}/bookmark"), reader)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = server
        .request(Method::DELETE, &format!("/api/v1/quests/{quest_id}/bookmark"), reader)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_search_is_case_insensitive_and_tenant_scoped() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);

    for (title, rank) in [
        ("Dragon hatchling", "easy"),
        ("Red dragon lair", "hard"),
        ("Wolf den", "hard"),
    ] {
        server
            .create_quest(master, json!({ "title": title, "rank": rank }))
            .await;
    }
    server
        .create_quest(
            TestActor::quest_master(5, GUILD + 1),
            json!({ "title": "Dragon elsewhere", "rank": "hard" }),
        )
        .await;

    let results = get_json(&server, "/api/v1/search?keyword=DRAGON&rank=hard", master).await;
    let titles: Vec<&str> = results
        .as_array()
        .unwrap()
        .iter()
        .map(|quest| quest["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Red dragon lair"]);

    let all = get_json(&server, "/api/v1/search?keyword=dragon", master).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let limited = get_json(&server, "/api/v1/search?limit=1", master).await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_team_fills_to_capacity() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);
    let quest_id = server
        .create_quest(master, json!({ "title": "Raid the keep" }))
        .await;

    let leader = TestActor::member(10, GUILD);
    let response = server
        .request(Method::POST, &format!("/api/v1/quests/{quest_id}/team"), leader)
        .json(&json!({ "team_size": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    let response = server
        .request(Method::POST, &format!("/api/v1/quests/{quest_id}/team/join"), leader)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let joined: Value = server
        .request(
            Method::POST,
            &format!("/api/v1/quests/{quest_id}/team/join"),
            TestActor::member(11, GUILD),
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(joined["member_count"], 2);
    assert_eq!(joined["team_complete"], true);

    let response = server
        .request(
            Method::POST,
            &format!("/api/v1/quests/{quest_id}/team/join"),
            TestActor::member(12, GUILD),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let team = get_json(&server, &format!("/api/v1/quests/{quest_id}/team"), leader).await;
    assert_eq!(team["team"]["team_leader"], 10);
    assert_eq!(team["members"].as_array().unwrap().len(), 2);
    assert_eq!(team["members"][0]["team_role"], "leader");
}

#[tokio::test]
async fn test_guild_analytics_reflect_outcomes() {
    let server = TestServer::new().await;
    let master = TestActor::quest_master(1, GUILD);
    let hunt = server
        .create_quest(master, json!({ "title": "Hunt", "category": "hunting" }))
        .await;
    let build = server
        .create_quest(master, json!({ "title": "Build", "category": "building" }))
        .await;

    for (user_id, quest_id, approve) in [(2, &hunt, true), (3, &hunt, false), (2, &build, true)] {
        let actor = TestActor::member(user_id, GUILD);
        server
            .request(Method::POST, &format!("/api/v1/quests/{quest_id}/accept"), actor)
            .send()
            .await
            .unwrap();
        server
            .request(Method::POST, &format!("/api/v1/quests/{quest_id}/submit"), actor)
            .json(&json!({ "proof_text": "done" }))
            .send()
            .await
            .unwrap();
        let verdict = if approve { "approve" } else { "reject" };
        let response = server
            .request(
                Method::POST,
                &format!("/api/v1/quests/{quest_id}/{verdict}/{user_id}"),
                master,
            )
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let popular = get_json(&server, "/api/v1/analytics/popular", master).await;
    assert_eq!(popular[0]["quest_id"], hunt.as_str());

    let categories = get_json(&server, "/api/v1/analytics/categories", master).await;
    assert_eq!(categories.as_array().unwrap().len(), 2);

    let trending = get_json(&server, "/api/v1/analytics/trending?days=1", master).await;
    assert_eq!(trending[0]["quest_id"], hunt.as_str());
    assert_eq!(trending[0]["total_accepts"], 2);

    let response = server
        .request(
            Method::GET,
            &format!("/api/v1/analytics/trending?days={}", i64::MAX),
            master,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let overview = get_json(&server, "/api/v1/analytics", master).await;
    assert_eq!(overview["total_quests"], 2);
    assert_eq!(overview["completed_quests"], 2);
    assert_eq!(overview["active_users"], 2);
}

#[tokio::test]
async fn test_channel_routing_round_trip() {
    let server = TestServer::new().await;
    let admin = TestActor::admin(1, GUILD);

    let empty = get_json(&server, "/api/v1/channels", TestActor::member(2, GUILD)).await;
    assert_eq!(empty["guild_id"], GUILD);
    assert_eq!(empty["quest_list_channel"], Value::Null);

    let response = server
        .request(Method::PUT, "/api/v1/channels", TestActor::quest_master(3, GUILD))
        .json(&json!({ "quest_list_channel": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = server
        .request(Method::PUT, "/api/v1/channels", admin)
        .json(&json!({ "quest_list_channel": 100, "notification_channel": 101 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let stored = get_json(&server, "/api/v1/channels", admin).await;
    assert_eq!(stored["quest_list_channel"], 100);
    assert_eq!(stored["notification_channel"], 101);
}
