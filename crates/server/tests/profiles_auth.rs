mod common;

use common::{error_code, FakeChat, FakeSpeech, Harness};
use serde_json::json;

async fn harness() -> Harness {
    Harness::new(FakeChat::default(), FakeSpeech::default()).await
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let h = harness().await;
    h.register("ada", "ada@example.com", "secret1").await;

    let response = h
        .execute(
            r#"mutation { addYapper(input: {name: "ada2", email: "ADA@example.com", password: "secret2"}) { token } }"#,
            json!({}),
        )
        .await;
    assert_eq!(error_code(&response), "DUPLICATE_KEY");

    let yappers = h.execute("{ yappers { name } }", json!({})).await;
    let data = yappers.data.into_json().unwrap();
    assert_eq!(data["yappers"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_login_token_identifies_profile() {
    let h = harness().await;
    let (id, _) = h.register("ada", "ada@example.com", "secret1").await;
    h.register("grace", "grace@example.com", "secret2").await;

    let response = h
        .execute(
            r#"mutation($email: String!, $password: String!) {
                login(email: $email, password: $password) { token yapper { name } }
            }"#,
            json!({ "email": "ada@example.com", "password": "secret1" }),
        )
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let data = response.data.into_json().unwrap();
    let token = data["login"]["token"].as_str().unwrap();
    let claims = h.state.auth.verify_token(token).unwrap();
    assert_eq!(claims.id, id);
    assert_eq!(claims.username, "ada");
    assert_eq!(claims.exp - claims.iat, 2 * 60 * 60);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let h = harness().await;
    h.register("ada", "ada@example.com", "secret1").await;

    let response = h
        .execute(
            r#"mutation { login(email: "ada@example.com", password: "nope!") { token } }"#,
            json!({}),
        )
        .await;
    assert_eq!(error_code(&response), "UNAUTHENTICATED");

    let unknown = h
        .execute(
            r#"mutation { login(email: "who@example.com", password: "secret1") { token } }"#,
            json!({}),
        )
        .await;
    assert_eq!(error_code(&unknown), "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_caller_scoped_mutations_require_auth() {
    let h = harness().await;
    let (id, _) = h.register("ada", "ada@example.com", "secret1").await;

    for query in [
        r#"mutation { removeSkill(skill: "small talk") { _id } }"#,
        r#"mutation { removeYapper { _id } }"#,
        r#"mutation { updateProgress(input: {hearts: 1}) { _id } }"#,
        r#"mutation { followUser(yapperId: "someone") { _id } }"#,
        r#"mutation { unfollowUser(yapperId: "someone") { _id } }"#,
        r#"{ me { _id } }"#,
    ] {
        let response = h.execute(query, json!({})).await;
        assert_eq!(error_code(&response), "UNAUTHENTICATED", "{query}");
    }

    // Nothing was removed
    let response = h
        .execute("query($id: ID!) { yapper(id: $id) { name } }", json!({ "id": id }))
        .await;
    assert!(response.errors.is_empty());
}

#[tokio::test]
async fn test_progress_and_skills_for_caller() {
    let h = harness().await;
    let (id, token) = h.register("ada", "ada@example.com", "secret1").await;

    let response = h
        .execute(
            r#"mutation($id: ID!) { addSkill(yapperId: $id, skill: "storytelling") { skills } }"#,
            json!({ "id": id }),
        )
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let response = h
        .execute_as(
            &token,
            r#"mutation { updateProgress(input: {activeLevel: 3, completedLevels: 2}) {
                activeLevel completedLevels hearts
            } }"#,
            json!({}),
        )
        .await;
    let data = response.data.into_json().unwrap();
    assert_eq!(data["updateProgress"]["activeLevel"], 3);
    assert_eq!(data["updateProgress"]["completedLevels"], 2);
    assert_eq!(data["updateProgress"]["hearts"], 5);

    let response = h
        .execute_as(
            &token,
            r#"mutation { removeSkill(skill: "storytelling") { skills } }"#,
            json!({}),
        )
        .await;
    let data = response.data.into_json().unwrap();
    assert_eq!(data["removeSkill"]["skills"], json!([]));
}

#[tokio::test]
async fn test_follow_and_remove_profile() {
    let h = harness().await;
    let (ada_id, ada_token) = h.register("ada", "ada@example.com", "secret1").await;
    let (grace_id, grace_token) = h.register("grace", "grace@example.com", "secret2").await;

    let response = h
        .execute_as(
            &ada_token,
            r#"mutation($id: ID!) { followUser(yapperId: $id) { followingCount following { name } } }"#,
            json!({ "id": grace_id }),
        )
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["followUser"]["followingCount"], 1);
    assert_eq!(data["followUser"]["following"][0]["name"], "grace");

    let response = h
        .execute_as(&grace_token, "{ me { followers { _id } } }", json!({}))
        .await;
    let data = response.data.into_json().unwrap();
    assert_eq!(data["me"]["followers"][0]["_id"], ada_id.as_str());

    // Self-removal drops the follow edge too
    let response = h
        .execute_as(&ada_token, "mutation { removeYapper { name } }", json!({}))
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);

    let response = h
        .execute_as(&grace_token, "{ me { followerCount } }", json!({}))
        .await;
    let data = response.data.into_json().unwrap();
    assert_eq!(data["me"]["followerCount"], 0);
}

#[tokio::test]
async fn test_characters_catalogue() {
    let h = harness().await;
    let response = h
        .execute(r#"{ characters { id name voiceId } character(id: "1") { name } }"#, json!({}))
        .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert!(!data["characters"].as_array().unwrap().is_empty());
    assert!(data["character"]["name"].is_string());
}
