use std::net::TcpListener;

use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use socialnet::{
    build_app, config::AuthConfig, init_db, promote_superusers, serve, RequestErrorJsonWrapper,
    UserResponse, UserWrapper,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

struct TestApp {
    address: String,
    client: reqwest::Client,
    pool: SqlitePool,
    _dir: TempDir,
}

struct TestUser {
    id: i64,
    token: String,
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db_url = format!("sqlite://{}", dir.path().join("socialnet.db").display());
    let pool = init_db(&db_url).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    let app = build_app(pool.clone(), AuthConfig::new("integration-secret", 1));
    tokio::spawn(serve(listener, app));

    TestApp {
        address,
        client: reqwest::Client::new(),
        pool,
        _dir: dir,
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn get(&self, path: &str, user: &TestUser) -> Response {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Token {}", user.token))
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, user: &TestUser, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Token {}", user.token))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn put(&self, path: &str, user: &TestUser, body: Value) -> Response {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Token {}", user.token))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, path: &str, user: &TestUser) -> Response {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Token {}", user.token))
            .send()
            .await
            .unwrap()
    }

    async fn register(&self, username: &str) -> TestUser {
        let response = self
            .client
            .post(self.url("/users"))
            .json(&json!({"user": {
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "correct-horse",
            }}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: UserWrapper<UserResponse> = response.json().await.unwrap();
        TestUser {
            id: body.user.id,
            token: body.user.token,
        }
    }
}

async fn json_body(response: Response) -> Value {
    response.json().await.unwrap()
}

#[tokio::test]
async fn health_and_auth_guard() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/check_health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "alive");

    let response = app.client.get(app.url("/feed")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error: RequestErrorJsonWrapper = response.json().await.unwrap();
    assert_eq!(error.errors.body, vec!["Need to be authorized".to_string()]);

    let forged = TestUser {
        id: 0,
        token: "not-a-jwt".into(),
    };
    assert_eq!(
        app.get("/feed", &forged).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let response = app.client.get(app.url("/nowhere")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_login_and_update_account() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;

    let duplicate = app
        .client
        .post(app.url("/users"))
        .json(&json!({"user": {"username": "alice", "password": "another-pass"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let invalid = app
        .client
        .post(app.url("/users"))
        .json(&json!({"user": {"username": "no spaces", "password": "long-enough"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let wrong = app
        .client
        .post(app.url("/users/login"))
        .json(&json!({"user": {"username": "alice", "password": "wrong-password"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let login = app
        .client
        .post(app.url("/users/login"))
        .json(&json!({"user": {"username": "alice", "password": "correct-horse"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    let body: UserWrapper<UserResponse> = login.json().await.unwrap();
    assert_eq!(body.user.id, alice.id);

    let updated = json_body(
        app.put("/user", &alice, json!({"user": {"email": "new@example.com"}}))
            .await,
    )
    .await;
    assert_eq!(updated["user"]["email"], "new@example.com");

    let profile = app
        .put(
            "/user/profile",
            &alice,
            json!({"profile": {"bio": "hello", "website": "https://alice.dev"}}),
        )
        .await;
    assert_eq!(profile.status(), StatusCode::OK);
    let profile = json_body(profile).await;
    assert_eq!(profile["profile"]["bio"], "hello");

    let bad_site = app
        .put("/user/profile", &alice, json!({"profile": {"website": "alice.dev"}}))
        .await;
    assert_eq!(bad_site.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn friendship_and_follow_flow() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    let first = json_body(app.post(&format!("/friends/{}", bob.id), &alice, json!({})).await).await;
    assert_eq!(first["outcome"], "created");
    let again = json_body(app.post(&format!("/friends/{}", bob.id), &alice, json!({})).await).await;
    assert_eq!(again["outcome"], "already_pending");
    assert_eq!(first["friendship"]["id"], again["friendship"]["id"]);

    let requests = json_body(app.get("/friend-requests", &bob).await).await;
    assert_eq!(requests["incoming"].as_array().unwrap().len(), 1);
    let friendship_id = requests["incoming"][0]["id"].as_i64().unwrap();

    let forbidden = app
        .post(&format!("/friend-requests/{friendship_id}/accept"), &alice, json!({}))
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    let accepted = json_body(
        app.post(&format!("/friend-requests/{friendship_id}/accept"), &bob, json!({}))
            .await,
    )
    .await;
    assert_eq!(accepted["friendship"]["status"], "accepted");
    let twice = app
        .post(&format!("/friend-requests/{friendship_id}/accept"), &bob, json!({}))
        .await;
    assert_eq!(twice.status(), StatusCode::UNPROCESSABLE_ENTITY);

    for (user, other) in [(&alice, "bob"), (&bob, "alice")] {
        let friends = json_body(app.get("/friends", user).await).await;
        assert_eq!(friends["friends"][0]["username"], other);
    }

    let profile = json_body(app.get("/profiles/bob", &alice).await).await;
    assert_eq!(profile["profile"]["relation"], "friends");
    assert_eq!(profile["profile"]["friends_count"], 1);

    let follow = json_body(app.post(&format!("/follows/{}", bob.id), &alice, json!({})).await).await;
    assert_eq!(follow["changed"], true);
    let follow = json_body(app.post(&format!("/follows/{}", bob.id), &alice, json!({})).await).await;
    assert_eq!(follow["changed"], false);
    let followers = json_body(app.get("/followers", &bob).await).await;
    assert_eq!(followers["followers"].as_array().unwrap().len(), 1);

    let unfollow = app.delete(&format!("/follows/{}", bob.id), &alice).await;
    assert_eq!(unfollow.status(), StatusCode::OK);
    let following = json_body(app.get("/following", &alice).await).await;
    assert!(following["following"].as_array().unwrap().is_empty());

    let removed = app.delete(&format!("/friends/{}", bob.id), &alice).await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let missing = app.delete(&format!("/friends/{}", bob.id), &alice).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conversations_and_notifications() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let mallory = app.register("mallory").await;

    let first = json_body(app.post("/conversations", &alice, json!({"user_id": bob.id})).await).await;
    assert_eq!(first["created"], true);
    let second = json_body(app.post("/conversations", &bob, json!({"user_id": alice.id})).await).await;
    assert_eq!(second["created"], false);
    let id = first["conversation"]["id"].as_i64().unwrap();
    assert_eq!(second["conversation"]["id"].as_i64().unwrap(), id);

    let sent = app
        .post(
            &format!("/conversations/{id}/messages"),
            &alice,
            json!({"message": {"content": "hi bob"}}),
        )
        .await;
    assert_eq!(sent.status(), StatusCode::OK);

    let outsider = app.get(&format!("/conversations/{id}"), &mallory).await;
    assert_eq!(outsider.status(), StatusCode::FORBIDDEN);

    let list = json_body(app.get("/conversations", &bob).await).await;
    assert_eq!(list["conversations"][0]["unread_count"], 1);

    let detail = json_body(app.get(&format!("/conversations/{id}"), &bob).await).await;
    assert_eq!(detail["conversation"]["messages"][0]["content"], "hi bob");
    assert_eq!(detail["conversation"]["messages"][0]["is_read"], true);

    let notifications = json_body(app.get("/notifications", &bob).await).await;
    assert_eq!(notifications["unread_count"], 1);
    assert_eq!(notifications["notifications"][0]["notification_type"], "message");
    let notification_id = notifications["notifications"][0]["id"].as_i64().unwrap();

    let not_yours = app
        .delete(&format!("/notifications/{notification_id}"), &alice)
        .await;
    assert_eq!(not_yours.status(), StatusCode::NOT_FOUND);

    let marked = json_body(app.put("/notifications", &bob, json!({})).await).await;
    assert_eq!(marked["updated"], 1);
    let deleted = app
        .delete(&format!("/notifications/{notification_id}"), &bob)
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn feed_likes_and_comments() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let stranger = app.register("stranger").await;

    app.post(&format!("/follows/{}", alice.id), &bob, json!({})).await;
    let post = json_body(
        app.post("/posts", &alice, json!({"post": {"content": "first post"}}))
            .await,
    )
    .await;
    let post_id = post["post"]["id"].as_i64().unwrap();

    let feed = json_body(app.get("/feed?limit=5", &bob).await).await;
    assert_eq!(feed["postsCount"], 1);
    assert_eq!(feed["posts"][0]["author"], "alice");
    let empty = json_body(app.get("/feed", &stranger).await).await;
    assert_eq!(empty["postsCount"], 0);

    app.post("/posts", &alice, json!({"post": {"content": "second post"}}))
        .await;
    let page = json_body(app.get("/feed?limit=1", &bob).await).await;
    assert_eq!(page["posts"].as_array().unwrap().len(), 1);
    assert_eq!(page["postsCount"], 2);

    let hidden = app.get(&format!("/posts/{post_id}"), &stranger).await;
    assert_eq!(hidden.status(), StatusCode::FORBIDDEN);

    let like = json_body(app.post(&format!("/posts/{post_id}/like"), &bob, json!({})).await).await;
    assert_eq!(like["liked"], true);
    assert_eq!(like["likes_count"], 1);
    let unlike = json_body(app.post(&format!("/posts/{post_id}/like"), &bob, json!({})).await).await;
    assert_eq!(unlike["liked"], false);
    assert_eq!(unlike["likes_count"], 0);

    let comment = json_body(
        app.post(
            &format!("/posts/{post_id}/comments"),
            &bob,
            json!({"comment": {"content": "nice"}}),
        )
        .await,
    )
    .await;
    let comment_id = comment["comment"]["id"].as_i64().unwrap();

    let detail = json_body(app.get(&format!("/posts/{post_id}"), &alice).await).await;
    assert_eq!(detail["post"]["comments"][0]["content"], "nice");
    assert_eq!(detail["post"]["comments_count"], 1);

    let removed = app
        .delete(&format!("/post-comments/{comment_id}"), &alice)
        .await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);

    let not_author = app.delete(&format!("/posts/{post_id}"), &bob).await;
    assert_eq!(not_author.status(), StatusCode::FORBIDDEN);
    let deleted = app.delete(&format!("/posts/{post_id}"), &alice).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn groups_public_and_private() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;

    let public = json_body(
        app.post("/groups", &alice, json!({"group": {"name": "Rustaceans"}}))
            .await,
    )
    .await;
    assert_eq!(public["group"]["role"], "admin");
    let public_id = public["group"]["id"].as_i64().unwrap();

    let joined = json_body(app.post(&format!("/groups/{public_id}/join"), &bob, json!({})).await).await;
    assert_eq!(joined["group"]["members_count"], 2);
    let again = app.post(&format!("/groups/{public_id}/join"), &bob, json!({})).await;
    assert_eq!(again.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let post = json_body(
        app.post(
            &format!("/groups/{public_id}/posts"),
            &bob,
            json!({"post": {"content": "hello group"}}),
        )
        .await,
    )
    .await;
    let post_id = post["post"]["id"].as_i64().unwrap();
    app.post(
        &format!("/group-posts/{post_id}/comments"),
        &alice,
        json!({"comment": {"content": "welcome"}}),
    )
    .await;

    let detail = json_body(app.get(&format!("/groups/{public_id}"), &bob).await).await;
    assert_eq!(detail["group"]["posts"][0]["comments"][0]["content"], "welcome");

    let notifications = json_body(app.get("/notifications", &alice).await).await;
    assert_eq!(notifications["notifications"][0]["notification_type"], "group_post");

    let private = json_body(
        app.post(
            "/groups",
            &alice,
            json!({"group": {"name": "Inner circle", "is_private": true}}),
        )
        .await,
    )
    .await;
    let private_id = private["group"]["id"].as_i64().unwrap();
    let refused = app.post(&format!("/groups/{private_id}/join"), &bob, json!({})).await;
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);
    let hidden = json_body(app.get(&format!("/groups/{private_id}"), &bob).await).await;
    assert!(hidden["group"]["members"].as_array().unwrap().is_empty());

    let added = app
        .post(
            &format!("/groups/{private_id}/members/{}", bob.id),
            &alice,
            json!({}),
        )
        .await;
    assert_eq!(added.status(), StatusCode::OK);
    let visible = json_body(app.get(&format!("/groups/{private_id}"), &bob).await).await;
    assert_eq!(visible["group"]["members"].as_array().unwrap().len(), 2);

    let creator_leaves = app.post(&format!("/groups/{public_id}/leave"), &alice, json!({})).await;
    assert_eq!(creator_leaves.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let not_creator = app.delete(&format!("/groups/{public_id}"), &bob).await;
    assert_eq!(not_creator.status(), StatusCode::FORBIDDEN);
    let deleted = app.delete(&format!("/groups/{public_id}"), &alice).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn reviews_update_in_place() {
    let app = spawn_app().await;
    let alice = app.register("alice").await;
    app.register("bob").await;

    let first = app
        .post(
            "/profiles/bob/reviews",
            &alice,
            json!({"review": {"rating": 3, "comment": "ok"}}),
        )
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = app
        .post(
            "/profiles/bob/reviews",
            &alice,
            json!({"review": {"rating": 5, "comment": "great"}}),
        )
        .await;
    assert_eq!(second.status(), StatusCode::OK);

    let reviews = json_body(app.get("/profiles/bob/reviews", &alice).await).await;
    assert_eq!(reviews["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(reviews["average_rating"], 5.0);

    let self_review = app
        .post("/profiles/alice/reviews", &alice, json!({"review": {"rating": 4}}))
        .await;
    assert_eq!(self_review.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let out_of_range = app
        .post("/profiles/bob/reviews", &alice, json!({"review": {"rating": 9}}))
        .await;
    assert_eq!(out_of_range.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn news_is_managed_by_superusers() {
    let app = spawn_app().await;
    let admin = app.register("admin").await;
    let reader = app.register("reader").await;

    let denied = app
        .post(
            "/news",
            &admin,
            json!({"news": {"title": "Launch", "content": "We are live"}}),
        )
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    promote_superusers(&app.pool, &["admin".to_string()])
        .await
        .unwrap();
    for (title, pinned) in [("Pinned", true), ("Update", false)] {
        let created = app
            .post(
                "/news",
                &admin,
                json!({"news": {"title": title, "content": "body", "is_pinned": pinned}}),
            )
            .await;
        assert_eq!(created.status(), StatusCode::OK);
    }

    let list = json_body(app.get("/news", &reader).await).await;
    assert_eq!(list["news"][0]["title"], "Pinned");
    assert_eq!(list["news"][1]["title"], "Update");
    let id = list["news"][1]["id"].as_i64().unwrap();

    let reader_edit = app
        .put(&format!("/news/{id}"), &reader, json!({"news": {"is_pinned": true}}))
        .await;
    assert_eq!(reader_edit.status(), StatusCode::FORBIDDEN);
    let edited = json_body(
        app.put(&format!("/news/{id}"), &admin, json!({"news": {"title": "Updated"}}))
            .await,
    )
    .await;
    assert_eq!(edited["news"]["title"], "Updated");

    let deleted = app.delete(&format!("/news/{id}"), &admin).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let gone = app.get(&format!("/news/{id}"), &reader).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}
