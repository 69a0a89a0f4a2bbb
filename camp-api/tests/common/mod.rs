//! Common test utilities for integration tests
//!
//! Builds the full router over in-memory stores and a collecting mailer,
//! and wraps request/response plumbing so tests read as HTTP exchanges.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use camp_api::{
    app::{build_router, AppState},
    config::Config,
};
use camp_shared::{
    mail::{token_from_link, MemoryMailer},
    store::{memory::MemoryStore, Stores},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// A response with its body already read
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Values of every `Set-Cookie` header
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// Value of a cookie set by this response
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.set_cookies().into_iter().find_map(|c| {
            c.split(';')
                .next()
                .and_then(|pair| pair.strip_prefix(&prefix))
                .map(str::to_string)
        })
    }
}

/// A logged-in user
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Router plus handles on its collaborators
pub struct TestContext {
    pub app: Router,
    pub mailer: MemoryMailer,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(Config::for_tests())
    }

    pub fn with_config(config: Config) -> Self {
        let mailer = MemoryMailer::new();
        let state = AppState::new(
            Stores::memory(MemoryStore::new()),
            Arc::new(mailer.clone()),
            config.clone(),
        );

        Self {
            app: build_router(state),
            mailer,
            config,
        }
    }

    /// Sends a request; `body` is sent as JSON when present
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.request_with_cookie(method, uri, auth, None, body).await
    }

    pub async fn request_with_cookie(
        &self,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn register(&self, name: &str) -> TestResponse {
        self.request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": format!("{name}@example.com"),
                "username": name,
                "password": "launch2024",
            })),
        )
        .await
    }

    /// Token from the most recent mail sent to `email`
    pub async fn mailed_token(&self, email: &str) -> String {
        let message = self.mailer.last_to(email).await.expect("no mail sent");
        token_from_link(&message.body)
            .expect("no link in mail")
            .to_string()
    }

    pub async fn login(&self, name: &str) -> TestUser {
        let email = format!("{name}@example.com");
        let response = self
            .request(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": email, "password": "launch2024" })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);

        TestUser {
            id: response.body["user"]["id"].as_str().unwrap().to_string(),
            email,
            access_token: response.body["access_token"].as_str().unwrap().to_string(),
            refresh_token: response.body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Registers and logs in
    pub async fn signed_in(&self, name: &str) -> TestUser {
        assert_eq!(self.register(name).await.status, StatusCode::CREATED);
        self.login(name).await
    }

    /// Creates a project and returns its id
    pub async fn create_project(&self, owner: &TestUser, name: &str) -> String {
        let response = self
            .request(
                "POST",
                "/api/v1/projects",
                Some(&owner.bearer()),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    pub async fn add_member(&self, admin: &TestUser, project_id: &str, member: &TestUser, role: &str) {
        let response = self
            .request(
                "POST",
                &format!("/api/v1/projects/{project_id}/members"),
                Some(&admin.bearer()),
                Some(json!({ "email": member.email, "role": role })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    }

    /// Creates a task and returns its id
    pub async fn create_task(&self, author: &TestUser, project_id: &str, title: &str) -> String {
        let response = self
            .request(
                "POST",
                &format!("/api/v1/projects/{project_id}/tasks"),
                Some(&author.bearer()),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }
}
