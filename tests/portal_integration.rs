//! Integration tests for the portal's HTTP surface.
//!
//! Host-dependent routing is driven in-process with `oneshot`; the sign-in
//! to dashboard journey runs against a real server on a random port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tower::ServiceExt;
use uuid::Uuid;

use tenant_portal::config::{AppConfig, DomainConfig, IdentityConfig, LocaleConfig, RouteConfig};
use tenant_portal::error::IdentityError;
use tenant_portal::identity::{
    IdentityProvider, Organization, Profile, ProfileUpdate, Session, User,
};
use tenant_portal::server::build_router;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const SESSION_COOKIE: &str = "sb-access-token";
const VALID_OTP: &str = "123456";

/// In-memory identity backend: accepts one passcode for every address.
#[derive(Default)]
struct StubIdentity {
    sessions: Mutex<HashMap<String, User>>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    organizations: Mutex<Vec<Organization>>,
    sent: Mutex<Vec<String>>,
}

impl StubIdentity {
    /// Seed a signed-in user; returns the access token.
    fn sign_in(&self, full_name: Option<&str>) -> String {
        let id = Uuid::new_v4();
        let token = format!("session-{id}");
        self.sessions.lock().unwrap().insert(
            token.clone(),
            User {
                id,
                email: Some("ada@example.com".into()),
            },
        );
        self.profiles.lock().unwrap().insert(
            id,
            Profile {
                id,
                full_name: full_name.map(String::from),
                avatar_url: None,
                created_at: None,
            },
        );
        token
    }

    /// A live session whose `users` row is missing.
    fn sign_in_without_profile(&self) -> String {
        let token = self.sign_in(None);
        let id = self.sessions.lock().unwrap()[&token].id;
        self.profiles.lock().unwrap().remove(&id);
        token
    }
}

/// Organization name the stub backend refuses to insert.
const REJECTED_ORG: &str = "Ghost Org";

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn get_current_user(&self, access_token: &str) -> Result<Option<User>, IdentityError> {
        Ok(self.sessions.lock().unwrap().get(access_token).cloned())
    }

    async fn get_profile_by_id(
        &self,
        _access_token: &str,
        id: Uuid,
    ) -> Result<Option<Profile>, IdentityError> {
        Ok(self.profiles.lock().unwrap().get(&id).cloned())
    }

    async fn sign_in_with_otp(&self, email: &str) -> Result<(), IdentityError> {
        if email.ends_with("@unreachable.test") {
            return Err(IdentityError::RequestFailed {
                endpoint: "/auth/v1/otp".into(),
                reason: "connection refused".into(),
            });
        }
        self.sent.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn verify_otp(&self, email: &str, token: &str) -> Result<Session, IdentityError> {
        if token != VALID_OTP || !self.sent.lock().unwrap().iter().any(|e| e == email) {
            return Err(IdentityError::Status {
                endpoint: "/auth/v1/verify".into(),
                status: 403,
                body: "Token has expired or is invalid".into(),
            });
        }
        let access_token = self.sign_in(None);
        let user = self.sessions.lock().unwrap()[&access_token].clone();
        Ok(Session {
            access_token: SecretString::from(access_token),
            refresh_token: None,
            expires_in: Some(3600),
            user,
        })
    }

    async fn update_profile(
        &self,
        _access_token: &str,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Profile, IdentityError> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles.get_mut(&id).ok_or_else(|| IdentityError::NotFound {
            entity: "profile".into(),
            id: id.to_string(),
        })?;
        if let Some(name) = &update.full_name {
            profile.full_name = Some(name.clone());
        }
        Ok(profile.clone())
    }

    async fn create_organization(
        &self,
        _access_token: &str,
        name: &str,
        owner_id: Uuid,
    ) -> Result<Organization, IdentityError> {
        if name == REJECTED_ORG {
            return Err(IdentityError::Status {
                endpoint: "/rest/v1/organizations".into(),
                status: 409,
                body: "duplicate key value".into(),
            });
        }
        let org = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            created_at: None,
        };
        self.organizations.lock().unwrap().push(org.clone());
        Ok(org)
    }
}

fn test_config(root_domain: &str) -> AppConfig {
    AppConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        domain: DomainConfig {
            root_domain: root_domain.to_string(),
            ..Default::default()
        },
        locale: LocaleConfig::default(),
        routes: RouteConfig::default(),
        identity: IdentityConfig {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: SecretString::from("anon".to_string()),
            request_timeout: Duration::from_secs(1),
        },
        session_cookie: SESSION_COOKIE.to_string(),
        otp_cooldown: Duration::from_secs(60),
    }
}

fn app(identity: Arc<StubIdentity>, root_domain: &str) -> Router {
    build_router(identity, &test_config(root_domain))
}

/// Start the portal on a random port, return its base URL.
async fn start_server(identity: Arc<StubIdentity>) -> String {
    let router = app(identity, "localhost:3000");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://{addr}")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn get(host: &str, path: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path).header(header::HOST, host);
    if let Some(token) = session {
        builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(path: &str, session: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::HOST, "localhost:3000")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = session {
        builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn location(resp: &axum::response::Response) -> Option<&str> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `name=value` from the first `Set-Cookie` header naming `name`.
fn set_cookie(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")))
        .map(str::to_string)
}

// ── Routing (in-process) ────────────────────────────────────────────────

#[tokio::test]
async fn unprefixed_paths_redirect_to_default_locale() {
    timeout(TEST_TIMEOUT, async {
        let app = app(Arc::new(StubIdentity::default()), "localhost:3000");

        let resp = app
            .clone()
            .oneshot(get("localhost:3000", "/", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&resp), Some("/en"));

        let resp = app
            .oneshot(get("localhost:3000", "/dashboard?tab=orgs", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&resp), Some("/en/dashboard?tab=orgs"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn tenant_subdomain_is_rewritten_not_redirected() {
    timeout(TEST_TIMEOUT, async {
        let app = app(Arc::new(StubIdentity::default()), "localhost:3000");

        let resp = app
            .oneshot(get("acme.localhost:3000", "/en/dashboard/settings", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(location(&resp).is_none());

        let body = json_body(resp).await;
        assert_eq!(body["page"], "tenant");
        assert_eq!(body["tenant"], "acme");
        assert_eq!(body["locale"], "en");
        assert_eq!(body["path"], "dashboard/settings");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn localhost_in_query_keeps_tenant() {
    timeout(TEST_TIMEOUT, async {
        let app = app(Arc::new(StubIdentity::default()), "example.com");

        let resp = app
            .oneshot(get("acme.example.com", "/en/dashboard?ref=localhost", None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(location(&resp).is_none());
        let body = json_body(resp).await;
        assert_eq!(body["tenant"], "acme");
        assert_eq!(body["path"], "dashboard");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn production_and_preview_hosts() {
    timeout(TEST_TIMEOUT, async {
        let app = app(Arc::new(StubIdentity::default()), "example.com");

        let resp = app
            .clone()
            .oneshot(get("globex.example.com", "/es", None))
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["tenant"], "globex");
        assert_eq!(body["locale"], "es");

        let resp = app
            .clone()
            .oneshot(get("initech---pr42.vercel.app", "/en", None))
            .await
            .unwrap();
        assert_eq!(json_body(resp).await["tenant"], "initech");

        // Root and www are the portal itself, so gating applies.
        for host in ["example.com", "www.example.com"] {
            let resp = app
                .clone()
                .oneshot(get(host, "/en/dashboard", None))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "{host}");
            assert_eq!(location(&resp), Some("/sign-in"), "{host}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn gate_follows_session_and_profile() {
    timeout(TEST_TIMEOUT, async {
        let identity = Arc::new(StubIdentity::default());
        let fresh = identity.sign_in(None);
        let onboarded = identity.sign_in(Some("Ada Lovelace"));
        let app = app(Arc::clone(&identity), "localhost:3000");

        let cases: &[(&str, Option<&str>, Option<&str>)] = &[
            ("/en/dashboard", None, Some("/sign-in")),
            ("/en/dashboard", Some("bogus"), Some("/sign-in")),
            ("/en/dashboard", Some(fresh.as_str()), Some("/onboarding")),
            ("/en/dashboard/org/7", Some(onboarded.as_str()), None),
            ("/en/onboarding", None, Some("/sign-in")),
            ("/en/onboarding", Some(fresh.as_str()), None),
            ("/es/onboarding", Some(onboarded.as_str()), Some("/dashboard")),
            ("/en/sign-in", None, None),
            ("/en/sign-in", Some(fresh.as_str()), Some("/onboarding")),
            ("/en/sign-up", Some(onboarded.as_str()), Some("/dashboard")),
            ("/en", Some(onboarded.as_str()), None),
        ];

        for (path, session, expected) in cases {
            let resp = app
                .clone()
                .oneshot(get("localhost:3000", path, *session))
                .await
                .unwrap();
            assert_eq!(location(&resp), *expected, "{path} with {session:?}");
            let status = if expected.is_some() {
                StatusCode::TEMPORARY_REDIRECT
            } else {
                StatusCode::OK
            };
            assert_eq!(resp.status(), status, "{path} with {session:?}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn excluded_paths_skip_the_gate() {
    timeout(TEST_TIMEOUT, async {
        let app = app(Arc::new(StubIdentity::default()), "localhost:3000");

        for path in ["/favicon.ico", "/_next/static/app.js", "/api/unknown"] {
            let resp = app
                .clone()
                .oneshot(get("acme.localhost:3000", path, None))
                .await
                .unwrap();
            assert_ne!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
            assert!(location(&resp).is_none(), "{path}");
            assert!(json_body(resp).await["tenant"].is_null(), "{path}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn concurrent_tenants_are_independent() {
    timeout(TEST_TIMEOUT, async {
        let app = app(Arc::new(StubIdentity::default()), "example.com");
        let tenants = ["acme", "globex", "initech", "umbrella"];

        let responses = futures::future::join_all(tenants.iter().map(|t| {
            app.clone()
                .oneshot(get(&format!("{t}.example.com"), "/en/reports", None))
        }))
        .await;

        for (tenant, resp) in tenants.iter().zip(responses) {
            let body = json_body(resp.unwrap()).await;
            assert_eq!(body["tenant"], *tenant);
            assert_eq!(body["path"], "reports");
        }
    })
    .await
    .expect("test timed out");
}

// ── Auth API (over TCP) ─────────────────────────────────────────────────

#[tokio::test]
async fn request_otp_validates_and_sets_cooldown() {
    timeout(TEST_TIMEOUT, async {
        let identity = Arc::new(StubIdentity::default());
        let base = start_server(Arc::clone(&identity)).await;
        let http = client();

        let resp = http
            .post(format!("{base}/api/auth/request-otp"))
            .json(&json!({ "email": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Email is required");

        let resp = http
            .post(format!("{base}/api/auth/request-otp"))
            .json(&json!({ "email": "ops@unreachable.test" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Failed to send OTP");

        let resp = http
            .post(format!("{base}/api/auth/request-otp"))
            .json(&json!({ "email": "ada@example.com" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let cooldown = set_cookie(&resp, "otp_next_allowed_at").expect("cooldown cookie");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], false);
        let next_allowed_at = body["nextAllowedAt"].as_i64().unwrap();
        assert_eq!(cooldown, format!("otp_next_allowed_at={next_allowed_at}"));

        let body: Value = http
            .get(format!("{base}/api/auth/otp-next-allowed"))
            .header(reqwest::header::COOKIE, cooldown)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["nextAllowedAt"], next_allowed_at);

        let body: Value = http
            .get(format!("{base}/api/auth/otp-next-allowed"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body["nextAllowedAt"].is_null());

        assert_eq!(*identity.sent.lock().unwrap(), vec!["ada@example.com"]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn onboarding_requires_session() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(Arc::new(StubIdentity::default())).await;

        let resp = client()
            .post(format!("{base}/api/onboarding"))
            .json(&json!({ "first_name": "Ada", "organization_name": "Analytical" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "User not authenticated");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn sign_in_then_onboard_then_dashboard() {
    timeout(TEST_TIMEOUT, async {
        let identity = Arc::new(StubIdentity::default());
        let base = start_server(Arc::clone(&identity)).await;
        let http = client();

        http.post(format!("{base}/api/auth/request-otp"))
            .json(&json!({ "email": "ada@example.com" }))
            .send()
            .await
            .unwrap();

        // Wrong length is rejected before the backend is asked.
        let resp = http
            .post(format!("{base}/api/auth/verify-otp"))
            .json(&json!({ "email": "ada@example.com", "token": "123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Failed to verify OTP");

        let resp = http
            .post(format!("{base}/api/auth/verify-otp"))
            .json(&json!({ "email": "ada@example.com", "token": "654321" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let resp = http
            .post(format!("{base}/api/auth/verify-otp"))
            .json(&json!({ "email": "ada@example.com", "token": " 123456 " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let session = set_cookie(&resp, SESSION_COOKIE).expect("session cookie");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "OTP verified successfully");

        let resp = http
            .get(format!("{base}/en/dashboard"))
            .header(reqwest::header::COOKIE, &session)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers()[reqwest::header::LOCATION], "/onboarding");

        let resp = http
            .post(format!("{base}/api/onboarding"))
            .header(reqwest::header::COOKIE, &session)
            .json(&json!({ "first_name": "A", "organization_name": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = resp.json().await.unwrap();
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["field"].as_str())
            .collect();
        assert_eq!(fields, vec!["first_name", "organization_name"]);

        let resp = http
            .post(format!("{base}/api/onboarding"))
            .header(reqwest::header::COOKIE, &session)
            .json(&json!({
                "first_name": "Ada",
                "last_name": "Lovelace",
                "organization_name": "Analytical Engines",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["profile"]["full_name"], "Ada Lovelace");
        assert_eq!(body["organization"]["name"], "Analytical Engines");
        assert_eq!(body["organization"]["owner_id"], body["profile"]["id"]);

        let resp = http
            .get(format!("{base}/en/dashboard"))
            .header(reqwest::header::COOKIE, &session)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["page"], "dashboard");

        let resp = http
            .get(format!("{base}/en/onboarding"))
            .header(reqwest::header::COOKIE, &session)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers()[reqwest::header::LOCATION], "/dashboard");

        assert_eq!(identity.organizations.lock().unwrap().len(), 1);
    })
    .await
    .expect("test timed out");
}

// ── Auth API error shapes (in-process) ──────────────────────────────────

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
    timeout(TEST_TIMEOUT, async {
        let identity = Arc::new(StubIdentity::default());
        let session = identity.sign_in(None);
        let app = app(Arc::clone(&identity), "localhost:3000");

        for path in [
            "/api/auth/request-otp",
            "/api/auth/verify-otp",
            "/api/onboarding",
        ] {
            let resp = app
                .clone()
                .oneshot(post_json(path, Some(&session), "{not json"))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(
                resp.headers()[header::CONTENT_TYPE],
                "application/json",
                "{path}"
            );
            let body = json_body(resp).await;
            assert_eq!(body["error"], true, "{path}");
            assert_eq!(body["message"], "Invalid request body", "{path}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn onboarding_reports_backend_failures() {
    timeout(TEST_TIMEOUT, async {
        let identity = Arc::new(StubIdentity::default());
        let app = app(Arc::clone(&identity), "localhost:3000");

        let orphan = identity.sign_in_without_profile();
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/onboarding",
                Some(&orphan),
                r#"{"first_name":"Ada","organization_name":"Analytical Engines"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = json_body(resp).await;
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Profile not found");

        let session = identity.sign_in(None);
        let resp = app
            .oneshot(post_json(
                "/api/onboarding",
                Some(&session),
                &json!({ "first_name": "Ada", "organization_name": REJECTED_ORG }).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(resp).await;
        assert_eq!(body["message"], "Failed to create organization");
        assert!(identity.organizations.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}
