//! Local stand-in for the Garmin SSO, Garmin Connect API and Strava API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fitness_hub::cache::SnapshotStore;
use fitness_hub::{FitnessHub, HubConfig};
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;

pub const CSRF: &str = "csrf-token-123";
pub const CONSUMER_KEY: &str = "test-consumer-key";
pub const STRAVA_SEED_REFRESH: &str = "seed-refresh";

pub const SUCCESS_PAGE: &str = r#"<html><head><title>Success</title></head>
<script>var response_url = "https://sso.garmin.com/sso/embed?ticket=ST-42-test-cas";</script></html>"#;

pub const LOCKED_PAGE: &str = r#"<html><head><title>Locked</title></head>
<script>var status = "ACCOUNT_LOCKED"; var redirect = "embed?ticket=ST-should-not-be-used";</script></html>"#;

/// Knobs tests turn before or between calls.
pub struct Behaviour {
    pub consumer_status: u16,
    pub signin_post_body: String,
    pub exchange_expires_in: i64,
    /// Upcoming exchange calls that answer 500.
    pub exchange_failures: usize,
    /// Upcoming Garmin API calls that answer 401.
    pub garmin_rejections: usize,
    pub garmin_profile_body: String,
    pub strava_rotate: bool,
    /// Lifetime of issued Strava access tokens.
    pub strava_expires_in: i64,
    /// Upcoming Strava API calls that answer 401.
    pub strava_rejections: usize,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            consumer_status: 200,
            signin_post_body: SUCCESS_PAGE.to_string(),
            exchange_expires_in: 3600,
            exchange_failures: 0,
            garmin_rejections: 0,
            garmin_profile_body: r#"{"displayName":"runner","fullName":"Test Runner"}"#.to_string(),
            strava_rotate: true,
            strava_expires_in: 21600,
            strava_rejections: 0,
        }
    }
}

#[derive(Default)]
pub struct Counters {
    pub consumer: AtomicUsize,
    pub embed: AtomicUsize,
    pub signin_get: AtomicUsize,
    pub signin_post: AtomicUsize,
    pub preauthorized: AtomicUsize,
    pub exchange: AtomicUsize,
    pub garmin_profile: AtomicUsize,
    pub garmin_activities: AtomicUsize,
    pub strava_token: AtomicUsize,
    pub strava_athlete: AtomicUsize,
    pub strava_activities: AtomicUsize,
    pub strava_stats: AtomicUsize,
}

impl Counters {
    pub fn garmin_total(&self) -> usize {
        [
            &self.consumer,
            &self.embed,
            &self.signin_get,
            &self.signin_post,
            &self.preauthorized,
            &self.exchange,
            &self.garmin_profile,
            &self.garmin_activities,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    pub fn strava_total(&self) -> usize {
        [
            &self.strava_token,
            &self.strava_athlete,
            &self.strava_activities,
            &self.strava_stats,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    pub fn total(&self) -> usize {
        self.garmin_total() + self.strava_total()
    }
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Default)]
pub struct Upstream {
    pub counters: Counters,
    pub behaviour: Mutex<Behaviour>,
    /// Cookie header seen on the credential post.
    pub signin_cookie: Mutex<Option<String>>,
    /// Form posted with the credentials.
    pub signin_form: Mutex<HashMap<String, String>>,
    /// Refresh tokens presented to the Strava token endpoint, in order.
    pub strava_refresh_tokens: Mutex<Vec<String>>,
    /// Bearer of the most recent Garmin exchange.
    pub garmin_bearer: Mutex<Option<String>>,
    pub strava_bearer: Mutex<Option<String>>,
}

impl Upstream {
    pub fn configure(&self, f: impl FnOnce(&mut Behaviour)) {
        f(&mut self.behaviour.lock());
    }
}

pub struct TestServer {
    pub origin: String,
    pub upstream: Arc<Upstream>,
}

impl TestServer {
    pub async fn start() -> Self {
        let upstream = Arc::new(Upstream::default());
        let app = router(upstream.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            origin: format!("http://{}", addr),
            upstream,
        }
    }

    pub fn config(&self) -> HubConfig {
        HubConfig {
            garmin_email: Some("runner@example.com".to_string()),
            garmin_password: Some("correct horse".to_string()),
            garmin_origin: Some(self.origin.clone()),
            strava_client_id: Some("1234".to_string()),
            strava_client_secret: Some("strava-secret".to_string()),
            strava_refresh_token: Some(STRAVA_SEED_REFRESH.to_string()),
            strava_origin: Some(self.origin.clone()),
            http_timeout: Duration::from_secs(10),
            ..HubConfig::default()
        }
    }

    pub fn hub(&self, store: Option<Arc<dyn SnapshotStore>>) -> FitnessHub {
        FitnessHub::with_store(self.config(), store).unwrap()
    }

    pub fn counters(&self) -> &Counters {
        &self.upstream.counters
    }
}

fn router(upstream: Arc<Upstream>) -> Router {
    Router::new()
        .route("/oauth_consumer.json", get(consumer))
        .route("/sso/embed", get(embed))
        .route("/sso/signin", get(signin_page).post(signin_submit))
        .route("/oauth-service/oauth/preauthorized", get(preauthorized))
        .route(
            "/oauth-service/oauth/exchange/user/2.0",
            axum::routing::post(exchange),
        )
        .route("/userprofile-service/socialProfile", get(garmin_profile))
        .route(
            "/activitylist-service/activities/search/activities",
            get(garmin_activities),
        )
        .route("/oauth/token", axum::routing::post(strava_token))
        .route("/api/v3/athlete", get(strava_athlete))
        .route("/api/v3/athlete/activities", get(strava_activities))
        .route("/api/v3/athletes/{id}/stats", get(strava_stats))
        .with_state(upstream)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

async fn consumer(State(up): State<Arc<Upstream>>) -> Response {
    up.counters.consumer.fetch_add(1, Ordering::SeqCst);
    let status = up.behaviour.lock().consumer_status;
    if status != 200 {
        return (
            StatusCode::from_u16(status).unwrap(),
            AppendHeaders([(header::SET_COOKIE, "consumer-cookie=nope")]),
            "unavailable",
        )
            .into_response();
    }
    Json(json!({"consumer_key": CONSUMER_KEY, "consumer_secret": "test-consumer-secret"}))
        .into_response()
}

async fn embed(State(up): State<Arc<Upstream>>) -> Response {
    up.counters.embed.fetch_add(1, Ordering::SeqCst);
    (
        AppendHeaders([
            (header::SET_COOKIE, "GARMIN-SSO=1; Path=/; Secure"),
            (header::SET_COOKIE, "GARMIN-SSO-GUID=abc; Path=/"),
        ]),
        "<html>embed</html>",
    )
        .into_response()
}

async fn signin_page(State(up): State<Arc<Upstream>>) -> Response {
    up.counters.signin_get.fetch_add(1, Ordering::SeqCst);
    (
        AppendHeaders([(header::SET_COOKIE, "__cflb=lb1; Path=/")]),
        format!(
            r#"<html><form><input type="hidden" name="_csrf" value="{}" /></form></html>"#,
            CSRF
        ),
    )
        .into_response()
}

async fn signin_submit(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    up.counters.signin_post.fetch_add(1, Ordering::SeqCst);
    *up.signin_cookie.lock() = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *up.signin_form.lock() = form;

    let body = up.behaviour.lock().signin_post_body.clone();
    (AppendHeaders([(header::SET_COOKIE, "CASTGC=tgc; Path=/")]), body).into_response()
}

async fn preauthorized(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    up.counters.preauthorized.fetch_add(1, Ordering::SeqCst);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !authorization.starts_with("OAuth ")
        || !authorization.contains(&format!("oauth_consumer_key=\"{}\"", CONSUMER_KEY))
        || query.get("ticket").map(String::as_str) != Some("ST-42-test-cas")
    {
        return (StatusCode::UNAUTHORIZED, "bad request signature").into_response();
    }
    "oauth_token=oauth1-token&oauth_token_secret=oauth1-secret".into_response()
}

async fn exchange(
    State(up): State<Arc<Upstream>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let n = up.counters.exchange.fetch_add(1, Ordering::SeqCst) + 1;

    let expires_in = {
        let mut behaviour = up.behaviour.lock();
        if behaviour.exchange_failures > 0 {
            behaviour.exchange_failures -= 1;
            return (StatusCode::INTERNAL_SERVER_ERROR, "exchange broken").into_response();
        }
        behaviour.exchange_expires_in
    };

    if query.get("oauth_token").map(String::as_str) != Some("oauth1-token")
        || !query.contains_key("oauth_signature")
    {
        return (StatusCode::UNAUTHORIZED, "unsigned exchange").into_response();
    }

    let token = format!("garmin-access-{}", n);
    *up.garmin_bearer.lock() = Some(token.clone());
    Json(json!({
        "access_token": token,
        "token_type": "Bearer",
        "refresh_token": "garmin-refresh",
        "expires_in": expires_in,
        "refresh_token_expires_in": 7200,
    }))
    .into_response()
}

fn garmin_authorized(up: &Upstream, headers: &HeaderMap) -> Option<Response> {
    {
        let mut behaviour = up.behaviour.lock();
        if behaviour.garmin_rejections > 0 {
            behaviour.garmin_rejections -= 1;
            return Some((StatusCode::UNAUTHORIZED, "token revoked").into_response());
        }
    }

    let expected = up.garmin_bearer.lock().clone().map(|t| format!("Bearer {}", t));
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if expected.is_none() || presented != expected || headers.get("nk").is_none() {
        return Some((StatusCode::UNAUTHORIZED, "bad bearer").into_response());
    }
    None
}

async fn garmin_profile(State(up): State<Arc<Upstream>>, headers: HeaderMap) -> Response {
    up.counters.garmin_profile.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = garmin_authorized(&up, &headers) {
        return rejection;
    }
    let body = up.behaviour.lock().garmin_profile_body.clone();
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn garmin_activities(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    up.counters.garmin_activities.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = garmin_authorized(&up, &headers) {
        return rejection;
    }
    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(0);
    let activities: Vec<_> = (0..limit)
        .map(|i| json!({"activityId": i, "activityName": format!("Run {}", i)}))
        .collect();
    Json(activities).into_response()
}

async fn strava_token(
    State(up): State<Arc<Upstream>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = up.counters.strava_token.fetch_add(1, Ordering::SeqCst) + 1;

    if form.get("grant_type").map(String::as_str) != Some("refresh_token")
        || form.get("client_id").map(String::as_str) != Some("1234")
        || form.get("client_secret").map(String::as_str) != Some("strava-secret")
    {
        return (StatusCode::BAD_REQUEST, "invalid client").into_response();
    }

    let presented = form.get("refresh_token").cloned().unwrap_or_default();
    up.strava_refresh_tokens.lock().push(presented);

    let (rotate, expires_in) = {
        let behaviour = up.behaviour.lock();
        (behaviour.strava_rotate, behaviour.strava_expires_in)
    };

    let access = format!("strava-access-{}", n);
    *up.strava_bearer.lock() = Some(access.clone());

    let mut body = json!({
        "token_type": "Bearer",
        "access_token": access,
        "expires_at": now() + expires_in,
        "expires_in": expires_in,
    });
    if rotate {
        body["refresh_token"] = json!(format!("strava-refresh-{}", n));
    }
    Json(body).into_response()
}

fn strava_authorized(up: &Upstream, headers: &HeaderMap) -> bool {
    {
        let mut behaviour = up.behaviour.lock();
        if behaviour.strava_rejections > 0 {
            behaviour.strava_rejections -= 1;
            return false;
        }
    }

    let expected = up.strava_bearer.lock().clone().map(|t| format!("Bearer {}", t));
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    expected.is_some() && presented == expected
}

async fn strava_athlete(State(up): State<Arc<Upstream>>, headers: HeaderMap) -> Response {
    up.counters.strava_athlete.fetch_add(1, Ordering::SeqCst);
    if !strava_authorized(&up, &headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Authorization Error"}"#).into_response();
    }
    Json(json!({"id": 42, "firstname": "Ada", "lastname": "Runner"})).into_response()
}

async fn strava_activities(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    up.counters.strava_activities.fetch_add(1, Ordering::SeqCst);
    if !strava_authorized(&up, &headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Authorization Error"}"#).into_response();
    }
    let per_page: usize = query.get("per_page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let activities: Vec<_> = (0..per_page)
        .map(|i| json!({"id": 1000 + i, "name": format!("Ride {}", i)}))
        .collect();
    Json(activities).into_response()
}

async fn strava_stats(
    State(up): State<Arc<Upstream>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    up.counters.strava_stats.fetch_add(1, Ordering::SeqCst);
    if !strava_authorized(&up, &headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"Authorization Error"}"#).into_response();
    }
    Json(json!({"athlete_id": id, "all_run_totals": {"count": 3}})).into_response()
}
