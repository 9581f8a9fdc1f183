//! In-memory stand-in for the Okta endpoints the client consumes.
//!
//! Serves `authn`, `sessions`, `users/{id}`, paginated `users/{id}/groups`
//! and `users/{id}/appLinks` under `/api/v1`. Error bodies follow the
//! provider's `errorCode`/`errorSummary` shape.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{AUTHORIZATION, COOKIE, HOST, LINK},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use url::form_urlencoded;
use uuid::Uuid;

/// API token accepted by the seeded directory.
pub const API_TOKEN: &str = "00mock-api-token";
pub const DEFAULT_PAGE_LIMIT: usize = 200;
const EXPIRES_AT: &str = "2030-01-01T00:00:00.000Z";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub profile: GroupProfile,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupProfile {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLink {
    pub id: String,
    pub label: String,
    pub link_url: String,
    pub app_name: String,
    pub app_instance_id: String,
    pub credentials_setup: bool,
    pub hidden: bool,
    pub sort_order: i64,
}

#[derive(Clone, Debug)]
pub struct MockUser {
    pub id: String,
    pub login: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub groups: Vec<Group>,
    pub app_links: Vec<AppLink>,
}

impl MockUser {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "status": "ACTIVE",
            "created": "2024-01-01T00:00:00.000Z",
            "activated": null,
            "lastLogin": null,
            "profile": {
                "login": self.login,
                "email": self.login,
                "firstName": self.first_name,
                "lastName": self.last_name,
            },
            "credentials": {"provider": {"type": "OKTA", "name": "OKTA"}},
        })
    }
}

/// Everything the mock knows: users, outstanding session tokens, live
/// sessions and injected failures.
#[derive(Debug, Default)]
pub struct Directory {
    pub api_token: String,
    pub users: Vec<MockUser>,
    session_tokens: HashMap<String, String>,
    sessions: HashMap<String, String>,
    failing_cursors: HashSet<(String, String)>,
}

impl Directory {
    pub fn new(api_token: &str) -> Self {
        Self {
            api_token: api_token.to_string(),
            ..Self::default()
        }
    }

    /// Two users: `alice@example.com` (password `correct horse`, five
    /// groups, three app links) and `bob@example.com` (no memberships).
    pub fn seeded() -> Self {
        let groups = (1..=5)
            .map(|n| group(&format!("00g{n}"), &format!("Group {n}")))
            .collect();
        let app_links = vec![
            app_link("0ua1", "Slack", "slack", 0),
            app_link("0ua2", "GitHub", "github", 1),
            app_link("0ua3", "My App", "MyApp", 2),
        ];
        Self::new(API_TOKEN)
            .with_user(MockUser {
                id: "00u1alice".to_string(),
                login: "alice@example.com".to_string(),
                password: "correct horse".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Liddell".to_string(),
                groups,
                app_links,
            })
            .with_user(MockUser {
                id: "00u2bob".to_string(),
                login: "bob@example.com".to_string(),
                password: "battery staple".to_string(),
                first_name: "Bob".to_string(),
                last_name: "Builder".to_string(),
                groups: Vec::new(),
                app_links: Vec::new(),
            })
    }

    pub fn with_user(mut self, user: MockUser) -> Self {
        self.users.push(user);
        self
    }

    /// Answer the groups page that starts after `cursor` with a 500.
    pub fn fail_groups_after(mut self, user_id: &str, cursor: &str) -> Self {
        self.failing_cursors
            .insert((user_id.to_string(), cursor.to_string()));
        self
    }

    fn find_user(&self, id_or_login: &str) -> Option<&MockUser> {
        self.users
            .iter()
            .find(|u| u.id == id_or_login || u.login == id_or_login)
    }

    /// `SSWS <token>` or a live `sid` cookie.
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        let token_ok = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("SSWS "))
            .is_some_and(|token| token == self.api_token);

        let cookie_ok = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().strip_prefix("sid="))
            .any(|sid| self.sessions.contains_key(sid));

        token_ok || cookie_ok
    }
}

pub fn group(id: &str, name: &str) -> Group {
    Group {
        id: id.to_string(),
        group_type: "OKTA_GROUP".to_string(),
        profile: GroupProfile {
            name: name.to_string(),
            description: None,
        },
    }
}

pub fn app_link(id: &str, label: &str, app_name: &str, sort_order: i64) -> AppLink {
    AppLink {
        id: id.to_string(),
        label: label.to_string(),
        link_url: format!("https://mock.okta.test/home/{app_name}/{id}"),
        app_name: app_name.to_string(),
        app_instance_id: format!("0oa{id}"),
        credentials_setup: false,
        hidden: false,
        sort_order,
    }
}

pub type Db = Arc<RwLock<Directory>>;

/// Router over the seeded directory.
pub fn app() -> Router {
    app_with(Directory::seeded())
}

pub fn app_with(directory: Directory) -> Router {
    let db: Db = Arc::new(RwLock::new(directory));
    Router::new()
        .route("/api/v1/authn", post(authn))
        .route("/api/v1/sessions", post(create_session))
        .route("/api/v1/users/{id}", get(get_user))
        .route("/api/v1/users/{id}/groups", get(list_groups))
        .route("/api/v1/users/{id}/appLinks", get(list_app_links))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, directory: Directory) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(directory)).await
}

/// Provider-shaped error response.
#[derive(Debug)]
pub struct OktaFailure {
    status: StatusCode,
    code: &'static str,
    summary: String,
}

impl OktaFailure {
    fn new(status: StatusCode, code: &'static str, summary: impl Into<String>) -> Self {
        Self {
            status,
            code,
            summary: summary.into(),
        }
    }

    fn authentication_failed() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E0000004", "Authentication failed")
    }

    fn invalid_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E0000011", "Invalid token provided")
    }

    fn user_not_found(id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "E0000007",
            format!("Not found: Resource not found: {id} (User)"),
        )
    }
}

impl IntoResponse for OktaFailure {
    fn into_response(self) -> Response {
        let body = json!({
            "errorCode": self.code,
            "errorSummary": self.summary,
            "errorLink": self.code,
            "errorId": format!("oae{}", Uuid::new_v4().simple()),
            "errorCauses": [],
        });
        (self.status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
pub struct AuthnBody {
    pub username: String,
    pub password: String,
}

async fn authn(State(db): State<Db>, Json(input): Json<AuthnBody>) -> Result<Json<Value>, OktaFailure> {
    let mut dir = db.write().await;
    let user = dir
        .find_user(&input.username)
        .filter(|u| u.password == input.password)
        .cloned()
        .ok_or_else(|| {
            debug!(username = %input.username, "primary authentication rejected");
            OktaFailure::authentication_failed()
        })?;

    let session_token = format!("20111{}", Uuid::new_v4().simple());
    dir.session_tokens.insert(session_token.clone(), user.id.clone());
    Ok(Json(json!({
        "expiresAt": EXPIRES_AT,
        "status": "SUCCESS",
        "sessionToken": session_token,
        "_embedded": {
            "user": {
                "id": user.id,
                "profile": {
                    "login": user.login,
                    "firstName": user.first_name,
                    "lastName": user.last_name,
                },
            },
        },
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBody {
    pub session_token: String,
}

/// Session tokens are single use.
async fn create_session(
    State(db): State<Db>,
    Json(input): Json<SessionBody>,
) -> Result<Json<Value>, OktaFailure> {
    let mut dir = db.write().await;
    let user_id = dir
        .session_tokens
        .remove(&input.session_token)
        .ok_or_else(OktaFailure::authentication_failed)?;
    let login = dir
        .find_user(&user_id)
        .map(|u| u.login.clone())
        .unwrap_or_default();

    let sid = format!("102{}", Uuid::new_v4().simple());
    dir.sessions.insert(sid.clone(), user_id.clone());
    info!(%user_id, "session created");
    Ok(Json(json!({
        "id": sid,
        "login": login,
        "userId": user_id,
        "expiresAt": EXPIRES_AT,
        "status": "ACTIVE",
        "amr": ["pwd"],
        "mfaActive": false,
    })))
}

async fn get_user(
    State(db): State<Db>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, OktaFailure> {
    let dir = db.read().await;
    if !dir.is_authorized(&headers) {
        return Err(OktaFailure::invalid_token());
    }
    dir.find_user(&id)
        .map(|u| Json(u.to_json()))
        .ok_or_else(|| OktaFailure::user_not_found(&id))
}

#[derive(Deserialize)]
pub struct GroupsQuery {
    pub limit: Option<usize>,
    pub after: Option<String>,
}

/// Cursor pagination: `after` is the id of the last group already seen.
/// Every page carries a `self` link; a second `next` link appears while
/// groups remain.
async fn list_groups(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<GroupsQuery>,
    headers: HeaderMap,
) -> Result<Response, OktaFailure> {
    let dir = db.read().await;
    if !dir.is_authorized(&headers) {
        return Err(OktaFailure::invalid_token());
    }
    let user = dir.find_user(&id).ok_or_else(|| OktaFailure::user_not_found(&id))?;

    if let Some(after) = &query.after {
        if dir.failing_cursors.contains(&(user.id.clone(), after.clone())) {
            return Err(OktaFailure::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "E0000009",
                "Internal Server Error",
            ));
        }
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, DEFAULT_PAGE_LIMIT);
    let start = match &query.after {
        Some(after) => {
            user.groups
                .iter()
                .position(|g| &g.id == after)
                .ok_or_else(|| {
                    OktaFailure::new(
                        StatusCode::BAD_REQUEST,
                        "E0000001",
                        format!("Api validation failed: after {after}"),
                    )
                })?
                + 1
        }
        None => 0,
    };
    let end = (start + limit).min(user.groups.len());
    let page = user.groups[start..end].to_vec();

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let page_url = |after: Option<&str>| {
        let mut params = form_urlencoded::Serializer::new(String::new());
        if let Some(after) = after {
            params.append_pair("after", after);
        }
        params.append_pair("limit", &limit.to_string());
        format!("http://{host}/api/v1/users/{id}/groups?{}", params.finish())
    };

    let mut response_headers = HeaderMap::new();
    append_link(&mut response_headers, &page_url(query.after.as_deref()), "self");
    if end < user.groups.len() {
        if let Some(last) = page.last() {
            append_link(&mut response_headers, &page_url(Some(&last.id)), "next");
        }
    }
    Ok((response_headers, Json(page)).into_response())
}

fn append_link(headers: &mut HeaderMap, url: &str, rel: &str) {
    if let Ok(value) = HeaderValue::from_str(&format!("<{url}>; rel=\"{rel}\"")) {
        headers.append(LINK, value);
    }
}

#[derive(Deserialize)]
pub struct AppLinksQuery {
    pub filter: Option<String>,
}

/// Supports the single filter form `appName eq "<name>"`.
async fn list_app_links(
    State(db): State<Db>,
    Path(id): Path<String>,
    Query(query): Query<AppLinksQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<AppLink>>, OktaFailure> {
    let dir = db.read().await;
    if !dir.is_authorized(&headers) {
        return Err(OktaFailure::invalid_token());
    }
    let user = dir.find_user(&id).ok_or_else(|| OktaFailure::user_not_found(&id))?;

    let app_name = match query.filter.as_deref() {
        Some(filter) => Some(
            filter
                .strip_prefix("appName eq \"")
                .and_then(|rest| rest.strip_suffix('"'))
                .ok_or_else(|| {
                    OktaFailure::new(StatusCode::BAD_REQUEST, "E0000031", "Invalid search criteria.")
                })?,
        ),
        None => None,
    };

    let links = user
        .app_links
        .iter()
        .filter(|link| app_name.map_or(true, |name| link.app_name == name))
        .cloned()
        .collect();
    Ok(Json(links))
}
