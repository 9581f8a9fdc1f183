//! HTTP request builder and response parser for the Okta API.
//!
//! # Design
//! `OktaClient` holds the API base, the optional API token and the session
//! cookie. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`; the
//! caller executes the round-trip in between. `parse_session` is the only
//! parse step with a side effect: it stores the `sid` cookie, which every
//! later `build_*` attaches. That is why it takes `&mut self`, and why a
//! client must not be shared between callers without external locking.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::config::OktaConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::pagination::{next_link, resolve_link, Page, PageCursor};
use crate::types::{
    AppLinks, AuthnRequest, AuthnResponse, ErrorResponse, Group, SessionRequest, SessionResponse, User,
};

/// Page size requested for group listings.
pub const GROUPS_PAGE_LIMIT: u32 = 200;

/// The `sid` cookie issued after a successful session exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub http_only: bool,
}

impl SessionCookie {
    pub fn sid(value: &str, domain: &str) -> Self {
        Self {
            name: "sid".to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            domain: domain.to_string(),
            secure: true,
            http_only: true,
        }
    }

    /// Value for a request `Cookie` header.
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Stateful request builder for one Okta organization.
#[derive(Debug, Clone)]
pub struct OktaClient {
    api_base: String,
    cookie_domain: String,
    api_token: Option<String>,
    session_cookie: Option<SessionCookie>,
}

impl OktaClient {
    /// Client for `https://{org}.okta.com` with no credentials.
    pub fn new(org: &str) -> Self {
        Self::from_config(&OktaConfig::new(org))
    }

    pub fn from_config(config: &OktaConfig) -> Self {
        Self {
            api_base: config.api_base(),
            cookie_domain: config.cookie_domain(),
            api_token: config.api_token.clone(),
            session_cookie: None,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn set_api_token(&mut self, token: Option<String>) {
        self.api_token = token;
    }

    pub fn session_cookie(&self) -> Option<&SessionCookie> {
        self.session_cookie.as_ref()
    }

    pub fn set_session_cookie(&mut self, cookie: Option<SessionCookie>) {
        self.session_cookie = cookie;
    }

    pub fn build_authenticate(&self, username: &str, password: &str) -> Result<HttpRequest, ApiError> {
        let body = AuthnRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.request_with_body(HttpMethod::Post, "authn", &body)
    }

    pub fn parse_authenticate(&self, response: HttpResponse) -> Result<AuthnResponse, ApiError> {
        parse_json(response)
    }

    pub fn build_session(&self, session_token: &str) -> Result<HttpRequest, ApiError> {
        let body = SessionRequest {
            session_token: session_token.to_string(),
        };
        self.request_with_body(HttpMethod::Post, "sessions", &body)
    }

    /// Parse the session and, on success, keep its id as the `sid` cookie
    /// for every subsequent request.
    pub fn parse_session(&mut self, response: HttpResponse) -> Result<SessionResponse, ApiError> {
        let session: SessionResponse = parse_json(response)?;
        debug!(domain = %self.cookie_domain, "session established");
        self.session_cookie = Some(SessionCookie::sid(&session.id, &self.cookie_domain));
        Ok(session)
    }

    pub fn build_user(&self, user_id: &str) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("users/{user_id}"), None)
    }

    pub fn parse_user(&self, response: HttpResponse) -> Result<User, ApiError> {
        parse_json(response)
    }

    /// First page of the user's group memberships.
    pub fn build_groups(&self, user_id: &str) -> HttpRequest {
        self.build_page(&PageCursor::new(groups_endpoint(user_id)))
    }

    /// Any page of a listing, usually the `next` of a previous `Page`.
    pub fn build_page(&self, cursor: &PageCursor) -> HttpRequest {
        self.request(HttpMethod::Get, cursor.endpoint(), None)
    }

    pub fn parse_groups(&self, response: HttpResponse) -> Result<Page<Group>, ApiError> {
        self.parse_page(response)
    }

    /// Decode one page of a listing and resolve its next-page link.
    pub fn parse_page<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<Page<T>, ApiError> {
        check_status(&response)?;
        let items = serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        let next = match next_link(&response) {
            Some(link) => resolve_link(&self.api_base, link)?,
            None => None,
        };
        Ok(Page { items, next })
    }

    /// App links for a user, optionally narrowed to one application name.
    pub fn build_app_links(&self, user_id: &str, app_name: &str) -> HttpRequest {
        let mut endpoint = format!("users/{user_id}/appLinks");
        if !app_name.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .append_pair("filter", &format!("appName eq \"{app_name}\""))
                .finish();
            endpoint.push('?');
            endpoint.push_str(&query);
        }
        self.request(HttpMethod::Get, &endpoint, None)
    }

    pub fn parse_app_links(&self, response: HttpResponse) -> Result<AppLinks, ApiError> {
        parse_json(response)
    }

    fn request_with_body<B: Serialize>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.request(method, endpoint, Some(body)))
    }

    fn request(&self, method: HttpMethod, endpoint: &str, body: Option<String>) -> HttpRequest {
        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        if let Some(token) = &self.api_token {
            headers.push(("Authorization".to_string(), format!("SSWS {token}")));
        }
        if let Some(cookie) = &self.session_cookie {
            headers.push(("Cookie".to_string(), cookie.header_value()));
        }
        HttpRequest {
            method,
            url: format!("{}{endpoint}", self.api_base),
            headers,
            body,
        }
    }
}

pub(crate) fn groups_endpoint(user_id: &str) -> String {
    format!("users/{user_id}/groups?limit={GROUPS_PAGE_LIMIT}")
}

/// Decode a 200 body, or map any other status to `ApiError::Http`.
fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == 200 {
        return Ok(());
    }
    // An undecodable error body still yields an `Http` error, just with an
    // empty payload.
    let payload: ErrorResponse = serde_json::from_str(&response.body).unwrap_or_default();
    warn!(
        status = response.status,
        endpoint = %response.url,
        code = %payload.error_code,
        "provider returned an error"
    );
    Err(ApiError::Http {
        status: response.status,
        response: payload,
        endpoint: response.url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OktaClient {
        OktaClient::from_config(&OktaConfig::new("acme").with_api_token("00tok"))
    }

    fn ok(url: &str, body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            url: url.to_string(),
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_authenticate_produces_correct_request() {
        let req = client().build_authenticate("alice", "s3cret").unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://acme.okta.com/api/v1/authn");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("authorization"), Some("SSWS 00tok"));
        assert_eq!(req.header("cookie"), None);
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"username": "alice", "password": "s3cret"}));
    }

    #[test]
    fn no_token_means_no_authorization_header() {
        let req = OktaClient::new("acme").build_user("00u1");
        assert_eq!(req.header("authorization"), None);
        assert_eq!(req.url, "https://acme.okta.com/api/v1/users/00u1");
        assert!(req.body.is_none());
    }

    #[test]
    fn parse_session_stores_cookie_for_later_requests() {
        let mut c = client();
        let req = c.build_session("tok123").unwrap();
        assert_eq!(req.url, "https://acme.okta.com/api/v1/sessions");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["sessionToken"], "tok123");

        let session = c
            .parse_session(ok(&req.url, r#"{"id":"102abc","status":"ACTIVE"}"#))
            .unwrap();
        assert_eq!(session.id, "102abc");

        let cookie = c.session_cookie().unwrap();
        assert_eq!(cookie, &SessionCookie::sid("102abc", "acme.okta.com"));
        assert!(cookie.secure && cookie.http_only);
        assert_eq!(cookie.path, "/");

        assert_eq!(c.build_user("00u1").header("cookie"), Some("sid=102abc"));
        assert_eq!(c.build_groups("00u1").header("cookie"), Some("sid=102abc"));
    }

    #[test]
    fn failed_session_keeps_previous_cookie() {
        let mut c = client();
        c.set_session_cookie(Some(SessionCookie::sid("old", "acme.okta.com")));
        let response = HttpResponse {
            status: 401,
            url: "https://acme.okta.com/api/v1/sessions".to_string(),
            headers: Vec::new(),
            body: r#"{"errorCode":"E0000004"}"#.to_string(),
        };
        assert!(c.parse_session(response).is_err());
        assert_eq!(c.session_cookie().unwrap().value, "old");
    }

    #[test]
    fn build_groups_requests_first_page() {
        let req = client().build_groups("00u1");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://acme.okta.com/api/v1/users/00u1/groups?limit=200");
    }

    #[test]
    fn parse_groups_resolves_next_page() {
        let mut response = ok(
            "https://acme.okta.com/api/v1/users/00u1/groups?limit=200",
            r#"[{"id":"00g1","profile":{"name":"Everyone"}}]"#,
        );
        response.headers = vec![
            (
                "link".to_string(),
                "<https://acme.okta.com/api/v1/users/00u1/groups?limit=200>; rel=\"self\"".to_string(),
            ),
            (
                "link".to_string(),
                "<https://acme.okta.com/api/v1/users/00u1/groups?after=00g1&limit=200>; rel=\"next\"".to_string(),
            ),
        ];
        let page = client().parse_groups(response).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].profile.name, "Everyone");
        let next = page.next.unwrap();
        assert_eq!(next.endpoint(), "users/00u1/groups?after=00g1&limit=200");
        assert_eq!(
            client().build_page(&next).url,
            "https://acme.okta.com/api/v1/users/00u1/groups?after=00g1&limit=200"
        );
    }

    #[test]
    fn build_app_links_with_filter() {
        let req = client().build_app_links("00u1", "MyApp");
        assert_eq!(
            req.url,
            "https://acme.okta.com/api/v1/users/00u1/appLinks?filter=appName+eq+%22MyApp%22"
        );
    }

    #[test]
    fn build_app_links_without_filter() {
        let req = client().build_app_links("00u1", "");
        assert_eq!(req.url, "https://acme.okta.com/api/v1/users/00u1/appLinks");
    }

    #[test]
    fn non_200_maps_to_http_error() {
        let response = HttpResponse {
            status: 401,
            url: "https://acme.okta.com/api/v1/users/00u1".to_string(),
            headers: Vec::new(),
            body: r#"{"errorCode":"E0000004","errorSummary":"Authentication failed"}"#.to_string(),
        };
        let err = client().parse_user(response).unwrap_err();
        match err {
            ApiError::Http {
                status,
                response,
                endpoint,
            } => {
                assert_eq!(status, 401);
                assert_eq!(response.error_code, "E0000004");
                assert_eq!(response.error_summary, "Authentication failed");
                assert_eq!(endpoint, "https://acme.okta.com/api/v1/users/00u1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparsable_error_body_gives_empty_payload() {
        let response = HttpResponse {
            status: 502,
            url: "https://acme.okta.com/api/v1/users/00u1".to_string(),
            headers: Vec::new(),
            body: "<html>bad gateway</html>".to_string(),
        };
        let err = client().parse_user(response).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 502, ref response, .. } if *response == ErrorResponse::default()));
    }

    #[test]
    fn null_error_fields_keep_error_code() {
        let response = HttpResponse {
            status: 401,
            url: "https://acme.okta.com/api/v1/users/00u1".to_string(),
            headers: Vec::new(),
            body: r#"{"errorCode":"E0000004","errorSummary":"Authentication failed",
                      "errorLink":null,"errorId":null,"errorCauses":null}"#
                .to_string(),
        };
        let err = client().parse_user(response).unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.error_code(), Some("E0000004"));
    }

    #[test]
    fn bad_page_body_is_reported_before_bad_link() {
        let mut response = ok("https://acme.okta.com/api/v1/users/00u1/groups?limit=200", "not json");
        response.headers = vec![
            ("link".to_string(), "<https://acme.okta.com/api/v1/users/00u1/groups>".to_string()),
            ("link".to_string(), "<https://elsewhere.example.com/groups?after=x>".to_string()),
        ];
        let err = client().parse_groups(response).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn parse_user_bad_json() {
        let err = client()
            .parse_user(ok("https://acme.okta.com/api/v1/users/00u1", "not json"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn base_url_override_is_used_for_every_endpoint() {
        let c = OktaClient::from_config(&OktaConfig::new("acme").with_base_url("http://127.0.0.1:3000"));
        assert_eq!(c.build_user("00u1").url, "http://127.0.0.1:3000/api/v1/users/00u1");
        assert_eq!(c.api_base(), "http://127.0.0.1:3000/api/v1/");
    }
}
