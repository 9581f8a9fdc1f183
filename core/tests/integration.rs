//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, points a `BlockingClient` at it
//! through the base URL override, and exercises every operation over real
//! HTTP with `UreqTransport`.

use mock_server::{Directory, API_TOKEN};
use okta_core::{
    ApiError, BlockingClient, HttpRequest, HttpResponse, OktaClient, OktaConfig, Transport, UreqTransport,
};

/// Serve `directory` on a random port from a background thread and return
/// the base URL.
fn start_server(directory: Directory) -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, directory).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn config(base_url: &str) -> OktaConfig {
    OktaConfig::new("acme").with_base_url(base_url)
}

/// Wraps the real transport and remembers what went over the wire.
struct Recording {
    inner: UreqTransport,
    requests: Vec<HttpRequest>,
}

impl Transport for Recording {
    fn execute(&mut self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.push(request.clone());
        self.inner.execute(request)
    }
}

fn recording_client(config: &OktaConfig) -> BlockingClient<Recording> {
    BlockingClient::with_transport(
        OktaClient::from_config(config),
        Recording {
            inner: UreqTransport::default(),
            requests: Vec::new(),
        },
    )
}

#[test]
fn password_login_then_session_cookie_lookup() {
    let base = start_server(Directory::seeded());
    let mut okta = BlockingClient::from_config(&config(&base));

    // No API token and no session yet.
    let err = okta.user("00u1alice").unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.error_code(), Some("E0000011"));

    let authn = okta.authenticate("alice@example.com", "correct horse").unwrap();
    assert_eq!(authn.status, "SUCCESS");
    let token = authn.session_token.expect("session token");

    let session = okta.session(&token).unwrap();
    assert_eq!(session.user_id.as_deref(), Some("00u1alice"));
    let cookie = okta.client().session_cookie().unwrap();
    assert_eq!(cookie.value, session.id);
    assert_eq!(cookie.domain, "acme.okta.com");

    let user = okta.user("00u1alice").unwrap();
    assert_eq!(user.profile.login.as_deref(), Some("alice@example.com"));
    assert_eq!(user.status.as_deref(), Some("ACTIVE"));

    // Session tokens are single use.
    let err = okta.session(&token).unwrap_err();
    assert_eq!(err.error_code(), Some("E0000004"));
    assert_eq!(okta.client().session_cookie().unwrap().value, session.id);
}

#[test]
fn bad_password_is_e0000004() {
    let base = start_server(Directory::seeded());
    let mut okta = BlockingClient::from_config(&config(&base));

    let err = okta.authenticate("alice@example.com", "wrong").unwrap_err();
    match err {
        ApiError::Http {
            status,
            response,
            endpoint,
        } => {
            assert_eq!(status, 401);
            assert_eq!(response.error_code, "E0000004");
            assert_eq!(endpoint, format!("{base}/api/v1/authn"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn groups_follow_link_pagination_across_three_pages() {
    let mut users = Directory::seeded();
    // Seeded alice has five groups; with a page size of 200 that is one page,
    // so add enough groups to force three.
    let alice = users.users.iter_mut().find(|u| u.id == "00u1alice").unwrap();
    alice.groups = (1..=450)
        .map(|n| mock_server::group(&format!("00g{n:04}"), &format!("Group {n}")))
        .collect();

    let base = start_server(users);
    let mut okta = recording_client(&config(&base).with_api_token(API_TOKEN));

    let groups = okta.groups("00u1alice").unwrap();
    assert_eq!(groups.len(), 450);
    assert_eq!(groups.first().unwrap().id, "00g0001");
    assert_eq!(groups.last().unwrap().id, "00g0450");
    assert!(groups.windows(2).all(|pair| pair[0].id < pair[1].id));

    let (_, transport) = okta.into_parts();
    let urls: Vec<String> = transport.requests.iter().map(|r| r.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{base}/api/v1/users/00u1alice/groups?limit=200"),
            format!("{base}/api/v1/users/00u1alice/groups?after=00g0200&limit=200"),
            format!("{base}/api/v1/users/00u1alice/groups?after=00g0400&limit=200"),
        ]
    );
}

#[test]
fn groups_failure_on_second_page_returns_only_the_error() {
    let mut users = Directory::seeded();
    let alice = users.users.iter_mut().find(|u| u.id == "00u1alice").unwrap();
    alice.groups = (1..=300)
        .map(|n| mock_server::group(&format!("00g{n:04}"), &format!("Group {n}")))
        .collect();
    let base = start_server(users.fail_groups_after("00u1alice", "00g0200"));

    let mut okta = recording_client(&config(&base).with_api_token(API_TOKEN));
    let err = okta.groups("00u1alice").unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.error_code(), Some("E0000009"));

    let (_, transport) = okta.into_parts();
    assert_eq!(transport.requests.len(), 2);
}

#[test]
fn user_with_no_groups_is_a_single_empty_page() {
    let base = start_server(Directory::seeded());
    let mut okta = recording_client(&config(&base).with_api_token(API_TOKEN));

    assert!(okta.groups("00u2bob").unwrap().is_empty());
    let (_, transport) = okta.into_parts();
    assert_eq!(transport.requests.len(), 1);
}

#[test]
fn app_links_with_and_without_filter() {
    let base = start_server(Directory::seeded());
    let mut okta = BlockingClient::from_config(&config(&base).with_api_token(API_TOKEN));

    let all = okta.app_links("00u1alice", "").unwrap();
    assert_eq!(all.len(), 3);

    let mine = okta.app_links("00u1alice", "MyApp").unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].label, "My App");
    assert_eq!(mine[0].app_name, "MyApp");

    assert!(okta.app_links("00u1alice", "missing").unwrap().is_empty());
}

#[test]
fn unknown_user_is_404() {
    let base = start_server(Directory::seeded());
    let mut okta = BlockingClient::from_config(&config(&base).with_api_token(API_TOKEN));

    let err = okta.user("00unobody").unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.error_code(), Some("E0000007"));
}
