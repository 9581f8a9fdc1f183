//! Blocking facade pairing an `OktaClient` with a `Transport`.
//!
//! Every operation issues its request(s) sequentially on the calling thread.
//! All methods take `&mut self`: the session cookie and the transport are
//! owned by one caller at a time.

use tracing::{debug, instrument};

use crate::client::{groups_endpoint, OktaClient};
use crate::config::OktaConfig;
use crate::error::ApiError;
use crate::pagination::{Page, PageCursor, Paginator};
use crate::transport::{Transport, UreqTransport};
use crate::types::{AppLinks, AuthnResponse, Group, SessionResponse, User};

pub struct BlockingClient<T: Transport = UreqTransport> {
    client: OktaClient,
    transport: T,
}

impl BlockingClient<UreqTransport> {
    /// Client for `https://{org}.okta.com` without credentials.
    pub fn new(org: &str) -> Self {
        Self::from_config(&OktaConfig::new(org))
    }

    pub fn from_config(config: &OktaConfig) -> Self {
        Self::with_transport(OktaClient::from_config(config), UreqTransport::new(config.timeout))
    }
}

impl<T: Transport> BlockingClient<T> {
    pub fn with_transport(client: OktaClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &OktaClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut OktaClient {
        &mut self.client
    }

    pub fn into_parts(self) -> (OktaClient, T) {
        (self.client, self.transport)
    }

    /// Primary authentication with a username and password.
    #[instrument(level = "debug", skip(self, password))]
    pub fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthnResponse, ApiError> {
        let request = self.client.build_authenticate(username, password)?;
        let response = self.transport.execute(&request)?;
        self.client.parse_authenticate(response)
    }

    /// Exchange a session token for a session. On success later calls carry
    /// the `sid` cookie.
    #[instrument(level = "debug", skip_all)]
    pub fn session(&mut self, session_token: &str) -> Result<SessionResponse, ApiError> {
        let request = self.client.build_session(session_token)?;
        let response = self.transport.execute(&request)?;
        self.client.parse_session(response)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn user(&mut self, user_id: &str) -> Result<User, ApiError> {
        let request = self.client.build_user(user_id);
        let response = self.transport.execute(&request)?;
        self.client.parse_user(response)
    }

    /// Every group the user belongs to, following `Link` pagination until
    /// the provider stops offering a next page. If any page fails, only the
    /// error comes back; groups from earlier pages are discarded.
    #[instrument(level = "debug", skip(self))]
    pub fn groups(&mut self, user_id: &str) -> Result<Vec<Group>, ApiError> {
        let mut pager = Paginator::new(groups_endpoint(user_id));
        while let Some(endpoint) = pager.next_endpoint() {
            let result = self.fetch_page(&PageCursor::new(endpoint));
            pager.advance(result)?;
        }
        debug!(pages = pager.pages(), "group listing complete");
        Ok(pager.into_items())
    }

    /// App links assigned to the user; an empty `app_name` means no filter.
    #[instrument(level = "debug", skip(self))]
    pub fn app_links(&mut self, user_id: &str, app_name: &str) -> Result<AppLinks, ApiError> {
        let request = self.client.build_app_links(user_id, app_name);
        let response = self.transport.execute(&request)?;
        self.client.parse_app_links(response)
    }

    fn fetch_page(&mut self, cursor: &PageCursor) -> Result<Page<Group>, ApiError> {
        let request = self.client.build_page(cursor);
        let response = self.transport.execute(&request)?;
        self.client.parse_groups(response)
    }
}
