//! Blocking client for the Okta authentication and user APIs.
//!
//! # Overview
//! Covers primary authentication, session creation, user lookup, group
//! membership (with `Link` header pagination) and app links.
//!
//! # Design
//! - `OktaClient` builds `HttpRequest` values and parses `HttpResponse`
//!   values without touching the network (host-does-IO pattern). It owns the
//!   session cookie, so mutation goes through `&mut self`.
//! - `Transport` executes one request; `UreqTransport` is the blocking
//!   default and `BlockingClient` strings the two together.
//! - `Paginator` follows next-page links as a small state machine fed by the
//!   caller.
//! - Nothing is retried or cached. A client is meant for a single owner.

pub mod blocking;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod pagination;
pub mod transport;
pub mod types;

pub use blocking::BlockingClient;
pub use client::{OktaClient, SessionCookie};
pub use config::OktaConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use pagination::{Page, PageCursor, PageState, Paginator};
pub use transport::{Transport, UreqTransport};
pub use types::{
    AppLink, AppLinks, AuthnRequest, AuthnResponse, ErrorCause, ErrorResponse, Group, GroupProfile,
    SessionRequest, SessionResponse, User, UserProfile,
};
