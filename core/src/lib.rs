//! Client core for the mini-program directory backend.
//!
//! # Overview
//! `Facade::call` turns a `RequestDescriptor` into one backend round trip and
//! returns the unwrapped envelope payload. Around that round trip it attaches
//! the session token, holds the shared loading indicator, shows one toast per
//! failure and schedules the login redirect when the session is missing or
//! expired.
//!
//! # Design
//! - `ApiClient` is stateless: `build_request` produces plain-data
//!   `HttpRequest`s and `parse_response` unwraps `HttpResponse`s, so the
//!   envelope rules are testable without a network.
//! - `Transport`, `SessionStorage`, `Feedback` and `Navigator` are the seams a
//!   host plugs into; each has a default (`ReqwestTransport`,
//!   `MemoryStorage`, `LogFeedback`, `LogNavigator`).
//! - `Session` is the single owner of the token; nothing else reads storage.
//! - `WxappApi` layers typed DTOs over the facade for the mini-program routes.

pub mod api;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod facade;
pub mod http;
pub mod redirect;
pub mod request;
pub mod session;
pub mod transport;
pub mod types;
pub mod ui;

pub use api::WxappApi;
pub use client::ApiClient;
pub use config::{ClientConfig, Messages};
pub use envelope::Envelope;
pub use error::{ApiError, StorageError, TransportError};
pub use facade::{Facade, FacadeBuilder};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use redirect::{RedirectScheduler, ScheduledRedirect};
pub use request::{RequestDescriptor, RequestOptions};
pub use session::{FileStorage, MemoryStorage, Session, SessionStorage, UserProfile};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    AppItem, AppPage, Banner, Category, FavoriteFlag, FavoritePage, HomeData, ListQuery,
    LoginRequest, LoginResult, OkResult, QrCode, TrackEvent,
};
pub use ui::{Feedback, LoadingGuard, LoadingIndicator, LogFeedback, LogNavigator, Navigator, ToastKind};
