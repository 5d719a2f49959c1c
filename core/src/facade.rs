//! The single entry point for backend calls.
//!
//! # Design
//! `Facade::call` wraps one round trip in the side effects every page
//! expects: the loading indicator is held by an RAII guard for the whole
//! round trip, the token comes from the injected `Session`, and every failure
//! surfaces exactly one toast after the indicator has been released.
//! Auth failures additionally schedule a login redirect; an expired session is
//! cleared first. Nothing is retried.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::{decode, ApiClient};
use crate::config::{ClientConfig, Messages};
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::redirect::{RedirectScheduler, ScheduledRedirect};
use crate::request::RequestDescriptor;
use crate::session::Session;
use crate::transport::{ReqwestTransport, Transport};
use crate::ui::{Feedback, LoadingIndicator, LogFeedback, LogNavigator, Navigator, ToastKind};

pub struct Facade {
    client: ApiClient,
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    feedback: Arc<dyn Feedback>,
    loading: LoadingIndicator,
    redirects: RedirectScheduler,
    pending_redirect: Mutex<Option<ScheduledRedirect>>,
    messages: Messages,
}

impl Facade {
    pub fn builder(config: ClientConfig) -> FacadeBuilder {
        FacadeBuilder::new(config)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Run one backend call and return the unwrapped envelope payload.
    pub async fn call(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let span = info_span!(
            "api_call",
            request_id = %Uuid::new_v4(),
            method = %descriptor.method,
            path = %descriptor.path
        );
        self.dispatch(descriptor).instrument(span).await
    }

    /// `call` followed by decoding the payload into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<T, ApiError> {
        let payload = self.call(descriptor).await?;
        decode(payload).inspect_err(|err| self.surface_failure(err))
    }

    pub async fn get<P: Serialize + ?Sized>(&self, path: &str, payload: &P) -> Result<Value, ApiError> {
        self.shorthand(HttpMethod::Get, path, payload).await
    }

    pub async fn post<P: Serialize + ?Sized>(&self, path: &str, payload: &P) -> Result<Value, ApiError> {
        self.shorthand(HttpMethod::Post, path, payload).await
    }

    pub async fn put<P: Serialize + ?Sized>(&self, path: &str, payload: &P) -> Result<Value, ApiError> {
        self.shorthand(HttpMethod::Put, path, payload).await
    }

    pub async fn delete<P: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &P,
    ) -> Result<Value, ApiError> {
        self.shorthand(HttpMethod::Delete, path, payload).await
    }

    pub fn has_pending_redirect(&self) -> bool {
        self.pending_redirect
            .lock()
            .as_ref()
            .is_some_and(|r| !r.is_finished())
    }

    /// Cancel the pending login redirect. Returns whether one was pending.
    pub fn cancel_pending_redirect(&self) -> bool {
        match self.pending_redirect.lock().take() {
            Some(redirect) if !redirect.is_finished() => {
                redirect.cancel();
                true
            }
            _ => false,
        }
    }

    /// Hand the pending redirect to the caller, e.g. to await it.
    pub fn take_pending_redirect(&self) -> Option<ScheduledRedirect> {
        self.pending_redirect.lock().take()
    }

    async fn shorthand<P: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &P,
    ) -> Result<Value, ApiError> {
        match RequestDescriptor::new(method, path).with_payload(payload) {
            Ok(descriptor) => self.call(descriptor).await,
            Err(err) => {
                self.surface_failure(&err);
                Err(err)
            }
        }
    }

    async fn dispatch(&self, descriptor: RequestDescriptor) -> Result<Value, ApiError> {
        let outcome = {
            let _loading = descriptor
                .options
                .show_loading
                .then(|| self.loading.acquire());
            self.round_trip(&descriptor).await
        };

        match outcome {
            Ok(payload) => {
                debug!("call succeeded");
                Ok(payload)
            }
            Err(err) => {
                if let ApiError::SessionExpired = err {
                    if let Err(e) = self.session.clear() {
                        warn!(error = %e, "failed to clear expired session from storage");
                    }
                }
                self.surface_failure(&err);
                Err(err)
            }
        }
    }

    async fn round_trip(&self, descriptor: &RequestDescriptor) -> Result<Value, ApiError> {
        descriptor.validate()?;
        let token = if descriptor.options.need_auth {
            Some(self.session.token().ok_or(ApiError::NotAuthenticated)?)
        } else {
            None
        };
        let request = self.client.build_request(descriptor, token.as_deref())?;
        let response = self.transport.execute(request).await?;
        self.client.parse_response(response)
    }

    /// Show the one toast for `err` and schedule a redirect for auth failures.
    pub(crate) fn surface_failure(&self, err: &ApiError) {
        warn!(error = %err, "call failed");
        let text = match err {
            ApiError::NotAuthenticated => self.messages.not_logged_in.clone(),
            ApiError::SessionExpired => self.messages.session_expired.clone(),
            ApiError::NetworkError(_) => self.messages.network_failure.clone(),
            ApiError::HttpError { status, .. } => format!("{} {status}", self.messages.http_failure),
            ApiError::BusinessError { msg: Some(msg), .. } => msg.clone(),
            ApiError::BusinessError { msg: None, .. }
            | ApiError::InvalidRequest(_)
            | ApiError::SerializationError(_)
            | ApiError::DeserializationError(_)
            | ApiError::Storage(_) => self.messages.request_failed.clone(),
        };
        self.feedback.show_toast(&text, ToastKind::None);
        if err.is_auth_failure() {
            self.schedule_login_redirect();
        }
    }

    fn schedule_login_redirect(&self) {
        let mut pending = self.pending_redirect.lock();
        if pending.as_ref().is_some_and(|r| !r.is_finished()) {
            debug!("login redirect already pending");
            return;
        }
        *pending = Some(self.redirects.schedule());
    }
}

impl std::fmt::Debug for Facade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Facade")
            .field("client", &self.client)
            .field("session", &self.session)
            .field("redirect_route", &self.redirects.route())
            .finish()
    }
}

pub struct FacadeBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    session: Option<Arc<Session>>,
    feedback: Option<Arc<dyn Feedback>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl FacadeBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            session: None,
            feedback: None,
            navigator: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn session(mut self, session: Arc<Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn feedback(mut self, feedback: Arc<dyn Feedback>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> Facade {
        let config = self.config;
        let feedback = self.feedback.unwrap_or_else(|| Arc::new(LogFeedback));
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(LogNavigator));
        Facade {
            client: ApiClient::with_token_header(&config.base_url, &config.token_header),
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
            session: self.session.unwrap_or_else(|| Arc::new(Session::in_memory())),
            loading: LoadingIndicator::new(feedback.clone(), config.messages.loading.clone()),
            feedback,
            redirects: RedirectScheduler::new(navigator, config.login_route.clone(), config.redirect_delay()),
            pending_redirect: Mutex::new(None),
            messages: config.messages,
        }
    }
}
