//! Typed calls for the mini-program routes.
//!
//! Each method picks the path, method and auth/loading switches the pages
//! use, then goes through `Facade::call_as`. Catalog, home and detail routes
//! are public; favorites, profile and tracking need a session.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::ApiError;
use crate::facade::Facade;
use crate::request::RequestDescriptor;
use crate::session::UserProfile;
use crate::types::{
    AppItem, AppPage, Category, FavoriteFlag, FavoritePage, HomeData, ListQuery, LoginRequest,
    LoginResult, OkResult, QrCode, TrackEvent,
};

#[derive(Debug, Clone)]
pub struct WxappApi {
    facade: Arc<Facade>,
}

impl WxappApi {
    pub fn new(facade: Arc<Facade>) -> Self {
        Self { facade }
    }

    pub fn facade(&self) -> &Arc<Facade> {
        &self.facade
    }

    /// Exchange a platform login code for a session and sign it in.
    pub async fn login(
        &self,
        code: &str,
        nickname: &str,
        avatar_url: &str,
    ) -> Result<LoginResult, ApiError> {
        let body = LoginRequest {
            code: code.to_string(),
            appid: None,
            nickname: nickname.to_string(),
            avatar_url: avatar_url.to_string(),
        };
        let descriptor = self
            .with_payload(RequestDescriptor::post("/wxapp/auth/login"), &body)?
            .public();
        let result: LoginResult = self.facade.call_as(descriptor).await?;

        if let Err(err) = self.facade.session().sign_in(&result.token, result.user.clone()) {
            let err = ApiError::from(err);
            self.facade.surface_failure(&err);
            return Err(err);
        }
        info!("signed in");
        Ok(result)
    }

    /// Forget the session locally. The backend keeps no session state.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.facade.session().clear()?;
        info!("signed out");
        Ok(())
    }

    pub async fn user_profile(&self) -> Result<UserProfile, ApiError> {
        self.facade
            .call_as(RequestDescriptor::get("/wxapp/auth/profile"))
            .await
    }

    pub async fn home(&self, query: &ListQuery) -> Result<HomeData, ApiError> {
        let descriptor = self
            .with_payload(RequestDescriptor::get("/wxapp/home"), query)?
            .public();
        self.facade.call_as(descriptor).await
    }

    pub async fn app_list(&self, query: &ListQuery) -> Result<AppPage, ApiError> {
        let descriptor = self
            .with_payload(RequestDescriptor::get("/wxapp/list"), query)?
            .public();
        self.facade.call_as(descriptor).await
    }

    pub async fn app_detail(&self, id: i64) -> Result<AppItem, ApiError> {
        self.facade
            .call_as(RequestDescriptor::get(format!("/wxapp/detail/{id}")).public())
            .await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.facade
            .call_as(RequestDescriptor::get("/wxapp/categories").public())
            .await
    }

    pub async fn qr_code(&self, id: i64) -> Result<QrCode, ApiError> {
        let descriptor = self
            .with_payload(RequestDescriptor::get("/wxapp/qr"), &serde_json::json!({ "id": id }))?
            .public();
        self.facade.call_as(descriptor).await
    }

    pub async fn favorite_list(&self, page: u32, page_size: u32) -> Result<FavoritePage, ApiError> {
        let descriptor = self.with_payload(
            RequestDescriptor::get("/wxapp/favorite/list"),
            &ListQuery::page(page, page_size),
        )?;
        self.facade.call_as(descriptor).await
    }

    pub async fn toggle_favorite(&self, app_id: i64, value: bool) -> Result<OkResult, ApiError> {
        let descriptor = self.with_payload(
            RequestDescriptor::post("/wxapp/favorite/toggle"),
            &FavoriteFlag { app_id, value },
        )?;
        self.facade.call_as(descriptor).await
    }

    pub async fn pin_favorite(&self, app_id: i64, value: bool) -> Result<OkResult, ApiError> {
        let descriptor = self.with_payload(
            RequestDescriptor::post("/wxapp/favorite/pin"),
            &FavoriteFlag { app_id, value },
        )?;
        self.facade.call_as(descriptor).await
    }

    pub async fn track_event(&self, event: &str, payload: Value) -> Result<OkResult, ApiError> {
        let event = TrackEvent {
            event: event.to_string(),
            payload,
        };
        let descriptor = self.with_payload(RequestDescriptor::post("/wxapp/track/event"), &event)?;
        self.facade.call_as(descriptor).await
    }

    /// Attach `payload`, surfacing a rejected payload like any other failure.
    fn with_payload<P: Serialize + ?Sized>(
        &self,
        descriptor: RequestDescriptor,
        payload: &P,
    ) -> Result<RequestDescriptor, ApiError> {
        descriptor
            .with_payload(payload)
            .inspect_err(|err| self.facade.surface_failure(err))
    }
}
