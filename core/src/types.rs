//! DTOs for the mini-program routes.
//!
//! These mirror the backend's JSON but are defined independently of the
//! mock server; the integration tests catch schema drift between the two.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::UserProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
    pub nickname: String,
    pub avatar_url: String,
}

/// Login payload. Older backends call the token `access_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResult {
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Search and paging parameters shared by the home and list routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl ListQuery {
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    pub fn search(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppItem {
    pub id: i64,
    pub appid: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub is_top: bool,
    #[serde(default)]
    pub jump_path: Option<String>,
    #[serde(default)]
    pub is_favorited: bool,
    #[serde(default)]
    pub is_pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub id: i64,
    pub image_url: String,
    #[serde(default)]
    pub app_id: Option<i64>,
    #[serde(default)]
    pub jump_appid: Option<String>,
    #[serde(default)]
    pub jump_path: Option<String>,
    #[serde(default)]
    pub sort: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeData {
    #[serde(default)]
    pub banners: Vec<Banner>,
    #[serde(default)]
    pub top: Vec<AppItem>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub list: Vec<AppItem>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPage {
    pub list: Vec<AppItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritePage {
    pub favorites: Vec<AppItem>,
    pub current_page: u32,
    pub has_more: bool,
}

/// `{app_id, value}` body of the favorite toggle and pin routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteFlag {
    pub app_id: i64,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCode {
    #[serde(default)]
    pub qr_code_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResult {
    pub ok: bool,
}
