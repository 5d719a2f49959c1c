use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/v1";
pub const TOKEN_HEADER: &str = "token";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct App {
    pub id: i64,
    pub appid: String,
    pub name: String,
    pub icon: String,
    pub desc: String,
    pub category_id: Option<i64>,
    pub is_top: bool,
    pub jump_path: Option<String>,
    pub qrcode_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Banner {
    pub id: i64,
    pub image_url: String,
    pub app_id: Option<i64>,
    pub jump_appid: Option<String>,
    pub jump_path: Option<String>,
    pub sort: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub avatar: String,
}

#[derive(Clone, Debug)]
pub struct Favorite {
    pub user_id: i64,
    pub app_id: i64,
    pub is_pinned: bool,
}

#[derive(Clone, Debug)]
pub struct TrackedEvent {
    pub user_id: i64,
    pub event: String,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct Store {
    pub apps: Vec<App>,
    pub categories: Vec<Category>,
    pub banners: Vec<Banner>,
    /// Users keyed by the login code they registered with.
    pub users: HashMap<String, User>,
    /// Issued token -> user id.
    pub tokens: HashMap<String, i64>,
    /// Newest first.
    pub favorites: Vec<Favorite>,
    pub events: Vec<TrackedEvent>,
}

impl Store {
    pub fn seeded() -> Self {
        let app = |id: i64, name: &str, category_id: i64, is_top: bool| App {
            id,
            appid: format!("wx{id:04}"),
            name: name.to_string(),
            icon: format!("https://cdn.example.com/icons/{id}.png"),
            desc: format!("{name} mini program"),
            category_id: Some(category_id),
            is_top,
            jump_path: Some("pages/index/index".to_string()),
            qrcode_url: format!("https://cdn.example.com/qr/{id}.png"),
        };
        Self {
            apps: vec![
                app(1, "Weather Now", 1, true),
                app(2, "Bus Tracker", 1, false),
                app(3, "Word Puzzle", 2, false),
                app(4, "Pixel Runner", 2, true),
            ],
            categories: vec![
                Category {
                    id: 1,
                    name: "Tools".to_string(),
                    icon_url: None,
                },
                Category {
                    id: 2,
                    name: "Games".to_string(),
                    icon_url: None,
                },
            ],
            banners: vec![Banner {
                id: 1,
                image_url: "https://cdn.example.com/banners/1.png".to_string(),
                app_id: Some(1),
                jump_appid: Some("wx0001".to_string()),
                jump_path: None,
                sort: 0,
            }],
            ..Self::default()
        }
    }

    fn app(&self, id: i64) -> Option<&App> {
        self.apps.iter().find(|a| a.id == id)
    }

    fn user_for_token(&self, token: &str) -> Option<&User> {
        let id = *self.tokens.get(token)?;
        self.users.values().find(|u| u.id == id)
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with_store(Arc::new(RwLock::new(Store::seeded())))
}

pub fn app_with_store(db: Db) -> Router {
    let wxapp = Router::new()
        .route("/wxapp/auth/login", post(login))
        .route("/wxapp/auth/profile", get(profile))
        .route("/wxapp/home", get(home))
        .route("/wxapp/list", get(list))
        .route("/wxapp/detail/{id}", get(detail))
        .route("/wxapp/categories", get(categories))
        .route("/wxapp/qr", get(qr))
        .route("/wxapp/favorite/list", get(favorite_list))
        .route("/wxapp/favorite/toggle", post(favorite_toggle))
        .route("/wxapp/favorite/pin", post(favorite_pin))
        .route("/wxapp/track/event", post(track_event))
        .with_state(db);
    Router::new()
        .nest(API_PREFIX, wxapp)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- envelope ---

pub fn success(data: Value) -> Json<Value> {
    Json(json!({"code": 200, "msg": "OK", "data": data, "result": data}))
}

pub fn fail(code: i64, msg: &str) -> Json<Value> {
    Json(json!({"code": code, "msg": msg, "data": null}))
}

fn expired() -> Json<Value> {
    fail(401, "login expired")
}

fn app_item(app: &App, favorite: Option<&Favorite>) -> Value {
    json!({
        "id": app.id,
        "appid": app.appid,
        "name": app.name,
        "icon": app.icon,
        "desc": app.desc,
        "category_id": app.category_id,
        "is_top": app.is_top,
        "jump_path": app.jump_path,
        "is_favorited": favorite.is_some(),
        "is_pinned": favorite.is_some_and(|f| f.is_pinned),
    })
}

/// Resolve the `token` header to a user id.
fn authenticate(store: &Store, headers: &HeaderMap) -> Option<i64> {
    let token = headers.get(TOKEN_HEADER)?.to_str().ok()?;
    store.tokens.get(token).copied()
}

// --- handlers ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
    pub code: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

async fn login(State(db): State<Db>, Json(body): Json<LoginBody>) -> Json<Value> {
    if body.code.is_empty() {
        return fail(400, "code is required");
    }
    let mut store = db.write().await;
    let next_id = store.users.len() as i64 + 1;
    let user = store
        .users
        .entry(body.code.clone())
        .or_insert_with(|| User {
            id: next_id,
            nickname: format!("wx_{next_id}"),
            avatar: String::new(),
        });
    if let Some(nickname) = body.nickname.filter(|n| !n.is_empty()) {
        user.nickname = nickname;
    }
    if let Some(avatar) = body.avatar_url.filter(|a| !a.is_empty()) {
        user.avatar = avatar;
    }
    let user = user.clone();
    let token = Uuid::new_v4().simple().to_string();
    store.tokens.insert(token.clone(), user.id);
    info!(user_id = user.id, "mini program login");
    success(json!({"token": token, "user": user}))
}

async fn profile(State(db): State<Db>, headers: HeaderMap) -> Json<Value> {
    let store = db.read().await;
    let token = headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match store.user_for_token(token) {
        Some(user) => success(json!(user)),
        None => expired(),
    }
}

#[derive(Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub category_id: Option<i64>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn first_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

impl ListParams {
    fn window(&self) -> (usize, usize) {
        let page = self.page.max(1) as usize;
        let size = self.page_size.clamp(1, 100) as usize;
        ((page - 1) * size, size)
    }

    fn matches(&self, app: &App) -> bool {
        let text = self
            .q
            .as_deref()
            .is_none_or(|q| app.name.contains(q) || app.appid.contains(q));
        let category = self.category_id.is_none_or(|c| app.category_id == Some(c));
        text && category
    }
}

fn filtered(store: &Store, params: &ListParams) -> (Vec<Value>, usize) {
    let hits: Vec<&App> = store.apps.iter().filter(|a| params.matches(a)).collect();
    let (offset, size) = params.window();
    let items = hits
        .iter()
        .skip(offset)
        .take(size)
        .map(|a| app_item(a, None))
        .collect();
    (items, hits.len())
}

async fn home(State(db): State<Db>, Query(params): Query<ListParams>) -> Json<Value> {
    let store = db.read().await;
    let (list, total) = filtered(&store, &params);
    let top: Vec<Value> = store
        .apps
        .iter()
        .filter(|a| a.is_top)
        .map(|a| app_item(a, None))
        .collect();
    success(json!({
        "banners": store.banners,
        "top": top,
        "categories": store.categories,
        "list": list,
        "total": total,
    }))
}

async fn list(State(db): State<Db>, Query(params): Query<ListParams>) -> Json<Value> {
    let store = db.read().await;
    let (list, total) = filtered(&store, &params);
    success(json!({
        "list": list,
        "total": total,
        "page": params.page,
        "page_size": params.page_size,
    }))
}

async fn detail(State(db): State<Db>, Path(id): Path<i64>) -> Json<Value> {
    let store = db.read().await;
    match store.app(id) {
        Some(app) => success(app_item(app, None)),
        None => fail(400, "app not found"),
    }
}

async fn categories(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    success(json!(store.categories))
}

#[derive(Deserialize)]
pub struct QrParams {
    pub id: Option<i64>,
    pub appid: Option<String>,
}

async fn qr(State(db): State<Db>, Query(params): Query<QrParams>) -> Json<Value> {
    let store = db.read().await;
    let app = match (params.id, params.appid) {
        (Some(id), _) => store.app(id),
        (None, Some(appid)) => store.apps.iter().find(|a| a.appid == appid),
        (None, None) => None,
    };
    let url = app.map(|a| a.qrcode_url.clone()).unwrap_or_default();
    success(json!({"qr_code_url": url}))
}

async fn favorite_list(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Json<Value> {
    let store = db.read().await;
    let Some(user_id) = authenticate(&store, &headers) else {
        return expired();
    };
    let (offset, size) = params.window();
    let favorites: Vec<Value> = store
        .favorites
        .iter()
        .filter(|f| f.user_id == user_id)
        .skip(offset)
        .take(size)
        .filter_map(|f| store.app(f.app_id).map(|a| app_item(a, Some(f))))
        .collect();
    let has_more = favorites.len() == size;
    success(json!({
        "favorites": favorites,
        "current_page": params.page.max(1),
        "has_more": has_more,
    }))
}

#[derive(Deserialize)]
pub struct FavoriteFlag {
    pub app_id: i64,
    pub value: bool,
}

async fn favorite_toggle(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(body): Json<FavoriteFlag>,
) -> Json<Value> {
    let mut store = db.write().await;
    let Some(user_id) = authenticate(&store, &headers) else {
        return expired();
    };
    if store.app(body.app_id).is_none() {
        return fail(400, "app not found");
    }
    let existing = store
        .favorites
        .iter()
        .position(|f| f.user_id == user_id && f.app_id == body.app_id);
    match (body.value, existing) {
        (true, None) => store.favorites.insert(
            0,
            Favorite {
                user_id,
                app_id: body.app_id,
                is_pinned: false,
            },
        ),
        (false, Some(index)) => {
            store.favorites.remove(index);
        }
        _ => {}
    }
    success(json!({"ok": true}))
}

async fn favorite_pin(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(body): Json<FavoriteFlag>,
) -> Json<Value> {
    let mut store = db.write().await;
    let Some(user_id) = authenticate(&store, &headers) else {
        return expired();
    };
    let existing = store
        .favorites
        .iter()
        .position(|f| f.user_id == user_id && f.app_id == body.app_id);
    match existing {
        Some(index) => store.favorites[index].is_pinned = body.value,
        None if body.value => store.favorites.insert(
            0,
            Favorite {
                user_id,
                app_id: body.app_id,
                is_pinned: true,
            },
        ),
        None => {}
    }
    success(json!({"ok": true}))
}

#[derive(Deserialize)]
pub struct TrackBody {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

async fn track_event(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(body): Json<TrackBody>,
) -> Json<Value> {
    let mut store = db.write().await;
    let Some(user_id) = authenticate(&store, &headers) else {
        return expired();
    };
    store.events.push(TrackedEvent {
        user_id,
        event: body.event,
        payload: body.payload,
    });
    success(json!({"ok": true}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(q: Option<&str>, category_id: Option<i64>, page: u32, page_size: u32) -> ListParams {
        ListParams {
            q: q.map(str::to_string),
            category_id,
            page,
            page_size,
        }
    }

    #[test]
    fn seeded_store_has_catalog() {
        let store = Store::seeded();
        assert_eq!(store.apps.len(), 4);
        assert_eq!(store.categories.len(), 2);
        assert!(store.tokens.is_empty());
    }

    #[test]
    fn list_params_default_paging() {
        let p: ListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 10);
        assert_eq!(p.window(), (0, 10));
    }

    #[test]
    fn window_clamps_page_size_and_page() {
        assert_eq!(params(None, None, 0, 500).window(), (0, 100));
        assert_eq!(params(None, None, 3, 2).window(), (4, 2));
    }

    #[test]
    fn filter_by_text_and_category() {
        let store = Store::seeded();
        let (items, total) = filtered(&store, &params(Some("Bus"), None, 1, 10));
        assert_eq!(total, 1);
        assert_eq!(items[0]["name"], "Bus Tracker");

        let (_, total) = filtered(&store, &params(None, Some(2), 1, 10));
        assert_eq!(total, 2);

        let (items, total) = filtered(&store, &params(None, None, 2, 3));
        assert_eq!(total, 4);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn success_mirrors_data_into_result() {
        let Json(body) = success(json!({"x": 1}));
        assert_eq!(body["code"], 200);
        assert_eq!(body["data"], body["result"]);
    }

    #[test]
    fn app_item_reflects_favorite_state() {
        let store = Store::seeded();
        let fav = Favorite {
            user_id: 1,
            app_id: 1,
            is_pinned: true,
        };
        let item = app_item(store.app(1).unwrap(), Some(&fav));
        assert_eq!(item["is_favorited"], true);
        assert_eq!(item["is_pinned"], true);
        assert!(item.get("qrcode_url").is_none());
    }
}
