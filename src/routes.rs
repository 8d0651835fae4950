use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpResponse};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::time;

use crate::auth::AuthService;
use crate::dashboard::catalog::{CatalogFilter, CatalogParams};
use crate::dashboard::inventory::{self, ImageUpload};
use crate::dashboard::{orders, settings, Dashboard};
use crate::error::ShopError;
use crate::middleware::{AuthMiddleware, Identity};
use crate::models::{NewOrder, NewSweet, OrderStatus, ProfileInput, SettingsInput, SignInInput, SignUpInput, SweetPatch};
use crate::realtime::{Subscription, Table};
use crate::state::AppState;
use crate::storage::{content_type_for, IMAGES_BUCKET};

type HandlerResult = Result<HttpResponse, ShopError>;

#[derive(Deserialize)]
pub struct RestockInput {
    pub amount: i64,
}

#[derive(Deserialize)]
pub struct StockInput {
    pub stock: i64,
}

#[derive(Deserialize)]
pub struct StatusInput {
    pub status: OrderStatus,
}

async fn dashboard_for(state: &AppState, identity: &Identity) -> Result<Dashboard, ShopError> {
    Dashboard::load(state.store.clone(), &identity.user_id).await
}

async fn require_admin(state: &AppState, identity: &Identity) -> Result<Dashboard, ShopError> {
    let dashboard = dashboard_for(state, identity).await?;
    if !dashboard.role().is_admin() {
        log::info!("admin route refused for {}", identity.user_id);
        return Err(ShopError::Forbidden);
    }
    Ok(dashboard)
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn sign_up(state: web::Data<AppState>, input: web::Json<SignUpInput>) -> HandlerResult {
    let profile = state.auth.sign_up(state.store.as_ref(), &input).await?;
    Ok(HttpResponse::Created().json(profile))
}

async fn sign_in(state: web::Data<AppState>, input: web::Json<SignInInput>) -> HandlerResult {
    let response = state.auth.sign_in(state.store.as_ref(), &input).await?;
    Ok(HttpResponse::Ok().json(response))
}

async fn sign_out(state: web::Data<AppState>, identity: Identity) -> HttpResponse {
    state.auth.sign_out(&identity.claims);
    HttpResponse::Ok().json(json!({ "message": "Logged out successfully" }))
}

async fn current_user(state: web::Data<AppState>, identity: Identity) -> HandlerResult {
    let profile = state.auth.current_user(state.store.as_ref(), &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

async fn list_sweets(state: web::Data<AppState>, params: web::Query<CatalogParams>) -> HandlerResult {
    let filter = CatalogFilter::try_from(params.into_inner())?;
    let sweets = state.store.list_sweets().await?;
    let visible: Vec<_> = filter.apply(&sweets);
    Ok(HttpResponse::Ok().json(visible))
}

async fn get_sweet(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let sweet = state.store.get_sweet(&id).await?.ok_or(ShopError::NotFound("Sweet"))?;
    Ok(HttpResponse::Ok().json(sweet))
}

async fn add_sweet(state: web::Data<AppState>, identity: Identity, input: web::Json<NewSweet>) -> HandlerResult {
    require_admin(&state, &identity).await?;
    let sweet = inventory::create_sweet(state.store.as_ref(), input.into_inner()).await?;
    Ok(HttpResponse::Created().json(sweet))
}

async fn update_sweet(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<String>,
    patch: web::Json<SweetPatch>,
) -> HandlerResult {
    require_admin(&state, &identity).await?;
    let sweet = inventory::update_sweet(state.store.as_ref(), &id, &patch).await?;
    Ok(HttpResponse::Ok().json(sweet))
}

async fn delete_sweet(state: web::Data<AppState>, identity: Identity, id: web::Path<String>) -> HandlerResult {
    require_admin(&state, &identity).await?;
    inventory::delete_sweet(state.store.as_ref(), &id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Sweet deleted successfully" })))
}

async fn restock_sweet(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<String>,
    input: web::Json<RestockInput>,
) -> HandlerResult {
    require_admin(&state, &identity).await?;
    let sweet = inventory::restock(state.store.as_ref(), &id, input.amount).await?;
    Ok(HttpResponse::Ok().json(sweet))
}

// Blind write used by the purchase flow; any signed-in user may call it.
async fn set_stock(
    state: web::Data<AppState>,
    _identity: Identity,
    id: web::Path<String>,
    input: web::Json<StockInput>,
) -> HandlerResult {
    if input.stock < 0 {
        return Err(ShopError::validation("Stock must be zero or more"));
    }
    let sweet = state
        .store
        .set_stock(&id, input.stock)
        .await?
        .ok_or(ShopError::NotFound("Sweet"))?;
    Ok(HttpResponse::Ok().json(sweet))
}

async fn list_orders(state: web::Data<AppState>, identity: Identity) -> HandlerResult {
    let dashboard = dashboard_for(&state, &identity).await?;
    let rows = orders::list_for(state.store.as_ref(), dashboard.profile()).await?;
    let summary = orders::OrderSummary::of(&rows);
    Ok(HttpResponse::Ok().json(json!({ "orders": rows, "summary": summary })))
}

async fn create_order(state: web::Data<AppState>, identity: Identity, input: web::Json<NewOrder>) -> HandlerResult {
    let order = orders::place_order(state.store.as_ref(), &identity.user_id, input.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

async fn update_order_status(
    state: web::Data<AppState>,
    identity: Identity,
    id: web::Path<String>,
    input: web::Json<StatusInput>,
) -> HandlerResult {
    require_admin(&state, &identity).await?;
    let order = orders::change_status(state.store.as_ref(), &id, input.status).await?;
    Ok(HttpResponse::Ok().json(order))
}

async fn dashboard_stats(state: web::Data<AppState>, identity: Identity) -> HandlerResult {
    let dashboard = dashboard_for(&state, &identity).await?;
    let stats = dashboard.overview().await?;
    Ok(HttpResponse::Ok().json(json!({
        "role": dashboard.role(),
        "sections": dashboard.sections(),
        "stats": stats,
    })))
}

async fn inventory_stats(state: web::Data<AppState>, identity: Identity) -> HandlerResult {
    require_admin(&state, &identity).await?;
    let stats = inventory::InventoryStats::fetch(state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

async fn export_inventory(state: web::Data<AppState>, identity: Identity) -> HandlerResult {
    require_admin(&state, &identity).await?;
    let sweets = state.store.list_sweets().await?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header(("Content-Disposition", "attachment; filename=\"inventory.csv\""))
        .body(inventory::export_csv(&sweets)?))
}

async fn list_users(state: web::Data<AppState>, identity: Identity) -> HandlerResult {
    let dashboard = dashboard_for(&state, &identity).await?;
    let directory = dashboard.users().await?.into_result()?;
    Ok(HttpResponse::Ok().json(directory))
}

async fn get_settings(state: web::Data<AppState>, identity: Identity) -> HandlerResult {
    let settings = settings::load_settings(state.store.as_ref(), &identity.user_id).await?;
    Ok(HttpResponse::Ok().json(settings))
}

async fn put_settings(state: web::Data<AppState>, identity: Identity, input: web::Json<SettingsInput>) -> HandlerResult {
    let settings = settings::save_settings(state.store.as_ref(), &identity.user_id, &input).await?;
    Ok(HttpResponse::Ok().json(settings))
}

async fn put_profile(state: web::Data<AppState>, identity: Identity, input: web::Json<ProfileInput>) -> HandlerResult {
    let profile = settings::rename_profile(state.store.as_ref(), &identity.user_id, &input.full_name).await?;
    Ok(HttpResponse::Ok().json(profile))
}

async fn upload_object(
    state: web::Data<AppState>,
    identity: Identity,
    bucket: web::Path<String>,
    upload: web::Json<ImageUpload>,
) -> HandlerResult {
    require_admin(&state, &identity).await?;
    if bucket.as_str() != IMAGES_BUCKET {
        return Err(ShopError::NotFound("Bucket"));
    }
    let public_url = inventory::store_image(&state.storage, &upload).await?;
    let path = public_url
        .rsplit_once(&format!("/storage/{IMAGES_BUCKET}/"))
        .map(|(_, path)| path.to_string())
        .unwrap_or_default();
    Ok(HttpResponse::Created().json(json!({ "path": path, "public_url": public_url })))
}

async fn download_object(state: web::Data<AppState>, path: web::Path<(String, String)>) -> HandlerResult {
    let (bucket, object) = path.into_inner();
    let bytes = state.storage.download(&bucket, &object).await?;
    Ok(HttpResponse::Ok().content_type(content_type_for(&object)).body(bytes))
}

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Server-sent event frames for a subscription: one `change` event per write,
/// and a comment line whenever the feed has been idle for `keep_alive`.
fn sse_frames(subscription: Subscription, keep_alive: Duration) -> impl Stream<Item = Result<web::Bytes, Infallible>> {
    let ticker = time::interval_at(time::Instant::now() + keep_alive, keep_alive);
    futures::stream::unfold((subscription, ticker), |(mut subscription, mut ticker)| async move {
        let frame = tokio::select! {
            event = subscription.recv() => {
                let payload = serde_json::to_string(&event?).ok()?;
                web::Bytes::from(format!("event: change\ndata: {payload}\n\n"))
            }
            _ = ticker.tick() => web::Bytes::from_static(b": keep-alive\n\n"),
        };
        ticker.reset();
        Some((Ok(frame), (subscription, ticker)))
    })
}

async fn realtime(state: web::Data<AppState>, _identity: Identity, table: web::Path<String>) -> HandlerResult {
    let table: Table = table.parse().map_err(ShopError::Validation)?;
    let subscription = state.hub.subscribe(Some(table));
    log::debug!("realtime subscriber attached to {}", table);

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(sse_frames(subscription, KEEP_ALIVE)))
}

pub fn configure(cfg: &mut web::ServiceConfig, auth: Arc<AuthService>) {
    // Public routes
    cfg.route("/health", web::get().to(health))
        .route("/auth/signup", web::post().to(sign_up))
        .route("/auth/signin", web::post().to(sign_in))
        .route("/storage/{bucket}/{path:.*}", web::get().to(download_object))
        .service(
            web::scope("")
                .wrap(AuthMiddleware::new(auth))
                .route("/auth/signout", web::post().to(sign_out))
                .route("/auth/user", web::get().to(current_user))
                .route("/sweets", web::get().to(list_sweets))
                .route("/sweets", web::post().to(add_sweet))
                .route("/sweets/{id}", web::get().to(get_sweet))
                .route("/sweets/{id}", web::patch().to(update_sweet))
                .route("/sweets/{id}", web::delete().to(delete_sweet))
                .route("/sweets/{id}/restock", web::post().to(restock_sweet))
                .route("/sweets/{id}/stock", web::put().to(set_stock))
                .route("/orders", web::get().to(list_orders))
                .route("/orders", web::post().to(create_order))
                .route("/orders/{id}/status", web::patch().to(update_order_status))
                .route("/dashboard/stats", web::get().to(dashboard_stats))
                .route("/inventory/stats", web::get().to(inventory_stats))
                .route("/inventory/export", web::get().to(export_inventory))
                .route("/users", web::get().to(list_users))
                .route("/settings", web::get().to(get_settings))
                .route("/settings", web::put().to(put_settings))
                .route("/profile", web::put().to(put_profile))
                .route("/storage/{bucket}", web::post().to(upload_object))
                .route("/realtime/{table}", web::get().to(realtime)),
        );
}
