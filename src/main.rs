use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use clap::Parser;
use hybridrec::services::recommendation::ServiceError;
use hybridrec::services::store::{DataStore, InMemoryStore, StoreError};
use hybridrec::{init_tracing, AppState, Config};
use hybridrec::{
    Item, ItemFilter, ItemType, Rating, Recommendation, RecommendationMethod, User, UserRating,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// JSON file with `users`, `items` and `ratings` to preload.
    #[arg(short, long)]
    dataset: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    message: String,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(e) => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            ServiceError::Internal(e) => {
                error!("Request failed: {:#}", e);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ItemNotFound(_) => ApiError::new(StatusCode::NOT_FOUND, e.to_string()),
            StoreError::InvalidRating(_) => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            _ => {
                error!("Store failure: {}", e);
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ServiceError::Internal(e).into()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Deserialize)]
struct PersonalizedQuery {
    method: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct HybridQuery {
    limit: Option<usize>,
    collaborative_weight: Option<f64>,
    content_weight: Option<f64>,
    min_similarity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SimilarityQuery {
    limit: Option<usize>,
    min_similarity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PopularQuery {
    item_type: Option<ItemType>,
    category: Option<String>,
    genre: Option<String>,
    limit: Option<usize>,
    min_ratings: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ItemsQuery {
    item_type: Option<ItemType>,
    category: Option<String>,
    genre: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TrendingQuery {
    item_type: Option<ItemType>,
    days: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewRating {
    user_id: Uuid,
    item_id: Uuid,
    rating: u8,
}

async fn health_check() -> Json<ApiResponse<HashMap<String, String>>> {
    let mut status = HashMap::new();
    status.insert("status".to_string(), "healthy".to_string());
    status.insert("service".to_string(), "hybridrec".to_string());
    status.insert("version".to_string(), env!("CARGO_PKG_VERSION").to_string());

    Json(ApiResponse::success(status))
}

async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<HashMap<String, u64>>> {
    let mut stats = state.serving_service.get_serving_stats();
    stats.insert("items".to_string(), state.store.item_count() as u64);
    stats.insert("ratings".to_string(), state.store.rating_count() as u64);
    Json(ApiResponse::success(stats))
}

async fn get_personalized(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<PersonalizedQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let method = match params.method.as_deref() {
        Some(raw) => raw
            .parse::<RecommendationMethod>()
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?,
        None => RecommendationMethod::default(),
    };
    let limit = params.limit.unwrap_or(state.config.recommendation.default_limit);

    let recommendations = state
        .serving_service
        .serve(
            user_id,
            method.as_str(),
            state
                .recommendation_service
                .get_personalized_recommendations(user_id, limit, method),
        )
        .await?;
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn get_hybrid(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<HybridQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let defaults = &state.config.recommendation;
    let recommendations = state
        .serving_service
        .serve(
            user_id,
            "hybrid",
            state.recommendation_service.hybrid(
                user_id,
                params.limit.unwrap_or(defaults.default_limit),
                params.collaborative_weight.unwrap_or(defaults.collaborative_weight),
                params.content_weight.unwrap_or(defaults.content_weight),
                params.min_similarity.unwrap_or(defaults.min_similarity),
            ),
        )
        .await?;
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn get_collaborative(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<SimilarityQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let defaults = &state.config.recommendation;
    let recommendations = state
        .serving_service
        .serve(
            user_id,
            "collaborative",
            state.recommendation_service.collaborative(
                user_id,
                params.limit.unwrap_or(defaults.default_limit),
                params.min_similarity.unwrap_or(defaults.min_similarity),
            ),
        )
        .await?;
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn get_content_based(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<SimilarityQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let defaults = &state.config.recommendation;
    let recommendations = state
        .serving_service
        .serve(
            user_id,
            "content",
            state.recommendation_service.content_based(
                user_id,
                params.limit.unwrap_or(defaults.default_limit),
                params.min_similarity.unwrap_or(defaults.min_similarity),
            ),
        )
        .await?;
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn get_popular(
    State(state): State<AppState>,
    Query(params): Query<PopularQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let filter = ItemFilter {
        item_type: params.item_type,
        category: params.category,
        genre: params.genre,
    };
    let limit = params.limit.unwrap_or(state.config.recommendation.default_limit);
    let min_ratings = params.min_ratings.unwrap_or(state.config.popularity.fallback_min_ratings);

    let recommendations = state
        .serving_service
        .serve_listing(state.recommendation_service.popular(&filter, limit, min_ratings))
        .await?;
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn get_popular_by_category(
    State(state): State<AppState>,
    Path(item_type): Path<ItemType>,
    Query(params): Query<LimitQuery>,
) -> ApiResult<BTreeMap<String, Vec<Recommendation>>> {
    let limit = params.limit.unwrap_or(state.config.recommendation.default_limit);
    let grouped = state
        .serving_service
        .serve_listing(state.recommendation_service.popular_by_category(item_type, limit))
        .await?;
    Ok(Json(ApiResponse::success(grouped)))
}

async fn get_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let days = params.days.unwrap_or(state.config.popularity.trending_days);
    let limit = params.limit.unwrap_or(state.config.recommendation.default_limit);
    let recommendations = state
        .serving_service
        .serve_listing(state.recommendation_service.trending(params.item_type, days, limit))
        .await?;
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn get_item(State(state): State<AppState>, Path(item_id): Path<Uuid>) -> ApiResult<Item> {
    match state.recommendation_service.item(item_id).await? {
        Some(item) => Ok(Json(ApiResponse::success(item))),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, format!("item not found: {}", item_id))),
    }
}

async fn get_similar_items(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(params): Query<SimilarityQuery>,
) -> ApiResult<Vec<Recommendation>> {
    let defaults = &state.config.recommendation;
    let recommendations = state
        .serving_service
        .serve_listing(state.recommendation_service.similar_items(
            item_id,
            params.limit.unwrap_or(defaults.default_limit),
            params.min_similarity.unwrap_or(defaults.min_similarity),
        ))
        .await?;
    Ok(Json(ApiResponse::success(recommendations)))
}

async fn list_items(
    State(state): State<AppState>,
    Query(params): Query<ItemsQuery>,
) -> ApiResult<Vec<Item>> {
    let filter = ItemFilter {
        item_type: params.item_type,
        category: params.category,
        genre: params.genre,
    };
    let mut items = state.store.items_matching(&filter).await?;
    items.sort_by(|a, b| a.display_name().cmp(b.display_name()).then(a.id.cmp(&b.id)));
    Ok(Json(ApiResponse::success(items)))
}

async fn add_item(State(state): State<AppState>, Json(item): Json<Item>) -> ApiResult<Item> {
    state.store.insert_item(item.clone());
    info!("Added item {} '{}' ({})", item.id, item.display_name(), item.item_type());
    Ok(Json(ApiResponse::success(item)))
}

async fn add_user(State(state): State<AppState>, Json(new_user): Json<NewUser>) -> ApiResult<User> {
    let mut user = User::new();
    user.username = new_user.username;
    state.store.insert_user(user.clone());
    info!("Added user {}", user.id);
    Ok(Json(ApiResponse::success(user)))
}

async fn get_user(State(state): State<AppState>, Path(user_id): Path<Uuid>) -> ApiResult<User> {
    match state.store.user(user_id) {
        Some(user) => Ok(Json(ApiResponse::success(user))),
        None => Err(ApiError::new(StatusCode::NOT_FOUND, format!("user not found: {}", user_id))),
    }
}

async fn get_user_ratings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<UserRating>> {
    let ratings = state.store.ratings_of(user_id).await?;
    Ok(Json(ApiResponse::success(ratings)))
}

async fn get_item_ratings(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Vec<Rating>> {
    if state.store.item_by_id(item_id).await?.is_none() {
        return Err(StoreError::ItemNotFound(item_id).into());
    }
    Ok(Json(ApiResponse::success(state.store.ratings_for_item(item_id))))
}

async fn delete_rating(
    State(state): State<AppState>,
    Path((user_id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<bool> {
    if !state.store.delete_rating(user_id, item_id) {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("no rating of {} by {}", item_id, user_id),
        ));
    }
    info!("Deleted rating of {} by {}", item_id, user_id);
    Ok(Json(ApiResponse::success(true)))
}

async fn add_rating(
    State(state): State<AppState>,
    Json(new_rating): Json<NewRating>,
) -> ApiResult<Rating> {
    let rating = state.store.upsert_rating(Rating::new(
        new_rating.user_id,
        new_rating.item_id,
        new_rating.rating,
    ))?;
    Ok(Json(ApiResponse::success(rating)))
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/recommendations/personalized/:user_id", get(get_personalized))
        .route("/recommendations/hybrid/:user_id", get(get_hybrid))
        .route("/recommendations/collaborative/:user_id", get(get_collaborative))
        .route("/recommendations/content-based/:user_id", get(get_content_based))
        .route("/recommendations/popular", get(get_popular))
        .route("/recommendations/popular/by-category/:item_type", get(get_popular_by_category))
        .route("/recommendations/trending", get(get_trending))
        .route("/items", get(list_items).post(add_item))
        .route("/items/:item_id", get(get_item))
        .route("/items/:item_id/similar", get(get_similar_items))
        .route("/users", post(add_user))
        .route("/users/:user_id", get(get_user))
        .route("/ratings", post(add_rating))
        .route("/ratings/user/:user_id", get(get_user_ratings))
        .route("/ratings/item/:item_id", get(get_item_ratings))
        .route("/ratings/:user_id/:item_id", delete(delete_rating))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = Config::load_or_default(&args.config)?;
    info!("Starting hybridrec server with config: {:?}", config.server);

    // Content scoring runs on the global rayon pool.
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.server.workers)
        .build_global()?;

    let store = match &args.dataset {
        Some(path) => InMemoryStore::from_json_file(path)?,
        None => InMemoryStore::new(),
    };

    let addr = config.server.socket_addr()?;
    let state = AppState::new(config, store)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
