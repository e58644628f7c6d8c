use anyhow::Result;
use axum::{extract::{Query, State}, http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDate;
use engine::model::parse_published;
use engine::stats::WordTotal;
use engine::storage::memory::MemoryStore;
use engine::storage::snapshot::{load_store, StorePaths};
use engine::{Engine, EngineError, EntityListing, FilterSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, Json<serde_json::Value>);

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

/// Filter dimensions as they arrive on the query string; every one is
/// optional and an absent dimension never constrains the book set.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    startdate: Option<String>,
    enddate: Option<String>,
    id_author: Option<u32>,
    id_genre: Option<u32>,
}

impl FilterParams {
    fn into_spec(self) -> Result<FilterSpec, ApiError> {
        spec_from(self.startdate.as_deref(), self.enddate.as_deref(), self.id_author, self.id_genre)
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorParams {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WordsParams {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct SemanticParams {
    startdate: Option<String>,
    enddate: Option<String>,
    id_author: Option<u32>,
    id_genre: Option<u32>,
    word: String,
}

#[derive(Serialize)]
pub struct DateBracketsResponse {
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub nb_books: u64,
    pub nb_authors: u64,
    pub nb_genres: u64,
    pub nb_words: WordTotal,
    pub vocabulary_size: u64,
    pub date_first_book: Option<String>,
    pub date_last_book: Option<String>,
}

#[derive(Serialize)]
pub struct StatisticsResponse {
    pub words: WordsSection,
    pub sentences: SentencesSection,
}

#[derive(Serialize)]
pub struct WordsSection {
    pub count: u64,
    pub avg_in_books: u64,
    pub avg_in_sentence: u64,
    pub avg_book_vocab: u64,
}

#[derive(Serialize)]
pub struct SentencesSection {
    pub count: u64,
    pub avg_in_books: u64,
}

#[derive(Serialize)]
pub struct WordCloudResponse {
    pub words: Vec<CloudWord>,
}

#[derive(Serialize)]
pub struct CloudWord {
    pub value: String,
    pub count: u64,
}

#[derive(Serialize)]
pub struct MatchingWordsResponse {
    pub words: Vec<String>,
}

#[derive(Serialize)]
pub struct SemanticFieldResponse {
    pub words: Vec<SemanticWord>,
}

#[derive(Serialize)]
pub struct SemanticWord {
    pub value: String,
    pub relation_score: f64,
}

/// Load the snapshot from disk and serve it.
pub fn build_app(store_dir: &str) -> Result<Router> {
    let data = load_store(&StorePaths::new(store_dir))?;
    tracing::info!(
        num_books = data.books.len(),
        num_terms = data.idf.len(),
        "loaded corpus snapshot"
    );
    let engine = Engine::new(Arc::new(MemoryStore::new(data)));
    Ok(app_with(Arc::new(engine)))
}

pub fn app_with(engine: Arc<Engine>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/date_brackets", get(date_brackets_handler))
        .route("/api/authors", get(authors_handler))
        .route("/api/genres", get(genres_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/statistics", get(statistics_handler))
        .route("/api/word-cloud", get(word_cloud_handler))
        .route("/api/words", get(words_handler))
        .route("/api/semantic-fields", get(semantic_field_handler))
        .with_state(AppState { engine })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn date_brackets_handler(
    State(state): State<AppState>,
) -> Result<Json<DateBracketsResponse>, ApiError> {
    let (first_date, last_date) = match state.engine.date_brackets().map_err(reject)? {
        Some((first, last)) => (Some(first.to_string()), Some(last.to_string())),
        None => (None, None),
    };
    Ok(Json(DateBracketsResponse { first_date, last_date }))
}

pub async fn authors_handler(
    State(state): State<AppState>,
    Query(params): Query<AuthorParams>,
) -> Result<Json<Vec<EntityListing>>, ApiError> {
    Ok(Json(state.engine.authors(params.query.as_deref()).map_err(reject)?))
}

pub async fn genres_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<EntityListing>>, ApiError> {
    Ok(Json(state.engine.genres().map_err(reject)?))
}

pub async fn dashboard_handler(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let spec = params.into_spec()?;
    let stats = state.engine.dashboard_stats(&spec).map_err(reject)?;
    Ok(Json(DashboardResponse {
        nb_books: stats.books,
        nb_authors: stats.authors,
        nb_genres: stats.genres,
        nb_words: stats.words,
        vocabulary_size: stats.vocabulary,
        date_first_book: stats.first_date.map(|d| d.to_string()),
        date_last_book: stats.last_date.map(|d| d.to_string()),
    }))
}

pub async fn statistics_handler(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<StatisticsResponse>, ApiError> {
    let spec = params.into_spec()?;
    let stats = state.engine.advanced_stats(&spec).map_err(reject)?;
    Ok(Json(StatisticsResponse {
        words: WordsSection {
            count: stats.words.total,
            avg_in_books: stats.words.avg_per_book,
            avg_in_sentence: stats.words.avg_per_sentence,
            avg_book_vocab: stats.words.avg_vocabulary,
        },
        sentences: SentencesSection {
            count: stats.sentences.total,
            avg_in_books: stats.sentences.avg_per_book,
        },
    }))
}

pub async fn word_cloud_handler(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<WordCloudResponse>, ApiError> {
    let spec = params.into_spec()?;
    let cloud = state.engine.word_cloud(&spec).map_err(reject)?;
    let words = cloud.into_iter().map(|t| CloudWord { value: t.term, count: t.count }).collect();
    Ok(Json(WordCloudResponse { words }))
}

pub async fn words_handler(
    State(state): State<AppState>,
    Query(params): Query<WordsParams>,
) -> Result<Json<MatchingWordsResponse>, ApiError> {
    // under-length queries answer empty without touching the vocabulary
    if params.query.chars().count() <= 3 {
        return Ok(Json(MatchingWordsResponse { words: Vec::new() }));
    }
    let words = state.engine.matching_words(&params.query).map_err(reject)?;
    Ok(Json(MatchingWordsResponse { words }))
}

pub async fn semantic_field_handler(
    State(state): State<AppState>,
    Query(params): Query<SemanticParams>,
) -> Result<Json<SemanticFieldResponse>, ApiError> {
    let spec = spec_from(
        params.startdate.as_deref(),
        params.enddate.as_deref(),
        params.id_author,
        params.id_genre,
    )?;

    // unknown words answer empty, the engine is only asked about known ones
    if !state.engine.word_exists(&params.word).map_err(reject)? {
        return Ok(Json(SemanticFieldResponse { words: Vec::new() }));
    }
    let neighbors = match state.engine.semantic_field(&spec, &params.word) {
        Ok(neighbors) => neighbors,
        Err(EngineError::WordNotFound(_) | EngineError::NoBooksFound) => Vec::new(),
        Err(err) => return Err(reject(err)),
    };
    let words = neighbors
        .into_iter()
        .map(|n| SemanticWord { value: n.term, relation_score: n.distance })
        .collect();
    Ok(Json(SemanticFieldResponse { words }))
}

fn spec_from(
    startdate: Option<&str>,
    enddate: Option<&str>,
    author: Option<u32>,
    genre: Option<u32>,
) -> Result<FilterSpec, ApiError> {
    Ok(FilterSpec {
        start_date: parse_date_param(startdate)?,
        end_date: parse_date_param(enddate)?,
        author,
        genre,
    })
}

fn parse_date_param(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => match parse_published(s) {
            Ok(date) => Ok(Some(date)),
            Err(_) => Err((
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("unreadable date '{s}'") })),
            )),
        },
    }
}

fn reject(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::UnknownEntity { .. } => StatusCode::BAD_REQUEST,
        EngineError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(%err, %status, "request rejected");
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}
