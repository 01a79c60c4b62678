use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use lifetools_core::language::AppLanguage;
use lifetools_core::llm::error::{FailureStage, LlmDiagnosticsError};
use lifetools_core::llm::gemini::GeminiClient;
use lifetools_core::llm::TextGenerator;
use lifetools_core::recipe::{ChatMessage, RecipeChat};
use lifetools_core::recommend::{ContentType, MediaCriteria, RecommendationRecord};
use lifetools_core::spinner::{SpinOutcome, SpinnerError, SpinnerSession, WedgeSet};
use lifetools_core::tip::DayPart;
use lifetools_core::update::{ReleaseClient, UpdateStatus};

mod sessions;

use sessions::{SessionLimits, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = lifetools_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let generator: Option<Arc<dyn TextGenerator>> = match GeminiClient::from_settings(&settings) {
        Ok(client) => {
            tracing::info!(model = client.model(), "model client ready");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::error!(error = %e, "model client unavailable; starting API in degraded mode");
            None
        }
    };

    let releases = match ReleaseClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "release client unavailable; update checks disabled");
            None
        }
    };

    let limits = SessionLimits::from_env();
    tracing::info!(
        max_sessions = limits.max_sessions,
        idle_secs = limits.idle_timeout.num_seconds(),
        "session limits"
    );

    let state = AppState {
        generator,
        releases,
        spinners: Arc::new(Mutex::new(SessionStore::new(limits))),
        recipes: Arc::new(Mutex::new(SessionStore::new(limits))),
        rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        language: settings.language,
        current_version: settings.current_version.clone().into(),
    };

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/spinners", post(create_spinner))
        .route("/spinners/:id", get(get_spinner).delete(delete_spinner))
        .route("/spinners/:id/items", post(add_spinner_item))
        .route("/spinners/:id/items/:label", delete(remove_spinner_item))
        .route("/spinners/:id/reorder", post(reorder_spinner))
        .route("/spinners/:id/spin", post(spin_spinner))
        .route("/spinners/:id/complete", post(complete_spinner))
        .route("/spinners/:id/acknowledge", post(acknowledge_spinner))
        .route("/recipes", post(create_recipe_chat))
        .route("/recipes/:id", delete(delete_recipe_chat))
        .route("/recipes/:id/messages", post(send_recipe_message))
        .route("/recommendations", post(post_recommendations))
        .route("/recommendations/single", post(post_single_recommendation))
        .route("/truth/questions", get(get_truth_questions))
        .route("/truth/question", get(get_truth_question))
        .route("/tip", get(get_tip))
        .route("/update", get(get_update))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

type SharedChat = Arc<tokio::sync::Mutex<RecipeChat>>;

#[derive(Clone)]
struct AppState {
    generator: Option<Arc<dyn TextGenerator>>,
    releases: Option<Arc<ReleaseClient>>,
    spinners: Arc<Mutex<SessionStore<SpinnerSession>>>,
    recipes: Arc<Mutex<SessionStore<SharedChat>>>,
    rng: Arc<Mutex<StdRng>>,
    language: AppLanguage,
    current_version: Arc<str>,
}

impl AppState {
    fn generator(&self) -> Result<&dyn TextGenerator, ApiError> {
        self.generator
            .as_deref()
            .ok_or_else(|| ApiError::unavailable("GEMINI_API_KEY is not configured"))
    }

    fn language(&self, query: &LangQuery) -> AppLanguage {
        match query.lang.as_deref() {
            Some(code) => AppLanguage::from_code(Some(code)),
            None => self.language,
        }
    }

    /// Runs `f` against one spinner session. The lock never outlives the closure.
    fn with_spinner<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut SpinnerSession) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut spinners = lock(&self.spinners);
        let session = spinners
            .get_mut(&id, Utc::now())
            .ok_or_else(|| ApiError::not_found(format!("spinner {id} not found")))?;
        f(session)
    }
}

/// A poisoned store is still structurally valid; every mutation goes through checked methods.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
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

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    fn upstream(err: anyhow::Error) -> Self {
        sentry_anyhow::capture_anyhow(&err);
        let diag = err.downcast_ref::<LlmDiagnosticsError>();
        tracing::error!(
            error = %err,
            stage = diag.map(|d| d.stage.as_str()),
            "upstream call failed"
        );
        // A refused prompt will be refused again; retrying the same request is pointless.
        let status = match diag.map(|d| d.stage) {
            Some(FailureStage::Blocked) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, format!("{err:#}"))
    }
}

impl From<SpinnerError> for ApiError {
    fn from(err: SpinnerError) -> Self {
        let status = match err {
            SpinnerError::Busy | SpinnerError::NotSpinning | SpinnerError::DuplicateLabel(_) => {
                StatusCode::CONFLICT
            }
            SpinnerError::EmptyLabel
            | SpinnerError::IndexOutOfRange { .. }
            | SpinnerError::NotEnoughWedges { .. }
            | SpinnerError::Target(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

// ---- spinner ----

#[derive(Debug, Serialize)]
struct SpinnerView {
    id: Uuid,
    #[serde(flatten)]
    session: SpinnerSession,
}

#[derive(Debug, Default, Deserialize)]
struct CreateSpinner {
    #[serde(default)]
    items: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddItem {
    label: String,
}

#[derive(Debug, Deserialize)]
struct Reorder {
    from: usize,
    to: usize,
}

#[derive(Debug, Serialize)]
struct SpinResponse {
    #[serde(flatten)]
    outcome: SpinOutcome,
    spinner: SpinnerView,
}

#[derive(Debug, Serialize)]
struct CompleteResponse {
    selected: String,
    spinner: SpinnerView,
}

async fn create_spinner(
    State(state): State<AppState>,
    body: Option<Json<CreateSpinner>>,
) -> Result<(StatusCode, Json<SpinnerView>), ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let session = SpinnerSession::new(WedgeSet::from_labels(&body.items)?);
    let (id, live) = {
        let mut spinners = lock(&state.spinners);
        let id = spinners.insert(session.clone(), Utc::now());
        (id, spinners.len())
    };
    tracing::info!(%id, items = session.wedges().len(), live, "spinner created");
    Ok((StatusCode::CREATED, Json(SpinnerView { id, session })))
}

async fn get_spinner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SpinnerView>, ApiError> {
    let session = state.with_spinner(id, |s| Ok(s.clone()))?;
    Ok(Json(SpinnerView { id, session }))
}

async fn delete_spinner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    lock(&state.spinners)
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("spinner {id} not found")))?;
    tracing::info!(%id, "spinner deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn add_spinner_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddItem>,
) -> Result<Json<SpinnerView>, ApiError> {
    let session = state.with_spinner(id, |s| {
        s.add_item(&body.label)?;
        Ok(s.clone())
    })?;
    Ok(Json(SpinnerView { id, session }))
}

async fn remove_spinner_item(
    State(state): State<AppState>,
    Path((id, label)): Path<(Uuid, String)>,
) -> Result<Json<SpinnerView>, ApiError> {
    let session = state.with_spinner(id, |s| {
        if !s.remove_item(&label)? {
            return Err(ApiError::not_found(format!("'{label}' is not on the wheel")));
        }
        Ok(s.clone())
    })?;
    Ok(Json(SpinnerView { id, session }))
}

async fn reorder_spinner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Reorder>,
) -> Result<Json<SpinnerView>, ApiError> {
    let session = state.with_spinner(id, |s| {
        s.reorder_items(body.from, body.to)?;
        Ok(s.clone())
    })?;
    Ok(Json(SpinnerView { id, session }))
}

async fn spin_spinner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SpinResponse>, ApiError> {
    let (outcome, session) = state.with_spinner(id, |s| {
        let mut rng = lock(&state.rng);
        let outcome = s.spin(&mut *rng)?;
        Ok((outcome, s.clone()))
    })?;
    Ok(Json(SpinResponse {
        outcome,
        spinner: SpinnerView { id, session },
    }))
}

async fn complete_spinner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let (selected, session) = state.with_spinner(id, |s| {
        let selected = s.complete_spin()?.to_string();
        Ok((selected, s.clone()))
    })?;
    tracing::info!(%id, %selected, "spin completed");
    Ok(Json(CompleteResponse {
        selected,
        spinner: SpinnerView { id, session },
    }))
}

async fn acknowledge_spinner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SpinnerView>, ApiError> {
    let session = state.with_spinner(id, |s| {
        s.acknowledge();
        Ok(s.clone())
    })?;
    Ok(Json(SpinnerView { id, session }))
}

// ---- recipe chat ----

#[derive(Debug, Serialize)]
struct RecipeChatView {
    id: Uuid,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct SendRecipeMessage {
    ingredients: String,
}

#[derive(Debug, Serialize)]
struct RecipeReply {
    reply: ChatMessage,
    chat: RecipeChatView,
}

async fn create_recipe_chat(State(state): State<AppState>) -> (StatusCode, Json<RecipeChatView>) {
    let (id, live) = {
        let mut recipes = lock(&state.recipes);
        let id = recipes.insert(Arc::default(), Utc::now());
        (id, recipes.len())
    };
    tracing::info!(%id, live, "recipe chat created");
    (
        StatusCode::CREATED,
        Json(RecipeChatView {
            id,
            messages: Vec::new(),
        }),
    )
}

async fn delete_recipe_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    lock(&state.recipes)
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("recipe chat {id} not found")))?;
    tracing::info!(%id, "recipe chat deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn send_recipe_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LangQuery>,
    Json(body): Json<SendRecipeMessage>,
) -> Result<Json<RecipeReply>, ApiError> {
    let generator = state.generator()?;
    let chat = lock(&state.recipes)
        .get_mut(&id, Utc::now())
        .map(|chat| Arc::clone(chat))
        .ok_or_else(|| ApiError::not_found(format!("recipe chat {id} not found")))?;

    let mut chat = chat.lock().await;
    let reply = chat
        .send(generator, &body.ingredients, state.language(&query))
        .await
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?
        .clone();

    Ok(Json(RecipeReply {
        reply,
        chat: RecipeChatView {
            id,
            messages: chat.messages().to_vec(),
        },
    }))
}

// ---- recommendations ----

#[derive(Debug, Serialize)]
struct RecommendationsResponse {
    generated_at: DateTime<Utc>,
    items: Vec<RecommendationRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct SingleRecommendation {
    #[serde(default)]
    content_type: ContentType,
}

async fn post_recommendations(
    State(state): State<AppState>,
    Query(query): Query<LangQuery>,
    Json(criteria): Json<MediaCriteria>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let generator = state.generator()?;
    criteria
        .validate()
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let items = lifetools_core::recommend::recommend(generator, &criteria, state.language(&query))
        .await
        .map_err(ApiError::upstream)?;

    Ok(Json(RecommendationsResponse {
        generated_at: Utc::now(),
        items,
    }))
}

async fn post_single_recommendation(
    State(state): State<AppState>,
    Query(query): Query<LangQuery>,
    body: Option<Json<SingleRecommendation>>,
) -> Result<Json<RecommendationRecord>, ApiError> {
    let generator = state.generator()?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    lifetools_core::recommend::recommend_single(generator, body.content_type, state.language(&query))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::BAD_GATEWAY, "no recommendation available"))
}

// ---- truth, tip ----

#[derive(Debug, Serialize)]
struct TruthQuestions {
    questions: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TruthQuestion {
    question: String,
}

async fn get_truth_questions(
    State(state): State<AppState>,
    Query(query): Query<LangQuery>,
) -> Result<Json<TruthQuestions>, ApiError> {
    let generator = state.generator()?;
    let questions = lifetools_core::truth::fetch_questions(generator, state.language(&query))
        .await
        .map_err(ApiError::upstream)?;
    Ok(Json(TruthQuestions { questions }))
}

async fn get_truth_question(
    State(state): State<AppState>,
    Query(query): Query<LangQuery>,
) -> Result<Json<TruthQuestion>, ApiError> {
    let generator = state.generator()?;
    lifetools_core::truth::fetch_single_question(generator, state.language(&query))
        .await
        .map(|question| Json(TruthQuestion { question }))
        .ok_or_else(|| ApiError::new(StatusCode::BAD_GATEWAY, "no question available"))
}

#[derive(Debug, Deserialize)]
struct TipQuery {
    lang: Option<String>,
    /// Local hour (0-23); defaults to the server clock.
    hour: Option<u32>,
}

#[derive(Debug, Serialize)]
struct TipResponse {
    day_part: DayPart,
    tip: String,
    generated_at: DateTime<Utc>,
}

async fn get_tip(
    State(state): State<AppState>,
    Query(query): Query<TipQuery>,
) -> Result<Json<TipResponse>, ApiError> {
    let generator = state.generator()?;
    let day_part = query.hour.map(DayPart::from_hour).unwrap_or_else(DayPart::now);
    let language = state.language(&LangQuery { lang: query.lang });
    let tip = lifetools_core::tip::fetch_tip(generator, day_part, language).await;
    Ok(Json(TipResponse {
        day_part,
        tip,
        generated_at: Utc::now(),
    }))
}

// ---- update ----

async fn get_update(State(state): State<AppState>) -> Result<Json<UpdateStatus>, ApiError> {
    let Some(releases) = &state.releases else {
        return Err(ApiError::unavailable("update checks are disabled"));
    };
    lifetools_core::update::check_for_update(releases.as_ref(), &state.current_version)
        .await
        .map(Json)
        .map_err(ApiError::upstream)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &lifetools_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
