//! HTTP endpoint handlers. These are thin wrappers that forward to the stores.
//! Each handler is instrumented and logs its parameters and basic result info.
//!
//! Content mutations require an admin session; profile routes require any session.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{header, HeaderMap, StatusCode},
  response::IntoResponse,
  Json,
};
use serde_json::Value;
use tracing::{info, instrument};

use crate::domain::{Era, Event, EventDraft, EventId, Topic, TopicDraft, TopicId, EraId};
use crate::error::ApiError;
use crate::progress::dashboard;
use crate::protocol::*;
use crate::search::search;
use crate::session::Session;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

fn session_token(headers: &HeaderMap) -> Option<&str> {
  headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).filter(|t| !t.is_empty())
}

async fn require_session(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
  let token = session_token(headers).ok_or(ApiError::Unauthorized)?;
  Ok(state.sessions.session(token).await?)
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
  let session = require_session(state, headers).await?;
  if !session.is_admin() {
    return Err(ApiError::Forbidden);
  }
  Ok(session)
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

//
// Content
//

#[instrument(level = "info", skip(state), fields(lang = %q.lang))]
pub async fn http_get_eras(State(state): State<Arc<AppState>>, Query(q): Query<LangQuery>) -> ApiResult<Json<Vec<Era>>> {
  Ok(Json(state.content(q.lang)?.eras().await))
}

#[instrument(level = "info", skip(state, headers, body), fields(lang = %q.lang, title = %body.title))]
pub async fn http_post_era(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<LangQuery>,
  Json(body): Json<NewEraIn>,
) -> ApiResult<impl IntoResponse> {
  require_admin(&state, &headers).await?;
  let eras = state.content(q.lang)?.add_era(&body.title, &body.description).await?;
  info!(target: "content", lang = %q.lang, era_id = eras.last().map(|e| e.id), "HTTP era added");
  Ok((StatusCode::CREATED, Json(eras)))
}

#[instrument(level = "info", skip(state, headers, era), fields(lang = %q.lang))]
pub async fn http_put_era(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(era_id): Path<EraId>,
  Query(q): Query<LangQuery>,
  Json(mut era): Json<Era>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  era.id = era_id;
  Ok(Json(state.content(q.lang)?.update_era(era).await?))
}

#[instrument(level = "info", skip(state, headers), fields(lang = %q.lang, from = body.from, to = body.to))]
pub async fn http_reorder_eras(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<LangQuery>,
  Json(body): Json<ReorderIn>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  Ok(Json(state.content(q.lang)?.reorder_eras(body.from, body.to).await?))
}

#[instrument(level = "info", skip(state, headers, draft), fields(lang = %q.lang))]
pub async fn http_post_topic(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(era_id): Path<EraId>,
  Query(q): Query<LangQuery>,
  Json(draft): Json<TopicDraft>,
) -> ApiResult<impl IntoResponse> {
  require_admin(&state, &headers).await?;
  let eras = state.content(q.lang)?.add_topic(era_id, draft).await?;
  Ok((StatusCode::CREATED, Json(eras)))
}

#[instrument(level = "info", skip(state, headers), fields(lang = %q.lang))]
pub async fn http_reorder_topics(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(era_id): Path<EraId>,
  Query(q): Query<LangQuery>,
  Json(body): Json<ReorderIn>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  Ok(Json(state.content(q.lang)?.reorder_topics(era_id, body.from, body.to).await?))
}

#[instrument(level = "info", skip(state, headers, topic), fields(lang = %q.lang))]
pub async fn http_put_topic(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(topic_id): Path<TopicId>,
  Query(q): Query<LangQuery>,
  Json(mut topic): Json<Topic>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  topic.id = topic_id;
  Ok(Json(state.content(q.lang)?.update_topic(topic).await?))
}

#[instrument(level = "info", skip(state, headers), fields(lang = %q.lang))]
pub async fn http_delete_topic(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(topic_id): Path<TopicId>,
  Query(q): Query<LangQuery>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  let eras = state.content(q.lang)?.delete_topic(topic_id).await?;
  info!(target: "content", lang = %q.lang, topic_id, "HTTP topic deleted with its events");
  Ok(Json(eras))
}

#[instrument(level = "info", skip(state, headers, draft), fields(lang = %q.lang))]
pub async fn http_post_event(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(topic_id): Path<TopicId>,
  Query(q): Query<LangQuery>,
  Json(draft): Json<EventDraft>,
) -> ApiResult<impl IntoResponse> {
  require_admin(&state, &headers).await?;
  let eras = state.content(q.lang)?.add_event(topic_id, draft).await?;
  Ok((StatusCode::CREATED, Json(eras)))
}

#[instrument(level = "info", skip(state, headers), fields(lang = %q.lang))]
pub async fn http_reorder_events(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path(topic_id): Path<TopicId>,
  Query(q): Query<LangQuery>,
  Json(body): Json<ReorderIn>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  Ok(Json(state.content(q.lang)?.reorder_events(topic_id, body.from, body.to).await?))
}

#[instrument(level = "info", skip(state, headers, event), fields(lang = %q.lang))]
pub async fn http_put_event(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path((topic_id, event_id)): Path<(TopicId, EventId)>,
  Query(q): Query<LangQuery>,
  Json(mut event): Json<Event>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  event.id = event_id;
  Ok(Json(state.content(q.lang)?.update_event(topic_id, event).await?))
}

#[instrument(level = "info", skip(state, headers), fields(lang = %q.lang))]
pub async fn http_delete_event(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Path((topic_id, event_id)): Path<(TopicId, EventId)>,
  Query(q): Query<LangQuery>,
) -> ApiResult<Json<Vec<Era>>> {
  require_admin(&state, &headers).await?;
  Ok(Json(state.content(q.lang)?.delete_event(topic_id, event_id).await?))
}

#[instrument(level = "info", skip(state), fields(lang = %q.lang))]
pub async fn http_get_export(State(state): State<Arc<AppState>>, Query(q): Query<LangQuery>) -> ApiResult<impl IntoResponse> {
  let body = state.content(q.lang)?.export().await?;
  Ok((
    [
      (header::CONTENT_TYPE, "application/json"),
      (header::CONTENT_DISPOSITION, "attachment; filename=\"historyData.json\""),
    ],
    body,
  ))
}

/// Replaces the whole tree. The body is checked for shape first; on failure nothing changes.
#[instrument(level = "info", skip(state, headers, body), fields(lang = %q.lang))]
pub async fn http_post_import(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<LangQuery>,
  Json(body): Json<Value>,
) -> ApiResult<Json<ImportOut>> {
  require_admin(&state, &headers).await?;
  let eras = state.content(q.lang)?.import_data(body).await?;
  info!(target: "content", lang = %q.lang, eras = eras.len(), "HTTP import replaced content");
  Ok(Json(ImportOut {
    eras: eras.len(),
    message: "Data successfully imported. The application will now use the new data set.",
  }))
}

#[instrument(level = "info", skip(state), fields(lang = %q.lang, q_len = q.q.len()))]
pub async fn http_get_search(State(state): State<Arc<AppState>>, Query(q): Query<SearchQuery>) -> ApiResult<impl IntoResponse> {
  let eras = state.content(q.lang)?.eras().await;
  let hits = search(&eras, &q.q);
  info!(target: "content", lang = %q.lang, hits = hits.len(), "HTTP search served");
  Ok(Json(hits))
}

//
// Session / profile
//

#[instrument(level = "info", skip(state), fields(provider = ?body.provider))]
pub async fn http_post_session(State(state): State<Arc<AppState>>, Json(body): Json<LoginIn>) -> ApiResult<impl IntoResponse> {
  let session = state.sessions.login(body.provider).await?;
  Ok((StatusCode::CREATED, Json(SessionOut::from(session))))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_delete_session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<StatusCode> {
  if let Some(token) = session_token(&headers) {
    state.sessions.logout(token).await?;
  }
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_profile(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Json<SessionOut>> {
  let session = require_session(&state, &headers).await?;
  Ok(Json(SessionOut::from(session)))
}

#[instrument(level = "info", skip(state, headers), fields(event_id = body.event_id))]
pub async fn http_post_completed(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<CompletedIn>,
) -> ApiResult<Json<ProfileOut>> {
  let token = session_token(&headers).ok_or(ApiError::Unauthorized)?;
  let profile = state.sessions.mark_event_completed(token, body.event_id).await?;
  Ok(Json(ProfileOut { profile }))
}

#[instrument(level = "info", skip(state, headers), fields(score = body.score))]
pub async fn http_post_quiz_score(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<QuizScoreIn>,
) -> ApiResult<Json<ProfileOut>> {
  let token = session_token(&headers).ok_or(ApiError::Unauthorized)?;
  let profile = state.sessions.update_quiz_score(token, body.score).await?;
  Ok(Json(ProfileOut { profile }))
}

#[instrument(level = "debug", skip(state, headers), fields(topic_id = body.topic_id, event_id = body.event_id))]
pub async fn http_post_last_viewed(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<LastViewedIn>,
) -> ApiResult<Json<ProfileOut>> {
  let token = session_token(&headers).ok_or(ApiError::Unauthorized)?;
  let profile = state.sessions.set_last_viewed_location(token, body.topic_id, body.event_id).await?;
  Ok(Json(ProfileOut { profile }))
}

#[instrument(level = "info", skip(state, headers), fields(lang = %q.lang))]
pub async fn http_get_dashboard(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<LangQuery>,
) -> ApiResult<impl IntoResponse> {
  let session = require_session(&state, &headers).await?;
  let profile = session.profile.ok_or_else(|| ApiError::NotFound("this session keeps no progress".into()))?;
  let eras = state.content(q.lang)?.eras().await;
  Ok(Json(dashboard(&eras, &profile)))
}

//
// Quiz / leaderboard
//

#[instrument(level = "info", skip(state), fields(lang = %q.lang))]
pub async fn http_get_quiz(State(state): State<Arc<AppState>>, Query(q): Query<LangQuery>) -> impl IntoResponse {
  Json(state.quiz.questions(q.lang))
}

/// Scores the answers; signed-in provider accounts also get their quiz stats updated.
#[instrument(level = "info", skip(state, headers, body), fields(lang = %q.lang, answers = body.answers.len()))]
pub async fn http_post_quiz_submit(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Query(q): Query<LangQuery>,
  Json(body): Json<QuizSubmitIn>,
) -> ApiResult<Json<QuizSubmitOut>> {
  let result = state.quiz.score(q.lang, &body.answers);
  let profile = match session_token(&headers) {
    Some(token) => state.sessions.update_quiz_score(token, result.score).await?,
    None => None,
  };
  info!(target: "profile", lang = %q.lang, score = result.score, total = result.total, "HTTP quiz scored");
  Ok(Json(QuizSubmitOut { result, profile }))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_get_leaderboard(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
  let session = match session_token(&headers) {
    Some(_) => Some(require_session(&state, &headers).await?),
    None => None,
  };
  let me = session.as_ref().and_then(|s| s.profile.as_ref().map(|p| (&s.user, p)));
  Ok(Json(state.quiz.leaderboard(me)))
}
