//! Chapter access and unlock handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use inkpass_core::{ChapterId, UnlockOutcome, UserId};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::parse_chapter_id;
use crate::state::AppState;

/// Chapter access response.
#[derive(Debug, Serialize)]
pub struct ChapterAccessResponse {
    /// Chapter ID.
    pub chapter_id: String,
    /// Whether the user may read the chapter.
    pub unlocked: bool,
}

/// Unlock response.
#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    /// Chapter ID.
    pub chapter_id: String,
    /// Always true; a refused unlock is a 402.
    pub unlocked: bool,
    /// The chapter had been bought before and nothing was charged.
    pub already_unlocked: bool,
    /// Balance after the unlock.
    pub coin_balance: i64,
}

/// Whether the caller may read a chapter.
pub async fn chapter_access(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(chapter_id): Path<String>,
) -> Result<Json<ChapterAccessResponse>, ApiError> {
    let chapter_id = parse_chapter_id(chapter_id)?;
    access_for(&state, &auth.user_id, &chapter_id).map(Json)
}

/// Buy a chapter at the configured price.
pub async fn unlock_chapter(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(chapter_id): Path<String>,
) -> Result<Json<UnlockResponse>, ApiError> {
    let chapter_id = parse_chapter_id(chapter_id)?;
    let cost = state.config.chapter_unlock_cost;
    unlock_for(&state, &auth.user_id, &chapter_id, cost).map(Json)
}

pub(crate) fn access_for(
    state: &AppState,
    user_id: &UserId,
    chapter_id: &ChapterId,
) -> Result<ChapterAccessResponse, ApiError> {
    let unlocked = state.ledger.is_chapter_unlocked(user_id, chapter_id)?;
    Ok(ChapterAccessResponse {
        chapter_id: chapter_id.to_string(),
        unlocked,
    })
}

pub(crate) fn unlock_for(
    state: &AppState,
    user_id: &UserId,
    chapter_id: &ChapterId,
    cost: i64,
) -> Result<UnlockResponse, ApiError> {
    let spend = state.ledger.unlock_chapter(user_id, chapter_id, cost)?;
    let already_unlocked = match spend.outcome {
        UnlockOutcome::Unlocked => false,
        UnlockOutcome::AlreadyUnlocked => true,
        UnlockOutcome::InsufficientCoins { balance, required } => {
            return Err(ApiError::InsufficientCoins { balance, required });
        }
    };

    Ok(UnlockResponse {
        chapter_id: chapter_id.to_string(),
        unlocked: true,
        already_unlocked,
        coin_balance: spend.coin_balance,
    })
}
