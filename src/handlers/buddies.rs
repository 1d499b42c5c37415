use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::buddy::{BuddyRequest, BuddyRequestStatus, CreateBuddyRequest};
use crate::AppState;

pub async fn create_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateBuddyRequest>,
) -> AppResult<Json<BuddyRequest>> {
    body.validate()?;

    if body.dive_date < Utc::now().date_naive() {
        return Err(AppError::invalid(
            "dive_date",
            "Planned dive date cannot be in the past",
        ));
    }

    if let Some(site_id) = body.site_id {
        let known = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM dive_sites WHERE id = $1")
            .bind(site_id)
            .fetch_one(&state.db)
            .await?;
        if known == 0 {
            return Err(AppError::invalid("site_id", "Unknown dive site"));
        }
    }

    let request = sqlx::query_as::<_, BuddyRequest>(
        r#"
        INSERT INTO buddy_requests (id, requester_id, site_id, dive_date, message)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.site_id)
    .bind(body.dive_date)
    .bind(&body.message)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(request))
}

/// Open requests from other divers, soonest dive first.
pub async fn list_open_requests(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<BuddyRequest>>> {
    let requests = sqlx::query_as::<_, BuddyRequest>(
        r#"
        SELECT * FROM buddy_requests
        WHERE status = 'open' AND requester_id != $1 AND dive_date >= $2
        ORDER BY dive_date ASC
        "#,
    )
    .bind(auth_user.id)
    .bind(Utc::now().date_naive())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(requests))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<BuddyRequest>> {
    let request = sqlx::query_as::<_, BuddyRequest>(
        "SELECT * FROM buddy_requests WHERE id = $1",
    )
    .bind(request_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Buddy request not found".into()))?;

    if request.requester_id == auth_user.id {
        return Err(AppError::Conflict("Cannot accept your own request".into()));
    }
    if request.status != BuddyRequestStatus::Open {
        return Err(AppError::Conflict("Request is no longer open".into()));
    }

    // Guard against a concurrent accept: the status check is repeated in SQL
    let updated = sqlx::query_as::<_, BuddyRequest>(
        r#"
        UPDATE buddy_requests
        SET status = 'accepted', accepted_by = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'open'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Conflict("Request is no longer open".into()))?;

    Ok(Json(updated))
}

pub async fn cancel_request(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<BuddyRequest>> {
    let updated = sqlx::query_as::<_, BuddyRequest>(
        r#"
        UPDATE buddy_requests
        SET status = 'cancelled', updated_at = NOW()
        WHERE id = $1 AND requester_id = $2 AND status != 'cancelled'
        RETURNING *
        "#,
    )
    .bind(request_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Buddy request not found".into()))?;

    Ok(Json(updated))
}
