use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use sqlx::types::Json as Jsonb;
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::dive::{
    BuddyReview, BuddyReviewRequest, Dive, DiveQuery, SaveDiveRequest,
};
use crate::AppState;

/// Recompute the owner's denormalized dive count from the source rows.
///
/// Called after the primary write has committed; a failure here is surfaced
/// to the log only and never undoes the save.
pub async fn refresh_dive_count(db: &sqlx::PgPool, user_id: Uuid) -> AppResult<()> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM dives WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    sqlx::query("UPDATE users SET dive_count = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(count)
        .execute(db)
        .await?;

    Ok(())
}

async fn refresh_dive_count_best_effort(db: &sqlx::PgPool, user_id: Uuid) {
    if let Err(err) = refresh_dive_count(db, user_id).await {
        tracing::warn!(
            user_id = %user_id,
            error = %err,
            "Dive count refresh failed; primary write already committed"
        );
    }
}

/// Referential checks against the payload's foreign keys.
async fn check_references(
    db: &sqlx::PgPool,
    auth_user: &AuthUser,
    body: &SaveDiveRequest,
) -> AppResult<()> {
    if let Some(site_id) = body.site_id {
        let known = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM dive_sites WHERE id = $1")
            .bind(site_id)
            .fetch_one(db)
            .await?;
        if known == 0 {
            return Err(AppError::invalid("site_id", "Unknown dive site"));
        }
    }

    if let Some(buddy_id) = body.buddy_id {
        if buddy_id == auth_user.id {
            return Err(AppError::invalid("buddy_id", "Buddy cannot be yourself"));
        }
        let known = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = $1")
            .bind(buddy_id)
            .fetch_one(db)
            .await?;
        if known == 0 {
            return Err(AppError::invalid("buddy_id", "Unknown user"));
        }
    }

    if let Some(request_id) = body.buddy_request_id {
        let row = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            "SELECT requester_id, accepted_by FROM buddy_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(db)
        .await?;

        match row {
            Some((requester, accepted_by))
                if requester == auth_user.id || accepted_by == Some(auth_user.id) => {}
            Some(_) => {
                return Err(AppError::invalid(
                    "buddy_request_id",
                    "Buddy request does not involve you",
                ))
            }
            None => return Err(AppError::invalid("buddy_request_id", "Unknown buddy request")),
        }
    }

    Ok(())
}

pub async fn create_dive(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<SaveDiveRequest>,
) -> AppResult<Json<Dive>> {
    body.validate()?;
    body.validate_semantics(Utc::now().date_naive())?;
    let duration_min = body.resolve_duration()?;
    check_references(&state.db, &auth_user, &body).await?;

    let dive_number = sqlx::query_scalar::<_, Option<i32>>(
        "SELECT MAX(dive_number) FROM dives WHERE user_id = $1",
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?
    .unwrap_or(0)
        + 1;

    let dive = sqlx::query_as::<_, Dive>(
        r#"
        INSERT INTO dives (
            id, user_id, buddy_id, buddy_request_id, site_id,
            dive_date, entry_time, exit_time, duration_min,
            max_depth_m, avg_depth_m, water_temp_c,
            visibility, current, dive_type,
            equipment, wildlife, notes, photos, condition_notes,
            safety, rating, dive_number, is_public
        )
        VALUES (
            $1, $2, $3, $4, $5,
            $6, $7, $8, $9,
            $10, $11, $12,
            $13, $14, $15,
            $16, $17, $18, $19, $20,
            $21, $22, $23, $24
        )
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.buddy_id)
    .bind(body.buddy_request_id)
    .bind(body.site_id)
    .bind(body.dive_date)
    .bind(body.entry_time)
    .bind(body.exit_time)
    .bind(duration_min)
    .bind(body.max_depth_m)
    .bind(body.avg_depth_m)
    .bind(body.water_temp_c)
    .bind(&body.visibility)
    .bind(&body.current)
    .bind(&body.dive_type)
    .bind(Jsonb(body.equipment.clone().unwrap_or_default()))
    .bind(Jsonb(body.wildlife.clone().unwrap_or_default()))
    .bind(&body.notes)
    .bind(Jsonb(body.photos.clone().unwrap_or_default()))
    .bind(&body.condition_notes)
    .bind(Jsonb(body.safety.clone().unwrap_or_default()))
    .bind(Jsonb(body.rating.clone()))
    .bind(dive_number)
    .bind(body.is_public.unwrap_or(false))
    .fetch_one(&state.db)
    .await?;

    refresh_dive_count_best_effort(&state.db, auth_user.id).await;

    Ok(Json(dive))
}

pub async fn list_dives(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<DiveQuery>,
) -> AppResult<Json<Vec<Dive>>> {
    let dives = sqlx::query_as::<_, Dive>(
        r#"
        SELECT * FROM dives
        WHERE user_id = $1
          AND ($2::date IS NULL OR dive_date >= $2)
          AND ($3::date IS NULL OR dive_date <= $3)
          AND ($4::uuid IS NULL OR site_id = $4)
        ORDER BY dive_date DESC, dive_number DESC
        "#,
    )
    .bind(auth_user.id)
    .bind(query.start_date)
    .bind(query.end_date)
    .bind(query.site_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(dives))
}

pub async fn get_dive(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(dive_id): Path<Uuid>,
) -> AppResult<Json<Dive>> {
    let dive = sqlx::query_as::<_, Dive>(
        "SELECT * FROM dives WHERE id = $1 AND (user_id = $2 OR buddy_id = $2 OR is_public = true)",
    )
    .bind(dive_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Dive not found".into()))?;

    Ok(Json(dive))
}

pub async fn update_dive(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(dive_id): Path<Uuid>,
    Json(body): Json<SaveDiveRequest>,
) -> AppResult<Json<Dive>> {
    let _existing = sqlx::query_as::<_, Dive>(
        "SELECT * FROM dives WHERE id = $1 AND user_id = $2",
    )
    .bind(dive_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Dive not found".into()))?;

    body.validate()?;
    body.validate_semantics(Utc::now().date_naive())?;
    let duration_min = body.resolve_duration()?;
    check_references(&state.db, &auth_user, &body).await?;

    // Full replace; dive_number, verified and buddy_review are not
    // owner-editable.
    let dive = sqlx::query_as::<_, Dive>(
        r#"
        UPDATE dives SET
            buddy_id = $3,
            buddy_request_id = $4,
            site_id = $5,
            dive_date = $6,
            entry_time = $7,
            exit_time = $8,
            duration_min = $9,
            max_depth_m = $10,
            avg_depth_m = $11,
            water_temp_c = $12,
            visibility = $13,
            current = $14,
            dive_type = $15,
            equipment = $16,
            wildlife = $17,
            notes = $18,
            photos = $19,
            condition_notes = $20,
            safety = $21,
            rating = $22,
            is_public = $23,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(dive_id)
    .bind(auth_user.id)
    .bind(body.buddy_id)
    .bind(body.buddy_request_id)
    .bind(body.site_id)
    .bind(body.dive_date)
    .bind(body.entry_time)
    .bind(body.exit_time)
    .bind(duration_min)
    .bind(body.max_depth_m)
    .bind(body.avg_depth_m)
    .bind(body.water_temp_c)
    .bind(&body.visibility)
    .bind(&body.current)
    .bind(&body.dive_type)
    .bind(Jsonb(body.equipment.clone().unwrap_or_default()))
    .bind(Jsonb(body.wildlife.clone().unwrap_or_default()))
    .bind(&body.notes)
    .bind(Jsonb(body.photos.clone().unwrap_or_default()))
    .bind(&body.condition_notes)
    .bind(Jsonb(body.safety.clone().unwrap_or_default()))
    .bind(Jsonb(body.rating.clone()))
    .bind(body.is_public.unwrap_or(false))
    .fetch_one(&state.db)
    .await?;

    refresh_dive_count_best_effort(&state.db, auth_user.id).await;

    Ok(Json(dive))
}

pub async fn delete_dive(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(dive_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    // Idempotent: deleting an already-gone dive still returns 200
    let result = sqlx::query("DELETE FROM dives WHERE id = $1 AND user_id = $2")
        .bind(dive_id)
        .bind(auth_user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() > 0 {
        refresh_dive_count_best_effort(&state.db, auth_user.id).await;
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Attach a peer review. Only the user the owner named as buddy may review,
/// and a review marks the dive verified.
pub async fn review_dive(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(dive_id): Path<Uuid>,
    Json(body): Json<BuddyReviewRequest>,
) -> AppResult<Json<Dive>> {
    body.validate()?;

    let dive = sqlx::query_as::<_, Dive>("SELECT * FROM dives WHERE id = $1")
        .bind(dive_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("Dive not found".into()))?;

    if dive.buddy_id != Some(auth_user.id) {
        return Err(AppError::Forbidden);
    }

    let review = BuddyReview {
        reviewer_id: auth_user.id,
        rating: body.rating,
        comment: body.comment,
        reviewed_at: Utc::now(),
    };

    let dive = sqlx::query_as::<_, Dive>(
        r#"
        UPDATE dives SET buddy_review = $2, verified = true, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(dive_id)
    .bind(Jsonb(review))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(dive))
}
