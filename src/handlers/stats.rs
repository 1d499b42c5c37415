use axum::{extract::State, Extension, Json};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::dive::DiveStats;
use crate::AppState;

#[derive(Debug, FromRow)]
struct TotalsRow {
    total_dives: i64,
    total_duration_min: i64,
    max_depth_m: f64,
    avg_depth_m: f64,
    avg_duration_min: f64,
}

/// Aggregate totals over the authenticated user's dives. Zero dives yields
/// the zero-valued record, not an error.
pub async fn get_dive_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<DiveStats>> {
    let totals = sqlx::query_as::<_, TotalsRow>(
        r#"
        SELECT
            COUNT(*) AS total_dives,
            COALESCE(SUM(duration_min), 0)::bigint AS total_duration_min,
            COALESCE(MAX(max_depth_m), 0)::double precision AS max_depth_m,
            COALESCE(AVG(max_depth_m), 0)::double precision AS avg_depth_m,
            COALESCE(AVG(duration_min), 0)::double precision AS avg_duration_min
        FROM dives
        WHERE user_id = $1
        "#,
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    let sites = sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT site_id FROM dives WHERE user_id = $1 AND site_id IS NOT NULL",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let buddies = sqlx::query_scalar::<_, Uuid>(
        "SELECT DISTINCT buddy_id FROM dives WHERE user_id = $1 AND buddy_id IS NOT NULL",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DiveStats {
        total_dives: totals.total_dives,
        total_duration_min: totals.total_duration_min,
        max_depth_m: totals.max_depth_m,
        avg_depth_m: totals.avg_depth_m,
        avg_duration_min: totals.avg_duration_min,
        sites,
        buddies,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_dive_stats_shape() {
        let stats = DiveStats::default();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_dives"], 0);
        assert_eq!(json["total_duration_min"], 0);
        assert_eq!(json["max_depth_m"], 0.0);
        assert!(json["sites"].as_array().unwrap().is_empty());
        assert!(json["buddies"].as_array().unwrap().is_empty());
    }
}
