use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::site::{CreateSiteRequest, DiveSite, SiteDetail, SiteQuery};
use crate::AppState;

pub async fn list_sites(
    State(state): State<AppState>,
    Query(query): Query<SiteQuery>,
) -> AppResult<Json<Vec<DiveSite>>> {
    let sites = sqlx::query_as::<_, DiveSite>(
        r#"
        SELECT * FROM dive_sites
        WHERE ($1::text IS NULL OR region = $1)
          AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
        ORDER BY name ASC
        "#,
    )
    .bind(query.region)
    .bind(query.q)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(sites))
}

pub async fn get_site(
    State(state): State<AppState>,
    Path(site_id): Path<Uuid>,
) -> AppResult<Json<SiteDetail>> {
    let site = sqlx::query_as::<_, DiveSite>("SELECT * FROM dive_sites WHERE id = $1")
        .bind(site_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound("Dive site not found".into()))?;

    let public_dive_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM dives WHERE site_id = $1 AND is_public = true",
    )
    .bind(site_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(SiteDetail {
        site,
        public_dive_count,
    }))
}

pub async fn create_site(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateSiteRequest>,
) -> AppResult<Json<DiveSite>> {
    body.validate()?;
    body.validate_coords()?;

    let site = sqlx::query_as::<_, DiveSite>(
        r#"
        INSERT INTO dive_sites (id, name, region, lat, lon, max_depth_m, description, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&body.name)
    .bind(&body.region)
    .bind(body.lat)
    .bind(body.lon)
    .bind(body.max_depth_m)
    .bind(&body.description)
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(site))
}
