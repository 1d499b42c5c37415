use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

pub const MIN_DURATION_MIN: i32 = 5;
pub const MAX_DURATION_MIN: i32 = 300;
pub const MAX_REVIEW_COMMENT_LEN: usize = 300;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dive {
    pub id: Uuid,
    pub user_id: Uuid,
    pub buddy_id: Option<Uuid>,
    pub buddy_request_id: Option<Uuid>,
    pub site_id: Option<Uuid>,

    pub dive_date: NaiveDate,
    pub entry_time: Option<NaiveTime>,
    pub exit_time: Option<NaiveTime>,
    /// Derived from entry/exit on every save; never trusted from the client.
    pub duration_min: i32,

    pub max_depth_m: f64,
    pub avg_depth_m: Option<f64>,
    pub water_temp_c: Option<f64>,

    pub visibility: Visibility,
    pub current: Option<CurrentStrength>,
    pub dive_type: DiveType,

    pub equipment: Json<Equipment>,
    pub wildlife: Json<Vec<WildlifeSighting>>,
    pub notes: Option<String>,
    pub photos: Json<Vec<String>>,
    pub condition_notes: Option<String>,
    pub safety: Json<SafetyInfo>,
    pub rating: Json<DiveRating>,
    pub buddy_review: Option<Json<BuddyReview>>,

    pub verified: bool,
    pub dive_number: i32,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "visibility_rating", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "current_strength", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CurrentStrength {
    None,
    Mild,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "dive_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiveType {
    Reef,
    Wreck,
    Cave,
    Night,
    Drift,
    Deep,
    Shore,
    Boat,
    Training,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum GasType {
    Air,
    Nitrox,
    Trimix,
}

impl Default for GasType {
    fn default() -> Self {
        Self::Air
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum WetsuitClass {
    None,
    Shorty,
    #[serde(rename = "3mm")]
    Mm3,
    #[serde(rename = "5mm")]
    Mm5,
    #[serde(rename = "7mm")]
    Mm7,
    Drysuit,
}

impl Default for WetsuitClass {
    fn default() -> Self {
        Self::None
    }
}

/// Gas and equipment subrecord, stored as JSONB.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Equipment {
    pub start_pressure_bar: Option<i32>,
    pub end_pressure_bar: Option<i32>,
    #[serde(default)]
    pub gas: GasType,
    #[serde(default)]
    pub wetsuit: WetsuitClass,
    #[serde(default)]
    pub weight_kg: f64,
    #[serde(default)]
    pub computer: bool,
    #[serde(default)]
    pub camera: bool,
    #[serde(default)]
    pub additional_gear: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WildlifeSighting {
    pub species: String,
    pub count: i32,
}

/// Safety subrecord, stored as JSONB. `safety_stop` defaults on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyInfo {
    #[serde(default)]
    pub incident: bool,
    pub incident_details: Option<String>,
    #[serde(default)]
    pub deco_stop: bool,
    #[serde(default = "default_true")]
    pub safety_stop: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SafetyInfo {
    fn default() -> Self {
        Self {
            incident: false,
            incident_details: None,
            deco_stop: false,
            safety_stop: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiveRating {
    pub overall: i16,
    pub visibility: Option<i16>,
    pub marine_life: Option<i16>,
    pub difficulty: Option<i16>,
}

/// Peer review attached by the dive buddy, not the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuddyReview {
    pub reviewer_id: Uuid,
    pub rating: Option<i16>,
    pub comment: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveDiveRequest {
    pub site_id: Option<Uuid>,
    pub buddy_id: Option<Uuid>,
    pub buddy_request_id: Option<Uuid>,

    pub dive_date: NaiveDate,
    pub entry_time: Option<NaiveTime>,
    pub exit_time: Option<NaiveTime>,
    /// Used only when no entry/exit pair is present; overwritten otherwise.
    pub duration_min: Option<i32>,

    #[validate(range(min = 1.0, max = 60.0, message = "Max depth must be 1-60 m"))]
    pub max_depth_m: f64,

    #[validate(range(min = 1.0, message = "Average depth must be at least 1 m"))]
    pub avg_depth_m: Option<f64>,

    // Range includes sub-zero water; checked in validate_semantics because
    // the derive macro cannot express a negative bound.
    pub water_temp_c: Option<f64>,

    pub visibility: Visibility,
    pub current: Option<CurrentStrength>,
    pub dive_type: DiveType,

    pub equipment: Option<Equipment>,
    pub wildlife: Option<Vec<WildlifeSighting>>,

    #[validate(length(max = 1000, message = "Notes must be under 1000 characters"))]
    pub notes: Option<String>,

    pub photos: Option<Vec<String>>,
    pub condition_notes: Option<String>,
    pub safety: Option<SafetyInfo>,
    pub rating: DiveRating,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DiveQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub site_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BuddyReviewRequest {
    pub rating: Option<i16>,
    pub comment: Option<String>,
}

/// Aggregate totals over one user's logged dives.
///
/// A user with no dives gets the zero value, never an error.
#[derive(Debug, Serialize, Default)]
pub struct DiveStats {
    pub total_dives: i64,
    pub total_duration_min: i64,
    pub max_depth_m: f64,
    pub avg_depth_m: f64,
    pub avg_duration_min: f64,
    pub sites: Vec<Uuid>,
    pub buddies: Vec<Uuid>,
}

/// Minutes between entry and exit, rolling over midnight when the exit
/// time-of-day is numerically earlier than the entry.
pub fn compute_duration_min(entry: NaiveTime, exit: NaiveTime) -> i32 {
    let raw = (exit - entry).num_minutes();
    if raw < 0 {
        (raw + 24 * 60) as i32
    } else {
        raw as i32
    }
}

fn check_rating(field: &str, value: i16) -> AppResult<()> {
    if !(1..=5).contains(&value) {
        return Err(AppError::invalid(field, "Rating must be between 1 and 5"));
    }
    Ok(())
}

impl SaveDiveRequest {
    /// Derive the duration. An entry/exit pair always wins over the
    /// client-supplied value; the result is range-checked either way.
    pub fn resolve_duration(&self) -> AppResult<i32> {
        let duration = match (self.entry_time, self.exit_time) {
            (Some(entry), Some(exit)) => compute_duration_min(entry, exit),
            _ => self
                .duration_min
                .ok_or_else(|| AppError::invalid("duration_min", "Duration is required when entry/exit times are not both given"))?,
        };

        if !(MIN_DURATION_MIN..=MAX_DURATION_MIN).contains(&duration) {
            return Err(AppError::invalid(
                "duration_min",
                format!(
                    "Duration must be {}-{} minutes",
                    MIN_DURATION_MIN, MAX_DURATION_MIN
                ),
            ));
        }
        Ok(duration)
    }

    /// Cross-field and subrecord checks the derive macro can't express.
    pub fn validate_semantics(&self, today: NaiveDate) -> AppResult<()> {
        if self.dive_date > today {
            return Err(AppError::invalid("dive_date", "Dive date cannot be in the future"));
        }

        if let Some(temp) = self.water_temp_c {
            if !(-2.0..=40.0).contains(&temp) {
                return Err(AppError::invalid(
                    "water_temp_c",
                    "Water temperature must be -2-40 °C",
                ));
            }
        }

        check_rating("rating.overall", self.rating.overall)?;
        if let Some(v) = self.rating.visibility {
            check_rating("rating.visibility", v)?;
        }
        if let Some(v) = self.rating.marine_life {
            check_rating("rating.marine_life", v)?;
        }
        if let Some(v) = self.rating.difficulty {
            check_rating("rating.difficulty", v)?;
        }

        if let Some(equipment) = &self.equipment {
            if !(0.0..=30.0).contains(&equipment.weight_kg) {
                return Err(AppError::invalid(
                    "equipment.weight_kg",
                    "Weight must be 0-30 kg",
                ));
            }
            if let (Some(start), Some(end)) =
                (equipment.start_pressure_bar, equipment.end_pressure_bar)
            {
                if end > start {
                    return Err(AppError::invalid(
                        "equipment.end_pressure_bar",
                        "End pressure cannot exceed start pressure",
                    ));
                }
            }
        }

        if let Some(wildlife) = &self.wildlife {
            for sighting in wildlife {
                if sighting.species.trim().is_empty() {
                    return Err(AppError::invalid("wildlife.species", "Species is required"));
                }
                if sighting.count < 1 {
                    return Err(AppError::invalid(
                        "wildlife.count",
                        "Sighting count must be at least 1",
                    ));
                }
            }
        }

        Ok(())
    }
}

impl BuddyReviewRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(rating) = self.rating {
            check_rating("rating", rating)?;
        }
        if let Some(comment) = &self.comment {
            if comment.chars().count() > MAX_REVIEW_COMMENT_LEN {
                return Err(AppError::invalid(
                    "comment",
                    format!("Comment must be under {} characters", MAX_REVIEW_COMMENT_LEN),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn base_request() -> SaveDiveRequest {
        SaveDiveRequest {
            site_id: None,
            buddy_id: None,
            buddy_request_id: None,
            dive_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            entry_time: Some(t(9, 0)),
            exit_time: Some(t(9, 45)),
            duration_min: None,
            max_depth_m: 18.0,
            avg_depth_m: Some(12.0),
            water_temp_c: Some(24.0),
            visibility: Visibility::Good,
            current: Some(CurrentStrength::Mild),
            dive_type: DiveType::Reef,
            equipment: None,
            wildlife: None,
            notes: None,
            photos: None,
            condition_notes: None,
            safety: None,
            rating: DiveRating {
                overall: 4,
                visibility: None,
                marine_life: None,
                difficulty: None,
            },
            is_public: None,
        }
    }

    // ── duration derivation ──────────────────────────────────────────────

    #[test]
    fn test_duration_same_day() {
        assert_eq!(compute_duration_min(t(9, 0), t(9, 45)), 45);
    }

    #[test]
    fn test_duration_crosses_midnight() {
        assert_eq!(compute_duration_min(t(23, 30), t(0, 15)), 45);
    }

    #[test]
    fn test_duration_exact_hour() {
        assert_eq!(compute_duration_min(t(10, 0), t(11, 0)), 60);
    }

    #[test]
    fn test_entry_exit_overrides_client_duration() {
        let mut req = base_request();
        req.duration_min = Some(200);
        assert_eq!(req.resolve_duration().unwrap(), 45);
    }

    #[test]
    fn test_client_duration_used_without_times() {
        let mut req = base_request();
        req.entry_time = None;
        req.exit_time = None;
        req.duration_min = Some(52);
        assert_eq!(req.resolve_duration().unwrap(), 52);
    }

    #[test]
    fn test_duration_out_of_range_rejected() {
        let mut req = base_request();
        req.entry_time = None;
        req.exit_time = None;
        req.duration_min = Some(301);
        assert!(req.resolve_duration().is_err());

        req.duration_min = Some(4);
        assert!(req.resolve_duration().is_err());

        req.duration_min = Some(300);
        assert_eq!(req.resolve_duration().unwrap(), 300);
    }

    #[test]
    fn test_missing_duration_and_times_rejected() {
        let mut req = base_request();
        req.entry_time = None;
        req.exit_time = None;
        req.duration_min = None;
        assert!(req.resolve_duration().is_err());
    }

    // ── range validation ─────────────────────────────────────────────────

    #[test]
    fn test_max_depth_bounds() {
        let mut req = base_request();
        req.max_depth_m = 61.0;
        assert!(req.validate().is_err());

        req.max_depth_m = 60.0;
        assert!(req.validate().is_ok());

        req.max_depth_m = 0.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_water_temp_bounds() {
        let mut req = base_request();
        let today = req.dive_date;

        req.water_temp_c = Some(41.0);
        assert!(req.validate_semantics(today).is_err());

        req.water_temp_c = Some(-3.0);
        assert!(req.validate_semantics(today).is_err());

        req.water_temp_c = Some(-2.0);
        assert!(req.validate_semantics(today).is_ok());
    }

    #[test]
    fn test_notes_length_cap() {
        let mut req = base_request();
        req.notes = Some("x".repeat(1001));
        assert!(req.validate().is_err());

        req.notes = Some("x".repeat(1000));
        assert!(req.validate().is_ok());
    }

    // ── semantic validation ──────────────────────────────────────────────

    #[test]
    fn test_future_date_rejected() {
        let req = base_request();
        let day_before = req.dive_date.pred_opt().unwrap();
        assert!(req.validate_semantics(day_before).is_err());
        assert!(req.validate_semantics(req.dive_date).is_ok());
    }

    #[test]
    fn test_overall_rating_bounds() {
        let mut req = base_request();
        let today = req.dive_date;

        req.rating.overall = 0;
        assert!(req.validate_semantics(today).is_err());

        req.rating.overall = 6;
        assert!(req.validate_semantics(today).is_err());

        req.rating.overall = 5;
        assert!(req.validate_semantics(today).is_ok());
    }

    #[test]
    fn test_weight_bounds() {
        let mut req = base_request();
        let today = req.dive_date;
        req.equipment = Some(Equipment {
            weight_kg: 31.0,
            ..Equipment::default()
        });
        assert!(req.validate_semantics(today).is_err());

        req.equipment = Some(Equipment {
            weight_kg: 30.0,
            ..Equipment::default()
        });
        assert!(req.validate_semantics(today).is_ok());
    }

    #[test]
    fn test_wildlife_count_must_be_positive() {
        let mut req = base_request();
        let today = req.dive_date;
        req.wildlife = Some(vec![WildlifeSighting {
            species: "green turtle".into(),
            count: 0,
        }]);
        assert!(req.validate_semantics(today).is_err());
    }

    // ── buddy review ─────────────────────────────────────────────────────

    #[test]
    fn test_review_comment_cap() {
        let req = BuddyReviewRequest {
            rating: Some(5),
            comment: Some("y".repeat(301)),
        };
        assert!(req.validate().is_err());

        let req = BuddyReviewRequest {
            rating: Some(5),
            comment: Some("y".repeat(300)),
        };
        assert!(req.validate().is_ok());
    }

    // ── serde shapes ─────────────────────────────────────────────────────

    #[test]
    fn test_safety_stop_defaults_on() {
        let safety: SafetyInfo = serde_json::from_str("{}").unwrap();
        assert!(safety.safety_stop);
        assert!(!safety.incident);
        assert!(!safety.deco_stop);
    }

    #[test]
    fn test_wetsuit_class_wire_names() {
        let json = serde_json::to_string(&WetsuitClass::Mm5).unwrap();
        assert_eq!(json, r#""5mm""#);
        let back: WetsuitClass = serde_json::from_str(r#""drysuit""#).unwrap();
        assert_eq!(back, WetsuitClass::Drysuit);
    }

    #[test]
    fn test_dive_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&DiveType::Wreck).unwrap(),
            r#""wreck""#
        );
        let back: DiveType = serde_json::from_str(r#""night""#).unwrap();
        assert_eq!(back, DiveType::Night);
    }
}
