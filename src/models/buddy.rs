use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BuddyRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub site_id: Option<Uuid>,
    pub dive_date: NaiveDate,
    pub message: Option<String>,
    pub status: BuddyRequestStatus,
    pub accepted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "buddy_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BuddyRequestStatus {
    Open,
    Accepted,
    Cancelled,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBuddyRequest {
    pub site_id: Option<Uuid>,
    pub dive_date: NaiveDate,

    #[validate(length(max = 500, message = "Message must be under 500 characters"))]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&BuddyRequestStatus::Open).unwrap(),
            r#""open""#
        );
        let back: BuddyRequestStatus = serde_json::from_str(r#""cancelled""#).unwrap();
        assert_eq!(back, BuddyRequestStatus::Cancelled);
    }

    #[test]
    fn test_create_request_message_cap() {
        let req = CreateBuddyRequest {
            site_id: None,
            dive_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            message: Some("m".repeat(501)),
        };
        assert!(req.validate().is_err());
    }
}
