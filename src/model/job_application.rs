use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApplicationStatus {
    Received,
    Reviewing,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    /// Accepted and rejected applications are final.
    pub fn can_move_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match (self, next) {
            (Accepted | Rejected, _) => false,
            (Received, Reviewing | Accepted | Rejected) => true,
            (Reviewing, Accepted | Rejected) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct JobApplication {
    pub id: u64,
    pub full_name: String,
    pub rut: String,

    #[schema(nullable = true)]
    pub phone: Option<String>,

    #[schema(nullable = true)]
    pub email: Option<String>,

    #[schema(example = "carpintero")]
    pub trade: String,

    pub years_experience: i32,

    #[schema(example = "received")]
    pub status: String,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::ApplicationStatus::*;

    #[test]
    fn final_states_do_not_move() {
        assert!(Received.can_move_to(Reviewing));
        assert!(Reviewing.can_move_to(Accepted));
        assert!(!Accepted.can_move_to(Rejected));
        assert!(!Rejected.can_move_to(Reviewing));
        assert!(!Reviewing.can_move_to(Received));
    }
}
