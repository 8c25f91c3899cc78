use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Soft-delete state shared by every level of the project hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Lifecycle {
    Active,
    Archived,
}

impl Lifecycle {
    pub fn is_active(self) -> bool {
        self == Lifecycle::Active
    }
}

/// Whether a payable row (attendance day, task assignment) has been consumed
/// by a processed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Paid,
}

impl From<bool> for PaymentState {
    fn from(is_paid: bool) -> Self {
        if is_paid { PaymentState::Paid } else { PaymentState::Pending }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_round_trips_column_text() {
        assert_eq!("archived".parse::<Lifecycle>().unwrap(), Lifecycle::Archived);
        assert_eq!(Lifecycle::Active.to_string(), "active");
        assert!("deleted".parse::<Lifecycle>().is_err());
    }

    #[test]
    fn payment_state_from_flag() {
        assert_eq!(PaymentState::from(true), PaymentState::Paid);
        assert_eq!(PaymentState::from(false), PaymentState::Pending);
    }
}
