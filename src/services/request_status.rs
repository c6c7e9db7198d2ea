//! Request status state machine.
//!
//! ```text
//! NEW --accept--> ACCEPTED --complete--> COMPLETED
//! NEW --cancel--> CANCELLED
//! ACCEPTED --cancel--> CANCELLED
//! ```

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::entities::request::RequestStatus;

/// Staff action on the live board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestAction {
    Accept,
    Complete,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a request that is {from}")]
pub struct InvalidTransition {
    pub from: RequestStatus,
    pub action: RequestAction,
}

/// Status reached by applying `action` to a request in `status`.
pub fn transition(
    status: RequestStatus,
    action: RequestAction,
) -> Result<RequestStatus, InvalidTransition> {
    use RequestAction::*;
    use RequestStatus::*;

    match (status, action) {
        (New, Accept) => Ok(Accepted),
        (Accepted, Complete) => Ok(Completed),
        (New | Accepted, Cancel) => Ok(Cancelled),
        (from, action) => Err(InvalidTransition { from, action }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RequestStatus::New, RequestAction::Accept, RequestStatus::Accepted)]
    #[case(RequestStatus::Accepted, RequestAction::Complete, RequestStatus::Completed)]
    #[case(RequestStatus::New, RequestAction::Cancel, RequestStatus::Cancelled)]
    #[case(RequestStatus::Accepted, RequestAction::Cancel, RequestStatus::Cancelled)]
    fn allowed_transitions(
        #[case] from: RequestStatus,
        #[case] action: RequestAction,
        #[case] to: RequestStatus,
    ) {
        assert_eq!(transition(from, action), Ok(to));
    }

    #[rstest]
    #[case(RequestStatus::Accepted, RequestAction::Accept)]
    #[case(RequestStatus::New, RequestAction::Complete)]
    #[case(RequestStatus::Completed, RequestAction::Cancel)]
    #[case(RequestStatus::Completed, RequestAction::Complete)]
    #[case(RequestStatus::Cancelled, RequestAction::Accept)]
    #[case(RequestStatus::Cancelled, RequestAction::Cancel)]
    fn rejected_transitions(#[case] from: RequestStatus, #[case] action: RequestAction) {
        assert_eq!(
            transition(from, action),
            Err(InvalidTransition { from, action })
        );
    }

    #[test]
    fn terminal_states_are_closed() {
        assert!(!RequestStatus::Completed.is_open());
        assert!(!RequestStatus::Cancelled.is_open());
        assert!(RequestStatus::New.is_open());
        assert!(RequestStatus::Accepted.is_open());
    }

    #[test]
    fn actions_parse_from_form_values() {
        assert_eq!("accept".parse::<RequestAction>().unwrap(), RequestAction::Accept);
        assert!("archive".parse::<RequestAction>().is_err());
        assert_eq!(
            InvalidTransition {
                from: RequestStatus::Completed,
                action: RequestAction::Cancel
            }
            .to_string(),
            "cannot cancel a request that is COMPLETED"
        );
    }
}
