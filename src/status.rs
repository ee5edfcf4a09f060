//! Status labels written onto MySQLCluster resources
//!
//! The status is the main surface through which users see the outcome of a
//! reconciliation. An unset state means the cluster was never updated.

use crate::crd::ClusterStatus;
use chrono::Utc;

pub const STATE_SUCCESSFUL_UPDATE: &str = "Successful update";
pub const STATE_FAILED_UPDATE: &str = "Failed update";

pub const MESSAGE_SERVICE_UPDATE_FAILURE: &str =
    "The provided patch resulted in a Service update failure";
pub const MESSAGE_STATEFUL_SET_UPDATE_FAILURE: &str =
    "The provided patch resulted in a StatefulSet update failure";

/// Build a status with the current timestamp.
pub fn build_status(state: &str, message: &str) -> ClusterStatus {
    ClusterStatus {
        state: state.to_string(),
        message: message.to_string(),
        last_update_time: Some(Utc::now().to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_status() {
        let status = build_status(STATE_FAILED_UPDATE, MESSAGE_SERVICE_UPDATE_FAILURE);
        assert_eq!(status.state, "Failed update");
        assert!(status.message.ends_with("Service update failure"));
        assert!(status.last_update_time.is_some());
    }

    #[test]
    fn test_success_status_has_empty_message() {
        let status = build_status(STATE_SUCCESSFUL_UPDATE, "");
        assert_eq!(status.state, "Successful update");
        assert!(status.message.is_empty());
    }
}
