//! Error types for the MySQL Kubernetes Operator

use std::fmt;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors that can occur during operator operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorError {
    /// Object already exists on the platform
    AlreadyExists(String),
    /// Object does not exist on the platform
    NotFound(String),
    /// Update rejected because the object changed since it was read
    VersionConflict(String),
    /// Template could not be rendered into an object
    Render(String),
    /// Kubernetes API error
    KubeApi(String),
    /// Platform call exceeded its deadline
    Timeout(String),
    /// Configuration error
    Configuration(String),
    /// Serialization error
    Serialization(String),
    /// A primary failure followed by failed cleanup or status writes, in order
    Composite(Vec<OperatorError>),
}

impl OperatorError {
    /// Combine a primary failure with the outcomes of the actions it triggered.
    ///
    /// Successful follow-ups are dropped. Nested composites are flattened so the
    /// result always lists every root cause once, primary first. When no
    /// follow-up failed the primary error is returned as-is.
    pub fn aggregate<I>(primary: OperatorError, followups: I) -> OperatorError
    where
        I: IntoIterator<Item = Result<()>>,
    {
        let mut causes = primary.into_causes();
        for outcome in followups {
            if let Err(err) = outcome {
                causes.extend(err.into_causes());
            }
        }

        if causes.len() == 1 {
            causes.remove(0)
        } else {
            OperatorError::Composite(causes)
        }
    }

    /// The individual causes of this error. A non-composite error is its own only cause.
    pub fn causes(&self) -> &[OperatorError] {
        match self {
            OperatorError::Composite(causes) => causes,
            other => std::slice::from_ref(other),
        }
    }

    fn into_causes(self) -> Vec<OperatorError> {
        match self {
            OperatorError::Composite(causes) => causes,
            other => vec![other],
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, OperatorError::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OperatorError::NotFound(_))
    }
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            OperatorError::NotFound(msg) => write!(f, "Resource not found: {}", msg),
            OperatorError::VersionConflict(msg) => write!(f, "Version conflict: {}", msg),
            OperatorError::Render(msg) => write!(f, "Render error: {}", msg),
            OperatorError::KubeApi(msg) => write!(f, "Kubernetes API error: {}", msg),
            OperatorError::Timeout(msg) => write!(f, "Deadline exceeded: {}", msg),
            OperatorError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            OperatorError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OperatorError::Composite(causes) => {
                write!(f, "[")?;
                for (i, cause) in causes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", cause)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl std::error::Error for OperatorError {}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
                OperatorError::AlreadyExists(resp.message.clone())
            }
            kube::Error::Api(resp) if resp.code == 409 => {
                OperatorError::VersionConflict(resp.message.clone())
            }
            kube::Error::Api(resp) if resp.code == 404 => {
                OperatorError::NotFound(resp.message.clone())
            }
            _ => OperatorError::KubeApi(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for OperatorError {
    fn from(err: serde_yaml::Error) -> Self {
        OperatorError::Render(err.to_string())
    }
}

impl From<minijinja::Error> for OperatorError {
    fn from(err: minijinja::Error) -> Self {
        OperatorError::Render(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} happened", reason),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_error_display() {
        let err = OperatorError::KubeApi("test error".to_string());
        assert!(err.to_string().contains("Kubernetes API error"));
    }

    #[test]
    fn test_kube_error_classification() {
        assert!(OperatorError::from(api_error(409, "AlreadyExists")).is_already_exists());
        assert!(OperatorError::from(api_error(404, "NotFound")).is_not_found());
        assert!(matches!(
            OperatorError::from(api_error(409, "Conflict")),
            OperatorError::VersionConflict(_)
        ));
        assert!(matches!(
            OperatorError::from(api_error(500, "InternalError")),
            OperatorError::KubeApi(_)
        ));
    }

    #[test]
    fn test_aggregate_without_followup_failures_keeps_primary() {
        let err = OperatorError::aggregate(
            OperatorError::KubeApi("create failed".to_string()),
            vec![Ok(()), Ok(())],
        );
        assert_eq!(err, OperatorError::KubeApi("create failed".to_string()));
        assert_eq!(err.causes().len(), 1);
    }

    #[test]
    fn test_aggregate_flattens_nested_composites() {
        let inner = OperatorError::aggregate(
            OperatorError::KubeApi("create failed".to_string()),
            vec![Err(OperatorError::Timeout("delete service".to_string()))],
        );
        let err = OperatorError::aggregate(
            inner,
            vec![Err(OperatorError::KubeApi("delete read service".to_string()))],
        );

        assert_eq!(
            err.causes(),
            &[
                OperatorError::KubeApi("create failed".to_string()),
                OperatorError::Timeout("delete service".to_string()),
                OperatorError::KubeApi("delete read service".to_string()),
            ]
        );
    }

    #[test]
    fn test_composite_display_lists_every_cause() {
        let err = OperatorError::Composite(vec![
            OperatorError::KubeApi("first".to_string()),
            OperatorError::NotFound("second".to_string()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("first"));
        assert!(msg.contains("second"));
    }
}
