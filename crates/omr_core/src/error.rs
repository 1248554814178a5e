use thiserror::Error;

#[derive(Debug, Error)]
pub enum OmrError {
    #[error("invalid parameter `{parameter}`: {message}")]
    InvalidParameter { parameter: String, message: String },

    #[error("{type_name} not found: {guid}")]
    NotFound { type_name: String, guid: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("type violation: {0}")]
    TypeViolation(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OmrError {
    /// Shorthand for the most common validation failure.
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn not_found(type_name: impl Into<String>, guid: impl std::fmt::Display) -> Self {
        Self::NotFound {
            type_name: type_name.into(),
            guid: guid.to_string(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidParameter { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Unauthorized(_) => 403,
            Self::Conflict(_) => 409,
            Self::TypeViolation(_) => 422,
            Self::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── http_status: exhaustive variant coverage ──────────────────

    #[test]
    fn http_status_invalid_parameter() {
        assert_eq!(OmrError::invalid_parameter("guid", "empty").http_status(), 400);
    }

    #[test]
    fn http_status_not_found() {
        assert_eq!(OmrError::not_found("Glossary", "abc").http_status(), 404);
    }

    #[test]
    fn http_status_unauthorized() {
        assert_eq!(OmrError::Unauthorized("zone".into()).http_status(), 403);
    }

    #[test]
    fn http_status_conflict() {
        assert_eq!(OmrError::Conflict("dup".into()).http_status(), 409);
    }

    #[test]
    fn http_status_type_violation() {
        assert_eq!(OmrError::TypeViolation("bad end".into()).http_status(), 422);
    }

    #[test]
    fn http_status_internal() {
        let err = OmrError::Internal(anyhow::anyhow!("boom"));
        assert_eq!(err.http_status(), 500);
    }

    // ── Display ─────────────────────────────────────────────────

    #[test]
    fn display_invalid_parameter() {
        let e = OmrError::invalid_parameter("displayName", "must not be empty");
        assert_eq!(
            e.to_string(),
            "invalid parameter `displayName`: must not be empty"
        );
    }

    #[test]
    fn display_not_found() {
        let e = OmrError::not_found("GlossaryCategory", "42");
        assert_eq!(e.to_string(), "GlossaryCategory not found: 42");
    }

    #[test]
    fn display_conflict() {
        let e = OmrError::Conflict("qualified name taken".into());
        assert_eq!(e.to_string(), "conflict: qualified name taken");
    }

    #[test]
    fn display_internal() {
        let e = OmrError::Internal(anyhow::anyhow!("segfault"));
        assert_eq!(e.to_string(), "internal: segfault");
    }
}
