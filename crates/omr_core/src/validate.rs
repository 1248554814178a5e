//! Entry-point parameter validation. Every handler operation runs these
//! before touching the repository so that bad requests fail with the
//! offending parameter named.

use chrono::{DateTime, Utc};

use crate::error::OmrError;

pub fn require_user_id(user_id: &str) -> Result<(), OmrError> {
    if user_id.trim().is_empty() {
        return Err(OmrError::invalid_parameter("user_id", "must not be empty"));
    }
    Ok(())
}

pub fn require_guid(guid: &str, parameter: &str) -> Result<(), OmrError> {
    if guid.trim().is_empty() {
        return Err(OmrError::invalid_parameter(parameter, "must not be empty"));
    }
    Ok(())
}

/// Names must be non-empty after trimming.
pub fn require_name(value: &str, parameter: &str) -> Result<(), OmrError> {
    if value.trim().is_empty() {
        return Err(OmrError::invalid_parameter(parameter, "must not be empty"));
    }
    Ok(())
}

pub fn require_search_string(value: &str) -> Result<(), OmrError> {
    if value.trim().is_empty() {
        return Err(OmrError::invalid_parameter(
            "search_string",
            "must not be empty",
        ));
    }
    Ok(())
}

/// When both ends of an effectivity window are given, the window must be
/// non-empty.
pub fn validate_effective_dates(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<(), OmrError> {
    if let (Some(f), Some(t)) = (from, to) {
        if f >= t {
            return Err(OmrError::invalid_parameter(
                "effective_to",
                "must be after effective_from",
            ));
        }
    }
    Ok(())
}

/// Paging guard: page size of zero means "default", negatives are rejected
/// at the API type level (usize), so only an upper bound is enforced.
pub fn clamp_page_size(page_size: usize, max: usize) -> usize {
    if page_size == 0 {
        max
    } else {
        page_size.min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn user_id_must_be_present() {
        assert!(require_user_id("kim").is_ok());
        let err = require_user_id("  ").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid parameter `user_id`: must not be empty"
        );
    }

    #[test]
    fn guid_and_name_checks_name_the_parameter() {
        let err = require_guid("", "glossary_guid").unwrap_err();
        assert!(err.to_string().contains("glossary_guid"));
        let err = require_name(" \t", "display_name").unwrap_err();
        assert!(err.to_string().contains("display_name"));
    }

    #[test]
    fn effectivity_window_ordering() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(validate_effective_dates(Some(early), Some(late)).is_ok());
        assert!(validate_effective_dates(Some(late), Some(early)).is_err());
        assert!(validate_effective_dates(Some(early), Some(early)).is_err());
        assert!(validate_effective_dates(None, Some(late)).is_ok());
        assert!(validate_effective_dates(None, None).is_ok());
    }

    #[test]
    fn page_size_clamping() {
        assert_eq!(clamp_page_size(0, 100), 100);
        assert_eq!(clamp_page_size(10, 100), 10);
        assert_eq!(clamp_page_size(500, 100), 100);
    }
}
