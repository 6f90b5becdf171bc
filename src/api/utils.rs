//! API utility functions
//!
//! Pure, stateless helpers for request processing, kept apart from the
//! handlers so they can be unit tested.

use crate::api::error::ApiError;

/// Body encodings accepted by `POST /download`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Form,
}

/// Parses the Content-Type header into a [`BodyFormat`]
///
/// Accepts `application/json` and `application/x-www-form-urlencoded`, with or
/// without parameters. Rejects everything else, including look-alikes such as
/// `application/jsonp` or `text/json`.
pub fn parse_content_type(content_type: &str) -> Result<BodyFormat, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type))
    })?;

    if media_type.type_() == mime::APPLICATION {
        if media_type.subtype() == mime::JSON {
            return Ok(BodyFormat::Json);
        }
        if media_type.subtype() == mime::WWW_FORM_URLENCODED {
            return Ok(BodyFormat::Form);
        }
    }

    Err(ApiError::InvalidPayload(format!(
        "Content-Type must be application/json or application/x-www-form-urlencoded, got: {}/{}",
        media_type.type_(),
        media_type.subtype()
    )))
}

/// Validates that body size does not exceed the maximum allowed size
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// Only `<prefix>_...` names in a single path component may be served
pub fn is_servable_archive(name: &str, prefix: &str) -> bool {
    crate::job::is_safe_component(name)
        && name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_type_valid() {
        assert_eq!(
            parse_content_type("application/json").unwrap(),
            BodyFormat::Json
        );
        assert_eq!(
            parse_content_type("application/json; charset=utf-8").unwrap(),
            BodyFormat::Json
        );
        assert_eq!(
            parse_content_type("application/x-www-form-urlencoded").unwrap(),
            BodyFormat::Form
        );
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("multipart/form-data; boundary=x").is_err());
        assert!(parse_content_type("invalid").is_err());
        assert!(parse_content_type("").is_err());
    }

    #[test]
    fn test_validate_body_size() {
        let data = vec![0u8; 1000];
        assert!(validate_body_size(&data, 1000).is_ok());
        match validate_body_size(&data, 999) {
            Err(ApiError::PayloadTooLarge(size)) => assert_eq!(size, 1000),
            _ => panic!("Expected PayloadTooLarge error"),
        }
    }

    #[test]
    fn test_servable_archive_names() {
        assert!(is_servable_archive("hb_1700000000000.tar", "hb"));
        assert!(!is_servable_archive("hb1700000000000.tar", "hb"));
        assert!(!is_servable_archive("xx_1.tar", "hb"));
        assert!(!is_servable_archive("hb_/../../etc/passwd", "hb"));
        assert!(!is_servable_archive("", "hb"));
    }
}
