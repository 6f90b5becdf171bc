use thiserror::Error;

use super::models::DownloadRequest;
use crate::job::{DownloadJob, ImageRef, SiteKind, is_safe_component};

#[derive(Debug, Error)]
pub enum RequestValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} must be non-zero")]
    ZeroTimestamp(&'static str),
    #[error("{field} must be a single path component, got '{value}'")]
    UnsafeName { field: &'static str, value: String },
    #[error("board_pins is not a valid pin list: {0}")]
    InvalidPins(#[from] serde_json::Error),
    #[error("board_pins must contain at least one pin")]
    NoPins,
}

/// Check a raw request and turn it into a [`DownloadJob`]
pub fn validate_request(request: DownloadRequest) -> Result<DownloadJob, RequestValidationError> {
    if request.uifn_key.is_empty() {
        return Err(RequestValidationError::MissingField("uifnKey"));
    }
    if request.uifn.is_empty() {
        return Err(RequestValidationError::MissingField("uifn"));
    }
    if request.board_id.is_empty() {
        return Err(RequestValidationError::MissingField("board_id"));
    }
    if request.board_pins.is_empty() {
        return Err(RequestValidationError::MissingField("board_pins"));
    }
    if request.ctime == 0 {
        return Err(RequestValidationError::ZeroTimestamp("ctime"));
    }
    if request.etime == 0 {
        return Err(RequestValidationError::ZeroTimestamp("etime"));
    }

    for (field, value) in [("uifn", &request.uifn), ("board_id", &request.board_id)] {
        if !is_safe_component(value) {
            return Err(RequestValidationError::UnsafeName {
                field,
                value: value.clone(),
            });
        }
    }

    let pins: Vec<ImageRef> = serde_json::from_str(&request.board_pins)?;
    if pins.is_empty() {
        return Err(RequestValidationError::NoPins);
    }

    Ok(DownloadJob {
        archive_name: request.uifn,
        archive_key: request.uifn_key,
        site: SiteKind::from_code(request.site),
        board_id: request.board_id,
        pins,
        max_pin_count: request.max_board_number,
        disk_limit_percent: request.disk_limit,
        callback_url: request.callback_url,
        created_at: request.ctime,
        expires_at: request.etime,
    })
}
