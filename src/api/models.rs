//! Wire models for the control-plane facing endpoints.
//!
//! A download request, as JSON (the same fields are accepted form-encoded):
//!
//! ```json
//! {
//!   "uifn": "hb_1700000000000.tar",
//!   "uifnKey": "c2f1",
//!   "site": 1,
//!   "board_id": "42",
//!   "ctime": 1700000000000,
//!   "etime": 1700043200000,
//!   "board_pins": "[{\"imgName\":\"a.jpg\",\"imgUrl\":\"https://img.example/a.jpg\"}]",
//!   "MAX_BOARD_NUMBER": 500,
//!   "DISKLIMIT": 80.0,
//!   "CALLBACK_URL": "https://control.example/callback"
//! }
//! ```
//!
//! `board_pins` is itself a JSON document carried as a string.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DownloadRequest {
    #[serde(default)]
    pub uifn: String,
    #[serde(default, rename = "uifnKey")]
    pub uifn_key: String,
    #[serde(default)]
    pub site: u8,
    #[serde(default)]
    pub board_id: String,
    #[serde(default)]
    pub ctime: u64,
    #[serde(default)]
    pub etime: u64,
    #[serde(default)]
    pub board_pins: String,
    #[serde(default, rename = "MAX_BOARD_NUMBER")]
    pub max_board_number: usize,
    #[serde(default, rename = "DISKLIMIT")]
    pub disk_limit: f64,
    #[serde(default, rename = "CALLBACK_URL")]
    pub callback_url: String,
}

/// Query parameters carried by signed requests
#[derive(Debug, Default, Deserialize, Clone)]
pub struct SignatureQuery {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
}

/// Generic `{code, msg}` body used for acknowledgements and errors
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub code: i32,
    pub msg: String,
}

impl StatusResponse {
    pub fn downloading() -> Self {
        Self {
            code: 0,
            msg: "downloading".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PingResponse {
    pub code: i32,
    pub version: String,
    pub status: String,
    #[serde(rename = "diskRate")]
    pub disk_rate: f64,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    pub queued: usize,
    pub jobs: MetricsSnapshot,
}
