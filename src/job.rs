//! Board download jobs and the pins they reference

use serde::{Deserialize, Serialize};

/// Image board a job was collected from; decides the `Referer` sent with every fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteKind {
    Huaban,
    Duitang,
}

impl SiteKind {
    /// Wire value `1` is Huaban; anything else is treated as Duitang
    pub fn from_code(code: u8) -> Self {
        if code == 1 {
            SiteKind::Huaban
        } else {
            SiteKind::Duitang
        }
    }

    pub fn referer(&self, board_id: &str) -> String {
        match self {
            SiteKind::Huaban => format!("https://huaban.com/boards/{board_id}"),
            SiteKind::Duitang => format!("https://www.duitang.com/album/?id={board_id}"),
        }
    }
}

/// One image reference within a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "imgName")]
    pub file_name: String,
    #[serde(rename = "imgUrl")]
    pub source_url: String,
}

/// A validated request to mirror one board into one archive
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Archive file name (`uifn`), unique across jobs
    pub archive_name: String,
    /// Correlation key (`uifnKey`) echoed back in FIRST_STATUS
    pub archive_key: String,
    pub site: SiteKind,
    pub board_id: String,
    pub pins: Vec<ImageRef>,
    pub max_pin_count: usize,
    pub disk_limit_percent: f64,
    pub callback_url: String,
    /// Epoch millis as supplied by the control plane
    pub created_at: u64,
    pub expires_at: u64,
}

/// True when `name` can be joined onto a directory without escaping it
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referer_per_site() {
        assert_eq!(
            SiteKind::from_code(1).referer("42"),
            "https://huaban.com/boards/42"
        );
        assert_eq!(
            SiteKind::from_code(2).referer("42"),
            "https://www.duitang.com/album/?id=42"
        );
        assert_eq!(SiteKind::from_code(7), SiteKind::Duitang);
    }

    #[test]
    fn test_safe_component() {
        assert!(is_safe_component("cat.jpg"));
        assert!(is_safe_component("hb_1700000000000.tar"));
        assert!(is_safe_component("..hidden"));
        assert!(!is_safe_component(""));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component("../etc/passwd"));
        assert!(!is_safe_component("a/b.jpg"));
        assert!(!is_safe_component("a\\b.jpg"));
    }

    #[test]
    fn test_image_ref_wire_names() {
        let pins: Vec<ImageRef> =
            serde_json::from_str(r#"[{"imgName":"a.jpg","imgUrl":"http://x/a"}]"#).unwrap();
        assert_eq!(pins[0].file_name, "a.jpg");
        assert_eq!(pins[0].source_url, "http://x/a");
    }
}
