//! Warnings collected while a job runs, shipped inside the archive as `README.txt`

use std::path::Path;
use tokio::sync::Mutex;

pub const README_FILE: &str = "README.txt";

#[derive(Debug, Default)]
pub struct Readme {
    lines: Mutex<Vec<String>>,
}

impl Readme {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, line: impl Into<String>) {
        self.lines.lock().await.push(line.into());
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.lines.lock().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn lines(&self) -> Vec<String> {
        self.lines.lock().await.clone()
    }

    /// Write the collected lines into `dir/README.txt`. Returns the line count;
    /// nothing is written when empty.
    pub async fn flush(&self, dir: &Path) -> std::io::Result<usize> {
        let lines = self.lines.lock().await;
        if lines.is_empty() {
            return Ok(0);
        }

        let mut body = lines.join("\n");
        body.push('\n');
        tokio::fs::write(dir.join(README_FILE), body).await?;
        Ok(lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_flush_writes_one_line_per_warning() {
        let temp = TempDir::new().unwrap();
        let readme = Readme::new();
        readme.push("disk usage is too high").await;
        readme.push(String::from("a.jpg: HTTP 404")).await;

        assert_eq!(readme.flush(temp.path()).await.unwrap(), 2);
        let body = std::fs::read_to_string(temp.path().join(README_FILE)).unwrap();
        assert_eq!(body, "disk usage is too high\na.jpg: HTTP 404\n");
    }

    #[tokio::test]
    async fn test_empty_flush_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let readme = Readme::new();

        assert!(readme.is_empty().await);
        assert_eq!(readme.flush(temp.path()).await.unwrap(), 0);
        assert!(!temp.path().join(README_FILE).exists());
    }
}
