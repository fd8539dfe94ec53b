//! Out-of-band storage for payloads too large to inline in a message.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;

use crate::{formatting::escape_html, Result};

/// Writes payloads into a directory served under `base_url`.
#[derive(Clone, Debug)]
pub struct TraceFileSink {
    dir: PathBuf,
    base_url: String,
}

impl TraceFileSink {
    pub fn new(dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store `content` as `<YYYYmmdd_HHMMSS>_<name>_<nnnn>.<ext>` and return
    /// its public URL.
    ///
    /// `html` content lacking an `<html` element is wrapped in a minimal page.
    pub fn create(&self, content: &str, name: &str, ext: &str) -> Result<String> {
        std::fs::create_dir_all(&self.dir)?;

        let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
        let file_name = format!(
            "{}_{name}_{suffix}.{ext}",
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        let body = if ext == "html" && !content.to_lowercase().contains("<html") {
            wrap_html(&file_name, content)
        } else {
            content.to_string()
        };

        std::fs::write(self.dir.join(&file_name), body)?;
        Ok(format!("{}/{file_name}", self.base_url))
    }
}

fn wrap_html(title: &str, content: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n\
<style>body {{ font-family: sans-serif; font-size: 14px; }}</style>\n</head>\n<body>\n{content}\n</body>\n</html>\n",
        escape_html(title)
    )
}
