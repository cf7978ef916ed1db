// Copyright 2025 Synapse Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Uploaded file storage and attachment inlining.
//!
//! Uploads are written to `<public_dir>/uploads/<millis>-<sanitized name>`
//! and addressed by the URL `/uploads/<file>`. Chat attachments refer back
//! to those URLs; text-like files are inlined into the user message and
//! everything else becomes a placeholder line.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

pub const UPLOADS_DIR: &str = "uploads";

/// Extensions read as UTF-8 and inlined verbatim.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "csv", "log", "js", "ts", "html", "css", "xml", "yaml", "yml",
];

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("invalid file path: {0}")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A previously uploaded file referenced from a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedFile {
    pub name: String,
    pub url: String,
    #[serde(default, alias = "mimeType")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentContent {
    /// File text, inlined as-is.
    Text(String),
    /// Binary or unsupported type; describes the file instead.
    Placeholder(String),
    Missing,
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredUpload {
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    public_dir: PathBuf,
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn extension(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

impl FileStore {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join(UPLOADS_DIR)
    }

    pub fn stored_name(original_name: &str, millis: i64) -> String {
        format!("{}-{}", millis, sanitize_file_name(original_name))
    }

    pub async fn save_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload, FileError> {
        let dir = self.uploads_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = Self::stored_name(original_name, Utc::now().timestamp_millis());
        tokio::fs::write(dir.join(&file_name), bytes).await?;
        debug!(%file_name, size = bytes.len(), "Stored upload");

        Ok(StoredUpload {
            url: format!("/{}/{}", UPLOADS_DIR, file_name),
            file_name,
        })
    }

    /// Map a returned URL back to a path under the public directory.
    pub fn resolve(&self, url: &str) -> Result<PathBuf, FileError> {
        let relative = Path::new(url.trim_start_matches('/'));
        let mut path = self.public_dir.clone();
        let mut depth = 0;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return Err(FileError::InvalidPath(url.to_string())),
            }
        }
        if depth == 0 {
            return Err(FileError::InvalidPath(url.to_string()));
        }
        Ok(path)
    }

    pub async fn read_attachment(&self, file: &AttachedFile) -> AttachmentContent {
        let path = match self.resolve(&file.url) {
            Ok(path) => path,
            Err(e) => return AttachmentContent::Unreadable(e.to_string()),
        };

        match tokio::fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return AttachmentContent::Missing,
            Err(e) => return AttachmentContent::Unreadable(e.to_string()),
        }

        match extension(&file.name).as_deref() {
            Some("pdf") => AttachmentContent::Placeholder(format!(
                "[PDF file attached: {} - Content cannot be extracted automatically. Please describe the content or paste relevant text.]",
                file.name
            )),
            Some(ext) if TEXT_EXTENSIONS.contains(&ext) => {
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => AttachmentContent::Text(text),
                    Err(e) => AttachmentContent::Unreadable(e.to_string()),
                }
            }
            _ => AttachmentContent::Placeholder(format!(
                "[File attached: {} ({}) - Content cannot be extracted automatically. Please describe the content or paste relevant text.]",
                file.name,
                file.mime_type.as_deref().unwrap_or("unknown")
            )),
        }
    }

    /// `message` with one block or note appended per attachment, in order.
    pub async fn enhance_message(&self, message: &str, files: &[AttachedFile]) -> String {
        let mut enhanced = message.to_string();
        for file in files {
            match self.read_attachment(file).await {
                AttachmentContent::Text(content) | AttachmentContent::Placeholder(content) => {
                    enhanced.push_str(&format!(
                        "\n\n--- Attached File: {} ---\n{}\n--- End of File ---",
                        file.name, content
                    ));
                }
                AttachmentContent::Missing => {
                    warn!(name = %file.name, url = %file.url, "Attached file not found");
                    enhanced.push_str(&format!(
                        "\n\n[Note: File {} was not found at the expected location. Please try uploading again.]",
                        file.name
                    ));
                }
                AttachmentContent::Unreadable(reason) => {
                    warn!(name = %file.name, %reason, "Could not read attached file");
                    enhanced.push_str(&format!(
                        "\n\n[Note: Could not read attached file: {} - {}]",
                        file.name, reason
                    ));
                }
            }
        }
        enhanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached(name: &str, url: &str, mime: Option<&str>) -> AttachedFile {
        AttachedFile {
            name: name.to_string(),
            url: url.to_string(),
            mime_type: mime.map(str::to_string),
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my report (v2).pdf"), "my_report__v2_.pdf");
        assert_eq!(sanitize_file_name("résumé.txt"), "r_sum_.txt");
        assert_eq!(FileStore::stored_name("a b.md", 1700), "1700-a_b.md");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let store = FileStore::new("/srv/public");
        assert_eq!(
            store.resolve("/uploads/1-a.txt").unwrap(),
            PathBuf::from("/srv/public/uploads/1-a.txt")
        );
        assert!(store.resolve("/uploads/../../etc/passwd").is_err());
        assert!(store.resolve("/").is_err());
    }

    #[tokio::test]
    async fn test_save_then_inline_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let upload = store.save_upload("notes.md", b"# Findings").await.unwrap();
        assert!(upload.url.starts_with("/uploads/"));
        assert!(upload.url.ends_with("-notes.md"));

        let enhanced = store
            .enhance_message("see attached", &[attached("notes.md", &upload.url, None)])
            .await;
        assert_eq!(
            enhanced,
            "see attached\n\n--- Attached File: notes.md ---\n# Findings\n--- End of File ---"
        );
    }

    #[tokio::test]
    async fn test_placeholders_and_notes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let pdf = store.save_upload("design.pdf", b"%PDF-1.4").await.unwrap();
        let image = store.save_upload("shot.png", &[0x89, 0x50]).await.unwrap();

        let files = vec![
            attached("design.pdf", &pdf.url, Some("application/pdf")),
            attached("shot.png", &image.url, Some("image/png")),
            attached("gone.txt", "/uploads/0-gone.txt", None),
        ];
        let enhanced = store.enhance_message("hi", &files).await;

        assert!(enhanced.contains("--- Attached File: design.pdf ---\n[PDF file attached: design.pdf"));
        assert!(enhanced.contains("[File attached: shot.png (image/png)"));
        assert!(enhanced.ends_with(
            "[Note: File gone.txt was not found at the expected location. Please try uploading again.]"
        ));
    }

    #[tokio::test]
    async fn test_invalid_text_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let upload = store.save_upload("bad.txt", &[0xff, 0xfe, 0x00]).await.unwrap();

        let content = store
            .read_attachment(&attached("bad.txt", &upload.url, None))
            .await;
        assert!(matches!(content, AttachmentContent::Unreadable(_)));
    }
}
