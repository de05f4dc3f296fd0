//! Upload side effect run on create (and on update when a file is sent).

use crate::request::FileInput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Upload settings of a collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    /// Accepted mime types; empty accepts everything. A trailing `/*`
    /// matches a whole family, e.g. `image/*`.
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl UploadConfig {
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.mime_types.is_empty()
            || self.mime_types.iter().any(|allowed| match allowed.strip_suffix("/*") {
                Some(family) => mime_type
                    .split_once('/')
                    .is_some_and(|(f, _)| f == family),
                None => allowed == mime_type,
            })
    }
}

/// Turns an uploaded file into document metadata.
///
/// The returned object is merged into the incoming data before
/// `beforeValidate`, so derived metadata can be validated like any field.
#[async_trait]
pub trait UploadProcessor: Send + Sync {
    async fn process(&self, file: &FileInput, upload: &UploadConfig) -> anyhow::Result<Value>;
}

/// Records `filename`, `filesize` and `mimeType` without writing anywhere.
pub struct FileMetadataProcessor;

#[async_trait]
impl UploadProcessor for FileMetadataProcessor {
    async fn process(&self, file: &FileInput, upload: &UploadConfig) -> anyhow::Result<Value> {
        if !upload.accepts(&file.mime_type) {
            anyhow::bail!("mime type {} is not accepted", file.mime_type);
        }
        Ok(json!({
            "filename": safe_filename(&file.filename),
            "filesize": file.data.len(),
            "mimeType": file.mime_type,
        }))
    }
}

fn safe_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '-' })
        .collect()
}
