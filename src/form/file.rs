use std::path::Path;

use derive_debug::Dbg;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {error}")]
    Read { error: std::io::Error, path: String },
}

/// A local file picked for upload. The body is held in memory until the draft is dropped.
#[derive(Dbg, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: String,
    content_type: mime::Mime,
    size: u64,
    #[dbg(skip)]
    body: bytes::Bytes,
}

fn detect_content_type(name: &str, body: &[u8]) -> mime::Mime {
    let guessed = mime_guess::from_path(name).first_or_octet_stream();
    if guessed != mime::APPLICATION_OCTET_STREAM {
        return guessed;
    }
    image::guess_format(body)
        .ok()
        .and_then(|format| format.to_mime_type().parse().ok())
        .unwrap_or(guessed)
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content_type: mime::Mime, body: impl Into<bytes::Bytes>) -> Self {
        let body = body.into();
        Self {
            name: name.into(),
            content_type,
            size: body.len() as u64,
            body,
        }
    }

    /// Content type comes from the extension, falling back to sniffing the bytes.
    pub fn from_bytes(name: impl Into<String>, body: impl Into<bytes::Bytes>) -> Self {
        let name = name.into();
        let body = body.into();
        let content_type = detect_content_type(&name, &body);
        Self::new(name, content_type, body)
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let body = tokio::fs::read(path)
            .await
            .map_err(|error| Error::Read {
                error,
                path: path.display().to_string(),
            })
            .inspect_err(|error| error!(%error, "Failed to open selected file"))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = Self::from_bytes(name, body);
        debug!(?file, "selected file");
        Ok(file)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &mime::Mime {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn body(&self) -> &bytes::Bytes {
        &self.body
    }
}
