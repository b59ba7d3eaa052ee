//! Wire types and collaborator seams
//!
//! The gallery talks to two external services: the image API, which lists
//! and creates image records, and the image host, which stores the raw
//! bytes of a selected file and hands back a public URL.

use serde::{Deserialize, Serialize};

use crate::form::SelectedFile;

pub mod http;
pub mod local;

/// Opaque pagination token. `None` in a [`Page`] marks the end of the feed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: url::Url,
    #[serde(rename = "ts", with = "chrono::serde::ts_microseconds")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One page of the listing endpoint: `{ "data": [...], "after": ... }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Page {
    #[serde(rename = "data")]
    pub items: Vec<ImageRecord>,
    #[serde(rename = "after", default)]
    pub cursor: Option<Cursor>,
}

/// Metadata sent to the creation endpoint once the image bytes are hosted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub url: url::Url,
    pub title: String,
    pub description: String,
}

pub trait ImageApi {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_page(
        &self,
        after: Option<&Cursor>,
    ) -> impl Future<Output = Result<Page, Self::Error>> + Send;

    fn create_image(
        &self,
        image: &NewImage,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

pub trait ImageHost {
    type Error: std::error::Error + Send + Sync + 'static;

    fn upload(
        &self,
        file: &SelectedFile,
    ) -> impl Future<Output = Result<url::Url, Self::Error>> + Send;
}
