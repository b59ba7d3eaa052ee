use serde::Deserialize;
use tracing::{debug, error};

use crate::form::SelectedFile;

use super::{Cursor, ImageApi, ImageHost, NewImage, Page};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: url::Url,
    },
    #[error("failed to decode response: {0}")]
    Decode(serde_json::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(url::ParseError),
}

impl Error {
    /// The server answered, but not with the expected shape.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    /// The request failed or was refused before a body could be decoded.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Status { .. })
    }
}

pub fn decode_page(body: &[u8]) -> Result<Page, Error> {
    serde_json::from_slice(body).map_err(Error::Decode)
}

#[derive(Deserialize)]
struct HostedImage {
    url: url::Url,
}

#[derive(Deserialize)]
struct HostResponse {
    data: HostedImage,
}

pub fn decode_hosted_url(body: &[u8]) -> Result<url::Url, Error> {
    serde_json::from_slice::<HostResponse>(body)
        .map(|response| response.data.url)
        .map_err(Error::Decode)
}

fn check_status(
    status: reqwest::StatusCode,
    url: &url::Url,
    body: bytes::Bytes,
) -> Result<bytes::Bytes, Error> {
    if !status.is_success() {
        error!(%status, %url, body = %String::from_utf8_lossy(&body), "Unexpected response status");
        return Err(Error::Status {
            status,
            url: url.clone(),
        });
    }
    Ok(body)
}

async fn receive(response: reqwest::Response) -> Result<bytes::Bytes, Error> {
    let status = response.status();
    let url = response.url().clone();
    let body = response.bytes().await.map_err(Error::Transport)?;
    check_status(status, &url, body)
}

/// The `image` part shares the file's buffer instead of copying it.
fn image_part(file: &SelectedFile) -> Result<reqwest::multipart::Part, Error> {
    reqwest::multipart::Part::stream_with_length(file.body().clone(), file.size())
        .file_name(file.name().to_owned())
        .mime_str(file.content_type().as_ref())
        .map_err(Error::Transport)
}

/// Client for the gallery's own API (`/api/images`).
pub struct Client {
    endpoint: url::Url,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &url::Url) -> Result<Self, Error> {
        Ok(Self {
            endpoint: base_url.join("api/images").map_err(Error::Endpoint)?,
            http: reqwest::Client::new(),
        })
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

impl ImageApi for Client {
    type Error = Error;

    async fn fetch_page(&self, after: Option<&Cursor>) -> Result<Page, Self::Error> {
        let mut request = self.http.get(self.endpoint.clone());
        if let Some(after) = after {
            request = request.query(&[("after", after.as_str())]);
        }
        let response = request
            .send()
            .await
            .map_err(Error::Transport)
            .inspect_err(|error| error!(%error, ?after, "Failed to fetch image page"))?;
        let body = receive(response).await?;
        let page = decode_page(&body)
            .inspect_err(|error| error!(%error, ?after, "Malformed image page"))?;
        debug!(items = page.items.len(), next = ?page.cursor, "fetched image page");
        Ok(page)
    }

    async fn create_image(&self, image: &NewImage) -> Result<(), Self::Error> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(image)
            .send()
            .await
            .map_err(Error::Transport)
            .inspect_err(|error| error!(%error, title = %image.title, "Failed to create image"))?;
        receive(response).await?;
        debug!(title = %image.title, url = %image.url, "created image");
        Ok(())
    }
}

/// Client for an imgbb-style host: multipart `image` field, API key in the query.
pub struct HostClient {
    endpoint: url::Url,
    api_key: String,
    http: reqwest::Client,
}

impl HostClient {
    pub fn new(endpoint: url::Url, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }
}

impl ImageHost for HostClient {
    type Error = Error;

    async fn upload(&self, file: &SelectedFile) -> Result<url::Url, Self::Error> {
        let form = reqwest::multipart::Form::new().part("image", image_part(file)?);
        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(Error::Transport)
            .inspect_err(|error| error!(%error, name = %file.name(), "Failed to upload image"))?;
        let body = receive(response).await?;
        let url = decode_hosted_url(&body)?;
        debug!(name = %file.name(), %url, "uploaded image");
        Ok(url)
    }
}
