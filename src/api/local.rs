use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::form::SelectedFile;

use super::{Cursor, ImageApi, ImageHost, ImageRecord, NewImage, Page};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("service unavailable")]
    Unavailable,
    #[error("unknown cursor: {0}")]
    UnknownCursor(Cursor),
    #[error("failed to build url: {0}")]
    Url(url::ParseError),
}

/// In-memory gallery backend. Cursors are offsets into the record list.
pub struct Client {
    page_size: usize,
    records: tokio::sync::Mutex<Vec<ImageRecord>>,
    uploads: tokio::sync::Mutex<Vec<(url::Url, bytes::Bytes)>>,
    fail_fetches: AtomicUsize,
    fail_creates: AtomicUsize,
    fail_uploads: AtomicUsize,
    fetches: AtomicUsize,
    creates: AtomicUsize,
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl Client {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            records: Default::default(),
            uploads: Default::default(),
            fail_fetches: AtomicUsize::new(0),
            fail_creates: AtomicUsize::new(0),
            fail_uploads: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn with_records(page_size: usize, records: Vec<ImageRecord>) -> Self {
        let mut client = Self::new(page_size);
        *client.records.get_mut() = records;
        client
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.fail_fetches.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_creates(&self, count: usize) {
        self.fail_creates.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_uploads(&self, count: usize) {
        self.fail_uploads.store(count, Ordering::SeqCst);
    }

    /// Number of listing requests received, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of creation requests received, failed ones included.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub async fn records(&self) -> Vec<ImageRecord> {
        self.records.lock().await.clone()
    }

    pub async fn uploaded(&self, url: &url::Url) -> Option<bytes::Bytes> {
        self.uploads
            .lock()
            .await
            .iter()
            .find(|(uploaded, _)| uploaded == url)
            .map(|(_, body)| body.clone())
    }
}

impl ImageApi for Client {
    type Error = Error;

    async fn fetch_page(&self, after: Option<&Cursor>) -> Result<Page, Self::Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_fetches) {
            warn!(?after, "injected fetch failure");
            return Err(Error::Unavailable);
        }
        let records = self.records.lock().await;
        let start = match after {
            Some(cursor) => cursor
                .as_str()
                .parse::<usize>()
                .ok()
                .filter(|offset| *offset <= records.len())
                .ok_or_else(|| Error::UnknownCursor(cursor.clone()))?,
            None => 0,
        };
        let end = (start + self.page_size).min(records.len());
        let cursor = (end < records.len()).then(|| Cursor::new(end.to_string()));
        debug!(start, end, "serve local page");
        Ok(Page {
            items: records[start..end].to_vec(),
            cursor,
        })
    }

    async fn create_image(&self, image: &NewImage) -> Result<(), Self::Error> {
        let seq = self.creates.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.fail_creates) {
            warn!(title = %image.title, "injected create failure");
            return Err(Error::Unavailable);
        }
        self.records.lock().await.push(ImageRecord {
            id: format!("local-{seq}"),
            title: image.title.clone(),
            description: image.description.clone(),
            url: image.url.clone(),
            created_at: chrono::Utc::now(),
        });
        Ok(())
    }
}

impl ImageHost for Client {
    type Error = Error;

    async fn upload(&self, file: &SelectedFile) -> Result<url::Url, Self::Error> {
        if take_failure(&self.fail_uploads) {
            warn!(name = %file.name(), "injected upload failure");
            return Err(Error::Unavailable);
        }
        let mut uploads = self.uploads.lock().await;
        let url = url::Url::parse(&format!("memory://uploads/{}/{}", uploads.len(), file.name()))
            .map_err(Error::Url)?;
        uploads.push((url.clone(), file.body().clone()));
        Ok(url)
    }
}
