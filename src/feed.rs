//! Paginated image feed
//!
//! The feed is a list of pages stored in a [`QueryCache`] under
//! [`IMAGES_KEY`]. A [`FeedLoader`] walks the cursor chain one page at a
//! time and keeps the fetch status; [`FeedView`] derives what the view
//! layer needs from both.

use tracing::{debug, info, warn};

use crate::{
    api::{Cursor, ImageApi, ImageRecord, Page},
    cache::QueryCache,
};

pub const IMAGES_KEY: &str = "images";

pub type Pages = Vec<Page>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    First,
    Next,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Idle,
    Loading,
    Loaded,
    FetchingNext,
    Failed { phase: FetchPhase, message: String },
}

/// A page fetch that has been started but not completed.
///
/// `generation` names the first-page fetch the request builds on, so a
/// continuation of a feed that has since been refetched can be told apart
/// from one of the current feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    cursor: Option<Cursor>,
    generation: u64,
}

impl PageRequest {
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn phase(&self) -> FetchPhase {
        match self.cursor {
            Some(_) => FetchPhase::Next,
            None => FetchPhase::First,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Appended { items: usize },
    /// The last page has no cursor; nothing was requested.
    Exhausted,
    /// The cache entry was invalidated or refetched while the request was
    /// in flight.
    Discarded,
}

pub struct FeedLoader {
    key: String,
    status: FeedStatus,
    /// Bumped for every first-page request.
    generation: u64,
    /// Generation of the first page currently stored in the cache.
    stored: u64,
}

impl Default for FeedLoader {
    fn default() -> Self {
        Self::new(IMAGES_KEY)
    }
}

impl FeedLoader {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: FeedStatus::Idle,
            generation: 0,
            stored: 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> &FeedStatus {
        &self.status
    }

    fn pages<'c>(&self, cache: &'c QueryCache<Pages>) -> Option<&'c [Page]> {
        cache
            .get(&self.key)
            .map(Vec::as_slice)
            .filter(|pages| !pages.is_empty())
    }

    /// Starts the next fetch, or returns `None` once the feed is exhausted.
    ///
    /// Calling this again before the previous request completes issues the
    /// same continuation a second time. A repeated first-page request
    /// supersedes the earlier one.
    pub fn begin(&mut self, cache: &QueryCache<Pages>) -> Option<PageRequest> {
        match self.pages(cache) {
            None => {
                if !matches!(self.status, FeedStatus::Idle | FeedStatus::Loading) {
                    debug!(key = %self.key, "feed cache is empty, restarting from first page");
                }
                self.status = FeedStatus::Loading;
                self.generation += 1;
                Some(PageRequest {
                    cursor: None,
                    generation: self.generation,
                })
            }
            Some(pages) => match pages.last().and_then(|page| page.cursor.clone()) {
                Some(cursor) => {
                    self.status = FeedStatus::FetchingNext;
                    Some(PageRequest {
                        cursor: Some(cursor),
                        generation: self.stored,
                    })
                }
                None => {
                    debug!(key = %self.key, "feed exhausted");
                    None
                }
            },
        }
    }

    /// A first page is stale once a newer first page has been stored; a
    /// continuation is stale once any other first page has been stored.
    fn is_stale(&self, request: &PageRequest) -> bool {
        match request.phase() {
            FetchPhase::First => request.generation < self.stored,
            FetchPhase::Next => request.generation != self.stored,
        }
    }

    /// Applies the result of a request started with [`FeedLoader::begin`].
    ///
    /// Results of stale requests leave both the cache and the status alone.
    pub fn complete<E: std::fmt::Display>(
        &mut self,
        request: PageRequest,
        result: Result<Page, E>,
        cache: &mut QueryCache<Pages>,
    ) -> Result<FetchOutcome, E> {
        let phase = request.phase();
        let stale = self.is_stale(&request);
        let page = match result {
            Ok(page) => page,
            Err(error) => {
                warn!(key = %self.key, ?phase, stale, %error, "failed to load feed page");
                if !stale {
                    self.status = FeedStatus::Failed {
                        phase,
                        message: error.to_string(),
                    };
                }
                return Err(error);
            }
        };
        if stale {
            debug!(
                key = %self.key,
                ?phase,
                generation = request.generation,
                current = self.stored,
                "drop page of refetched feed"
            );
            return Ok(FetchOutcome::Discarded);
        }
        let items = page.items.len();
        match request.cursor {
            None => {
                cache.set(self.key.clone(), vec![page]);
                self.stored = request.generation;
            }
            Some(cursor) => match cache.get_mut(&self.key) {
                Some(pages) => pages.push(page),
                None => {
                    debug!(key = %self.key, %cursor, "drop page of invalidated feed");
                    self.status = FeedStatus::Idle;
                    return Ok(FetchOutcome::Discarded);
                }
            },
        }
        info!(key = %self.key, ?phase, items, "loaded feed page");
        self.status = FeedStatus::Loaded;
        Ok(FetchOutcome::Appended { items })
    }

    pub async fn load_next_page<A: ImageApi>(
        &mut self,
        api: &A,
        cache: &mut QueryCache<Pages>,
    ) -> Result<FetchOutcome, A::Error> {
        let Some(request) = self.begin(cache) else {
            return Ok(FetchOutcome::Exhausted);
        };
        let result = api.fetch_page(request.cursor()).await;
        self.complete(request, result, cache)
    }

    /// Serves the cached feed, fetching the first page when there is none.
    pub async fn read<'a, A: ImageApi>(
        &'a mut self,
        api: &A,
        cache: &'a mut QueryCache<Pages>,
    ) -> Result<FeedView<'a>, A::Error> {
        if self.pages(cache).is_none() {
            self.load_next_page(api, cache).await?;
        }
        Ok(self.view(cache))
    }

    pub fn view<'a>(&'a self, cache: &'a QueryCache<Pages>) -> FeedView<'a> {
        FeedView {
            status: &self.status,
            pages: self.pages(cache).unwrap_or_default(),
        }
    }
}

pub struct FeedView<'a> {
    status: &'a FeedStatus,
    pages: &'a [Page],
}

impl<'a> FeedView<'a> {
    /// True only while the very first page is being fetched.
    pub fn is_loading(&self) -> bool {
        matches!(self.status, FeedStatus::Loading)
    }

    /// True when the first page could not be fetched.
    pub fn is_error(&self) -> bool {
        matches!(
            self.status,
            FeedStatus::Failed {
                phase: FetchPhase::First,
                ..
            }
        )
    }

    pub fn is_fetching_next(&self) -> bool {
        matches!(self.status, FeedStatus::FetchingNext)
    }

    pub fn has_next(&self) -> bool {
        self.pages
            .last()
            .is_some_and(|page| page.cursor.is_some())
    }

    pub fn items(&self) -> impl Iterator<Item = &'a ImageRecord> + use<'a> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn load_more_label(&self) -> Option<&'static str> {
        if !self.has_next() {
            None
        } else if self.is_fetching_next() {
            Some("Carregando...")
        } else {
            Some("Carregar mais")
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::{Cursor, ImageRecord, Page, local},
        cache::QueryCache,
    };

    use super::{FeedLoader, FeedStatus, FetchOutcome, FetchPhase, IMAGES_KEY, Pages};

    fn record(id: &str) -> ImageRecord {
        ImageRecord {
            id: id.into(),
            title: format!("title {id}"),
            description: format!("description {id}"),
            url: format!("https://i.ibb.co/{id}.png").parse().unwrap(),
            created_at: chrono::DateTime::from_timestamp(1_620_222_828, 0).unwrap(),
        }
    }

    fn page(ids: &[&str], cursor: Option<&str>) -> Page {
        Page {
            items: ids.iter().map(|id| record(id)).collect(),
            cursor: cursor.map(Cursor::new),
        }
    }

    fn ids(loader: &FeedLoader, cache: &QueryCache<Pages>) -> Vec<String> {
        loader.view(cache).items().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_two_pages_flatten_in_order() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        assert_eq!(loader.status(), &FeedStatus::Idle);

        let first = loader.begin(&cache).unwrap();
        assert_eq!(first.cursor(), None);
        assert!(loader.view(&cache).is_loading());
        loader
            .complete(first, Ok::<_, local::Error>(page(&["a", "b"], Some("c1"))), &mut cache)
            .unwrap();
        let view = loader.view(&cache);
        assert!(!view.is_loading());
        assert!(view.has_next());
        assert_eq!(view.load_more_label(), Some("Carregar mais"));

        let second = loader.begin(&cache).unwrap();
        assert_eq!(second.cursor(), Some(&Cursor::new("c1")));
        let view = loader.view(&cache);
        assert!(view.is_fetching_next());
        assert!(!view.is_loading());
        assert!(view.has_next());
        assert_eq!(view.load_more_label(), Some("Carregando..."));
        loader
            .complete(second, Ok::<_, local::Error>(page(&["c"], None)), &mut cache)
            .unwrap();

        let view = loader.view(&cache);
        assert!(!view.has_next());
        assert_eq!(view.load_more_label(), None);
        assert_eq!(ids(&loader, &cache), ["a", "b", "c"]);
        assert_eq!(loader.begin(&cache), None);
    }

    #[test]
    fn test_first_page_failure_is_error_state() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        let request = loader.begin(&cache).unwrap();
        let error = loader
            .complete(request, Err(local::Error::Unavailable), &mut cache)
            .unwrap_err();
        assert!(matches!(error, local::Error::Unavailable));
        let view = loader.view(&cache);
        assert!(view.is_error());
        assert!(!view.is_loading());
        assert!(view.is_empty());

        let retry = loader.begin(&cache).unwrap();
        assert_eq!(retry.phase(), FetchPhase::First);
    }

    #[test]
    fn test_next_page_failure_keeps_items() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        let request = loader.begin(&cache).unwrap();
        loader
            .complete(request, Ok::<_, local::Error>(page(&["a"], Some("c1"))), &mut cache)
            .unwrap();
        let request = loader.begin(&cache).unwrap();
        loader
            .complete(request, Err(local::Error::Unavailable), &mut cache)
            .unwrap_err();

        assert!(matches!(
            loader.status(),
            FeedStatus::Failed {
                phase: FetchPhase::Next,
                ..
            }
        ));
        let view = loader.view(&cache);
        assert!(!view.is_error());
        assert!(view.has_next());
        assert_eq!(view.len(), 1);
        assert_eq!(
            loader.begin(&cache).unwrap().cursor(),
            Some(&Cursor::new("c1"))
        );
    }

    #[test]
    fn test_duplicate_requests_are_not_deduplicated() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        let request = loader.begin(&cache).unwrap();
        loader
            .complete(request, Ok::<_, local::Error>(page(&["a"], Some("c1"))), &mut cache)
            .unwrap();

        let once = loader.begin(&cache).unwrap();
        let twice = loader.begin(&cache).unwrap();
        assert_eq!(once, twice);
        loader
            .complete(once, Ok::<_, local::Error>(page(&["b"], None)), &mut cache)
            .unwrap();
        loader
            .complete(twice, Ok::<_, local::Error>(page(&["b"], None)), &mut cache)
            .unwrap();
        assert_eq!(ids(&loader, &cache), ["a", "b", "b"]);
    }

    #[test]
    fn test_continuation_after_invalidation_is_dropped() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        let request = loader.begin(&cache).unwrap();
        loader
            .complete(request, Ok::<_, local::Error>(page(&["a"], Some("c1"))), &mut cache)
            .unwrap();
        let request = loader.begin(&cache).unwrap();
        cache.invalidate(IMAGES_KEY);
        let outcome = loader
            .complete(request, Ok::<_, local::Error>(page(&["b"], None)), &mut cache)
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Discarded);
        assert!(!cache.contains(IMAGES_KEY));
        assert_eq!(loader.begin(&cache).unwrap().cursor(), None);
    }

    #[test]
    fn test_continuation_of_refetched_feed_is_dropped() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        let request = loader.begin(&cache).unwrap();
        loader
            .complete(request, Ok::<_, local::Error>(page(&["a"], Some("c1"))), &mut cache)
            .unwrap();
        let stale = loader.begin(&cache).unwrap();
        assert_eq!(stale.cursor(), Some(&Cursor::new("c1")));

        cache.invalidate(IMAGES_KEY);
        let first = loader.begin(&cache).unwrap();
        assert_eq!(first.phase(), FetchPhase::First);
        loader
            .complete(first, Ok::<_, local::Error>(page(&["new", "a"], Some("c2"))), &mut cache)
            .unwrap();

        let outcome = loader
            .complete(stale, Ok::<_, local::Error>(page(&["b"], None)), &mut cache)
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Discarded);
        assert_eq!(loader.status(), &FeedStatus::Loaded);
        assert_eq!(ids(&loader, &cache), ["new", "a"]);
        let view = loader.view(&cache);
        assert!(view.has_next());
        assert_eq!(view.load_more_label(), Some("Carregar mais"));
        assert_eq!(
            loader.begin(&cache).unwrap().cursor(),
            Some(&Cursor::new("c2"))
        );
    }

    #[test]
    fn test_failure_of_refetched_feed_continuation_keeps_status() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        let request = loader.begin(&cache).unwrap();
        loader
            .complete(request, Ok::<_, local::Error>(page(&["a"], Some("c1"))), &mut cache)
            .unwrap();
        let stale = loader.begin(&cache).unwrap();

        cache.invalidate(IMAGES_KEY);
        let first = loader.begin(&cache).unwrap();
        loader
            .complete(first, Ok::<_, local::Error>(page(&["new"], None)), &mut cache)
            .unwrap();

        loader
            .complete(stale, Err(local::Error::Unavailable), &mut cache)
            .unwrap_err();
        assert_eq!(loader.status(), &FeedStatus::Loaded);
        assert_eq!(ids(&loader, &cache), ["new"]);
    }

    #[test]
    fn test_older_first_page_does_not_replace_newer() {
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();
        let older = loader.begin(&cache).unwrap();
        let newer = loader.begin(&cache).unwrap();
        loader
            .complete(newer, Ok::<_, local::Error>(page(&["new"], Some("c2"))), &mut cache)
            .unwrap();
        let outcome = loader
            .complete(older, Ok::<_, local::Error>(page(&["old"], Some("c1"))), &mut cache)
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Discarded);
        assert_eq!(ids(&loader, &cache), ["new"]);
    }

    #[tokio::test]
    async fn test_load_until_exhausted() {
        let records = ["a", "b", "c", "d", "e"].map(record).to_vec();
        let api = local::Client::with_records(2, records);
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();

        let mut outcomes = Vec::new();
        loop {
            let outcome = loader.load_next_page(&api, &mut cache).await.unwrap();
            outcomes.push(outcome);
            if outcome == FetchOutcome::Exhausted {
                break;
            }
        }
        assert_eq!(
            outcomes,
            [
                FetchOutcome::Appended { items: 2 },
                FetchOutcome::Appended { items: 2 },
                FetchOutcome::Appended { items: 1 },
                FetchOutcome::Exhausted,
            ]
        );
        assert_eq!(api.fetch_count(), 3);
        assert_eq!(ids(&loader, &cache), ["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_read_serves_cache() {
        let api = local::Client::with_records(10, vec![record("a")]);
        let mut cache = QueryCache::new();
        let mut loader = FeedLoader::default();

        assert_eq!(loader.read(&api, &mut cache).await.unwrap().len(), 1);
        assert_eq!(loader.read(&api, &mut cache).await.unwrap().len(), 1);
        assert_eq!(api.fetch_count(), 1);

        cache.invalidate(IMAGES_KEY);
        assert_eq!(loader.read(&api, &mut cache).await.unwrap().len(), 1);
        assert_eq!(api.fetch_count(), 2);
    }
}
