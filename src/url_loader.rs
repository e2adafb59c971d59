//! A [ModelLoader] for URLs.
//!
//! Parsing a URL is cheap but not free, and the same handful of URLs tends to be requested over and over.  A
//! [UrlModel] parses itself at most once, and a [UrlLoader] with a [ModelCache] hands out the first instance it saw
//! of each equal model so that the parse is shared.
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use url::Url;

use crate::*;

pub const DEFAULT_MODEL_CACHE_CAPACITY: usize = 500;

/// A URL plus the headers to send with it.
///
/// Equality and hashing only look at the URL string and headers, never at whether it has been parsed yet.
#[derive(Clone, Debug)]
pub struct UrlModel {
    url: String,
    headers: Vec<(String, String)>,
    parsed: OnceCell<Url>,
}

impl UrlModel {
    pub fn new(url: impl Into<String>) -> UrlModel {
        UrlModel {
            url: url.into(),
            headers: vec![],
            parsed: OnceCell::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> UrlModel {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The parsed URL, parsing on first use.
    pub fn to_url(&self) -> Result<&Url, url::ParseError> {
        self.parsed.get_or_try_init(|| Url::parse(&self.url))
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    /// The identity of this model's data on disk.  Headers don't change which bytes a URL refers to, so they are
    /// left out.
    pub fn cache_key(&self) -> &str {
        &self.url
    }
}

impl PartialEq for UrlModel {
    fn eq(&self, other: &UrlModel) -> bool {
        self.url == other.url && self.headers == other.headers
    }
}

impl Eq for UrlModel {}

impl Hash for UrlModel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
        self.headers.hash(state);
    }
}

impl Key for UrlModel {
    fn update_disk_cache_key(&self, hasher: &mut Sha256) {
        hasher.update(self.cache_key().as_bytes());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError<E: std::error::Error + 'static> {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("fetch was cancelled")]
    Cancelled,
    #[error("transport failed: {0}")]
    Transport(#[source] E),
}

/// Fetches the bytes behind a [UrlModel] through a [Transport].
pub struct UrlFetcher<T> {
    model: Arc<UrlModel>,
    transport: Arc<T>,
    cancelled: AtomicBool,
}

impl<T: Transport> UrlFetcher<T> {
    pub fn model(&self) -> &Arc<UrlModel> {
        &self.model
    }
}

impl<T: Transport> DataFetcher for UrlFetcher<T> {
    type Data = T::Stream;
    type Error = FetchError<T::Error>;

    fn load_data(&self) -> Result<T::Stream, FetchError<T::Error>> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(FetchError::Cancelled);
        }
        let url = self.model.to_url()?;
        log::trace!("Opening {}", url);
        self.transport
            .open(url, self.model.headers())
            .map_err(FetchError::Transport)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn id(&self) -> String {
        self.model.cache_key().to_string()
    }
}

pub struct UrlLoader<T> {
    model_cache: Option<Arc<ModelCache<UrlModel, UrlModel>>>,
    transport: Arc<T>,
}

impl<T: Transport> UrlLoader<T> {
    /// A loader which parses every model it is given afresh.
    pub fn new(transport: Arc<T>) -> UrlLoader<T> {
        UrlLoader {
            model_cache: None,
            transport,
        }
    }

    pub fn with_model_cache(
        transport: Arc<T>,
        model_cache: Arc<ModelCache<UrlModel, UrlModel>>,
    ) -> UrlLoader<T> {
        UrlLoader {
            model_cache: Some(model_cache),
            transport,
        }
    }

    /// The shared instance equal to `model`, recording `model` itself as that instance if there isn't one yet.
    fn memoized(&self, model: &UrlModel, width: u32, height: u32) -> Arc<UrlModel> {
        let cache = match &self.model_cache {
            Some(c) => c,
            None => return Arc::new(model.clone()),
        };
        if let Some(m) = cache.get(model, width, height) {
            return m;
        }

        let own = Arc::new(model.clone());
        cache.put_shared(model.clone(), width, height, own.clone());
        own
    }
}

impl<T: Transport> ModelLoader<UrlModel> for UrlLoader<T> {
    type Fetcher = UrlFetcher<T>;

    fn data_fetcher(&self, model: &UrlModel, width: u32, height: u32) -> UrlFetcher<T> {
        UrlFetcher {
            model: self.memoized(model, width, height),
            transport: self.transport.clone(),
            cancelled: AtomicBool::new(false),
        }
    }
}

#[derive(Clone, Debug, derive_builder::Builder)]
pub struct UrlLoaderFactoryConfig {
    /// How many memoized models to keep.
    #[builder(default = "DEFAULT_MODEL_CACHE_CAPACITY")]
    pub model_cache_capacity: usize,
}

impl Default for UrlLoaderFactoryConfig {
    fn default() -> UrlLoaderFactoryConfig {
        UrlLoaderFactoryConfig {
            model_cache_capacity: DEFAULT_MODEL_CACHE_CAPACITY,
        }
    }
}

/// Builds [UrlLoader]s which all share one [ModelCache].
pub struct UrlLoaderFactory<T> {
    model_cache: Arc<ModelCache<UrlModel, UrlModel>>,
    transport: Arc<T>,
}

impl<T: Transport> UrlLoaderFactory<T> {
    pub fn new(transport: T, config: UrlLoaderFactoryConfig) -> UrlLoaderFactory<T> {
        UrlLoaderFactory {
            model_cache: Arc::new(ModelCache::new(config.model_cache_capacity)),
            transport: Arc::new(transport),
        }
    }

    pub fn model_cache(&self) -> &Arc<ModelCache<UrlModel, UrlModel>> {
        &self.model_cache
    }
}

impl<T: Transport> ModelLoaderFactory<UrlModel> for UrlLoaderFactory<T> {
    type Loader = UrlLoader<T>;

    fn build(&self) -> UrlLoader<T> {
        UrlLoader::with_model_cache(self.transport.clone(), self.model_cache.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Error as IoError, ErrorKind, Read};
    use std::sync::Mutex;

    use super::*;

    /// Serves bodies out of a map and records every request.
    #[derive(Default)]
    struct MapTransport {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MapTransport {
        fn with_body(mut self, url: &str, body: &str) -> MapTransport {
            self.bodies.insert(url.to_string(), body.as_bytes().to_vec());
            self
        }
    }

    impl Transport for MapTransport {
        type Stream = Cursor<Vec<u8>>;
        type Error = IoError;

        fn open(&self, url: &Url, headers: &[(String, String)]) -> Result<Cursor<Vec<u8>>, IoError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers.to_vec()));
            self.bodies
                .get(url.as_str())
                .cloned()
                .map(Cursor::new)
                .ok_or_else(|| IoError::new(ErrorKind::NotFound, "Entry not found"))
        }
    }

    const URL: &str = "https://example.com/a.png";

    fn factory(capacity: usize) -> UrlLoaderFactory<MapTransport> {
        let config = UrlLoaderFactoryConfigBuilder::default()
            .model_cache_capacity(capacity)
            .build()
            .expect("Should build");
        UrlLoaderFactory::new(MapTransport::default().with_body(URL, "png"), config)
    }

    #[test]
    fn test_default_capacity() {
        let config = UrlLoaderFactoryConfigBuilder::default().build().unwrap();
        assert_eq!(config.model_cache_capacity, 500);
        let f = UrlLoaderFactory::new(MapTransport::default(), UrlLoaderFactoryConfig::default());
        assert_eq!(f.model_cache().capacity(), DEFAULT_MODEL_CACHE_CAPACITY);
    }

    #[test]
    fn test_equal_models_share_one_instance() {
        let loader = factory(10).build();
        let first = loader.data_fetcher(&UrlModel::new(URL), 100, 100);
        let second = loader.data_fetcher(&UrlModel::new(URL), 100, 100);
        assert!(Arc::ptr_eq(first.model(), second.model()));

        // Parsing through one fetcher is visible through the other.
        first.load_data().unwrap();
        assert!(second.model().is_parsed());
    }

    #[test]
    fn test_different_sizes_are_memoized_separately() {
        let f = factory(10);
        let loader = f.build();
        let small = loader.data_fetcher(&UrlModel::new(URL), 10, 10);
        let large = loader.data_fetcher(&UrlModel::new(URL), 20, 20);
        assert!(!Arc::ptr_eq(small.model(), large.model()));
        assert_eq!(f.model_cache().len(), 2);
    }

    #[test]
    fn test_headers_are_part_of_model_identity() {
        let loader = factory(10).build();
        let plain = loader.data_fetcher(&UrlModel::new(URL), 0, 0);
        let authed = loader.data_fetcher(&UrlModel::new(URL).with_header("Authorization", "x"), 0, 0);
        assert!(!Arc::ptr_eq(plain.model(), authed.model()));
        assert_eq!(plain.id(), authed.id());
        assert_eq!(safe_key(&**plain.model()), safe_key(&**authed.model()));
    }

    #[test]
    fn test_loaders_from_one_factory_share_the_cache() {
        let f = factory(10);
        let a = f.build().data_fetcher(&UrlModel::new(URL), 1, 1);
        let b = f.build().data_fetcher(&UrlModel::new(URL), 1, 1);
        assert!(Arc::ptr_eq(a.model(), b.model()));
    }

    #[test]
    fn test_loader_without_cache() {
        let transport = Arc::new(MapTransport::default().with_body(URL, "png"));
        let loader = UrlLoader::new(transport);
        let a = loader.data_fetcher(&UrlModel::new(URL), 1, 1);
        let b = loader.data_fetcher(&UrlModel::new(URL), 1, 1);
        assert!(!Arc::ptr_eq(a.model(), b.model()));
        assert!(loader.handles(&UrlModel::new(URL)));
    }

    #[test]
    fn test_load_data_sends_headers() {
        let f = factory(10);
        let fetcher = f
            .build()
            .data_fetcher(&UrlModel::new(URL).with_header("Accept", "image/png"), 1, 1);
        let mut body = String::new();
        fetcher.load_data().unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "png");
        assert_eq!(fetcher.id(), URL);

        let requests = f.transport.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![(URL.to_string(), vec![("Accept".to_string(), "image/png".to_string())])]
        );
    }

    #[test]
    fn test_fetch_errors() {
        let loader = factory(10).build();

        let bad = loader.data_fetcher(&UrlModel::new("not a url"), 1, 1);
        assert!(matches!(bad.load_data(), Err(FetchError::InvalidUrl(_))));

        let missing = loader.data_fetcher(&UrlModel::new("https://example.com/missing"), 1, 1);
        assert!(matches!(missing.load_data(), Err(FetchError::Transport(_))));

        let cancelled = loader.data_fetcher(&UrlModel::new(URL), 1, 1);
        cancelled.cancel();
        assert!(matches!(cancelled.load_data(), Err(FetchError::Cancelled)));
        cancelled.cleanup();
    }

    #[test]
    fn test_teardown_keeps_built_loaders_usable() {
        let mut f = factory(10);
        let loader = f.build();
        f.teardown();
        assert!(loader.data_fetcher(&UrlModel::new(URL), 1, 1).load_data().is_ok());
    }
}
