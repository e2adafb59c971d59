//! The boundary between models and the raw data behind them.
//!
//! A [ModelLoader] turns a model, such as a URL, into a [DataFetcher] which can later produce the model's bytes.
//! Loaders are built by a [ModelLoaderFactory], which is where state shared between loaders (such as a
//! [ModelCache](crate::ModelCache)) lives.
use std::io::Read;

use url::Url;

/// Lazily produces the data for one model.
pub trait DataFetcher: Send {
    type Data;
    type Error: std::error::Error;

    /// Fetch the data.  This may block on I/O.
    fn load_data(&self) -> Result<Self::Data, Self::Error>;

    /// Release anything opened by `load_data`.
    fn cleanup(&self) {}

    /// Ask an upcoming or in-progress `load_data` to give up.  Best effort.
    fn cancel(&self) {}

    /// A string uniquely identifying the data this fetcher produces.
    fn id(&self) -> String;
}

pub trait ModelLoader<M> {
    type Fetcher: DataFetcher;

    fn data_fetcher(&self, model: &M, width: u32, height: u32) -> Self::Fetcher;

    /// Whether this loader knows what to do with `model` at all.
    fn handles(&self, _model: &M) -> bool {
        true
    }
}

pub trait ModelLoaderFactory<M> {
    type Loader: ModelLoader<M>;

    fn build(&self) -> Self::Loader;

    /// Release anything held by the factory.  Loaders already built stay usable.
    fn teardown(&mut self) {}
}

/// Opens a stream over the bytes behind a URL, for example with an HTTP client.
pub trait Transport: Send + Sync + 'static {
    type Stream: Read + Send;
    type Error: std::error::Error + 'static;

    fn open(&self, url: &Url, headers: &[(String, String)]) -> Result<Self::Stream, Self::Error>;
}
