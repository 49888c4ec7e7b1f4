//! Construction time settings for a [crate::Client].
use std::sync::Arc;

use crate::rpc::endpoints::DEFAULT_ENDPOINTS;
use crate::rpc::Frame;
use crate::transport::TransportError;

pub const DEFAULT_URL: &str = "wss://api_apexqa.alphapoint.com/WSGateway/";

type Hook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&TransportError) + Send + Sync>;
type FrameHook = Arc<dyn Fn(Frame) + Send + Sync>;

/// Settings for one connection.
///
/// ```rust
/// let config = apex::Config::new("ws://localhost:8080/WSGateway/")
///     .debug(true)
///     .on_open(|| println!("connected"));
/// assert!(config.is_debug());
/// ```
#[derive(Clone)]
pub struct Config {
    pub(crate) url: String,
    pub(crate) debug: bool,
    pub(crate) endpoints: Vec<String>,
    pub(crate) on_open: Hook,
    pub(crate) on_close: Hook,
    pub(crate) on_error: ErrorHook,
    pub(crate) default_continuation: FrameHook,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            debug: false,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|name| name.to_string()).collect(),
            on_open: Arc::new(|| {}),
            on_close: Arc::new(|| {}),
            on_error: Arc::new(|_| {}),
            default_continuation: Arc::new(|_| {}),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("debug", &self.debug)
            .field("endpoints", &self.endpoints.len())
            .finish()
    }
}

impl Config {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Log every frame sent and received.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Replace the list of endpoint names that get a generated method.
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    pub fn on_open(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Arc::new(hook);
        self
    }

    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Arc::new(hook);
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(hook);
        self
    }

    /// Continuation used by [crate::Client::call] for responses.
    pub fn default_continuation(mut self, hook: impl Fn(Frame) + Send + Sync + 'static) -> Self {
        self.default_continuation = Arc::new(hook);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn endpoint_names(&self) -> &[String] {
        &self.endpoints
    }
}
