//! Stream transports: where the raw `text/event-stream` bytes come from.

use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use crate::types::ClientError;

/// Raw body chunks of an open stream.  Chunk boundaries are arbitrary.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// Opens a fresh stream each time the client connects.
///
/// The returned stream ending (or yielding `Err`) is treated as a transport
/// failure and feeds the reconnect policy.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self) -> Result<ChunkStream, ClientError>;

    /// Short description for logs.
    fn describe(&self) -> String {
        "custom transport".into()
    }
}

/// HTTP `GET` transport built on `reqwest`.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open(&self) -> Result<ChunkStream, ClientError> {
        let response = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "unexpected status {status} from {}",
                self.url
            )));
        }

        let stream = async_stream::stream! {
            let mut response = response;
            loop {
                match response.chunk().await {
                    Ok(Some(bytes)) => yield Ok(bytes.to_vec()),
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(ClientError::from(e));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
