//! Fetching a peer's published document.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::Document;

/// Retrieves the document a peer publishes.
pub trait PeerFetcher: Send + Sync {
    /// Fetch and parse the document at `url`.
    ///
    /// Either on-disk encoding is accepted.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Document>> + Send;
}

/// Fetches over HTTP(S) with an upper bound on each request.
pub struct HttpPeerFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPeerFetcher {
    /// Create a fetcher with a default client.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    /// Create a fetcher around an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| Error::PeerNetwork {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::PeerStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| Error::PeerNetwork {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

impl PeerFetcher for HttpPeerFetcher {
    async fn fetch(&self, url: &str) -> Result<Document> {
        debug!(%url, "Fetching peer document");

        let text = tokio::time::timeout(self.timeout, self.fetch_text(url))
            .await
            .map_err(|_| Error::PeerTimeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            })??;

        Document::parse_feed(&text).map_err(|e| Error::PeerPayload {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and return the URL to request.
    async fn serve_once(response: Option<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            match response {
                Some(response) => {
                    socket.write_all(response.as_bytes()).await.unwrap();
                    let _ = socket.shutdown().await;
                }
                None => tokio::time::sleep(Duration::from_secs(30)).await,
            }
        });
        format!("http://{addr}/alice/cmds/main/data.json")
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn fetcher(timeout: Duration) -> HttpPeerFetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpPeerFetcher::with_client(client, timeout)
    }

    #[tokio::test]
    async fn test_fetch_accepts_legacy_array() {
        let url = serve_once(Some(http_response(
            "200 OK",
            r#"[{"id":"1","type":"commands","name":"ls","content":"ls -la"}]"#,
        )))
        .await;
        let doc = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap();
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].name, "ls");
    }

    #[tokio::test]
    async fn test_fetch_keeps_usable_entries() {
        let url = serve_once(Some(http_response(
            "200 OK",
            r#"{"items":[{"id":"1","name":"ls","content":"ls"},{"id":[1],"name":"bad"},{"id":"2","name":"du","content":"du -sh"}]}"#,
        )))
        .await;
        let doc = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap();
        let ids: Vec<&str> = doc.items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let url = serve_once(Some(http_response("404 Not Found", "404: Not Found"))).await;
        let err = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::PeerStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_malformed_payload() {
        let url = serve_once(Some(http_response("200 OK", "<html>nope</html>"))).await;
        let err = fetcher(Duration::from_secs(5)).fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::PeerPayload { .. }));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let url = serve_once(None).await;
        let err = fetcher(Duration::from_millis(200)).fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::PeerTimeout { .. }));
        assert!(err.is_peer_failure());
    }
}
