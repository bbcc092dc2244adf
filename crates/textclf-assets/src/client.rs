//! Byte-level access to assets named by a [`Location`].

use std::path::PathBuf;

use textclf_core::{ClassifyError, Location, Preprocessing};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("cannot fetch {0}: built without HTTP support")]
    HttpDisabled(String),
}

/// Fetches asset bytes from the filesystem or over HTTP.
#[derive(Clone, Default)]
pub struct AssetClient {
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl AssetClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the whole asset into memory.
    pub async fn fetch(&self, location: &Location) -> Result<Vec<u8>, AssetError> {
        match location {
            Location::Path(path) => {
                debug!(path = %path.display(), "reading asset");
                tokio::fs::read(path).await.map_err(|source| AssetError::Io {
                    path: path.clone(),
                    source,
                })
            }
            Location::Url(url) => self.fetch_url(url).await,
        }
    }

    #[cfg(feature = "http")]
    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        info!(url, "fetching asset");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AssetError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        info!(url, bytes = bytes.len(), "fetched asset");
        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "http"))]
    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        info!(url, "URL asset requested without HTTP support");
        Err(AssetError::HttpDisabled(url.to_string()))
    }

    /// Fetch and parse preprocessing tables.
    ///
    /// With no `scaler` location the vocabulary file must be a bundle that
    /// also carries `mean` and `scale`. Any fetch or parse failure is a
    /// [`ClassifyError::MissingResource`].
    pub async fn load_preprocessing(
        &self,
        vocab: &Location,
        scaler: Option<&Location>,
    ) -> Result<Preprocessing, ClassifyError> {
        let vocab_bytes = self
            .fetch(vocab)
            .await
            .map_err(|e| ClassifyError::MissingResource(e.to_string()))?;

        let scaler_bytes = match scaler {
            Some(loc) => Some(
                self.fetch(loc)
                    .await
                    .map_err(|e| ClassifyError::MissingResource(e.to_string()))?,
            ),
            None => None,
        };

        Preprocessing::from_json(&vocab_bytes, scaler_bytes.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.json");
        std::fs::write(&path, b"{}").unwrap();

        let bytes = AssetClient::new().fetch(&Location::Path(path)).await.unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[tokio::test]
    async fn missing_local_file_is_io_error() {
        let err = AssetClient::new()
            .fetch(&Location::from("/nonexistent/vocab.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[tokio::test]
    async fn load_separate_tables() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("vocab.json");
        let scaler = dir.path().join("scaler.json");
        std::fs::write(&vocab, br#"{"vocab": {"free": 0, "win": 1}, "idf": [2.0, 3.0]}"#).unwrap();
        std::fs::write(&scaler, br#"{"mean": [0.0, 0.0], "scale": [1.0, 1.0]}"#).unwrap();

        let tables = AssetClient::new()
            .load_preprocessing(&Location::Path(vocab), Some(&Location::Path(scaler)))
            .await
            .unwrap();
        assert_eq!(tables.dim(), 2);
        assert!(tables.scaler().is_some());
    }

    #[tokio::test]
    async fn missing_scaler_file_is_missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("vocab.json");
        std::fs::write(&vocab, br#"{"vocab": {"a": 0}}"#).unwrap();

        let err = AssetClient::new()
            .load_preprocessing(
                &Location::Path(vocab),
                Some(&Location::Path(dir.path().join("absent.json"))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::MissingResource(_)));
    }

    #[cfg(not(feature = "http"))]
    #[tokio::test]
    async fn url_without_http_support() {
        let err = AssetClient::new()
            .fetch(&Location::from("https://example.org/model.onnx"))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::HttpDisabled(_)));
    }

    #[cfg(feature = "http")]
    mod http {
        use super::*;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        /// Serve one canned HTTP response on a local port.
        async fn serve_once(response: &'static [u8]) -> String {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut sock, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                sock.write_all(response).await.unwrap();
                sock.shutdown().await.ok();
            });
            format!("http://{addr}/asset.json")
        }

        #[tokio::test]
        async fn fetch_url_ok() {
            let url = serve_once(
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
            )
            .await;
            let bytes = AssetClient::new().fetch(&Location::from(url)).await.unwrap();
            assert_eq!(bytes, b"{}");
        }

        #[tokio::test]
        async fn fetch_url_server_error() {
            let url = serve_once(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 7\r\nConnection: close\r\n\r\nmissing",
            )
            .await;
            let err = AssetClient::new().fetch(&Location::from(url)).await.unwrap_err();
            match err {
                AssetError::Server { status, body } => {
                    assert_eq!(status, 404);
                    assert_eq!(body, "missing");
                }
                other => panic!("expected server error, got {other:?}"),
            }
        }
    }
}
