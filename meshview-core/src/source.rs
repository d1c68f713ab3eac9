/// Byte transports for model files: local files and HTTP
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::error::TransportError;

const READ_CHUNK: usize = 64 * 1024;

/// Called after every received chunk with (bytes so far, declared total).
pub type ChunkCallback<'a> = &'a mut (dyn FnMut(u64, Option<u64>) + Send);

/// Something that can fetch the bytes behind a resource locator
pub trait ByteSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        on_chunk: ChunkCallback<'a>,
    ) -> BoxFuture<'a, Result<Vec<u8>, TransportError>>;
}

/// Reads files from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileSource;

impl FileSource {
    fn path_of(locator: &str) -> PathBuf {
        PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator))
    }

    async fn read(path: &Path, on_chunk: ChunkCallback<'_>) -> Result<Vec<u8>, TransportError> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransportError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                TransportError::Io(e)
            }
        })?;
        let total = file.metadata().await?.len();

        let mut data = Vec::with_capacity(total as usize);
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = file.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&chunk[..n]);
            on_chunk(data.len() as u64, Some(total));
        }
        Ok(data)
    }
}

impl ByteSource for FileSource {
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        on_chunk: ChunkCallback<'a>,
    ) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        async move {
            let path = Self::path_of(locator);
            Self::read(&path, on_chunk).await
        }
        .boxed()
    }
}

/// Streams response bodies over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ByteSource for HttpSource {
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        on_chunk: ChunkCallback<'a>,
    ) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        async move {
            let response = self.client.get(locator).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    url: locator.to_string(),
                    status: status.as_u16(),
                });
            }

            let total = response.content_length();
            let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                data.extend_from_slice(&chunk?);
                on_chunk(data.len() as u64, total);
            }
            Ok(data)
        }
        .boxed()
    }
}

/// Dispatches `http://` and `https://` locators to HTTP and the rest to files
#[derive(Debug, Clone, Default)]
pub struct SourceRouter {
    file: FileSource,
    http: HttpSource,
}

impl SourceRouter {
    pub fn new(http: HttpSource) -> Self {
        Self {
            file: FileSource,
            http,
        }
    }
}

fn is_http(locator: &str) -> bool {
    let lower = locator.get(..8).unwrap_or(locator).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

impl ByteSource for SourceRouter {
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        on_chunk: ChunkCallback<'a>,
    ) -> BoxFuture<'a, Result<Vec<u8>, TransportError>> {
        if is_http(locator) {
            self.http.fetch(locator, on_chunk)
        } else {
            self.file.fetch(locator, on_chunk)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing() {
        assert!(is_http("http://localhost:8000/media/a.stl"));
        assert!(is_http("HTTPS://cdn.example.com/a.obj"));
        assert!(!is_http("/tmp/a.stl"));
        assert!(!is_http("file:///tmp/a.stl"));
        assert!(!is_http("h"));
    }

    #[tokio::test]
    async fn test_file_source_reports_progress() {
        let path = std::env::temp_dir().join(format!("meshview-source-{}.bin", std::process::id()));
        let payload = vec![7u8; READ_CHUNK * 2 + 10];
        std::fs::write(&path, &payload).unwrap();

        let mut seen = Vec::new();
        let mut record = |loaded: u64, total: Option<u64>| seen.push((loaded, total));
        let data = FileSource
            .fetch(path.to_str().unwrap(), &mut record)
            .await
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(data, payload);
        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(seen.last(), Some(&(payload.len() as u64, Some(payload.len() as u64))));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let mut ignore = |_: u64, _: Option<u64>| {};
        let err = FileSource
            .fetch("/definitely/not/here.stl", &mut ignore)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotFound { .. }));
    }
}
