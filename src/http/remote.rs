// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::fetcher::{HttpFetcher, HttpMethod, HttpRequest, HttpResponse};
use crate::config::FetchConfig;
use crate::errors::FetchError;

/// Fetches over the network with `reqwest`.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: reqwest::Client,
    max_object_size: usize,
}

impl RemoteFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| FetchError::Transport {
                url: String::new(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            max_object_size: config.max_object_size,
        })
    }
}

#[async_trait]
impl HttpFetcher for RemoteFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let url = request.url.as_str();
        let transport = |err: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        };

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url).body(request.body.clone()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder.send().await.map_err(transport)?;
        if response
            .content_length()
            .is_some_and(|len| len as usize > self.max_object_size)
        {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_object_size,
            });
        }

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport)? {
            if body.len() + chunk.len() > self.max_object_size {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    limit: self.max_object_size,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    /// Serves one chunked response of `chunks` chunks of `chunk_size` bytes
    /// with no `Content-Length`.
    async fn chunked_server(chunks: usize, chunk_size: usize) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let chunk = format!("{:x}\r\n{}\r\n", chunk_size, "a".repeat(chunk_size));
            for _ in 0..chunks {
                if socket.write_all(chunk.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        });
        Url::parse(&format!("http://{addr}/body")).unwrap()
    }

    fn fetcher(max_object_size: usize) -> RemoteFetcher {
        RemoteFetcher::new(&FetchConfig {
            timeout_seconds: 5,
            max_object_size,
            ..FetchConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn chunked_body_over_limit_is_rejected_while_streaming() {
        let url = chunked_server(64, 1024).await;
        let err = fetcher(4096).fetch(&HttpRequest::get(url)).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { limit: 4096, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn chunked_body_within_limit_is_collected() {
        let url = chunked_server(3, 100).await;
        let response = fetcher(4096).fetch(&HttpRequest::get(url)).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body.len(), 300);
    }
}
