// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory fetcher for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::fetcher::{HttpFetcher, HttpRequest, HttpResponse};
use crate::errors::FetchError;

#[derive(Default)]
pub(crate) struct FakeFetcher {
    responses: Mutex<HashMap<String, HttpResponse>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_response(self, url: &str, response: HttpResponse) -> Self {
        self.set_response(url, response);
        self
    }

    pub(crate) fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
        self
    }

    pub(crate) fn set_response(&self, url: &str, response: HttpResponse) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub(crate) fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub(crate) fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpFetcher for FakeFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let url = request.url.to_string();
        self.requests.lock().unwrap().push(url.clone());
        let delay = self.delays.lock().unwrap().get(&url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&url) {
            return Err(FetchError::Transport {
                url,
                reason: "connection refused".to_string(),
            });
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(HttpResponse::not_found))
    }
}
