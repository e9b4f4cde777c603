// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Visitors that fetch referenced images to learn their real size.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use url::Url;

use super::uri::RewriteContext;
use super::visitor::{DomVisitor, VisitStatus};
use crate::errors::GadgetError;
use crate::http::{HttpFetcher, HttpRequest};
use crate::markup::{Document, NodeId};
use crate::observability::messages::fetch::BackgroundFetchFailed;
use crate::observability::messages::StructuredLog;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Reads the pixel size from a PNG, GIF or JPEG header.
pub fn image_size(bytes: &[u8]) -> Option<ImageSize> {
    if bytes.starts_with(PNG_SIGNATURE) {
        if bytes.len() < 24 || &bytes[12..16] != b"IHDR" {
            return None;
        }
        let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
        let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
        return Some(ImageSize { width, height });
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        if bytes.len() < 10 {
            return None;
        }
        let width = u16::from_le_bytes([bytes[6], bytes[7]]) as u32;
        let height = u16::from_le_bytes([bytes[8], bytes[9]]) as u32;
        return Some(ImageSize { width, height });
    }
    if bytes.starts_with(&[0xff, 0xd8]) {
        return jpeg_size(bytes);
    }
    None
}

fn jpeg_size(bytes: &[u8]) -> Option<ImageSize> {
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xff {
            return None;
        }
        let marker = bytes[pos + 1];
        if marker == 0xff {
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        // SOF0..SOF15 except DHT, JPG and DAC
        if (0xc0..=0xcf).contains(&marker) && !matches!(marker, 0xc4 | 0xc8 | 0xcc) {
            if pos + 9 > bytes.len() {
                return None;
            }
            let height = u16::from_be_bytes([bytes[pos + 5], bytes[pos + 6]]) as u32;
            let width = u16::from_be_bytes([bytes[pos + 7], bytes[pos + 8]]) as u32;
            return Some(ImageSize { width, height });
        }
        if length < 2 {
            return None;
        }
        pos += 2 + length;
    }
    None
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    value?.trim().trim_end_matches("px").parse().ok()
}

/// Fetches every image and returns the sizes that could be read, in order.
/// Failures are logged and yield `None`.
async fn fetch_sizes(fetcher: &dyn HttpFetcher, urls: &[Url], ignore_cache: bool) -> Vec<Option<ImageSize>> {
    let requests: Vec<HttpRequest> = urls
        .iter()
        .map(|url| HttpRequest::get(url.clone()).with_ignore_cache(ignore_cache))
        .collect();
    let responses = join_all(requests.iter().map(|request| fetcher.fetch(request))).await;

    urls.iter()
        .zip(responses)
        .map(|(url, response)| {
            let reason = match response {
                Ok(response) if response.is_ok() => match image_size(&response.body) {
                    Some(size) => return Some(size),
                    None => "unrecognized image format".to_string(),
                },
                Ok(response) => format!("status {}", response.status),
                Err(err) => err.to_string(),
            };
            BackgroundFetchFailed {
                url: url.as_str(),
                reason: &reason,
            }
            .log();
            None
        })
        .collect()
}

/// Adds explicit `width`/`height` styling to images that declare neither,
/// so the page does not reflow as they load.
pub struct ImageAttributeVisitor {
    context: Arc<RewriteContext>,
    fetcher: Arc<dyn HttpFetcher>,
    ignore_cache: bool,
}

impl ImageAttributeVisitor {
    pub fn new(context: Arc<RewriteContext>, fetcher: Arc<dyn HttpFetcher>, ignore_cache: bool) -> Self {
        Self {
            context,
            fetcher,
            ignore_cache,
        }
    }

    fn candidate(&self, doc: &Document, node: NodeId) -> Option<Url> {
        if doc.name(node) != Some("img")
            || !self.context.feature().should_rewrite_tag("img")
            || doc.has_attr(node, "width")
            || doc.has_attr(node, "height")
        {
            return None;
        }
        self.context.rewritable(doc.attr(node, "src")?)
    }
}

#[async_trait]
impl DomVisitor for ImageAttributeVisitor {
    fn name(&self) -> &'static str {
        "image-attributes"
    }

    fn visit(&mut self, doc: &mut Document, node: NodeId) -> VisitStatus {
        if self.candidate(doc, node).is_some() {
            VisitStatus::ReserveNode
        } else {
            VisitStatus::Bypass
        }
    }

    async fn revisit(&mut self, doc: &mut Document, nodes: Vec<NodeId>) -> Result<bool, GadgetError> {
        let targets: Vec<(NodeId, Url)> = nodes
            .into_iter()
            .filter_map(|node| self.candidate(doc, node).map(|url| (node, url)))
            .collect();
        let urls: Vec<Url> = targets.iter().map(|(_, url)| url.clone()).collect();
        let sizes = fetch_sizes(self.fetcher.as_ref(), &urls, self.ignore_cache).await;

        let mut modified = false;
        for ((node, _), size) in targets.into_iter().zip(sizes) {
            let Some(size) = size else { continue };
            let mut style = doc.attr(node, "style").unwrap_or_default().trim().to_string();
            if !style.is_empty() && !style.ends_with(';') {
                style.push(';');
            }
            style.push_str(&format!("width:{}px;height:{}px;", size.width, size.height));
            doc.set_attr(node, "style", &style);
            modified = true;
        }
        Ok(modified)
    }
}

/// Sends images displayed smaller than their real size through the proxy's
/// resize option, so the client downloads only the pixels it shows.
pub struct ImageResizeVisitor {
    context: Arc<RewriteContext>,
    fetcher: Arc<dyn HttpFetcher>,
    ignore_cache: bool,
}

impl ImageResizeVisitor {
    pub fn new(context: Arc<RewriteContext>, fetcher: Arc<dyn HttpFetcher>, ignore_cache: bool) -> Self {
        Self {
            context,
            fetcher,
            ignore_cache,
        }
    }

    fn candidate(&self, doc: &Document, node: NodeId) -> Option<(Url, Option<u32>, Option<u32>)> {
        if doc.name(node) != Some("img") || !self.context.feature().should_rewrite_tag("img") {
            return None;
        }
        let width = parse_dimension(doc.attr(node, "width"));
        let height = parse_dimension(doc.attr(node, "height"));
        if width.is_none() && height.is_none() {
            return None;
        }
        let url = self.context.rewritable(doc.attr(node, "src")?)?;
        Some((url, width, height))
    }
}

/// The size to request from the proxy, or `None` when the declared size is
/// not smaller than the real one. A missing dimension keeps the aspect ratio.
fn resize_target(real: ImageSize, width: Option<u32>, height: Option<u32>) -> Option<ImageSize> {
    if real.width == 0 || real.height == 0 {
        return None;
    }
    let (width, height) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, u32::try_from(w as u64 * real.height as u64 / real.width as u64).ok()?),
        (None, Some(h)) => (u32::try_from(h as u64 * real.width as u64 / real.height as u64).ok()?, h),
        (None, None) => return None,
    };
    if width == 0 || height == 0 || (width >= real.width && height >= real.height) {
        return None;
    }
    Some(ImageSize { width, height })
}

#[async_trait]
impl DomVisitor for ImageResizeVisitor {
    fn name(&self) -> &'static str {
        "image-resize"
    }

    fn visit(&mut self, doc: &mut Document, node: NodeId) -> VisitStatus {
        if self.candidate(doc, node).is_some() {
            VisitStatus::ReserveNode
        } else {
            VisitStatus::Bypass
        }
    }

    async fn revisit(&mut self, doc: &mut Document, nodes: Vec<NodeId>) -> Result<bool, GadgetError> {
        let targets: Vec<(NodeId, (Url, Option<u32>, Option<u32>))> = nodes
            .into_iter()
            .filter_map(|node| self.candidate(doc, node).map(|found| (node, found)))
            .collect();
        let urls: Vec<Url> = targets.iter().map(|(_, (url, _, _))| url.clone()).collect();
        let sizes = fetch_sizes(self.fetcher.as_ref(), &urls, self.ignore_cache).await;

        let mut modified = false;
        for ((node, (url, width, height)), size) in targets.into_iter().zip(sizes) {
            let Some(target) = size.and_then(|real| resize_target(real, width, height)) else {
                continue;
            };
            let resize_w = target.width.to_string();
            let resize_h = target.height.to_string();
            let proxied = self
                .context
                .proxy_url_with(&url, &[("resize_w", &resize_w), ("resize_h", &resize_h)]);
            doc.set_attr(node, "src", &proxied);
            modified = true;
        }
        Ok(modified)
    }
}
