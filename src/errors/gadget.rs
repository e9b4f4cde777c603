// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The single domain error raised while fetching, parsing and rendering gadgets.

use std::fmt;
use thiserror::Error;

use super::{ConfigError, ContentError, FetchError, MarkupError, RegistryError};

/// Enumerated failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FailedToRetrieveContent,
    MalformedXmlDocument,
    UnsupportedFeature,
    BlacklistedGadget,
    InvalidConfig,
    MissingParameter,
    InvalidParameter,
    UnknownView,
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FailedToRetrieveContent => "FAILED_TO_RETRIEVE_CONTENT",
            ErrorCode::MalformedXmlDocument => "MALFORMED_XML_DOCUMENT",
            ErrorCode::UnsupportedFeature => "UNSUPPORTED_FEATURE",
            ErrorCode::BlacklistedGadget => "BLACKLISTED_GADGET",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::MissingParameter => "MISSING_PARAMETER",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::UnknownView => "UNKNOWN_VIEW",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct GadgetError {
    pub code: ErrorCode,
    pub message: String,
}

impl GadgetError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedXmlDocument, message)
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FailedToRetrieveContent, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }
}

impl From<MarkupError> for GadgetError {
    fn from(err: MarkupError) -> Self {
        GadgetError::malformed(err.to_string())
    }
}

impl From<FetchError> for GadgetError {
    fn from(err: FetchError) -> Self {
        GadgetError::retrieval(err.to_string())
    }
}

impl From<ConfigError> for GadgetError {
    fn from(err: ConfigError) -> Self {
        GadgetError::new(ErrorCode::InvalidConfig, err.to_string())
    }
}

impl From<RegistryError> for GadgetError {
    fn from(err: RegistryError) -> Self {
        GadgetError::new(ErrorCode::InvalidConfig, err.to_string())
    }
}

impl From<ContentError> for GadgetError {
    fn from(err: ContentError) -> Self {
        GadgetError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = GadgetError::new(ErrorCode::UnsupportedFeature, "missing: tabs");
        assert_eq!(err.to_string(), "UNSUPPORTED_FEATURE: missing: tabs");
    }

    #[test]
    fn markup_errors_map_to_malformed_xml() {
        let err: GadgetError = MarkupError::Empty.into();
        assert_eq!(err.code, ErrorCode::MalformedXmlDocument);
    }
}
