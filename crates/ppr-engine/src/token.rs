//! Opaque resumption tokens.
//!
//! A token is a pure function of the phase-1 render: the owning route
//! pattern plus the recorded state of every postponed region. It carries no
//! request-specific input, so one token embedded in a cached shell can be
//! resumed concurrently by many requests with different inputs.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::page::DynamicPart;

/// Recorded state of a single postponed region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRegion {
    /// Region identifier.
    pub id: String,
    /// Dynamic output to evaluate at resume time.
    pub parts: Vec<DynamicPart>,
}

/// The decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TokenPayload {
    /// Owning route pattern, used to validate region ids at resume time.
    pub route: String,
    /// Postponed regions in document order.
    pub regions: Vec<RecordedRegion>,
}

/// Opaque, serializable capture of postponed render state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeToken(String);

impl ResumeToken {
    pub(crate) fn seal(payload: &TokenPayload) -> Result<Self, EngineError> {
        let json =
            serde_json::to_vec(payload).map_err(|e| EngineError::Encoding(e.to_string()))?;
        Ok(Self(URL_SAFE_NO_PAD.encode(json)))
    }

    pub(crate) fn open(&self) -> Result<TokenPayload, EngineError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .map_err(|_| EngineError::InvalidToken)?;
        serde_json::from_slice(&bytes).map_err(|_| EngineError::InvalidToken)
    }

    /// The encoded token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a token from its encoded form (e.g. from a client).
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }
}

impl std::fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
