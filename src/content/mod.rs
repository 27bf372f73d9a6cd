//! Lab content lookup.
//!
//! The content API exposes, per account, a read-only hierarchy of
//! laboratories → modules → challenges. Each level carries an internal
//! `name` and a human-readable `displayName`.
//!
//! # Architecture
//!
//! - [`ContentSource`]: lookup trait used by the tool handlers
//! - [`ContentApiClient`]: HTTP implementation over `GET /api/users/content/{id}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LookupError;

/// The full lab hierarchy of one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabHierarchy {
    /// Laboratories in the order the API returns them.
    #[serde(default)]
    pub laboratories: Vec<Laboratory>,
}

impl LabHierarchy {
    /// All laboratories whose internal name matches exactly.
    pub fn labs_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Laboratory> + 'a {
        self.laboratories.iter().filter(move |lab| lab.name == name)
    }

    /// First laboratory with the given display name.
    #[must_use]
    pub fn lab_by_display_name(&self, display_name: &str) -> Option<&Laboratory> {
        self.laboratories
            .iter()
            .find(|lab| lab.display_name == display_name)
    }
}

/// A laboratory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Laboratory {
    /// Internal identifier.
    pub name: String,
    /// Human-readable label.
    pub display_name: String,
    /// Modules, in course order.
    #[serde(default)]
    pub modules: Vec<LabModule>,
}

impl Laboratory {
    /// First module with the given display name.
    #[must_use]
    pub fn module_by_display_name(&self, display_name: &str) -> Option<&LabModule> {
        self.modules
            .iter()
            .find(|module| module.display_name == display_name)
    }
}

/// A module inside a laboratory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabModule {
    /// Human-readable label.
    pub display_name: String,
    /// Challenges, in course order.
    #[serde(default)]
    pub challenges: Vec<Challenge>,
}

/// A single challenge (unit) of a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Challenge name.
    pub name: String,
}

/// Response envelope of the content endpoint.
#[derive(Debug, Deserialize)]
struct ContentEnvelope {
    data: LabHierarchy,
}

/// Source of lab hierarchies.
#[async_trait]
pub trait ContentSource: Send + Sync + std::fmt::Debug {
    /// Fetch the hierarchy for an account. Never cached.
    async fn fetch_hierarchy(&self, account_id: &str) -> Result<LabHierarchy, LookupError>;
}

/// HTTP client for the content API.
#[derive(Debug, Clone)]
pub struct ContentApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ContentApiClient {
    /// Create a client rooted at `base_url` (e.g. `https://host/app`).
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    /// `{base}/api/users/content/{account_id}`, with the account id
    /// percent-encoded as a single path segment.
    fn content_url(&self, account_id: &str) -> Result<Url, LookupError> {
        let mut endpoint = self.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(["api", "users", "content", account_id]);
        Ok(endpoint)
    }
}

#[async_trait]
impl ContentSource for ContentApiClient {
    async fn fetch_hierarchy(&self, account_id: &str) -> Result<LabHierarchy, LookupError> {
        let url = self.content_url(account_id)?;
        tracing::debug!(account_id = %account_id, url = %url, "Fetching lab hierarchy");

        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(account_id.to_string()));
        }
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await?;
        let envelope: ContentEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| LookupError::InvalidShape(e.to_string()))?;

        tracing::debug!(
            account_id = %account_id,
            lab_count = envelope.data.laboratories.len(),
            "Lab hierarchy fetched"
        );
        Ok(envelope.data)
    }
}
