//! MusicBrainz lookup used to pre-fill album and year before export.
//!
//! The lookup is best-effort: it never runs as part of an export and a
//! failure only leaves the fields empty.
//!
//! ## API Endpoints
//!
//! - **Recording search**: `/ws/2/recording/?query=artist:{a} AND recording:{t}&fmt=json`
//! - **Release details**: `/ws/2/release/{id}?fmt=json` (only when the search gave no date)
//!
//! MusicBrainz rejects clients without an identifying User-Agent.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CutterConfig;
use crate::error::{AudioError, Result};

/// Outcome of a metadata search, in the shape the UI consumes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LookupResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordingSearch {
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// What a recording search produced, before any follow-up request
#[derive(Debug, PartialEq, Eq)]
enum SearchOutcome {
    NoMatch,
    Found {
        result: LookupResult,
        /// Release to query for a date when the search had none
        release_id: Option<String>,
    },
}

/// Leading four-digit year of a `YYYY`, `YYYY-MM` or `YYYY-MM-DD` date
fn year_from_date(date: &str) -> Option<String> {
    let year = date.get(..4)?;
    year.chars()
        .all(|c| c.is_ascii_digit())
        .then(|| year.to_string())
}

fn parse_recording_search(body: &[u8]) -> Result<SearchOutcome> {
    let search: RecordingSearch = serde_json::from_slice(body)
        .map_err(|e| AudioError::Lookup(format!("Failed to parse search results: {}", e)))?;

    let Some(recording) = search.recordings.first() else {
        return Ok(SearchOutcome::NoMatch);
    };

    let mut result = LookupResult {
        success: true,
        album: Some(String::new()),
        year: Some(String::new()),
        error: None,
    };

    let Some(release) = recording.releases.first() else {
        return Ok(SearchOutcome::Found {
            result,
            release_id: None,
        });
    };

    result.album = Some(release.title.clone().unwrap_or_default());
    if let Some(year) = release.date.as_deref().and_then(year_from_date) {
        result.year = Some(year);
    }

    let needs_year = result.year.as_deref().map_or(true, str::is_empty);
    let release_id = release.id.clone().filter(|_| needs_year);

    Ok(SearchOutcome::Found { result, release_id })
}

fn parse_release_year(body: &[u8]) -> Option<String> {
    let release: Release = serde_json::from_slice(body).ok()?;
    release.date.as_deref().and_then(year_from_date)
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http: Client,
    base_url: String,
}

impl MusicBrainzClient {
    pub fn new(user_agent: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AudioError::Lookup(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &CutterConfig) -> Result<Self> {
        Self::new(
            &config.musicbrainz_user_agent,
            &config.musicbrainz_base_url,
            Duration::from_secs(config.lookup_timeout_secs),
        )
    }

    /// Look up album and year for a track
    ///
    /// Network and parse failures come back as an unsuccessful `LookupResult`
    /// rather than an error, so the caller can show the message as-is.
    pub async fn search(&self, artist: &str, title: &str) -> LookupResult {
        info!("Searching for track info: {} - {}", artist, title);

        match self.try_search(artist, title).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Music info search failed: {}", e);
                LookupResult::failed(e.to_string())
            }
        }
    }

    async fn try_search(&self, artist: &str, title: &str) -> Result<LookupResult> {
        let url = Url::parse_with_params(
            &format!("{}/recording/", self.base_url),
            &[
                ("query", format!("artist:{} AND recording:{}", artist, title)),
                ("fmt", "json".to_string()),
            ],
        )
        .map_err(|e| AudioError::Lookup(format!("Bad search URL: {}", e)))?;

        debug!("Searching MusicBrainz: {}", url);
        let body = self.get(url).await?;

        match parse_recording_search(&body)? {
            SearchOutcome::NoMatch => Ok(LookupResult::failed("No matching tracks found")),
            SearchOutcome::Found {
                result,
                release_id: None,
            } => Ok(result),
            SearchOutcome::Found {
                mut result,
                release_id: Some(id),
            } => {
                // The release record may carry a date the search result lacked
                match self.release_year(&id).await {
                    Ok(Some(year)) => result.year = Some(year),
                    Ok(None) => {}
                    Err(e) => warn!("Release request error: {}", e),
                }
                Ok(result)
            }
        }
    }

    async fn release_year(&self, release_id: &str) -> Result<Option<String>> {
        let url = Url::parse_with_params(
            &format!("{}/release/{}", self.base_url, release_id),
            &[("fmt", "json")],
        )
        .map_err(|e| AudioError::Lookup(format!("Bad release URL: {}", e)))?;

        let body = self.get(url).await?;
        Ok(parse_release_year(&body))
    }

    async fn get(&self, url: Url) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AudioError::Lookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AudioError::Lookup(format!(
                "MusicBrainz returned {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AudioError::Lookup(e.to_string()))?;

        Ok(body.to_vec())
    }
}
