// src/source/traewelling.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::FetchError;
use crate::source::{AccountAggregate, TripSnapshot, TripSource};

pub const DEFAULT_BASE_URL: &str = "https://traewelling.de/api/v1";

// --- wire shapes (only the fields we use; everything else is ignored) ---

// Upstream sends `null` for unknown values as often as it omits them, so
// every field is an `Option` with `#[serde(default)]`: both cases read as absent.

#[derive(Debug, Deserialize)]
struct StatusesResponse {
    #[serde(default)]
    data: Option<Vec<StatusItem>>,
}

#[derive(Debug, Deserialize)]
struct StatusItem {
    #[serde(default)]
    train: Option<Train>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Train {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    line_name: Option<String>,
    #[serde(default)]
    origin: Option<Origin>,
    #[serde(default)]
    destination: Option<Destination>,
    #[serde(default)]
    trip_type: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Origin {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    departure_planned: Option<String>,
    #[serde(default)]
    departure_real: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Destination {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arrival_planned: Option<String>,
    #[serde(default)]
    arrival_real: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(default)]
    data: Option<UserDetails>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDetails {
    #[serde(default)]
    train_distance: Option<i64>,
    #[serde(default)]
    train_duration: Option<i64>,
    #[serde(default)]
    points: Option<i64>,
}

impl From<Train> for TripSnapshot {
    fn from(t: Train) -> Self {
        let origin = t.origin.unwrap_or_default();
        let destination = t.destination.unwrap_or_default();
        TripSnapshot {
            line_name: t.line_name.unwrap_or_default(),
            category: t.category.unwrap_or_default(),
            origin: origin.name.unwrap_or_default(),
            destination: destination.name.unwrap_or_default(),
            departure_planned: origin.departure_planned.unwrap_or_default(),
            departure_real: origin.departure_real.unwrap_or_default(),
            arrival_planned: destination.arrival_planned.unwrap_or_default(),
            arrival_real: destination.arrival_real.unwrap_or_default(),
            // Missing trip type maps to "unknown" downstream.
            purpose_code: t.trip_type.unwrap_or(-1),
        }
    }
}

impl From<UserDetails> for AccountAggregate {
    fn from(d: UserDetails) -> Self {
        AccountAggregate {
            distance_m: d.train_distance.unwrap_or_default(),
            duration_min: d.train_duration.unwrap_or_default(),
            points: d.points.unwrap_or_default(),
        }
    }
}

/// Statuses without a train carry nothing to publish and are skipped.
fn trips_from(resp: StatusesResponse) -> Vec<TripSnapshot> {
    resp.data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|it| it.train)
        .map(TripSnapshot::from)
        .collect()
}

/// Bearer-authenticated client for the Träwelling REST API.
pub struct TraewellingClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl TraewellingClient {
    /// `token` may be absent; every call then fails with
    /// [`FetchError::MissingCredential`] instead of hitting the network.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid base url {base_url}"))?;
        if base.cannot_be_a_base() {
            return Err(anyhow!("base url {base_url} cannot carry a path"));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("traewelling-exporter/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        let token = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        Ok(Self { http, base, token })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn read_body(&self, account: &str, url: Url, token: &str) -> Result<String, FetchError> {
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                account: account.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                account: account.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|source| FetchError::Transport {
            account: account.to_string(),
            source,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, account: &str, url: Url) -> Result<T, FetchError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| FetchError::MissingCredential {
                account: account.to_string(),
            })?;

        // Timed across every outcome; slow failures matter as much as slow successes.
        let t0 = std::time::Instant::now();
        let result = self.read_body(account, url, token).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        histogram!("traewelling_fetch_duration_ms", "outcome" => outcome)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        let body = result?;

        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            account: account.to_string(),
            source,
        })
    }
}

#[async_trait]
impl TripSource for TraewellingClient {
    async fn fetch_trip_snapshots(&self, account: &str) -> Result<Vec<TripSnapshot>, FetchError> {
        let url = self.endpoint(&["user", account, "statuses"]);
        let resp: StatusesResponse = self.get_json(account, url).await?;
        Ok(trips_from(resp))
    }

    async fn fetch_account_aggregate(
        &self,
        account: &str,
    ) -> Result<AccountAggregate, FetchError> {
        let url = self.endpoint(&["user", account]);
        let resp: UserResponse = self.get_json(account, url).await?;
        Ok(resp.data.unwrap_or_default().into())
    }
}
