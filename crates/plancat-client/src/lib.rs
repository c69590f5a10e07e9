// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use plancat_app::{CatalogRecord, CatalogSource, EntityKind, ListFilter, SessionContext};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot reach catalog service at {base_url} -- check catalog.base_url and that the service is running")]
    Transport {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("catalog service error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("{kind} {id} not found -- refresh the list and retry")]
    NotFound { kind: &'static str, id: i64 },
    #[error("decode {what}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Blocking HTTP implementation of [`CatalogSource`].
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    base_url: String,
    session: SessionContext,
    timeout: Duration,
    http: HttpClient,
}

impl HttpCatalog {
    pub fn new(base_url: &str, session: SessionContext, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("catalog.base_url must not be empty");
        }
        let parsed = Url::parse(&base_url)
            .with_context(|| format!("catalog.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("catalog.base_url must use http or https, got {:?}", parsed.scheme());
        }

        // A stalled request ends as a transport error the user can retry.
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            session,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, method: &str, path: &str, request: RequestBuilder) -> Result<Response, CatalogError> {
        let started = Instant::now();
        let response = self
            .authorized(request)
            .send()
            .map_err(|source| CatalogError::Transport {
                base_url: self.base_url.clone(),
                source,
            })?;
        debug!(
            method,
            path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "catalog request"
        );
        Ok(response)
    }

    fn checked(
        &self,
        response: Response,
        missing: Option<(EntityKind, i64)>,
    ) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND
            && let Some((kind, id)) = missing
        {
            return Err(CatalogError::NotFound {
                kind: kind.as_str(),
                id,
            });
        }
        let body = response.text().unwrap_or_default();
        Err(clean_error_response(status, &body))
    }

    fn decode<T: DeserializeOwned>(&self, response: Response, what: &str) -> Result<T, CatalogError> {
        let body = response.text().map_err(|source| CatalogError::Transport {
            base_url: self.base_url.clone(),
            source,
        })?;
        serde_json::from_str(&body).map_err(|source| CatalogError::Decode {
            what: what.to_owned(),
            source,
        })
    }

    /// Checks that the service answers its health endpoint.
    pub fn ping(&self) -> Result<()> {
        let response = self.send("GET", "health", self.http.get(self.url("health")))?;
        self.checked(response, None)?;
        Ok(())
    }

    /// Best-effort logout. Failures are logged, never returned.
    pub fn end_session(&self) {
        if self.session.bearer_token().is_none() {
            return;
        }
        let result = self
            .send("DELETE", "session", self.http.delete(self.url("session")))
            .and_then(|response| self.checked(response, None));
        if let Err(error) = result {
            warn!(error = %error, "session teardown failed");
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope {
    Bare(Vec<serde_json::Value>),
    Wrapped { data: Vec<serde_json::Value> },
}

#[derive(Deserialize)]
struct CreatedResponse {
    id: i64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Text(String),
    Detailed { message: String },
}

fn clean_error_response(status: StatusCode, body: &str) -> CatalogError {
    let status_code = status.as_u16();
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let message = match parsed.error {
            Some(ErrorBody::Text(message)) | Some(ErrorBody::Detailed { message }) => Some(message),
            None => parsed.message,
        };
        if let Some(message) = message
            && !message.is_empty()
        {
            return CatalogError::Server {
                status: status_code,
                message,
            };
        }
    }

    let trimmed = body.trim();
    let message = if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        trimmed.to_owned()
    } else {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_lowercase()
    };
    CatalogError::Server {
        status: status_code,
        message,
    }
}

/// Decodes one service object into the record type for `kind`.
pub fn decode_record(kind: EntityKind, value: serde_json::Value) -> Result<CatalogRecord, serde_json::Error> {
    Ok(match kind {
        EntityKind::Instrument => CatalogRecord::Instrument(serde_json::from_value(value)?),
        EntityKind::Axis => CatalogRecord::Axis(serde_json::from_value(value)?),
        EntityKind::Policy => CatalogRecord::Policy(serde_json::from_value(value)?),
        EntityKind::Objective => CatalogRecord::Objective(serde_json::from_value(value)?),
        EntityKind::Action => CatalogRecord::Action(serde_json::from_value(value)?),
        EntityKind::Intervention => CatalogRecord::Intervention(serde_json::from_value(value)?),
        EntityKind::Result => CatalogRecord::Result(serde_json::from_value(value)?),
        EntityKind::Dimension => CatalogRecord::Dimension(serde_json::from_value(value)?),
        EntityKind::OrgUnit => CatalogRecord::OrgUnit(serde_json::from_value(value)?),
        EntityKind::Indicator => CatalogRecord::Indicator(serde_json::from_value(value)?),
        EntityKind::Relation => CatalogRecord::Relation(Box::new(serde_json::from_value(value)?)),
    })
}

/// Encodes a record as the service expects it in request bodies.
pub fn encode_record(record: &CatalogRecord) -> Result<serde_json::Value, serde_json::Error> {
    match record {
        CatalogRecord::Instrument(value) => serde_json::to_value(value),
        CatalogRecord::Axis(value) => serde_json::to_value(value),
        CatalogRecord::Policy(value) => serde_json::to_value(value),
        CatalogRecord::Objective(value) => serde_json::to_value(value),
        CatalogRecord::Action(value) => serde_json::to_value(value),
        CatalogRecord::Intervention(value) => serde_json::to_value(value),
        CatalogRecord::Result(value) => serde_json::to_value(value),
        CatalogRecord::Dimension(value) => serde_json::to_value(value),
        CatalogRecord::OrgUnit(value) => serde_json::to_value(value),
        CatalogRecord::Indicator(value) => serde_json::to_value(value),
        CatalogRecord::Relation(value) => serde_json::to_value(value.as_ref()),
    }
}

fn check_kind(kind: EntityKind, payload: &CatalogRecord) -> Result<()> {
    if payload.kind() != kind {
        bail!(
            "payload is a {} record, not {}",
            payload.kind().as_str(),
            kind.as_str()
        );
    }
    Ok(())
}

impl CatalogSource for HttpCatalog {
    fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Vec<CatalogRecord>> {
        let path = kind.as_str();
        let mut query = Vec::new();
        if let Some(ancestor_id) = filter.ancestor_id {
            query.push(("parentId", ancestor_id.to_string()));
        }
        if filter.active_only {
            query.push(("activeOnly", "true".to_owned()));
        }
        let response = self.send("GET", path, self.http.get(self.url(path)).query(&query))?;
        let response = self.checked(response, None)?;
        let values = match self.decode::<ListEnvelope>(response, path)? {
            ListEnvelope::Bare(values) | ListEnvelope::Wrapped { data: values } => values,
        };
        let records = values
            .into_iter()
            .map(|value| decode_record(kind, value))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| CatalogError::Decode {
                what: format!("{path} entry"),
                source,
            })?;
        Ok(records)
    }

    fn get_by_id(&self, kind: EntityKind, id: i64) -> Result<CatalogRecord> {
        let path = format!("{}/{id}", kind.as_str());
        let response = self.send("GET", &path, self.http.get(self.url(&path)))?;
        let response = self.checked(response, Some((kind, id)))?;
        let value = self.decode::<serde_json::Value>(response, &path)?;
        let record = decode_record(kind, value).map_err(|source| CatalogError::Decode {
            what: path.clone(),
            source,
        })?;
        Ok(record)
    }

    fn create(&self, kind: EntityKind, payload: &CatalogRecord) -> Result<i64> {
        check_kind(kind, payload)?;
        let mut body = encode_record(payload).context("encode create payload")?;
        if let Some(object) = body.as_object_mut() {
            object.remove("id");
        }
        let path = kind.as_str();
        let response = self.send("POST", path, self.http.post(self.url(path)).json(&body))?;
        let response = self.checked(response, None)?;
        let created = self.decode::<CreatedResponse>(response, "create response")?;
        Ok(created.id)
    }

    fn update(&self, kind: EntityKind, id: i64, payload: &CatalogRecord) -> Result<()> {
        check_kind(kind, payload)?;
        let body = encode_record(payload).context("encode update payload")?;
        let path = format!("{}/{id}", kind.as_str());
        let response = self.send("PUT", &path, self.http.put(self.url(&path)).json(&body))?;
        self.checked(response, Some((kind, id)))?;
        Ok(())
    }

    fn delete(&self, kind: EntityKind, id: i64) -> Result<()> {
        let path = format!("{}/{id}", kind.as_str());
        let response = self.send("DELETE", &path, self.http.delete(self.url(&path)))?;
        self.checked(response, Some((kind, id)))?;
        Ok(())
    }
}
