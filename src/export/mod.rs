//! Client for the wiki server's export API.
//!
//! Exports are asynchronous on the server side: requesting one returns a
//! file-operation id, whose state is polled until it reports `"complete"`,
//! at which point the finished archive can be streamed down.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::error::Error;

const EXPORT_ALL: &str = "/api/collections.export_all";
const OPERATION_INFO: &str = "/api/fileOperations.info";
const OPERATION_REDIRECT: &str = "/api/fileOperations.redirect";

/// Metadata for one server-side export job.
///
/// The server reports more fields than these; only the id and the state
/// drive the backup, so everything else is ignored.
#[derive(Debug, Deserialize)]
pub struct FileOperation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    data: Option<ExportData>,
}

#[derive(Debug, Deserialize)]
struct ExportData {
    #[serde(rename = "fileOperation")]
    file_operation: Option<FileOperation>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    data: Option<FileOperation>,
}

#[derive(Serialize)]
struct JobRef<'a> {
    id: &'a str,
}

/// Blocking HTTP client bound to one wiki server and API token.
pub struct ExportClient {
    http: Client,
    server: String,
}

impl ExportClient {
    /// Build a client that sends the bearer token on every request.
    pub fn new(server: &str, api_token: &str) -> Result<ExportClient> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_token))
            .context("api_token contains characters not usable in a header")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(Error::Request)?;

        Ok(ExportClient {
            http,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    /// Ask the server to export all collections.
    ///
    /// Returns the id of the file operation tracking the export.
    ///
    /// # Errors
    /// - [`Error::Request`] if the HTTP call fails or returns an error status.
    /// - [`Error::MalformedResponse`] if the payload lacks `data.fileOperation`.
    pub fn request_export(&self) -> Result<String> {
        let resp = self
            .http
            .post(self.url(EXPORT_ALL))
            .send()
            .map_err(Error::Request)?
            .error_for_status()
            .map_err(Error::Request)?;

        let body: ExportResponse = resp
            .json()
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;

        let op = body
            .data
            .and_then(|d| d.file_operation)
            .ok_or_else(|| Error::MalformedResponse("missing data.fileOperation".into()))?;
        if op.id.is_empty() {
            return Err(Error::MalformedResponse("fileOperation without an id".into()).into());
        }
        Ok(op.id)
    }

    /// Poll the export job until the server reports it complete.
    ///
    /// The state is checked up to `max_attempts` times; the caller-supplied
    /// `sleep` is called with `poll_interval` after every check that does
    /// not observe `"complete"`, including the last one.
    ///
    /// Returns the job metadata from the first `"complete"` observation.
    /// Every other state keeps polling.
    ///
    /// # Errors
    /// - [`Error::Timeout`] once the attempt budget is exhausted.
    /// - [`Error::Request`] / [`Error::MalformedResponse`] if a status check
    ///   fails or comes back unreadable.
    pub fn wait_for_completion(
        &self,
        job_id: &str,
        max_attempts: u32,
        poll_interval: Duration,
        mut sleep: impl FnMut(Duration),
    ) -> Result<FileOperation> {
        for _ in 0..max_attempts {
            let op = self.job_info(job_id)?;
            if op.state == "complete" {
                return Ok(op);
            }
            sleep(poll_interval);
        }
        Err(Error::Timeout {
            attempts: max_attempts,
        }
        .into())
    }

    fn job_info(&self, job_id: &str) -> Result<FileOperation> {
        let resp = self
            .http
            .post(self.url(OPERATION_INFO))
            .json(&JobRef { id: job_id })
            .send()
            .map_err(Error::Request)?
            .error_for_status()
            .map_err(Error::Request)?;

        let body: InfoResponse = resp
            .json()
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        let op = body
            .data
            .ok_or_else(|| Error::MalformedResponse("missing data in fileOperations.info".into()))?;
        Ok(op)
    }

    /// Stream the finished export archive to `dest`.
    ///
    /// The response body is copied straight to disk, so archive size is
    /// bounded by disk space, not memory. A partially written file is left
    /// in place on failure for the operator to inspect.
    ///
    /// # Errors
    /// - [`Error::Request`] on transport failure or error status.
    /// - A plain I/O error if `dest` cannot be created or written.
    pub fn download_archive(&self, job_id: &str, dest: &Path) -> Result<()> {
        let mut resp = self
            .http
            .post(self.url(OPERATION_REDIRECT))
            .json(&JobRef { id: job_id })
            .send()
            .map_err(Error::Request)?
            .error_for_status()
            .map_err(Error::Request)?;

        let mut out = fs::File::create(dest)
            .with_context(|| format!("cannot create {}", dest.display()))?;
        io::copy(&mut resp, &mut out)
            .with_context(|| format!("download to {} interrupted", dest.display()))?;
        Ok(())
    }
}
