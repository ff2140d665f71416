use std::env;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::descriptor::{Params, QueryDescriptor};
use crate::error::{Error, Result};
use crate::sources::{is_http_url, source_to_base_url};
use crate::submit::{Retrieval, submit};
use crate::url_builder::{base_url, location_url, resource_url, task_url};

const RC_FILE: &str = ".cdsapirc";

#[derive(Clone)]
pub struct ClientOptions {
    /// Archive alias (`cds`, `ads`) or base URL.
    pub source: String,
    /// API key in `UID:KEY` form.
    pub key: String,
    pub verify_tls: bool,
    /// Whole-request HTTP timeout; `None` waits as long as the archive needs.
    pub timeout: Option<Duration>,
    /// Upper bound for the pause between task state polls.
    pub sleep_max: Duration,
    /// Delete the finished task on the archive after downloading.
    pub delete: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            source: "cds".to_string(),
            key: String::new(),
            verify_tls: true,
            timeout: None,
            sleep_max: Duration::from_secs(120),
            delete: true,
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("source", &self.source)
            .field("key", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("timeout", &self.timeout)
            .field("sleep_max", &self.sleep_max)
            .field("delete", &self.delete)
            .finish()
    }
}

impl ClientOptions {
    /// Credentials from `CDSAPI_URL`/`CDSAPI_KEY`, falling back to the rc file
    /// named by `CDSAPI_RC` or `~/.cdsapirc`.
    pub fn load() -> Result<Self> {
        let rc = env::var_os("CDSAPI_RC")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(RC_FILE)));
        Self::resolve(
            env::var("CDSAPI_URL").ok(),
            env::var("CDSAPI_KEY").ok(),
            rc.as_deref(),
        )
    }

    /// Explicit values win over the rc file, which is only read when needed
    /// and when it exists.
    pub fn resolve(url: Option<String>, key: Option<String>, rc: Option<&Path>) -> Result<Self> {
        let mut opts = match (&url, &key, rc) {
            (Some(_), Some(_), _) => Self::default(),
            (_, _, Some(path)) if path.is_file() => Self::from_rc_file(path)?,
            _ => Self::default(),
        };
        if let Some(url) = url {
            opts.source = url;
        }
        if let Some(key) = key {
            opts.key = key;
        }
        if opts.key.trim().is_empty() {
            return Err(Error::Config(
                "missing API key: set CDSAPI_KEY or add `key: UID:KEY` to ~/.cdsapirc".into(),
            ));
        }
        Ok(opts)
    }

    /// Parse an rc file of `url:`, `key:` and `verify:` lines.
    pub fn from_rc_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut opts = Self::default();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((k, v)) = line.split_once(':') else {
                return Err(Error::Config(format!(
                    "{}:{}: expected `name: value`",
                    path.display(),
                    n + 1
                )));
            };
            let v = v.trim().to_string();
            match k.trim() {
                "url" => opts.source = v,
                "key" => opts.key = v,
                "verify" => opts.verify_tls = !matches!(v.as_str(), "0" | "false" | "no"),
                other => debug!(key = other, "ignoring unknown rc entry"),
            }
        }
        Ok(opts)
    }
}

/// Outcome of one archive retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub target: String,
    pub location: String,
    pub request_id: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Task document returned by the archive for submissions and polls.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskReply {
    state: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    content_length: Option<u64>,
    #[serde(default)]
    error: Option<ApiMessage>,
}

/// Blocking client for the Copernicus data store web API.
#[derive(Clone)]
pub struct Client {
    opts: ClientOptions,
    base_url: Url,
    http: HttpClient,
    uid: String,
    secret: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("opts", &self.opts)
            .field("base_url", &self.base_url.as_str())
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        let raw = if is_http_url(&opts.source) {
            opts.source.as_str()
        } else {
            source_to_base_url(&opts.source)
                .ok_or_else(|| Error::Config(format!("unknown source: {}", opts.source)))?
        };
        let base_url = base_url(raw)?;

        let (uid, secret) = match opts.key.trim().split_once(':') {
            Some((u, s)) if !u.is_empty() && !s.is_empty() => (u.to_string(), s.to_string()),
            _ => return Err(Error::Config("API key must have the form UID:KEY".into())),
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("era5-download-rs/0.1"));

        let mut builder = HttpClient::builder()
            .default_headers(headers)
            .timeout(opts.timeout);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            opts,
            base_url,
            http,
            uid,
            secret,
        })
    }

    /// Client configured from the environment or `~/.cdsapirc`.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientOptions::load()?)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.opts
    }

    /// Submit raw `params` for `dataset` without validation, wait for the
    /// task to finish and write the result to `target`.
    pub fn retrieve(&self, dataset: &str, params: &Params, target: &str) -> Result<Download> {
        let url = resource_url(&self.base_url, dataset)?;
        info!(%dataset, path = %target, "submitting request");
        debug!(body = %serde_json::Value::Object(params.clone()), "request body");

        let mut reply = self.send(self.http.post(url).json(params))?;
        let request_id = reply.request_id.clone();
        let mut last_state = String::new();
        let mut pause = Duration::from_secs(1).min(self.opts.sleep_max);

        let (location, content_length) = loop {
            if reply.state != last_state {
                info!(state = %reply.state, request_id = ?request_id, "task state");
                last_state = reply.state.clone();
            }
            match next_step(reply, request_id.as_deref())? {
                Step::Done {
                    location,
                    content_length,
                } => break (location, content_length),
                Step::Wait(rid) => {
                    thread::sleep(pause);
                    pause = next_pause(pause, self.opts.sleep_max);
                    reply = self.send(self.http.get(task_url(&self.base_url, &rid)?))?;
                }
            }
        };

        let size_bytes = self.download(&location, target)?;
        check_size(content_length, size_bytes)?;
        info!(path = %target, size_bytes, "download complete");

        if self.opts.delete {
            if let Some(rid) = &request_id {
                if let Err(e) = self.delete_task(rid) {
                    warn!(request_id = %rid, error = %e, "could not delete finished task");
                }
            }
        }

        Ok(Download {
            target: target.to_string(),
            location,
            request_id,
            size_bytes,
        })
    }

    /// Submit a validated query through this client.
    pub fn submit(&self, descriptor: &QueryDescriptor) -> Result<Retrieval<Download>> {
        submit(descriptor, |dataset, params, target| {
            self.retrieve(dataset, params, target)
        })
    }

    fn send(&self, request: RequestBuilder) -> Result<TaskReply> {
        let resp = request.basic_auth(&self.uid, Some(&self.secret)).send()?;
        let status_err = resp.error_for_status_ref().err();
        if let Some(http_err) = status_err {
            let body = resp.text().unwrap_or_default();
            return Err(error_from_body(&body).unwrap_or(Error::Http(http_err)));
        }
        Ok(resp.json()?)
    }

    fn download(&self, location: &str, target: &str) -> Result<u64> {
        let url = location_url(&self.base_url, location)?;
        debug!(%url, path = %target, "downloading result");
        let mut resp = self.http.get(url).send()?.error_for_status()?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(target)?;
        let size = resp.copy_to(&mut file)?;
        file.flush()?;
        Ok(size)
    }

    fn delete_task(&self, request_id: &str) -> Result<()> {
        let url = task_url(&self.base_url, request_id)?;
        self.http
            .delete(url)
            .basic_auth(&self.uid, Some(&self.secret))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

/// What the task loop does with one reply.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    /// Poll the task again after a pause.
    Wait(String),
    Done {
        location: String,
        content_length: Option<u64>,
    },
}

/// `request_id` from the submission is used when a poll reply omits it.
fn next_step(reply: TaskReply, request_id: Option<&str>) -> Result<Step> {
    match reply.state.as_str() {
        "completed" => {
            let location = reply
                .location
                .ok_or_else(|| Error::UnexpectedState("completed without location".into()))?;
            Ok(Step::Done {
                location,
                content_length: reply.content_length,
            })
        }
        "queued" | "running" => reply
            .request_id
            .or_else(|| request_id.map(str::to_string))
            .map(Step::Wait)
            .ok_or_else(|| {
                Error::UnexpectedState(format!("{} without request_id", reply.state))
            }),
        "failed" => {
            let e = reply.error.unwrap_or_default();
            Err(Error::Api {
                message: e.message.unwrap_or_else(|| "request failed".to_string()),
                reason: e.reason,
            })
        }
        other => Err(Error::UnexpectedState(other.to_string())),
    }
}

/// Error document of a non-2xx reply, when the body is one.
fn error_from_body(body: &str) -> Option<Error> {
    match serde_json::from_str::<ApiMessage>(body) {
        Ok(ApiMessage {
            message: Some(message),
            reason,
        }) => Some(Error::Api { message, reason }),
        _ => None,
    }
}

fn check_size(expected: Option<u64>, actual: u64) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(Error::SizeMismatch { expected, actual }),
        _ => Ok(()),
    }
}

fn next_pause(current: Duration, max: Duration) -> Duration {
    current.mul_f64(1.5).min(max)
}
