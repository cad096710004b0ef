//! The user-facing client.
//!
//! # Design
//! `CaptchaTrader` owns a config (base URL and credentials), a `Transport`,
//! and the session. Every operation runs the same pipeline: attach
//! credentials, build the request, send it, parse the reply, treat `-1` in
//! the first field as a server failure, update the session, and return the
//! operation's typed result.
//!
//! Local preconditions (nothing to respond to, nothing to answer, a second
//! enqueue, a second asynchronous submission) fail before any request is
//! built.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::parser::{parse_response, ParsedResponse};
use crate::request::RequestBuilder;
use crate::request_type::RequestType;
use crate::session::{lock, Session};
use crate::task::CaptchaTask;
use crate::types::{CaptchaSource, QueueStatus, Ticket};

type Callback = Box<dyn FnOnce(String) + Send + 'static>;

/// Client for the CaptchaTrader API.
///
/// Synchronous operations block the calling thread for one HTTP round-trip.
/// Use [`CaptchaTrader::submit_async`] or
/// [`CaptchaTrader::submit_with_callback`] to submit without blocking.
#[derive(Debug)]
pub struct CaptchaTrader<T = UreqTransport> {
    credentials: Credentials,
    endpoint: Endpoint<T>,
    session: Arc<Mutex<Session>>,
}

impl CaptchaTrader<UreqTransport> {
    pub fn new(api_key: &str, username: &str, password: &str) -> Self {
        Self::from_config(
            ClientConfig::default().with_credentials(Credentials::new(
                Some(api_key),
                Some(username),
                Some(password),
            )),
        )
    }

    pub fn with_user(username: &str, password: &str) -> Self {
        Self::from_config(
            ClientConfig::default().with_credentials(Credentials::new(None, Some(username), Some(password))),
        )
    }

    pub fn with_api_key(api_key: &str) -> Self {
        Self::from_config(ClientConfig::default().with_credentials(Credentials::new(Some(api_key), None, None)))
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> CaptchaTrader<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            credentials: config.credentials,
            endpoint: Endpoint {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                transport: Arc::new(transport),
            },
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    pub fn set_username(&mut self, username: &str) -> &mut Self {
        self.credentials.username = Some(username.to_string());
        self
    }

    /// Change the password used for requests. This does not change the
    /// account's password on the server.
    pub fn set_password(&mut self, password: &str) -> &mut Self {
        self.credentials.password = Some(password.to_string());
        self
    }

    pub fn set_api_key(&mut self, api_key: &str) -> &mut Self {
        self.credentials.api_key = Some(api_key.to_string());
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }

    pub fn transport(&self) -> &T {
        &self.endpoint.transport
    }

    /// Snapshot of the current job state.
    pub fn session(&self) -> Session {
        lock(&self.session).clone()
    }

    /// Submit a CAPTCHA and block until it is decoded.
    ///
    /// On success the job's ticket is kept so [`CaptchaTrader::respond`] can
    /// report on the answer.
    pub fn submit(&self, source: &CaptchaSource) -> Result<String> {
        submit_job(&self.endpoint, &self.credentials, &self.session, source)
    }

    pub fn submit_file(&self, path: impl AsRef<Path>) -> Result<String> {
        self.submit(&CaptchaSource::File(path.as_ref().to_path_buf()))
    }

    pub fn submit_url(&self, url: &str) -> Result<String> {
        self.submit(&CaptchaSource::Url(url.to_string()))
    }

    /// Report whether the last decoded answer was correct.
    ///
    /// Fails with [`Error::NoActiveJob`] without contacting the server when
    /// no submission is awaiting feedback. The ticket is kept if the server
    /// rejects the report.
    pub fn respond(&self, is_correct: bool) -> Result<()> {
        let ticket = lock(&self.session)
            .active_ticket()
            .filter(|ticket| ticket.id().is_some())
            .cloned()
            .ok_or(Error::NoActiveJob)?;

        let mut builder = self.endpoint.builder(RequestType::Respond);
        builder
            .text("username", self.credentials.username.as_deref())?
            .text("password", self.credentials.password.as_deref())?
            .text("ticket", Some(ticket.as_str()))?
            .text("is_correct", Some(if is_correct { "true" } else { "false" }))?;
        self.endpoint.round_trip(RequestType::Respond, builder)?;

        lock(&self.session).responded();
        Ok(())
    }

    /// Credits remaining on the account.
    pub fn credits(&self) -> Result<i64> {
        let parsed = self.query(RequestType::QueryCredit)?;
        Ok(parsed.int_field(1)?)
    }

    /// Estimated wait in seconds.
    pub fn wait_time(&self) -> Result<i64> {
        Ok(self.queue_status()?.eta)
    }

    /// `(users ahead of the caller, total queue length)`.
    pub fn queue_size(&self) -> Result<(i64, i64)> {
        let status = self.queue_status()?;
        Ok((status.position, status.length))
    }

    /// Position, length and ETA from a single `get_wait_time` call.
    pub fn queue_status(&self) -> Result<QueueStatus> {
        let parsed = self.query(RequestType::QueryWaitTime)?;
        Ok(QueueStatus {
            position: parsed.int_field(0)?,
            length: parsed.int_field(1)?,
            eta: parsed.int_field(2)?,
        })
    }

    /// Join the solver queue and receive a job.
    ///
    /// Returns the challenge image as a data URI. Only one delegated job may
    /// be held at a time; a second call before [`CaptchaTrader::answer`] or
    /// [`CaptchaTrader::dequeue`] fails with [`Error::EnqueueLimit`] without
    /// contacting the server.
    pub fn enqueue(&self) -> Result<String> {
        if lock(&self.session).enqueued_ticket().is_some() {
            return Err(Error::EnqueueLimit);
        }
        let parsed = self.query(RequestType::Enqueue)?;
        let ticket = Ticket::new(parsed.field(0)?);
        let challenge = parsed.field(1)?.to_string();
        lock(&self.session).enqueued(ticket);
        Ok(challenge)
    }

    /// Leave the solver queue and drop any assigned job.
    ///
    /// The local delegation ticket is released as soon as the server replies,
    /// before the reply is inspected, so it is gone even when the server
    /// reports a failure.
    pub fn dequeue(&self) -> Result<()> {
        let mut builder = self.endpoint.builder(RequestType::Dequeue);
        builder
            .text("username", self.credentials.username.as_deref())?
            .text("password", self.credentials.password.as_deref())?;
        let response = self.endpoint.send(RequestType::Dequeue, builder.finish())?;
        lock(&self.session).release_delegation();
        self.endpoint.read(RequestType::Dequeue, &response)?;
        Ok(())
    }

    /// Answer the delegated job.
    ///
    /// Fails with [`Error::NoEnqueuedJob`] when no job is held. The ticket is
    /// released before the request is sent, so a failed answer still leaves
    /// the client free to enqueue again.
    pub fn answer(&self, value: &str) -> Result<()> {
        let ticket = lock(&self.session)
            .enqueued_ticket()
            .cloned()
            .ok_or(Error::NoEnqueuedJob)?;

        let mut builder = self.endpoint.builder(RequestType::Answer);
        builder
            .text("username", self.credentials.username.as_deref())?
            .text("password", self.credentials.password.as_deref())?
            .text("ticket", Some(ticket.as_str()))?
            .text("value", Some(value))?;
        lock(&self.session).release_delegation();
        self.endpoint.round_trip(RequestType::Answer, builder)?;
        Ok(())
    }

    fn query(&self, kind: RequestType) -> Result<ParsedResponse> {
        let builder = self
            .endpoint
            .builder(kind)
            .path_credentials(self.credentials.username.as_deref(), self.credentials.password.as_deref());
        self.endpoint.round_trip(kind, builder)
    }
}

impl<T: Transport + 'static> CaptchaTrader<T> {
    /// A fresh task handle for [`CaptchaTrader::submit_async`].
    pub fn task(&self) -> CaptchaTask {
        CaptchaTask::new()
    }

    /// Submit on a background thread and return immediately.
    ///
    /// Only one asynchronous submission may be in flight per client; a second
    /// one fails with [`Error::JobInProgress`]. Credentials are captured when
    /// the submission starts.
    pub fn submit_async(&self, source: CaptchaSource, task: CaptchaTask) -> Result<CaptchaTask> {
        self.dispatch(source, task, None)
    }

    /// Like [`CaptchaTrader::submit_async`], and call `callback` once with the
    /// decoded answer. The callback is not called if the submission fails.
    pub fn submit_with_callback<F>(&self, source: CaptchaSource, callback: F) -> Result<CaptchaTask>
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.dispatch(source, self.task(), Some(Box::new(callback)))
    }

    fn dispatch(&self, source: CaptchaSource, task: CaptchaTask, callback: Option<Callback>) -> Result<CaptchaTask> {
        if !lock(&self.session).stage(source.clone()) {
            return Err(Error::JobInProgress);
        }
        let completer = match task.begin() {
            Ok(completer) => completer,
            Err(err) => {
                lock(&self.session).unstage();
                return Err(err);
            }
        };

        let endpoint = self.endpoint.clone();
        let credentials = self.credentials.clone();
        let session = Arc::clone(&self.session);
        log::info!("starting asynchronous submission");
        let spawned = thread::Builder::new()
            .name("captchatrader-submit".to_string())
            .spawn(move || {
                let staged = StagedPayload(&session);
                let result = submit_job(&endpoint, &credentials, &session, &source);
                drop(staged);
                match &result {
                    Ok(answer) => {
                        log::info!("asynchronous submission decoded");
                        if let Some(callback) = callback {
                            callback(answer.clone());
                        }
                    }
                    Err(err) => log::warn!("asynchronous submission failed: {err}"),
                }
                completer.complete(result);
            });

        if let Err(err) = spawned {
            lock(&self.session).unstage();
            return Err(err.into());
        }
        Ok(task)
    }
}

/// Clears the staged payload when dropped, including when the worker unwinds.
struct StagedPayload<'a>(&'a Mutex<Session>);

impl Drop for StagedPayload<'_> {
    fn drop(&mut self) {
        lock(self.0).unstage();
    }
}

/// Base URL and transport, shared with submission workers.
#[derive(Debug)]
struct Endpoint<T> {
    base_url: String,
    transport: Arc<T>,
}

impl<T> Clone for Endpoint<T> {
    fn clone(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Endpoint<T> {
    fn builder(&self, kind: RequestType) -> RequestBuilder {
        RequestBuilder::new(kind, &self.base_url)
    }

    fn send(&self, kind: RequestType, request: HttpRequest) -> Result<HttpResponse> {
        log::debug!("{} {}", request.method, kind.url(&self.base_url));
        let response = self.transport.execute(request)?;
        log::debug!("{kind} answered with HTTP {}", response.status);
        Ok(response)
    }

    /// Parse a reply and turn a `-1` first field into [`Error::Remote`].
    fn read(&self, kind: RequestType, response: &HttpResponse) -> Result<ParsedResponse> {
        let parsed = parse_response(&response.body, kind.field_count()).map_err(|err| {
            log::debug!("unparseable {kind} reply (HTTP {}): {err}", response.status);
            err
        })?;
        if parsed.is_failure() {
            let err = Error::Remote {
                message: parsed.get(1).unwrap_or_default().to_string(),
                status: parsed.get(2).filter(|s| !s.is_empty()).map(str::to_string),
            };
            log::debug!("{kind} rejected: {err}");
            return Err(err);
        }
        Ok(parsed)
    }

    fn round_trip(&self, kind: RequestType, builder: RequestBuilder) -> Result<ParsedResponse> {
        let response = self.send(kind, builder.finish())?;
        self.read(kind, &response)
    }
}

fn submit_job<T: Transport>(
    endpoint: &Endpoint<T>,
    credentials: &Credentials,
    session: &Mutex<Session>,
    source: &CaptchaSource,
) -> Result<String> {
    let mut builder = endpoint.builder(RequestType::Submit);
    match source {
        CaptchaSource::File(path) => builder.file("value", path)?,
        CaptchaSource::Url(url) => builder.text("value", Some(url.as_str()))?,
    };
    builder
        .text("username", credentials.username.as_deref())?
        .text("password", credentials.password.as_deref())?
        .text("api_key", credentials.api_key.as_deref())?;

    let parsed = endpoint.round_trip(RequestType::Submit, builder)?;
    let ticket = Ticket::new(parsed.field(0)?);
    let answer = parsed.field(1)?.to_string();
    lock(session).submitted(ticket);
    Ok(answer)
}
