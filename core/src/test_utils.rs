//! Scripted transport shared by the unit tests.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// Replays queued replies in order and records every request it receives.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, Error>>>,
    requests: Mutex<Vec<HttpRequest>>,
    gate: Option<Mutex<Receiver<()>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that blocks each request until the sender is signalled.
    pub fn gated() -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let transport = Self {
            gate: Some(Mutex::new(rx)),
            ..Self::default()
        };
        (transport, tx)
    }

    pub fn reply(self, status: u16, xml: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "text/xml".to_string())],
            body: xml.as_bytes().to_vec(),
        }));
        self
    }

    pub fn ok(self, xml: &str) -> Self {
        self.reply(200, xml)
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::Transport(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv();
        }
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("no scripted reply".to_string())))
    }
}

/// Value of the text form field `name` in a multipart request body.
pub fn form_field(request: &HttpRequest, name: &str) -> Option<String> {
    let body = String::from_utf8_lossy(request.body.as_deref()?).into_owned();
    let marker = format!("name=\"{name}\"\r\n\r\n");
    let start = body.find(&marker)? + marker.len();
    let end = body[start..].find("\r\n--")? + start;
    Some(body[start..end].to_string())
}
