//! The fixed table of service operations.

use std::fmt;

use crate::http::HttpMethod;

/// Base URL of the public service.
pub const DEFAULT_BASE_URL: &str = "http://api.captchatrader.com";

/// One remote operation: its endpoint, verb, and response width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Submit,
    Respond,
    QueryCredit,
    QueryWaitTime,
    Enqueue,
    Answer,
    Dequeue,
}

impl RequestType {
    pub const ALL: [RequestType; 7] = [
        RequestType::Submit,
        RequestType::Respond,
        RequestType::QueryCredit,
        RequestType::QueryWaitTime,
        RequestType::Enqueue,
        RequestType::Answer,
        RequestType::Dequeue,
    ];

    /// Endpoint name, also the last path segment before `.xml`.
    pub fn name(self) -> &'static str {
        match self {
            RequestType::Submit => "submit",
            RequestType::Respond => "respond",
            RequestType::QueryCredit => "get_credits",
            RequestType::QueryWaitTime => "get_wait_time",
            RequestType::Enqueue => "enqueue",
            RequestType::Answer => "answer",
            RequestType::Dequeue => "dequeue",
        }
    }

    pub fn method(self) -> HttpMethod {
        if self.does_post() {
            HttpMethod::Post
        } else {
            HttpMethod::Get
        }
    }

    /// Whether parameters travel in a multipart body rather than the path.
    pub fn does_post(self) -> bool {
        matches!(
            self,
            RequestType::Submit | RequestType::Respond | RequestType::Answer | RequestType::Dequeue
        )
    }

    /// Number of positional fields a successful response fills.
    pub fn field_count(self) -> usize {
        match self {
            RequestType::Submit => 2,
            RequestType::Respond => 1,
            RequestType::QueryCredit => 2,
            RequestType::QueryWaitTime => 3,
            RequestType::Enqueue => 2,
            RequestType::Answer => 1,
            RequestType::Dequeue => 1,
        }
    }

    /// Endpoint URL without credentials or the `.xml` suffix.
    pub fn url(self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.name())
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
