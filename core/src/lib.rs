//! Client library for the CaptchaTrader CAPTCHA-solving service.
//!
//! # Overview
//! Submits CAPTCHA images or URLs, receives decoded answers, reports whether
//! answers were correct, queries credits and queue state, and lets the caller
//! act as a solver through the enqueue / answer / dequeue cycle.
//!
//! # Design
//! - `RequestType` is the fixed table of seven operations.
//! - `RequestBuilder` turns an operation plus parameters into a plain-data
//!   `HttpRequest` (multipart POST or credential-in-path GET).
//! - A `Transport` executes the request; `UreqTransport` is the default.
//! - `parse_response` turns the XML reply into positional fields or a
//!   `ParseError`.
//! - `CaptchaTrader` composes the above per operation and keeps the job state
//!   (`Session`) needed by follow-up calls.
//! - `CaptchaTask` is the one-shot handle for submissions run on a
//!   background thread.
//!
//! ```no_run
//! use captchatrader::CaptchaTrader;
//!
//! let client = CaptchaTrader::new("API_KEY", "username", "password");
//! let answer = client.submit_file("captcha.png")?;
//! client.respond(answer.len() == 6)?;
//! # Ok::<(), captchatrader::Error>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod parser;
pub mod request;
pub mod request_type;
pub mod session;
pub mod task;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use client::CaptchaTrader;
pub use config::{ClientConfig, Credentials};
pub use error::{Error, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use parser::{parse_response, ParseError, ParsedResponse, RootElement};
pub use request::RequestBuilder;
pub use request_type::{RequestType, DEFAULT_BASE_URL};
pub use session::{Delegation, Feedback, Session};
pub use task::{CaptchaTask, TaskStatus};
pub use types::{CaptchaSource, QueueStatus, Ticket};
