//! Builds one outbound request per operation.
//!
//! # Design
//! GET operations carry credentials as literal path segments
//! (`/username:<u>/password:<p>`) ahead of the `.xml` suffix. POST operations
//! carry every parameter as a `multipart/form-data` section. Parameters
//! accumulate on the builder; `finish` writes the closing boundary and hands
//! back the `HttpRequest`. `finish` consumes the builder, so nothing can be
//! appended to a request once it has been produced.

use std::io;
use std::path::Path;

use uuid::Uuid;

use crate::http::{HttpMethod, HttpRequest};
use crate::request_type::RequestType;

const BOUNDARY_PREFIX: &str = "---------------------------";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const CRLF: &[u8] = b"\r\n";

/// Accumulates the parameters of a single request.
#[derive(Debug)]
pub struct RequestBuilder {
    kind: RequestType,
    url: String,
    boundary: String,
    body: Option<Vec<u8>>,
}

impl RequestBuilder {
    pub fn new(kind: RequestType, base_url: &str) -> Self {
        let body = kind.does_post().then(Vec::new);
        Self {
            kind,
            url: kind.url(base_url),
            boundary: format!("{BOUNDARY_PREFIX}{}", Uuid::new_v4().simple()),
            body,
        }
    }

    /// Append `/username:<u>/password:<p>` to a GET endpoint.
    ///
    /// Nothing is appended when either value is missing or when the request
    /// is a POST; the server then treats the call as anonymous.
    pub fn path_credentials(mut self, username: Option<&str>, password: Option<&str>) -> Self {
        if let (false, Some(username), Some(password)) = (self.kind.does_post(), username, password) {
            self.url.push_str(&format!("/username:{username}/password:{password}"));
        }
        self
    }

    pub fn kind(&self) -> RequestType {
        self.kind
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Add a plain-text form field. `None` omits the field entirely.
    pub fn text(&mut self, name: &str, value: Option<&str>) -> io::Result<&mut Self> {
        let boundary = self.boundary.clone();
        let body = self.body_mut()?;
        if let Some(value) = value {
            write_disposition(body, &boundary, name);
            body.extend_from_slice(CRLF);
            body.extend_from_slice(CRLF);
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(CRLF);
        }
        Ok(self)
    }

    /// Add a file field read from disk.
    ///
    /// The part's `filename` is the path's base name and its content type is
    /// guessed from the extension.
    pub fn file(&mut self, name: &str, path: &Path) -> io::Result<&mut Self> {
        self.body_mut()?;
        let data = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("captcha");
        let content_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or(FALLBACK_CONTENT_TYPE);
        self.bytes(name, filename, content_type, &data)
    }

    /// Add a binary part with an explicit file name and content type.
    pub fn bytes(
        &mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> io::Result<&mut Self> {
        let boundary = self.boundary.clone();
        let body = self.body_mut()?;
        write_disposition(body, &boundary, name);
        body.extend_from_slice(format!("; filename=\"{}\"", escape_quoted(filename)).as_bytes());
        body.extend_from_slice(CRLF);
        body.extend_from_slice(format!("Content-Type: {content_type}").as_bytes());
        body.extend_from_slice(CRLF);
        body.extend_from_slice(CRLF);
        body.extend_from_slice(data);
        body.extend_from_slice(CRLF);
        Ok(self)
    }

    /// Close the body and produce the request.
    pub fn finish(self) -> HttpRequest {
        let url = format!("{}.xml", self.url);
        match self.body {
            Some(mut body) => {
                body.extend_from_slice(format!("--{}--", self.boundary).as_bytes());
                body.extend_from_slice(CRLF);
                HttpRequest {
                    method: HttpMethod::Post,
                    url,
                    headers: vec![(
                        "Content-Type".to_string(),
                        format!("multipart/form-data; boundary={}", self.boundary),
                    )],
                    body: Some(body),
                }
            }
            None => HttpRequest {
                method: HttpMethod::Get,
                url,
                headers: Vec::new(),
                body: None,
            },
        }
    }

    fn body_mut(&mut self) -> io::Result<&mut Vec<u8>> {
        let kind = self.kind;
        self.body.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("request type `{kind}` does not take form parameters"),
            )
        })
    }
}

fn write_disposition(body: &mut Vec<u8>, boundary: &str, name: &str) {
    body.extend_from_slice(format!("--{boundary}").as_bytes());
    body.extend_from_slice(CRLF);
    body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"", escape_quoted(name)).as_bytes());
}

/// Percent-encode the characters that would end a quoted header value or the
/// header line itself.
fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:3000";

    fn body_text(req: &HttpRequest) -> String {
        String::from_utf8_lossy(req.body.as_deref().unwrap()).into_owned()
    }

    #[test]
    fn get_embeds_credentials_in_path() {
        let req = RequestBuilder::new(RequestType::QueryCredit, BASE)
            .path_credentials(Some("bob"), Some("hunter2"))
            .finish();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            "http://localhost:3000/get_credits/username:bob/password:hunter2.xml"
        );
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn get_without_both_credentials_is_anonymous() {
        let req = RequestBuilder::new(RequestType::Enqueue, BASE)
            .path_credentials(Some("bob"), None)
            .finish();
        assert_eq!(req.url, "http://localhost:3000/enqueue.xml");

        let req = RequestBuilder::new(RequestType::QueryWaitTime, BASE)
            .path_credentials(None, None)
            .finish();
        assert_eq!(req.url, "http://localhost:3000/get_wait_time.xml");
    }

    #[test]
    fn post_ignores_path_credentials() {
        let req = RequestBuilder::new(RequestType::Dequeue, BASE)
            .path_credentials(Some("bob"), Some("pw"))
            .finish();
        assert_eq!(req.url, "http://localhost:3000/dequeue.xml");
    }

    #[test]
    fn post_writes_text_parts_and_closing_boundary() {
        let mut builder = RequestBuilder::new(RequestType::Respond, BASE);
        let boundary = builder.boundary().to_string();
        builder
            .text("ticket", Some("42"))
            .unwrap()
            .text("is_correct", Some("true"))
            .unwrap();
        let req = builder.finish();

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/respond.xml");
        assert_eq!(
            req.header("content-type").unwrap(),
            format!("multipart/form-data; boundary={boundary}")
        );
        let expected = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"ticket\"\r\n\r\n42\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"is_correct\"\r\n\r\ntrue\r\n\
             --{b}--\r\n",
            b = boundary
        );
        assert_eq!(body_text(&req), expected);
    }

    #[test]
    fn absent_text_values_are_omitted() {
        let mut builder = RequestBuilder::new(RequestType::Dequeue, BASE);
        builder.text("username", None).unwrap().text("password", Some("pw")).unwrap();
        let body = body_text(&builder.finish());
        assert!(!body.contains("name=\"username\""));
        assert!(body.contains("name=\"password\""));
    }

    #[test]
    fn boundary_is_random_per_request() {
        let a = RequestBuilder::new(RequestType::Submit, BASE);
        let b = RequestBuilder::new(RequestType::Submit, BASE);
        assert!(a.boundary().starts_with(BOUNDARY_PREFIX));
        assert_ne!(a.boundary(), b.boundary());
    }

    #[test]
    fn file_part_uses_base_name_and_guessed_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captcha.png");
        std::fs::write(&path, b"\x89PNG-bytes").unwrap();

        let mut builder = RequestBuilder::new(RequestType::Submit, BASE);
        builder.file("value", &path).unwrap();
        let req = builder.finish();
        let body = req.body.unwrap();
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("name=\"value\"; filename=\"captcha.png\"\r\n"));
        assert!(text.contains("Content-Type: image/png\r\n\r\n"));
        assert!(body.windows(10).any(|w| w == b"\x89PNG-bytes"));
    }

    #[test]
    fn unknown_extension_falls_back_to_octet_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captcha.zzzunknown");
        std::fs::write(&path, b"data").unwrap();

        let mut builder = RequestBuilder::new(RequestType::Submit, BASE);
        builder.file("value", &path).unwrap();
        let text = String::from_utf8_lossy(builder.finish().body.as_deref().unwrap()).into_owned();
        assert!(text.contains("Content-Type: application/octet-stream\r\n"));
    }

    #[test]
    fn quotes_and_line_breaks_in_names_are_escaped() {
        let mut builder = RequestBuilder::new(RequestType::Submit, BASE);
        let boundary = builder.boundary().to_string();
        builder
            .bytes("value", "a\"b\r\nX-Injected: 1.png", "image/png", b"img")
            .unwrap()
            .text("odd\"name", Some("v"))
            .unwrap();
        let text = body_text(&builder.finish());

        assert!(text.contains("name=\"value\"; filename=\"a%22b%0D%0AX-Injected: 1.png\"\r\n"));
        assert!(text.contains("name=\"odd%22name\"\r\n\r\nv\r\n"));
        assert!(!text.contains("\r\nX-Injected"));
        assert_eq!(text.matches(&format!("--{boundary}\r\n")).count(), 2);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut builder = RequestBuilder::new(RequestType::Submit, BASE);
        let err = builder.file("value", Path::new("/nonexistent/captcha.png")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn parameters_on_get_request_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captcha.png");
        std::fs::write(&path, b"data").unwrap();

        let mut builder = RequestBuilder::new(RequestType::QueryCredit, BASE);
        let err = builder.file("value", &path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        let err = builder.text("username", Some("bob")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
