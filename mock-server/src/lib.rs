//! In-process stand-in for the CaptchaTrader API.
//!
//! Speaks the same wire format as the real service: `.xml` endpoints,
//! multipart POST bodies, credentials as `/username:U/password:P` path
//! segments on GET, and XML replies. Failures are `<error status="...">`
//! documents sent with a matching 4xx status.
//!
//! "Solving" is deterministic: an uploaded file decodes to its trimmed,
//! upper-cased contents; a URL decodes to the upper-cased file stem of its
//! last path segment.

use std::{
    collections::HashMap,
    sync::Arc,
};

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, sync::RwLock};

pub const DEMO_USER: &str = "demo";
pub const DEMO_PASSWORD: &str = "secret";
pub const DEMO_CREDITS: i64 = 100;
pub const DEMO_CHALLENGE: &str = "data:image/png;base64,iVBORw0KGgo=";

#[derive(Clone, Debug)]
pub struct Account {
    pub password: String,
    pub credits: i64,
}

/// A submitted job awaiting feedback.
#[derive(Clone, Debug)]
struct Job {
    owner: String,
}

#[derive(Debug)]
pub struct Service {
    pub accounts: HashMap<String, Account>,
    /// Queue snapshot reported by `get_wait_time`: (position, length, eta).
    pub queue: (i64, i64, i64),
    next_ticket: u64,
    jobs: HashMap<u64, Job>,
    /// Solver username -> assigned ticket.
    solvers: HashMap<String, u64>,
}

impl Default for Service {
    fn default() -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(
            DEMO_USER.to_string(),
            Account {
                password: DEMO_PASSWORD.to_string(),
                credits: DEMO_CREDITS,
            },
        );
        Self {
            accounts,
            queue: (2, 10, 30),
            next_ticket: 1000,
            jobs: HashMap::new(),
            solvers: HashMap::new(),
        }
    }
}

impl Service {
    fn authenticate(&self, username: Option<&str>, password: Option<&str>) -> Result<String, Xml> {
        match (username, password) {
            (Some(username), Some(password))
                if self
                    .accounts
                    .get(username)
                    .is_some_and(|account| account.password == password) =>
            {
                Ok(username.to_string())
            }
            _ => Err(Xml::error(StatusCode::UNAUTHORIZED, "INVALID USER")),
        }
    }

    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

pub type Db = Arc<RwLock<Service>>;

/// An XML reply with its HTTP status.
#[derive(Debug)]
pub struct Xml(StatusCode, String);

impl Xml {
    fn ok(body: String) -> Self {
        Xml(StatusCode::OK, body)
    }

    fn error(status: StatusCode, message: &str) -> Self {
        Xml(
            status,
            format!(r#"<error status="{}">{message}</error>"#, status.as_u16()),
        )
    }

    fn success(flag: &str) -> Self {
        Xml::ok(format!("<success>{flag}</success>"))
    }
}

impl IntoResponse for Xml {
    fn into_response(self) -> Response {
        let Xml(status, body) = self;
        (status, [(header::CONTENT_TYPE, "text/xml")], body).into_response()
    }
}

pub fn app() -> Router {
    app_with(Service::default())
}

pub fn app_with(service: Service) -> Router {
    let db: Db = Arc::new(RwLock::new(service));
    Router::new()
        .route("/submit.xml", post(submit))
        .route("/respond.xml", post(respond))
        .route("/answer.xml", post(answer))
        .route("/dequeue.xml", post(dequeue))
        .route("/get_credits.xml", get(credits_anonymous))
        .route("/get_credits/{user}/{pass}", get(credits))
        .route("/get_wait_time.xml", get(wait_time_anonymous))
        .route("/get_wait_time/{user}/{pass}", get(wait_time))
        .route("/enqueue.xml", get(enqueue_anonymous))
        .route("/enqueue/{user}/{pass}", get(enqueue))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Multipart fields: text values and uploaded files.
#[derive(Debug, Default)]
struct Form {
    text: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, Xml> {
        let invalid = |_| Xml::error(StatusCode::BAD_REQUEST, "INVALID PARAMETERS");
        let mut form = Form::default();
        while let Some(field) = multipart.next_field().await.map_err(invalid)? {
            let name = field.name().unwrap_or_default().to_string();
            let is_file = field.file_name().is_some();
            let data = field.bytes().await.map_err(invalid)?;
            if is_file {
                form.files.insert(name, data.to_vec());
            } else {
                form.text
                    .insert(name, String::from_utf8_lossy(&data).into_owned());
            }
        }
        Ok(form)
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(String::as_str)
    }
}

/// Split `username:U` / `password:P.xml` path segments.
fn path_credentials(user: &str, pass: &str) -> (Option<String>, Option<String>) {
    let username = user.strip_prefix("username:").map(str::to_string);
    let password = pass
        .strip_prefix("password:")
        .and_then(|p| p.strip_suffix(".xml"))
        .map(str::to_string);
    (username, password)
}

fn decode(form: &Form) -> Option<String> {
    if let Some(bytes) = form.files.get("value") {
        return Some(String::from_utf8_lossy(bytes).trim().to_uppercase());
    }
    let url = form.get("value")?;
    let segment = url.rsplit('/').next()?;
    let stem = segment.split('.').next().unwrap_or(segment);
    Some(stem.to_uppercase())
}

macro_rules! try_xml {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(xml) => return xml,
        }
    };
}

async fn submit(State(db): State<Db>, multipart: Multipart) -> Xml {
    let form = try_xml!(Form::read(multipart).await);
    let mut service = db.write().await;
    let user = try_xml!(service.authenticate(form.get("username"), form.get("password")));
    let Some(answer) = decode(&form).filter(|a| !a.is_empty()) else {
        return Xml::error(StatusCode::BAD_REQUEST, "INVALID PARAMETERS");
    };
    let Some(account) = service.accounts.get_mut(&user) else {
        return Xml::error(StatusCode::UNAUTHORIZED, "INVALID USER");
    };
    if account.credits <= 0 {
        return Xml::error(StatusCode::FORBIDDEN, "INSUFFICIENT CREDITS");
    }
    account.credits -= 1;
    let ticket = service.issue_ticket();
    service.jobs.insert(ticket, Job { owner: user });
    log::info!("job {ticket} decoded as {answer}");
    Xml::ok(format!(
        r#"<job id="{ticket}"><response>{answer}</response></job>"#
    ))
}

async fn respond(State(db): State<Db>, multipart: Multipart) -> Xml {
    let form = try_xml!(Form::read(multipart).await);
    let mut service = db.write().await;
    let user = try_xml!(service.authenticate(form.get("username"), form.get("password")));
    let ticket = form.get("ticket").and_then(|t| t.parse::<u64>().ok());
    let job = ticket.and_then(|t| service.jobs.get(&t)).filter(|job| job.owner == user);
    if job.is_none() {
        return Xml::error(StatusCode::BAD_REQUEST, "INVALID TICKET");
    }
    if let Some(ticket) = ticket {
        service.jobs.remove(&ticket);
    }
    if form.get("is_correct") == Some("false") {
        if let Some(account) = service.accounts.get_mut(&user) {
            account.credits += 1;
        }
    }
    Xml::success("1")
}

async fn answer(State(db): State<Db>, multipart: Multipart) -> Xml {
    let form = try_xml!(Form::read(multipart).await);
    let mut service = db.write().await;
    let user = try_xml!(service.authenticate(form.get("username"), form.get("password")));
    let ticket = form.get("ticket").and_then(|t| t.parse::<u64>().ok());
    if ticket.is_none() || service.solvers.get(&user) != ticket.as_ref() {
        return Xml::error(StatusCode::BAD_REQUEST, "INVALID TICKET");
    }
    if form.get("value").unwrap_or_default().is_empty() {
        return Xml::error(StatusCode::BAD_REQUEST, "INVALID PARAMETERS");
    }
    service.solvers.remove(&user);
    if let Some(account) = service.accounts.get_mut(&user) {
        account.credits += 1;
    }
    Xml::success("1")
}

async fn dequeue(State(db): State<Db>, multipart: Multipart) -> Xml {
    let form = try_xml!(Form::read(multipart).await);
    let mut service = db.write().await;
    let user = try_xml!(service.authenticate(form.get("username"), form.get("password")));
    match service.solvers.remove(&user) {
        Some(_) => Xml::success("0"),
        None => Xml::error(StatusCode::BAD_REQUEST, "NOT ENQUEUED"),
    }
}

async fn credits_anonymous() -> Xml {
    Xml::error(StatusCode::UNAUTHORIZED, "INVALID USER")
}

async fn credits(State(db): State<Db>, Path((user, pass)): Path<(String, String)>) -> Xml {
    let (username, password) = path_credentials(&user, &pass);
    let service = db.read().await;
    let user = try_xml!(service.authenticate(username.as_deref(), password.as_deref()));
    let credits = service.accounts.get(&user).map_or(0, |account| account.credits);
    Xml::ok(format!("<user><credits>{credits}</credits></user>"))
}

async fn wait_time_anonymous(State(db): State<Db>) -> Xml {
    queue_reply(&*db.read().await)
}

async fn wait_time(State(db): State<Db>, Path((user, pass)): Path<(String, String)>) -> Xml {
    let (username, password) = path_credentials(&user, &pass);
    let service = db.read().await;
    try_xml!(service.authenticate(username.as_deref(), password.as_deref()));
    queue_reply(&service)
}

fn queue_reply(service: &Service) -> Xml {
    let (position, length, eta) = service.queue;
    Xml::ok(format!(
        "<queue><position>{position}</position><length>{length}</length><eta>{eta}</eta></queue>"
    ))
}

async fn enqueue_anonymous() -> Xml {
    Xml::error(StatusCode::UNAUTHORIZED, "INVALID USER")
}

async fn enqueue(State(db): State<Db>, Path((user, pass)): Path<(String, String)>) -> Xml {
    let (username, password) = path_credentials(&user, &pass);
    let mut service = db.write().await;
    let user = try_xml!(service.authenticate(username.as_deref(), password.as_deref()));
    if service.solvers.contains_key(&user) {
        return Xml::error(StatusCode::CONFLICT, "CONNECTION LIMIT");
    }
    let ticket = service.issue_ticket();
    service.solvers.insert(user, ticket);
    Xml::ok(format!(
        r#"<job id="{ticket}"><challenge>{DEMO_CHALLENGE}</challenge></job>"#
    ))
}
