//! Mock Analysis Backend
//!
//! Axum server on an ephemeral localhost port. Every request is recorded;
//! responses come from a per-route queue, then a per-route fallback.
//!
//! Routes are keyed by method and first path segment, e.g. `"GET /picron"`
//! or `"GET /"` for the root.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

type Responder = Arc<dyn Fn() -> (u16, String) + Send + Sync>;

/// Canned or computed response
#[derive(Clone)]
pub enum MockResponse {
    Fixed { status: u16, body: String },
    Computed(Responder),
}

impl MockResponse {
    pub fn json(body: Value) -> Self {
        Self::Fixed {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn text(body: &str) -> Self {
        Self::Fixed {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn error(status: u16, body: &str) -> Self {
        Self::Fixed {
            status,
            body: body.to_string(),
        }
    }

    /// JSON body built when the request arrives
    pub fn json_with<F>(build: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(move || (200, build().to_string())))
    }

    fn render(&self) -> (u16, String) {
        match self {
            MockResponse::Fixed { status, body } => (*status, body.clone()),
            MockResponse::Computed(build) => build(),
        }
    }
}

/// One request seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Raw (still percent-encoded) path
    pub path: String,
    pub body: String,
    pub at: Instant,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Default)]
struct RouteScript {
    queue: VecDeque<MockResponse>,
    fallback: Option<MockResponse>,
}

#[derive(Default)]
struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    routes: Mutex<HashMap<String, RouteScript>>,
}

/// Running mock backend
pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Start the server; unscripted routes answer `200 {}`
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
            server,
        }
    }

    /// Response used once, before the fallback
    pub fn enqueue(&self, route: &str, response: MockResponse) -> &Self {
        self.state
            .routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .queue
            .push_back(response);
        self
    }

    /// Response used whenever the queue is empty
    pub fn set_fallback(&self, route: &str, response: MockResponse) -> &Self {
        self.state
            .routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .fallback = Some(response);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests whose method and path prefix match, e.g. `("GET", "/predict")`
    pub fn requests_to(&self, method: &str, path_prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .collect()
    }

    pub fn count(&self, method: &str, path_prefix: &str) -> usize {
        self.requests_to(method, path_prefix).len()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Unused localhost URL: bind, read the port, release it
pub async fn unreachable_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Localhost server that accepts connections but never answers
pub struct StalledBackend {
    pub base_url: String,
    _listener: tokio::net::TcpListener,
}

impl StalledBackend {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        Self {
            base_url: format!("http://{}", addr),
            _listener: listener,
        }
    }
}

async fn handle(State(state): State<Arc<MockState>>, method: Method, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        body: String::from_utf8_lossy(&body).into_owned(),
        at: Instant::now(),
    });

    let first_segment = path.trim_start_matches('/').split('/').next().unwrap_or("");
    let key = format!("{} /{}", method, first_segment);

    let response = {
        let mut routes = state.routes.lock().unwrap();
        routes.get_mut(&key).and_then(|script| {
            script
                .queue
                .pop_front()
                .or_else(|| script.fallback.clone())
        })
    };

    let (status, body) = response
        .map(|r| r.render())
        .unwrap_or((200, "{}".to_string()));
    let content_type = if serde_json::from_str::<Value>(&body).is_ok() {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    };

    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response()
}
