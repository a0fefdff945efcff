//! Scripted upstream backend shared by integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use itinerary_gateway::config::Config;
use itinerary_gateway::handlers::AppState;
use itinerary_gateway::models::ModelId;
use itinerary_gateway::upstream::{
    BackendError, FragmentStream, GenerationRequest, GenerativeBackend, RawModelResponse,
};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// What one model does when called
#[derive(Clone)]
pub enum Step {
    Respond(RawModelResponse),
    RespondAfter(Duration, RawModelResponse),
    Fail(BackendError),
    Hang,
}

/// What one model does when asked to stream
#[derive(Clone)]
pub enum StreamStep {
    Fragments(Vec<Result<String, BackendError>>),
    /// Yields these fragments, then goes silent without closing
    FragmentsThenStall(Vec<String>),
    Fail(BackendError),
    Hang,
}

/// One recorded call; `ended` is set when the call finished or was dropped
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub streaming: bool,
    pub started: Instant,
    pub ended: Option<Instant>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    steps: HashMap<String, Step>,
    stream_steps: HashMap<String, StreamStep>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, model: &str, step: Step) -> Self {
        self.steps.insert(model.to_string(), step);
        self
    }

    pub fn on_stream(mut self, model: &str, step: StreamStep) -> Self {
        self.stream_steps.insert(model.to_string(), step);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_models(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    fn start(&self, model: &ModelId, streaming: bool) -> CallGuard {
        let mut calls = self.calls.lock().unwrap();
        calls.push(Call {
            model: model.short_name().to_string(),
            streaming,
            started: Instant::now(),
            ended: None,
        });
        CallGuard {
            calls: self.calls.clone(),
            index: calls.len() - 1,
        }
    }
}

/// Marks the call as ended on drop, including when a timeout cancels it
struct CallGuard {
    calls: Arc<Mutex<Vec<Call>>>,
    index: usize,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls[self.index].ended = Some(Instant::now());
        }
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn generate(
        &self,
        model: &ModelId,
        _request: &GenerationRequest,
    ) -> Result<RawModelResponse, BackendError> {
        let _guard = self.start(model, false);
        match self.steps.get(model.short_name()).cloned() {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::RespondAfter(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(BackendError::Status {
                status: 404,
                body: format!("no script for {}", model),
                retry_after: None,
            }),
        }
    }

    async fn stream(
        &self,
        model: &ModelId,
        _request: &GenerationRequest,
    ) -> Result<FragmentStream, BackendError> {
        let _guard = self.start(model, true);
        match self.stream_steps.get(model.short_name()).cloned() {
            Some(StreamStep::Fragments(items)) => Ok(futures::stream::iter(items).boxed()),
            Some(StreamStep::FragmentsThenStall(items)) => Ok(futures::stream::iter(items)
                .map(Ok)
                .chain(futures::stream::pending())
                .boxed()),
            Some(StreamStep::Fail(error)) => Err(error),
            Some(StreamStep::Hang) => std::future::pending().await,
            None => Err(BackendError::Status {
                status: 404,
                body: format!("no stream script for {}", model),
                retry_after: None,
            }),
        }
    }
}

pub fn status(code: u16) -> BackendError {
    BackendError::Status {
        status: code,
        body: format!("{{\"error\":{{\"code\":{}}}}}", code),
        retry_after: None,
    }
}

pub const ITINERARY_JSON: &str = r####"{
  "title": "Three days in Lisbon",
  "days": [
    {
      "title": "Day 1: Alfama",
      "activities": [
        {"time": "9:00 AM", "description": "Visit [VENUE]**Castelo de S. Jorge**|https://maps.google.com/?q=Castelo+de+S.+Jorge+Lisbon[/VENUE]."},
        {"time": "1:00 PM", "description": "Lunch at [VENUE]**Taberna da Rua das Flores**|https://maps.google.com/?q=Taberna+Lisbon[/VENUE]."}
      ],
      "insiderTip": "Ride tram 28 before 9 AM."
    }
  ],
  "bookingSuggestions": "### Hotels"
}"####;

/// Config with three single-letter model lists and the given API key
pub fn test_config(api_key: Option<&str>, extra: &str) -> Config {
    let toml = format!(
        r#"
[server]
host = "127.0.0.1"
port = 3001
environment = "test"

[models]
itinerary = ["alpha", "beta", "gamma"]
streaming = ["stream-a", "stream-b"]
chat = ["chat-a", "chat-b"]

[timeouts]
generation_seconds = 5
chat_seconds = 5
{extra}
"#
    );
    let mut config = Config::from_str(&toml).expect("test config should parse");
    config.upstream.api_key = api_key.map(str::to_string);
    config
}

pub fn test_state(backend: Arc<ScriptedBackend>, config: Config) -> AppState {
    AppState::new(Arc::new(config), backend).expect("state should build")
}
