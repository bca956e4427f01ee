//! Shared fakes for pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::{LogEntry, LoggerSink};
use bytes::Bytes;
use core_auth::CredentialPair;
use core_graph::GraphApi;
use core_runtime::GraphConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const EXPIRED_BODY: &str = r#"{"error":{"code":"InvalidAuthenticationToken","message":"CompactToken validation failed with reason code: 80049228."}}"#;

/// Replays canned responses in order and records every request
#[derive(Default)]
pub struct ScriptedHttpClient {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        // let concurrent callers interleave between send and reply
        tokio::task::yield_now().await;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BridgeError::OperationFailed("no scripted response left".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LoggerSink for RecordingSink {
    async fn log(&self, entry: LogEntry) -> BridgeResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

pub fn config_with(http: Arc<ScriptedHttpClient>, sink: Arc<RecordingSink>) -> GraphConfig {
    GraphConfig::builder()
        .http_client(http)
        .logger_sink(sink)
        .build()
        .unwrap()
}

pub fn api_with(http: Arc<ScriptedHttpClient>, sink: Arc<RecordingSink>) -> GraphApi {
    GraphApi::new(config_with(http, sink), CredentialPair::new("a1", "r1"))
}
