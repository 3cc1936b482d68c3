//! A scripted HTTP double for provider tests

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    error::TransportError,
    transport::{AsyncHttpClient, HttpClient, HttpRequest, HttpResponse},
};

pub const ISSUER_URL: &str = "http://example.com/";
pub const DISCOVERY_URL: &str = "http://example.com/.well-known/openid-configuration";
pub const TOKEN_ENDPOINT_URL: &str = "http://example.com/token";

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: http::Method,
    pub uri: String,
    pub content_type: Option<String>,
    fields: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn form(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<Result<HttpResponse, String>>,
    requests: Vec<RecordedRequest>,
}

/// Replays queued responses in order and records every request it sees
///
/// Clones share the same script.
#[derive(Clone, Debug, Default)]
pub struct ScriptedHttp {
    script: Arc<Mutex<Script>>,
}

impl ScriptedHttp {
    pub fn respond_json(&self, status: u16, body: serde_json::Value) {
        let response = http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&body).unwrap())
            .unwrap();
        self.script.lock().unwrap().responses.push_back(Ok(response));
    }

    pub fn fail(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .responses
            .push_back(Err(message.to_owned()));
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    fn handle(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.script.lock().unwrap();
        let fields = serde_urlencoded::from_bytes(request.body()).unwrap_or_default();
        script.requests.push(RecordedRequest {
            method: request.method().clone(),
            uri: request.uri().to_string(),
            content_type: request
                .headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            fields,
        });

        match script.responses.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(message.into()),
            None => Err("no scripted response left".into()),
        }
    }
}

impl HttpClient for ScriptedHttp {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.handle(request)
    }
}

#[async_trait]
impl AsyncHttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.handle(request)
    }
}
