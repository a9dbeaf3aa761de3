//! In-process fake backend for unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::client::Backend;
use crate::{Error, Result};

/// Canned reply for one RPC method or REST path
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Fail(String),
}

/// Backend serving canned replies and recording every call.
///
/// RPC methods and meta methods are keyed by method name, REST calls by
/// `"<VERB> <path>"`. Unknown keys fail like a missing backend method.
#[derive(Debug, Default)]
pub struct FakeBackend {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<(String, Value)>>,
    login_reply: Option<Reply>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.replies.insert(key.to_string(), Reply::Ok(value));
        self
    }

    pub fn failing(mut self, key: &str, message: &str) -> Self {
        self.replies
            .insert(key.to_string(), Reply::Fail(message.to_string()));
        self
    }

    pub fn with_login(mut self, reply: Reply) -> Self {
        self.login_reply = Some(reply);
        self
    }

    /// Recorded calls as `(key, params-or-body)`
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Parameters of every call made under `key`
    pub fn calls_to(&self, key: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    fn answer(&self, key: String, payload: Value) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((key.clone(), payload));
        }
        match self.replies.get(&key) {
            Some(Reply::Ok(value)) => Ok(value.clone()),
            Some(Reply::Fail(message)) => Err(Error::Http {
                status: 500,
                message: message.clone(),
            }),
            None => Err(Error::Http {
                status: 404,
                message: format!("no reply for {}", key),
            }),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn rpc(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.answer(method.to_string(), Value::Array(params))
    }

    async fn meta_rpc(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.answer(method.to_string(), Value::Array(params))
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let query: serde_json::Map<String, Value> = query
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
            .collect();
        self.answer(format!("GET {}", path), Value::Object(query))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.answer(format!("POST {}", path), body.clone())
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.answer(format!("PUT {}", path), body.clone())
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        self.answer(format!("DELETE {}", path), Value::Null)
    }

    async fn post_login_form(&self, fields: &[(&str, &str)]) -> Result<String> {
        let form: serde_json::Map<String, Value> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(("LOGIN".to_string(), Value::Object(form)));
        }
        match &self.login_reply {
            Some(Reply::Ok(Value::String(text))) => Ok(text.clone()),
            Some(Reply::Ok(other)) => Ok(other.to_string()),
            Some(Reply::Fail(message)) => Err(Error::Auth(message.clone())),
            None => Err(Error::Auth("no login reply".to_string())),
        }
    }
}
