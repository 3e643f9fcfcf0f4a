//! Collection Context
//!
//! Per-invocation state threaded through a collection call: session
//! correlation, deadline, credentials, retry bookkeeping and a thread-safe
//! variable bag that plugins may use as scratch space.
//!
//! Cloning a context is a deep copy. The engine clones once per metric when a
//! batch fans out, so retry counters and variables never leak between metrics
//! while the session id stays shared for correlation.

use std::collections::HashMap;
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

/// Thread-safe key/value scratch space
#[derive(Debug, Default)]
pub struct VariableBag {
    inner: RwLock<HashMap<String, Value>>,
}

impl VariableBag {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.write().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Clone for VariableBag {
    fn clone(&self) -> Self {
        Self { inner: RwLock::new(self.inner.read().clone()) }
    }
}

/// State for one logical collection operation
#[derive(Debug, Clone)]
pub struct CollectionContext {
    pub session_id: Option<String>,
    pub task_id: Option<u64>,
    pub user_id: Option<u64>,
    pub start_time: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub credentials: HashMap<String, Value>,
    pub parameters: HashMap<String, Value>,
    pub variables: VariableBag,
    pub debug_mode: bool,
    /// Test mode stops batch collection at the first failure
    pub test_mode: bool,
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_interval_ms: u64,
    pub current_retry: u32,
    pub enable_cache: bool,
    pub enable_retry: bool,
    pub enable_parallel_collection: bool,
    pub max_concurrency: usize,
    pub priority: i32,
    pub tags: HashMap<String, String>,
}

impl Default for CollectionContext {
    fn default() -> Self {
        Self {
            session_id: None,
            task_id: None,
            user_id: None,
            start_time: Utc::now(),
            deadline: None,
            credentials: HashMap::new(),
            parameters: HashMap::new(),
            variables: VariableBag::default(),
            debug_mode: false,
            test_mode: false,
            timeout_ms: 30_000,
            max_retries: 3,
            retry_interval_ms: 1000,
            current_retry: 0,
            enable_cache: true,
            enable_retry: true,
            enable_parallel_collection: false,
            max_concurrency: 10,
            priority: 5,
            tags: HashMap::new(),
        }
    }
}

impl CollectionContext {
    /// Default context with a freshly generated session id
    pub fn create_default() -> Self {
        Self {
            session_id: Some(generate_session_id()),
            ..Default::default()
        }
    }

    /// Context for connection tests and dry runs
    pub fn create_for_test() -> Self {
        Self {
            session_id: Some(format!("test-{}", Utc::now().timestamp_millis())),
            debug_mode: true,
            test_mode: true,
            timeout_ms: 10_000,
            max_retries: 1,
            retry_interval_ms: 500,
            enable_cache: false,
            enable_retry: false,
            max_concurrency: 1,
            ..Default::default()
        }
    }

    pub fn for_task(task_id: u64) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::create_default()
        }
    }

    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = chrono::Duration::from_std(timeout).ok().map(|d| Utc::now() + d);
        self
    }

    pub fn increment_retry(&mut self) {
        self.current_retry += 1;
    }

    pub fn reset_retry(&mut self) {
        self.current_retry = 0;
    }

    pub fn can_retry(&self) -> bool {
        self.current_retry < self.max_retries
    }

    pub fn is_timeout(&self) -> bool {
        self.deadline.is_some_and(|deadline| Utc::now() > deadline)
    }

    /// Time left until the deadline; `None` when unbounded
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline.map(|deadline| (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Ensure a session id exists, generating one if needed, and return it
    pub fn ensure_session_id(&mut self) -> String {
        self.session_id.get_or_insert_with(generate_session_id).clone()
    }
}

pub fn generate_session_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_is_deep() {
        let mut original = CollectionContext::create_default();
        original.variables.set("counter", Value::from(1));
        original.increment_retry();

        let mut copy = original.clone();
        copy.variables.set("counter", Value::from(2));
        copy.increment_retry();
        copy.parameters.insert("community".into(), Value::from("public"));

        assert_eq!(original.variables.get("counter"), Some(Value::from(1)));
        assert_eq!(original.current_retry, 1);
        assert_eq!(copy.current_retry, 2);
        assert!(original.parameters.is_empty());
        assert_eq!(original.session_id, copy.session_id);
    }

    #[test]
    fn test_retry_bookkeeping() {
        let mut ctx = CollectionContext::create_for_test();
        assert!(ctx.test_mode);
        assert!(ctx.can_retry());
        ctx.increment_retry();
        assert!(!ctx.can_retry());
        ctx.reset_retry();
        assert!(ctx.can_retry());
    }

    #[test]
    fn test_deadline() {
        let ctx = CollectionContext::default();
        assert!(!ctx.is_timeout());
        assert!(ctx.remaining_time().is_none());

        let ctx = CollectionContext::default().with_deadline(Duration::from_secs(60));
        assert!(!ctx.is_timeout());
        assert!(ctx.remaining_time().unwrap() > Duration::from_secs(50));

        let mut ctx = CollectionContext::default();
        ctx.deadline = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(ctx.is_timeout());
        assert_eq!(ctx.remaining_time(), Some(Duration::ZERO));
    }

    #[test]
    fn test_ensure_session_id() {
        let mut ctx = CollectionContext::default();
        let id = ctx.ensure_session_id();
        assert!(!id.is_empty());
        assert_eq!(ctx.ensure_session_id(), id);
    }
}
