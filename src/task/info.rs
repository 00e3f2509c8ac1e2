use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Well-known info keys
///
/// The map is open: managers may add their own keys next to these.
pub mod keys {
    /// Terminal status, one of `success`, `cancelled`, `failed`
    pub const STATUS: &str = "status";
    /// Name of the manager that owned the task
    pub const MANAGER: &str = "manager";
    /// Task id (UUID string)
    pub const TASK_ID: &str = "task_id";
    /// Human readable failure description
    pub const ERROR: &str = "error";
    /// Stable snake_case failure code
    pub const ERROR_KIND: &str = "error_kind";
    /// `true` when the image came from a preheated fetch
    pub const PREHEATED: &str = "preheated";
}

/// Machine-readable terminal status carried in every info payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Cancelled,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(TaskStatus::Success),
            "cancelled" => Some(TaskStatus::Cancelled),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Info payload delivered with every completion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ImageInfo(BTreeMap<String, Value>);

impl ImageInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure payload with `error` and `error_kind` filled in
    pub fn failure(error: impl fmt::Display, kind: &str) -> Self {
        Self::new()
            .with(keys::ERROR, error.to_string())
            .with(keys::ERROR_KIND, kind)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.get_str(keys::STATUS).and_then(TaskStatus::parse)
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == Some(TaskStatus::Cancelled)
    }

    pub fn manager(&self) -> Option<&str> {
        self.get_str(keys::MANAGER)
    }

    pub fn error(&self) -> Option<&str> {
        self.get_str(keys::ERROR)
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.get_str(keys::ERROR_KIND)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
