use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodStatus {
    #[default]
    Pending,
    Success,
    Error,
}

impl MethodStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MethodCallRecord {
    pub call_id: String,
    pub method_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub status: MethodStatus,
    #[serde(default)]
    pub console_output: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
    pub provider_id: String,
    pub caller_id: String,
    #[serde(default)]
    pub handled_locally: bool,
    #[serde(default)]
    pub progress: Option<f64>,
}

/// Shallow overwrite for an existing record; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodRecordPatch {
    pub description: Option<String>,
    pub args: Option<Value>,
    pub status: Option<MethodStatus>,
    pub console_output: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub completed_at: Option<i64>,
    pub handled_locally: Option<bool>,
    pub progress: Option<f64>,
}

impl MethodCallRecord {
    pub fn apply_patch(&mut self, patch: MethodRecordPatch) {
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(args) = patch.args {
            self.args = args;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(output) = patch.console_output {
            self.console_output = output;
        }
        if let Some(result) = patch.result {
            self.result = Some(result);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
        if let Some(handled_locally) = patch.handled_locally {
            self.handled_locally = handled_locally;
        }
        if let Some(progress) = patch.progress {
            self.progress = Some(progress);
        }
    }

    /// Takes every field from `incoming`, keeping console output already
    /// accumulated when the duplicate carries none. Callers only merge into
    /// pending records.
    pub fn merge_from(&mut self, incoming: MethodCallRecord) {
        let console_output = std::mem::take(&mut self.console_output);
        *self = incoming;
        if self.console_output.is_empty() {
            self.console_output = console_output;
        }
    }
}
