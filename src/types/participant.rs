use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    /// A human-operated chat panel.
    Panel,
    Worker,
    Responder,
    Orchestrator,
    #[default]
    #[serde(other)]
    Agent,
}

impl ParticipantType {
    pub fn is_human(self) -> bool {
        matches!(self, Self::Panel)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MethodAdvertisement {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    Plan,
    Edit,
    Auto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantMetrics {
    #[serde(default)]
    pub context_used_tokens: Option<u64>,
    #[serde(default)]
    pub context_window_tokens: Option<u64>,
    #[serde(default)]
    pub execution_mode: Option<ExecutionMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub participant_type: ParticipantType,
    pub handle: String,
    #[serde(default)]
    pub metrics: Option<ParticipantMetrics>,
    #[serde(default)]
    pub methods: Vec<MethodAdvertisement>,
}

impl ParticipantSnapshot {
    pub fn new(
        id: impl Into<String>,
        handle: impl Into<String>,
        participant_type: ParticipantType,
    ) -> Self {
        let handle = handle.into();
        Self {
            id: id.into(),
            name: handle.clone(),
            participant_type,
            handle,
            metrics: None,
            methods: Vec::new(),
        }
    }

    pub fn method_description(&self, method_name: &str) -> Option<&str> {
        self.methods
            .iter()
            .find(|m| m.name == method_name)
            .and_then(|m| m.description.as_deref())
    }
}
