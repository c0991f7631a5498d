//! Container engine API payloads (API version v1.24)

use serde::{Deserialize, Serialize};

use crate::domain::container::ContainerState;

/// Response of `GET /images/{name}/json` (only the fields we use)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageInspect {
    pub id: String,
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
}

/// Body of `POST /containers/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateContainer {
    pub image: String,
}

/// Response of `POST /containers/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreated {
    pub id: String,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

/// Response of `GET /containers/{id}/json` (only the fields we use)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub state: ContainerStateDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerStateDto {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub exit_code: i64,
    #[serde(default)]
    pub error: String,
}

impl From<ContainerStateDto> for ContainerState {
    fn from(dto: ContainerStateDto) -> Self {
        Self {
            status: dto.status,
            running: dto.running,
            exit_code: dto.exit_code,
            error: dto.error,
        }
    }
}

/// One JSON message of a pull/build/push progress stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    #[serde(default)]
    pub status: Option<String>,
    /// Build output line
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_detail: Option<ErrorDetail>,
    #[serde(default)]
    pub aux: Option<serde_json::Value>,
}

impl StreamMessage {
    /// Error text carried by the message, if any
    pub fn error_text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.error_detail.as_ref().map(|d| d.message.as_str()))
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Error body returned by the engine on non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineErrorBody {
    pub message: String,
}
