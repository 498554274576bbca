use chrono::{DateTime, Utc};
use form_flow::{FormSession, FormSnapshot, HostConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `POST /forms`: the same settings a host mounts a form with.
pub type CreateFormRequest = HostConfig;

/// `PATCH /forms/{id}/fields`: dotted path to new value. `null` clears the
/// field.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFieldsRequest {
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormResponse {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub config: HostConfig,
    pub form: FormSnapshot,
}

impl FormResponse {
    pub fn new(session: &FormSession, form: FormSnapshot) -> Self {
        Self {
            session_id: session.id.clone(),
            created_at: session.created_at,
            config: session.config.clone(),
            form,
        }
    }
}

/// What `POST /quotes` and `POST /claims` hand back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
