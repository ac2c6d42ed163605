use serde::Serialize;
use serde_json::Value;

use crate::API_VERSION;
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Serialize)]
pub struct SuccessEnvelope {
    pub ok: bool,
    pub command: String,
    pub version: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureEnvelope {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub version: String,
    pub error: ErrorContract,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorContract {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
}

impl From<&ClientError> for ErrorContract {
    fn from(error: &ClientError) -> Self {
        Self {
            code: error.code.clone(),
            message: error.message.clone(),
            recovery_steps: error.recovery_steps.clone(),
        }
    }
}

pub fn success<T>(command: &str, data: T) -> ClientResult<SuccessEnvelope>
where
    T: Serialize,
{
    let json_data = serde_json::to_value(data)
        .map_err(|err| ClientError::internal_serialization(&err.to_string()))?;
    Ok(SuccessEnvelope {
        ok: true,
        command: command.to_string(),
        version: API_VERSION.to_string(),
        data: json_data,
    })
}

pub fn failure_from_error(command: Option<&str>, error: &ClientError) -> FailureEnvelope {
    FailureEnvelope {
        ok: false,
        command: command.map(ToString::to_string),
        version: API_VERSION.to_string(),
        error: ErrorContract::from(error),
        data: error.data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{failure_from_error, success};
    use crate::ClientError;

    #[test]
    fn success_wraps_serialized_data() {
        let envelope = success("category list", json!({ "categories": [] }));
        assert!(envelope.is_ok());
        if let Ok(envelope) = envelope {
            assert!(envelope.ok);
            assert_eq!(envelope.command, "category list");
            assert_eq!(envelope.data["categories"], json!([]));
        }
    }

    #[test]
    fn failure_keeps_code_and_data() {
        let error = ClientError::invalid_batch_format("bad batch", "json_scalar");
        let envelope = failure_from_error(Some("register"), &error);
        let encoded = serde_json::to_value(&envelope);
        assert!(encoded.is_ok());
        if let Ok(encoded) = encoded {
            assert_eq!(encoded["ok"], json!(false));
            assert_eq!(encoded["command"], json!("register"));
            assert_eq!(encoded["error"]["code"], json!("invalid_batch_format"));
            assert_eq!(encoded["data"]["received_format"], json!("json_scalar"));
        }
    }
}
