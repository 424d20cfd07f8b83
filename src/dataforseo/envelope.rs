//! DataForSEO response envelope and task-result extraction.
//!
//! Every DataForSEO response wraps its payload twice: a top-level envelope with
//! its own status code, and a list of tasks each carrying a status code and an
//! opaque `result`. Both layers must be checked.
//!
//! Requests always send exactly one item, so only the first task is ever read.
//! Extra tasks in a response are ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{ClientError, Provider};
use crate::json::null_as_default;

/// Envelope or task processed successfully.
pub const STATUS_OK: i64 = 20000;

/// Task accepted and queued (task_post endpoints).
pub const STATUS_TASK_CREATED: i64 = 20100;

/// Resource not found. On task-status endpoints: not finished yet.
pub const STATUS_NOT_FOUND: i64 = 40400;

const PROVIDER: Provider = Provider::DataForSeo;

/// Top-level DataForSEO response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// API version string.
    #[serde(default)]
    pub version: String,
    /// Envelope status code; `20000` on success.
    pub status_code: i64,
    /// Envelope status message.
    #[serde(default)]
    pub status_message: String,
    /// Server-side processing time.
    #[serde(default)]
    pub time: String,
    /// Total cost of the request in USD.
    #[serde(default)]
    pub cost: f64,
    /// Number of tasks in the envelope.
    #[serde(default)]
    pub tasks_count: i64,
    /// Number of tasks that failed.
    #[serde(default)]
    pub tasks_error: i64,
    /// Ordered task list. `null` decodes as empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<Task>,
}

/// One unit of work within an [`Envelope`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier, used to fetch results of asynchronous tasks.
    #[serde(default)]
    pub id: String,
    /// Task status code, independent of the envelope's.
    pub status_code: i64,
    /// Task status message.
    #[serde(default)]
    pub status_message: String,
    /// Server-side processing time.
    #[serde(default)]
    pub time: String,
    /// Task cost in USD.
    #[serde(default)]
    pub cost: f64,
    /// Number of entries in `result`.
    #[serde(default)]
    pub result_count: i64,
    /// Endpoint path segments the task ran against.
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<String>,
    /// Echo of the request parameters.
    #[serde(default)]
    pub data: Option<Value>,
    /// Endpoint-specific payload. Absent or `null` means no result.
    #[serde(default)]
    pub result: Option<Value>,
}

impl Envelope {
    /// Returns true when the envelope status is [`STATUS_OK`].
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// Fails with [`ClientError::Api`] unless the envelope status is [`STATUS_OK`].
    ///
    /// # Errors
    ///
    /// Returns the envelope's code and message as a [`ClientError::Api`].
    pub fn ensure_ok(&self) -> Result<(), ClientError> {
        if self.is_ok() {
            return Ok(());
        }
        Err(ClientError::api(
            PROVIDER,
            self.status_code,
            self.status_message.clone(),
        ))
    }

    /// Returns the first task, or [`ClientError::NoTasks`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoTasks`] when the task list is empty.
    pub fn first_task(&self) -> Result<&Task, ClientError> {
        self.tasks
            .first()
            .ok_or(ClientError::NoTasks { provider: PROVIDER })
    }
}

/// Decodes an envelope without checking its status code.
///
/// # Errors
///
/// Returns [`ClientError::Decode`] for malformed JSON.
pub fn decode_envelope(body: &[u8]) -> Result<Envelope, ClientError> {
    serde_json::from_slice(body).map_err(|e| ClientError::decode(PROVIDER, "response envelope", e))
}

/// Decodes an envelope and fails unless its status code is [`STATUS_OK`].
///
/// # Errors
///
/// Returns [`ClientError::Decode`] for malformed JSON or [`ClientError::Api`]
/// for a non-success envelope.
pub fn decode_envelope_strict(body: &[u8]) -> Result<Envelope, ClientError> {
    let envelope = decode_envelope(body)?;
    envelope.ensure_ok()?;
    Ok(envelope)
}

/// Extracts the first task's `result` into `T`.
///
/// This is the single place typed endpoints read task results from.
///
/// # Errors
///
/// - [`ClientError::NoTasks`] - the task list is empty
/// - [`ClientError::Task`] - the task status is not [`STATUS_OK`]
/// - [`ClientError::EmptyResult`] - the task has no `result`
/// - [`ClientError::Decode`] - `result` does not fit `T`
pub fn first_task_result<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ClientError> {
    let task = envelope.first_task()?;
    if task.status_code != STATUS_OK {
        return Err(ClientError::task(
            PROVIDER,
            task.status_code,
            task.status_message.clone(),
        ));
    }
    let Some(result) = task.result.as_ref() else {
        return Err(ClientError::EmptyResult { provider: PROVIDER });
    };
    debug!(task_id = %task.id, result_count = task.result_count, "extracting task result");
    T::deserialize(result).map_err(|e| ClientError::decode(PROVIDER, "task result", e))
}

/// Returns the id of a freshly posted task.
///
/// Accepts task status [`STATUS_OK`] or [`STATUS_TASK_CREATED`]; task_post
/// endpoints carry no `result`.
///
/// # Errors
///
/// Returns [`ClientError::NoTasks`], [`ClientError::Task`] for other task
/// codes, or [`ClientError::EmptyResult`] when the id is blank.
pub fn created_task_id(envelope: &Envelope) -> Result<String, ClientError> {
    let task = envelope.first_task()?;
    if task.status_code != STATUS_OK && task.status_code != STATUS_TASK_CREATED {
        return Err(ClientError::task(
            PROVIDER,
            task.status_code,
            task.status_message.clone(),
        ));
    }
    if task.id.trim().is_empty() {
        return Err(ClientError::EmptyResult { provider: PROVIDER });
    }
    Ok(task.id.clone())
}

/// Serialises `result` into a successful single-task envelope.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn ok_envelope_bytes<T: Serialize>(result: &T) -> Vec<u8> {
    let task = Task {
        id: "08011200-1535-0387-0000-7b9e4b3d0b1a".into(),
        status_code: STATUS_OK,
        status_message: "Ok.".into(),
        result_count: 1,
        result: Some(serde_json::to_value(result).expect("result serialises")),
        ..Task::default()
    };
    let envelope = Envelope {
        version: "0.1.20240801".into(),
        status_code: STATUS_OK,
        status_message: "Ok.".into(),
        tasks_count: 1,
        tasks: vec![task],
        ..Envelope::default()
    };
    serde_json::to_vec(&envelope).expect("envelope serialises")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope_with(task: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "version": "0.1.20240801",
            "status_code": 20000,
            "status_message": "Ok.",
            "time": "0.1 sec.",
            "cost": 0.01,
            "tasks_count": 1,
            "tasks_error": 0,
            "tasks": [task],
        }))
        .unwrap()
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        keyword: String,
        search_volume: i64,
    }

    #[test]
    fn test_strict_decode_and_extract() {
        let body = envelope_with(json!({
            "id": "t-1",
            "status_code": 20000,
            "status_message": "Ok.",
            "result": [{"keyword": "rust", "search_volume": 1000}],
        }));
        let envelope = decode_envelope_strict(&body).unwrap();
        let items: Vec<Item> = first_task_result(&envelope).unwrap();
        assert_eq!(
            items,
            vec![Item {
                keyword: "rust".into(),
                search_volume: 1000
            }]
        );
    }

    #[test]
    fn test_strict_decode_rejects_non_ok_envelope() {
        let body = br#"{"status_code": 40100, "status_message": "You are not authorized", "tasks": null}"#;
        let error = decode_envelope_strict(body).unwrap_err();
        let msg = error.to_string();
        assert!(matches!(error, ClientError::Api { code: 40100, .. }));
        assert!(msg.contains("40100"), "got: {msg}");
        assert!(msg.contains("You are not authorized"), "got: {msg}");
    }

    #[test]
    fn test_permissive_decode_keeps_non_ok_envelope() {
        let body = br#"{"status_code": 40400, "status_message": "Not Found.", "tasks": []}"#;
        let envelope = decode_envelope(body).unwrap();
        assert_eq!(envelope.status_code, STATUS_NOT_FOUND);
        assert!(!envelope.is_ok());
    }

    #[test]
    fn test_no_tasks_error() {
        let envelope = decode_envelope_strict(br#"{"status_code": 20000, "tasks": []}"#).unwrap();
        let error = first_task_result::<Vec<Item>>(&envelope).unwrap_err();
        assert_eq!(error.to_string(), "dataforseo: no tasks in response");
    }

    #[test]
    fn test_task_error() {
        let body = envelope_with(json!({
            "id": "t-2",
            "status_code": 40501,
            "status_message": "Invalid Field: 'keyword'.",
            "result": null,
        }));
        let envelope = decode_envelope_strict(&body).unwrap();
        let error = first_task_result::<Vec<Item>>(&envelope).unwrap_err();
        assert!(
            error
                .to_string()
                .contains("task error 40501: Invalid Field: 'keyword'.")
        );
    }

    #[test]
    fn test_null_result_is_empty_result() {
        let body = envelope_with(json!({"id": "t-3", "status_code": 20000, "result": null}));
        let envelope = decode_envelope_strict(&body).unwrap();
        let error = first_task_result::<Vec<Item>>(&envelope).unwrap_err();
        assert_eq!(error.to_string(), "dataforseo: empty result");
    }

    #[test]
    fn test_result_shape_mismatch_is_decode_error() {
        let body = envelope_with(json!({"id": "t-4", "status_code": 20000, "result": {"x": 1}}));
        let envelope = decode_envelope_strict(&body).unwrap();
        let error = first_task_result::<Vec<Item>>(&envelope).unwrap_err();
        assert!(matches!(error, ClientError::Decode { .. }));
    }

    #[test]
    fn test_malformed_json_is_decode_error() {
        let error = decode_envelope(b"<html>gateway</html>").unwrap_err();
        assert!(matches!(error, ClientError::Decode { .. }));
    }

    #[test]
    fn test_only_first_task_is_read() {
        let body = serde_json::to_vec(&json!({
            "status_code": 20000,
            "tasks": [
                {"id": "a", "status_code": 20000, "result": [{"keyword": "first", "search_volume": 1}]},
                {"id": "b", "status_code": 40000, "result": null},
            ],
        }))
        .unwrap();
        let envelope = decode_envelope_strict(&body).unwrap();
        let items: Vec<Item> = first_task_result(&envelope).unwrap();
        assert_eq!(items[0].keyword, "first");
    }

    #[test]
    fn test_created_task_id_accepts_20100() {
        let body = envelope_with(json!({"id": "07281559-0695-0216-0000-c3e1e9bd6e4b", "status_code": 20100, "status_message": "Task Created.", "result": null}));
        let envelope = decode_envelope_strict(&body).unwrap();
        assert_eq!(
            created_task_id(&envelope).unwrap(),
            "07281559-0695-0216-0000-c3e1e9bd6e4b"
        );
    }

    #[test]
    fn test_created_task_id_rejects_task_error() {
        let body = envelope_with(json!({"id": "x", "status_code": 40200, "status_message": "Payment Required."}));
        let envelope = decode_envelope_strict(&body).unwrap();
        assert!(matches!(
            created_task_id(&envelope),
            Err(ClientError::Task { code: 40200, .. })
        ));
    }

    #[test]
    fn test_envelope_round_trip_preserves_fields() {
        let envelope = Envelope {
            version: "0.1".into(),
            status_code: STATUS_OK,
            status_message: "Ok.".into(),
            time: "0.2 sec.".into(),
            cost: 0.25,
            tasks_count: 1,
            tasks_error: 0,
            tasks: vec![Task {
                id: "t".into(),
                status_code: STATUS_OK,
                status_message: "Ok.".into(),
                time: "0.1 sec.".into(),
                cost: 0.25,
                result_count: 1,
                path: vec!["v3".into(), "serp".into()],
                data: Some(json!({"keyword": "rust"})),
                result: Some(json!([{"keyword": "rust", "search_volume": 5}])),
            }],
        };
        let bytes = serde_json::to_vec(&envelope).unwrap();
        assert_eq!(decode_envelope_strict(&bytes).unwrap(), envelope);
    }
}
