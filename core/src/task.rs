//! Connection task types

use serde::{Deserialize, Serialize};

/// Run-unique connection task identifier, `"<target>#<queue>::<sequence>"`
///
/// The queue index keeps ids distinct when the same target is listed twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Derive the id of the `seq`-th task of queue `queue`, which serves `target`
    pub fn new(queue: usize, target: &str, seq: usize) -> Self {
        Self(format!("{target}#{queue}::{seq}"))
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A unit of work: exactly one connection attempt and a bounded exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTask {
    /// Endpoint to connect to
    pub target: String,

    /// Run-unique identifier
    pub id: TaskId,

    /// Size of every payload written on this connection
    pub payload_size: usize,

    /// Messages to exchange before closing
    pub message_budget: usize,
}

impl ConnectionTask {
    /// Create the `seq`-th task of queue `queue`, which serves `target`
    pub fn new(
        queue: usize,
        target: &str,
        seq: usize,
        payload_size: usize,
        message_budget: usize,
    ) -> Self {
        Self {
            target: target.to_string(),
            id: TaskId::new(queue, target, seq),
            payload_size,
            message_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_derivation() {
        let id = TaskId::new(0, "ws://localhost:8080", 7);
        assert_eq!(id.as_str(), "ws://localhost:8080#0::7");
        assert_eq!(id.to_string(), "ws://localhost:8080#0::7");
    }

    #[test]
    fn test_task_ids_unique_per_queue_target_and_seq() {
        assert_ne!(TaskId::new(0, "a", 1), TaskId::new(0, "a", 2));
        assert_ne!(TaskId::new(0, "a", 1), TaskId::new(1, "b", 1));
        // Same target listed twice
        assert_ne!(TaskId::new(0, "a", 1), TaskId::new(1, "a", 1));
    }

    #[test]
    fn test_task_id_serializes_as_string() {
        let json = serde_json::to_string(&TaskId::new(2, "t", 0)).unwrap();
        assert_eq!(json, "\"t#2::0\"");
    }
}
