//! Transaction execution seam and reply decoding.

use crate::error::{OvsdbError, Result};
use crate::operation::{Operation, OperationResult, ReplyElement};
use async_trait::async_trait;
use std::time::Duration;

/// Sends one atomic transaction to a database.
///
/// Implementations return the raw `result` member of the `transact` reply
/// (an array with one element per operation, plus possibly a trailing
/// commit error). Implementations must not retry.
#[async_trait]
pub trait Transact: Send + Sync {
    async fn transact(
        &self,
        database: &str,
        operations: &[Operation],
    ) -> Result<serde_json::Value>;
}

/// Receives one latency sample per executed command.
///
/// Called after the transaction completes; implementations must not block.
pub trait CommandObserver: Send + Sync {
    fn observe_command(&self, command: &str, elapsed: Duration, succeeded: bool);
}

/// Observer that discards all samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CommandObserver for NoopObserver {
    fn observe_command(&self, _command: &str, _elapsed: Duration, _succeeded: bool) {}
}

/// Decodes a `transact` reply into per-operation results.
///
/// The whole transaction failed if any element carries an error, including
/// an element past the last operation (commit failure). Otherwise there must
/// be one element per operation.
pub(crate) fn decode_reply(
    operations: &[Operation],
    reply: &serde_json::Value,
) -> Result<Vec<OperationResult>> {
    let elements = reply
        .as_array()
        .ok_or_else(|| OvsdbError::protocol(format!("transact result is not an array: {}", reply)))?;

    let mut results = Vec::with_capacity(operations.len());
    for (index, raw) in elements.iter().enumerate() {
        match ReplyElement::from_json(raw)? {
            ReplyElement::Failure { error, details } => {
                return Err(OvsdbError::TransactionFailed {
                    index,
                    error,
                    details,
                })
            }
            ReplyElement::Success(result) if index < operations.len() => results.push(result),
            ReplyElement::Success(_) => {}
        }
    }

    // Checked after the scan: a server may stop emitting elements after the
    // failing operation.
    if results.len() < operations.len() {
        return Err(OvsdbError::protocol(format!(
            "transact returned {} results for {} operations",
            elements.len(),
            operations.len()
        )));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovsdb_types::Columns;
    use serde_json::json;

    fn ops(n: usize) -> Vec<Operation> {
        (0..n)
            .map(|_| Operation::Insert {
                table: "NB_Global".to_string(),
                row: Columns::new(),
                uuid_name: None,
            })
            .collect()
    }

    #[test]
    fn test_decode_success() {
        let results = decode_reply(&ops(2), &json!([{"count": 1}, {"count": 0}])).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].count, Some(1));
        assert_eq!(results[1].count, Some(0));
    }

    #[test]
    fn test_decode_operation_failure() {
        let err = decode_reply(
            &ops(2),
            &json!([{"count": 1}, {"error": "constraint violation"}]),
        )
        .unwrap_err();
        assert!(matches!(err, OvsdbError::TransactionFailed { index: 1, .. }));
    }

    #[test]
    fn test_decode_commit_failure() {
        let err = decode_reply(
            &ops(1),
            &json!([{"count": 1}, {"error": "timed out", "details": "commit"}]),
        )
        .unwrap_err();
        assert!(matches!(err, OvsdbError::TransactionFailed { index: 1, .. }));
    }

    #[test]
    fn test_decode_short_reply() {
        let err = decode_reply(&ops(2), &json!([{"count": 1}])).unwrap_err();
        assert!(matches!(err, OvsdbError::Protocol(_)));
    }

    #[test]
    fn test_decode_failure_in_truncated_reply() {
        let err = decode_reply(&ops(3), &json!([{"count": 1}, {"error": "constraint violation"}]))
            .unwrap_err();
        assert!(matches!(err, OvsdbError::TransactionFailed { index: 1, .. }));
    }

    #[test]
    fn test_decode_not_an_array() {
        assert!(decode_reply(&ops(1), &json!({"count": 1})).is_err());
    }
}
