//! Primary backend reachability probe

use opendal::Operator;

use crate::error::{StorageError, StorageResult};

/// Verify the storage endpoint answers by listing the root
pub async fn check_health(op: &Operator) -> StorageResult<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|source| StorageError::Backend {
            backend: "health",
            source,
        })
}

/// Returns true if storage is reachable, false otherwise
pub async fn is_healthy(op: &Operator) -> bool {
    check_health(op).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::build_memory_operator;

    #[tokio::test]
    async fn test_memory_operator_is_healthy() {
        let op = build_memory_operator().unwrap();
        assert!(is_healthy(&op).await);
    }
}
