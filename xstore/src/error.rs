use std::time::Duration;

/// A lock could not be obtained in time.
///
/// The operation that asked for the lock must not proceed without it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// An exclusive acquisition kept waiting for longer than the lock timeout.
    #[error("lock timed out after {waited:?} waiting for {holder}")]
    Timeout {
        /// Rendered key of the holder at the moment the wait gave up.
        holder: String,
        /// How long the acquisition waited before giving up.
        waited: Duration,
    },
    /// The key did not become the holder of the lock within the lock timeout.
    #[error("{key} did not obtain the lock within {waited:?}")]
    NotAcquired {
        /// Rendered key that was waiting to become the holder.
        key: String,
        /// How long `enter` waited before giving up.
        waited: Duration,
    },
}

#[test]
fn messages_name_key_and_wait() {
    let err = LockError::Timeout {
        holder: "7".into(),
        waited: Duration::from_millis(5),
    };
    assert_eq!(err.to_string(), "lock timed out after 5ms waiting for 7");

    let err = LockError::NotAcquired {
        key: "3".into(),
        waited: Duration::from_secs(1),
    };
    assert_eq!(err.to_string(), "3 did not obtain the lock within 1s");
}
