use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};

/// Per-request cancellation signal. Fires once `timeout` elapses, and is
/// cancelled when the request finishes so the timer task exits.
pub struct RequestDeadline {
    token: CancellationToken,
    _guard: DropGuard,
}

impl RequestDeadline {
    pub fn start(timeout: Duration) -> Self {
        let token = CancellationToken::new();
        let timer = token.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => timer.cancel(),
                _ = timer.cancelled() => {}
            }
        });

        Self {
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
