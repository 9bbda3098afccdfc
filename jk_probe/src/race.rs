//! Single-completion race
//!
//! A probe waits on exactly one completion future, one timer and the run's
//! cancellation token. `tokio::select!` polls all three; the first to finish
//! wins and the others are dropped, which releases whatever the losing
//! futures held (sockets, peer connections, event receivers).

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

impl<T> RaceOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            RaceOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

pub async fn race<F, T>(token: &CancellationToken, timeout: Duration, fut: F) -> RaceOutcome<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        // Cancellation first, then completion before the timer on a tie
        biased;
        _ = token.cancelled() => RaceOutcome::Cancelled,
        value = fut => RaceOutcome::Completed(value),
        _ = tokio::time::sleep(timeout) => RaceOutcome::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_completion_wins() {
        let token = CancellationToken::new();
        let outcome = race(&token, Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        })
        .await;
        assert_eq!(outcome, RaceOutcome::Completed(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_wins_and_drops_future() {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = Flag(Arc::clone(&dropped));
        let token = CancellationToken::new();

        let outcome = race(&token, Duration::from_secs(8), async move {
            let _flag = flag;
            futures::future::pending::<()>().await
        })
        .await;

        assert_eq!(outcome, RaceOutcome::TimedOut);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });

        let outcome = race(&token, Duration::from_secs(60), futures::future::pending::<()>()).await;
        assert_eq!(outcome, RaceOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = race(&token, Duration::from_secs(1), async { 1 }).await;
        assert_eq!(outcome, RaceOutcome::Cancelled);
        assert_eq!(outcome.completed(), None);
    }
}
