//! Layer 4: the Jitsi deployment itself

use super::Outcome;
use crate::api::DiagnosticsApi;
use crate::config::DiagConfig;
use crate::context::RunContext;
use crate::race::{race, RaceOutcome};
use crate::signaling::SignalingConnector;
use jk_core::Status;

/// Any HTTP response from the web frontend counts as reachable
pub async fn jitsi_https(api: &dyn DiagnosticsApi, ctx: &RunContext, config: &DiagConfig) -> Outcome {
    let url = config.jitsi_https_url();

    match race(ctx.token(), config.timeouts.https, api.head(&url)).await {
        RaceOutcome::Completed(Ok(status)) => {
            tracing::debug!(url = %url, status, "HTTPS reachable");
            Outcome::pass("")
        }
        RaceOutcome::Completed(Err(e)) => Outcome::fail(e.to_string()),
        RaceOutcome::TimedOut => Outcome::timeout(Status::Fail),
        RaceOutcome::Cancelled => Outcome::cancelled(),
    }
}

/// XMPP WebSocket handshake.
///
/// A failed handshake while HTTPS works usually means a proxy strips the
/// `Upgrade` header, so it is downgraded to a warning.
pub async fn jitsi_websocket(
    signaling: &dyn SignalingConnector,
    ctx: &RunContext,
    config: &DiagConfig,
) -> Outcome {
    let url = config.xmpp_websocket_url();

    let failure = match race(ctx.token(), config.timeouts.websocket, signaling.connect(&url)).await {
        RaceOutcome::Completed(Ok(mut link)) => {
            link.close().await;
            return Outcome::pass("");
        }
        RaceOutcome::Completed(Err(e)) => {
            tracing::debug!(url = %url, error = %e, "XMPP websocket handshake failed");
            "Connection error"
        }
        RaceOutcome::TimedOut => "Timeout",
        RaceOutcome::Cancelled => return Outcome::cancelled(),
    };

    if ctx.prior_status("jitsi-https") == Some(Status::Pass) {
        Outcome::warn("Handshake failed, HTTPS reachable")
    } else {
        Outcome::fail(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::signaling::{SignalingError, SignalingLink};
    use async_trait::async_trait;
    use jk_core::types::credentials::TurnCredentials;
    use jk_core::types::report::{ResultStats, SaveResultRequest, SavedResult, StoredResult};
    use jk_core::types::signaling::SignalingFrame;
    use jk_core::{Category, Layer, TestDefinition};

    struct HeadOnly(Option<u16>);

    #[async_trait]
    impl DiagnosticsApi for HeadOnly {
        async fn turn_credentials(&self) -> Result<TurnCredentials, ApiError> {
            Err(ApiError::Status(404))
        }
        async fn download_payload(&self) -> Result<usize, ApiError> {
            Err(ApiError::Status(404))
        }
        async fn ping(&self) -> Result<(), ApiError> {
            Err(ApiError::Status(404))
        }
        async fn head(&self, _url: &str) -> Result<u16, ApiError> {
            match self.0 {
                Some(status) => Ok(status),
                None => std::future::pending().await,
            }
        }
        async fn save_results(&self, _request: &SaveResultRequest) -> Result<SavedResult, ApiError> {
            Err(ApiError::Status(404))
        }
        async fn stats(&self) -> Result<ResultStats, ApiError> {
            Err(ApiError::Status(404))
        }
        async fn fetch_result(&self, _id: &str) -> Result<StoredResult, ApiError> {
            Err(ApiError::Status(404))
        }
    }

    struct Handshake(bool);

    struct IdleLink;

    #[async_trait]
    impl SignalingLink for IdleLink {
        async fn send(&mut self, _frame: &SignalingFrame) -> Result<(), SignalingError> {
            Ok(())
        }
        async fn recv(&mut self) -> Option<Result<SignalingFrame, SignalingError>> {
            None
        }
        async fn close(&mut self) {}
    }

    #[async_trait]
    impl SignalingConnector for Handshake {
        async fn connect(&self, _url: &str) -> Result<Box<dyn SignalingLink>, SignalingError> {
            if self.0 {
                Ok(Box::new(IdleLink))
            } else {
                Err(SignalingError::Connect("HTTP error: 400 Bad Request".to_string()))
            }
        }
    }

    fn ctx_with_https(status: Option<Status>) -> RunContext {
        let mut ctx = RunContext::new(2);
        if let Some(status) = status {
            let def = TestDefinition::new("jitsi-https", "Jitsi HTTPS", Category::Critical);
            ctx.record(Layer::SERVICE, &def, Outcome::new(status, ""));
        }
        ctx
    }

    #[tokio::test]
    async fn test_https_any_status_passes() {
        let config = DiagConfig::default();
        let outcome = jitsi_https(&HeadOnly(Some(404)), &RunContext::new(1), &config).await;
        assert_eq!(outcome.status, Status::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn test_https_timeout() {
        let config = DiagConfig::default();
        let outcome = jitsi_https(&HeadOnly(None), &RunContext::new(1), &config).await;
        assert_eq!(outcome, Outcome::fail("Timeout"));
    }

    #[tokio::test]
    async fn test_websocket_open() {
        let outcome = jitsi_websocket(&Handshake(true), &ctx_with_https(None), &DiagConfig::default()).await;
        assert_eq!(outcome.status, Status::Pass);
    }

    #[tokio::test]
    async fn test_websocket_failure_depends_on_https() {
        let config = DiagConfig::default();

        let outcome = jitsi_websocket(&Handshake(false), &ctx_with_https(Some(Status::Pass)), &config).await;
        assert_eq!(outcome, Outcome::warn("Handshake failed, HTTPS reachable"));

        let outcome = jitsi_websocket(&Handshake(false), &ctx_with_https(Some(Status::Fail)), &config).await;
        assert_eq!(outcome, Outcome::fail("Connection error"));
    }
}
