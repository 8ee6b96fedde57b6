//! Subscription check
//!
//! One best-effort GET before the cache flow. Only an explicit denial stops
//! the step; timeouts, transport failures and every other status let it run.

use crate::config::schema::SubscriptionConfig;
use crate::error::{CacheError, CacheResult};
use crate::runner::RunnerEnv;
use std::time::Duration;
use tracing::{debug, error, info};

/// Outcome of a subscription check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied,
    /// The check could not be completed; the step continues
    Unreachable,
}

/// Classify the result of the subscription request
fn verdict(result: Result<u16, ureq::Error>) -> Verdict {
    match result {
        Ok(403) | Err(ureq::Error::StatusCode(403)) => Verdict::Denied,
        Ok(status) if (200..300).contains(&status) => Verdict::Allowed,
        _ => Verdict::Unreachable,
    }
}

/// Subscription gate for one repository
#[derive(Debug, Clone)]
pub struct SubscriptionGate {
    url: Option<String>,
    timeout: Duration,
}

impl SubscriptionGate {
    pub fn new(config: &SubscriptionConfig, env: &RunnerEnv) -> Self {
        let url = if config.enabled {
            env.repository.as_deref().map(|repo| {
                format!(
                    "{}/github/{}/actions/subscription",
                    config.api_url.trim_end_matches('/'),
                    repo
                )
            })
        } else {
            None
        };

        Self {
            url,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Run the check; `Err` only when the subscription was denied
    pub async fn check(&self) -> CacheResult<()> {
        let Some(url) = self.url.clone() else {
            debug!("Subscription check skipped");
            return Ok(());
        };

        let timeout = self.timeout;
        let result = tokio::task::spawn_blocking(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .http_status_as_error(false)
                .build()
                .into();
            agent.get(&url).call().map(|response| response.status().as_u16())
        })
        .await
        .map_err(|e| CacheError::Internal(format!("subscription check failed: {e}")))?;

        match verdict(result) {
            Verdict::Denied => {
                error!("Subscription is not valid. Reach out to support@stepsecurity.io");
                Err(CacheError::SubscriptionDenied)
            }
            Verdict::Allowed => Ok(()),
            Verdict::Unreachable => {
                info!("Timeout or API not reachable. Continuing to next step.");
                Ok(())
            }
        }
    }

    /// URL that will be checked, if the check is enabled
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> RunnerEnv {
        RunnerEnv::from_vars([("GITHUB_REPOSITORY", "acme/widgets")])
    }

    #[test]
    fn only_403_is_denied() {
        assert_eq!(verdict(Ok(403)), Verdict::Denied);
        assert_eq!(verdict(Err(ureq::Error::StatusCode(403))), Verdict::Denied);
        assert_eq!(verdict(Ok(200)), Verdict::Allowed);
        assert_eq!(verdict(Ok(404)), Verdict::Unreachable);
        assert_eq!(verdict(Ok(500)), Verdict::Unreachable);
        assert_eq!(verdict(Err(ureq::Error::ConnectionFailed)), Verdict::Unreachable);
    }

    #[test]
    fn url_for_repository() {
        let gate = SubscriptionGate::new(&SubscriptionConfig::default(), &env());
        assert_eq!(
            gate.url(),
            Some("https://agent.api.stepsecurity.io/v1/github/acme/widgets/actions/subscription")
        );
    }

    #[test]
    fn disabled_or_unknown_repository_skips() {
        let config = SubscriptionConfig {
            enabled: false,
            ..SubscriptionConfig::default()
        };
        assert!(SubscriptionGate::new(&config, &env()).url().is_none());
        assert!(SubscriptionGate::new(&SubscriptionConfig::default(), &RunnerEnv::default())
            .url()
            .is_none());
    }

    #[tokio::test]
    async fn unreachable_api_fails_open() {
        let config = SubscriptionConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..SubscriptionConfig::default()
        };
        let gate = SubscriptionGate::new(&config, &env());
        assert!(gate.check().await.is_ok());
    }

    #[tokio::test]
    async fn skipped_check_passes() {
        let gate = SubscriptionGate::new(&SubscriptionConfig::default(), &RunnerEnv::default());
        assert!(gate.check().await.is_ok());
    }
}
