use tracing::{error, info};

use crate::api::Backend;

/// What the deployment can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    /// Hosted deployments only look up video information.
    pub hosted: bool,
    pub downloads_enabled: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            hosted: false,
            downloads_enabled: true,
        }
    }
}

/// Ask the backend once. Any failure means a local, full featured deployment.
pub async fn detect(backend: &dyn Backend) -> Environment {
    match backend.environment().await {
        Ok(info) => {
            if let Some(deployment) = &info.deployment {
                info!(
                    "Deployment {} in {} at {}",
                    deployment.name.as_deref().unwrap_or("unknown"),
                    deployment.region.as_deref().unwrap_or("unknown"),
                    deployment.url.as_deref().unwrap_or("unknown"),
                );
            }
            Environment {
                hosted: info.is_hosted,
                downloads_enabled: info.downloads_enabled,
            }
        }
        Err(err) => {
            error!("Error checking environment: {}", err);
            Environment::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::EnvironmentInfo, testing::FakeBackend};

    #[tokio::test]
    async fn failure_keeps_defaults() {
        let backend = FakeBackend::default();
        backend.set_environment(Err("connection refused".into()));
        assert_eq!(detect(&backend).await, Environment::default());
        assert_eq!(backend.calls(), vec!["environment".to_string()]);
    }

    #[tokio::test]
    async fn hosted_deployment() {
        let backend = FakeBackend::default();
        backend.set_environment(Ok(EnvironmentInfo {
            is_hosted: true,
            downloads_enabled: false,
            deployment: None,
        }));
        assert_eq!(
            detect(&backend).await,
            Environment {
                hosted: true,
                downloads_enabled: false
            }
        );
    }
}
