use std::sync::Arc;

use certsync_renewal::{InvocationRequest, RenewalOrchestrator};
use clap::{Args, Parser};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use tracing::{error, info};

use crate::settings::SettingsArgs;

#[derive(Args, Debug)]
pub struct LambdaCommand {
    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Wrapper used to read settings from the environment alone
#[derive(Parser)]
struct EnvOnly {
    #[command(flatten)]
    settings: SettingsArgs,
}

impl LambdaCommand {
    pub fn from_env() -> Self {
        Self {
            settings: EnvOnly::parse_from(["certsync"]).settings,
        }
    }

    pub fn execute(self) -> anyhow::Result<()> {
        // Precondition failures surface here, before the runtime loop starts
        let config = self.settings.runtime_config()?;

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let orchestrator = Arc::new(self.settings.build_orchestrator(config, true).await?);
            info!("Waiting for Lambda invocations");

            lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
                let orchestrator = orchestrator.clone();
                async move { handle_event(&orchestrator, event.payload).await }
            }))
            .await
            .map_err(|e| anyhow::anyhow!("Lambda runtime failed: {}", e))
        })
    }
}

/// An unparseable payload is an invocation-level error, not a 500 response
pub async fn handle_event(
    orchestrator: &RenewalOrchestrator,
    payload: Value,
) -> Result<Value, lambda_runtime::Error> {
    let request: InvocationRequest = serde_json::from_value(payload).map_err(|e| {
        error!("Rejecting invocation payload: {}", e);
        format!("Invalid invocation payload: {}", e)
    })?;

    let response = orchestrator.handle(request).await;
    Ok(serde_json::to_value(&response)?)
}
