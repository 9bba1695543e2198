use std::io::Read;
use std::path::Path;

use anyhow::Context;
use certsync_renewal::InvocationRequest;
use clap::Args;
use colored::Colorize;

use crate::settings::SettingsArgs;

#[derive(Args, Debug)]
pub struct InvokeCommand {
    /// JSON event file, or `-` for stdin
    #[arg(long, default_value = "-")]
    pub event: String,

    /// Log the summary instead of publishing it to the topic
    #[arg(long)]
    pub no_notify: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

pub fn read_event(source: &str) -> anyhow::Result<InvocationRequest> {
    let text = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read event from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read event file {}", source))?
    };

    serde_json::from_str(&text).context("Invalid invocation payload")
}

impl InvokeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let config = self.settings.runtime_config()?;
        let request = read_event(&self.event)?;

        let rt = tokio::runtime::Runtime::new()?;
        let response = rt.block_on(async {
            let orchestrator = self
                .settings
                .build_orchestrator(config, !self.no_notify)
                .await?;
            Ok::<_, anyhow::Error>(orchestrator.handle(request).await)
        })?;

        println!("{}", serde_json::to_string_pretty(&response)?);

        if response.is_success() {
            eprintln!("{} {}", "✓".bright_green(), response.body.message);
            Ok(())
        } else {
            eprintln!("{} {}", "✗".bright_red(), response.body.message);
            Err(anyhow::anyhow!(
                "Invocation failed with status {}",
                response.status_code
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_event_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"mode": "certonly", "domains": ["example.com"], "email": "ops@example.com", "server": "https://acme.example/dir"}"#).unwrap();

        let request = read_event(path.to_str().unwrap()).unwrap();
        assert_eq!(request.mode(), "acquire-on-demand");
    }

    #[test]
    fn test_read_event_rejects_unknown_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"mode": "revoke"}"#).unwrap();

        let err = read_event(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Invalid invocation payload"));
    }
}
