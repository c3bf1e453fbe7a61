use clap::Subcommand;
use serde_json::{json, Value};

use crate::cli::utils::{display_scalar, output};
use crate::cli::{OutputFormat, Target};
use crate::config::{Binding, Container};

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Resolve one key and print it")]
    Get {
        #[arg(help = "Binding key, e.g. API_SERVER")]
        key: String,
    },

    #[command(about = "List every key with the environment that supplied it")]
    Show,
}

fn describe(container: &Container, key: &str) -> anyhow::Result<String> {
    match container.binding(key) {
        Some(Binding::Scalar(_)) | Some(Binding::CachedScalar(_)) => {
            Ok(display_scalar(key, &container.get_str(key)?))
        }
        Some(other) => Ok(format!("{:?}", other)),
        None => anyhow::bail!("Key '{}' not found", key),
    }
}

pub fn handle(cmd: ConfigCommands, target: &Target, output_format: OutputFormat) -> anyhow::Result<()> {
    let container = target.build()?;

    match cmd {
        ConfigCommands::Get { key } => {
            let value = describe(&container, &key)?;
            output(
                output_format,
                &value,
                json!({
                    "environment": container.environment(),
                    "key": key,
                    "value": value,
                    "source": container.source_of(&key),
                }),
            )
        }
        ConfigCommands::Show => {
            let mut lines = vec![format!("environment: {}", container.environment())];
            let mut entries = Vec::new();
            for key in container.keys() {
                let value = describe(&container, key)?;
                let source = container.source_of(key).unwrap_or_default();
                lines.push(format!("{:<22} {:<8} {}", key, source, value));
                entries.push(json!({ "key": key, "source": source, "value": value }));
            }
            output(
                output_format,
                &lines.join("\n"),
                json!({ "environment": container.environment(), "bindings": Value::Array(entries) }),
            )
        }
    }
}
