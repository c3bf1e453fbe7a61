use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::config::keys;
use crate::database::redact;

/// Print `data` as pretty JSON, or `text` for humans
pub fn output(output_format: OutputFormat, text: &str, data: Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "data": data }))?);
        }
        OutputFormat::Text => println!("{}", text),
    }
    Ok(())
}

/// Scalar value safe to print: secrets masked, connection passwords redacted
pub fn display_scalar(key: &str, value: &str) -> String {
    match key {
        keys::JWT_SECRET if value.is_empty() => "<unset>".to_string(),
        keys::JWT_SECRET => "********".to_string(),
        keys::DBDRIVER_CONNECTION if !value.is_empty() => redact(value),
        _ => value.to_string(),
    }
}
