use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use switchboard_core::ModelParameters;
use switchboard_core::params::keys;

/// Switchboard LLM gateway
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "One gateway in front of many LLM vendors")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the configured credential is accepted by the vendor
    Verify(Target),
    /// Send one chat completion request
    Chat {
        #[command(flatten)]
        target: Target,
        /// System prompt
        #[arg(long)]
        system: Option<String>,
        /// Print one envelope per token instead of a single response
        #[arg(long)]
        stream: bool,
        /// User message
        prompt: String,
    },
    /// Stream one chat request per line read from stdin
    Session(Target),
    /// Embed one or more texts
    Embed {
        #[command(flatten)]
        target: Target,
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Score documents against a query
    Rerank {
        #[command(flatten)]
        target: Target,
        #[arg(short, long)]
        query: String,
        /// Number of documents to keep
        #[arg(long)]
        top_n: Option<u32>,
        #[arg(required = true)]
        documents: Vec<String>,
    },
}

impl Command {
    pub const fn target(&self) -> &Target {
        match self {
            Self::Verify(target) | Self::Session(target) => target,
            Self::Chat { target, .. } | Self::Embed { target, .. } | Self::Rerank { target, .. } => target,
        }
    }
}

/// Vendor and model a command is sent to
#[derive(Debug, Clone, clap::Args)]
pub struct Target {
    /// Provider tag (`openai`, `anthropic`, ...)
    #[arg(short, long)]
    pub provider: String,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Extra model parameter, `key=value`; values are read as JSON when they parse
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, Value)>,
}

impl Target {
    pub fn model_parameters(&self) -> ModelParameters {
        let mut parameters = ModelParameters::new();
        if let Some(model) = &self.model {
            parameters.insert(keys::NAME, model.as_str());
        }
        for (key, value) in &self.params {
            parameters.insert(qualified(key), value.clone());
        }
        parameters
    }
}

/// `temperature` and `model.temperature` name the same parameter
fn qualified(key: &str) -> String {
    if key.starts_with("model.") {
        key.to_string()
    } else {
        format!("model.{key}")
    }
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
