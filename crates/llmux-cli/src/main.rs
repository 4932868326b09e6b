//! `llmux` binary: thin presentation layer over the dispatch client.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use llmux_client::LlmuxClient;
use llmux_core::{Config, Message, Provider, QueryOptions};
use llmux_provider::{is_executable_available, BunInstaller, Installer, MessageStream};

#[derive(Debug, Parser)]
#[command(name = "llmux", version, about = "Dispatch one prompt across LLM CLI backends")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Target provider (defaults to the configured default).
    #[arg(long, global = true)]
    provider: Option<Provider>,

    #[arg(long, global = true)]
    model: Option<String>,

    #[arg(long, global = true)]
    temperature: Option<f64>,

    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    #[arg(long, global = true)]
    system_prompt: Option<String>,

    /// Per-attempt timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[arg(long, global = true, default_value_t = 3)]
    retries: u32,

    #[arg(long, global = true, default_value_t = 1.0)]
    retry_delay: f64,

    #[arg(long, global = true)]
    no_retry: bool,

    /// Output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    format: String,

    /// Config file path (falls back to $LLMUX_CONFIG, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query one provider.
    Query { prompt: String },
    /// Query a uniformly random provider.
    Random { prompt: String },
    /// Query every provider concurrently and collect all results.
    Parallel { prompt: String },
    /// Try providers in order until one succeeds.
    Rotate { prompt: String },
    /// List registered providers.
    Providers,
    /// Install a provider's backend CLI.
    Install { provider: Provider },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

impl Cli {
    fn query_options(&self) -> QueryOptions {
        let mut options = QueryOptions::default();
        options.provider = self.provider;
        options.model = self.model.clone();
        options.temperature = self.temperature;
        options.max_tokens = self.max_tokens;
        options.system_prompt = self.system_prompt.clone();
        options.timeout_secs = self.timeout;
        options.retry_count = self.retries;
        options.retry_delay_secs = self.retry_delay;
        options.no_retry = self.no_retry;
        options.output_format = self.format.clone();
        options.verbose = self.verbose;
        options
    }
}

async fn collect_stream(stream: MessageStream) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    let mut stream = stream;
    while let Some(item) = stream.next().await {
        messages.push(item?);
    }
    Ok(messages)
}

fn render_messages(messages: &[Message], format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(messages)?);
        }
        "text" => {
            for message in messages {
                let text = message.text_content();
                if !text.is_empty() {
                    println!("{text}");
                }
            }
        }
        other => bail!("unsupported output format '{other}' (expected text or json)"),
    }
    Ok(())
}

fn render_parallel(results: &BTreeMap<Provider, Vec<Message>>, format: &str) -> Result<()> {
    match format {
        "json" => {
            let by_name: BTreeMap<&str, &Vec<Message>> = results
                .iter()
                .map(|(provider, messages)| (provider.as_str(), messages))
                .collect();
            println!("{}", serde_json::to_string_pretty(&by_name)?);
        }
        "text" => {
            for (provider, messages) in results {
                println!("--- {provider} ---");
                if messages.is_empty() {
                    println!("(no response)");
                } else {
                    for message in messages {
                        println!("{}", message.text_content());
                    }
                }
            }
        }
        other => bail!("unsupported output format '{other}' (expected text or json)"),
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let options = cli.query_options();

    match &cli.command {
        Command::Query { prompt } => {
            let client = LlmuxClient::from_config(&config)?;
            let stream = client.query(prompt, &options).await?;
            render_messages(&collect_stream(stream).await?, &cli.format)
        }
        Command::Random { prompt } => {
            let client = LlmuxClient::from_config(&config)?;
            let mut options = options;
            let stream = client.query_random(prompt, &mut options).await?;
            let messages = collect_stream(stream).await?;
            if let Some(provider) = options.provider {
                tracing::info!(provider = provider.as_str(), "randomly selected provider");
            }
            render_messages(&messages, &cli.format)
        }
        Command::Parallel { prompt } => {
            let client = LlmuxClient::from_config(&config)?;
            let results = client.query_all(prompt, &options).await;
            render_parallel(&results, &cli.format)
        }
        Command::Rotate { prompt } => {
            let client = LlmuxClient::from_config(&config)?;
            let stream = client.query_with_rotation(prompt, &options).await?;
            render_messages(&collect_stream(stream).await?, &cli.format)
        }
        Command::Providers => {
            let client = LlmuxClient::from_config(&config)?;
            for provider in client.list_providers() {
                let executable = config.adapter_settings(provider).executable_for(provider);
                let status = if is_executable_available(&executable) {
                    "available"
                } else {
                    "missing"
                };
                println!("{provider}\t{executable}\t{status}");
            }
            Ok(())
        }
        Command::Install { provider } => {
            let outcome = BunInstaller
                .install(*provider)
                .with_context(|| format!("no installer is available for '{provider}'"))?;
            println!("{}", outcome.message);
            if !outcome.installed {
                bail!("install failed for '{provider}'");
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_with_global_flags() {
        let cli = Cli::parse_from([
            "llmux",
            "query",
            "hello",
            "--provider",
            "gemini",
            "--retries",
            "5",
            "--format",
            "json",
        ]);
        assert!(matches!(cli.command, Command::Query { ref prompt } if prompt == "hello"));
        let options = cli.query_options();
        assert_eq!(options.provider, Some(Provider::Gemini));
        assert_eq!(options.retry_count, 5);
        assert_eq!(options.output_format, "json");
    }

    #[test]
    fn parses_install_provider() {
        let cli = Cli::parse_from(["llmux", "install", "codex"]);
        assert!(matches!(
            cli.command,
            Command::Install {
                provider: Provider::Codex
            }
        ));
    }

    #[test]
    fn rejects_unknown_format_at_render_time() {
        let error = render_messages(&[], "yaml").expect_err("yaml unsupported");
        assert!(error.to_string().contains("unsupported output format"));
    }
}
