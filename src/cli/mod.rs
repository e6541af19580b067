//! Command-line interface for parallel-web.
//!
//! Provides commands for chatting, searching the web, extracting page
//! content, and showing the resolved configuration.

use std::io::{self, IsTerminal, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;

use crate::adapters::{ChatModel, Connection, ParallelChat, ParallelExtractTool, ParallelSearchTool};
use crate::config::{load_config, ResolvedConfig};
use crate::credentials::{secrets, API_KEY_ENV};
use crate::domain::{
    ChatOptions, ExtractItem, ExtractRequest, Message, Processor, SearchRequest, SourcePolicy,
};

/// parallel-web - Parallel AI chat, search and extract from the command line
#[derive(Parser, Debug)]
#[command(name = "parallel-web")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Parallel AI API key
    #[arg(long, global = true, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Override the API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask the chat model a question
    Chat {
        /// Prompt (reads from stdin if not provided)
        prompt: Option<String>,

        /// System instruction sent before the prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Model name
        #[arg(short, long)]
        model: Option<String>,

        /// Print the reply as it arrives
        #[arg(long)]
        stream: bool,
    },

    /// Search the web
    Search {
        /// Natural-language objective
        #[arg(short, long, conflicts_with = "query")]
        objective: Option<String>,

        /// Keyword query (repeat up to 5 times)
        #[arg(short, long)]
        query: Vec<String>,

        /// Processor tier
        #[arg(short, long, value_enum)]
        processor: Option<ProcessorArg>,

        /// Maximum number of results (1-40)
        #[arg(long)]
        max_results: Option<u32>,

        /// Maximum characters per result (>= 100)
        #[arg(long)]
        max_chars: Option<u32>,

        /// Only return results from this domain (repeatable)
        #[arg(long)]
        include_domain: Vec<String>,

        /// Never return results from this domain (repeatable)
        #[arg(long)]
        exclude_domain: Vec<String>,

        /// Include timing and count metadata in the output
        #[arg(long)]
        metadata: bool,
    },

    /// Extract page content from one or more URLs
    Extract {
        /// URLs to extract
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum characters per page
        #[arg(long)]
        max_chars: Option<u32>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Processor tier for CLI (maps to Processor)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProcessorArg {
    /// Fast and cheap
    Base,

    /// Slow and thorough
    Pro,
}

impl From<ProcessorArg> for Processor {
    fn from(p: ProcessorArg) -> Self {
        match p {
            ProcessorArg::Base => Processor::Base,
            ProcessorArg::Pro => Processor::Pro,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = load_config()?;
        if let Some(base_url) = &self.base_url {
            config.client.base_url = base_url.clone();
        }
        if let Some(seconds) = self.timeout {
            config.client.timeout = Some(Duration::from_secs(seconds));
        }

        match self.command {
            Commands::Chat {
                prompt,
                system,
                model,
                stream,
            } => {
                let connection = connect(&config, self.api_key)?;
                run_chat(&config, connection, prompt, system, model, stream).await
            }
            Commands::Search {
                objective,
                query,
                processor,
                max_results,
                max_chars,
                include_domain,
                exclude_domain,
                metadata,
            } => {
                let source_policy = SourcePolicy {
                    include_domains: include_domain,
                    exclude_domains: exclude_domain,
                };
                let request = SearchRequest {
                    objective,
                    search_queries: (!query.is_empty()).then_some(query),
                    processor: processor.map(Into::into).unwrap_or(config.search.processor),
                    max_results: max_results.unwrap_or(config.search.max_results),
                    max_chars_per_result: max_chars
                        .unwrap_or(config.search.max_chars_per_result),
                    source_policy: (!source_policy.is_empty()).then_some(source_policy),
                };
                let connection = connect(&config, self.api_key)?;
                run_search(connection, request, metadata).await
            }
            Commands::Extract { urls, max_chars } => {
                let request = ExtractRequest {
                    urls,
                    max_chars_per_extract: max_chars.or(config.max_chars_per_extract),
                };
                let connection = connect(&config, self.api_key)?;
                run_extract(connection, request).await
            }
            Commands::Config => show_config(&config),
        }
    }
}

fn connect(config: &ResolvedConfig, api_key: Option<String>) -> Result<Connection> {
    Connection::builder()
        .maybe_api_key(api_key)
        .settings(config.client.clone())
        .build()
        .context("Failed to set up Parallel AI connection")
}

/// Read the prompt argument, or stdin when piped
fn read_prompt(prompt: Option<String>) -> Result<String> {
    let prompt = match prompt {
        Some(prompt) => prompt,
        None if !io::stdin().is_terminal() => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
        None => anyhow::bail!("No prompt provided. Pass it as an argument or pipe to stdin"),
    };

    if prompt.trim().is_empty() {
        anyhow::bail!("Prompt is empty");
    }
    Ok(prompt)
}

async fn run_chat(
    config: &ResolvedConfig,
    connection: Connection,
    prompt: Option<String>,
    system: Option<String>,
    model: Option<String>,
    stream: bool,
) -> Result<()> {
    let prompt = read_prompt(prompt)?;

    let mut messages = Vec::new();
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));

    let options = ChatOptions::with_model(model.unwrap_or_else(|| config.chat_model.clone()));
    let chat = ParallelChat::new(connection, options);

    if stream {
        let mut chunks = chat.stream(&messages).await.context("Chat request failed")?;
        let mut stdout = io::stdout();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.context("Chat stream failed")?;
            write!(stdout, "{}", chunk.content)?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        let response = chat.invoke(&messages).await.context("Chat request failed")?;
        println!("{}", response.message.content);
    }

    Ok(())
}

async fn run_search(connection: Connection, request: SearchRequest, metadata: bool) -> Result<()> {
    let tool = ParallelSearchTool::new(connection);
    let (response, meta) = tool
        .search_with_metadata(&request)
        .await
        .context("Search failed")?;

    let mut output = serde_json::to_value(&response)?;
    if metadata {
        output["search_metadata"] = serde_json::to_value(&meta)?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_extract(connection: Connection, request: ExtractRequest) -> Result<()> {
    let tool = ParallelExtractTool::new(connection);
    let items = tool.extract(&request).await.context("Extract failed")?;

    let failed = items
        .iter()
        .filter(|i| matches!(i, ExtractItem::Failure { .. }))
        .count();
    println!("{}", serde_json::to_string_pretty(&items)?);
    if failed > 0 {
        eprintln!("\n[{} of {} URLs failed]", failed, items.len());
    }
    Ok(())
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    let path = config
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    println!("Config file: {}", path);
    println!("{}", serde_yaml::to_string(config)?);

    for (field, env) in secrets() {
        let state = match std::env::var(env) {
            Ok(v) if !v.trim().is_empty() => "set",
            _ => "not set",
        };
        println!("{} ({}): {}", field, env, state);
    }
    Ok(())
}
