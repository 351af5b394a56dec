//! # Concierge CLI
//!
//! ```bash
//! concierge --config ./config/concierge.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `concierge serve` | Start the chat HTTP server |
//! | `concierge ask "<question>"` | Answer one question and exit |
//! | `concierge chat` | Interactive chat in the terminal |
//! | `concierge index` | Show the firm name and indexed sections |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use concierge::config::{self, Config};
use concierge::corpus::Corpus;
use concierge::models::{ConversationTurn, Tier};
use concierge::oracle::create_oracle;
use concierge::pipeline::Pipeline;
use concierge::server;

/// Concierge: tiered retrieval-and-answer chat for a firm's knowledge base.
#[derive(Parser)]
#[command(name = "concierge", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/concierge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat HTTP server.
    ///
    /// Binds to `[server].bind` and serves `/chat`, `/lead` and `/health`.
    Serve,

    /// Answer a single question and print the reply.
    ///
    /// Runs the full pipeline without rate limiting.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Chat interactively, carrying history between turns.
    Chat,

    /// Print the firm name and the indexed sections.
    Index,
}

const EXIT_WORDS: [&str; 4] = ["quit", "exit", "bye", "q"];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("concierge=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Ask { question } => run_ask(&cfg, &question).await?,
        Commands::Chat => run_chat(&cfg).await?,
        Commands::Index => run_index(&cfg)?,
    }

    Ok(())
}

fn build_pipeline(cfg: &Config) -> Result<Pipeline> {
    let corpus = Arc::new(Corpus::load(&cfg.corpus)?);
    let oracle = create_oracle(&cfg.oracle)?;
    Ok(Pipeline::new(corpus, oracle))
}

async fn run_ask(cfg: &Config, question: &str) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let pipeline = build_pipeline(cfg)?;
    let answer = pipeline.answer(question, &[]).await?;

    println!("{}", answer.reply);
    if !answer.sources.is_empty() {
        println!();
        println!("sources: {}", answer.sources.join(", "));
    }
    Ok(())
}

async fn run_chat(cfg: &Config) -> Result<()> {
    let pipeline = build_pipeline(cfg)?;
    let firm = pipeline.corpus().firm_name().to_string();

    println!("{}: chat assistant", firm);
    println!("Type 'quit' or 'exit' to end the conversation.");
    println!();

    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"You: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            println!("\nBot: Thank you for reaching out! Have a great day.\n");
            break;
        }

        match pipeline.answer(question, &history).await {
            Ok(answer) => {
                match answer.tier {
                    Tier::FastPath => println!("  (answered from overview)"),
                    Tier::Grounded => println!("  (looked at: {})", answer.sources.join(", ")),
                    Tier::Ungrounded => {}
                }
                println!("\nBot: {}\n", answer.reply);
                history.push(ConversationTurn::new("user", question));
                history.push(ConversationTurn::new("bot", answer.reply));
            }
            Err(e) => {
                eprintln!("error: {:#}", e);
                println!("\nBot: {}\n", server::FAILURE_REPLY);
            }
        }
    }

    Ok(())
}

fn run_index(cfg: &Config) -> Result<()> {
    let corpus = Corpus::load(&cfg.corpus)?;
    let index = corpus.index();

    println!("firm: {}", index.firm_name);
    println!(
        "overview: {}",
        if corpus.overview().is_empty() {
            "none (fast path disabled)".to_string()
        } else {
            format!("{} bytes", corpus.overview().len())
        }
    );
    println!("sections: {}", index.sections.len());
    for section in &index.sections {
        let marker = match corpus.resolve(&section.path) {
            Some(path) if path.is_file() => "ok",
            _ => "missing",
        };
        println!("  {:<28} [{}] {}", section.path, marker, section.summary);
    }
    Ok(())
}
