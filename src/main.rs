use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use cardwise::catalog::Catalog;
use cardwise::llm_gateway::LlmGateway;
use cardwise::orchestrator::Orchestrator;
use cardwise::transcript::{Message, Role, StructuredExtractionResult};
use cardwise::web_server;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Catalog JSON file to ground answers on (defaults to the built-in catalog).
    #[arg(long, global = true, env = "CARDWISE_CATALOG")]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web server.
    Serve {
        #[arg(long, env = "CARDWISE_PORT", default_value_t = 3000, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "templates", help = "Directory holding the page templates.")]
        templates: PathBuf,
        #[arg(long, default_value = "static", help = "Directory served under /static.")]
        static_dir: PathBuf,
    },
    /// Chat about credit cards in the terminal.
    Chat,
    /// Ask a single question and print the recommendation.
    Ask {
        /// The question to answer.
        question: String,
    },
    /// List the cards in the catalog.
    Cards,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for GEMINI_API_KEY and friends)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,cardwise=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Cardwise starting with command: {:?}", cli.command);

    // The catalog is required grounding input for every mode; fail fast.
    let catalog = Arc::new(
        Catalog::load(cli.catalog.as_deref()).context("Failed to load credit card catalog")?,
    );

    match cli.command {
        Commands::Serve {
            port,
            templates,
            static_dir,
        } => {
            let orchestrator = build_orchestrator(catalog.clone())?;
            let state = web_server::AppState::new(orchestrator, catalog, &templates);
            web_server::start_web_server(port, state, static_dir).await?;
        }
        Commands::Chat => {
            let orchestrator = build_orchestrator(catalog)?;
            run_chat(&orchestrator).await?;
        }
        Commands::Ask { question } => {
            let orchestrator = build_orchestrator(catalog)?;
            let result = orchestrator
                .handle_qna(&question)
                .await
                .context("Failed to answer question")?;
            println!("{}\n", result.summary);
            for card in &result.cards {
                println!("- {} ({})", card.card_name, card.bank);
            }
        }
        Commands::Cards => print_catalog(&catalog),
    }

    Ok(())
}

fn build_orchestrator(catalog: Arc<Catalog>) -> Result<Arc<Orchestrator>> {
    let gateway = LlmGateway::from_env().context("Failed to create chat completion client")?;
    info!("Using model {}", gateway.model());
    Ok(Arc::new(Orchestrator::new(gateway, catalog)))
}

fn print_catalog(catalog: &Catalog) {
    for entry in catalog.entries() {
        let card = &entry.card;
        println!("{} ({})", card.card_name, card.bank);
        println!("  APR: {}", card.annual_percentage_rate);
        println!("  Joining fee: {}", card.joining_fee);
        println!("  Annual fee: {}", card.annual_fee);
        for benefit in &card.benefits {
            println!("  * {}", benefit);
        }
        if let Some(insights) = &entry.insights {
            println!("  Summary (AI generated): {}", insights.summary);
        }
        println!("  {}\n", card.url);
    }
}

/// Interactive chat; the transcript only lives for this session.
async fn run_chat(orchestrator: &Orchestrator) -> Result<()> {
    println!("Ask about credit cards. Enter an empty line to quit.");
    let mut transcript: Vec<Message> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }

        match orchestrator.handle_chat(transcript.clone(), line.trim()).await {
            Ok(updated) => {
                print_reply(&updated[transcript.len()..])?;
                transcript = updated;
            }
            Err(e) => {
                warn!("Chat turn failed: {:?}", e);
                eprintln!("{}", e.user_notice());
            }
        }
    }
    Ok(())
}

fn print_reply(new_messages: &[Message]) -> Result<()> {
    let Some(last) = new_messages.last() else {
        return Ok(());
    };
    let content = last.content.as_deref().unwrap_or_default();
    if last.role == Role::Tool {
        let result: StructuredExtractionResult =
            serde_json::from_str(content).context("Failed to read tool result")?;
        println!("{}", result.text_message);
        if let Some(list) = result.credit_cards {
            print_card_names(list.cards.iter().map(|c| c.card_name.as_str()));
        }
    } else {
        println!("{}", content);
    }
    Ok(())
}

fn print_card_names<'a>(names: impl Iterator<Item = &'a str>) {
    let names: Vec<&str> = names.collect();
    if !names.is_empty() {
        println!("\nCards mentioned: {}", names.join(", "));
    }
}
