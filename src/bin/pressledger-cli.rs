#![forbid(unsafe_code)]
//! Command line access to a PressLedger ledger file

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use pressledger::blockchain::{payload_from_value, Block, Ledger};
use pressledger::card::Card;
use pressledger::config::{load_config, Config};
use pressledger::resolver::Resolver;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger file, overriding `ledger.path` from the configuration
    #[arg(long, global = true)]
    ledger: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates the ledger file with a genesis block if it does not exist
    Init,
    /// Seals a JSON object payload into a new block
    Append {
        /// Payload, e.g. '{"title": "...", "metadata_hash": "Qm..."}'
        payload: String,
    },
    /// Prints every block
    Chain,
    /// Checks hash linkage between consecutive blocks
    Validate,
    /// Checks genesis, indices, self-hashes, linkage and proofs
    Audit,
    /// Shows the newest article card
    Latest,
    /// Shows the newest article cards
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Looks up a block by hash
    Verify { hash: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config()?;
    if let Some(path) = cli.ledger {
        config.ledger.path = path;
    }

    let mut ledger = Ledger::open(&config.ledger.path, config.ledger.difficulty)?;

    match cli.command {
        Commands::Init => {
            println!(
                "{} {} ({} blocks)",
                "✔ Ledger ready at".green(),
                config.ledger.path.bright_white(),
                ledger.len()
            );
        }
        Commands::Append { payload } => {
            let payload = payload_from_value(serde_json::from_str(&payload)?)?;
            println!("{}", "⛏️  Sealing block...".bright_cyan());
            let start = Instant::now();
            let block = ledger.append(payload)?;
            println!(
                "{} #{} in {:.3}s",
                "✔ Sealed block".green().bold(),
                block.index,
                start.elapsed().as_secs_f64()
            );
            print_block(&block);
        }
        Commands::Chain => print_chain(ledger.blocks()),
        Commands::Validate => {
            if ledger.validate() {
                println!("{}", "✔ Chain linkage is valid".green().bold());
            } else {
                println!("{}", "✘ Chain linkage is broken".red().bold());
                std::process::exit(1);
            }
        }
        Commands::Audit => {
            let audit = ledger.audit();
            println!("{}", serde_json::to_string_pretty(&audit)?);
            if !audit.valid {
                std::process::exit(1);
            }
        }
        Commands::Latest => {
            let resolver = resolver(ledger, &config)?;
            match resolver.latest().await {
                Some(card) => print_cards(&[card]),
                None => println!("{}", "No articles found in blockchain".yellow()),
            }
        }
        Commands::List { limit } => {
            let resolver = resolver(ledger, &config)?;
            let list = resolver.list(limit).await;
            print_cards(&list.items);
        }
        Commands::Verify { hash } => match ledger.find_by_hash(&hash) {
            Some(block) => {
                println!("{}", "✔ Block found in blockchain.".green().bold());
                print_block(block);
            }
            None => {
                println!("{}", "✘ No block found with the given hash.".red().bold());
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

fn resolver(ledger: Ledger, config: &Config) -> Result<Resolver, Box<dyn std::error::Error>> {
    Ok(Resolver::from_config(ledger.into_shared(), config)?)
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| {
            Cell::new(n)
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold)
        })
        .collect()
}

fn print_block(block: &Block) {
    println!("  {} {}", "Index:".bright_white(), block.index);
    println!("  {} {}", "Hash:".bright_white(), block.hash);
    println!("  {} {}", "Previous:".bright_white(), block.previous_hash);
    println!("  {} {}", "Proof:".bright_white(), block.proof);
    println!("  {} {}", "Timestamp:".bright_white(), format_timestamp(block.timestamp));
    println!(
        "  {} {}",
        "Data:".bright_white(),
        serde_json::Value::Object(block.data.clone())
    );
}

fn print_chain(blocks: &[Block]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["#", "Hash", "Proof", "Date", "Title"]));

    for block in blocks {
        let title = block
            .data_str("title")
            .or_else(|| block.data_str("message"))
            .unwrap_or("-");
        table.add_row(vec![
            Cell::new(block.index).fg(TableColor::White),
            Cell::new(short_hash(&block.hash)).fg(TableColor::Yellow),
            Cell::new(block.proof),
            Cell::new(format_timestamp(block.timestamp)).fg(TableColor::Grey),
            Cell::new(title),
        ]);
    }
    println!("{}", table);
}

fn print_cards(cards: &[Card]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Title", "Category", "Reliability", "Excerpt", "CID"]));

    for card in cards {
        let reliability = card
            .reliability
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(card.title.as_deref().unwrap_or("-")).fg(TableColor::White),
            Cell::new(card.category.as_deref().unwrap_or("-")),
            Cell::new(reliability).fg(TableColor::Green),
            Cell::new(&card.excerpt),
            Cell::new(card.metadata_hash.as_deref().unwrap_or("-")).fg(TableColor::Grey),
        ]);
    }
    println!("{}", table);
}

/// First 16 characters; hand-edited files may hold non-hex text.
fn short_hash(hash: &str) -> String {
    hash.chars().take(16).collect()
}

fn format_timestamp(secs: f64) -> String {
    chrono::DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Invalid".to_string())
}
