// ============================================================================
// unlockctl — CLI tool for the agent unlock engine
// ============================================================================
// Usage:
//   unlockctl check --user U --agent A              Check unlock eligibility
//   unlockctl unlock --user U --agent A [--sub S]   Attempt an unlock
//   unlockctl list [--user U]                       List unlock records
//   unlockctl stats                                 Show ledger statistics
//   unlockctl remove --user U --agent A [--sub S]   Remove an unlock record
//   unlockctl export                                Export ledger as JSON
//
// Eligibility and unlocks run against the simulated dev oracles; point
// --contracts (or UNLOCK_CONTRACTS_PATH) at the registry JSON file.
// ============================================================================

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use unlock_core::oracle::{MockChain, MockSubscriptions};
use unlock_core::unlock::ROOT_SUB_AGENT;
use unlock_core::{ContractRegistry, UnlockDb, UnlockEvaluator, UnlockRecord};

/// Agent unlock engine CLI
#[derive(Parser)]
#[command(name = "unlockctl", version, about = "Check, execute, and inspect agent unlocks")]
struct Cli {
    /// Path to the ledger database (default: ~/.agent-unlock/unlocks.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    /// Path to the contract registry JSON (default: UNLOCK_CONTRACTS_PATH env)
    #[arg(long, global = true)]
    contracts: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a user is eligible to unlock an agent (read-only)
    Check {
        #[arg(long)]
        user: String,
        #[arg(long)]
        agent: String,
    },

    /// Attempt to unlock an agent for a user
    Unlock {
        #[arg(long)]
        user: String,
        #[arg(long)]
        agent: String,
        /// Sub-agent to unlock (default: the whole agent)
        #[arg(long)]
        sub: Option<String>,
    },

    /// List unlock records, optionally filtered by user
    List {
        #[arg(long)]
        user: Option<String>,
    },

    /// Show ledger statistics
    Stats,

    /// Remove an unlock record
    Remove {
        #[arg(long)]
        user: String,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        sub: Option<String>,
    },

    /// Export the full ledger as JSON
    Export,
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

fn load_registry(cli: &Cli) -> Result<ContractRegistry> {
    let path = cli
        .contracts
        .clone()
        .or_else(|| std::env::var("UNLOCK_CONTRACTS_PATH").ok())
        .ok_or_else(|| {
            anyhow!("No contract registry: pass --contracts or set UNLOCK_CONTRACTS_PATH")
        })?;
    ContractRegistry::load(path)
}

fn build_evaluator(cli: &Cli, db: UnlockDb) -> Result<UnlockEvaluator> {
    Ok(UnlockEvaluator::new(
        load_registry(cli)?,
        Arc::new(MockChain::default()),
        Arc::new(MockSubscriptions::default()),
        Arc::new(db),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let db = UnlockDb::open(cli.db_path.as_deref())?;

    match &cli.command {
        Commands::Check { user, agent } => cmd_check(&cli, db, user, agent).await,
        Commands::Unlock { user, agent, sub } => {
            cmd_unlock(&cli, db, user, agent, sub.as_deref()).await
        }
        Commands::List { user } => cmd_list(&db, user.as_deref()),
        Commands::Stats => cmd_stats(&db),
        Commands::Remove { user, agent, sub } => cmd_remove(&db, user, agent, sub.as_deref()),
        Commands::Export => cmd_export(&db),
    }
}

async fn cmd_check(cli: &Cli, db: UnlockDb, user: &str, agent: &str) -> Result<()> {
    let evaluator = build_evaluator(cli, db)?;

    match evaluator.check_eligibility(user, agent).await {
        Ok(result) => {
            println!("Agent:    {}", agent);
            println!("Method:   {}", result.method.display_name());
            if result.eligible {
                println!("Eligible: yes");
            } else {
                println!("Eligible: no");
                if let Some(reason) = result.reason {
                    println!("Reason:   {}", reason);
                }
            }
        }
        Err(e) => println!("Check failed: {}", e),
    }
    Ok(())
}

async fn cmd_unlock(
    cli: &Cli,
    db: UnlockDb,
    user: &str,
    agent: &str,
    sub: Option<&str>,
) -> Result<()> {
    let evaluator = build_evaluator(cli, db)?;

    match evaluator.execute_unlock(user, agent, sub).await {
        Ok(record) => {
            println!("Unlocked {} for {}", agent, user);
            println!("  Method: {}", record.method.display_name());
            println!("  Proof:  {}", record.proof);
            println!("  Cost:   {}", record.cost);
            println!("  At:     {}", format_timestamp(record.unlocked_at));
        }
        Err(e) => println!("Unlock failed: {}", e),
    }
    Ok(())
}

fn cmd_list(db: &UnlockDb, user_filter: Option<&str>) -> Result<()> {
    let records = db.list_unlocks(user_filter)?;

    if records.is_empty() {
        println!("No unlock records found.");
        return Ok(());
    }

    println!(
        "{:<16}  {:<24}  {:<12}  {:<12}  {:<22}  {}",
        "USER", "AGENT", "SUB-AGENT", "METHOD", "UNLOCKED AT", "PROOF"
    );
    println!("{}", "-".repeat(110));

    for record in &records {
        let proof = record.proof.chars().take(24).collect::<String>();
        println!(
            "{:<16}  {:<24}  {:<12}  {:<12}  {:<22}  {}",
            record.user,
            record.agent_id,
            record.sub_agent,
            record.method.display_name(),
            format_timestamp(record.unlocked_at),
            proof
        );
    }

    println!("\nTotal: {} records", records.len());
    Ok(())
}

fn cmd_stats(db: &UnlockDb) -> Result<()> {
    let stats = db.stats()?;

    println!("=== Unlock Ledger Stats ===");
    println!("Database: {}", db.path().display());
    println!();
    println!("Unlocks:  {} total", stats.total_unlocks);
    for (method, count) in &stats.method_counts {
        println!("  {:12} {}", method, count);
    }
    println!("Users:    {}", stats.distinct_users);

    Ok(())
}

fn cmd_remove(db: &UnlockDb, user: &str, agent: &str, sub: Option<&str>) -> Result<()> {
    let sub = sub.unwrap_or(ROOT_SUB_AGENT);
    if db.delete_unlock(user, agent, sub)? {
        println!("Removed unlock record for {}:{}:{}", user, agent, sub);
    } else {
        println!("No unlock record for {}:{}:{}", user, agent, sub);
    }
    Ok(())
}

fn cmd_export(db: &UnlockDb) -> Result<()> {
    let records: Vec<UnlockRecord> = db.list_unlocks(None)?;
    let stats = db.stats()?;

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": stats,
        "unlocks": records,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}
