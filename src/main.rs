use clap::{Parser, Subcommand};
use classify_rs::api::client::{JobStatusEndpoint, ResourceRefresh};
use classify_rs::api::{ApiClient, Config, Session};
use classify_rs::classification::condition::Field;
use classify_rs::classification::jobs::JobPoller;
use classify_rs::classification::preview::{
    render_trace, DemandInput, LocalEvaluator, PreviewClient,
};
use classify_rs::classification::rules::{MemoryRuleStore, RuleLoader, RuleManager, RuleStore};
use classify_rs::classification::server;
use dotenv::dotenv;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend URL, overrides CLASSIFY_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session cookie, overrides CLASSIFY_SESSION
    #[arg(long, global = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage classification rules (admin only)
    Rules {
        #[command(subcommand)]
        action: RuleAction,
    },
    /// Classify a sample demand with the backend evaluator
    Test {
        /// Demand attribute as field=value, repeatable
        #[arg(short, long = "set", value_parser = parse_assignment)]
        set: Vec<(Field, String)>,

        /// Evaluate only this rule
        #[arg(short, long)]
        rule_id: Option<i64>,
    },
    /// Classify a sample demand locally against a rule file
    Evaluate {
        /// YAML or JSON rule file
        #[arg(short, long)]
        rules: PathBuf,

        /// Demand attribute as field=value, repeatable
        #[arg(short, long = "set", value_parser = parse_assignment)]
        set: Vec<(Field, String)>,
    },
    /// Check a rule file without sending it anywhere
    Validate {
        file: PathBuf,
    },
    /// Poll the refresh job until it finishes
    WatchJob {
        /// Status endpoint, overrides CLASSIFY_JOB_STATUS_PATH
        #[arg(long)]
        path: Option<String>,

        /// Resource to reload once the job is done
        #[arg(long, default_value = "/api/vulnerabilities")]
        refresh_path: String,

        /// Give up after this many seconds
        #[arg(long)]
        max_secs: Option<u64>,
    },
    /// Run the local development server
    Serve {
        #[arg(short, long, default_value_t = 9000)]
        port: u16,
    },
}

#[derive(Subcommand, Debug)]
enum RuleAction {
    /// List rules in priority order
    List,
    /// Print one rule as JSON
    Show { id: i64 },
    /// Create every rule in a file
    Create { file: PathBuf },
    /// Delete a rule
    Delete { id: i64 },
    /// Write all rules to a file
    Export { out: PathBuf },
    /// Import the rules in a file as new records
    Import { file: PathBuf },
}

fn parse_assignment(raw: &str) -> Result<(Field, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))?;
    Ok((field.parse()?, value.to_string()))
}

fn demand_input(set: Vec<(Field, String)>) -> DemandInput {
    let mut input = DemandInput::default();
    for (field, value) in set {
        input.set(field, value);
    }
    input
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = &args.api_url {
        config = config.with_base_url(url)?;
    }
    if let Some(session) = args.session {
        config.session_cookie = Some(session);
    }

    match args.command {
        Commands::Rules { action } => {
            let client = ApiClient::new(&config)?;
            let mut session = Session::new();
            session.resolve(&client).await?;
            let user = session.require_admin()?;
            log::info!("Managing rules as {}", user.username);

            let mut manager = RuleManager::new(Arc::new(client), session);
            run_rule_action(&mut manager, action).await?;
        }
        Commands::Test { set, rule_id } => {
            let client = ApiClient::new(&config)?;
            let mut preview = PreviewClient::new(Arc::new(client));
            let result = preview.preview(demand_input(set), rule_id).await?;
            print!("{}", render_trace(result));
        }
        Commands::Evaluate { rules, set } => {
            let rules = RuleLoader::new().load(&rules)?;
            RuleLoader::validate_all(&rules)?;

            let store = MemoryRuleStore::new();
            store.import(&rules).await?;
            let evaluator = LocalEvaluator::new(Arc::new(store.clone()));
            let ordered = store.list().await?;
            let result = evaluator.classify(&ordered, &demand_input(set));
            print!("{}", render_trace(&result));
        }
        Commands::Validate { file } => {
            let rules = RuleLoader::new().load(&file)?;
            match RuleLoader::validate_all(&rules) {
                Ok(()) => println!("{}: {} rules OK", file.display(), rules.len()),
                Err(errors) => {
                    for issue in errors.issues() {
                        eprintln!("{}: {}", file.display(), issue);
                    }
                    return Err(format!("{} validation errors", errors.len()).into());
                }
            }
        }
        Commands::WatchJob {
            path,
            refresh_path,
            max_secs,
        } => {
            let client = ApiClient::new(&config)?;
            let status_path = path.unwrap_or_else(|| config.job_status_path.clone());
            let mut poller = JobPoller::new(
                Arc::new(JobStatusEndpoint::new(client.clone(), status_path)),
                Arc::new(ResourceRefresh::new(client, refresh_path)),
            )
            .with_interval(config.poll_interval);
            if let Some(secs) = max_secs {
                poller = poller.with_max_duration(Duration::from_secs(secs));
            }

            let outcome = poller.run().await?;
            println!("{:?} after {} polls", outcome.finish, outcome.polls);
        }
        Commands::Serve { port } => {
            server::serve(port).await?;
        }
    }

    Ok(())
}

async fn run_rule_action(
    manager: &mut RuleManager,
    action: RuleAction,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match action {
        RuleAction::List => {
            for rule in manager.refresh().await? {
                println!(
                    "{:>4}  {:>3}  {}  {:.2}  {:<6} {}  {}",
                    rule.id.map(|id| id.to_string()).unwrap_or_default(),
                    rule.priority_order.map(|p| p.to_string()).unwrap_or_default(),
                    rule.classification,
                    rule.confidence_score,
                    if rule.active { "active" } else { "off" },
                    rule.name,
                    rule.condition
                );
            }
        }
        RuleAction::Show { id } => {
            let draft = manager.edit(id).await?;
            println!("{}", serde_json::to_string_pretty(&draft.rule)?);
        }
        RuleAction::Create { file } => {
            for rule in RuleLoader::new().load(&file)? {
                let stored = manager.create(&rule).await?;
                println!(
                    "Created '{}' with id {:?}, priority {:?}",
                    stored.name, stored.id, stored.priority_order
                );
            }
        }
        RuleAction::Delete { id } => {
            manager.delete(id).await?;
            println!("Deleted rule {}", id);
        }
        RuleAction::Export { out } => {
            let rules = manager.export().await?;
            RuleLoader::new().save(&out, &rules)?;
            println!("Exported {} rules to {}", rules.len(), out.display());
        }
        RuleAction::Import { file } => {
            let rules = RuleLoader::new().load(&file)?;
            let count = manager.import(&rules).await?;
            println!("Imported {} rules", count);
        }
    }
    Ok(())
}
