//! Showroom CLI: chat with the car-sales assistant from the terminal.
//!
//! One-shot with `-m "..."`, or an interactive REPL (default when no message is given).
//! Conversations persist in SQLite, keyed by `--thread-id`.

mod logging;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use showroom::oracle::ChatCompletionsOracle;
use showroom::{
    build_graph, ConversationRunner, InMemoryInventory, NodeContext, Oracle, OrchestratorConfig,
    SqliteThreadStore,
};

use repl::{run_one_turn, run_repl_loop};

#[derive(Parser, Debug)]
#[command(name = "showroom")]
#[command(about = "Showroom: used-car sales assistant (quotes and executive callbacks)")]
struct Args {
    /// Customer message for a single turn (or pass as positional arguments)
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,

    /// Positional args: customer message when -m/--message is not used
    #[arg(trailing_var_arg = true)]
    rest: Vec<String>,

    /// Thread ID for conversation continuity; a new one is generated when omitted
    #[arg(long, value_name = "ID")]
    thread_id: Option<String>,

    /// SQLite file holding conversation threads
    #[arg(
        long,
        value_name = "PATH",
        env = "CONVERSATION_DB_PATH",
        default_value = "data/conversations.db"
    )]
    conversation_db: PathBuf,

    /// Inventory JSON file (array of vehicles); the bundled demo inventory when omitted
    #[arg(long, value_name = "PATH", env = "SHOWROOM_INVENTORY")]
    inventory: Option<PathBuf>,

    /// Run without the language-model oracle (deterministic fallbacks only)
    #[arg(long)]
    offline: bool,

    /// Interactive REPL after the one-shot message
    #[arg(short, long)]
    interactive: bool,

    /// Verbose: log node steps and oracle fallbacks
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| (!self.rest.is_empty()).then(|| self.rest.join(" ")))
            .filter(|m| !m.trim().is_empty())
    }
}

fn generate_thread_id() -> String {
    format!("thread-{}", uuid::Uuid::new_v4())
}

fn build_runner(args: &Args) -> Result<ConversationRunner, Box<dyn std::error::Error>> {
    let inventory = Arc::new(match &args.inventory {
        Some(path) => InMemoryInventory::from_path(path)?,
        None => InMemoryInventory::demo()?,
    });
    let oracle: Option<Arc<dyn Oracle>> = if args.offline {
        None
    } else {
        match ChatCompletionsOracle::from_env() {
            Some(oracle) => {
                tracing::debug!(model = oracle.model(), "using chat completions oracle");
                Some(Arc::new(oracle))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY not set; running without oracle");
                None
            }
        }
    };
    let config = OrchestratorConfig::from_env();
    tracing::debug!(?config, "orchestrator config");

    let ctx = NodeContext::new(oracle, inventory.clone(), inventory, config);
    let store = Arc::new(SqliteThreadStore::new(&args.conversation_db)?);
    Ok(ConversationRunner::new(build_graph(ctx)?, store))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let applied = config::load_and_apply(config::APP_NAME, None);
    let args = Args::parse();
    let _log_guard = logging::init(args.verbose)?;
    match applied {
        Ok(keys) => tracing::debug!(?keys, "configuration applied"),
        Err(e) => tracing::warn!(error = %e, "configuration files ignored"),
    }

    let runner = build_runner(&args)?;
    let thread_id = args.thread_id.clone().unwrap_or_else(generate_thread_id);

    match args.message() {
        Some(message) => {
            println!("{}", run_one_turn(&runner, &thread_id, &message).await?);
            if args.interactive {
                run_repl_loop(&runner, &thread_id).await?;
            }
        }
        None => run_repl_loop(&runner, &thread_id).await?,
    }
    Ok(())
}
