//! Interactive REPL loop: read stdin, run one turn, print the reply, repeat until EOF or quit.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Instrument;

use showroom::{AgentError, ConversationRunner};

fn is_quit_command(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    matches!(lower.as_str(), "quit" | "exit" | "salir" | "/quit" | "/exit")
}

/// Runs one turn on `thread_id` and returns the reply text.
pub async fn run_one_turn(
    runner: &ConversationRunner,
    thread_id: &str,
    text: &str,
) -> Result<String, AgentError> {
    let span = tracing::info_span!("turn", thread_id = %thread_id);
    let reply = runner.run_turn(thread_id, text).instrument(span).await?;
    Ok(reply.text)
}

/// Prompts, reads a line, runs the turn and prints the reply.
///
/// Exits on EOF (Ctrl+D) or a quit command. Store errors are printed and the loop goes on.
pub async fn run_repl_loop(
    runner: &ConversationRunner,
    thread_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("thread: {thread_id}  (type `salir` or `exit` to quit)");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match reader.next_line().await? {
            None => break,
            Some(s) if s.trim().is_empty() => continue,
            Some(s) if is_quit_command(&s) => break,
            Some(s) => s,
        };

        match run_one_turn(runner, thread_id, line.trim()).await {
            Ok(reply) => println!("{reply}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    println!("Bye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use showroom::{build_graph, InMemoryInventory, NodeContext, OrchestratorConfig, SqliteThreadStore};
    use std::sync::Arc;

    #[test]
    fn quit_commands() {
        assert!(is_quit_command("quit"));
        assert!(is_quit_command(" EXIT "));
        assert!(is_quit_command("Salir"));
        assert!(is_quit_command("/quit"));
        assert!(!is_quit_command("quiero salir a probar un auto"));
    }

    /// **Scenario**: An offline turn answers with the configuration notice and is stored.
    #[tokio::test]
    async fn offline_turn_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteThreadStore::new(dir.path().join("c.db")).unwrap());
        let inventory = Arc::new(InMemoryInventory::demo().unwrap());
        let config = OrchestratorConfig {
            default_language: Some("es".into()),
            ..Default::default()
        };
        let graph = build_graph(NodeContext::new(None, inventory.clone(), inventory, config)).unwrap();
        let runner = ConversationRunner::new(graph, store.clone());

        let reply = run_one_turn(&runner, "t-cli", "hola").await.unwrap();
        assert!(reply.contains("OPENAI_API_KEY"));

        use showroom::ThreadStore;
        let snapshot = store.load("t-cli").await.unwrap();
        assert_eq!(snapshot.transcript.len(), 2);
    }
}
