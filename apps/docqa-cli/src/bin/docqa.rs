use std::env;
use std::io::{self, BufRead, Write};

use docqa_cli::logging;
use docqa_core::config::Config;
use docqa_rag::QueryOrchestrator;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() { eprintln!("Usage: {} <ingest|status|query|chat> [args...]", prog); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

async fn chat(rag: &QueryOrchestrator) -> anyhow::Result<()> {
    let corpus = rag.ensure_loaded().await?;
    println!("Loaded {} text chunks from {} documents", corpus.len(), corpus.documents().len());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nAsk a question (or 'quit' to exit): ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let question = line?;
        if question.trim().eq_ignore_ascii_case("quit") { break; }
        let answer = rag.answer(&question).await;
        println!("\nAnswer: {}", answer);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let (cmd, args) = parse_args();
    let rag = docqa_rag::from_config(&config)?;
    match cmd.as_str() {
        "ingest" => {
            let corpus = rag.reload(true).await?;
            println!("✅ Ingest complete ({} chunks from {} documents)", corpus.len(), corpus.documents().len());
        }
        "status" => {
            let report = rag.status().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "query" => {
            let question = args.join(" ");
            if question.trim().is_empty() { eprintln!("Usage: docqa query \"<question>\""); std::process::exit(1); }
            let answer = rag.ask(&question).await?;
            println!("{}", answer.text);
            for s in &answer.sources {
                println!("  [{:.3}] {} (chunk {})", s.score, s.document, s.chunk_index);
            }
        }
        "chat" => chat(&rag).await?,
        _ => { eprintln!("Unknown command: {}", cmd); std::process::exit(1); }
    }
    Ok(())
}
