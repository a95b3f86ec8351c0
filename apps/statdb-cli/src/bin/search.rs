use std::env;

use statdb_core::config::Config;
use statdb_hybrid::catalog::render_catalog;
use statdb_hybrid::HybridSearchEngine;

const DEFAULT_TOP_K: usize = 10;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [--top-k N] [--catalog]", args[0]);
        eprintln!("Example: {} '高齢化率' --top-k 5", args[0]);
        std::process::exit(1);
    }
    let query = &args[1];
    let mut top_k = DEFAULT_TOP_K;
    let mut catalog = false;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" | "-k" => {
                if let Some(n) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                    top_k = n;
                    i += 1;
                } else {
                    eprintln!("Error: --top-k requires a number");
                    std::process::exit(1);
                }
            }
            "--catalog" | "-c" => catalog = true,
            other => eprintln!("⚠️  Ignoring unknown flag {}", other),
        }
        i += 1;
    }

    let config = Config::load()?;
    let engine = HybridSearchEngine::load(&config)?;
    println!("🔍 statdb-search\n================");
    println!("Query: {}", query);

    let results = engine.hybrid_search(query, top_k);
    println!("\n🔍 Found {} results for: \"{}\"", results.len(), query);
    for (i, result) in results.iter().enumerate() {
        println!(
            "\n  {}. score={:.4}  code={}  group={}",
            i + 1,
            result.score,
            result.code,
            result.group_code
        );
        println!("     📝 {}", result.full_name);
        println!("     📂 {} > {} > {}", result.field, result.subfield, result.subsubfield);
    }

    if catalog {
        println!("\n📊 Available indicators by category:");
        let groups = engine.available_indicators(query);
        println!("{}", render_catalog(&groups));
    }
    Ok(())
}
