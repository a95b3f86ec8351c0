use std::env;
use std::path::PathBuf;

use statdb_core::config::{expand_path, Config};
use statdb_embed::get_default_embedder;
use statdb_hybrid::IndexBuilder;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut batch_size = None;
    let mut out_dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--batch-size" | "-b" => {
                if let Some(n) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                    batch_size = Some(n);
                    i += 1;
                } else {
                    eprintln!("Error: --batch-size requires a number");
                    std::process::exit(1);
                }
            }
            _ if !args[i].starts_with('-') => out_dir = Some(PathBuf::from(&args[i])),
            other => eprintln!("⚠️  Ignoring unknown flag {}", other),
        }
        i += 1;
    }

    let master_csv = expand_path(
        config.get_or("data.master_csv", "data/indicator_master.csv".to_string()),
    );
    let definitions_csv = expand_path(
        config.get_or("data.definitions_csv", "data/indicator_definitions.csv".to_string()),
    );
    let out_dir = out_dir
        .unwrap_or_else(|| expand_path(config.get_or("artifacts.dir", "vector_db".to_string())));

    println!("Hybrid Index Builder\n====================");
    println!("Master table:      {}", master_csv.display());
    println!("Definitions table: {}", definitions_csv.display());
    println!("Output directory:  {}", out_dir.display());

    let embedder = get_default_embedder(&config)?;
    println!("Embedding model:   {}", embedder.model());

    let mut builder = IndexBuilder::new(embedder);
    if let Some(n) = batch_size {
        builder = builder.with_batch_size(n);
    }

    let dim = builder.verify_embedder()?;
    println!("✅ Embedding service reachable (dimension {})", dim);

    let rows = IndexBuilder::load_rows(&master_csv, &definitions_csv)?;
    println!("📊 Loaded {} indicator rows", rows.len());

    let metadata = builder.build(&rows, &out_dir)?;
    println!("\n✅ Build completed successfully!");
    println!("📊 {} records, dimension {}", metadata.total_records, metadata.vector_dimension);
    println!("💡 To search, use: cargo run --bin statdb-search '<query>'");
    Ok(())
}
