//! Build automation tasks for Novo
//!
//! This tool provides automation tasks for the Novo workspace:
//! - Generating the `novo-ingest` CLI reference from the clap definitions

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for Novo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<novo_ingest::cli::Cli>();

    let content = format!(
        r#"# novo-ingest CLI Reference

Generated from the CLI source code on {}.

`novo-ingest` ingests tabular datasets incrementally: each run stores only the
records whose key has not been seen by an earlier run, typed against the
dataset's declared schema.

## Quick Start

```bash
# Ingest every dataset in the catalog with the single-process engine
novo-ingest --catalog datasets.toml run

# Ingest two datasets on the partition-parallel engine
novo-ingest run --dataset confirmed --dataset deaths --engine batch

# Show state and stored row counts
novo-ingest status
```

## Commands

{}

## Environment Variables

- `NOVO_CATALOG` - Dataset catalog path (default: `datasets.toml`)
- `NOVO_INPUT_DIR` - Raw input directory (default: `./data/raw`)
- `NOVO_OUTPUT_DIR` - Typed output root (default: `./data/typed`)
- `NOVO_STATE_DIR` - Identity state root (default: `./data/state`)
- `NOVO_ENGINE` - `local` or `batch` (default: `local`)
- `NOVO_PARTITION_SIZE` - Records per batch partition (default: `10000`)
- `NOVO_PARALLELISM` - Batch worker threads (default: CPU count)
- `NOVO_MAX_CONCURRENT_DATASETS` - Datasets run at once (default: `4`)
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR`, `LOG_FILTER` - Logging

## Dataset Catalog

```toml
[[datasets]]
name = "confirmed"
key_columns = ["Province/State", "Country/Region", "Date"]
date_format = "%m/%d/%y"
columns = [
    {{ name = "Province/State", type = "string" }},
    {{ name = "Country/Region", type = "string" }},
    {{ name = "Date", type = "date" }},
    {{ name = "Confirmed", type = "integer" }},
]
```

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
