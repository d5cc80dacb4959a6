use clap::{Parser, Subcommand};
use docindex_core::{BatchReport, Document, IndexerConfig, Parameters, SimpleIndexer};
use serde_json::{json, Value};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docindex", about = "Persistent document vector index")]
struct Args {
    /// Workspace directory holding the index artifact
    #[arg(short, long, env = "DOCINDEX_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Storage backend: memory, blob, memmap or table
    #[arg(short, long)]
    backend: Option<String>,

    /// JSON configuration file. Flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Accept documents without an embedding or with a foreign shape
    #[arg(long, default_value_t = false)]
    no_validate: bool,

    /// Skip fsync after each mutation (memmap backend)
    #[arg(long, default_value_t = false)]
    no_sync: bool,

    #[command(subcommand)]
    op: Op,
}

#[derive(Subcommand, Debug)]
enum Op {
    /// Append documents
    Index(Input),
    /// Match query documents against the store and print them with their matches
    Search {
        #[command(flatten)]
        input: Input,
        /// Match parameters as a JSON object, e.g. '{"metric": "euclidean", "limit": 5}'
        #[arg(short, long)]
        params: Option<String>,
    },
    /// Delete documents by id
    Delete {
        #[arg(long, num_args = 1.., required = true)]
        ids: Vec<String>,
    },
    /// Overwrite stored documents in place
    Update(Input),
    /// Print the documents with their stored embeddings filled in
    FillEmbedding(Input),
    /// Persist the store, merging the documents of --input first if given
    Dump {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Reload the store from its blob snapshot
    Load,
    /// Remove every document
    Clear,
    /// Print backend, workspace and document count
    Stats,
}

#[derive(clap::Args, Debug)]
struct Input {
    /// JSON array of documents. Read from stdin when absent.
    #[arg(short, long)]
    input: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<IndexerConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => IndexerConfig::from_json_file(path)?,
        None => IndexerConfig::default(),
    };
    if let Some(workspace) = &args.workspace {
        config.workspace = workspace.clone();
    }
    if let Some(backend) = &args.backend {
        config.backend = backend.parse()?;
    }
    if args.no_validate {
        config.validate_shapes = false;
    }
    if args.no_sync {
        config.sync_writes = false;
    }
    Ok(config)
}

fn read_documents(
    path: Option<&PathBuf>,
    stdin: &mut dyn Read,
) -> Result<Vec<Document>, Box<dyn Error>> {
    let docs = match path {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => serde_json::from_reader(stdin)?,
    };
    Ok(docs)
}

fn report_json(report: &BatchReport) -> Value {
    json!({
        "applied": report.applied,
        "skipped": report
            .skipped
            .iter()
            .map(|s| json!({ "id": s.id, "reason": s.reason.to_string() }))
            .collect::<Vec<_>>(),
    })
}

fn run(args: Args, stdin: &mut dyn Read, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
    let config = build_config(&args)?;
    let mut indexer = SimpleIndexer::new(config)?;

    let output: Value = match args.op {
        Op::Index(input) => {
            let docs = read_documents(input.input.as_ref(), stdin)?;
            report_json(&indexer.index(docs)?)
        }
        Op::Search { input, params } => {
            let parameters: Option<Parameters> = params
                .as_deref()
                .map(|p| serde_json::from_str(p))
                .transpose()?;
            let mut docs = read_documents(input.input.as_ref(), stdin)?;
            let stats = indexer.search(&mut docs, parameters.as_ref())?;
            tracing::info!(
                "search - matched {} queries, skipped {}",
                stats.matched,
                stats.skipped
            );
            serde_json::to_value(&docs)?
        }
        Op::Delete { ids } => {
            let mut parameters = Parameters::new();
            parameters.insert("ids".into(), json!(ids));
            json!({ "deleted": indexer.delete(&parameters)? })
        }
        Op::Update(input) => {
            let docs = read_documents(input.input.as_ref(), stdin)?;
            report_json(&indexer.update(docs)?)
        }
        Op::FillEmbedding(input) => {
            let mut docs = read_documents(input.input.as_ref(), stdin)?;
            indexer.fill_embedding(&mut docs)?;
            serde_json::to_value(&docs)?
        }
        Op::Dump { input } => {
            let extra = match input {
                Some(path) => Some(read_documents(Some(&path), stdin)?),
                None => None,
            };
            report_json(&indexer.dump(extra)?)
        }
        Op::Load => {
            indexer.load()?;
            json!({ "documents": indexer.len() })
        }
        Op::Clear => {
            indexer.clear()?;
            json!({ "documents": 0 })
        }
        Op::Stats => serde_json::to_value(indexer.stats()?)?,
    };

    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("docindex_cli=info".parse()?)
                .add_directive("docindex_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let stdout = io::stdout();
    run(args, &mut io::stdin().lock(), &mut stdout.lock())
}
