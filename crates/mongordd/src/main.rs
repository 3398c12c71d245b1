use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use mongordd::{describe_partition, document_to_json, select_partitions, LocalExecutor, MongoReader, ReaderSettings};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Reader settings file. Defaults to $MONGORDD_CONFIG_PATH or config/default.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the partition descriptors and their range filters
    Partitions,
    /// Print documents as relaxed extended JSON, one per line
    Scan {
        /// Only read this partition
        #[arg(short, long)]
        partition: Option<usize>,
        /// Stop after this many documents
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Count the documents across all partitions
    Count {
        /// Partitions read at once
        #[arg(long, default_value_t = 4)]
        max_concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => ReaderSettings::from_file(path)?,
        None => ReaderSettings::new()?,
    };
    tracing::debug!(?settings, "loaded reader settings");
    let reader = MongoReader::new(settings)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Partitions => {
            for partition in reader.partitions()? {
                writeln!(out, "{}", describe_partition(&reader, &partition))?;
            }
        }
        Command::Scan { partition, limit } => {
            let mut remaining = limit.unwrap_or(usize::MAX);
            for partition in select_partitions(&reader, partition)? {
                if remaining == 0 {
                    break;
                }
                let mut stream = reader.compute(&partition).await?;
                while let Some(document) = stream.try_next().await? {
                    writeln!(out, "{}", serde_json::to_string(&document_to_json(document))?)?;
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                }
            }
        }
        Command::Count { max_concurrency } => {
            let executor = LocalExecutor::new(reader).with_max_concurrency(max_concurrency)?;
            writeln!(out, "{}", executor.count().await?)?;
        }
    }
    Ok(())
}
