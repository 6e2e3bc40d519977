use anyhow::{Context, bail};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabixr::{
    Config, TabixReader,
    bgzf,
    config::{Command, IndexArgs},
    index,
    reader::default_index_path,
};

fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize tracing; stdout is reserved for records
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<tabixr::Error>()
                .map(|e| e.exit_code())
                .unwrap_or(1);
            eprintln!("error: {:#}", err);
            ExitCode::from(code as u8)
        }
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    match &config.command {
        Command::Compress {
            input,
            output,
            force,
        } => {
            let output = output.clone().unwrap_or_else(|| {
                let mut name = input.as_os_str().to_owned();
                name.push(".gz");
                name.into()
            });
            compress(input, &output, *force)
        }
        Command::Index(args) => build_index(args),
        Command::Query {
            file,
            regions,
            index,
        } => {
            let reader = open(file, index.as_deref())?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for region in regions {
                for line in reader.query_region(region)? {
                    writeln!(out, "{}", line?)?;
                }
            }
            out.flush()?;
            Ok(())
        }
        Command::Header { file, index } => {
            let reader = open(file, index.as_deref())?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for line in reader.header_lines() {
                writeln!(out, "{}", line)?;
            }
            out.flush()?;
            Ok(())
        }
        Command::Contigs { file, index, json } => {
            let reader = open(file, index.as_deref())?;
            let summaries = reader.summaries();
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            if *json {
                serde_json::to_writer_pretty(&mut out, &summaries)?;
                writeln!(out)?;
            } else {
                for summary in &summaries {
                    let records = summary
                        .records
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| ".".to_string());
                    writeln!(out, "{}\t{}", summary.name, records)?;
                }
            }
            out.flush()?;
            Ok(())
        }
    }
}

fn open(file: &Path, index: Option<&Path>) -> anyhow::Result<TabixReader> {
    let reader = match index {
        Some(index) => TabixReader::open_with_index(file, index)?,
        None => TabixReader::open(file)?,
    };
    Ok(reader)
}

fn compress(input: &Path, output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        bail!("{} already exists; use --force to overwrite", output.display());
    }

    let mut source = BufReader::new(
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?,
    );
    let sink = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let mut writer = bgzf::Writer::new(BufWriter::new(sink));
    let bytes = io::copy(&mut source, &mut writer)?;
    writer.finish()?.flush()?;

    tracing::info!("Compressed {} bytes into {}", bytes, output.display());
    Ok(())
}

fn build_index(args: &IndexArgs) -> anyhow::Result<()> {
    let index_path = default_index_path(&args.file);
    if index_path.exists() && !args.force {
        bail!("{} already exists; use --force to overwrite", index_path.display());
    }

    let index = index::build(&args.file, args.header())?;
    index::write(&index, &index_path)?;

    tracing::info!(
        "Indexed {} contigs into {}",
        index.reference_sequences().len(),
        index_path.display()
    );
    Ok(())
}
