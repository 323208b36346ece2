use std::{
    fs,
    io::{stdin, stdout, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, ensure, Context};
use clap::{Args, Parser, Subcommand};
use rdf::{
    ChunkFile, ChunkFileWriter, Compression, FileMode, FileStream, StreamAccess, WriterOptions,
};
use tap::Pipe;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Inspect and edit RDF chunk files")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every chunk in a file
    List { file: PathBuf },

    /// Write a chunk's data (or header) to a file or stdout
    Extract(ExtractArgs),

    /// Add a chunk to a file
    Add(AddArgs),

    /// Copy the chunks of several files into a new one
    Merge(MergeArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    pub file: PathBuf,
    pub id: String,

    #[arg(short, long, default_value_t = 0)]
    pub index: usize,

    /// Extract the chunk header instead of its data
    #[arg(long)]
    pub header: bool,

    #[arg(short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct AddArgs {
    pub file: PathBuf,
    pub id: String,

    /// Payload file, `-` for stdin
    #[arg(long)]
    pub data: PathBuf,

    #[arg(long)]
    pub header: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Compression::None)]
    pub compression: Compression,

    #[arg(long, default_value_t = 1)]
    pub version: u32,

    #[arg(long, default_value_t = 0)]
    pub level: i32,

    /// Create (or truncate) the file instead of appending to it
    #[arg(long)]
    pub create: bool,
}

#[derive(Debug, Args)]
struct MergeArgs {
    pub output: PathBuf,

    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Recompress every chunk with this codec instead of keeping its own
    #[arg(short, long, value_enum)]
    pub compression: Option<Compression>,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::List { file } => list(&file),
        Command::Extract(args) => extract(args),
        Command::Add(args) => add(args),
        Command::Merge(args) => merge(args),
    }
}

fn list(path: &Path) -> anyhow::Result<()> {
    let file =
        ChunkFile::open_file(path).with_context(|| format!("Unable to open {}", path.display()))?;
    let mut out = stdout().lock();

    writeln!(
        out,
        "{:<16} {:>5} {:>7} {:>11} {:>8} {:>12} {:>12}",
        "ID", "INDEX", "VERSION", "COMPRESSION", "HEADER", "STORED", "SIZE"
    )?;

    for (id, index) in file.iter() {
        let entry = file.chunk_info(id, index)?;
        writeln!(
            out,
            "{:<16} {:>5} {:>7} {:>11} {:>8} {:>12} {:>12}",
            id.to_string(),
            index,
            entry.version.get(),
            entry.compression.to_string(),
            entry.chunk_header_size.get(),
            entry.chunk_data_size.get(),
            entry.data_size(),
        )?;
    }

    Ok(())
}

fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    let mut file = ChunkFile::open_file(&args.file)
        .with_context(|| format!("Unable to open {}", args.file.display()))?;

    ensure!(
        file.contains_chunk(args.id.as_str(), args.index),
        "Chunk {:?} index {} not found in {}",
        args.id,
        args.index,
        args.file.display()
    );

    let bytes = if args.header {
        file.chunk_header(args.id.as_str(), args.index)?
    } else {
        file.chunk_data(args.id.as_str(), args.index)?
    };

    let mut writer: Box<dyn Write> = if let Some(output) = args.output.as_ref() {
        fs::File::create(output)
            .with_context(|| format!("Unable to create {}", output.display()))?
            .pipe(std::io::BufWriter::new)
            .pipe(Box::new)
    } else {
        Box::new(stdout())
    };

    writer.write_all(&bytes)?;
    writer.flush().context("Unable to flush output")?;

    Ok(())
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let mut buffer = vec![];
    if path == Path::new("-") {
        stdin().read_to_end(&mut buffer)?;
    } else {
        buffer = fs::read(path).with_context(|| format!("Unable to read {}", path.display()))?;
    }
    Ok(buffer)
}

fn add(args: AddArgs) -> anyhow::Result<()> {
    let data = read_input(&args.data)?;
    let header = args
        .header
        .as_deref()
        .map(read_input)
        .transpose()?
        .unwrap_or_default();

    let (mode, options) = if args.create {
        (FileMode::Create, WriterOptions::default())
    } else {
        (FileMode::Open, WriterOptions::append())
    };

    let stream = FileStream::open(&args.file, StreamAccess::ReadWrite, mode)
        .with_context(|| format!("Unable to open {}", args.file.display()))?;

    let mut writer = ChunkFileWriter::with_options(stream, options.compression_level(args.level))
        .context("Unable to start writing")?;
    let index = writer.write_chunk(
        args.id.as_str(),
        &header,
        &data,
        args.compression,
        args.version,
    )?;
    writer.finalize().context("Unable to finalize chunk file")?;

    info!(id = %args.id, index, "added chunk");
    println!("{index}");

    Ok(())
}

fn merge(args: MergeArgs) -> anyhow::Result<()> {
    ensure!(
        !args.inputs.contains(&args.output),
        "Output must not be one of the inputs"
    );

    if let Err(e) = merge_into(&args).context(anyhow!("{}", args.output.display())) {
        let rf = fs::remove_file(&args.output);
        if rf.is_err() {
            rf.context(anyhow!(e))?;
        } else {
            bail!(e);
        }
    }

    Ok(())
}

fn merge_into(args: &MergeArgs) -> anyhow::Result<u64> {
    let stream = FileStream::create(&args.output)?;
    let mut writer = ChunkFileWriter::create(stream)?;
    let mut total = 0u64;

    for input in &args.inputs {
        let mut file = ChunkFile::open_file(input)
            .with_context(|| format!("Unable to open {}", input.display()))?;

        let pairs: Vec<_> = file.iter().collect();
        for (id, index) in pairs {
            let entry = *file.chunk_info(id, index)?;
            let header = file.chunk_header(id, index)?;
            let data = file.chunk_data(id, index)?;
            let compression = args.compression.unwrap_or(entry.compression);

            let new_index =
                writer.write_chunk(id, &header, &data, compression, entry.version.get())?;
            debug!(%id, index, new_index, input = %input.display(), "copied chunk");
            total += 1;
        }
    }

    writer.finalize()?;
    info!(chunks = total, output = %args.output.display(), "merged");

    Ok(total)
}
