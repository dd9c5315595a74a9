use std::path::PathBuf;

use aadd::{AnnotationRun, AnnotatorConfig, DEFAULT_MIN_OVERLAP, DEFAULT_PAGE_BITS, plan_outputs};
use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(version, about = "Annotate SAM alignments with overlapping genes")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite reference names of alignments covered by an annotated gene
    Annotate(AnnotateArgs),
}

#[derive(Parser)]
struct AnnotateArgs {
    /// Input SAM files (optionally compressed)
    #[clap(short, long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Directory holding aadd.idx and aadd.dbx
    #[clap(short = 'd', long)]
    index_dir: PathBuf,

    /// Output files, one per input, or a single existing directory
    #[clap(short, long, required = true, num_args = 1..)]
    output: Vec<PathBuf>,

    /// Threads to use [0: auto]
    #[clap(short = 't', long, default_value_t = 0)]
    threads: usize,

    /// Minimum fraction of the longer of gene and alignment that must overlap
    #[clap(long, default_value_t = DEFAULT_MIN_OVERLAP)]
    min_overlap: f64,

    /// Page size of the database reader as a power of two
    #[clap(long, default_value_t = DEFAULT_PAGE_BITS)]
    page_bits: u32,
}

fn annotate(args: &AnnotateArgs) -> Result<()> {
    if !(0.0..=1.0).contains(&args.min_overlap) {
        bail!("--min-overlap must be within [0, 1], got {}", args.min_overlap);
    }
    let jobs = plan_outputs(&args.input, &args.output)?;
    let run = AnnotationRun::open_with_page_bits(&args.index_dir, args.page_bits)?
        .with_config(AnnotatorConfig {
            min_overlap: args.min_overlap,
        })
        .with_threads(args.threads);

    let stats = run.run(&jobs)?;
    if jobs.len() > 1 {
        log::info!("Total: {stats}");
    }
    run.close();
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    match Cli::parse().command {
        Command::Annotate(args) => {
            if let Err(err) = annotate(&args) {
                if err
                    .downcast_ref::<aadd::Error>()
                    .is_some_and(aadd::Error::requires_reindex)
                {
                    log::error!(
                        "Index files are unreadable; rebuild {}",
                        args.index_dir.display()
                    );
                }
                return Err(err);
            }
        }
    }
    Ok(())
}
