use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use varsig::ingest;
use varsig::{
    Alphabet, CompressionOutcome, FinderConfig, KmerFinder, NodeId, OutputMode,
    SignatureStrategy, VariationGraph,
};

#[derive(Parser, Debug)]
#[command(name = "varsig", about = "K-mer signatures for variants in genome variation graphs")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct EnumerationArgs {
    /// K-mer length (1 to 32).
    #[arg(short, long, default_value_t = 31)]
    k: usize,
    /// Maximum number of variant nodes on one path.
    #[arg(long, default_value_t = 4)]
    max_variant_nodes: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a graph from a GFA v1 file.
    BuildGfa {
        /// Input GFA.
        gfa: PathBuf,
        /// Output graph file.
        output: PathBuf,
        /// Base symbols for codes 0 to 3.
        #[arg(long, default_value = "ACGT")]
        alphabet: String,
    },
    /// Build a graph from a FASTA chromosome and its VCF variants.
    BuildVcf {
        /// Reference FASTA.
        fasta: PathBuf,
        /// Variant calls.
        vcf: PathBuf,
        /// Chromosome name (first token of the FASTA header, VCF CHROM).
        chromosome: String,
        /// Output graph file.
        output: PathBuf,
        /// Base symbols for codes 0 to 3.
        #[arg(long, default_value = "ACGT")]
        alphabet: String,
    },
    /// Collapse unbranched reference chains.
    Compress {
        /// Input graph file.
        input: PathBuf,
        /// Output graph file.
        output: PathBuf,
    },
    /// Enumerate k-mers, streaming `kmer<TAB>node:start:position` lines.
    Kmers {
        /// Graph file.
        graph: PathBuf,
        #[command(flatten)]
        enumeration: EnumerationArgs,
        /// Record k-mers only for the node they start in.
        #[arg(long)]
        origin_only: bool,
        /// Print only the number of records.
        #[arg(long, conflicts_with = "reverse")]
        count: bool,
        /// Print k-mers in reversed base order.
        #[arg(long)]
        reverse: bool,
    },
    /// Find signature k-mers for `reference<TAB>variant` node pairs.
    Signatures {
        /// Graph file.
        graph: PathBuf,
        /// Node pairs, one per line.
        pairs: PathBuf,
        #[command(flatten)]
        enumeration: EnumerationArgs,
        /// Pair only windows anchored at the same offset from the variant.
        #[arg(long)]
        aligned: bool,
        /// Prefer windows sharing no k-mers with the other allele.
        #[arg(long)]
        minimize_overlap: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::BuildGfa {
            gfa,
            output,
            alphabet,
        } => run_build_gfa(&gfa, &output, &alphabet)?,
        Commands::BuildVcf {
            fasta,
            vcf,
            chromosome,
            output,
            alphabet,
        } => run_build_vcf(&fasta, &vcf, &chromosome, &output, &alphabet)?,
        Commands::Compress { input, output } => run_compress(&input, &output)?,
        Commands::Kmers {
            graph,
            enumeration,
            origin_only,
            count,
            reverse,
        } => run_kmers(&graph, &enumeration, origin_only, count, reverse)?,
        Commands::Signatures {
            graph,
            pairs,
            enumeration,
            aligned,
            minimize_overlap,
        } => run_signatures(&graph, &pairs, &enumeration, aligned, minimize_overlap)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_alphabet(symbols: &str) -> Result<Alphabet> {
    Alphabet::new(symbols.as_bytes()).with_context(|| format!("invalid alphabet {symbols:?}"))
}

fn load_graph(path: &Path) -> Result<VariationGraph> {
    VariationGraph::load(path).with_context(|| format!("failed to load graph {}", path.display()))
}

fn save_graph(graph: &VariationGraph, path: &Path) -> Result<()> {
    graph
        .save(path)
        .with_context(|| format!("failed to write graph {}", path.display()))?;
    info!(path = %path.display(), nodes = graph.len(), "wrote graph");
    Ok(())
}

fn run_build_gfa(gfa: &Path, output: &Path, alphabet: &str) -> Result<()> {
    let alphabet = parse_alphabet(alphabet)?;
    let graph = ingest::load_gfa(gfa, &alphabet)
        .with_context(|| format!("failed to read GFA {}", gfa.display()))?;
    save_graph(&graph, output)
}

fn run_build_vcf(
    fasta: &Path,
    vcf: &Path,
    chromosome: &str,
    output: &Path,
    alphabet: &str,
) -> Result<()> {
    let alphabet = parse_alphabet(alphabet)?;
    let (graph, summary) = ingest::build_from_fasta_vcf(fasta, vcf, chromosome, &alphabet)
        .with_context(|| {
            format!(
                "failed to build chromosome {chromosome} from {} and {}",
                fasta.display(),
                vcf.display()
            )
        })?;
    info!(
        added = summary.added,
        skipped_overlap = summary.skipped_overlap,
        "variants processed"
    );
    save_graph(&graph, output)
}

fn run_compress(input: &Path, output: &Path) -> Result<()> {
    let mut graph = load_graph(input)?;
    match graph.compress().context("compression failed")? {
        CompressionOutcome::Unchanged => info!("graph already compressed"),
        CompressionOutcome::Compressed { before, after } => {
            info!(before, after, "compressed graph")
        }
    }
    save_graph(&graph, output)
}

fn finder_config(args: &EnumerationArgs) -> Result<FinderConfig> {
    FinderConfig::new(args.k, args.max_variant_nodes).context("invalid enumeration settings")
}

fn run_kmers(
    path: &Path,
    args: &EnumerationArgs,
    origin_only: bool,
    count: bool,
    reverse: bool,
) -> Result<()> {
    let graph = load_graph(path)?;
    let table = count || reverse;
    let config = finder_config(args)?
        .with_origin_only(origin_only)
        .with_start_positions(table)
        .with_kmer_positions(table)
        .with_output(if table {
            OutputMode::Table
        } else {
            OutputMode::Stream
        });
    let mut finder = KmerFinder::new(&graph, config);
    if !table {
        finder.set_stream_writer(BufWriter::new(io::stdout()));
    }
    let found = finder.find().context("k-mer enumeration failed")?;

    if count {
        println!("{found}");
        return Ok(());
    }
    if reverse {
        finder.reverse_found_kmers();
        let mut out = BufWriter::new(io::stdout().lock());
        for record in finder.found_kmers().iter() {
            writeln!(
                out,
                "{}\t{}:{}:{}",
                record.kmer,
                record.node,
                record.start_position.unwrap_or(0),
                record.kmer_position.unwrap_or(0)
            )?;
        }
        out.flush()?;
    }
    Ok(())
}

fn read_pairs(path: &Path) -> Result<Vec<(NodeId, NodeId)>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut pairs = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let mut next_id = |what: &str| -> Result<NodeId> {
            let field = fields
                .next()
                .ok_or_else(|| anyhow!("missing {what} node on line {}", idx + 1))?;
            field
                .parse()
                .with_context(|| format!("invalid {what} node '{field}' on line {}", idx + 1))
        };
        let reference = next_id("reference")?;
        let variant = next_id("variant")?;
        pairs.push((reference, variant));
    }
    Ok(pairs)
}

fn run_signatures(
    graph_path: &Path,
    pairs_path: &Path,
    args: &EnumerationArgs,
    aligned: bool,
    minimize_overlap: bool,
) -> Result<()> {
    let graph = load_graph(graph_path)?;
    let pairs = read_pairs(pairs_path)?;
    let strategy = if aligned {
        SignatureStrategy::Aligned
    } else {
        SignatureStrategy::Unaligned
    };
    let config = finder_config(args)?
        .with_signature_strategy(strategy)
        .with_minimize_overlap(minimize_overlap);
    let k = config.k();

    let mut finder = KmerFinder::new(&graph, config);
    finder.find().context("k-mer enumeration failed")?;
    let index = finder.build_frequency_index();
    info!(distinct = index.len(), "built frequency index");
    finder.set_frequency_index(index);

    let signatures = finder
        .find_signatures_for_variants(&pairs)
        .context("signature search failed")?;

    let mut out = BufWriter::new(io::stdout().lock());
    for (&(reference, variant), signature) in pairs.iter().zip(&signatures) {
        match signature {
            Some(window) => {
                let (reference_kmers, variant_kmers) = window.decode(graph.alphabet(), k)?;
                writeln!(
                    out,
                    "{reference}\t{variant}\t{}\t{}\t{}",
                    reference_kmers.join(","),
                    variant_kmers.join(","),
                    window.max_frequency()
                )?;
            }
            None => writeln!(out, "{reference}\t{variant}\t-\t-\t-")?,
        }
    }
    out.flush()?;
    Ok(())
}
