use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use ranker_core::{CorpusLayout, CorpusSource, DocId, IdfMode, Index, ScoredDocument};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "ranker")]
#[command(about = "Rank tab-delimited documents against free-text queries with TF-IDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CorpusArgs {
    /// Corpus file, or a directory of .txt/.tsv corpus files
    #[arg(long)]
    corpus: String,
    /// IDF variant: smooth = log10(1 + N/df), plain = log10(N/df)
    #[arg(long, default_value_t = IdfMode::Smooth)]
    idf: IdfMode,
    /// Number of tab-separated fields a line must have
    #[arg(long, default_value_t = 5)]
    fields: usize,
    /// Zero-based column holding the numeric document id
    #[arg(long, default_value_t = 1)]
    id_column: usize,
    /// Zero-based column holding the document text
    #[arg(long, default_value_t = 4)]
    content_column: usize,
}

impl CorpusArgs {
    fn source(&self) -> Result<CorpusSource> {
        let layout = CorpusLayout { fields: self.fields, id_column: self.id_column, content_column: self.content_column };
        ensure!(layout.is_valid(), "--id-column and --content-column must be below --fields ({})", self.fields);
        Ok(CorpusSource::new(&self.corpus).with_layout(layout))
    }

    fn build(&self) -> Result<(CorpusSource, Index)> {
        let source = self.source()?;
        let start = Instant::now();
        let (index, _) = Index::from_source(&source, self.idf)
            .with_context(|| format!("failed to build index from {}", self.corpus))?;
        tracing::info!(took_s = start.elapsed().as_secs_f64(), "index ready");
        Ok((source, index))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index and run a single query
    Query {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Number of results to print
        #[arg(short, long, default_value_t = 10)]
        k: usize,
        /// Print results as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,
    },
    /// Build the index once, then answer one query per stdin line
    Interactive {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(short, long, default_value_t = 10)]
        k: usize,
    },
    /// Build the index and print corpus statistics
    Stats {
        #[command(flatten)]
        corpus: CorpusArgs,
        /// Number of most widespread terms to list
        #[arg(long, default_value_t = 10)]
        top_terms: usize,
    },
}

#[derive(Serialize)]
struct Hit<'a> {
    doc_id: DocId,
    score: f64,
    content: Option<&'a str>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Query { corpus, k, json, terms } => {
            let (source, index) = corpus.build()?;
            let results = index.query_top_k(&terms, k);
            print_results(&mut io::stdout().lock(), &source, &results, json)
        }
        Commands::Interactive { corpus, k } => {
            let (source, index) = corpus.build()?;
            interactive(&source, &index, k)
        }
        Commands::Stats { corpus, top_terms } => stats(&corpus, top_terms),
    }
}

fn print_results<W: Write>(out: &mut W, source: &CorpusSource, results: &[ScoredDocument], json: bool) -> Result<()> {
    let ids: Vec<DocId> = results.iter().map(|d| d.doc_id).collect();
    let documents = source.fetch_documents(&ids).context("failed to look up result documents")?;
    for doc in results {
        let content = documents.get(&doc.doc_id).map(String::as_str);
        if json {
            let hit = Hit { doc_id: doc.doc_id, score: doc.score, content };
            writeln!(out, "{}", serde_json::to_string(&hit)?)?;
        } else {
            writeln!(out, "{} :: {:.6}", doc.doc_id, doc.score)?;
            writeln!(out, "{}", content.unwrap_or(""))?;
        }
    }
    if !json {
        writeln!(out)?;
    }
    Ok(())
}

fn interactive(source: &CorpusSource, index: &Index, k: usize) -> Result<()> {
    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    write!(out, "query> ")?;
    out.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let terms: Vec<&str> = line.split_whitespace().collect();
        if !terms.is_empty() {
            let start = Instant::now();
            let results = index.query_top_k(&terms, k);
            tracing::debug!(query = %line, hits = results.len(), took_s = start.elapsed().as_secs_f64(), "query");
            if results.is_empty() {
                writeln!(out, "no matching documents\n")?;
            } else {
                print_results(&mut out, source, &results, false)?;
            }
        }
        write!(out, "query> ")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn stats(args: &CorpusArgs, top_terms: usize) -> Result<()> {
    let source = args.source()?;
    let (index, read) = Index::from_source(&source, args.idf)
        .with_context(|| format!("failed to build index from {}", args.corpus))?;

    let mut terms: Vec<(&str, usize, f64)> =
        index.terms().map(|(t, p)| (t, p.document_frequency(), p.idf())).collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut out = io::stdout().lock();
    writeln!(out, "lines read:         {}", read.lines)?;
    writeln!(out, "records accepted:   {}", read.records)?;
    writeln!(out, "lines skipped:      {}", read.skipped)?;
    writeln!(out, "documents indexed:  {}", index.corpus_cardinality())?;
    writeln!(out, "vocabulary size:    {}", index.vocabulary_len())?;
    writeln!(out, "idf mode:           {}", index.idf_mode())?;
    for (term, df, idf) in terms.into_iter().take(top_terms) {
        writeln!(out, "  {term:<20} df={df:<8} idf={idf:.4}")?;
    }
    Ok(())
}
