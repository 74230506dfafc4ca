use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gkg_core::{normalize_essay, AnalysisReport, GkgConfig, GrammarAnalyzer, LetterReviewService};
use gkg_graph::{CachedGraph, SharedGraph, TaxonomyGraph};
use gkg_oracle::{LetterReview, LlmOracle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn cli() -> Command {
    Command::new("gkg")
        .version(gkg_core::VERSION)
        .about("Grammar knowledge graph: resolve sentence errors down to taxonomy rules")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("analyze")
                .about("Classify and narrow one sentence, then explain each issue")
                .arg(
                    Arg::new("sentence")
                        .long("sentence")
                        .required(true)
                        .help("Sentence to analyze"),
                )
                .arg(
                    Arg::new("taxonomy")
                        .long("taxonomy")
                        .value_parser(value_parser!(PathBuf))
                        .help("Taxonomy document (overrides graph.taxonomy_path)"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_parser(value_parser!(u64))
                        .help("Abort the analysis after this many seconds"),
                )
                .arg(config_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("review")
                .about("Review a letter essay")
                .arg(
                    Arg::new("essay")
                        .long("essay")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Essay text file, one recognized line per line"),
                )
                .arg(config_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("taxonomy")
                .about("Validate a taxonomy document and report its shape")
                .arg(
                    Arg::new("taxonomy")
                        .long("taxonomy")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Taxonomy document (JSON or YAML)"),
                )
                .arg(config_arg()),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> anyhow::Result<GkgConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => GkgConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => {
            let mut config = GkgConfig::default();
            config.apply_env()?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn load_taxonomy(path: &Path) -> anyhow::Result<TaxonomyGraph> {
    let taxonomy = TaxonomyGraph::load(path)
        .with_context(|| format!("loading taxonomy {}", path.display()))?;
    taxonomy
        .validate_descent()
        .with_context(|| format!("validating taxonomy {}", path.display()))?;
    Ok(taxonomy)
}

async fn analyze(args: &ArgMatches) -> anyhow::Result<bool> {
    let mut config = load_config(args)?;
    let sentence = args
        .get_one::<String>("sentence")
        .context("--sentence is required")?;
    let Some(path) = args
        .get_one::<PathBuf>("taxonomy")
        .or(config.graph.taxonomy_path.as_ref())
        .cloned()
    else {
        bail!("no taxonomy given: pass --taxonomy or set graph.taxonomy_path");
    };

    let taxonomy = load_taxonomy(&path)?;
    let depth = taxonomy.descent_depth()?;
    let ceiling = config.ceiling_for_depth(depth).min(config.engine.max_rounds);
    tracing::info!(
        nodes = taxonomy.node_count(),
        depth,
        max_rounds = ceiling,
        "Taxonomy loaded"
    );
    config = config.with_max_rounds(ceiling);

    let capacity = config.graph.cache_capacity;
    let cached = Arc::new(match config.graph.cache_ttl_secs {
        Some(ttl) => CachedGraph::with_ttl(taxonomy, capacity, Duration::from_secs(ttl)),
        None => CachedGraph::new(taxonomy, capacity),
    });
    let graph: SharedGraph = cached.clone();
    let oracle = Arc::new(LlmOracle::new(config.oracle.clone())?);
    let analyzer = GrammarAnalyzer::new(graph, oracle, &config);

    let report = match args.get_one::<u64>("timeout") {
        Some(&secs) => {
            analyzer
                .analyze_with_timeout(sentence, Duration::from_secs(secs))
                .await?
        }
        None => analyzer.analyze(sentence).await?,
    };
    let stats = cached.stats().await;
    tracing::debug!(
        labels = stats.labels,
        neighbors = stats.neighbors,
        details = stats.details,
        "Graph cache entries"
    );

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report.is_complete())
}

fn print_report(report: &AnalysisReport) {
    println!("Analysis {} ({} rounds)", report.run_id, report.rounds);
    println!();
    for explanation in &report.explanations {
        println!("[{}] {}", explanation.concept, explanation.text);
        println!();
    }
    for failure in &report.failures {
        println!(
            "item {} failed: {} ({})",
            failure.item_index, failure.kind, failure.message
        );
    }
}

async fn review(args: &ArgMatches) -> anyhow::Result<bool> {
    let config = load_config(args)?;
    let path = args
        .get_one::<PathBuf>("essay")
        .context("--essay is required")?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading essay {}", path.display()))?;
    let essay = normalize_essay(raw.lines());

    let reviewer = Arc::new(LlmOracle::new(config.oracle.clone())?);
    let review = LetterReviewService::new(reviewer)
        .with_retry(config.retry)
        .review(&essay)
        .await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&review)?);
    } else {
        print_review(&review);
    }
    Ok(true)
}

fn print_review(review: &LetterReview) {
    println!("Score: {}", review.score);
    println!();
    println!("Errors:");
    println!("  Spelling: {}", review.errors.spelling);
    println!("  Grammar: {}", review.errors.grammar);
    println!("  Word choice: {}", review.errors.word_choice);
    println!();
    println!("Highlights:");
    println!("  Advanced vocabulary: {}", review.highlights.advanced_vocabulary);
    println!("  Expressions: {}", review.highlights.expressions);
    println!();
    println!("Suggestions: {}", review.suggestions);
}

fn taxonomy(args: &ArgMatches) -> anyhow::Result<bool> {
    let config = load_config(args)?;
    let path = args
        .get_one::<PathBuf>("taxonomy")
        .context("--taxonomy is required")?;

    let taxonomy = load_taxonomy(path)?;
    let depth = taxonomy.descent_depth()?;

    println!("Taxonomy: {}", path.display());
    println!("  Nodes: {}", taxonomy.node_count());
    println!("  Edges: {}", taxonomy.edge_count());
    println!("  Descent depth: {depth}");
    println!("  Derived round ceiling: {}", config.ceiling_for_depth(depth));
    println!("  Descent: acyclic");
    Ok(true)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let outcome = match matches.subcommand() {
        Some(("analyze", args)) => analyze(args).await,
        Some(("review", args)) => review(args).await,
        Some(("taxonomy", args)) => taxonomy(args),
        _ => Ok(true),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn analyze_requires_sentence() {
        assert!(cli().try_get_matches_from(["gkg", "analyze"]).is_err());
    }

    #[test]
    fn global_log_flag_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["gkg", "taxonomy", "--taxonomy", "t.yaml", "--log-json"])
            .unwrap();
        assert!(matches.get_flag("log-json"));
    }
}
