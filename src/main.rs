use clap::{Parser, Subcommand};
use log::{error, info, warn};
use rubricator::config::Settings;
use rubricator::corpus::CorpusScanner;
use rubricator::embeddings::{EmbeddingProvider, WordVectors};
use rubricator::intent::{IntentCatalog, IntentMatcher, FALLBACK_REPLY};
use rubricator::matcher::{CategoryMatch, CategoryMatcher, FallbackTable, Query};
use rubricator::reference::{CategorySamples, ReferenceBuilder, ReferenceMap};
use rubricator::splitter;
use rubricator::vectorizer::{euclidean_norm, Vectorizer};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const NO_INFORMATION_REPLY: &str = "Нет информации по данному запросу.";
const EXIT_COMMANDS: [&str; 2] = ["exit", "выход"];

#[derive(Parser)]
#[command(name = "rubricator", version, about = "Match free-text queries to topical categories")]
struct Cli {
    /// Dataset root with one folder of .txt documents per category
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Folder holding one <category>.vec word2vec text file per category
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    reference_file: Option<PathBuf>,
    #[arg(long, global = true)]
    intents_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the reference vector of every category and save them
    Build,
    /// Find the closest category for a query (interactive without --query)
    Ask {
        #[arg(long)]
        query: Option<String>,
    },
    /// Answer with a conversational intent (interactive without --message)
    Chat {
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        threshold: Option<u8>,
        /// Seed for response selection
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Split one category's documents into two groups by vector magnitude
    Split {
        category: String,
        /// Number of nearest vocabulary words to show per centroid
        #[arg(long)]
        top: Option<usize>,
    },
}

fn main() -> Result<(), String> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }
    if let Some(dir) = cli.models_dir {
        settings.models_dir = dir;
    }
    if let Some(path) = cli.reference_file {
        settings.reference_file = path;
    }
    if let Some(path) = cli.intents_file {
        settings.intents_file = path;
    }

    match cli.command {
        Command::Build => run_build(&settings),
        Command::Ask { query } => run_ask(&settings, query),
        Command::Chat {
            message,
            threshold,
            seed,
        } => {
            if let Some(threshold) = threshold {
                settings.intent_threshold = threshold.min(100);
            }
            run_chat(&settings, message, seed)
        }
        Command::Split { category, top } => {
            if let Some(top) = top {
                settings.nearest_words = top.max(1);
            }
            run_split(&settings, &category)
        }
    }
}

fn run_build(settings: &Settings) -> Result<(), String> {
    let mut scanner = CorpusScanner::new();
    scanner.set_progress_callback(|done, total| {
        if done == total {
            info!("Read {} documents", total);
        }
    });
    let corpora = scanner
        .scan(&settings.data_dir)
        .map_err(|e| format!("Failed to read dataset: {}", e))?;

    let mut models = Vec::with_capacity(corpora.len());
    for corpus in &corpora {
        let model = WordVectors::load(&settings.model_path(&corpus.name))
            .map_err(|e| format!("Failed to load model for '{}': {}", corpus.name, e))?;
        models.push(model);
    }

    let samples: Vec<CategorySamples<'_>> = corpora
        .iter()
        .zip(&models)
        .map(|(corpus, model)| CategorySamples {
            name: &corpus.name,
            documents: &corpus.documents,
            provider: model,
            description: corpus.description.as_deref(),
        })
        .collect();

    let build = ReferenceBuilder::new()
        .build(&samples)
        .map_err(|e| format!("Failed to build reference vectors: {}", e))?;
    for diagnostic in &build.report.diagnostics {
        warn!("{}", diagnostic);
    }
    if build.map.is_empty() {
        return Err("No category produced a reference vector; nothing saved".to_string());
    }

    build
        .map
        .save(&settings.reference_file)
        .map_err(|e| format!("Failed to save reference vectors: {}", e))?;

    println!(
        "Saved {} categories to {} ({} of {} documents used, {} omitted)",
        build.map.len(),
        settings.reference_file.display(),
        build.report.documents_used,
        build.report.documents,
        build.report.omitted().len()
    );
    Ok(())
}

/// Loads the model of every category that has one; missing files are skipped.
fn load_category_models(
    settings: &Settings,
    references: &ReferenceMap,
) -> Result<Vec<(String, WordVectors)>, String> {
    let mut models = Vec::new();
    for name in references.names() {
        let path = settings.model_path(name);
        if !path.exists() {
            warn!("No model for '{}' at {}", name, path.display());
            continue;
        }
        let model = WordVectors::load(&path)
            .map_err(|e| format!("Failed to load model for '{}': {}", name, e))?;
        models.push((name.to_string(), model));
    }
    Ok(models)
}

fn run_ask(settings: &Settings, query: Option<String>) -> Result<(), String> {
    let references = ReferenceMap::load(&settings.reference_file)
        .map_err(|e| format!("Failed to load reference vectors: {}", e))?;
    let models = load_category_models(settings, &references)?;
    let providers: Vec<(&str, &dyn EmbeddingProvider)> = models
        .iter()
        .map(|(name, model)| (name.as_str(), model as &dyn EmbeddingProvider))
        .collect();
    let fallback = FallbackTable::builtin();
    let matcher = CategoryMatcher::new();

    info!(
        "Ready: {} categories, {} models, {} fallback keywords",
        references.len(),
        providers.len(),
        fallback.len()
    );

    let answer = |line: &str| -> Result<String, String> {
        let result = matcher
            .match_with_providers(&Query::parse(line), &references, &providers, &fallback)
            .map_err(|e| format!("Matching failed: {}", e))?;
        Ok(render_category_answer(&result, &references, &fallback))
    };

    match query {
        Some(text) => {
            println!("{}", answer(&text)?);
            Ok(())
        }
        None => interactive("query", answer),
    }
}

fn render_category_answer(
    result: &CategoryMatch,
    references: &ReferenceMap,
    fallback: &FallbackTable,
) -> String {
    let Some(category) = result.category.as_deref() else {
        return NO_INFORMATION_REPLY.to_string();
    };
    let similarity = result
        .score
        .map(|score| format!(" (similarity: {:.2})", score))
        .unwrap_or_default();
    let text = result
        .answer(references, fallback)
        .unwrap_or(NO_INFORMATION_REPLY);
    format!("Category: {}{}\nAnswer: {}", category, similarity, text)
}

fn run_chat(settings: &Settings, message: Option<String>, seed: Option<u64>) -> Result<(), String> {
    let catalog = IntentCatalog::load(&settings.intents_file)
        .map_err(|e| format!("Failed to load intents: {}", e))?;
    if catalog.is_empty() {
        warn!("Intent catalog is empty; every message gets the fallback reply");
    }
    let matcher = IntentMatcher::new(settings.intent_threshold);
    let mut rng = match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    info!("Intent threshold {}", matcher.threshold());

    let mut reply = |line: &str| -> Result<String, String> {
        Ok(matcher
            .match_intent(line, &catalog, &mut rng)
            .unwrap_or(FALLBACK_REPLY)
            .to_string())
    };

    match message {
        Some(text) => {
            println!("{}", reply(&text)?);
            Ok(())
        }
        None => interactive("chat", reply),
    }
}

fn run_split(settings: &Settings, category: &str) -> Result<(), String> {
    let corpus = CorpusScanner::new()
        .scan_category(category, &settings.data_dir.join(category))
        .map_err(|e| format!("Failed to read category '{}': {}", category, e))?;
    let model = WordVectors::load(&settings.model_path(category))
        .map_err(|e| format!("Failed to load model for '{}': {}", category, e))?;

    let vectorizer = Vectorizer::new();
    let mut entries = Vec::with_capacity(corpus.documents.len());
    for document in &corpus.documents {
        match vectorizer.vectorize(&document.tokens, &model).vector {
            Some(vector) => entries.push((document.id.clone(), vector)),
            None => warn!("Document '{}' has no words known to the model", document.id),
        }
    }

    let result = splitter::split(entries)
        .map_err(|e| format!("Failed to split '{}': {}", category, e))?;

    for (label, group, centroid) in [
        ("low", &result.low, &result.low_centroid),
        ("high", &result.high, &result.high_centroid),
    ] {
        println!(
            "Group {} ({} documents, centroid norm {:.4}):",
            label,
            group.len(),
            euclidean_norm(centroid)
        );
        for (id, _) in group {
            println!("  {}", id);
        }
        let keywords: Vec<String> = model
            .nearest_words(centroid, settings.nearest_words)
            .into_iter()
            .map(|(word, score)| format!("{} ({:.2})", word, score))
            .collect();
        println!("  keywords: {}", keywords.join(", "));
    }
    Ok(())
}

fn is_exit_command(line: &str) -> bool {
    let lowered = line.trim().to_lowercase();
    EXIT_COMMANDS.contains(&lowered.as_str())
}

/// Reads one request per line from stdin until EOF or an exit command.
fn interactive<F>(prompt: &str, mut handler: F) -> Result<(), String>
where
    F: FnMut(&str) -> Result<String, String>,
{
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Type your request ('exit' or 'выход' to quit).");

    loop {
        print!("{}> ", prompt);
        stdout
            .flush()
            .map_err(|e| format!("Failed to write prompt: {}", e))?;

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("Failed to read input: {}", e))?;
        if read == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        match handler(line) {
            Ok(reply) => println!("{}", reply),
            Err(e) => {
                error!("{}", e);
                println!("Error: {}", e);
            }
        }
    }
    Ok(())
}
