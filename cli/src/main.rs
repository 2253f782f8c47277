//! Command-line shell for the offline RAG engine.
//!
//! # Usage
//!
//! ```bash
//! quarry --model ./models/chat.gguf index ./library
//! quarry --model ./models/chat.gguf ask "how do I purify water?"
//! quarry --model ./models/chat.gguf chat
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_lite::StreamExt;
use quarry_cli::config::CoreConfig;
use quarry_cli::{CoreContext, PromptComposer, index_database};
use quarry_core::llm::{GenerationRequest, Message, Parameters};
use quarry_index::{Rag, SearchResult};
use quarry_llama::Llama;
use quarry_resolver::{SourceResolver, display_category};
use quarry_supervisor::{Supervisor, is_emergency_stop};
use tracing_subscriber::EnvFilter;

/// Command-line shell for the offline RAG engine.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about)]
struct Args {
    /// Path to the process configuration file.
    #[arg(long, default_value = "./quarry/config.json")]
    config: PathBuf,

    /// Path to the GGUF model used for both embedding and generation.
    #[arg(long)]
    model: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every supported file (`.pdf`, `.txt`, `.md`) under a document root.
    Index {
        /// Root directory to scan. Defaults to the configured document root.
        root: Option<PathBuf>,
    },
    /// Ask a single question and print the answer with its sources.
    Ask {
        /// The question to ask.
        question: String,
        /// Number of results to retrieve. Defaults to the configured value.
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Start an interactive question-answering session.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let ctx = CoreContext::load(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    let config = ctx.config().clone();

    eprintln!("Loading model from {}...", args.model.display());
    let llama = Llama::builder(&args.model)
        .n_ctx(config.llm.context_size)
        .build()
        .with_context(|| format!("failed to load model from {}", args.model.display()))?;

    let index_path = config.paths.vector_db_dir.join("index.redb");
    let rag = Rag::builder(llama.clone())
        .index_path(index_path)
        .similarity_threshold(config.search.min_similarity)
        .top_k(config.search.max_results)
        .chunk_size(config.indexing.chunk_size, config.indexing.chunk_overlap)
        .model_name(args.model.display().to_string())
        .build_with_default_chunker()
        .context("failed to build the retrieval index")?;

    match rag.open() {
        Ok(count) => eprintln!("Loaded {count} chunks from {}", config.paths.vector_db_dir.display()),
        Err(_) => eprintln!("No existing index at {}; starting empty", config.paths.vector_db_dir.display()),
    }

    let resolver = SourceResolver::new(&config.paths.database_dir);
    let composer = PromptComposer::new();

    match args.command {
        Command::Index { root } => {
            let root = root.unwrap_or_else(|| config.paths.database_dir.clone());
            run_index(&rag, &root, &config).await
        }
        Command::Ask { question, top_k } => {
            let top_k = top_k.unwrap_or(config.search.max_results);
            ask_once(&rag, &llama, &resolver, &composer, &question, top_k, &config).await
        }
        Command::Chat => run_chat(&rag, &llama, &resolver, &composer, &config).await,
    }
}

async fn run_index<M, C, L>(
    rag: &Rag<M, C, L>,
    root: &std::path::Path,
    config: &CoreConfig,
) -> Result<()>
where
    M: quarry_core::EmbeddingModel + Send + Sync + 'static,
    C: quarry_index::Chunker,
    L: quarry_index::Cleaner,
{
    use quarry_cli::IndexEvent;

    println!("Indexing {}...", root.display());
    let indexed = index_database(rag, root, &config.paths.shards_dir, &config.indexing, |event| match event {
        IndexEvent::Started { path, index, total } => {
            println!("[{}/{total}] {}", index + 1, path.display());
        }
        IndexEvent::Resumed { path } => {
            println!("  resuming from shard: {}", path.display());
        }
        IndexEvent::Indexed { chunks, .. } => {
            println!("  -> {chunks} chunks");
        }
        IndexEvent::Skipped { path, reason } => {
            println!("  skipped {}: {reason}", path.display());
        }
        IndexEvent::Done { indexed, total } => {
            println!("Done: {indexed}/{total} files indexed.");
        }
    })
    .await
    .context("indexing failed")?;

    println!("Indexed {indexed} documents into {}", config.paths.vector_db_dir.display());
    Ok(())
}

/// Runs one retrieve-compose-generate turn, printing the streamed answer and
/// its sources. A `Ctrl-C` during generation triggers
/// [`quarry_supervisor::Handle::request_stop`], matching the emergency stop
/// contract in the absence of a concurrent input channel to type the stop
/// word into.
async fn ask_once<M>(
    rag: &Rag<M>,
    llama: &Llama,
    resolver: &SourceResolver,
    composer: &PromptComposer,
    question: &str,
    top_k: usize,
    config: &CoreConfig,
) -> Result<()>
where
    M: quarry_core::EmbeddingModel + Send + Sync + 'static,
{
    let results = rag.search_with_k(question, top_k).await.context("retrieval failed")?;
    let prompt = composer.compose(question, &results);

    let request = GenerationRequest::new(vec![Message::user(prompt)]).with_parameters(
        Parameters::default()
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens),
    );

    let worker_llama = llama.clone();
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let on_complete_done = done.clone();

    let handle = Supervisor::new(move |sink, stop| async move {
        let mut stream = worker_llama.respond_cancellable(request, stop.flag());
        while let Some(event) = stream.next().await {
            match event {
                Ok(event) => {
                    if let Some(text) = event.as_text() {
                        if !sink.send(text.to_string()).await {
                            return 1;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!("generation error: {err}");
                    return 1;
                }
            }
        }
        0
    })
    .on_line(|chunk| {
        print!("{chunk}");
        let _ = io::stdout().flush();
    })
    .on_complete(move |_status| {
        on_complete_done.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .start();

    tokio::select! {
        () = wait_for_completion(&done) => {}
        _ = tokio::signal::ctrl_c() => {
            handle.request_stop();
            wait_for_completion(&done).await;
        }
    }
    println!();

    match handle.result() {
        Ok(()) => {}
        Err(quarry_supervisor::SupervisorError::Timeout) => println!("(generation timed out)"),
        Err(quarry_supervisor::SupervisorError::Cancelled) => println!("(generation cancelled)"),
    }

    print_sources(resolver, &results);
    Ok(())
}

async fn wait_for_completion(done: &std::sync::atomic::AtomicBool) {
    while !done.load(std::sync::atomic::Ordering::SeqCst) {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

fn print_sources(resolver: &SourceResolver, results: &[SearchResult]) {
    if results.is_empty() {
        return;
    }

    println!("\nSources:");
    for (index, result) in results.iter().enumerate() {
        let category = result.chunk.metadata.get("category").map_or("unknown", String::as_str);
        let file_name = result.chunk.metadata.get("file_name").map_or("unknown", String::as_str);
        let display = display_category(category);

        match resolver.resolve(category, file_name) {
            Ok(path) => println!("  [{}] {display}/{file_name} -> {}", index + 1, path.display()),
            Err(_) => println!("  [{}] {display}/{file_name} (source file not found)", index + 1),
        }
    }
}

async fn run_chat<M>(
    rag: &Rag<M>,
    llama: &Llama,
    resolver: &SourceResolver,
    composer: &PromptComposer,
    config: &CoreConfig,
) -> Result<()>
where
    M: quarry_core::EmbeddingModel + Send + Sync + 'static,
{
    println!("Quarry chat. Type a question, /quit to exit, or {:?} during an answer to cancel it via Ctrl-C.", config.emergency.stop_command_word);

    loop {
        print!("\n> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if matches!(question, "/quit" | "/exit" | "/q") {
            break;
        }
        if is_emergency_stop(question) {
            println!("Nothing is generating right now.");
            continue;
        }

        if let Err(err) =
            ask_once(rag, llama, resolver, composer, question, config.search.max_results, config).await
        {
            println!("error: {err}");
        }
    }

    println!("Goodbye!");
    Ok(())
}
