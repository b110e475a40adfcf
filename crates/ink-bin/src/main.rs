//! Inkwell entrypoint.
//!
//! A command-line host for the editing core. Each subcommand builds an `EditorState`, feeds it
//! the events an editor surface would send, and prints what comes back.
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use core_config::Config;
use core_diff::{DiffResult, DiffSpan, Side, SpanKind};
use core_events::{
    EVENT_CHANNEL_CAP, EditorEvent, Event, EventHooks, EventSourceRegistry, GenerationCancel,
    GenerationEvent, StreamGenerationSource, forward,
};
use core_format::{FormatKind, MemoryClipboard};
use core_mention::{JsonFileStore, MemoryStore, RecencyCache, RecencyStore, SuggestionItem};
use core_state::{EditorRuntime, EditorSettings, EditorState, EditorUpdate};
use core_text::TextRange;
use crossterm::queue;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use std::io::{Write, stdout};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE: &str = "inkwell.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "inkwell", version, about = "Inkwell markdown editing core")]
struct Cli {
    /// Optional configuration file path (overrides discovery of `inkwell.toml`).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a markdown format to a range of FILE.
    Format(FormatArgs),
    /// Word diff of two files.
    Diff(DiffArgs),
    /// Stream PROPOSED into a review of FILE one word at a time.
    Review(ReviewArgs),
    /// Insert an @-mention into FILE, picking from a JSON catalog.
    Mention(MentionArgs),
    /// List recently mentioned posts.
    Recent {
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args, Debug)]
struct FormatArgs {
    /// heading, bold, italic, strikethrough, code, code-block, image, link, ...
    kind: FormatKind,
    file: PathBuf,
    #[arg(long, default_value_t = 0)]
    start: usize,
    #[arg(long, default_value_t = 0)]
    len: usize,
    /// Interpret --start/--len as UTF-16 code units.
    #[arg(long)]
    utf16: bool,
    /// Clipboard contents visible to link formatting.
    #[arg(long)]
    clipboard: Option<String>,
    /// Write the result back to FILE instead of printing it.
    #[arg(long)]
    write: bool,
}

#[derive(clap::Args, Debug)]
struct DiffArgs {
    original: PathBuf,
    proposed: PathBuf,
    #[arg(long)]
    json: bool,
    #[arg(long)]
    no_color: bool,
}

#[derive(clap::Args, Debug)]
struct ReviewArgs {
    file: PathBuf,
    proposed: PathBuf,
    /// Cancel the generation after this many partial results.
    #[arg(long)]
    cancel_after: Option<usize>,
    /// Accept the review and write the result back to FILE.
    #[arg(long)]
    accept: bool,
    #[arg(long)]
    no_color: bool,
}

#[derive(clap::Args, Debug)]
struct MentionArgs {
    file: PathBuf,
    /// Byte offset where `@` is typed.
    #[arg(long)]
    at: usize,
    #[arg(long, default_value = "")]
    query: String,
    /// JSON array of `{id, title, slug}` records.
    #[arg(long)]
    catalog: PathBuf,
    /// Index into the suggestion list.
    #[arg(long, default_value_t = 0)]
    pick: usize,
    #[arg(long)]
    write: bool,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self, cli: &Cli) -> Result<Config> {
        self.configure_logging()?;
        Self::install_panic_hook();

        info!(target: "runtime", "startup");
        let config = core_config::load_from(cli.config.clone())?;
        info!(
            target: "runtime.startup",
            config_override = cli.config.is_some(),
            config_file = config.raw.is_some(),
            suggestion_limit = config.effective.suggestion_limit,
            recency_capacity = config.effective.recency_capacity,
            "bootstrap_complete"
        );
        Ok(config)
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

fn open_store(config: &Config) -> Box<dyn RecencyStore> {
    match config.store_path() {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => {
            warn!(target: "store", "no_store_location_recency_in_memory");
            Box::new(MemoryStore::default())
        }
    }
}

fn build_state(config: &Config, text: &str, clipboard: MemoryClipboard) -> EditorState {
    EditorState::new(
        text,
        EditorSettings::from_config(config),
        Box::new(clipboard),
        open_store(config),
    )
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Print `text`, or write it back to `path`.
fn emit_document(path: &Path, text: &str, write: bool) -> Result<()> {
    if write {
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        info!(target: "runtime", bytes = text.len(), "document_written");
        return Ok(());
    }
    let mut out = stdout().lock();
    out.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        writeln!(out)?;
    }
    Ok(())
}

/// Type `ch` at the caret the way an editor surface reports it: full text, then the key.
fn type_char(state: &mut EditorState, ch: char) -> Vec<EditorUpdate> {
    let mut text = state.text();
    let at = state.selection().offset;
    text.insert(at, ch);
    state.handle(&EditorEvent::TextChanged(text).into());
    state.handle(
        &EditorEvent::MentionKey {
            ch,
            cursor: at + ch.len_utf8(),
        }
        .into(),
    )
}

fn run_format(config: &Config, args: FormatArgs) -> Result<()> {
    let text = read_text(&args.file)?;
    let range = if args.utf16 {
        TextRange::from_utf16(&text, args.start, args.len)
    } else {
        TextRange::new(args.start, args.len)
    };
    let clipboard = args
        .clipboard
        .map(MemoryClipboard::with_text)
        .unwrap_or_default();
    let mut state = build_state(config, &text, clipboard);
    state.handle(&EditorEvent::SelectionChanged(range).into());
    let updates = state.handle(&EditorEvent::FormatCommand(args.kind).into());
    match updates.first() {
        Some(EditorUpdate::BufferChanged { caret, .. }) => {
            trace!(target: "runtime", caret, "format_caret");
        }
        _ => eprintln!("inkwell: `{}` has no effect", args.kind),
    }
    emit_document(&args.file, &state.text(), args.write)
}

fn run_diff(args: DiffArgs) -> Result<()> {
    let original = read_text(&args.original)?;
    let proposed = read_text(&args.proposed)?;
    let result = core_diff::diff(&original, &proposed);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    print_diff(&result, !args.no_color)
}

fn print_diff(result: &DiffResult, color: bool) -> Result<()> {
    let mut out = stdout().lock();
    for (label, side) in [("original", Side::Original), ("proposed", Side::Proposed)] {
        if color {
            queue!(
                out,
                SetAttribute(Attribute::Bold),
                Print(format!("--- {label}")),
                SetAttribute(Attribute::Reset),
                Print("\n")
            )?;
        } else {
            writeln!(out, "--- {label}")?;
        }
        write_spans(&mut out, result.side(side), color)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn write_spans(out: &mut impl Write, spans: &[DiffSpan], color: bool) -> Result<()> {
    if !color {
        out.write_all(plain_spans(spans).as_bytes())?;
        return Ok(());
    }
    for span in spans {
        match span.kind {
            SpanKind::Unchanged => queue!(out, Print(&span.text))?,
            SpanKind::Added => queue!(
                out,
                SetForegroundColor(Color::Green),
                Print(&span.text),
                ResetColor
            )?,
            SpanKind::Removed => queue!(
                out,
                SetForegroundColor(Color::Red),
                SetAttribute(Attribute::CrossedOut),
                Print(&span.text),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?,
        }
    }
    Ok(())
}

/// Word-diff markers for terminals without color: `[-removed-]`, `{+added+}`.
fn plain_spans(spans: &[DiffSpan]) -> String {
    let mut out = String::new();
    for span in spans {
        match span.kind {
            SpanKind::Unchanged => out.push_str(&span.text),
            SpanKind::Added => {
                out.push_str("{+");
                out.push_str(&span.text);
                out.push_str("+}");
            }
            SpanKind::Removed => {
                out.push_str("[-");
                out.push_str(&span.text);
                out.push_str("-]");
            }
        }
    }
    out
}

/// Successive prefixes of `text` ending at word boundaries, finishing with `text` itself.
fn word_prefixes(text: &str) -> Vec<String> {
    let mut out: Vec<String> = core_diff::locate_words(text)
        .iter()
        .map(|loc| text[..loc.end].to_string())
        .collect();
    if !text.is_empty() && out.last().map(String::as_str) != Some(text) {
        out.push(text.to_string());
    }
    out
}

type PartialStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Stream of partials; with a cancel point the stream stalls there instead of finishing.
/// Returns the cancel point only when it falls before the natural end.
fn generation_stream(
    partials: Vec<String>,
    cancel_after: Option<usize>,
) -> (PartialStream, Option<usize>) {
    match cancel_after {
        Some(n) if n < partials.len() => {
            let head: Vec<String> = partials.into_iter().take(n).collect();
            let stream = tokio_stream::iter(head).chain(tokio_stream::pending());
            (Box::pin(stream), Some(n))
        }
        _ => (Box::pin(tokio_stream::iter(partials)), None),
    }
}

/// Signals the generation once the loop has handled `limit` tokens.
struct CancelAfterTokens {
    limit: usize,
    seen: AtomicUsize,
    cancel: GenerationCancel,
}

impl CancelAfterTokens {
    fn new(limit: usize, cancel: GenerationCancel) -> Self {
        Self {
            limit,
            seen: AtomicUsize::new(0),
            cancel,
        }
    }
}

impl EventHooks for CancelAfterTokens {
    fn post_handle(&self, event: &Event) {
        if let Event::Generation(GenerationEvent::Token { id, .. }) = event {
            let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if seen == self.limit {
                trace!(target: "runtime.events", id, seen, "generation_cancel_requested");
                self.cancel.signal();
            }
        }
    }
}

#[derive(Debug, Default)]
struct ReviewReport {
    last_diff: Option<DiffResult>,
    /// `Some(false)` for rejected or suppressed reviews.
    closed: Option<bool>,
    text: String,
}

async fn stream_review(
    config: &Config,
    original: &str,
    proposed: &str,
    cancel_after: Option<usize>,
    accept: bool,
) -> Result<ReviewReport> {
    let partials = word_prefixes(proposed);
    let total = partials.len();
    let (stream, cancel_at) = generation_stream(partials, cancel_after);
    let (source, cancel) = StreamGenerationSource::new(1, stream);

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let (updates_tx, mut updates_rx) = mpsc::channel::<EditorUpdate>(EVENT_CHANNEL_CAP);
    let collector = tokio::spawn(async move {
        let mut report = ReviewReport::default();
        while let Some(update) = updates_rx.recv().await {
            match update {
                EditorUpdate::DiffChanged(diff) => report.last_diff = Some(diff),
                EditorUpdate::ReviewClosed { accepted } => report.closed = Some(accepted),
                _ => {}
            }
        }
        report
    });

    let mut runtime = EditorRuntime::new(
        build_state(config, original, MemoryClipboard::new()),
        rx,
        updates_tx,
    );
    match cancel_after {
        Some(0) => cancel.signal(),
        _ => {
            if let Some(limit) = cancel_at {
                runtime = runtime.with_hooks(Box::new(CancelAfterTokens::new(limit, cancel)));
            }
        }
    }
    let loop_handle = tokio::spawn(runtime.run());

    let mut registry = EventSourceRegistry::new();
    registry.register(source);
    for handle in registry.spawn_all(&tx) {
        handle.await.context("generation task failed")?;
    }
    if accept {
        forward(&tx, EditorEvent::AcceptReview).await?;
    }
    forward(&tx, Event::Shutdown).await?;
    drop(tx);

    let (state, reason) = loop_handle.await.context("event loop task failed")??;
    let mut report = collector.await.context("update collector failed")?;
    info!(
        target: "runtime",
        reason = reason.as_str(),
        partials = total,
        pending = state.review().is_pending(),
        "review_complete"
    );
    report.text = state.text();
    Ok(report)
}

async fn run_review(config: &Config, args: ReviewArgs) -> Result<()> {
    let original = read_text(&args.file)?;
    let proposed = read_text(&args.proposed)?;
    let report = stream_review(config, &original, &proposed, args.cancel_after, args.accept).await?;

    if report.closed == Some(false) {
        eprintln!("inkwell: nothing to review");
        return Ok(());
    }
    if let Some(diff) = &report.last_diff {
        print_diff(diff, !args.no_color)?;
    }
    if report.closed == Some(true) {
        emit_document(&args.file, &report.text, true)?;
        eprintln!("inkwell: review accepted, wrote {}", args.file.display());
    } else {
        eprintln!("inkwell: review pending; rerun with --accept to apply");
    }
    Ok(())
}

fn run_mention(config: &Config, args: MentionArgs) -> Result<()> {
    let text = read_text(&args.file)?;
    let catalog: Vec<SuggestionItem> = serde_json::from_str(&read_text(&args.catalog)?)
        .with_context(|| format!("parsing catalog {}", args.catalog.display()))?;

    let mut state = build_state(config, &text, MemoryClipboard::new());
    state.handle(&EditorEvent::CatalogLoaded(catalog).into());
    let at = state.buffer().floor_boundary(args.at);
    state.handle(&EditorEvent::SelectionChanged(TextRange::caret(at)).into());

    let mut suggestions = Vec::new();
    for ch in std::iter::once('@').chain(args.query.chars()) {
        for update in type_char(&mut state, ch) {
            match update {
                EditorUpdate::Suggestions { items, .. } => suggestions = items,
                EditorUpdate::SuggestionsCleared => suggestions.clear(),
                _ => {}
            }
        }
    }
    if !state.mention().is_composing() {
        bail!("no mention session at byte {at}: `@` must start the document or follow whitespace, and the query may not contain whitespace");
    }
    for (i, item) in suggestions.iter().enumerate() {
        eprintln!("{i}: {} ({})", item.title, item.slug);
    }
    if args.pick >= suggestions.len() {
        bail!(
            "no suggestion at index {} ({} available)",
            args.pick,
            suggestions.len()
        );
    }
    state.handle(&EditorEvent::MentionSelect(args.pick).into());
    emit_document(&args.file, &state.text(), args.write)
}

fn run_recent(config: &Config, json: bool) -> Result<()> {
    let Some(path) = config.store_path() else {
        bail!("no recency store location available");
    };
    let items = JsonFileStore::new(&path)
        .load()
        .with_context(|| format!("loading {}", path.display()))?;
    let cache = RecencyCache::from_items(items, config.effective.recency_capacity);
    if json {
        println!("{}", serde_json::to_string_pretty(cache.items())?);
        return Ok(());
    }
    if cache.is_empty() {
        eprintln!("inkwell: no recent posts");
    }
    for item in cache.items() {
        let when = item
            .last_used_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{when}  {}  ({})", item.title, item.slug);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut startup = AppStartup::new();
    let config = startup.run(&cli)?;
    match cli.command {
        Command::Format(args) => run_format(&config, args),
        Command::Diff(args) => run_diff(args),
        Command::Review(args) => run_review(&config, args).await,
        Command::Mention(args) => run_mention(&config, args),
        Command::Recent { json } => run_recent(&config, json),
    }
}
