//! CLI binary for any-parser.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig` / `ExtractionRequest` and prints results.

use anyhow::{bail, Context, Result};
use any_parser::pipeline::tables::html_table_to_csv;
use any_parser::{
    convert_tables, validate_file_inputs, AnyParser, BatchProgress, BatchProgressCallback,
    ClientConfig, ExtractArgs, ExtractionRequest, ExtractionResult, FetchOptions,
    FileStatusResponse, Operation, TableFormat, UploadResponse,
};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Batch upload progress bar ────────────────────────────────────────────────

/// Live progress bar for folder uploads. Files finish out of order, so each
/// event prints its own line above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("walking folder…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Uploading");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Uploading {total_files} files…"))
        ));
    }

    fn on_file_start(&self, path: &Path) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_file_complete(&self, path: &Path, response: &UploadResponse) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            path.display(),
            dim(&response.request_id),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, path: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), path.display(), red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} files uploaded",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files uploaded  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown from a PDF (stdout)
  any-parser extract parse invoice.pdf

  # Layout-aware parse, written to a file
  any-parser extract parse-pro report.docx -o report.md

  # Key-value extraction
  any-parser extract key-value w2.pdf -i ein="employer identification number" -i wages="box 1 wages"

  # Tables as CSV
  any-parser extract tables statement.pdf --table-format csv

  # Base64 content instead of a path
  base64 -w0 scan.png | any-parser extract parse --content - --file-type png

  # Async: submit now, fetch later
  any-parser submit resume resume.pdf
  any-parser fetch <JOB_ID> --op resume

  # Batch: upload a folder, then refresh statuses
  any-parser batch upload ./docs -o requests.jsonl
  any-parser batch fetch requests.jsonl
  any-parser batch usage

OPERATIONS:
  parse       markdown
  parse-pro   layout-aware markdown
  parse-ocr   OCR markdown (--extract-tables to include tables)
  pii         personal information as JSON
  tables      HTML tables (convert with --table-format json|csv)
  key-value   keys described with -i KEY=DESCRIPTION, as JSON
  resume      resume sections as JSON

ENVIRONMENT VARIABLES:
  CAMBIO_API_KEY        API key (required)
  ANYPARSER_BASE_URL    Override the API base URL
  ANYPARSER_BATCH_URL   Override the batch API base URL
  RUST_LOG              Override the log filter (e.g. any_parser=debug)
"#;

/// Extract markdown and structured data from documents with the AnyParser API.
#[derive(Parser, Debug)]
#[command(
    name = "any-parser",
    version,
    about = "Extract markdown and structured data from documents with the AnyParser API",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// API key sent as `x-api-key`.
    #[arg(long, env = "CAMBIO_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API base URL.
    #[arg(long, env = "ANYPARSER_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Batch API base URL.
    #[arg(long, env = "ANYPARSER_BATCH_URL", global = true)]
    batch_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "ANYPARSER_TIMEOUT", default_value_t = 60, global = true)]
    timeout: u64,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ANYPARSER_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "ANYPARSER_QUIET", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an extraction and print the result.
    Extract {
        /// parse, parse-pro, parse-ocr, pii, tables, key-value or resume.
        op: Operation,
        #[command(flatten)]
        input: InputArgs,
        /// Use the async upload + poll flow instead of one sync request.
        #[arg(long = "async")]
        use_async: bool,
        #[command(flatten)]
        poll: PollArgs,
        /// Output format for extracted tables.
        #[arg(long, default_value = "html")]
        table_format: TableFormat,
        /// Write the result to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Submit an async extraction and print the job id.
    Submit {
        op: Operation,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Fetch the result of an async job.
    Fetch {
        job_id: String,
        /// Operation the job was submitted with (selects the decoder).
        #[arg(long)]
        op: Option<Operation>,
        /// Make a single attempt; exit quietly if the job is still running.
        #[arg(long)]
        no_wait: bool,
        #[command(flatten)]
        poll: PollArgs,
        #[arg(long, default_value = "html")]
        table_format: TableFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Query the job-status resource.
    Status {
        job_id: String,
        /// Poll until the job completes and print its result.
        #[arg(long)]
        wait: bool,
        #[arg(long)]
        op: Option<Operation>,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// Batch API: bulk uploads processed offline.
    Batch {
        #[command(subcommand)]
        command: BatchCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BatchCommand {
    /// Upload a file or every file under a folder; prints JSONL.
    Upload {
        path: PathBuf,
        /// Write the JSONL of upload responses here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Concurrent uploads.
        #[arg(short, long, env = "ANYPARSER_BATCH_CONCURRENCY", default_value_t = 10)]
        concurrency: usize,
        /// Disable progress bar.
        #[arg(long)]
        no_progress: bool,
    },
    /// Print the status of one request.
    Retrieve { request_id: String },
    /// Refresh every record of an upload JSONL with its current status.
    Fetch {
        jsonl: PathBuf,
        /// Write updated records here instead of rewriting the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print remaining page quota.
    Usage,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Local document path.
    file: Option<PathBuf>,

    /// Base64 file content instead of a path ("-" reads stdin).
    #[arg(long)]
    content: Option<String>,

    /// File type; required with --content, overrides the extension otherwise.
    #[arg(long)]
    file_type: Option<String>,

    /// KEY=DESCRIPTION pair for key-value extraction (repeatable).
    #[arg(short = 'i', long = "instruction", value_name = "KEY=DESCRIPTION")]
    instructions: Vec<String>,

    /// Also extract tables (parse-ocr only).
    #[arg(long)]
    extract_tables: bool,
}

impl InputArgs {
    fn request(&self, op: Operation) -> Result<ExtractionRequest> {
        let content = match self.content.as_deref() {
            Some("-") => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read content from stdin")?;
                Some(buf.trim().to_string())
            }
            other => other.map(str::to_string),
        };
        let input = validate_file_inputs(
            self.file.as_deref(),
            content.as_deref(),
            self.file_type.as_deref(),
        )?;
        let args = ExtractArgs {
            extract_instruction: parse_instructions(&self.instructions)?,
            extract_tables: self.extract_tables.then_some(true),
        };
        Ok(ExtractionRequest::new(input, op).with_args(args))
    }
}

#[derive(Args, Debug)]
struct PollArgs {
    /// Give up polling after this many seconds.
    #[arg(long, env = "ANYPARSER_POLL_TIMEOUT", default_value_t = 60)]
    poll_timeout: u64,

    /// Seconds between poll attempts.
    #[arg(long, env = "ANYPARSER_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,
}

impl PollArgs {
    fn options(&self, wait: bool) -> FetchOptions {
        FetchOptions {
            wait,
            timeout: Duration::from_secs(self.poll_timeout),
            interval: Duration::from_secs(self.poll_interval),
        }
    }
}

fn parse_instructions(pairs: &[String]) -> Result<Option<BTreeMap<String, String>>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut map = BTreeMap::new();
    for pair in pairs {
        let Some((key, description)) = pair.split_once('=') else {
            bail!("Invalid instruction '{pair}': expected KEY=DESCRIPTION");
        };
        map.insert(key.trim().to_string(), description.trim().to_string());
    }
    Ok(Some(map))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Results go to stdout; logs to stderr. Library INFO lines are noise for
    // a one-shot command, so the default shows warnings only.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Extract {
            op,
            input,
            use_async,
            poll,
            table_format,
            output,
        } => {
            let client = build_client(&cli, None, None)?;
            let request = input.request(*op)?;
            if *use_async {
                let result = client
                    .extract_async(&request, poll.options(true))
                    .await
                    .with_context(|| format!("Async {op} failed"))?;
                if let Some(result) = result {
                    emit(&render(&result, *table_format, cli.json)?, output.as_deref())?;
                }
            } else {
                let out = client
                    .extract(&request)
                    .await
                    .with_context(|| format!("{op} failed"))?;
                emit(&render(&out.result, *table_format, cli.json)?, output.as_deref())?;
                if !cli.quiet {
                    eprintln!("{}", dim(&out.elapsed_display()));
                }
            }
        }

        Command::Submit { op, input } => {
            let client = build_client(&cli, None, None)?;
            let request = input.request(*op)?;
            let job_id = client.submit(&request).await.context("Submit failed")?;
            println!("{job_id}");
        }

        Command::Fetch {
            job_id,
            op,
            no_wait,
            poll,
            table_format,
            output,
        } => {
            let client = build_client(&cli, None, None)?;
            match client
                .fetch(job_id, *op, poll.options(!*no_wait))
                .await
                .with_context(|| format!("Fetch of job {job_id} failed"))?
            {
                Some(result) => emit(&render(&result, *table_format, cli.json)?, output.as_deref())?,
                None => {
                    if !cli.quiet {
                        eprintln!("{} job {} is still processing", cyan("…"), job_id);
                    }
                }
            }
        }

        Command::Status {
            job_id,
            wait,
            op,
            poll,
        } => {
            let client = build_client(&cli, None, None)?;
            if *wait {
                if let Some(result) = client.wait_for_job(job_id, *op, poll.options(true)).await? {
                    emit(&render(&result, TableFormat::Html, cli.json)?, None)?;
                }
            } else {
                let status = client.job_status(job_id).await?;
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
        }

        Command::Batch { command } => run_batch(&cli, command).await?,
    }

    Ok(())
}

async fn run_batch(cli: &Cli, command: &BatchCommand) -> Result<()> {
    match command {
        BatchCommand::Upload {
            path,
            output,
            concurrency,
            no_progress,
        } => {
            let progress: Option<BatchProgress> = if !cli.quiet && !no_progress {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };
            let client = build_client(cli, progress, Some(*concurrency))?;
            let responses = client
                .batches()
                .create(path)
                .await
                .with_context(|| format!("Batch upload of {} failed", path.display()))?;

            let mut jsonl = String::new();
            for response in &responses {
                jsonl.push_str(&serde_json::to_string(response)?);
                jsonl.push('\n');
            }
            match output {
                Some(p) => std::fs::write(p, jsonl)
                    .with_context(|| format!("Failed to write {}", p.display()))?,
                None => print!("{jsonl}"),
            }
        }

        BatchCommand::Retrieve { request_id } => {
            let client = build_client(cli, None, None)?;
            let status = client.batches().retrieve(request_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        BatchCommand::Fetch { jsonl, output } => {
            let client = build_client(cli, None, None)?;
            refresh_jsonl(&client, jsonl, output.as_deref().unwrap_or(jsonl), cli.quiet).await?;
        }

        BatchCommand::Usage => {
            let client = build_client(cli, None, None)?;
            let usage = client.batches().get_usage().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&usage)?);
            } else {
                println!("Page limit:      {}", usage.page_limit);
                println!("Pages remaining: {}", usage.page_remaining);
            }
        }
    }
    Ok(())
}

/// Replace each JSONL record by its current [`FileStatusResponse`]; records
/// whose retrieval fails are kept as they were.
async fn refresh_jsonl(client: &AnyParser, input: &Path, output: &Path, quiet: bool) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let records: Vec<serde_json::Value> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", input.display(), i + 1))
        })
        .collect::<Result<_>>()?;

    let ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.get("requestId").and_then(|v| v.as_str()).map(str::to_string))
        .collect();
    let mut statuses: HashMap<String, FileStatusResponse> = HashMap::new();
    for (id, result) in client.batches().retrieve_many(&ids).await {
        match result {
            Ok(status) => {
                statuses.insert(id, status);
            }
            Err(e) => warn!("Could not retrieve {}: {}", id, e),
        }
    }

    let mut out = String::new();
    for record in &records {
        let updated = record
            .get("requestId")
            .and_then(|v| v.as_str())
            .and_then(|id| statuses.get(id));
        match updated {
            Some(status) => out.push_str(&serde_json::to_string(status)?),
            None => out.push_str(&serde_json::to_string(record)?),
        }
        out.push('\n');
    }
    std::fs::write(output, out).with_context(|| format!("Failed to write {}", output.display()))?;

    if !quiet {
        eprintln!(
            "{} {}/{} records refreshed → {}",
            green("✔"),
            statuses.len(),
            records.len(),
            output.display()
        );
    }
    Ok(())
}

fn build_client(
    cli: &Cli,
    progress: Option<BatchProgress>,
    concurrency: Option<usize>,
) -> Result<AnyParser> {
    let api_key = cli
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .context("No API key: pass --api-key or set CAMBIO_API_KEY")?;

    let mut builder = ClientConfig::builder(api_key).request_timeout_secs(cli.timeout);
    if let Some(url) = &cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(url) = &cli.batch_url {
        builder = builder.batch_url(url);
    }
    if let Some(n) = concurrency {
        builder = builder.batch_concurrency(n);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid client configuration")?;
    Ok(AnyParser::with_config(config)?)
}

/// Text for a result: tables converted per `table_format`, JSON when asked.
fn render(result: &ExtractionResult, table_format: TableFormat, json: bool) -> Result<String> {
    if let ExtractionResult::Tables(tables) = result {
        match table_format {
            TableFormat::Html => {}
            TableFormat::Json => {
                let converted = convert_tables(tables, TableFormat::Json)?;
                return Ok(serde_json::to_string_pretty(&converted)?);
            }
            TableFormat::Csv => {
                let csvs = tables
                    .iter()
                    .map(|t| html_table_to_csv(t))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(csvs.join("\n"));
            }
        }
    }
    if json {
        Ok(serde_json::to_string_pretty(result)?)
    } else {
        Ok(result.to_text())
    }
}

fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} wrote {}", green("✔"), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if !text.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}
