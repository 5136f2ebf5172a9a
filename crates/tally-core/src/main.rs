//! Tallycast batch binary.
//!
//! Every subcommand is a single shot over the persisted state in the data
//! directory: read, compute, write, print, exit. Payloads go to stdout in the
//! selected format; logs and errors go to stderr.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tally_common::error::format_error_human;
use tally_common::{Error, OutputFormat, Result, RunId, StructuredError, SCHEMA_VERSION};
use tally_config::{load_config, LoadedConfig};
use tally_core::allocate::{AllocationAnomaly, AllocationReport};
use tally_core::calendar::ReferenceZone;
use tally_core::daily_stats::{recent_momentum, summarize_daily};
use tally_core::engine::ForecastEngine;
use tally_core::exit_codes::ExitCode;
use tally_core::log_event;
use tally_core::logging::{
    event_names, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use tally_core::model::Snapshot;
use tally_core::render;
use tally_core::store::{
    merge_increments, record_capture, DailyStore, DataDir, ForecastHistory, JsonDailyStore,
    MergePolicy, MergeSummary, RecordOutcome, SnapshotLog,
};
use tally_core::trend::TrendAnalyzer;

/// Tallycast - count allocation and final-count forecasting
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Configuration file (default: TALLY_CONFIG, then the config dirs)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (default: TALLY_DATA, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log line format on stderr: human or jsonl
    #[arg(long, global = true, env = "TALLY_LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a counter reading, re-run allocation and merge daily counts
    Record(RecordArgs),

    /// Re-run allocation over the snapshot log and merge daily counts
    Allocate(AllocateArgs),

    /// Store a directly captured full-day count
    Capture(CaptureArgs),

    /// Forecast the final count from the current reading
    Forecast(ForecastArgs),

    /// Trend over stored forecasts
    Trend,

    /// Show stored forecasts
    History(HistoryArgs),

    /// Daily counts with summary statistics
    Daily,

    /// Configuration management
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Cumulative counter value
    #[arg(long)]
    count: u64,

    /// Reading time, RFC 3339 (default: now)
    #[arg(long, value_parser = parse_timestamp)]
    at: Option<DateTime<Utc>>,

    /// Let calculated counts replace captured ones
    #[arg(long)]
    overwrite_captured: bool,
}

#[derive(Args, Debug)]
struct AllocateArgs {
    /// Let calculated counts replace captured ones
    #[arg(long)]
    overwrite_captured: bool,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// Reference-zone date, YYYY-MM-DD
    #[arg(long)]
    date: NaiveDate,

    /// Full-day count
    #[arg(long)]
    count: u64,

    /// Where the count came from
    #[arg(long, default_value = "manual")]
    source: String,
}

#[derive(Args, Debug)]
struct ForecastArgs {
    /// Cumulative count observed so far in the window
    #[arg(long)]
    count: u64,

    /// Observation time, RFC 3339 (default: now)
    #[arg(long, value_parser = parse_timestamp)]
    at: Option<DateTime<Utc>>,

    /// Do not append the result to forecast history
    #[arg(long)]
    no_save: bool,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// Number of most recent forecasts to show
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (default: the resolved configuration)
        path: Option<PathBuf>,
    },
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp with offset: {e}"))
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = err.print();
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = LogLevel::from_flags(cli.global.quiet, cli.global.verbose);
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let global = &cli.global;
    let run_id = RunId::new();
    let ctx = LogContext::new(run_id.as_str());
    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_STARTED,
        Stage::Init,
        "run started"
    );

    let result = match &cli.command {
        Commands::Record(args) => run_record(global, &ctx, args),
        Commands::Allocate(args) => run_allocate(global, &ctx, args),
        Commands::Capture(args) => run_capture(global, &ctx, args),
        Commands::Forecast(args) => run_forecast(global, &ctx, &run_id, args),
        Commands::Trend => run_trend(global),
        Commands::History(args) => run_history(global, args),
        Commands::Daily => run_daily(global, &ctx),
        Commands::Config(args) => run_config(global, &ctx, args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => output_error(global, &ctx, &err),
    };
    log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Init,
        "run finished",
        exit_code = exit_code.as_i32()
    );

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Shared plumbing
// ============================================================================

fn load_from(ctx: &LogContext, path: Option<&Path>) -> Result<(LoadedConfig, ReferenceZone)> {
    let _stage = ctx.stage(Stage::Init).entered();
    let loaded = load_config(path).map_err(|e| {
        log_event!(
            ctx,
            ERROR,
            event_names::CONFIG_ERROR,
            Stage::Init,
            "configuration rejected",
            code = e.code()
        );
        Error::from(e)
    })?;
    match &loaded.snapshot.path {
        Some(path) => log_event!(
            ctx,
            INFO,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            path = path.as_str(),
            hash = loaded.snapshot.short_hash()
        ),
        None => log_event!(
            ctx,
            INFO,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no configuration file, using built-in defaults"
        ),
    }
    let zone = ReferenceZone::from_config(&loaded.config);
    Ok((loaded, zone))
}

fn config_for(global: &GlobalOpts, ctx: &LogContext) -> Result<(LoadedConfig, ReferenceZone)> {
    load_from(ctx, global.config.as_deref())
}

/// Context whose stage spans also carry the config hash.
fn with_hash(ctx: &LogContext, loaded: &LoadedConfig) -> LogContext {
    ctx.clone()
        .with_config_hash(Some(loaded.snapshot.config_hash.clone()))
}

fn engine_for(loaded: &LoadedConfig) -> ForecastEngine {
    ForecastEngine::new(&loaded.config).with_config_hash(loaded.snapshot.config_hash.clone())
}

fn data_dir(global: &GlobalOpts) -> Result<DataDir> {
    Ok(DataDir::resolve(global.data_dir.as_deref())?)
}

/// Print `payload` in the selected format.
fn emit(
    global: &GlobalOpts,
    payload: &serde_json::Value,
    md: impl FnOnce() -> String,
    summary: impl FnOnce() -> String,
) -> Result<()> {
    match global.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Md => print!("{}", md()),
        OutputFormat::Summary => println!("{}", summary()),
    }
    Ok(())
}

/// Report `err` on stderr and pick the exit code.
fn output_error(global: &GlobalOpts, ctx: &LogContext, err: &Error) -> ExitCode {
    let exit_code = ExitCode::from(err);
    if exit_code.is_internal_error() {
        log_event!(
            ctx,
            ERROR,
            event_names::INTERNAL_ERROR,
            Stage::Init,
            "command failed",
            code = err.code()
        );
    }
    match global.format {
        OutputFormat::Json => {
            let structured = StructuredError::from(err)
                .with_context("run_id", &ctx.run_id)
                .with_context("exit_code", exit_code.code_name());
            eprintln!("{}", structured.to_json());
        }
        OutputFormat::Md | OutputFormat::Summary => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, use_color));
        }
    }
    exit_code
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_record(global: &GlobalOpts, ctx: &LogContext, args: &RecordArgs) -> Result<ExitCode> {
    let (loaded, _) = config_for(global, ctx)?;
    let ctx = &with_hash(ctx, &loaded);
    let data = data_dir(global)?;
    let now = Utc::now();
    let snapshot = Snapshot::new(args.at.unwrap_or(now), args.count);

    let mut log = SnapshotLog::open(data.snapshots_path())?;
    let recorded = {
        let _stage = ctx.stage(Stage::Record).entered();
        log.record(snapshot)?
    };
    match recorded {
        RecordOutcome::Appended => log_event!(
            ctx,
            INFO,
            event_names::RECORD_APPENDED,
            Stage::Record,
            "snapshot recorded",
            count = args.count
        ),
        RecordOutcome::Unchanged { since } => {
            let since = since.to_rfc3339();
            log_event!(
                ctx,
                INFO,
                event_names::RECORD_UNCHANGED,
                Stage::Record,
                "count unchanged, snapshot not stored",
                since = since.as_str()
            )
        }
    }

    let (report, merge) = allocate_and_merge(
        ctx,
        &engine_for(&loaded),
        &log,
        &data,
        args.overwrite_captured,
        now,
    )?;

    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": now.to_rfc3339(),
        "snapshot": snapshot,
        "recorded": recorded,
        "allocation": report,
        "merge": merge,
    });
    emit(
        global,
        &payload,
        || render::allocation_md(&report, &merge),
        || {
            let head = match recorded {
                RecordOutcome::Appended => format!("record: {} stored", args.count),
                RecordOutcome::Unchanged { .. } => format!("record: {} unchanged", args.count),
            };
            format!("{head}; {}", render::allocation_summary(&report, &merge))
        },
    )?;

    Ok(if report.is_clean() {
        ExitCode::Clean
    } else {
        ExitCode::PartialAnomalies
    })
}

fn run_allocate(global: &GlobalOpts, ctx: &LogContext, args: &AllocateArgs) -> Result<ExitCode> {
    let (loaded, _) = config_for(global, ctx)?;
    let ctx = &with_hash(ctx, &loaded);
    let data = data_dir(global)?;
    let now = Utc::now();
    let log = SnapshotLog::open(data.snapshots_path())?;

    let (report, merge) = allocate_and_merge(
        ctx,
        &engine_for(&loaded),
        &log,
        &data,
        args.overwrite_captured,
        now,
    )?;

    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": now.to_rfc3339(),
        "snapshots": log.snapshots().len(),
        "allocation": report,
        "merge": merge,
    });
    emit(
        global,
        &payload,
        || render::allocation_md(&report, &merge),
        || render::allocation_summary(&report, &merge),
    )?;

    Ok(if report.is_clean() {
        ExitCode::Clean
    } else {
        ExitCode::PartialAnomalies
    })
}

fn allocate_and_merge(
    ctx: &LogContext,
    engine: &ForecastEngine,
    log: &SnapshotLog,
    data: &DataDir,
    overwrite_captured: bool,
    now: DateTime<Utc>,
) -> Result<(AllocationReport, MergeSummary)> {
    let allocate_stage = ctx.stage(Stage::Allocate).entered();
    log_event!(
        ctx,
        DEBUG,
        event_names::ALLOCATE_STARTED,
        Stage::Allocate,
        "allocating snapshot log",
        snapshots = log.snapshots().len()
    );
    let report = engine.allocate(log.snapshots());
    for anomaly in &report.anomalies {
        match anomaly {
            AllocationAnomaly::CounterRegression { from, to, .. } => log_event!(
                ctx,
                WARN,
                event_names::ALLOCATE_REGRESSION,
                Stage::Allocate,
                "counter regression excluded from allocation",
                from = *from,
                to = *to
            ),
            AllocationAnomaly::InvalidInterval { start, .. } => {
                let start = start.to_rfc3339();
                log_event!(
                    ctx,
                    WARN,
                    event_names::ALLOCATE_INVALID_INTERVAL,
                    Stage::Allocate,
                    "zero-length interval excluded from allocation",
                    start = start.as_str()
                )
            }
        }
    }

    drop(allocate_stage);

    let _stage = ctx.stage(Stage::Persist).entered();
    let mut store = JsonDailyStore::open(data.daily_path())?;
    let policy = MergePolicy { overwrite_captured };
    let merge = merge_increments(&mut store, &report.increments, policy, now);
    store.save()?;
    log_event!(
        ctx,
        INFO,
        event_names::ALLOCATE_MERGED,
        Stage::Persist,
        "daily counts merged",
        created = merge.created(),
        updated = merge.updated(),
        preserved = merge.preserved()
    );
    Ok((report, merge))
}

fn run_capture(global: &GlobalOpts, ctx: &LogContext, args: &CaptureArgs) -> Result<ExitCode> {
    let data = data_dir(global)?;
    let now = Utc::now();
    let _stage = ctx.stage(Stage::Persist).entered();
    let mut store = JsonDailyStore::open(data.daily_path())?;
    let previous = record_capture(&mut store, args.date, args.count, &args.source, now);
    store.save()?;
    let date = args.date.to_string();
    log_event!(
        ctx,
        INFO,
        event_names::STORE_WRITTEN,
        Stage::Persist,
        "captured daily count stored",
        date = date.as_str(),
        count = args.count
    );

    let record = store.get(args.date);
    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": now.to_rfc3339(),
        "record": record,
        "previous": previous,
    });
    emit(
        global,
        &payload,
        || {
            let mut md = format!(
                "# tally capture\n\n{}: **{}** ({})\n",
                args.date, args.count, args.source
            );
            if let Some(prev) = &previous {
                md.push_str(&format!("\nReplaced {} ({}).\n", prev.count, kind(prev.is_calculated)));
            }
            md
        },
        || format!("capture: {} = {}", args.date, args.count),
    )?;
    Ok(ExitCode::Clean)
}

fn kind(is_calculated: bool) -> &'static str {
    if is_calculated {
        "calculated"
    } else {
        "captured"
    }
}

fn run_forecast(
    global: &GlobalOpts,
    ctx: &LogContext,
    run_id: &RunId,
    args: &ForecastArgs,
) -> Result<ExitCode> {
    let (loaded, _) = config_for(global, ctx)?;
    let ctx = &with_hash(ctx, &loaded);
    let data = data_dir(global)?;
    let now = args.at.unwrap_or_else(Utc::now);

    let mut history = ForecastHistory::open(data.history_path())?;
    let outcome = engine_for(&loaded).forecast_at(args.count, now, history.entries(), run_id)?;

    if let Some(result) = outcome.result() {
        if !args.no_save {
            let _stage = ctx.stage(Stage::Persist).entered();
            history.append(result.clone())?;
            log_event!(
                ctx,
                INFO,
                event_names::HISTORY_APPENDED,
                Stage::Persist,
                "forecast appended to history",
                entries = history.len()
            );
        }
    }

    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "run_id": ctx.run_id,
        "generated_at": Utc::now().to_rfc3339(),
        "saved": outcome.result().is_some() && !args.no_save,
        "forecast": outcome,
    });
    emit(
        global,
        &payload,
        || render::forecast_md(&outcome),
        || render::forecast_summary(&outcome),
    )?;

    Ok(if outcome.is_closed() {
        ExitCode::WindowClosed
    } else {
        ExitCode::Clean
    })
}

fn run_trend(global: &GlobalOpts) -> Result<ExitCode> {
    let data = data_dir(global)?;
    let history = ForecastHistory::open(data.history_path())?;
    let trend = TrendAnalyzer::new().analyze(history.entries());

    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "generated_at": Utc::now().to_rfc3339(),
        "forecasts": history.len(),
        "trend": trend,
    });
    emit(
        global,
        &payload,
        || render::trend_md(&trend),
        || render::trend_summary(&trend),
    )?;
    Ok(ExitCode::Clean)
}

fn run_history(global: &GlobalOpts, args: &HistoryArgs) -> Result<ExitCode> {
    let data = data_dir(global)?;
    let history = ForecastHistory::open(data.history_path())?;
    let entries = history.recent(args.limit);

    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "generated_at": Utc::now().to_rfc3339(),
        "total": history.len(),
        "forecasts": entries,
    });
    emit(
        global,
        &payload,
        || render::history_md(entries),
        || render::history_summary(entries),
    )?;
    Ok(ExitCode::Clean)
}

fn run_daily(global: &GlobalOpts, ctx: &LogContext) -> Result<ExitCode> {
    let (_, zone) = config_for(global, ctx)?;
    let data = data_dir(global)?;
    let store = JsonDailyStore::open(data.daily_path())?;
    let records = store.records();
    let today = zone.date_of(Utc::now());
    let summary = summarize_daily(&records, today);
    let momentum = recent_momentum(&records);

    let payload = serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "generated_at": Utc::now().to_rfc3339(),
        "records": records,
        "summary": summary,
        "momentum": momentum,
    });
    emit(
        global,
        &payload,
        || render::daily_md(&records, summary.as_ref(), &momentum),
        || render::daily_summary(summary.as_ref(), &momentum),
    )?;
    Ok(ExitCode::Clean)
}

fn run_config(global: &GlobalOpts, ctx: &LogContext, args: &ConfigArgs) -> Result<ExitCode> {
    match &args.command {
        ConfigCommands::Show => {
            let (loaded, _) = config_for(global, ctx)?;
            let payload = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "snapshot": loaded.snapshot,
                "config": loaded.config,
            });
            emit(
                global,
                &payload,
                || {
                    let s = &loaded.snapshot;
                    let mut md = String::from("# tally config\n\n");
                    md.push_str(&format!(
                        "- source: {}\n- path: {}\n- hash: {}\n- window: {} → {} ({:.0}h)\n- model: {}\n- bands: {}\n",
                        s.source,
                        s.path.as_deref().unwrap_or("(built-in)"),
                        s.short_hash(),
                        s.summary.window_start,
                        s.summary.window_end,
                        s.summary.total_hours,
                        s.summary.model,
                        loaded.config.band_labels().join(", ")
                    ));
                    md
                },
                || {
                    format!(
                        "config: {} ({})",
                        loaded.snapshot.source,
                        loaded.snapshot.short_hash()
                    )
                },
            )?;
        }
        ConfigCommands::Validate { path } => {
            let target = path.as_deref().or(global.config.as_deref());
            let (loaded, _) = load_from(ctx, target)?;
            let payload = serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "status": "valid",
                "path": loaded.snapshot.path,
                "source": loaded.snapshot.source,
                "config_hash": loaded.snapshot.config_hash,
            });
            emit(
                global,
                &payload,
                || {
                    format!(
                        "# Configuration Validation\n\nStatus: ✓ Valid\nSource: {}\n",
                        loaded.snapshot.path.as_deref().unwrap_or("built-in defaults")
                    )
                },
                || "config validate: OK".to_string(),
            )?;
        }
    }
    Ok(ExitCode::Clean)
}
