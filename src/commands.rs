//! Command dispatch for the `fili` binary.
//!
//! Each subcommand resolves the configuration, opens the index database and
//! calls one library operation. Outcomes become [`ExitCode`]s; failures are
//! returned as `anyhow` errors with context.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::actions::DeleteConfig;
use crate::cli::{
    Cli, Commands, CreateArgs, DiffArgs, DupesCommand, DupesDeleteArgs, DupesListArgs, ExportArgs,
    IndexCommand, OutputFormat, UnindexArgs, UpdateArgs,
};
use crate::config::{home_dir, Config, ConfigOverrides};
use crate::duplicates::{find_duplicate_groups, DuplicateGroup, DuplicateResolver, GroupSummary};
use crate::error::ExitCode;
use crate::index::{
    copy_diff, diff_scans, export_scan, import_scan, IndexDocument, ScanBuilder, ScanOptions,
    ScanReport,
};
use crate::output::json::write_json;
use crate::output::{JsonDiff, JsonDuplicates, TextOutput};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::path_utils::normalize_root;
use crate::signal;
use crate::storage::{IndexStore, SqliteStore, StoreError};

/// Shared state of one invocation.
struct AppContext {
    config: Config,
    quiet: bool,
}

impl AppContext {
    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.config.database).with_context(|| {
            format!(
                "Failed to open index database {}",
                self.config.database.display()
            )
        })
    }

    fn progress(&self) -> Arc<dyn ProgressCallback> {
        Arc::new(Progress::new(self.quiet))
    }

    fn scan_options(&self, fast: bool) -> ScanOptions {
        ScanOptions {
            fast,
            follow_symlinks: self.config.follow_symlinks,
            fastsum_length: self.config.fastsum_length,
            io_threads: self.config.io_threads,
            batch_size: self.config.batch_size,
            ..ScanOptions::default()
        }
    }

    fn scan_builder<'a>(&self, store: &'a SqliteStore) -> Result<ScanBuilder<'a, SqliteStore>> {
        let handler = signal::install_handler().context("Failed to install Ctrl+C handler")?;
        let rules = self.config.exclusion_rules(home_dir().as_deref());
        Ok(ScanBuilder::new(store, rules)
            .with_shutdown_flag(handler.get_flag())
            .with_progress(self.progress()))
    }
}

/// Run one parsed command line.
///
/// # Errors
///
/// Returns an error for anything that aborts the command: bad configuration,
/// unknown or duplicate scan names, storage failures, unreadable documents.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if cli.no_color {
        yansi::disable();
    }

    let overrides = ConfigOverrides {
        database: cli.database.clone(),
        io_threads: cli.io_threads,
        ..ConfigOverrides::default()
    };
    let config =
        Config::load(cli.config.as_deref(), &overrides).context("Failed to load configuration")?;
    let ctx = AppContext {
        config,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Index { command } => run_index(&ctx, command),
        Commands::Dupes { command } => match command {
            DupesCommand::List(args) => dupes_list(&ctx, &args),
            DupesCommand::Delete(args) => dupes_delete(&ctx, &args),
        },
        Commands::Search(args) => {
            let store = ctx.open_store()?;
            let files = store.search_paths(args.query.as_bytes())?;
            TextOutput::new(io::stdout().lock()).files(&files)?;
            Ok(ExitCode::Success)
        }
        Commands::Recent(args) => {
            let store = ctx.open_store()?;
            let files = store.recent_files(args.limit)?;
            TextOutput::new(io::stdout().lock()).files(&files)?;
            Ok(ExitCode::Success)
        }
        Commands::Unindex(args) => unindex(&ctx, &args),
        Commands::Stats(args) => {
            let store = ctx.open_store()?;
            let stats = store.stats()?;
            match args.output {
                OutputFormat::Text => TextOutput::new(io::stdout().lock()).stats(&stats)?,
                OutputFormat::Json => write_json(&stats, &mut io::stdout().lock(), true)?,
            }
            Ok(ExitCode::Success)
        }
        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&ctx.config).context("Failed to render configuration")?;
            print!("{rendered}");
            Ok(ExitCode::Success)
        }
    }
}

fn run_index(ctx: &AppContext, command: IndexCommand) -> Result<ExitCode> {
    match command {
        IndexCommand::Create(args) => index_create(ctx, &args),
        IndexCommand::List(args) => {
            let store = ctx.open_store()?;
            let scans = store.list_scans()?;
            TextOutput::new(io::stdout().lock()).scans(&scans, args.long)?;
            Ok(ExitCode::Success)
        }
        IndexCommand::Export(args) => index_export(ctx, &args),
        IndexCommand::Import(args) => {
            let store = ctx.open_store()?;
            let document = IndexDocument::load(&args.file)?;
            let scan = import_scan(&store, &document)
                .with_context(|| format!("Failed to import {}", args.file.display()))?;
            if !ctx.quiet {
                println!("Imported '{}' ({} files)", scan.name, document.files.len());
            }
            Ok(ExitCode::Success)
        }
        IndexCommand::Delete(args) => {
            let store = ctx.open_store()?;
            let removed = store.delete_scan(&args.name)?;
            if !ctx.quiet {
                println!("Deleted '{}' and {} files", args.name, removed);
            }
            Ok(ExitCode::Success)
        }
        IndexCommand::Update(args) => index_update(ctx, &args),
        IndexCommand::Diff(args) => index_diff(ctx, &args),
    }
}

fn index_create(ctx: &AppContext, args: &CreateArgs) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let options = ScanOptions {
        name: args.name.clone(),
        recurse: !args.no_recurse,
        follow_symlinks: args.follow_symlinks || ctx.config.follow_symlinks,
        ..ctx.scan_options(args.fast)
    };
    let report = ctx
        .scan_builder(&store)?
        .create_scan(&args.path, &options)
        .with_context(|| format!("Failed to index {}", args.path.display()))?;
    finish_scan(ctx, &report)
}

fn index_update(ctx: &AppContext, args: &UpdateArgs) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let report = ctx
        .scan_builder(&store)?
        .update_scan(&args.name, &ctx.scan_options(args.fast))
        .with_context(|| format!("Failed to update '{}'", args.name))?;
    finish_scan(ctx, &report)
}

fn finish_scan(ctx: &AppContext, report: &ScanReport) -> Result<ExitCode> {
    if !ctx.quiet {
        TextOutput::new(io::stdout().lock()).scan_report(report)?;
    }
    Ok(if report.stats.interrupted {
        ExitCode::Interrupted
    } else if report.stats.is_partial() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn index_export(ctx: &AppContext, args: &ExportArgs) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let document = export_scan(&store, &args.name)
        .with_context(|| format!("Failed to export '{}'", args.name))?;
    match &args.output {
        Some(path) => document.save(path)?,
        None => {
            let mut stdout = io::stdout().lock();
            document.write_to(&mut stdout)?;
            writeln!(stdout)?;
        }
    }
    Ok(ExitCode::Success)
}

fn index_diff(ctx: &AppContext, args: &DiffArgs) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let diff = diff_scans(&store, &args.reference, &args.other)?;

    match args.output {
        OutputFormat::Text => TextOutput::new(io::stdout().lock()).diff(&diff)?,
        OutputFormat::Json => JsonDiff::new(&diff).write_to(&mut io::stdout().lock(), true)?,
    }

    let Some(destination) = &args.copy_diff else {
        return Ok(ExitCode::Success);
    };
    let progress = ctx.progress();
    let report = copy_diff(&diff, destination, Some(progress.as_ref()))?;
    if !ctx.quiet {
        TextOutput::new(io::stderr().lock()).copy_report(&report)?;
    }
    Ok(if report.failed > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn scan_scope(store: &SqliteStore, name: Option<&str>) -> Result<Option<i64>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let scan = store
        .scan_by_name(name)?
        .ok_or_else(|| StoreError::ScanNotFound(name.to_string()))?;
    Ok(Some(scan.id))
}

fn dupes_list(ctx: &AppContext, args: &DupesListArgs) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let scope = scan_scope(&store, args.scan.as_deref())?;

    let groups: Vec<DuplicateGroup> =
        find_duplicate_groups(&store, scope)?.collect::<Result<_, _>>()?;
    let mut summary = GroupSummary::default();
    for group in &groups {
        summary.add(group);
    }
    let exit_code = if groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    };

    match args.output {
        OutputFormat::Text => TextOutput::new(io::stdout().lock()).groups(&groups, &summary)?,
        OutputFormat::Json => JsonDuplicates::new(&groups, &summary, exit_code)
            .write_to(&mut io::stdout().lock(), true)?,
    }
    Ok(exit_code)
}

fn dupes_delete(ctx: &AppContext, args: &DupesDeleteArgs) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let scope = scan_scope(&store, args.scan.as_deref())?;
    let config = DeleteConfig {
        permanent: args.permanent,
        dry_run: args.dry_run,
    };

    let report = DuplicateResolver::new(&store)
        .for_scan(scope)
        .with_progress(ctx.progress())
        .delete_duplicates(&config)
        .context("Duplicate deletion stopped")?;

    if !ctx.quiet || report.is_partial() {
        TextOutput::new(io::stdout().lock()).resolve_report(&report, args.dry_run)?;
    }
    Ok(if report.is_partial() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn unindex(ctx: &AppContext, args: &UnindexArgs) -> Result<ExitCode> {
    let store = ctx.open_store()?;
    let prefix = normalize_root(&args.prefix)
        .with_context(|| format!("Cannot resolve {}", args.prefix.display()))?;
    let removed = store.unindex(&prefix, args.strict)?;
    if !ctx.quiet {
        println!("Removed {} files under {}", removed, prefix.display());
    }
    Ok(ExitCode::Success)
}
