//! Command implementations for csvlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every session a command opens is registered in one
//! [`Container`], which is force-closed if the command fails half-way.

use crate::cli::{ClearArgs, Cli, Command, HeadArgs, LocksArgs, PathArgs};
use crate::config::Config;
use crate::container::Container;
use crate::error::{FileError, Result};
use crate::locks::{self, ControlFileInfo};
use crate::reader::Reader;
use std::io::{self, Write};
use std::path::Path;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Cat(args) => cmd_cat(&config, args),
        Command::Head(args) => cmd_head(&config, args),
        Command::Create(args) => cmd_create(&config, args),
        Command::Update(args) => cmd_update(&config, args),
        Command::Locks(args) => cmd_locks(&config, args),
        Command::Clear(args) => cmd_clear(&config, args),
    }
}

/// Load the config file, if any, and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(timeout_ms) = cli.timeout_ms {
        config.wait_timeout_ms = timeout_ms;
    }
    if let Some(retry_delay_ms) = cli.retry_delay_ms {
        config.retry_delay_ms = retry_delay_ms;
    }

    config.validate()?;
    Ok(config)
}

/// Run `work` against a fresh container. On success every session still
/// registered is closed normally; on failure all of them are force-closed
/// and any cleanup failure is chained onto the original error.
fn with_sessions<F>(config: &Config, work: F) -> Result<()>
where
    F: FnOnce(&mut Container) -> Result<()>,
{
    let mut container = Container::from_config(config);

    match work(&mut container) {
        Ok(()) => container.close_all(),
        Err(e) => match container.close_all_with_errors() {
            Ok(()) => Err(e),
            Err(cleanup) => Err(FileError::composite(e, cleanup)),
        },
    }
}

fn copy_to_stdout<R: io::Read>(path: &Path, mut source: R) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut source, &mut out).map_err(|e| FileError::from_io(path, e))?;
    out.flush().map_err(|e| FileError::from_io(path, e))
}

fn closed(path: &Path) -> FileError {
    FileError::Io(format!("file {} is already closed", path.display()))
}

fn cmd_cat(config: &Config, args: PathArgs) -> Result<()> {
    let ctx = config.wait_context();

    with_sessions(config, |container| {
        let handler = container.create_handler_for_read(&args.path, &ctx, config.retry_delay())?;
        let file = handler.file().ok_or_else(|| closed(&args.path))?;
        copy_to_stdout(&args.path, file)
    })
}

fn cmd_head(config: &Config, args: HeadArgs) -> Result<()> {
    let ctx = config.wait_context();

    with_sessions(config, |container| {
        let handler = container.create_handler_for_read(&args.path, &ctx, config.retry_delay())?;
        let file = handler.file().ok_or_else(|| closed(&args.path))?;
        let reader = Reader::new(file, args.bytes).map_err(|e| FileError::from_io(&args.path, e))?;
        tracing::debug!(
            path = %args.path.display(),
            head = reader.head_len(),
            size = reader.size(),
            "read file head"
        );
        copy_to_stdout(&args.path, reader.head_bytes())
    })
}

fn cmd_create(config: &Config, args: PathArgs) -> Result<()> {
    let ctx = config.wait_context();

    with_sessions(config, |container| {
        let handler =
            container.create_handler_for_create(&args.path, &ctx, config.retry_delay())?;
        copy_stdin(&args.path, handler.file_for_update()?)?;
        container.commit(&args.path)
    })
}

fn cmd_update(config: &Config, args: PathArgs) -> Result<()> {
    let ctx = config.wait_context();

    with_sessions(config, |container| {
        let handler =
            container.create_handler_for_update(&args.path, &ctx, config.retry_delay())?;
        copy_stdin(&args.path, handler.file_for_update()?)?;
        container.commit(&args.path)
    })
}

fn copy_stdin<W: Write>(path: &Path, dest: &mut W) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    io::copy(&mut input, dest).map_err(|e| FileError::from_io(path, e))?;
    dest.flush().map_err(|e| FileError::from_io(path, e))
}

fn cmd_locks(config: &Config, args: LocksArgs) -> Result<()> {
    let found = locks::list_control_files(&args.path, config.stale_minutes)?;

    if args.json {
        let json = serde_json::to_string_pretty(&found)
            .map_err(|e| FileError::Io(format!("failed to serialize lock list: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    if found.is_empty() {
        println!("No control files for {}.", args.path.display());
        return Ok(());
    }

    println!("Control files ({}):", found.len());
    println!();

    for info in &found {
        print_control_file(info, config);
    }

    // Summary
    let stale_count = found.iter().filter(|i| i.is_stale).count();
    if stale_count > 0 {
        println!(
            "Note: {} control file(s) are stale. Use `csvlock clear {} --force` to clear.",
            stale_count,
            args.path.display()
        );
    }

    Ok(())
}

fn print_control_file(info: &ControlFileInfo, config: &Config) {
    println!("  {} ({}):", file_name(&info.path), info.kind);
    if let Some(modified_at) = info.modified_at {
        println!("    Modified:   {}", modified_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("    Age:        {}", info.age_string());
    if info.is_stale {
        println!(
            "    Status:     STALE (exceeds {} min threshold)",
            config.stale_minutes
        );
    }
    println!("    Path:       {}", info.path.display());
    println!();
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn cmd_clear(config: &Config, args: ClearArgs) -> Result<()> {
    if !args.force {
        return Err(FileError::User(format!(
            "refusing to clear control files without --force flag.\n\n\
             Clearing control files while a session is still active lets \
             another writer in and can corrupt the file.\n\
             Only clear them if you are certain the sessions have crashed.\n\n\
             To clear them, run:\n  csvlock clear {} --force",
            args.path.display()
        )));
    }

    let cleared = locks::clear_control_files(&args.path, config.stale_minutes)?;
    if cleared.is_empty() {
        println!("No control files for {}.", args.path.display());
        return Ok(());
    }

    for info in &cleared {
        println!("Cleared {}", info);
    }
    Ok(())
}
