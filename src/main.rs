//! Command-line front end for the patch engine.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use cilpatch::{
    patch::TargetSignature,
    pipeline::{self, PatchOptions},
    swap::FilePatchState,
};

/// File name of the module the engine targets.
const TARGET_MODULE_NAME: &str = "Microsoft.CodeAnalysis.CSharp.dll";

/// cilpatch - reversible accessibility patch for a managed compiler module
#[derive(Debug, Parser)]
#[command(name = "cilpatch", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Patch the module so the compiler ignores internal accessibility.
    Enable {
        /// Directory containing the target module.
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        directory: PathBuf,

        /// Explicit path to the target module (overrides --directory).
        #[arg(short, long, value_name = "FILE")]
        path: Option<PathBuf>,

        /// Flag value to store, as hex (0x400000) or decimal.
        #[arg(short, long, value_parser = parse_flag, default_value = "0x400000")]
        flag: u32,
    },

    /// Restore the pristine module from its backup.
    Disable {
        /// Directory containing the target module.
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        directory: PathBuf,

        /// Explicit path to the target module (overrides --directory).
        #[arg(short, long, value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Patch every target module found under an installation tree.
    EnableAll {
        /// Root directory to walk.
        #[arg(value_name = "ROOT")]
        root: PathBuf,

        /// Flag value to store, as hex (0x400000) or decimal.
        #[arg(short, long, value_parser = parse_flag, default_value = "0x400000")]
        flag: u32,
    },

    /// Restore every target module found under an installation tree.
    DisableAll {
        /// Root directory to walk.
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },

    /// Report the swap protocol state of a target module.
    Status {
        /// Directory containing the target module.
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        directory: PathBuf,

        /// Explicit path to the target module (overrides --directory).
        #[arg(short, long, value_name = "FILE")]
        path: Option<PathBuf>,
    },
}

fn parse_flag(value: &str) -> Result<u32, String> {
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    parsed.map_err(|_| format!("'{value}' is not a 32-bit flag value"))
}

fn target_path(directory: &Path, path: Option<&Path>) -> PathBuf {
    match path {
        Some(explicit) => explicit.to_path_buf(),
        None => directory.join(TARGET_MODULE_NAME),
    }
}

/// Every target module file under `root`, in walk order.
fn discover(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name() == TARGET_MODULE_NAME)
        .map(|entry| entry.into_path())
        .collect()
}

#[derive(Debug, Serialize)]
struct FileOutcome {
    file: PathBuf,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchOutput {
    operation: &'static str,
    outcomes: Vec<FileOutcome>,
    succeeded: usize,
    failed: usize,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    file: PathBuf,
    #[serde(flatten)]
    state: FilePatchState,
    summary: &'static str,
}

fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> anyhow::Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
    } else {
        display_fn(data);
    }
    Ok(())
}

fn run_batch(
    operation: &'static str,
    root: &Path,
    opts: &GlobalOptions,
    run: impl Fn(&Path) -> cilpatch::Result<()> + Sync,
) -> anyhow::Result<()> {
    let files = discover(root);
    if files.is_empty() {
        anyhow::bail!(
            "no {} found under {}",
            TARGET_MODULE_NAME,
            root.display()
        );
    }

    // Each file's pipeline owns its module exclusively; files fan out, and
    // one file's failure never stops the rest.
    let outcomes: Vec<FileOutcome> = files
        .par_iter()
        .map(|file| match run(file.as_path()) {
            Ok(()) => FileOutcome {
                file: file.clone(),
                ok: true,
                error: None,
            },
            Err(error) => {
                log::error!("{}: {}", file.display(), error);
                FileOutcome {
                    file: file.clone(),
                    ok: false,
                    error: Some(error.to_string()),
                }
            }
        })
        .collect();

    let succeeded = outcomes.iter().filter(|outcome| outcome.ok).count();
    let failed = outcomes.len() - succeeded;
    let output = BatchOutput {
        operation,
        outcomes,
        succeeded,
        failed,
    };

    print_output(&output, opts, |output| {
        for outcome in &output.outcomes {
            match &outcome.error {
                None => println!("{} : {}", output.operation, outcome.file.display()),
                Some(error) => println!("failed : {} : {}", outcome.file.display(), error),
            }
        }
        println!(
            "{} done : {} succeeded, {} failed",
            output.operation, output.succeeded, output.failed
        );
    })?;

    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed", succeeded + failed);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Show cilpatch info+ on stderr unless --json; --verbose enables debug;
    // RUST_LOG overrides.
    if !cli.global.json {
        let level = if cli.global.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::new()
            .filter_module("cilpatch", level)
            .parse_default_env()
            .target(env_logger::Target::Stderr)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .init();
    }

    match &cli.command {
        Command::Enable {
            directory,
            path,
            flag,
        } => {
            let file = target_path(directory, path.as_deref());
            let options = PatchOptions {
                flag: *flag,
                signature: TargetSignature::default(),
                search_dirs: Vec::new(),
            };
            pipeline::enable(&file, &options)?;
            println!("Enable done : {}", file.display());
            Ok(())
        }
        Command::Disable { directory, path } => {
            let file = target_path(directory, path.as_deref());
            pipeline::disable(&file)?;
            println!("Disable done : {}", file.display());
            Ok(())
        }
        Command::EnableAll { root, flag } => {
            let options = PatchOptions {
                flag: *flag,
                signature: TargetSignature::default(),
                search_dirs: Vec::new(),
            };
            run_batch("enable", root, &cli.global, |file| {
                pipeline::enable(file, &options)
            })
        }
        Command::DisableAll { root } => {
            run_batch("disable", root, &cli.global, pipeline::disable)
        }
        Command::Status { directory, path } => {
            let file = target_path(directory, path.as_deref());
            let state = FilePatchState::inspect(&file);
            let output = StatusOutput {
                file: file.clone(),
                state,
                summary: state.describe(),
            };
            print_output(&output, &cli.global, |output| {
                println!("{} : {}", output.file.display(), output.summary);
                if output.state.staged {
                    println!("note : stale staged output present");
                }
            })
        }
    }
}
