//! depwatch command-line tool.
//!
//! Runs the dependency conflict cascade over the files about to be
//! committed, explains what it finds and asks whether to go ahead. Also
//! generates and validates `depwatch.toml`.

mod git;
mod render;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use depwatch_core::config::{DepwatchConfig, DEFAULT_CONFIG_FILE};
use depwatch_core::errors::ConfigError;
use depwatch_core::{
    advise, fallback_advice, ChangeSet, ConflictCascade, ConflictKind, PackageManager,
    SystemRunner,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Pre-commit dependency conflict detection for npm, pnpm and yarn.
#[derive(Parser, Debug)]
#[command(
    name = "depwatch",
    version,
    about = "Catch dependency conflicts before they are committed"
)]
struct Cli {
    /// Project directory containing package.json.
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    /// Path to the TOML configuration file [default: <project-root>/depwatch.toml].
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level filter (overrides `[general] log_level`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the pending change set for dependency conflicts.
    Check {
        /// Include unstaged and untracked changes, not just the index.
        #[arg(long)]
        all_changes: bool,

        /// Check these paths instead of asking git.
        #[arg(long, num_args = 1.., conflicts_with = "all_changes")]
        files: Vec<String>,

        /// Print a JSON report on stdout and never prompt.
        #[arg(long)]
        json: bool,

        /// Skip the advisory step.
        #[arg(long)]
        no_advice: bool,

        /// Proceed without asking when a conflict is found.
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the built-in advice for a conflict kind.
    Advice {
        /// Conflict kind, e.g. version_conflict.
        kind: String,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path [default: <project-root>/depwatch.toml].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file.
    Validate,
}

struct CheckArgs {
    all_changes: bool,
    files: Vec<String>,
    json: bool,
    no_advice: bool,
    yes: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    // Read once: the file's log level is needed before logging starts.
    let loaded = cli.load_config(&config_path);
    let level = cli
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|c| c.general.log_level.clone()))
        .unwrap_or_else(|| "warn".to_string());
    init_tracing(&level);

    match run(cli, &config_path, loaded).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) => PathBuf::from(expand_tilde(path)),
            None => self.project_root.join(DEFAULT_CONFIG_FILE),
        }
    }

    /// An explicit `--config` must exist; the project default may be absent.
    fn load_config(&self, path: &Path) -> Result<DepwatchConfig, ConfigError> {
        if self.config.is_some() {
            DepwatchConfig::load_from_file(path)
        } else {
            DepwatchConfig::load_or_default(path)
        }
    }
}

/// `init` writes next to the project unless told otherwise.
fn init_path(project_root: &Path, output: Option<PathBuf>) -> PathBuf {
    output.unwrap_or_else(|| project_root.join(DEFAULT_CONFIG_FILE))
}

async fn run(
    cli: Cli,
    config_path: &Path,
    loaded: Result<DepwatchConfig, ConfigError>,
) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { output } => {
            let output = init_path(&cli.project_root, output);
            cmd_init(&output).map(|()| ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let explicit = cli.config.is_some();
            cmd_validate(config_path, &cli.project_root, explicit).map(|()| ExitCode::SUCCESS)
        }
        Commands::Advice { kind } => cmd_advice(&kind).map(|()| ExitCode::SUCCESS),
        Commands::Check {
            all_changes,
            files,
            json,
            no_advice,
            yes,
        } => {
            let config = resolve_config(loaded)?;
            let args = CheckArgs {
                all_changes,
                files,
                json,
                no_advice,
                yes,
            };
            cmd_check(&cli.project_root, &config, args).await
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn resolve_config(loaded: Result<DepwatchConfig, ConfigError>) -> Result<DepwatchConfig> {
    let mut config = loaded.context("failed to load configuration file")?;
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_check(project_root: &Path, config: &DepwatchConfig, args: CheckArgs) -> Result<ExitCode> {
    let changes = if args.files.is_empty() {
        git::changed_paths(project_root, args.all_changes)?
    } else {
        ChangeSet::new(args.files)
    };
    debug!(
        paths = changes.paths().len(),
        manifests = ?changes.manifest_paths(),
        "change set built"
    );

    // Prompts read from the controlling terminal, not stdin.
    let attended = console::Term::stderr().is_term();
    let spinner = (attended && !args.json).then(|| style::spinner("Checking dependencies..."));

    let cascade = ConflictCascade::new(
        project_root,
        SystemRunner::new(config.probes.timeout()),
        config.probes.clone(),
    );
    let conflict = cascade.detect(&changes).await;

    let advisory = match &conflict {
        Some(record) if !args.no_advice => {
            if let Some(spinner) = &spinner {
                spinner.set_message("Preparing advice...");
            }
            Some(advise(record, &config.advisory).await)
        }
        _ => None,
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let has_conflict = conflict.is_some();
    if args.json {
        let report = render::json_report(conflict.as_ref(), advisory.as_ref());
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize report")?
        );
    } else {
        match &conflict {
            None => println!("{}", style::success("No dependency conflicts detected")),
            Some(record) => {
                println!("{}", render::conflict_report(record));
                if let Some(advice) = &advisory {
                    println!();
                    println!("{}", render::advisory_report(advice));
                }
                println!();
            }
        }
    }

    match verdict(has_conflict, args.yes, args.json, attended) {
        Verdict::Clean => Ok(ExitCode::SUCCESS),
        Verdict::Proceed => {
            if !args.json {
                println!("{}", style::warn("Proceeding despite dependency conflicts (--yes)"));
            }
            Ok(ExitCode::SUCCESS)
        }
        Verdict::Block => {
            if !args.json {
                eprintln!(
                    "{}",
                    style::error("Commit blocked: no terminal to confirm. Re-run with --yes to proceed.")
                );
            }
            Ok(ExitCode::FAILURE)
        }
        Verdict::Ask => {
            let proceed = Confirm::new()
                .with_prompt("Proceed with commit anyway?")
                .default(false)
                .interact()
                .context("failed to read confirmation")?;

            if proceed {
                println!("{}", style::warn("Proceeding despite dependency conflicts"));
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{}", style::error("Commit aborted"));
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Outcome of a check before any prompt is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Clean,
    Proceed,
    Ask,
    Block,
}

/// `attended` is whether a user can answer on the terminal; `--json`
/// never prompts.
fn verdict(has_conflict: bool, yes: bool, json: bool, attended: bool) -> Verdict {
    if !has_conflict {
        Verdict::Clean
    } else if yes {
        Verdict::Proceed
    } else if json || !attended {
        Verdict::Block
    } else {
        Verdict::Ask
    }
}

fn cmd_advice(kind: &str) -> Result<()> {
    let kind: ConflictKind = kind.parse().map_err(|e: String| {
        let known: Vec<&str> = ConflictKind::ALL.iter().map(|k| k.as_str()).collect();
        anyhow::anyhow!("{} (expected one of: {})", e, known.join(", "))
    })?;

    println!("{} {}", style::header(kind.title()), style::kind_tag(kind));
    println!();
    println!("{}", render::advisory_report(&fallback_advice(kind)));
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# depwatch configuration
# Every key is optional; the values below are the defaults.

[general]
log_level = "warn"

[probes]
# Disable individual checks. They run in this order and stop at the first hit.
tree = true
dry_run = true
manifest = true
dedup = true
# Seconds before a package manager command is killed.
timeout_secs = 120
# Dedup only runs when this directory exists.
cache_dir = "node_modules"
# Force a package manager instead of detecting it from lockfiles.
# manager = "pnpm"

[advisory]
enabled = true
provider = "anthropic"
# model = "claude-3-5-haiku-latest"
# The API key is read from this environment variable.
# api_key_env = "ANTHROPIC_API_KEY"
# base_url = "https://api.anthropic.com"
max_tokens = 500
timeout_secs = 10
max_problems = 5
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set ANTHROPIC_API_KEY (or OPENAI_API_KEY) for model-written advice");
    println!(
        "  2. Validate with: depwatch validate --config {}",
        output.display()
    );
    println!("  3. Add `depwatch check` to .git/hooks/pre-commit");

    Ok(())
}

fn cmd_validate(config_path: &Path, project_root: &Path, explicit: bool) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config = if explicit || config_path.exists() {
        let config =
            DepwatchConfig::load_from_file(config_path).context("failed to load configuration")?;
        println!("  [OK] TOML structure is valid");
        config
    } else {
        println!("  [OK] No configuration file; defaults apply");
        DepwatchConfig::default()
    };

    // Resolve env vars (non-fatal warnings)
    let _ = config.resolve_env_vars();
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All values are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let manager = match config.probes.manager {
        Some(m) => format!("{} (configured)", m),
        None => format!("{} (detected)", PackageManager::detect(project_root)),
    };
    let enabled: Vec<&str> = [
        ("tree", config.probes.tree),
        ("dry_run", config.probes.dry_run),
        ("manifest", config.probes.manifest),
        ("dedup", config.probes.dedup),
    ]
    .into_iter()
    .filter_map(|(name, on)| on.then_some(name))
    .collect();

    println!();
    println!("Configuration summary:");
    println!("  Package manager : {}", manager);
    println!(
        "  Probes          : {}",
        if enabled.is_empty() {
            "none".to_string()
        } else {
            enabled.join(", ")
        }
    );
    println!("  Probe timeout   : {}s", config.probes.timeout_secs);
    println!("  Cache directory : {}", config.probes.cache_dir);
    if config.advisory.enabled {
        println!(
            "  Advisory        : {} / {}",
            config.advisory.provider,
            config.advisory.model_name()
        );
        println!(
            "  API key         : {}",
            if config.advisory.api_key.is_some() {
                "set".to_string()
            } else {
                format!("NOT SET (${}, static advice will be used)", config.advisory.api_key_env_name())
            }
        );
    } else {
        println!("  Advisory        : disabled (static advice)");
    }
    println!();
    println!("Configuration is valid.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_check_flags() {
        let cli = Cli::try_parse_from([
            "depwatch",
            "--project-root",
            "web",
            "check",
            "--files",
            "package.json",
            "yarn.lock",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.project_root, PathBuf::from("web"));
        assert_eq!(cli.config_path(), PathBuf::from("web").join("depwatch.toml"));
        match cli.command {
            Commands::Check { files, json, yes, .. } => {
                assert_eq!(files, vec!["package.json", "yarn.lock"]);
                assert!(json);
                assert!(!yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_files_conflicts_with_all_changes() {
        let result = Cli::try_parse_from([
            "depwatch",
            "check",
            "--all-changes",
            "--files",
            "package.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verdict_without_conflict() {
        assert_eq!(verdict(false, false, false, false), Verdict::Clean);
        assert_eq!(verdict(false, false, true, true), Verdict::Clean);
    }

    #[test]
    fn test_verdict_asks_on_attended_terminal() {
        // stdin may be /dev/null inside a git hook; only the terminal matters.
        assert_eq!(verdict(true, false, false, true), Verdict::Ask);
    }

    #[test]
    fn test_verdict_blocks_when_unattended_or_json() {
        assert_eq!(verdict(true, false, false, false), Verdict::Block);
        assert_eq!(verdict(true, false, true, true), Verdict::Block);
    }

    #[test]
    fn test_verdict_yes_proceeds() {
        assert_eq!(verdict(true, true, false, false), Verdict::Proceed);
        assert_eq!(verdict(true, true, true, true), Verdict::Proceed);
    }

    #[test]
    fn test_init_defaults_to_project_root() {
        let cli = Cli::try_parse_from(["depwatch", "--project-root", "web", "init"]).unwrap();
        match cli.command {
            Commands::Init { output } => {
                assert_eq!(
                    init_path(&cli.project_root, output),
                    PathBuf::from("web").join("depwatch.toml")
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::try_parse_from(["depwatch", "init", "-o", "custom.toml"]).unwrap();
        match cli.command {
            Commands::Init { output } => {
                assert_eq!(init_path(&cli.project_root, output), PathBuf::from("custom.toml"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo.toml");
        let cli = Cli::try_parse_from([
            "depwatch",
            "--config",
            missing.to_str().unwrap(),
            "validate",
        ])
        .unwrap();
        let path = cli.config_path();
        assert!(matches!(cli.load_config(&path), Err(ConfigError::FileNotFound(_))));
        assert!(cmd_validate(&path, dir.path(), true).is_err());
    }

    #[test]
    fn test_project_config_may_be_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "depwatch",
            "--project-root",
            dir.path().to_str().unwrap(),
            "validate",
        ])
        .unwrap();
        let path = cli.config_path();
        let config = cli.load_config(&path).unwrap();
        assert_eq!(config.probes.cache_dir, "node_modules");
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depwatch.toml");
        cmd_init(&path).unwrap();

        let written = DepwatchConfig::load_from_file(&path).unwrap();
        assert!(written.validate().is_ok());
        assert_eq!(written.probes.cache_dir, "node_modules");

        assert!(cmd_init(&path).is_err());
    }

    #[test]
    fn test_validate_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depwatch.toml");
        assert!(cmd_validate(&path, dir.path(), false).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depwatch.toml");
        std::fs::write(&path, "[probes]\ntimeout_secs = 0\n").unwrap();
        assert!(cmd_validate(&path, dir.path(), false).is_err());
    }

    #[test]
    fn test_advice_rejects_unknown_kind() {
        assert!(cmd_advice("version_conflict").is_ok());
        let err = cmd_advice("bogus").unwrap_err().to_string();
        assert!(err.contains("duplicate_packages"));
    }
}
