//! zipseal: password-protected ZIP archives
//!
//! Commands:
//!   pack <files...>     - build an archive (encrypted unless --plain)
//!   unpack <archive>    - extract a plain or secure archive
//!   inspect <archive>   - show archive kind and manifest, no password needed
//!   config show         - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use zipseal_archive::{ArchiveCodec, EntryPolicy, Mode};
use zipseal_core::config::SealConfig;
use zipseal_core::{ArchiveFile, CancelFlag, Hooks, Progress, ProgressFn, SealError, SealResult};
use zipseal_crypto::{PasswordPolicy, Strength};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "zipseal",
    version,
    about = "Password-protected ZIP archives",
    long_about = "zipseal: pack files into ZIP archives, sealing each file with a password"
)]
struct Cli {
    /// Path to zipseal.toml configuration file
    #[arg(long, short = 'c', env = "ZIPSEAL_CONFIG", default_value = "zipseal.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log].level
    #[arg(long, env = "ZIPSEAL_LOG")]
    log: Option<String>,

    /// Log format; overrides [log].format
    #[arg(long, env = "ZIPSEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack files into an archive
    ///
    /// Each file is encrypted separately under the password unless --plain
    /// is given. The password is prompted for twice.
    Pack {
        /// Files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output archive (default: archive_<timestamp>.zip)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Compress only, no encryption
        #[arg(long)]
        plain: bool,
        /// Read the password from this environment variable instead of prompting
        #[arg(long)]
        password_env: Option<String>,
        /// Accept passwords below the configured strength policy
        #[arg(long)]
        allow_weak: bool,
    },

    /// Extract a plain or secure archive
    Unpack {
        /// Archive to extract
        archive: PathBuf,
        /// Destination directory
        #[arg(long, short = 'o', default_value = ".")]
        output: PathBuf,
        /// Read the password from this environment variable instead of prompting
        #[arg(long)]
        password_env: Option<String>,
        /// Extract what can be recovered, reporting missing or corrupt entries
        #[arg(long)]
        skip_failed: bool,
    },

    /// Show archive kind and manifest
    Inspect {
        archive: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SealConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "zipseal starting"
    );

    match cli.command {
        Commands::Pack { files, output, plain, password_env, allow_weak } => {
            cmd_pack(&config, &files, output.as_deref(), plain, password_env.as_deref(), allow_weak)
                .await
        }
        Commands::Unpack { archive, output, password_env, skip_failed } => {
            cmd_unpack(&config, &archive, &output, password_env.as_deref(), skip_failed).await
        }
        Commands::Inspect { archive } => cmd_inspect(&config, &archive).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Password input ────────────────────────────────────────────────────────────

/// Read a password from `env_var` if given, otherwise prompt on the terminal.
///
/// With `confirm`, the prompt is repeated and both entries must match.
fn read_password(env_var: Option<&str>, confirm: bool) -> Result<(SecretString, Option<SecretString>)> {
    if let Some(var) = env_var {
        let value = std::env::var(var)
            .with_context(|| format!("password environment variable {var} is not set"))?;
        return Ok((SecretString::from(value), None));
    }

    let password = rpassword::prompt_password("Password: ").context("reading password")?;
    let again = if confirm {
        let value = rpassword::prompt_password("Confirm password: ")
            .context("reading password confirmation")?;
        Some(SecretString::from(value))
    } else {
        None
    };
    Ok((SecretString::from(password), again))
}

// ── Blocking work with Ctrl-C ─────────────────────────────────────────────────

/// Run codec work off the async runtime. Ctrl-C sets the cancel flag, which
/// the codec checks between files.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelFlag) -> SealResult<T> + Send + 'static,
{
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            flag.cancel();
        }
    });

    let result = tokio::task::spawn_blocking(move || work(&cancel))
        .await
        .context("archive worker panicked")?;
    interrupt.abort();
    Ok(result?)
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn progress_fn(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |p: Progress<'_>| {
        pb.set_length(p.total);
        pb.set_position(p.done);
        pb.set_message(p.name.to_string());
    })
}

// ── `zipseal pack` ────────────────────────────────────────────────────────────

async fn cmd_pack(
    config: &SealConfig,
    paths: &[PathBuf],
    output: Option<&Path>,
    plain: bool,
    password_env: Option<&str>,
    allow_weak: bool,
) -> Result<()> {
    let files = read_inputs(paths).await?;

    let mode = if plain {
        Mode::Plain
    } else {
        let (password, confirm) = read_password(password_env, true)?;
        let policy = if allow_weak {
            PasswordPolicy::permissive()
        } else {
            PasswordPolicy {
                min_length: config.crypto.min_password_length,
                min_score: config.crypto.min_password_score,
            }
        };
        let strength = match policy.check(&password, confirm.as_ref()) {
            Err(SealError::WeakPassword { score, required }) => anyhow::bail!(
                "password is {} (score {score}, need {required}); choose a stronger one or pass \
                 --allow-weak",
                Strength::from_score(score)
            ),
            other => other?,
        };
        if strength < Strength::Fair {
            warn!(%strength, "packing with a weak password");
        }
        Mode::Encrypted(password)
    };

    let output = output.map(Path::to_path_buf).unwrap_or_else(default_archive_name);
    let codec = ArchiveCodec::from_config(config);
    let total_bytes: u64 = files.iter().map(ArchiveFile::size).sum();
    let file_count = files.len();

    println!(
        "Packing {} files ({}) → {}{}",
        file_count,
        fmt_bytes(total_bytes),
        output.display(),
        if plain { " [plain]" } else { "" }
    );

    let pb = make_progress_bar(file_count as u64, "pack");
    let progress = progress_fn(&pb);
    let archive = run_blocking(move |cancel| {
        let hooks = Hooks::default().with_progress(&progress).with_cancel(cancel);
        codec.encode(&files, &mode, hooks)
    })
    .await
    .context("building archive")?;
    pb.finish_with_message("done".to_string());

    tokio::fs::write(&output, &archive)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    println!();
    println!("Archive written:");
    println!("  path:   {}", output.display());
    println!("  files:  {}", file_count);
    println!("  size:   {}", fmt_bytes(archive.len() as u64));
    Ok(())
}

/// Read each input path into an [`ArchiveFile`] named after its file name.
async fn read_inputs(paths: &[PathBuf]) -> Result<Vec<ArchiveFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.is_file() {
            anyhow::bail!("not a file: {}", path.display());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("no file name in {}", path.display()))?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        files.push(ArchiveFile::guessed(name, data));
    }
    Ok(files)
}

fn default_archive_name() -> PathBuf {
    PathBuf::from(format!(
        "archive_{}.zip",
        chrono::Local::now().format("%Y%m%dT%H%M%S")
    ))
}

// ── `zipseal unpack` ──────────────────────────────────────────────────────────

async fn cmd_unpack(
    config: &SealConfig,
    archive_path: &Path,
    dest: &Path,
    password_env: Option<&str>,
    skip_failed: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(archive_path)
        .await
        .with_context(|| format!("reading {}", archive_path.display()))?;

    let mut config = config.clone();
    if skip_failed {
        config.decode.entry_policy = EntryPolicy::Skip;
    }
    let codec = ArchiveCodec::from_config(&config);

    let opened = codec
        .open(&bytes)
        .with_context(|| format!("opening {}", archive_path.display()))?;
    drop(bytes);
    let secure = opened.kind.is_secure();

    println!(
        "Unpacking {} → {}{}",
        archive_path.display(),
        dest.display(),
        if secure { "" } else { " [plain]" }
    );

    let pb = make_progress_bar(0, "unpack");
    let progress = progress_fn(&pb);

    let (files, warnings) = if secure {
        let (password, _) = read_password(password_env, false)?;
        let decoded = run_blocking(move |cancel| {
            let hooks = Hooks::default().with_progress(&progress).with_cancel(cancel);
            codec.decode_opened(opened, &password, hooks)
        })
        .await
        .context("decrypting archive")?;
        (decoded.files, decoded.warnings)
    } else {
        let files = run_blocking(move |cancel| {
            let hooks = Hooks::default().with_progress(&progress).with_cancel(cancel);
            codec.extract_opened(opened, hooks)
        })
        .await
        .context("extracting archive")?;
        (files, Vec::new())
    };
    pb.finish_with_message("done".to_string());

    let written = write_outputs(dest, &files).await?;

    println!();
    println!("Extracted:");
    println!("  files:  {}", files.len());
    println!("  bytes:  {}", fmt_bytes(written));
    println!("  into:   {}", dest.display());
    for warning in &warnings {
        println!("  skipped {}: {}", warning.original_name, warning.error);
    }
    Ok(())
}

/// Write files under `dest`, refusing names that would land outside it.
async fn write_outputs(dest: &Path, files: &[ArchiveFile]) -> Result<u64> {
    tokio::fs::create_dir_all(dest)
        .await
        .with_context(|| format!("creating {}", dest.display()))?;

    let mut written = 0u64;
    for file in files {
        let path = safe_join(dest, &file.name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, &file.data)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        written += file.size();
    }
    Ok(written)
}

fn safe_join(dest: &Path, name: &str) -> Result<PathBuf> {
    let rel = Path::new(name);
    let mut components = rel.components().peekable();
    if components.peek().is_none() || !components.all(|c| matches!(c, Component::Normal(_))) {
        anyhow::bail!("refusing to extract {name:?}: path escapes {}", dest.display());
    }
    Ok(dest.join(rel))
}

// ── `zipseal inspect` ─────────────────────────────────────────────────────────

async fn cmd_inspect(config: &SealConfig, archive_path: &Path) -> Result<()> {
    let bytes = tokio::fs::read(archive_path)
        .await
        .with_context(|| format!("reading {}", archive_path.display()))?;
    let codec = ArchiveCodec::from_config(config);
    let opened = codec
        .open(&bytes)
        .with_context(|| format!("opening {}", archive_path.display()))?;

    println!("{}", archive_path.display());
    match opened.kind.manifest() {
        Some(manifest) => {
            println!("  kind:        secure");
            println!("  algorithm:   {}", manifest.algorithm);
            println!("  created:     {}", manifest.created_at.to_rfc3339());
            println!("  kdf rounds:  {}", manifest.kdf_iterations);
            println!("  files:       {} ({})", manifest.entries.len(), fmt_bytes(manifest.total_size()));
            for entry in &manifest.entries {
                let status = if opened.entries.contains(&entry.stored_name) { "" } else { "  [missing]" };
                println!(
                    "    {:<32} {:>10}  {}{}",
                    entry.original_name,
                    fmt_bytes(entry.size),
                    entry.content_type,
                    status
                );
            }
        }
        None => {
            println!("  kind:        plain");
            println!("  files:       {} ({})", opened.entries.len(), fmt_bytes(opened.entries.total_size()));
            for entry in opened.entries.iter() {
                println!("    {:<32} {:>10}", entry.name, fmt_bytes(entry.data.len() as u64));
            }
        }
    }
    Ok(())
}

// ── `zipseal config show` ─────────────────────────────────────────────────────

fn cmd_config_show(config: &SealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
