//! sbx: sealbox command-line client
//!
//! Commands:
//!   encrypt <file> [-o out]       - seal a local file into a password envelope
//!   decrypt <file> [-o out]       - open an envelope produced by `encrypt`
//!   push <file> [--id] [--encrypt] - upload a file, print its logical + backend id
//!   pull <id> [<local>] [--decrypt] - download by logical or raw backend id
//!   rm <id>                       - delete by logical or raw backend id
//!   ls                            - list objects held by the storage backend
//!   status                        - probe the primary storage backend
//!   config show                   - display the active configuration
//!
//! Logical ids live only as long as the process, so ids printed by `push`
//! are only resolvable within that run. The backend id always works.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use sbx_core::config::SbxConfig;
use sbx_core::UploadOptions;
use sbx_resolver::IdentityResolver;
use sbx_storage::{StorageBackend, S3Credentials};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sbx",
    version,
    about = "sealbox encrypted file client",
    long_about = "sbx: password-encrypt files and store them in a content-addressed backend"
)]
struct Cli {
    /// Path to sealbox.toml configuration file
    #[arg(long, short = 'c', env = "SBX_CONFIG", default_value = "/etc/sealbox/config.toml")]
    config: PathBuf,

    /// Log level / filter directive (overrides config)
    #[arg(long, env = "SBX_LOG")]
    log: Option<String>,

    /// Log format (overrides config)
    #[arg(long, env = "SBX_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a local file with a password
    Encrypt {
        input: PathBuf,
        /// Output path (default: <input>.enc)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Decrypt a file produced by `sbx encrypt`
    Decrypt {
        input: PathBuf,
        /// Output path (default: <input> without .enc)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Upload a local file
    ///
    /// S3 credentials are read from AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY.
    Push {
        local: PathBuf,
        /// Logical id to register (default: random UUID)
        #[arg(long)]
        id: Option<String>,
        /// Content type to record
        #[arg(long)]
        content_type: Option<String>,
        /// Encrypt before uploading
        #[arg(long)]
        encrypt: bool,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Download by logical id or raw backend id
    Pull {
        id: String,
        /// Local destination (default: ./<id>)
        local: Option<PathBuf>,
        /// Decrypt the downloaded envelope
        #[arg(long)]
        decrypt: bool,
        #[command(flatten)]
        password: PasswordArgs,
    },

    /// Delete by logical id or raw backend id
    Rm { id: String },

    /// List object ids held by the storage backend
    Ls {
        /// Emit JSON instead of one id per line
        #[arg(long)]
        json: bool,
    },

    /// Probe the primary storage backend
    Status,

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

#[derive(clap::Args)]
struct PasswordArgs {
    /// Encryption password (prompted for when omitted)
    #[arg(long, env = "SBX_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl std::fmt::Debug for PasswordArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordArgs")
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl PasswordArgs {
    fn resolve(&self, confirm: bool) -> Result<SecretString> {
        if let Some(p) = &self.password {
            return Ok(SecretString::from(p.clone()));
        }
        let first = rpassword::prompt_password("Password: ").context("reading password")?;
        if confirm {
            let second =
                rpassword::prompt_password("Confirm password: ").context("reading password")?;
            if first != second {
                anyhow::bail!("passwords do not match");
            }
        }
        Ok(SecretString::from(first))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SbxConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    init_logging(&cli, &config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sbx starting"
    );

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            password,
        } => cmd_encrypt(&input, output.as_deref(), &password).await,
        Commands::Decrypt {
            input,
            output,
            password,
        } => cmd_decrypt(&input, output.as_deref(), &password).await,
        Commands::Push {
            local,
            id,
            content_type,
            encrypt,
            password,
        } => {
            let options = UploadOptions {
                id,
                content_type,
                encrypted: encrypt,
            };
            cmd_push(&config, &local, options, &password).await
        }
        Commands::Pull {
            id,
            local,
            decrypt,
            password,
        } => cmd_pull(&config, &id, local.as_deref(), decrypt, &password).await,
        Commands::Rm { id } => cmd_rm(&config, &id).await,
        Commands::Ls { json } => cmd_ls(&config, json).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(cli: &Cli, config: &SbxConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = cli.log_format.clone().unwrap_or_else(|| {
        if config.log.format == "json" {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so command output stays pipeable
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

// ── Storage / resolver construction ───────────────────────────────────────────

fn build_resolver(config: &SbxConfig) -> Result<IdentityResolver> {
    let storage = build_storage(config)?;
    Ok(IdentityResolver::new(storage))
}

fn build_storage(config: &SbxConfig) -> Result<Arc<dyn StorageBackend>> {
    let creds = S3Credentials::from_env();
    let storage = sbx_storage::build_storage(&config.storage, creds.as_ref())
        .context("building storage backend")?;
    Ok(Arc::new(storage))
}

// ── Progress helpers ──────────────────────────────────────────────────────────

fn make_spinner(prefix: &str, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ── `sbx encrypt` / `sbx decrypt` ─────────────────────────────────────────────

async fn cmd_encrypt(input: &Path, output: Option<&Path>, password: &PasswordArgs) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| encrypted_output_path(input));
    let password = password.resolve(true)?;

    let pb = make_spinner("encrypt", "deriving key...");
    let written = sbx_crypto::encrypt_file(input, &output, &password)
        .await
        .with_context(|| format!("encrypting {}", input.display()))?;
    pb.finish_with_message("done");

    println!("Encrypted {} → {}", input.display(), output.display());
    println!("  bytes:  {}", fmt_bytes(written));
    Ok(())
}

async fn cmd_decrypt(input: &Path, output: Option<&Path>, password: &PasswordArgs) -> Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| decrypted_output_path(input));
    let password = password.resolve(false)?;

    let pb = make_spinner("decrypt", "deriving key...");
    let result = sbx_crypto::decrypt_file(input, &output, &password).await;
    pb.finish_and_clear();
    let written = result.with_context(|| format!("decrypting {}", input.display()))?;

    println!("Decrypted {} → {}", input.display(), output.display());
    println!("  bytes:  {}", fmt_bytes(written));
    Ok(())
}

/// `notes.txt` → `notes.txt.enc`
fn encrypted_output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".enc");
    PathBuf::from(name)
}

/// `notes.txt.enc` → `notes.txt`, anything else → `<input>.dec`
fn decrypted_output_path(input: &Path) -> PathBuf {
    if input.extension().is_some_and(|ext| ext == "enc") {
        input.with_extension("")
    } else {
        let mut name = input.as_os_str().to_owned();
        name.push(".dec");
        PathBuf::from(name)
    }
}

// ── `sbx push` ────────────────────────────────────────────────────────────────

async fn cmd_push(
    config: &SbxConfig,
    local: &Path,
    options: UploadOptions,
    password: &PasswordArgs,
) -> Result<()> {
    let resolver = build_resolver(config)?;

    println!(
        "Pushing {} → {} (endpoint: {})",
        local.display(),
        config.storage.backend_kind,
        config.storage.endpoint(),
    );

    let id = if options.encrypted {
        let password = password.resolve(true)?;
        let plaintext = tokio::fs::read(local)
            .await
            .with_context(|| format!("reading {}", local.display()))?;

        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| local.display().to_string());

        let pb = make_spinner("push", "encrypting...");
        finish_after(&pb, async {
            let envelope = sbx_crypto::encrypt(&plaintext, &password).context("encrypting")?;
            pb.set_message("uploading...");
            resolver
                .upload_bytes(&name, &envelope, options)
                .await
                .with_context(|| format!("uploading {}", local.display()))
        })
        .await?
    } else {
        resolver
            .upload(local, options)
            .await
            .with_context(|| format!("uploading {}", local.display()))?
    };

    let record = resolver
        .get(&id)
        .await
        .context("uploaded file missing from registry")?;

    println!("  id:         {}", record.logical_id);
    println!("  backend id: {}", record.backend_id);
    println!("  bytes:      {}", fmt_bytes(record.size_bytes));
    println!("  type:       {}", record.content_type);
    println!("  encrypted:  {}", record.encrypted);
    Ok(())
}

// ── `sbx pull` ────────────────────────────────────────────────────────────────

async fn cmd_pull(
    config: &SbxConfig,
    id: &str,
    local: Option<&Path>,
    decrypt: bool,
    password: &PasswordArgs,
) -> Result<()> {
    let resolver = build_resolver(config)?;
    let local_path = local
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(id));

    println!("Pulling {} → {}", id, local_path.display());

    let password = if decrypt {
        Some(password.resolve(false)?)
    } else {
        None
    };
    let fetched = resolver
        .download_bytes(id)
        .await
        .with_context(|| format!("downloading {id}"))?;

    let contents = match password {
        Some(password) => {
            let pb = make_spinner("pull", "decrypting...");
            let result = sbx_crypto::decrypt(&fetched, &password);
            pb.finish_and_clear();
            result.with_context(|| format!("decrypting {id}"))?
        }
        None => fetched,
    };
    write_local(&local_path, &contents).await?;

    println!("  local:  {}", local_path.display());
    println!("  bytes:  {}", fmt_bytes(contents.len() as u64));
    Ok(())
}

// ── `sbx rm` / `sbx ls` ───────────────────────────────────────────────────────

async fn cmd_rm(config: &SbxConfig, id: &str) -> Result<()> {
    let resolver = build_resolver(config)?;
    let removed = resolver
        .delete(id)
        .await
        .with_context(|| format!("deleting {id}"))?;

    if removed {
        println!("Deleted {id}");
    } else {
        println!("{id}: nothing to delete");
    }
    Ok(())
}

async fn cmd_ls(config: &SbxConfig, json: bool) -> Result<()> {
    let storage = build_storage(config)?;
    let ids = storage.list().await.context("listing storage backend")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else {
        for id in &ids {
            println!("{id}");
        }
        eprintln!("{} object(s)", ids.len());
    }
    Ok(())
}

// ── `sbx status` ──────────────────────────────────────────────────────────────

async fn cmd_status(config: &SbxConfig) -> Result<()> {
    let creds = S3Credentials::from_env();
    let primary = sbx_storage::build_primary(&config.storage, creds.as_ref())
        .context("building primary backend")?;

    println!("backend:   {}", config.storage.backend_kind);
    println!("endpoint:  {}", config.storage.endpoint());
    println!("fallback:  {}", config.storage.fallback_dir.display());

    match sbx_storage::check_health(primary.operator()).await {
        Ok(()) => println!("primary:   reachable"),
        Err(e) => println!("primary:   UNREACHABLE ({e}); operations will use the fallback"),
    }
    Ok(())
}

// ── `sbx config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &SbxConfig, path: &Path) -> Result<()> {
    println!("# config file: {}", path.display());
    let rendered = toml::to_string_pretty(config).context("rendering config")?;
    print!("{rendered}");
    Ok(())
}

/// Run `work`, clearing the spinner whether it succeeds or fails.
async fn finish_after<T>(
    pb: &ProgressBar,
    work: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    let result = work.await;
    pb.finish_and_clear();
    result
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Write `bytes` to `path`, creating missing parent directories.
async fn write_local(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_push_flags() {
        let cli = Cli::try_parse_from([
            "sbx", "push", "notes.txt", "--id", "custom", "--encrypt", "--password", "pw1",
        ])
        .unwrap();

        match cli.command {
            Commands::Push {
                local,
                id,
                encrypt,
                password,
                ..
            } => {
                assert_eq!(local, PathBuf::from("notes.txt"));
                assert_eq!(id.as_deref(), Some("custom"));
                assert!(encrypt);
                assert_eq!(password.password.as_deref(), Some("pw1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_log_format() {
        let cli = Cli::try_parse_from(["sbx", "--log-format", "json", "status"]).unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn test_output_paths() {
        assert_eq!(
            encrypted_output_path(Path::new("dir/notes.txt")),
            PathBuf::from("dir/notes.txt.enc")
        );
        assert_eq!(
            decrypted_output_path(Path::new("dir/notes.txt.enc")),
            PathBuf::from("dir/notes.txt")
        );
        assert_eq!(
            decrypted_output_path(Path::new("blob.bin")),
            PathBuf::from("blob.bin.dec")
        );
    }

    #[test]
    fn test_fmt_bytes() {
        assert_eq!(fmt_bytes(54), "54 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[tokio::test]
    async fn test_push_pull_with_memory_backend() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = SbxConfig::default();
        config.storage.backend_kind = "memory".into();
        config.storage.fallback_dir = tmp.path().join("fallback");

        let resolver = build_resolver(&config).unwrap();
        let src = tmp.path().join("in.txt");
        std::fs::write(&src, b"cli round trip").unwrap();

        let id = resolver
            .upload(&src, UploadOptions::default())
            .await
            .unwrap();
        let dst = tmp.path().join("out.txt");
        resolver.download(&id, &dst).await.unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"cli round trip");
    }

    #[tokio::test]
    async fn test_spinner_cleared_on_failure() {
        let pb = ProgressBar::hidden();
        let result: Result<()> = finish_after(&pb, async { anyhow::bail!("upload refused") }).await;
        assert!(result.is_err());
        assert!(pb.is_finished());
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let cli = Cli::try_parse_from(["sbx", "encrypt", "a.txt", "--password", "hunter2"]).unwrap();
        let dbg = format!("{cli:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("hunter2"));
    }

    fn memory_config(tmp: &tempfile::TempDir) -> SbxConfig {
        let mut config = SbxConfig::default();
        config.storage.backend_kind = "memory".into();
        config.storage.fallback_dir = tmp.path().join("fallback");
        config
    }

    #[tokio::test]
    async fn test_pull_creates_missing_parent_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = memory_config(&tmp);
        let no_password = PasswordArgs { password: None };

        // Each run gets a fresh memory primary, so seed the shared fallback
        let fallback = sbx_storage::LocalBackend::new(&config.storage.fallback_dir);
        let id = fallback.upload(b"plain pull").await.unwrap();

        let dst = tmp.path().join("a/b/plain.txt");
        cmd_pull(&config, &id, Some(&dst), false, &no_password)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"plain pull");
    }

    #[tokio::test]
    async fn test_pull_decrypt_creates_missing_parent_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = memory_config(&tmp);
        let password = PasswordArgs {
            password: Some("pw1".into()),
        };

        let envelope = sbx_crypto::encrypt(b"sealed pull", &SecretString::from("pw1")).unwrap();
        let fallback = sbx_storage::LocalBackend::new(&config.storage.fallback_dir);
        let id = fallback.upload(&envelope).await.unwrap();

        let dst = tmp.path().join("x/y/sealed.txt");
        cmd_pull(&config, &id, Some(&dst), true, &password)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"sealed pull");
    }
}
