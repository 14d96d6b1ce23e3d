//! SecretVault - CLI
//!
//! Command-line interface for SVF2 containers.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::EnvFilter;

use secretvault::container::ContainerHeader;
use secretvault::secure_fs::secure_delete_with_limit;
use secretvault::worker::{self, WorkerOptions};
use secretvault::{
    read_header, KeyPair, KeyProvider, MediaMetadata, MediaType, PasswordKeyProvider, PasswordRecord,
    VaultConfig,
};

const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v", "avi", "mkv", "webm", "3gp"];

#[derive(Parser)]
#[command(name = "svf")]
#[command(version = secretvault::VERSION)]
#[command(about = "SecretVault - encrypted media containers")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Password record
    #[arg(short, long, global = true)]
    record: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a password record
    Init {
        /// Replace an existing record
        #[arg(long)]
        force: bool,
    },

    /// Encrypt a photo or video into a container
    Encrypt {
        input: PathBuf,

        /// Output path (defaults to <input>.svf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force video media type
        #[arg(long)]
        video: bool,

        /// Mark as favorite in the sealed metadata
        #[arg(long)]
        favorite: bool,

        /// Do not embed metadata
        #[arg(long)]
        no_metadata: bool,
    },

    /// Decrypt a container
    Decrypt {
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show container header; with --metadata also decrypt the metadata
    Inspect {
        input: PathBuf,

        #[arg(long)]
        metadata: bool,
    },

    /// Re-encrypt containers under a new password
    Rotate {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Overwrite and delete files
    Shred {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SVF_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => VaultConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => match VaultConfig::default_path() {
            Some(path) => VaultConfig::load_or_default(&path)?,
            None => VaultConfig::default(),
        },
    };
    let record_path = match cli.record {
        Some(path) => path,
        None => default_record_path()?,
    };

    match cli.command {
        Commands::Init { force } => {
            if record_path.exists() && !force {
                bail!("{} already exists (use --force to replace)", record_path.display());
            }
            let password = prompt_new_password()?;
            let record = PasswordRecord::create(&password, &config.kdf)?;
            record.save(&record_path)?;
            println!("Password record written to {}", record_path.display());
        }

        Commands::Encrypt {
            input,
            output,
            video,
            favorite,
            no_metadata,
        } => {
            let keys = unlock(&record_path)?;
            let output = output.unwrap_or_else(|| append_extension(&input, "svf"));
            let media_type = if video { MediaType::Video } else { guess_media_type(&input) };
            let metadata = if no_metadata {
                None
            } else {
                let mut meta = metadata_for(&input)?;
                meta.is_favorite = favorite.then_some(true);
                Some(meta)
            };

            let size = fs::metadata(&input)
                .with_context(|| format!("reading {}", input.display()))?
                .len();
            let bar = progress_bar(size);
            let options = worker_options(&config, &bar);

            let summary = worker::encrypt_file(input, media_type, metadata, keys, output.clone(), options).await?;
            bar.finish_and_clear();
            println!(
                "Encrypted {} bytes in {} chunks -> {}",
                summary.plaintext_bytes,
                summary.chunks,
                output.display()
            );
        }

        Commands::Decrypt { input, output } => {
            if output.symlink_metadata().is_ok() {
                bail!("{} already exists", output.display());
            }
            let keys = unlock(&record_path)?;
            let header = read_header(&input)?;
            let bar = progress_bar(header.original_size);
            let mut options = worker_options(&config, &bar);
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                options.temp_dir = Some(parent.to_path_buf());
            }

            let temp = worker::decrypt_to_temporary_file(input, None, keys, options).await?;
            bar.finish_and_clear();
            move_into_place(&temp, &output)?;
            println!("Decrypted -> {}", output.display());
        }

        Commands::Inspect { input, metadata } => {
            let header = read_header(&input)?;
            print_header(&header);
            if metadata {
                let keys = unlock(&record_path)?;
                match worker::read_metadata(input, keys).await? {
                    Some(meta) => println!("{}", serde_json::to_string_pretty(&meta)?),
                    None => println!("No metadata"),
                }
            }
        }

        Commands::Rotate { paths } => {
            let old_record = PasswordRecord::load(&record_path)?;
            let old_password = prompt("Current password: ")?;
            let old_keys = old_record.unlock(&old_password)?;

            let new_password = prompt_new_password()?;
            let new_record = PasswordRecord::create(&new_password, &config.kdf)?;
            let new_keys = new_record.unlock(&new_password)?;

            let options = WorkerOptions {
                temp_dir: config.temp_dir.clone(),
                ..WorkerOptions::default()
            };
            let report = worker::reencrypt_collection(
                paths,
                old_keys,
                new_keys,
                Some(config.import_concurrency),
                options,
            )
            .await;

            for (path, error) in &report.failed {
                eprintln!("  failed: {}: {}", path.display(), error);
            }
            if report.is_complete() {
                new_record.save(&record_path)?;
                println!("Rotated {} containers", report.succeeded_count());
            } else {
                let pending = append_extension(&record_path, "pending");
                new_record.save(&pending)?;
                bail!(
                    "{} of {} containers rotated; new record kept at {}",
                    report.succeeded_count(),
                    report.succeeded_count() + report.failed_count(),
                    pending.display()
                );
            }
        }

        Commands::Shred { paths } => {
            for path in paths {
                let outcome = secure_delete_with_limit(&path, config.secure_delete_max_size)
                    .with_context(|| format!("shredding {}", path.display()))?;
                println!("{}: {:?}", path.display(), outcome);
            }
        }
    }

    Ok(())
}

fn default_record_path() -> Result<PathBuf> {
    VaultConfig::default_path()
        .and_then(|p| p.parent().map(|dir| dir.join("password.json")))
        .ok_or_else(|| anyhow!("no config directory on this platform; pass --record"))
}

fn unlock(record_path: &Path) -> Result<KeyPair> {
    let record = PasswordRecord::load(record_path)
        .with_context(|| format!("loading password record {}", record_path.display()))?;
    let provider = PasswordKeyProvider::new(record, prompt("Password: ")?);
    Ok(provider.unlock()?)
}

fn prompt(label: &str) -> Result<SecretString> {
    let password = rpassword::prompt_password(label).context("reading password")?;
    Ok(SecretString::from(password))
}

fn prompt_new_password() -> Result<SecretString> {
    let first = prompt("New password: ")?;
    let second = prompt("Repeat password: ")?;
    if first.expose_secret() != second.expose_secret() {
        bail!("passwords do not match");
    }
    if first.expose_secret().is_empty() {
        bail!("password must not be empty");
    }
    Ok(first)
}

/// Rename decrypted output into place; the plaintext temp never outlives a failure
fn move_into_place(temp: &Path, output: &Path) -> Result<()> {
    if let Err(e) = fs::rename(temp, output) {
        if let Err(cleanup) = fs::remove_file(temp) {
            tracing::warn!(path = %temp.display(), error = %cleanup, "could not remove decrypted temporary file");
        }
        return Err(e).with_context(|| format!("moving output to {}", output.display()));
    }
    Ok(())
}

fn guess_media_type(path: &Path) -> MediaType {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaType::Video
    } else {
        MediaType::Photo
    }
}

fn metadata_for(path: &Path) -> Result<MediaMetadata> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} has no file name", path.display()))?;
    let stat = fs::metadata(path).with_context(|| format!("reading {}", path.display()))?;
    let created: DateTime<Utc> = stat
        .created()
        .or_else(|_| stat.modified())
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    Ok(MediaMetadata::new(filename, created))
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({eta})") {
        bar.set_style(style);
    }
    bar
}

fn worker_options(config: &VaultConfig, bar: &ProgressBar) -> WorkerOptions {
    let bar = bar.clone();
    WorkerOptions {
        chunk_size: config.chunk_size,
        temp_dir: config.temp_dir.clone(),
        ..WorkerOptions::default()
    }
    .with_progress(move |bytes: u64| bar.set_position(bytes))
}

fn print_header(header: &ContainerHeader) {
    println!("Format:        SVF2 v{}", header.version);
    println!("Media type:    {:?}", header.media_type);
    println!("Original size: {} bytes", header.original_size);
    println!("Chunk size:    {} bytes", header.chunk_size);
    println!("Metadata:      {} bytes", header.metadata_length);
    println!("Header:        {}", hex::encode(header.to_bytes()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_failed_move_removes_plaintext() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("svf-plain");
        fs::write(&temp, b"decrypted").unwrap();

        let result = move_into_place(&temp, &dir.path().join("missing-dir").join("out.jpg"));

        assert!(result.is_err());
        assert!(!temp.exists());
    }

    #[test]
    fn test_move_into_place() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("svf-plain");
        let output = dir.path().join("out.jpg");
        fs::write(&temp, b"decrypted").unwrap();

        move_into_place(&temp, &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"decrypted");
        assert!(!temp.exists());
    }

    #[test]
    fn test_guess_media_type() {
        assert_eq!(guess_media_type(Path::new("clip.MOV")), MediaType::Video);
        assert_eq!(guess_media_type(Path::new("IMG_1.heic")), MediaType::Photo);
        assert_eq!(guess_media_type(Path::new("noext")), MediaType::Photo);
    }
}
