//! mdstore CLI - Command line interface for document storage.
//!
//! This tool drives whichever storage adapter the config file selects:
//! authorize, store images, and save/list/fetch documents and stylesheets.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use mdstore_common::{Collection, ImageBlob, RecordName};
use mdstore_storage::{create_default_registry, Session, StorageAdapter};

use crate::config::{default_config_path, default_session_path, CliConfig};

#[derive(Parser)]
#[command(name = "mdstore")]
#[command(about = "mdstore - Document and stylesheet storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Config file selecting the storage adapter.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session file holding the bearer credential.
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CollectionArg {
    Documents,
    Stylesheets,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Documents => Collection::Documents,
            CollectionArg::Stylesheets => Collection::Stylesheets,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Open the provider's authorization page.
    OpenAuth,

    /// Exchange an authorization code for a credential.
    Auth {
        /// Code shown by the provider after authorization.
        #[arg(short, long)]
        code: String,
    },

    /// Store an image and print its displayable reference.
    AddImage {
        /// Image file to store.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Save a document or stylesheet, replacing any existing one.
    Save {
        #[arg(value_enum)]
        collection: CollectionArg,

        /// Record name.
        #[arg(short, long)]
        title: String,

        /// File whose contents are saved.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List documents or stylesheets; both when no collection is given.
    List {
        #[arg(value_enum)]
        collection: Option<CollectionArg>,
    },

    /// Print or export a document or stylesheet.
    Get {
        #[arg(value_enum)]
        collection: CollectionArg,

        /// Record name.
        #[arg(short, long)]
        title: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for command output.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let session_path = cli.session.unwrap_or_else(default_session_path);

    let config = CliConfig::load(&config_path)?;
    let adapter = create_default_registry()
        .resolve(&config.provider, config.provider_config.clone())
        .with_context(|| format!("Failed to create '{}' adapter", config.provider))?;
    info!("Using {} adapter", adapter.name());

    let mut session = Session::load(&session_path)
        .await
        .context("Failed to load session")?;

    match cli.command {
        Commands::OpenAuth => cmd_open_auth(adapter.as_ref()).await,

        Commands::Auth { code } => {
            cmd_auth(adapter.as_ref(), &mut session, &code, &session_path).await
        }

        Commands::AddImage { file } => cmd_add_image(adapter.as_ref(), &session, &file).await,

        Commands::Save {
            collection,
            title,
            file,
        } => cmd_save(adapter.as_ref(), &session, collection.into(), &title, &file).await,

        Commands::List { collection } => match collection {
            Some(collection) => cmd_list(adapter.as_ref(), &session, collection.into()).await,
            None => {
                for collection in Collection::ALL {
                    println!("{}:", collection);
                    cmd_list(adapter.as_ref(), &session, collection).await?;
                }
                Ok(())
            }
        },

        Commands::Get {
            collection,
            title,
            out,
        } => cmd_get(adapter.as_ref(), &session, collection.into(), &title, out.as_deref()).await,
    }
}

/// Open the authorization page, or print its URL if no browser opens.
async fn cmd_open_auth(adapter: &dyn StorageAdapter) -> Result<()> {
    let opened = adapter.open_auth().await;
    println!("{}", auth_instructions(opened, adapter.authorization_url())?);
    println!("  mdstore auth --code <CODE>");
    Ok(())
}

/// First lines shown after `open-auth`.
///
/// A browser failure is only fatal when there is no URL to fall back on.
fn auth_instructions(opened: mdstore_common::Result<()>, url: Option<String>) -> Result<String> {
    match (opened, url) {
        (Ok(()), _) => Ok("Authorize the app in your browser, then run:".to_string()),
        (Err(e), Some(url)) => {
            warn!("Could not open a browser: {}", e);
            Ok(format!(
                "Open this URL to authorize the app:\n  {}\nthen run:",
                url
            ))
        }
        (Err(e), None) => Err(anyhow::Error::new(e).context("Failed to open authorization page")),
    }
}

/// Exchange a code and persist the session.
async fn cmd_auth(
    adapter: &dyn StorageAdapter,
    session: &mut Session,
    code: &str,
    session_path: &Path,
) -> Result<()> {
    adapter
        .auth(session, code)
        .await
        .context("Authorization failed")?;

    if session.is_authenticated() {
        session
            .save(session_path)
            .await
            .context("Failed to save session")?;
        println!("Authorized. Session saved to {}", session_path.display());
    } else {
        println!("The {} adapter needs no authorization.", adapter.name());
    }
    Ok(())
}

/// Store an image.
async fn cmd_add_image(adapter: &dyn StorageAdapter, session: &Session, file: &Path) -> Result<()> {
    info!("Adding image {}", file.display());

    let data = tokio::fs::read(file)
        .await
        .context("Failed to read image file")?;
    let image = ImageBlob::sniff(data);

    let reference = adapter
        .add_image(session, image)
        .await
        .context("Failed to add image")?;

    println!("{}", reference);
    Ok(())
}

/// Save a record from a file.
async fn cmd_save(
    adapter: &dyn StorageAdapter,
    session: &Session,
    collection: Collection,
    title: &str,
    file: &Path,
) -> Result<()> {
    let name = RecordName::new(title).context("Invalid title")?;
    let content = tokio::fs::read_to_string(file)
        .await
        .context("Failed to read source file")?;

    adapter
        .save_record(session, collection, &name, &content)
        .await
        .with_context(|| format!("Failed to save {}/{}", collection, name))?;

    println!("Saved {}/{} ({} bytes)", collection, name, content.len());
    Ok(())
}

/// List a collection.
async fn cmd_list(
    adapter: &dyn StorageAdapter,
    session: &Session,
    collection: Collection,
) -> Result<()> {
    let mut records = adapter
        .list_records(session, collection)
        .await
        .with_context(|| format!("Failed to list {}", collection))?;

    if records.is_empty() {
        println!("No {} stored.", collection);
        return Ok(());
    }

    records.sort_by(|a, b| a.name.cmp(&b.name));
    for record in records {
        println!(
            "  {}  {}",
            record.datetime.format("%Y-%m-%d %H:%M:%S"),
            record.name
        );
    }
    Ok(())
}

/// Print or export a record.
async fn cmd_get(
    adapter: &dyn StorageAdapter,
    session: &Session,
    collection: Collection,
    title: &str,
    out: Option<&Path>,
) -> Result<()> {
    let name = RecordName::new(title).context("Invalid title")?;
    let record = adapter
        .get_record(session, collection, &name)
        .await
        .with_context(|| format!("Failed to get {}/{}", collection, name))?;

    match out {
        Some(path) => {
            tokio::fs::write(path, &record.text)
                .await
                .context("Failed to write output file")?;
            println!("Wrote {}/{} to {}", collection, record.name, path.display());
        }
        None => print!("{}", record.text),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdstore_common::Error;

    #[test]
    fn test_auth_instructions_after_browser_opened() {
        let text = auth_instructions(Ok(()), Some("https://example.com/auth".into())).unwrap();
        assert!(text.contains("in your browser"));
        assert!(!text.contains("https://example.com/auth"));
    }

    #[test]
    fn test_auth_instructions_print_url_without_browser() {
        let no_browser = Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "xdg-open not found",
        )));
        let text = auth_instructions(no_browser, Some("https://example.com/auth".into())).unwrap();
        assert!(text.contains("https://example.com/auth"));
    }

    #[test]
    fn test_auth_instructions_fail_without_url() {
        let failed = Err(Error::Network("down".to_string()));
        let err = auth_instructions(failed, None).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to open authorization page"));
    }

    #[test]
    fn test_list_without_collection_parses() {
        let cli = Cli::try_parse_from(["mdstore", "list"]).unwrap();
        assert!(matches!(cli.command, Commands::List { collection: None }));

        let cli = Cli::try_parse_from(["mdstore", "list", "stylesheets"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                collection: Some(CollectionArg::Stylesheets)
            }
        ));
    }
}
