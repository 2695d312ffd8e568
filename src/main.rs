use clap::{Parser, Subcommand};
use simple_drop::imaging::RustBackend;
use simple_drop::reconcile::Reconciler;
use simple_drop::store::MetadataStore;
use simple_drop::{config, gallery, output, server};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "simple-drop")]
#[command(about = "File upload server with folders, thumbnails and a self-healing index")]
#[command(long_about = "\
File upload server with folders, thumbnails and a self-healing index

Clients upload files into named folders. Images get a JPEG preview, and the
gallery lists everything newest first. The upload directory is the source of
truth: the JSON index is rebuilt from it on every listing.

Storage layout:

  uploads/
  ├── Trip 2024/
  │   ├── photo.jpg                # First upload keeps its name
  │   └── photo_1.jpg              # Later uploads get _1, _2, ...
  └── docs/
      └── notes.txt                # Non-images are listed without a preview
  thumbnails/
  ├── Trip 2024_photo.jpg          # <folder>_<filename>, always JPEG
  └── Trip 2024_photo_1.jpg
  photo_metadata.json              # Index; backed up and rebuilt if corrupt

HTTP:
  GET  /                     index page
  POST /upload               multipart: file, foldername, description
  GET  /gallery              {files, stats}
  GET  /thumbnail/<name>     preview bytes

Run 'simple-drop gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml; relative storage paths resolve here
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Override the listen address from config.toml
        #[arg(long)]
        bind: Option<String>,
    },
    /// Reconcile the index with the upload directory and print a summary
    Scan,
    /// Print the gallery listing
    List,
    /// Validate config.toml and show the resolved settings
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Serve { bind } => {
            let mut server_config = load_config(&cli.config)?;
            if let Some(bind) = bind {
                server_config.server.bind = bind;
            }
            init_thread_pool(&server_config.processing);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(server_config))?;
        }
        Command::Scan => {
            let server_config = load_config(&cli.config)?;
            init_thread_pool(&server_config.processing);
            let store = MetadataStore::new(&server_config.paths.metadata_file);
            let backend = RustBackend::new();
            println!(
                "==> Scanning {}",
                server_config.paths.upload_root.display()
            );
            let result = Reconciler::new(&server_config, &store, &backend).reconcile();
            output::print_scan_output(&result);
        }
        Command::List => {
            let server_config = load_config(&cli.config)?;
            init_thread_pool(&server_config.processing);
            let store = MetadataStore::new(&server_config.paths.metadata_file);
            let backend = RustBackend::new();
            let listing = gallery::list(&Reconciler::new(&server_config, &store, &backend));
            output::print_listing(&listing);
        }
        Command::Check => {
            println!("==> Checking {}", cli.config.join(config::CONFIG_FILENAME).display());
            let server_config = load_config(&cli.config)?;
            output::print_config_check(&server_config);
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config.toml from `dir` and anchor relative paths there.
fn load_config(dir: &std::path::Path) -> Result<config::ServerConfig, config::ConfigError> {
    Ok(config::load_config(dir)?.anchored_at(dir))
}

/// Log to stderr so command output on stdout stays clean. `RUST_LOG`
/// overrides the default `info` level.
fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
