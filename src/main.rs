use clap::{Parser, Subcommand};
use simple_thumbs::dispatch::Dispatcher;
use simple_thumbs::imaging::RustBackend;
use simple_thumbs::size::{SizeSpec, TargetBox, parse_size};
use simple_thumbs::{config, output, server, warm};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-thumbs")]
#[command(about = "On-demand image thumbnails with a disk cache")]
#[command(long_about = "\
On-demand image thumbnails with a disk cache

Serves a directory of static files. Requests under the images directory
carry an optional size and get a thumbnail that fits the box exactly,
padded with the background color:

  /images/photo.jpg               default box (128x128)
  /images/photo.jpg?size=200      200x200
  /images/photo.jpg?size=300x200  300x200
  /images/photo.jpg?size=full     the original file

Layout:

  public/                          # web_root
  ├── index.html                   # served as-is
  └── images/                      # images_directory
      ├── photo.jpg
      └── _thumbs/                 # cache_directory (created at startup)
          └── photo_200x200.jpg

Run 'simple-thumbs gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Pre-generate cache entries for every source image
    Warm {
        /// Size to generate (N or NxM); repeatable
        #[arg(long = "size", required = true)]
        sizes: Vec<String>,
    },
    /// Show how a request path would be served, without rendering
    Resolve {
        /// Request path, e.g. /images/photo.jpg
        path: String,
        /// Size token as it would appear in the query string
        #[arg(long)]
        size: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = setup(&cli.config)?;
            tokio::runtime::Runtime::new()?.block_on(server::run(&config))?;
        }
        Command::Warm { sizes } => {
            let config = setup(&cli.config)?;
            let targets = parse_warm_sizes(&sizes, &config.thumbnails)?;
            init_thread_pool(&config.thumbnails);

            let dispatcher = Dispatcher::from_config(&config, RustBackend::new());
            dispatcher.cache().initialize()?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_warm_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = warm::warm(&dispatcher, &targets, Some(tx))?;
            printer.join().map_err(|_| "output thread panicked")?;

            println!("Cache: {}", result.stats);
            if result.failures > 0 {
                return Err(format!("{} thumbnails failed", result.failures).into());
            }
        }
        Command::Resolve { path, size } => {
            let config = setup(&cli.config)?;
            let dispatcher = Dispatcher::from_config(&config, RustBackend::new());
            let decision = dispatcher.classify(&path, size.as_deref())?;
            output::print_resolve_output(&path, size.as_deref(), &decision);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the config file and start logging.
fn setup(path: &Path) -> Result<config::Config, config::ConfigError> {
    let config = config::load_config(path)?;
    init_tracing(&config.logging);
    Ok(config)
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(logging: &config::LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool from `thumbnails.max_parallel`.
fn init_thread_pool(thumbnails: &config::ThumbnailsConfig) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(thumbnails.effective_parallelism())
        .build_global()
        .ok();
}

/// Warm sizes must be explicit boxes within `max_dimension`.
fn parse_warm_sizes(
    tokens: &[String],
    thumbnails: &config::ThumbnailsConfig,
) -> Result<Vec<TargetBox>, Box<dyn std::error::Error>> {
    tokens
        .iter()
        .map(|token| -> Result<TargetBox, Box<dyn std::error::Error>> {
            match parse_size(Some(token), thumbnails.default_size)? {
                SizeSpec::Fit(target) if target.longest_edge() <= thumbnails.max_dimension => {
                    Ok(target)
                }
                SizeSpec::Fit(target) => Err(format!(
                    "size {} exceeds max_dimension {}",
                    target, thumbnails.max_dimension
                )
                .into()),
                SizeSpec::Original => Err("\"full\" has no cache entry to warm".into()),
            }
        })
        .collect()
}
