use clap::{Parser, Subcommand};
use std::sync::Arc;
use textsurf::browser::ChromeLauncher;
use textsurf::core::{Config, DriverLauncher};
use textsurf::{AppState, ContentFetcher, ModuleRegistry, SessionManager};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Browser web service: page content extraction and QR-code logins
#[derive(Debug, Parser)]
#[command(name = "textsurf", version)]
struct Cli {
    /// Port to listen on (a leading ':' is accepted)
    #[arg(short, long, env = "TEXTSURF_PORT", default_value = "8080", global = true)]
    port: String,

    /// Run browsers without a window
    #[arg(short = 'H', long, env = "TEXTSURF_HEADLESS", global = true)]
    headless: bool,

    /// Verbose logging
    #[arg(short, long, env = "TEXTSURF_DEBUG", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP service (default)
    Serve,
    /// Print version information
    Version,
    /// Check that a browser can be launched and load a page
    Test,
}

fn parse_port(raw: &str) -> anyhow::Result<u16> {
    let trimmed = raw.trim_start_matches(':');
    trimmed
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid port '{}': {}", raw, e))
}

impl Cli {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::default();
        config.server.port = parse_port(&self.port)?;
        config.server.debug = self.debug;
        config.browser.headless = self.headless;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = cli.config()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Version => {
            println!("textsurf v{}", env!("CARGO_PKG_VERSION"));
            println!("Browser-backed content extraction and QR login service");
            Ok(())
        }
        Command::Test => test_browser(config).await,
        Command::Serve => serve(config).await,
    }
}

async fn test_browser(config: Config) -> anyhow::Result<()> {
    info!("Testing browser connection...");
    let launcher = ChromeLauncher::new(config.browser.clone());
    let driver = launcher.launch(true).await?;

    let page = driver.open("https://httpbin.org/get").await?;
    page.wait_stable().await?;
    page.close().await?;
    driver.close().await?;

    info!("Browser connection test successful");
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let launcher: Arc<dyn DriverLauncher> = Arc::new(ChromeLauncher::new(config.browser.clone()));

    let fetch_driver = launcher.launch(config.browser.headless).await?;
    info!(
        "Browser initialized (headless: {})",
        config.browser.headless
    );
    let fetcher = Arc::new(ContentFetcher::new(
        Arc::from(fetch_driver),
        config.fetch.clone(),
    ));

    let modules = Arc::new(ModuleRegistry::with_default_modules());
    info!("Login modules: {}", modules.list().join(", "));

    let sessions = Arc::new(SessionManager::new(launcher, config.session.clone()));
    let shutdown = CancellationToken::new();
    let sweeper = sessions.spawn_sweeper(shutdown.clone());

    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown requested");
        ctrl_c_token.cancel();
    });

    let port = config.server.port;
    info!("Headless mode: {}", config.browser.headless);
    info!("Debug mode: {}", config.server.debug);
    info!("GET http://localhost:{}/fetch/text?url=https://example.com", port);
    info!(
        "GET http://localhost:{}/fetch/html?url=https://example.com&css_path=.content",
        port
    );
    info!("POST http://localhost:{}/modules/baidu/sessions", port);

    let state = AppState::new(sessions.clone(), modules, fetcher.clone(), config);
    let served = textsurf::api::serve(state, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Session sweeper ended abnormally: {}", e);
    }
    sessions.shutdown().await;
    if let Err(e) = fetcher.driver().close().await {
        warn!("Failed to close browser: {}", e);
    }
    info!("Browser closed");

    served?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_accepts_colon_prefix() {
        assert_eq!(parse_port(":8080").unwrap(), 8080);
        assert_eq!(parse_port("9000").unwrap(), 9000);
        assert!(parse_port("http").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["textsurf"]);
        let config = cli.config().unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(!config.browser.headless);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["textsurf", "-H", "-d", "-p", ":9090", "serve"]);
        let config = cli.config().unwrap();
        assert_eq!(config.server.port, 9090);
        assert!(config.browser.headless);
        assert!(config.server.debug);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }
}
