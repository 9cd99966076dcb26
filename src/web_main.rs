//! Web 服务器主程序入口

#[cfg(feature = "web")]
use clap::Parser;
#[cfg(feature = "web")]
use translation_relay::{
    config::{ConfigManager, RelayConfig},
    coordinator::LogNotificationSink,
    env::{self, EnvVar},
    providers::{AssistantRoutingHook, RegistryBuilder},
    store::MemoryContentStore,
    web::{WebConfig, WebServer},
};

/// Translation relay: receives jobs, translates them and delivers signed callbacks.
#[cfg(feature = "web")]
#[derive(Parser, Debug)]
#[command(name = "relay-web")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind address [env: RELAY_WEB_BIND_ADDRESS]
    #[arg(short, long)]
    bind: Option<String>,

    /// Port number [env: RELAY_WEB_PORT]
    #[arg(short, long)]
    port: Option<u16>,

    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Route external assistant identifiers (asst_...) to this provider
    #[arg(long)]
    assistant_provider: Option<String>,

    /// Print environment variable documentation and exit
    #[arg(long)]
    print_env_docs: bool,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "PATH")]
    write_example_config: Option<String>,
}

#[cfg(feature = "web")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_env_docs {
        println!("{}", env::generate_env_docs());
        return Ok(());
    }

    if let Some(path) = &args.write_example_config {
        ConfigManager::generate_example_config(path)?;
        println!("Example configuration written to {path}");
        return Ok(());
    }

    init_tracing();

    let relay = load_config(args.config.as_deref())?;

    let mut web_config = WebConfig::default();
    if let Some(bind) = args.bind {
        web_config.bind_addr = bind;
    }
    if let Some(port) = args.port {
        web_config.port = port;
    }
    web_config.validate()?;

    let mut registry = RegistryBuilder::with_builtin_providers();
    if let Some(target) = args.assistant_provider {
        registry.with_selection_hook(AssistantRoutingHook::new(target)?);
    }

    tracing::info!(
        "使用服务商 {}，回调认证方式 {}",
        relay.provider,
        relay.auth.method
    );

    let server = WebServer::with_parts(
        web_config,
        relay,
        registry,
        std::sync::Arc::new(MemoryContentStore::new()),
        std::sync::Arc::new(LogNotificationSink),
    )?;
    server.start().await?;

    Ok(())
}

#[cfg(feature = "web")]
fn load_config(path: Option<&str>) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let manager = match path {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    Ok(manager.into_config())
}

#[cfg(feature = "web")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let level = env::core::LogLevel::get().unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let no_color = env::core::NoColor::get().unwrap_or(false);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(!no_color)
        .init();
}

#[cfg(not(feature = "web"))]
fn main() {
    eprintln!("Error: Web feature not enabled. Please compile with --features web");
    std::process::exit(1);
}
