use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peer_relay::client::{
    CallSession, CallState, LocalAction, LocalMedia, WebRtcPeer, WsRelayClient,
};
use peer_relay::config::{
    IceConfig, PeerConfig, RelayConfig, DEFAULT_NAMESPACE, DEFAULT_PORT, DEFAULT_WS_PATH,
};
use peer_relay::state::AppState;
use peer_relay::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// peer-relay command line arguments
#[derive(Parser, Debug)]
#[command(name = "peer-relay")]
#[command(version, about = "WebRTC signaling relay and headless call peer", long_about = None)]
struct CliArgs {
    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the signaling relay server
    Serve(ServeArgs),
    /// Join a relay namespace as a headless call peer
    Peer(PeerArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address
    #[arg(short = 'a', long, value_name = "ADDRESS", default_value = "0.0.0.0")]
    address: String,

    /// HTTP port
    #[arg(short = 'p', long, env = "PORT", value_name = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// WebSocket mount path
    #[arg(long, value_name = "SEGMENT", default_value = DEFAULT_WS_PATH)]
    path: String,

    /// Signaling namespace
    #[arg(long, value_name = "NAME", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Seconds between WebSocket pings
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    heartbeat_secs: u64,
}

#[derive(Args, Debug)]
struct PeerArgs {
    /// Relay namespace URL
    #[arg(short = 'u', long, value_name = "URL")]
    url: Option<String>,

    /// Place the call as soon as the relay acknowledges the connection
    #[arg(long, conflicts_with = "auto_answer")]
    call: bool,

    /// Answer incoming calls automatically
    #[arg(long)]
    auto_answer: bool,

    /// STUN server URL (repeatable)
    #[arg(long = "stun", value_name = "URL")]
    stun_servers: Vec<String>,

    /// Start without local media (startup fails)
    #[arg(long)]
    no_media: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose, args.log_json);

    tracing::info!("Starting peer-relay v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Serve(serve) => run_relay(serve).await,
        Command::Peer(peer) => run_peer(peer).await,
    }
}

async fn run_relay(args: ServeArgs) -> anyhow::Result<()> {
    let config = RelayConfig {
        bind_address: args.address,
        port: args.port,
        ws_path: args.path,
        namespace: args.namespace,
        heartbeat_secs: args.heartbeat_secs,
    };
    config.validate()?;
    let addr = config.socket_addr()?;

    // Create shutdown channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let state = AppState::new(config, shutdown_tx.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("App listening on port {}", addr.port());
    tracing::info!("url http://localhost:{}", addr.port());

    // Setup graceful shutdown
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install CTRL+C handler: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    web::serve(listener, state).await?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn run_peer(args: PeerArgs) -> anyhow::Result<()> {
    let defaults = PeerConfig::default();
    let config = PeerConfig {
        relay_url: args.url.unwrap_or(defaults.relay_url),
        ice: IceConfig {
            stun_servers: args.stun_servers,
        },
        place_call: args.call,
        auto_answer: args.auto_answer,
        media_enabled: !args.no_media,
    };
    config.validate()?;

    let (relay, inbound) = WsRelayClient::connect(&config.relay_url).await?;
    let negotiator = WebRtcPeer::new(&config.ice).await?;
    let mut media = LocalMedia::new(config.media_enabled);
    let session = CallSession::start(&mut media, negotiator, relay).await?;

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let mut snapshots = session.subscribe();

    // Automatic actions, driven by the observed call state
    {
        let commands_tx = commands_tx.clone();
        let place_call = config.place_call;
        let auto_answer = config.auto_answer;
        tokio::spawn(async move {
            let mut called = false;
            while snapshots.changed().await.is_ok() {
                let snapshot = snapshots.borrow_and_update().clone();
                println!("{}", snapshot.status);
                if place_call && !called && snapshot.session_id.is_some() {
                    called = true;
                    let _ = commands_tx.send(LocalAction::Call);
                }
                if auto_answer && snapshot.state == CallState::AnswerPending {
                    let _ = commands_tx.send(LocalAction::Answer);
                }
            }
        });
    }

    // Manual actions: type "call" or "answer"
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.parse::<LocalAction>() {
                Ok(action) => {
                    if commands_tx.send(action).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
    });

    println!("Make a call");
    session.run(inbound, commands_rx).await?;
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8, json: bool) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    // Build filter string based on effective level
    let filter = match effective_level {
        LogLevel::Error => "peer_relay=error,tower_http=error",
        LogLevel::Warn => "peer_relay=warn,tower_http=warn",
        LogLevel::Info => "peer_relay=info,tower_http=info",
        LogLevel::Verbose => "peer_relay=debug,tower_http=info",
        LogLevel::Debug => "peer_relay=debug,tower_http=debug,webrtc=info",
        LogLevel::Trace => "peer_relay=trace,tower_http=debug,webrtc=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let (plain_layer, json_layer) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(plain_layer)
        .with(json_layer)
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
