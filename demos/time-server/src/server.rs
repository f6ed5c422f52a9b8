//! Time Service Server
//!
//! Hosts the time service class and stays alive while clients hold
//! references to it.
//!
//! USAGE:
//!   time-server [OPTIONS]
//!
//! EXAMPLES:
//!   time-server                          # Single-use, one client, exits once it lets go
//!   time-server --mode multi             # Multi-use, runs until Ctrl+C
//!   time-server --mode multi --clients 8 --hold-ms 500

use std::sync::Arc;
use std::time::Duration;
use bytes::Bytes;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};
use comserver::{
    ActivationRequest, InProcessRegistry, RegistrationMode, SecurityParams, ServerConfig,
    ServerLifecycleController,
};
use time_server::{opnum, time_service_dispatcher, ITIME_SERVICE_IID, TIME_SERVICE_CLSID};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Exit when the last client reference is released
    Single,
    /// Keep serving until stopped
    Multi,
}

#[derive(Parser, Debug)]
#[command(name = "time-server")]
#[command(version)]
#[command(about = "Local COM server returning the server's time and process name")]
struct Args {
    /// Registration mode
    #[arg(long, value_enum, default_value_t = Mode::Single)]
    mode: Mode,

    /// Number of simulated in-process clients [default: 1 single, 2 multi]
    #[arg(long)]
    clients: Option<usize>,

    /// How long each client keeps its reference
    #[arg(long, default_value_t = 250)]
    hold_ms: u64,

    /// Maintenance tick period in seconds (0 disables it)
    #[arg(long, default_value_t = 5)]
    tick_secs: u64,

    /// Stop if no client activates within this many seconds
    #[arg(long)]
    idle_timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

impl Args {
    /// Client count for the selected mode
    ///
    /// A single-use registration serves exactly one activation.
    fn clients(&self) -> Result<usize, clap::Error> {
        match (self.mode, self.clients) {
            (Mode::Single, Some(n)) if n > 1 => Err(Args::command().error(
                ErrorKind::ArgumentConflict,
                format!("--mode single serves one activation; got --clients {}", n),
            )),
            (_, Some(n)) => Ok(n),
            (Mode::Single, None) => Ok(1),
            (Mode::Multi, None) => Ok(2),
        }
    }

    fn config(&self) -> ServerConfig {
        let mut builder = ServerConfig::builder()
            .mode(match self.mode {
                Mode::Single => RegistrationMode::SingleUse,
                Mode::Multi => RegistrationMode::MultipleUse,
            })
            .security(SecurityParams::default());
        builder = match self.tick_secs {
            0 => builder.no_maintenance(),
            secs => builder.maintenance_interval(Duration::from_secs(secs)),
        };
        if let Some(secs) = self.idle_timeout_secs {
            builder = builder.idle_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// Activate, call GetDateTime, hold the reference, then let go
async fn run_client(registry: Arc<InProcessRegistry>, client_id: usize, hold: Duration) {
    let request = ActivationRequest::new(TIME_SERVICE_CLSID, ITIME_SERVICE_IID);
    let object = match registry.activate(&request) {
        Ok(object) => object,
        Err(e) => {
            warn!(client_id, error = %e, hresult = %format!("0x{:08x}", e.hresult()), "activation failed");
            return;
        }
    };

    let prefix = Bytes::from(format!("client {}", client_id));
    match object.invoke(opnum::GET_DATE_TIME, prefix).await {
        Ok(reply) => println!("{}", String::from_utf8_lossy(&reply)),
        Err(e) => warn!(client_id, error = %e, "GetDateTime failed"),
    }

    tokio::time::sleep(hold).await;
    info!(client_id, "client releasing reference");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let clients = args.clients().unwrap_or_else(|e| e.exit());

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.config();

    println!("========================================================");
    println!("         Time Service Local Server");
    println!("========================================================");
    println!("  CLSID:     {}", TIME_SERVICE_CLSID);
    println!("  IID:       {}", ITIME_SERVICE_IID);
    println!("  Mode:      {:?}", config.mode);
    println!("  Clients:   {}", clients);
    println!("========================================================");
    if config.mode == RegistrationMode::MultipleUse {
        println!("  Press Ctrl+C to stop");
        println!("========================================================");
    }
    println!();

    let registry = Arc::new(InProcessRegistry::new());
    let dispatcher = Arc::new(time_service_dispatcher());
    let mut server = ServerLifecycleController::new(registry.clone(), dispatcher, config);
    server.start()?;

    let hold = Duration::from_millis(args.hold_ms);
    for client_id in 0..clients {
        tokio::spawn(run_client(registry.clone(), client_id, hold));
    }

    let outcome = server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!(?outcome, "server exiting");
    Ok(())
}
