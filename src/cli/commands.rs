use crate::config::{RuntimeConfig, ServiceConfig, UpstreamCredentials};
use crate::frontend::{FrontEnd, FrontEndKind, ProcessConfig, TunnelConfig};
use crate::metrics::TrafficMetrics;
use crate::server::{HttpServer, TrafficService};
use crate::error::RollgateError;
use crate::upstream::{
    build_http_client, ArgoCdClient, PooledController, RolloutController, RolloutsClient,
    UpstreamPool, DEFAULT_UPSTREAM_WORKERS,
};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Command-line interface for rollgate
#[derive(Parser)]
#[command(name = "rollgate", version)]
#[command(about = "Forward traffic-weight instructions to Argo Rollouts", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the configured front-end, then serve /manage-traffic
    Serve(ServeArgs),
    /// List the applications known to Argo CD
    Applications(ApplicationsArgs),
}

/// Settings for `rollgate serve`.
///
/// Required values default to empty so that a missing setting is reported by
/// [`ServeArgs::to_config`] with the variable name, not by clap.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address and port to bind the server to
    #[arg(long, env = "ROLLGATE_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// Argo Rollouts API base URL
    #[arg(long, env = "ARGOROLLOUTS_URL", default_value = "")]
    pub rollouts_url: String,

    /// Bearer token for the Argo Rollouts API
    #[arg(long, env = "ARGOROLLOUTS_TOKEN", default_value = "", hide_env_values = true)]
    pub rollouts_token: String,

    /// Front-end: tunnel, reverse-proxy or cert-managed-proxy
    #[arg(long, env = "PROXY_OPTION", default_value = "")]
    pub proxy_option: String,

    /// Deadline for each call to Argo Rollouts, in seconds
    #[arg(long, env = "ROLLGATE_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Threads running Argo Rollouts calls; more concurrent updates than this queue
    #[arg(long, env = "ROLLGATE_UPSTREAM_WORKERS", default_value_t = DEFAULT_UPSTREAM_WORKERS)]
    pub upstream_workers: usize,

    /// Tunnel agent binary
    #[arg(long, env = "ROLLGATE_NGROK_BIN", default_value = "ngrok")]
    pub ngrok_bin: String,

    /// Tunnel agent local API
    #[arg(long, env = "ROLLGATE_NGROK_API", default_value = "http://127.0.0.1:4040")]
    pub ngrok_api: String,

    /// How long to wait for the tunnel to report its public URL, in seconds
    #[arg(long, env = "ROLLGATE_TUNNEL_STARTUP_SECS", default_value_t = 15)]
    pub tunnel_startup_secs: u64,

    /// Reverse proxy binary
    #[arg(long, env = "ROLLGATE_NGINX_BIN", default_value = "nginx")]
    pub nginx_bin: String,

    /// Reverse proxy configuration file
    #[arg(long, env = "ROLLGATE_NGINX_CONF", default_value = "/etc/nginx/nginx.conf")]
    pub nginx_conf: String,

    /// Certificate renewal binary
    #[arg(long, env = "ROLLGATE_STEP_BIN", default_value = "step")]
    pub step_bin: String,
}

impl ServeArgs {
    /// Resolve and check the service configuration. The front-end option is
    /// checked first, then credentials.
    pub fn to_config(&self) -> crate::error::Result<ServiceConfig> {
        let front_end = match FrontEndKind::parse(&self.proxy_option)? {
            FrontEndKind::Tunnel => {
                let mut cfg =
                    TunnelConfig::ngrok(&self.ngrok_bin, &self.ngrok_api, self.addr.port());
                cfg.startup_timeout = Duration::from_secs(self.tunnel_startup_secs);
                FrontEnd::Tunnel(cfg)
            }
            FrontEndKind::ReverseProxy => {
                FrontEnd::ReverseProxy(ProcessConfig::nginx(&self.nginx_bin, &self.nginx_conf))
            }
            FrontEndKind::CertManagedProxy => {
                FrontEnd::CertManagedProxy(ProcessConfig::step_renew(&self.step_bin))
            }
        };
        let config = ServiceConfig {
            listen_addr: self.addr,
            rollouts: UpstreamCredentials::new(&self.rollouts_url, &self.rollouts_token),
            upstream_timeout: Duration::from_secs(self.upstream_timeout_secs),
            upstream_workers: self.upstream_workers,
            front_end,
            runtime: RuntimeConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Settings for `rollgate applications`.
#[derive(Args, Debug, Clone)]
pub struct ApplicationsArgs {
    /// Argo CD API base URL
    #[arg(long, env = "ARGOCD_URL", default_value = "")]
    pub argocd_url: String,

    /// Bearer token for the Argo CD API
    #[arg(long, env = "ARGOCD_TOKEN", default_value = "", hide_env_values = true)]
    pub argocd_token: String,

    /// Request deadline, in seconds
    #[arg(long, env = "ROLLGATE_UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl ApplicationsArgs {
    /// Request deadline; zero is rejected like `serve`'s upstream timeout.
    pub fn timeout(&self) -> crate::error::Result<Duration> {
        if self.timeout_secs == 0 {
            return Err(RollgateError::config("timeout must be greater than zero"));
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }
}

/// Execute the parsed command.
///
/// # Errors
///
/// Any startup failure: unknown front-end option, missing credentials, a
/// front-end process that failed, or a listener that could not be bound.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => {
            let config = args.to_config()?;
            serve(config)
        }
        Commands::Applications(args) => {
            let timeout = args.timeout()?;
            let client = ArgoCdClient::new(
                build_http_client(timeout)?,
                UpstreamCredentials::new(args.argocd_url, args.argocd_token),
                timeout,
            );
            for app in client.list_applications()? {
                println!("{}", app.name());
            }
            Ok(())
        }
    }
}

/// Start the front-end, serve until SIGINT/SIGTERM, then tear down in order:
/// server first, front-end second.
pub fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    config.runtime.apply();

    let client: Arc<dyn RolloutController> = Arc::new(RolloutsClient::from_config(&config)?);
    let pool = Arc::new(UpstreamPool::new(config.upstream_workers)?);
    let controller: Arc<dyn RolloutController> = Arc::new(PooledController::new(client, pool));
    // Registered before anything is started so an early signal still shuts
    // down cleanly.
    let shutdown = ShutdownSignal::register()?;

    let front_end = config
        .front_end
        .launch()
        .with_context(|| format!("failed to start {} front-end", config.front_end.kind()))?;
    if let Some(url) = front_end.public_url() {
        info!(public_url = %url, "Service reachable through tunnel");
    }

    let service = TrafficService::new(controller, Arc::new(TrafficMetrics::new()));
    let handle = HttpServer(service)
        .start(config.listen_addr)
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(
        addr = %handle.addr(),
        upstream_timeout_ms = config.upstream_timeout.as_millis() as u64,
        upstream_workers = config.upstream_workers,
        "Starting server"
    );

    shutdown.wait(handle)?;
    drop(front_end);
    info!("Shutdown complete");
    Ok(())
}

#[cfg(unix)]
struct ShutdownSignal(signal_hook::iterator::Signals);

#[cfg(unix)]
impl ShutdownSignal {
    fn register() -> anyhow::Result<Self> {
        use signal_hook::consts::{SIGINT, SIGTERM};

        let signals = signal_hook::iterator::Signals::new([SIGINT, SIGTERM])
            .context("failed to register signal handlers")?;
        Ok(ShutdownSignal(signals))
    }

    /// Block until SIGINT or SIGTERM, then stop the server.
    fn wait(mut self, handle: crate::server::ServerHandle) -> anyhow::Result<()> {
        if let Some(signal) = self.0.forever().next() {
            info!(signal, "Shutdown signal received");
        }
        handle.stop();
        Ok(())
    }
}

#[cfg(not(unix))]
struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    fn register() -> anyhow::Result<Self> {
        Ok(ShutdownSignal)
    }

    fn wait(self, handle: crate::server::ServerHandle) -> anyhow::Result<()> {
        handle
            .join()
            .map_err(|e| anyhow::anyhow!("server failed: {e:?}"))
    }
}
