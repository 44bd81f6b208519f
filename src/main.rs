//! Stratum Ping Entry Point
//!
//! Pings a mining pool at the stratum protocol layer and prints per-probe
//! times followed by loss and latency statistics.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use stratum_ping::config::ConfigError;
use stratum_ping::{ProbeConfig, ProtocolVariant, Session};

#[derive(Debug, Parser)]
#[command(name = "stratum-ping", version, about = "Measure stratum pool round-trip latency")]
struct Args {
    /// Pool host name or address
    host: Option<String>,

    /// Pool port
    port: Option<u16>,

    /// Properties file with base settings; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of probes to send
    #[arg(short = 'c', long)]
    count: Option<usize>,

    /// Resolve and connect over IPv6
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Connect with TLS
    #[arg(long)]
    tls: bool,

    /// Verify the pool's TLS certificate instead of accepting any
    #[arg(long)]
    verify_cert: bool,

    /// Handshake to send: stratum1 (login) or stratum2 (subscribe)
    #[arg(short = 'p', long = "proto")]
    protocol: Option<ProtocolVariant>,

    /// Login for stratum1
    #[arg(short = 'u', long)]
    login: Option<String>,

    /// Password for stratum1
    #[arg(long = "pass")]
    password: Option<String>,

    /// Delay after each probe in milliseconds
    #[arg(short = 'i', long)]
    interval_ms: Option<u64>,

    /// Connect, write and read timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<ProbeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::load(path)?,
            None => ProbeConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(count) = self.count {
            config.count = count;
        }
        config.ipv6 |= self.ipv6;
        config.tls |= self.tls;
        if self.verify_cert {
            config.skip_certificate_verification = false;
        }
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(login) = self.login {
            config.credentials.login = login;
        }
        if let Some(password) = self.password {
            config.credentials.password = password;
        }
        if let Some(ms) = self.interval_ms {
            config.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.timeout_ms {
            let timeout = Duration::from_millis(ms);
            config.connect_timeout = timeout;
            config.write_timeout = timeout;
            config.read_timeout = timeout;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("stratum-ping: {}", e);
            return ExitCode::from(2);
        }
    };
    config.log_config();

    let mut session = match Session::new(&config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("stratum-ping: {}", e);
            return ExitCode::from(2);
        }
    };

    let addr = match session.resolve().await {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("stratum-ping: {}", e);
            return ExitCode::from(2);
        }
    };

    let tls = if config.tls { " TLS" } else { "" };
    let creds = if config.protocol.uses_credentials() {
        format!(
            " with credentials: {}:{}",
            config.credentials.login, config.credentials.password
        )
    } else {
        String::new()
    };
    println!("PING stratum {} ({}){} port {}{}", config.host, addr, tls, config.port, creds);

    match session.run(|record| println!("{}", record)).await {
        Ok(report) => {
            println!("\n--- {} ping statistics ---", config.host);
            print!("{}", report);
            if report.received > 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("stratum-ping: {}", e);
            ExitCode::from(2)
        }
    }
}
