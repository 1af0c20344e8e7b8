use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use portprobe_rs::config::ScanConfig;
use portprobe_rs::observer::ScanObserver;
use portprobe_rs::report::{self, ScanReport, DEFAULT_RESULTS_FILE};
use portprobe_rs::scanner::{ScanCoordinator, ScanOutcome};
use portprobe_rs::server;
use portprobe_rs::services::UNKNOWN_SERVICE;
use portprobe_rs::types::{PortResult, ProtocolSelection, ScanRequest};

/// portprobe-rs: concurrent TCP/UDP port prober with live progress.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portprobe-rs",
    version,
    about = "Concurrent TCP/UDP port prober with live progress.",
    long_about = None
)]
struct Cli {
    /// Host name or IP address to scan.
    host: Option<String>,

    /// First port of the range.
    #[arg(short = 's', long = "start-port", default_value_t = 1)]
    start_port: u16,

    /// Last port of the range (inclusive).
    #[arg(short = 'e', long = "end-port", default_value_t = 1024)]
    end_port: u16,

    /// Max concurrent probes.
    #[arg(short = 't', long = "threads", default_value_t = 10)]
    threads: usize,

    /// Protocols to probe.
    #[arg(short = 'p', long, value_enum, default_value_t = ProtocolSelection::Tcp)]
    protocol: ProtocolSelection,

    /// Append open ports to this file when the scan completes.
    #[arg(short = 'o', long, default_value = DEFAULT_RESULTS_FILE)]
    output: PathBuf,

    /// Also write a pretty JSON report to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Host lookup timeout in milliseconds.
    #[arg(long = "resolve-timeout-ms", default_value_t = 5000)]
    resolve_timeout_ms: u64,

    /// TCP connect timeout in milliseconds.
    #[arg(long = "tcp-timeout-ms", default_value_t = 500)]
    tcp_timeout_ms: u64,

    /// UDP receive timeout in milliseconds.
    #[arg(long = "udp-timeout-ms", default_value_t = 1000)]
    udp_timeout_ms: u64,

    /// Seconds to wait for in-flight probes on shutdown before aborting them.
    #[arg(long = "grace-secs", default_value_t = 60)]
    grace_secs: u64,

    /// Serve the HTTP scan API instead of running a single scan.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Bind address for --serve-ui.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            resolve_timeout: Duration::from_millis(self.resolve_timeout_ms),
            tcp_connect_timeout: Duration::from_millis(self.tcp_timeout_ms),
            udp_receive_timeout: Duration::from_millis(self.udp_timeout_ms),
            shutdown_grace: Duration::from_secs(self.grace_secs),
        }
    }
}

/// Prints progress on a single carriage-return line and open ports as they appear.
struct ConsoleObserver;

impl ScanObserver for ConsoleObserver {
    fn on_progress(&mut self, port: u16, percentage: f64) {
        print!("\rScanning port {port}... progress: {percentage:.2}%");
        let _ = std::io::stdout().flush();
    }

    fn on_result(&mut self, result: &PortResult) {
        println!(
            "\nPort {} ({}) {} - {}",
            result.port, result.protocol, result.state, result.service
        );
    }

    fn on_complete(&mut self, results: &[PortResult]) {
        println!("\nScan complete.");
        print_results(results);
    }

    fn on_error(&mut self, message: &str) {
        eprintln!("\nerror: {message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.scan_config();

    if cli.serve_ui {
        println!("Scan API at http://{}/api (Ctrl+C to stop)", cli.bind);
        tokio::select! {
            res = server::spawn_server(&cli.bind, config) => res?,
            _ = tokio::signal::ctrl_c() => {}
        }
        return Ok(());
    }

    let Some(host) = cli.host.clone() else {
        Cli::command().print_help()?;
        println!();
        println!("Example: portprobe-rs scanme.example.org -s 1 -e 1024 -t 10");
        return Ok(());
    };

    let request = ScanRequest::new(host, cli.start_port, cli.end_port)
        .with_protocol(cli.protocol)
        .with_concurrency(cli.threads);
    request.validate()?;

    println!(
        "Scanning {} ports {}-{} ({}) with {} concurrent probes...",
        request.host, request.start_port, request.end_port, request.protocol, request.concurrency
    );

    let coordinator = ScanCoordinator::new(config);
    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let started = Instant::now();
    match coordinator.scan(&request, ConsoleObserver).await? {
        ScanOutcome::Completed(results) => {
            report::append_results(&cli.output, &results)?;
            println!("Results appended to {}", cli.output.display());
            if let Some(path) = cli.json.as_deref() {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                report::write_json(path, &ScanReport::new(&request, elapsed_ms, results))?;
                println!("Wrote JSON report to {}", path.display());
            }
        }
        ScanOutcome::Cancelled => {
            println!("\nScan cancelled.");
        }
    }

    Ok(())
}

fn print_results(results: &[PortResult]) {
    if results.is_empty() {
        println!("No open ports found.");
        return;
    }

    println!("\nResults:");
    println!("{}", "-".repeat(50));
    for r in results {
        if r.service == UNKNOWN_SERVICE {
            println!(
                "Port {} ({}) {}: unknown (may be a custom or uncommon service, worth a closer look)",
                r.port, r.protocol, r.state
            );
        } else {
            println!("Port {} ({}) {}: {}", r.port, r.protocol, r.state, r.service);
        }
    }
    println!("{}", "-".repeat(50));
}
