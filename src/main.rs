use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use msfcli::{Attributes, ChannelEvent, Search, SearchConfig, SearchEvent, Service, Target};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Multiscreen Client - Command line interface for screen service channels
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the description of a service
    Info {
        /// Service address: host, host:port or full URI
        #[arg(value_name = "SERVICE")]
        service: String,
    },

    /// Probe the local /24 network for services
    Search {
        /// Any address of the network to scan
        #[arg(value_name = "ADDRESS")]
        address: Ipv4Addr,

        /// Per-probe timeout in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },

    /// Connect to a channel and print its events
    Listen {
        /// Service address: host, host:port or full URI
        #[arg(value_name = "SERVICE")]
        service: String,

        /// Channel URI
        #[arg(value_name = "CHANNEL")]
        channel: String,

        /// Client attribute as key=value (repeatable)
        #[arg(short, long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, Value)>,

        /// Connect over wss
        #[arg(long)]
        secure: bool,

        /// Heartbeat timeout in milliseconds, 0 to disable
        #[arg(long, default_value_t = 0)]
        heartbeat_ms: u64,
    },

    /// Connect to a channel, publish one event and disconnect
    Publish {
        /// Service address: host, host:port or full URI
        #[arg(value_name = "SERVICE")]
        service: String,

        /// Channel URI
        #[arg(value_name = "CHANNEL")]
        channel: String,

        /// Event name
        event: String,

        /// Event data, parsed as JSON when possible
        #[arg(default_value = "null")]
        data: String,

        /// Recipient: broadcast, all, host or a client id
        #[arg(long, default_value = "broadcast")]
        to: String,

        /// Connect over wss
        #[arg(long)]
        secure: bool,
    },

    /// Launch an application and print its events
    Launch {
        /// Service address: host, host:port or full URI
        #[arg(value_name = "SERVICE")]
        service: String,

        /// Installed application id or web application URL
        #[arg(value_name = "APP")]
        app: String,

        /// Channel URI
        #[arg(value_name = "CHANNEL")]
        channel: String,

        /// Leave the application running on exit
        #[arg(long)]
        keep_running: bool,
    },

    /// Ask the device to install an application
    Install {
        /// Service address: host, host:port or full URI
        #[arg(value_name = "SERVICE")]
        service: String,

        /// Installed application id
        #[arg(value_name = "APP")]
        app: String,
    },
}

fn parse_attribute(input: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {}", input))?;
    if key.is_empty() {
        return Err("attribute key must not be empty".to_string());
    }
    Ok((key.to_string(), parse_data(value)))
}

fn parse_data(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}

fn print_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::Connect(me) => println!("connected as {}", me.id()),
        ChannelEvent::Disconnect(_) => println!("disconnected"),
        ChannelEvent::ClientConnect(client) => println!("+ {}", client.id()),
        ChannelEvent::ClientDisconnect(client) => println!("- {}", client.id()),
        ChannelEvent::Ready => println!("ready"),
        ChannelEvent::Error(reason) => println!("error: {}", reason),
        ChannelEvent::Message {
            event,
            data,
            from,
            payload,
        } => {
            let from = from.as_ref().map(|c| c.id()).unwrap_or("?");
            match payload {
                Some(payload) => {
                    println!("{} <{}>: {} [{} bytes]", event, from, data, payload.len())
                }
                None => println!("{} <{}>: {}", event, from, data),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Configure logging; RUST_LOG overrides the verbosity flag
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Initialize the logging subscriber, forwarding `log` records from the library
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to set tracing subscriber: {}", e))?;

    match cli.command {
        Some(Commands::Info { service }) => {
            let service = Service::fetch(&service)
                .await
                .context("Failed to fetch service description")?;
            println!("{}", serde_json::to_string_pretty(&service)?);
        }

        Some(Commands::Search {
            address,
            timeout_ms,
        }) => {
            let search = Search::new(SearchConfig {
                probe_timeout: Duration::from_millis(timeout_ms),
                ..SearchConfig::default()
            });
            let mut events = search.subscribe();
            let printer = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        SearchEvent::Started => tracing::info!("Search started"),
                        SearchEvent::Found(service) => println!("{}", service),
                        SearchEvent::Stopped(count) => {
                            tracing::info!("Search finished, {} service(s) found", count);
                            break;
                        }
                    }
                }
            });

            search.scan_subnet(address).await?;
            let _ = printer.await;
        }

        Some(Commands::Listen {
            service,
            channel,
            attributes,
            secure,
            heartbeat_ms,
        }) => {
            let service = Service::fetch(&service).await?;
            let channel = service
                .channel_builder(&channel)?
                .secure(secure)
                .connection_timeout(Duration::from_millis(heartbeat_ms))
                .build()?;
            let mut events = channel.subscribe();

            let attributes: Attributes = attributes.into_iter().collect();
            channel.connect(attributes).await?;
            tracing::info!("Listening on {}, press Ctrl+C to disconnect", channel.uri());

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => {
                            print_event(&event);
                            if matches!(event, ChannelEvent::Disconnect(_)) {
                                return Ok(());
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Dropped {} events", n);
                        }
                        Err(_) => break,
                    },
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received interrupt signal, disconnecting...");
                        break;
                    }
                }
            }

            channel.disconnect().await?;
        }

        Some(Commands::Publish {
            service,
            channel,
            event,
            data,
            to,
            secure,
        }) => {
            let service = Service::fetch(&service).await?;
            let channel = service.channel_builder(&channel)?.secure(secure).build()?;
            channel.connect(Attributes::new()).await?;

            channel.publish(&event, parse_data(&data), Target::from(to.as_str()), None)?;
            tracing::info!("Published {}", event);

            channel.disconnect().await?;
        }

        Some(Commands::Launch {
            service,
            app,
            channel,
            keep_running,
        }) => {
            let service = Service::fetch(&service).await?;
            let application = service.application(&app, &channel)?;
            let mut events = application.subscribe();

            application
                .connect(Attributes::new())
                .await
                .with_context(|| format!("Failed to launch {}", app))?;
            tracing::info!("Launched {}, press Ctrl+C to exit", app);

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => {
                            print_event(&event);
                            if matches!(event, ChannelEvent::Disconnect(_)) {
                                return Ok(());
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            application.disconnect(!keep_running).await?;
        }

        Some(Commands::Install { service, app }) => {
            let service = Service::fetch(&service).await?;
            let application = service.application(&app, &app)?;
            if application.kind() == msfcli::ApplicationKind::Web {
                bail!("{} is a web application and cannot be installed", app);
            }
            application.install().await?;
            tracing::info!("Install of {} requested", app);
        }

        None => {
            tracing::info!("No command specified. Use --help for usage information.");
        }
    }

    Ok(())
}
