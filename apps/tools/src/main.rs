use std::{net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::Show;
use shared::domain::{Action, Trigger};
use transport::{UdpListener, UdpTransport};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one datagram, e.g. `send 10.0.0.21:12345 "PLAY DOTS-a.mp4"`.
    Send { destination: SocketAddr, message: String },
    /// Print every datagram received on a port.
    Listen {
        #[arg(long, default_value_t = 12346)]
        port: u16,
    },
    /// Load a show file and report what the controller would see.
    Check {
        #[arg(default_value = "player.json")]
        show: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let cli = Cli::parse();

    match cli.command {
        Command::Send {
            destination,
            message,
        } => {
            let transport = UdpTransport::bind().await?;
            transport
                .try_send(&message, destination)
                .await
                .with_context(|| format!("sending to {destination}"))?;
            println!("sent {message:?} to {destination}");
        }
        Command::Listen { port } => {
            let listener = UdpListener::bind(port).await?;
            println!("listening on {}", listener.local_addr()?);
            listener
                .run(|datagram| async move {
                    println!("{} {}", datagram.sender, datagram.payload);
                })
                .await;
        }
        Command::Check { show } => {
            let loaded = Show::load(&show)?;
            print_show(&loaded);
        }
    }

    Ok(())
}

fn print_show(show: &Show) {
    println!("devices ({}):", show.registry.len());
    for device in show.registry.devices() {
        println!("  {:<16} {}", device.name, device.ip);
    }

    println!("cues ({}):", show.cues.len());
    for cue in show.cues.iter() {
        let trigger = match &cue.trigger {
            Trigger::StartupComplete => "startup".to_string(),
            Trigger::UdpMessage(t) => format!(
                "{:?} from {} (delay {} ms, alternate at {})",
                t.message, t.from_device, t.delay_ms, t.count
            ),
            Trigger::Unsupported => "unsupported".to_string(),
        };
        let alternate = cue.alternate_actions.as_ref().map_or(0, Vec::len);
        println!(
            "  {:<16} {trigger}; {} action(s), {alternate} alternate",
            cue.name,
            cue.actions.len()
        );
        for action in &cue.actions {
            if let Action::SendUdp(send) = action {
                println!(
                    "      +{} ms {:?} -> {}",
                    send.delay_ms,
                    send.message,
                    send.destination.join(", ")
                );
            }
        }
    }

    println!(
        "keep-alive: {} ({:?} pacing)",
        show.keepalive.devices.join(", "),
        show.keepalive.policy.pacing
    );

    let problems: Vec<_> = show
        .skipped
        .iter()
        .cloned()
        .chain(show.unresolved_references())
        .collect();
    if problems.is_empty() {
        println!("no problems found");
    } else {
        println!("problems ({}):", problems.len());
        for problem in problems {
            println!("  {problem}");
        }
    }
}
