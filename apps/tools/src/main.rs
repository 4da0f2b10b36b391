use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use bridge::{Bridge, BridgeConfig, DEFAULT_MAX_GROUP_DEPTH};
use clap::{Parser, Subcommand};
use controller::{AppleScriptChannel, DEFAULT_BUNDLE_ID};
use shared::domain::{CueRef, SelectionState};

#[derive(Parser, Debug)]
#[command(name = "cuectl", about = "Drive a cue playback controller from the terminal")]
struct Cli {
    #[arg(long, default_value = DEFAULT_BUNDLE_ID)]
    bundle_id: String,
    #[arg(long, default_value = "osascript")]
    osascript: PathBuf,
    #[arg(long, default_value_t = DEFAULT_MAX_GROUP_DEPTH)]
    max_group_depth: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List open workspaces.
    Workspaces,
    /// Print the flattened cue list.
    Cues {
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Print the current and next cue.
    Info {
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Send play, stop, next, previous, panic, reset or skip.
    Send {
        command: String,
        #[arg(long)]
        cue: Option<String>,
        #[arg(long)]
        workspace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let channel = AppleScriptChannel::new(cli.bundle_id).with_osascript(cli.osascript);
    let bridge = Bridge::new(
        Arc::new(channel),
        BridgeConfig {
            max_group_depth: cli.max_group_depth,
        },
    );

    match cli.command {
        Command::Workspaces => {
            for workspace in bridge.discover().await? {
                println!("{}\t{}", workspace.id, workspace.name);
            }
        }
        Command::Cues { workspace } => {
            connect(&bridge, workspace).await?;
            for cue in bridge.list_cues().await {
                println!("{}\t{}\t{}\t{}", cue.position, cue.number, cue.display_name, cue.id);
            }
        }
        Command::Info { workspace } => {
            let state = connect(&bridge, workspace).await?;
            print_selection(&state);
        }
        Command::Send {
            command,
            cue,
            workspace,
        } => {
            connect(&bridge, workspace).await?;
            let result = bridge.dispatch(&command, cue.as_deref()).await?;
            if !result.success {
                bail!(
                    "{command} failed: {}",
                    result.error.unwrap_or_else(|| "unknown error".into())
                );
            }
            println!("{command} ok ({:.1} ms)", result.latency_ms);
            if let Some(state) = bridge.refresh_now().await {
                print_selection(&state);
            }
        }
    }
    Ok(())
}

/// Connects to `workspace`, or to the first open workspace when none is given.
async fn connect(bridge: &Bridge, workspace: Option<String>) -> Result<SelectionState> {
    let workspace_id = match workspace {
        Some(id) => id,
        None => match bridge.discover().await?.into_iter().next() {
            Some(found) => found.id,
            None => bail!("no open workspaces"),
        },
    };
    Ok(bridge.connect(&workspace_id).await?)
}

fn print_selection(state: &SelectionState) {
    println!("current: {}", describe(&state.current));
    println!("next:    {}", describe(&state.next));
}

fn describe(cue: &CueRef) -> String {
    format!("{} {} [{}]", cue.number, cue.name, cue.cue_type.as_str())
}
