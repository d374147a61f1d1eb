//! Interactive command loop
//!
//! Reads commands from stdin, forwards them to the engine, and prints
//! asynchronous notifications (incoming emergencies, acknowledgements,
//! proximity alerts) as they arrive.

use tokio::io::{AsyncBufReadExt, BufReader};

use mayday_core::channel::AppEventReceiver;
use mayday_core::{AppEvent, MaydayError, StatusSnapshot};
use mayday_runtime::EngineHandle;

use crate::error::Result;

// ----------------------------------------------------------------------------
// Command Parsing
// ----------------------------------------------------------------------------

/// One line of user input, parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Start(Option<String>),
    Stop,
    Clear,
    Status,
    Help,
    Quit,
}

/// Parse one input line; None for blank lines and unknown commands
pub fn parse_command(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_lowercase().as_str() {
        "start" => Some(ReplCommand::Start(if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        })),
        "stop" => Some(ReplCommand::Stop),
        "clear" => Some(ReplCommand::Clear),
        "status" => Some(ReplCommand::Status),
        "help" => Some(ReplCommand::Help),
        "quit" | "exit" => Some(ReplCommand::Quit),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Command Loop
// ----------------------------------------------------------------------------

/// Run the interactive loop until quit, EOF, or Ctrl-C
pub async fn run(handle: &EngineHandle, mut app_events: AppEventReceiver) -> Result<()> {
    println!("Mayday emergency beacon. Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !dispatch(handle, &line).await? {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        eprintln!("stdin error: {e}");
                        break;
                    }
                }
            }
            event = app_events.recv() => {
                match event {
                    Some(event) => print_app_event(&event),
                    None => break, // engine gone
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    Ok(())
}

/// Execute one command; returns false when the loop should end
async fn dispatch(handle: &EngineHandle, line: &str) -> Result<bool> {
    let Some(command) = parse_command(line) else {
        if !line.trim().is_empty() {
            println!("Unknown command: '{}'. Type 'help' for options.", line.trim());
        }
        return Ok(true);
    };

    match command {
        ReplCommand::Start(message) => {
            let id = handle.start(message, None).await?;
            println!("Emergency broadcast started (id {id}).");
        }
        ReplCommand::Stop => match handle.stop().await {
            Ok(()) => println!("Emergency broadcast stopped. All-clear sent."),
            Err(MaydayError::InvalidCommand(e)) => println!("{e}."),
            Err(e) => return Err(e.into()),
        },
        ReplCommand::Clear => match handle.clear().await {
            Ok(()) => println!("All-clear re-sent."),
            Err(MaydayError::InvalidCommand(e)) => println!("{e}."),
            Err(e) => return Err(e.into()),
        },
        ReplCommand::Status => {
            print_status(&handle.status().await?);
        }
        ReplCommand::Help => print_help(),
        ReplCommand::Quit => return Ok(false),
    }

    Ok(true)
}

// ----------------------------------------------------------------------------
// Output Formatting
// ----------------------------------------------------------------------------

fn print_help() {
    println!("Available commands:");
    println!("  start [message]  - start broadcasting an emergency");
    println!("  stop             - stop broadcasting and send all-clear");
    println!("  clear            - re-send the all-clear for the last emergency");
    println!("  status           - show session, acknowledgements, and alerts");
    println!("  help             - show this help");
    println!("  quit             - exit (stops any active broadcast)");
}

fn print_status(status: &StatusSnapshot) {
    println!("--- Status ---");
    println!("  Session active:  {}", status.session_active);
    match status.emergency_id {
        Some(id) => println!("  Emergency id:    {id}"),
        None => println!("  Emergency id:    (none)"),
    }
    println!("  Broadcasts sent: {}", status.sent_count);

    if status.acknowledged_by.is_empty() {
        println!("  Acknowledged by: (none)");
    } else {
        let nodes: Vec<String> = status
            .acknowledged_by
            .iter()
            .map(|n| n.to_string())
            .collect();
        println!("  Acknowledged by: {}", nodes.join(", "));
    }

    if status.incoming_alerts.is_empty() {
        println!("  Incoming alerts: (none)");
    } else {
        println!("  Incoming alerts:");
        for alert in &status.incoming_alerts {
            println!("    - from {} ({})", alert.originator, alert.emergency_id);
            println!("      message: '{}'", alert.message);
            match alert.location {
                Some(loc) => println!(
                    "      position: {:.5}, {:.5}",
                    loc.latitude, loc.longitude
                ),
                None => println!("      position: unknown"),
            }
            match alert.battery {
                Some(pct) => println!("      battery: {pct}%"),
                None => println!("      battery: unknown"),
            }
        }
    }
    println!("--------------");
}

fn print_app_event(event: &AppEvent) {
    match event {
        AppEvent::EmergencyReceived { alert } => {
            println!(
                "*** EMERGENCY from {}: '{}' ***",
                alert.originator, alert.message
            );
        }
        AppEvent::AlertCleared { from, emergency_id } => {
            println!("--- all-clear from {from} for {emergency_id} ---");
        }
        AppEvent::AckReceived { from, .. } => {
            println!("Acknowledgement received from {from}.");
        }
        AppEvent::ProximityAlert { node, distance_m } => {
            println!("*** PROXIMITY: {node} is {distance_m:.0} m away ***");
        }
        AppEvent::LinkStatusChanged { up } => {
            println!("[link {}]", if *up { "up" } else { "down" });
        }
        AppEvent::BroadcastSent { .. } => {}
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("start"), Some(ReplCommand::Start(None)));
        assert_eq!(
            parse_command("start need medical assistance"),
            Some(ReplCommand::Start(Some("need medical assistance".into())))
        );
        assert_eq!(parse_command("STOP"), Some(ReplCommand::Stop));
        assert_eq!(parse_command("  status  "), Some(ReplCommand::Status));
        assert_eq!(parse_command("exit"), Some(ReplCommand::Quit));
        assert_eq!(parse_command("quit"), Some(ReplCommand::Quit));
        assert_eq!(parse_command("frobnicate"), None);
        assert_eq!(parse_command(""), None);
    }
}
