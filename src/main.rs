//! Nexus console - interactive chat with the Nexus agent
//!
//! Reads prompts from stdin and prints the conversation. Markup the agent
//! writes is shown as a workspace panel; suggested commands are shown as
//! terminal lines and never executed.
//!
//! Usage: `GEMINI_API_KEY=... nexus [--follow-log]`

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use nexus::agent::{ChatTurn, Role, SessionError, SubmitOutcome};
use nexus::{AgentClient, ChatSession, LogLevel, LogSink, ModelTier, NexusConfig, ResponseParser};

const HELP: &str = "\
Commands:
  /model fast|advanced   switch model tier (aliases: flash, pro)
  /history               print the transcript
  /logs                  print the system log
  /metrics               print Prometheus metrics
  /help                  show this help
  /quit                  exit
Anything else is sent to the agent.";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Submit(String),
    Model(ModelTier),
    History,
    Logs,
    Metrics,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl ConsoleCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleCommand::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return ConsoleCommand::Submit(line.to_string());
        };

        let mut words = rest.split_whitespace();
        match (words.next(), words.next()) {
            (Some("model"), Some(tier)) => match tier.parse() {
                Ok(tier) => ConsoleCommand::Model(tier),
                Err(e) => ConsoleCommand::Invalid(e.to_string()),
            },
            (Some("model"), None) => ConsoleCommand::Invalid("usage: /model fast|advanced".to_string()),
            (Some("history"), _) => ConsoleCommand::History,
            (Some("logs"), _) => ConsoleCommand::Logs,
            (Some("metrics"), _) => ConsoleCommand::Metrics,
            (Some("help"), _) => ConsoleCommand::Help,
            (Some("quit") | Some("exit"), _) => ConsoleCommand::Quit,
            _ => ConsoleCommand::Invalid(format!("unknown command: {}", line)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let follow_log = std::env::args().any(|arg| arg == "--follow-log");

    let config = NexusConfig::from_env()?;
    nexus::tracing::init_tracing("nexus", config.otlp_endpoint.as_deref())?;

    let log = LogSink::with_capacity(config.log_capacity);
    let _log_panel = follow_log.then(|| log.subscribe(|entry| eprintln!("{}", entry)));

    if config.api_key.is_none() {
        log.log(
            "No API key configured (set GEMINI_API_KEY); agent calls will fail",
            LogLevel::Warn,
            "SYSTEM",
        );
    }

    let workspace_log = log.clone();
    let parser = ResponseParser::new(log.clone())
        .on_markup(move |markup| {
            print_workspace(markup);
            workspace_log.log("Code workspace updated with new content", LogLevel::Info, "DEV_TOOLS");
        })
        .on_command(|command| {
            for line in command.lines() {
                println!("[TERMINAL] $ {}", line);
            }
            println!("[TERMINAL] (suggested command, not executed)");
        });

    let agent = AgentClient::from_config(&config, log.clone());
    let session = ChatSession::new(agent, parser, log.clone(), config.default_tier).with_greeting();
    log.log(
        format!("Nexus console started (session {})", session.id()),
        LogLevel::System,
        "SYSTEM",
    );

    println!("┌─────────────────────────────────────────┐");
    println!("│  Nexus Agent Console  (/help for help)  │");
    println!("└─────────────────────────────────────────┘");
    println!("Model: {} ({})", session.tier().label(), session.model_id());
    for turn in session.transcript() {
        print_turn(&turn);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Submit(input) => {
                println!("[Nexus is thinking...]");
                match session.submit(&input).await {
                    Ok(SubmitOutcome::Replied { reply, .. }) => print_turn(&reply),
                    Ok(SubmitOutcome::Ignored) => {}
                    Err(SessionError::Busy) => println!("[busy] wait for the current reply"),
                    Err(e) => println!("[error] {}", e),
                }
            }
            ConsoleCommand::Model(tier) => {
                session.set_tier(tier);
                println!("Model: {} ({})", tier.label(), session.model_id());
            }
            ConsoleCommand::History => {
                for turn in session.transcript() {
                    print_turn(&turn);
                }
            }
            ConsoleCommand::Logs => {
                for entry in log.history() {
                    println!("{}", entry);
                }
            }
            ConsoleCommand::Metrics => match nexus::metrics::gather_text() {
                Ok(text) => print!("{}", text),
                Err(e) => println!("[error] metrics unavailable: {}", e),
            },
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => break,
            ConsoleCommand::Invalid(msg) => println!("{}", msg),
        }
    }

    log.log("Nexus console stopped", LogLevel::System, "SYSTEM");
    nexus::tracing::shutdown_tracing();
    Ok(())
}

fn print_turn(turn: &ChatTurn) {
    let speaker = match turn.role {
        Role::User => "you",
        Role::Agent => "nexus",
    };
    let time = turn.timestamp.with_timezone(&chrono::Local).format("%H:%M");
    println!("[{}] {}> {}", time, speaker, turn.text);
}

fn print_workspace(markup: &str) {
    println!("┌─ WORKSPACE ─────────────────────────────");
    for line in markup.lines() {
        println!("│ {}", line);
    }
    println!("└─────────────────────────────────────────");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_submitted() {
        assert_eq!(
            ConsoleCommand::parse("  build a page "),
            ConsoleCommand::Submit("build a page".to_string())
        );
    }

    #[test]
    fn test_model_command() {
        assert_eq!(ConsoleCommand::parse("/model pro"), ConsoleCommand::Model(ModelTier::Advanced));
        assert_eq!(ConsoleCommand::parse("/model fast"), ConsoleCommand::Model(ModelTier::Fast));
        match ConsoleCommand::parse("/model turbo") {
            ConsoleCommand::Invalid(msg) => {
                assert!(msg.contains("turbo"));
                assert!(!msg.contains("NEXUS_MODEL_TIER"));
            }
            _ => panic!("expected /model turbo to be rejected"),
        }
        assert!(matches!(ConsoleCommand::parse("/model"), ConsoleCommand::Invalid(_)));
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(ConsoleCommand::parse(""), ConsoleCommand::Empty);
        assert_eq!(ConsoleCommand::parse("/logs"), ConsoleCommand::Logs);
        assert_eq!(ConsoleCommand::parse("/history"), ConsoleCommand::History);
        assert_eq!(ConsoleCommand::parse("/metrics"), ConsoleCommand::Metrics);
        assert_eq!(ConsoleCommand::parse("/exit"), ConsoleCommand::Quit);
        assert!(matches!(ConsoleCommand::parse("/rm -rf"), ConsoleCommand::Invalid(_)));
    }
}
