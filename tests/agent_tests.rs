//! Integration tests for the agent console core
//!
//! These tests drive a full chat session against a wiremock server standing
//! in for the generateContent API.

use std::sync::{Arc, Mutex};

use nexus::agent::{
    AgentClient, ChatSession, ContextMessage, ModelTier, Role, SessionState, SubmitOutcome,
    FALLBACK_REPLY, GREETING,
};
use nexus::logging::{LogLevel, LogSink};
use nexus::{NexusConfig, ResponseParser};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FLASH_PATH: &str = "/v1beta/models/gemini-3-flash-preview:generateContent";

fn config_for(server: &MockServer) -> NexusConfig {
    NexusConfig {
        api_key: Some("integration-key".to_string()),
        base_url: server.uri(),
        ..Default::default()
    }
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    }))
}

/// Test a complete exchange: request shape, transcript and consumers
#[tokio::test]
async fn test_session_round_trip_routes_markup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FLASH_PATH))
        .and(header("x-goog-api-key", "integration-key"))
        .and(body_partial_json(serde_json::json!({
            "contents": [
                {"role": "model", "parts": [{"text": GREETING}]},
                {"role": "user", "parts": [{"text": "make a heading"}]}
            ]
        })))
        .respond_with(reply("Use this:\n```html\n<h1>Nexus</h1>\n```"))
        .expect(1)
        .mount(&server)
        .await;

    let log = LogSink::new();
    let markups = Arc::new(Mutex::new(Vec::new()));
    let commands = Arc::new(Mutex::new(Vec::new()));
    let m = Arc::clone(&markups);
    let c = Arc::clone(&commands);
    let parser = ResponseParser::new(log.clone())
        .on_markup(move |html| m.lock().unwrap().push(html.to_string()))
        .on_command(move |cmd| c.lock().unwrap().push(cmd.to_string()));

    let config = config_for(&server);
    let agent = AgentClient::from_config(&config, log.clone());
    let session = ChatSession::new(agent, parser, log.clone(), ModelTier::Fast).with_greeting();

    let outcome = session.submit("make a heading").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Replied { .. }));

    assert_eq!(*markups.lock().unwrap(), vec!["<h1>Nexus</h1>".to_string()]);
    assert!(commands.lock().unwrap().is_empty());

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].role, Role::User);
    assert_eq!(transcript[2].role, Role::Agent);
    assert_eq!(session.state(), SessionState::Idle);

    let sources: Vec<String> = log.history().into_iter().map(|e| e.source).collect();
    assert!(sources.contains(&"CHAT".to_string()));
    assert!(sources.contains(&"GEMINI".to_string()));
    assert!(sources.contains(&"PARSER".to_string()));
}

/// Test that a server error becomes the fallback turn and the session recovers
#[tokio::test]
async fn test_server_error_yields_fallback_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let log = LogSink::new();
    let config = config_for(&server);
    let agent = AgentClient::from_config(&config, log.clone());
    let session = ChatSession::new(agent, ResponseParser::new(log.clone()), log.clone(), ModelTier::Fast);

    let SubmitOutcome::Replied { reply, directive } = session.submit("hello").await.unwrap() else {
        panic!("expected a reply turn");
    };
    assert_eq!(reply.text, FALLBACK_REPLY);
    assert!(directive.is_empty());
    assert_eq!(session.state(), SessionState::Idle);

    let gemini_errors = log
        .history()
        .iter()
        .filter(|e| e.level == LogLevel::Error && e.source == "GEMINI")
        .count();
    assert_eq!(gemini_errors, 1);
}

/// Test that a missing API key never reaches the network
#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("unreachable"))
        .expect(0)
        .mount(&server)
        .await;

    let log = LogSink::new();
    let config = NexusConfig {
        api_key: None,
        ..config_for(&server)
    };
    let agent = AgentClient::from_config(&config, log.clone());

    let result = agent.generate("hi", &[], ModelTier::Fast).await;
    assert!(result.is_err());

    let errors: Vec<_> = log
        .history()
        .into_iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, "GEMINI");
}

/// Test that the advanced tier calls the pro model with the given history
#[tokio::test]
async fn test_advanced_tier_uses_pro_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-3-pro-preview:generateContent"))
        .respond_with(reply("Run:\n```bash\nls -la\n```"))
        .expect(1)
        .mount(&server)
        .await;

    let log = LogSink::new();
    let agent = AgentClient::from_config(&config_for(&server), log);
    let history = vec![ContextMessage::user("where am I?"), ContextMessage::agent("In /srv.")];

    let text = agent
        .generate("list everything", &history, ModelTier::Advanced)
        .await
        .unwrap();
    assert_eq!(text, "Run:\n```bash\nls -la\n```");
}

/// Test that log subscribers see entries as the session produces them
#[tokio::test]
async fn test_log_subscriber_follows_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("```bash\ndf -h\n```"))
        .mount(&server)
        .await;

    let log = LogSink::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let subscription = log.subscribe(move |entry| {
        seen_clone.lock().unwrap().push(entry.level);
    });

    let agent = AgentClient::from_config(&config_for(&server), log.clone());
    let session = ChatSession::new(agent, ResponseParser::new(log.clone()), log.clone(), ModelTier::Fast);
    session.submit("disk usage?").await.unwrap();

    let levels = seen.lock().unwrap().clone();
    assert_eq!(levels.len(), log.len());
    assert!(levels.contains(&LogLevel::System));

    subscription.unsubscribe();
    session.submit("again").await.unwrap();
    assert_eq!(seen.lock().unwrap().len(), levels.len());
}
