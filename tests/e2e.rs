use futures_util::{SinkExt, StreamExt};
use nargis::{
    ConnectionManager, ConnectionStatus, ReconnectPolicy, RealtimeSession, Role, SessionError,
    SessionEvent, VoiceMode, WebSocketTransport,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_tungstenite::{accept_async, tungstenite::Message};

fn policy() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_millis(20), Duration::from_millis(200)).with_jitter(0.0)
}

/// Plays the agent: counts audio bytes and answers every `EOS` with a full turn.
async fn serve_turns(stream: TcpStream) {
    let mut ws = accept_async(stream).await.expect("handshake");
    let mut audio = 0usize;
    let mut mode = String::new();
    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Binary(data) => audio += data.len(),
            Message::Text(text) if text.starts_with("MODE:") => mode = text,
            Message::Text(text) if text == "EOS" => {
                let events = [
                    json!({"type": "transcript", "content": format!("{audio} bytes in {mode}")}),
                    json!({"type": "thought", "content": "Looking at your list"}),
                    json!({"type": "tool_use", "tool": "tasks", "input": "today"}),
                    json!({"type": "tool_result", "tool": "tasks", "result": "2 open"}),
                    json!({"type": "response", "content": "You have two open tasks."}),
                    json!({"type": "end"}),
                ];
                for event in events {
                    ws.send(Message::Text(event.to_string())).await.expect("send");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn start_server(drop_first: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accepted = Arc::new(AtomicUsize::new(0));
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let n = accepted.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                if n < drop_first {
                    let mut ws = accept_async(stream).await.expect("handshake");
                    let _ = ws.close(None).await;
                } else {
                    serve_turns(stream).await;
                }
            });
        }
    });
    format!("ws://{addr}/ws")
}

fn session() -> RealtimeSession {
    RealtimeSession::new(ConnectionManager::new(WebSocketTransport::new(), policy()))
}

#[tokio::test]
async fn test_full_voice_turn_over_websocket() {
    let url = start_server(0).await;
    let session = session();
    let ended = Arc::new(Notify::new());
    let tools = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let ended = ended.clone();
        let tools = tools.clone();
        session.on_event(move |event| match event {
            SessionEvent::TurnEnded => ended.notify_one(),
            SessionEvent::ToolCompleted { tool, .. } => tools.lock().unwrap().push(tool.clone()),
            _ => {}
        })
    };

    session.connect(url, 3).unwrap();
    session.wait_until_open(Duration::from_secs(5)).await.unwrap();

    assert!(session.begin_turn(VoiceMode::Agent));
    assert!(session.send_audio(vec![0u8; 640]));
    assert!(session.send_audio(vec![0u8; 360]));
    assert!(session.end_of_speech());

    tokio::time::timeout(Duration::from_secs(5), ended.notified())
        .await
        .expect("turn should end");

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text, "1000 bytes in MODE:agent");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].text, "You have two open tasks.");
    assert_eq!(
        messages[1].thoughts,
        vec!["Looking at your list", "Using tasks (today)…"]
    );
    assert_eq!(tools.lock().unwrap().clone(), vec!["tasks".to_string()]);
    assert!(!session.processing());

    session.close();
    assert_eq!(session.status(), ConnectionStatus::Closed);
}

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let url = start_server(1).await;
    let session = session();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _sub = session.manager().on_status(move |s| {
        let _ = tx.send(*s);
    });

    session.connect(url, 3).unwrap();
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while seen.iter().filter(|s| **s == ConnectionStatus::Open).count() < 2 {
            seen.push(rx.recv().await.expect("manager alive"));
        }
    })
    .await
    .expect("should reopen");

    assert_eq!(
        seen,
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Open,
            ConnectionStatus::Retrying,
            ConnectionStatus::Connecting,
            ConnectionStatus::Open,
        ]
    );
    session.close();
}

#[tokio::test]
async fn test_unreachable_server_exhausts_retries() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let session = session();
    session.connect(format!("ws://{addr}/ws"), 2).unwrap();

    let result = session.wait_until_open(Duration::from_secs(5)).await;
    assert_eq!(result, Err(SessionError::Connection(ConnectionStatus::Error)));
    session.close();
}
