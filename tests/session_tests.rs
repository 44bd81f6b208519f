//! Session Module Tests
//!
//! End-to-end sessions against a mock stratum pool on the loopback interface.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use stratum_ping::config::{Credentials, ProbeConfig, ProtocolVariant};
use stratum_ping::probe::Phase;
use stratum_ping::session::SessionState;
use stratum_ping::{ProbeError, Session, SessionError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// How the mock pool treats the n-th connection
#[derive(Clone, Copy)]
enum Reply {
    Respond,
    Close,
    Silent,
}

/// Start a mock pool. Returns its port and the request lines it received.
async fn mock_pool<F>(behaviour: F) -> (u16, Arc<Mutex<Vec<String>>>)
where
    F: Fn(usize) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        let mut n = 0;
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            let reply = behaviour(n);
            n += 1;
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut line = String::new();
                if reader.read_line(&mut line).await.is_err() {
                    return;
                }
                seen.lock().unwrap().push(line);
                match reply {
                    Reply::Respond => {
                        let _ = reader
                            .get_mut()
                            .write_all(b"{\"id\":1,\"jsonrpc\":\"2.0\",\"result\":true}\n")
                            .await;
                    }
                    Reply::Close => {}
                    Reply::Silent => tokio::time::sleep(Duration::from_secs(5)).await,
                }
            });
        }
    });

    (port, requests)
}

fn config_for(port: u16, count: usize) -> ProbeConfig {
    ProbeConfig {
        host: "127.0.0.1".into(),
        port,
        count,
        interval: Duration::ZERO,
        connect_timeout: Duration::from_millis(500),
        write_timeout: Duration::from_millis(500),
        read_timeout: Duration::from_millis(300),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_all_probes_answered() {
    let (port, requests) = mock_pool(|_| Reply::Respond).await;
    let config = ProbeConfig {
        protocol: ProtocolVariant::StratumV2,
        ..config_for(port, 3)
    };

    let mut session = Session::new(&config).unwrap();
    let mut lines = Vec::new();
    let report = session.run(|record| lines.push(record.to_string())).await.unwrap();

    assert_eq!(session.state(), SessionState::Complete);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("127.0.0.1 (127.0.0.1): seq=0, time="));
    assert_eq!(report.transmitted, 3);
    assert_eq!(report.received, 3);
    assert_eq!(report.loss_percent, 0);
    assert_eq!(report.probes.len(), 3);

    let latency = report.latency.unwrap();
    assert!(latency.min <= latency.avg && latency.avg <= latency.max);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    let parsed: serde_json::Value = serde_json::from_str(&requests[0]).unwrap();
    assert_eq!(parsed["method"], "mining.subscribe");
}

#[tokio::test]
async fn test_login_request_carries_credentials() {
    let (port, requests) = mock_pool(|_| Reply::Respond).await;
    let config = ProbeConfig {
        protocol: ProtocolVariant::StratumV1,
        credentials: Credentials {
            login: "foo".into(),
            password: "bar".into(),
        },
        ..config_for(port, 1)
    };

    let mut session = Session::new(&config).unwrap();
    let report = session.run(|_| {}).await.unwrap();
    assert_eq!(report.received, 1);

    let requests = requests.lock().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&requests[0]).unwrap();
    assert_eq!(parsed["method"], "eth_submitLogin");
    assert_eq!(parsed["params"], serde_json::json!(["foo", "bar"]));
}

#[tokio::test]
async fn test_partial_loss_continues_session() {
    let (port, _) = mock_pool(|n| if n % 2 == 0 { Reply::Respond } else { Reply::Close }).await;
    let config = config_for(port, 4);

    let mut session = Session::new(&config).unwrap();
    let report = session.run(|_| {}).await.unwrap();

    assert_eq!(report.transmitted, 4);
    assert_eq!(report.received, 2);
    assert_eq!(report.loss_percent, 50);
    assert!(report.latency.is_some());
    assert!(report.probes[0].result.is_ok());
    assert!(matches!(report.probes[1].result, Err(ProbeError::Closed)));
    assert!(report.probes[2].result.is_ok());
    assert!(matches!(report.probes[3].result, Err(ProbeError::Closed)));
}

#[tokio::test]
async fn test_silent_pool_times_out() {
    let (port, _) = mock_pool(|_| Reply::Silent).await;
    let config = config_for(port, 2);

    let mut session = Session::new(&config).unwrap();
    let report = session.run(|_| {}).await.unwrap();

    assert_eq!(report.received, 0);
    assert_eq!(report.loss_percent, 100);
    assert!(report.latency.is_none());
    for record in &report.probes {
        let err = record.result.as_ref().unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(err, ProbeError::Timeout { phase: Phase::Read, .. }));
    }
    assert!(!report.to_string().contains("min/avg/max"));
}

#[tokio::test]
async fn test_refused_connections_are_losses() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = config_for(port, 3);
    let mut session = Session::new(&config).unwrap();
    let mut seen = 0;
    let report = session.run(|_| seen += 1).await.unwrap();

    assert_eq!(seen, 3);
    assert_eq!(report.transmitted, 3);
    assert_eq!(report.received, 0);
    assert!(report
        .probes
        .iter()
        .all(|record| matches!(record.result, Err(ProbeError::Connect(_)))));
}

#[tokio::test]
async fn test_tls_against_plain_pool_is_loss() {
    let (port, _) = mock_pool(|_| Reply::Respond).await;
    let config = ProbeConfig {
        tls: true,
        ..config_for(port, 1)
    };

    let mut session = Session::new(&config).unwrap();
    let report = session.run(|_| {}).await.unwrap();
    assert_eq!(report.received, 0);
    assert_eq!(report.loss_percent, 100);
}

#[tokio::test]
async fn test_unresolvable_host_attempts_nothing() {
    let config = ProbeConfig {
        host: "no-such-pool.invalid".into(),
        ..config_for(3333, 3)
    };

    let mut session = Session::new(&config).unwrap();
    let mut attempts = 0;
    let result = session.run(|_| attempts += 1).await;

    assert!(matches!(result, Err(SessionError::Resolution(_))));
    assert_eq!(attempts, 0);
    assert!(session.address().is_none());
}

#[tokio::test]
async fn test_interval_follows_every_probe() {
    let (port, _) = mock_pool(|_| Reply::Respond).await;
    let config = ProbeConfig {
        interval: Duration::from_millis(50),
        ..config_for(port, 2)
    };

    let mut session = Session::new(&config).unwrap();
    let report = session.run(|_| {}).await.unwrap();
    assert!(report.elapsed >= Duration::from_millis(100));
}
