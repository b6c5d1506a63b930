//! End-to-end handshake behavior over an in-memory transport: capability
//! negotiation, SASL, nickname collision, and the welcome transition.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use slirc_client::{ClientError, Direction, NegotiationError};

use common::{connect_pair, register_plain, test_config, Peer};

#[tokio::test]
async fn registration_completes_with_caps() {
    let mut config = test_config();
    config.request_caps = vec!["server-time".to_string(), "account-tag".to_string()];
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :server-time account-tag sasl batch")
        .await;

    let req = peer.expect("CAP REQ ").await;
    assert_eq!(req, "CAP REQ :server-time account-tag");
    peer.send(":srv CAP * ACK :server-time account-tag").await;

    peer.expect("CAP END").await;
    assert_eq!(peer.expect("NICK ").await, "NICK testbot");
    assert_eq!(peer.expect("USER ").await, "USER tester 0 * :Test Bot");
    peer.send(":srv 001 testbot :Welcome to the test network")
        .await;

    client.wait_for_registration().await.expect("registration failed");
    assert!(client.is_registered());
    assert_eq!(client.current_nick(), "testbot");
    assert!(client.caps().is_enabled("server-time"));
    assert!(client.caps().is_enabled("account-tag"));
    assert!(!client.caps().is_enabled("sasl"));

    client.quit(None).await;
}

#[tokio::test]
async fn cap_req_never_exceeds_advertised() {
    let mut config = test_config();
    config.request_caps = vec![
        "away-notify".to_string(),
        "echo-message".to_string(),
        "userhost-in-names".to_string(),
    ];
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    // Only one of the wanted capabilities is advertised.
    peer.send(":srv CAP * LS :echo-message batch msgid").await;

    assert_eq!(peer.expect("CAP REQ").await, "CAP REQ echo-message");
    client.quit(None).await;
}

#[tokio::test]
async fn multiline_cap_ls_is_accumulated() {
    let mut config = test_config();
    config.request_caps = vec!["server-time".to_string(), "batch".to_string()];
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS * :batch msgid").await;
    peer.send(":srv CAP * LS :server-time").await;

    assert_eq!(peer.expect("CAP REQ").await, "CAP REQ :server-time batch");
    client.quit(None).await;
}

#[tokio::test]
async fn cap_nak_is_tolerated() {
    let mut config = test_config();
    config.request_caps = vec!["away-notify".to_string()];
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :away-notify").await;
    peer.expect("CAP REQ away-notify").await;
    peer.send(":srv CAP * NAK :away-notify").await;

    // Negotiation proceeds to registration regardless.
    peer.expect("CAP END").await;
    peer.expect("NICK testbot").await;
    peer.expect("USER ").await;
    peer.send(":srv 001 testbot :Welcome").await;

    client.wait_for_registration().await.expect("NAK must not be fatal");
    assert!(!client.caps().is_enabled("away-notify"));
    assert_eq!(client.caps().rejected(), vec!["away-notify"]);

    client.quit(None).await;
}

#[tokio::test]
async fn sasl_success_then_registration() {
    let mut config = test_config();
    config.use_sasl = true;
    config.sasl_login = "account".to_string();
    config.sasl_password = "hunter2".to_string();
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :sasl server-time").await;
    peer.expect("CAP REQ sasl").await;
    peer.send(":srv CAP * ACK :sasl").await;

    assert_eq!(peer.expect("AUTHENTICATE").await, "AUTHENTICATE PLAIN");
    peer.send("AUTHENTICATE +").await;

    // base64("\0account\0hunter2")
    assert_eq!(
        peer.expect("AUTHENTICATE").await,
        "AUTHENTICATE AGFjY291bnQAaHVudGVyMg=="
    );
    peer.send(":srv 900 testbot testbot!t@h account :You are now logged in")
        .await;
    peer.send(":srv 903 testbot :SASL authentication successful")
        .await;

    peer.expect("CAP END").await;
    peer.expect("NICK testbot").await;
    peer.expect("USER ").await;
    peer.send(":srv 001 testbot :Welcome").await;

    client.wait_for_registration().await.expect("sasl handshake failed");
    client.quit(None).await;
}

#[tokio::test]
async fn sasl_failure_is_fatal_unlike_nak() {
    let mut config = test_config();
    config.use_sasl = true;
    config.sasl_login = "account".to_string();
    config.sasl_password = "wrong".to_string();
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :sasl").await;
    peer.expect("CAP REQ sasl").await;
    peer.send(":srv CAP * ACK :sasl").await;
    peer.expect("AUTHENTICATE PLAIN").await;
    peer.send("AUTHENTICATE +").await;
    peer.expect("AUTHENTICATE ").await;
    peer.send(":srv 904 testbot :SASL authentication failed").await;

    let err = client
        .wait_for_registration()
        .await
        .expect_err("sasl failure must abort the attempt");
    assert!(matches!(
        err,
        ClientError::Negotiation(NegotiationError::SaslFailed(_))
    ));
    assert!(!client.is_registered());

    // The connection attempt was torn down.
    assert_eq!(peer.read_line().await, None);
    client.quit(None).await;
}

#[tokio::test]
async fn sasl_unavailable_is_fatal() {
    let mut config = test_config();
    config.use_sasl = true;
    config.sasl_login = "account".to_string();
    config.sasl_password = "pw".to_string();
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :batch").await;

    let err = client
        .wait_for_registration()
        .await
        .expect_err("missing sasl support must abort");
    assert!(matches!(
        err,
        ClientError::Negotiation(NegotiationError::SaslUnavailable)
    ));
    client.quit(None).await;
}

#[tokio::test]
async fn welcome_sets_nick_and_dispatches_in_order() {
    let mut config = test_config();
    config.nick = "mynick".to_string();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let (client, mut peer) = {
        let (client_side, peer_side) = tokio::io::duplex(65536);
        let client = slirc_client::Client::new(config);
        for (name, tag) in [("RAW", "raw"), ("001", "001"), ("ALL", "all")] {
            let log = Arc::clone(&log);
            client.register_event(
                Direction::In,
                name,
                Arc::new(move |event| {
                    if event.raw.contains("001") {
                        log.lock().unwrap().push(tag);
                    }
                }),
                0,
            );
        }
        client
            .connect_with_transport(slirc_client::Transport::local(client_side))
            .unwrap();
        (client, Peer::new(peer_side))
    };

    register_plain(&mut peer, "mynick").await;
    client.wait_for_registration().await.unwrap();

    assert!(client.is_registered());
    assert_eq!(client.current_nick(), "mynick");
    assert_eq!(*log.lock().unwrap(), vec!["raw", "001", "all"]);

    client.quit(None).await;
}

#[tokio::test]
async fn nick_collision_retries_deterministically() {
    let (client, mut peer) = connect_pair(test_config());

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :").await;
    peer.expect("CAP END").await;
    peer.expect("NICK testbot").await;
    peer.expect("USER ").await;

    peer.send("433 * testbot :Nickname is already in use").await;
    assert_eq!(peer.expect("NICK").await, "NICK testbot1");

    peer.send("433 * testbot1 :Nickname is already in use").await;
    assert_eq!(peer.expect("NICK").await, "NICK testbot2");

    peer.send(":srv 001 testbot2 :Welcome").await;
    client.wait_for_registration().await.unwrap();
    assert_eq!(client.current_nick(), "testbot2");

    client.quit(None).await;
}

#[tokio::test]
async fn handshake_timeout_yields_terminal_error() {
    let mut config = test_config();
    config.handshake_timeout = Duration::from_millis(200);
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    // Say nothing: the watchdog must produce a terminal outcome.
    let result = timeout(Duration::from_secs(5), client.wait_for_registration())
        .await
        .expect("wait_for_registration must not hang");
    assert!(matches!(result, Err(ClientError::HandshakeTimeout)));

    client.quit(None).await;
}

#[tokio::test]
async fn webirc_and_pass_precede_nick_user() {
    let mut config = test_config();
    config.webirc = vec![
        "gatewaypw".to_string(),
        "gateway".to_string(),
        "example.host".to_string(),
        "203.0.113.5".to_string(),
    ];
    config.password = Some("serverpass".to_string());
    let (client, mut peer) = connect_pair(config);

    peer.expect("CAP LS 302").await;
    peer.send(":srv CAP * LS :").await;

    peer.expect("CAP END").await;
    assert_eq!(
        peer.expect("WEBIRC").await,
        "WEBIRC gatewaypw gateway example.host 203.0.113.5"
    );
    assert_eq!(peer.expect("PASS").await, "PASS serverpass");
    peer.expect("NICK testbot").await;
    peer.expect("USER ").await;

    client.quit(None).await;
}
