//! Sans-IO state machine for connection bootstrap.
//!
//! Drives `CAP LS` → `CAP REQ`/`ACK`/`NAK` → optional SASL → `CAP END` →
//! `NICK`/`USER` → `001`. It performs no I/O: the reader task feeds it
//! parsed events and executes the actions it returns.
//!
//! The asymmetry at the heart of the handshake lives here: a `CAP NAK` is
//! tolerated and negotiation proceeds without the capability, while any
//! SASL failure is fatal to the connection attempt.

use tracing::{debug, warn};

use crate::caps::CapabilityTracker;
use crate::config::Config;
use crate::error::NegotiationError;
use crate::event::Event;
use crate::message::Message;
use crate::sasl::{self, SaslMechanism, SaslOutcome, SASL_CHUNK_SIZE};

/// Current phase of the connection handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NegotiationState {
    /// No connection.
    Disconnected,
    /// Sent `CAP LS`, resolving capability requests.
    CapNegotiating,
    /// Inside the `AUTHENTICATE` exchange.
    SaslAuthenticating,
    /// Sent `CAP END` and registration commands, awaiting `001`.
    Registering,
    /// Received `001`.
    Registered,
}

/// Actions the machine asks the caller to perform.
#[derive(Clone, Debug)]
pub(crate) enum Action {
    /// Queue this message for the writer.
    Send(Message),
    /// Registration completed; `nick` is the server-assigned nickname.
    Registered { nick: String },
    /// Abort the connection attempt.
    Fatal(NegotiationError),
}

/// The negotiation state machine for one connection attempt.
pub(crate) struct Negotiator {
    state: NegotiationState,
    sasl: SaslOutcome,
    nick_counter: u32,
}

impl Negotiator {
    pub(crate) fn new() -> Self {
        Self {
            state: NegotiationState::Disconnected,
            sasl: SaslOutcome::Pending,
            nick_counter: 0,
        }
    }

    pub(crate) fn state(&self) -> NegotiationState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn sasl_outcome(&self) -> &SaslOutcome {
        &self.sasl
    }

    /// Reset for a fresh connection attempt.
    pub(crate) fn reset(&mut self) {
        self.state = NegotiationState::Disconnected;
        self.sasl = SaslOutcome::Pending;
        self.nick_counter = 0;
    }

    /// Transport is open: begin capability negotiation.
    pub(crate) fn start(&mut self) -> Vec<Action> {
        self.state = NegotiationState::CapNegotiating;
        vec![Action::Send(Message::new("CAP", &["LS", "302"]))]
    }

    /// Handle a `CAP` line.
    pub(crate) fn on_cap(
        &mut self,
        event: &Event,
        caps: &CapabilityTracker,
        config: &Config,
    ) -> Vec<Action> {
        let sub = event.param(1).unwrap_or("").to_ascii_uppercase();
        match sub.as_str() {
            "LS" | "LIST" => {
                // `CAP * LS * :...` marks a continuation line.
                let (more_coming, caps_str) = if event.param(2) == Some("*") {
                    (true, event.param(3).unwrap_or(""))
                } else {
                    (false, event.param(2).unwrap_or(""))
                };

                for cap in caps_str.split_whitespace() {
                    let name = cap.split('=').next().unwrap_or(cap);
                    caps.advertise(name);
                }

                if more_coming || self.state != NegotiationState::CapNegotiating {
                    return Vec::new();
                }

                let request = caps.to_request();
                if request.is_empty() {
                    self.after_caps(caps, config)
                } else {
                    caps.begin_request(request.len());
                    vec![Action::Send(Message::new(
                        "CAP",
                        &["REQ", &request.join(" ")],
                    ))]
                }
            }
            "ACK" => {
                for cap in event.param(2).unwrap_or("").split_whitespace() {
                    let name = cap.trim_start_matches(['-', '~', '=']);
                    if let Some(removed) = cap.strip_prefix('-') {
                        caps.disable(removed);
                    } else {
                        caps.acknowledge(name);
                    }
                }
                self.maybe_finish_caps(caps, config)
            }
            "NAK" => {
                let refused = event.param(2).unwrap_or("");
                debug!(caps = refused, "server rejected capabilities");
                for cap in refused.split_whitespace() {
                    caps.reject(cap);
                }
                self.maybe_finish_caps(caps, config)
            }
            "NEW" => {
                // cap-notify: a capability appeared after registration.
                for cap in event.param(2).unwrap_or("").split_whitespace() {
                    let name = cap.split('=').next().unwrap_or(cap);
                    caps.advertise(name);
                }
                let request = caps.to_request();
                if request.is_empty() {
                    Vec::new()
                } else {
                    caps.begin_request(request.len());
                    vec![Action::Send(Message::new(
                        "CAP",
                        &["REQ", &request.join(" ")],
                    ))]
                }
            }
            "DEL" => {
                for cap in event.param(2).unwrap_or("").split_whitespace() {
                    caps.disable(cap);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Handle an `AUTHENTICATE` challenge from the server.
    pub(crate) fn on_authenticate(&mut self, config: &Config) -> Vec<Action> {
        if self.state != NegotiationState::SaslAuthenticating {
            return Vec::new();
        }

        let payload = match &config.sasl_mechanism {
            SaslMechanism::Plain => sasl::encode_plain(&config.sasl_login, &config.sasl_password),
            SaslMechanism::External => sasl::encode_external(None),
            other => {
                return vec![Action::Fatal(NegotiationError::UnsupportedMechanism(
                    other.as_str().to_string(),
                ))]
            }
        };

        let mut actions: Vec<Action> = sasl::chunk_response(&payload)
            .map(|chunk| Action::Send(Message::new("AUTHENTICATE", &[chunk])))
            .collect();
        // An exact multiple of the chunk size needs an empty terminator.
        if payload.len() % SASL_CHUNK_SIZE == 0 {
            actions.push(Action::Send(Message::new("AUTHENTICATE", &["+"])));
        }
        actions
    }

    /// Handle a numeric reply relevant to the handshake.
    pub(crate) fn on_numeric(
        &mut self,
        code: &str,
        event: &Event,
        config: &Config,
    ) -> Vec<Action> {
        match code {
            "001" => {
                self.state = NegotiationState::Registered;
                let nick = event
                    .param(0)
                    .filter(|n| !n.is_empty() && *n != "*")
                    .unwrap_or(&config.nick)
                    .to_string();
                vec![Action::Registered { nick }]
            }
            "433" | "437" => {
                if self.state == NegotiationState::Registered
                    || self.state == NegotiationState::Disconnected
                {
                    // Post-registration collisions belong to the caller.
                    return Vec::new();
                }
                self.nick_counter += 1;
                let candidate = format!("{}{}", config.nick, self.nick_counter);
                debug!(candidate = %candidate, "nickname in use, retrying");
                vec![Action::Send(Message::new("NICK", &[&candidate]))]
            }
            "903" => {
                self.sasl = SaslOutcome::Success;
                if self.state == NegotiationState::SaslAuthenticating {
                    self.enter_registration(config)
                } else {
                    Vec::new()
                }
            }
            "902" | "904" | "905" | "906" | "907" => {
                if self.state != NegotiationState::SaslAuthenticating {
                    return Vec::new();
                }
                let reason = event.text().to_string();
                self.sasl = SaslOutcome::Failed(reason.clone());
                vec![Action::Fatal(NegotiationError::SaslFailed(reason))]
            }
            "908" => {
                let available = sasl::parse_mechanisms(event.param(1).unwrap_or(""));
                warn!(?available, "server offered different sasl mechanisms");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Handle a server `ERROR` line.
    pub(crate) fn on_error(&mut self, reason: &str) -> Vec<Action> {
        if self.state == NegotiationState::Registered {
            return Vec::new();
        }
        vec![Action::Fatal(NegotiationError::ServerError(
            reason.to_string(),
        ))]
    }

    fn maybe_finish_caps(&mut self, caps: &CapabilityTracker, config: &Config) -> Vec<Action> {
        if self.state == NegotiationState::CapNegotiating && caps.is_complete() {
            self.after_caps(caps, config)
        } else {
            Vec::new()
        }
    }

    fn after_caps(&mut self, caps: &CapabilityTracker, config: &Config) -> Vec<Action> {
        if config.use_sasl {
            if !caps.is_enabled("sasl") {
                return vec![Action::Fatal(NegotiationError::SaslUnavailable)];
            }
            if !config.sasl_mechanism.is_supported() {
                return vec![Action::Fatal(NegotiationError::UnsupportedMechanism(
                    config.sasl_mechanism.as_str().to_string(),
                ))];
            }
            self.state = NegotiationState::SaslAuthenticating;
            vec![Action::Send(Message::new(
                "AUTHENTICATE",
                &[config.sasl_mechanism.as_str()],
            ))]
        } else {
            self.enter_registration(config)
        }
    }

    /// Emit `CAP END` and the registration burst. WEBIRC and PASS go out
    /// before NICK/USER, which servers require.
    fn enter_registration(&mut self, config: &Config) -> Vec<Action> {
        self.state = NegotiationState::Registering;
        let mut actions = vec![Action::Send(Message::new("CAP", &["END"]))];

        if !config.webirc.is_empty() {
            let params: Vec<&str> = config.webirc.iter().map(String::as_str).collect();
            actions.push(Action::Send(Message::new("WEBIRC", &params)));
        }
        if let Some(ref password) = config.password {
            actions.push(Action::Send(Message::new("PASS", &[password])));
        }
        actions.push(Action::Send(Message::new("NICK", &[&config.nick])));
        actions.push(Action::Send(Message::new(
            "USER",
            &[&config.user, "0", "*", &config.realname],
        )));
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config() -> Config {
        Config {
            nick: "testbot".to_string(),
            user: "bot".to_string(),
            realname: "Test Bot".to_string(),
            ..Config::default()
        }
    }

    fn event_for(line: &str) -> Event {
        Event::new(line.to_string(), Some(Message::parse(line).unwrap()))
    }

    fn sent_lines(actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(m) => Some(m.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_start_sends_cap_ls() {
        let mut neg = Negotiator::new();
        let actions = neg.start();
        assert_eq!(neg.state(), NegotiationState::CapNegotiating);
        assert_eq!(sent_lines(&actions), vec!["CAP LS 302"]);
    }

    #[test]
    fn test_cap_ls_requests_intersection_only() {
        let mut neg = Negotiator::new();
        let config = make_config();
        let caps = CapabilityTracker::new();
        caps.add_wanted_caps(&["sasl", "away-notify", "echo-message"]);
        let _ = neg.start();

        let actions = neg.on_cap(
            &event_for(":srv CAP * LS :away-notify batch server-time"),
            &caps,
            &config,
        );
        assert_eq!(sent_lines(&actions), vec!["CAP REQ away-notify"]);
        assert!(!caps.is_complete());
    }

    #[test]
    fn test_multiline_ls_defers_request() {
        let mut neg = Negotiator::new();
        let config = make_config();
        let caps = CapabilityTracker::new();
        caps.add_wanted_caps(&["sasl", "batch"]);
        let _ = neg.start();

        let actions = neg.on_cap(&event_for(":srv CAP * LS * :batch"), &caps, &config);
        assert!(actions.is_empty());

        let actions = neg.on_cap(&event_for(":srv CAP * LS :sasl"), &caps, &config);
        assert_eq!(sent_lines(&actions), vec!["CAP REQ :sasl batch"]);
    }

    #[test]
    fn test_nak_is_not_fatal() {
        let mut neg = Negotiator::new();
        let config = make_config();
        let caps = CapabilityTracker::new();
        caps.add_wanted_caps(&["away-notify", "echo-message"]);
        let _ = neg.start();
        let _ = neg.on_cap(
            &event_for(":srv CAP * LS :away-notify echo-message"),
            &caps,
            &config,
        );

        let _ = neg.on_cap(&event_for(":srv CAP * ACK :away-notify"), &caps, &config);
        let actions = neg.on_cap(&event_for(":srv CAP * NAK :echo-message"), &caps, &config);

        // Negotiation proceeds straight to registration, no fatal action.
        assert!(actions.iter().all(|a| matches!(a, Action::Send(_))));
        let lines = sent_lines(&actions);
        assert_eq!(lines[0], "CAP END");
        assert!(lines.contains(&"NICK testbot".to_string()));
        assert_eq!(neg.state(), NegotiationState::Registering);
        assert!(caps.is_enabled("away-notify"));
        assert!(!caps.is_enabled("echo-message"));
    }

    #[test]
    fn test_sasl_flow_success() {
        let mut neg = Negotiator::new();
        let mut config = make_config();
        config.use_sasl = true;
        config.sasl_login = "account".to_string();
        config.sasl_password = "hunter2".to_string();
        let caps = CapabilityTracker::new();
        caps.add_wanted_caps(&["sasl"]);
        let _ = neg.start();
        let _ = neg.on_cap(&event_for(":srv CAP * LS :sasl"), &caps, &config);

        let actions = neg.on_cap(&event_for(":srv CAP * ACK :sasl"), &caps, &config);
        assert_eq!(sent_lines(&actions), vec!["AUTHENTICATE PLAIN"]);
        assert_eq!(neg.state(), NegotiationState::SaslAuthenticating);

        let actions = neg.on_authenticate(&config);
        let lines = sent_lines(&actions);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("AUTHENTICATE "));

        let actions = neg.on_numeric("903", &event_for(":srv 903 t :ok"), &config);
        assert!(neg.sasl_outcome().is_success());
        assert_eq!(sent_lines(&actions)[0], "CAP END");
        assert_eq!(neg.state(), NegotiationState::Registering);
    }

    #[test]
    fn test_sasl_failure_is_fatal() {
        let mut neg = Negotiator::new();
        let mut config = make_config();
        config.use_sasl = true;
        let caps = CapabilityTracker::new();
        caps.add_wanted_caps(&["sasl"]);
        let _ = neg.start();
        let _ = neg.on_cap(&event_for(":srv CAP * LS :sasl"), &caps, &config);
        let _ = neg.on_cap(&event_for(":srv CAP * ACK :sasl"), &caps, &config);

        let actions = neg.on_numeric(
            "904",
            &event_for(":srv 904 t :SASL authentication failed"),
            &config,
        );
        assert!(matches!(
            actions.as_slice(),
            [Action::Fatal(NegotiationError::SaslFailed(_))]
        ));
    }

    #[test]
    fn test_sasl_enabled_but_not_acknowledged_is_fatal() {
        let mut neg = Negotiator::new();
        let mut config = make_config();
        config.use_sasl = true;
        let caps = CapabilityTracker::new();
        caps.add_wanted_caps(&["sasl"]);
        let _ = neg.start();

        // Server advertises nothing we want.
        let actions = neg.on_cap(&event_for(":srv CAP * LS :batch"), &caps, &config);
        assert!(matches!(
            actions.as_slice(),
            [Action::Fatal(NegotiationError::SaslUnavailable)]
        ));
    }

    #[test]
    fn test_registration_order_webirc_pass_first() {
        let mut neg = Negotiator::new();
        let mut config = make_config();
        config.webirc = vec![
            "pwd".to_string(),
            "gateway".to_string(),
            "host".to_string(),
            "1.2.3.4".to_string(),
        ];
        config.password = Some("serverpass".to_string());
        let caps = CapabilityTracker::new();
        let _ = neg.start();

        let actions = neg.on_cap(&event_for(":srv CAP * LS :batch"), &caps, &config);
        let lines = sent_lines(&actions);
        assert_eq!(
            lines,
            vec![
                "CAP END",
                "WEBIRC pwd gateway host 1.2.3.4",
                "PASS serverpass",
                "NICK testbot",
                "USER bot 0 * :Test Bot",
            ]
        );
    }

    #[test]
    fn test_nick_collision_increments_deterministically() {
        let mut neg = Negotiator::new();
        let config = make_config();
        let caps = CapabilityTracker::new();
        let _ = neg.start();
        let _ = neg.on_cap(&event_for(":srv CAP * LS :"), &caps, &config);

        let actions = neg.on_numeric(
            "433",
            &event_for(":srv 433 * testbot :Nickname is already in use"),
            &config,
        );
        assert_eq!(sent_lines(&actions), vec!["NICK testbot1"]);

        let actions = neg.on_numeric(
            "433",
            &event_for(":srv 433 * testbot1 :Nickname is already in use"),
            &config,
        );
        assert_eq!(sent_lines(&actions), vec!["NICK testbot2"]);
    }

    #[test]
    fn test_welcome_completes_with_assigned_nick() {
        let mut neg = Negotiator::new();
        let config = make_config();
        let caps = CapabilityTracker::new();
        let _ = neg.start();
        let _ = neg.on_cap(&event_for(":srv CAP * LS :"), &caps, &config);

        let actions = neg.on_numeric("001", &event_for(":srv 001 testbot1 :Welcome"), &config);
        assert_eq!(neg.state(), NegotiationState::Registered);
        assert!(matches!(
            actions.as_slice(),
            [Action::Registered { nick }] if nick == "testbot1"
        ));
    }

    #[test]
    fn test_server_error_during_handshake_is_fatal() {
        let mut neg = Negotiator::new();
        let _ = neg.start();
        let actions = neg.on_error("Closing Link");
        assert!(matches!(
            actions.as_slice(),
            [Action::Fatal(NegotiationError::ServerError(_))]
        ));
    }
}
