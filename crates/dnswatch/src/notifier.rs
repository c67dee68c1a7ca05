//! Delivery side of alive transitions.
//!
//! The evaluation cycle only decides that a notification is due; a
//! [`Notifier`] receives the [`AliveTransition`] on a spawned task and owns
//! formatting and delivery.

use async_trait::async_trait;
use dnswatch_core::AliveTransition;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Receiver of alive transitions
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one transition
    async fn notify(&self, transition: &AliveTransition);
}

/// Subject and body templates for rendered notifications.
///
/// Placeholders: `%(time)`, `%(zone)`, `%(group)`, `%(name)`, `%(type)`,
/// `%(content)`, `%(previous)`, `%(current)` and `%(hostname)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Subject template
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Body template
    #[serde(default = "default_body")]
    pub body: String,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            body: default_body(),
        }
    }
}

fn default_subject() -> String {
    String::from("[dnswatch] %(name) %(type) %(content) is %(current)")
}

fn default_body() -> String {
    String::from(
        "time: %(time)\nhost: %(hostname)\nzone: %(zone)\ngroup: %(group)\n\
         record: %(name) %(type) %(content)\nstate: %(previous) -> %(current)\n",
    )
}

const fn state_word(alive: bool) -> &'static str {
    if alive {
        "alive"
    } else {
        "dead"
    }
}

/// Renders templates and emits them as log events
#[derive(Debug, Clone)]
pub struct LogNotifier {
    templates: NotifierConfig,
    hostname: String,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(NotifierConfig::default())
    }
}

impl LogNotifier {
    /// Create a notifier with the given templates
    #[must_use]
    pub fn new(templates: NotifierConfig) -> Self {
        Self {
            templates,
            hostname: local_hostname(),
        }
    }

    /// Override the value substituted for `%(hostname)`
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Render `template` for `transition`
    #[must_use]
    pub fn render(&self, template: &str, transition: &AliveTransition) -> String {
        let time = transition.at.to_rfc3339();
        let replacements = [
            ("%(time)", time.as_str()),
            ("%(zone)", transition.zone.as_str()),
            ("%(group)", transition.group.as_str()),
            ("%(name)", transition.name.as_str()),
            ("%(type)", transition.record_type.as_str()),
            ("%(content)", transition.content.as_str()),
            ("%(previous)", state_word(transition.previous)),
            ("%(current)", state_word(transition.current)),
            ("%(hostname)", self.hostname.as_str()),
        ];

        // Single pass so substituted values are never re-expanded.
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("%(") {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match replacements.iter().find(|(key, _)| tail.starts_with(key)) {
                Some((key, value)) => {
                    out.push_str(value);
                    rest = &tail[key.len()..];
                }
                None => {
                    out.push_str("%(");
                    rest = &tail[2..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Rendered subject and body
    #[must_use]
    pub fn message(&self, transition: &AliveTransition) -> (String, String) {
        (
            self.render(&self.templates.subject, transition),
            self.render(&self.templates.body, transition),
        )
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, transition: &AliveTransition) {
        let (subject, body) = self.message(transition);
        info!(
            zone = %transition.zone,
            record = %transition.name,
            content = %transition.content,
            previous = transition.previous,
            current = transition.current,
            %subject,
            %body,
            "alive notification"
        );
    }
}

fn local_hostname() -> String {
    hostname::get().map_or_else(
        |_| String::from("localhost"),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Forwards transitions to an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<AliveTransition>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AliveTransition>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, transition: &AliveTransition) {
        if self.tx.send(transition.clone()).await.is_err() {
            warn!(record = %transition.name, "notification receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn transition() -> AliveTransition {
        AliveTransition {
            at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            zone: "example.com.".into(),
            group: "web".into(),
            name: "www.example.com.".into(),
            record_type: "A".into(),
            content: "192.0.2.10".into(),
            previous: true,
            current: false,
        }
    }

    #[test]
    fn test_render_placeholders() {
        let notifier = LogNotifier::default().hostname("watch01");
        let (subject, body) = notifier.message(&transition());
        assert_eq!(subject, "[dnswatch] www.example.com. A 192.0.2.10 is dead");
        assert!(body.contains("time: 2024-05-01T12:00:00+00:00"));
        assert!(body.contains("host: watch01"));
        assert!(body.contains("group: web"));
        assert!(body.contains("state: alive -> dead"));
    }

    #[test]
    fn test_default_hostname_is_system_name() {
        let expected = hostname::get().unwrap().to_string_lossy().into_owned();
        let notifier = LogNotifier::default();
        assert_eq!(notifier.hostname, expected);
        assert_eq!(notifier.render("%(hostname)", &transition()), expected);
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let notifier = LogNotifier::default();
        let mut t = transition();
        t.name = "%(zone)".into();
        assert_eq!(
            notifier.render("%(name) %(nope) 100%", &t),
            "%(zone) %(nope) 100%"
        );
    }

    #[tokio::test]
    async fn test_channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::channel(4);
        notifier.notify(&transition()).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received, transition());

        drop(rx);
        // Dropped receiver is logged, not fatal.
        notifier.notify(&transition()).await;
    }
}
