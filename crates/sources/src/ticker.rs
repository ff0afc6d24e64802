//! Emits the current time as messages on a fixed interval.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, SecondsFormat, TimeZone};
use tokio::sync::mpsc;
use tracing::{debug, info};

use oscbridge_core::config::Ticker;
use oscbridge_core::{Argument, Message};

use crate::error::SourceError;
use crate::source::{RunLoop, Source, SourceChannels};

/// Address suffix (classic reference-time layout) → strftime format.
const TIME_PARTS: &[(&str, &str)] = &[
    ("2006", "%Y"),
    ("06", "%y"),
    ("Jan", "%b"),
    ("January", "%B"),
    ("01", "%m"),
    ("1", "%-m"),
    ("Mon", "%a"),
    ("Monday", "%A"),
    ("2", "%-d"),
    ("_2", "%e"),
    ("02", "%d"),
    ("__2", "%_j"),
    ("002", "%j"),
    ("15", "%H"),
    ("3", "%-I"),
    ("03", "%I"),
    ("4", "%-M"),
    ("04", "%M"),
    ("5", "%-S"),
    ("05", "%S"),
    ("PM", "%p"),
];

/// `/time/rfc3339` followed by one `/time/parts/<layout>` message per part.
pub fn time_messages<Tz>(now: &DateTime<Tz>) -> Vec<Message>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut messages = Vec::with_capacity(TIME_PARTS.len() + 1);
    messages.push(Message::new(
        "/time/rfc3339",
        vec![Argument::string(now.to_rfc3339_opts(SecondsFormat::Secs, true))],
    ));
    for (layout, format) in TIME_PARTS {
        messages.push(Message::new(
            format!("/time/parts/{}", layout),
            vec![Argument::string(now.format(format).to_string())],
        ));
    }
    messages
}

pub struct TickerSource {
    config: Ticker,
    debug: bool,
    channels: SourceChannels,
    run_loop: RunLoop,
}

impl TickerSource {
    pub fn new(config: Ticker, debug: bool) -> Self {
        Self {
            config,
            debug,
            channels: SourceChannels::new(),
            run_loop: RunLoop::new(),
        }
    }
}

#[async_trait]
impl Source for TickerSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn start(&self) -> Result<(), SourceError> {
        let name = self.config.name.clone();
        let period = Duration::from_millis(self.config.refresh_rate_millis.max(1));
        let events = self.channels.event_sender();
        let debug = self.debug;

        info!(source = %name, refresh_rate_millis = self.config.refresh_rate_millis, "Starting ticker");
        self.run_loop.spawn(&self.config.name, move |shutdown| async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if debug {
                            debug!(source = %name, "Updating time...");
                        }
                        for message in time_messages(&Local::now()) {
                            if events.send(message).await.is_err() {
                                return;
                            }
                        }
                    }
                    _ = shutdown.notified() => return,
                }
            }
        })
    }

    async fn stop(&self) {
        self.run_loop.stop(&self.config.name).await;
    }

    fn take_events(&self) -> Option<mpsc::Receiver<Message>> {
        self.channels.take_events()
    }

    fn take_fatal_errors(&self) -> Option<mpsc::Receiver<SourceError>> {
        self.channels.take_fatal_errors()
    }

    async fn send(&self, _message: Message) -> Result<(), SourceError> {
        Err(SourceError::SendUnsupported {
            name: self.config.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn value_of<'a>(messages: &'a [Message], address: &str) -> &'a str {
        &messages
            .iter()
            .find(|m| m.address == address)
            .unwrap_or_else(|| panic!("no message for {address}"))
            .arguments[0]
            .value
    }

    #[test]
    fn renders_every_part() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 17, 8, 9).unwrap();
        let messages = time_messages(&now);

        assert_eq!(messages.len(), TIME_PARTS.len() + 1);
        assert_eq!(value_of(&messages, "/time/rfc3339"), "2024-03-05T17:08:09Z");
        assert_eq!(value_of(&messages, "/time/parts/2006"), "2024");
        assert_eq!(value_of(&messages, "/time/parts/06"), "24");
        assert_eq!(value_of(&messages, "/time/parts/Jan"), "Mar");
        assert_eq!(value_of(&messages, "/time/parts/January"), "March");
        assert_eq!(value_of(&messages, "/time/parts/01"), "03");
        assert_eq!(value_of(&messages, "/time/parts/1"), "3");
        assert_eq!(value_of(&messages, "/time/parts/Mon"), "Tue");
        assert_eq!(value_of(&messages, "/time/parts/Monday"), "Tuesday");
        assert_eq!(value_of(&messages, "/time/parts/2"), "5");
        assert_eq!(value_of(&messages, "/time/parts/_2"), " 5");
        assert_eq!(value_of(&messages, "/time/parts/02"), "05");
        assert_eq!(value_of(&messages, "/time/parts/002"), "065");
        assert_eq!(value_of(&messages, "/time/parts/15"), "17");
        assert_eq!(value_of(&messages, "/time/parts/3"), "5");
        assert_eq!(value_of(&messages, "/time/parts/03"), "05");
        assert_eq!(value_of(&messages, "/time/parts/4"), "8");
        assert_eq!(value_of(&messages, "/time/parts/04"), "08");
        assert_eq!(value_of(&messages, "/time/parts/5"), "9");
        assert_eq!(value_of(&messages, "/time/parts/05"), "09");
        assert_eq!(value_of(&messages, "/time/parts/PM"), "PM");
    }

    #[tokio::test]
    async fn emits_on_interval_and_refuses_send() {
        let ticker = TickerSource::new(
            Ticker {
                name: "clock".into(),
                prefix: String::new(),
                enabled: true,
                refresh_rate_millis: 10,
            },
            false,
        );
        let mut events = ticker.take_events().unwrap();
        ticker.start().await.unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.address, "/time/rfc3339");
        assert_eq!(first.arguments[0].kind, "string");

        assert!(matches!(
            ticker.send(first).await,
            Err(SourceError::SendUnsupported { .. })
        ));
        ticker.stop().await;
    }
}
