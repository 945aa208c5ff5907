use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use bevy::log::{info, warn};

/// Fixed gift-to-slot table. Anything outside it is ignored on arrival.
pub const GIFT_SLOTS: [(&str, char); 4] = [
    ("chocolate", 'A'),
    ("ice_cream", 'B'),
    ("rose", 'C'),
    ("soccer", 'D'),
];

/// One audience action as the live-event collaborator reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct GiftEvent {
    pub gift: String,
    #[serde(default = "default_repeat")]
    pub repeat_count: u32,
}

fn default_repeat() -> u32 {
    1
}

pub fn slot_for_gift(name: &str) -> Option<char> {
    GIFT_SLOTS
        .iter()
        .find(|(gift, _)| *gift == name)
        .map(|&(_, label)| label)
}

pub fn vote_channel() -> (UnboundedSender<GiftEvent>, UnboundedReceiver<GiftEvent>) {
    mpsc::unbounded_channel()
}

/// Connect to the live-event collaborator and forward its gift stream, one
/// JSON event per line, into the vote channel. Runs until the peer closes or
/// the receiving side of the channel is gone. Connection problems are
/// cosmetic: the show keeps running on the keyboard transport alone.
pub async fn listen(addr: String, tx: UnboundedSender<GiftEvent>) {
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("live feed {addr} unavailable: {e}");
            return;
        }
    };
    info!("live feed connected to {addr}");

    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<GiftEvent>(line) {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("unparseable gift event {line:?}: {e}"),
                }
            }
            Ok(None) => {
                info!("live feed {addr} closed");
                return;
            }
            Err(e) => {
                warn!("live feed {addr} read error: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_gifts_map_to_slots() {
        assert_eq!(slot_for_gift("chocolate"), Some('A'));
        assert_eq!(slot_for_gift("ice_cream"), Some('B'));
        assert_eq!(slot_for_gift("rose"), Some('C'));
        assert_eq!(slot_for_gift("soccer"), Some('D'));
    }

    #[test]
    fn unknown_gifts_map_to_nothing() {
        assert_eq!(slot_for_gift("diamond"), None);
        assert_eq!(slot_for_gift(""), None);
        assert_eq!(slot_for_gift("Rose"), None);
    }

    #[test]
    fn gift_event_parses_with_and_without_repeat() {
        let event: GiftEvent = serde_json::from_str(r#"{"gift":"rose","repeat_count":5}"#).unwrap();
        assert_eq!(event.gift, "rose");
        assert_eq!(event.repeat_count, 5);

        let event: GiftEvent = serde_json::from_str(r#"{"gift":"soccer"}"#).unwrap();
        assert_eq!(event.repeat_count, 1);
    }
}
