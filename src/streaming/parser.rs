use tracing::{debug, warn};

use crate::models::DeliberationEvent;

/// Marker that starts a payload-carrying line.
pub const DATA_PREFIX: &str = "data:";

/// Events decoded from one frame, plus how many payload lines were dropped.
#[derive(Debug, Default, PartialEq)]
pub struct DecodedFrame {
    pub events: Vec<DeliberationEvent>,
    pub failures: usize,
}

/// Decode every `data:` line of a frame into an event.
///
/// Each payload line is decoded on its own. A line that fails to decode is
/// logged and skipped; the remaining lines are still decoded.
pub fn decode_frame(frame: &str) -> DecodedFrame {
    let mut decoded = DecodedFrame::default();

    for line in frame.lines() {
        let Some(data) = data_payload(line) else {
            continue;
        };

        if data.trim().is_empty() {
            continue;
        }

        match decode_payload(data) {
            Ok(event) => decoded.events.push(event),
            Err(reason) => {
                warn!(error = %reason, line = %truncate(data, 200), "Dropping malformed event");
                decoded.failures += 1;
            }
        }
    }

    if decoded.events.is_empty() && decoded.failures == 0 {
        debug!("Frame carried no payload lines");
    }

    decoded
}

/// The payload of a `data:` line, with the marker and one space removed.
fn data_payload(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.strip_prefix(DATA_PREFIX)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn decode_payload(data: &str) -> Result<DeliberationEvent, String> {
    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| e.to_string())?;
    DeliberationEvent::from_value(value).map_err(|e| e.to_string())
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
