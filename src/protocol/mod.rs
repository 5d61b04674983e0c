//! Wire protocol for the coordination hub
//!
//! All control traffic is JSON text frames over a single WebSocket endpoint.
//! Every frame carries a `type` string discriminator, decoded into the tagged
//! enums in [`message`]; an unrecognized `type` fails decoding and the frame
//! is logged and dropped by the connection layer rather than silently
//! matched.
//!
//! Binary frames are opaque container bytes and never touch this module;
//! they are routed straight to the stream pipeline.

pub mod message;

pub use message::{ClientMessage, ServerMessage, StreamInfo};

/// Shared countdown duration carried in every `countdown` frame, in
/// milliseconds. Participants schedule their local action relative to the
/// client-supplied anchor timestamp plus this duration.
pub const COUNTDOWN_DURATION_MS: u64 = 3000;

/// Current wall-clock time as epoch milliseconds.
///
/// All timestamps on the wire are epoch milliseconds to match what clients
/// produce with `Date.now()`.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_ms_is_plausible() {
        // Anything after 2020-01-01 and counting in milliseconds.
        assert!(epoch_ms() > 1_577_836_800_000);
    }
}
