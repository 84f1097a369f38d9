use serde::{Deserialize, Serialize};

/// Stop whatever clip the device is playing.
pub const STOP_CLIPS: &str = "STOPCL";

/// Sent by a device when it finishes playing a clip sequence.
pub const SEQUENCE_ENDED: &str = "ENDP";

pub const END_OF_FILE: &str = "EOF";

/// Default filler clip letters, `DOTS-a.mp4` through `DOTS-w.mp4`.
pub const DOTS_CLIP_FIRST: char = 'a';
pub const DOTS_CLIP_LAST: char = 'w';

pub fn play_dots_clip(letter: char) -> String {
    format!("PLAY DOTS-{letter}.mp4")
}

/// A fixed message literal expected from one named device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSource {
    pub message: String,
    pub from_device: String,
}

impl SignalSource {
    pub fn new(message: impl Into<String>, from_device: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            from_device: from_device.into(),
        }
    }

    pub fn matches(&self, payload: &str, sender_name: &str) -> bool {
        self.message == payload && self.from_device == sender_name
    }
}

/// Reserved control words that steer the keep-alive schedulers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalBindings {
    /// Any managed device reporting this literal gets a stop and a fresh tick.
    pub sequence_ended: String,
    pub end_of_program: SignalSource,
    pub program_advance: SignalSource,
}

impl Default for SignalBindings {
    fn default() -> Self {
        Self {
            sequence_ended: SEQUENCE_ENDED.into(),
            end_of_program: SignalSource::new(END_OF_FILE, "AnaPC"),
            program_advance: SignalSource::new(END_OF_FILE, "VIDEOPC2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    SequenceEnded,
    EndOfProgram,
    ProgramAdvance,
}

impl SignalBindings {
    /// Every control signal the datagram carries. End-of-program and
    /// program-advance may share a literal and differ only by sender.
    pub fn classify(&self, payload: &str, sender_name: &str) -> Vec<ControlSignal> {
        let mut signals = Vec::new();
        if payload == self.sequence_ended {
            signals.push(ControlSignal::SequenceEnded);
        }
        if self.end_of_program.matches(payload, sender_name) {
            signals.push(ControlSignal::EndOfProgram);
        }
        if self.program_advance.matches(payload, sender_name) {
            signals.push(ControlSignal::ProgramAdvance);
        }
        signals
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
