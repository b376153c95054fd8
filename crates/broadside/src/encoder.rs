//! Outbound command encoder: local intents to wire frames.

use broadside_protocol::{
    Codec, Command, Coord, Handshake, Identity, JsonCodec, NewMatch, Positions, ProtocolError,
};
use serde_json::Value;

/// Something the local player wants to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Lock the fleet layout.
    LockBoard(Positions),
    /// Fire at a cell on the opponent's grid.
    Attack(Coord),
    /// Use a bonus. The payload is passed through untouched.
    UseBonus(Value),
    /// Ask for another match.
    RequestNewMatch,
}

impl Intent {
    /// The command this intent is sent as.
    pub fn into_command(self) -> Command {
        match self {
            Self::LockBoard(positions) => Command::ShipPositions(positions),
            Self::Attack(target) => Command::Attack(target),
            Self::UseBonus(payload) => Command::Bonus(payload),
            Self::RequestNewMatch => Command::NewMatch(NewMatch {}),
        }
    }
}

/// Encodes [`Command`]s with a [`Codec`].
#[derive(Debug, Clone, Default)]
pub struct CommandEncoder<C: Codec = JsonCodec> {
    codec: C,
}

impl<C: Codec> CommandEncoder<C> {
    /// Wraps `codec`.
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Encodes one command as a frame.
    pub fn encode(&self, command: &Command) -> Result<Vec<u8>, ProtocolError> {
        let bytes = self.codec.encode(command)?;
        tracing::trace!(kind = command.kind(), len = bytes.len(), "command encoded");
        Ok(bytes)
    }

    /// The `connection` frame for a (re)connect, resuming `identity` if any.
    pub fn handshake(
        &self,
        identity: Option<&Identity>,
        use_ai_opponent: bool,
    ) -> Result<Vec<u8>, ProtocolError> {
        self.encode(&Command::Connection(Handshake::new(identity, use_ai_opponent)))
    }

    /// The codec in use.
    pub fn codec(&self) -> &C {
        &self.codec
    }
}
