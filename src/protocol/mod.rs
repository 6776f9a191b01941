//! The simulator wire protocol: the messages a running plan/learn
//! session exchanges with an external round-based simulator, a
//! [`Codec`] that turns them into bytes, and (behind the `simulator`
//! feature) a length-prefixed TCP transport exposed through one
//! `async_trait` so a future WebSocket or in-process transport can
//! stand in without touching the planner loop.
//!
//! No XML dialect is implemented; [`JsonCodec`] stands in for it. The
//! planner only consumes `Turn` and `RoundEnd` shapes off the wire, so
//! nothing downstream needs to know which codec produced them.

use serde::{Deserialize, Serialize};

/// one exchange with the simulator. `Turn` carries the fluents the
/// simulator observed this step and the horizon remaining; `RoundEnd`
/// carries the round's total reward; `SubmitAction` is the only message
/// the planner ever sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimulatorMessage {
    Turn { observed: Vec<(String, f64)>, steps_to_go: u32 },
    RoundEnd { reward: f64 },
    SubmitAction { action_index: usize },
}

/// encode/decode a [`SimulatorMessage`] to/from a self-contained byte
/// buffer; the transport is responsible for framing.
pub trait Codec: Send + Sync {
    fn encode(&self, message: &SimulatorMessage) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<SimulatorMessage, CodecError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// JSON stand-in for the real XML dialect. Sufficient for the test
/// harness and for local experimentation against a hand-rolled
/// simulator; a production deployment would swap in an XML codec
/// behind the same trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, message: &SimulatorMessage) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<SimulatorMessage, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))
    }
}

#[cfg(feature = "simulator")]
pub use tcp::TcpSimulatorClient;

#[cfg(feature = "simulator")]
mod tcp {
    use super::{Codec, CodecError, SimulatorMessage};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    /// a session with one simulator, speaking length-prefixed frames
    /// (a big-endian `u32` byte count, then that many codec-encoded
    /// bytes) of whatever `C` produces.
    pub struct TcpSimulatorClient<C: Codec> {
        stream: TcpStream,
        codec: C,
    }

    #[async_trait::async_trait]
    pub trait SimulatorTransport: Send {
        async fn send(&mut self, message: &SimulatorMessage) -> Result<(), CodecError>;
        async fn receive(&mut self) -> Result<SimulatorMessage, CodecError>;
    }

    impl<C: Codec> TcpSimulatorClient<C> {
        pub async fn connect(addr: &str, codec: C) -> std::io::Result<Self> {
            let stream = TcpStream::connect(addr).await?;
            Ok(Self { stream, codec })
        }
    }

    #[async_trait::async_trait]
    impl<C: Codec> SimulatorTransport for TcpSimulatorClient<C> {
        async fn send(&mut self, message: &SimulatorMessage) -> Result<(), CodecError> {
            let bytes = self.codec.encode(message)?;
            let len = bytes.len() as u32;
            self.stream.write_all(&len.to_be_bytes()).await.map_err(|e| CodecError::Malformed(e.to_string()))?;
            self.stream.write_all(&bytes).await.map_err(|e| CodecError::Malformed(e.to_string()))?;
            Ok(())
        }

        async fn receive(&mut self) -> Result<SimulatorMessage, CodecError> {
            let mut len_bytes = [0u8; 4];
            self.stream.read_exact(&mut len_bytes).await.map_err(|e| CodecError::Malformed(e.to_string()))?;
            let len = u32::from_be_bytes(len_bytes) as usize;
            let mut buf = vec![0u8; len];
            self.stream.read_exact(&mut buf).await.map_err(|e| CodecError::Malformed(e.to_string()))?;
            self.codec.decode(&buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_codec_round_trips_a_turn_message() {
        let codec = JsonCodec;
        let message = SimulatorMessage::Turn {
            observed: vec![("robot-at-home".into(), 1.0)],
            steps_to_go: 7,
        };
        let bytes = codec.encode(&message).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), message);
    }

    #[test]
    fn json_codec_round_trips_a_submit_action_message() {
        let codec = JsonCodec;
        let message = SimulatorMessage::SubmitAction { action_index: 3 };
        let bytes = codec.encode(&message).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), message);
    }

    #[test]
    fn malformed_bytes_are_a_codec_error() {
        let codec = JsonCodec;
        assert!(codec.decode(b"not json").is_err());
    }
}
