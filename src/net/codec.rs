//! JSON message codec

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encodes wire messages as JSON
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode<T: Serialize>(msg: &T) -> Result<Bytes, CodecError> {
        serde_json::to_vec(msg)
            .map(Bytes::from)
            .map_err(CodecError::Encode)
    }

    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ObjectId;
    use crate::net::protocol::{ClientMsg, ServerMsg};

    #[test]
    fn garbage_is_a_decode_error() {
        let result = JsonCodec::decode::<ClientMsg>(b"{\"type\":\"warp\"}");
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn messages_survive_the_codec() {
        let msg = ServerMsg::SpawnAssigned { id: ObjectId(7) };
        let bytes = JsonCodec::encode(&msg).expect("encode");
        assert_eq!(JsonCodec::decode::<ServerMsg>(&bytes).expect("decode"), msg);
    }
}
