//! SASL authentication messages (0x03, 0x0E, 0x0F, 0x10).
//!
//! Authenticate names the server's authenticator class; the challenge,
//! response, and success messages each carry one nullable `[bytes]` token
//! whose contents belong to the SASL mechanism, not to this codec.

use bytes::{Buf, BufMut, Bytes};

use crate::{
    errors::Result,
    message::{Message, MessageCodec, Opcode, wrong_message},
    primitives,
};

/// Server request to authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticate {
    /// Fully qualified authenticator class name
    pub authenticator: String,
}

/// SASL challenge token from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// Mechanism-defined token; null is meaningful
    pub token: Option<Bytes>,
}

/// SASL response token from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Mechanism-defined token; null is meaningful
    pub token: Option<Bytes>,
}

/// Final SASL token on successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    /// Mechanism-defined token; null is meaningful
    pub token: Option<Bytes>,
}

/// Codec for Authenticate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticateCodec;

impl MessageCodec for AuthenticateCodec {
    fn opcode(&self) -> Opcode {
        Opcode::Authenticate
    }

    fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
        let Message::Authenticate(auth) = message else {
            return Err(wrong_message(Opcode::Authenticate, message));
        };
        primitives::write_string(dst, &auth.authenticator)
    }

    fn encoded_size(&self, message: &Message) -> Result<usize> {
        let Message::Authenticate(auth) = message else {
            return Err(wrong_message(Opcode::Authenticate, message));
        };
        Ok(primitives::size_of_string(&auth.authenticator))
    }

    fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
        let authenticator = primitives::read_string(src)?;
        Ok(Message::Authenticate(Authenticate { authenticator }))
    }
}

macro_rules! token_codec {
    ($codec:ident, $opcode:ident, $payload:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $codec;

        impl MessageCodec for $codec {
            fn opcode(&self) -> Opcode {
                Opcode::$opcode
            }

            fn encode(&self, message: &Message, dst: &mut dyn BufMut) -> Result<()> {
                let Message::$opcode($payload { token }) = message else {
                    return Err(wrong_message(Opcode::$opcode, message));
                };
                primitives::write_bytes(dst, token.as_deref())
            }

            fn encoded_size(&self, message: &Message) -> Result<usize> {
                let Message::$opcode($payload { token }) = message else {
                    return Err(wrong_message(Opcode::$opcode, message));
                };
                Ok(primitives::size_of_bytes(token.as_deref()))
            }

            fn decode(&self, src: &mut dyn Buf) -> Result<Message> {
                let token = primitives::read_bytes(src)?;
                Ok(Message::$opcode($payload { token }))
            }
        }
    };
}

token_codec!(AuthChallengeCodec, AuthChallenge, AuthChallenge, "Codec for AuthChallenge.");
token_codec!(AuthResponseCodec, AuthResponse, AuthResponse, "Codec for AuthResponse.");
token_codec!(AuthSuccessCodec, AuthSuccess, AuthSuccess, "Codec for AuthSuccess.");
