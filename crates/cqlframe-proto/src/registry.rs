//! Per-version codec registry.
//!
//! A registry holds two opcode-indexed tables: the codecs used to encode
//! outgoing messages and the codecs used to decode incoming ones. Which
//! opcodes land on which side depends on the peer role: a client encodes
//! requests and decodes responses, a server the other way around.
//!
//! The builder seeds the default codec set for its version and role,
//! accepts additional codecs, rejects duplicate registrations, and
//! validates at build time that every mandatory opcode is covered. After
//! `build()` the registry is immutable; lookups are O(1) array indexing and
//! concurrent readers need no synchronization.

use std::sync::Arc;

use tracing::debug;

use crate::{
    errors::{CodecError, Result},
    message::{
        MessageCodec, Opcode,
        auth::{AuthChallengeCodec, AuthResponseCodec, AuthSuccessCodec, AuthenticateCodec},
        batch::BatchCodec,
        error::ErrorCodec,
        event::EventCodec,
        options::{OptionsCodec, SupportedCodec},
        prepare::{ExecuteCodec, PrepareCodec},
        query::QueryCodec,
        register::RegisterCodec,
        result::ResultCodec,
        startup::{ReadyCodec, StartupCodec},
    },
    version::ProtocolVersion,
};

/// Which side of the connection this registry serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    /// Encodes requests, decodes responses
    Client,
    /// Encodes responses, decodes requests
    Server,
}

const TABLE_SIZE: usize = 0x11;

type CodecTable = [Option<Arc<dyn MessageCodec>>; TABLE_SIZE];

fn default_request_codecs(version: ProtocolVersion) -> Vec<Arc<dyn MessageCodec>> {
    vec![
        Arc::new(StartupCodec),
        Arc::new(OptionsCodec),
        Arc::new(QueryCodec::new(version)),
        Arc::new(PrepareCodec::new(version)),
        Arc::new(ExecuteCodec::new(version)),
        Arc::new(RegisterCodec),
        Arc::new(BatchCodec::new(version)),
        Arc::new(AuthResponseCodec),
    ]
}

fn default_response_codecs(version: ProtocolVersion) -> Vec<Arc<dyn MessageCodec>> {
    vec![
        Arc::new(ErrorCodec::new(version)),
        Arc::new(ReadyCodec),
        Arc::new(AuthenticateCodec),
        Arc::new(SupportedCodec),
        Arc::new(ResultCodec::new(version)),
        Arc::new(EventCodec::new(version)),
        Arc::new(AuthChallengeCodec),
        Arc::new(AuthSuccessCodec),
    ]
}

/// Immutable opcode dispatch tables for one `(version, role)` pair.
pub struct CodecRegistry {
    version: ProtocolVersion,
    role: PeerRole,
    encoders: CodecTable,
    decoders: CodecTable,
}

impl CodecRegistry {
    /// Start building a registry seeded with the default codecs.
    #[must_use]
    pub fn builder(version: ProtocolVersion, role: PeerRole) -> CodecRegistryBuilder {
        let (encoders, decoders) = match role {
            PeerRole::Client => {
                (default_request_codecs(version), default_response_codecs(version))
            }
            PeerRole::Server => {
                (default_response_codecs(version), default_request_codecs(version))
            }
        };
        CodecRegistryBuilder { version, role, encoders, decoders }
    }

    /// The version this registry was built for.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// The role this registry was built for.
    #[must_use]
    pub const fn role(&self) -> PeerRole {
        self.role
    }

    /// Codec for encoding a message with this opcode.
    pub fn encoder(&self, opcode: Opcode) -> Result<&dyn MessageCodec> {
        self.encoders[opcode.to_u8() as usize].as_deref().ok_or(CodecError::Unsupported {
            opcode,
            version: self.version,
        })
    }

    /// Codec for decoding a body with this opcode.
    pub fn decoder(&self, opcode: Opcode) -> Result<&dyn MessageCodec> {
        self.decoders[opcode.to_u8() as usize].as_deref().ok_or(CodecError::Unsupported {
            opcode,
            version: self.version,
        })
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("version", &self.version)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Accumulates codecs for a [`CodecRegistry`].
pub struct CodecRegistryBuilder {
    version: ProtocolVersion,
    role: PeerRole,
    encoders: Vec<Arc<dyn MessageCodec>>,
    decoders: Vec<Arc<dyn MessageCodec>>,
}

impl CodecRegistryBuilder {
    /// Start from an empty registry instead of the defaults.
    ///
    /// Useful for hosts that supply their own codec set wholesale; `build()`
    /// still checks that every mandatory opcode is covered.
    #[must_use]
    pub fn empty(version: ProtocolVersion, role: PeerRole) -> Self {
        Self { version, role, encoders: Vec::new(), decoders: Vec::new() }
    }

    /// Register an encode-side codec; duplicates are rejected at build time.
    #[must_use]
    pub fn encoder(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.encoders.push(codec);
        self
    }

    /// Register a decode-side codec; duplicates are rejected at build time.
    #[must_use]
    pub fn decoder(mut self, codec: Arc<dyn MessageCodec>) -> Self {
        self.decoders.push(codec);
        self
    }

    /// Validate coverage and freeze the registry.
    ///
    /// # Errors
    ///
    /// Fails when an opcode is registered twice on one side, or when a
    /// mandatory opcode for the role is missing.
    pub fn build(self) -> Result<CodecRegistry> {
        let Self { version, role, encoders, decoders } = self;

        let (encode_mandatory, decode_mandatory): (Vec<Opcode>, Vec<Opcode>) = {
            let requests: Vec<Opcode> =
                Opcode::ALL.into_iter().filter(|o| o.is_request()).collect();
            let responses: Vec<Opcode> =
                Opcode::ALL.into_iter().filter(|o| !o.is_request()).collect();
            match role {
                PeerRole::Client => (requests, responses),
                PeerRole::Server => (responses, requests),
            }
        };

        let encoders = Self::into_table(encoders, &encode_mandatory, "encoder")?;
        let decoders = Self::into_table(decoders, &decode_mandatory, "decoder")?;

        debug!(%version, ?role, "codec registry built");
        Ok(CodecRegistry { version, role, encoders, decoders })
    }

    fn into_table(
        codecs: Vec<Arc<dyn MessageCodec>>,
        mandatory: &[Opcode],
        side: &str,
    ) -> Result<CodecTable> {
        let mut table: CodecTable = std::array::from_fn(|_| None);
        for codec in codecs {
            let slot = &mut table[codec.opcode().to_u8() as usize];
            if slot.is_some() {
                return Err(CodecError::invalid(format!(
                    "duplicate {side} registration for {:?}",
                    codec.opcode()
                )));
            }
            *slot = Some(codec);
        }
        for opcode in mandatory {
            if table[opcode.to_u8() as usize].is_none() {
                return Err(CodecError::invalid(format!(
                    "missing mandatory {side} for {opcode:?}"
                )));
            }
        }
        Ok(table)
    }
}
