//! Protocol versions and frame direction.
//!
//! The version byte carries both: the most significant bit distinguishes a
//! request (0) from a response (1), the remaining seven bits are the version
//! code. OSS versions use codes 3, 4, 5; the DSE dialect uses 0x41 and 0x42.
//!
//! Feature gates compare version codes ordinally, so the DSE dialects (0x41,
//! 0x42) take the v5-era layouts (reason maps, 32-bit query flags, keyspace
//! per statement) while modern segment framing stays OSS-v5 only.

use std::fmt;

use crate::errors::ProtocolViolation;

/// A protocol version this codec can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// CQL native protocol v3
    V3,
    /// CQL native protocol v4
    V4,
    /// CQL native protocol v5
    V5,
    /// DSE dialect v1
    DseV1,
    /// DSE dialect v2
    DseV2,
}

impl ProtocolVersion {
    /// The seven-bit version code as it appears on the wire.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::V3 => 0x03,
            Self::V4 => 0x04,
            Self::V5 => 0x05,
            Self::DseV1 => 0x41,
            Self::DseV2 => 0x42,
        }
    }

    /// Parse a version code (direction bit already masked off).
    pub fn from_code(code: u8) -> Result<Self, ProtocolViolation> {
        match code {
            0x03 => Ok(Self::V3),
            0x04 => Ok(Self::V4),
            0x05 => Ok(Self::V5),
            0x41 => Ok(Self::DseV1),
            0x42 => Ok(Self::DseV2),
            other => Err(ProtocolViolation::UnknownVersion(other)),
        }
    }

    /// True for the DSE dialect versions.
    #[must_use]
    pub const fn is_dse(self) -> bool {
        matches!(self, Self::DseV1 | Self::DseV2)
    }

    /// Unset bound values, warnings, and custom payloads arrived with v4.
    #[must_use]
    pub const fn supports_unset_values(self) -> bool {
        self.code() >= 0x04
    }

    /// FUNCTION and AGGREGATE schema change targets arrived with v4.
    #[must_use]
    pub const fn supports_function_targets(self) -> bool {
        self.code() >= 0x04
    }

    /// Warning and custom payload envelopes arrived with v4.
    #[must_use]
    pub const fn supports_envelopes(self) -> bool {
        self.code() >= 0x04
    }

    /// Read/write failure errors carry a per-replica reason map from v5 on.
    #[must_use]
    pub const fn has_reason_maps(self) -> bool {
        self.code() >= 0x05
    }

    /// Query parameter flags widen from one byte to an int from v5 on.
    #[must_use]
    pub const fn uses_int_query_flags(self) -> bool {
        self.code() >= 0x05
    }

    /// Per-statement keyspace and now-in-seconds fields exist from v5 on.
    #[must_use]
    pub const fn supports_keyspace_per_statement(self) -> bool {
        self.code() >= 0x05
    }

    /// Prepared results carry a separate result metadata id from v5 on.
    #[must_use]
    pub const fn has_result_metadata_id(self) -> bool {
        self.code() >= 0x05
    }

    /// Self-delimiting segment framing is OSS v5 only.
    #[must_use]
    pub const fn uses_segment_framing(self) -> bool {
        matches!(self, Self::V5)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V3 => f.write_str("v3"),
            Self::V4 => f.write_str("v4"),
            Self::V5 => f.write_str("v5"),
            Self::DseV1 => f.write_str("DSEv1"),
            Self::DseV2 => f.write_str("DSEv2"),
        }
    }
}

/// Whether a frame travels client-to-server or server-to-client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server
    Request,
    /// Server to client
    Response,
}

impl Direction {
    const RESPONSE_BIT: u8 = 0x80;

    /// Combine this direction with a version into the wire version byte.
    #[must_use]
    pub const fn version_byte(self, version: ProtocolVersion) -> u8 {
        match self {
            Self::Request => version.code(),
            Self::Response => version.code() | Self::RESPONSE_BIT,
        }
    }

    /// Split a wire version byte into direction and version.
    pub fn split_version_byte(
        byte: u8,
    ) -> Result<(Self, ProtocolVersion), ProtocolViolation> {
        let direction =
            if byte & Self::RESPONSE_BIT == 0 { Self::Request } else { Self::Response };
        let version = ProtocolVersion::from_code(byte & !Self::RESPONSE_BIT)?;
        Ok((direction, version))
    }
}
