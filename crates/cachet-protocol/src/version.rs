//! Version tagging for sealed plaintext records.
//!
//! Header and body plaintexts are sum types tagged by an on-wire version
//! number: a two-element array of `(version, payload)`. Only version 1 is
//! processed. Versions 2 through 10 are reserved; their payload leads with
//! a meta record carrying a `crit` flag, which tells an old client whether
//! the unknown message may be shown as a placeholder or must surface as a
//! hard "please upgrade" failure. Anything above the reserved range is
//! preserved with the critical flag forced on.
//!
//! Unknown payloads are kept as decoded MessagePack values so that a
//! decode/re-encode cycle is lossless, extension tags included.

use serde::{Deserialize, Serialize};

/// The only processable plaintext version.
pub const PLAINTEXT_VERSION_V1: u32 = 1;

/// Highest version reserved with the known meta-record payload prefix.
pub const MAX_RESERVED_PLAINTEXT_VERSION: u32 = 10;

/// Meta record leading reserved future-version payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaintextMetaInfo {
    /// Whether the producing client considers silently ignoring this
    /// message unacceptable.
    pub crit: bool,
}

/// A plaintext record of a version this client does not process.
///
/// The payload is preserved verbatim so the record can be re-encoded
/// without corruption.
#[derive(Clone, Debug, PartialEq)]
pub struct UnsupportedPlaintext {
    /// The on-wire version tag.
    pub version: u32,
    /// Whether the producer marked the version critical.
    pub critical: bool,
    /// The undecoded payload.
    pub(crate) raw: rmpv::Value,
}

impl UnsupportedPlaintext {
    /// Classify a decoded future-version payload.
    ///
    /// Reserved versions must lead with the meta record; a payload without
    /// one is malformed and reported through `E`. Versions beyond the
    /// reserved range default to critical.
    pub(crate) fn classify<E: serde::de::Error>(
        version: u32,
        raw: rmpv::Value,
    ) -> Result<Self, E> {
        if (2..=MAX_RESERVED_PLAINTEXT_VERSION).contains(&version) {
            let critical = reserved_crit_flag(&raw).ok_or_else(|| {
                E::custom(format!(
                    "reserved plaintext version {} without meta record",
                    version
                ))
            })?;
            Ok(Self {
                version,
                critical,
                raw,
            })
        } else {
            Ok(Self {
                version,
                critical: true,
                raw,
            })
        }
    }

    /// The preserved payload, for re-encoding.
    pub(crate) fn raw(&self) -> &rmpv::Value {
        &self.raw
    }
}

/// Extract the `crit` flag from a reserved payload's leading meta record.
///
/// Reserved versions may append fields after the meta record, so only the
/// prefix is inspected. Both positional and named encodings are accepted.
fn reserved_crit_flag(raw: &rmpv::Value) -> Option<bool> {
    let meta = match raw {
        rmpv::Value::Array(fields) => fields.first()?,
        rmpv::Value::Map(entries) => {
            let (_, value) = entries
                .iter()
                .find(|(key, _)| key.as_str() == Some("mi"))?;
            value
        }
        _ => return None,
    };
    match meta {
        rmpv::Value::Array(fields) => fields.first()?.as_bool(),
        rmpv::Value::Map(entries) => entries
            .iter()
            .find(|(key, _)| key.as_str() == Some("crit"))
            .and_then(|(_, value)| value.as_bool()),
        _ => None,
    }
}
