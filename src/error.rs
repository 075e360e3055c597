//! Error taxonomy for the BOLT 11 codec.

use thiserror::Error;

/// All error conditions the codec can surface.
///
/// Unknown tag *codes* on decode are deliberately not represented here: BOLT
/// 11's forward-compatibility clause requires them to be skipped silently,
/// never rejected. There is likewise no "unknown tag name" or "invalid hex"
/// variant: tags are constructed through [`crate::tag::Tag`], a closed enum,
/// so an unrecognized tag or malformed payload can't be built in the first
/// place.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Bolt11Error {
    #[error("bech32 string has no '1' separator")]
    NoSeparator,

    #[error("bech32 human-readable part is empty")]
    EmptyHrp,

    #[error("data part is too short: {0} words, need at least {1}")]
    TooShort(usize, usize),

    #[error("invalid bech32 character: '{0}'")]
    InvalidChar(char),

    #[error("bech32 checksum is invalid")]
    InvalidChecksum,

    #[error("unknown network prefix: '{0}'")]
    UnknownNetwork(String),

    #[error("invalid amount token: '{0}'")]
    InvalidAmount(String),

    #[error("pico-bitcoin amount '{0}' is not a multiple of 10")]
    PicoNotMultipleOfTen(String),

    #[error("tag of type {0} declares a length extending beyond the data part")]
    TagExtendsBeyondData(u8),

    #[error("missing required tag: {0}")]
    MissingRequiredTag(&'static str),

    #[error("timestamp exceeds the 35-bit wire range")]
    InvalidTimestamp,

    #[error("signing failed")]
    SignFailed,

    #[error("public key recovery failed")]
    RecoverFailed,
}

pub type Result<T> = std::result::Result<T, Bolt11Error>;
