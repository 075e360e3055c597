//! Tagged fields: the `(type, length, value)` TLV stream between the
//! timestamp and the signature envelope.

use std::collections::BTreeSet;

use tracing::{trace, warn};

use crate::bitpack::{expand_5_to_8, pack_8_to_5};
use crate::error::{Bolt11Error, Result};

const TYPE_PAYMENT_HASH: u8 = 1;
const TYPE_ROUTE_HINT: u8 = 3;
const TYPE_FEATURE_BITS: u8 = 5;
const TYPE_EXPIRE_TIME: u8 = 6;
const TYPE_FALLBACK_ADDRESS: u8 = 9;
const TYPE_DESCRIPTION: u8 = 13;
const TYPE_PAYMENT_SECRET: u8 = 16;
const TYPE_PAYEE: u8 = 19;
const TYPE_PURPOSE_COMMIT_HASH: u8 = 23;
const TYPE_MIN_FINAL_CLTV_EXPIRY: u8 = 24;
const TYPE_METADATA: u8 = 27;

const PAYMENT_HASH_WORDS: usize = 52;
const PAYEE_WORDS: usize = 53;

/// One entry advising the payer how to reach the payee via a private
/// channel. Fixed 51-byte layout on the wire: pubkey(33) || scid(8) ||
/// fee_base(4) || fee_proportional(4) || cltv_delta(2), all big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHop {
    pub pubkey: [u8; 33],
    pub short_channel_id: [u8; 8],
    pub fee_base_msat: u32,
    pub fee_proportional_millionths: u32,
    pub cltv_expiry_delta: u16,
}

impl RouteHop {
    const WIRE_LEN: usize = 51;

    fn to_bytes(&self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        out[0..33].copy_from_slice(&self.pubkey);
        out[33..41].copy_from_slice(&self.short_channel_id);
        out[41..45].copy_from_slice(&self.fee_base_msat.to_be_bytes());
        out[45..49].copy_from_slice(&self.fee_proportional_millionths.to_be_bytes());
        out[49..51].copy_from_slice(&self.cltv_expiry_delta.to_be_bytes());
        out
    }

    fn from_bytes(data: &[u8]) -> Self {
        debug_assert_eq!(data.len(), Self::WIRE_LEN);
        let mut pubkey = [0u8; 33];
        pubkey.copy_from_slice(&data[0..33]);
        let mut short_channel_id = [0u8; 8];
        short_channel_id.copy_from_slice(&data[33..41]);
        RouteHop {
            pubkey,
            short_channel_id,
            fee_base_msat: u32::from_be_bytes(data[41..45].try_into().unwrap()),
            fee_proportional_millionths: u32::from_be_bytes(data[45..49].try_into().unwrap()),
            cltv_expiry_delta: u16::from_be_bytes(data[49..51].try_into().unwrap()),
        }
    }
}

/// A single named `required`/`optional` feature pair, e.g. `var_onion_optin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturePair {
    pub required: bool,
    pub supported: bool,
}

const NAMED_FEATURE_BITS: [&str; 10] = [
    "option_data_loss_protect",
    "initial_routing_sync",
    "option_upfront_shutdown_script",
    "gossip_queries",
    "var_onion_optin",
    "gossip_queries_ex",
    "option_static_remotekey",
    "payment_secret",
    "basic_mpp",
    "option_support_large_channel",
];

/// A BOLT 9 feature bitfield: the named even/odd pairs plus whatever lies
/// beyond them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureBits {
    pub word_length: usize,
    pairs: [Option<FeaturePair>; 10],
    pub extra_bits: BTreeSet<u32>,
    pub has_required_extra: bool,
}

impl FeatureBits {
    pub fn named(&self, name: &str) -> Option<FeaturePair> {
        NAMED_FEATURE_BITS
            .iter()
            .position(|&n| n == name)
            .and_then(|i| self.pairs[i])
    }

    pub fn option_data_loss_protect(&self) -> Option<FeaturePair> {
        self.pairs[0]
    }
    pub fn initial_routing_sync(&self) -> Option<FeaturePair> {
        self.pairs[1]
    }
    pub fn option_upfront_shutdown_script(&self) -> Option<FeaturePair> {
        self.pairs[2]
    }
    pub fn gossip_queries(&self) -> Option<FeaturePair> {
        self.pairs[3]
    }
    pub fn var_onion_optin(&self) -> Option<FeaturePair> {
        self.pairs[4]
    }
    pub fn gossip_queries_ex(&self) -> Option<FeaturePair> {
        self.pairs[5]
    }
    pub fn option_static_remotekey(&self) -> Option<FeaturePair> {
        self.pairs[6]
    }
    pub fn payment_secret(&self) -> Option<FeaturePair> {
        self.pairs[7]
    }
    pub fn basic_mpp(&self) -> Option<FeaturePair> {
        self.pairs[8]
    }
    pub fn option_support_large_channel(&self) -> Option<FeaturePair> {
        self.pairs[9]
    }

    /// Build a feature field from an explicit set of set bit indices (bit 0
    /// = LSB of the last wire word) and a chosen wire width.
    pub fn from_bit_indices(word_length: usize, set_bits: &BTreeSet<u32>) -> Self {
        let total_bits = (word_length * 5) as u32;
        let mut pairs = [None; 10];
        for (i, pair) in pairs.iter_mut().enumerate() {
            let even = 2 * i as u32;
            let odd = even + 1;
            let required = set_bits.contains(&even);
            let optional = set_bits.contains(&odd);
            if required || optional {
                *pair = Some(FeaturePair {
                    required,
                    supported: optional || required,
                });
            }
        }
        let extra_bits: BTreeSet<u32> = set_bits.iter().copied().filter(|&b| b >= 20).collect();
        let has_required_extra = extra_bits.iter().any(|b| b % 2 == 0);
        let _ = total_bits;
        FeatureBits {
            word_length,
            pairs,
            extra_bits,
            has_required_extra,
        }
    }

    fn set_bit_indices(&self) -> BTreeSet<u32> {
        let mut set = BTreeSet::new();
        for (i, pair) in self.pairs.iter().enumerate() {
            if let Some(p) = pair {
                if p.required {
                    set.insert(2 * i as u32);
                }
                if p.supported {
                    set.insert(2 * i as u32 + 1);
                }
            }
        }
        set.extend(self.extra_bits.iter().copied());
        set
    }

    fn to_words(&self) -> Vec<u8> {
        let set_bits = self.set_bit_indices();
        let mut words = vec![0u8; self.word_length];
        for w in 0..self.word_length {
            let mut value = 0u8;
            for shift in 0..5u32 {
                let global_index = ((self.word_length - 1 - w) * 5) as u32 + shift;
                if set_bits.contains(&global_index) {
                    value |= 1 << shift;
                }
            }
            words[w] = value;
        }
        words
    }

    fn from_words(words: &[u8]) -> Self {
        let word_length = words.len();
        let mut set_bits = BTreeSet::new();
        for (w, &value) in words.iter().enumerate() {
            for shift in 0..5u32 {
                if (value >> shift) & 1 == 1 {
                    let global_index = ((word_length - 1 - w) * 5) as u32 + shift;
                    set_bits.insert(global_index);
                }
            }
        }
        Self::from_bit_indices(word_length, &set_bits)
    }
}

/// One BOLT 11 tagged field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    PaymentHash([u8; 32]),
    PaymentSecret([u8; 32]),
    Description(String),
    PurposeCommitHash([u8; 32]),
    Payee([u8; 33]),
    ExpireTime(u64),
    MinFinalCltvExpiry(u64),
    FallbackAddress { version: u8, hash: Vec<u8> },
    RouteHint(Vec<RouteHop>),
    FeatureBits(FeatureBits),
    Metadata(Vec<u8>),
}

fn u64_to_words(value: u64) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let mut out = Vec::new();
    let mut remaining = value;
    while remaining > 0 {
        out.push((remaining % 32) as u8);
        remaining /= 32;
    }
    out.reverse();
    out
}

fn words_to_u64(words: &[u8]) -> u64 {
    words
        .iter()
        .fold(0u128, |acc, &w| (acc << 5) | w as u128)
        .min(u64::MAX as u128) as u64
}

fn header(type_code: u8, payload_len: usize) -> Result<[u8; 3]> {
    if payload_len > 1023 {
        return Err(Bolt11Error::TagExtendsBeyondData(type_code));
    }
    Ok([type_code, (payload_len / 32) as u8, (payload_len % 32) as u8])
}

fn wrap(type_code: u8, payload: Vec<u8>) -> Result<Vec<u8>> {
    let mut out = header(type_code, payload.len())?.to_vec();
    out.extend(payload);
    Ok(out)
}

impl Tag {
    /// Encode this tag to its wire words, including the 3-word header.
    pub fn to_words(&self) -> Result<Vec<u8>> {
        match self {
            Tag::PaymentHash(hash) => wrap(TYPE_PAYMENT_HASH, pack_8_to_5(hash)),
            Tag::PaymentSecret(secret) => wrap(TYPE_PAYMENT_SECRET, pack_8_to_5(secret)),
            Tag::PurposeCommitHash(hash) => wrap(TYPE_PURPOSE_COMMIT_HASH, pack_8_to_5(hash)),
            Tag::Payee(pubkey) => wrap(TYPE_PAYEE, pack_8_to_5(pubkey)),
            Tag::Metadata(bytes) => wrap(TYPE_METADATA, pack_8_to_5(bytes)),
            Tag::Description(text) => wrap(TYPE_DESCRIPTION, pack_8_to_5(text.as_bytes())),
            Tag::ExpireTime(seconds) => wrap(TYPE_EXPIRE_TIME, u64_to_words(*seconds)),
            Tag::MinFinalCltvExpiry(blocks) => {
                wrap(TYPE_MIN_FINAL_CLTV_EXPIRY, u64_to_words(*blocks))
            }
            Tag::FallbackAddress { version, hash } => {
                let mut payload = vec![*version];
                payload.extend(pack_8_to_5(hash));
                wrap(TYPE_FALLBACK_ADDRESS, payload)
            }
            Tag::RouteHint(hops) => {
                let mut bytes = Vec::with_capacity(hops.len() * RouteHop::WIRE_LEN);
                for hop in hops {
                    bytes.extend_from_slice(&hop.to_bytes());
                }
                wrap(TYPE_ROUTE_HINT, pack_8_to_5(&bytes))
            }
            Tag::FeatureBits(features) => wrap(TYPE_FEATURE_BITS, features.to_words()),
        }
    }

    /// Parse every tag in `data`, skipping unknown type codes and tags whose
    /// declared length doesn't match a strict variant's required size.
    pub fn parse_all(data: &[u8]) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut rest = data;
        while rest.len() >= 3 {
            let type_code = rest[0];
            let len = rest[1] as usize * 32 + rest[2] as usize;
            if rest.len() < 3 + len {
                return Err(Bolt11Error::TagExtendsBeyondData(type_code));
            }
            let payload = &rest[3..3 + len];
            match Self::parse_one(type_code, payload) {
                Some(tag) => {
                    trace!(type_code, len, "decoded tag");
                    tags.push(tag);
                }
                None => warn!(type_code, len, "skipped unknown or malformed tag"),
            }
            rest = &rest[3 + len..];
        }
        Ok(tags)
    }

    fn parse_one(type_code: u8, payload: &[u8]) -> Option<Tag> {
        match type_code {
            TYPE_PAYMENT_HASH => {
                exact_hash(payload, PAYMENT_HASH_WORDS).map(Tag::PaymentHash)
            }
            TYPE_PAYMENT_SECRET => {
                exact_hash(payload, PAYMENT_HASH_WORDS).map(Tag::PaymentSecret)
            }
            TYPE_PURPOSE_COMMIT_HASH => {
                exact_hash(payload, PAYMENT_HASH_WORDS).map(Tag::PurposeCommitHash)
            }
            TYPE_PAYEE => {
                if payload.len() != PAYEE_WORDS {
                    return None;
                }
                let bytes = expand_5_to_8(payload, false);
                if bytes.len() != 33 {
                    return None;
                }
                let mut out = [0u8; 33];
                out.copy_from_slice(&bytes);
                Some(Tag::Payee(out))
            }
            TYPE_METADATA => Some(Tag::Metadata(expand_5_to_8(payload, false))),
            TYPE_DESCRIPTION => {
                let bytes = expand_5_to_8(payload, false);
                String::from_utf8(bytes).ok().map(Tag::Description)
            }
            TYPE_EXPIRE_TIME => Some(Tag::ExpireTime(words_to_u64(payload))),
            TYPE_MIN_FINAL_CLTV_EXPIRY => Some(Tag::MinFinalCltvExpiry(words_to_u64(payload))),
            TYPE_FALLBACK_ADDRESS => {
                if payload.is_empty() {
                    return None;
                }
                let version = payload[0];
                let hash = expand_5_to_8(&payload[1..], false);
                Some(Tag::FallbackAddress { version, hash })
            }
            TYPE_ROUTE_HINT => {
                let bytes = expand_5_to_8(payload, false);
                let hops = bytes
                    .chunks(RouteHop::WIRE_LEN)
                    .filter(|c| c.len() == RouteHop::WIRE_LEN)
                    .map(RouteHop::from_bytes)
                    .collect();
                Some(Tag::RouteHint(hops))
            }
            TYPE_FEATURE_BITS => Some(Tag::FeatureBits(FeatureBits::from_words(payload))),
            _ => None,
        }
    }
}

fn exact_hash(payload: &[u8], expected_words: usize) -> Option<[u8; 32]> {
    if payload.len() != expected_words {
        return None;
    }
    let bytes = expand_5_to_8(payload, false);
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_from_hex(s: &str) -> [u8; 32] {
        let bytes = hex::decode(s).unwrap();
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        out
    }

    #[test]
    fn payment_hash_round_trips() {
        let hash =
            hash_from_hex("0001020304050607080900010203040506070809000102030405060708090102");
        let tag = Tag::PaymentHash(hash);
        let words = tag.to_words().unwrap();
        let parsed = Tag::parse_all(&words).unwrap();
        assert_eq!(parsed, vec![Tag::PaymentHash(hash)]);
    }

    #[test]
    fn description_round_trips() {
        let tag = Tag::Description("Please consider supporting this project".to_string());
        let words = tag.to_words().unwrap();
        let parsed = Tag::parse_all(&words).unwrap();
        assert_eq!(parsed, vec![tag]);
    }

    #[test]
    fn fallback_address_round_trips() {
        let hash = hex::decode("3172b5654f6683c8fb146959d347ce303cae4ca7").unwrap();
        let tag = Tag::FallbackAddress {
            version: 17,
            hash: hash.clone(),
        };
        let words = tag.to_words().unwrap();
        let parsed = Tag::parse_all(&words).unwrap();
        assert_eq!(parsed, vec![Tag::FallbackAddress { version: 17, hash }]);
    }

    #[test]
    fn expire_time_zero_encodes_to_single_word() {
        let tag = Tag::ExpireTime(0);
        assert_eq!(tag.to_words().unwrap(), vec![6, 0, 1, 0]);
    }

    #[test]
    fn mismatched_length_hash_tag_is_dropped() {
        // payment_hash header claiming 1 word of payload instead of 52
        let malformed = vec![TYPE_PAYMENT_HASH, 0, 1, 5];
        assert_eq!(Tag::parse_all(&malformed).unwrap(), vec![]);
    }

    #[test]
    fn unknown_type_code_is_skipped_not_rejected() {
        let unknown = vec![30u8, 0, 2, 1, 1];
        assert_eq!(Tag::parse_all(&unknown).unwrap(), vec![]);
    }

    #[test]
    fn truncated_tag_is_an_error() {
        let truncated = vec![TYPE_DESCRIPTION, 0, 10, 1, 2];
        assert!(Tag::parse_all(&truncated).is_err());
    }

    #[test]
    fn route_hint_round_trips() {
        let hop = RouteHop {
            pubkey: [3u8; 33],
            short_channel_id: [0, 0, 0, 0, 0, 1, 0, 0],
            fee_base_msat: 1000,
            fee_proportional_millionths: 20,
            cltv_expiry_delta: 3,
        };
        let tag = Tag::RouteHint(vec![hop.clone()]);
        let words = tag.to_words().unwrap();
        let parsed = Tag::parse_all(&words).unwrap();
        assert_eq!(parsed, vec![Tag::RouteHint(vec![hop])]);
    }

    #[test]
    fn feature_bits_named_pairs_and_extra() {
        let mut set_bits = BTreeSet::new();
        set_bits.insert(8); // var_onion_optin supported/required pair base
        set_bits.insert(14); // payment_secret
        set_bits.insert(99); // extra, odd -> not required
        let features = FeatureBits::from_bit_indices(20, &set_bits);
        assert!(features.var_onion_optin().unwrap().supported);
        assert!(features.payment_secret().unwrap().supported);
        assert!(features.extra_bits.contains(&99));
        assert!(!features.has_required_extra);

        let tag = Tag::FeatureBits(features.clone());
        let words = tag.to_words().unwrap();
        let parsed = Tag::parse_all(&words).unwrap();
        assert_eq!(parsed, vec![Tag::FeatureBits(features)]);
    }
}
