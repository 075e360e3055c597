//! The public `encode` / `sign` / `decode` API and the decoded `Invoice`
//! record.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::amount::{hrp_to_msat, msat_to_hrp, msat_to_sat};
use crate::bech32;
use crate::bitpack::{expand_5_to_8, pack_8_to_5};
use crate::crypto::{is_high_s, normalize_high_s, CryptoProvider};
use crate::error::{Bolt11Error, Result};
use crate::network::Network;
use crate::tag::Tag;

/// Words of timestamp on the wire: `7 * 5 = 35` bits.
const TIMESTAMP_WORDS: usize = 7;
/// Words of the signature envelope: `103` words of `r||s` plus one
/// recovery-id word.
const SIGNATURE_WORDS: usize = 104;
const MIN_DATA_WORDS: usize = TIMESTAMP_WORDS + SIGNATURE_WORDS;
const MAX_TIMESTAMP: u64 = (1u64 << 35) - 1;

fn timestamp_to_words(timestamp: u64) -> [u8; TIMESTAMP_WORDS] {
    let mut words = [0u8; TIMESTAMP_WORDS];
    for (i, word) in words.iter_mut().enumerate() {
        let shift = (TIMESTAMP_WORDS - 1 - i) * 5;
        *word = ((timestamp >> shift) & 0x1f) as u8;
    }
    words
}

fn words_to_timestamp(words: &[u8]) -> u64 {
    words.iter().fold(0u64, |acc, &w| (acc << 5) | w as u64)
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Input to [`encode`]: the fields of an invoice that hasn't been signed yet.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    pub network: Option<Network>,
    pub satoshis: Option<u64>,
    pub millisatoshis: Option<u64>,
    pub timestamp: Option<u64>,
    pub tags: Vec<Tag>,
}

/// An invoice that has been assembled but not yet signed (`complete = false`,
/// empty signature).
#[derive(Debug, Clone)]
pub struct UnsignedInvoice {
    pub network: Network,
    pub millisatoshis: Option<u64>,
    pub timestamp: u64,
    pub tags: Vec<Tag>,
    hrp: String,
    data_words: Vec<u8>,
}

/// A fully signed or decoded invoice.
#[derive(Debug, Clone)]
pub struct Invoice {
    pub network: Network,
    pub millisatoshis: Option<u64>,
    pub timestamp: u64,
    pub tags: Vec<Tag>,
    pub signature: [u8; 64],
    pub recovery_flag: u8,
    pub payee_node_key: Option<[u8; 33]>,
    pub complete: bool,
    pub payment_request: Option<String>,
}

fn tag_name(tag: &Tag) -> &'static str {
    match tag {
        Tag::PaymentHash(_) => "payment_hash",
        Tag::PaymentSecret(_) => "payment_secret",
        Tag::Description(_) => "description",
        Tag::PurposeCommitHash(_) => "purpose_commit_hash",
        Tag::Payee(_) => "payee",
        Tag::ExpireTime(_) => "expire_time",
        Tag::MinFinalCltvExpiry(_) => "min_final_cltv_expiry",
        Tag::FallbackAddress { .. } => "fallback_address",
        Tag::RouteHint(_) => "route_hint",
        Tag::FeatureBits(_) => "feature_bits",
        Tag::Metadata(_) => "metadata",
    }
}

fn validate_required_tags(tags: &[Tag]) -> Result<()> {
    let has = |name: &str| tags.iter().any(|t| tag_name(t) == name);
    if !has("payment_hash") {
        return Err(Bolt11Error::MissingRequiredTag("payment_hash"));
    }
    if !has("payment_secret") {
        return Err(Bolt11Error::MissingRequiredTag("payment_secret"));
    }
    if !has("description") && !has("purpose_commit_hash") {
        return Err(Bolt11Error::MissingRequiredTag("description_or_purpose_commit_hash"));
    }
    Ok(())
}

/// Assemble an unsigned invoice from user-supplied fields. `timestamp`
/// defaults to "now" when unset.
pub fn encode(opts: EncodeOptions) -> Result<UnsignedInvoice> {
    validate_required_tags(&opts.tags)?;

    let network = opts
        .network
        .ok_or_else(|| Bolt11Error::UnknownNetwork("<unspecified>".to_string()))?;

    let millisatoshis = match (opts.millisatoshis, opts.satoshis) {
        (Some(msat), _) => Some(msat),
        (None, Some(sat)) => Some(sat * 1000),
        (None, None) => None,
    };

    let timestamp = opts.timestamp.unwrap_or_else(now_unix_seconds);
    if timestamp > MAX_TIMESTAMP {
        return Err(Bolt11Error::InvalidTimestamp);
    }

    let hrp = format!("ln{}{}", network.bech32_prefix, msat_to_hrp(millisatoshis));

    let mut data_words = timestamp_to_words(timestamp).to_vec();
    for tag in &opts.tags {
        data_words.extend(tag.to_words()?);
    }

    Ok(UnsignedInvoice {
        network,
        millisatoshis,
        timestamp,
        tags: opts.tags,
        hrp,
        data_words,
    })
}

/// Sign an [`UnsignedInvoice`], producing a complete, serialized invoice.
pub fn sign(
    invoice: UnsignedInvoice,
    priv_key: &[u8; 32],
    provider: &dyn CryptoProvider,
) -> Result<Invoice> {
    let preimage_bytes = expand_5_to_8(&invoice.data_words, true);
    let mut preimage = invoice.hrp.as_bytes().to_vec();
    preimage.extend(preimage_bytes);
    let sig_hash = provider.sha256(&preimage);

    let (r_s, recovery_flag) = provider
        .sign_recoverable(&sig_hash, priv_key)
        .map_err(|_| Bolt11Error::SignFailed)?;
    let payee_node_key = provider.public_key(priv_key).map_err(|_| Bolt11Error::SignFailed)?;

    let mut full_data = invoice.data_words.clone();
    full_data.extend(pack_8_to_5(&r_s));
    full_data.push(recovery_flag & 0x3);

    let payment_request = bech32::encode(&invoice.hrp, &full_data)?;

    Ok(Invoice {
        network: invoice.network,
        millisatoshis: invoice.millisatoshis,
        timestamp: invoice.timestamp,
        tags: invoice.tags,
        signature: r_s,
        recovery_flag: recovery_flag & 0x3,
        payee_node_key: Some(payee_node_key),
        complete: true,
        payment_request: Some(payment_request),
    })
}

/// Recover the payee's public key from the signing envelope, tolerating a
/// non-canonical (high-S) signature per BOLT 11 decoder requirements.
fn recover_payee_pubkey(
    provider: &dyn CryptoProvider,
    sig_hash: &[u8; 32],
    r_s: &[u8; 64],
    recovery_flag: u8,
) -> Option<[u8; 33]> {
    if let Some(pk) = provider.recover(sig_hash, r_s, recovery_flag) {
        return Some(pk);
    }
    if is_high_s(r_s) {
        debug!("retrying recovery with normalized high-S signature");
        let (normalized, flipped_flag) = normalize_high_s(r_s, recovery_flag);
        return provider.recover(sig_hash, &normalized, flipped_flag);
    }
    None
}

/// Decode a bech32-encoded invoice string into a fully populated invoice.
pub fn decode(input: &str, provider: &dyn CryptoProvider) -> Result<Invoice> {
    let (hrp, data) = bech32::decode(input)?;

    if data.len() < MIN_DATA_WORDS {
        return Err(Bolt11Error::TooShort(data.len(), MIN_DATA_WORDS));
    }

    let rest = hrp
        .strip_prefix("ln")
        .ok_or_else(|| Bolt11Error::UnknownNetwork(hrp.clone()))?;
    let (network, amount_token) = Network::split_hrp(rest)?;
    let millisatoshis = hrp_to_msat(amount_token)?;

    let timestamp = words_to_timestamp(&data[0..TIMESTAMP_WORDS]);

    let tag_words_end = data.len() - SIGNATURE_WORDS;
    let tag_data = &data[TIMESTAMP_WORDS..tag_words_end];
    let tags = Tag::parse_all(tag_data)?;

    let signature_data = &data[tag_words_end..];
    let (r_s_words, recovery_word) = signature_data.split_at(SIGNATURE_WORDS - 1);
    let r_s_bytes = expand_5_to_8(r_s_words, false);
    if r_s_bytes.len() != 64 {
        return Err(Bolt11Error::TooShort(r_s_bytes.len(), 64));
    }
    let mut signature = [0u8; 64];
    signature.copy_from_slice(&r_s_bytes);
    let recovery_flag = recovery_word[0] & 0x3;

    let preimage_bytes = expand_5_to_8(&data[..tag_words_end], true);
    let mut preimage = hrp.as_bytes().to_vec();
    preimage.extend(preimage_bytes);
    let sig_hash = provider.sha256(&preimage);

    let payee_node_key = tags
        .iter()
        .find_map(|t| match t {
            Tag::Payee(pk) => Some(*pk),
            _ => None,
        })
        .or_else(|| recover_payee_pubkey(provider, &sig_hash, &signature, recovery_flag));

    Ok(Invoice {
        network,
        millisatoshis,
        timestamp,
        tags,
        signature,
        recovery_flag,
        payee_node_key,
        complete: true,
        payment_request: Some(input.to_string()),
    })
}

impl Invoice {
    /// Whole-satoshi amount, or `None` when the amount isn't sat-exact
    /// (e.g. a pico-bitcoin amount that doesn't divide evenly into sats).
    pub fn satoshis(&self) -> Option<u64> {
        msat_to_sat(self.millisatoshis)
    }

    /// The last occurrence of each tag, keyed by its canonical name.
    pub fn tags_by_name(&self) -> HashMap<&'static str, &Tag> {
        let mut map = HashMap::new();
        for tag in &self.tags {
            map.insert(tag_name(tag), tag);
        }
        map
    }

    fn expire_time_seconds(&self) -> u64 {
        self.tags
            .iter()
            .find_map(|t| match t {
                Tag::ExpireTime(seconds) => Some(*seconds),
                _ => None,
            })
            .unwrap_or(3600)
    }

    /// ISO-8601 UTC rendering of `timestamp`.
    pub fn timestamp_string(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.timestamp as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default()
    }

    /// ISO-8601 UTC rendering of `timestamp + (expire_time ?? 3600)`.
    pub fn time_expire_date_string(&self) -> String {
        let expiry = self.timestamp.saturating_add(self.expire_time_seconds());
        DateTime::<Utc>::from_timestamp(expiry as i64, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default()
    }
}
