//! The secp256k1/SHA-256 crypto provider boundary.
//!
//! BOLT 11 signing and recovery are delegated to a pluggable provider so
//! this crate never hard-codes one curve implementation. [`Secp256k1Provider`]
//! is the default, built on the same `secp256k1` crate family the rest of
//! this corpus reaches for.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{Bolt11Error, Result};

/// The cryptographic operations BOLT 11 signing/decoding needs from a
/// curve/hash implementation.
pub trait CryptoProvider {
    fn sha256(&self, bytes: &[u8]) -> [u8; 32];

    /// Sign `msg_hash` with `priv_key`, returning a compact `(r||s, v)` pair
    /// with a canonical (low-S) signature.
    fn sign_recoverable(&self, msg_hash: &[u8; 32], priv_key: &[u8; 32]) -> Result<([u8; 64], u8)>;

    /// Recover the compressed public key from `msg_hash`, `r||s`, and `v`.
    /// Must accept a canonical (low-S) signature; behavior on non-canonical
    /// S is provider-specific (see `invoice::recover_payee_pubkey`, which
    /// drives the high-S retry on the caller side).
    fn recover(&self, msg_hash: &[u8; 32], r_s: &[u8; 64], v: u8) -> Option<[u8; 33]>;

    fn public_key(&self, priv_key: &[u8; 32]) -> Result<[u8; 33]>;
}

/// Default [`CryptoProvider`] backed by `secp256k1` and `sha2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1Provider;

impl CryptoProvider for Secp256k1Provider {
    fn sha256(&self, bytes: &[u8]) -> [u8; 32] {
        Sha256::digest(bytes).into()
    }

    fn sign_recoverable(&self, msg_hash: &[u8; 32], priv_key: &[u8; 32]) -> Result<([u8; 64], u8)> {
        let secp = Secp256k1::signing_only();
        let secret_key = SecretKey::from_slice(priv_key).map_err(|_| Bolt11Error::SignFailed)?;
        let message = Message::from_digest(*msg_hash);
        let signature = secp.sign_ecdsa_recoverable(&message, &secret_key);
        let (recovery_id, compact) = signature.serialize_compact();
        Ok((compact, recovery_id.to_i32() as u8))
    }

    fn recover(&self, msg_hash: &[u8; 32], r_s: &[u8; 64], v: u8) -> Option<[u8; 33]> {
        let secp = Secp256k1::verification_only();
        let recovery_id = RecoveryId::from_i32(v as i32).ok()?;
        let signature = RecoverableSignature::from_compact(r_s, recovery_id).ok()?;
        let message = Message::from_digest(*msg_hash);
        let pubkey: PublicKey = secp.recover_ecdsa(&message, &signature).ok()?;
        Some(pubkey.serialize())
    }

    fn public_key(&self, priv_key: &[u8; 32]) -> Result<[u8; 33]> {
        let secp = Secp256k1::signing_only();
        let secret_key = SecretKey::from_slice(priv_key).map_err(|_| Bolt11Error::SignFailed)?;
        Ok(PublicKey::from_secret_key(&secp, &secret_key).serialize())
    }
}

/// The curve order `n`, used to detect and normalize non-canonical (high) S.
const CURVE_ORDER: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// `n / 2`: the canonical low-S threshold.
const HALF_ORDER: [u8; 32] = [
    0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0x5d, 0x57, 0x6e, 0x73, 0x57, 0xa4, 0x50, 0x1d, 0xdf, 0xe9, 0x2f, 0x46, 0x68, 0x1b, 0x20, 0xa0,
];

fn be_ge(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a.iter().cmp(b.iter()) != std::cmp::Ordering::Less
}

fn be_sub(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut borrow: i16 = 0;
    for i in (0..32).rev() {
        let diff = a[i] as i16 - b[i] as i16 - borrow;
        if diff < 0 {
            out[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            out[i] = diff as u8;
            borrow = 0;
        }
    }
    out
}

/// Is the S component of this compact `r||s` signature above the canonical
/// half-order threshold?
pub fn is_high_s(r_s: &[u8; 64]) -> bool {
    let mut s = [0u8; 32];
    s.copy_from_slice(&r_s[32..64]);
    be_ge(&s, &HALF_ORDER) && s != HALF_ORDER
}

/// Normalize a signature's S to `n - S`, flipping the recovery id's parity
/// bit so recovery against the same public key still works.
pub fn normalize_high_s(r_s: &[u8; 64], recovery_id: u8) -> ([u8; 64], u8) {
    let mut s = [0u8; 32];
    s.copy_from_slice(&r_s[32..64]);
    let normalized_s = be_sub(&CURVE_ORDER, &s);
    let mut out = [0u8; 64];
    out[0..32].copy_from_slice(&r_s[0..32]);
    out[32..64].copy_from_slice(&normalized_s);
    (out, recovery_id ^ 1)
}
