//! Codec and signing envelope for BOLT 11 Lightning Network payment request
//! invoices.
//!
//! This crate implements the bit-faithful pieces of BOLT 11: the bech32
//! layer, 5-bit/8-bit packing, the HRP amount grammar, the tagged-field wire
//! format, and the secp256k1 signing/recovery envelope. It does not bind to
//! payment execution, address rendering, or any particular I/O layer — see
//! [`crypto::CryptoProvider`] for the one external seam the codec leaves
//! open.
//!
//! ```
//! use bolt11_core::{encode, sign, decode, EncodeOptions, Tag};
//! use bolt11_core::crypto::Secp256k1Provider;
//! use bolt11_core::network::BITCOIN;
//!
//! let provider = Secp256k1Provider;
//! let priv_key = [0x11u8; 32];
//!
//! let unsigned = encode(EncodeOptions {
//!     network: Some(BITCOIN),
//!     satoshis: Some(2500),
//!     tags: vec![
//!         Tag::PaymentHash([0x01; 32]),
//!         Tag::PaymentSecret([0x02; 32]),
//!         Tag::Description("1 cup coffee".to_string()),
//!     ],
//!     ..Default::default()
//! })?;
//!
//! let signed = sign(unsigned, &priv_key, &provider)?;
//! let decoded = decode(&signed.payment_request.unwrap(), &provider)?;
//! assert_eq!(decoded.satoshis(), Some(2500));
//! # Ok::<(), bolt11_core::error::Bolt11Error>(())
//! ```

pub mod amount;
pub mod bech32;
pub mod bitpack;
pub mod crypto;
pub mod error;
pub mod invoice;
pub mod network;
pub mod tag;

pub use error::Bolt11Error;
pub use invoice::{decode, encode, sign, EncodeOptions, Invoice, UnsignedInvoice};
pub use network::Network;
pub use tag::{FeatureBits, FeaturePair, RouteHop, Tag};
