//! # registrar-crypto
//!
//! The signature oracle for the registrar core: Ed25519 signer keys wrapped
//! in the registrar's own armored key blocks and clearsigned documents, plus
//! the keyring resolution rules the approval workflow relies on.
//!
//! ## Model
//!
//! - A [`SignerKey`] is one Ed25519 verifying key with a derived 64-bit key
//!   id, usage flags and revocation metadata.
//! - A [`KeyBlock`] is what an approver registers: a primary key, optional
//!   subkeys and a holder identity, shipped as ASCII armor.
//! - A [`Keyring`] is the trust anchor built from the live approvers of an
//!   approver set. It resolves candidate keys by id, filters revoked keys and
//!   insufficient usage flags, and verifies clearsigned documents.
//!
//! ## Security Notes
//!
//! - The system never stores private key material; [`Keyring::decryption_keys`]
//!   is always empty by design.
//! - [`SigningKeyPair`] exists for client tooling and tests; its secret seed
//!   is zeroized on drop.

pub mod armor;
pub mod clearsign;
pub mod errors;
pub mod keyring;
pub mod keys;
pub mod signing;

pub use armor::{decode_key_block, encode_key_block};
pub use clearsign::{decode_clearsign, encode_clearsign, SignatureBlock, SignedMessage};
pub use errors::CryptoError;
pub use keyring::Keyring;
pub use keys::{
    key_id_from_public, KeyBlock, SignerKey, FLAG_CERTIFY, FLAG_ENCRYPT_COMMUNICATIONS,
    FLAG_ENCRYPT_STORAGE, FLAG_SIGN,
};
pub use signing::SigningKeyPair;
