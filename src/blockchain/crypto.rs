use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

/// Width in bytes of a secp256k1 coordinate and of each signature scalar.
pub const FIELD_WIDTH: usize = 32;

/// Width in bytes of an encoded pair (`x ‖ y` or `r ‖ s`).
const PAIR_WIDTH: usize = FIELD_WIDTH * 2;

/// Tag byte of an uncompressed SEC1 public key.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// Shared signing/verification context.
static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// A 256-bit big-endian integer (curve coordinate or signature scalar).
pub type FieldBytes = [u8; FIELD_WIDTH];

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents a wallet address: the public key point `(x, y)` packed as
/// fixed-width big-endian fields and rendered in base58
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let (x, y) = public_key_coordinates(public_key);
        encode_address(&x, &y)
    }

    /// Converts the address back to a public key point on the curve
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let (x, y) = decode_address(self)?;

        let mut sec1 = [0u8; PAIR_WIDTH + 1];
        sec1[0] = UNCOMPRESSED_TAG;
        sec1[1..=FIELD_WIDTH].copy_from_slice(&x);
        sec1[FIELD_WIDTH + 1..].copy_from_slice(&y);

        PublicKey::from_slice(&sec1).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Returns true if the address is the empty string
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// Represents an ECDSA signature `(r, s)` in the same packed base58 form as addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        let compact: [u8; COMPACT_SIGNATURE_SIZE] = signature.serialize_compact();
        let (r, s) = split_pair(&compact);
        encode_signature(&r, &s)
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let (r, s) = decode_signature(self)?;
        Signature::from_compact(&join_pair(&r, &s))
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

impl fmt::Display for DigitalSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encodes a public key point as an address string.
pub fn encode_address(x: &FieldBytes, y: &FieldBytes) -> Address {
    Address(bs58::encode(join_pair(x, y)).into_string())
}

/// Decodes an address string back into the public key coordinates.
pub fn decode_address(address: &Address) -> Result<(FieldBytes, FieldBytes), CryptoError> {
    decode_pair(&address.0)
}

/// Encodes the signature scalars `(r, s)` as a single string.
pub fn encode_signature(r: &FieldBytes, s: &FieldBytes) -> DigitalSignature {
    DigitalSignature(bs58::encode(join_pair(r, s)).into_string())
}

/// Decodes a signature string back into `(r, s)`.
pub fn decode_signature(signature: &DigitalSignature) -> Result<(FieldBytes, FieldBytes), CryptoError> {
    decode_pair(&signature.0)
}

fn join_pair(a: &FieldBytes, b: &FieldBytes) -> [u8; PAIR_WIDTH] {
    let mut out = [0u8; PAIR_WIDTH];
    out[..FIELD_WIDTH].copy_from_slice(a);
    out[FIELD_WIDTH..].copy_from_slice(b);
    out
}

fn split_pair(bytes: &[u8; PAIR_WIDTH]) -> (FieldBytes, FieldBytes) {
    let mut a = [0u8; FIELD_WIDTH];
    let mut b = [0u8; FIELD_WIDTH];
    a.copy_from_slice(&bytes[..FIELD_WIDTH]);
    b.copy_from_slice(&bytes[FIELD_WIDTH..]);
    (a, b)
}

fn decode_pair(encoded: &str) -> Result<(FieldBytes, FieldBytes), CryptoError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

    let packed: [u8; PAIR_WIDTH] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        CryptoError::DecodingError(format!(
            "expected {} bytes, got {}",
            PAIR_WIDTH,
            bytes.len()
        ))
    })?;

    Ok(split_pair(&packed))
}

/// Extracts the affine coordinates of a public key
pub fn public_key_coordinates(public_key: &PublicKey) -> (FieldBytes, FieldBytes) {
    let sec1 = public_key.serialize_uncompressed();
    let mut packed = [0u8; PAIR_WIDTH];
    packed.copy_from_slice(&sec1[1..]);
    split_pair(&packed)
}

/// Derives the public key belonging to a secret key
pub fn derive_public_key(secret_key: &SecretKey) -> PublicKey {
    PublicKey::from_secret_key(&SECP256K1, secret_key)
}

/// Parses a secret key from its raw 32 bytes
pub fn secret_key_from_bytes(bytes: &[u8]) -> Result<SecretKey, CryptoError> {
    if bytes.len() != SECRET_KEY_SIZE {
        return Err(CryptoError::InvalidPrivateKey(format!(
            "Secret key must be {} bytes, got {}",
            SECRET_KEY_SIZE,
            bytes.len()
        )));
    }

    SecretKey::from_slice(bytes).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
}

/// The ECDSA message for a payload is the SHA-256 digest of its bytes
fn message_for(payload: &[u8]) -> Message {
    let digest: [u8; 32] = Sha256::digest(payload).into();
    Message::from_digest(digest)
}

/// Signs a payload with a secret key
pub fn sign_message(payload: &[u8], secret_key: &SecretKey) -> DigitalSignature {
    let signature = SECP256K1.sign_ecdsa(&message_for(payload), secret_key);
    DigitalSignature::from_signature(&signature)
}

/// Verifies a signature against a payload and public key
pub fn verify_signature(
    payload: &[u8],
    signature: &DigitalSignature,
    public_key: &PublicKey,
) -> Result<bool, CryptoError> {
    let signature = signature.to_signature()?;

    match SECP256K1.verify_ecdsa(&message_for(payload), &signature, public_key) {
        Ok(_) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_key(secret_key)
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret_key = secret_key_from_bytes(secret_key_bytes)?;
        Ok(Self::from_key(secret_key))
    }

    fn from_key(secret_key: SecretKey) -> Self {
        let public_key = derive_public_key(&secret_key);
        let address = Address::from_public_key(&public_key);

        Wallet {
            secret_key,
            public_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Gets the wallet's signing key
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Exports the wallet's secret key as bytes
    pub fn export_secret_key(&self) -> Vec<u8> {
        self.secret_key.secret_bytes().to_vec()
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
