//! Sealed refresh-token codec.
//!
//! A sealed blob is the standard base64 encoding of
//! `salt (16) || iv (16) || tag (20) || ciphertext`, where:
//!
//! * the 32-byte cipher key is PBKDF2-HMAC-SHA1 over the passphrase and salt,
//! * the ciphertext is AES-256-CBC with PKCS#7 padding,
//! * the tag is HMAC-SHA1 keyed with `SHA-1(cipher key)` over `iv || ciphertext`.
//!
//! Nothing is stored server-side: every blob carries its own salt and IV, so
//! any process holding the passphrase can open it.

use {
    aes::Aes256,
    base64::{Engine as _, engine::general_purpose::STANDARD},
    cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
    hmac::{Hmac, Mac},
    rand::{TryRngCore, rngs::OsRng},
    sha1::{Digest, Sha1},
};

use crate::error::CipherError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha1 = Hmac<Sha1>;

pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 20;
pub const KEY_LEN: usize = 32;
pub const KDF_ROUNDS: u32 = 1000;

/// Smallest decodable blob: the fixed header with an empty ciphertext.
pub const HEADER_LEN: usize = SALT_LEN + IV_LEN + TAG_LEN;

/// Encrypt and authenticate `plaintext` under a key derived from `passphrase`.
pub fn seal(plaintext: &str, passphrase: &str) -> Result<String, CipherError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CipherError::Entropy(e.to_string()))?;
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| CipherError::Entropy(e.to_string()))?;

    seal_with(plaintext.as_bytes(), passphrase, &salt, &iv)
}

/// Verify and decrypt a blob produced by [`seal`].
///
/// The tag is checked before any decryption work; on mismatch no plaintext
/// bytes are produced at all.
pub fn open(blob: &str, passphrase: &str) -> Result<String, CipherError> {
    let raw = STANDARD
        .decode(blob.trim())
        .map_err(|e| CipherError::MalformedBlob(e.to_string()))?;
    if raw.len() < HEADER_LEN {
        return Err(CipherError::MalformedBlob(format!(
            "expected at least {HEADER_LEN} bytes, got {}",
            raw.len()
        )));
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (iv, rest) = rest.split_at(IV_LEN);
    let (tag, ciphertext) = rest.split_at(TAG_LEN);

    let keys = DerivedKeys::derive(passphrase, salt)?;
    keys.verify(iv, ciphertext, tag)?;

    let plain = Aes256CbcDec::new_from_slices(&keys.cipher_key, iv)
        .map_err(|e| CipherError::Decryption(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::Decryption("invalid padding".into()))?;

    String::from_utf8(plain).map_err(|e| CipherError::Decryption(e.to_string()))
}

fn seal_with(
    plaintext: &[u8],
    passphrase: &str,
    salt: &[u8; SALT_LEN],
    iv: &[u8; IV_LEN],
) -> Result<String, CipherError> {
    let keys = DerivedKeys::derive(passphrase, salt)?;

    let ciphertext = Aes256CbcEnc::new_from_slices(&keys.cipher_key, iv)
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = keys.tag(iv, &ciphertext)?;

    let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    blob.extend_from_slice(salt);
    blob.extend_from_slice(iv);
    blob.extend_from_slice(&tag);
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

struct DerivedKeys {
    cipher_key: [u8; KEY_LEN],
    mac_key: [u8; TAG_LEN],
}

impl DerivedKeys {
    fn derive(passphrase: &str, salt: &[u8]) -> Result<Self, CipherError> {
        let mut cipher_key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2::<HmacSha1>(passphrase.as_bytes(), salt, KDF_ROUNDS, &mut cipher_key)
            .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;

        let mac_key: [u8; TAG_LEN] = Sha1::digest(cipher_key).into();
        Ok(Self {
            cipher_key,
            mac_key,
        })
    }

    fn mac(&self, iv: &[u8], ciphertext: &[u8]) -> Result<HmacSha1, CipherError> {
        let mut mac = HmacSha1::new_from_slice(&self.mac_key)
            .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;
        mac.update(iv);
        mac.update(ciphertext);
        Ok(mac)
    }

    fn tag(&self, iv: &[u8], ciphertext: &[u8]) -> Result<[u8; TAG_LEN], CipherError> {
        Ok(self.mac(iv, ciphertext)?.finalize().into_bytes().into())
    }

    /// Constant-time comparison against the stored tag.
    fn verify(&self, iv: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<(), CipherError> {
        self.mac(iv, ciphertext)?
            .verify_slice(tag)
            .map_err(|_| CipherError::Authentication)
    }
}
