//! OpenSSL "traditional" PEM encryption (`Proc-Type: 4,ENCRYPTED`).
//!
//! The key is derived with a single round of MD5 over password and salt,
//! which is weak. It is supported only because existing operator keys use it.

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit};
use des::{Des, TdesEde3};
use md5::{Digest, Md5};
use pem::Pem;

use crate::error::KeyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyCipher {
    DesCbc,
    DesEde3Cbc,
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
}

impl LegacyCipher {
    fn from_name(name: &str) -> Result<Self, KeyError> {
        match name {
            "DES-CBC" => Ok(Self::DesCbc),
            "DES-EDE3-CBC" => Ok(Self::DesEde3Cbc),
            "AES-128-CBC" => Ok(Self::Aes128Cbc),
            "AES-192-CBC" => Ok(Self::Aes192Cbc),
            "AES-256-CBC" => Ok(Self::Aes256Cbc),
            other => Err(KeyError::UnsupportedCipher(other.to_string())),
        }
    }

    fn key_len(self) -> usize {
        match self {
            Self::DesCbc => 8,
            Self::DesEde3Cbc => 24,
            Self::Aes128Cbc => 16,
            Self::Aes192Cbc => 24,
            Self::Aes256Cbc => 32,
        }
    }

    fn iv_len(self) -> usize {
        match self {
            Self::DesCbc | Self::DesEde3Cbc => 8,
            _ => 16,
        }
    }

    fn decrypt(self, key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, KeyError> {
        match self {
            Self::DesCbc => cbc_decrypt::<Des>(key, iv, data),
            Self::DesEde3Cbc => cbc_decrypt::<TdesEde3>(key, iv, data),
            Self::Aes128Cbc => cbc_decrypt::<Aes128>(key, iv, data),
            Self::Aes192Cbc => cbc_decrypt::<Aes192>(key, iv, data),
            Self::Aes256Cbc => cbc_decrypt::<Aes256>(key, iv, data),
        }
    }
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, KeyError>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| KeyError::Decrypt(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| KeyError::Decrypt("bad padding (wrong password?)".to_string()))
}

/// OpenSSL `EVP_BytesToKey` with MD5 and one iteration.
fn derive_key(password: &[u8], salt: &[u8], len: usize) -> Vec<u8> {
    let mut key = Vec::with_capacity(len + 16);
    let mut prev: Vec<u8> = Vec::new();
    while key.len() < len {
        let mut hasher = Md5::new();
        hasher.update(&prev);
        hasher.update(password);
        hasher.update(salt);
        prev = hasher.finalize().to_vec();
        key.extend_from_slice(&prev);
    }
    key.truncate(len);
    key
}

pub(crate) fn is_encrypted(block: &Pem) -> bool {
    block
        .headers()
        .get("Proc-Type")
        .is_some_and(|v| v.contains("ENCRYPTED"))
}

/// Decrypt the body of an encrypted PEM block into DER.
pub(crate) fn decrypt(block: &Pem, password: &[u8]) -> Result<Vec<u8>, KeyError> {
    let dek_info = block
        .headers()
        .get("DEK-Info")
        .ok_or_else(|| KeyError::Decrypt("missing DEK-Info header".to_string()))?;
    let (name, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| KeyError::Decrypt(format!("malformed DEK-Info: {dek_info}")))?;

    let cipher = LegacyCipher::from_name(name.trim())?;
    let iv = hex::decode(iv_hex.trim()).map_err(|e| KeyError::Decrypt(e.to_string()))?;
    if iv.len() != cipher.iv_len() {
        return Err(KeyError::Decrypt(format!(
            "IV is {} bytes, expected {}",
            iv.len(),
            cipher.iv_len()
        )));
    }

    let key = derive_key(password, &iv[..8], cipher.key_len());
    cipher.decrypt(&key, &iv, block.contents())
}
