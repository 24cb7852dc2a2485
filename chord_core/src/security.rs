//! Authenticated encryption for the wire protocol: AES-256-CBC keyed from
//! `SHA-256(secret)`, with an independent HMAC-SHA-256 over the plaintext
//! attached as the `signature` field so tampering is detected even if the
//! cipher's own padding happens to decode.

use crate::error::ChordError;
use crate::wire::ChordMessage;
use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 16;

pub struct MessageSecurity {
    cipher_key: [u8; 32],
    hmac_key: Vec<u8>,
}

impl MessageSecurity {
    pub fn new(secret: &str) -> Self {
        MessageSecurity {
            cipher_key: derive_cipher_key(secret),
            hmac_key: secret.as_bytes().to_vec(),
        }
    }

    pub fn sign_message(&self, message: &ChordMessage) -> Result<String, ChordError> {
        let canonical = serde_json::to_vec(message)?;
        let mut mac =
            HmacSha256::new_from_slice(&self.hmac_key).expect("HMAC accepts keys of any length");
        mac.update(&canonical);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    pub fn verify_signature(&self, message: &ChordMessage, signature: &str) -> Result<(), ChordError> {
        let expected = self.sign_message(message)?;
        if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            Ok(())
        } else {
            Err(ChordError::Signature)
        }
    }

    /// Returns `(iv || ciphertext, hex hmac over the plaintext)`.
    pub fn encrypt_message(&self, message: &ChordMessage) -> Result<(Vec<u8>, String), ChordError> {
        let signature = self.sign_message(message)?;
        let plaintext = serde_json::to_vec(message)?;

        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        let encryptor = Aes256CbcEnc::new(&self.cipher_key.into(), &iv.into());
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok((out, signature))
    }

    pub fn decrypt_message(
        &self,
        iv_and_ciphertext: &[u8],
        signature: &str,
    ) -> Result<ChordMessage, ChordError> {
        if iv_and_ciphertext.len() < IV_LEN {
            return Err(ChordError::Protocol("ciphertext shorter than IV".into()));
        }
        let (iv, ciphertext) = iv_and_ciphertext.split_at(IV_LEN);
        let decryptor = Aes256CbcDec::new(self.cipher_key.as_slice().into(), iv.into());
        let plaintext = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| ChordError::Protocol("invalid ciphertext padding".into()))?;

        let message: ChordMessage = serde_json::from_slice(&plaintext)?;
        self.verify_signature(&message, signature)?;
        Ok(message)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn derive_cipher_key(secret: &str) -> [u8; 32] {
    use sha2::Digest;
    let digest = Sha256::digest(secret.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::request_type;

    fn message() -> ChordMessage {
        ChordMessage::new(request_type::PING, serde_json::json!({}), "127.0.0.1", 5000).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let security = MessageSecurity::new("secret");
        let msg = message();
        let sig = security.sign_message(&msg).unwrap();
        assert!(security.verify_signature(&msg, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let security = MessageSecurity::new("secret");
        let msg = message();
        let sig = security.sign_message(&msg).unwrap();
        let mut tampered = msg.clone();
        tampered.sender_port = 9999;
        assert!(security.verify_signature(&tampered, &sig).is_err());
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let security = MessageSecurity::new("secret");
        let msg = message();
        let (ciphertext, sig) = security.encrypt_message(&msg).unwrap();
        let decrypted = security.decrypt_message(&ciphertext, &sig).unwrap();
        assert_eq!(decrypted.kind, msg.kind);
    }

    #[test]
    fn decrypt_rejects_tampered_signature() {
        let security = MessageSecurity::new("secret");
        let msg = message();
        let (ciphertext, mut sig) = security.encrypt_message(&msg).unwrap();
        sig.replace_range(0..2, "00");
        assert!(security.decrypt_message(&ciphertext, &sig).is_err());
    }
}
