//! Gateway cryptography
//!
//! RSA-SHA256 (PKCS#1 v1.5) for request signing and callback signature
//! verification, AES-256-GCM for callback resource decryption. Keys are
//! parsed once at startup; PEM loading accepts both PKCS#8 and PKCS#1
//! encodings.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use shared::error::{AppError, AppResult, ErrorCode};

/// Merchant-side signer for outbound requests and client pay signs
#[derive(Clone)]
pub struct RsaSigner {
    key: SigningKey<Sha256>,
}

impl RsaSigner {
    pub fn from_private_key(key: RsaPrivateKey) -> Self {
        Self {
            key: SigningKey::new(key),
        }
    }

    pub fn from_pem(pem: &str) -> AppResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| {
                AppError::with_message(
                    ErrorCode::ConfigError,
                    format!("invalid merchant private key: {}", e),
                )
            })?;
        Ok(Self::from_private_key(key))
    }

    /// Sign the canonical message, returning base64
    pub fn sign_b64(&self, message: &str) -> AppResult<String> {
        let signature = self.key.try_sign(message.as_bytes()).map_err(|e| {
            AppError::with_message(ErrorCode::InternalError, format!("signing failed: {}", e))
        })?;
        Ok(B64.encode(signature.to_vec()))
    }
}

/// Platform-side key for callback signature verification
#[derive(Clone)]
pub struct RsaVerifier {
    key: VerifyingKey<Sha256>,
}

impl RsaVerifier {
    pub fn from_public_key(key: RsaPublicKey) -> Self {
        Self {
            key: VerifyingKey::new(key),
        }
    }

    pub fn from_pem(pem: &str) -> AppResult<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| {
                AppError::with_message(
                    ErrorCode::ConfigError,
                    format!("invalid platform public key: {}", e),
                )
            })?;
        Ok(Self::from_public_key(key))
    }

    /// Verify a base64 signature over the canonical message.
    ///
    /// Any failure (bad base64, wrong length, wrong key) is `false`.
    pub fn verify_b64(&self, message: &str, signature_b64: &str) -> bool {
        let Ok(raw) = B64.decode(signature_b64) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(raw.as_slice()) else {
            return false;
        };
        self.key.verify(message.as_bytes(), &signature).is_ok()
    }
}

/// Decrypt an AES-256-GCM ciphertext whose trailing 16 bytes are the tag
pub fn aes_gcm_decrypt(
    key: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext_with_tag: &[u8],
) -> AppResult<Vec<u8>> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| AppError::with_message(ErrorCode::ConfigError, "API key must be 32 bytes"))?;
    let key = LessSafeKey::new(unbound);
    let nonce = Nonce::try_assume_unique_for_key(nonce)
        .map_err(|_| AppError::new(ErrorCode::DecryptFailed).with_detail("reason", "bad nonce"))?;
    let mut buf = ciphertext_with_tag.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::from(aad), &mut buf)
        .map_err(|_| AppError::new(ErrorCode::DecryptFailed))?;
    Ok(plaintext.to_vec())
}

/// Seal a plaintext the way the gateway does (tag appended).
///
/// The server never encrypts in production; this is the loopback side
/// used to fabricate webhook payloads in tests and local tooling.
pub fn aes_gcm_encrypt(key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> AppResult<Vec<u8>> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| AppError::with_message(ErrorCode::ConfigError, "API key must be 32 bytes"))?;
    let key = LessSafeKey::new(unbound);
    let nonce = Nonce::try_assume_unique_for_key(nonce)
        .map_err(|_| AppError::new(ErrorCode::DecryptFailed).with_detail("reason", "bad nonce"))?;
    let mut buf = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::from(aad), &mut buf)
        .map_err(|_| AppError::new(ErrorCode::InternalError))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (RsaSigner, RsaVerifier) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let public = private.to_public_key();
        (
            RsaSigner::from_private_key(private),
            RsaVerifier::from_public_key(public),
        )
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let (signer, verifier) = keypair();
        let message = "1700000000\nnonce123\n{\"ok\":true}\n";
        let sig = signer.sign_b64(message).unwrap();
        assert!(verifier.verify_b64(message, &sig));
    }

    #[test]
    fn test_tampered_message_rejected() {
        let (signer, verifier) = keypair();
        let sig = signer.sign_b64("original").unwrap();
        assert!(!verifier.verify_b64("tampered", &sig));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        let (_, verifier) = keypair();
        assert!(!verifier.verify_b64("msg", "not-base64!!"));
        assert!(!verifier.verify_b64("msg", &B64.encode(b"short")));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (signer, _) = keypair();
        let (_, other_verifier) = keypair();
        let sig = signer.sign_b64("msg").unwrap();
        assert!(!other_verifier.verify_b64("msg", &sig));
    }

    #[test]
    fn test_aead_roundtrip() {
        let key = [7u8; 32];
        let nonce = b"0123456789ab";
        let sealed = aes_gcm_encrypt(&key, nonce, b"transaction", b"{\"total\":100}").unwrap();
        // Tag appended
        assert_eq!(sealed.len(), 13 + 16);
        let plain = aes_gcm_decrypt(&key, nonce, b"transaction", &sealed).unwrap();
        assert_eq!(plain, b"{\"total\":100}");
    }

    #[test]
    fn test_aead_wrong_aad_fails() {
        let key = [7u8; 32];
        let nonce = b"0123456789ab";
        let sealed = aes_gcm_encrypt(&key, nonce, b"aad-a", b"secret").unwrap();
        let err = aes_gcm_decrypt(&key, nonce, b"aad-b", &sealed).unwrap_err();
        assert_eq!(err.code, ErrorCode::DecryptFailed);
    }

    #[test]
    fn test_aead_truncated_ciphertext_fails() {
        let key = [7u8; 32];
        let nonce = b"0123456789ab";
        let sealed = aes_gcm_encrypt(&key, nonce, b"", b"secret").unwrap();
        let err = aes_gcm_decrypt(&key, nonce, b"", &sealed[..sealed.len() - 1]).unwrap_err();
        assert_eq!(err.code, ErrorCode::DecryptFailed);
    }

    #[test]
    fn test_bad_key_length_rejected() {
        let err = aes_gcm_decrypt(&[0u8; 16], b"0123456789ab", b"", &[0u8; 32]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }
}
