// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Transparent encryption of persisted blobs.

use std::fmt;
use std::sync::Arc;

use crate::{Result, telemetry};

/// Protects and unprotects opaque payloads.
///
/// `unprotect(protect(p))` must return `p`. Encryptors may fail on input they did not produce;
/// [`Protector`] turns such failures into a plaintext passthrough.
pub trait Encryptor: Send + Sync {
    /// Encrypts `plaintext`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encrypted.
    fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if `payload` was not produced by [`Encryptor::protect`] or fails
    /// authentication.
    fn unprotect(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Applies an optional [`Encryptor`] to blobs on their way to and from the backing store.
///
/// Without an encryptor both directions are the identity. Decryption never fails: a payload
/// the encryptor rejects is returned unchanged, which lets a store written before encryption
/// was turned on keep working.
#[derive(Clone, Default)]
pub struct Protector {
    encryptor: Option<Arc<dyn Encryptor>>,
}

impl Protector {
    /// Creates a protector around `encryptor`.
    #[must_use]
    pub fn new(encryptor: Option<Arc<dyn Encryptor>>) -> Self {
        Self { encryptor }
    }

    /// Returns `true` if an encryptor is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.encryptor.is_some()
    }

    /// Encrypts `plaintext` if an encryptor is configured.
    ///
    /// # Errors
    ///
    /// Returns the encryptor's error.
    pub fn protect(&self, plaintext: Vec<u8>) -> Result<Vec<u8>> {
        match &self.encryptor {
            Some(encryptor) => encryptor.protect(&plaintext),
            None => Ok(plaintext),
        }
    }

    /// Decrypts `payload`, falling back to `payload` itself when decryption fails.
    #[must_use]
    pub fn unprotect(&self, payload: Vec<u8>) -> Vec<u8> {
        let Some(encryptor) = &self.encryptor else {
            return payload;
        };

        match encryptor.unprotect(&payload) {
            Ok(plaintext) => plaintext,
            Err(error) => {
                telemetry::decrypt_fallback(&error);
                payload
            }
        }
    }
}

impl fmt::Debug for Protector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protector").field("enabled", &self.is_enabled()).finish()
    }
}

#[cfg(feature = "aes-gcm")]
pub use aes::AesGcmEncryptor;

#[cfg(feature = "aes-gcm")]
mod aes {
    use std::fmt;

    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};

    use super::Encryptor;
    use crate::{Error, Result};

    const VERSION: u8 = 0x01;
    const NONCE_LEN: usize = 12;
    const TAG_LEN: usize = 16;
    const DEFAULT_PURPOSE: &str = "token_cache";

    /// AES-256-GCM encryptor.
    ///
    /// Each payload is laid out as a version byte, a random 12-byte nonce, and the ciphertext
    /// with its authentication tag. The *purpose* string is bound as associated data, so a
    /// payload protected for one purpose does not unprotect under another.
    ///
    /// # Examples
    ///
    /// ```
    /// use token_cache::{AesGcmEncryptor, Encryptor};
    ///
    /// # fn main() -> Result<(), token_cache::Error> {
    /// let encryptor = AesGcmEncryptor::new(&[7; 32])?.with_purpose("web-app");
    /// let payload = encryptor.protect(b"tokens")?;
    ///
    /// assert_ne!(payload.as_slice(), b"tokens");
    /// assert_eq!(encryptor.unprotect(&payload)?, b"tokens");
    /// # Ok(())
    /// # }
    /// ```
    #[derive(Clone)]
    pub struct AesGcmEncryptor {
        cipher: Aes256Gcm,
        purpose: String,
    }

    impl AesGcmEncryptor {
        /// Creates an encryptor from a 32-byte key.
        ///
        /// # Errors
        ///
        /// Returns an error if `key` is not 32 bytes long.
        pub fn new(key: &[u8]) -> Result<Self> {
            let cipher = Aes256Gcm::new_from_slice(key).map_err(Error::protect)?;
            Ok(Self {
                cipher,
                purpose: DEFAULT_PURPOSE.to_owned(),
            })
        }

        /// Binds payloads to `purpose`.
        #[must_use]
        pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
            self.purpose = purpose.into();
            self
        }

        /// Returns the purpose string.
        #[must_use]
        pub fn purpose(&self) -> &str {
            &self.purpose
        }
    }

    impl Encryptor for AesGcmEncryptor {
        fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            let mut nonce = [0_u8; NONCE_LEN];
            getrandom::getrandom(&mut nonce).map_err(Error::protect)?;

            let sealed = self
                .cipher
                .encrypt(
                    Nonce::from_slice(&nonce),
                    Payload {
                        msg: plaintext,
                        aad: self.purpose.as_bytes(),
                    },
                )
                .map_err(Error::protect)?;

            let mut payload = Vec::with_capacity(1 + NONCE_LEN + sealed.len());
            payload.push(VERSION);
            payload.extend_from_slice(&nonce);
            payload.extend_from_slice(&sealed);
            Ok(payload)
        }

        fn unprotect(&self, payload: &[u8]) -> Result<Vec<u8>> {
            let Some((&version, rest)) = payload.split_first() else {
                return Err(Error::unprotect("payload is empty"));
            };
            if version != VERSION {
                return Err(Error::unprotect(format!("unknown payload version {version}")));
            }
            if rest.len() < NONCE_LEN + TAG_LEN {
                return Err(Error::unprotect("payload is truncated"));
            }

            let (nonce, sealed) = rest.split_at(NONCE_LEN);
            self.cipher
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: sealed,
                        aad: self.purpose.as_bytes(),
                    },
                )
                .map_err(Error::unprotect)
        }
    }

    impl fmt::Debug for AesGcmEncryptor {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("AesGcmEncryptor")
                .field("purpose", &self.purpose)
                .finish_non_exhaustive()
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::Error;

    /// Reverses the payload and tags it; rejects anything without the tag.
    struct Reversing;

    impl Encryptor for Reversing {
        fn protect(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
            let mut payload = vec![0xEE];
            payload.extend(plaintext.iter().rev());
            Ok(payload)
        }

        fn unprotect(&self, payload: &[u8]) -> Result<Vec<u8>> {
            match payload.split_first() {
                Some((0xEE, rest)) => Ok(rest.iter().rev().copied().collect()),
                _ => Err(Error::unprotect("not protected")),
            }
        }
    }

    struct Broken;

    impl Encryptor for Broken {
        fn protect(&self, _plaintext: &[u8]) -> Result<Vec<u8>> {
            Err(Error::protect("key vault unavailable"))
        }

        fn unprotect(&self, _payload: &[u8]) -> Result<Vec<u8>> {
            Err(Error::unprotect("key vault unavailable"))
        }
    }

    #[test]
    fn absent_encryptor_is_identity() -> Result<()> {
        let protector = Protector::default();
        assert!(!protector.is_enabled());
        assert_eq!(protector.protect(vec![1, 2])?, vec![1, 2]);
        assert_eq!(protector.unprotect(vec![3, 4]), vec![3, 4]);
        Ok(())
    }

    #[test]
    fn protect_error_propagates() {
        let protector = Protector::new(Some(Arc::new(Broken)));
        let error = protector.protect(vec![1]).expect_err("protect should fail");
        assert_eq!(error.operation(), crate::Operation::Protect);
    }

    #[test]
    fn unprotect_error_returns_input() {
        let protector = Protector::new(Some(Arc::new(Broken)));
        assert_eq!(protector.unprotect(vec![9, 8, 7]), vec![9, 8, 7]);
    }

    #[test]
    fn decrypt_fallback_is_logged() {
        use crate::testing::LogCapture;

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let protector = Protector::new(Some(Arc::new(Reversing)));
        let _ = protector.unprotect(b"legacy".to_vec());

        capture.assert_contains("treating it as plaintext");
    }

    #[test]
    fn debug_reports_enabled_flag() {
        let protector = Protector::new(Some(Arc::new(Reversing)));
        assert_eq!(format!("{protector:?}"), "Protector { enabled: true }");
    }

    proptest! {
        #[test]
        fn round_trip(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
            let protector = Protector::new(Some(Arc::new(Reversing)));
            let protected = protector.protect(payload.clone()).expect("protect");
            prop_assert_eq!(protector.unprotect(protected), payload);
        }

        #[test]
        fn unprotected_payloads_pass_through(payload in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assume!(payload.first() != Some(&0xEE));
            let protector = Protector::new(Some(Arc::new(Reversing)));
            prop_assert_eq!(protector.unprotect(payload.clone()), payload);
        }
    }

    #[cfg(feature = "aes-gcm")]
    mod aes_gcm_encryptor {
        use super::*;

        fn encryptor() -> AesGcmEncryptor {
            AesGcmEncryptor::new(&[42; 32]).expect("valid key")
        }

        #[test]
        fn rejects_short_key() {
            assert!(AesGcmEncryptor::new(&[1; 16]).is_err());
        }

        #[test]
        fn default_purpose() {
            assert_eq!(encryptor().purpose(), "token_cache");
        }

        #[test]
        fn round_trip_with_fresh_nonce() -> Result<()> {
            let encryptor = encryptor();
            let first = encryptor.protect(b"refresh-token")?;
            let second = encryptor.protect(b"refresh-token")?;

            assert_eq!(first[0], 0x01);
            assert_ne!(first, second);
            assert_eq!(encryptor.unprotect(&first)?, b"refresh-token");
            assert_eq!(encryptor.unprotect(&second)?, b"refresh-token");
            Ok(())
        }

        #[test]
        fn purpose_is_bound() -> Result<()> {
            let payload = encryptor().with_purpose("a").protect(b"secret")?;
            assert!(encryptor().with_purpose("b").unprotect(&payload).is_err());
            Ok(())
        }

        #[test]
        fn rejects_foreign_payloads() {
            let encryptor = encryptor();
            assert!(encryptor.unprotect(&[]).is_err());
            assert!(encryptor.unprotect(b"{\"AccessToken\":{}}").is_err());
            assert!(encryptor.unprotect(&[0x01, 0, 0]).is_err());
        }

        #[test]
        fn rejects_tampered_payload() -> Result<()> {
            let encryptor = encryptor();
            let mut payload = encryptor.protect(b"secret")?;
            if let Some(last) = payload.last_mut() {
                *last ^= 0xFF;
            }
            assert!(encryptor.unprotect(&payload).is_err());
            Ok(())
        }

        proptest! {
            #[test]
            fn legacy_plaintext_passes_through_protector(payload in proptest::collection::vec(any::<u8>(), 0..128)) {
                let protector = Protector::new(Some(Arc::new(encryptor())));
                prop_assert_eq!(protector.unprotect(payload.clone()), payload);
            }
        }
    }
}
