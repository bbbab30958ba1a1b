//! Pre/post processing around a serializer.
//!
//! A [`HookedSerializer`] runs the wrapped serializer and then each hook's
//! `encode` in order. Decoding runs the hooks' `decode` in reverse order and
//! then the wrapped serializer, so the round-trip law of the inner strategy
//! holds end to end.

use std::sync::Arc;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::error::{CodecError, CodecResult};
use crate::traits::{AsyncSerializer, Serializer};

/// A text-to-text transform applied to serialized records.
#[async_trait]
pub trait CodecHook: Send + Sync {
    /// Short name for error messages.
    fn name(&self) -> &'static str;

    async fn encode(&self, text: String) -> CodecResult<String>;

    async fn decode(&self, text: String) -> CodecResult<String>;
}

/// A serializer with an ordered chain of hooks.
pub struct HookedSerializer<T> {
    inner: Arc<dyn Serializer<T>>,
    hooks: Vec<Arc<dyn CodecHook>>,
}

impl<T> HookedSerializer<T> {
    pub fn new(inner: impl Serializer<T> + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            hooks: Vec::new(),
        }
    }

    /// Builder: append a hook. Hooks encode in the order they are added.
    pub fn with_hook(mut self, hook: impl CodecHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }
}

#[async_trait]
impl<T: Send + Sync> AsyncSerializer<T> for HookedSerializer<T> {
    async fn serialize(&self, state: &T) -> CodecResult<String> {
        let mut text = self.inner.serialize(state)?;
        for hook in &self.hooks {
            text = hook.encode(text).await?;
        }
        Ok(text)
    }

    async fn deserialize(&self, text: &str) -> CodecResult<T> {
        let mut text = text.to_string();
        for hook in self.hooks.iter().rev() {
            text = hook.decode(text).await?;
        }
        self.inner.deserialize(&text)
    }
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// zstd compression, stored as hex text.
#[derive(Clone, Debug)]
pub struct ZstdHook {
    level: i32,
}

impl ZstdHook {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdHook {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

#[async_trait]
impl CodecHook for ZstdHook {
    fn name(&self) -> &'static str {
        "zstd"
    }

    async fn encode(&self, text: String) -> CodecResult<String> {
        let packed = zstd::encode_all(text.as_bytes(), self.level)
            .map_err(|e| CodecError::hook("zstd", e))?;
        Ok(hex::encode(packed))
    }

    async fn decode(&self, text: String) -> CodecResult<String> {
        let packed = hex::decode(text.trim()).map_err(|e| CodecError::hook("zstd", e))?;
        let raw = zstd::decode_all(packed.as_slice()).map_err(|e| CodecError::hook("zstd", e))?;
        String::from_utf8(raw).map_err(|e| CodecError::hook("zstd", e))
    }
}

// ---------------------------------------------------------------------------
// Encryption
// ---------------------------------------------------------------------------

/// Nonce length for ChaCha20-Poly1305.
const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 encryption, stored as hex of `nonce || ciphertext`.
///
/// A fresh random nonce is drawn for every record.
pub struct ChaChaHook {
    cipher: ChaCha20Poly1305,
}

impl ChaChaHook {
    /// Use a caller-provided 256-bit key.
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        }
    }

    /// Draw a random key. Records written with it are unreadable once the
    /// returned hook is dropped.
    pub fn generate() -> (Self, [u8; 32]) {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key);
        (Self::new(bytes), bytes)
    }
}

#[async_trait]
impl CodecHook for ChaChaHook {
    fn name(&self) -> &'static str {
        "chacha20poly1305"
    }

    async fn encode(&self, text: String) -> CodecResult<String> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, text.as_bytes())
            .map_err(|e| CodecError::hook(self.name(), e))?;
        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(hex::encode(sealed))
    }

    async fn decode(&self, text: String) -> CodecResult<String> {
        let sealed = hex::decode(text.trim()).map_err(|e| CodecError::hook(self.name(), e))?;
        if sealed.len() < NONCE_LEN {
            return Err(CodecError::hook(self.name(), "record shorter than nonce"));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CodecError::hook(self.name(), e))?;
        String::from_utf8(plain).map_err(|e| CodecError::hook(self.name(), e))
    }
}

impl std::fmt::Debug for ChaChaHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChaChaHook")
    }
}
