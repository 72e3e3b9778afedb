//! Stateful stream cipher protecting selected packet payloads.
//!
//! A 32-bit register is shifted once per byte and folded with the session
//! key whenever the bit shifted out is set; the low byte of the register is
//! the keystream. The register is threaded through every call, so payloads
//! must be fed in exact arrival order.

use std::fmt;

/// Register value at the start of every session.
pub const CIPHER_SEED: u32 = 0x5555_5555;

/// Per-event decryption key, fetched once per session.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionKey(u32);

impl SessionKey {
    pub const fn new(key: u32) -> Self {
        Self(key)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for SessionKey {
    fn from(key: u32) -> Self {
        Self(key)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Cipher state owned by exactly one session.
#[derive(Clone)]
pub struct Cipher {
    register: u32,
    key: SessionKey,
}

impl Cipher {
    /// Fresh cipher seeded with [`CIPHER_SEED`].
    pub fn new(key: SessionKey) -> Self {
        Self {
            register: CIPHER_SEED,
            key,
        }
    }

    /// Current register value.
    pub fn register(&self) -> u32 {
        self.register
    }

    #[inline]
    fn next_mask(&mut self) -> u8 {
        let fold = if self.register & 1 != 0 {
            self.key.value()
        } else {
            0
        };
        self.register = (self.register >> 1) ^ fold;
        (self.register & 0xff) as u8
    }

    /// XOR `buf` with the keystream in place, advancing the register once per byte.
    ///
    /// The keystream does not depend on the data, so this both decrypts and encrypts.
    pub fn apply(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte ^= self.next_mask();
        }
    }

    /// Decrypt `ciphertext` into a new buffer.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        let mut plaintext = ciphertext.to_vec();
        self.apply(&mut plaintext);
        plaintext
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("register", &format_args!("{:#010x}", self.register))
            .field("key", &self.key)
            .finish()
    }
}
