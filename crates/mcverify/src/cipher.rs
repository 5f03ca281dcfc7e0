//! AES-128/CFB8 stream encryption for the connection.
//!
//! Minecraft uses the shared secret as both key and IV, with independent
//! cipher state for each direction.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};

use crate::crypto::SharedSecret;

/// AES-128 in CFB8 mode.
///
/// Each byte is XORed with the first byte of the encrypted shift register,
/// and the resulting ciphertext byte is shifted into the register.
pub struct Cfb8Cipher {
    cipher: Aes128,
    register: [u8; 16],
}

impl Cfb8Cipher {
    /// Create a new CFB8 cipher with the given key and IV.
    #[must_use]
    pub fn new(key: &[u8; 16], iv: &[u8; 16]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
            register: *iv,
        }
    }

    fn keystream_byte(&self) -> u8 {
        let mut block = GenericArray::clone_from_slice(&self.register);
        self.cipher.encrypt_block(&mut block);
        block[0]
    }

    fn shift_in(&mut self, ciphertext_byte: u8) {
        self.register.copy_within(1.., 0);
        self.register[15] = ciphertext_byte;
    }

    /// Encrypt data in place.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            *byte ^= self.keystream_byte();
            self.shift_in(*byte);
        }
    }

    /// Decrypt data in place.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            let ciphertext_byte = *byte;
            *byte ^= self.keystream_byte();
            self.shift_in(ciphertext_byte);
        }
    }
}

/// Create the (encrypt, decrypt) cipher pair for a shared secret.
#[must_use]
pub fn make_stream_ciphers(secret: &SharedSecret) -> (Cfb8Cipher, Cfb8Cipher) {
    (Cfb8Cipher::new(secret, secret), Cfb8Cipher::new(secret, secret))
}

/// Encryption state of one connection.
///
/// Outbound bytes go through `encrypt`, inbound bytes through `decrypt`.
/// Both keep their state across calls, so a stream may be processed in
/// chunks of any size.
pub struct PacketCipher {
    encryptor: Cfb8Cipher,
    decryptor: Cfb8Cipher,
}

impl PacketCipher {
    #[must_use]
    pub fn new(secret: &SharedSecret) -> Self {
        let (encryptor, decryptor) = make_stream_ciphers(secret);
        Self {
            encryptor,
            decryptor,
        }
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.encryptor.encrypt(data);
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.decryptor.decrypt(data);
    }
}
