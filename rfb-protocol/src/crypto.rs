//! Cryptographic primitives used by the RFB security handshakes.
//!
//! None of this is general-purpose cryptography: each function here exists because one
//! specific security type (VNC Authentication, ARD, MSLogonII, RA2ne) needs it during the
//! handshake. Once the session reaches the Normal protocol phase the only cipher still in
//! play is the RA2 transport cipher in [`crate::ra2`].
//!
//! # Algorithms
//!
//! - DES-ECB with the VNC "mirrored key" convention ([`vnc_des_key`], [`des_ecb_encrypt`]) for
//!   VNC Authentication.
//! - DES-CBC ([`des_cbc_encrypt`]) for MSLogonII.
//! - AES-128-ECB ([`aes128_ecb_encrypt`]) for Apple Remote Desktop (ARD) credential encryption.
//! - Diffie-Hellman over server-chosen finite-field parameters ([`dh`]) for ARD and MSLogonII.
//! - RSA-2048 PKCS#1 v1.5 ([`rsa_auth`]) for RA2ne key exchange.
//! - MD5 and SHA-1 digests, required by ARD and RA2ne respectively.

use md5::{Digest, Md5};
use sha1::Sha1;

/// Derive the 8-byte DES key VNC Authentication uses from a plaintext password.
///
/// The RFB spec truncates or zero-pads the password to 8 bytes, then reverses the bit
/// order of every byte. This quirk comes from the original DES library RealVNC used
/// (Sun's `des` routines expect key bits in the opposite order from the rest of the
/// protocol) and every VNC implementation since has had to reproduce it.
pub fn vnc_des_key(password: &str) -> [u8; 8] {
    let mut key = [0u8; 8];
    let bytes = password.as_bytes();
    let n = bytes.len().min(8);
    key[..n].copy_from_slice(&bytes[..n]);
    for byte in key.iter_mut() {
        *byte = byte.reverse_bits();
    }
    key
}

/// Encrypt `data` (must be a multiple of 8 bytes) under `key` using DES in ECB mode.
///
/// Used for the VNC Authentication challenge-response: the server's 16-byte challenge is
/// two independent 8-byte blocks, each encrypted under the same key with no chaining.
pub fn des_ecb_encrypt(key: &[u8; 8], data: &[u8]) -> std::io::Result<Vec<u8>> {
    use des::cipher::{BlockEncrypt, KeyInit};
    use des::Des;

    if data.len() % 8 != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("DES-ECB input length {} is not a multiple of 8", data.len()),
        ));
    }

    let cipher = Des::new_from_slice(key).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad DES key: {e}"))
    })?;

    let mut out = data.to_vec();
    for block in out.chunks_mut(8) {
        let ga = des::cipher::generic_array::GenericArray::from_mut_slice(block);
        cipher.encrypt_block(ga);
    }
    Ok(out)
}

/// Encrypt `data` (must be a multiple of 8 bytes) under `key` using DES in CBC mode with
/// the given 8-byte initialization vector.
///
/// Used by MSLogonII, which (unusually for DES-CBC) uses an all-zero IV and a key derived
/// from a Diffie-Hellman shared secret rather than a user password.
pub fn des_cbc_encrypt(key: &[u8; 8], iv: &[u8; 8], data: &[u8]) -> std::io::Result<Vec<u8>> {
    use des::cipher::{BlockEncrypt, KeyInit};
    use des::Des;

    if data.len() % 8 != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("DES-CBC input length {} is not a multiple of 8", data.len()),
        ));
    }

    let cipher = Des::new_from_slice(key).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad DES key: {e}"))
    })?;

    let mut out = Vec::with_capacity(data.len());
    let mut prev = *iv;
    for block in data.chunks(8) {
        let mut xored = [0u8; 8];
        for i in 0..8 {
            xored[i] = block[i] ^ prev[i];
        }
        let ga = des::cipher::generic_array::GenericArray::from_mut_slice(&mut xored);
        cipher.encrypt_block(ga);
        out.extend_from_slice(&xored);
        prev = xored;
    }
    Ok(out)
}

/// Encrypt `data` (must be a multiple of 16 bytes) under a 128-bit `key` using AES in ECB
/// mode, with no padding.
///
/// Used by Apple Remote Desktop (ARD) authentication, which encrypts a fixed-size
/// 128-byte username/password buffer under a key derived from the Diffie-Hellman shared
/// secret via MD5.
pub fn aes128_ecb_encrypt(key: &[u8; 16], data: &[u8]) -> std::io::Result<Vec<u8>> {
    use aes::cipher::{BlockEncrypt, KeyInit};
    use aes::Aes128;

    if data.len() % 16 != 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("AES-ECB input length {} is not a multiple of 16", data.len()),
        ));
    }

    let cipher = Aes128::new_from_slice(key).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad AES key: {e}"))
    })?;

    let mut out = data.to_vec();
    for block in out.chunks_mut(16) {
        let ga = aes::cipher::generic_array::GenericArray::from_mut_slice(block);
        cipher.encrypt_block(ga);
    }
    Ok(out)
}

/// Decrypt `data` (must be a multiple of 16 bytes) under a 128-bit `key` using AES in ECB
/// mode, with no padding. Only needed to verify ARD round-trips in tests; the handshake
/// itself only ever encrypts.
#[cfg(test)]
pub fn aes128_ecb_decrypt(key: &[u8; 16], data: &[u8]) -> std::io::Result<Vec<u8>> {
    use aes::cipher::{BlockDecrypt, KeyInit};
    use aes::Aes128;

    let cipher = Aes128::new_from_slice(key).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad AES key: {e}"))
    })?;

    let mut out = data.to_vec();
    for block in out.chunks_mut(16) {
        let ga = aes::cipher::generic_array::GenericArray::from_mut_slice(block);
        cipher.decrypt_block(ga);
    }
    Ok(out)
}

/// MD5 digest of `data`.
pub fn md5(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-1 digest of `data`.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Classic finite-field Diffie-Hellman over server-chosen parameters.
///
/// ARD and MSLogonII both send the client a generator and prime (ARD: 2-byte lengths then
/// big-endian values plus the server's public key; MSLogonII: two 8-byte big-endian
/// values). Both then derive a shared secret the same way, so the math lives here once.
pub mod dh {
    use num_bigint_dig::{BigUint, RandBigInt};

    /// A Diffie-Hellman keypair generated against a specific generator/prime pair.
    pub struct Keypair {
        pub private: BigUint,
        pub public: BigUint,
    }

    /// Generate a fresh keypair: a random private exponent in `[1, prime)` and the
    /// corresponding public value `generator^private mod prime`.
    pub fn generate_keypair(generator: &BigUint, prime: &BigUint) -> Keypair {
        let mut rng = rand::thread_rng();
        let private = rng.gen_biguint_below(prime);
        let public = generator.modpow(&private, prime);
        Keypair { private, public }
    }

    /// Compute the shared secret `server_public^private mod prime`.
    pub fn shared_secret(private: &BigUint, server_public: &BigUint, prime: &BigUint) -> BigUint {
        server_public.modpow(private, prime)
    }
}

/// RSA-2048 PKCS#1 v1.5, used by the RA2ne security type's key exchange.
pub mod rsa_auth {
    use rsa::traits::PublicKeyParts;
    pub use rsa::{RsaPrivateKey, RsaPublicKey};
    use rsa::{BigUint, Pkcs1v15Encrypt};

    /// Generate a fresh 2048-bit RSA keypair with public exponent 65537.
    pub fn generate_keypair() -> std::io::Result<RsaPrivateKey> {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 2048).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("RSA key generation failed: {e}"),
            )
        })
    }

    /// Export a public key's modulus and exponent as big-endian byte strings, as sent on
    /// the wire during RA2ne's key exchange.
    pub fn export_public_key(key: &RsaPublicKey) -> (Vec<u8>, Vec<u8>) {
        (key.n().to_bytes_be(), key.e().to_bytes_be())
    }

    /// Reconstruct a public key from big-endian modulus and exponent byte strings received
    /// from the peer.
    pub fn import_public_key(modulus: &[u8], exponent: &[u8]) -> std::io::Result<RsaPublicKey> {
        let n = BigUint::from_bytes_be(modulus);
        let e = BigUint::from_bytes_be(exponent);
        RsaPublicKey::new(n, e).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("bad RSA public key: {e}"))
        })
    }

    /// Encrypt `data` under `public_key` with PKCS#1 v1.5 padding.
    pub fn encrypt(public_key: &RsaPublicKey, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut rng = rand::thread_rng();
        public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, format!("RSA encrypt failed: {e}")))
    }

    /// Decrypt `data` under `private_key`, undoing PKCS#1 v1.5 padding.
    pub fn decrypt(private_key: &RsaPrivateKey, data: &[u8]) -> std::io::Result<Vec<u8>> {
        private_key
            .decrypt(Pkcs1v15Encrypt, data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, format!("RSA decrypt failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vnc_des_key_pads_and_truncates() {
        let key = vnc_des_key("abc");
        // "abc\0\0\0\0\0" with every byte bit-reversed.
        let expected_plain = [b'a', b'b', b'c', 0, 0, 0, 0, 0];
        let expected: Vec<u8> = expected_plain.iter().map(|b| b.reverse_bits()).collect();
        assert_eq!(&key[..], &expected[..]);
    }

    #[test]
    fn vnc_des_key_truncates_long_password() {
        let key = vnc_des_key("ninecharpw");
        let expected_plain = b"ninechar";
        let expected: Vec<u8> = expected_plain.iter().map(|b| b.reverse_bits()).collect();
        assert_eq!(&key[..], &expected[..]);
    }

    #[test]
    fn des_ecb_round_trip_via_known_vector_shape() {
        let key = vnc_des_key("password");
        let challenge = [0x11u8; 16];
        let response = des_ecb_encrypt(&key, &challenge).unwrap();
        assert_eq!(response.len(), 16);
        // Encrypting the same two blocks under the same key yields the same ciphertext.
        assert_eq!(&response[0..8], &response[8..16]);
    }

    #[test]
    fn des_ecb_rejects_unaligned_input() {
        let key = vnc_des_key("password");
        assert!(des_ecb_encrypt(&key, &[0u8; 5]).is_err());
    }

    #[test]
    fn des_cbc_chains_blocks() {
        let key = [0x01u8; 8];
        let iv = [0u8; 8];
        let data = [0x42u8; 16];
        let out = des_cbc_encrypt(&key, &iv, &data).unwrap();
        // With CBC chaining the two ciphertext blocks must differ even though both
        // plaintext blocks are identical and the IV is zero.
        assert_ne!(&out[0..8], &out[8..16]);
    }

    #[test]
    fn aes_ecb_round_trips() {
        let key = [0x7eu8; 16];
        let data = [0xABu8; 32];
        let ct = aes128_ecb_encrypt(&key, &data).unwrap();
        let pt = aes128_ecb_decrypt(&key, &ct).unwrap();
        assert_eq!(&pt[..], &data[..]);
    }

    #[test]
    fn md5_known_vector() {
        let digest = md5(b"abc");
        assert_eq!(
            digest,
            [
                0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f, 0x7d, 0x28, 0xe1,
                0x7f, 0x72
            ]
        );
    }

    #[test]
    fn sha1_known_vector() {
        let digest = sha1(b"abc");
        assert_eq!(
            digest,
            [
                0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
                0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d
            ]
        );
    }

    #[test]
    fn dh_both_sides_agree_on_shared_secret() {
        use num_bigint_dig::BigUint;

        let generator = BigUint::from(2u32);
        let prime = BigUint::parse_bytes(
            b"FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF6955817183995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF",
            16,
        ).unwrap();

        let client = dh::generate_keypair(&generator, &prime);
        let server = dh::generate_keypair(&generator, &prime);

        let client_secret = dh::shared_secret(&client.private, &server.public, &prime);
        let server_secret = dh::shared_secret(&server.private, &client.public, &prime);
        assert_eq!(client_secret, server_secret);
    }

    #[test]
    fn rsa_round_trips() {
        let private = rsa_auth::generate_keypair().unwrap();
        let public = rsa_auth::RsaPublicKey::from(&private);
        let plaintext = b"rfb shared secret!";
        let ciphertext = rsa_auth::encrypt(&public, plaintext).unwrap();
        let decrypted = rsa_auth::decrypt(&private, &ciphertext).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn rsa_export_import_public_key_round_trips() {
        let private = rsa_auth::generate_keypair().unwrap();
        let public = rsa_auth::RsaPublicKey::from(&private);
        let (n, e) = rsa_auth::export_public_key(&public);
        let reimported = rsa_auth::import_public_key(&n, &e).unwrap();

        let plaintext = b"round trip through wire bytes";
        let ciphertext = rsa_auth::encrypt(&reimported, plaintext).unwrap();
        let decrypted = rsa_auth::decrypt(&private, &ciphertext).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }
}
