//! SHA-256, AES-256-CBC (PKCS#7) and Base64 — the pure byte-buffer primitives the
//! rest of the pipeline builds on.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const IV_LEN: usize = 16;
const KEY_LEN: usize = 32;
const BLOCK_LEN: usize = 16;

/// SHA-256 digest of `input`.
pub fn sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hasher.finalize().into()
}

/// Encrypts `plain` under AES-256-CBC with PKCS#7 padding, always adding a full
/// padding block when `plain.len()` is already a multiple of 16. The IV is drawn
/// from the OS CSPRNG and prepended to the returned ciphertext.
///
/// Returns `None` if `key` is not exactly 32 bytes.
pub fn encrypt(plain: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    if key.len() != KEY_LEN {
        return None;
    }

    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let mut buf = vec![0u8; plain.len() + BLOCK_LEN];
    buf[..plain.len()].copy_from_slice(plain);
    let enc = Aes256CbcEnc::new(key.into(), &iv.into());
    let ciphertext = enc
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plain.len())
        .expect("buffer sized with one spare block is always large enough");

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(ciphertext);
    Some(out)
}

/// Decrypts `iv ‖ ciphertext` under AES-256-CBC, stripping PKCS#7 padding.
///
/// Fails (returns `None`) when `key` is not 32 bytes, the input is shorter than 16
/// bytes, `(len - 16) % 16 != 0`, or the padding is malformed.
pub fn decrypt(data: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    if key.len() != KEY_LEN || data.len() < IV_LEN {
        return None;
    }
    let (iv, ciphertext) = data.split_at(IV_LEN);
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return None;
    }

    let mut buf = ciphertext.to_vec();
    let dec = Aes256CbcDec::new(key.into(), iv.into());
    let plain = dec.decrypt_padded_mut::<Pkcs7>(&mut buf).ok()?;
    let len = plain.len();
    let mut out = plain.to_vec();
    secure_clear(&mut buf);
    out.truncate(len);
    Some(out)
}

const B64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Base64 encode over the standard alphabet, `=`-padded to a multiple of 4.
pub fn base64_encode(input: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(input)
}

/// Base64 decode. Stops at the first `=`; fails on any byte outside the alphabet.
pub fn base64_decode(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 3 / 4 + 3);
    let mut bits: u32 = 0;
    let mut val: u32 = 0;

    for &c in input {
        if c == b'=' {
            break;
        }
        let idx = B64_ALPHABET.iter().position(|&a| a == c)?;
        val = (val << 6) | idx as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push(((val >> bits) & 0xFF) as u8);
        }
    }

    Some(out)
}

/// Overwrite `buf` with zeros through a volatile write so the compiler cannot elide it.
pub fn secure_clear(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        unsafe { std::ptr::write_volatile(b, 0) };
    }
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
}
