//! Cryptographic intrinsics (spec §6): digests, alt_bn128, mod_exp, and
//! secp256k1 key recovery.
//!
//! Grounded on the teacher's `host_blake3` (`host.rs`): one function per
//! primitive, hashing a byte slice read from guest memory and returning
//! fixed-width output. The teacher reaches for a single hash crate
//! (`blake3`); this module reaches for the equivalent RustCrypto `Digest`
//! crate per algorithm (`sha1`, `sha2`, `ripemd`, `sha3`) rather than
//! hand-rolling any of them, and for `alt_bn128` the elliptic-curve crate
//! the pack's other chain-adjacent examples use (`substrate-bn`).

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use sha3::{Keccak256, Sha3_256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sha1_hash(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

pub fn sha512(data: &[u8]) -> [u8; 64] {
    Sha512::digest(data).into()
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

pub fn sha3_keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    Sha3_256::digest(data).into()
}

/// `sha3(data, data_len, out, out_len, keccak_flag)` (spec §4.5): pick the
/// variant, then truncate or zero-pad to `out_len` the way the host
/// intrinsic's `out`/`out_len` pair requires.
pub fn sha3(data: &[u8], out_len: usize, keccak: bool) -> Vec<u8> {
    let digest = if keccak {
        sha3_keccak256(data)
    } else {
        sha3_256(data)
    };
    let mut out = vec![0u8; out_len];
    let n = out_len.min(digest.len());
    out[..n].copy_from_slice(&digest[..n]);
    out
}

/// EIP-152 `F` compression function. Hand-rolled rather than pulled from a
/// hash crate's internals: no RustCrypto crate exposes the bare
/// compression round with an explicit round count and final-block flag,
/// which is exactly the shape `blake2_f` needs — the same judgment call
/// the teacher makes when a primitive doesn't match an available crate's
/// public API (it writes `execute_wasm`'s metering loop by hand rather
/// than reach for an unrelated gas-accounting crate).
pub fn blake2_f(rounds: u32, h: &mut [u64; 8], m: &[u64; 16], t: [u64; 2], final_block: bool) {
    const IV: [u64; 8] = [
        0x6a09e667f3bcc908,
        0xbb67ae8584caa73b,
        0x3c6ef372fe94f82b,
        0xa54ff53a5f1d36f1,
        0x510e527fade682d1,
        0x9b05688c2b3e6c1f,
        0x1f83d9abfb41bd6b,
        0x5be0cd19137e2179,
    ];
    const SIGMA: [[usize; 16]; 10] = [
        [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
        [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
        [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
        [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
        [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
        [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
        [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
        [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
        [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
        [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
    ];

    let mut v = [0u64; 16];
    v[..8].copy_from_slice(h);
    v[8..16].copy_from_slice(&IV);
    v[12] ^= t[0];
    v[13] ^= t[1];
    if final_block {
        v[14] = !v[14];
    }

    fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
        v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
        v[d] = (v[d] ^ v[a]).rotate_right(32);
        v[c] = v[c].wrapping_add(v[d]);
        v[b] = (v[b] ^ v[c]).rotate_right(24);
        v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
        v[d] = (v[d] ^ v[a]).rotate_right(16);
        v[c] = v[c].wrapping_add(v[d]);
        v[b] = (v[b] ^ v[c]).rotate_right(63);
    }

    for r in 0..rounds as usize {
        let s = &SIGMA[r % 10];
        g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }
}

/// Reads a 64-byte (x, y) pair into a `bn::G1`, treating (0, 0) as the
/// point at infinity — the convention EVM's bn128 precompiles use, which
/// spec §9 says this crate also follows for `alt_bn128_add`/`_mul`/`_pair`.
fn read_g1(bytes: &[u8]) -> Option<bn::G1> {
    use bn::{AffineG1, Fq, Group, G1};
    let x = Fq::from_slice(&bytes[0..32]).ok()?;
    let y = Fq::from_slice(&bytes[32..64]).ok()?;
    if x == Fq::zero() && y == Fq::zero() {
        Some(G1::zero())
    } else {
        Some(AffineG1::new(x, y).ok()?.into())
    }
}

fn write_g1(point: bn::G1) -> [u8; 64] {
    use bn::AffineG1;
    let mut out = [0u8; 64];
    if let Some(affine) = AffineG1::from_jacobian(point) {
        let _ = affine.x().to_big_endian(&mut out[0..32]);
        let _ = affine.y().to_big_endian(&mut out[32..64]);
    }
    out
}

/// EIP-196 `alt_bn128_add`: add two points on the alt_bn128 curve, each
/// given as two 32-byte big-endian field elements (x, y). Returns `None`
/// on a point not on the curve.
pub fn alt_bn128_add(p1: &[u8; 64], p2: &[u8; 64]) -> Option<[u8; 64]> {
    let a = read_g1(p1)?;
    let b = read_g1(p2)?;
    Some(write_g1(a + b))
}

/// EIP-196 `alt_bn128_mul`: scalar multiply a point by a 32-byte
/// big-endian scalar.
pub fn alt_bn128_mul(point: &[u8; 64], scalar: &[u8; 32]) -> Option<[u8; 64]> {
    use bn::Fr;
    let p = read_g1(point)?;
    let s = Fr::from_slice(scalar).ok()?;
    Some(write_g1(p * s))
}

/// EIP-197 `alt_bn128_pair`: pairing check over a sequence of (G1, G2)
/// point pairs, each 192 bytes (64 for the G1 point, 128 for the G2
/// point, as two `Fq2` coordinates). Returns `true` (the EIP's "1"
/// convention, preserved verbatim per spec §9 rather than sense-flipped)
/// iff the product of pairings is the identity in GT.
pub fn alt_bn128_pair(pairs: &[u8]) -> Option<bool> {
    use bn::{pairing, AffineG2, Fq, Fq2, Group, Gt, G2};

    if pairs.len() % 192 != 0 {
        return None;
    }

    let mut acc = Gt::one();
    for chunk in pairs.chunks(192) {
        let g1 = read_g1(&chunk[0..64])?;

        let x_c1 = Fq::from_slice(&chunk[64..96]).ok()?;
        let x_c0 = Fq::from_slice(&chunk[96..128]).ok()?;
        let y_c1 = Fq::from_slice(&chunk[128..160]).ok()?;
        let y_c0 = Fq::from_slice(&chunk[160..192]).ok()?;
        let x = Fq2::new(x_c0, x_c1);
        let y = Fq2::new(y_c0, y_c1);
        let g2 = if x == Fq2::zero() && y == Fq2::zero() {
            G2::zero()
        } else {
            AffineG2::new(x, y).ok()?.into()
        };

        acc = acc * pairing(g1, g2);
    }
    Some(acc == Gt::one())
}

/// Big-endian modular exponentiation: `base^exp mod modulus`.
pub fn mod_exp(base: &[u8], exp: &[u8], modulus: &[u8]) -> Vec<u8> {
    use num_bigint::BigUint;
    let base = BigUint::from_bytes_be(base);
    let exp = BigUint::from_bytes_be(exp);
    let modulus = BigUint::from_bytes_be(modulus);
    if modulus == BigUint::from(0u32) {
        return Vec::new();
    }
    base.modpow(&exp, &modulus).to_bytes_be()
}

/// secp256k1 public key recovery from a compact `(recovery_id, r, s)`
/// signature plus the 32-byte message digest. Returns the recovered
/// public key's uncompressed SEC1 encoding (65 bytes).
pub fn recover_key(digest: &[u8; 32], recovery_id: u8, r: &[u8; 32], s: &[u8; 32]) -> Option<Vec<u8>> {
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(r);
    sig_bytes[32..].copy_from_slice(s);
    let signature = Signature::from_slice(&sig_bytes).ok()?;
    let recid = RecoveryId::from_byte(recovery_id)?;
    let key = VerifyingKey::recover_from_prehash(digest, &signature, recid).ok()?;
    Some(key.to_encoded_point(false).as_bytes().to_vec())
}

/// `k1_recover` (spec §4.5): Ethereum-style signature layout, `v` in
/// `[27, 35)` rather than the compact-signature's bare recovery id.
pub fn k1_recover(digest: &[u8; 32], v: u8, r: &[u8; 32], s: &[u8; 32]) -> Option<Vec<u8>> {
    if !(27..35).contains(&v) {
        return None;
    }
    let recovery_id = (v - 27) & 0x3;
    recover_key(digest, recovery_id, r, s)
}
