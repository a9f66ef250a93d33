// crates/urkel-proof/src/codec.rs

//! Canonical, bit-packed proof encoding (`spec.md` §4.7).
//!
//! Layout: a `u16` big-endian header (top 2 bits = type, low 14 bits =
//! sibling count), a zero-hash omission bitmap (`ceil(count/8)` bytes), the
//! non-zero sibling hashes in order, then a type-specific tail.

use urkel_core::error::{Error, Result};
use urkel_core::hasher::HashAdapter;

use crate::types::{Proof, ProofKind};

const MAX_COUNT: u16 = 0x3FFF;

impl Proof {
    /// Encode canonically for `hasher`.
    ///
    /// # Panics
    /// Never under correct use; `nodes.len()` is assumed `<= bits` (the
    /// tree engine never produces a longer walk).
    #[must_use]
    pub fn encode(&self, hasher: &dyn HashAdapter) -> Vec<u8> {
        let count = self.nodes.len() as u16;
        let header = (self.kind.tag() << 14) | (count & MAX_COUNT);
        let mut out = Vec::new();
        out.extend_from_slice(&header.to_be_bytes());

        let zero = hasher.zero();
        let bitmap_len = usize::from(count).div_ceil(8);
        let mut bitmap = vec![0u8; bitmap_len];
        for (i, node) in self.nodes.iter().enumerate() {
            if *node == zero {
                bitmap[i / 8] |= 1 << (i % 8);
            }
        }
        out.extend_from_slice(&bitmap);

        for node in &self.nodes {
            if *node != zero {
                out.extend_from_slice(node);
            }
        }

        match self.kind {
            ProofKind::Exists => {
                let value = self.value.as_deref().unwrap_or(&[]);
                out.extend_from_slice(&(value.len() as u16).to_be_bytes());
                out.extend_from_slice(value);
            }
            ProofKind::DeadEnd => {}
            ProofKind::Collision => {
                if let Some(key) = &self.collision_key {
                    out.extend_from_slice(key);
                }
                if let Some(vh) = &self.collision_value_hash {
                    out.extend_from_slice(vh);
                }
            }
            ProofKind::Unknown => {}
        }
        out
    }

    /// Decode a proof for a `bits`-bit tree over `hasher`'s digests.
    ///
    /// # Errors
    /// [`Error::Encoding`] on any bounds violation, the reserved `Unknown`
    /// type tag, or a sibling count exceeding `bits`.
    pub fn decode(bytes: &[u8], hasher: &dyn HashAdapter, bits: usize) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::encoding(0, "proof shorter than header"));
        }
        let header = u16::from_be_bytes([bytes[0], bytes[1]]);
        let kind = ProofKind::from_tag(header >> 14);
        if kind == ProofKind::Unknown {
            return Err(Error::encoding(0, "proof carries reserved type tag"));
        }
        let count = usize::from(header & MAX_COUNT);
        if count > bits {
            return Err(Error::encoding(2, format!("sibling count {count} exceeds bit width {bits}")));
        }

        let mut offset = 2usize;
        let bitmap_len = count.div_ceil(8);
        let bitmap = bytes
            .get(offset..offset + bitmap_len)
            .ok_or_else(|| Error::encoding(offset, "truncated omission bitmap"))?;
        offset += bitmap_len;

        let hash_size = hasher.size();
        let zero = hasher.zero();
        let mut nodes = Vec::with_capacity(count);
        for i in 0..count {
            let is_zero = (bitmap[i / 8] >> (i % 8)) & 1 == 1;
            if is_zero {
                nodes.push(zero.clone());
            } else {
                let slice = bytes
                    .get(offset..offset + hash_size)
                    .ok_or_else(|| Error::encoding(offset, "truncated sibling hash"))?;
                nodes.push(slice.to_vec());
                offset += hash_size;
            }
        }

        match kind {
            ProofKind::Exists => {
                let len_bytes = bytes.get(offset..offset + 2).ok_or_else(|| Error::encoding(offset, "truncated value length"))?;
                let value_len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
                offset += 2;
                let value = bytes
                    .get(offset..offset + value_len)
                    .ok_or_else(|| Error::encoding(offset, "truncated value bytes"))?
                    .to_vec();
                Ok(Self::exists(nodes, value))
            }
            ProofKind::DeadEnd => Ok(Self::dead_end(nodes)),
            ProofKind::Collision => {
                let key_len = bits / 8;
                let key = bytes
                    .get(offset..offset + key_len)
                    .ok_or_else(|| Error::encoding(offset, "truncated collision key"))?
                    .to_vec();
                offset += key_len;
                let value_hash = bytes
                    .get(offset..offset + hash_size)
                    .ok_or_else(|| Error::encoding(offset, "truncated collision value hash"))?
                    .to_vec();
                Ok(Self::collision(nodes, key, value_hash))
            }
            ProofKind::Unknown => unreachable!("rejected above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use urkel_crypto::Blake3Adapter;

    #[test]
    fn exists_roundtrip() {
        let h = Blake3Adapter;
        let proof = Proof::exists(vec![h.digest(b"a"), h.zero(), h.digest(b"c")], b"value".to_vec());
        let bytes = proof.encode(&h);
        let decoded = Proof::decode(&bytes, &h, 256).unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn dead_end_roundtrip() {
        let h = Blake3Adapter;
        let proof = Proof::dead_end(vec![h.zero(); 5]);
        let bytes = proof.encode(&h);
        // all-zero siblings compress away entirely beyond the header+bitmap.
        assert_eq!(bytes.len(), 2 + 1);
        let decoded = Proof::decode(&bytes, &h, 256).unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn collision_roundtrip() {
        let h = Blake3Adapter;
        let key = vec![7u8; 32];
        let vh = h.digest(b"v");
        let proof = Proof::collision(vec![h.digest(b"s")], key, vh);
        let bytes = proof.encode(&h);
        let decoded = Proof::decode(&bytes, &h, 256).unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn rejects_count_over_bits() {
        let h = Blake3Adapter;
        let header: u16 = 1 << 14 | 300;
        let mut bytes = header.to_be_bytes().to_vec();
        bytes.extend_from_slice(&vec![0u8; 300usize.div_ceil(8)]);
        assert!(Proof::decode(&bytes, &h, 256).is_err());
    }

    #[test]
    fn rejects_unknown_type_tag() {
        let h = Blake3Adapter;
        let header: u16 = 3 << 14;
        let bytes = header.to_be_bytes().to_vec();
        assert!(Proof::decode(&bytes, &h, 256).is_err());
    }
}
