use basalt_common::{Account, AccountTag, Digest};
use basalt_crypto::Signature;

use crate::error::CodecError;

/// Appends `self`'s canonical byte representation to `out`.
pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Consumes a canonical byte representation of `Self` from the front of
/// `buf`, returning the parsed value and the unconsumed remainder.
pub trait Decode: Sized {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError>;
}

fn take(buf: &[u8], n: usize) -> Result<(&[u8], &[u8]), CodecError> {
    if buf.len() < n {
        return Err(CodecError::InvalidLength {
            expected: n,
            actual: buf.len(),
        });
    }
    Ok(buf.split_at(n))
}

impl Encode for u32 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u32 {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (head, rest) = take(buf, 4)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(head);
        Ok((u32::from_le_bytes(arr), rest))
    }
}

impl Encode for u64 {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u64 {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (head, rest) = take(buf, 8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(head);
        Ok((u64::from_le_bytes(arr), rest))
    }
}

impl Encode for bool {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }
}

impl Decode for bool {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (head, rest) = take(buf, 1)?;
        Ok((head[0] != 0, rest))
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (head, rest) = take(buf, N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(head);
        Ok((arr, rest))
    }
}

impl Encode for Digest {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl Decode for Digest {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (arr, rest) = <[u8; 32]>::decode(buf)?;
        Ok((Digest::from_bytes(arr), rest))
    }
}

impl Encode for Account {
    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.tag as u8);
        out.extend_from_slice(&self.address);
    }
}

impl Decode for Account {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (head, rest) = take(buf, 1)?;
        let tag = AccountTag::try_from(head[0]).map_err(CodecError::from)?;
        let (address, rest) = <[u8; 32]>::decode(rest)?;
        Ok((Account { tag, address }, rest))
    }
}

impl Encode for Signature {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl Decode for Signature {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (arr, rest) = <[u8; 64]>::decode(buf)?;
        Ok((Signature::from_bytes(arr), rest))
    }
}

/// `Bytes` are length-prefixed with a `u32` little-endian count.
impl Encode for Vec<u8> {
    fn encode(&self, out: &mut Vec<u8>) {
        (self.len() as u32).encode(out);
        out.extend_from_slice(self);
    }
}

impl Decode for Vec<u8> {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (len, rest) = u32::decode(buf)?;
        let (data, rest) = take(rest, len as usize)?;
        Ok((data.to_vec(), rest))
    }
}

impl Encode for String {
    fn encode(&self, out: &mut Vec<u8>) {
        self.as_bytes().to_vec().encode(out);
    }
}

impl Decode for String {
    fn decode(buf: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (bytes, rest) = Vec::<u8>::decode(buf)?;
        let s = String::from_utf8(bytes).map_err(|_| CodecError::InvalidCharacter)?;
        Ok((s, rest))
    }
}

/// Encodes a slice of encodable elements as a `u32`-little-endian element
/// count followed by each element's own encoding (§6's "length-prefixed
/// vector"). A blanket `impl<T> Encode for Vec<T>` would conflict with the
/// raw-bytes `impl Encode for Vec<u8>` above, so vectors of structured
/// elements go through these free functions instead.
pub fn encode_vec<T: Encode>(items: &[T], out: &mut Vec<u8>) {
    (items.len() as u32).encode(out);
    for item in items {
        item.encode(out);
    }
}

pub fn decode_vec<T: Decode>(buf: &[u8]) -> Result<(Vec<T>, &[u8]), CodecError> {
    let (len, mut rest) = u32::decode(buf)?;
    let mut items = Vec::with_capacity(len as usize);
    for _ in 0..len {
        let (item, r) = T::decode(rest)?;
        items.push(item);
        rest = r;
    }
    Ok((items, rest))
}
