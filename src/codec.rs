//! The `AVLT` binary format: a shape-preserving encoding of an [`AvlSet<i32>`].
//!
//! ```text
//! offset 0:  4 bytes  magic = "AVLT"
//! offset 4:  2 bytes  format version, little-endian u16
//! offset 6:  4 bytes  node count, little-endian u32
//! offset 10: one record per node, in preorder:
//!              4 bytes  key, little-endian i32
//!              1 byte   flags: bit 0 = has left child, bit 1 = has right child
//! ```
//!
//! A node's record is followed by the records of its whole left subtree (if any), then by those
//! of its right subtree (if any).

use core::ptr::NonNull;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use cordyceps::Linked;
use tracing::debug;

use crate::{
    balance::{balance_factor, update_metrics},
    link_child, links,
    map::MapNode,
    AvlMap, AvlSet, AvlTree, CorruptStream, Dir,
};

/// The first four bytes of every stream.
pub const MAGIC: [u8; 4] = *b"AVLT";

/// The format version written by [`AvlSet::serialize`], and the only one accepted.
pub const FORMAT_VERSION: u16 = 1;

/// Length in bytes of the header: magic, version and node count.
pub const HEADER_LEN: usize = 10;

/// Length in bytes of each node record: key and flags.
pub const RECORD_LEN: usize = 5;

const HAS_LEFT: u8 = 0b01;
const HAS_RIGHT: u8 = 0b10;

type Node = MapNode<i32, ()>;

/// Limits applied while decoding untrusted input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
    /// The largest node count a header may announce. Larger counts are rejected before anything
    /// is allocated.
    pub max_nodes: usize,
    /// The deepest nesting of records accepted, counting the root as depth 1.
    ///
    /// This bounds the recursion of the decoder.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            max_nodes: 1 << 24,
            max_depth: 64,
        }
    }
}

impl AvlSet<i32> {
    /// Returns the number of bytes [`serialize`](AvlSet::serialize) writes for this set.
    pub fn serialized_len(&self) -> usize {
        HEADER_LEN + RECORD_LEN * self.len()
    }

    /// Writes the set to `buf` in the `AVLT` format, preserving the exact shape of the tree.
    ///
    /// # Panics
    ///
    /// Panics if the set holds more than `u32::MAX` keys, or if `buf` cannot grow to hold
    /// [`serialized_len`](AvlSet::serialized_len) more bytes.
    pub fn serialize<B: BufMut>(&self, buf: &mut B) {
        let count = u32::try_from(self.len()).expect("too many keys for the AVLT format");

        buf.put_slice(&MAGIC);
        buf.put_u16_le(FORMAT_VERSION);
        buf.put_u32_le(count);

        let mut stack: Vec<NonNull<Node>> = self.map.tree.root().into_iter().collect();

        while let Some(node) = stack.pop() {
            unsafe {
                let node_links = links(node);
                let (left, right) = (node_links.left(), node_links.right());

                let mut flags = 0;
                if left.is_some() {
                    flags |= HAS_LEFT;
                }
                if right.is_some() {
                    flags |= HAS_RIGHT;
                }

                buf.put_i32_le(node.as_ref().key);
                buf.put_u8(flags);

                stack.extend(right);
                stack.extend(left);
            }
        }
    }

    /// Returns the `AVLT` encoding of the set.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        self.serialize(&mut buf);
        buf.freeze()
    }

    /// Reads a set from `buf` with the default [`DecodeOptions`].
    ///
    /// Exactly the header and the announced records are consumed. Anything after them is left in
    /// `buf`.
    pub fn deserialize<B: Buf>(buf: &mut B) -> Result<Self, CorruptStream> {
        Self::deserialize_with(buf, &DecodeOptions::default())
    }

    /// Reads a set from `buf`, rejecting input beyond the limits in `options`.
    ///
    /// The decoded tree has exactly the shape that was serialized. Heights and sizes are
    /// recomputed rather than trusted, and the stream is rejected unless the keys are in strict
    /// search order and every node is balanced, so the result always passes
    /// [`validate`](AvlSet::validate).
    pub fn deserialize_with<B: Buf>(
        buf: &mut B,
        options: &DecodeOptions,
    ) -> Result<Self, CorruptStream> {
        let result = decode(buf, options);

        if let Err(error) = &result {
            debug!(%error, "rejected AVLT stream");
        }

        result.map(|tree| AvlSet {
            map: AvlMap { tree },
        })
    }

    /// Reads a set from a byte slice holding exactly one encoded set.
    ///
    /// Unlike [`deserialize`](AvlSet::deserialize), leftover bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorruptStream> {
        let mut buf = bytes;
        let set = Self::deserialize(&mut buf)?;

        if buf.has_remaining() {
            debug!(trailing = buf.remaining(), "rejected AVLT stream");
            return Err(CorruptStream::TrailingBytes(buf.remaining()));
        }

        Ok(set)
    }
}

fn decode<B: Buf>(buf: &mut B, options: &DecodeOptions) -> Result<AvlTree<Node>, CorruptStream> {
    ensure_remaining(buf, HEADER_LEN)?;

    let mut magic = [0; 4];
    buf.copy_to_slice(&mut magic);
    if magic != MAGIC {
        return Err(CorruptStream::BadMagic(magic));
    }

    let version = buf.get_u16_le();
    if version != FORMAT_VERSION {
        return Err(CorruptStream::UnsupportedVersion(version));
    }

    let count = buf.get_u32_le();
    let declared = usize::try_from(count).unwrap_or(usize::MAX);

    if declared > options.max_nodes {
        return Err(CorruptStream::CountExceedsLimit {
            count,
            limit: options.max_nodes,
        });
    }

    let remaining = buf.remaining();
    if declared.saturating_mul(RECORD_LEN) > remaining {
        return Err(CorruptStream::CountExceedsStream { count, remaining });
    }

    debug!(count, remaining, "accepted AVLT header");

    if declared == 0 {
        return Ok(AvlTree::new());
    }

    let mut decoder = Decoder {
        buf,
        max_depth: options.max_depth,
        declared,
        decoded: 0,
    };

    let tree = decoder.subtree(None, None, 1)?;

    if decoder.decoded != declared {
        return Err(CorruptStream::CountMismatch {
            declared,
            actual: decoder.decoded,
        });
    }

    Ok(tree)
}

fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<(), CorruptStream> {
    if buf.remaining() < needed {
        return Err(CorruptStream::UnexpectedEof {
            needed,
            remaining: buf.remaining(),
        });
    }

    Ok(())
}

struct Decoder<'b, B> {
    buf: &'b mut B,
    max_depth: usize,
    declared: usize,
    decoded: usize,
}

impl<B: Buf> Decoder<'_, B> {
    // Decodes the subtree whose root record is next in the stream. Its keys must lie strictly
    // between `lower` and `upper`.
    //
    // Every subtree is returned as an owning tree, so the nodes decoded so far are freed if a
    // later record turns out to be corrupt.
    fn subtree(
        &mut self,
        lower: Option<i32>,
        upper: Option<i32>,
        depth: usize,
    ) -> Result<AvlTree<Node>, CorruptStream> {
        if depth > self.max_depth {
            return Err(CorruptStream::TooDeep {
                max_depth: self.max_depth,
            });
        }

        if self.decoded == self.declared {
            return Err(CorruptStream::TooManyRecords {
                count: self.declared,
            });
        }

        ensure_remaining(self.buf, RECORD_LEN)?;

        let index = self.decoded;
        self.decoded += 1;

        let key = self.buf.get_i32_le();
        let flags = self.buf.get_u8();

        if flags & !(HAS_LEFT | HAS_RIGHT) != 0 {
            return Err(CorruptStream::InvalidFlags { flags, index });
        }

        if lower.is_some_and(|lower| key <= lower) || upper.is_some_and(|upper| key >= upper) {
            return Err(CorruptStream::OutOfOrder { key, index });
        }

        let root = Node::into_ptr(MapNode::new(key, ()));
        let tree = unsafe { AvlTree::from_root(root) };

        if flags & HAS_LEFT != 0 {
            let mut left = self.subtree(lower, Some(key), depth + 1)?;
            unsafe { link_child(root, Dir::Left, left.take_root()) };
        }

        if flags & HAS_RIGHT != 0 {
            let mut right = self.subtree(Some(key), upper, depth + 1)?;
            unsafe { link_child(root, Dir::Right, right.take_root()) };
        }

        unsafe {
            update_metrics(root);

            if balance_factor(root).abs() > 1 {
                return Err(CorruptStream::Unbalanced { key, index });
            }
        }

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn header(count: u32) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u16_le(FORMAT_VERSION);
        buf.put_u32_le(count);
        buf
    }

    fn stream(records: &[(i32, u8)]) -> BytesMut {
        let mut buf = header(records.len() as u32);
        for &(key, flags) in records {
            buf.put_i32_le(key);
            buf.put_u8(flags);
        }
        buf
    }

    #[test]
    fn exact_encoding() {
        let set: AvlSet<i32> = [2, 1, 3].into_iter().collect();

        let expected: &[u8] = &[
            b'A', b'V', b'L', b'T', 1, 0, 3, 0, 0, 0, //
            2, 0, 0, 0, 0b11, //
            1, 0, 0, 0, 0, //
            3, 0, 0, 0, 0,
        ];

        assert_eq!(set.to_bytes(), expected);
        assert_eq!(set.serialized_len(), expected.len());
    }

    #[test]
    fn negative_keys_are_little_endian() {
        let set: AvlSet<i32> = [-2].into_iter().collect();
        assert_eq!(set.to_bytes()[HEADER_LEN..], [0xfe, 0xff, 0xff, 0xff, 0]);
    }

    #[test]
    fn empty_set_is_just_a_header() {
        let set = AvlSet::<i32>::new();
        let bytes = set.to_bytes();

        assert_eq!(bytes[..], header(0)[..]);

        let decoded = AvlSet::from_bytes(&bytes).expect("empty stream");
        assert!(decoded.is_empty());
    }

    #[test_log::test]
    fn round_trip_after_delete() {
        let mut set: AvlSet<i32> = [5, 3, 8, 1, 4, 7, 9].into_iter().collect();
        let _ = set.delete(&5);

        let bytes = set.to_bytes();
        let decoded = AvlSet::from_bytes(&bytes).expect("valid stream");

        assert!(decoded.validate());
        assert_eq!(decoded.preorder_with_nulls(), set.preorder_with_nulls());
        assert_eq!(decoded.preorder_with_nulls(), "7 3 1 # # 4 # # 8 # 9 # #");
    }

    #[test_log::test]
    fn count_larger_than_stream() {
        let mut buf = header(5);
        buf.put_slice(&[2, 0, 0, 0, 0b11, 1, 0, 0, 0, 0]);

        assert_eq!(
            AvlSet::deserialize(&mut buf.freeze()),
            Err(CorruptStream::CountExceedsStream {
                count: 5,
                remaining: 10
            })
        );
    }

    #[test]
    fn truncated_header() {
        assert_eq!(
            AvlSet::from_bytes(b"AVL"),
            Err(CorruptStream::UnexpectedEof {
                needed: HEADER_LEN,
                remaining: 3
            })
        );
    }

    #[test]
    fn bad_magic_and_version() {
        let mut bytes = stream(&[(1, 0)]);
        bytes[0] = b'X';
        assert_eq!(
            AvlSet::from_bytes(&bytes),
            Err(CorruptStream::BadMagic(*b"XVLT"))
        );

        let mut bytes = stream(&[(1, 0)]);
        bytes[4] = 2;
        assert_eq!(
            AvlSet::from_bytes(&bytes),
            Err(CorruptStream::UnsupportedVersion(2))
        );
    }

    #[test]
    fn invalid_flags() {
        assert_eq!(
            AvlSet::from_bytes(&stream(&[(1, 0b100)])),
            Err(CorruptStream::InvalidFlags {
                flags: 0b100,
                index: 0
            })
        );
    }

    #[test]
    fn flags_disagree_with_count() {
        // The root claims a left child, but only one record was announced.
        let mut bytes = header(1);
        bytes.put_slice(&[2, 0, 0, 0, HAS_LEFT, 1, 0, 0, 0, 0]);
        assert_eq!(
            AvlSet::<i32>::deserialize(&mut bytes.freeze()),
            Err(CorruptStream::TooManyRecords { count: 1 })
        );

        // Two records announced, but the root is a leaf.
        let mut bytes = header(2);
        bytes.put_slice(&[2, 0, 0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(
            AvlSet::<i32>::deserialize(&mut bytes.freeze()),
            Err(CorruptStream::CountMismatch {
                declared: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn keys_out_of_order() {
        assert_eq!(
            AvlSet::from_bytes(&stream(&[(2, HAS_LEFT), (5, 0)])),
            Err(CorruptStream::OutOfOrder { key: 5, index: 1 })
        );

        // Duplicates break strict order too.
        assert_eq!(
            AvlSet::from_bytes(&stream(&[(2, HAS_RIGHT), (2, 0)])),
            Err(CorruptStream::OutOfOrder { key: 2, index: 1 })
        );

        // The bound is inherited from every ancestor, not just the parent.
        assert_eq!(
            AvlSet::from_bytes(&stream(&[(5, HAS_LEFT | HAS_RIGHT), (2, HAS_RIGHT), (6, 0), (9, 0)])),
            Err(CorruptStream::OutOfOrder { key: 6, index: 2 })
        );
    }

    #[test]
    fn unbalanced_chain() {
        assert_eq!(
            AvlSet::from_bytes(&stream(&[(1, HAS_RIGHT), (2, HAS_RIGHT), (3, 0)])),
            Err(CorruptStream::Unbalanced { key: 1, index: 0 })
        );
    }

    #[test]
    fn limits() {
        let set: AvlSet<i32> = (1..=7).collect();
        let bytes = set.to_bytes();

        let shallow = DecodeOptions {
            max_depth: 2,
            ..DecodeOptions::default()
        };
        assert_eq!(
            AvlSet::deserialize_with(&mut &bytes[..], &shallow),
            Err(CorruptStream::TooDeep { max_depth: 2 })
        );

        let small = DecodeOptions {
            max_nodes: 6,
            ..DecodeOptions::default()
        };
        assert_eq!(
            AvlSet::deserialize_with(&mut &bytes[..], &small),
            Err(CorruptStream::CountExceedsLimit { count: 7, limit: 6 })
        );

        // A huge count is rejected before anything is read or allocated.
        assert_eq!(
            AvlSet::from_bytes(&header(u32::MAX)),
            Err(CorruptStream::CountExceedsLimit {
                count: u32::MAX,
                limit: 1 << 24
            })
        );
    }

    #[test]
    fn trailing_bytes() {
        let set: AvlSet<i32> = [10, 20].into_iter().collect();
        let mut bytes = BytesMut::from(&set.to_bytes()[..]);
        bytes.put_u8(0xff);

        let mut buf = bytes.clone().freeze();
        let decoded = AvlSet::deserialize(&mut buf).expect("trailing bytes are left alone");
        assert_eq!(decoded.preorder_with_nulls(), set.preorder_with_nulls());
        assert_eq!(buf.remaining(), 1);

        assert_eq!(
            AvlSet::from_bytes(&bytes),
            Err(CorruptStream::TrailingBytes(1))
        );
    }

    #[test]
    fn converts_into_crate_error() {
        let error: Error = AvlSet::from_bytes(b"").unwrap_err().into();
        assert!(matches!(
            error,
            Error::CorruptStream(CorruptStream::UnexpectedEof { needed: 10, .. })
        ));
        assert_eq!(
            error.to_string(),
            "unexpected end of stream: needed 10 bytes, 0 remaining"
        );
    }
}
