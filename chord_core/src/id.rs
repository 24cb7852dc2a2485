//! Identifier-space arithmetic: the `Id` type and the arc predicate that
//! everything else in the ring (finger tables, stabilize, replication) is
//! built on top of.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit point on the Chord ring, stored big-endian.
///
/// `Ord` on the byte array is exactly numeric comparison modulo `2^256`,
/// which is what every interval predicate in this module relies on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(pub [u8; 32]);

impl Id {
    pub const ZERO: Id = Id([0u8; 32]);

    /// `SHA-256(bytes) mod 2^256` — a no-op reduction since SHA-256 already
    /// produces a 32-byte digest, but named to match the spec's phrasing.
    pub fn hash(bytes: impl AsRef<[u8]>) -> Id {
        let digest = Sha256::digest(bytes.as_ref());
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Id(out)
    }

    /// `(self + 2^bit) mod 2^256`, via ripple-carry addition over the
    /// big-endian byte array.
    pub fn wrapping_add_pow2(self, bit: u32) -> Id {
        assert!(bit < 256, "bit offset must be within the 256-bit ring");
        let byte_index = 31 - (bit / 8) as usize;
        let mut bytes = self.0;
        let mut carry = 1u16 << (bit % 8);
        for b in bytes[..=byte_index].iter_mut().rev() {
            let sum = *b as u16 + carry;
            *b = sum as u8;
            carry = sum >> 8;
            if carry == 0 {
                break;
            }
        }
        Id(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Id, hex::FromHexError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Id(out))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Id::from_hex(&s).map_err(D::Error::custom)
    }
}

/// `true` iff `key` lies on the arc walked clockwise from `start` to `end`.
///
/// `inclusive` governs whether `end` itself counts as being in the arc;
/// `start` is never in the arc (arcs are half-open on their low side).
pub fn in_arc(start: Id, key: Id, end: Id, inclusive: bool) -> bool {
    if start == end {
        return if inclusive { key == start } else { false };
    }
    if start < end {
        if inclusive {
            start < key && key <= end
        } else {
            start < key && key < end
        }
    } else if inclusive {
        key > start || key <= end
    } else {
        key > start || key < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> Id {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        Id(bytes)
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(Id::hash("alpha"), Id::hash("alpha"));
        assert_ne!(Id::hash("alpha"), Id::hash("beta"));
    }

    #[test]
    fn wrapping_add_simple() {
        assert_eq!(id(5).wrapping_add_pow2(0), id(6));
        assert_eq!(id(5).wrapping_add_pow2(2), id(9));
    }

    #[test]
    fn wrapping_add_overflows_at_top_byte() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0xff;
        let top = Id(bytes);
        let mut expected = [0u8; 32];
        expected[30] = 1;
        assert_eq!(top.wrapping_add_pow2(0), Id(expected));
    }

    #[test]
    fn wrapping_add_wraps_the_whole_ring() {
        let max = Id([0xff; 32]);
        assert_eq!(max.wrapping_add_pow2(0), Id::ZERO);
    }

    #[test]
    fn in_arc_non_wrapping() {
        let (a, b, c) = (id(1), id(5), id(10));
        assert!(in_arc(a, b, c, true));
        assert!(in_arc(a, b, c, false));
        assert!(in_arc(a, c, c, true));
        assert!(!in_arc(a, c, c, false));
        assert!(!in_arc(a, a, c, true));
    }

    #[test]
    fn in_arc_wrapping() {
        let (start, key, end) = (id(200), id(250), id(10));
        assert!(in_arc(start, key, end, true));
        let (start, key, end) = (id(200), id(5), id(10));
        assert!(in_arc(start, key, end, true));
        assert!(!in_arc(start, id(50), end, true));
    }

    #[test]
    fn in_arc_equal_endpoints() {
        let a = id(42);
        assert!(in_arc(a, a, a, true));
        assert!(!in_arc(a, a, a, false));
        assert!(!in_arc(a, id(1), a, false));
    }

    #[test]
    fn in_arc_inclusive_law() {
        // in_arc(a, b, c, true) <=> b == c || in_arc(a, b, c, false)
        for a in [id(0), id(7), id(250)] {
            for b in [id(0), id(7), id(128), id(250)] {
                for c in [id(0), id(7), id(250)] {
                    let inclusive = in_arc(a, b, c, true);
                    let law = b == c || in_arc(a, b, c, false);
                    assert_eq!(inclusive, law, "a={a:?} b={b:?} c={c:?}");
                }
            }
        }
    }
}
