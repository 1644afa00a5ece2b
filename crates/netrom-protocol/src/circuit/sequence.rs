//! 7-bit circuit sequence numbers.

use core::fmt;

use super::constants::SEQ_MODULUS;

/// A sequence number modulo 128.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SeqNo(u8);

impl SeqNo {
    pub const ZERO: SeqNo = SeqNo(0);

    /// Reduce `value` into the sequence space.
    pub fn new(value: u8) -> Self {
        Self(value % SEQ_MODULUS)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// The following sequence number, wrapping 127 to 0.
    #[must_use]
    pub fn next(self) -> Self {
        Self((self.0 + 1) % SEQ_MODULUS)
    }

    /// Forward distance from `self` to `other`.
    pub fn distance_to(self, other: SeqNo) -> u8 {
        (other.0 + SEQ_MODULUS - self.0) % SEQ_MODULUS
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn stepping_n_times_covers_distance(start in 0..128u8, steps in 0..128u8) {
            let from = SeqNo::new(start);
            let mut to = from;
            for _ in 0..steps {
                to = to.next();
            }
            prop_assert!(to.value() < 128);
            prop_assert_eq!(from.distance_to(to), steps);
        }
    }
}
