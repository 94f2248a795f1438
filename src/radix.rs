//! Digit extraction for radix passes.
//!
//! A key is first mapped to an order-preserving unsigned representation
//! (`RadixKey::to_radix_bits`). A sort then walks a bit window of that
//! representation from the least significant end, `radix_bits` at a time.
//! Each step is a `DigitPass`; the last one is narrowed to whatever is left
//! of the window.

use bytemuck::Pod;

use crate::error::{Error, Result};

/// Largest digit width supported by the rank tables.
pub const MAX_RADIX_BITS: u32 = 8;

/// Default digit width.
pub const RADIX_BITS: u32 = 4;

/// A key that can be sorted digit by digit.
///
/// `to_radix_bits` must be monotonic: `a < b` implies
/// `a.to_radix_bits() < b.to_radix_bits()`. Only the low `BITS` bits of the
/// result may be set.
pub trait RadixKey: Pod + Send + Sync {
    /// Width of the key representation in bits.
    const BITS: u32;

    fn to_radix_bits(self) -> u64;
}

/// Unsigned integers are already ordered by their bit pattern.
macro_rules! impl_radix_key_unsigned {
    ($($key:ty),*) => {
        $(
        impl RadixKey for $key {
            const BITS: u32 = <$key>::BITS;

            #[inline]
            fn to_radix_bits(self) -> u64 {
                self as u64
            }
        }
        )*
    }
}

/// Two's complement integers: flipping the sign bit moves negatives below
/// positives.
macro_rules! impl_radix_key_signed {
    ($($key:ty => $bits:ty),*) => {
        $(
        impl RadixKey for $key {
            const BITS: u32 = <$key>::BITS;

            #[inline]
            fn to_radix_bits(self) -> u64 {
                let sign = !(<$bits>::MAX >> 1);
                ((self as $bits) ^ sign) as u64
            }
        }
        )*
    }
}

/// IEEE-754: negatives have every bit inverted (larger magnitude sorts
/// first), positives get the sign bit set. `-0.0` is encoded as `+0.0` so
/// the two zeros compare equal.
macro_rules! impl_radix_key_float {
    ($($key:ty => $bits:ty),*) => {
        $(
        impl RadixKey for $key {
            const BITS: u32 = <$bits>::BITS;

            #[inline]
            fn to_radix_bits(self) -> u64 {
                let sign = !(<$bits>::MAX >> 1);
                let bits = match self.to_bits() {
                    b if b == sign => 0,
                    b => b,
                };
                if bits & sign != 0 {
                    (!bits) as u64
                } else {
                    (bits | sign) as u64
                }
            }
        }
        )*
    }
}

impl_radix_key_unsigned! {u8, u16, u32, u64, usize}
impl_radix_key_signed! {i8 => u8, i16 => u16, i32 => u32, i64 => u64, isize => usize}
impl_radix_key_float! {f32 => u32, f64 => u64}

/// Direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn is_descending(self) -> bool {
        self == SortOrder::Descending
    }
}

/// The bits `[start_bit, end_bit)` of a key's radix representation that take
/// part in ordering. Bits outside the window are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitWindow {
    start_bit: u32,
    end_bit: u32,
}

impl BitWindow {
    /// Panics unless `start_bit < end_bit <= 64`.
    pub fn new(start_bit: u32, end_bit: u32) -> Self {
        assert!(
            start_bit < end_bit && end_bit <= u64::BITS,
            "malformed bit window [{}, {})",
            start_bit,
            end_bit
        );
        Self { start_bit, end_bit }
    }

    /// Checks the window against a key width.
    pub fn try_new(start_bit: u32, end_bit: u32, key_bits: u32) -> Result<Self> {
        if start_bit < end_bit && end_bit <= key_bits && key_bits <= u64::BITS {
            Ok(Self { start_bit, end_bit })
        } else {
            Err(Error::InvalidBitWindow {
                start_bit,
                end_bit,
                key_bits,
            })
        }
    }

    /// Stored as given; only `try_new` may turn it into a usable window.
    pub(crate) fn unchecked(start_bit: u32, end_bit: u32) -> Self {
        Self { start_bit, end_bit }
    }

    /// Every bit of `K`.
    pub fn full<K: RadixKey>() -> Self {
        Self {
            start_bit: 0,
            end_bit: K::BITS,
        }
    }

    pub fn start_bit(&self) -> u32 {
        self.start_bit
    }

    pub fn end_bit(&self) -> u32 {
        self.end_bit
    }

    pub fn width(&self) -> u32 {
        self.end_bit - self.start_bit
    }

    /// True if the window fits inside a `key_bits` wide key.
    pub fn fits(&self, key_bits: u32) -> bool {
        self.end_bit <= key_bits
    }

    /// The part of `bits` the window selects, shifted down to bit 0.
    #[inline]
    pub fn window_value(&self, bits: u64) -> u64 {
        (bits >> self.start_bit) & low_mask(self.width())
    }

    /// `ceil(width / radix_bits)`.
    pub fn pass_count(&self, radix_bits: u32) -> u32 {
        (self.width() + radix_bits - 1) / radix_bits
    }

    /// The passes of an LSD sort over this window, least significant first.
    pub fn passes(self, radix_bits: u32) -> impl Iterator<Item = DigitPass> {
        assert!((1..=MAX_RADIX_BITS).contains(&radix_bits));
        let end_bit = self.end_bit;
        (self.start_bit..end_bit)
            .step_by(radix_bits as usize)
            .map(move |shift| DigitPass {
                shift,
                width: radix_bits.min(end_bit - shift),
            })
    }
}

/// One digit slice of a bit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitPass {
    pub shift: u32,
    pub width: u32,
}

impl DigitPass {
    /// Number of distinct digits this pass can produce.
    pub fn radix(&self) -> usize {
        1 << self.width
    }

    /// Digit used for ranking, in `[0, 2^width)`. Descending order uses the
    /// complement of the digit, so both directions share one ranking path.
    #[inline]
    pub fn extract(&self, bits: u64, order: SortOrder) -> u32 {
        let mask = low_mask(self.width);
        let digit = (bits >> self.shift) & mask;
        match order {
            SortOrder::Ascending => digit as u32,
            SortOrder::Descending => (digit ^ mask) as u32,
        }
    }
}

#[inline]
fn low_mask(width: u32) -> u64 {
    if width == 0 {
        0
    } else {
        u64::MAX >> (u64::BITS - width)
    }
}
