//! Exact rational arithmetic for brightness calculations.
//!
//! Brightness is carried as an unreduced fraction so repeated key presses
//! never accumulate floating-point drift. Every operation that can grow the
//! numerator or denominator is checked and reports overflow as `None`.

use std::fmt;
use std::ops::Neg;

/// Signed rational number `top / bot` with a non-zero denominator.
///
/// The fraction is never reduced; `2/4` and `1/2` are different values of
/// this type even though they compare equal numerically.
///
/// # Example
///
/// ```
/// use illumd::fraction::Fraction;
///
/// let half = Fraction::new(1, 2).unwrap();
/// let step = Fraction::new(5, 100).unwrap();
/// let sum = half.checked_add(step).unwrap();
/// assert_eq!((sum.top(), sum.bot()), (110, 200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    top: i128,
    bot: u128,
}

impl Fraction {
    /// Creates a fraction, or `None` when the denominator is zero.
    pub const fn new(top: i128, bot: u128) -> Option<Self> {
        if bot == 0 {
            None
        } else {
            Some(Self { top, bot })
        }
    }

    /// `percent / 100`.
    pub const fn percent(percent: u8) -> Self {
        Self {
            top: percent as i128,
            bot: 100,
        }
    }

    pub const fn top(&self) -> i128 {
        self.top
    }

    pub const fn bot(&self) -> u128 {
        self.bot
    }

    /// Sign of the numerator: -1, 0 or +1.
    pub const fn sign(&self) -> i8 {
        self.top.signum() as i8
    }

    /// Sum of two fractions.
    ///
    /// Equal denominators add numerators directly so the working denominator
    /// does not grow; otherwise the operands are cross-multiplied.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.bot == other.bot {
            return Some(Self {
                top: self.top.checked_add(other.top)?,
                bot: self.bot,
            });
        }

        let lhs = self.top.checked_mul(i128::try_from(other.bot).ok()?)?;
        let rhs = other.top.checked_mul(i128::try_from(self.bot).ok()?)?;
        Some(Self {
            top: lhs.checked_add(rhs)?,
            bot: self.bot.checked_mul(other.bot)?,
        })
    }

    /// Componentwise product.
    pub fn checked_mul(self, other: Self) -> Option<Self> {
        Some(Self {
            top: self.top.checked_mul(other.top)?,
            bot: self.bot.checked_mul(other.bot)?,
        })
    }

    /// Square root taken jointly over numerator and denominator.
    ///
    /// Computes `isqrt(top * bot) / bot`, which keeps the denominator fixed
    /// across repeated applications. Returns `None` for a negative value or
    /// when `top * bot` does not fit.
    pub fn sqrt(self) -> Option<Self> {
        let top = u128::try_from(self.top).ok()?;
        let root = isqrt(top.checked_mul(self.bot)?);
        Some(Self {
            top: i128::try_from(root).ok()?,
            bot: self.bot,
        })
    }

    /// Clamps the numerator into `[lo, hi]`, keeping the denominator.
    pub fn clamp_numerator(self, lo: i128, hi: i128) -> Self {
        Self {
            top: self.top.max(lo).min(hi),
            bot: self.bot,
        }
    }

    /// Converts the fraction into a whole count out of `scale`.
    ///
    /// When the denominator already equals `scale` the numerator is returned
    /// untouched; otherwise the result is `floor(top * scale / bot)`.
    /// Negative values have no count and yield `None`.
    pub fn as_count_of(self, scale: u128) -> Option<u128> {
        let top = u128::try_from(self.top).ok()?;
        if self.bot == scale {
            return Some(top);
        }
        Some(top.checked_mul(scale)? / self.bot)
    }
}

impl Neg for Fraction {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            top: -self.top,
            bot: self.bot,
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.top, self.bot)
    }
}

/// Integer square root, `floor(sqrt(n))`, by bit trial.
///
/// Each bit of the root is tried from the most significant down and kept if
/// the candidate still squares to at most `n`. The root of any `u128` is
/// below `2^64`, so the candidate square never overflows.
pub fn isqrt(n: u128) -> u128 {
    let mut root = 0u128;
    let mut bit = 1u128 << 63;

    while bit != 0 {
        let candidate = root | bit;
        if candidate * candidate <= n {
            root = candidate;
        }
        bit >>= 1;
    }

    root
}
