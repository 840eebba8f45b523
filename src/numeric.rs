//! Numeric policy shared by every solver backend.
//!
//! Flow and cost quantities are independent scalar types. Integer types give
//! exact arithmetic; floating-point types trade exactness for range and are
//! compared through the epsilon helpers below. The `Wide` associated type is
//! used to accumulate objective values (`sum(|C| * |F|)`) without overflow.

use num_traits::{FromPrimitive, NumAssign, NumCast, ToPrimitive};
use std::fmt::{Debug, Display};
use std::ops::Neg;
use std::str::FromStr;

/// Scalar usable as a flow or cost number.
pub trait Scalar:
    NumAssign
    + Neg<Output = Self>
    + PartialOrd
    + Copy
    + Default
    + Debug
    + Display
    + NumCast
    + FromPrimitive
    + FromStr
    + 'static
{
    /// Type wide enough to hold sums of products of this type.
    type Wide: Scalar;

    /// true for integer scalars, false for floating-point ones.
    const INTEGRAL: bool;

    /// The "does not exist / no bound" sentinel (`F_INF` / `C_INF`).
    fn inf() -> Self;

    /// Machine precision; zero for integer types.
    fn machine_eps() -> Self;

    /// Division rounding toward negative infinity.
    fn floor_div(self, rhs: Self) -> Self;

    fn abs(self) -> Self {
        if self < Self::zero() {
            -self
        } else {
            self
        }
    }
}

macro_rules! impl_scalar_int {
    ($t:ty, $wide:ty) => {
        impl Scalar for $t {
            type Wide = $wide;
            const INTEGRAL: bool = true;

            fn inf() -> Self {
                <$t>::MAX
            }

            fn machine_eps() -> Self {
                0
            }

            fn floor_div(self, rhs: Self) -> Self {
                self.div_euclid(rhs)
            }
        }
    };
}

impl_scalar_int!(i32, i64);
impl_scalar_int!(i64, i128);
impl_scalar_int!(i128, i128);

impl Scalar for f64 {
    type Wide = f64;
    const INTEGRAL: bool = false;

    fn inf() -> Self {
        f64::INFINITY
    }

    fn machine_eps() -> Self {
        f64::EPSILON
    }

    fn floor_div(self, rhs: Self) -> Self {
        (self / rhs).floor()
    }
}

/// Lossless-in-practice numeric conversion; panics only on conversions the
/// solver never performs (e.g. non-finite values into integers).
#[inline]
pub(crate) fn cast<T: ToPrimitive, U: NumCast>(x: T) -> U {
    NumCast::from(x).unwrap()
}

#[inline]
pub(crate) fn min2<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

#[inline]
pub(crate) fn max2<T: PartialOrd>(a: T, b: T) -> T {
    if a < b {
        b
    } else {
        a
    }
}

// Comparison helpers: with a zero epsilon they degrade to the strict forms.

/// x == 0
#[inline]
pub fn etz<T: Scalar>(x: T, eps: T) -> bool {
    x <= eps && x >= -eps
}

/// x > 0
#[inline]
pub fn gtz<T: Scalar>(x: T, eps: T) -> bool {
    x > eps
}

/// x >= 0
#[inline]
pub fn gez<T: Scalar>(x: T, eps: T) -> bool {
    x >= -eps
}

/// x < 0
#[inline]
pub fn ltz<T: Scalar>(x: T, eps: T) -> bool {
    x < -eps
}

/// x <= 0
#[inline]
pub fn lez<T: Scalar>(x: T, eps: T) -> bool {
    x <= eps
}

/// x > y
#[inline]
pub fn gt<T: Scalar>(x: T, y: T, eps: T) -> bool {
    x > y + eps
}

/// x < y
#[inline]
pub fn lt<T: Scalar>(x: T, y: T, eps: T) -> bool {
    x < y - eps
}

/// Whether user-visible node names start at 0 or at 1. External convention
/// only; internal indexing is always zero-based.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum NameBase {
    Zero,
    #[default]
    One,
}

impl NameBase {
    #[inline]
    pub fn offset(self) -> usize {
        match self {
            NameBase::Zero => 0,
            NameBase::One => 1,
        }
    }
}

/// Tolerances and naming convention for one solver instance.
///
/// The deficit epsilon is finalized against the node bound when a network is
/// loaded: `eps_deficit = eps_flow * max(1, nmax)`.
#[derive(Clone, Copy, Debug)]
pub struct NumericPolicy<F: Scalar, C: Scalar> {
    pub eps_flow: F,
    pub eps_deficit: F,
    pub eps_cost: C,
    pub name_base: NameBase,
}

impl<F: Scalar, C: Scalar> Default for NumericPolicy<F, C> {
    fn default() -> Self {
        Self::new(true, true, NameBase::default())
    }
}

impl<F: Scalar, C: Scalar> NumericPolicy<F, C> {
    pub fn new(eps_flow_enabled: bool, eps_cost_enabled: bool, name_base: NameBase) -> Self {
        let eps_flow = if eps_flow_enabled { Self::default_eps_flow() } else { F::zero() };
        let eps_cost = if eps_cost_enabled { Self::default_eps_cost() } else { C::zero() };
        Self { eps_flow, eps_deficit: eps_flow, eps_cost, name_base }
    }

    /// `F_em * 100` for floating-point flows, zero for integer ones.
    pub fn default_eps_flow() -> F {
        if F::INTEGRAL {
            F::zero()
        } else {
            F::machine_eps() * cast(100)
        }
    }

    /// `C_em * 100` for floating-point costs, zero for integer ones.
    pub fn default_eps_cost() -> C {
        if C::INTEGRAL {
            C::zero()
        } else {
            C::machine_eps() * cast(100)
        }
    }

    pub(crate) fn finalize_deficit(&mut self, nmax: usize) {
        self.eps_deficit = self.eps_flow * cast(nmax.max(1));
    }
}
