// ============================================================================
// Point Algebra - alt_bn128 (y² = x³ + 3)
// ============================================================================
//
// Collection identifiers are points on the alt_bn128 curve, compressed to a
// single 256-bit word:
//
//   word = x                 (y even)
//   word = x | (1 << 254)    (y odd)
//
// Combining collections is point addition, so the combined id does not depend
// on the order in which conditions were applied. The point at infinity is
// the identity and encodes as zero ("no parent collection").
//
// Internally additions run in Jacobian coordinates and are normalized once
// at the end.
//
// ============================================================================

use alloy_primitives::{B256, U256};
use std::fmt;
use std::ops::Add;

/// Field modulus of alt_bn128.
pub const FIELD_MODULUS: U256 = U256::from_limbs([
    0x3c208c16d87cfd47,
    0x97816a916871ca8d,
    0xb85045b68181585d,
    0x30644e72e131a029,
]);

/// Curve constant `b` in `y² = x³ + b`.
pub const CURVE_B: U256 = U256::from_limbs([3, 0, 0, 0]);

/// Bit 254 carries the parity of `y` in the compressed encoding.
pub const ODD_TOGGLE: U256 = U256::from_limbs([0, 0, 0, 1 << 62]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurveError {
    /// The word does not decompress to a point on the curve.
    NotOnCurve(U256),
}

impl fmt::Display for CurveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveError::NotOnCurve(word) => write!(f, "invalid collection id {:#x}", word),
        }
    }
}

impl std::error::Error for CurveError {}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn fadd(a: U256, b: U256) -> U256 {
    a.add_mod(b, FIELD_MODULUS)
}

fn fsub(a: U256, b: U256) -> U256 {
    a.add_mod(FIELD_MODULUS - b.reduce_mod(FIELD_MODULUS), FIELD_MODULUS)
}

fn fmul(a: U256, b: U256) -> U256 {
    a.mul_mod(b, FIELD_MODULUS)
}

fn fsmall(k: u8, a: U256) -> U256 {
    fmul(U256::from(k), a)
}

/// Right-hand side of the curve equation.
fn curve_rhs(x: U256) -> U256 {
    fadd(fmul(x, fmul(x, x)), CURVE_B)
}

/// Square root modulo the field prime. The prime is 3 mod 4, so a single
/// exponentiation suffices; `None` when `a` is not a quadratic residue.
fn fsqrt(a: U256) -> Option<U256> {
    let exponent = (FIELD_MODULUS + U256::from(1u8)) >> 2;
    let root = a.pow_mod(exponent, FIELD_MODULUS);
    if fmul(root, root) == a {
        Some(root)
    } else {
        None
    }
}

fn is_odd(a: U256) -> bool {
    a.bit(0)
}

// ============================================================================
// CURVE POINT
// ============================================================================

/// An alt_bn128 point in affine form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurvePoint {
    Infinity,
    Affine { x: U256, y: U256 },
}

impl CurvePoint {
    pub const IDENTITY: CurvePoint = CurvePoint::Infinity;

    /// Deterministically maps a 256-bit seed onto the curve.
    ///
    /// Starting at `seed mod p`, `x` is incremented until `x³ + 3` has a
    /// square root. The top bit of the seed chooses which of the two roots
    /// is used, so the result is a single canonical point per seed.
    pub fn from_seed(seed: B256) -> Self {
        let word = U256::from_be_bytes(seed.0);
        let want_odd = word.bit(255);

        let mut x = word.reduce_mod(FIELD_MODULUS);
        let (x, mut y) = loop {
            x = fadd(x, U256::from(1u8));
            if let Some(y) = fsqrt(curve_rhs(x)) {
                break (x, y);
            }
        };

        if is_odd(y) != want_odd {
            y = FIELD_MODULUS - y;
        }

        CurvePoint::Affine { x, y }
    }

    /// Decompresses an encoded word. Zero is the identity.
    pub fn decode(word: U256) -> Result<Self, CurveError> {
        if word.is_zero() {
            return Ok(CurvePoint::Infinity);
        }

        let odd = word.bit(254);
        // x lives in the low 254 bits
        let x = (word << 2) >> 2;
        if x >= FIELD_MODULUS {
            return Err(CurveError::NotOnCurve(word));
        }

        let mut y = fsqrt(curve_rhs(x)).ok_or(CurveError::NotOnCurve(word))?;
        if is_odd(y) != odd {
            y = FIELD_MODULUS - y;
        }

        Ok(CurvePoint::Affine { x, y })
    }

    /// Compresses the point into a single word.
    pub fn encode(&self) -> U256 {
        match *self {
            CurvePoint::Infinity => U256::ZERO,
            CurvePoint::Affine { x, y } => {
                if is_odd(y) {
                    x ^ ODD_TOGGLE
                } else {
                    x
                }
            }
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, CurvePoint::Infinity)
    }

    /// Sums any number of points.
    pub fn sum<I: IntoIterator<Item = CurvePoint>>(points: I) -> CurvePoint {
        points
            .into_iter()
            .fold(Jacobian::INFINITY, |acc, p| acc.add_affine(p))
            .normalize()
    }
}

impl Add for CurvePoint {
    type Output = CurvePoint;

    fn add(self, rhs: CurvePoint) -> CurvePoint {
        Jacobian::from(self).add_affine(rhs).normalize()
    }
}

// ============================================================================
// JACOBIAN ARITHMETIC
// ============================================================================

/// (X, Y, Z) represents (X/Z², Y/Z³); Z = 0 is infinity.
#[derive(Debug, Clone, Copy)]
struct Jacobian {
    x: U256,
    y: U256,
    z: U256,
}

impl Jacobian {
    const INFINITY: Jacobian = Jacobian {
        x: U256::from_limbs([1, 0, 0, 0]),
        y: U256::from_limbs([1, 0, 0, 0]),
        z: U256::ZERO,
    };

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    /// Mixed addition (madd-2007-bl), falling back to doubling when both
    /// operands are the same point.
    fn add_affine(self, other: CurvePoint) -> Jacobian {
        let (x2, y2) = match other {
            CurvePoint::Infinity => return self,
            CurvePoint::Affine { x, y } => (x, y),
        };
        if self.is_infinity() {
            return Jacobian::from(other);
        }

        let z1z1 = fmul(self.z, self.z);
        let u2 = fmul(x2, z1z1);
        let s2 = fmul(y2, fmul(self.z, z1z1));
        let h = fsub(u2, self.x);
        let r = fsmall(2, fsub(s2, self.y));

        if h.is_zero() {
            return if r.is_zero() {
                self.double()
            } else {
                Jacobian::INFINITY
            };
        }

        let hh = fmul(h, h);
        let i = fsmall(4, hh);
        let j = fmul(h, i);
        let v = fmul(self.x, i);

        let x3 = fsub(fsub(fmul(r, r), j), fsmall(2, v));
        let y3 = fsub(fmul(r, fsub(v, x3)), fsmall(2, fmul(self.y, j)));
        let z1_plus_h = fadd(self.z, h);
        let z3 = fsub(fsub(fmul(z1_plus_h, z1_plus_h), z1z1), hh);

        Jacobian { x: x3, y: y3, z: z3 }
    }

    /// Doubling for a = 0 curves (dbl-2009-l).
    fn double(self) -> Jacobian {
        if self.is_infinity() || self.y.is_zero() {
            return Jacobian::INFINITY;
        }

        let a = fmul(self.x, self.x);
        let b = fmul(self.y, self.y);
        let c = fmul(b, b);
        let x1_plus_b = fadd(self.x, b);
        let d = fsmall(2, fsub(fsub(fmul(x1_plus_b, x1_plus_b), a), c));
        let e = fsmall(3, a);
        let f = fmul(e, e);

        let x3 = fsub(f, fsmall(2, d));
        let y3 = fsub(fmul(e, fsub(d, x3)), fsmall(8, c));
        let z3 = fsmall(2, fmul(self.y, self.z));

        Jacobian { x: x3, y: y3, z: z3 }
    }

    fn normalize(self) -> CurvePoint {
        if self.is_infinity() {
            return CurvePoint::Infinity;
        }
        // z is nonzero and the modulus is prime, so the inverse exists.
        let Some(z_inv) = self.z.inv_mod(FIELD_MODULUS) else {
            return CurvePoint::Infinity;
        };
        let z_inv2 = fmul(z_inv, z_inv);
        let z_inv3 = fmul(z_inv2, z_inv);

        CurvePoint::Affine {
            x: fmul(self.x, z_inv2),
            y: fmul(self.y, z_inv3),
        }
    }
}

impl From<CurvePoint> for Jacobian {
    fn from(p: CurvePoint) -> Self {
        match p {
            CurvePoint::Infinity => Jacobian::INFINITY,
            CurvePoint::Affine { x, y } => Jacobian { x, y, z: U256::from(1u8) },
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
