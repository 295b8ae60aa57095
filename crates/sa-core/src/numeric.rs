use crate::CoreError;

/// Floating point type used throughout the engine
pub type Real = f64;

/// Reject NaN and infinities coming in through public setters.
pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Vector norm order used by convergence checks.
///
/// `Max` is the infinity norm; `P(n)` is the usual n-norm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NormOrder {
    Max,
    One,
    #[default]
    Two,
    P(u32),
}

impl NormOrder {
    /// Map the integer flag used in analysis scripts (0 = max, n = n-norm).
    pub fn from_flag(flag: u32) -> Self {
        match flag {
            0 => NormOrder::Max,
            1 => NormOrder::One,
            2 => NormOrder::Two,
            n => NormOrder::P(n),
        }
    }
}

pub fn norm(v: &[Real], order: NormOrder) -> Real {
    match order {
        NormOrder::Max => v.iter().fold(0.0, |acc: Real, x| acc.max(x.abs())),
        NormOrder::One => v.iter().map(|x| x.abs()).sum(),
        NormOrder::Two => v.iter().map(|x| x * x).sum::<Real>().sqrt(),
        NormOrder::P(p) => {
            let p = p as Real;
            v.iter()
                .map(|x| x.abs().powf(p))
                .sum::<Real>()
                .powf(1.0 / p)
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn max_norm_bounds_two_norm(v in prop::collection::vec(-1e3_f64..1e3_f64, 1..20)) {
            let inf = norm(&v, NormOrder::Max);
            let two = norm(&v, NormOrder::Two);
            let one = norm(&v, NormOrder::One);
            prop_assert!(inf <= two + 1e-9);
            prop_assert!(two <= one + 1e-9);
        }
    }
}
