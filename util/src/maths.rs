//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Evaluate a polynomial at `value`.
///
/// Coefficients are given weakest term first, i.e. `coeffs[i]` multiplies
/// `value^i`. An empty coefficient list is the zero polynomial.
pub fn poly_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float,
{
    coeffs
        .iter()
        .rev()
        .fold(T::zero(), |acc, &c| acc * value + c)
}

/// Coefficients of the derivative of a polynomial, weakest term first.
pub fn poly_deriv<T>(coeffs: &[T]) -> Vec<T>
where
    T: Float,
{
    coeffs
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, &c)| c * T::from(i).unwrap_or_else(T::nan))
        .collect()
}

/// Return the euclidian norm (distance between) of two points.
///
/// If the points do not have the same number of dimentions then `None` is
/// returned.
pub fn norm<T>(point_0: &[T], point_1: &[T]) -> Option<T>
where
    T: Float,
{
    if point_0.len() != point_1.len() {
        return None;
    }

    Some(
        point_0
            .iter()
            .zip(point_1.iter())
            .fold(T::zero(), |sum, (&a, &b)| sum + (a - b).powi(2))
            .sqrt(),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_poly_val() {
        // 1 + 2x + 3x^2
        let c = [1.0, 2.0, 3.0];
        assert_relative_eq!(poly_val(0.0, &c), 1.0);
        assert_relative_eq!(poly_val(2.0, &c), 17.0);
        assert_relative_eq!(poly_val(-1.0, &c), 2.0);
        assert_relative_eq!(poly_val(5.0, &[] as &[f64]), 0.0);
    }

    #[test]
    fn test_poly_deriv() {
        assert_eq!(poly_deriv(&[1.0, 2.0, 3.0]), vec![2.0, 6.0]);
        assert_eq!(poly_deriv(&[4.0]), Vec::<f64>::new());
    }

    #[test]
    fn test_norm() {
        assert_relative_eq!(norm(&[0.0, 0.0], &[3.0, 4.0]).unwrap(), 5.0);
        assert!(norm(&[0.0], &[1.0, 2.0]).is_none());
    }
}
