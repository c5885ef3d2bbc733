//! # Piecewise polynomial trajectories
//!
//! A trajectory file is a sequence of chunks. Each chunk is written as:
//!
//! ```text
//! <duration>
//! <dimension>
//! <coefficients of joint 0>
//! ...
//! <coefficients of joint dimension-1>
//! ```
//!
//! Coefficients are space separated and given weakest term first, each polynomial is evaluated
//! on the time elapsed since the start of its chunk.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::str::FromStr;

use util::maths::{poly_deriv, poly_val};

use super::{TrajError, Trajectory};
use crate::pose::JointPose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single polynomial, coefficients weakest term first.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

/// A section of a trajectory where every joint follows one polynomial.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    duration: f64,
    polys: Vec<Polynomial>,
}

/// A trajectory made of consecutive chunks.
#[derive(Debug, Clone)]
pub struct PiecewisePolyTraj {
    chunks: Vec<Chunk>,

    /// Time at which each chunk starts
    chunk_starts: Vec<f64>,

    duration: f64,

    dimension: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Polynomial {
    pub fn new(coeffs: Vec<f64>) -> Self {
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn eval(&self, s: f64) -> f64 {
        poly_val(s, &self.coeffs)
    }

    pub fn evald(&self, s: f64) -> f64 {
        poly_val(s, &poly_deriv(&self.coeffs))
    }

    pub fn evaldd(&self, s: f64) -> f64 {
        poly_val(s, &poly_deriv(&poly_deriv(&self.coeffs)))
    }

    /// Substitute `s` with `coef * s`, i.e. multiply the `i`th coefficient by `coef^i`.
    pub fn scale(&self, coef: f64) -> Self {
        let mut c = 1.0;
        let coeffs = self
            .coeffs
            .iter()
            .map(|a| {
                let scaled = a * c;
                c *= coef;
                scaled
            })
            .collect();

        Self { coeffs }
    }

    /// Parse a line of space separated coefficients. `line_num` is only used for errors.
    fn parse_line(line_num: usize, line: &str) -> Result<Self, TrajError> {
        let coeffs = line
            .split_whitespace()
            .map(|c| {
                c.parse::<f64>().map_err(|_| TrajError::ParseError {
                    line: line_num,
                    reason: format!("`{}` is not a valid coefficient", c),
                })
            })
            .collect::<Result<Vec<f64>, TrajError>>()?;

        if coeffs.is_empty() {
            return Err(TrajError::ParseError {
                line: line_num,
                reason: "expected polynomial coefficients".into(),
            });
        }

        Ok(Self { coeffs })
    }
}

impl Chunk {
    pub fn new(duration: f64, polys: Vec<Polynomial>) -> Self {
        Self { duration, polys }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn dimension(&self) -> usize {
        self.polys.len()
    }

    pub fn polys(&self) -> &[Polynomial] {
        &self.polys
    }

    /// Positions at `s` seconds after the start of the chunk.
    pub fn eval(&self, s: f64) -> Vec<f64> {
        self.polys.iter().map(|p| p.eval(s)).collect()
    }

    /// Velocities at `s` seconds after the start of the chunk.
    pub fn evald(&self, s: f64) -> Vec<f64> {
        self.polys.iter().map(|p| p.evald(s)).collect()
    }

    /// Accelerations at `s` seconds after the start of the chunk.
    pub fn evaldd(&self, s: f64) -> Vec<f64> {
        self.polys.iter().map(|p| p.evaldd(s)).collect()
    }

    /// Stretch the chunk in time by `coef` without changing its path.
    pub fn retime(&self, coef: f64) -> Self {
        let inv_coef = 1.0 / coef;

        Self {
            duration: self.duration * coef,
            polys: self.polys.iter().map(|p| p.scale(inv_coef)).collect(),
        }
    }
}

impl PiecewisePolyTraj {
    /// Build a trajectory from its chunks.
    ///
    /// There must be at least one chunk, all chunks must share the same non-zero dimension and
    /// have a finite, non-negative duration.
    pub fn new(chunks: Vec<Chunk>) -> Result<Self, TrajError> {
        let dimension = match chunks.first() {
            Some(c) => c.dimension(),
            None => return Err(TrajError::EmptyTrajectory),
        };

        let mut chunk_starts = Vec::with_capacity(chunks.len());
        let mut duration = 0.0;

        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.dimension() == 0 {
                return Err(TrajError::ZeroDimension { chunk: i });
            }
            if chunk.dimension() != dimension {
                return Err(TrajError::DimensionMismatch {
                    chunk: i,
                    expected: dimension,
                    found: chunk.dimension(),
                });
            }
            if !chunk.duration().is_finite() || chunk.duration() < 0.0 {
                return Err(TrajError::InvalidDuration {
                    chunk: i,
                    duration: chunk.duration(),
                });
            }

            chunk_starts.push(duration);
            duration += chunk.duration();
        }

        Ok(Self {
            chunks,
            chunk_starts,
            duration,
            dimension,
        })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Find the chunk containing `s` and the time remaining into that chunk.
    ///
    /// A time exactly on a chunk boundary belongs to the end of the earlier chunk, except `0`
    /// which is the start of the first chunk. Times before the start map onto the start of the
    /// first chunk and times after the end extrapolate the last chunk.
    pub fn find_chunk(&self, s: f64) -> (usize, f64) {
        let index = self
            .chunk_starts
            .partition_point(|&start| start < s)
            .saturating_sub(1);

        (index, (s - self.chunk_starts[index]).max(0.0))
    }

    /// Joint velocities at `s`.
    ///
    /// Units: radians/second
    pub fn evald(&self, s: f64) -> JointPose {
        let (i, rem) = self.find_chunk(s);
        JointPose(self.chunks[i].evald(rem))
    }

    /// Joint accelerations at `s`.
    ///
    /// Units: radians/second^2
    pub fn evaldd(&self, s: f64) -> JointPose {
        let (i, rem) = self.find_chunk(s);
        JointPose(self.chunks[i].evaldd(rem))
    }

    /// Return a copy of this trajectory stretched in time by `coef`.
    ///
    /// A coefficient of 2 doubles the duration and halves all velocities, the path through joint
    /// space is unchanged.
    pub fn retime(&self, coef: f64) -> Result<Self, TrajError> {
        if !coef.is_finite() || coef <= 0.0 {
            return Err(TrajError::InvalidRetimeCoef(coef));
        }

        Self::new(self.chunks.iter().map(|c| c.retime(coef)).collect())
    }
}

impl Trajectory for PiecewisePolyTraj {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn eval(&self, s: f64) -> JointPose {
        let (i, rem) = self.find_chunk(s);
        JointPose(self.chunks[i].eval(rem))
    }
}

impl FromStr for PiecewisePolyTraj {
    type Err = TrajError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        // Blank lines carry no information, line numbers are kept for error reporting
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let mut chunks = Vec::new();

        while let Some((line_num, duration_str)) = lines.next() {
            let duration = duration_str
                .parse::<f64>()
                .map_err(|_| TrajError::ParseError {
                    line: line_num,
                    reason: format!("expected a chunk duration, found `{}`", duration_str),
                })?;

            let (line_num, dimension_str) = lines.next().ok_or_else(|| TrajError::ParseError {
                line: line_num + 1,
                reason: "unexpected end of file, expected a chunk dimension".into(),
            })?;
            let dimension = dimension_str
                .parse::<usize>()
                .map_err(|_| TrajError::ParseError {
                    line: line_num,
                    reason: format!("expected a chunk dimension, found `{}`", dimension_str),
                })?;

            let mut polys = Vec::new();
            let mut last_line = line_num;
            for _ in 0..dimension {
                let (line_num, coeffs_str) = lines.next().ok_or_else(|| TrajError::ParseError {
                    line: last_line + 1,
                    reason: format!(
                        "unexpected end of file, chunk {} expects {} polynomials",
                        chunks.len(),
                        dimension
                    ),
                })?;
                polys.push(Polynomial::parse_line(line_num, coeffs_str)?);
                last_line = line_num;
            }

            chunks.push(Chunk::new(duration, polys));
        }

        Self::new(chunks)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    /// Two chunks of two joints:
    /// - `[0, 1)`: `q0 = s`, `q1 = 1`
    /// - `[1, 3)`: `q0 = 1 + s^2`, `q1 = 1 - 0.5 s`
    const TWO_CHUNKS: &str = "1.0\n2\n0 1\n1\n\n2.0\n2\n1 0 1\n1 -0.5\n";

    fn assert_pose(pose: JointPose, expected: &[f64]) {
        assert_eq!(pose.dimension(), expected.len());
        for (a, b) in pose.as_slice().iter().zip(expected) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_parse_and_eval() {
        let traj: PiecewisePolyTraj = TWO_CHUNKS.parse().unwrap();

        assert_eq!(traj.chunks().len(), 2);
        assert_eq!(traj.dimension(), 2);
        assert_relative_eq!(traj.duration(), 3.0);
        assert_eq!(traj.chunks()[1].polys()[0].degree(), 2);

        assert_pose(traj.eval(0.0), &[0.0, 1.0]);
        assert_pose(traj.eval(0.5), &[0.5, 1.0]);
        assert_pose(traj.eval(2.0), &[2.0, 0.5]);

        assert_pose(traj.evald(2.0), &[2.0, -0.5]);
        assert_pose(traj.evaldd(2.0), &[2.0, 0.0]);
    }

    #[test]
    fn test_chunk_boundaries() {
        let traj: PiecewisePolyTraj = TWO_CHUNKS.parse().unwrap();

        // A boundary belongs to the end of the earlier chunk
        assert_eq!(traj.find_chunk(1.0), (0, 1.0));
        assert_eq!(traj.find_chunk(0.0), (0, 0.0));
        assert_eq!(traj.find_chunk(1.5).0, 1);

        // Out of range times clamp to the first chunk or extrapolate the last
        assert_eq!(traj.find_chunk(-1.0), (0, 0.0));
        assert_pose(traj.eval(-1.0), &[0.0, 1.0]);
        assert_pose(traj.eval(4.0), &[10.0, -0.5]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "".parse::<PiecewisePolyTraj>(),
            Err(TrajError::EmptyTrajectory)
        ));

        assert!(matches!(
            "1.0\n2\n0 1\n".parse::<PiecewisePolyTraj>(),
            Err(TrajError::ParseError { line: 4, .. })
        ));

        assert!(matches!(
            "1.0\n1\n0 x\n".parse::<PiecewisePolyTraj>(),
            Err(TrajError::ParseError { line: 3, .. })
        ));

        assert!(matches!(
            "abc\n".parse::<PiecewisePolyTraj>(),
            Err(TrajError::ParseError { line: 1, .. })
        ));

        assert!(matches!(
            "1.0\n1\n0\n1.0\n2\n0\n0\n".parse::<PiecewisePolyTraj>(),
            Err(TrajError::DimensionMismatch {
                chunk: 1,
                expected: 1,
                found: 2
            })
        ));

        assert!(matches!(
            "-1.0\n1\n0\n".parse::<PiecewisePolyTraj>(),
            Err(TrajError::InvalidDuration { chunk: 0, .. })
        ));

        // A huge dimension runs out of lines rather than allocating
        assert!(matches!(
            "1.0\n18446744073709551615\n0\n".parse::<PiecewisePolyTraj>(),
            Err(TrajError::ParseError { line: 4, .. })
        ));

        assert!(matches!(
            "1.0\n0\n".parse::<PiecewisePolyTraj>(),
            Err(TrajError::ZeroDimension { chunk: 0 })
        ));
    }

    #[test]
    fn test_zero_duration() {
        let traj: PiecewisePolyTraj = "0.0\n1\n0.25\n".parse().unwrap();

        assert_eq!(traj.duration(), 0.0);
        assert_pose(traj.eval(0.0), &[0.25]);
    }

    #[test]
    fn test_retime_keeps_path() {
        let traj: PiecewisePolyTraj = TWO_CHUNKS.parse().unwrap();
        let slow = traj.retime(2.0).unwrap();

        assert_relative_eq!(slow.duration(), 6.0);

        for &s in &[0.0, 0.3, 0.99, 1.7, 2.9] {
            assert_pose(slow.eval(2.0 * s), traj.eval(s).as_slice());
        }

        // Velocities halve
        let v = traj.evald(2.0);
        let v_slow = slow.evald(4.0);
        assert_relative_eq!(v_slow.0[0], v.0[0] / 2.0, epsilon = 1e-12);

        assert!(matches!(
            traj.retime(0.0),
            Err(TrajError::InvalidRetimeCoef(_))
        ));
    }
}
