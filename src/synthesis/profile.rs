//! Normalized line shape functions.

use super::fsp;
use crate::{
    constants::{INV_SQRT_PI, LN_2, PI},
    error::SimulationError,
};
use num::complex::Complex64;
use std::{fmt, str::FromStr};

/// Shape of the profile each line is spread out with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineShape {
    /// Convolution of the Doppler and Lorentz profiles.
    Voigt,
    /// Doppler profile only.
    Gaussian,
    /// Lorentz profile only.
    Lorentzian,
}

impl LineShape {
    pub const ALL: [Self; 3] = [Self::Voigt, Self::Gaussian, Self::Lorentzian];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Voigt => "voigt",
            Self::Gaussian => "gaussian",
            Self::Lorentzian => "lorentzian",
        }
    }

    /// Evaluates the profile [cm] at the given offset [cm⁻¹] from the line
    /// center for the given Doppler and Lorentz half widths [cm⁻¹].
    #[inline]
    pub fn evaluate(&self, offset: fsp, doppler_width: fsp, lorentz_width: fsp) -> fsp {
        match self {
            Self::Voigt => voigt(offset, doppler_width, lorentz_width),
            Self::Gaussian => gaussian(offset, doppler_width),
            Self::Lorentzian => lorentzian(offset, lorentz_width),
        }
    }
}

impl Default for LineShape {
    fn default() -> Self {
        Self::Voigt
    }
}

impl fmt::Display for LineShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for LineShape {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|shape| shape.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SimulationError::InvalidInput(format!("Invalid line shape {}", s)))
    }
}

/// Normalized Gaussian with the given half width at half maximum.
pub fn gaussian(offset: fsp, half_width: fsp) -> fsp {
    let scaled = offset / half_width;
    fsp::sqrt(LN_2 / PI) / half_width * fsp::exp(-LN_2 * scaled * scaled)
}

/// Normalized Lorentzian with the given half width at half maximum.
pub fn lorentzian(offset: fsp, half_width: fsp) -> fsp {
    half_width / (PI * (offset * offset + half_width * half_width))
}

/// Normalized Voigt profile with the given Doppler and Lorentz half widths.
///
/// Degenerates to the pure Gaussian or Lorentzian when the other width vanishes.
pub fn voigt(offset: fsp, doppler_width: fsp, lorentz_width: fsp) -> fsp {
    if doppler_width <= 0.0 {
        return lorentzian(offset, lorentz_width);
    }
    if lorentz_width <= 0.0 {
        return gaussian(offset, doppler_width);
    }
    let sigma = doppler_width / fsp::sqrt(2.0 * LN_2);
    let scale = 1.0 / (sigma * fsp::sqrt(2.0));
    faddeeva(offset * scale, lorentz_width * scale).re / (sigma * fsp::sqrt(2.0 * PI))
}

fn real(value: fsp) -> Complex64 {
    Complex64::new(value, 0.0)
}

/// Faddeeva function w(x + iy) for y ≥ 0, using Humlíček's rational
/// approximations (J. Quant. Spectrosc. Radiat. Transfer 27, 437, 1982)
/// with a relative accuracy of about 1e-4.
pub fn faddeeva(x: fsp, y: fsp) -> Complex64 {
    let t = Complex64::new(y, -x);
    let s = x.abs() + y;

    if s >= 15.0 {
        t * INV_SQRT_PI / (t * t + 0.5)
    } else if s >= 5.5 {
        let u = t * t;
        t * (u * INV_SQRT_PI + 1.410474) / (u * (u + 3.0) + 0.75)
    } else if y >= 0.195 * x.abs() - 0.176 {
        (real(16.4955) + t * (t * (t * (t * 0.5642236 + 3.778987) + 11.96482) + 20.20933))
            / (real(16.4955)
                + t * (t * (t * (t * (t + 6.699398) + 21.69274) + 39.27121) + 38.82363))
    } else {
        let u = t * t;
        let numerator = t
            * (real(36183.31)
                - u * (real(3321.9905)
                    - u * (real(1540.787)
                        - u * (real(219.0313)
                            - u * (real(35.76683) - u * (real(1.320522) - u * 0.56419))))));
        let denominator = real(32066.6)
            - u * (real(24322.84)
                - u * (real(9022.228)
                    - u * (real(2186.181)
                        - u * (real(364.2191)
                            - u * (real(61.57037) - u * (real(1.841439) - u))))));
        u.exp() - numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn integrate<F: Fn(fsp) -> fsp>(profile: F, half_range: fsp, n: usize) -> fsp {
        let step = 2.0 * half_range / (n - 1) as fsp;
        (0..n)
            .map(|idx| profile(-half_range + idx as fsp * step))
            .sum::<fsp>()
            * step
    }

    #[test]
    fn profiles_are_normalized() {
        assert_relative_eq!(integrate(|x| gaussian(x, 0.01), 1.0, 20001), 1.0, epsilon = 1e-6);
        assert_relative_eq!(
            integrate(|x| lorentzian(x, 0.005), 100.0, 2_000_001),
            1.0,
            epsilon = 1e-4
        );
        assert_relative_eq!(
            integrate(|x| voigt(x, 0.01, 0.005), 100.0, 2_000_001),
            1.0,
            epsilon = 1e-3
        );
    }

    #[test]
    fn voigt_reduces_to_limits() {
        assert_relative_eq!(voigt(0.003, 0.01, 1e-9), gaussian(0.003, 0.01), max_relative = 1e-3);
        assert_relative_eq!(voigt(0.2, 1e-9, 0.05), lorentzian(0.2, 0.05), max_relative = 1e-3);
        assert_eq!(voigt(0.2, 0.0, 0.05), lorentzian(0.2, 0.05));
        assert_eq!(voigt(0.2, 0.01, 0.0), gaussian(0.2, 0.01));
    }

    #[test]
    fn faddeeva_matches_reference_values() {
        // w(0) = 1 and w(i) = exp(1) erfc(1)
        assert_relative_eq!(faddeeva(0.0, 0.0).re, 1.0, max_relative = 1e-4);
        assert_relative_eq!(faddeeva(0.0, 1.0).re, 0.427_583_576, max_relative = 1e-4);
        // Asymptotic region
        assert_relative_eq!(
            faddeeva(20.0, 1.0).re,
            1.0 / (PI.sqrt() * 401.0),
            max_relative = 1e-2
        );
        // w(z) approaches i/(sqrt(pi) z) far from the origin
        assert_relative_eq!(faddeeva(0.0, 100.0).re * 100.0, INV_SQRT_PI, max_relative = 1e-4);
        assert_relative_eq!(faddeeva(30.0, 0.0).im * 30.0, INV_SQRT_PI, max_relative = 1e-3);
        assert_relative_eq!(faddeeva(8.0, 0.0).im * 8.0, INV_SQRT_PI, max_relative = 1e-2);
    }

    #[test]
    fn voigt_is_symmetric_and_peaked_at_center() {
        for offset in [0.001, 0.01, 0.1, 1.0] {
            assert_relative_eq!(voigt(offset, 0.01, 0.005), voigt(-offset, 0.01, 0.005));
            assert!(voigt(offset, 0.01, 0.005) < voigt(0.0, 0.01, 0.005));
        }
    }

    #[test]
    fn line_shapes_parse() {
        assert_eq!("Voigt".parse::<LineShape>().unwrap(), LineShape::Voigt);
        assert_eq!("lorentzian".parse::<LineShape>().unwrap(), LineShape::Lorentzian);
        assert!("sinc".parse::<LineShape>().is_err());
    }
}
