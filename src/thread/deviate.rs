//! Non-uniform deviate generation on top of the per-thread uniform source.
//!
//! Distribution parameters derived from the call arguments are cached on
//! the context and invalidated when the arguments change, so tight loops
//! drawing from one distribution pay the setup cost once.

use std::f64::consts::PI;

use super::ThreadContext;
use crate::error::ModelError;

const ONE_THIRD: f64 = 1.0 / 3.0;

// Precomputed Stirling-series corrections for the BTRD acceptance test,
// k = 0..=9; larger k uses the first four series terms.
const STIRLING_TABLE: [f64; 10] = [
    0.08106146679532726,
    0.04134069595540929,
    0.02767792568499834,
    0.02079067210376509,
    0.01664469118982119,
    0.01387612882307075,
    0.01189670994589177,
    0.01041126526197209,
    0.009255462182712733,
    0.008330563433362871,
];

const STIRLING_1: f64 = 1.0 / 12.0;
const STIRLING_2: f64 = 1.0 / 360.0;
const STIRLING_3: f64 = 1.0 / 1260.0;

fn stirling_correction(k: i64) -> f64 {
    if k <= 9 {
        STIRLING_TABLE[k as usize]
    } else {
        let rkp1 = 1.0 / (k as f64 + 1.0);
        let rkp1s = rkp1 * rkp1;
        (STIRLING_1 - (STIRLING_2 - STIRLING_3 * rkp1s) * rkp1s) * rkp1
    }
}

// Lanczos approximation, g = 7, 9 terms.
const LANCZOS: [f64; 9] = [
    0.99999999999980993,
    676.5203681218851,
    -1259.1392167224028,
    771.32342877765313,
    -176.61502916214059,
    12.507343278686905,
    -0.13857109526572012,
    9.9843695780195716e-6,
    1.5056327351493116e-7,
];

fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut acc = LANCZOS[0];
    for (i, coefficient) in LANCZOS.iter().enumerate().skip(1) {
        acc += coefficient / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

fn ln_factorial(k: f64) -> f64 {
    ln_gamma(k + 1.0)
}

/// Cached envelope parameters for large-rate Poisson rejection.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PoissonTerms {
    sigma: f64,
    mean: f64,
    log_rate: f64,
    scale: f64,
    offset: f64,
}

/// Cached Hörmann BTRD terms, keyed by the last `(n, p)` pair.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct BinomialTerms {
    m: i64,
    r: f64,
    nr: f64,
    npq: f64,
    two_npq: f64,
    b: f64,
    a: f64,
    c: f64,
    alpha: f64,
    vr: f64,
    urvr: f64,
    nm: i64,
    h: f64,
}

impl ThreadContext {
    /// Uniform integer over the full 64-bit range.
    pub fn int_full_range(&mut self) -> i64 {
        self.next_u64() as i64
    }

    /// Uniform real over `[0, 1]`.
    pub fn real_closed(&mut self) -> f64 {
        self.next_u64() as f64 / u64::MAX as f64
    }

    /// Uniform real over `[0, 1)`.
    pub fn real_clopen(&mut self) -> f64 {
        loop {
            let value = self.real_closed();
            if value != 1.0 {
                return value;
            }
        }
    }

    /// Uniform real over `(0, 1]`.
    pub fn real_opclo(&mut self) -> f64 {
        loop {
            let value = self.real_closed();
            if value != 0.0 {
                return value;
            }
        }
    }

    /// Uniform real over `(0, 1)`.
    pub fn real_open(&mut self) -> f64 {
        loop {
            let value = self.real_closed();
            if value != 0.0 && value != 1.0 {
                return value;
            }
        }
    }

    /// Standard normal deviate by the Marsaglia polar method.
    ///
    /// Accepted pairs yield two deviates; the second is cached on the
    /// context and returned by the next call.
    pub fn normal(&mut self) -> f64 {
        if let Some(spare) = self.normal_spare.take() {
            return spare;
        }

        loop {
            let x1 = 2.0 * self.real_closed() - 1.0;
            let x2 = 2.0 * self.real_closed() - 1.0;
            let w = x1 * x1 + x2 * x2;
            if w != 0.0 && w < 1.0 {
                let w = (-2.0 * w.ln() / w).sqrt();
                self.normal_spare = Some(x2 * w);
                return x1 * w;
            }
        }
    }

    /// Normal deviate with the given mean and standard deviation.
    pub fn normal_with(&mut self, mean: f64, sigma: f64) -> Result<f64, ModelError> {
        if sigma <= 0.0 {
            return Err(ModelError::InvalidNumericValue);
        }
        Ok(mean + sigma * self.normal())
    }

    /// Gamma deviate with the given shape and scale.
    pub fn gamma(&mut self, shape: f64, scale: f64) -> Result<f64, ModelError> {
        if shape <= 0.0 || scale <= 0.0 {
            return Err(ModelError::InvalidNumericValue);
        }

        // Marsaglia-Tsang covers shape >= 1; smaller shapes go through the
        // boost G(shape + 1) * U^(1/shape).
        let value = if shape >= 1.0 {
            scale * self.gamma_shape_ge_one(shape)
        } else {
            scale * self.gamma_shape_ge_one(shape + 1.0) * self.real_open().powf(1.0 / shape)
        };
        Ok(value)
    }

    // Marsaglia & Tsang, "A simple method for generating gamma variables",
    // ACM TOMS 26(3), 2000. Requires shape >= 1.
    fn gamma_shape_ge_one(&mut self, shape: f64) -> f64 {
        let d = shape - ONE_THIRD;

        let c = if shape != self.gamma_last_shape {
            let c = ONE_THIRD / d.sqrt();
            self.gamma_last_shape = shape;
            self.gamma_cached_c = c;
            c
        } else {
            self.gamma_cached_c
        };

        let mrc = -1.0 / c;
        loop {
            let z = self.normal();
            if z <= mrc {
                continue;
            }

            let onecz = 1.0 + c * z;
            let v = onecz * onecz * onecz;
            let lu = self.real_open().ln();
            if lu < 0.5 * z * z + d - d * v + d * v.ln() {
                return d * v;
            }
        }
    }

    /// Weibull deviate by inverse CDF.
    pub fn weibull(&mut self, scale: f64, shape: f64, delay: f64) -> Result<f64, ModelError> {
        if scale <= 0.0 || shape <= 0.0 {
            return Err(ModelError::InvalidNumericValue);
        }
        let u = self.real_opclo();
        Ok(scale * (-u.ln()).powf(1.0 / shape) + delay)
    }

    /// Exponential deviate by inverse CDF.
    pub fn exponential(&mut self, rate: f64) -> Result<f64, ModelError> {
        if rate <= 0.0 {
            return Err(ModelError::InvalidNumericValue);
        }
        Ok(-self.real_open().ln() / rate)
    }

    /// Rayleigh deviate by the transformation method.
    pub fn rayleigh(&mut self, scale: f64) -> Result<f64, ModelError> {
        if scale <= 0.0 {
            return Err(ModelError::InvalidNumericValue);
        }
        Ok(scale * (-2.0 * self.real_open().ln()).sqrt())
    }

    /// Chi-squared deviate: the gamma special case shape = k/2, scale = 2.
    pub fn chi_squared(&mut self, k: i64) -> Result<f64, ModelError> {
        if k <= 0 {
            return Err(ModelError::InvalidNumericValue);
        }
        self.gamma(k as f64 / 2.0, 2.0)
    }

    /// Poisson deviate.
    ///
    /// Small rates use Knuth's product-of-uniforms method. Larger rates are
    /// sampled by rejection against an offset normal envelope; the offset
    /// starts at the fit constant measured at `mean - sigma/2` and grows
    /// whenever a sample exposes a point where the PMF still dominates.
    pub fn poisson(&mut self, rate: f64) -> Result<i64, ModelError> {
        if rate <= 0.0 {
            return Err(ModelError::InvalidNumericValue);
        }

        if rate <= 12.0 {
            let limit = (-rate).exp();
            let mut k = -1i64;
            let mut product = 1.0;
            loop {
                k += 1;
                product *= self.real_closed();
                if product <= limit {
                    return Ok(k);
                }
            }
        }

        let mut terms = if self.poisson_last_rate != rate {
            let sigma = rate.sqrt();
            let log_rate = rate.ln();
            let scale = 1.0 / (sigma * (2.0 * PI).sqrt());

            // The envelope must clear the PMF at the critical point
            // mean - sigma/2; the 1.02 factor absorbs rounding.
            let at = rate - 0.5 * sigma;
            let pmf = (at * log_rate - rate - ln_gamma(at + 1.0)).exp();
            let exponent = (at - rate) / sigma;
            let pdf = scale * (-0.5 * exponent * exponent).exp();

            let terms = PoissonTerms {
                sigma,
                mean: rate,
                log_rate,
                scale,
                offset: 1.02 * (pmf - pdf),
            };
            self.poisson_last_rate = rate;
            self.poisson_terms = terms;
            terms
        } else {
            self.poisson_terms
        };

        loop {
            let guess = loop {
                let guess = terms.mean + terms.sigma * self.normal();
                if guess >= 0.0 {
                    break guess;
                }
            };
            let k = (guess + 0.5).floor();

            let exponent = (k - terms.mean) / terms.sigma;
            let pdf = terms.scale * (-0.5 * exponent * exponent).exp() + terms.offset;
            let pmf = (k * terms.log_rate - terms.mean - ln_factorial(k)).exp();

            if pdf < pmf {
                // Floating-point edge: the envelope dipped under the PMF.
                // Raise the cached offset and retry the attempt.
                terms.offset += 1.02 * (pmf - pdf);
                self.poisson_terms.offset = terms.offset;
                continue;
            }

            if pmf >= pdf * self.real_closed() {
                return Ok(k as i64);
            }
        }
    }

    /// Binomial deviate.
    ///
    /// Small `n` counts Bernoulli draws directly; small `n*p` walks the
    /// inverted CDF; everything else runs Hörmann's BTRD. `p` above one
    /// half samples the complement.
    pub fn binomial(&mut self, n: i64, p: f64) -> Result<i64, ModelError> {
        if n <= 0 || !(0.0..=1.0).contains(&p) {
            return Err(ModelError::InvalidNumericValue);
        }

        let k = if n < 15 {
            let threshold = (0.5 + p * u32::MAX as f64) as u32;
            (0..n).filter(|_| self.next_u32() < threshold).count() as i64
        } else if n as f64 * p < 10.0 {
            if p > 0.5 {
                n - self.binomial_by_inverted_cdf(n, 1.0 - p)
            } else {
                self.binomial_by_inverted_cdf(n, p)
            }
        } else if p > 0.5 {
            n - self.binomial_by_btrd(n, 1.0 - p)
        } else {
            self.binomial_by_btrd(n, p)
        };

        Ok(k)
    }

    // Inverse-CDF walk from k = 0, with the recurrence
    // r_{k+1} = r_k * ((n+1)p/q - s*k) / k stopping on CDF crossing or
    // underflow of r.
    fn binomial_by_inverted_cdf(&mut self, n: i64, p: f64) -> i64 {
        let q = 1.0 - p;
        let s = p / q;
        let a = (n as f64 + 1.0) * s;
        let mut r = q.powf(n as f64);
        let mut last_r = r;
        let mut u = self.real_closed();

        let mut k = 0i64;
        while u > r && (r >= last_r || r >= f64::EPSILON) {
            k += 1;
            u -= r;
            last_r = r;
            r *= a / k as f64 - s;
        }
        k
    }

    // Hörmann, "The generation of binomial random variates", Journal of
    // Statistical Computation and Simulation 46, 1993. Steps follow the
    // paper's numbering. Requires n*p >= 10 and p <= 0.5.
    fn binomial_by_btrd(&mut self, n: i64, p: f64) -> i64 {
        /* Step 0 */
        let bt = if n != self.binomial_last_n || p != self.binomial_last_p {
            let q = 1.0 - p;
            let m = ((n as f64 + 1.0) * p) as i64;
            let r = p / q;
            let nr = (n as f64 + 1.0) * r;
            let npq = n as f64 * p * q;
            let sqrt_npq = npq.sqrt();

            let b = 1.15 + 2.53 * sqrt_npq;
            let a = -0.0873 + 0.0248 * b + 0.01 * p;
            let c = n as f64 * p + 0.5;
            let alpha = (2.83 + 5.1 / b) * sqrt_npq;
            let vr = 0.92 - 4.2 / b;
            let urvr = 0.86 * vr;
            let nm = n - m + 1;
            let h = (m as f64 + 0.5) * ((m as f64 + 1.0) / (r * nm as f64)).ln()
                + stirling_correction(m)
                + stirling_correction(n - m);

            let bt = BinomialTerms {
                m,
                r,
                nr,
                npq,
                two_npq: 2.0 * npq,
                b,
                a,
                c,
                alpha,
                vr,
                urvr,
                nm,
                h,
            };
            self.binomial_last_n = n;
            self.binomial_last_p = p;
            self.binomial_terms = bt;
            bt
        } else {
            self.binomial_terms
        };

        /* Step 1 */
        loop {
            let v = self.real_closed();
            if v <= bt.urvr {
                let u = v / bt.vr - 0.43;
                return (bt.c + u * (bt.b + 2.0 * bt.a / (0.5 - u.abs()))) as i64;
            }

            if let Some(k) = self.btrd_decomposition(n, v, &bt) {
                return k;
            }
        }
    }

    fn btrd_decomposition(&mut self, n: i64, v: f64, bt: &BinomialTerms) -> Option<i64> {
        /* Step 2 */
        let mut v = v;
        let u = if v >= bt.vr {
            self.real_open() - 0.5
        } else {
            let u = v / bt.vr - 0.93;
            let u = if u >= 0.0 { 0.5 - u } else { -0.5 - u };
            v = self.real_open() * bt.vr;
            u
        };

        /* Step 3.0 */
        let us = 0.5 - u.abs();
        let k = (bt.c + u * (bt.b + 2.0 * bt.a / us)) as i64;
        if k < 0 || k > n {
            return None;
        }

        v = v * bt.alpha / (bt.b + bt.a / (us * us));
        let km = (k - bt.m).abs();

        if km <= 15 {
            /* Step 3.1: evaluate the PMF ratio directly. */
            let mut f = 1.0;
            if bt.m < k {
                for i in bt.m..k {
                    f *= bt.nr / i as f64 - bt.r;
                }
            } else if bt.m > k {
                for i in k..bt.m {
                    v *= bt.nr / i as f64 - bt.r;
                }
            }
            return (v <= f).then_some(k);
        }

        /* Step 3.2: squeeze. */
        let v = v.ln();
        let km = km as f64;
        let rho = (km / bt.npq) * ((1.0 / 6.0 + km * (0.625 + km / 3.0)) / bt.npq + 0.5);
        let t = -km * km / bt.two_npq;

        if v < t - rho {
            return Some(k);
        }
        if v > t + rho {
            return None;
        }

        /* Steps 3.3, 3.4: full log acceptance test. */
        let nk = n - k + 1;
        let sq = bt.h
            + (n as f64 + 1.0) * (bt.nm as f64 / nk as f64).ln()
            + (k as f64 + 0.5) * ((nk as f64 * bt.r) / (k as f64 + 1.0)).ln()
            - stirling_correction(k)
            - stirling_correction(n - k);

        (v <= sq).then_some(k)
    }

    /// Log-normal deviate of the standard normal.
    pub fn lognormal(&mut self) -> f64 {
        self.normal().exp()
    }

    /// Log-normal deviate with the given underlying mean and sigma.
    pub fn lognormal_with(&mut self, mean: f64, sigma: f64) -> Result<f64, ModelError> {
        Ok(self.normal_with(mean, sigma)?.exp())
    }

    /// Geometric deviate: number of trials to the first success, CDF
    /// `1 - (1-p)^k`.
    pub fn geometric(&mut self, p: f64) -> Result<i64, ModelError> {
        if !(p > 0.0 && p <= 1.0) {
            return Err(ModelError::InvalidNumericValue);
        }
        let u = self.real_opclo();
        Ok((u.ln() / (1.0 - p).ln()) as i64 + 1)
    }

    /// Cauchy-Lorentz deviate by inverse CDF.
    pub fn cauchy_lorentz(&mut self, location: f64, scale: f64) -> Result<f64, ModelError> {
        if scale <= 0.0 {
            return Err(ModelError::InvalidNumericValue);
        }
        let u = self.real_open();
        Ok(location + scale * (PI * (u - 0.5)).tan())
    }
}
