use super::ThreadContext;
use crate::error::ModelError;
use crate::rng::RngKind;

const K: usize = 1_000_000;

fn context(extra: u64) -> ThreadContext {
    ThreadContext::standalone(RngKind::Xoshiro256Plus, &[11, 22, 33, extra])
}

fn mean_and_variance(samples: &[f64]) -> (f64, f64) {
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}

fn assert_close(actual: f64, expected: f64, tolerance: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{what}: {actual} not within {tolerance} of {expected}"
    );
}

#[test]
fn uniform_reals_respect_endpoints() {
    let mut ctx = context(1);
    for _ in 0..100_000 {
        let closed = ctx.real_closed();
        assert!((0.0..=1.0).contains(&closed));

        let clopen = ctx.real_clopen();
        assert!((0.0..1.0).contains(&clopen));

        let opclo = ctx.real_opclo();
        assert!(opclo > 0.0 && opclo <= 1.0);

        let open = ctx.real_open();
        assert!(open > 0.0 && open < 1.0);
    }
}

#[test]
fn uniform_real_mean() {
    let mut ctx = context(2);
    let samples: Vec<f64> = (0..K).map(|_| ctx.real_closed()).collect();
    let (mean, variance) = mean_and_variance(&samples);

    // Uniform on [0,1]: mean 1/2, variance 1/12.
    assert_close(mean, 0.5, 4.0 * (1.0 / 12.0f64 / K as f64).sqrt(), "uniform mean");
    assert_close(variance, 1.0 / 12.0, 0.002, "uniform variance");
}

#[test]
fn normal_moments() {
    let mut ctx = context(3);
    let samples: Vec<f64> = (0..K).map(|_| ctx.normal()).collect();
    let (mean, variance) = mean_and_variance(&samples);

    let k = K as f64;
    assert_close(mean, 0.0, 4.0 / k.sqrt(), "normal mean");
    assert_close(variance, 1.0, 10.0 / k.sqrt(), "normal variance");
}

#[test]
fn normal_with_scales_and_shifts() {
    let mut ctx = context(4);
    let samples: Vec<f64> = (0..K)
        .map(|_| ctx.normal_with(5.0, 2.0).unwrap())
        .collect();
    let (mean, variance) = mean_and_variance(&samples);

    let k = K as f64;
    assert_close(mean, 5.0, 4.0 * 2.0 / k.sqrt(), "shifted mean");
    assert_close(variance, 4.0, 40.0 / k.sqrt(), "shifted variance");
}

#[test]
fn gamma_moments_both_regimes() {
    // shape >= 1 path.
    let mut ctx = context(5);
    let samples: Vec<f64> = (0..K).map(|_| ctx.gamma(2.5, 2.0).unwrap()).collect();
    let (mean, _) = mean_and_variance(&samples);
    // Gamma(k, s): mean k*s, variance k*s^2.
    assert_close(mean, 5.0, 4.0 * (10.0 / K as f64).sqrt(), "gamma mean");

    // shape < 1 path.
    let samples: Vec<f64> = (0..K).map(|_| ctx.gamma(0.5, 1.0).unwrap()).collect();
    let (mean, _) = mean_and_variance(&samples);
    assert_close(mean, 0.5, 4.0 * (0.5 / K as f64).sqrt(), "small-shape gamma mean");
}

#[test]
fn exponential_and_rayleigh_moments() {
    let mut ctx = context(6);

    let samples: Vec<f64> = (0..K).map(|_| ctx.exponential(4.0).unwrap()).collect();
    let (mean, _) = mean_and_variance(&samples);
    // Exponential(rate): mean 1/rate, variance 1/rate^2.
    assert_close(mean, 0.25, 4.0 * (0.0625 / K as f64).sqrt(), "exponential mean");
    assert!(samples.iter().all(|&x| x > 0.0));

    let samples: Vec<f64> = (0..K).map(|_| ctx.rayleigh(3.0).unwrap()).collect();
    let (mean, _) = mean_and_variance(&samples);
    // Rayleigh(s): mean s*sqrt(pi/2), variance (4-pi)/2 * s^2.
    let expected = 3.0 * (std::f64::consts::PI / 2.0).sqrt();
    let variance = (4.0 - std::f64::consts::PI) / 2.0 * 9.0;
    assert_close(mean, expected, 4.0 * (variance / K as f64).sqrt(), "rayleigh mean");
}

#[test]
fn weibull_reduces_to_exponential_at_shape_one() {
    let mut ctx = context(7);
    let samples: Vec<f64> = (0..K).map(|_| ctx.weibull(2.0, 1.0, 1.0).unwrap()).collect();
    let (mean, _) = mean_and_variance(&samples);
    // scale * Gamma(1 + 1/shape) + delay = 2 * 1 + 1.
    assert_close(mean, 3.0, 4.0 * (4.0 / K as f64).sqrt(), "weibull mean");
    assert!(samples.iter().all(|&x| x >= 1.0));
}

#[test]
fn chi_squared_moments() {
    let mut ctx = context(8);
    let samples: Vec<f64> = (0..K).map(|_| ctx.chi_squared(5).unwrap()).collect();
    let (mean, _) = mean_and_variance(&samples);
    // Chi-squared(k): mean k, variance 2k.
    assert_close(mean, 5.0, 4.0 * (10.0 / K as f64).sqrt(), "chi-squared mean");
}

#[test]
fn poisson_moments_across_rates() {
    for (extra, rate) in [(10u64, 0.5), (11, 5.0), (12, 50.0), (13, 500.0)] {
        let mut ctx = context(extra);
        let samples: Vec<f64> = (0..K)
            .map(|_| ctx.poisson(rate).unwrap() as f64)
            .collect();
        let (mean, variance) = mean_and_variance(&samples);

        let k = K as f64;
        assert_close(mean, rate, 4.0 * (rate / k).sqrt(), &format!("poisson({rate}) mean"));
        // Var(S^2) for Poisson is (rate + 2*rate^2)/K.
        let variance_tolerance = 4.0 * ((rate + 2.0 * rate * rate) / k).sqrt();
        assert_close(
            variance,
            rate,
            variance_tolerance,
            &format!("poisson({rate}) variance"),
        );
        assert!(samples.iter().all(|&x| x >= 0.0));
    }
}

#[test]
fn poisson_cache_tracks_rate_changes() {
    let mut ctx = context(14);
    let mut sums = [0.0f64; 2];
    for _ in 0..20_000 {
        sums[0] += ctx.poisson(20.0).unwrap() as f64;
        sums[1] += ctx.poisson(80.0).unwrap() as f64;
    }
    assert_close(sums[0] / 20_000.0, 20.0, 0.5, "alternating poisson 20");
    assert_close(sums[1] / 20_000.0, 80.0, 1.0, "alternating poisson 80");
}

#[test]
fn binomial_means_across_regimes() {
    // Covers the Bernoulli-loop, inverted-CDF and both BTRD reflections.
    for (extra, n, p) in [
        (20u64, 10i64, 0.2),
        (21, 50, 0.5),
        (22, 1000, 0.01),
        (23, 1000, 0.9),
    ] {
        let mut ctx = context(extra);
        let samples: Vec<f64> = (0..K)
            .map(|_| ctx.binomial(n, p).unwrap() as f64)
            .collect();
        let (mean, _) = mean_and_variance(&samples);

        let expected = n as f64 * p;
        let npq = n as f64 * p * (1.0 - p);
        assert_close(
            mean,
            expected,
            4.0 * (npq / K as f64).sqrt(),
            &format!("binomial({n}, {p}) mean"),
        );
        assert!(samples.iter().all(|&x| (0.0..=n as f64).contains(&x)));
    }
}

#[test]
fn binomial_cache_tracks_argument_changes() {
    let mut ctx = context(24);
    let mut sums = [0.0f64; 2];
    for _ in 0..20_000 {
        sums[0] += ctx.binomial(100, 0.3).unwrap() as f64;
        sums[1] += ctx.binomial(400, 0.4).unwrap() as f64;
    }
    assert_close(sums[0] / 20_000.0, 30.0, 0.5, "alternating binomial 100");
    assert_close(sums[1] / 20_000.0, 160.0, 1.0, "alternating binomial 400");
}

#[test]
fn lognormal_mean() {
    let mut ctx = context(25);
    let samples: Vec<f64> = (0..K).map(|_| ctx.lognormal()).collect();
    let (mean, _) = mean_and_variance(&samples);

    // exp(mu + sigma^2/2) with mu = 0, sigma = 1.
    let expected = 0.5f64.exp();
    let variance = (1.0f64.exp() - 1.0) * 1.0f64.exp();
    assert_close(mean, expected, 4.0 * (variance / K as f64).sqrt(), "lognormal mean");
    assert!(samples.iter().all(|&x| x > 0.0));
}

#[test]
fn geometric_mean_counts_trials() {
    let mut ctx = context(26);
    let samples: Vec<f64> = (0..K).map(|_| ctx.geometric(0.25).unwrap() as f64).collect();
    let (mean, _) = mean_and_variance(&samples);

    // Trials to first success: mean 1/p, variance (1-p)/p^2.
    let variance = 0.75 / 0.0625;
    assert_close(mean, 4.0, 4.0 * (variance / K as f64).sqrt(), "geometric mean");
    assert!(samples.iter().all(|&x| x >= 1.0));
}

#[test]
fn cauchy_median_sits_at_location() {
    let mut ctx = context(27);
    let below = (0..K)
        .filter(|_| ctx.cauchy_lorentz(2.0, 1.5).unwrap() < 2.0)
        .count();

    let k = K as f64;
    let fraction = below as f64 / k;
    assert_close(fraction, 0.5, 4.0 * 0.5 / k.sqrt(), "cauchy median");
}

#[test]
fn gamma_cache_tracks_shape_changes() {
    let mut ctx = context(28);
    let mut sums = [0.0f64; 2];
    for _ in 0..50_000 {
        sums[0] += ctx.gamma(2.0, 1.0).unwrap();
        sums[1] += ctx.gamma(8.0, 1.0).unwrap();
    }
    assert_close(sums[0] / 50_000.0, 2.0, 0.1, "alternating gamma 2");
    assert_close(sums[1] / 50_000.0, 8.0, 0.2, "alternating gamma 8");
}

#[test]
fn out_of_domain_arguments_are_rejected() {
    let mut ctx = context(29);

    assert_eq!(ctx.normal_with(0.0, 0.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.gamma(0.0, 1.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.gamma(1.0, -1.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.weibull(0.0, 1.0, 0.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.weibull(1.0, 0.0, 0.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.exponential(0.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.rayleigh(-2.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.chi_squared(0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.poisson(-1.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.binomial(0, 0.5), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.binomial(10, 1.5), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.binomial(10, -0.1), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.geometric(0.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.geometric(1.5), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.cauchy_lorentz(0.0, 0.0), Err(ModelError::InvalidNumericValue));
    assert_eq!(ctx.lognormal_with(0.0, -1.0), Err(ModelError::InvalidNumericValue));
}

#[test]
fn context_exposes_rng_surface() {
    let mut ctx = ThreadContext::standalone(RngKind::Mt19937, &[1, 2, 3, 4]);
    assert_eq!(ctx.rng_kind(), RngKind::Mt19937);
    assert_eq!(ctx.rng_seed(), &[1, 2, 3, 4]);

    let first = ctx.next_u64();
    ctx.set_rng_seed(&[1, 2, 3, 4]);
    assert_eq!(ctx.next_u64(), first);

    let mut buffer = [0u64; 16];
    ctx.fill(&mut buffer);
    assert!(buffer.iter().any(|&word| word != 0));

    ctx.set_rng_kind(RngKind::Xoshiro256StarStar);
    assert_eq!(ctx.rng_kind(), RngKind::Xoshiro256StarStar);
}

#[test]
fn temporary_buffer_is_stable() {
    let mut ctx = context(30);
    ctx.temporary_buffer()[0] = 42;
    assert_eq!(ctx.temporary_buffer()[0], 42);
    assert_eq!(ctx.temporary_buffer().len(), super::TEMPORARY_BUFFER_BYTES);
}

#[test]
fn operation_cursor_tracks_checks() {
    let mut ctx = context(31);
    assert_eq!(ctx.operation_handle(), crate::INVALID_OPERATION_HANDLE);

    ctx.check(17).unwrap();
    assert_eq!(ctx.operation_handle(), 17);
}
