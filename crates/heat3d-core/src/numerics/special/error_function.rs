//! Complementary error function.
//!
//! W. J. Cody's rational approximations (Math. Comp. 23, 1969), accurate to
//! double precision until erfc underflows into subnormals near x = 26.5.

/// Switch from the erf series to the erfc fits.
const SMALL_ARGUMENT: f64 = 0.468_75;
/// Switch from the central erfc fit to the asymptotic one.
const LARGE_ARGUMENT: f64 = 4.0;
const FRAC_1_SQRT_PI: f64 = 0.564_189_583_547_756_3;

const ERF_NUMERATOR: [f64; 5] = [
    3.161_123_743_870_565_6,
    1.138_641_541_510_501_6e2,
    3.774_852_376_853_020_2e2,
    3.209_377_589_138_469_5e3,
    1.857_777_061_846_031_5e-1,
];
const ERF_DENOMINATOR: [f64; 4] = [
    2.360_129_095_234_412_1e1,
    2.440_246_379_344_441_7e2,
    1.282_616_526_077_372_3e3,
    2.844_236_833_439_170_6e3,
];
const ERFC_NUMERATOR: [f64; 9] = [
    5.641_884_969_886_701e-1,
    8.883_149_794_388_376,
    6.611_919_063_714_163e1,
    2.986_351_381_974_001_3e2,
    8.819_522_212_417_691e2,
    1.712_047_612_634_070_6e3,
    2.051_078_377_826_071_5e3,
    1.230_339_354_797_997_2e3,
    2.153_115_354_744_038_5e-8,
];
const ERFC_DENOMINATOR: [f64; 8] = [
    1.574_492_611_070_983_5e1,
    1.176_939_508_913_125e2,
    5.371_811_018_620_099e2,
    1.621_389_574_566_690_2e3,
    3.290_799_235_733_459_6e3,
    4.362_619_090_143_247e3,
    3.439_367_674_143_721_6e3,
    1.230_339_354_803_749_4e3,
];
const ASYMPTOTIC_NUMERATOR: [f64; 6] = [
    3.053_266_349_612_323_4e-1,
    3.603_448_999_498_044e-1,
    1.257_817_261_112_292_5e-1,
    1.608_378_514_874_227_7e-2,
    6.587_491_615_298_378e-4,
    1.631_538_713_730_209_8e-2,
];
const ASYMPTOTIC_DENOMINATOR: [f64; 5] = [
    2.568_520_192_289_822,
    1.872_952_849_923_467_3,
    5.279_051_029_514_284e-1,
    6.051_834_131_244_132e-2,
    2.335_204_976_268_691_8e-3,
];

/// Returns `(scaled, log_tail)` with `erfc(|x|) = scaled * exp(log_tail)`.
fn erfc_tail(x: f64) -> (f64, f64) {
    let y = x.abs();
    if y <= SMALL_ARGUMENT {
        let ysq = y * y;
        let mut numerator = ERF_NUMERATOR[4] * ysq;
        let mut denominator = ysq;
        for (a, b) in ERF_NUMERATOR[..3].iter().zip(&ERF_DENOMINATOR[..3]) {
            numerator = (numerator + a) * ysq;
            denominator = (denominator + b) * ysq;
        }
        let erf = y * (numerator + ERF_NUMERATOR[3]) / (denominator + ERF_DENOMINATOR[3]);
        return (1.0 - erf, 0.0);
    }

    let rational = if y <= LARGE_ARGUMENT {
        let mut numerator = ERFC_NUMERATOR[8] * y;
        let mut denominator = y;
        for (c, d) in ERFC_NUMERATOR[..7].iter().zip(&ERFC_DENOMINATOR[..7]) {
            numerator = (numerator + c) * y;
            denominator = (denominator + d) * y;
        }
        (numerator + ERFC_NUMERATOR[7]) / (denominator + ERFC_DENOMINATOR[7])
    } else {
        let inverse_sq = 1.0 / (y * y);
        let mut numerator = ASYMPTOTIC_NUMERATOR[5] * inverse_sq;
        let mut denominator = inverse_sq;
        for (p, q) in ASYMPTOTIC_NUMERATOR[..4].iter().zip(&ASYMPTOTIC_DENOMINATOR[..4]) {
            numerator = (numerator + p) * inverse_sq;
            denominator = (denominator + q) * inverse_sq;
        }
        let correction = inverse_sq * (numerator + ASYMPTOTIC_NUMERATOR[4])
            / (denominator + ASYMPTOTIC_DENOMINATOR[4]);
        (FRAC_1_SQRT_PI - correction) / y
    };
    // exp(-y^2) split so that the leading square is exact.
    let head = (y * 16.0).trunc() / 16.0;
    let remainder = (y - head) * (y + head);
    (rational * (-remainder).exp(), -head * head)
}

pub fn erfc(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let (scaled, log_tail) = erfc_tail(x);
    let tail = scaled * log_tail.exp();
    if x >= 0.0 { tail } else { 2.0 - tail }
}

/// `exp(p) * erfc(x)` without overflowing when `p` and `x` are both large.
pub fn exp_erfc(p: f64, x: f64) -> f64 {
    if p.is_nan() || x.is_nan() {
        return f64::NAN;
    }
    let (scaled, log_tail) = erfc_tail(x);
    let tail = scaled * (p + log_tail).exp();
    if x >= 0.0 {
        tail
    } else {
        2.0 * p.exp() - tail
    }
}
