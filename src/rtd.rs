//! RTD code/resistance/temperature conversions.
//!
//! Pure functions, no state. The forward path (code -> resistance ->
//! temperature) runs every poll cycle; the inverse path (temperature ->
//! resistance) backs the calibration operation and is only defined for
//! the non-negative temperature branch.

/// Callendar-Van Dusen coefficients for standard platinum RTDs.
pub const RTD_A: f64 = 3.9083e-3;
pub const RTD_B: f64 = -5.775e-7;

// Fifth-order polynomial for the sub-zero range, ascending powers.
const CVD_POLY: [f64; 6] = [
    -242.02, 2.2228, 2.5859e-3, -4.8260e-6, -2.8183e-8, 1.5243e-10,
];

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The board mounts one reference resistor per nominal family.
fn reference_resistor(nominal: i32) -> f64 {
    430.0 * (nominal as f64 / 100.0)
}

/// Resistance seen by the converter for a raw 15-bit ADC code, including
/// the per-probe wire and calibration offsets.
pub fn resistance_from_code(code: u32, nominal: i32, wire: f64, correction: f64) -> f64 {
    reference_resistor(nominal) * code as f64 / 32768.0 + wire + correction
}

/// Temperature for a measured resistance, rounded to one decimal.
///
/// Solves the Callendar-Van Dusen quadratic; a negative solution falls
/// back to the fifth-order polynomial for the sub-zero range. Returns NaN
/// when the resistance is outside the representable range altogether.
pub fn temp_from_resistance(resistance: f64, nominal: i32) -> f64 {
    let rtd_nominal = nominal as f64;
    let z1 = -RTD_A;
    let z2 = RTD_A * RTD_A - 4.0 * RTD_B;
    let z3 = 4.0 * RTD_B / rtd_nominal;
    let z4 = 2.0 * RTD_B;

    let temp = ((z2 + z3 * resistance).sqrt() + z1) / z4;
    if temp >= 0.0 {
        return round1(temp);
    }
    if temp.is_nan() {
        return f64::NAN;
    }

    let rpoly = resistance / rtd_nominal * 100.0;
    let temp = CVD_POLY.iter().rev().fold(0.0, |acc, c| acc * rpoly + c);
    round1(temp)
}

/// Closed-form inverse of the quadratic branch of [`temp_from_resistance`].
pub fn resistance_from_temp(temp: f64, nominal: i32) -> f64 {
    let rtd_nominal = nominal as f64;
    let z1 = -RTD_A;
    let z2 = RTD_A * RTD_A - 4.0 * RTD_B;
    let z3 = 4.0 * RTD_B / rtd_nominal;
    let z4 = 2.0 * RTD_B;

    let squared = (temp * z4 - z1) * (temp * z4 - z1);
    (squared - z2) / z3
}

/// Temperature straight from the raw device code.
pub fn temp_from_code(code: u32, nominal: i32, wire: f64, correction: f64) -> f64 {
    temp_from_resistance(resistance_from_code(code, nominal, wire, correction), nominal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mid_scale_code_regression() {
        // 430 * 10 * 16000 / 32768 = 2099.609375 ohm
        let resistance = resistance_from_code(16000, 1000, 0.0, 0.0);
        assert!((resistance - 2099.609375).abs() < 1e-9);
        let temp = temp_from_resistance(resistance, 1000);
        assert!((temp - 294.1).abs() < 1e-9);
    }

    #[test]
    fn offsets_shift_resistance_only() {
        let plain = resistance_from_code(16000, 1000, 0.0, 0.0);
        let offset = resistance_from_code(16000, 1000, 1.25, -0.5);
        assert!((offset - plain - 0.75).abs() < 1e-9);
    }

    #[test]
    fn round_trip_above_zero() {
        for nominal in [100, 500, 1000] {
            for tenths in (0..3000).step_by(37) {
                let temp = tenths as f64 / 10.0;
                let resistance = resistance_from_temp(temp, nominal);
                let back = temp_from_resistance(resistance, nominal);
                assert!(
                    (back - temp).abs() <= 0.1,
                    "nominal {nominal} temp {temp} came back as {back}"
                );
            }
        }
    }

    #[test]
    fn sub_zero_uses_polynomial() {
        // PT100 reads 80.31 ohm around -50 C
        let temp = temp_from_resistance(80.31, 100);
        assert!(temp < 0.0);
        assert!((temp + 50.0).abs() < 0.1, "got {temp}");
    }

    #[test]
    fn out_of_range_resistance_is_nan() {
        // Far beyond the quadratic's discriminant for this nominal
        let temp = temp_from_resistance(1.0e6, 100);
        assert!(temp.is_nan());
    }
}
