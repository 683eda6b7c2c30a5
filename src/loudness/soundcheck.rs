//! iTunes SoundCheck (iTunNORM) gain encoding.
//!
//! SoundCheck stores volume normalization as a fixed-point value on a
//! milliwatt reference scale, formatted as ten space-separated 8-digit hex
//! fields. Fields 1/2 and 9/10 carry the left/right channel value; the
//! middle six fields are unused and written as zero.

/// Upper bound of the fixed-point SoundCheck value.
pub const SOUNDCHECK_MAX: i64 = 65534;

/// Encode a gain in dB as the 10-field iTunNORM record.
///
/// The gain is converted to a linear power ratio (`10^(-gain/10)`), scaled
/// by 1000, rounded to the nearest integer and clamped to `[0, 65534]`.
/// Total over all float inputs; non-finite gains clamp to a bound.
pub fn soundcheck_tag(gain_db: f64) -> String {
    let linear = 10f64.powf(-gain_db / 10.0);
    let value = (linear * 1000.0).round() as i64;
    let value = value.clamp(0, SOUNDCHECK_MAX);

    let hex = format!("{value:08X}");
    format!(
        "{hex} {hex} 00000000 00000000 00000000 00000000 00000000 00000000 {hex} {hex}"
    )
}
