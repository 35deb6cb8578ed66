//! Decibel conversions.

/// Lowest log-magnitude the engine represents (dB). Anything quieter is
/// clamped here.
pub const DB_FLOOR: f32 = -144.0;

/// Smallest linear magnitude fed to `log10`; its level is just under `DB_FLOOR`.
const MIN_LINEAR: f32 = 6.0e-8;

/// Convert a linear magnitude to dB, clamped to `DB_FLOOR`.
///
/// Non-positive and NaN inputs map to the floor.
pub fn linear_to_db(magnitude: f32) -> f32 {
    if magnitude.is_nan() || magnitude <= MIN_LINEAR {
        return DB_FLOOR;
    }
    (20.0 * libm::log10f(magnitude)).max(DB_FLOOR)
}

/// Convert a dB value back to a linear magnitude.
pub fn db_to_linear(db: f32) -> f32 {
    libm::powf(10.0, db / 20.0)
}
