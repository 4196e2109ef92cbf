//! Backlight devices and the perceptual brightness model.
//!
//! Raw hardware brightness is not perceived linearly. A backlight converts
//! its raw counter into a perceptual fraction by taking the square root
//! `linearity - 1` times, and squares the same number of times on the way
//! back. All of it is exact rational arithmetic; see [`Fraction`].

use log::debug;

use crate::{error::DeviceError, fraction::Fraction, sysfs::AttributeIo};

pub const BRIGHTNESS: &str = "brightness";
pub const MAX_BRIGHTNESS: &str = "max_brightness";

/// One tracked backlight.
///
/// `max_brightness` is read once when the device is opened and assumed
/// fixed afterwards. `linearity` is copied from the configuration at the
/// same moment.
pub struct Backlight {
    path: String,
    attrs: Box<dyn AttributeIo>,
    max_brightness: u64,
    linearity: u32,
}

impl std::fmt::Debug for Backlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backlight")
            .field("path", &self.path)
            .field("max_brightness", &self.max_brightness)
            .field("linearity", &self.linearity)
            .finish()
    }
}

impl Backlight {
    /// Reads `max_brightness` and builds the device.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Init`] if the maximum cannot be read or is not
    /// a positive integer.
    pub fn open(
        path: impl Into<String>,
        attrs: Box<dyn AttributeIo>,
        linearity: u32,
    ) -> Result<Self, DeviceError> {
        let path = path.into();
        let max = attrs
            .read_int(MAX_BRIGHTNESS)
            .map_err(|source| DeviceError::Init {
                path: path.clone(),
                source,
            })?;

        let max_brightness = u64::try_from(max)
            .ok()
            .filter(|max| *max > 0)
            .ok_or_else(|| DeviceError::Init {
                path: path.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{MAX_BRIGHTNESS} must be positive, got {max}"),
                ),
            })?;

        Ok(Self {
            path,
            attrs,
            max_brightness,
            linearity: linearity.max(1),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn max_brightness(&self) -> u64 {
        self.max_brightness
    }

    pub const fn linearity(&self) -> u32 {
        self.linearity
    }

    /// Current brightness as a perceptual fraction.
    pub fn get(&self) -> Result<Fraction, DeviceError> {
        self.read_raw().and_then(|raw| self.linearize(raw))
    }

    /// Writes `desired` (a perceptual fraction) back as a raw count.
    ///
    /// `previous_raw` is the raw reading the change started from, as
    /// `raw / max_brightness`. A non-zero `direction` guarantees the written
    /// count moves past `previous_raw` in that direction, unless it is
    /// already at the bound, so a key press is never swallowed by rounding.
    /// Returns the raw count written.
    pub fn set(
        &self,
        desired: Fraction,
        previous_raw: Fraction,
        direction: i8,
    ) -> Result<u64, DeviceError> {
        let mut corrected = desired;
        for _ in 1..self.linearity {
            corrected = corrected
                .checked_mul(corrected)
                .ok_or_else(|| self.overflow())?;
        }

        let count = corrected
            .as_count_of(u128::from(self.max_brightness))
            .ok_or_else(|| self.overflow())?;
        let value = u64::try_from(count)
            .map_err(|_| self.overflow())?
            .min(self.max_brightness);
        let previous = u64::try_from(previous_raw.top()).map_err(|_| self.overflow())?;

        let value = match direction.signum() {
            1 if value <= previous => previous.saturating_add(1).min(self.max_brightness),
            -1 if value >= previous => previous.saturating_sub(1),
            _ => value,
        };

        self.attrs
            .write_int(BRIGHTNESS, value)
            .map_err(|source| DeviceError::Write {
                path: self.path.clone(),
                attr: BRIGHTNESS,
                source,
            })?;

        Ok(value)
    }

    /// Moves the perceptual brightness by `delta`, clamped to `[0%, 100%]`.
    ///
    /// Returns the raw count written.
    pub fn modify(&self, delta: Fraction) -> Result<u64, DeviceError> {
        let raw = self.read_raw()?;
        let curr = self.linearize(raw)?;

        let sum = curr.checked_add(delta).ok_or_else(|| self.overflow())?;
        let full = i128::try_from(sum.bot()).map_err(|_| self.overflow())?;
        let updated = sum.clamp_numerator(0, full);

        debug!(
            "{}: raw {} perceived {} -> {}",
            self.path,
            raw.top(),
            curr,
            updated
        );

        self.set(updated, raw, delta.sign())
    }

    /// Raw reading as `brightness / max_brightness`.
    fn read_raw(&self) -> Result<Fraction, DeviceError> {
        let raw = self
            .attrs
            .read_int(BRIGHTNESS)
            .map_err(|source| DeviceError::Read {
                path: self.path.clone(),
                attr: BRIGHTNESS,
                source,
            })?;

        if raw < 0 || raw as u64 > self.max_brightness {
            return Err(DeviceError::Range {
                path: self.path.clone(),
                raw,
                max: self.max_brightness,
            });
        }

        Fraction::new(i128::from(raw), u128::from(self.max_brightness))
            .ok_or_else(|| self.overflow())
    }

    fn linearize(&self, raw: Fraction) -> Result<Fraction, DeviceError> {
        (1..self.linearity).try_fold(raw, |value, _| value.sqrt().ok_or_else(|| self.overflow()))
    }

    fn overflow(&self) -> DeviceError {
        DeviceError::Overflow {
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::MockAttributeIo;
    use crate::testing::FakeAttrs;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io;

    const PATH: &str = "/sys/class/backlight/x";

    fn frac(top: i128, bot: u128) -> Fraction {
        Fraction::new(top, bot).unwrap()
    }

    fn backlight(max: i64, brightness: i64, linearity: u32) -> (Backlight, FakeAttrs) {
        let attrs = FakeAttrs::backlight(max, brightness);
        let device = Backlight::open(PATH, Box::new(attrs.clone()), linearity).unwrap();
        (device, attrs)
    }

    #[test]
    fn open_reads_max_brightness() {
        let (device, _) = backlight(255, 127, 2);
        assert_eq!(device.max_brightness(), 255);
        assert_eq!(device.linearity(), 2);
        assert_eq!(device.path(), PATH);
    }

    #[test]
    fn open_rejects_zero_maximum() {
        let attrs = FakeAttrs::backlight(0, 0);
        let err = Backlight::open(PATH, Box::new(attrs), 2).unwrap_err();
        assert!(matches!(err, DeviceError::Init { .. }));
    }

    #[test]
    fn open_propagates_read_failure() {
        let mut attrs = MockAttributeIo::new();
        attrs
            .expect_read_int()
            .returning(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        let err = Backlight::open(PATH, Box::new(attrs), 2).unwrap_err();
        assert!(matches!(err, DeviceError::Init { .. }));
    }

    #[test]
    fn get_with_linearity_one_is_raw_ratio() {
        let (device, _) = backlight(255, 127, 1);
        assert_eq!(device.get().unwrap(), frac(127, 255));
    }

    #[test]
    fn get_with_linearity_two_takes_square_root() {
        let (device, _) = backlight(255, 127, 2);
        // sqrt(127/255) ~ 0.70; joint root gives 179/255
        assert_eq!(device.get().unwrap(), frac(179, 255));
    }

    #[test]
    fn get_rejects_value_above_maximum() {
        let (device, _) = backlight(255, 300, 2);
        assert!(matches!(
            device.get().unwrap_err(),
            DeviceError::Range { raw: 300, max: 255, .. }
        ));
    }

    #[test]
    fn get_reports_read_failure() {
        let mut attrs = MockAttributeIo::new();
        attrs
            .expect_read_int()
            .withf(|name| name == MAX_BRIGHTNESS)
            .returning(|_| Ok(255));
        attrs
            .expect_read_int()
            .withf(|name| name == BRIGHTNESS)
            .returning(|_| Err(io::Error::from(io::ErrorKind::NotFound)));
        let device = Backlight::open(PATH, Box::new(attrs), 2).unwrap();

        assert!(matches!(
            device.get().unwrap_err(),
            DeviceError::Read { attr: BRIGHTNESS, .. }
        ));
    }

    #[test]
    fn linearity_one_round_trips_raw_value() {
        for raw in 0..=255 {
            let (device, attrs) = backlight(255, raw, 1);
            let value = device.get().unwrap();
            let written = device.set(value, frac(raw as i128, 255), 0).unwrap();
            assert_eq!(written, raw as u64);
            assert_eq!(attrs.get(BRIGHTNESS), Some(raw));
        }
    }

    #[test]
    fn perfect_square_round_trips_with_linearity_two() {
        let (device, _) = backlight(100, 49, 2);
        let value = device.get().unwrap();
        assert_eq!(value, frac(70, 100));
        assert_eq!(device.set(value, frac(49, 100), 0).unwrap(), 49);
    }

    #[test]
    fn brightness_up_scenario() {
        let (device, attrs) = backlight(255, 127, 2);
        // 179/255 + 5/100 = 19175/25500, squared and rescaled to 255 -> 144
        assert_eq!(device.modify(frac(5, 100)).unwrap(), 144);
        assert_eq!(attrs.get(BRIGHTNESS), Some(144));
    }

    #[test]
    fn press_near_top_never_lands_on_same_value() {
        let (device, attrs) = backlight(255, 254, 2);
        let written = device.modify(frac(5, 100)).unwrap();
        assert_ne!(written, 254);
        assert_eq!(attrs.get(BRIGHTNESS), Some(written as i64));
    }

    #[test]
    fn rounding_is_nudged_in_press_direction() {
        let (device, attrs) = backlight(10_000, 5_000, 1);
        // 1/10000 of a percent is lost entirely by rounding; the press must still count.
        assert_eq!(device.modify(frac(1, 1_000_000)).unwrap(), 5_001);
        assert_eq!(device.modify(frac(-1, 1_000_000)).unwrap(), 5_000);
        assert_eq!(attrs.get(BRIGHTNESS), Some(5_000));
    }

    #[test]
    fn full_negative_step_turns_off() {
        for start in [0, 1, 100, 254, 255] {
            let (device, _) = backlight(255, start, 2);
            assert_eq!(device.modify(frac(-100, 100)).unwrap(), 0);
        }
    }

    #[test]
    fn full_positive_step_reaches_maximum() {
        for start in [0, 1, 100, 254, 255] {
            let (device, _) = backlight(255, start, 2);
            assert_eq!(device.modify(frac(100, 100)).unwrap(), 255);
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let mut attrs = MockAttributeIo::new();
        attrs
            .expect_read_int()
            .withf(|name| name == MAX_BRIGHTNESS)
            .returning(|_| Ok(255));
        attrs
            .expect_read_int()
            .withf(|name| name == BRIGHTNESS)
            .returning(|_| Ok(100));
        attrs
            .expect_write_int()
            .returning(|_, _| Err(io::Error::from(io::ErrorKind::PermissionDenied)));
        let device = Backlight::open(PATH, Box::new(attrs), 2).unwrap();

        assert!(matches!(
            device.modify(frac(5, 100)).unwrap_err(),
            DeviceError::Write { attr: BRIGHTNESS, .. }
        ));
    }

    #[test]
    fn huge_linearity_overflows_cleanly() {
        let (device, _) = backlight(120_000, 60_000, 8);
        assert!(matches!(
            device.modify(frac(5, 100)).unwrap_err(),
            DeviceError::Overflow { .. }
        ));
    }

    proptest! {
        #[test]
        fn perfect_powers_round_trip_exactly(
            linearity in 1u32..=3,
            n in 2i64..=12,
            k_seed in any::<u64>(),
        ) {
            let k = (k_seed % (n as u64 + 1)) as i64;
            let power = 1u32 << (linearity - 1);
            let (max, raw) = (n.pow(power), k.pow(power));
            let (device, attrs) = backlight(max, raw, linearity);

            let value = device.get().unwrap();
            let written = device.set(value, frac(raw as i128, max as u128), 0).unwrap();

            prop_assert_eq!(written, raw as u64);
            prop_assert_eq!(attrs.get(BRIGHTNESS), Some(raw));
        }

        #[test]
        fn square_root_round_trip_loses_at_most_two_counts(
            max in 1i64..100_000,
            seed in any::<u64>(),
        ) {
            let raw = (seed % (max as u64 + 1)) as i64;
            let (device, _) = backlight(max, raw, 2);

            let value = device.get().unwrap();
            let written = device.set(value, frac(raw as i128, max as u128), 0).unwrap() as i64;

            prop_assert!(written <= raw);
            prop_assert!(raw - written <= 2, "raw {} came back as {}", raw, written);
        }

        #[test]
        fn round_trip_never_overshoots(
            max in 1i64..5_000,
            seed in any::<u64>(),
            linearity in 1u32..=3,
        ) {
            let raw = (seed % (max as u64 + 1)) as i64;
            let (device, _) = backlight(max, raw, linearity);

            let value = device.get().unwrap();
            let written = device.set(value, frac(raw as i128, max as u128), 0).unwrap() as i64;

            prop_assert!(written <= raw);
        }

        #[test]
        fn every_press_moves_the_raw_value(
            max in 1i64..5_000,
            seed in any::<u64>(),
            linearity in 1u32..=3,
            up in any::<bool>(),
        ) {
            let start = (seed % (max as u64 + 1)) as i64;
            let (device, _) = backlight(max, start, linearity);
            let (delta, at_bound) = if up {
                (frac(5, 100), start == max)
            } else {
                (frac(-5, 100), start == 0)
            };

            let written = device.modify(delta).unwrap() as i64;
            prop_assert!(written <= max);
            if at_bound {
                prop_assert_eq!(written, start);
            } else if up {
                prop_assert!(written > start);
            } else {
                prop_assert!(written < start);
            }
        }
    }
}
