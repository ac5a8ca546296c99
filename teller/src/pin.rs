//! PIN material and generation.
//!
//! Plaintext PINs exist only in the open-account receipt, shown once.
//! They are never persisted, and the `Debug` impl redacts them so they
//! cannot leak through logging.

use std::fmt;

use rand::rngs::OsRng;
use rand::Rng;

/// Width of generated PINs.
pub const PIN_DIGITS: usize = 6;

/// A plaintext PIN. Redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    /// Wrap PIN digits.
    pub fn new(digits: impl Into<String>) -> Self {
        Self(digits.into())
    }

    /// Expose the digits for hashing or display on the receipt.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(******)")
    }
}

/// Source of fresh PINs.
pub trait PinGenerator: Send + Sync {
    /// Generate a new fixed-width numeric PIN.
    fn generate(&self) -> Pin;
}

/// Production generator drawing from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurePinGenerator;

impl PinGenerator for SecurePinGenerator {
    fn generate(&self) -> Pin {
        // OsRng is a CryptoRng; uniform over the full zero-padded range.
        let max = 10u32.pow(PIN_DIGITS as u32);
        let value = OsRng.gen_range(0..max);
        Pin(format!("{value:0width$}", width = PIN_DIGITS))
    }
}

/// Fixed generator for tests and reproducible harness runs.
pub struct FixedPinGenerator {
    pin: Pin,
}

impl FixedPinGenerator {
    /// Always hand out the given PIN.
    pub fn new(digits: impl Into<String>) -> Self {
        Self {
            pin: Pin::new(digits),
        }
    }
}

impl PinGenerator for FixedPinGenerator {
    fn generate(&self) -> Pin {
        self.pin.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_pin_is_fixed_width_numeric() {
        let generator = SecurePinGenerator;
        for _ in 0..32 {
            let pin = generator.generate();
            assert_eq!(pin.expose().len(), PIN_DIGITS);
            assert!(pin.expose().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_debug_redacts_digits() {
        let pin = Pin::new("123456");
        let rendered = format!("{pin:?}");
        assert!(!rendered.contains("123456"));
    }

    #[test]
    fn test_fixed_generator_repeats() {
        let generator = FixedPinGenerator::new("000042");
        assert_eq!(generator.generate(), generator.generate());
    }
}
