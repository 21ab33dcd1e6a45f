use std::fmt;

/// Exact fixed-point amount as reported by vending controllers.
///
/// Devices report prices as integer units together with a scale factor and a
/// number of decimal places: `value = raw * unit_scale * 10^-decimal_places`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaledAmount {
    units: u64,
    decimal_places: u32,
}

impl ScaledAmount {
    /// Build an amount from a raw device value
    ///
    /// # Examples
    /// ```
    /// use common::ScaledAmount;
    ///
    /// let price = ScaledAmount::from_scale_factor(200, 1, 2);
    /// assert_eq!(price.to_string(), "2.00");
    /// ```
    pub fn from_scale_factor(raw: u32, unit_scale: u32, decimal_places: u32) -> Self {
        Self {
            units: u64::from(raw) * u64::from(unit_scale),
            decimal_places,
        }
    }

    /// Raw device value for this amount, the inverse of [`Self::from_scale_factor`]
    pub fn to_scale_factor(&self, unit_scale: u32) -> u64 {
        self.units / u64::from(unit_scale.max(1))
    }

    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn decimal_places(&self) -> u32 {
        self.decimal_places
    }
}

impl fmt::Display for ScaledAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let places = self.decimal_places as usize;
        if places == 0 {
            return write!(f, "{}", self.units);
        }

        let digits = format!("{:0>width$}", self.units, width = places + 1);
        let (whole, fraction) = digits.split_at(digits.len() - places);
        write!(f, "{}.{}", whole, fraction)
    }
}
