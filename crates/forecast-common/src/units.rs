//! Physical units carried by dataset fields and the conversions between them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// Unit transformation for converting raw data values to display values.
/// Supports subtraction (K→C), division (Pa→hPa), and linear (scale + offset).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UnitTransform {
    /// No transformation
    #[default]
    None,
    /// Subtract a value (e.g., K→C: subtract 273.15)
    Subtract(f32),
    /// Divide by a value (e.g., Pa→hPa: divide by 100)
    Divide(f32),
    /// Linear transform: value * scale + offset
    Linear { scale: f32, offset: f32 },
}

impl UnitTransform {
    /// Apply the transformation to a value
    pub fn apply(&self, value: f32) -> f32 {
        match self {
            Self::None => value,
            Self::Subtract(offset) => value - offset,
            Self::Divide(divisor) => value / divisor,
            Self::Linear { scale, offset } => value * scale + offset,
        }
    }

    /// Apply the transformation in place over a buffer. NaN stays NaN.
    pub fn apply_slice(&self, values: &mut [f32]) {
        if matches!(self, Self::None) {
            return;
        }
        for v in values.iter_mut() {
            *v = self.apply(*v);
        }
    }
}

/// Units a field can be expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    Kelvin,
    Celsius,
    Pascal,
    HectoPascal,
    Metre,
    Millimetre,
    KilogramPerSquareMetre,
    MetrePerSecond,
    KilometrePerHour,
    GeopotentialMetre,
    Percent,
    PerSecond,
    /// K m² kg⁻¹ s⁻¹
    PotentialVorticity,
    /// 1 PVU = 1e-6 K m² kg⁻¹ s⁻¹
    Pvu,
    Dimensionless,
    Other(String),
}

impl Units {
    /// Parse a unit string as found in GRIB/CF attributes.
    pub fn parse(s: &str) -> Units {
        match s.trim() {
            "K" | "kelvin" => Units::Kelvin,
            "degC" | "°C" | "C" | "celsius" => Units::Celsius,
            "Pa" => Units::Pascal,
            "hPa" | "mb" | "mbar" => Units::HectoPascal,
            "m" => Units::Metre,
            "mm" => Units::Millimetre,
            "kg m**-2" | "kg m-2" | "kg/m2" | "kg m^-2" => Units::KilogramPerSquareMetre,
            "m/s" | "m s**-1" | "m s-1" => Units::MetrePerSecond,
            "kph" | "km/h" | "kilometer / hour" => Units::KilometrePerHour,
            "gpm" => Units::GeopotentialMetre,
            "%" | "percent" => Units::Percent,
            "s**-1" | "1/s" => Units::PerSecond,
            "K m**2 kg**-1 s**-1" | "K m2 kg-1 s-1" => Units::PotentialVorticity,
            "PVU" | "pvu" => Units::Pvu,
            "" | "1" | "dimensionless" => Units::Dimensionless,
            other => Units::Other(other.to_string()),
        }
    }

    /// Short symbol used in attributes and captions.
    pub fn symbol(&self) -> &str {
        match self {
            Units::Kelvin => "K",
            Units::Celsius => "degC",
            Units::Pascal => "Pa",
            Units::HectoPascal => "hPa",
            Units::Metre => "m",
            Units::Millimetre => "mm",
            Units::KilogramPerSquareMetre => "kg m**-2",
            Units::MetrePerSecond => "m/s",
            Units::KilometrePerHour => "kph",
            Units::GeopotentialMetre => "gpm",
            Units::Percent => "%",
            Units::PerSecond => "s**-1",
            Units::PotentialVorticity => "K m**2 kg**-1 s**-1",
            Units::Pvu => "PVU",
            Units::Dimensionless => "dimensionless",
            Units::Other(s) => s,
        }
    }

    /// Transformation mapping values in `self` to values in `to`.
    pub fn transform_to(&self, to: &Units) -> ForecastResult<UnitTransform> {
        use Units::*;

        if self == to {
            return Ok(UnitTransform::None);
        }

        let transform = match (self, to) {
            (Kelvin, Celsius) => UnitTransform::Subtract(273.15),
            (Celsius, Kelvin) => UnitTransform::Linear { scale: 1.0, offset: 273.15 },
            (Pascal, HectoPascal) => UnitTransform::Divide(100.0),
            (HectoPascal, Pascal) => UnitTransform::Linear { scale: 100.0, offset: 0.0 },
            (Metre, Millimetre) => UnitTransform::Linear { scale: 1000.0, offset: 0.0 },
            (Millimetre, Metre) => UnitTransform::Divide(1000.0),
            // 1 kg of water over 1 m² is a 1 mm layer
            (KilogramPerSquareMetre, Millimetre) | (Millimetre, KilogramPerSquareMetre) => {
                UnitTransform::Linear { scale: 1.0, offset: 0.0 }
            }
            (MetrePerSecond, KilometrePerHour) => UnitTransform::Linear { scale: 3.6, offset: 0.0 },
            (KilometrePerHour, MetrePerSecond) => UnitTransform::Divide(3.6),
            (PotentialVorticity, Pvu) => UnitTransform::Linear { scale: 1.0e6, offset: 0.0 },
            (Pvu, PotentialVorticity) => UnitTransform::Divide(1.0e6),
            _ => {
                return Err(ForecastError::UnitConversion {
                    from: self.to_string(),
                    to: to.to_string(),
                })
            }
        };

        Ok(transform)
    }

    /// Convert a single value.
    pub fn convert(&self, value: f32, to: &Units) -> ForecastResult<f32> {
        Ok(self.transform_to(to)?.apply(value))
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_symbol() {
        for unit in [
            Units::Kelvin,
            Units::Pascal,
            Units::HectoPascal,
            Units::MetrePerSecond,
            Units::KilometrePerHour,
            Units::Millimetre,
        ] {
            assert_eq!(Units::parse(unit.symbol()), unit);
        }
        assert_eq!(Units::parse("furlong"), Units::Other("furlong".into()));
    }

    #[test]
    fn test_conversions() {
        assert!((Units::Kelvin.convert(273.15, &Units::Celsius).unwrap()).abs() < 1e-4);
        assert_eq!(Units::Pascal.convert(101325.0, &Units::HectoPascal).unwrap(), 1013.25);
        let kph = Units::MetrePerSecond.convert(5.0, &Units::KilometrePerHour).unwrap();
        assert!((kph - 18.0).abs() < 1e-5);
        let mm = Units::Metre.convert(0.0023, &Units::Millimetre).unwrap();
        assert!((mm - 2.3).abs() < 1e-5);
    }

    #[test]
    fn test_incompatible_units() {
        let err = Units::Kelvin.transform_to(&Units::Pascal).unwrap_err();
        assert!(err.to_string().contains("K"));
    }

    #[test]
    fn test_apply_slice_keeps_nan() {
        let mut values = vec![100.0, f32::NAN];
        UnitTransform::Divide(100.0).apply_slice(&mut values);
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
    }
}
