//! GRIB2 parameter lookup tables.
//!
//! Translates GRIB2 numeric codes into the ECMWF short names used by the
//! plotting programs (`2t`, `tp`, `msl`, `gh`, ...), taking the fixed surface
//! into account since `t` at 850 hPa and `2t` share the same parameter code.

use std::collections::HashMap;

use forecast_common::Units;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Coarse classification of the first fixed surface (Code Table 4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LevelClass {
    Surface,
    Isobaric,
    MeanSea,
    HeightAboveGround,
    Any,
}

impl LevelClass {
    pub fn from_surface_type(surface_type: u8) -> LevelClass {
        match surface_type {
            1 => LevelClass::Surface,
            100 => LevelClass::Isobaric,
            101 => LevelClass::MeanSea,
            103 => LevelClass::HeightAboveGround,
            _ => LevelClass::Any,
        }
    }
}

/// Name and native units of a decoded parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub short_name: String,
    pub units: Units,
}

/// GRIB2 parameter lookup table.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    parameters: HashMap<(ParamKey, LevelClass), ParamInfo>,
}

impl ParameterTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering the ECMWF open-data fields.
    pub fn ecmwf() -> Self {
        use LevelClass::*;

        let mut table = Self::new();
        table.add_parameter((0, 0, 0), HeightAboveGround, "2t", Units::Kelvin);
        table.add_parameter((0, 0, 0), Isobaric, "t", Units::Kelvin);
        table.add_parameter((0, 0, 6), HeightAboveGround, "2d", Units::Kelvin);
        table.add_parameter((0, 0, 6), Isobaric, "d", Units::Kelvin);
        table.add_parameter((0, 1, 1), Isobaric, "r", Units::Percent);
        table.add_parameter((0, 1, 8), Any, "tp", Units::KilogramPerSquareMetre);
        // ECMWF local entry: total precipitation in metres of water
        table.add_parameter((0, 1, 193), Any, "tp", Units::Metre);
        table.add_parameter((0, 1, 11), Any, "sde", Units::Metre);
        table.add_parameter((0, 2, 2), HeightAboveGround, "10u", Units::MetrePerSecond);
        table.add_parameter((0, 2, 2), Isobaric, "u", Units::MetrePerSecond);
        table.add_parameter((0, 2, 3), HeightAboveGround, "10v", Units::MetrePerSecond);
        table.add_parameter((0, 2, 3), Isobaric, "v", Units::MetrePerSecond);
        table.add_parameter((0, 2, 22), Any, "10fg", Units::MetrePerSecond);
        table.add_parameter((0, 3, 0), MeanSea, "msl", Units::Pascal);
        table.add_parameter((0, 3, 1), Any, "msl", Units::Pascal);
        table.add_parameter((0, 3, 0), Surface, "sp", Units::Pascal);
        table.add_parameter((0, 3, 5), Isobaric, "gh", Units::GeopotentialMetre);
        table
    }

    /// Add a parameter mapping for a level class.
    pub fn add_parameter(&mut self, key: ParamKey, level: LevelClass, name: &str, units: Units) {
        self.parameters.insert(
            (key, level),
            ParamInfo {
                short_name: name.to_string(),
                units,
            },
        );
    }

    /// Look up a parameter, preferring an entry specific to the level class.
    pub fn lookup(&self, key: ParamKey, surface_type: u8) -> Option<&ParamInfo> {
        let class = LevelClass::from_surface_type(surface_type);
        self.parameters
            .get(&(key, class))
            .or_else(|| self.parameters.get(&(key, LevelClass::Any)))
    }

    /// Name used for codes missing from the table.
    pub fn fallback_name(key: ParamKey) -> String {
        format!("P{}_{}_{}", key.0, key.1, key.2)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_specific_names() {
        let table = ParameterTable::ecmwf();
        assert_eq!(table.lookup((0, 0, 0), 103).unwrap().short_name, "2t");
        assert_eq!(table.lookup((0, 0, 0), 100).unwrap().short_name, "t");
        assert_eq!(table.lookup((0, 2, 2), 103).unwrap().short_name, "10u");
        assert_eq!(table.lookup((0, 2, 3), 100).unwrap().short_name, "v");
    }

    #[test]
    fn test_any_level_fallback() {
        let table = ParameterTable::ecmwf();
        let tp = table.lookup((0, 1, 193), 1).unwrap();
        assert_eq!(tp.short_name, "tp");
        assert_eq!(tp.units, Units::Metre);
    }

    #[test]
    fn test_unknown_parameter() {
        let table = ParameterTable::ecmwf();
        assert!(table.lookup((0, 19, 0), 1).is_none());
        assert_eq!(ParameterTable::fallback_name((0, 19, 0)), "P0_19_0");
    }

    #[test]
    fn test_empty_table() {
        let table = ParameterTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }
}
