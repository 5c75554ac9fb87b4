use std::fmt;
use std::str::FromStr;

use crate::error::TlineError;
use crate::line_spec::LineParams;

/// Instance parameters addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamId {
    Inductance,
    Capacitance,
    Resistance,
    Conductance,
    Impedance,
    Delay,
    Length,
    Frequency,
    NormalizedLength,
    // read-only, from the last accepted time point
    Port1Voltage,
    Port2Voltage,
    Port1Current,
    Port2Current,
}

impl ParamId {
    pub const ALL: [ParamId; 13] = [
        ParamId::Inductance,
        ParamId::Capacitance,
        ParamId::Resistance,
        ParamId::Conductance,
        ParamId::Impedance,
        ParamId::Delay,
        ParamId::Length,
        ParamId::Frequency,
        ParamId::NormalizedLength,
        ParamId::Port1Voltage,
        ParamId::Port2Voltage,
        ParamId::Port1Current,
        ParamId::Port2Current,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParamId::Inductance => "l",
            ParamId::Capacitance => "c",
            ParamId::Resistance => "r",
            ParamId::Conductance => "g",
            ParamId::Impedance => "z0",
            ParamId::Delay => "td",
            ParamId::Length => "len",
            ParamId::Frequency => "f",
            ParamId::NormalizedLength => "nl",
            ParamId::Port1Voltage => "v1",
            ParamId::Port2Voltage => "v2",
            ParamId::Port1Current => "i1",
            ParamId::Port2Current => "i2",
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            ParamId::Port1Voltage
                | ParamId::Port2Voltage
                | ParamId::Port1Current
                | ParamId::Port2Current
        )
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamId {
    type Err = TlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        // SPICE aliases
        let canonical = match lower.as_str() {
            "zo" | "z0" => "z0",
            "length" => "len",
            "freq" => "f",
            other => other,
        };
        ParamId::ALL
            .into_iter()
            .find(|id| id.name() == canonical)
            .ok_or_else(|| TlineError::UnknownParameter(s.to_string()))
    }
}

impl LineParams {
    /// Read a configurable parameter. Port quantities live on the instance, not here.
    pub fn get(&self, id: ParamId) -> Result<f64, TlineError> {
        let value = match id {
            ParamId::Inductance => self.inductance,
            ParamId::Capacitance => self.capacitance,
            ParamId::Resistance => self.resistance,
            ParamId::Conductance => self.conductance,
            ParamId::Impedance => self.impedance,
            ParamId::Delay => self.delay,
            ParamId::Length => self.length.unwrap_or(0.0),
            ParamId::Frequency => self.frequency,
            ParamId::NormalizedLength => self.normalized_length,
            _ => return Err(TlineError::UnknownParameter(id.name().to_string())),
        };
        Ok(value)
    }

    pub fn set(&mut self, id: ParamId, value: f64) -> Result<(), TlineError> {
        let slot = match id {
            ParamId::Inductance => &mut self.inductance,
            ParamId::Capacitance => &mut self.capacitance,
            ParamId::Resistance => &mut self.resistance,
            ParamId::Conductance => &mut self.conductance,
            ParamId::Impedance => &mut self.impedance,
            ParamId::Delay => &mut self.delay,
            ParamId::Length => {
                self.length = Some(value);
                return Ok(());
            }
            ParamId::Frequency => &mut self.frequency,
            ParamId::NormalizedLength => &mut self.normalized_length,
            _ => return Err(TlineError::ReadOnlyParameter(id)),
        };
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn names_round_trip() {
        for id in ParamId::ALL {
            assert_eq!(id.name().parse::<ParamId>().unwrap(), id);
        }
    }

    #[rstest]
    #[case("Z0", ParamId::Impedance)]
    #[case("ZO", ParamId::Impedance)]
    #[case("LEN", ParamId::Length)]
    #[case("length", ParamId::Length)]
    #[case("TD", ParamId::Delay)]
    #[case("freq", ParamId::Frequency)]
    fn parses_aliases(#[case] name: &str, #[case] expected: ParamId) {
        assert_eq!(name.parse::<ParamId>().unwrap(), expected);
    }

    #[test]
    fn unknown_name_is_an_error() {
        assert!(matches!(
            "tau".parse::<ParamId>(),
            Err(TlineError::UnknownParameter(_))
        ));
    }

    #[test]
    fn set_then_get() {
        let mut p = LineParams::default();
        for (i, id) in ParamId::ALL.into_iter().filter(|id| !id.is_read_only()).enumerate() {
            let value = (i + 1) as f64;
            p.set(id, value).unwrap();
            assert_eq!(p.get(id).unwrap(), value);
        }
    }

    #[test]
    fn port_quantities_cannot_be_set() {
        let mut p = LineParams::default();
        assert!(matches!(
            p.set(ParamId::Port1Voltage, 1.0),
            Err(TlineError::ReadOnlyParameter(ParamId::Port1Voltage))
        ));
    }
}
