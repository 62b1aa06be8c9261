//! SI catalog population
//!
//! Builds the default [`UnitCatalog`]: SI prefixes and base units, common
//! imperial and astronomical units, nonlinear temperature and decibel
//! conversion maps, angular scalings, and the `"quantum"` context that
//! scales energy into frequency through `1/(2*pi*hbar)`.

use std::f64::consts::PI;

use crate::units::catalog::UnitCatalog;
use crate::units::unit::{DimVec, Power, Prefix, Unit};

const HBAR: f64 = 1.054_571_73e-34;

fn dims(entries: &[(&str, i64)]) -> DimVec {
    entries
        .iter()
        .map(|(name, power)| (name.to_string(), Power::from_integer(*power)))
        .collect()
}

impl UnitCatalog {
    /// The default catalog, populated with SI prefixes and units.
    pub fn si() -> Self {
        let mut catalog = UnitCatalog::new();

        catalog.set_prefixes(vec![
            Prefix::new("yotta", "Y", 1e24),
            Prefix::new("zetta", "Z", 1e21),
            Prefix::new("exa", "E", 1e18),
            Prefix::new("peta", "P", 1e15),
            Prefix::new("tera", "T", 1e12),
            Prefix::new("giga", "G", 1e9),
            Prefix::new("mega", "M", 1e6),
            Prefix::new("kilo", "k", 1e3),
            Prefix::new("milli", "m", 1e-3),
            Prefix::new("micro", "\u{3bc}", 1e-6),
            Prefix::new("nano", "n", 1e-9),
            Prefix::new("pico", "p", 1e-12),
            Prefix::new("femto", "f", 1e-15),
            Prefix::new("atto", "a", 1e-18),
            Prefix::new("zepto", "z", 1e-21),
            Prefix::new("yocto", "y", 1e-24),
        ]);

        // Fundamental SI units
        catalog.add(
            Unit::new("constant", 1.0)
                .with_alias("non-dim")
                .with_alias("1")
                .with_abbr("")
                .no_prefix(),
        );
        catalog.add(
            Unit::new("metre", 1.0)
                .with_alias("meter")
                .with_abbr("m")
                .with_plural("metres")
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("second", 1.0)
                .with_abbr("s")
                .with_plural("seconds")
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("gram", 1e-3)
                .with_abbr("g")
                .with_plural("grams")
                .with_dimension("mass", 1),
        );
        catalog.add(
            Unit::new("ampere", 1.0)
                .with_abbr("A")
                .with_dimension("current", 1),
        );
        catalog.add(
            Unit::new("kelvin", 1.0)
                .with_abbr("K")
                .with_dimension("temperature", 1),
        );
        catalog.add(
            Unit::new("mole", 1.0)
                .with_abbr("mol")
                .with_dimension("substance", 1),
        );
        catalog.add(
            Unit::new("candela", 1.0)
                .with_abbr("cd")
                .with_dimension("intensity", 1),
        );
        catalog.add(
            Unit::new("dollar", 1.0)
                .with_abbr("$")
                .no_prefix()
                .with_dimension("currency", 1),
        );
        catalog.add(
            Unit::new("radian", 1.0)
                .with_abbr("rad")
                .with_dimension("angle", 1),
        );
        // The gram carries rel 1e-3 so the mass basis is the kilogram.
        catalog
            .set_basis("mass", "kg")
            .expect("kilogram is generated from gram by the kilo prefix");

        // Nonlinear units
        catalog.add(Unit::new("decibel", 1.0).with_abbr("dB"));
        for absolute in [false, true] {
            catalog
                .add_conversion_map("dB", "", |v| 10f64.powf(v / 10.0), absolute, None)
                .expect("global context exists");
            catalog
                .add_conversion_map("", "dB", |v| 10.0 * v.log10(), absolute, None)
                .expect("global context exists");
        }

        // Angular units
        catalog.add(
            Unit::new("degree", PI / 180.0)
                .with_abbr("\u{b0}")
                .with_abbr("deg")
                .with_dimension("angle", 1),
        );
        catalog
            .add_scaling(
                dims(&[("time", -1), ("angle", 1)]),
                dims(&[("time", -1)]),
                1.0 / (2.0 * PI),
                None,
            )
            .expect("global context exists");
        catalog
            .add_scaling(dims(&[("angle", 1)]), dims(&[]), 1.0, None)
            .expect("global context exists");

        // Scales
        catalog.add(
            Unit::new("mile", 1609.344)
                .with_abbr("mi")
                .with_plural("miles")
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("yard", 0.9144)
                .with_abbr("yd")
                .with_plural("yards")
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("foot", 0.3048)
                .with_abbr("ft")
                .with_plural("feet")
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("inch", 0.0254)
                .with_abbr("in")
                .with_plural("inches")
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("centimetre", 0.01)
                .with_alias("centimeter")
                .with_abbr("cm")
                .no_prefix()
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("point", 2.54e-5)
                .with_abbr("pt")
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("angstrom", 1e-10)
                .with_abbr("\u{c5}")
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("astronomical unit", 149_597_870_691.0)
                .with_abbr("au")
                .no_prefix()
                .with_dimension("length", 1),
        );
        catalog.add(
            Unit::new("lightyear", 9_460_730_472_580_800.0)
                .with_abbr("ly")
                .with_dimension("length", 1),
        );

        // Time
        catalog.add(
            Unit::new("year", 31_557_600.0)
                .with_plural("years")
                .no_prefix()
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("month", 2_629_800.0)
                .with_plural("months")
                .no_prefix()
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("fortnight", 1_209_600.0)
                .no_prefix()
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("week", 604_800.0)
                .with_plural("weeks")
                .no_prefix()
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("day", 86_400.0)
                .with_plural("days")
                .no_prefix()
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("hour", 3600.0)
                .with_plural("hours")
                .no_prefix()
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("minute", 60.0)
                .with_abbr("min")
                .with_plural("minutes")
                .no_prefix()
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("hertz", 1.0)
                .with_abbr("Hz")
                .with_dimension("time", -1),
        );

        // Force
        catalog.add(
            Unit::new("newton", 1.0)
                .with_abbr("N")
                .with_dimension("mass", 1)
                .with_dimension("length", 1)
                .with_dimension("time", -2),
        );

        // Pressure
        let pressure = [
            ("atm", "atm", 101_325.0),
            ("bar", "bar", 1e5),
            ("pascal", "Pa", 1.0),
            ("mmHg", "mmHg", 101_325.0 / 760.0),
            ("psi", "psi", 6894.757),
        ];
        for (name, abbr, rel) in pressure {
            catalog.add(
                Unit::new(name, rel)
                    .with_abbr(abbr)
                    .with_dimension("mass", 1)
                    .with_dimension("length", -1)
                    .with_dimension("time", -2),
            );
        }

        // Energy
        catalog.add(
            Unit::new("joule", 1.0)
                .with_abbr("J")
                .with_dimension("mass", 1)
                .with_dimension("length", 2)
                .with_dimension("time", -2),
        );
        catalog.add(
            Unit::new("calorie", 4.1868)
                .with_abbr("cal")
                .with_dimension("mass", 1)
                .with_dimension("length", 2)
                .with_dimension("time", -2),
        );
        catalog.add(
            Unit::new("electronvolt", 1.602_176_487e-19)
                .with_abbr("eV")
                .with_dimension("mass", 1)
                .with_dimension("length", 2)
                .with_dimension("time", -2),
        );
        catalog.add(
            Unit::new("watt", 1.0)
                .with_abbr("W")
                .with_dimension("mass", 1)
                .with_dimension("length", 2)
                .with_dimension("time", -3),
        );

        // Electromagnetism
        catalog.add(
            Unit::new("coulomb", 1.0)
                .with_abbr("C")
                .with_dimension("current", 1)
                .with_dimension("time", 1),
        );
        catalog.add(
            Unit::new("farad", 1.0)
                .with_abbr("F")
                .with_dimension("time", 4)
                .with_dimension("current", 2)
                .with_dimension("length", -2)
                .with_dimension("mass", -1),
        );
        catalog.add(
            Unit::new("henry", 1.0)
                .with_abbr("H")
                .with_dimension("mass", 1)
                .with_dimension("length", 2)
                .with_dimension("time", -2)
                .with_dimension("current", -2),
        );
        catalog.add(
            Unit::new("volt", 1.0)
                .with_abbr("V")
                .with_dimension("mass", 1)
                .with_dimension("length", 2)
                .with_dimension("current", -1)
                .with_dimension("time", -3),
        );
        catalog.add(
            Unit::new("ohm", 1.0)
                .with_abbr("\u{3a9}")
                .with_dimension("mass", 1)
                .with_dimension("length", 2)
                .with_dimension("time", -3)
                .with_dimension("current", -2),
        );
        catalog.add(
            Unit::new("siemens", 1.0)
                .with_abbr("mho")
                .with_dimension("mass", -1)
                .with_dimension("length", -2)
                .with_dimension("time", 3)
                .with_dimension("current", 2),
        );
        catalog.add(
            Unit::new("tesla", 1.0)
                .with_abbr("T")
                .with_dimension("mass", 1)
                .with_dimension("current", -1)
                .with_dimension("time", -2),
        );
        catalog.add(
            Unit::new("gauss", 1e-4)
                .with_abbr("G")
                .with_dimension("mass", 1)
                .with_dimension("current", -1)
                .with_dimension("time", -2),
        );
        catalog.add(
            Unit::new("weber", 1.0)
                .with_abbr("Wb")
                .with_dimension("length", 2)
                .with_dimension("mass", 1)
                .with_dimension("time", -2)
                .with_dimension("current", -1),
        );

        // Volume
        catalog.add(
            Unit::new("litre", 1e-3)
                .with_alias("liter")
                .with_abbr("L")
                .with_dimension("length", 3),
        );
        catalog.add(
            Unit::new("gallon", 4.0 * 473_176_473.0 / 125_000_000_000.0)
                .with_abbr("gal")
                .with_dimension("length", 3),
        );
        catalog.add(
            Unit::new("quart", 473_176_473.0 / 125_000_000_000.0)
                .with_abbr("qt")
                .with_dimension("length", 3),
        );

        // Temperature
        catalog.add(
            Unit::new("fahrenheit", 5.0 / 9.0)
                .with_abbr("\u{b0}F")
                .with_abbr("degF")
                .no_prefix()
                .with_dimension("temperature", 1),
        );
        catalog.add(
            Unit::new("celsius", 1.0)
                .with_abbr("\u{b0}C")
                .with_abbr("degC")
                .no_prefix()
                .with_dimension("temperature", 1),
        );

        let temperature_maps: [(&str, &str, fn(f64) -> f64, bool); 8] = [
            ("fahrenheit", "celsius", |f| (f - 32.0) * 5.0 / 9.0, true),
            ("fahrenheit", "kelvin", |f| (f + 459.67) * 5.0 / 9.0, true),
            ("fahrenheit", "celsius", |f| f * 5.0 / 9.0, false),
            ("fahrenheit", "kelvin", |f| f * 5.0 / 9.0, false),
            ("celsius", "fahrenheit", |c| c * 9.0 / 5.0 + 32.0, true),
            ("celsius", "kelvin", |c| c + 273.15, true),
            ("celsius", "fahrenheit", |c| c * 9.0 / 5.0, false),
            ("celsius", "kelvin", |c| c, false),
        ];
        for (from, to, map, absolute) in temperature_maps {
            catalog
                .add_conversion_map(from, to, map, absolute, None)
                .expect("global context exists");
        }

        // Quantum context: energy and angular frequency are interchangeable.
        catalog.add_context("quantum");
        catalog
            .set_context_constant("hbar", HBAR, Some("quantum"))
            .expect("context was just added");
        catalog
            .add_scaling(
                dims(&[("mass", 1), ("length", 2), ("time", -2)]),
                dims(&[("time", -1)]),
                1.0 / (2.0 * PI * HBAR),
                Some("quantum"),
            )
            .expect("context was just added");

        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_si_basis() {
        let catalog = UnitCatalog::si();
        assert_eq!(catalog.basis_unit("mass").unwrap().name(), "kilogram");
        assert_eq!(catalog.basis_unit("length").unwrap().name(), "metre");
        assert_eq!(catalog.basis_unit("time").unwrap().name(), "second");
    }

    #[test]
    fn test_prefixed_units_resolve() {
        let catalog = UnitCatalog::si();
        assert_relative_eq!(catalog.get_unit("km").unwrap().rel(), 1e3);
        assert_relative_eq!(catalog.get_unit("nm").unwrap().rel(), 1e-9);
        assert_relative_eq!(catalog.get_unit("GHz").unwrap().rel(), 1e9);
        assert_relative_eq!(catalog.get_unit("kg").unwrap().rel(), 1.0);
        // Non-prefixable units have no derivatives.
        assert!(!catalog.has("kiloyear"));
    }

    #[test]
    fn test_minute_wins_over_milli_inch() {
        let catalog = UnitCatalog::si();
        assert_eq!(catalog.get_unit("min").unwrap().name(), "minute");
    }

    #[test]
    fn test_common_scales() {
        let catalog = UnitCatalog::si();
        let mi = catalog.parse("mi").unwrap();
        let m = catalog.parse("m").unwrap();
        assert_relative_eq!(catalog.scale(&mi, &m).unwrap(), 1609.344);

        let ev = catalog.parse("eV").unwrap();
        let j = catalog.parse("J").unwrap();
        assert_relative_eq!(catalog.scale(&ev, &j).unwrap(), 1.602_176_487e-19);

        let l = catalog.parse("L").unwrap();
        let m3 = catalog.parse("m^3").unwrap();
        assert_relative_eq!(catalog.scale(&l, &m3).unwrap(), 1e-3);
    }

    #[test]
    fn test_temperature_maps() {
        let catalog = UnitCatalog::si();
        let c = catalog.parse("degC").unwrap();
        let f = catalog.parse("degF").unwrap();
        let k = catalog.parse("K").unwrap();

        let map = catalog.conversion_map(&c, &f, true).unwrap();
        assert_relative_eq!(map(100.0), 212.0);
        let map = catalog.conversion_map(&c, &k, true).unwrap();
        assert_relative_eq!(map(0.0), 273.15);
        let map = catalog.conversion_map(&f, &c, false).unwrap();
        assert_relative_eq!(map(9.0), 5.0);
    }

    #[test]
    fn test_quantum_context_scaling() {
        let mut catalog = UnitCatalog::si();
        let j = catalog.parse("J").unwrap();
        let hz = catalog.parse("Hz").unwrap();

        assert!(catalog.scale(&j, &hz).is_err());

        catalog.set_context(Some("quantum")).unwrap();
        let scale = catalog.scale(&j, &hz).unwrap();
        assert_relative_eq!(scale, 1.0 / (2.0 * PI * HBAR), max_relative = 1e-12);
        assert_eq!(catalog.context_constant("hbar"), Some(HBAR));
    }

    #[test]
    fn test_angular_scalings() {
        let catalog = UnitCatalog::si();
        let rad_per_s = catalog.parse("rad/s").unwrap();
        let hz = catalog.parse("Hz").unwrap();
        assert_relative_eq!(
            catalog.scale(&rad_per_s, &hz).unwrap(),
            1.0 / (2.0 * PI)
        );

        let rad = catalog.parse("rad").unwrap();
        let dimensionless = catalog.parse("").unwrap();
        assert_relative_eq!(catalog.scale(&rad, &dimensionless).unwrap(), 1.0);

        let deg = catalog.parse("deg").unwrap();
        assert_relative_eq!(catalog.scale(&deg, &rad).unwrap(), PI / 180.0);
    }
}
