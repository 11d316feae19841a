use super::scheme::WeightingError;
use crate::core::models::element::ElementTable;
use phf::{Map, phf_map};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The per-element scattering property pair weights are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum WeightingProperty {
    /// X-ray weighting approximated by the atomic number.
    AtomicNumber,
    /// Neutron weighting by the coherent scattering length (fm).
    NeutronCohb,
}

impl FromStr for WeightingProperty {
    type Err = WeightingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atomicnumber" | "atomic_number" | "xray" | "xrays" | "x-ray" | "x-rays" => {
                Ok(Self::AtomicNumber)
            }
            "neutroncohb" | "neutron_cohb" | "neutron" | "neutrons" => Ok(Self::NeutronCohb),
            "atomicformfactor" | "atomic_form_factor" => Err(WeightingError::UnsupportedProperty(
                "Q-dependent atomic form factors cannot weight a pair histogram".to_string(),
            )),
            other => Err(WeightingError::UnsupportedProperty(format!(
                "unknown weighting '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for WeightingProperty {
    type Error = WeightingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for WeightingProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtomicNumber => write!(f, "atomicNumber"),
            Self::NeutronCohb => write!(f, "neutronCohb"),
        }
    }
}

/// Source of per-element property values.
pub trait ElementPropertyProvider: Send + Sync {
    fn property(&self, element: &str, property: WeightingProperty) -> Option<f64>;
}

#[rustfmt::skip]
static ATOMIC_NUMBERS: Map<&'static str, u32> = phf_map! {
    "H" => 1, "Li" => 3, "C" => 6, "N" => 7, "O" => 8, "F" => 9,
    "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15, "S" => 16,
    "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Ti" => 22, "Fe" => 26,
    "Ni" => 28, "Cu" => 29, "Zn" => 30, "Br" => 35, "Ag" => 47, "Au" => 79,
    "Pb" => 82,
};

// Coherent neutron scattering lengths in fm, natural isotopic abundance.
#[rustfmt::skip]
static NEUTRON_COHB: Map<&'static str, f64> = phf_map! {
    "H" => -3.739, "Li" => -1.90, "C" => 6.646, "N" => 9.36, "O" => 5.803,
    "F" => 5.654, "Na" => 3.63, "Mg" => 5.375, "Al" => 3.449, "Si" => 4.1491,
    "P" => 5.13, "S" => 2.847, "Cl" => 9.577, "Ar" => 1.909, "K" => 3.67,
    "Ca" => 4.70, "Ti" => -3.438, "Fe" => 9.45, "Ni" => 10.3, "Cu" => 7.718,
    "Zn" => 5.68, "Br" => 6.795, "Ag" => 5.922, "Au" => 7.63, "Pb" => 9.405,
};

/// Built-in table of common elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinProperties;

impl ElementPropertyProvider for BuiltinProperties {
    fn property(&self, element: &str, property: WeightingProperty) -> Option<f64> {
        match property {
            WeightingProperty::AtomicNumber => ATOMIC_NUMBERS.get(element).map(|&z| z as f64),
            WeightingProperty::NeutronCohb => NEUTRON_COHB.get(element).copied(),
        }
    }
}

/// Looks up the weight of every element of `elements`, in table order.
///
/// Entries in `overrides` win over the provider.
pub fn resolve_element_weights(
    elements: &ElementTable,
    property: WeightingProperty,
    overrides: &HashMap<String, f64>,
    provider: &dyn ElementPropertyProvider,
) -> Result<Vec<f64>, WeightingError> {
    elements
        .iter()
        .map(|(_, name)| {
            let value = overrides
                .get(name)
                .copied()
                .or_else(|| provider.property(name, property))
                .ok_or_else(|| WeightingError::UnknownElement {
                    element: name.to_string(),
                    property,
                })?;
            if !value.is_finite() {
                return Err(WeightingError::NonFiniteWeight {
                    element: name.to_string(),
                    value,
                });
            }
            Ok(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_same_property() {
        for alias in ["xray", "X-Rays", "atomicNumber"] {
            assert_eq!(
                alias.parse::<WeightingProperty>().unwrap(),
                WeightingProperty::AtomicNumber
            );
        }
        for alias in ["neutron", "Neutrons", "neutronCohb"] {
            assert_eq!(
                alias.parse::<WeightingProperty>().unwrap(),
                WeightingProperty::NeutronCohb
            );
        }
    }

    #[test]
    fn form_factor_weighting_is_rejected() {
        assert!(matches!(
            "atomicFormFactor".parse::<WeightingProperty>(),
            Err(WeightingError::UnsupportedProperty(_))
        ));
        assert!("electrons".parse::<WeightingProperty>().is_err());
    }

    #[test]
    fn builtin_table_serves_both_properties() {
        let table = BuiltinProperties;
        assert_eq!(table.property("O", WeightingProperty::AtomicNumber), Some(8.0));
        assert_eq!(table.property("H", WeightingProperty::NeutronCohb), Some(-3.739));
        assert_eq!(table.property("Xx", WeightingProperty::NeutronCohb), None);
    }

    #[test]
    fn overrides_take_precedence_over_provider() {
        let elements = ElementTable::new(["Si", "O"]).unwrap();
        let overrides = HashMap::from([("O".to_string(), 2.5)]);
        let weights = resolve_element_weights(
            &elements,
            WeightingProperty::AtomicNumber,
            &overrides,
            &BuiltinProperties,
        )
        .unwrap();
        assert_eq!(weights, vec![14.0, 2.5]);
    }

    #[test]
    fn unknown_element_without_override_is_an_error() {
        let elements = ElementTable::new(["Si", "Uuo"]).unwrap();
        let result = resolve_element_weights(
            &elements,
            WeightingProperty::NeutronCohb,
            &HashMap::new(),
            &BuiltinProperties,
        );
        assert_eq!(
            result,
            Err(WeightingError::UnknownElement {
                element: "Uuo".to_string(),
                property: WeightingProperty::NeutronCohb,
            })
        );
    }
}
