use crate::core::transform::correction::ScaleFactorPolicy;
use crate::core::transform::grid::RealSpaceParameters;
use crate::core::transform::shape::ShapeFunction;
use crate::core::weighting::properties::WeightingProperty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid constraint settings in '{path}': {source}")]
    Invalid { path: String, source: ConfigError },
}

/// Settings of one experimental constraint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintConfig {
    pub weighting: WeightingProperty,
    /// Per-element weights that replace the tabulated property.
    pub atoms_weight: HashMap<String, f64>,
    /// Scale factor used until the first refit.
    pub scale_factor: f64,
    pub adjust_scale_factor: ScaleFactorPolicy,
    /// Lower and upper data position to compare against, snapped to samples.
    pub limits: Option<(f64, f64)>,
    pub window_function: Option<Vec<f64>>,
    pub shape_function: Option<ShapeFunction>,
    /// Real-space grid of the structure-factor transform.
    pub real_space: RealSpaceParameters,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            weighting: WeightingProperty::AtomicNumber,
            atoms_weight: HashMap::new(),
            scale_factor: 1.0,
            adjust_scale_factor: ScaleFactorPolicy::default(),
            limits: None,
            window_function: None,
            shape_function: None,
            real_space: RealSpaceParameters::default(),
        }
    }
}

impl ConstraintConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scale_factor.is_finite() {
            return Err(ConfigError::InvalidValue {
                parameter: "scale_factor",
                reason: format!("{} is not finite", self.scale_factor),
            });
        }
        if let Err(e) = self.adjust_scale_factor.validate() {
            return Err(ConfigError::InvalidValue {
                parameter: "adjust_scale_factor",
                reason: e.to_string(),
            });
        }
        let policy = &self.adjust_scale_factor;
        if policy.frequency > 0
            && !(policy.minimum..=policy.maximum).contains(&self.scale_factor)
        {
            return Err(ConfigError::InvalidValue {
                parameter: "scale_factor",
                reason: format!(
                    "{} lies outside the refit bounds [{}, {}]",
                    self.scale_factor, policy.minimum, policy.maximum
                ),
            });
        }
        if let Some((element, value)) = self.atoms_weight.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::InvalidValue {
                parameter: "atoms_weight",
                reason: format!("weight of '{element}' is {value}"),
            });
        }
        if let Some(ShapeFunction::Parameters(params)) = &self.shape_function {
            if let Err(e) = params.validate() {
                return Err(ConfigError::InvalidValue {
                    parameter: "shape_function",
                    reason: e.to_string(),
                });
            }
        }
        for (name, value) in [
            ("real_space.rmin", self.real_space.rmin),
            ("real_space.rmax", self.real_space.rmax),
            ("real_space.dr", self.real_space.dr),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ConfigError::InvalidValue {
                        parameter: "real_space",
                        reason: format!("{name} = {v} must be finite and non-negative"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let display = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: display.clone(),
            source: e,
        })?;
        Self::parse(&content, display)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigLoadError> {
        Self::parse(content, "<inline>".to_string())
    }

    fn parse(content: &str, path: String) -> Result<Self, ConfigLoadError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigLoadError::Toml {
            path: path.clone(),
            source: e,
        })?;
        config
            .validate()
            .map_err(|e| ConfigLoadError::Invalid { path, source: e })?;
        Ok(config)
    }
}

#[derive(Default)]
pub struct ConstraintConfigBuilder {
    weighting: Option<WeightingProperty>,
    atoms_weight: HashMap<String, f64>,
    scale_factor: Option<f64>,
    adjust_scale_factor: Option<ScaleFactorPolicy>,
    limits: Option<(f64, f64)>,
    window_function: Option<Vec<f64>>,
    shape_function: Option<ShapeFunction>,
    real_space: Option<RealSpaceParameters>,
}

impl ConstraintConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weighting(mut self, property: WeightingProperty) -> Self {
        self.weighting = Some(property);
        self
    }
    pub fn atom_weight(mut self, element: impl Into<String>, weight: f64) -> Self {
        self.atoms_weight.insert(element.into(), weight);
        self
    }
    pub fn scale_factor(mut self, factor: f64) -> Self {
        self.scale_factor = Some(factor);
        self
    }
    pub fn adjust_scale_factor(mut self, frequency: u64, minimum: f64, maximum: f64) -> Self {
        self.adjust_scale_factor = Some(ScaleFactorPolicy {
            frequency,
            minimum,
            maximum,
        });
        self
    }
    pub fn limits(mut self, lower: f64, upper: f64) -> Self {
        self.limits = Some((lower, upper));
        self
    }
    pub fn window_function(mut self, values: Vec<f64>) -> Self {
        self.window_function = Some(values);
        self
    }
    pub fn shape_function(mut self, shape: ShapeFunction) -> Self {
        self.shape_function = Some(shape);
        self
    }
    pub fn real_space(mut self, params: RealSpaceParameters) -> Self {
        self.real_space = Some(params);
        self
    }

    pub fn build(self) -> Result<ConstraintConfig, ConfigError> {
        let defaults = ConstraintConfig::default();
        let config = ConstraintConfig {
            weighting: self.weighting.unwrap_or(defaults.weighting),
            atoms_weight: self.atoms_weight,
            scale_factor: self.scale_factor.unwrap_or(defaults.scale_factor),
            adjust_scale_factor: self
                .adjust_scale_factor
                .unwrap_or(defaults.adjust_scale_factor),
            limits: self.limits,
            window_function: self.window_function,
            shape_function: self.shape_function,
            real_space: self.real_space.unwrap_or(defaults.real_space),
        };
        config.validate()?;
        Ok(config)
    }
}
