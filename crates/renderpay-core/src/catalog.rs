//! Model catalog: validation and pricing for generation models.
//!
//! The catalog is the static registry of job types. Each model declares a
//! closed set of parameters (select / bool / bounded integer / delimited
//! list), an optional input-count rule, and a price table keyed on the
//! discrete parameter values. Unknown or out-of-range values are errors,
//! never silently clamped.
//!
//! Pricing returns the cost of **one** unit of output in integer credits.
//! A combination no price rule matches prices at 0, which callers must treat
//! as an unpriceable request error — never as a free job. Free generations
//! are expressed via promotional credits on the account instead.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::job::{JobInput, JobType};

/// Errors produced by catalog validation and pricing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// The requested model does not exist.
    #[error("unknown model: {model_id}")]
    UnknownModel {
        /// The model id that was requested.
        model_id: String,
    },

    /// A parameter not declared by the model was supplied.
    #[error("unknown parameter '{param}' for model {model_id}")]
    UnknownParam {
        /// The model id.
        model_id: String,
        /// The offending parameter name.
        param: String,
    },

    /// A required parameter is missing.
    #[error("missing parameter '{param}' for model {model_id}")]
    MissingParam {
        /// The model id.
        model_id: String,
        /// The missing parameter name.
        param: String,
    },

    /// A parameter value is outside the model's closed option set.
    #[error("invalid value for parameter '{param}': {reason}")]
    InvalidValue {
        /// The offending parameter name.
        param: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The input list does not satisfy the model's input rule.
    #[error("invalid inputs: {message}")]
    InvalidInputs {
        /// Human-readable rule violation.
        message: String,
    },

    /// No price rule matches the validated parameters.
    #[error("no price defined for model {model_id} with the given parameters")]
    UnpriceableParams {
        /// The model id.
        model_id: String,
    },
}

/// A validated parameter value in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A selected option.
    Str(String),
    /// A boolean flag.
    Bool(bool),
    /// A bounded integer.
    Int(i64),
    /// A validated item list.
    List(Vec<String>),
}

impl ParamValue {
    /// Canonical string form, used as the price-table lookup key.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::List(items) => items.join(","),
        }
    }
}

/// The closed set of parameter kinds a model may declare.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    /// One value out of a closed option set.
    Select {
        /// Allowed values.
        options: Vec<String>,
    },
    /// A boolean flag.
    Bool,
    /// An integer within an inclusive range.
    Int {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
    },
    /// A delimited string list (or JSON array) with bounded length.
    List {
        /// Allowed items; `None` accepts any non-empty item.
        options: Option<Vec<String>>,
        /// Maximum number of items.
        max_items: usize,
    },
}

/// A declared model parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Value kind and constraints.
    #[serde(flatten)]
    pub kind: ParamKind,
    /// Whether the parameter must be present.
    #[serde(default = "default_required")]
    pub required: bool,
}

const fn default_required() -> bool {
    true
}

/// Input-count rule for a model.
///
/// A model that declares no rule rejects any non-empty input list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRule {
    /// Required input kind (e.g. "image").
    pub kind: String,
    /// Minimum number of inputs.
    pub min: usize,
    /// Maximum number of inputs.
    pub max: usize,
}

impl InputRule {
    /// Check an observed input list against this rule.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::InvalidInputs` when the count is out of range
    /// or an input has the wrong kind.
    pub fn check(&self, inputs: &[JobInput]) -> Result<(), CatalogError> {
        if inputs.len() < self.min || inputs.len() > self.max {
            return Err(CatalogError::InvalidInputs {
                message: format!(
                    "expected {}..={} inputs of kind '{}', got {}",
                    self.min,
                    self.max,
                    self.kind,
                    inputs.len()
                ),
            });
        }
        for input in inputs {
            if input.kind != self.kind {
                return Err(CatalogError::InvalidInputs {
                    message: format!(
                        "expected input kind '{}', got '{}'",
                        self.kind, input.kind
                    ),
                });
            }
        }
        Ok(())
    }
}

/// One row of a model's price table.
///
/// A rule matches when every `(key, value)` pair in `when` equals the
/// canonical form of the corresponding validated parameter. The first
/// matching rule wins; an empty `when` matches everything (flat price).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRule {
    /// Canonical parameter values this rule applies to.
    #[serde(default)]
    pub when: BTreeMap<String, String>,
    /// Cost of one output unit, in credits.
    pub unit_cost_cents: u32,
}

/// A generation model known to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Unique model id.
    pub id: String,
    /// Kind of output the model produces.
    pub job_type: JobType,
    /// Declared parameters.
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
    /// Input rule; absent means no inputs are accepted.
    #[serde(default)]
    pub input_rule: Option<InputRule>,
    /// Price table, first match wins.
    pub price_rules: Vec<PriceRule>,
    /// Largest client-specified batch count. 1 disables batching.
    #[serde(default = "default_max_batch")]
    pub max_batch: u32,
}

const fn default_max_batch() -> u32 {
    1
}

/// A request that passed catalog validation.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// The model id.
    pub model_id: String,
    /// The model's output kind.
    pub job_type: JobType,
    /// Validated parameters in canonical form.
    pub params: BTreeMap<String, ParamValue>,
    /// Largest batch count the model permits.
    pub max_batch: u32,
}

/// The static registry of generation models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    /// Models by id.
    pub models: BTreeMap<String, ModelSpec>,
}

impl ModelCatalog {
    /// Build a catalog from a list of model specs.
    #[must_use]
    pub fn from_models(models: Vec<ModelSpec>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    /// Look up a model by id.
    #[must_use]
    pub fn get(&self, model_id: &str) -> Option<&ModelSpec> {
        self.models.get(model_id)
    }

    /// Validate a raw request against a model's declared parameters and
    /// input rule.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogError` describing the first violation found.
    pub fn validate(
        &self,
        model_id: &str,
        raw_params: &BTreeMap<String, serde_json::Value>,
        inputs: &[JobInput],
    ) -> Result<ValidatedRequest, CatalogError> {
        let model = self.get(model_id).ok_or_else(|| CatalogError::UnknownModel {
            model_id: model_id.to_string(),
        })?;

        // Undeclared keys are errors, not ignored.
        for key in raw_params.keys() {
            if !model.params.contains_key(key) {
                return Err(CatalogError::UnknownParam {
                    model_id: model.id.clone(),
                    param: key.clone(),
                });
            }
        }

        let mut params = BTreeMap::new();
        for (name, spec) in &model.params {
            match raw_params.get(name) {
                Some(raw) => {
                    let value = validate_value(name, &spec.kind, raw)?;
                    params.insert(name.clone(), value);
                }
                None if spec.required => {
                    return Err(CatalogError::MissingParam {
                        model_id: model.id.clone(),
                        param: name.clone(),
                    });
                }
                None => {}
            }
        }

        match &model.input_rule {
            Some(rule) => rule.check(inputs)?,
            None if !inputs.is_empty() => {
                return Err(CatalogError::InvalidInputs {
                    message: format!("model {} accepts no inputs", model.id),
                });
            }
            None => {}
        }

        Ok(ValidatedRequest {
            model_id: model.id.clone(),
            job_type: model.job_type,
            params,
            max_batch: model.max_batch,
        })
    }

    /// Price one unit of output for a validated request.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnpriceableParams` when no price rule matches
    /// or the matched price is zero. The zero case is deliberate: a price
    /// table must never silently produce a free job.
    pub fn price(&self, request: &ValidatedRequest) -> Result<u32, CatalogError> {
        let model = self
            .get(&request.model_id)
            .ok_or_else(|| CatalogError::UnknownModel {
                model_id: request.model_id.clone(),
            })?;

        let unit_cost = model
            .price_rules
            .iter()
            .find(|rule| {
                rule.when.iter().all(|(key, expected)| {
                    request
                        .params
                        .get(key)
                        .is_some_and(|v| v.canonical() == *expected)
                })
            })
            .map_or(0, |rule| rule.unit_cost_cents);

        if unit_cost == 0 {
            return Err(CatalogError::UnpriceableParams {
                model_id: request.model_id.clone(),
            });
        }
        Ok(unit_cost)
    }
}

/// Validate one raw value against a parameter kind.
fn validate_value(
    name: &str,
    kind: &ParamKind,
    raw: &serde_json::Value,
) -> Result<ParamValue, CatalogError> {
    match kind {
        ParamKind::Select { options } => {
            let s = raw.as_str().ok_or_else(|| CatalogError::InvalidValue {
                param: name.to_string(),
                reason: "expected a string".into(),
            })?;
            if options.iter().any(|o| o == s) {
                Ok(ParamValue::Str(s.to_string()))
            } else {
                Err(CatalogError::InvalidValue {
                    param: name.to_string(),
                    reason: format!("'{s}' is not one of {options:?}"),
                })
            }
        }
        ParamKind::Bool => raw
            .as_bool()
            .map(ParamValue::Bool)
            .ok_or_else(|| CatalogError::InvalidValue {
                param: name.to_string(),
                reason: "expected a boolean".into(),
            }),
        ParamKind::Int { min, max } => {
            let n = raw.as_i64().ok_or_else(|| CatalogError::InvalidValue {
                param: name.to_string(),
                reason: "expected an integer".into(),
            })?;
            if n < *min || n > *max {
                return Err(CatalogError::InvalidValue {
                    param: name.to_string(),
                    reason: format!("{n} is outside {min}..={max}"),
                });
            }
            Ok(ParamValue::Int(n))
        }
        ParamKind::List { options, max_items } => {
            let items: Vec<String> = match raw {
                serde_json::Value::String(s) => s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
                serde_json::Value::Array(values) => values
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(String::from)
                            .ok_or_else(|| CatalogError::InvalidValue {
                                param: name.to_string(),
                                reason: "list items must be strings".into(),
                            })
                    })
                    .collect::<Result<_, _>>()?,
                _ => {
                    return Err(CatalogError::InvalidValue {
                        param: name.to_string(),
                        reason: "expected a delimited string or array".into(),
                    })
                }
            };
            if items.len() > *max_items {
                return Err(CatalogError::InvalidValue {
                    param: name.to_string(),
                    reason: format!("at most {max_items} items allowed, got {}", items.len()),
                });
            }
            if let Some(allowed) = options {
                for item in &items {
                    if !allowed.iter().any(|o| o == item) {
                        return Err(CatalogError::InvalidValue {
                            param: name.to_string(),
                            reason: format!("'{item}' is not one of {allowed:?}"),
                        });
                    }
                }
            }
            Ok(ParamValue::List(items))
        }
    }
}

impl Default for ModelCatalog {
    /// Built-in catalog: one text-to-image model, one image-edit model, and
    /// one video model priced by resolution x duration x audio flag.
    fn default() -> Self {
        let styles = ParamSpec {
            kind: ParamKind::List {
                options: Some(vec![
                    "photoreal".into(),
                    "anime".into(),
                    "watercolor".into(),
                    "sketch".into(),
                ]),
                max_items: 2,
            },
            required: false,
        };

        let flux_image = ModelSpec {
            id: "flux-image".into(),
            job_type: JobType::Image,
            params: BTreeMap::from([
                (
                    "aspect_ratio".to_string(),
                    ParamSpec {
                        kind: ParamKind::Select {
                            options: vec![
                                "1:1".into(),
                                "3:4".into(),
                                "4:3".into(),
                                "16:9".into(),
                                "9:16".into(),
                            ],
                        },
                        required: true,
                    },
                ),
                ("styles".to_string(), styles),
            ]),
            input_rule: None,
            price_rules: vec![PriceRule {
                when: BTreeMap::new(),
                unit_cost_cents: 30,
            }],
            max_batch: 6,
        };

        let flux_edit = ModelSpec {
            id: "flux-edit".into(),
            job_type: JobType::Image,
            params: BTreeMap::from([(
                "strength".to_string(),
                ParamSpec {
                    kind: ParamKind::Int { min: 1, max: 100 },
                    required: true,
                },
            )]),
            input_rule: Some(InputRule {
                kind: "image".into(),
                min: 1,
                max: 4,
            }),
            price_rules: vec![PriceRule {
                when: BTreeMap::new(),
                unit_cost_cents: 40,
            }],
            max_batch: 4,
        };

        let mut video_rules = Vec::new();
        for (resolution, duration, audio, cost) in [
            ("720p", "5", false, 60),
            ("720p", "5", true, 70),
            ("720p", "10", false, 120),
            ("720p", "10", true, 140),
            ("1080p", "5", false, 100),
            ("1080p", "5", true, 115),
            ("1080p", "10", false, 200),
            ("1080p", "10", true, 230),
        ] {
            video_rules.push(PriceRule {
                when: BTreeMap::from([
                    ("resolution".to_string(), resolution.to_string()),
                    ("duration".to_string(), duration.to_string()),
                    ("audio".to_string(), audio.to_string()),
                ]),
                unit_cost_cents: cost,
            });
        }

        let kling_video = ModelSpec {
            id: "kling-video".into(),
            job_type: JobType::Video,
            params: BTreeMap::from([
                (
                    "resolution".to_string(),
                    ParamSpec {
                        kind: ParamKind::Select {
                            options: vec!["720p".into(), "1080p".into()],
                        },
                        required: true,
                    },
                ),
                (
                    "duration".to_string(),
                    ParamSpec {
                        kind: ParamKind::Select {
                            options: vec!["5".into(), "10".into()],
                        },
                        required: true,
                    },
                ),
                (
                    "audio".to_string(),
                    ParamSpec {
                        kind: ParamKind::Bool,
                        required: true,
                    },
                ),
            ]),
            input_rule: Some(InputRule {
                kind: "image".into(),
                min: 0,
                max: 1,
            }),
            price_rules: video_rules,
            max_batch: 1,
        };

        Self::from_models(vec![flux_image, flux_edit, kling_video])
    }
}
