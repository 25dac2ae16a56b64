//! Output shapes declared to the model and checked against its replies.
//!
//! Every structured operation names one of the composite shapes below. The
//! same tree is rendered into the provider's `responseSchema` and used to
//! validate the parsed reply before it is turned into typed entities.

use serde_json::{Map, Value, json};

use crate::error::{GuideError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Object {
        properties: Vec<(&'static str, Shape)>,
        required: Vec<&'static str>,
    },
    Array {
        items: Box<Shape>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    String,
    Integer,
    Boolean,
}

impl Shape {
    pub fn object(properties: Vec<(&'static str, Shape)>, required: &[&'static str]) -> Self {
        Shape::Object {
            properties,
            required: required.to_vec(),
        }
    }

    pub fn array(items: Shape) -> Self {
        Shape::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    pub fn array_between(items: Shape, min: usize, max: usize) -> Self {
        Shape::Array {
            items: Box::new(items),
            min_items: Some(min),
            max_items: Some(max),
        }
    }

    // ----- named shapes -----

    pub fn planetary_position() -> Self {
        Shape::object(
            vec![
                ("planet", Shape::String),
                ("sign", Shape::String),
                ("house", Shape::Integer),
                ("degree", Shape::Integer),
                ("retrograde", Shape::Boolean),
                ("logic", Shape::String),
            ],
            &["planet", "sign", "house", "degree", "retrograde"],
        )
    }

    pub fn progress_scale() -> Self {
        Shape::object(
            vec![
                ("label", Shape::String),
                ("value", Shape::Integer),
                ("color", Shape::String),
            ],
            &[],
        )
    }

    pub fn natal_chart() -> Self {
        let scales = || Shape::array(Shape::progress_scale());
        Shape::object(
            vec![
                ("sunSign", Shape::String),
                ("moonSign", Shape::String),
                ("ascendant", Shape::String),
                ("planets", Shape::array(Shape::planetary_position())),
                ("summary", Shape::String),
                (
                    "progressScales",
                    Shape::object(
                        vec![
                            ("missing", scales()),
                            ("excess", scales()),
                            ("workOn", scales()),
                            ("focusOn", scales()),
                        ],
                        &[],
                    ),
                ),
                (
                    "elements",
                    Shape::object(
                        vec![
                            ("fire", Shape::Integer),
                            ("earth", Shape::Integer),
                            ("air", Shape::Integer),
                            ("water", Shape::Integer),
                        ],
                        &[],
                    ),
                ),
                ("calculationLogic", Shape::String),
            ],
            &[
                "sunSign",
                "moonSign",
                "ascendant",
                "planets",
                "summary",
                "progressScales",
                "elements",
                "calculationLogic",
            ],
        )
    }

    pub fn numerology() -> Self {
        Shape::object(
            vec![
                ("lifePath", Shape::Integer),
                ("destinyNumber", Shape::Integer),
                ("soulNumber", Shape::Integer),
                ("matrixDescription", Shape::String),
            ],
            &["lifePath", "destinyNumber", "soulNumber", "matrixDescription"],
        )
    }

    pub fn artifacts() -> Self {
        Shape::object(
            vec![
                ("stones", Shape::array(Shape::String)),
                ("activityField", Shape::String),
                ("sports", Shape::array(Shape::String)),
                ("hobbies", Shape::array(Shape::String)),
                ("bestCity", Shape::String),
            ],
            &["stones", "activityField", "bestCity"],
        )
    }

    pub fn quick_profile() -> Self {
        Shape::object(
            vec![
                ("natalChart", Shape::natal_chart()),
                ("numerology", Shape::numerology()),
                ("artifacts", Shape::artifacts()),
            ],
            &["natalChart", "numerology", "artifacts"],
        )
    }

    pub fn recommendations() -> Self {
        let slots: Vec<(&'static str, Shape)> = crate::models::Recommendations::SLOTS
            .iter()
            .map(|slot| (*slot, Shape::String))
            .collect();
        Shape::object(slots, &crate::models::Recommendations::SLOTS)
    }

    pub fn daily_forecast() -> Self {
        Shape::object(
            vec![
                ("date", Shape::String),
                ("lunarPhase", Shape::String),
                ("lunarDay", Shape::Integer),
                ("moonPhaseDescription", Shape::String),
                ("mood", Shape::String),
                (
                    "energyScale",
                    Shape::object(
                        vec![
                            ("value", Shape::Integer),
                            ("difficulty", Shape::String),
                            ("description", Shape::String),
                        ],
                        &["value", "difficulty", "description"],
                    ),
                ),
                (
                    "warnings",
                    Shape::array(Shape::object(
                        vec![
                            ("type", Shape::String),
                            ("title", Shape::String),
                            ("advice", Shape::String),
                        ],
                        &[],
                    )),
                ),
                ("recommendations", Shape::recommendations()),
                ("justification", Shape::String),
            ],
            &[
                "date",
                "lunarPhase",
                "lunarDay",
                "moonPhaseDescription",
                "energyScale",
                "recommendations",
            ],
        )
    }

    pub fn deep_profile() -> Self {
        Shape::object(
            vec![
                (
                    "fatefulMoments",
                    Shape::array_between(
                        Shape::object(
                            vec![
                                ("period", Shape::String),
                                ("event", Shape::String),
                                ("description", Shape::String),
                                ("type", Shape::String),
                            ],
                            &[],
                        ),
                        3,
                        5,
                    ),
                ),
                (
                    "yearlyForecast",
                    Shape::array_between(
                        Shape::object(
                            vec![("month", Shape::String), ("prediction", Shape::String)],
                            &[],
                        ),
                        12,
                        12,
                    ),
                ),
            ],
            &["fatefulMoments", "yearlyForecast"],
        )
    }

    pub fn calendar() -> Self {
        Shape::object(
            vec![(
                "events",
                Shape::array_between(
                    Shape::object(
                        vec![
                            ("date", Shape::String),
                            ("status", Shape::String),
                            ("comment", Shape::String),
                        ],
                        &["date", "status", "comment"],
                    ),
                    5,
                    7,
                ),
            )],
            &["events"],
        )
    }

    // ----- rendering -----

    fn type_name(&self) -> &'static str {
        match self {
            Shape::Object { .. } => "OBJECT",
            Shape::Array { .. } => "ARRAY",
            Shape::String => "STRING",
            Shape::Integer => "INTEGER",
            Shape::Boolean => "BOOLEAN",
        }
    }

    /// Render as a Gemini `responseSchema` document
    pub fn to_schema(&self) -> Value {
        match self {
            Shape::Object {
                properties,
                required,
            } => {
                let mut props = Map::new();
                for (name, shape) in properties {
                    props.insert((*name).to_string(), shape.to_schema());
                }
                let mut schema = json!({ "type": "OBJECT", "properties": props });
                if !required.is_empty() {
                    schema["required"] = json!(required);
                }
                schema
            }
            Shape::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut schema = json!({ "type": "ARRAY", "items": items.to_schema() });
                // int64 fields travel as strings in the REST schema
                if let Some(min) = min_items {
                    schema["minItems"] = json!(min.to_string());
                }
                if let Some(max) = max_items {
                    schema["maxItems"] = json!(max.to_string());
                }
                schema
            }
            scalar => json!({ "type": scalar.type_name() }),
        }
    }

    // ----- validation -----

    /// Check a parsed reply against this shape, reporting the first violation
    pub fn validate(&self, value: &Value) -> Result<()> {
        self.check(value, "$")
            .map_err(|violation| GuideError::Provider(format!("reply violates schema: {violation}")))
    }

    fn check(&self, value: &Value, path: &str) -> std::result::Result<(), String> {
        match (self, value) {
            (
                Shape::Object {
                    properties,
                    required,
                },
                Value::Object(map),
            ) => {
                for name in required {
                    match map.get(*name) {
                        None | Some(Value::Null) => {
                            return Err(format!("{}: missing required field", join(path, name)));
                        }
                        Some(_) => {}
                    }
                }
                for (name, shape) in properties {
                    match map.get(*name) {
                        None | Some(Value::Null) => {}
                        Some(field) => shape.check(field, &join(path, name))?,
                    }
                }
                Ok(())
            }
            (
                Shape::Array {
                    items,
                    min_items,
                    max_items,
                },
                Value::Array(elements),
            ) => {
                if let Some(min) = min_items {
                    if elements.len() < *min {
                        return Err(format!(
                            "{path}: expected at least {min} items, got {}",
                            elements.len()
                        ));
                    }
                }
                if let Some(max) = max_items {
                    if elements.len() > *max {
                        return Err(format!(
                            "{path}: expected at most {max} items, got {}",
                            elements.len()
                        ));
                    }
                }
                for (i, element) in elements.iter().enumerate() {
                    items.check(element, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            (Shape::String, Value::String(_)) => Ok(()),
            (Shape::Boolean, Value::Bool(_)) => Ok(()),
            (Shape::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
            // models sometimes emit 14.0 for an integer slot
            (Shape::Integer, Value::Number(n)) if n.as_f64().is_some_and(|f| f.fract() == 0.0) => {
                Ok(())
            }
            (shape, _) => Err(format!(
                "{path}: expected {}",
                shape.type_name().to_lowercase()
            )),
        }
    }
}

fn join(path: &str, field: &str) -> String {
    if path == "$" {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}
