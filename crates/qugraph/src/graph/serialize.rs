//! Request encoding.
//!
//! Operations serialize as `{name, args, output_name?}` with positional
//! arguments; a full request is `{operations, outputs, cost?, seed?}`.
//! Node references encode as `{"node": index}`, complex numbers as
//! `{"real", "imag"}`, dense arrays with explicit shape and dtype, and
//! sparse operators as COO triples.

use num_complex::Complex64;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use super::{Argument, Graph, NodeId};
use crate::literal::{ArrayLiteral, CooMatrix};

impl Serialize for Argument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Argument::None => serializer.serialize_none(),
            Argument::Bool(v) => serializer.serialize_bool(*v),
            Argument::Int(v) => serializer.serialize_i64(*v),
            Argument::Float(v) => serializer.serialize_f64(*v),
            Argument::Complex(v) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("real", &v.re)?;
                map.serialize_entry("imag", &v.im)?;
                map.end()
            }
            Argument::Str(v) => serializer.serialize_str(v),
            Argument::Node(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("node", &id.0)?;
                map.end()
            }
            Argument::Array(v) => v.serialize(serializer),
            Argument::Sparse(v) => v.serialize(serializer),
            Argument::Ints(v) => v.serialize(serializer),
            Argument::Reals(v) => v.serialize(serializer),
            Argument::Slice { start, stop, step } => {
                #[derive(Serialize)]
                struct SliceWire<'a> {
                    slice: SliceFields<'a>,
                }
                #[derive(Serialize)]
                struct SliceFields<'a> {
                    start: &'a Option<i64>,
                    stop: &'a Option<i64>,
                    step: &'a Option<i64>,
                }
                SliceWire {
                    slice: SliceFields { start, stop, step },
                }
                .serialize(serializer)
            }
            Argument::List(items) => items.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Argument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Json::deserialize(deserializer)?;
        argument_from_json(&value).map_err(D::Error::custom)
    }
}

fn argument_from_json(value: &Json) -> Result<Argument, String> {
    match value {
        Json::Null => Ok(Argument::None),
        Json::Bool(v) => Ok(Argument::Bool(*v)),
        Json::Number(v) => {
            if let Some(int) = v.as_i64() {
                Ok(Argument::Int(int))
            } else {
                Ok(Argument::Float(v.as_f64().ok_or("non-finite number")?))
            }
        }
        Json::String(v) => Ok(Argument::Str(v.clone())),
        Json::Array(items) => items
            .iter()
            .map(argument_from_json)
            .collect::<Result<_, _>>()
            .map(Argument::List),
        Json::Object(map) => {
            if let Some(slice) = map.get("slice") {
                let field = |name: &str| -> Result<Option<i64>, String> {
                    match slice.get(name) {
                        None | Some(Json::Null) => Ok(None),
                        Some(Json::Number(v)) => {
                            v.as_i64().map(Some).ok_or_else(|| "bad slice bound".into())
                        }
                        Some(_) => Err("bad slice bound".into()),
                    }
                };
                return Ok(Argument::Slice {
                    start: field("start")?,
                    stop: field("stop")?,
                    step: field("step")?,
                });
            }
            if let Some(node) = map.get("node") {
                let index = node.as_u64().ok_or("bad node reference")?;
                return Ok(Argument::Node(NodeId(index as usize)));
            }
            if map.contains_key("row") {
                return serde_json::from_value::<CooMatrix>(value.clone())
                    .map(Argument::Sparse)
                    .map_err(|err| err.to_string());
            }
            if map.contains_key("dtype") {
                return serde_json::from_value::<ArrayLiteral>(value.clone())
                    .map(Argument::Array)
                    .map_err(|err| err.to_string());
            }
            if let (Some(re), Some(im)) = (map.get("real"), map.get("imag")) {
                let re = re.as_f64().ok_or("bad complex payload")?;
                let im = im.as_f64().ok_or("bad complex payload")?;
                return Ok(Argument::Complex(Complex64::new(re, im)));
            }
            Err(format!("unrecognised argument object: {value}"))
        }
    }
}

/// Wire form of one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireOperation {
    pub name: String,
    pub args: Vec<Argument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

/// A complete evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub operations: Vec<WireOperation>,
    pub outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Graph {
    /// The serialized operation list, in dependency order.
    pub fn wire_operations(&self) -> Vec<WireOperation> {
        self.with_operations(|operations| {
            operations
                .iter()
                .map(|op| WireOperation {
                    name: op.name.to_owned(),
                    args: op.args.clone(),
                    output_name: op.output_name.clone(),
                })
                .collect()
        })
    }
}
