use std::collections::BTreeMap;

/// msgpack extension type that marks a value as unknown until apply.
pub const UNKNOWN_EXT_TYPE: i8 = 0;

/// A dynamic attribute value as carried in a plan.
///
/// Plans may contain values that are only known after apply; those are
/// [`Value::Unknown`]. Everything else maps one-to-one onto JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Unknown,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Project to JSON. Unknown values become `null` and are therefore
    /// indistinguishable from absent ones; consumers depend on this.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Unknown => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Build a fully-known value from JSON.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.clone()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(obj) => Value::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    // ─── msgpack ────────────────────────────────────────────────────────────

    /// Decode a msgpack-encoded dynamic value. Extension type 0 is unknown.
    pub fn decode_msgpack(bytes: &[u8]) -> Result<Self, ValueError> {
        let raw = rmpv::decode::read_value(&mut &bytes[..])
            .map_err(|e| ValueError::Decode(e.to_string()))?;
        from_rmpv(raw)
    }

    /// Encode as msgpack, writing unknowns as extension type 0.
    pub fn encode_msgpack(&self) -> Result<Vec<u8>, ValueError> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &to_rmpv(self))
            .map_err(|e| ValueError::Encode(e.to_string()))?;
        Ok(buf)
    }
}

fn from_rmpv(val: rmpv::Value) -> Result<Value, ValueError> {
    Ok(match val {
        rmpv::Value::Nil => Value::Null,
        rmpv::Value::Boolean(b) => Value::Bool(b),
        rmpv::Value::Integer(i) => {
            if let Some(n) = i.as_i64() {
                Value::Number(n.into())
            } else if let Some(n) = i.as_u64() {
                Value::Number(n.into())
            } else {
                return Err(ValueError::Decode(format!("integer out of range: {}", i)));
            }
        }
        rmpv::Value::F32(f) => float(f as f64)?,
        rmpv::Value::F64(f) => float(f)?,
        rmpv::Value::String(s) => match s.into_str() {
            Some(s) => Value::String(s),
            None => return Err(ValueError::Decode("string is not valid UTF-8".to_string())),
        },
        rmpv::Value::Binary(_) => {
            return Err(ValueError::Decode("binary values are not supported".to_string()))
        }
        rmpv::Value::Array(items) => {
            Value::List(items.into_iter().map(from_rmpv).collect::<Result<_, _>>()?)
        }
        rmpv::Value::Map(entries) => {
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                let key = match k {
                    rmpv::Value::String(s) => s
                        .into_str()
                        .ok_or_else(|| ValueError::Decode("map key is not valid UTF-8".to_string()))?,
                    other => return Err(ValueError::Decode(format!("non-string map key: {}", other))),
                };
                map.insert(key, from_rmpv(v)?);
            }
            Value::Map(map)
        }
        rmpv::Value::Ext(type_id, _) if type_id == UNKNOWN_EXT_TYPE => Value::Unknown,
        rmpv::Value::Ext(type_id, _) => return Err(ValueError::UnsupportedExtension(type_id)),
    })
}

fn float(f: f64) -> Result<Value, ValueError> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| ValueError::Decode(format!("non-finite number: {}", f)))
}

fn to_rmpv(val: &Value) -> rmpv::Value {
    match val {
        Value::Null => rmpv::Value::Nil,
        Value::Unknown => rmpv::Value::Ext(UNKNOWN_EXT_TYPE, vec![0]),
        Value::Bool(b) => rmpv::Value::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                rmpv::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                rmpv::Value::from(u)
            } else {
                rmpv::Value::F64(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => rmpv::Value::from(s.as_str()),
        Value::List(items) => rmpv::Value::Array(items.iter().map(to_rmpv).collect()),
        Value::Map(entries) => rmpv::Value::Map(
            entries
                .iter()
                .map(|(k, v)| (rmpv::Value::from(k.as_str()), to_rmpv(v)))
                .collect(),
        ),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("failed to decode msgpack value: {0}")]
    Decode(String),
    #[error("failed to encode msgpack value: {0}")]
    Encode(String),
    #[error("unsupported msgpack extension type {0}")]
    UnsupportedExtension(i8),
}
