//! Structural schemas for envelopes and payloads.
//!
//! A small JSON Type Definition subset: property forms reject unknown keys,
//! and every failure is reported with its instance path and schema path so
//! callers can log or relay the full list.

use std::fmt;

use serde_json::Value;

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Path to the offending value (object keys).
    pub instance_path: Vec<String>,
    /// Path to the schema rule that rejected it.
    pub schema_path: Vec<String>,
}

/// Ordered list of violations (empty = valid).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s)", self.0.len())?;
        for (i, e) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(
                f,
                "{sep}/{} (schema /{})",
                e.instance_path.join("/"),
                e.schema_path.join("/")
            )?;
        }
        Ok(())
    }
}

/// Schema forms understood by the validator.
#[derive(Debug, Clone, Copy)]
pub enum Schema {
    /// Accepts any value, including null.
    Empty,
    /// Accepts any value except null.
    NonNull,
    /// JSON string.
    Str,
    /// Integral number in `0..=u32::MAX`.
    Uint32,
    /// One of the listed strings.
    Enum(&'static [&'static str]),
    /// Object with required and optional properties; other keys are rejected.
    Properties {
        required: &'static [(&'static str, Schema)],
        optional: &'static [(&'static str, Schema)],
    },
}

/// Methods accepted in a request payload.
pub const METHODS: &[&str] = &[
    "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT", "TRACE",
];

/// Envelope: `{ id, type, payload }`.
pub const ENVELOPE: Schema = Schema::Properties {
    required: &[
        ("id", Schema::Str),
        ("type", Schema::Enum(&["REQUEST", "RESPONSE", "ERROR"])),
        ("payload", Schema::NonNull),
    ],
    optional: &[],
};

/// Request payload.
pub const REQUEST: Schema = Schema::Properties {
    required: &[("url", Schema::Str), ("method", Schema::Enum(METHODS))],
    optional: &[
        ("headers", Schema::Empty),
        ("body", Schema::Empty),
        ("query", Schema::Empty),
        ("params", Schema::Empty),
    ],
};

/// Response payload.
pub const RESPONSE: Schema = Schema::Properties {
    required: &[("status", Schema::Uint32), ("statusText", Schema::Str)],
    optional: &[("body", Schema::Empty)],
};

/// Validate `value` against `schema`, collecting every violation.
pub fn validate(schema: &Schema, value: &Value) -> ValidationErrors {
    let mut errors = Vec::new();
    walk(schema, value, &mut Vec::new(), &mut Vec::new(), &mut errors);
    ValidationErrors(errors)
}

/// Pass/fail form of [`validate`].
pub fn check(schema: &Schema, value: &Value) -> std::result::Result<(), ValidationErrors> {
    let errors = validate(schema, value);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn push(errors: &mut Vec<ValidationError>, ip: &[String], sp: &[String], rule: Option<&str>) {
    let mut schema_path = sp.to_vec();
    if let Some(rule) = rule {
        schema_path.push(rule.to_owned());
    }
    errors.push(ValidationError {
        instance_path: ip.to_vec(),
        schema_path,
    });
}

fn walk(
    schema: &Schema,
    value: &Value,
    ip: &mut Vec<String>,
    sp: &mut Vec<String>,
    errors: &mut Vec<ValidationError>,
) {
    match schema {
        Schema::Empty => {}
        Schema::NonNull => {
            if value.is_null() {
                push(errors, ip, sp, Some("nullable"));
            }
        }
        Schema::Str => {
            if !value.is_string() {
                push(errors, ip, sp, Some("type"));
            }
        }
        Schema::Uint32 => {
            if !is_uint32(value) {
                push(errors, ip, sp, Some("type"));
            }
        }
        Schema::Enum(allowed) => {
            let ok = value.as_str().is_some_and(|s| allowed.contains(&s));
            if !ok {
                push(errors, ip, sp, Some("enum"));
            }
        }
        Schema::Properties { required, optional } => {
            let Some(obj) = value.as_object() else {
                let form = if required.is_empty() {
                    "optionalProperties"
                } else {
                    "properties"
                };
                push(errors, ip, sp, Some(form));
                return;
            };

            for (key, sub) in required.iter() {
                sp.push("properties".into());
                sp.push((*key).into());
                match obj.get(*key) {
                    Some(v) => {
                        ip.push((*key).into());
                        walk(sub, v, ip, sp, errors);
                        ip.pop();
                    }
                    None => push(errors, ip, sp, None),
                }
                sp.pop();
                sp.pop();
            }

            for (key, sub) in optional.iter() {
                if let Some(v) = obj.get(*key) {
                    sp.push("optionalProperties".into());
                    sp.push((*key).into());
                    ip.push((*key).into());
                    walk(sub, v, ip, sp, errors);
                    ip.pop();
                    sp.pop();
                    sp.pop();
                }
            }

            for key in obj.keys() {
                let known = required.iter().chain(optional.iter()).any(|(k, _)| k == key);
                if !known {
                    ip.push(key.clone());
                    push(errors, ip, sp, None);
                    ip.pop();
                }
            }
        }
    }
}

pub(crate) fn is_uint32(value: &Value) -> bool {
    if let Some(n) = value.as_u64() {
        return n <= u64::from(u32::MAX);
    }
    match value.as_f64() {
        Some(f) => f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f),
        None => false,
    }
}
