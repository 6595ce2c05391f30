//! `int64` / `uint64` proto fields travel as JSON strings.
//!
//! Use with `#[serde(default, with = "crate::int64", skip_serializing_if = "Option::is_none")]`
//! on `Option<i64>` fields. Plain JSON numbers are accepted on input too.

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(value: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(n) => s.serialize_str(&n.to_string()),
        None => s.serialize_none(),
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }

    match Option::<Raw>::deserialize(d)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Capacity {
        #[serde(default, with = "crate::int64", skip_serializing_if = "Option::is_none")]
        size: Option<i64>,
    }

    #[test]
    fn string_and_number_forms() {
        let a: Capacity = serde_json::from_str(r#"{"size":"10240"}"#).unwrap();
        let b: Capacity = serde_json::from_str(r#"{"size":50}"#).unwrap();
        let c: Capacity = serde_json::from_str("{}").unwrap();
        assert_eq!(a.size, Some(10240));
        assert_eq!(b.size, Some(50));
        assert_eq!(c.size, None);
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"size":"10240"}"#);
        assert_eq!(serde_json::to_string(&c).unwrap(), "{}");
    }
}
