use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A workfare program record for one district and reporting month.
///
/// The typed fields are the ones the identity scheme and the HTTP filters
/// care about; everything else in the source payload is carried opaquely
/// in `extra` and round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fin_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Externally assigned id, if the record carries a non-empty one.
    #[must_use]
    pub fn explicit_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_payload_fields_round_trip() {
        let record = Record::from_value(json!({
            "state_code": 9,
            "district_code": 12,
            "fin_year": "2023-2024",
            "month": "April",
            "total_households_worked": 4521,
            "wage_expenditure": "12.5"
        }))
        .expect("record parses");
        assert_eq!(record.state_code, Some(9));
        assert_eq!(
            record.extra.get("total_households_worked"),
            Some(&json!(4521))
        );
        let back = record.to_value();
        assert_eq!(back.get("wage_expenditure"), Some(&json!("12.5")));
        assert!(back.get("id").is_none());
    }

    #[test]
    fn empty_string_id_is_not_explicit() {
        let record = Record {
            id: Some(String::new()),
            ..Record::default()
        };
        assert_eq!(record.explicit_id(), None);
    }
}
