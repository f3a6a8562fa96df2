use crate::domain::is_valid_name;
use common::domain::{NormalizedDocument, RouteTarget};

pub const DB_NAME_FIELD: &str = "db_name";
pub const COLL_NAME_FIELD: &str = "coll_name";

/// Chooses the database and collection for each message.
///
/// `db_name` and `coll_name` are honored independently, each only when it is a
/// string that passes [`is_valid_name`]. Anything else falls back to the defaults.
#[derive(Debug, Clone)]
pub struct Router {
    default_target: RouteTarget,
}

impl Router {
    pub fn new(default_target: RouteTarget) -> Self {
        Self { default_target }
    }

    pub fn route(&self, document: &NormalizedDocument) -> RouteTarget {
        RouteTarget {
            db_name: select_name(document, DB_NAME_FIELD, &self.default_target.db_name),
            coll_name: select_name(document, COLL_NAME_FIELD, &self.default_target.coll_name),
        }
    }
}

fn select_name(document: &NormalizedDocument, field: &str, default: &str) -> String {
    document
        .get_str(field)
        .filter(|name| is_valid_name(name))
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn router() -> Router {
        Router::new(RouteTarget::new("presence_db", "presence"))
    }

    fn document(value: Value) -> NormalizedDocument {
        match value {
            Value::Object(map) => NormalizedDocument::new(map),
            _ => panic!("test documents must be objects"),
        }
    }

    #[test]
    fn test_defaults_when_no_routing_fields() {
        let target = router().route(&document(json!({"person_count": 1})));

        assert_eq!(target, RouteTarget::new("presence_db", "presence"));
    }

    #[test]
    fn test_unsafe_db_name_falls_back() {
        let target = router().route(&document(json!({"db_name": "../etc"})));

        assert_eq!(target.db_name, "presence_db");
    }

    #[test]
    fn test_valid_coll_name_used_while_db_resolves_independently() {
        let target = router().route(&document(json!({
            "db_name": "bad name",
            "coll_name": "sensors_a"
        })));

        assert_eq!(target, RouteTarget::new("presence_db", "sensors_a"));
    }

    #[test]
    fn test_both_fields_valid() {
        let target = router().route(&document(json!({
            "db_name": "garage-db",
            "coll_name": "sensors_a"
        })));

        assert_eq!(target, RouteTarget::new("garage-db", "sensors_a"));
    }

    #[test]
    fn test_non_string_routing_fields_ignored() {
        let target = router().route(&document(json!({
            "db_name": 5,
            "coll_name": {"$ne": null}
        })));

        assert_eq!(target, RouteTarget::new("presence_db", "presence"));
    }

    #[test]
    fn test_overlong_name_falls_back() {
        let target = router().route(&document(json!({"coll_name": "c".repeat(65)})));

        assert_eq!(target.coll_name, "presence");
    }
}
