use serde_json::Value;

use crate::error::AstroError;

/// Maximum angular distance (arcsec) between a Gaia source and its SDSS
/// counterpart when none is given.
pub const DEFAULT_MAX_ANGULAR_DISTANCE: f64 = 2.0;

const BEST_NEIGHBOUR_TABLE: &str = "gaiadr3.sdssdr13_best_neighbour";

/// A validated SDSS to Gaia cross-match request
#[derive(Debug, Clone, PartialEq)]
pub struct CrossMatchRequest {
    spec_objids: Vec<i64>,
    max_angular_distance: f64,
}

impl CrossMatchRequest {
    /// Typed entry point; the list and arity checks are carried by the
    /// signature, so only emptiness and sign are checked here.
    pub fn new(spec_objids: Vec<i64>) -> Result<Self, AstroError> {
        if spec_objids.is_empty() {
            return Err(missing_ids());
        }
        check_non_negative(&spec_objids)?;
        Ok(Self {
            spec_objids,
            max_angular_distance: DEFAULT_MAX_ANGULAR_DISTANCE,
        })
    }

    pub fn with_max_angular_distance(mut self, max_angular_distance: f64) -> Self {
        self.max_angular_distance = max_angular_distance;
        self
    }

    /// Dynamic entry point for positional arguments decoded from JSON:
    /// `[spec_objid_list, angular_distance_max?]`.
    ///
    /// Checks run in a fixed order and stop at the first failure: presence,
    /// list type, argument count, then sign.
    pub fn from_args(args: &[Value]) -> Result<Self, AstroError> {
        let first = match args.first() {
            None => return Err(missing_ids()),
            Some(v) if is_falsy(v) => return Err(missing_ids()),
            Some(v) => v,
        };

        let items = first.as_array().ok_or_else(|| {
            AstroError::Validation("spec_objid_list must be a list".to_string())
        })?;

        if args.len() > 2 {
            return Err(AstroError::Validation(
                "Too many positional arguments. Expected at most 2.".to_string(),
            ));
        }

        let spec_objids = items
            .iter()
            .map(|v| {
                v.as_i64().ok_or_else(|| {
                    AstroError::Validation(format!("specObjID values must be integers, got {}", v))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        check_non_negative(&spec_objids)?;

        let max_angular_distance = match args.get(1) {
            None | Some(Value::Null) => DEFAULT_MAX_ANGULAR_DISTANCE,
            Some(v) => v.as_f64().ok_or_else(|| {
                AstroError::Validation("angular_distance_max must be a number".to_string())
            })?,
        };

        Ok(Self {
            spec_objids,
            max_angular_distance,
        })
    }

    pub fn spec_objids(&self) -> &[i64] {
        &self.spec_objids
    }

    pub fn max_angular_distance(&self) -> f64 {
        self.max_angular_distance
    }

    /// ADQL against the Gaia DR3 / SDSS DR13 best-neighbour table.
    pub fn to_adql(&self) -> String {
        let ids = self
            .spec_objids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "SELECT * FROM {} WHERE angular_distance < {} AND original_ext_source_id IN ({})",
            BEST_NEIGHBOUR_TABLE, self.max_angular_distance, ids
        )
    }
}

fn missing_ids() -> AstroError {
    AstroError::Validation("Missing required positional arguments: spec_objid_list".to_string())
}

fn check_non_negative(ids: &[i64]) -> Result<(), AstroError> {
    match ids.iter().min() {
        Some(min) if *min < 0 => Err(AstroError::Validation(
            "specObjID values cannot be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IDS: [i64; 4] = [
        1237645879551066262,
        1237645879578460255,
        1237645941291614227,
        1237645941824356443,
    ];

    #[test]
    fn test_builds_best_neighbour_query() {
        let request = CrossMatchRequest::new(IDS[..2].to_vec())
            .unwrap()
            .with_max_angular_distance(3.0);
        assert_eq!(
            request.to_adql(),
            "SELECT * FROM gaiadr3.sdssdr13_best_neighbour WHERE angular_distance < 3 \
             AND original_ext_source_id IN (1237645879551066262,1237645879578460255)"
        );
    }

    #[test]
    fn test_default_distance() {
        let request = CrossMatchRequest::new(IDS.to_vec()).unwrap();
        assert_eq!(request.max_angular_distance(), DEFAULT_MAX_ANGULAR_DISTANCE);
        assert!(request.to_adql().contains("angular_distance < 2 "));
    }

    #[test]
    fn test_typed_rejects_empty_and_negative() {
        assert!(matches!(
            CrossMatchRequest::new(vec![]),
            Err(AstroError::Validation(_))
        ));
        let err = CrossMatchRequest::new(vec![IDS[0], -IDS[0], IDS[1]]).unwrap_err();
        assert!(err.to_string().contains("cannot be negative"));
    }

    #[test]
    fn test_from_args_validation_order() {
        // nothing supplied
        let err = CrossMatchRequest::from_args(&[]).unwrap_err();
        assert!(err.to_string().contains("Missing required"));

        // empty list
        let err = CrossMatchRequest::from_args(&[json!([])]).unwrap_err();
        assert!(err.to_string().contains("Missing required"));

        // not a list
        let err = CrossMatchRequest::from_args(&[json!("1237645879551066262")]).unwrap_err();
        assert!(err.to_string().contains("must be a list"));

        // too many positional arguments, even with a negative id present
        let err = CrossMatchRequest::from_args(&[json!([1, -2]), json!(2.0), json!(3)]).unwrap_err();
        assert!(err.to_string().contains("Too many positional arguments"));

        // negative id
        let err = CrossMatchRequest::from_args(&[json!([IDS[0], -IDS[1]])]).unwrap_err();
        assert!(err.to_string().contains("cannot be negative"));
    }

    #[test]
    fn test_from_args_valid() {
        let request = CrossMatchRequest::from_args(&[json!(IDS), json!(5.0)]).unwrap();
        assert_eq!(request.spec_objids(), &IDS);
        assert_eq!(request.max_angular_distance(), 5.0);

        let request = CrossMatchRequest::from_args(&[json!(IDS)]).unwrap();
        assert_eq!(request.max_angular_distance(), DEFAULT_MAX_ANGULAR_DISTANCE);
    }
}
