//! Version diff engine: two configuration snapshots → field-level changes.
//!
//! Snapshots are flattened into dotted field paths (`businessRules.maxBatch`)
//! before comparison. Nested objects are walked; arrays, scalars and empty
//! objects are compared as whole values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::version::ConfigSnapshot;

/// Directional difference from one version to another. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCompareResult {
  /// Present only in the `to` snapshot.
  pub added_fields:    Vec<String>,
  /// Present in both with different values.
  pub modified_fields: Vec<String>,
  /// Present only in the `from` snapshot.
  pub removed_fields:  Vec<String>,
}

impl VersionCompareResult {
  /// Identical snapshots produce an empty result, which is not an error.
  pub fn is_empty(&self) -> bool {
    self.added_fields.is_empty()
      && self.modified_fields.is_empty()
      && self.removed_fields.is_empty()
  }
}

/// Compare `from` → `to`. Output vectors are sorted.
pub fn compare_snapshots(
  from: &ConfigSnapshot,
  to: &ConfigSnapshot,
) -> VersionCompareResult {
  let mut old = BTreeMap::new();
  let mut new = BTreeMap::new();
  flatten_into(None, from, &mut old);
  flatten_into(None, to, &mut new);

  let mut result = VersionCompareResult::default();

  for (path, value) in &new {
    match old.get(path) {
      None => result.added_fields.push(path.clone()),
      Some(previous) if previous != value => {
        result.modified_fields.push(path.clone())
      }
      Some(_) => {}
    }
  }

  result.removed_fields = old
    .keys()
    .filter(|path| !new.contains_key(*path))
    .cloned()
    .collect();

  result
}

fn flatten_into<'a>(
  prefix: Option<&str>,
  map: &'a ConfigSnapshot,
  out: &mut BTreeMap<String, &'a Value>,
) {
  for (key, value) in map {
    let path = match prefix {
      Some(p) => format!("{p}.{key}"),
      None => key.clone(),
    };
    match value {
      Value::Object(inner) if !inner.is_empty() => {
        flatten_into(Some(&path), inner, out)
      }
      leaf => {
        out.insert(path, leaf);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn snapshot(value: Value) -> ConfigSnapshot {
    match value {
      Value::Object(map) => map,
      other => panic!("not an object: {other}"),
    }
  }

  #[test]
  fn identical_snapshots_are_empty() {
    let a = snapshot(json!({ "productTypes": ["milk"], "businessRules": { "x": 1 } }));
    let result = compare_snapshots(&a, &a.clone());
    assert!(result.is_empty());
  }

  #[test]
  fn classifies_added_modified_removed() {
    let v1 = snapshot(json!({
      "productTypes":  ["milk"],
      "materials":     ["raw milk"],
      "businessRules": { "maxBatch": 100, "strict": true },
    }));
    let v2 = snapshot(json!({
      "productTypes":    ["milk", "yogurt"],
      "businessRules":   { "maxBatch": 100, "strict": false, "shelfDays": 7 },
      "conversionRates": { "kgPerLitre": 1.03 },
    }));

    let result = compare_snapshots(&v1, &v2);
    assert_eq!(
      result.added_fields,
      vec!["businessRules.shelfDays", "conversionRates.kgPerLitre"]
    );
    assert_eq!(result.modified_fields, vec!["businessRules.strict", "productTypes"]);
    assert_eq!(result.removed_fields, vec!["materials"]);
  }

  #[test]
  fn reversed_comparison_swaps_added_and_removed() {
    let v1 = snapshot(json!({ "materials": ["a"], "departments": ["qa"] }));
    let v2 = snapshot(json!({ "departments": ["qa", "ops"], "formTemplates": [] }));

    let forward = compare_snapshots(&v1, &v2);
    let backward = compare_snapshots(&v2, &v1);
    assert_eq!(forward.added_fields, backward.removed_fields);
    assert_eq!(forward.removed_fields, backward.added_fields);
    assert_eq!(forward.modified_fields, backward.modified_fields);
  }

  #[test]
  fn object_replaced_by_scalar_is_a_structural_change() {
    let v1 = snapshot(json!({ "rules": { "a": 1 } }));
    let v2 = snapshot(json!({ "rules": "off" }));
    let result = compare_snapshots(&v1, &v2);
    assert_eq!(result.added_fields, vec!["rules"]);
    assert_eq!(result.removed_fields, vec!["rules.a"]);
    assert!(result.modified_fields.is_empty());
  }
}
