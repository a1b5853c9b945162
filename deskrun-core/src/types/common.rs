use std::collections::BTreeMap;

/// Keys on a plan or step that are not part of the known shape.
///
/// Captured at parse time so validation can reject coordinate-like fields.
pub type Extensions = BTreeMap<String, serde_json::Value>;

/// Free-form metadata attached to an [`ActionResult`](super::ActionResult).
pub type Metadata = BTreeMap<String, serde_json::Value>;
