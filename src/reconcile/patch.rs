use serde_json::{Map, Value};

/// Dotted address of a key inside a JSON object, e.g. `providers.anthropic.apiKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let segments: Vec<String> = raw.split('.').map(|s| s.trim().to_string()).collect();
        if segments.iter().any(String::is_empty) {
            return Err(format!("key path `{raw}` has an empty segment"));
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Assign `value` to the key at `path`, leaving siblings alone.
    Set { path: KeyPath, value: Value },
    /// Merge `element` into the array at `path`, matching on `id_field`.
    Upsert {
        path: KeyPath,
        id_field: String,
        element: Map<String, Value>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    ops: Vec<PatchOp>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: KeyPath, value: impl Into<Value>) -> Self {
        self.ops.push(PatchOp::Set {
            path,
            value: value.into(),
        });
        self
    }

    pub fn upsert(mut self, path: KeyPath, id_field: impl Into<String>, element: Map<String, Value>) -> Self {
        self.ops.push(PatchOp::Upsert {
            path,
            id_field: id_field.into(),
            element,
        });
        self
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The existing document has a non-object or non-array where the patch
    /// needs to descend or append.
    Shape(String),
    /// The patch itself is unusable.
    Invalid(String),
}

pub fn apply_patch(document: &mut Map<String, Value>, patch: &ConfigPatch) -> Result<(), PatchError> {
    for op in patch.ops() {
        match op {
            PatchOp::Set { path, value } => {
                let (parent, key) = descend(document, path)?;
                parent.insert(key.to_string(), value.clone());
            }
            PatchOp::Upsert {
                path,
                id_field,
                element,
            } => upsert(document, path, id_field, element)?,
        }
    }
    Ok(())
}

/// Walks to the object holding the last segment of `path`, creating missing
/// intermediate objects.
fn descend<'a>(
    document: &'a mut Map<String, Value>,
    path: &'a KeyPath,
) -> Result<(&'a mut Map<String, Value>, &'a str), PatchError> {
    let (last, parents) = path
        .segments()
        .split_last()
        .ok_or_else(|| PatchError::Invalid("key path is empty".to_string()))?;

    let mut current = document;
    let mut walked: Vec<&str> = Vec::new();
    for segment in parents {
        walked.push(segment);
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = entry.as_object_mut().ok_or_else(|| {
            PatchError::Shape(format!("`{}` is not an object", walked.join(".")))
        })?;
    }
    Ok((current, last.as_str()))
}

fn upsert(
    document: &mut Map<String, Value>,
    path: &KeyPath,
    id_field: &str,
    element: &Map<String, Value>,
) -> Result<(), PatchError> {
    let id = element.get(id_field).ok_or_else(|| {
        PatchError::Invalid(format!(
            "element for `{path}` is missing identifying field `{id_field}`"
        ))
    })?;

    let (parent, key) = descend(document, path)?;
    let array = parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| PatchError::Shape(format!("`{path}` is not an array")))?;

    let existing = array
        .iter_mut()
        .filter_map(Value::as_object_mut)
        .find(|candidate| candidate.get(id_field) == Some(id));
    match existing {
        Some(target) => {
            for (field, value) in element {
                target.insert(field.clone(), value.clone());
            }
        }
        None => array.push(Value::Object(element.clone())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn path(raw: &str) -> KeyPath {
        KeyPath::parse(raw).expect("key path")
    }

    #[test]
    fn key_path_rejects_empty_segments() {
        assert!(KeyPath::parse("a..b").is_err());
        assert!(KeyPath::parse("").is_err());
        assert_eq!(path("a.b").segments(), ["a", "b"]);
    }

    #[test]
    fn set_creates_intermediate_objects_and_keeps_siblings() {
        let mut doc = object(json!({"providers": {"openai": {"apiKey": "o"}}}));
        let patch = ConfigPatch::new().set(path("providers.anthropic.apiKey"), "a");
        apply_patch(&mut doc, &patch).expect("apply");
        assert_eq!(
            Value::Object(doc),
            json!({"providers": {"openai": {"apiKey": "o"}, "anthropic": {"apiKey": "a"}}})
        );
    }

    #[test]
    fn set_through_scalar_is_a_shape_error() {
        let mut doc = object(json!({"providers": "none"}));
        let patch = ConfigPatch::new().set(path("providers.anthropic"), "a");
        let err = apply_patch(&mut doc, &patch).expect_err("shape");
        assert_eq!(err, PatchError::Shape("`providers` is not an object".to_string()));
    }

    #[test]
    fn upsert_merges_matching_element_in_place() {
        let mut doc = object(json!({"models": [
            {"id": "m1", "name": "old", "extra": true},
            {"id": "m2"}
        ]}));
        let patch = ConfigPatch::new().upsert(
            path("models"),
            "id",
            object(json!({"id": "m1", "name": "new"})),
        );
        apply_patch(&mut doc, &patch).expect("apply");
        assert_eq!(
            Value::Object(doc),
            json!({"models": [
                {"id": "m1", "name": "new", "extra": true},
                {"id": "m2"}
            ]})
        );
    }

    #[test]
    fn upsert_without_id_field_is_invalid() {
        let mut doc = Map::new();
        let patch = ConfigPatch::new().upsert(path("models"), "id", object(json!({"name": "x"})));
        assert!(matches!(
            apply_patch(&mut doc, &patch),
            Err(PatchError::Invalid(_))
        ));
    }
}
