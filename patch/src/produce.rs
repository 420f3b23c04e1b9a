use serde_json::{Map, Value};

use crate::error::PatchApplyError;
use crate::patch::Patch;
use crate::path::PathSegment;

/// Derives `(nextValue, patches, inversePatches)` from `(baseValue, recipe)`.
///
/// Rust has no mutable-draft/proxy primitive, so the draft here is an owned
/// clone of `base`: `recipe` mutates that clone directly, and the before/after
/// trees are diffed afterward to derive both patch sequences in one pass.
/// `base` itself is never touched. If `recipe` makes no effective change, both
/// sequences come back empty and `nextValue` compares equal to `base` (callers
/// rely on this to skip empty mutations, using value- rather than
/// pointer-equality since there is no shared draft to compare by identity).
pub fn produce_with_patches<F>(base: &Value, recipe: F) -> (Value, Vec<Patch>, Vec<Patch>)
where
    F: FnOnce(&mut Value),
{
    let mut draft = base.clone();
    recipe(&mut draft);

    if draft == *base {
        return (draft, Vec::new(), Vec::new());
    }

    let mut patches = Vec::new();
    let mut inverse_patches = Vec::new();
    let mut path = Vec::new();
    diff_into(base, &draft, &mut path, &mut patches, &mut inverse_patches);

    (draft, patches, inverse_patches)
}

/// Pure diff entry point: compares `base` and `next` directly (without
/// running a recipe) and returns the same `(patches, inversePatches)` shape.
pub fn diff_values(base: &Value, next: &Value) -> (Vec<Patch>, Vec<Patch>) {
    let mut patches = Vec::new();
    let mut inverse_patches = Vec::new();
    let mut path = Vec::new();
    diff_into(base, next, &mut path, &mut patches, &mut inverse_patches);
    (patches, inverse_patches)
}

fn diff_into(
    base: &Value,
    next: &Value,
    path: &mut Vec<PathSegment>,
    patches: &mut Vec<Patch>,
    inverse_patches: &mut Vec<Patch>,
) {
    if base == next {
        return;
    }

    match (base, next) {
        (Value::Object(base_map), Value::Object(next_map)) => {
            diff_objects(base_map, next_map, path, patches, inverse_patches)
        }
        (Value::Array(base_arr), Value::Array(next_arr)) => {
            diff_arrays(base_arr, next_arr, path, patches, inverse_patches)
        }
        _ => {
            patches.push(Patch::Replace {
                path: path.clone(),
                value: next.clone(),
            });
            inverse_patches.push(Patch::Replace {
                path: path.clone(),
                value: base.clone(),
            });
        }
    }
}

fn diff_objects(
    base: &Map<String, Value>,
    next: &Map<String, Value>,
    path: &mut Vec<PathSegment>,
    patches: &mut Vec<Patch>,
    inverse_patches: &mut Vec<Patch>,
) {
    for (key, base_value) in base {
        path.push(PathSegment::Key(key.clone()));
        match next.get(key) {
            Some(next_value) => diff_into(base_value, next_value, path, patches, inverse_patches),
            None => {
                patches.push(Patch::Remove { path: path.clone() });
                inverse_patches.push(Patch::Add {
                    path: path.clone(),
                    value: base_value.clone(),
                });
            }
        }
        path.pop();
    }

    for (key, next_value) in next {
        if base.contains_key(key) {
            continue;
        }
        path.push(PathSegment::Key(key.clone()));
        patches.push(Patch::Add {
            path: path.clone(),
            value: next_value.clone(),
        });
        inverse_patches.push(Patch::Remove { path: path.clone() });
        path.pop();
    }
}

/// Array diffing only recognizes element-wise changes within the shared
/// prefix plus tail growth/shrinkage; an insertion or removal in the middle
/// of an array is represented as a run of element replacements rather than a
/// single splice. This keeps the model simple at the cost of a larger patch
/// set for that case.
fn diff_arrays(
    base: &[Value],
    next: &[Value],
    path: &mut Vec<PathSegment>,
    patches: &mut Vec<Patch>,
    inverse_patches: &mut Vec<Patch>,
) {
    let shared = base.len().min(next.len());

    for i in 0..shared {
        path.push(PathSegment::Index(i));
        diff_into(&base[i], &next[i], path, patches, inverse_patches);
        path.pop();
    }

    if next.len() > base.len() {
        for i in shared..next.len() {
            path.push(PathSegment::Index(i));
            patches.push(Patch::Add {
                path: path.clone(),
                value: next[i].clone(),
            });
            path.pop();
        }
        for i in (shared..next.len()).rev() {
            path.push(PathSegment::Index(i));
            inverse_patches.push(Patch::Remove { path: path.clone() });
            path.pop();
        }
    } else if base.len() > next.len() {
        for i in (shared..base.len()).rev() {
            path.push(PathSegment::Index(i));
            patches.push(Patch::Remove { path: path.clone() });
            path.pop();
        }
        for i in shared..base.len() {
            path.push(PathSegment::Index(i));
            inverse_patches.push(Patch::Add {
                path: path.clone(),
                value: base[i].clone(),
            });
            path.pop();
        }
    }
}

/// Applies a patch sequence to `value`, returning a new value. `value` is not
/// mutated; patches are applied against a clone in list order.
pub fn apply_patches(value: &Value, patches: &[Patch]) -> Result<Value, PatchApplyError> {
    let mut out = value.clone();
    for patch in patches {
        apply_one(&mut out, patch)?;
    }
    Ok(out)
}

fn apply_one(root: &mut Value, patch: &Patch) -> Result<(), PatchApplyError> {
    match patch {
        Patch::Add { path, value } => apply_add(root, path, value.clone()),
        Patch::Remove { path } => apply_remove(root, path),
        Patch::Replace { path, value } => apply_replace(root, path, value.clone()),
    }
}

fn apply_replace(root: &mut Value, path: &[PathSegment], value: Value) -> Result<(), PatchApplyError> {
    if path.is_empty() {
        *root = value;
        return Ok(());
    }
    let (parent, last) = navigate_parent(root, path)?;
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(key)) => {
            if !map.contains_key(key) {
                return Err(PatchApplyError::PathNotFound {
                    path: path.to_vec(),
                });
            }
            map.insert(key.clone(), value);
            Ok(())
        }
        (Value::Array(arr), PathSegment::Index(index)) => {
            let len = arr.len();
            let slot = arr.get_mut(*index).ok_or(PatchApplyError::IndexOutOfBounds {
                path: path.to_vec(),
                index: *index,
                len,
            })?;
            *slot = value;
            Ok(())
        }
        (parent, segment) => Err(shape_mismatch(path, parent, segment)),
    }
}

fn apply_add(root: &mut Value, path: &[PathSegment], value: Value) -> Result<(), PatchApplyError> {
    if path.is_empty() {
        *root = value;
        return Ok(());
    }
    let (parent, last) = navigate_parent(root, path)?;
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Value::Array(arr), PathSegment::Index(index)) => {
            if *index > arr.len() {
                return Err(PatchApplyError::IndexOutOfBounds {
                    path: path.to_vec(),
                    index: *index,
                    len: arr.len(),
                });
            }
            arr.insert(*index, value);
            Ok(())
        }
        (parent, segment) => Err(shape_mismatch(path, parent, segment)),
    }
}

fn apply_remove(root: &mut Value, path: &[PathSegment]) -> Result<(), PatchApplyError> {
    if path.is_empty() {
        *root = Value::Null;
        return Ok(());
    }
    let (parent, last) = navigate_parent(root, path)?;
    match (parent, last) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.remove(key).ok_or_else(|| PatchApplyError::PathNotFound {
                path: path.to_vec(),
            })?;
            Ok(())
        }
        (Value::Array(arr), PathSegment::Index(index)) => {
            if *index >= arr.len() {
                return Err(PatchApplyError::IndexOutOfBounds {
                    path: path.to_vec(),
                    index: *index,
                    len: arr.len(),
                });
            }
            arr.remove(*index);
            Ok(())
        }
        (parent, segment) => Err(shape_mismatch(path, parent, segment)),
    }
}

/// Walks `path[..path.len()-1]`, returning a mutable reference to the
/// container that should hold `path.last()` plus that last segment.
fn navigate_parent<'v>(
    root: &'v mut Value,
    path: &[PathSegment],
) -> Result<(&'v mut Value, &'v PathSegment), PatchApplyError> {
    let (last, prefix) = path.split_last().expect("path is non-empty");

    let mut current = root;
    for segment in prefix {
        current = match (current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => {
                map.get_mut(key).ok_or_else(|| PatchApplyError::PathNotFound {
                    path: path.to_vec(),
                })?
            }
            (Value::Array(arr), PathSegment::Index(index)) => {
                let len = arr.len();
                arr.get_mut(*index).ok_or(PatchApplyError::IndexOutOfBounds {
                    path: path.to_vec(),
                    index: *index,
                    len,
                })?
            }
            (value, segment) => return Err(shape_mismatch(path, value, segment)),
        };
    }

    Ok((current, last))
}

fn shape_mismatch(path: &[PathSegment], parent: &Value, segment: &PathSegment) -> PatchApplyError {
    let expected = match segment {
        PathSegment::Key(_) => "object",
        PathSegment::Index(_) => "array",
    };
    let found = match parent {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
    };
    PatchApplyError::ShapeMismatch {
        path: path.to_vec(),
        expected,
        found,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_recipe_yields_no_patches() {
        let base = json!({"a": 1});
        let (next, patches, inverse) = produce_with_patches(&base, |_| {});
        assert_eq!(next, base);
        assert!(patches.is_empty());
        assert!(inverse.is_empty());
    }

    #[test]
    fn scalar_replace_roundtrips() {
        let base = json!({"tasks": {"t1": {"title": "A", "status": "todo"}}});
        let (next, patches, inverse) = produce_with_patches(&base, |v| {
            v["tasks"]["t1"]["title"] = json!("B");
        });
        assert_eq!(next["tasks"]["t1"]["title"], json!("B"));
        assert_eq!(patches.len(), 1);
        assert_eq!(inverse.len(), 1);

        let forward = apply_patches(&base, &patches).unwrap();
        assert_eq!(forward, next);

        let back = apply_patches(&forward, &inverse).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn add_new_object_key_and_invert() {
        let base = json!({"tasks": {}});
        let (next, patches, inverse) = produce_with_patches(&base, |v| {
            v["tasks"]["t3"] = json!({"title": "C"});
        });
        let forward = apply_patches(&base, &patches).unwrap();
        assert_eq!(forward, next);
        let back = apply_patches(&forward, &inverse).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn remove_object_key_and_invert() {
        let base = json!({"tasks": {"t1": {"title": "A"}}});
        let (next, patches, inverse) = produce_with_patches(&base, |v| {
            v["tasks"].as_object_mut().unwrap().remove("t1");
        });
        let forward = apply_patches(&base, &patches).unwrap();
        assert_eq!(forward, next);
        let back = apply_patches(&forward, &inverse).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn array_append_and_invert() {
        let base = json!({"items": [1, 2]});
        let (next, patches, inverse) = produce_with_patches(&base, |v| {
            v["items"].as_array_mut().unwrap().push(json!(3));
        });
        let forward = apply_patches(&base, &patches).unwrap();
        assert_eq!(forward, next);
        let back = apply_patches(&forward, &inverse).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn array_truncate_and_invert() {
        let base = json!({"items": [1, 2, 3]});
        let (next, patches, inverse) = produce_with_patches(&base, |v| {
            v["items"].as_array_mut().unwrap().pop();
        });
        let forward = apply_patches(&base, &patches).unwrap();
        assert_eq!(forward, next);
        let back = apply_patches(&forward, &inverse).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn apply_patches_fails_on_missing_path() {
        let base = json!({"tasks": {}});
        let patches = vec![Patch::Replace {
            path: vec![PathSegment::Key("tasks".into()), PathSegment::Key("t1".into())],
            value: json!("x"),
        }];
        let err = apply_patches(&base, &patches).unwrap_err();
        assert!(matches!(err, PatchApplyError::PathNotFound { .. }));
    }

    #[test]
    fn apply_patches_fails_on_shape_mismatch() {
        let base = json!({"tasks": "not-an-object"});
        let patches = vec![Patch::Replace {
            path: vec![PathSegment::Key("tasks".into()), PathSegment::Key("t1".into())],
            value: json!("x"),
        }];
        let err = apply_patches(&base, &patches).unwrap_err();
        assert!(matches!(err, PatchApplyError::ShapeMismatch { .. }));
    }
}
