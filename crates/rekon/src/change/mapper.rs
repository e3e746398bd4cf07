//! Identity and value projections used by the change computer.

use serde_json::Value;

use crate::model::Resource;

/// Maps a resource to its identity key within one resource type.
pub trait KeyMapper: Send + Sync {
    fn key(&self, resource: &Resource) -> String;
}

/// Maps a resource to the comparable value the diff runs on.
pub trait ValueMapper: Send + Sync {
    fn value(&self, resource: &Resource) -> Value;
}

/// Keys resources by `metadata.name`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameKeyMapper;

impl KeyMapper for NameKeyMapper {
    fn key(&self, resource: &Resource) -> String {
        resource.metadata.name.clone()
    }
}

/// Compares resources by their `spec`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecValueMapper;

impl ValueMapper for SpecValueMapper {
    fn value(&self, resource: &Resource) -> Value {
        resource.spec.clone()
    }
}

pub struct KeyFn<F>(F);

impl<F> KeyMapper for KeyFn<F>
where
    F: Fn(&Resource) -> String + Send + Sync,
{
    fn key(&self, resource: &Resource) -> String {
        (self.0)(resource)
    }
}

pub struct ValueFn<F>(F);

impl<F> ValueMapper for ValueFn<F>
where
    F: Fn(&Resource) -> Value + Send + Sync,
{
    fn value(&self, resource: &Resource) -> Value {
        (self.0)(resource)
    }
}

/// Adapts a closure into a [`KeyMapper`].
pub fn key_fn<F>(f: F) -> KeyFn<F>
where
    F: Fn(&Resource) -> String + Send + Sync,
{
    KeyFn(f)
}

/// Adapts a closure into a [`ValueMapper`].
pub fn value_fn<F>(f: F) -> ValueFn<F>
where
    F: Fn(&Resource) -> Value + Send + Sync,
{
    ValueFn(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceType;
    use serde_json::json;

    #[test]
    fn test_closure_mappers() {
        let acl = Resource::new(
            &ResourceType::new("kafka.rekon.io", "v1", "Acl"),
            "ignored",
            json!({"principal": "User:alice", "operation": "READ", "comment": "x"}),
        );

        let key = key_fn(|r: &Resource| {
            format!(
                "{}:{}",
                r.spec["principal"].as_str().unwrap_or_default(),
                r.spec["operation"].as_str().unwrap_or_default()
            )
        });
        assert_eq!(key.key(&acl), "User:alice:READ");

        let value = value_fn(|r: &Resource| json!({ "operation": r.spec["operation"] }));
        assert_eq!(value.value(&acl), json!({"operation": "READ"}));

        assert_eq!(NameKeyMapper.key(&acl), "ignored");
        assert_eq!(SpecValueMapper.value(&acl)["comment"], json!("x"));
    }
}
