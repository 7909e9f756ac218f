use std::collections::{BTreeMap, BTreeSet};

use crate::value::MappingNode;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Calls needed to move a resource's tags to the desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    /// Every desired tag. Unchanged tags are resent; setting a tag is
    /// idempotent.
    pub to_add: BTreeMap<String, String>,
    /// Keys on the resource that are not desired, sorted.
    pub to_remove: Vec<String>,
}

impl TagChanges {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

pub fn reconcile_tags(desired: &[Tag], current: &[Tag]) -> TagChanges {
    let to_add: BTreeMap<String, String> = desired
        .iter()
        .map(|tag| (tag.key.clone(), tag.value.clone()))
        .collect();
    let to_remove = current
        .iter()
        .filter(|tag| !to_add.contains_key(&tag.key))
        .map(|tag| tag.key.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    TagChanges { to_add, to_remove }
}

/// Reads tags from an `Items` node of `{key, value}` fields. Items without
/// a string key and value are skipped.
pub fn tags_from_node(node: Option<&MappingNode>) -> Vec<Tag> {
    node.and_then(MappingNode::as_items)
        .unwrap_or_default()
        .iter()
        .filter_map(|item| {
            let key = item.field("key")?.as_str()?;
            let value = item.field("value")?.as_str()?;
            Some(Tag::new(key, value))
        })
        .collect()
}

/// Tags as an `Items` node of `{key, value}` fields, sorted by key.
pub fn tags_to_node<'a>(tags: impl IntoIterator<Item = (&'a String, &'a String)>) -> MappingNode {
    let sorted: BTreeMap<_, _> = tags.into_iter().collect();
    MappingNode::items(sorted.into_iter().map(|(key, value)| {
        MappingNode::fields([
            ("key", MappingNode::string(key.as_str())),
            ("value", MappingNode::string(value.as_str())),
        ])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changed_value_and_new_key() {
        let current = vec![Tag::new("Env", "prod")];
        let desired = vec![Tag::new("Env", "test"), Tag::new("Project", "x")];

        let changes = reconcile_tags(&desired, &current);

        assert_eq!(
            changes.to_add,
            BTreeMap::from([
                ("Env".to_string(), "test".to_string()),
                ("Project".to_string(), "x".to_string()),
            ])
        );
        assert!(changes.to_remove.is_empty());
    }

    #[test]
    fn test_removed_keys() {
        let current = vec![
            Tag::new("Team", "a"),
            Tag::new("Env", "prod"),
            Tag::new("Owner", "b"),
        ];
        let desired = vec![Tag::new("Env", "prod")];

        let changes = reconcile_tags(&desired, &current);

        assert_eq!(changes.to_remove, vec!["Owner".to_string(), "Team".to_string()]);
        assert_eq!(changes.to_add.len(), 1);
    }

    #[test]
    fn test_against_itself() {
        let tags = vec![Tag::new("A", "1"), Tag::new("B", "2")];
        let changes = reconcile_tags(&tags, &tags);
        assert_eq!(changes.to_add.len(), 2);
        assert!(changes.to_remove.is_empty());
    }

    #[test]
    fn test_order_independent() {
        let desired = vec![Tag::new("A", "1"), Tag::new("B", "2")];
        let current = vec![Tag::new("C", "3"), Tag::new("D", "4"), Tag::new("A", "0")];
        let mut desired_rev = desired.clone();
        desired_rev.reverse();
        let mut current_rev = current.clone();
        current_rev.reverse();

        assert_eq!(
            reconcile_tags(&desired, &current),
            reconcile_tags(&desired_rev, &current_rev)
        );
    }

    #[test]
    fn test_empty_desired_removes_everything() {
        let current = vec![Tag::new("A", "1")];
        let changes = reconcile_tags(&[], &current);
        assert!(changes.to_add.is_empty());
        assert_eq!(changes.to_remove, vec!["A".to_string()]);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_node_conversion() {
        let node = MappingNode::from(json!([
            {"key": "Env", "value": "prod"},
            {"key": "Broken"},
            {"key": "Team", "value": "core"}
        ]));
        let tags = tags_from_node(Some(&node));
        assert_eq!(tags, vec![Tag::new("Env", "prod"), Tag::new("Team", "core")]);
        assert!(tags_from_node(None).is_empty());

        let map = BTreeMap::from([
            ("Team".to_string(), "core".to_string()),
            ("Env".to_string(), "prod".to_string()),
        ]);
        assert_eq!(
            tags_to_node(&map),
            MappingNode::from(json!([
                {"key": "Env", "value": "prod"},
                {"key": "Team", "value": "core"}
            ]))
        );
    }
}
