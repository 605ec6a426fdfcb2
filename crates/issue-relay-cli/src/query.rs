use crate::config::{Config, CriteriaField};

pub const ISSUE_NODE_TYPE: &str = "project_issue";
pub const SORT_DIRECTION: &str = "DESC";
/// drupal.org stores issue tag terms in this vocabulary field.
pub const ISSUE_TAG_FIELD: &str = "taxonomy_vocabulary_9";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub node_type: &'static str,
    pub direction: &'static str,
    pub sort: Option<String>,
    pub field_project: Option<String>,
    pub issue_tag: Option<String>,
}

impl QueryParams {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("type".to_string(), self.node_type.to_string()),
            ("direction".to_string(), self.direction.to_string()),
        ];

        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort.clone()));
        }
        if let Some(project) = &self.field_project {
            pairs.push(("field_project".to_string(), project.clone()));
        }
        if let Some(tag) = &self.issue_tag {
            pairs.push((ISSUE_TAG_FIELD.to_string(), tag.clone()));
        }

        pairs
    }
}

pub fn build_params(config: &Config) -> QueryParams {
    QueryParams {
        node_type: ISSUE_NODE_TYPE,
        direction: SORT_DIRECTION,
        sort: sort_field(&config.criteria),
        field_project: Some(config.project.trim())
            .filter(|project| !project.is_empty())
            .map(ToOwned::to_owned),
        issue_tag: config.issue_tag.clone(),
    }
}

/// Maps the criteria field to the API `sort` parameter.
///
/// Values are forwarded verbatim, including unrecognized ones. An allow-list
/// belongs here if the API ever starts rejecting unknown sort keys.
pub fn sort_field(criteria: &CriteriaField) -> Option<String> {
    let value = criteria.as_str();
    (!value.is_empty()).then(|| value.to_string())
}
