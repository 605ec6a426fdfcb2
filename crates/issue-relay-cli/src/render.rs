use std::path::Path;

use crate::config::{Config, ConfigError, read_file};
use crate::model::Item;
use crate::template;

pub const DEFAULT_BODY_TEMPLATE: &str = include_str!("../templates/message.html");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Reads the body template from `path`, or returns the built-in one.
///
/// A custom template is rejected when it uses partials, delimiter changes or
/// unbalanced sections.
pub fn load_body_template(path: Option<&Path>) -> Result<String, ConfigError> {
    let Some(path) = path else {
        return Ok(DEFAULT_BODY_TEMPLATE.to_string());
    };

    let body_template = read_file(path)?;
    template::validate(&body_template).map_err(|error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    Ok(body_template)
}

pub fn issue_tags(item: &Item) -> String {
    item.tag_ids.join(", ")
}

pub fn render_subject(item: &Item, config: &Config) -> String {
    let tags = issue_tags(item);
    template::render(
        &config.subject,
        &[
            ("title", item.title.as_str()),
            ("project", project_id(item, config)),
            ("issue_tags", tags.as_str()),
        ],
    )
}

pub fn render_body(item: &Item, config: &Config, body_template: &str) -> String {
    let tags = issue_tags(item);
    template::render(
        body_template,
        &[
            ("title", item.title.as_str()),
            ("url", item.url.as_str()),
            ("body", item.body_html.as_str()),
            ("project", project_id(item, config)),
            ("issue_tags", tags.as_str()),
        ],
    )
}

pub fn render_message(item: &Item, config: &Config, body_template: &str) -> RenderedMessage {
    RenderedMessage {
        subject: render_subject(item, config),
        body: render_body(item, config, body_template),
    }
}

// Nodes without a project reference fall back to the queried project.
fn project_id<'a>(item: &'a Item, config: &'a Config) -> &'a str {
    if item.project_id.is_empty() {
        &config.project
    } else {
        &item.project_id
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{CriteriaField, DEFAULT_SUBJECT};

    use super::*;

    fn fixture_config(subject: &str) -> Config {
        Config {
            provider: "mailgun".to_string(),
            subject: subject.to_string(),
            criteria: CriteriaField::Created,
            window_minutes: 10.0,
            project: "3060".to_string(),
            from: "relay@example.com".to_string(),
            to: "team@example.com".to_string(),
            issue_tag: None,
        }
    }

    fn fixture_item() -> Item {
        Item {
            nid: "3412345".to_string(),
            title: "Bug X".to_string(),
            url: "https://www.drupal.org/project/drupal/issues/3412345".to_string(),
            body_html: "<p>Steps to reproduce</p>".to_string(),
            created: "1760000000".to_string(),
            changed: "1760000000".to_string(),
            project_id: "3060".to_string(),
            tag_ids: vec!["123".to_string(), "456".to_string()],
        }
    }

    #[test]
    fn render_issue_tags_join_in_source_order() {
        assert_eq!(issue_tags(&fixture_item()), "123, 456");

        let untagged = Item {
            tag_ids: Vec::new(),
            ..fixture_item()
        };
        assert_eq!(issue_tags(&untagged), "");
    }

    #[test]
    fn render_subject_interpolates_title() {
        let subject = render_subject(&fixture_item(), &fixture_config("Issue: {{ title }}"));

        assert_eq!(subject, "Issue: Bug X");
    }

    #[test]
    fn render_default_subject_includes_project_and_tags() {
        let subject = render_subject(&fixture_item(), &fixture_config(DEFAULT_SUBJECT));

        assert_eq!(
            subject,
            "Drupal Issue - Project: 3060 - Title: Bug X - Issue Tags: 123, 456"
        );
    }

    #[test]
    fn render_default_body_keeps_issue_html_raw() {
        let body = render_body(
            &fixture_item(),
            &fixture_config(DEFAULT_SUBJECT),
            DEFAULT_BODY_TEMPLATE,
        );

        assert!(body.contains("<div><p>Steps to reproduce</p></div>"));
        assert!(body.contains("Issue tags: 123, 456"));
        assert!(body.contains(
            "href=\"https:&#x2F;&#x2F;www.drupal.org&#x2F;project&#x2F;drupal&#x2F;issues&#x2F;3412345\""
        ));
    }

    #[test]
    fn render_body_falls_back_to_configured_project() {
        let item = Item {
            project_id: String::new(),
            ..fixture_item()
        };

        let body = render_body(&item, &fixture_config("x"), "{{ project }}");

        assert_eq!(body, "3060");
    }

    #[test]
    fn render_message_builds_subject_and_body_together() {
        let message = render_message(
            &fixture_item(),
            &fixture_config("{{ title }}"),
            "{{{ body }}}",
        );

        assert_eq!(
            message,
            RenderedMessage {
                subject: "Bug X".to_string(),
                body: "<p>Steps to reproduce</p>".to_string(),
            }
        );
    }

    #[test]
    fn render_load_body_template_reads_file_or_default() {
        let temp = tempfile::tempdir().expect("create tempdir");
        let path = temp.path().join("message.html");
        std::fs::write(&path, "<b>{{ title }}</b>").expect("write template");

        assert_eq!(
            load_body_template(Some(&path)).expect("template should load"),
            "<b>{{ title }}</b>"
        );
        assert_eq!(
            load_body_template(None).expect("default template"),
            DEFAULT_BODY_TEMPLATE
        );
        assert!(matches!(
            load_body_template(Some(&temp.path().join("missing.html"))),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn render_load_body_template_rejects_unbalanced_sections() {
        let temp = tempfile::tempdir().expect("create tempdir");
        let path = temp.path().join("message.html");
        std::fs::write(&path, "{{# issue_tags }}Tags: {{ issue_tags }}").expect("write template");

        let err = load_body_template(Some(&path)).expect_err("template should be rejected");

        assert_eq!(
            err,
            ConfigError::Parse {
                path: path.clone(),
                message: "unclosed section \"issue_tags\"".to_string(),
            }
        );
        assert_eq!(template::validate(DEFAULT_BODY_TEMPLATE), Ok(()));
    }

    #[test]
    fn render_body_sections_follow_tag_presence() {
        let body_template =
            "{{#issue_tags}}Tags: {{issue_tags}}{{/issue_tags}}{{^issue_tags}}No tags{{/issue_tags}}";
        let untagged = Item {
            tag_ids: Vec::new(),
            ..fixture_item()
        };

        assert_eq!(
            render_body(&fixture_item(), &fixture_config("x"), body_template),
            "Tags: 123, 456"
        );
        assert_eq!(
            render_body(&untagged, &fixture_config("x"), body_template),
            "No tags"
        );
    }
}
