use crate::domain::errors::{DomainError, Result};

const NAME_PLACEHOLDER: &str = "{name}";

/// Name-parameterized topic patterns for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct TopicTemplates {
    status: String,
    motion: String,
    picture: String,
    control: String,
}

impl TopicTemplates {
    pub fn new(status: String, motion: String, picture: String, control: String) -> Result<Self> {
        for template in [&status, &motion, &picture, &control] {
            Self::validate(template)?;
        }

        Ok(Self {
            status,
            motion,
            picture,
            control,
        })
    }

    /// Templates of the form `<prefix>/<kind>/{name}`
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            status: format!("{}/status/{}", prefix, NAME_PLACEHOLDER),
            motion: format!("{}/motion/{}", prefix, NAME_PLACEHOLDER),
            picture: format!("{}/picture/{}", prefix, NAME_PLACEHOLDER),
            control: format!("{}/control/{}", prefix, NAME_PLACEHOLDER),
        }
    }

    pub fn status(&self, name: &str) -> String {
        self.status.replace(NAME_PLACEHOLDER, name)
    }

    pub fn motion(&self, name: &str) -> String {
        self.motion.replace(NAME_PLACEHOLDER, name)
    }

    pub fn picture(&self, name: &str) -> String {
        self.picture.replace(NAME_PLACEHOLDER, name)
    }

    pub fn control(&self, name: &str) -> String {
        self.control.replace(NAME_PLACEHOLDER, name)
    }

    fn validate(template: &str) -> Result<()> {
        if !template.contains(NAME_PLACEHOLDER) {
            return Err(DomainError::InvalidTopicTemplate(template.to_string()));
        }
        Ok(())
    }
}

impl Default for TopicTemplates {
    fn default() -> Self {
        Self::with_prefix("arlo")
    }
}
