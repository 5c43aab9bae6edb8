use crate::domain::{
    entities::{GeneratedProject, PackDescriptor, ProjectDescriptor},
    error::DomainError,
    template::is_property_path,
};

/// Centralized domain validation.
///
/// Entities check their own structure; this adds the request-level rules
/// and gives services one place to call.
pub struct DomainValidator;

impl DomainValidator {
    /// A project needs a usable name and at least one pack.
    pub fn validate_descriptor(descriptor: &ProjectDescriptor) -> Result<(), DomainError> {
        let name = descriptor.name.trim();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(DomainError::InvalidPropertyValue {
                name: "project.name".into(),
                value: descriptor.name.clone(),
                expected: "a non-empty name without path separators".into(),
            });
        }
        if descriptor.packs.is_empty() {
            return Err(DomainError::InvalidPropertyValue {
                name: "packs".into(),
                value: String::new(),
                expected: "at least one pack id".into(),
            });
        }
        if let Some(bad) = descriptor.properties.keys().find(|k| !is_property_path(k)) {
            return Err(DomainError::InvalidPropertyValue {
                name: bad.clone(),
                value: descriptor.properties[bad].clone(),
                expected: "a dotted property name".into(),
            });
        }
        Ok(())
    }

    pub fn validate_pack(pack: &PackDescriptor) -> Result<(), DomainError> {
        pack.validate()
    }

    pub fn validate_generated(project: &GeneratedProject) -> Result<(), DomainError> {
        project.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PackId;

    fn descriptor(name: &str) -> ProjectDescriptor {
        ProjectDescriptor::new(name, "org.example").with_pack(PackId::new("g", "n"))
    }

    #[test]
    fn accepts_a_plain_request() {
        assert!(DomainValidator::validate_descriptor(&descriptor("demo")).is_ok());
    }

    #[test]
    fn rejects_unusable_names() {
        for name in ["", "  ", "..", "a/b", "a\\b"] {
            assert!(
                DomainValidator::validate_descriptor(&descriptor(name)).is_err(),
                "accepted {name:?}"
            );
        }
    }

    #[test]
    fn requires_packs_and_valid_override_names() {
        let empty = ProjectDescriptor::new("demo", "g");
        assert!(DomainValidator::validate_descriptor(&empty).is_err());

        let bad = descriptor("demo").with_property("not valid", "x");
        assert!(matches!(
            DomainValidator::validate_descriptor(&bad),
            Err(DomainError::InvalidPropertyValue { name, .. }) if name == "not valid"
        ));
    }
}
