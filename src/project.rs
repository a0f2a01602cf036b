//! Project metadata for a basin document

use serde::{Deserialize, Serialize};

/// Project metadata carried on a basin document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Project name
    pub name: String,

    /// Project description (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Geographic location (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Project author (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Creation timestamp, RFC 3339 (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Last modified timestamp, RFC 3339 (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl Project {
    /// Create minimal project metadata with just a name
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            location: None,
            author: None,
            created: None,
            modified: None,
        }
    }
}

/// Geographic location information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,

    /// Longitude in decimal degrees (-180 to 180)
    pub longitude: f64,

    /// Vertical datum (e.g., "NAVD88", "EGM2008")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_project() {
        let project = Project::named("Test Basin");
        assert_eq!(project.name, "Test Basin");
        assert!(project.description.is_none());
    }
}
