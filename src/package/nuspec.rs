//! Nuspec manifest parsing.
//!
//! A nuspec is the XML manifest inside every package describing its
//! identity, display metadata, and dependencies. Dependency version
//! ranges are carried as raw strings; range evaluation belongs to the
//! dependency resolver, not this crate.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::package::PackageIdentity;
use crate::version::{PackageVersion, VersionParseError};

/// Error reading a nuspec manifest.
#[derive(Debug, Error)]
pub enum NuspecError {
    /// The XML could not be parsed.
    #[error("malformed nuspec XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An attribute or text node could not be decoded.
    #[error("malformed nuspec content: {0}")]
    Content(String),

    /// The manifest has no package id.
    #[error("nuspec is missing the package id")]
    MissingId,

    /// The manifest has no package version.
    #[error("nuspec is missing the package version")]
    MissingVersion,

    /// The manifest version did not parse.
    #[error("invalid nuspec version '{value}'")]
    InvalidVersion {
        value: String,
        #[source]
        source: VersionParseError,
    },
}

/// One dependency edge: target package id plus its raw version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependency {
    /// Id of the package depended upon.
    pub id: String,
    /// Raw version range string, if any (e.g. `"[1.0.0, 2.0.0)"`).
    pub version_range: Option<String>,
}

/// A group of dependencies, optionally scoped to a target framework.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependencyGroup {
    /// Target framework moniker, `None` for the ungrouped form.
    pub target_framework: Option<String>,
    /// Dependencies within the group.
    pub dependencies: Vec<PackageDependency>,
}

/// Parsed nuspec manifest.
#[derive(Debug, Clone)]
pub struct Nuspec {
    id: String,
    version: PackageVersion,
    description: Option<String>,
    authors: Option<String>,
    tags: Option<String>,
    readme: Option<String>,
    dependency_groups: Vec<DependencyGroup>,
}

impl Nuspec {
    /// The package id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The package version.
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    /// The identity declared by this manifest.
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }

    /// Package description, if declared.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Author list, if declared.
    pub fn authors(&self) -> Option<&str> {
        self.authors.as_deref()
    }

    /// Space-separated tags, if declared.
    pub fn tags(&self) -> Option<&str> {
        self.tags.as_deref()
    }

    /// Package-relative path of the readme file, if declared.
    pub fn readme(&self) -> Option<&str> {
        self.readme.as_deref()
    }

    /// Dependency groups in declaration order.
    pub fn dependency_groups(&self) -> &[DependencyGroup] {
        &self.dependency_groups
    }
}

/// Parse a nuspec manifest from its XML text.
pub fn parse_nuspec(xml: &str) -> Result<Nuspec, NuspecError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut id: Option<String> = None;
    let mut version_text: Option<String> = None;
    let mut description: Option<String> = None;
    let mut authors: Option<String> = None;
    let mut tags: Option<String> = None;
    let mut readme: Option<String> = None;
    let mut groups: Vec<DependencyGroup> = Vec::new();
    // Index of the implicit group for <dependency> elements that appear
    // directly under <dependencies> with no <group> wrapper.
    let mut flat_group: Option<usize> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if name == "group" && in_dependencies(&stack) {
                    groups.push(DependencyGroup {
                        target_framework: attribute(&e, "targetFramework")?,
                        dependencies: Vec::new(),
                    });
                } else if name == "dependency" && in_dependencies(&stack) {
                    push_dependency(&e, &mut groups, &mut flat_group, &stack)?;
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if name == "dependency" && in_dependencies(&stack) {
                    push_dependency(&e, &mut groups, &mut flat_group, &stack)?;
                }
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| NuspecError::Content(e.to_string()))?
                    .trim()
                    .to_string();
                if text.is_empty() {
                    continue;
                }
                if let Some(field) = metadata_field(&stack) {
                    match field {
                        "id" => id = Some(text),
                        "version" => version_text = Some(text),
                        "description" => description = Some(text),
                        "authors" => authors = Some(text),
                        "tags" => tags = Some(text),
                        "readme" => readme = Some(text),
                        _ => {}
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let id = id.ok_or(NuspecError::MissingId)?;
    let version_text = version_text.ok_or(NuspecError::MissingVersion)?;
    let version =
        PackageVersion::parse(&version_text).map_err(|source| NuspecError::InvalidVersion {
            value: version_text.clone(),
            source,
        })?;

    Ok(Nuspec {
        id,
        version,
        description,
        authors,
        tags,
        readme,
        dependency_groups: groups,
    })
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, NuspecError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| NuspecError::Content(e.to_string()))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| NuspecError::Content(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn in_dependencies(stack: &[String]) -> bool {
    stack.iter().any(|n| n == "dependencies")
}

/// True when the parser is positioned on a direct metadata child,
/// returning the field name (`package/metadata/<field>`).
fn metadata_field(stack: &[String]) -> Option<&str> {
    if stack.len() == 3 && stack[1] == "metadata" {
        Some(stack[2].as_str())
    } else {
        None
    }
}

fn push_dependency(
    e: &BytesStart<'_>,
    groups: &mut Vec<DependencyGroup>,
    flat_group: &mut Option<usize>,
    stack: &[String],
) -> Result<(), NuspecError> {
    let Some(dep_id) = attribute(e, "id")? else {
        return Err(NuspecError::Content(
            "dependency element is missing an id attribute".to_string(),
        ));
    };
    let version_range = attribute(e, "version")?.filter(|v| !v.is_empty());

    let grouped = stack.last().map(|n| n == "group").unwrap_or(false);
    let index = if grouped {
        groups.len() - 1
    } else {
        match *flat_group {
            Some(index) => index,
            None => {
                groups.push(DependencyGroup::default());
                let index = groups.len() - 1;
                *flat_group = Some(index);
                index
            }
        }
    };

    groups[index].dependencies.push(PackageDependency {
        id: dep_id,
        version_range,
    });
    Ok(())
}
