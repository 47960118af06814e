//! XML fragment templates.
//!
//! Fragments are compiled into the binary and can be replaced one by one from
//! a directory of `<Name>.xml` files. Placeholders are written `${NAME}`;
//! `$$` renders a literal `$`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::debug;

use crate::error::{Result, XmlError};

const BUILTIN: &[(&str, &str)] = &[
    ("Document", include_str!("../templates/Document.xml")),
    ("Engineering", include_str!("../templates/Engineering.xml")),
    ("Block", include_str!("../templates/Block.xml")),
    ("ObjectList", include_str!("../templates/ObjectList.xml")),
    ("EmptyObjectList", include_str!("../templates/EmptyObjectList.xml")),
    ("Attribute", include_str!("../templates/Attribute.xml")),
    ("EmptyAttribute", include_str!("../templates/EmptyAttribute.xml")),
    ("Interface", include_str!("../templates/Interface.xml")),
    ("Section", include_str!("../templates/Section.xml")),
    ("EmptySection", include_str!("../templates/EmptySection.xml")),
    ("Member", include_str!("../templates/Member.xml")),
    ("SetPointMember", include_str!("../templates/SetPointMember.xml")),
    ("CompileUnit", include_str!("../templates/CompileUnit.xml")),
    ("Call", include_str!("../templates/Call.xml")),
    ("Instance", include_str!("../templates/Instance.xml")),
    ("Parameter", include_str!("../templates/Parameter.xml")),
    ("PowerRailWire", include_str!("../templates/PowerRailWire.xml")),
    ("ChainWire", include_str!("../templates/ChainWire.xml")),
    ("ParameterWire", include_str!("../templates/ParameterWire.xml")),
    ("Title", include_str!("../templates/Title.xml")),
];

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Dollar,
    Placeholder(&'a str),
}

fn tokenize<'a>(template: &str, text: &'a str) -> Result<Vec<Token<'a>>> {
    let malformed = |detail: &str| XmlError::MalformedTemplate {
        template: template.to_string(),
        detail: detail.to_string(),
    };

    let mut tokens = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        if pos > 0 {
            tokens.push(Token::Literal(&rest[..pos]));
        }
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            tokens.push(Token::Dollar);
            rest = tail;
        } else if let Some(tail) = after.strip_prefix('{') {
            let end = tail.find('}').ok_or_else(|| malformed("unterminated placeholder"))?;
            let key = &tail[..end];
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_') {
                return Err(malformed(&format!("invalid placeholder name '{key}'")));
            }
            tokens.push(Token::Placeholder(key));
            rest = &tail[end + 1..];
        } else {
            tokens.push(Token::Dollar);
            rest = after;
        }
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest));
    }
    Ok(tokens)
}

fn placeholders(template: &str, text: &str) -> Result<BTreeSet<String>> {
    Ok(tokenize(template, text)?
        .into_iter()
        .filter_map(|t| match t {
            Token::Placeholder(key) => Some(key.to_string()),
            _ => None,
        })
        .collect())
}

/// The set of fragments used by the encoder, loaded once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    templates: BTreeMap<String, String>,
}

impl TemplateSet {
    /// Fragments compiled into the binary.
    pub fn builtin() -> Self {
        TemplateSet {
            templates: BUILTIN
                .iter()
                .map(|(name, text)| (name.to_string(), text.to_string()))
                .collect(),
        }
    }

    /// Builtin fragments with the overrides found in `dir` applied.
    pub fn with_overrides(dir: &Path) -> Result<Self> {
        let mut set = Self::builtin();
        set.load_overrides(dir)?;
        Ok(set)
    }

    /// Replace fragments by the `*.xml` files of `dir`, keyed by file stem.
    ///
    /// An override may drop placeholders of the builtin fragment but not
    /// introduce new ones. Returns the number of replaced fragments.
    pub fn load_overrides(&mut self, dir: &Path) -> Result<usize> {
        let io_err = |source| XmlError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "xml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut replaced = 0;
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let allowed = placeholders(&name, self.get(&name)?)?;
            let text = fs::read_to_string(&path).map_err(|source| XmlError::Io {
                path: path.clone(),
                source,
            })?;
            if let Some(unknown) = placeholders(&name, &text)?.into_iter().find(|p| !allowed.contains(p)) {
                return Err(XmlError::UnknownPlaceholder {
                    template: name,
                    placeholder: unknown,
                });
            }
            debug!("template '{name}' overridden from {}", path.display());
            self.templates.insert(name, text);
            replaced += 1;
        }
        Ok(replaced)
    }

    pub fn get(&self, name: &str) -> Result<&str> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| XmlError::UnknownTemplate { name: name.to_string() })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Substitute `values` into the fragment `name`.
    ///
    /// Values are inserted verbatim; escaping is the caller's job.
    pub fn render(&self, name: &str, values: &[(&str, &str)]) -> Result<String> {
        let text = self.get(name)?;
        let mut out = String::with_capacity(text.len());
        for token in tokenize(name, text)? {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::Dollar => out.push('$'),
                Token::Placeholder(key) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| *k == key)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| XmlError::MissingPlaceholder {
                            template: name.to_string(),
                            placeholder: key.to_string(),
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_templates_are_well_formed() {
        let set = TemplateSet::builtin();
        for name in set.names() {
            placeholders(name, set.get(name).unwrap()).unwrap();
        }
        assert_eq!(set.names().count(), BUILTIN.len());
    }

    #[test]
    fn render_substitutes_and_escapes_dollar() {
        let mut set = TemplateSet::builtin();
        set.templates.insert("T".into(), "cost: $$${PRICE} ($x)".into());
        assert_eq!(set.render("T", &[("PRICE", "5")]).unwrap(), "cost: $5 ($x)");
    }

    #[test]
    fn missing_value_is_an_error() {
        let set = TemplateSet::builtin();
        let err = set.render("PowerRailWire", &[("UID", "23")]).unwrap_err();
        assert!(matches!(
            err,
            XmlError::MissingPlaceholder { ref placeholder, .. } if placeholder == "EN_UID"
        ));
    }

    #[test]
    fn unknown_template() {
        let set = TemplateSet::builtin();
        assert!(matches!(set.render("Nope", &[]), Err(XmlError::UnknownTemplate { .. })));
    }

    #[test]
    fn unterminated_placeholder() {
        let err = tokenize("T", "<a>${NAME</a>").unwrap_err();
        assert!(matches!(err, XmlError::MalformedTemplate { .. }));
    }

    #[test]
    fn overrides_replace_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Engineering.xml"),
            "  <Engineering version=\"${VERSION}\"/>\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let set = TemplateSet::with_overrides(dir.path()).unwrap();
        assert_eq!(
            set.render("Engineering", &[("VERSION", "V18")]).unwrap(),
            "  <Engineering version=\"V18\"/>\n"
        );
    }

    #[test]
    fn override_with_new_placeholder_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Engineering.xml"), "${VERSION} ${BUILD}").unwrap();
        let err = TemplateSet::with_overrides(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            XmlError::UnknownPlaceholder { ref placeholder, .. } if placeholder == "BUILD"
        ));
    }

    #[test]
    fn override_of_unknown_fragment_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Bogus.xml"), "<x/>").unwrap();
        let err = TemplateSet::with_overrides(dir.path()).unwrap_err();
        assert!(matches!(err, XmlError::UnknownTemplate { .. }));
    }
}
