//! Free-text geography labels → canonical region codes.
//!
//! Matching is first-match-wins over an ordered rule list. The order of
//! [`RegionTable::regions`] is therefore a priority list: a label containing
//! patterns of two regions resolves to whichever comes first (e.g. a label
//! "Andalucía (España)" resolves to `ESP`). Rule authors must place the more
//! specific patterns ahead of the generic ones; the classifier does not try
//! to guess intent.

use std::path::Path;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

/// One canonical region and the substrings that identify it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionRule {
    pub code: String,
    pub name: String,
    pub patterns: Vec<String>,
}

/// Two-digit administrative code used as a prefix fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericCode {
    pub prefix: String,
    pub code: String,
}

/// Region rule table as loaded from configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionTable {
    pub regions: Vec<RegionRule>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub numeric_codes: Vec<NumericCode>,
}

impl RegionTable {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table: RegionTable = serde_json::from_str(&content)?;
        if table.regions.is_empty() {
            return Err(Error::Config(format!(
                "region table {} has no regions",
                path.display()
            )));
        }
        Ok(table)
    }

    /// Spain + its autonomous communities. Ceuta and Melilla are excluded
    /// rather than mapped.
    pub fn spain() -> Self {
        let rule = |code: &str, name: &str, patterns: &[&str]| RegionRule {
            code: code.to_string(),
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        };

        let regions = vec![
            rule("ESP", "España", &["total nacional", "total españa", "españa"]),
            rule("AND", "Andalucía", &["andaluc"]),
            rule("ARA", "Aragón", &["aragon"]),
            rule("AST", "Principado de Asturias", &["asturias"]),
            rule("BAL", "Illes Balears", &["balears", "baleares"]),
            rule("CAN", "Canarias", &["canarias"]),
            rule("CANT", "Cantabria", &["cantabria"]),
            rule("CASTL", "Castilla y León", &["castilla y leon"]),
            rule(
                "CASTM",
                "Castilla-La Mancha",
                &["castilla - la mancha", "castilla-la mancha", "castilla y la mancha"],
            ),
            rule("CAT", "Cataluña", &["catalu"]),
            rule("VAL", "Comunitat Valenciana", &["valencia"]),
            rule("EXT", "Extremadura", &["extremadura"]),
            rule("GAL", "Galicia", &["galicia"]),
            rule("MAD", "Comunidad de Madrid", &["madrid"]),
            rule("MUR", "Región de Murcia", &["murcia"]),
            rule("NAV", "Comunidad Foral de Navarra", &["navarra"]),
            rule("PVA", "País Vasco", &["vasco", "euskadi"]),
            rule("RIO", "La Rioja", &["rioja"]),
        ];

        let numeric_codes = [
            ("01", "AND"),
            ("02", "ARA"),
            ("03", "AST"),
            ("04", "BAL"),
            ("05", "CAN"),
            ("06", "CANT"),
            ("07", "CASTL"),
            ("08", "CASTM"),
            ("09", "CAT"),
            ("10", "VAL"),
            ("11", "EXT"),
            ("12", "GAL"),
            ("13", "MAD"),
            ("14", "MUR"),
            ("15", "NAV"),
            ("16", "PVA"),
            ("17", "RIO"),
        ]
        .iter()
        .map(|(prefix, code)| NumericCode {
            prefix: prefix.to_string(),
            code: code.to_string(),
        })
        .collect();

        Self {
            regions,
            exclusions: vec!["ceuta".to_string(), "melilla".to_string()],
            numeric_codes,
        }
    }
}

/// Lowercase, NFKD-decompose and drop combining marks: "Andalucía" → "andalucia".
pub fn fold(label: &str) -> String {
    label
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone)]
struct FoldedRule {
    code: String,
    name: String,
    patterns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegionClassifier {
    rules: Vec<FoldedRule>,
    exclusions: Vec<String>,
    numeric_codes: Vec<NumericCode>,
}

impl RegionClassifier {
    pub fn new(table: &RegionTable) -> Self {
        let rules = table
            .regions
            .iter()
            .map(|r| FoldedRule {
                code: r.code.clone(),
                name: r.name.clone(),
                patterns: r
                    .patterns
                    .iter()
                    .map(|p| fold(p))
                    .filter(|p| !p.is_empty())
                    .collect(),
            })
            .collect();

        Self {
            rules,
            exclusions: table
                .exclusions
                .iter()
                .map(|e| fold(e))
                .filter(|e| !e.is_empty())
                .collect(),
            numeric_codes: table.numeric_codes.clone(),
        }
    }

    /// Canonical code for `label`, or `None` when the label is outside the
    /// target geography. `None` is an expected outcome, not an error.
    pub fn classify(&self, label: &str) -> Option<&str> {
        let folded = fold(label);
        if folded.is_empty() {
            return None;
        }

        if self.exclusions.iter().any(|e| folded.contains(e.as_str())) {
            return None;
        }

        for rule in &self.rules {
            if rule.patterns.iter().any(|p| folded.contains(p.as_str())) {
                return Some(rule.code.as_str());
            }
        }

        self.numeric_codes
            .iter()
            .find(|n| folded.starts_with(n.prefix.as_str()))
            .map(|n| n.code.as_str())
    }

    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.code == code)
            .map(|r| r.name.as_str())
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.code.as_str())
    }

    pub fn is_known(&self, code: &str) -> bool {
        self.rules.iter().any(|r| r.code == code)
    }
}

impl Default for RegionClassifier {
    fn default() -> Self {
        Self::new(&RegionTable::spain())
    }
}
