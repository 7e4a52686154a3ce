//! Line-oriented feature file scanner
//!
//! Only what is needed to address scenarios is recognized: tags, scenario
//! headers and the data rows of outline examples. Steps are skipped.

use std::path::Path;

use crate::models::ScenarioDescriptor;

const SCENARIO: &[&str] = &["Scenario:", "Example:"];
const OUTLINE: &[&str] = &["Scenario Outline:", "Scenario Template:"];
const EXAMPLES: &[&str] = &["Examples:", "Scenarios:"];
const RESET: &[&str] = &["Background:", "Rule:"];

struct Outline {
    name: String,
    tags: Vec<String>,
}

struct ExamplesBlock {
    tags: Vec<String>,
    header_seen: bool,
}

fn keyword<'a>(line: &'a str, keywords: &[&str]) -> Option<&'a str> {
    keywords
        .iter()
        .find_map(|k| line.strip_prefix(k))
        .map(str::trim)
}

fn tags_of(line: &str) -> impl Iterator<Item = String> + '_ {
    line.split('#')
        .next()
        .unwrap_or("")
        .split_whitespace()
        .filter(|t| t.starts_with('@'))
        .map(String::from)
}

/// Scenarios of one feature file, in file order
///
/// Each data row of an outline's examples is its own scenario, addressed by
/// the row's line.
pub fn parse_feature(path: &Path, content: &str) -> Vec<ScenarioDescriptor> {
    let mut scenarios = Vec::new();
    let mut feature_tags: Vec<String> = Vec::new();
    let mut pending_tags: Vec<String> = Vec::new();
    let mut outline: Option<Outline> = None;
    let mut examples: Option<ExamplesBlock> = None;
    let mut docstring: Option<&str> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let line = raw.trim();

        if let Some(fence) = docstring {
            if line.starts_with(fence) {
                docstring = None;
            }
            continue;
        }
        if line.starts_with("\"\"\"") || line.starts_with("```") {
            docstring = Some(&line[..3]);
            continue;
        }

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('@') {
            pending_tags.extend(tags_of(line));
            continue;
        }

        if keyword(line, &["Feature:"]).is_some() {
            feature_tags = std::mem::take(&mut pending_tags);
            outline = None;
            examples = None;
        } else if let Some(name) = keyword(line, OUTLINE) {
            let mut tags = feature_tags.clone();
            tags.append(&mut pending_tags);
            outline = Some(Outline {
                name: name.to_string(),
                tags,
            });
            examples = None;
        } else if let Some(name) = keyword(line, SCENARIO) {
            let mut tags = feature_tags.clone();
            tags.append(&mut pending_tags);
            scenarios.push(
                ScenarioDescriptor::new(path, line_no)
                    .with_name(name)
                    .with_tags(tags),
            );
            outline = None;
            examples = None;
        } else if keyword(line, EXAMPLES).is_some() {
            let tags = std::mem::take(&mut pending_tags);
            if outline.is_some() {
                examples = Some(ExamplesBlock {
                    tags,
                    header_seen: false,
                });
            }
        } else if keyword(line, RESET).is_some() {
            pending_tags.clear();
            outline = None;
            examples = None;
        } else if line.starts_with('|') {
            if let (Some(outline), Some(block)) = (&outline, &mut examples) {
                if block.header_seen {
                    let mut tags = outline.tags.clone();
                    tags.extend(block.tags.iter().cloned());
                    scenarios.push(
                        ScenarioDescriptor::new(path, line_no)
                            .outline()
                            .with_name(outline.name.clone())
                            .with_tags(tags),
                    );
                } else {
                    block.header_seen = true;
                }
            }
        }
    }

    scenarios
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE: &str = r#"@shop
Feature: Shopping

  Background:
    Given a shop

  Scenario: Browse
    Given a product list
      | name  |
      | apple |

  @slow
  Scenario Outline: Buy <count> items
    When I buy <count> items
    """
    Scenario: inside a docstring
    """

    @smoke
    Examples:
      | count |
      | 1     |
      | 2     |

    Examples: more
      | count |
      | 10    |

  Scenario: Pay
    Then I pay
"#;

    #[test]
    fn test_parse_scenarios_and_outline_rows() {
        let scenarios = parse_feature(Path::new("shop.feature"), FEATURE);
        let lines: Vec<(u32, bool)> = scenarios.iter().map(|s| (s.line, s.outline)).collect();

        assert_eq!(
            lines,
            vec![(7, false), (22, true), (23, true), (27, true), (29, false)]
        );
    }

    #[test]
    fn test_tags_are_inherited() {
        let scenarios = parse_feature(Path::new("shop.feature"), FEATURE);

        assert_eq!(scenarios[0].tags, vec!["@shop"]);
        assert_eq!(scenarios[1].tags, vec!["@shop", "@slow", "@smoke"]);
        assert_eq!(scenarios[3].tags, vec!["@shop", "@slow"]);
        assert_eq!(scenarios[4].tags, vec!["@shop"]);
        assert_eq!(scenarios[1].name, "Buy <count> items");
    }

    #[test]
    fn test_outline_without_examples_yields_nothing() {
        let content = "Feature: F\n  Scenario Outline: O\n    Given <x>\n";
        assert!(parse_feature(Path::new("f.feature"), content).is_empty());
    }
}
