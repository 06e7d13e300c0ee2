//! Ordered rule registry.

use std::collections::HashSet;

use super::Rule;
use crate::error::SetupError;

/// The ordered list of rules one engine evaluates.
///
/// Declaration order is evaluation order. Rules are addressed by their index
/// in that order.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Check the declarations and build the set.
    ///
    /// Fails on an empty list or when the same rule name is declared twice
    /// for the same field.
    pub fn new(rules: Vec<Rule>) -> Result<Self, SetupError> {
        if rules.is_empty() {
            return Err(SetupError::NoRules);
        }

        let mut pairs = HashSet::new();
        for rule in &rules {
            if !pairs.insert((rule.name(), rule.field())) {
                return Err(SetupError::Duplicate {
                    rule: rule.name().to_string(),
                    field: rule.field().to_string(),
                });
            }
        }

        Ok(Self { rules })
    }

    /// Like [`RuleSet::new`], but rejects bulk rules.
    pub fn per_record(rules: Vec<Rule>) -> Result<Self, SetupError> {
        if let Some(rule) = rules.iter().find(|r| r.is_bulk()) {
            return Err(SetupError::BulkRuleNotSupported {
                rule: rule.name().to_string(),
                field: rule.field().to_string(),
            });
        }
        Self::new(rules)
    }

    /// Get a rule by index.
    ///
    /// Indices come from this set, so they are always in range.
    pub fn get(&self, index: usize) -> &Rule {
        &self.rules[index]
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always false; empty sets are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over `(index, rule)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Rule)> {
        self.rules.iter().enumerate()
    }

    /// Indices of all rules, in declaration order.
    pub fn all(&self) -> Vec<usize> {
        (0..self.rules.len()).collect()
    }

    /// Indices of rules targeting any of `fields`, in declaration order.
    pub fn affected_by(&self, fields: &[String]) -> Vec<usize> {
        self.iter()
            .filter(|(_, rule)| rule.targets_any(fields))
            .map(|(index, _)| index)
            .collect()
    }

    /// Unique rule field names of `indices`, first occurrence first.
    pub fn field_names(&self, indices: &[usize]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for &index in indices {
            let field = self.get(index).field();
            if !names.iter().any(|n| n == field) {
                names.push(field.to_string());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BulkResult;

    fn rule(name: &str, field: &str, targets: &[&str]) -> Rule {
        Rule::builder(name, field)
            .targets(targets.iter().copied())
            .check(|_| None)
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(RuleSet::new(Vec::new()).unwrap_err(), SetupError::NoRules);
    }

    #[test]
    fn test_duplicate_pair_rejected() {
        let err = RuleSet::new(vec![
            rule("IsRequired", "username", &["username"]),
            rule("IsRequired", "fullName", &["fullName"]),
            rule("IsRequired", "username", &["username"]),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            SetupError::Duplicate {
                rule: "IsRequired".into(),
                field: "username".into()
            }
        );
    }

    #[test]
    fn test_affected_by_keeps_declaration_order() {
        let set = RuleSet::new(vec![
            rule("IsRequired", "password1", &["password1"]),
            rule("IsRequired", "username", &["username"]),
            rule("MustBeEqual", "password", &["password1", "password2"]),
        ])
        .unwrap();

        assert_eq!(set.affected_by(&["password1".into()]), vec![0, 2]);
        assert_eq!(set.affected_by(&["password2".into()]), vec![2]);
        assert!(set.affected_by(&["other".into()]).is_empty());
    }

    #[test]
    fn test_field_names_unique() {
        let set = RuleSet::new(vec![
            rule("IsRequired", "username", &["username"]),
            rule("LengthRange", "username", &["username"]),
            rule("IsRequired", "fullName", &["fullName"]),
        ])
        .unwrap();

        assert_eq!(set.field_names(&set.all()), vec!["username", "fullName"]);
    }

    #[test]
    fn test_per_record_rejects_bulk() {
        let bulk = Rule::builder("Spell", "check-spelling")
            .targets(["fullName"])
            .check_bulk(|records| records.iter().map(|r| BulkResult::valid(r.id())).collect())
            .build()
            .unwrap();

        let err = RuleSet::per_record(vec![bulk]).unwrap_err();
        assert!(matches!(err, SetupError::BulkRuleNotSupported { .. }));
    }
}
