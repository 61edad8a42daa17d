//! Binding and assignment patterns

use super::*;

/// A binding pattern (declarations, parameters, assignment targets)
#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier(String),
    /// `[a, , b, ...rest]`
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    /// `{a, b: c, ...rest}`
    Object {
        properties: Vec<PatternProperty>,
        rest: Option<Box<Pattern>>,
    },
    /// `target = default`
    Default {
        target: Box<Pattern>,
        default: Box<Expression>,
    },
    /// Member expression; only valid as an assignment target
    Member(Box<Expression>),
}

/// `key: value` inside an object pattern
#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub key: PropertyKey,
    pub value: Pattern,
}

impl Pattern {
    /// Every identifier this pattern binds, in source order
    pub fn bound_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names(&self, names: &mut Vec<String>) {
        match self {
            Pattern::Identifier(name) => names.push(name.clone()),
            Pattern::Array { elements, rest } => {
                for element in elements.iter().flatten() {
                    element.collect_bound_names(names);
                }
                if let Some(rest) = rest {
                    rest.collect_bound_names(names);
                }
            }
            Pattern::Object { properties, rest } => {
                for prop in properties {
                    prop.value.collect_bound_names(names);
                }
                if let Some(rest) = rest {
                    rest.collect_bound_names(names);
                }
            }
            Pattern::Default { target, .. } => target.collect_bound_names(names),
            Pattern::Member(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_names_nested() {
        let pattern = Pattern::Object {
            properties: vec![
                PatternProperty {
                    key: PropertyKey::Static("a".into()),
                    value: Pattern::Identifier("a".into()),
                },
                PatternProperty {
                    key: PropertyKey::Static("b".into()),
                    value: Pattern::Array {
                        elements: vec![
                            Some(Pattern::Identifier("c".into())),
                            None,
                            Some(Pattern::Default {
                                target: Box::new(Pattern::Identifier("d".into())),
                                default: Box::new(Expression::Number(1.0)),
                            }),
                        ],
                        rest: None,
                    },
                },
            ],
            rest: Some(Box::new(Pattern::Identifier("others".into()))),
        };
        assert_eq!(pattern.bound_names(), vec!["a", "c", "d", "others"]);
    }
}
