//! Hashable identity for an optional binding condition

use std::fmt;

use crate::model::Expr;

/// Identity of a binding condition, used with the role to key a [`BindingMap`].
///
/// Two conditions are the same key only when title, description and
/// expression all match. An absent condition and a condition whose fields are
/// all empty share the empty key.
///
/// [`BindingMap`]: crate::bindings::BindingMap
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConditionKey {
    pub title: String,
    pub description: String,
    pub expression: String,
}

impl ConditionKey {
    /// Build the key for an optional condition
    pub fn from_condition(condition: Option<&Expr>) -> Self {
        condition.map_or_else(Self::default, |expr| Self {
            title: expr.title.clone(),
            description: expr.description.clone(),
            expression: expr.expression.clone(),
        })
    }

    /// Whether this key stands for "no condition"
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.description.is_empty() && self.expression.is_empty()
    }

    /// Convert back into the condition carried by an emitted binding
    pub fn to_condition(&self) -> Option<Expr> {
        if self.is_empty() {
            None
        } else {
            Some(Expr::new(
                self.title.clone(),
                self.description.clone(),
                self.expression.clone(),
            ))
        }
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.title, self.description, self.expression)
    }
}
