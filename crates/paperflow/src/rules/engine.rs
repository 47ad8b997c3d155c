use std::cmp::Ordering;

use tracing::debug;

use crate::error::{PaperflowError, Result};
use crate::models::{ActionKind, ConditionKind, Document, Metadata, Rule, RuleAction, RuleCondition, RuleMode};

use super::fuzzy::match_text_allow_typo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    Name,
    Description,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextMode {
    Is,
    Starts,
    Contains,
}

/// What a condition kind evaluates. Every kind maps to exactly one predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predicate {
    Text(TextField, TextMode),
    HasKey,
    HasKeyValue,
    /// Metadata count compared against the threshold with this ordering.
    Count(Ordering),
}

impl ConditionKind {
    fn predicate(self) -> Predicate {
        use Predicate::*;
        use TextField::*;
        use TextMode::*;

        match self {
            ConditionKind::NameIs => Text(Name, Is),
            ConditionKind::NameStarts => Text(Name, Starts),
            ConditionKind::NameContains => Text(Name, Contains),
            ConditionKind::DescriptionIs => Text(Description, Is),
            ConditionKind::DescriptionStarts => Text(Description, Starts),
            ConditionKind::DescriptionContains => Text(Description, Contains),
            ConditionKind::ContentIs => Text(Content, Is),
            ConditionKind::ContentStarts => Text(Content, Starts),
            ConditionKind::ContentContains => Text(Content, Contains),
            ConditionKind::MetadataHasKey => HasKey,
            ConditionKind::MetadataHasKeyValue => HasKeyValue,
            ConditionKind::MetadataCount => Count(Ordering::Equal),
            ConditionKind::MetadataCountLessThan => Count(Ordering::Less),
            ConditionKind::MetadataCountMoreThan => Count(Ordering::Greater),
        }
    }
}

/// One rule evaluated against one document.
///
/// Conditions always see the document as it was before any action of the
/// same rule ran: call [`DocumentRule::matches`] first, then
/// [`DocumentRule::run_actions`].
pub struct DocumentRule<'a> {
    rule: &'a Rule,
    document: &'a mut Document,
}

impl<'a> DocumentRule<'a> {
    pub fn new(document: &'a mut Document, rule: &'a Rule) -> Self {
        Self { rule, document }
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    /// Evaluates the rule's conditions in declaration order.
    ///
    /// `MatchAll` stops at the first failing non-inverted condition,
    /// `MatchAny` stops at the first positive condition.
    #[allow(clippy::if_same_then_else)]
    pub fn matches(&self) -> Result<bool> {
        let mut has_match = false;

        debug!(
            document_id = %self.document.id,
            rule_id = self.rule.id,
            "match document against rule"
        );

        for condition in &self.rule.conditions {
            debug!(condition_id = condition.id, kind = condition.kind.as_str(), "match condition");

            let ok = self.evaluate(condition).map_err(|e| match e {
                PaperflowError::InvalidValue(msg) => {
                    PaperflowError::InvalidValue(format!("evaluate condition {}: {}", condition.id, msg))
                }
                other => other,
            })?;

            if ok {
                // TODO: decide whether `inverted` should negate the result; both
                // branches currently set the flag, so inversion has no effect.
                if condition.inverted {
                    has_match = true;
                } else {
                    has_match = true;
                }
            } else if self.rule.mode == RuleMode::MatchAll && !condition.inverted {
                debug!(condition_id = condition.id, "condition failed, skip rest");
                return Ok(false);
            }

            if has_match && self.rule.mode == RuleMode::MatchAny {
                break;
            }
        }

        Ok(has_match)
    }

    fn evaluate(&self, condition: &RuleCondition) -> Result<bool> {
        match condition.kind.predicate() {
            Predicate::Text(field, mode) => Ok(self.match_text(condition, field, mode)),
            Predicate::HasKey => Ok(self.document.has_metadata_key(condition.metadata_key)),
            Predicate::HasKeyValue => Ok(self
                .document
                .has_metadata(condition.metadata_key, condition.metadata_value)),
            Predicate::Count(ordering) => self.match_metadata_count(condition, ordering),
        }
    }

    fn match_text(&self, condition: &RuleCondition, field: TextField, mode: TextMode) -> bool {
        let text = match field {
            TextField::Name => &self.document.name,
            TextField::Description => &self.document.description,
            TextField::Content => &self.document.content,
        };

        let (pattern, text) = if condition.case_insensitive {
            (condition.value.to_lowercase(), text.to_lowercase())
        } else {
            (condition.value.clone(), text.clone())
        };

        match mode {
            TextMode::Is => match_text_allow_typo(&pattern, &text, false, true),
            TextMode::Starts => match_text_allow_typo(&pattern, &text, true, false),
            TextMode::Contains => match_text_allow_typo(&pattern, &text, false, false),
        }
    }

    fn match_metadata_count(&self, condition: &RuleCondition, ordering: Ordering) -> Result<bool> {
        let limit: usize = condition.value.parse().map_err(|_| {
            PaperflowError::InvalidValue("value must be a non-negative number".to_string())
        })?;

        Ok(self.document.metadata.len().cmp(&limit) == ordering)
    }

    /// Applies every action in order. All actions run even if one fails; the
    /// returned error is the last one encountered.
    pub fn run_actions(&mut self) -> Result<()> {
        debug!(
            document_id = %self.document.id,
            rule_id = self.rule.id,
            "run rule actions"
        );

        let mut last_error = None;
        for action in &self.rule.actions {
            debug!(action_id = action.id, kind = action.kind.as_str(), "run action");
            if let Err(e) = self.apply(action) {
                last_error = Some(PaperflowError::Internal(format!("action ({}): {}", action.id, e)));
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply(&mut self, action: &RuleAction) -> Result<()> {
        match action.kind {
            ActionKind::SetName => {
                self.document.name = action.value.clone();
            }
            ActionKind::AppendName => {
                self.document.name.push_str(&action.value);
            }
            ActionKind::AddMetadata => {
                let pair = Metadata::new(action.metadata_key, action.metadata_value);
                if !self.document.metadata.contains(&pair) {
                    self.document.metadata.push(pair);
                }
            }
        }
        Ok(())
    }
}
