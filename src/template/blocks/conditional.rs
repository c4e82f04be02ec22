// ABOUTME: IF / ELSEIF / ELSE / ENDIF block evaluation
// ABOUTME: Renders the body of the first branch whose condition holds

use std::sync::Arc;

use super::render_body;
use crate::template::engine::Renderer;
use crate::template::error::{Result, TemplateError};
use crate::template::expression;
use crate::template::scanner::{self, Keyword};
use crate::template::scope::Scope;
use crate::template::value::Value;

/// A branch condition (`None` for `else`) and the byte range of its body
struct Branch {
    condition: Option<String>,
    start: usize,
    end: usize,
}

fn branches(block: &str) -> Option<Vec<Branch>> {
    let tags = scanner::tags(block);
    let opener = tags.first().filter(|tag| tag.keyword == Some(Keyword::If))?;
    let close = scanner::find_closing(&tags, 0, Keyword::If, Keyword::EndIf)?;

    let mut branches = Vec::new();
    let mut current = Branch {
        condition: Some(opener.argument.clone()),
        start: opener.end,
        end: opener.end,
    };
    let mut depth = 0usize;

    for tag in &tags[1..close] {
        match tag.keyword {
            Some(Keyword::If) => depth += 1,
            Some(Keyword::EndIf) => depth = depth.saturating_sub(1),
            Some(Keyword::ElseIf | Keyword::Else) if depth == 0 => {
                current.end = tag.start;
                let condition = (tag.keyword == Some(Keyword::ElseIf)).then(|| tag.argument.clone());
                let next = Branch {
                    condition,
                    start: tag.end,
                    end: tag.end,
                };
                branches.push(std::mem::replace(&mut current, next));
            }
            _ => {}
        }
    }
    current.end = tags[close].start;
    branches.push(current);
    Some(branches)
}

/// Evaluate an IF block. No matching branch renders as empty text; a
/// condition that cannot be evaluated leaves the block without a value.
pub(crate) fn evaluate(renderer: &mut Renderer<'_>, block: &str, scope: &Arc<Scope>) -> Result<Value> {
    let Some(branches) = branches(block) else {
        renderer.record(TemplateError::block("if", "could not match branches"));
        return Ok(Value::Null);
    };

    for branch in &branches {
        let holds = match &branch.condition {
            None => true,
            Some(condition) => match expression::evaluate(condition, scope) {
                Ok(value) => value.is_truthy(),
                Err(error) => {
                    renderer.record(error);
                    return Ok(Value::Null);
                }
            },
        };
        if holds {
            let body = render_body(renderer, block, branch.start, branch.end, scope)?;
            return Ok(Value::String(body));
        }
    }

    Ok(Value::String(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branches_split_at_top_level_only() {
        let block = "{{ if a }}A{{ if b }}B{{ else }}C{{ endif }}{{ elseif c }}D{{ else }}E{{ endif }}";
        let found = branches(block).unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].condition.as_deref(), Some("a"));
        assert_eq!(&block[found[0].start..found[0].end], "A{{ if b }}B{{ else }}C{{ endif }}");
        assert_eq!(found[1].condition.as_deref(), Some("c"));
        assert_eq!(&block[found[1].start..found[1].end], "D");
        assert_eq!(found[2].condition, None);
        assert_eq!(&block[found[2].start..found[2].end], "E");
    }

    #[test]
    fn test_else_if_spelling() {
        let block = "{{ IF x > 1 }}big{{ else if x > 0 }}small{{ ENDIF }}";
        let found = branches(block).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].condition.as_deref(), Some("x > 0"));
    }
}
