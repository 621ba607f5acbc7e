//! Reduces a bot's modelfile to the instructions an executor understands.

use crate::models::Directive;

/// Directives that only drive the chat UI.
const UI_ONLY: [&str; 4] = ["prompts", "start-prompts", "auto-prompts", "welcome"];

/// Drop UI-only, comment and nameless directives, lower-case names and unwrap
/// quoted arguments.
///
/// `None` in means the bot has no modelfile and yields `None`; an empty
/// modelfile yields an empty list.
pub fn process_modelfile(directives: Option<&[Directive]>) -> Option<Vec<Directive>> {
    let directives = directives?;
    Some(
        directives
            .iter()
            .filter(|d| is_forwarded(&d.name))
            .map(|d| Directive::new(d.name.trim().to_lowercase(), unquote(&d.args)))
            .collect(),
    )
}

/// JSON form sent in the `modelfile` form field.
pub fn to_wire(processed: Option<&[Directive]>) -> Result<Option<String>, serde_json::Error> {
    processed.map(serde_json::to_string).transpose()
}

fn is_forwarded(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && !name.starts_with('#')
        && !UI_ONLY.iter().any(|excluded| excluded.eq_ignore_ascii_case(name))
}

/// Strip one layer of surrounding double quotes.
fn unquote(args: &str) -> &str {
    if args.len() >= 2 && args.starts_with('"') && args.ends_with('"') {
        &args[1..args.len() - 1]
    } else {
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_only_directives_dropped() {
        let input = vec![
            Directive::new("welcome", "Hi there"),
            Directive::new("system", "You are terse."),
            Directive::new("start-prompts", "a"),
            Directive::new("PROMPTS", "b"),
        ];
        let out = process_modelfile(Some(&input)).unwrap();
        assert_eq!(out, vec![Directive::new("system", "You are terse.")]);
    }

    #[test]
    fn test_comments_and_blank_names_dropped() {
        let input = vec![
            Directive::new("#comment", "ignored"),
            Directive::new("", "orphan"),
            Directive::new("parameter", "temperature 0"),
        ];
        let out = process_modelfile(Some(&input)).unwrap();
        assert_eq!(out, vec![Directive::new("parameter", "temperature 0")]);
    }

    #[test]
    fn test_names_are_lower_cased() {
        let input = vec![
            Directive::new("SYSTEM", "x"),
            Directive::new(" Before-Prompt ", "y"),
        ];
        let out = process_modelfile(Some(&input)).unwrap();
        assert_eq!(
            out,
            vec![Directive::new("system", "x"), Directive::new("before-prompt", "y")]
        );
    }

    #[test]
    fn test_quoted_args_unwrapped_once() {
        let input = vec![
            Directive::new("system", "\"hello\""),
            Directive::new("before-prompt", "\"\"nested\"\""),
            Directive::new("after-prompt", "\"dangling"),
            Directive::new("template", "\""),
        ];
        let out = process_modelfile(Some(&input)).unwrap();
        let args: Vec<&str> = out.iter().map(|d| d.args.as_str()).collect();
        assert_eq!(args, ["hello", "\"nested\"", "\"dangling", "\""]);
    }

    #[test]
    fn test_missing_and_empty_modelfile_differ() {
        assert_eq!(process_modelfile(None), None);
        assert_eq!(process_modelfile(Some(&[])), Some(vec![]));
        assert_eq!(to_wire(None).unwrap(), None);
        assert_eq!(to_wire(Some(&[])).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_wire_format() {
        let processed = process_modelfile(Some(&[Directive::new("system", "\"be nice\"")])).unwrap();
        assert_eq!(
            to_wire(Some(&processed)).unwrap().as_deref(),
            Some(r#"[{"name":"system","args":"be nice"}]"#)
        );
    }
}
