//! Template compiler
//!
//! Turns `{USERNAME}{TAB}{PASSWORD}{ENTER}` style templates into a
//! `CompiledSequence`. Single left-to-right scan, no nested braces.
//! Failure is atomic: the partially built sequence is dropped (and its
//! text wiped) before the error is returned.

use tracing::debug;

use super::action::{Action, CompiledSequence, SpecialKey};
use super::credential::{Credential, ScopedPassword};

/// Template used when the caller does not supply one
pub const DEFAULT_TEMPLATE: &str = "{USERNAME}{TAB}{PASSWORD}{ENTER}";

/// Errors reported while compiling a template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("no credential selected for auto-type")]
    InvalidCredential,

    /// Character offset of the unmatched `{`
    #[error("placeholder opened at position {0} is never closed with '}}'")]
    UnterminatedPlaceholder(usize),

    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),

    #[error("invalid delay '{0}': expected a whole number of milliseconds")]
    InvalidDelay(String),
}

/// Compile `template` against `credential`.
pub fn compile(
    template: &str,
    credential: Option<&dyn Credential>,
) -> Result<CompiledSequence, CompileError> {
    let credential = credential.ok_or(CompileError::InvalidCredential)?;

    let mut sequence = CompiledSequence::new();
    let mut rest = template;
    let mut offset = 0usize;

    loop {
        let Some(open) = rest.find('{') else {
            sequence.push_text(rest);
            break;
        };

        sequence.push_text(&rest[..open]);

        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            let position = template[..offset + open].chars().count();
            return Err(CompileError::UnterminatedPlaceholder(position));
        };

        expand_placeholder(&after_open[..close], credential, &mut sequence)?;

        let consumed = open + 1 + close + 1;
        offset += consumed;
        rest = &rest[consumed..];
    }

    debug!(actions = sequence.len(), "template compiled");
    Ok(sequence)
}

/// Resolve one `{...}` token and append its actions
fn expand_placeholder(
    raw: &str,
    credential: &dyn Credential,
    sequence: &mut CompiledSequence,
) -> Result<(), CompileError> {
    let inner = raw.trim();
    let token = inner.to_ascii_uppercase();

    match token.as_str() {
        "USERNAME" | "USER" => sequence.push_text(credential.username()),
        "TITLE" => sequence.push_text(credential.title()),
        "URL" => sequence.push_text(credential.url()),
        "NOTES" => sequence.push_text(first_line(credential.notes())),
        "PASSWORD" | "PASS" | "PWD" => {
            let password = ScopedPassword::unlock(credential);
            sequence.push_text(password.expose());
        }
        _ => {
            if let Some(key) = SpecialKey::from_name(&token) {
                sequence.push(Action::KeyPress(key));
            } else if let Some(arg) = delay_argument(inner) {
                sequence.push(Action::Delay(parse_delay(arg)?));
            } else {
                return Err(CompileError::UnknownPlaceholder(token));
            }
        }
    }

    Ok(())
}

/// Argument of a `DELAY <n>` token, keeping the user's original spelling
fn delay_argument(inner: &str) -> Option<&str> {
    let keyword = inner.get(..5)?;
    if !keyword.eq_ignore_ascii_case("DELAY") {
        return None;
    }
    let arg = &inner[5..];
    if arg.is_empty() {
        return Some(arg);
    }
    if !arg.starts_with(char::is_whitespace) {
        return None;
    }
    Some(arg.trim())
}

fn parse_delay(arg: &str) -> Result<u64, CompileError> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CompileError::InvalidDelay(arg.to_string()));
    }
    arg.parse::<u64>()
        .map_err(|_| CompileError::InvalidDelay(arg.to_string()))
}

fn first_line(text: &str) -> &str {
    text.split(['\r', '\n']).next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::credential::tests::CountingCredential;
    use crate::sequence::credential::Entry;

    fn alice() -> Entry {
        Entry::new("alice", "secret")
    }

    fn run(template: &str, entry: &Entry) -> Result<CompiledSequence, CompileError> {
        compile(template, Some(entry as &dyn Credential))
    }

    #[test]
    fn test_default_template() {
        let sequence = run(DEFAULT_TEMPLATE, &alice()).unwrap();
        assert_eq!(
            sequence.actions(),
            &[
                Action::Text("alice".into()),
                Action::KeyPress(SpecialKey::Tab),
                Action::Text("secret".into()),
                Action::KeyPress(SpecialKey::Enter),
            ]
        );
    }

    #[test]
    fn test_empty_template_succeeds() {
        let sequence = run("", &alice()).unwrap();
        assert!(sequence.is_empty());
    }

    #[test]
    fn test_plain_text_only() {
        let sequence = run("hello world", &alice()).unwrap();
        assert_eq!(sequence.actions(), &[Action::Text("hello world".into())]);
    }

    #[test]
    fn test_missing_credential() {
        assert_eq!(
            compile("{USERNAME}", None),
            Err(CompileError::InvalidCredential)
        );
        assert_eq!(compile("", None), Err(CompileError::InvalidCredential));
    }

    #[test]
    fn test_unknown_placeholder() {
        assert_eq!(
            run("{UNKNOWN}", &alice()),
            Err(CompileError::UnknownPlaceholder("UNKNOWN".into()))
        );
        assert_eq!(
            run("abc{USERNAME}{ nope }", &alice()),
            Err(CompileError::UnknownPlaceholder("NOPE".into()))
        );
    }

    #[test]
    fn test_unterminated_placeholder() {
        assert_eq!(
            run("{", &alice()),
            Err(CompileError::UnterminatedPlaceholder(0))
        );
        assert_eq!(
            run("{USER}ab{TAB", &alice()),
            Err(CompileError::UnterminatedPlaceholder(8))
        );
    }

    #[test]
    fn test_unterminated_position_counts_chars() {
        assert_eq!(
            run("éé{TAB}{", &alice()),
            Err(CompileError::UnterminatedPlaceholder(7))
        );
    }

    #[test]
    fn test_delay() {
        let sequence = run("{DELAY 500}", &alice()).unwrap();
        assert_eq!(sequence.actions(), &[Action::Delay(500)]);

        let sequence = run("{delay   0 }", &alice()).unwrap();
        assert_eq!(sequence.actions(), &[Action::Delay(0)]);
    }

    #[test]
    fn test_invalid_delay() {
        assert_eq!(
            run("{DELAY -1}", &alice()),
            Err(CompileError::InvalidDelay("-1".into()))
        );
        assert_eq!(
            run("{DELAY abc}", &alice()),
            Err(CompileError::InvalidDelay("abc".into()))
        );
        assert_eq!(
            run("{DELAY}", &alice()),
            Err(CompileError::InvalidDelay("".into()))
        );
        assert_eq!(
            run("{DELAY +5}", &alice()),
            Err(CompileError::InvalidDelay("+5".into()))
        );
    }

    #[test]
    fn test_delay_needs_separator() {
        assert_eq!(
            run("{DELAY500}", &alice()),
            Err(CompileError::UnknownPlaceholder("DELAY500".into()))
        );
    }

    #[test]
    fn test_case_insensitive_and_aliases() {
        let sequence = run("{user}{ Pwd }{bksp}{pgdn}{esc}{f5}", &alice()).unwrap();
        assert_eq!(
            sequence.actions(),
            &[
                Action::Text("alice".into()),
                Action::Text("secret".into()),
                Action::KeyPress(SpecialKey::Backspace),
                Action::KeyPress(SpecialKey::PageDown),
                Action::KeyPress(SpecialKey::Escape),
                Action::KeyPress(SpecialKey::F5),
            ]
        );
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let entry = Entry::default();
        assert!(run("{NOTES}", &entry).unwrap().is_empty());
        assert!(run("{TITLE}{URL}{USERNAME}{PASSWORD}", &entry)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_notes_first_line_only() {
        let entry = alice().with_notes("line one\r\nline two");
        let sequence = run("{NOTES}", &entry).unwrap();
        assert_eq!(sequence.actions(), &[Action::Text("line one".into())]);

        let entry = alice().with_notes("\nhidden");
        assert!(run("{NOTES}", &entry).unwrap().is_empty());
    }

    #[test]
    fn test_title_and_url() {
        let entry = alice().with_title("Mail").with_url("https://mail.example");
        let sequence = run("{TITLE} {URL}", &entry).unwrap();
        assert_eq!(
            sequence.actions(),
            &[
                Action::Text("Mail".into()),
                Action::Text(" ".into()),
                Action::Text("https://mail.example".into()),
            ]
        );
    }

    #[test]
    fn test_password_unlock_is_paired() {
        let credential = CountingCredential::new(Entry::default());
        let sequence = compile("{PASSWORD}{PASS}", Some(&credential)).unwrap();
        assert!(sequence.is_empty());
        assert_eq!(credential.unlocks.get(), 2);
        assert_eq!(credential.locks.get(), 2);
    }

    #[test]
    fn test_failure_after_password_still_locks() {
        let credential = CountingCredential::new(alice());
        let result = compile("{PASSWORD}{BOGUS}", Some(&credential));
        assert_eq!(result, Err(CompileError::UnknownPlaceholder("BOGUS".into())));
        assert_eq!(credential.unlocks.get(), 1);
        assert_eq!(credential.locks.get(), 1);
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = run("{WHAT}", &alice()).unwrap_err();
        assert_eq!(err.to_string(), "unknown placeholder {WHAT}");

        let err = run("ab{", &alice()).unwrap_err();
        assert!(err.to_string().contains("position 2"));
    }
}
