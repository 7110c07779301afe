//! Splits a rendered command line into argv tokens.
//!
//! The rules are deliberately simpler than a shell: double and single
//! quotes delimit verbatim regions (no escapes inside a quote), a
//! backslash outside a quote makes the next character literal, and
//! unquoted space or tab ends a word. An unterminated quote invalidates
//! the whole command line and yields an empty token list.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    InWord,
    InQuote,
}

/// Tokenize a rendered command line into an ordered argv.
///
/// Returns an empty vector when the input contains an unterminated
/// quote; callers treat an empty argv as an invalid template.
///
/// Note: the scanner is primed with `escape_next = true`, so the very
/// first character is always taken verbatim, even when it is whitespace
/// or a quote. Templates that start with a quoted word therefore do not
/// tokenize the way a shell would.
pub fn tokenize(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote = '"';
    let mut escape_next = true;
    let mut state = State::Start;

    for c in command.chars() {
        if state == State::InQuote {
            if c == quote {
                args.push(std::mem::take(&mut current));
                state = State::Start;
            } else {
                current.push(c);
            }
            continue;
        }

        if escape_next {
            current.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' {
            escape_next = true;
            continue;
        }

        if c == '"' || c == '\'' {
            state = State::InQuote;
            quote = c;
            continue;
        }

        if state == State::InWord {
            if c == ' ' || c == '\t' {
                args.push(std::mem::take(&mut current));
                state = State::Start;
            } else {
                current.push(c);
            }
            continue;
        }

        if c != ' ' && c != '\t' {
            state = State::InWord;
            current.push(c);
        }
    }

    if state == State::InQuote {
        return Vec::new();
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_words_round_trip() {
        let argv = vec!["convert", "-resize", "50%", "in.png", "out.png"];
        assert_eq!(tokenize(&argv.join(" ")), argv);
    }

    #[test]
    fn test_tabs_separate_words() {
        assert_eq!(tokenize("ls\t-l\t/tmp"), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn test_double_quotes_keep_spaces() {
        assert_eq!(tokenize("echo \"a b\""), vec!["echo", "a b"]);
    }

    #[test]
    fn test_single_quotes_keep_double_quotes() {
        assert_eq!(
            tokenize("sh -c 'echo \"x y\"'"),
            vec!["sh", "-c", "echo \"x y\""]
        );
    }

    #[test]
    fn test_backslash_escapes_space() {
        assert_eq!(tokenize("cat a\\ b"), vec!["cat", "a b"]);
    }

    #[test]
    fn test_backslash_escapes_quote() {
        assert_eq!(tokenize("echo \\\"hi"), vec!["echo", "\"hi"]);
    }

    #[test]
    fn test_unterminated_quote_yields_empty() {
        assert!(tokenize("echo \"oops").is_empty());
        assert!(tokenize("echo 'oops").is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
    }

    // The scanner takes the first character verbatim, so leading
    // whitespace is glued onto the first word instead of being skipped.
    #[test]
    fn test_leading_whitespace_joins_first_word() {
        assert_eq!(tokenize(" echo hi"), vec![" echo", "hi"]);
    }

    // Same primer effect: a command line that opens with a quote treats
    // that quote as a literal character, which leaves the closing quote
    // unterminated and invalidates the input.
    #[test]
    fn test_leading_quote_is_taken_verbatim() {
        assert!(tokenize("\"a b\"").is_empty());
    }
}
