//! Comment and literal blanking.
//!
//! Every matcher in the extractor runs on *code-only* lines: comments and the
//! contents of string and character literals are replaced with spaces, so a
//! brace in `"{"` or a type name in `// uses Foo` never counts. Line count and
//! column positions are preserved.

/// Lexer state carried across characters (and lines, for block comments).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    /// Regular string, interpolated when the flag is set; escapes with
    /// backslash
    Str(bool),
    /// `@"..."` string, interpolated when the flag is set; `""` is an
    /// escaped quote
    VerbatimStr(bool),
    Char,
    /// Format specifier after `:` in an interpolation hole
    Format,
}

/// An open `{...}` hole of an interpolated string.
#[derive(Debug, Clone, Copy)]
struct Hole {
    verbatim: bool,
    braces: u32,
    parens: u32,
}

impl Hole {
    fn string_state(self) -> State {
        if self.verbatim {
            State::VerbatimStr(true)
        } else {
            State::Str(true)
        }
    }
}

/// Split `text` into lines with comments and literal contents blanked.
///
/// Quote characters themselves are kept so that `"..."` still reads as an
/// expression to the pattern matchers. Expressions inside the `{...}` holes
/// of interpolated strings stay code; the hole braces are blanked.
#[must_use]
pub fn code_lines(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut state = State::Code;
    let mut holes: Vec<Hole> = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            if state == State::LineComment {
                state = State::Code;
            }
            // Unterminated regular strings and chars end at the line break.
            if matches!(state, State::Str(_) | State::Char) {
                state = State::Code;
                holes.clear();
            }
            out.push(std::mem::take(&mut current));
            continue;
        }
        if c == '\r' {
            continue;
        }

        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    current.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    current.push_str("  ");
                    state = State::BlockComment;
                }
                '$' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push_str("$\"");
                    state = State::Str(true);
                }
                '$' | '@' if matches!(chars.peek(), Some('$' | '@')) && chars.peek() != Some(&c) => {
                    let second = chars.next().unwrap_or(c);
                    if chars.next_if_eq(&'"').is_some() {
                        current.push_str("  \"");
                        state = State::VerbatimStr(true);
                    } else {
                        current.push(c);
                        current.push(second);
                    }
                }
                '@' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push_str(" \"");
                    state = State::VerbatimStr(false);
                }
                '"' => {
                    current.push('"');
                    state = State::Str(false);
                }
                '\'' => {
                    current.push('\'');
                    state = State::Char;
                }
                _ => match holes.last_mut() {
                    Some(hole) => match c {
                        '{' => {
                            hole.braces += 1;
                            current.push(c);
                        }
                        '}' if hole.braces == 0 => {
                            current.push(' ');
                            state = hole.string_state();
                            holes.pop();
                        }
                        '}' => {
                            hole.braces -= 1;
                            current.push(c);
                        }
                        '(' => {
                            hole.parens += 1;
                            current.push(c);
                        }
                        ')' => {
                            hole.parens = hole.parens.saturating_sub(1);
                            current.push(c);
                        }
                        ':' if chars.peek() == Some(&':') => {
                            chars.next();
                            current.push_str("::");
                        }
                        ':' if hole.braces == 0 && hole.parens == 0 => {
                            current.push(' ');
                            state = State::Format;
                        }
                        _ => current.push(c),
                    },
                    None => current.push(c),
                },
            },
            State::LineComment => current.push(' '),
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    current.push_str("  ");
                    state = State::Code;
                } else {
                    current.push(' ');
                }
            }
            State::Str(interpolated) => match c {
                '\\' => {
                    current.push(' ');
                    if chars.next_if(|n| *n != '\n').is_some() {
                        current.push(' ');
                    }
                }
                '"' => {
                    current.push('"');
                    state = State::Code;
                }
                '{' | '}' if interpolated => {
                    state = open_hole(c, false, &mut chars, &mut current, &mut holes);
                }
                _ => current.push(' '),
            },
            State::VerbatimStr(interpolated) => match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push_str("  ");
                }
                '"' => {
                    current.push('"');
                    state = State::Code;
                }
                '{' | '}' if interpolated => {
                    state = open_hole(c, true, &mut chars, &mut current, &mut holes);
                }
                _ => current.push(' '),
            },
            State::Char => match c {
                '\\' => {
                    current.push(' ');
                    if chars.next_if(|n| *n != '\n').is_some() {
                        current.push(' ');
                    }
                }
                '\'' => {
                    current.push('\'');
                    state = State::Code;
                }
                _ => current.push(' '),
            },
            State::Format => {
                current.push(' ');
                if c == '}' {
                    state = holes.pop().map_or(State::Code, Hole::string_state);
                }
            }
        }
    }

    out.push(current);
    out
}

/// Handle a brace inside an interpolated string: `{{` and `}}` are literal
/// text, a single `{` opens a hole.
fn open_hole(
    c: char,
    verbatim: bool,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    current: &mut String,
    holes: &mut Vec<Hole>,
) -> State {
    let string = Hole { verbatim, braces: 0, parens: 0 }.string_state();
    if chars.next_if_eq(&c).is_some() {
        current.push_str("  ");
        return string;
    }
    current.push(' ');
    if c == '}' {
        return string;
    }
    holes.push(Hole { verbatim, braces: 0, parens: 0 });
    State::Code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_comments_are_blanked() {
        let lines = code_lines("var a = new Foo(); // uses Bar {\nnext");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("new Foo()"));
        assert!(!lines[0].contains("Bar"));
        assert!(!lines[0].contains('{'));
        assert_eq!(lines[1], "next");
    }

    #[test]
    fn block_comments_span_lines() {
        let lines = code_lines("a /* Foo\n Bar { */ b");
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].contains("Foo"));
        assert!(!lines[1].contains("Bar"));
        assert!(!lines[1].contains('{'));
        assert!(lines[1].ends_with(" b"));
    }

    #[test]
    fn string_contents_are_blanked_but_quotes_kept() {
        let lines = code_lines(r#"Debug.Log("Game.Core { \" }"); x"#);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Debug.Log(\""));
        assert!(!lines[0].contains("Game.Core"));
        assert!(!lines[0].contains('{'));
        assert!(lines[0].ends_with("\"); x"));
    }

    #[test]
    fn verbatim_strings_handle_doubled_quotes() {
        let lines = code_lines("var p = @\"C:\\{dir}\"\"x\"; Foo.Bar();");
        assert!(!lines[0].contains('{'));
        assert!(lines[0].contains("Foo.Bar();"));
    }

    #[test]
    fn char_literals_are_blanked() {
        let lines = code_lines("if (c == '{') { }");
        assert_eq!(lines[0].matches('{').count(), 1);
    }

    #[rstest::rstest]
    #[case::regular(r#"Log($"hp {Foo.Bar} left");"#)]
    #[case::verbatim(r#"Log($@"hp {Foo.Bar} left");"#)]
    #[case::verbatim_swapped(r#"Log(@$"hp {Foo.Bar} left");"#)]
    #[case::format_specifier(r#"Log($"hp {Foo.Bar:N2} left");"#)]
    #[case::nested_call(r#"Log($"hp {Foo.Bar(Baz.Qux("x"))} left");"#)]
    fn interpolation_holes_stay_code(#[case] source: &str) {
        let lines = code_lines(source);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), source.len());
        assert!(lines[0].contains("Foo.Bar"), "{:?}", lines[0]);
        assert!(!lines[0].contains("hp"));
        assert!(!lines[0].contains("left"));
        assert!(!lines[0].contains('{'));
        assert!(lines[0].ends_with("\");"));
    }

    #[test]
    fn escaped_braces_and_format_text_are_blanked() {
        let lines = code_lines(r#"var s = $"{{Foo}} {Bar:Baz} {global::Game.Qux}"; Next.Call();"#);
        assert!(!lines[0].contains("Foo"));
        assert!(!lines[0].contains("Baz"));
        assert!(lines[0].contains("Bar"));
        assert!(lines[0].contains("global::Game.Qux"));
        assert!(lines[0].contains("Next.Call();"));
        assert!(!lines[0].contains('{'));
    }

    #[test]
    fn plain_strings_keep_braces_blank() {
        let lines = code_lines(r#"var s = "{Foo.Bar}"; var t = @"{Baz}";"#);
        assert!(!lines[0].contains("Foo"));
        assert!(!lines[0].contains("Baz"));
    }

    #[test]
    fn column_positions_are_preserved() {
        let source = "class A { // note\n}";
        let lines = code_lines(source);
        assert_eq!(lines[0].len(), "class A { // note".len());
    }
}
