//! XPath to CSS translation
//!
//! The rendering context only evaluates CSS selectors. Location paths made
//! of plain steps translate one-to-one:
//!
//! | XPath                         | CSS                 |
//! |-------------------------------|---------------------|
//! | `/a` (first step)             | `a:root`            |
//! | `//a`                         | `a`                 |
//! | `a/b`, `a//b`                 | `a > b`, `a b`      |
//! | `*`                           | `*`                 |
//! | `[@x='v']`, `[@x]`            | `[x="v"]`, `[x]`    |
//! | `[contains(@x,'v')]`          | `[x*="v"]`          |
//! | `[starts-with(@x,'v')]`       | `[x^="v"]`          |
//! | `[n]` (first predicate only)  | `:nth-of-type(n)`   |
//!
//! Axes, `..`, `text()`, unions and other functions are rejected.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPathError {
    #[error("Unsupported XPath: {0}")]
    Unsupported(String),
    #[error("Invalid XPath: {0}")]
    Syntax(String),
}

/// Translate an XPath location path to an equivalent CSS selector
pub fn xpath_to_css(xpath: &str) -> Result<String, XPathError> {
    let mut parser = Parser {
        chars: xpath.trim().chars().collect(),
        pos: 0,
    };
    parser.location_path()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<(), XPathError> {
        self.skip_ws();
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.syntax(&format!("expected '{}'", c)))
        }
    }

    fn unsupported(&self, what: &str) -> XPathError {
        XPathError::Unsupported(format!("{} at position {}", what, self.pos))
    }

    fn syntax(&self, what: &str) -> XPathError {
        XPathError::Syntax(format!("{} at position {}", what, self.pos))
    }

    fn location_path(&mut self) -> Result<String, XPathError> {
        if self.chars.is_empty() {
            return Err(XPathError::Syntax("empty expression".to_string()));
        }

        let mut css = String::new();
        let mut first = true;

        loop {
            self.skip_ws();
            if self.peek().is_none() {
                break;
            }
            if !self.eat('/') {
                return Err(match self.peek() {
                    Some('|') => self.unsupported("union"),
                    _ if first => self.unsupported("relative location path"),
                    _ => self.syntax("expected '/'"),
                });
            }
            let descendant = self.eat('/');
            let step = self.step()?;

            if first {
                css.push_str(&step);
                if !descendant {
                    css.push_str(":root");
                }
            } else {
                css.push_str(if descendant { " " } else { " > " });
                css.push_str(&step);
            }
            first = false;
        }

        Ok(css)
    }

    fn step(&mut self) -> Result<String, XPathError> {
        let element = match self.peek() {
            Some('*') => {
                self.pos += 1;
                "*".to_string()
            }
            Some('.') => return Err(self.unsupported("'.' / '..' step")),
            Some('@') => return Err(self.unsupported("attribute step")),
            Some(c) if is_name_start(c) => self.name()?,
            _ => return Err(self.syntax("expected a name test")),
        };

        match self.peek() {
            Some(':') => return Err(self.unsupported("axis or namespace")),
            Some('(') => return Err(self.unsupported("node test function")),
            _ => {}
        }

        let mut css = element.clone();
        let mut filtered = false;
        let mut positioned = false;

        while self.eat('[') {
            self.skip_ws();
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    if filtered || positioned {
                        return Err(self.unsupported("position after another predicate"));
                    }
                    let n = self.number()?;
                    css.push_str(&if element == "*" {
                        format!(":nth-child({})", n)
                    } else {
                        format!(":nth-of-type({})", n)
                    });
                    positioned = true;
                }
                Some('@') => {
                    self.pos += 1;
                    let attr = self.name()?;
                    self.skip_ws();
                    if self.eat('=') {
                        self.skip_ws();
                        let value = self.literal()?;
                        css.push_str(&format!("[{}={}]", attr, css_string(&value)));
                    } else if self.peek() == Some(']') {
                        css.push_str(&format!("[{}]", attr));
                    } else {
                        return Err(self.unsupported("attribute comparison"));
                    }
                    filtered = true;
                }
                Some(c) if is_name_start(c) => {
                    let function = self.name()?;
                    let operator = match function.as_str() {
                        "contains" => "*=",
                        "starts-with" => "^=",
                        other => return Err(self.unsupported(&format!("function {}()", other))),
                    };
                    self.expect('(')?;
                    self.expect('@')?;
                    let attr = self.name()?;
                    self.expect(',')?;
                    self.skip_ws();
                    let value = self.literal()?;
                    self.expect(')')?;
                    // contains(@x, '') holds for every element
                    if !value.is_empty() {
                        css.push_str(&format!("[{}{}{}]", attr, operator, css_string(&value)));
                    }
                    filtered = true;
                }
                _ => return Err(self.unsupported("predicate")),
            }
            self.expect(']')?;
        }

        Ok(css)
    }

    fn name(&mut self) -> Result<String, XPathError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_name_start(c) => self.pos += 1,
            _ => return Err(self.syntax("expected a name")),
        }
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            self.pos += 1;
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn number(&mut self) -> Result<usize, XPathError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        match digits.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(self.syntax("position must be a positive integer")),
        }
    }

    fn literal(&mut self) -> Result<String, XPathError> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.syntax("expected a string literal")),
        };
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let value = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(value);
            }
            self.pos += 1;
        }
        Err(self.syntax("unterminated string literal"))
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Double-quoted CSS string
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\a "),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
