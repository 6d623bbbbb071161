//! Recovers the indexed field chain from a secondary index's textual
//! definition.
//!
//! Index statuses carry the index function as source text. Only simple field
//! chains can be matched against an ordering column, so just two shapes are
//! accepted:
//!
//! ```text
//! indexCreate('name', function(var) { return var("a")("b"); })
//! indexCreate('name', function(var) { return r.row("a")("b"); })
//! ```
//!
//! Each accessor may also be written as `.getField("a")`, strings may use
//! either quote style, and whitespace and the trailing `;` are optional.
//! Anything else (arbitrary functions, compound or computed keys) yields
//! `None`.

use rowscope_document::ColumnPath;

/// Parses an index definition, returning the field chain it extracts.
pub fn parse_index_definition(definition: &str) -> Option<ColumnPath> {
    let mut scanner = Scanner::new(definition);
    scanner.expect("indexCreate")?;
    scanner.expect("(")?;
    scanner.string()?;
    scanner.expect(",")?;
    scanner.expect("function")?;
    scanner.expect("(")?;
    let var = scanner.identifier()?;
    scanner.expect(")")?;
    scanner.expect("{")?;
    scanner.expect("return")?;

    if scanner.eat("r.row") {
        // `r.row` stands for the function argument.
    } else if scanner.identifier()? != var {
        return None;
    }

    let mut fields = Vec::new();
    loop {
        if scanner.eat("(") {
            fields.push(scanner.string()?);
            scanner.expect(")")?;
        } else if scanner.eat(".getField") {
            scanner.expect("(")?;
            fields.push(scanner.string()?);
            scanner.expect(")")?;
        } else {
            break;
        }
    }
    if fields.is_empty() {
        return None;
    }

    scanner.eat(";");
    scanner.expect("}")?;
    scanner.expect(")")?;
    scanner.at_end().then(|| ColumnPath::new(fields))
}

struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Scanner<'a> {
        Scanner { rest: text }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, token: &str) -> Option<()> {
        self.eat(token).then_some(())
    }

    fn identifier(&mut self) -> Option<&'a str> {
        self.skip_whitespace();
        let len = self
            .rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(self.rest.len());
        if len == 0 || self.rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let (ident, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(ident)
    }

    /// A single- or double-quoted string literal with backslash escapes.
    fn string(&mut self) -> Option<String> {
        self.skip_whitespace();
        let mut chars = self.rest.char_indices();
        let (_, quote) = chars.next().filter(|(_, c)| *c == '"' || *c == '\'')?;
        let mut value = String::new();
        while let Some((pos, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars.next()?;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                c if c == quote => {
                    self.rest = &self.rest[pos + c.len_utf8()..];
                    return Some(value);
                }
                c => value.push(c),
            }
        }
        None
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.rest.is_empty()
    }
}
