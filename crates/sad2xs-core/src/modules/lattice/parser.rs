use super::model::{AttributeValue, ElementKind, ElementRecord, LatticeDocument};
use super::normalize::normalize_lattice_text;
use crate::domain::{ParserResult, SadError};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const STATEMENT_TERMINATOR: char = ';';
const LINE_KEYWORD: &str = "line";

/// A trimmed, non-empty statement of normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// 1-based position among the non-empty statements.
    pub index: usize,
    /// 1-based source line of the first character.
    pub line: usize,
    pub text: String,
}

impl RawStatement {
    /// Leading identifier of the statement: `bend` for `bend b1=(...)` and
    /// `line` for `line=(a b)`.
    pub fn discriminator(&self) -> &str {
        let end = self
            .text
            .find(|ch: char| ch.is_whitespace() || ch == '=' || ch == '(')
            .unwrap_or(self.text.len());
        &self.text[..end]
    }

    fn body(&self) -> &str {
        &self.text[self.discriminator().len()..]
    }

    fn error(&self, placeholder: &'static str, detail: impl AsRef<str>) -> SadError {
        SadError::input_validation(
            placeholder,
            format!(
                "statement {} (line {}): {}",
                self.index,
                self.line,
                detail.as_ref()
            ),
        )
    }
}

/// Splits normalized text on `;`, dropping empty statements.
pub fn split_statements(normalized: &str) -> Vec<RawStatement> {
    let mut statements = Vec::new();
    let mut line = 1;

    for piece in normalized.split(STATEMENT_TERMINATOR) {
        let leading = piece.len() - piece.trim_start().len();
        let start_line = line + piece[..leading].matches('\n').count();
        line += piece.matches('\n').count();

        let text = piece.trim();
        if text.is_empty() {
            continue;
        }
        statements.push(RawStatement {
            index: statements.len() + 1,
            line: start_line,
            text: text.to_string(),
        });
    }

    statements
}

/// Parses a SAD lattice into element tables and the beamline sequence.
pub fn parse_lattice(source: &str) -> ParserResult<LatticeDocument> {
    let normalized = normalize_lattice_text(source);
    let mut document = LatticeDocument::default();

    for statement in split_statements(&normalized) {
        let discriminator = statement.discriminator();
        if let Some(kind) = ElementKind::from_keyword(discriminator) {
            for (name, record) in parse_element_block(&statement)? {
                if document.merge_element(kind, name.as_str(), record) {
                    debug!(
                        statement = statement.index,
                        kind = %kind,
                        element = %name,
                        "merged repeated element definition"
                    );
                }
            }
        } else if discriminator == LINE_KEYWORD {
            let tokens = parse_line_statement(&statement)?;
            if document.replace_sequence(tokens).is_some() {
                warn!(
                    statement = statement.index,
                    line = statement.line,
                    "line statement replaces an earlier sequence"
                );
            }
        } else {
            debug!(
                statement = statement.index,
                line = statement.line,
                discriminator,
                "skipping statement with unrecognised keyword"
            );
        }
    }

    Ok(document)
}

/// Extracts the element-name tokens of a `line` statement, reversal markers
/// kept verbatim.
pub fn parse_line_statement(statement: &RawStatement) -> ParserResult<Vec<String>> {
    let Some((_, sequence_text)) = statement.text.split_once('=') else {
        return Err(statement.error(
            "INPUT.LATTICE_LINE",
            "line statement has no '=' before its element list",
        ));
    };

    let tokens: Vec<String> = sequence_text
        .replace(['(', ')'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if let Some(token) = tokens.iter().find(|token| token.contains('=')) {
        return Err(statement.error(
            "INPUT.LATTICE_LINE",
            format!(
                "only one sequence may be defined per line statement, found '{}'",
                token
            ),
        ));
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Equals,
    Quoted(String),
    Word(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Open => "(".to_string(),
            Self::Close => ")".to_string(),
            Self::Equals => "=".to_string(),
            Self::Quoted(text) => format!("\"{}\"", text),
            Self::Word(word) => word.clone(),
        }
    }
}

fn tokenize(statement: &RawStatement, text: &str) -> ParserResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            _ if ch.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '"' | '\'' => {
                chars.next();
                let mut quoted = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == ch {
                        closed = true;
                        break;
                    }
                    quoted.push(next);
                }
                if !closed {
                    return Err(statement.error(
                        "INPUT.LATTICE_SYNTAX",
                        format!("unterminated string starting with {}{}", ch, quoted),
                    ));
                }
                tokens.push(Token::Quoted(quoted));
            }
            _ => {
                let mut word = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || matches!(next, '(' | ')' | '=' | '"' | '\'') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

struct BlockParser<'s> {
    statement: &'s RawStatement,
    tokens: Vec<Token>,
    position: usize,
}

/// Parses the definitions of an element statement.
///
/// Two forms are accepted and may be mixed:
/// `bend b1=(l=1 angle=0.1) b2=(l=2 angle=0.2)` and `bend b1 l=1 angle=0.1`.
/// Values are literals only: numbers, quoted strings, `true`/`false` and
/// parenthesized records.
pub fn parse_element_block(
    statement: &RawStatement,
) -> ParserResult<Vec<(String, ElementRecord)>> {
    let tokens = tokenize(statement, statement.body())?;
    let mut parser = BlockParser {
        statement,
        tokens,
        position: 0,
    };
    parser.definitions()
}

impl BlockParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn error_at(&self, detail: impl AsRef<str>) -> SadError {
        let near = self
            .peek()
            .map(Token::describe)
            .unwrap_or_else(|| "end of statement".to_string());
        self.statement.error(
            "INPUT.LATTICE_SYNTAX",
            format!("{} near '{}'", detail.as_ref(), near),
        )
    }

    fn definitions(&mut self) -> ParserResult<Vec<(String, ElementRecord)>> {
        let mut definitions = Vec::new();
        while self.peek().is_some() {
            let name = self.identifier("element name")?;
            let record: ElementRecord = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Equals), Some(Token::Open)) => {
                    self.position += 2;
                    self.record_body()?.into_iter().collect()
                }
                (Some(Token::Open), _) => {
                    self.position += 1;
                    self.record_body()?.into_iter().collect()
                }
                (Some(Token::Equals), _) => {
                    self.position += 1;
                    return Err(self.error_at(format!(
                        "element '{}' must be defined by a parenthesized attribute list",
                        name
                    )));
                }
                _ => self.bare_attributes()?,
            };
            definitions.push((name, record));
        }
        Ok(definitions)
    }

    /// `attr=value attr=value ...` after a bare element name; stops at the
    /// next element name or at `name=(`, which opens a new definition.
    fn bare_attributes(&mut self) -> ParserResult<ElementRecord> {
        let mut record = ElementRecord::new();
        while let (Some(Token::Word(_)), Some(Token::Equals)) = (self.peek(), self.peek_at(1)) {
            if matches!(self.peek_at(2), Some(Token::Open)) {
                break;
            }
            let attribute = self.identifier("attribute name")?;
            self.position += 1;
            let value = self.scalar(&attribute)?;
            record.insert(attribute, value);
        }
        Ok(record)
    }

    /// Entries up to and including the closing `)`.
    fn record_body(&mut self) -> ParserResult<BTreeMap<String, AttributeValue>> {
        let mut fields = BTreeMap::new();
        loop {
            match self.peek() {
                Some(Token::Close) => {
                    self.position += 1;
                    return Ok(fields);
                }
                None => return Err(self.error_at("unbalanced '(' in attribute list")),
                Some(_) => {
                    let attribute = self.identifier("attribute name")?;
                    if !matches!(self.peek(), Some(Token::Equals)) {
                        return Err(self.error_at(format!("expected '=' after '{}'", attribute)));
                    }
                    self.position += 1;
                    let value = self.value(&attribute)?;
                    fields.insert(attribute, value);
                }
            }
        }
    }

    fn value(&mut self, attribute: &str) -> ParserResult<AttributeValue> {
        if matches!(self.peek(), Some(Token::Open)) {
            self.position += 1;
            return self.record_body().map(AttributeValue::Record);
        }
        self.scalar(attribute)
    }

    fn scalar(&mut self, attribute: &str) -> ParserResult<AttributeValue> {
        match self.peek().cloned() {
            Some(Token::Quoted(text)) => {
                self.position += 1;
                Ok(AttributeValue::Text(text))
            }
            Some(Token::Word(word)) => match parse_literal_word(&word) {
                Some(value) => {
                    self.position += 1;
                    Ok(value)
                }
                None => Err(self.error_at(format!(
                    "unsupported value for attribute '{}' (only numbers, strings, booleans and records are accepted)",
                    attribute
                ))),
            },
            _ => Err(self.error_at(format!("missing value for attribute '{}'", attribute))),
        }
    }

    fn identifier(&mut self, what: &str) -> ParserResult<String> {
        match self.peek() {
            Some(Token::Word(word)) if is_identifier(word) => {
                let word = word.clone();
                self.position += 1;
                Ok(word)
            }
            _ => Err(self.error_at(format!("expected {}", what))),
        }
    }
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '.' | '$'))
}

fn parse_literal_word(word: &str) -> Option<AttributeValue> {
    match word {
        "true" => return Some(AttributeValue::Bool(true)),
        "false" => return Some(AttributeValue::Bool(false)),
        _ => {}
    }

    // f64::from_str also takes "inf" and "nan"; a lattice number starts with
    // a digit, a sign or a decimal point.
    let first = word.chars().next()?;
    if !(first.is_ascii_digit() || matches!(first, '+' | '-' | '.')) {
        return None;
    }
    let value = word.parse::<f64>().ok()?;
    value.is_finite().then_some(AttributeValue::Number(value))
}
