//! Hand-rolled line-oriented parser for the update DSL. Each non-blank,
//! non-comment line is one `ALIAS`, `UPDATE`, or `SPLIT` statement.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::DslParseError;

use super::types::{
    AliasCommand, Command, DateFilterKind, Selector, SelectorDateFilter, SelectorStrategy,
    SplitCommand, TagRef, TreeRef, UpdateCommand,
};

/// Parse an entire `updates.tdl` document into a command stream.
pub fn parse_document(text: &str) -> Result<Vec<Command>, DslParseError> {
    let mut commands = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        commands.push(parse_line(line_no, trimmed)?);
    }
    Ok(commands)
}

fn err(line_no: usize, message: impl Into<String>) -> DslParseError {
    DslParseError::Syntax {
        line: line_no,
        message: message.into(),
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<Command, DslParseError> {
    let tokens = tokenize(line_no, line)?;
    let mut cursor = Cursor {
        tokens: &tokens,
        pos: 0,
        line_no,
    };
    let keyword = cursor.take()?.to_ascii_uppercase();
    match keyword.as_str() {
        "ALIAS" => parse_alias(&mut cursor).map(Command::Alias),
        "UPDATE" => parse_update(&mut cursor).map(Command::Update),
        "SPLIT" => parse_split(&mut cursor).map(Command::Split),
        other => Err(err(line_no, format!("unknown command keyword {other:?}"))),
    }
}

struct Cursor<'a> {
    tokens: &'a [String],
    pos: usize,
    line_no: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn peek_upper(&self) -> Option<String> {
        self.peek().map(|s| s.to_ascii_uppercase())
    }

    fn take(&mut self) -> Result<&'a str, DslParseError> {
        let tok = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| err(self.line_no, "unexpected end of line"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, keyword: &str) -> Result<(), DslParseError> {
        let tok = self.take()?;
        if tok.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(err(
                self.line_no,
                format!("expected {keyword:?}, found {tok:?}"),
            ))
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

fn parse_alias(c: &mut Cursor) -> Result<AliasCommand, DslParseError> {
    let target = parse_tag_triplet(c)?;
    c.expect("TO")?;
    let tree_ref = parse_tree_ref(c)?;
    let mut primary = false;
    let mut effective_date = None;
    let mut note = None;
    while !c.eof() {
        match c.peek_upper().as_deref() {
            Some("PRIMARY") => {
                c.take()?;
                primary = true;
            }
            Some("EFFECTIVE") => {
                c.take()?;
                effective_date = Some(parse_date(c)?);
            }
            Some("NOTE") => {
                c.take()?;
                note = Some(parse_quoted(c)?);
            }
            Some(other) => return Err(err(c.line_no, format!("unexpected token {other:?}"))),
            None => break,
        }
    }
    Ok(AliasCommand {
        line_no: c.line_no,
        target,
        tree_ref,
        primary,
        effective_date,
        note,
    })
}

fn parse_update(c: &mut Cursor) -> Result<UpdateCommand, DslParseError> {
    let tree_ref = parse_tree_ref(c)?;
    c.expect("SET")?;
    let mut assignments = BTreeMap::new();
    loop {
        let pair = c.take()?;
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| err(c.line_no, format!("expected key=value, found {pair:?}")))?;
        assignments.insert(key.to_string(), value.trim_matches(',').to_string());
        match c.peek() {
            Some(tok) if tok == "," => {
                c.take()?;
            }
            _ => break,
        }
    }
    let mut effective_date = None;
    let mut note = None;
    while !c.eof() {
        match c.peek_upper().as_deref() {
            Some("EFFECTIVE") => {
                c.take()?;
                effective_date = Some(parse_date(c)?);
            }
            Some("NOTE") => {
                c.take()?;
                note = Some(parse_quoted(c)?);
            }
            Some(other) => return Err(err(c.line_no, format!("unexpected token {other:?}"))),
            None => break,
        }
    }
    Ok(UpdateCommand {
        line_no: c.line_no,
        tree_ref,
        assignments,
        effective_date,
        note,
    })
}

fn parse_split(c: &mut Cursor) -> Result<SplitCommand, DslParseError> {
    let source = parse_tree_ref(c)?;
    c.expect("INTO")?;
    let target = parse_tag_triplet(c)?;
    let mut primary = false;
    let mut effective_date = None;
    let mut selector = None;
    let mut note = None;
    while !c.eof() {
        match c.peek_upper().as_deref() {
            Some("PRIMARY") => {
                c.take()?;
                primary = true;
            }
            Some("EFFECTIVE") => {
                c.take()?;
                effective_date = Some(parse_date(c)?);
            }
            Some("SELECT") => {
                c.take()?;
                selector = Some(parse_selector(c)?);
            }
            Some("NOTE") => {
                c.take()?;
                note = Some(parse_quoted(c)?);
            }
            Some(other) => return Err(err(c.line_no, format!("unexpected token {other:?}"))),
            None => break,
        }
    }
    Ok(SplitCommand {
        line_no: c.line_no,
        source,
        target,
        primary,
        effective_date,
        selector,
        note,
    })
}

fn parse_selector(c: &mut Cursor) -> Result<Selector, DslParseError> {
    let strategy_tok = c.take()?.to_ascii_uppercase();
    let (strategy, ranks) = match strategy_tok.as_str() {
        "ALL" => (SelectorStrategy::All, Vec::new()),
        "LARGEST" => (SelectorStrategy::Largest, Vec::new()),
        "SMALLEST" => (SelectorStrategy::Smallest, Vec::new()),
        other if other.starts_with("RANKS") => {
            let spec = if other == "RANKS" {
                c.take()?.to_string()
            } else {
                other
                    .strip_prefix("RANKS")
                    .unwrap()
                    .trim_matches(|ch| ch == '(' || ch == ')')
                    .to_string()
            };
            let spec = spec.trim_matches(|ch| ch == '(' || ch == ')');
            let ranks: Result<Vec<u32>, _> = spec
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().parse::<u32>())
                .collect();
            let ranks = ranks.map_err(|_| err(c.line_no, "invalid RANKS list"))?;
            if ranks.is_empty() {
                return Err(err(c.line_no, "RANKS requires at least one rank"));
            }
            (SelectorStrategy::Ranks, ranks)
        }
        other => return Err(err(c.line_no, format!("unknown selector strategy {other:?}"))),
    };
    let date_filter = match c.peek_upper().as_deref() {
        Some("BEFORE") => {
            c.take()?;
            Some(SelectorDateFilter {
                kind: DateFilterKind::Before,
                first: parse_date(c)?,
                second: None,
            })
        }
        Some("AFTER") => {
            c.take()?;
            Some(SelectorDateFilter {
                kind: DateFilterKind::After,
                first: parse_date(c)?,
                second: None,
            })
        }
        Some("BETWEEN") => {
            c.take()?;
            let first = parse_date(c)?;
            c.expect("AND")?;
            let second = parse_date(c)?;
            Some(SelectorDateFilter {
                kind: DateFilterKind::Between,
                first,
                second: Some(second),
            })
        }
        _ => None,
    };
    Ok(Selector {
        strategy,
        ranks,
        date_filter,
    })
}

fn parse_tag_triplet(c: &mut Cursor) -> Result<TagRef, DslParseError> {
    let tok = c.take()?;
    let (triplet, at) = split_at_date(tok);
    let parts: Vec<&str> = triplet.split('/').collect();
    if parts.len() != 3 {
        return Err(err(
            c.line_no,
            format!("expected site/plot/tag, found {tok:?}"),
        ));
    }
    Ok(TagRef {
        site: parts[0].to_string(),
        plot: parts[1].to_string(),
        tag: parts[2].to_string(),
        at,
    })
}

fn parse_tree_ref(c: &mut Cursor) -> Result<TreeRef, DslParseError> {
    let tok = c.take()?;
    if let Ok(uuid) = Uuid::parse_str(tok) {
        return Ok(TreeRef::by_uid(uuid.to_string()));
    }
    let (triplet, at) = split_at_date(tok);
    let parts: Vec<&str> = triplet.split('/').collect();
    if parts.len() != 3 {
        return Err(err(
            c.line_no,
            format!("expected a UUID or site/plot/tag[@date], found {tok:?}"),
        ));
    }
    Ok(TreeRef::by_tag(TagRef {
        site: parts[0].to_string(),
        plot: parts[1].to_string(),
        tag: parts[2].to_string(),
        at,
    }))
}

fn split_at_date(token: &str) -> (&str, Option<NaiveDate>) {
    match token.split_once('@') {
        Some((triplet, date_str)) => (
            triplet,
            NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok(),
        ),
        None => (token, None),
    }
}

fn parse_date(c: &mut Cursor) -> Result<NaiveDate, DslParseError> {
    let tok = c.take()?;
    NaiveDate::parse_from_str(tok, "%Y-%m-%d")
        .map_err(|_| err(c.line_no, format!("invalid date {tok:?}, expected yyyy-mm-dd")))
}

fn parse_quoted(c: &mut Cursor) -> Result<String, DslParseError> {
    let tok = c.take()?;
    Ok(tok.trim_matches('"').to_string())
}

/// Splits a line into whitespace-separated tokens, keeping `"quoted text"`
/// segments intact as single tokens (used for `NOTE "…"`).
fn tokenize(line_no: usize, line: &str) -> Result<Vec<String>, DslParseError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;
    while let Some(ch) = chars.next() {
        if ch == '"' {
            current.push(ch);
            if in_quotes {
                tokens.push(std::mem::take(&mut current));
                in_quotes = false;
            } else {
                in_quotes = true;
            }
            continue;
        }
        if in_quotes {
            current.push(ch);
            continue;
        }
        if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch == ',' && !current.is_empty() && !current.contains('=') {
            // standalone comma separator, e.g. `SET a=1, b=2`
            tokens.push(std::mem::take(&mut current));
            tokens.push(",".to_string());
            continue;
        }
        current.push(ch);
    }
    if in_quotes {
        return Err(err(line_no, "unterminated quoted string"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alias_with_primary_and_effective() {
        let commands = parse_document(
            "ALIAS BRNV/H4/508 TO BRNV/H4/112 PRIMARY EFFECTIVE 2020-06-15\n",
        )
        .unwrap();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            Command::Alias(a) => {
                assert_eq!(a.target.tag, "508");
                assert!(a.primary);
                assert_eq!(
                    a.effective_date,
                    Some(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap())
                );
            }
            _ => panic!("expected alias command"),
        }
    }

    #[test]
    fn parses_update_with_multiple_assignments() {
        let commands =
            parse_document("UPDATE BRNV/H4/112 SET genus=Picea,species=abies,code=PICEAB EFFECTIVE 2018-01-01\n")
                .unwrap();
        match &commands[0] {
            Command::Update(u) => {
                assert_eq!(u.assignments.get("genus").unwrap(), "Picea");
                assert_eq!(u.assignments.len(), 3);
            }
            _ => panic!("expected update command"),
        }
    }

    #[test]
    fn parses_split_with_selector_and_date_filter() {
        let commands = parse_document(
            "SPLIT BRNV/H4/112 INTO BRNV/H4/900 PRIMARY EFFECTIVE 2020-06-15 SELECT SMALLEST BEFORE 2020-06-15\n",
        )
        .unwrap();
        match &commands[0] {
            Command::Split(s) => {
                let selector = s.selector.as_ref().unwrap();
                assert_eq!(selector.strategy, SelectorStrategy::Smallest);
                assert!(selector.date_filter.is_some());
            }
            _ => panic!("expected split command"),
        }
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let commands = parse_document("\n# a comment\n  \nALIAS A/B/1 TO A/B/2\n").unwrap();
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn rejects_unknown_keyword() {
        assert!(parse_document("DELETE A/B/1\n").is_err());
    }
}
