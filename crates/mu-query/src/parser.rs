//! MUQL recursive-descent parser

use crate::QueryError;
use crate::ast::*;
use crate::lexer::{Token, TokenKind, tokenize};

pub fn parse(input: &str) -> Result<Query, QueryError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        input_len: input.len(),
    };
    let query = parser.parse_query()?;
    if let Some(extra) = parser.peek() {
        return Err(QueryError::Syntax {
            offset: extra.offset,
            expected: "end of query".to_string(),
        });
    }
    Ok(query)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.input_len)
    }

    fn error(&self, expected: &str) -> QueryError {
        QueryError::Syntax {
            offset: self.offset(),
            expected: expected.to_string(),
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), QueryError> {
        match self.peek() {
            Some(token) if token.is_kw(kw) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error(kw)),
        }
    }

    fn accept_kw(&mut self, kw: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_kw(kw)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), QueryError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Symbol && token.text == symbol => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error(symbol)),
        }
    }

    fn accept_symbol(&mut self, symbol: &str) -> bool {
        if self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Symbol && t.text == symbol)
        {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Token, QueryError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Ident => Ok(self.next().unwrap()),
            _ => Err(self.error(what)),
        }
    }

    /// Node refs may be bare idents or quoted strings.
    fn expect_ref(&mut self, what: &str) -> Result<String, QueryError> {
        match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Ident | TokenKind::StringLit) => {
                Ok(self.next().unwrap().text)
            }
            _ => Err(self.error(what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, QueryError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::StringLit => Ok(self.next().unwrap().text),
            _ => Err(self.error(what)),
        }
    }

    fn expect_number(&mut self, what: &str) -> Result<f64, QueryError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Number => {
                let token = self.next().unwrap();
                token.text.parse::<f64>().map_err(|_| QueryError::Syntax {
                    offset: token.offset,
                    expected: what.to_string(),
                })
            }
            _ => Err(self.error(what)),
        }
    }

    fn expect_table(&mut self) -> Result<Table, QueryError> {
        let token = self.expect_ident("table name")?;
        Table::parse(&token.text).ok_or(QueryError::UnknownTable(token.text))
    }

    fn parse_query(&mut self) -> Result<Query, QueryError> {
        let Some(head) = self.peek() else {
            return Err(self.error("query"));
        };
        if head.is_kw("select") {
            self.parse_select()
        } else if head.is_kw("show") {
            self.parse_show()
        } else if head.is_kw("find") {
            self.parse_find()
        } else if head.is_kw("path") {
            self.parse_path()
        } else if head.is_kw("analyze") {
            self.parse_analyze()
        } else if head.is_kw("describe") {
            self.parse_describe()
        } else {
            Err(QueryError::Syntax {
                offset: head.offset,
                expected: "SELECT, SHOW, FIND, PATH, ANALYZE, or DESCRIBE".to_string(),
            })
        }
    }

    // ── SELECT ───────────────────────────────────────────

    fn parse_select(&mut self) -> Result<Query, QueryError> {
        self.expect_kw("select")?;
        let columns = self.parse_columns()?;
        self.expect_kw("from")?;
        let table = self.expect_table()?;

        let condition = if self.accept_kw("where") {
            Some(self.parse_or()?)
        } else {
            None
        };

        let order_by = if self.accept_kw("order") {
            self.expect_kw("by")?;
            let column = self.expect_ident("order column")?.text;
            let descending = self.accept_kw("desc");
            if !descending {
                self.accept_kw("asc");
            }
            Some((column, descending))
        } else {
            None
        };

        let limit = if self.accept_kw("limit") {
            Some(self.expect_number("row limit")? as u64)
        } else {
            None
        };

        Ok(Query::Select(SelectQuery {
            columns,
            table,
            condition,
            order_by,
            limit,
        }))
    }

    fn parse_columns(&mut self) -> Result<Columns, QueryError> {
        if self.accept_symbol("*") {
            return Ok(Columns::All);
        }

        // Reserved words cannot be column names; catch `SELECT FROM`.
        if self.peek().is_some_and(|t| t.is_kw("from")) {
            return Err(self.error("column list"));
        }
        let first = self.expect_ident("column list")?;
        for (kw, agg) in [
            ("count", None),
            ("avg", Some(true)),
            ("sum", Some(false)),
        ] {
            if first.text.eq_ignore_ascii_case(kw) && self.accept_symbol("(") {
                if agg.is_none() {
                    self.expect_symbol("*")?;
                    self.expect_symbol(")")?;
                    return Ok(Columns::CountStar);
                }
                let column = self.expect_ident("aggregate column")?.text;
                self.expect_symbol(")")?;
                return Ok(match agg {
                    Some(true) => Columns::Avg(column),
                    _ => Columns::Sum(column),
                });
            }
        }

        let mut names = vec![first.text];
        while self.accept_symbol(",") {
            names.push(self.expect_ident("column name")?.text);
        }
        Ok(Columns::Named(names))
    }

    fn parse_or(&mut self) -> Result<Cond, QueryError> {
        let mut left = self.parse_and()?;
        while self.accept_kw("or") {
            let right = self.parse_and()?;
            left = Cond::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Cond, QueryError> {
        let mut left = self.parse_cmp()?;
        while self.accept_kw("and") {
            let right = self.parse_cmp()?;
            left = Cond::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> Result<Cond, QueryError> {
        let column = self.expect_ident("column name")?.text;

        if self.accept_kw("like") {
            let pattern = self.parse_value()?;
            return Ok(Cond::Cmp {
                column,
                op: CmpOp::Like,
                value: pattern,
            });
        }

        let negated = self.accept_kw("not");
        if self.accept_kw("in") {
            self.expect_symbol("(")?;
            let mut values = vec![self.parse_value()?];
            while self.accept_symbol(",") {
                values.push(self.parse_value()?);
            }
            self.expect_symbol(")")?;
            return Ok(Cond::In {
                column,
                values,
                negated,
            });
        }
        if negated {
            return Err(self.error("IN after NOT"));
        }

        let op = match self.next() {
            Some(token) if token.kind == TokenKind::Symbol => match token.text.as_str() {
                "=" => CmpOp::Eq,
                "!=" | "<>" => CmpOp::Ne,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::Ge,
                _ => {
                    return Err(QueryError::Syntax {
                        offset: token.offset,
                        expected: "comparison operator".to_string(),
                    });
                }
            },
            Some(token) => {
                return Err(QueryError::Syntax {
                    offset: token.offset,
                    expected: "comparison operator".to_string(),
                });
            }
            None => return Err(self.error("comparison operator")),
        };
        let value = self.parse_value()?;
        Ok(Cond::Cmp { column, op, value })
    }

    fn parse_value(&mut self) -> Result<Value, QueryError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::StringLit => {
                Ok(Value::Str(self.next().unwrap().text))
            }
            Some(token) if token.kind == TokenKind::Number => {
                let token = self.next().unwrap();
                token
                    .text
                    .parse::<f64>()
                    .map(Value::Num)
                    .map_err(|_| QueryError::Syntax {
                        offset: token.offset,
                        expected: "number".to_string(),
                    })
            }
            // Bare words (node ids, type names) act as strings.
            Some(token) if token.kind == TokenKind::Ident => {
                Ok(Value::Str(self.next().unwrap().text))
            }
            _ => Err(self.error("value")),
        }
    }

    // ── SHOW ─────────────────────────────────────────────

    fn parse_show(&mut self) -> Result<Query, QueryError> {
        self.expect_kw("show")?;
        let relation_token = self.expect_ident("relation")?;
        let relation = ShowRelation::parse(&relation_token.text).ok_or(QueryError::Syntax {
            offset: relation_token.offset,
            expected: "dependencies, dependents, children, callers, callees, impact, or ancestors"
                .to_string(),
        })?;
        self.expect_kw("of")?;
        let node_ref = self.expect_ref("node reference")?;

        let mut depth = None;
        let mut via = None;
        loop {
            if self.accept_kw("depth") {
                depth = Some(self.expect_number("depth")? as u32);
            } else if self.accept_kw("via") {
                via = Some(self.expect_ref("edge type")?);
            } else {
                break;
            }
        }

        Ok(Query::Show(ShowQuery {
            relation,
            node_ref,
            depth,
            via,
        }))
    }

    // ── FIND ─────────────────────────────────────────────

    fn parse_find(&mut self) -> Result<Query, QueryError> {
        self.expect_kw("find")?;

        if self.accept_kw("cycles") {
            let edge_type = if self.accept_kw("where") {
                let column = self.expect_ident("edge_type")?;
                if !column.text.eq_ignore_ascii_case("edge_type") {
                    return Err(QueryError::UnknownColumn(column.text));
                }
                self.expect_symbol("=")?;
                Some(self.expect_ref("edge type")?)
            } else {
                None
            };
            return Ok(Query::FindCycles { edge_type });
        }

        let table = self.expect_table()?;
        if self.accept_kw("matching") {
            let pattern = self.expect_ref("pattern")?;
            return Ok(Query::FindMatching { table, pattern });
        }
        if self.accept_kw("calling") {
            let node_ref = self.expect_ref("node reference")?;
            return Ok(Query::FindCalling { table, node_ref });
        }
        if self.accept_kw("importing") {
            let node_ref = self.expect_ref("node reference")?;
            return Ok(Query::FindImporting { table, node_ref });
        }
        if self.accept_kw("with") {
            self.expect_kw("decorator")?;
            let decorator = self.expect_string("decorator string")?;
            return Ok(Query::FindWithDecorator { table, decorator });
        }
        Err(self.error("MATCHING, CALLING, IMPORTING, or WITH DECORATOR"))
    }

    // ── PATH ─────────────────────────────────────────────

    fn parse_path(&mut self) -> Result<Query, QueryError> {
        self.expect_kw("path")?;
        self.expect_kw("from")?;
        let from = self.expect_ref("node reference")?;
        self.expect_kw("to")?;
        let to = self.expect_ref("node reference")?;

        let mut max_depth = None;
        let mut via = None;
        loop {
            if self.accept_kw("max") {
                self.expect_kw("depth")?;
                max_depth = Some(self.expect_number("depth")? as u32);
            } else if self.accept_kw("via") {
                via = Some(self.expect_ref("edge type")?);
            } else {
                break;
            }
        }

        Ok(Query::Path {
            from,
            to,
            max_depth,
            via,
        })
    }

    // ── ANALYZE / DESCRIBE ───────────────────────────────

    fn parse_analyze(&mut self) -> Result<Query, QueryError> {
        self.expect_kw("analyze")?;
        let what = self.expect_ident("complexity, hotspots, circular, or impact")?;
        let kind = match what.text.to_ascii_lowercase().as_str() {
            "complexity" => AnalyzeKind::Complexity,
            "hotspots" => AnalyzeKind::Hotspots,
            "circular" => AnalyzeKind::Circular,
            "impact" => AnalyzeKind::Impact,
            _ => {
                return Err(QueryError::Syntax {
                    offset: what.offset,
                    expected: "complexity, hotspots, circular, or impact".to_string(),
                });
            }
        };
        let node_ref = if self.accept_kw("for") {
            Some(self.expect_ref("node reference")?)
        } else {
            None
        };
        Ok(Query::Analyze { kind, node_ref })
    }

    fn parse_describe(&mut self) -> Result<Query, QueryError> {
        self.expect_kw("describe")?;
        let what = self.expect_ident("tables or a table name")?;
        if what.text.eq_ignore_ascii_case("tables") {
            return Ok(Query::Describe(None));
        }
        let table = Table::parse(&what.text).ok_or(QueryError::UnknownTable(what.text))?;
        Ok(Query::Describe(Some(table)))
    }
}
