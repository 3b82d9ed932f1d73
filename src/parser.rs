use std::str::FromStr;

use strum::IntoDiscriminant;

use crate::ast::{NodeKind, Scalar, SyntaxNode, Token, TokenType, TokenTypeVariant};
use crate::error::SyntaxError;
use crate::scanner::Scanner;

const NON_ALIAS_KEYWORDS: [&str; 3] = ["minus", "fetch", "natural"];
const TYPED_LITERAL_KEYWORDS: [&str; 3] = ["date", "time", "timestamp"];
const INTERVAL_UNITS: [&str; 6] = ["year", "month", "day", "hour", "minute", "second"];

/// Anything that turns SQL text into a [`SyntaxNode`] tree.
pub trait SqlParser {
    fn parse(&self, sql: &str) -> Result<SyntaxNode, SyntaxError>;
}

/// The built-in parser for the Dremio SQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DremioSqlParser;

impl SqlParser for DremioSqlParser {
    fn parse(&self, sql: &str) -> Result<SyntaxNode, SyntaxError> {
        parse_sql(sql)
    }
}

pub struct Parser<'a> {
    source_tokens: &'a Vec<Token>,
    curr: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a Vec<Token>) -> Parser<'a> {
        Self {
            source_tokens: tokens,
            curr: 0,
        }
    }

    pub fn parse(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.parse_statements()
    }

    fn peek_prev(&self) -> &Token {
        &self.source_tokens[self.curr - 1]
    }

    fn peek(&self) -> &Token {
        &self.source_tokens[self.curr]
    }

    fn peek_next_i(&self, i: usize) -> &Token {
        let last = self.source_tokens.len() - 1; // Eof
        &self.source_tokens[std::cmp::min(self.curr + i, last)]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            // Do not advance if we peek Eof
            self.curr += 1;
        }
        self.peek_prev()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn check_token_type(&self, token_type: TokenTypeVariant) -> bool {
        self.peek().kind.discriminant() == token_type
    }

    fn match_token_type(&mut self, token_type: TokenTypeVariant) -> bool {
        if self.check_token_type(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_token_types(&mut self, token_types: &[TokenTypeVariant]) -> bool {
        for tok in token_types {
            if self.check_token_type(*tok) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check_non_reserved_keyword(&self, value: &str) -> bool {
        match &self.peek().kind {
            TokenType::Identifier(ident) => ident.to_lowercase() == value,
            _ => false,
        }
    }

    fn match_non_reserved_keyword(&mut self, value: &str) -> bool {
        if self.check_non_reserved_keyword(value) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_non_reserved_keyword(&mut self, value: &str) -> Result<&Token, SyntaxError> {
        if self.check_non_reserved_keyword(value) {
            Ok(self.advance())
        } else {
            let err_msg = format!("Expected `{}`.", value.to_uppercase());
            Err(self.error(self.peek(), &err_msg))
        }
    }

    fn consume_one_of_non_reserved_keywords(
        &mut self,
        values: &[&str],
    ) -> Result<&Token, SyntaxError> {
        for value in values {
            if self.check_non_reserved_keyword(value) {
                return Ok(self.advance());
            }
        }
        let err_msg = values
            .iter()
            .map(|el| format!("`{}`", el.to_uppercase()))
            .collect::<Vec<String>>()
            .join(" or ");
        Err(self.error(self.peek(), &format!("Expected one of: {}.", err_msg)))
    }

    fn consume(&mut self, token_type: TokenTypeVariant) -> Result<&Token, SyntaxError> {
        if self.check_token_type(token_type) {
            Ok(self.advance())
        } else {
            let err_msg = format!("Expected `{}`.", token_type.variant_str());
            Err(self.error(self.peek(), &err_msg))
        }
    }

    fn check_identifier(&self) -> bool {
        self.check_token_type(TokenTypeVariant::Identifier)
            || self.check_token_type(TokenTypeVariant::QuotedIdentifier)
    }

    fn consume_identifier(&mut self) -> Result<&Token, SyntaxError> {
        self.consume_one_of(&[
            TokenTypeVariant::Identifier,
            TokenTypeVariant::QuotedIdentifier,
        ])
    }

    fn consume_one_of(&mut self, token_types: &[TokenTypeVariant]) -> Result<&Token, SyntaxError> {
        for token_type in token_types {
            if self.check_token_type(*token_type) {
                return Ok(self.advance());
            }
        }
        let err_msg = token_types
            .iter()
            .map(|el| format!("`{}`", el.variant_str()))
            .collect::<Vec<String>>()
            .join(" or ");
        Err(self.error(self.peek(), &format!("Expected one of: {}.", err_msg)))
    }

    fn check_query_start(&self) -> bool {
        self.check_token_type(TokenTypeVariant::Select)
            || self.check_token_type(TokenTypeVariant::With)
    }

    fn error(&self, token: &Token, message: &str) -> SyntaxError {
        SyntaxError::at(
            token.line,
            token.col,
            format!("Error at '{}': {}", token.lexeme, message),
        )
    }

    // statements -> statement (";" statement)* [";"]
    fn parse_statements(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let mut statements = vec![];

        loop {
            while self.match_token_type(TokenTypeVariant::Semicolon) {}
            if self.check_token_type(TokenTypeVariant::Eof) {
                break;
            }

            statements.push(self.parse_statement()?);

            if !self.match_token_type(TokenTypeVariant::Semicolon) {
                break;
            }
        }

        if !self.is_at_end() {
            return Err(self.error(self.peek(), "Expected `;` or end of input."));
        }
        Ok(SyntaxNode::new(NodeKind::Statements).with_nodes("statements", statements))
    }

    fn parse_statement(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let peek = self.peek().clone();

        match &peek.kind {
            TokenType::Identifier(non_reserved_keyword) => {
                match non_reserved_keyword.to_lowercase().as_str() {
                    "insert" => self.parse_insert_statement(),
                    "create" => self.parse_create_statement(),
                    "drop" => self.parse_drop_statement(),
                    _ => Err(self.error(
                        &peek,
                        &format!(
                            "Unexpected non reserved keyword: `{}`.",
                            non_reserved_keyword
                        ),
                    )),
                }
            }
            _ => self.parse_query_expr(),
        }
    }

    // insert -> "INSERT" "INTO" table_name ["(" identifier ("," identifier)* ")"] (query_expr | "VALUES" row ("," row)*)
    // row -> "(" expr ("," expr)* ")"
    fn parse_insert_statement(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume_non_reserved_keyword("insert")?;
        self.consume_non_reserved_keyword("into")?;
        let table = self.parse_table_factor()?;

        let mut columns = vec![];
        if self.check_token_type(TokenTypeVariant::LeftParen) && {
            let next = &self.peek_next_i(1).kind;
            matches!(next, TokenType::Identifier(_) | TokenType::QuotedIdentifier(_))
        } {
            self.advance();
            loop {
                columns.push(self.parse_identifier()?);
                if !self.match_token_type(TokenTypeVariant::Comma) {
                    break;
                }
            }
            self.consume(TokenTypeVariant::RightParen)?;
        }

        let insert = SyntaxNode::new(NodeKind::Insert)
            .with_node("table", table)
            .with_nodes("columns", columns);

        if self.match_non_reserved_keyword("values") {
            let mut rows = vec![];
            loop {
                self.consume(TokenTypeVariant::LeftParen)?;
                let values = self.parse_expr_list()?;
                self.consume(TokenTypeVariant::RightParen)?;
                rows.push(SyntaxNode::new(NodeKind::Row).with_nodes("values", values));
                if !self.match_token_type(TokenTypeVariant::Comma) {
                    break;
                }
            }
            Ok(insert.with_nodes("rows", rows))
        } else {
            let query = self.parse_query_expr()?;
            Ok(insert.with_node("query", query))
        }
    }

    // create -> "CREATE" ["OR" "REPLACE"] ("TABLE" | "VIEW" | "VDS") table_name "AS" query_expr
    fn parse_create_statement(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume_non_reserved_keyword("create")?;
        let replace = if self.match_token_type(TokenTypeVariant::Or) {
            self.consume_non_reserved_keyword("replace")?;
            true
        } else {
            false
        };
        let kind = match self
            .consume_one_of_non_reserved_keywords(&["table", "view", "vds"])?
            .lexeme
            .to_lowercase()
            .as_str()
        {
            "table" => NodeKind::CreateTable,
            _ => NodeKind::CreateView,
        };
        let name = self.parse_table_factor()?;
        self.consume(TokenTypeVariant::As)?;
        let query = self.parse_query_expr()?;

        Ok(SyntaxNode::new(kind)
            .with_scalar("replace", replace)
            .with_node("name", name)
            .with_node("query", query))
    }

    // drop -> "DROP" ("TABLE" | "VIEW" | "VDS") ["IF" "EXISTS"] table_name
    fn parse_drop_statement(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume_non_reserved_keyword("drop")?;
        let object_kind = self
            .consume_one_of_non_reserved_keywords(&["table", "view", "vds"])?
            .lexeme
            .to_uppercase();
        let if_exists = if self.match_non_reserved_keyword("if") {
            self.consume(TokenTypeVariant::Exists)?;
            true
        } else {
            false
        };
        let name = self.parse_table_factor()?;

        Ok(SyntaxNode::new(NodeKind::Drop)
            .with_value(object_kind)
            .with_scalar("if_exists", if_exists)
            .with_node("name", name))
    }

    // query_expr -> [with] set_expr ["ORDER" "BY" order_by_expr] ["LIMIT" limit_value]
    //               ["OFFSET" limit_value ["ROW" | "ROWS"]] [fetch]
    fn parse_query_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let with = if self.match_token_type(TokenTypeVariant::With) {
            Some(self.parse_with()?)
        } else {
            None
        };

        let body = self.parse_set_expr()?;

        let order_by = if self.match_token_type(TokenTypeVariant::Order) {
            self.consume(TokenTypeVariant::By)?;
            self.parse_order_by_expr()?
        } else {
            vec![]
        };

        let limit = if self.match_token_type(TokenTypeVariant::Limit) {
            Some(self.parse_limit_value()?)
        } else {
            None
        };

        let offset = if self.match_token_type(TokenTypeVariant::Offset) {
            let offset = self.parse_limit_value()?;
            if !self.match_non_reserved_keyword("rows") {
                self.match_non_reserved_keyword("row");
            }
            Some(offset)
        } else {
            None
        };

        let fetch = if self.match_non_reserved_keyword("fetch") {
            Some(self.parse_fetch()?)
        } else {
            None
        };

        Ok(SyntaxNode::new(NodeKind::Query)
            .with_opt_node("with", with)
            .with_node("body", body)
            .with_nodes("order_by", order_by)
            .with_opt_node("limit", limit)
            .with_opt_node("offset", offset)
            .with_opt_node("fetch", fetch))
    }

    // fetch -> "FETCH" ("FIRST" | "NEXT") ["Number"] ("ROW" | "ROWS") "ONLY"
    fn parse_fetch(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume_one_of_non_reserved_keywords(&["first", "next"])?;
        let count = if self.check_token_type(TokenTypeVariant::Number) {
            number_scalar(&self.advance().lexeme)
        } else {
            Scalar::Number(serde_json::Number::from(1u64))
        };
        self.consume_one_of_non_reserved_keywords(&["rows", "row"])?;
        self.consume_non_reserved_keyword("only")?;
        Ok(SyntaxNode::new(NodeKind::Literal).with_value(count))
    }

    // limit_value -> "Number" | "ALL"
    fn parse_limit_value(&mut self) -> Result<SyntaxNode, SyntaxError> {
        if self.match_token_type(TokenTypeVariant::All) {
            return Ok(SyntaxNode::new(NodeKind::Literal).with_value("ALL"));
        }
        let token = self.consume(TokenTypeVariant::Number)?;
        Ok(SyntaxNode::new(NodeKind::Literal).with_value(number_scalar(&token.lexeme)))
    }

    // with -> "WITH" cte ("," cte)*
    // cte -> identifier ["(" identifier ("," identifier)* ")"] "AS" "(" query_expr ")"
    fn parse_with(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let mut ctes = vec![];
        loop {
            let name = identifier_text(self.consume_identifier()?);
            let mut columns = vec![];
            if self.match_token_type(TokenTypeVariant::LeftParen) {
                loop {
                    columns.push(self.parse_identifier()?);
                    if !self.match_token_type(TokenTypeVariant::Comma) {
                        break;
                    }
                }
                self.consume(TokenTypeVariant::RightParen)?;
            }
            self.consume(TokenTypeVariant::As)?;
            self.consume(TokenTypeVariant::LeftParen)?;
            let query = self.parse_query_expr()?;
            self.consume(TokenTypeVariant::RightParen)?;
            ctes.push(
                SyntaxNode::new(NodeKind::Cte)
                    .with_value(name)
                    .with_nodes("columns", columns)
                    .with_node("query", query),
            );

            if !self.match_token_type(TokenTypeVariant::Comma) {
                break;
            }
        }
        Ok(SyntaxNode::new(NodeKind::With).with_nodes("ctes", ctes))
    }

    // set_expr -> set_operand (set_operator set_operand)*
    // set_operator -> "UNION" ["ALL" | "DISTINCT"] | "INTERSECT" ["ALL" | "DISTINCT"] | "EXCEPT" ["ALL" | "DISTINCT"] | "MINUS"
    fn parse_set_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let mut output = self.parse_set_operand()?;

        loop {
            let operator = if self.match_token_type(TokenTypeVariant::Union) {
                "UNION"
            } else if self.match_token_type(TokenTypeVariant::Intersect) {
                "INTERSECT"
            } else if self.match_token_type(TokenTypeVariant::Except) {
                "EXCEPT"
            } else if self.match_non_reserved_keyword("minus") {
                "MINUS"
            } else {
                break;
            };
            let operator = if operator != "MINUS" && self.match_token_type(TokenTypeVariant::All) {
                format!("{} ALL", operator)
            } else if operator != "MINUS" && self.match_token_type(TokenTypeVariant::Distinct) {
                format!("{} DISTINCT", operator)
            } else {
                operator.to_owned()
            };

            let right = self.parse_set_operand()?;
            output = SyntaxNode::new(NodeKind::SetOperation)
                .with_value(operator)
                .with_node("left", output)
                .with_node("right", right);
        }

        Ok(output)
    }

    // set_operand -> select | "(" query_expr ")"
    fn parse_set_operand(&mut self) -> Result<SyntaxNode, SyntaxError> {
        if self.match_token_type(TokenTypeVariant::LeftParen) {
            let query = self.parse_query_expr()?;
            self.consume(TokenTypeVariant::RightParen)?;
            Ok(query)
        } else if self.check_token_type(TokenTypeVariant::Select) {
            self.parse_select()
        } else {
            Err(self.error(self.peek(), "Expected `SELECT` or `(`."))
        }
    }

    // select -> "SELECT" ["ALL" | "DISTINCT"] select_item ("," select_item)* ["FROM" from_expr] ["WHERE" expr]
    //           ["GROUP" "BY" expr ("," expr)*] ["HAVING" expr]
    fn parse_select(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume(TokenTypeVariant::Select)?;
        let distinct = if self.match_token_type(TokenTypeVariant::Distinct) {
            true
        } else {
            self.match_token_type(TokenTypeVariant::All);
            false
        };

        let mut items = vec![];
        loop {
            items.push(self.parse_select_item()?);
            if !self.match_token_type(TokenTypeVariant::Comma) {
                break;
            }
        }

        let from = if self.match_token_type(TokenTypeVariant::From) {
            Some(self.parse_from_expr()?)
        } else {
            None
        };

        let r#where = if self.match_token_type(TokenTypeVariant::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let group_by = if self.match_token_type(TokenTypeVariant::Group) {
            self.consume(TokenTypeVariant::By)?;
            self.parse_expr_list()?
        } else {
            vec![]
        };

        let having = if self.match_token_type(TokenTypeVariant::Having) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        Ok(SyntaxNode::new(NodeKind::Select)
            .with_scalar("distinct", distinct)
            .with_nodes("items", items)
            .with_opt_node("from", from)
            .with_opt_node("where", r#where)
            .with_nodes("group_by", group_by)
            .with_opt_node("having", having))
    }

    // select_item -> expr [as_alias]
    fn parse_select_item(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let expr = self.parse_expr()?;
        let item = SyntaxNode::new(NodeKind::SelectItem).with_node("expr", expr);
        match self.parse_as_alias()? {
            Some(alias) => Ok(item.with_scalar("alias", alias)),
            None => Ok(item),
        }
    }

    // as_alias -> ["AS"] ("Identifier" | "QuotedIdentifier")
    fn parse_as_alias(&mut self) -> Result<Option<String>, SyntaxError> {
        if self.match_token_type(TokenTypeVariant::As) {
            return Ok(Some(identifier_text(self.consume_identifier()?)));
        }
        // Non reserved keywords that may follow a from item or a select item
        if self.check_identifier()
            && !NON_ALIAS_KEYWORDS
                .iter()
                .any(|keyword| self.check_non_reserved_keyword(keyword))
        {
            return Ok(Some(identifier_text(self.advance())));
        }
        Ok(None)
    }

    // order_by_expr -> expr ["ASC" | "DESC"] ["NULLS" ("FIRST" | "LAST")] ("," order_by_expr)*
    fn parse_order_by_expr(&mut self) -> Result<Vec<SyntaxNode>, SyntaxError> {
        let mut items = vec![];
        loop {
            let expr = self.parse_expr()?;
            let mut item = SyntaxNode::new(NodeKind::OrderByItem).with_node("expr", expr);
            if self.match_token_types(&[TokenTypeVariant::Asc, TokenTypeVariant::Desc]) {
                let direction = self.peek_prev().lexeme.to_uppercase();
                item = item.with_scalar("direction", direction);
            }
            if self.match_non_reserved_keyword("nulls") {
                let nulls = self
                    .consume_one_of_non_reserved_keywords(&["first", "last"])?
                    .lexeme
                    .to_uppercase();
                item = item.with_scalar("nulls", nulls);
            }
            items.push(item);
            if !self.match_token_type(TokenTypeVariant::Comma) {
                break;
            }
        }
        Ok(items)
    }

    // from_expr -> from_item (join_operator from_item [join_cond] | "," from_item)*
    // join_operator -> ["NATURAL"] (["INNER"] "JOIN" | ("LEFT" | "RIGHT" | "FULL") ["OUTER"] "JOIN")
    //                | "CROSS" "JOIN"
    fn parse_from_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let mut output = self.parse_from_item_expr()?;

        loop {
            let natural = self.match_non_reserved_keyword("natural");
            if natural && self.check_token_type(TokenTypeVariant::Cross) {
                return Err(self.error(self.peek(), "Expected `JOIN`."));
            }
            let join_kind = match self.peek().kind {
                TokenType::Inner | TokenType::Join => {
                    self.match_token_type(TokenTypeVariant::Inner);
                    "INNER"
                }
                TokenType::Left => {
                    self.advance();
                    self.match_token_type(TokenTypeVariant::Outer);
                    "LEFT"
                }
                TokenType::Right => {
                    self.advance();
                    self.match_token_type(TokenTypeVariant::Outer);
                    "RIGHT"
                }
                TokenType::Full => {
                    self.advance();
                    self.match_token_type(TokenTypeVariant::Outer);
                    "FULL"
                }
                TokenType::Cross => {
                    self.advance();
                    "CROSS"
                }
                TokenType::Comma if !natural => {
                    self.advance();
                    let right = self.parse_from_item_expr()?;
                    output = SyntaxNode::new(NodeKind::Join)
                        .with_value("CROSS")
                        .with_node("left", output)
                        .with_node("right", right);
                    continue;
                }
                _ if natural => return Err(self.error(self.peek(), "Expected `JOIN`.")),
                _ => break,
            };
            self.consume(TokenTypeVariant::Join)?;
            let right = self.parse_from_item_expr()?;
            let join = SyntaxNode::new(NodeKind::Join)
                .with_value(join_kind)
                .with_node("left", output)
                .with_node("right", right);
            output = if natural {
                join.with_scalar("natural", true)
            } else if join_kind == "CROSS" {
                join
            } else {
                self.parse_join_cond(join)?
            };
        }
        Ok(output)
    }

    // join_cond -> "ON" expr | "USING" "(" identifier ("," identifier)* ")"
    fn parse_join_cond(&mut self, join: SyntaxNode) -> Result<SyntaxNode, SyntaxError> {
        if self.match_token_type(TokenTypeVariant::On) {
            let bool_expr = self.parse_expr()?;
            Ok(join.with_node("on", bool_expr))
        } else if self.match_token_type(TokenTypeVariant::Using) {
            self.consume(TokenTypeVariant::LeftParen)?;
            let mut using = vec![];
            loop {
                using.push(self.parse_identifier()?);
                if !self.match_token_type(TokenTypeVariant::Comma) {
                    break;
                }
            }
            self.consume(TokenTypeVariant::RightParen)?;
            Ok(join.with_nodes("using", using))
        } else {
            Err(self.error(self.peek(), "Expected `ON` or `USING`."))
        }
    }

    // from_item_expr -> table_name [as_alias] | "(" query_expr ")" [as_alias] | "(" from_expr ")"
    //                 | "TABLE" "(" function_expr ")" [as_alias]
    fn parse_from_item_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        if self.match_token_type(TokenTypeVariant::LeftParen) {
            let curr = self.curr;
            // lookahead to check whether we can parse a query expr
            while self.peek().kind == TokenType::LeftParen {
                self.curr += 1;
            }
            let is_query = self.check_query_start();
            self.curr = curr;
            if !is_query {
                return self.parse_parenthesized_join();
            }
            match self.parse_parenthesized_subquery() {
                Ok(subquery) => Ok(subquery),
                Err(query_err) => {
                    // `((select ...) x join y ...)` starts like a subquery but is a join
                    let query_err_at = self.curr;
                    self.curr = curr;
                    match self.parse_parenthesized_join() {
                        Ok(join) => Ok(join),
                        Err(join_err) if self.curr >= query_err_at => Err(join_err),
                        Err(_) => Err(query_err),
                    }
                }
            }
        } else if self.check_non_reserved_keyword("table")
            && self.peek_next_i(1).kind == TokenType::LeftParen
        {
            self.advance();
            self.advance();
            let function = self.parse_expr()?;
            if function.kind != NodeKind::FunctionCall {
                return Err(self.error(self.peek_prev(), "Expected table function call."));
            }
            self.consume(TokenTypeVariant::RightParen)?;
            let table_function =
                SyntaxNode::new(NodeKind::TableFunction).with_node("function", function);
            Ok(with_alias(table_function, self.parse_as_alias()?))
        } else {
            let table = self.parse_table_factor()?;
            Ok(with_alias(table, self.parse_as_alias()?))
        }
    }

    // "(" query_expr ")" [as_alias], after the opening parenthesis
    fn parse_parenthesized_subquery(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let query = self.parse_query_expr()?;
        self.consume(TokenTypeVariant::RightParen)?;
        let subquery = SyntaxNode::new(NodeKind::Subquery).with_node("query", query);
        Ok(with_alias(subquery, self.parse_as_alias()?))
    }

    // "(" from_expr ")", after the opening parenthesis
    fn parse_parenthesized_join(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let from_expr = self.parse_from_expr()?;
        if from_expr.kind != NodeKind::Join {
            return Err(self.error(self.peek(), "Expected `JOIN`."));
        }
        self.consume(TokenTypeVariant::RightParen)?;
        Ok(from_expr)
    }

    // table_name -> identifier ("." identifier)*
    fn parse_table_factor(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let name = self.parse_compound_name()?;
        Ok(SyntaxNode::new(NodeKind::TableFactor).with_value(name))
    }

    /// Dotted name as written, quoted parts keeping their quotes, without whitespace.
    fn parse_compound_name(&mut self) -> Result<String, SyntaxError> {
        let mut parts = vec![self.consume_identifier()?.lexeme.clone()];
        while self.check_token_type(TokenTypeVariant::Dot)
            && matches!(
                self.peek_next_i(1).kind,
                TokenType::Identifier(_) | TokenType::QuotedIdentifier(_)
            )
        {
            self.advance();
            parts.push(self.advance().lexeme.clone());
        }
        Ok(parts.join("."))
    }

    fn parse_identifier(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let name = identifier_text(self.consume_identifier()?);
        Ok(SyntaxNode::new(NodeKind::Identifier).with_value(name))
    }

    fn parse_expr_list(&mut self) -> Result<Vec<SyntaxNode>, SyntaxError> {
        let mut exprs = vec![];
        loop {
            exprs.push(self.parse_expr()?);
            if !self.match_token_type(TokenTypeVariant::Comma) {
                break;
            }
        }
        Ok(exprs)
    }

    fn parse_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.parse_or_expr()
    }

    fn parse_standard_binary_expr(
        &mut self,
        operators: &[TokenTypeVariant],
        parse_operand: fn(&mut Self) -> Result<SyntaxNode, SyntaxError>,
    ) -> Result<SyntaxNode, SyntaxError> {
        let mut output = parse_operand(self)?;
        while self.match_token_types(operators) {
            let operator = self.peek_prev().lexeme.to_uppercase();
            let right = parse_operand(self)?;
            output = SyntaxNode::new(NodeKind::Binary)
                .with_value(operator)
                .with_node("left", output)
                .with_node("right", right);
        }
        Ok(output)
    }

    fn parse_or_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.parse_standard_binary_expr(&[TokenTypeVariant::Or], Self::parse_and_expr)
    }

    fn parse_and_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.parse_standard_binary_expr(&[TokenTypeVariant::And], Self::parse_not_expr)
    }

    fn parse_not_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        if self.match_token_type(TokenTypeVariant::Not) {
            let operand = self.parse_not_expr()?;
            return Ok(SyntaxNode::new(NodeKind::Unary)
                .with_value("NOT")
                .with_node("operand", operand));
        }
        self.parse_comparison_expr()
    }

    // comparison -> add (("=" | "<>" | "<" | "<=" | ">" | ">=") add
    //             | "IS" ["NOT"] "NULL"
    //             | ["NOT"] "IN" "(" (query_expr | expr ("," expr)*) ")"
    //             | ["NOT"] "BETWEEN" add "AND" add
    //             | ["NOT"] "LIKE" add)
    fn parse_comparison_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let left = self.parse_add_expr()?;

        if self.match_token_types(&[
            TokenTypeVariant::Equal,
            TokenTypeVariant::NotEqual,
            TokenTypeVariant::Less,
            TokenTypeVariant::LessEqual,
            TokenTypeVariant::Greater,
            TokenTypeVariant::GreaterEqual,
        ]) {
            let operator = self.peek_prev().lexeme.clone();
            let right = self.parse_add_expr()?;
            return Ok(SyntaxNode::new(NodeKind::Binary)
                .with_value(operator)
                .with_node("left", left)
                .with_node("right", right));
        }

        if self.match_token_type(TokenTypeVariant::Is) {
            let negated = self.match_token_type(TokenTypeVariant::Not);
            self.consume(TokenTypeVariant::Null)?;
            return Ok(SyntaxNode::new(NodeKind::IsNull)
                .with_node("expr", left)
                .with_scalar("negated", negated));
        }

        let negated = self.check_token_type(TokenTypeVariant::Not)
            && matches!(
                self.peek_next_i(1).kind,
                TokenType::In | TokenType::Between | TokenType::Like
            );
        if negated {
            self.advance();
        }

        if self.match_token_type(TokenTypeVariant::In) {
            self.consume(TokenTypeVariant::LeftParen)?;
            let node = if self.check_query_start() {
                let query = self.parse_query_expr()?;
                SyntaxNode::new(NodeKind::InSubquery)
                    .with_node("expr", left)
                    .with_node("query", query)
            } else {
                let list = self.parse_expr_list()?;
                SyntaxNode::new(NodeKind::InList)
                    .with_node("expr", left)
                    .with_nodes("list", list)
            };
            self.consume(TokenTypeVariant::RightParen)?;
            Ok(node.with_scalar("negated", negated))
        } else if self.match_token_type(TokenTypeVariant::Between) {
            let low = self.parse_add_expr()?;
            self.consume(TokenTypeVariant::And)?;
            let high = self.parse_add_expr()?;
            Ok(SyntaxNode::new(NodeKind::Between)
                .with_node("expr", left)
                .with_node("low", low)
                .with_node("high", high)
                .with_scalar("negated", negated))
        } else if self.match_token_type(TokenTypeVariant::Like) {
            let pattern = self.parse_add_expr()?;
            Ok(SyntaxNode::new(NodeKind::Like)
                .with_node("expr", left)
                .with_node("pattern", pattern)
                .with_scalar("negated", negated))
        } else {
            Ok(left)
        }
    }

    fn parse_add_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.parse_standard_binary_expr(
            &[
                TokenTypeVariant::Plus,
                TokenTypeVariant::Minus,
                TokenTypeVariant::ConcatOperator,
            ],
            Self::parse_mul_expr,
        )
    }

    fn parse_mul_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.parse_standard_binary_expr(
            &[
                TokenTypeVariant::Star,
                TokenTypeVariant::Slash,
                TokenTypeVariant::Percent,
            ],
            Self::parse_unary_expr,
        )
    }

    fn parse_unary_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        if self.match_token_types(&[TokenTypeVariant::Minus, TokenTypeVariant::Plus]) {
            let operator = self.peek_prev().lexeme.clone();
            let operand = self.parse_unary_expr()?;
            return Ok(SyntaxNode::new(NodeKind::Unary)
                .with_value(operator)
                .with_node("operand", operand));
        }
        self.parse_primary_expr()
    }

    // cast -> "CAST" "(" expr "AS" data_type ")"
    // data_type -> identifier+ ["(" "Number" ("," "Number")* ")"]
    fn parse_cast_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume(TokenTypeVariant::Cast)?;
        self.consume(TokenTypeVariant::LeftParen)?;
        let expr = self.parse_expr()?;
        self.consume(TokenTypeVariant::As)?;

        let mut type_words = vec![self.consume_identifier()?.lexeme.to_uppercase()];
        while self.check_identifier() {
            type_words.push(self.advance().lexeme.to_uppercase());
        }
        let mut params = vec![];
        if self.match_token_type(TokenTypeVariant::LeftParen) {
            loop {
                let param = self.consume(TokenTypeVariant::Number)?;
                params.push(
                    SyntaxNode::new(NodeKind::Literal).with_value(number_scalar(&param.lexeme)),
                );
                if !self.match_token_type(TokenTypeVariant::Comma) {
                    break;
                }
            }
            self.consume(TokenTypeVariant::RightParen)?;
        }
        self.consume(TokenTypeVariant::RightParen)?;

        let data_type = SyntaxNode::new(NodeKind::DataType)
            .with_value(type_words.join(" "))
            .with_nodes("params", params);
        Ok(SyntaxNode::new(NodeKind::Cast)
            .with_node("expr", expr)
            .with_node("type", data_type))
    }

    fn parse_string_literal(&mut self) -> Result<String, SyntaxError> {
        let token = self.consume(TokenTypeVariant::String)?.clone();
        match token.kind {
            TokenType::String(value) => Ok(value),
            _ => Err(self.error(&token, "Expected String.")),
        }
    }

    // interval -> "INTERVAL" ("String" | "Number") interval_unit ["TO" interval_unit]
    fn parse_interval_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume_non_reserved_keyword("interval")?;
        let value = if self.check_token_type(TokenTypeVariant::Number) {
            number_scalar(&self.advance().lexeme)
        } else {
            Scalar::String(self.parse_string_literal()?)
        };
        let mut unit = self.parse_interval_unit()?;
        if self.match_non_reserved_keyword("to") {
            unit = format!("{} TO {}", unit, self.parse_interval_unit()?);
        }
        Ok(SyntaxNode::new(NodeKind::Interval)
            .with_value(value)
            .with_scalar("unit", unit))
    }

    // interval_unit -> unit ["(" "Number" ["," "Number"] ")"]
    fn parse_interval_unit(&mut self) -> Result<String, SyntaxError> {
        let unit = self
            .consume_one_of_non_reserved_keywords(&INTERVAL_UNITS)?
            .lexeme
            .to_uppercase();
        if self.match_token_type(TokenTypeVariant::LeftParen) {
            self.consume(TokenTypeVariant::Number)?;
            if self.match_token_type(TokenTypeVariant::Comma) {
                self.consume(TokenTypeVariant::Number)?;
            }
            self.consume(TokenTypeVariant::RightParen)?;
        }
        Ok(unit)
    }

    // extract -> "EXTRACT" "(" identifier "FROM" expr ")"
    fn parse_extract_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume_non_reserved_keyword("extract")?;
        self.consume(TokenTypeVariant::LeftParen)?;
        let unit = self.consume_identifier()?.lexeme.to_uppercase();
        self.consume(TokenTypeVariant::From)?;
        let expr = self.parse_expr()?;
        self.consume(TokenTypeVariant::RightParen)?;
        Ok(SyntaxNode::new(NodeKind::Extract)
            .with_value(unit)
            .with_node("expr", expr))
    }

    // case -> "CASE" [expr] ("WHEN" expr "THEN" expr)+ ["ELSE" expr] "END"
    fn parse_case_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume(TokenTypeVariant::Case)?;
        let operand = if self.check_token_type(TokenTypeVariant::When) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        let mut whens = vec![];
        self.consume(TokenTypeVariant::When)?;
        loop {
            let condition = self.parse_expr()?;
            self.consume(TokenTypeVariant::Then)?;
            let result = self.parse_expr()?;
            whens.push(
                SyntaxNode::new(NodeKind::When)
                    .with_node("condition", condition)
                    .with_node("result", result),
            );
            if !self.match_token_type(TokenTypeVariant::When) {
                break;
            }
        }

        let r#else = if self.match_token_type(TokenTypeVariant::Else) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.consume(TokenTypeVariant::End)?;

        Ok(SyntaxNode::new(NodeKind::Case)
            .with_opt_node("operand", operand)
            .with_nodes("whens", whens)
            .with_opt_node("else", r#else))
    }

    // function_expr -> name "(" ["DISTINCT" | "ALL"] [expr ("," expr)*] ")" ["OVER" window]
    fn parse_function_expr(&mut self, name: String) -> Result<SyntaxNode, SyntaxError> {
        self.consume(TokenTypeVariant::LeftParen)?;
        let distinct = if self.match_token_type(TokenTypeVariant::Distinct) {
            true
        } else {
            self.match_token_type(TokenTypeVariant::All);
            false
        };
        let args = if self.check_token_type(TokenTypeVariant::RightParen) {
            vec![]
        } else {
            self.parse_expr_list()?
        };
        self.consume(TokenTypeVariant::RightParen)?;

        let mut function = SyntaxNode::new(NodeKind::FunctionCall).with_value(name);
        if distinct {
            function = function.with_scalar("distinct", true);
        }
        function = function.with_nodes("args", args);

        if self.match_token_type(TokenTypeVariant::Over) {
            let window = self.parse_window()?;
            function = function.with_node("over", window);
        }
        Ok(function)
    }

    // window -> "(" ["PARTITION" "BY" expr ("," expr)*] ["ORDER" "BY" order_by_expr] ")"
    fn parse_window(&mut self) -> Result<SyntaxNode, SyntaxError> {
        self.consume(TokenTypeVariant::LeftParen)?;
        let partition_by = if self.match_token_type(TokenTypeVariant::Partition) {
            self.consume(TokenTypeVariant::By)?;
            self.parse_expr_list()?
        } else {
            vec![]
        };
        let order_by = if self.match_token_type(TokenTypeVariant::Order) {
            self.consume(TokenTypeVariant::By)?;
            self.parse_order_by_expr()?
        } else {
            vec![]
        };
        self.consume(TokenTypeVariant::RightParen)?;
        Ok(SyntaxNode::new(NodeKind::Window)
            .with_nodes("partition_by", partition_by)
            .with_nodes("order_by", order_by))
    }

    fn parse_primary_expr(&mut self) -> Result<SyntaxNode, SyntaxError> {
        let peek_token = self.peek().clone();

        let primary_expr = match &peek_token.kind {
            TokenType::Number(num) => {
                self.advance();
                SyntaxNode::new(NodeKind::Literal).with_value(number_scalar(num))
            }
            TokenType::String(str) => {
                self.advance();
                SyntaxNode::new(NodeKind::Literal).with_value(str.clone())
            }
            TokenType::True | TokenType::False => {
                self.advance();
                SyntaxNode::new(NodeKind::Literal).with_value(peek_token.kind == TokenType::True)
            }
            TokenType::Null => {
                self.advance();
                SyntaxNode::new(NodeKind::Null)
            }
            TokenType::Star => {
                self.advance();
                SyntaxNode::new(NodeKind::Star)
            }
            TokenType::Cast => self.parse_cast_expr()?,
            TokenType::Case => self.parse_case_expr()?,
            TokenType::Exists => {
                self.advance();
                self.consume(TokenTypeVariant::LeftParen)?;
                let query = self.parse_query_expr()?;
                self.consume(TokenTypeVariant::RightParen)?;
                SyntaxNode::new(NodeKind::Exists).with_node("query", query)
            }
            // Functions whose name is a reserved keyword
            TokenType::Left | TokenType::Right
                if self.peek_next_i(1).kind == TokenType::LeftParen =>
            {
                self.advance();
                self.parse_function_expr(peek_token.lexeme.to_uppercase())?
            }
            TokenType::Identifier(ident)
                if is_keyword_in(ident, &TYPED_LITERAL_KEYWORDS)
                    && matches!(self.peek_next_i(1).kind, TokenType::String(_)) =>
            {
                self.advance();
                let value = self.parse_string_literal()?;
                SyntaxNode::new(NodeKind::TypedLiteral)
                    .with_value(value)
                    .with_scalar("type", ident.to_uppercase())
            }
            TokenType::Identifier(ident)
                if is_keyword_in(ident, &["interval"])
                    && matches!(
                        self.peek_next_i(1).kind,
                        TokenType::String(_) | TokenType::Number(_)
                    ) =>
            {
                self.parse_interval_expr()?
            }
            TokenType::Identifier(ident)
                if is_keyword_in(ident, &["extract"])
                    && self.peek_next_i(1).kind == TokenType::LeftParen
                    && self.peek_next_i(3).kind == TokenType::From =>
            {
                self.parse_extract_expr()?
            }
            TokenType::Identifier(_) | TokenType::QuotedIdentifier(_) => {
                let name = self.parse_compound_name()?;
                if self.check_token_type(TokenTypeVariant::Dot)
                    && self.peek_next_i(1).kind == TokenType::Star
                {
                    self.advance();
                    self.advance();
                    SyntaxNode::new(NodeKind::QualifiedStar).with_value(name)
                } else if self.check_token_type(TokenTypeVariant::LeftParen) {
                    self.parse_function_expr(name)?
                } else {
                    SyntaxNode::new(NodeKind::Identifier).with_value(name)
                }
            }
            TokenType::LeftParen => {
                self.advance();
                // Look ahead to check whether we need to parse a query_expr or an expr
                if self.check_query_start() {
                    let query = self.parse_query_expr()?;
                    self.consume(TokenTypeVariant::RightParen)?;
                    SyntaxNode::new(NodeKind::ScalarSubquery).with_node("query", query)
                } else {
                    let expr = self.parse_expr()?;
                    self.consume(TokenTypeVariant::RightParen)?;
                    SyntaxNode::new(NodeKind::Grouping).with_node("expr", expr)
                }
            }
            _ => {
                return Err(self.error(&peek_token, "Expected Expression."));
            }
        };

        Ok(primary_expr)
    }
}

fn is_keyword_in(ident: &str, keywords: &[&str]) -> bool {
    keywords.contains(&ident.to_lowercase().as_str())
}

fn identifier_text(token: &Token) -> String {
    match &token.kind {
        TokenType::Identifier(ident) => ident.clone(),
        TokenType::QuotedIdentifier(qident) => qident.clone(),
        _ => token.lexeme.clone(),
    }
}

fn with_alias(node: SyntaxNode, alias: Option<String>) -> SyntaxNode {
    match alias {
        Some(alias) => node.with_scalar("alias", alias),
        None => node,
    }
}

fn number_scalar(text: &str) -> Scalar {
    if let Ok(number) = serde_json::Number::from_str(text) {
        return Scalar::Number(number);
    }
    // `.5` and `1.` are valid SQL but not valid JSON numbers
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Scalar::Number)
        .unwrap_or_else(|| Scalar::String(text.to_owned()))
}

pub fn parse_sql(sql: &str) -> Result<SyntaxNode, SyntaxError> {
    log::debug!("Parsing {}", sql.chars().take(50).collect::<String>());

    let mut scanner = Scanner::new(sql);

    scanner.scan()?;

    log::debug!("Tokens:");
    scanner
        .tokens()
        .iter()
        .for_each(|tok| log::debug!("{:?}", tok));

    let mut parser = Parser::new(scanner.tokens());
    let tree = parser.parse()?;
    log::debug!("Syntax tree: {:?}", tree);
    Ok(tree)
}
