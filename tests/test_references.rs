use dremio_sql::{
    ast::{NodeKind, SyntaxNode},
    error::{Error, SyntaxError},
    parser::{DremioSqlParser, SqlParser},
    references::{TableReference, TableReferenceExtractor, extract_table_references},
    test_utils::{REFERENCES_TESTS_FILE, TestReferencesData},
};

fn segments(references: Vec<TableReference>) -> Vec<Vec<String>> {
    references
        .into_iter()
        .map(TableReference::into_segments)
        .collect()
}

#[test]
fn test_references() {
    let references_test_file =
        std::fs::read_to_string(REFERENCES_TESTS_FILE).expect("Cannot open references test cases");
    let test_references_data: TestReferencesData =
        toml::from_str(&references_test_file).expect("Cannot parse test cases defined in toml");

    for test in test_references_data.tests {
        let sql = &test.sql;
        println!("Testing references for SQL: {}", sql);
        let references = extract_table_references(sql)
            .unwrap_or_else(|err| panic!("Could not extract references due to: {}", err));
        assert_eq!(segments(references), test.references);
    }
}

#[test]
fn test_extraction_is_idempotent() {
    let references_test_file =
        std::fs::read_to_string(REFERENCES_TESTS_FILE).expect("Cannot open references test cases");
    let test_references_data: TestReferencesData =
        toml::from_str(&references_test_file).expect("Cannot parse test cases defined in toml");

    let extractor = TableReferenceExtractor::<DremioSqlParser>::default();
    for test in test_references_data.tests {
        let first = extractor.extract(&test.sql).unwrap();
        let second = extractor.extract(&test.sql).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_three_way_join() {
    let sql = r#"
        select *
        from "@home"."raw.2024".a
        join analytics.b on a.id = b.id
        join c on b.id = c.id
    "#;
    let references = extract_table_references(sql).unwrap();
    assert_eq!(references.len(), 3);
    assert!(
        references
            .iter()
            .all(|reference| reference.segments().iter().all(|s| !s.is_empty()))
    );
}

#[test]
fn test_syntax_errors_propagate() {
    for sql in ["select from", "select * from \"unterminated", "select * from a join b"] {
        let result = extract_table_references(sql);
        println!("{:?}", result);
        assert!(matches!(
            result,
            Err(Error::Syntax(SyntaxError {
                position: Some(_),
                ..
            }))
        ));
    }
}

struct FixedTreeParser {
    tables: Vec<&'static str>,
}

impl SqlParser for FixedTreeParser {
    fn parse(&self, _sql: &str) -> Result<SyntaxNode, SyntaxError> {
        let factors = self
            .tables
            .iter()
            .map(|table| SyntaxNode::new(NodeKind::TableFactor).with_value(*table))
            .collect();
        Ok(SyntaxNode::new(NodeKind::Statements).with_node(
            "statement",
            SyntaxNode::new(NodeKind::Select).with_nodes("from", factors),
        ))
    }
}

#[test]
fn test_custom_parser() {
    let extractor = TableReferenceExtractor::new(FixedTreeParser {
        tables: vec![r#""x.y".z"#, "w"],
    });
    let references = extractor.extract("ignored").unwrap();
    assert_eq!(
        segments(references),
        vec![vec!["x.y".to_owned(), "z".to_owned()], vec!["w".to_owned()]]
    );
}

#[test]
fn test_malformed_payload_is_not_skipped() {
    for table in ["a..b", "a.", r#""open"#, r#""q"x"#, ""] {
        let extractor = TableReferenceExtractor::new(FixedTreeParser {
            tables: vec!["ok", table],
        });
        let result = extractor.extract("ignored");
        assert!(
            matches!(result, Err(Error::Extraction(_))),
            "{:?} -> {:?}",
            table,
            result
        );
    }
}
