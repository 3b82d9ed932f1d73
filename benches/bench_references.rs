use criterion::{Criterion, criterion_group, criterion_main};
use dremio_sql::{
    references::extract_table_references,
    test_utils::{PARSING_TESTS_FILE, REFERENCES_TESTS_FILE, TestParsingData, TestReferencesData},
};
use std::hint::black_box;

fn extract_references_tests(sqls: &[&String]) {
    for sql in sqls {
        let _ = extract_table_references(sql);
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let parsing_test_file =
        std::fs::read_to_string(PARSING_TESTS_FILE).expect("Cannot open parsing test cases");
    let test_parsing_data: TestParsingData =
        toml::from_str(&parsing_test_file).expect("Cannot parse test cases defined in toml");
    let references_test_file =
        std::fs::read_to_string(REFERENCES_TESTS_FILE).expect("Cannot open references test cases");
    let test_references_data: TestReferencesData =
        toml::from_str(&references_test_file).expect("Cannot parse test cases defined in toml");

    let sqls = test_parsing_data
        .tests
        .iter()
        .map(|t| &t.sql)
        .chain(test_references_data.tests.iter().map(|t| &t.sql))
        .collect::<Vec<_>>();

    c.bench_function("bench references tests", |b| {
        b.iter(|| extract_references_tests(black_box(&sqls)))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(1000);
    targets = criterion_benchmark
);
criterion_main!(benches);
