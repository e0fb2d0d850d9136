use crate::{
    context::Context,
    discovery::{Provider, StaticSource},
    error::{Error, ErrorClass},
    obs::{EventSink, QueryEvent, metrics_report, metrics_reset_all, with_event_sink},
    params::{BindingError, Params, ParamsProvider},
    query::{
        Backend, BoundOperation, ConditionNode, Connector, DataModel, IMMEDIATE_REJECT_PLACEHOLDERS,
        Lexer, LiteralPolicy, Operand, OperationDescriptor, Operator, PREPARED_ALLOW_LITERALS,
        Parser, QueryParser, QueryRunner, Record, StatementState, Target, TokenKind, Verb, eval,
    },
    settings::SettingsFragment,
    sort::{Direction, Sort, SortList, SortProvider},
    test_support::{MemoryDocuments, MemoryKv},
    value::{Value, ValueBox},
};
use proptest::prelude::*;
use std::{cell::RefCell, sync::Arc};

///
/// HELPERS
///

fn runner() -> QueryRunner {
    Context::default().runner().expect("default runner")
}

fn parse_doc(text: &str) -> OperationDescriptor {
    Parser::parse(text, DataModel::Document).expect("statement should parse")
}

fn condition(text: &str) -> ConditionNode {
    parse_doc(&format!("select T where {text}"))
        .condition
        .expect("where clause")
}

fn leaf(field: &str, operator: Operator, value: impl Into<Value>) -> ConditionNode {
    ConditionNode::leaf(field, operator, Operand::value(value))
}

fn people() -> MemoryDocuments {
    MemoryDocuments::new().with_records(
        "Person",
        [
            Record::new().with("id", 7).with("name", "Ana").with("age", 34),
            Record::new().with("id", 8).with("name", "Bob").with("age", 17),
            Record::new().with("id", 9).with("name", "Cy").with("age", 52),
        ],
    )
}

fn name_of(backend: &MemoryDocuments, id: i64) -> Option<Value> {
    backend
        .records("Person")
        .into_iter()
        .find(|r| r.value("id") == &Value::Int(id))
        .map(|r| r.value("name").clone())
}

// Returns a fixed record set regardless of the operation.
struct FixedBackend {
    model: DataModel,
    records: Vec<Record>,
}

impl Backend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    fn data_model(&self) -> DataModel {
        self.model
    }

    fn execute(&self, _operation: &BoundOperation) -> Result<Vec<Record>, Error> {
        Ok(self.records.clone())
    }
}

///
/// PARSING
///

#[test]
fn select_builds_and_of_leaf_and_or() {
    let op = parse_doc(
        r#"select Person where age > 18 and (name = "Ana" or name = "Bob") order by name asc"#,
    );

    assert_eq!(op.verb, Verb::Select);
    assert_eq!(op.target, Target::Entity("Person".into()));
    assert_eq!(
        op.condition,
        Some(ConditionNode::Composite {
            connector: Connector::And,
            children: vec![
                leaf("age", Operator::Gt, 18),
                ConditionNode::Composite {
                    connector: Connector::Or,
                    children: vec![
                        leaf("name", Operator::Eq, "Ana"),
                        leaf("name", Operator::Eq, "Bob"),
                    ],
                },
            ],
        })
    );

    let sorts: Vec<&Sort> = op.sort.as_ref().expect("order by").iter().collect();
    assert_eq!(sorts, vec![&Sort::asc("name")]);
}

#[test]
fn put_is_a_direct_descriptor_without_condition() {
    let op = Parser::parse("put k1 v1", DataModel::KeyValue).unwrap();

    assert_eq!(op.verb, Verb::Put);
    assert_eq!(op.target, Target::Key(Operand::value("k1")));
    assert_eq!(op.value, Some(Operand::value("v1")));
    assert!(op.condition.is_none());
    assert!(op.sort.is_none());
}

#[test]
fn dangling_where_points_past_where() {
    let err = Parser::parse("select from where", DataModel::Document).unwrap_err();

    assert_eq!(err.position.offset, 17);
    assert_eq!(err.position.line, 1);
    assert_eq!(err.position.column, 18);
    assert_eq!(err.found, "end of input");
    assert_eq!(err.expected, "field name");
}

#[test]
fn syntax_error_surfaces_through_runner() {
    let err = runner()
        .parse("select Person where age >", DataModel::Document)
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::QuerySyntax);
    let detail = err.syntax_detail().expect("syntax detail");
    assert_eq!(detail.position.offset, 25);
    assert!(err.message.contains("line 1, column 26"));
}

#[test]
fn lexer_reports_unterminated_string_at_its_start() {
    let err = Lexer::tokenize("select T where name = 'abc").unwrap_err();

    assert_eq!(err.position.offset, 22);
    assert_eq!(err.found, "unterminated string");
}

#[test]
fn lexer_tracks_lines_and_keywords_case_insensitively() {
    let tokens = Lexer::tokenize("SeLeCt\n  name").unwrap();

    assert!(matches!(tokens[0].kind, TokenKind::Keyword(_)));
    assert_eq!(tokens[1].kind, TokenKind::Ident("name".into()));
    assert_eq!(tokens[1].position.line, 2);
    assert_eq!(tokens[1].position.column, 3);
    assert_eq!(tokens[2].kind, TokenKind::Eof);
}

#[test]
fn and_binds_tighter_than_or() {
    assert_eq!(
        condition("a = 1 or b = 2 and c = 3"),
        ConditionNode::Composite {
            connector: Connector::Or,
            children: vec![
                leaf("a", Operator::Eq, 1),
                ConditionNode::Composite {
                    connector: Connector::And,
                    children: vec![leaf("b", Operator::Eq, 2), leaf("c", Operator::Eq, 3)],
                },
            ],
        }
    );
}

#[test]
fn same_connector_chains_flatten_in_source_order() {
    let node = condition("a = 1 and b = 2 and c = 3");

    assert_eq!(node.connector(), Some(Connector::And));
    let fields: Vec<&str> = node.fields();
    assert_eq!(fields, vec!["a", "b", "c"]);
    assert_eq!(node.children().len(), 3);
}

#[test]
fn not_forms_lower_to_negated_leaves() {
    assert_eq!(
        condition("age not in (1, 2)"),
        ConditionNode::negate(ConditionNode::leaf(
            "age",
            Operator::In,
            Operand::List(vec![Operand::value(1), Operand::value(2)]),
        ))
    );
    assert_eq!(
        condition("name not like 'A%'"),
        ConditionNode::negate(leaf("name", Operator::Like, "A%"))
    );
    assert_eq!(
        condition("not age between 1 and 5"),
        ConditionNode::negate(ConditionNode::leaf(
            "age",
            Operator::Between,
            Operand::List(vec![Operand::value(1), Operand::value(5)]),
        ))
    );
}

#[test]
fn negative_literals_and_placeholders_parse() {
    assert_eq!(condition("t > -5"), leaf("t", Operator::Gt, -5));
    assert_eq!(
        condition("id = ?id"),
        ConditionNode::leaf("id", Operator::Eq, Operand::placeholder("id"))
    );
}

#[test]
fn select_clauses_parse() {
    let op = parse_doc("select name, age from Person where age >= 18 order by age desc, name skip 1 limit 2");

    assert_eq!(op.projection, vec!["name".to_string(), "age".to_string()]);
    assert_eq!(op.skip, Some(1));
    assert_eq!(op.limit, Some(2));

    let sort = op.sort.expect("order by");
    assert_eq!(sort.get("age").map(|s| s.direction), Some(Direction::Desc));
    assert_eq!(sort.get("name").map(|s| s.direction), Some(Direction::Asc));
}

#[test]
fn insert_and_delete_accept_noise_words() {
    let insert = parse_doc("insert into Person set name = 'Di', age = 40");
    assert_eq!(insert.target, Target::Entity("Person".into()));
    assert_eq!(insert.assignments.len(), 2);

    let delete = parse_doc("delete from Person where id = 7");
    assert_eq!(delete.verb, Verb::Delete);
    assert_eq!(delete.target, Target::Entity("Person".into()));
}

#[test]
fn trailing_tokens_are_rejected() {
    let err = Parser::parse("get a b", DataModel::KeyValue).unwrap_err();

    assert_eq!(err.expected, "end of input");
    assert_eq!(err.position.offset, 6);
}

///
/// IMMEDIATE
///

#[test]
fn put_executes_to_an_empty_result() {
    let kv = MemoryKv::new();
    let result = runner().execute(&kv, "put k1 v1", &Params::new()).unwrap();

    assert!(result.is_empty());
    assert_eq!(kv.entry_count(), 1);
}

#[test]
fn key_value_reads_return_zero_or_one_record() {
    let kv = MemoryKv::new();
    let runner = runner();
    let none = Params::new();

    assert!(runner.execute(&kv, "get k1", &none).unwrap().is_empty());

    runner.execute(&kv, "put k1 'hello'", &none).unwrap();
    let found = runner.execute(&kv, "get k1", &none).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found.first().unwrap().value("value"), &Value::from("hello"));

    assert_eq!(runner.execute(&kv, "del k1", &none).unwrap().len(), 1);
    assert!(runner.execute(&kv, "get k1", &none).unwrap().is_empty());
}

#[test]
fn single_record_contract_is_enforced() {
    let backend = FixedBackend {
        model: DataModel::KeyValue,
        records: vec![Record::new().with("key", 1), Record::new().with("key", 2)],
    };
    let err = runner().execute(&backend, "get 1", &Params::new()).unwrap_err();

    assert_eq!(err.class, ErrorClass::Backend);
}

#[test]
fn mutation_results_are_always_empty() {
    let backend = FixedBackend {
        model: DataModel::Document,
        records: vec![Record::new().with("id", 1)],
    };
    let result = runner()
        .execute(&backend, "delete Person where id = 1", &Params::new())
        .unwrap();

    assert!(result.is_empty());
}

#[test]
fn immediate_resolves_placeholders_by_default() {
    let backend = people();
    let params = Params::new().with("min", 18);
    let result = runner()
        .execute(&backend, "select Person where age > ?min order by name", &params)
        .unwrap();

    let names: Vec<&Value> = result.iter().map(|r| r.value("name")).collect();
    assert_eq!(names, vec![&Value::from("Ana"), &Value::from("Cy")]);
}

#[test]
fn missing_binding_names_the_placeholder() {
    let err = runner()
        .execute(&people(), "select Person where id = ?id", &Params::new())
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::MissingBinding);
    assert_eq!(
        err.binding_detail(),
        Some(&BindingError::Missing {
            names: vec!["id".into()]
        })
    );
    assert!(err.message.contains("?id"));
}

#[test]
fn key_value_keys_must_be_keyable() {
    let kv = MemoryKv::new();
    let runner = runner();

    for key in [Value::float(1.5), Value::Bool(true), Value::Null, Value::List(vec![Value::Int(1)])] {
        let err = runner
            .execute(&kv, "put ?k 1", &Params::new().with("k", key.clone()))
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidArgument, "key {key}");
        assert!(matches!(err.binding_detail(), Some(BindingError::UnkeyableKey { .. })));
    }
    assert!(kv.executed().is_empty());

    runner
        .execute(&kv, "put ?k 1", &Params::new().with("k", 42u64))
        .unwrap();
    assert_eq!(kv.entry_count(), 1);
}

#[test]
fn ordering_operators_need_ordered_operands() {
    let backend = people();
    let runner = runner();

    for value in [Value::Blob(vec![1, 2]), Value::List(vec![Value::Int(1)])] {
        let err = runner
            .execute(&backend, "select Person where age > ?x", &Params::new().with("x", value))
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidArgument);
        assert!(matches!(
            err.binding_detail(),
            Some(BindingError::UnorderedOperand { operator: Operator::Gt, .. })
        ));
    }
    assert!(backend.executed().is_empty());

    // equality takes any value; a null bound never orders
    let params = Params::new().with("x", Value::Blob(vec![1, 2]));
    assert!(runner.execute(&backend, "select Person where age = ?x", &params).unwrap().is_empty());
    let params = Params::new().with("x", Value::Null);
    assert!(runner.execute(&backend, "select Person where age < ?x", &params).unwrap().is_empty());
}

#[test]
fn strict_immediate_mode_rejects_placeholders() {
    let context = Context::builder()
        .fragment(SettingsFragment::new("test").with(IMMEDIATE_REJECT_PLACEHOLDERS, true))
        .build();
    let runner = context.runner().unwrap();
    let backend = people();

    let err = runner
        .execute(&backend, "select Person where id = ?id", &Params::new().with("id", 7))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
    assert!(matches!(
        err.binding_detail(),
        Some(BindingError::PlaceholderNotAllowed { name }) if name == "id"
    ));
    assert!(backend.executed().is_empty());

    // literals are still fine
    assert_eq!(
        runner
            .execute(&backend, "select Person where id = 7", &Params::new())
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn blank_query_is_an_invalid_argument() {
    for text in ["", "   \n\t"] {
        let err = runner().execute(&people(), text, &Params::new()).unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidArgument);
    }
}

#[test]
fn model_mismatch_is_rejected_before_execution() {
    let runner = runner();
    let op = runner.parse("get k1", DataModel::KeyValue).unwrap();
    let docs = people();

    let err = runner.run(&docs, &op, &Params::new()).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
    assert!(docs.executed().is_empty());
}

#[test]
fn bound_values_are_written_in_backend_form() {
    let backend = people();
    let day = crate::value::Date::new_checked(2024, 2, 29).unwrap();
    let params = Params::new().with("since", day);

    runner()
        .execute(&backend, "select Person where joined >= ?since", &params)
        .unwrap();

    let op = backend.last_executed().unwrap();
    let Some(ConditionNode::Leaf { operand, .. }) = &op.condition else {
        panic!("expected leaf condition");
    };
    assert_eq!(operand.as_value(), Some(&Value::from("2024-02-29")));
}

///
/// PREPARED
///

#[test]
fn prepared_update_rebinds_independently() {
    let backend = people();
    let runner = runner();
    let mut statement = runner
        .prepare(&backend, "update Person set name = ?name where id = ?id")
        .unwrap();
    assert_eq!(statement.state(), StatementState::Unbound);

    statement.bind("name", "X").unwrap().bind("id", 7).unwrap();
    assert_eq!(statement.state(), StatementState::Bound);
    assert!(statement.execute(&runner, &backend).unwrap().is_empty());
    assert_eq!(statement.state(), StatementState::Executed);

    statement.bind("name", "Y").unwrap().bind("id", 8).unwrap();
    statement.execute(&runner, &backend).unwrap();

    assert_eq!(name_of(&backend, 7), Some(Value::from("X")));
    assert_eq!(name_of(&backend, 8), Some(Value::from("Y")));
    assert_eq!(name_of(&backend, 9), Some(Value::from("Cy")));

    let executed = backend.executed();
    let second: Vec<(&str, &Value)> = executed[1].assigned_values().collect();
    assert_eq!(second, vec![("name", &Value::from("Y"))]);
}

#[test]
fn rebinding_after_execution_starts_fresh() {
    let backend = people();
    let runner = runner();
    let mut statement = runner
        .prepare(&backend, "update Person set name = ?name where id = ?id")
        .unwrap();

    statement.bind("name", "X").unwrap().bind("id", 7).unwrap();
    statement.execute(&runner, &backend).unwrap();

    statement.bind("name", "Z").unwrap();
    assert_eq!(statement.state(), StatementState::Unbound);
    assert_eq!(statement.missing(), vec!["id".to_string()]);

    let err = statement.execute(&runner, &backend).unwrap_err();
    assert_eq!(err.class, ErrorClass::MissingBinding);
    assert_eq!(backend.executed().len(), 1);
}

#[test]
fn executed_statement_reruns_its_binding() {
    let backend = people();
    let runner = runner();
    let mut statement = runner
        .prepare(&backend, "select Person where id = ?id")
        .unwrap();
    statement.bind("id", 9).unwrap();

    let first = statement.execute(&runner, &backend).unwrap();
    let second = statement.execute(&runner, &backend).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
}

#[test]
fn prepared_rejects_unknown_placeholders() {
    let backend = people();
    let mut statement = runner()
        .prepare(&backend, "select Person where id = ?id")
        .unwrap();

    let err = statement.bind("nope", 1).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
    assert_eq!(statement.state(), StatementState::Unbound);
}

#[test]
fn literal_policy_rejects_inline_values() {
    let backend = people();
    let runner = runner();

    let err = runner
        .prepare_with(&backend, "select Person where age > 18", LiteralPolicy::Reject)
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
    assert!(matches!(
        err.binding_detail(),
        Some(BindingError::LiteralNotAllowed { .. })
    ));

    assert!(
        runner
            .prepare_with(&backend, "select Person where age > ?age", LiteralPolicy::Reject)
            .is_ok()
    );
}

#[test]
fn literal_policy_is_read_from_settings() {
    let context = Context::builder()
        .fragment(SettingsFragment::new("test").with(PREPARED_ALLOW_LITERALS, false))
        .build();
    let runner = context.runner().unwrap();

    let err = runner
        .prepare(&people(), "update Person set name = 'x' where id = ?id")
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
}

#[test]
fn cloned_statements_bind_independently() {
    let backend = people();
    let runner = runner();
    let template = runner
        .prepare(&backend, "select Person where id = ?id")
        .unwrap();

    let mut a = template.clone();
    let mut b = template.clone();
    a.bind("id", 7).unwrap();
    b.bind("id", 8).unwrap();

    let a = a.execute(&runner, &backend).unwrap();
    let b = b.execute(&runner, &backend).unwrap();
    assert_eq!(a.first().unwrap().value("name"), &Value::from("Ana"));
    assert_eq!(b.first().unwrap().value("name"), &Value::from("Bob"));
    assert_eq!(template.state(), StatementState::Unbound);
}

///
/// PROVIDERS
///

struct Shouting(i32);

impl QueryParser for Shouting {
    fn name(&self) -> &'static str {
        if self.0 > 0 { "shouting" } else { "shouting-low" }
    }

    fn priority(&self) -> i32 {
        self.0
    }

    fn supports(&self, model: DataModel) -> bool {
        model == DataModel::KeyValue
    }

    fn parse(&self, text: &str, model: DataModel) -> Result<OperationDescriptor, Error> {
        Ok(Parser::parse(&text.to_lowercase(), model)?)
    }
}

struct Echo(&'static str);

impl QueryParser for Echo {
    fn name(&self) -> &'static str {
        self.0
    }

    fn supports(&self, _model: DataModel) -> bool {
        true
    }

    fn parse(&self, text: &str, model: DataModel) -> Result<OperationDescriptor, Error> {
        Ok(Parser::parse(text, model)?)
    }
}

#[test]
fn discovered_parser_is_selected_by_model() {
    let context = Context::builder()
        .source(StaticSource::new(
            "kv-backend",
            vec![Provider::QueryParser(Arc::new(Shouting(5)))],
        ))
        .build();
    let runner = context.runner().unwrap();

    // lowercasing turns the quoted key into 'k'
    let op = runner.parse("GET 'K'", DataModel::KeyValue).unwrap();
    assert_eq!(op.target, Target::Key(Operand::value("k")));

    // documents fall back to the standard grammar
    let op = runner.parse("select T where a = 'K'", DataModel::Document).unwrap();
    assert_eq!(op.condition, Some(leaf("a", Operator::Eq, "K")));
}

#[test]
fn tied_parsers_are_ambiguous() {
    let context = Context::builder()
        .source(StaticSource::new(
            "two",
            vec![
                Provider::QueryParser(Arc::new(Echo("first"))),
                Provider::QueryParser(Arc::new(Echo("second"))),
            ],
        ))
        .build();

    let err = context
        .runner()
        .unwrap()
        .parse("get k", DataModel::KeyValue)
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::AmbiguousProvider);
    assert!(err.message.contains("first, second"));
}

struct Alias;

impl SortProvider for Alias {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn adapt(&self, sort: Sort) -> Sort {
        if sort.field == "years" {
            Sort::new("age", sort.direction)
        } else {
            sort
        }
    }
}

struct Upper;

impl ParamsProvider for Upper {
    fn name(&self) -> &'static str {
        "upper"
    }

    fn adapt(&self, _name: &str, value: ValueBox) -> Result<ValueBox, Error> {
        Ok(match value.value() {
            Value::Text(text) => ValueBox::new(text.to_uppercase()),
            _ => value,
        })
    }
}

#[test]
fn sort_and_params_providers_adapt_before_execution() {
    let context = Context::builder()
        .source(StaticSource::new(
            "adapters",
            vec![
                Provider::SortProvider(Arc::new(Alias)),
                Provider::ParamsProvider(Arc::new(Upper)),
            ],
        ))
        .build();
    let runner = context.runner().unwrap();
    let backend = people().with_records("Person", [Record::new().with("id", 10).with("name", "ANA")]);

    let result = runner
        .execute(
            &backend,
            "select Person where name = ?name order by years desc",
            &Params::new().with("name", "ana"),
        )
        .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.first().unwrap().value("id"), &Value::Int(10));

    let op = backend.last_executed().unwrap();
    let mut expected = SortList::new();
    expected.desc("age");
    assert_eq!(op.sort, Some(expected));
}

///
/// EVALUATION
///

#[test]
fn like_supports_both_wildcards() {
    assert!(eval::like("Ana", "A%"));
    assert!(eval::like("Ana", "_na"));
    assert!(eval::like("Ana", "%"));
    assert!(eval::like("", "%"));
    assert!(eval::like("banana", "%an_na"));
    assert!(!eval::like("Ana", "A_"));
    assert!(!eval::like("Bob", "A%"));
}

#[test]
fn select_applies_filter_sort_window_and_projection() {
    let backend = people();
    let result = runner()
        .execute(
            &backend,
            "select name from Person where age between 10 and 60 and name != 'Cy' order by age desc skip 1 limit 5",
            &Params::new(),
        )
        .unwrap();

    assert_eq!(result.len(), 1);
    let record = result.first().unwrap();
    assert_eq!(record.len(), 1);
    assert_eq!(record.value("name"), &Value::from("Bob"));
}

#[test]
fn missing_fields_never_match_ranges() {
    let record = Record::new().with("a", 1);

    assert!(!eval::matches(&leaf("b", Operator::Gt, 0), &record));
    assert!(eval::matches(&leaf("b", Operator::Eq, Value::Null), &record));
    assert!(eval::matches(
        &ConditionNode::negate(leaf("b", Operator::Lt, 0)),
        &record
    ));
}

#[test]
fn numeric_comparison_crosses_int_kinds() {
    let record = Record::new().with("n", 5u64);

    assert!(eval::matches(&leaf("n", Operator::Eq, 5), &record));
    assert!(eval::matches(&leaf("n", Operator::Lt, 5.5), &record));
}

#[test]
fn mixed_numeric_columns_sort_by_exact_value() {
    let values = [
        Value::Int(0),
        Value::Uint(1 << 60),
        Value::float(0.5),
        Value::Int(1),
        Value::from("x"),
        Value::float(-3.25),
        Value::Uint(1),
        Value::Null,
    ];
    let mut records: Vec<Record> = values.iter().map(|v| Record::new().with("n", v.clone())).collect();

    let mut sort = SortList::new();
    sort.asc("n");
    eval::sort_records(&mut records, &sort);

    let sorted: Vec<Value> = records.iter().map(|r| r.value("n").clone()).collect();
    assert_eq!(
        sorted,
        vec![
            Value::Null,
            Value::float(-3.25),
            Value::Int(0),
            Value::float(0.5),
            Value::Int(1),
            Value::Uint(1),
            Value::Uint(1 << 60),
            Value::from("x"),
        ]
    );
}

#[test]
fn record_fields_read_through_the_registry() {
    let context = Context::default();
    let record = Record::new().with("age", "42");

    let age: u32 = record.get_as("age", context.registry()).unwrap();
    assert_eq!(age, 42);

    let missing: Option<String> = record.get_as("nope", context.registry()).unwrap();
    assert_eq!(missing, None);

    let err = record.get_as::<bool>("age", context.registry()).unwrap_err();
    assert_eq!(err.class, ErrorClass::UnsupportedConversion);
    assert!(err.message.contains("age"));
}

///
/// OBSERVABILITY
///

#[derive(Default)]
struct Capture(RefCell<Vec<QueryEvent>>);

impl EventSink for Capture {
    fn record(&self, event: &QueryEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

#[test]
fn pipeline_emits_parse_bind_and_execute_events() {
    let capture = Arc::new(Capture::default());
    let backend = MemoryKv::new();

    with_event_sink(capture.clone(), || {
        runner()
            .execute(&backend, "put ?k 1", &Params::new().with("k", "a"))
            .unwrap();
    });

    let events = capture.0.borrow();
    assert!(events.contains(&QueryEvent::Parse {
        model: DataModel::KeyValue,
        ok: true
    }));
    assert!(events.contains(&QueryEvent::Bind {
        placeholders: 1,
        ok: true
    }));
    assert!(events.contains(&QueryEvent::Execute {
        verb: Verb::Put,
        backend: "memory-kv".into(),
        records: 0
    }));
}

#[test]
fn default_sink_counts_per_thread() {
    metrics_reset_all();
    let backend = people();
    let runner = runner();

    runner
        .execute(&backend, "select Person", &Params::new())
        .unwrap();
    let _ = runner.execute(&backend, "select Person where", &Params::new());

    let report = metrics_report();
    assert_eq!(report.ops.parse_calls, 2);
    assert_eq!(report.ops.parse_errors, 1);
    assert_eq!(report.ops.select_calls, 1);
    assert_eq!(report.ops.records_returned, 3);
    assert_eq!(report.backends["memory-documents"].executions, 1);
}

///
/// PROPERTIES
///

fn field_name() -> impl Strategy<Value = String> {
    "f_[a-z]{1,5}"
}

fn leaf_strategy() -> impl Strategy<Value = ConditionNode> {
    let op = prop_oneof![
        Just(Operator::Eq),
        Just(Operator::NotEq),
        Just(Operator::Gt),
        Just(Operator::Gte),
        Just(Operator::Lt),
        Just(Operator::Lte),
    ];
    let operand = prop_oneof![
        any::<i64>().prop_map(Operand::value),
        "[a-z]{0,6}".prop_map(Operand::value),
        "[a-z]{1,4}".prop_map(Operand::placeholder),
    ];

    (field_name(), op, operand).prop_map(|(f, op, operand)| ConditionNode::leaf(f, op, operand))
}

fn condition_strategy() -> impl Strategy<Value = ConditionNode> {
    leaf_strategy().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..4).prop_map(|c| ConditionNode::Composite {
                connector: Connector::And,
                children: c,
            }),
            prop::collection::vec(inner.clone(), 2..4).prop_map(|c| ConditionNode::Composite {
                connector: Connector::Or,
                children: c,
            }),
            inner.prop_map(ConditionNode::negate),
        ]
    })
}

fn sortable_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::Uint),
        (-1.0e20f64..1.0e20).prop_map(Value::float),
        (-4i64..4).prop_map(Value::Int),
        (-8i32..8).prop_map(|n| Value::float(f64::from(n) / 2.0)),
        "[a-c]{0,2}".prop_map(Value::Text),
        Just(Value::Null),
    ]
}

fn sorted_column(values: &[Value], direction: Direction) -> Vec<Value> {
    let mut records: Vec<Record> = values.iter().map(|v| Record::new().with("n", v.clone())).collect();
    let mut sort = SortList::new();
    sort.add(Sort::new("n", direction));
    eval::sort_records(&mut records, &sort);

    records.iter().map(|r| r.value("n").clone()).collect()
}

proptest! {
    #[test]
    fn record_sort_ignores_input_order(
        values in prop::collection::vec(sortable_value(), 0..24),
        rotate in any::<usize>(),
        descending in any::<bool>(),
    ) {
        let direction = if descending { Direction::Desc } else { Direction::Asc };
        let mut shuffled = values.clone();
        shuffled.reverse();
        if !shuffled.is_empty() {
            let by = rotate % shuffled.len();
            shuffled.rotate_left(by);
        }

        let a = sorted_column(&values, direction);
        let b = sorted_column(&shuffled, direction);

        for (x, y) in a.iter().zip(&b) {
            prop_assert_eq!(Value::sort_cmp(x, y), std::cmp::Ordering::Equal, "{} vs {}", x, y);
        }
        for pair in a.windows(2) {
            let ordering = Value::sort_cmp(&pair[0], &pair[1]);
            let expected_ok = match direction {
                Direction::Asc => ordering.is_le(),
                Direction::Desc => ordering.is_ge(),
            };
            prop_assert!(expected_ok, "{} before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn displayed_conditions_reparse_to_the_same_tree(node in condition_strategy()) {
        let text = format!("select T where {node}");
        let reparsed = Parser::parse(&text, DataModel::Document)
            .map_err(|err| TestCaseError::fail(format!("{text}: {err}")))?;

        prop_assert_eq!(reparsed.condition, Some(node));
    }

    #[test]
    fn placeholders_are_collected_from_every_operand(names in prop::collection::btree_set("[a-z]{1,4}", 1..5)) {
        let clauses: Vec<String> = names.iter().map(|n| format!("f_{n} = ?{n}")).collect();
        let op = parse_doc(&format!("select T where {}", clauses.join(" or ")));

        prop_assert_eq!(op.placeholders(), names);
    }
}
