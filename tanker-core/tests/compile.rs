use std::sync::Arc;
use tanker_core::{
    ArgValue, Config, Error, GenericSqlWriter, Registry, TableDecl, Value, View,
};

fn registry() -> Arc<Registry> {
    let decls = vec![
        TableDecl::new("country").column("name", "varchar"),
        TableDecl::new("team")
            .column("name", "varchar")
            .column("country", "m2o country.id")
            .column("members", "o2m member.team")
            .key(&["name", "country"]),
        TableDecl::new("member")
            .column("name", "varchar")
            .column("registration_code", "varchar")
            .column("team", "m2o team.id")
            .key(&["registration_code"]),
        TableDecl::new("speaker")
            .column("name", "varchar")
            .column("bio", "varchar")
            .key(&["name"]),
        TableDecl::new("event")
            .column("name", "varchar")
            .column("date", "date")
            .key(&["name"]),
        TableDecl::new("event_speaker")
            .column("event", "m2o event.id")
            .column("speaker", "m2o speaker.id")
            .key(&["event", "speaker"]),
    ];
    Arc::new(Registry::build(&decls).unwrap())
}

fn sql(view: &View, config: &Config) -> (String, Vec<Value>) {
    let query = view
        .read()
        .to_query(config, &GenericSqlWriter)
        .unwrap();
    (query.sql, query.params)
}

#[test]
fn shared_prefix_reuses_the_join() {
    let registry = registry();
    let view = View::new(&registry, "member", &["team.name", "team.country.name"]).unwrap();
    let (sql, params) = sql(&view, &Config::default());
    assert_eq!(
        sql,
        "SELECT \"team_0\".\"name\", \"country_1\".\"name\" FROM \"member\" \
         LEFT JOIN \"team\" AS \"team_0\" ON (\"member\".\"team\" = \"team_0\".\"id\") \
         LEFT JOIN \"country\" AS \"country_1\" ON (\"team_0\".\"country\" = \"country_1\".\"id\")"
    );
    assert!(params.is_empty());
}

#[test]
fn compilation_is_pure() {
    let registry = registry();
    let view = View::new(&registry, "member", &["team.country.name", "name"]).unwrap();
    let config = Config::default();
    assert_eq!(sql(&view, &config), sql(&view, &config));
}

#[test]
fn surrogate_id_and_raw_fk_resolve_locally() {
    let registry = registry();
    let view = View::new(&registry, "team", &["id", "name", "country"]).unwrap();
    let (sql, _) = sql(&view, &Config::default());
    assert_eq!(
        sql,
        "SELECT \"team\".\"id\", \"team\".\"name\", \"team\".\"country\" FROM \"team\""
    );
}

#[test]
fn params_bind_in_depth_first_order() {
    let registry = registry();
    let view = View::new(&registry, "team", &["name"]).unwrap();
    let query = view
        .read()
        .filter("(and (= name {a}) (= country.name {b}))")
        .arg("a", "Blue")
        .arg("b", "Belgium")
        .to_query(&Config::default(), &GenericSqlWriter)
        .unwrap();
    assert_eq!(
        query.params,
        vec![
            Value::Varchar(Some("Blue".into())),
            Value::Varchar(Some("Belgium".into())),
        ]
    );
    assert!(query.sql.contains("$1"));
    assert!(query.sql.contains("$2"));
}

#[test]
fn literals_are_inlined_not_bound() {
    let registry = registry();
    let view = View::new(&registry, "team", &["name"]).unwrap();
    let query = view
        .read()
        .filter("(and (= name 'Blue') (> id 3))")
        .to_query(&Config::default(), &GenericSqlWriter)
        .unwrap();
    assert!(query.params.is_empty());
    assert!(query.sql.contains("'Blue'"));
    assert!(query.sql.contains("3"));
}

#[test]
fn list_arguments_expand_to_markers() {
    let registry = registry();
    let view = View::new(&registry, "team", &["name"]).unwrap();
    let query = view
        .read()
        .filter("(in name {wanted})")
        .arg(
            "wanted",
            ArgValue::List(vec![
                ArgValue::from("a"),
                ArgValue::from("b"),
                ArgValue::from("c"),
            ]),
        )
        .to_query(&Config::default(), &GenericSqlWriter)
        .unwrap();
    assert_eq!(query.params.len(), 3);
    assert!(query.sql.contains("IN ($1, $2, $3)"));
}

#[test]
fn aggregates_infer_grouping() {
    let registry = registry();
    let view = View::with_named_fields(
        &registry,
        "event",
        &[("year", "(extract \"year\" date)"), ("n", "(count *)")],
    )
    .unwrap();
    let (sql, _) = sql(&view, &Config::default());
    assert!(sql.contains("count(*)"));
    assert!(
        sql.contains("GROUP BY CAST(EXTRACT(year FROM \"event\".\"date\") AS BIGINT)"),
        "unexpected sql: {}",
        sql
    );

    // No aggregates, no grouping.
    let plain = View::new(&registry, "event", &["name"]).unwrap();
    let (sql, _) = self::sql(&plain, &Config::default());
    assert!(!sql.contains("GROUP BY"));
}

#[test]
fn acl_read_applies_to_base_and_joined_tables() {
    let registry = registry();
    let config = Config::default()
        .acl_read("country", "(= name {allowed})")
        .var("allowed", "Belgium");
    let view = View::new(&registry, "team", &["name", "country.name"]).unwrap();
    let (sql, params) = sql(&view, &config);
    // The country ACL compiles against the join alias.
    assert!(
        sql.contains("WHERE \"country_0\".\"name\" = $1"),
        "unexpected sql: {}",
        sql
    );
    assert_eq!(params.len(), 1);

    // Without the join, the country ACL does not apply.
    let bare = View::new(&registry, "team", &["name"]).unwrap();
    let (sql, params) = self::sql(&bare, &config);
    assert!(!sql.contains("WHERE"));
    assert!(params.is_empty());
}

#[test]
fn correlated_subview_reaches_the_parent() {
    let registry = registry();
    let view = View::new(&registry, "speaker", &["name"]).unwrap();
    let query = view
        .read()
        .filter("(exists (from event_speaker (select 1) (where (= speaker _parent.id))))")
        .to_query(&Config::default(), &GenericSqlWriter)
        .unwrap();
    assert!(
        query.sql.contains(
            "EXISTS (SELECT 1 FROM \"event_speaker\" WHERE \
             \"event_speaker\".\"speaker\" = \"speaker\".\"id\")"
        ),
        "unexpected sql: {}",
        query.sql
    );
}

#[test]
fn order_limit_offset_and_distinct() {
    let registry = registry();
    let view = View::new(&registry, "team", &["name"]).unwrap();
    let query = view
        .read()
        .distinct()
        .order("name")
        .order_desc("country.name")
        .limit(10)
        .offset(5)
        .to_query(&Config::default(), &GenericSqlWriter)
        .unwrap();
    assert!(query.sql.starts_with("SELECT DISTINCT "));
    assert!(query.sql.contains(
        "ORDER BY \"team\".\"name\", \"country_0\".\"name\" DESC"
    ));
    assert!(query.sql.ends_with("LIMIT 10 OFFSET 5"));
}

#[test]
fn unknown_head_is_a_parse_error() {
    let registry = registry();
    let view = View::new(&registry, "team", &["name"]).unwrap();
    let error = view
        .read()
        .filter("(frobnicate name)")
        .to_query(&Config::default(), &GenericSqlWriter)
        .unwrap_err();
    assert!(matches!(error, Error::Parse(..)));
}

#[test]
fn unknown_field_is_a_resolve_error() {
    let registry = registry();
    let error = View::new(&registry, "team", &["nope"]).unwrap_err();
    assert!(matches!(error, Error::Resolve { .. }));
    let error = View::new(&registry, "team", &["country.nope"]).unwrap_err();
    assert!(matches!(error, Error::Resolve { .. }));
}

#[test]
fn missing_argument_is_an_arg_error() {
    let registry = registry();
    let view = View::new(&registry, "team", &["name"]).unwrap();
    let error = view
        .read()
        .filter("(= name {missing})")
        .to_query(&Config::default(), &GenericSqlWriter)
        .unwrap_err();
    assert!(matches!(error, Error::Arg(..)));
}

#[test]
fn one_to_many_paths_join_backwards() {
    let registry = registry();
    let view = View::new(&registry, "team", &["name", "members.name"]).unwrap();
    let (sql, _) = sql(&view, &Config::default());
    assert!(
        sql.contains(
            "LEFT JOIN \"member\" AS \"member_0\" ON (\"team\".\"id\" = \"member_0\".\"team\")"
        ),
        "unexpected sql: {}",
        sql
    );
}
