use tanker_core::{ColumnType, Error, Registry, TableDecl};

#[test]
fn implicit_id_and_single_column_key() {
    let registry = Registry::build(&[TableDecl::new("country").column("name", "varchar")])
        .unwrap();
    let country = registry.get("country").unwrap();
    assert_eq!(country.columns[0].name, "id");
    assert_eq!(country.key, ["name"]);
}

#[test]
fn default_fields_expand_foreign_keys() {
    let registry = Registry::build(&[
        TableDecl::new("country").column("name", "varchar"),
        TableDecl::new("team")
            .column("name", "varchar")
            .column("country", "m2o country.id")
            .key(&["name", "country"]),
    ])
    .unwrap();
    let team = registry.get("team").unwrap();
    assert_eq!(
        registry.default_fields(team).unwrap(),
        ["name", "country.name"]
    );
}

#[test]
fn relation_columns_parse() {
    assert_eq!(
        ColumnType::parse("m2o country.id").unwrap(),
        ColumnType::M2o {
            table: "country".into(),
            column: "id".into()
        }
    );
    assert_eq!(
        ColumnType::parse("varchar[]").unwrap(),
        ColumnType::Array(Box::new(ColumnType::Varchar))
    );
    assert!(matches!(
        ColumnType::parse("m2o country"),
        Err(Error::Schema(..))
    ));
    assert!(matches!(ColumnType::parse("blob"), Err(Error::Schema(..))));
}

#[test]
fn bad_declarations_fail_at_build() {
    // Unknown m2o target.
    let error = Registry::build(&[TableDecl::new("team")
        .column("name", "varchar")
        .column("country", "m2o country.id")
        .key(&["name"])])
    .unwrap_err();
    assert!(matches!(error, Error::Schema(..)));

    // Key over a missing column.
    let error = Registry::build(&[TableDecl::new("team")
        .column("name", "varchar")
        .key(&["nope"])])
    .unwrap_err();
    assert!(matches!(error, Error::Schema(..)));

    // Key over a virtual column.
    let error = Registry::build(&[
        TableDecl::new("team")
            .column("name", "varchar")
            .column("members", "o2m member.team")
            .key(&["members"]),
        TableDecl::new("member")
            .column("name", "varchar")
            .column("team", "m2o team.id")
            .key(&["name"]),
    ])
    .unwrap_err();
    assert!(matches!(error, Error::Schema(..)));

    // Duplicate table.
    let error = Registry::build(&[
        TableDecl::new("team").column("name", "varchar"),
        TableDecl::new("team").column("name", "varchar"),
    ])
    .unwrap_err();
    assert!(matches!(error, Error::Schema(..)));

    // No key and no single-column shorthand.
    let error = Registry::build(&[TableDecl::new("team")
        .column("name", "varchar")
        .column("color", "varchar")])
    .unwrap_err();
    assert!(matches!(error, Error::Schema(..)));

    // o2m back-column must point back at the declaring table.
    let error = Registry::build(&[
        TableDecl::new("country").column("name", "varchar"),
        TableDecl::new("team")
            .column("name", "varchar")
            .column("country", "m2o country.id")
            .key(&["name"]),
        TableDecl::new("member")
            .column("name", "varchar")
            .column("teams", "o2m team.country"),
    ])
    .unwrap_err();
    assert!(matches!(error, Error::Schema(..)));
}

#[test]
fn cyclic_relations_are_allowed() {
    let registry = Registry::build(&[
        TableDecl::new("alpha")
            .column("name", "varchar")
            .column("beta", "m2o beta.id")
            .key(&["name"]),
        TableDecl::new("beta")
            .column("name", "varchar")
            .column("alpha", "m2o alpha.id")
            .key(&["name"]),
    ])
    .unwrap();
    assert!(registry.get("alpha").is_ok());
    assert!(registry.get("beta").is_ok());
}
