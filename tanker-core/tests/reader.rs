use tanker_core::{Ast, Error, parse};

#[test]
fn parses_nested_lists() {
    let ast = parse("(and (= name 'x') (> id 5))").unwrap();
    let Ast::List(items) = ast else {
        panic!("expected a list");
    };
    assert_eq!(items[0], Ast::Sym("and".to_string()));
    assert_eq!(items.len(), 3);
}

#[test]
fn parses_atoms() {
    assert_eq!(parse("42").unwrap(), Ast::Int(42));
    assert_eq!(parse("-7").unwrap(), Ast::Int(-7));
    assert_eq!(parse("2.5").unwrap(), Ast::Float(2.5));
    assert_eq!(parse("name").unwrap(), Ast::Sym("name".to_string()));
    assert_eq!(parse("'it''s'").unwrap(), Ast::Str("it's".to_string()));
    assert_eq!(
        parse("\"quo\\\"ted\"").unwrap(),
        Ast::Str("quo\"ted".to_string())
    );
}

#[test]
fn parses_placeholders() {
    let Ast::Param(p) = parse("{name}").unwrap() else {
        panic!("expected a placeholder");
    };
    assert_eq!(p.key, "name");
    assert!(p.path.is_empty());

    let Ast::Param(p) = parse("{cfg.owner.id}").unwrap() else {
        panic!("expected a placeholder");
    };
    assert_eq!(p.key, "cfg");
    assert_eq!(p.path, ["owner", "id"]);

    let Ast::Param(p) = parse("{}").unwrap() else {
        panic!("expected a placeholder");
    };
    assert_eq!(p.key, "");
}

#[test]
fn whitespace_is_insignificant() {
    assert_eq!(
        parse("(=  name\n'x')").unwrap(),
        parse("(= name 'x')").unwrap()
    );
}

#[test]
fn rejects_malformed_input() {
    assert!(matches!(parse("(= a"), Err(Error::Parse(..))));
    assert!(matches!(parse(")"), Err(Error::Parse(..))));
    assert!(matches!(parse("(= a 1) extra"), Err(Error::Parse(..))));
    assert!(matches!(parse("'open"), Err(Error::Parse(..))));
    assert!(matches!(parse("{open"), Err(Error::Parse(..))));
}
