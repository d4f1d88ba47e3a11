use crate::{
    Ast, Error, Result,
    expr::compiler::{Compiler, separated},
};
use std::collections::HashMap;

/// Lowering of one head symbol.
///
/// The registry is open: callers may add their own heads (usually as
/// `Custom` functions) before compiling a view.
#[derive(Clone, Copy)]
pub enum Head {
    /// N-ary operator joined infix, wrapped in parentheses.
    Infix(&'static str),
    /// Binary operator, no surrounding parentheses.
    Compare(&'static str),
    /// Prefix operator over a single parenthesized operand.
    Unary(&'static str),
    /// Plain function call; aggregates drive group-by inference.
    Func { name: &'static str, aggregate: bool },
    Custom(HeadFn),
}

pub type HeadFn = fn(&mut Compiler<'_>, usize, &[Ast], &mut String) -> Result<()>;

#[derive(Clone)]
pub struct HeadRegistry {
    heads: HashMap<String, Head>,
}

impl HeadRegistry {
    pub fn standard() -> HeadRegistry {
        let mut registry = HeadRegistry {
            heads: HashMap::new(),
        };
        let mut put = |name: &str, head: Head| registry.heads.insert(name.to_string(), head);

        put("and", Head::Infix("AND"));
        put("or", Head::Infix("OR"));
        put("+", Head::Infix("+"));
        put("-", Head::Infix("-"));
        put("*", Head::Infix("*"));
        put("/", Head::Infix("/"));
        put("=", Head::Compare("="));
        put("!=", Head::Compare("!="));
        put("<", Head::Compare("<"));
        put("<=", Head::Compare("<="));
        put(">", Head::Compare(">"));
        put(">=", Head::Compare(">="));
        put("like", Head::Compare("LIKE"));
        put("is", Head::Compare("IS"));
        put("isnot", Head::Compare("IS NOT"));
        put("not", Head::Unary("NOT"));
        put("in", Head::Custom(head_in));
        put("notin", Head::Custom(head_notin));
        put("ilike", Head::Custom(head_ilike));
        put("extract", Head::Custom(head_extract));
        put("date_trunc", Head::Custom(head_date_trunc));
        put("cast", Head::Custom(head_cast));
        put("true", Head::Custom(head_true));
        put("false", Head::Custom(head_false));
        put("exists", Head::Custom(head_exists));
        put("from", Head::Custom(head_from));
        put("select", Head::Custom(head_select));
        put("select-distinct", Head::Custom(head_select_distinct));
        put("where", Head::Custom(head_where));
        for name in [
            "floor", "any", "all", "unnest", "coalesce", "nullif", "strftime",
        ] {
            put(
                name,
                Head::Func {
                    name,
                    aggregate: false,
                },
            );
        }
        for name in [
            "count", "sum", "avg", "min", "max", "bool_and", "bool_or", "every",
        ] {
            put(
                name,
                Head::Func {
                    name,
                    aggregate: true,
                },
            );
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, head: Head) {
        self.heads.insert(name.into(), head);
    }

    pub fn get(&self, name: &str) -> Option<&Head> {
        self.heads.get(&name.to_ascii_lowercase())
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        matches!(
            self.get(name),
            Some(Head::Func {
                aggregate: true,
                ..
            })
        )
    }
}

impl Default for HeadRegistry {
    fn default() -> Self {
        HeadRegistry::standard()
    }
}

/// Whether an expression contains an aggregate call anywhere.
pub fn is_aggregate(ast: &Ast, heads: &HeadRegistry) -> bool {
    match ast {
        Ast::List(items) => {
            if let Some(Ast::Sym(head)) = items.first() {
                if heads.is_aggregate(head) {
                    return true;
                }
            }
            items.iter().any(|item| is_aggregate(item, heads))
        }
        _ => false,
    }
}

fn arity(head: &str, args: &[Ast], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::parse(format!(
            "`{}` expects {} argument(s), got {}",
            head,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn head_in(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    write_in(c, frame, args, out, false)
}

fn head_notin(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    write_in(c, frame, args, out, true)
}

fn write_in(
    c: &mut Compiler<'_>,
    frame: usize,
    args: &[Ast],
    out: &mut String,
    negated: bool,
) -> Result<()> {
    if args.len() < 2 {
        return Err(Error::parse("`in` expects a needle and at least one candidate"));
    }
    c.compile(frame, &args[0], out)?;
    out.push_str(if negated { " NOT IN (" } else { " IN (" });
    separated(c, frame, &args[1..], ", ", out)?;
    out.push(')');
    Ok(())
}

fn head_ilike(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    arity("ilike", args, 2)?;
    let mut lhs = String::new();
    let mut rhs = String::new();
    c.compile(frame, &args[0], &mut lhs)?;
    c.compile(frame, &args[1], &mut rhs)?;
    c.writer.write_ilike(out, &lhs, &rhs);
    Ok(())
}

fn head_extract(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    arity("extract", args, 2)?;
    let Ast::Str(unit) = &args[0] else {
        return Err(Error::parse("`extract` expects a quoted unit as first argument"));
    };
    let mut operand = String::new();
    c.compile(frame, &args[1], &mut operand)?;
    c.writer.write_extract(out, unit, &operand);
    Ok(())
}

fn head_date_trunc(
    c: &mut Compiler<'_>,
    frame: usize,
    args: &[Ast],
    out: &mut String,
) -> Result<()> {
    arity("date_trunc", args, 2)?;
    let Ast::Str(unit) = &args[0] else {
        return Err(Error::parse("`date_trunc` expects a quoted unit as first argument"));
    };
    out.push_str("date_trunc(");
    c.writer.write_string_literal(out, unit);
    out.push_str(", ");
    c.compile(frame, &args[1], out)?;
    out.push(')');
    Ok(())
}

fn head_cast(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    arity("cast", args, 2)?;
    let Ast::Sym(ctype) = &args[1] else {
        return Err(Error::parse("`cast` expects a type name as second argument"));
    };
    out.push_str("CAST(");
    c.compile(frame, &args[0], out)?;
    out.push_str(" AS ");
    out.push_str(&ctype.to_ascii_uppercase());
    out.push(')');
    Ok(())
}

fn head_true(c: &mut Compiler<'_>, _frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    arity("true", args, 0)?;
    c.writer.write_bool_literal(out, true);
    Ok(())
}

fn head_false(c: &mut Compiler<'_>, _frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    arity("false", args, 0)?;
    c.writer.write_bool_literal(out, false);
    Ok(())
}

fn head_exists(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    arity("exists", args, 1)?;
    out.push_str("EXISTS (");
    c.compile(frame, &args[0], out)?;
    out.push(')');
    Ok(())
}

/// Sub-view: `(from <table> (select …) (where …))`. Opens a nested frame
/// whose parent is the current one; `_parent.…` symbols inside resolve
/// against the outer view.
fn head_from(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    let Some(Ast::Sym(table_name)) = args.first() else {
        return Err(Error::parse("`from` expects a table name as first argument"));
    };
    let table = c.registry.get(table_name)?.clone();
    debug_assert!(frame == c.depth());
    let inner = c.push_frame(table, table_name.clone());
    let mut select = String::new();
    let mut tail = String::new();
    for (i, item) in args[1..].iter().enumerate() {
        if i == 0 {
            c.compile(inner, item, &mut select)?;
        } else {
            if !tail.is_empty() {
                tail.push(' ');
            }
            c.compile(inner, item, &mut tail)?;
        }
    }
    out.push_str(&select);
    out.push_str(" FROM ");
    c.writer.write_identifier(out, table_name);
    c.write_frame_joins(inner, out);
    if !tail.is_empty() {
        out.push(' ');
        out.push_str(&tail);
    }
    c.pop_frame();
    Ok(())
}

fn head_select(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    out.push_str("SELECT ");
    separated(c, frame, args, ", ", out)
}

fn head_select_distinct(
    c: &mut Compiler<'_>,
    frame: usize,
    args: &[Ast],
    out: &mut String,
) -> Result<()> {
    out.push_str("SELECT DISTINCT ");
    separated(c, frame, args, ", ", out)
}

fn head_where(c: &mut Compiler<'_>, frame: usize, args: &[Ast], out: &mut String) -> Result<()> {
    out.push_str("WHERE ");
    separated(c, frame, args, " AND ", out)
}
