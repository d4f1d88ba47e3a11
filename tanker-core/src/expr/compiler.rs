use crate::{
    ArgValue, Args, Ast, ColumnType, Error, Head, HeadRegistry, Registry, Result, SqlWriter,
    Table, Value,
    expr::reader::Placeholder,
};
use std::{collections::HashMap, fmt::Write, sync::Arc};

/// One join required by a resolved path: deterministic alias plus the
/// rendered ON condition. Joins are deduplicated on `key`, so two paths
/// sharing a prefix reuse the same alias.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    /// (left alias, right table, left column, right column)
    pub key: (String, String, String, String),
    pub table: String,
    pub alias: String,
    pub on_sql: String,
}

/// One nesting level of a compilation: the table the paths are rooted at,
/// the alias it is known under, and the joins discovered so far.
#[derive(Debug)]
pub struct Frame {
    pub table: Arc<Table>,
    pub alias: String,
    pub joins: Vec<JoinSpec>,
    /// Per-column alias overrides, used by the write engine to evaluate
    /// filters against staged values instead of stored ones.
    pub column_alias: HashMap<String, String>,
}

/// Walks the AST and emits SQL text plus the bound parameter list.
///
/// The join alias counter is owned here and shared by every frame, so
/// aliases stay unique and deterministic across sub-view nesting.
pub struct Compiler<'a> {
    pub registry: &'a Registry,
    pub writer: &'a dyn SqlWriter,
    pub heads: &'a HeadRegistry,
    args: &'a Args,
    vars: &'a HashMap<String, ArgValue>,
    pub params: Vec<Value>,
    frames: Vec<Frame>,
    join_count: usize,
    next_positional: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(
        registry: &'a Registry,
        writer: &'a dyn SqlWriter,
        heads: &'a HeadRegistry,
        args: &'a Args,
        vars: &'a HashMap<String, ArgValue>,
        base: Arc<Table>,
        base_alias: impl Into<String>,
    ) -> Compiler<'a> {
        Compiler {
            registry,
            writer,
            heads,
            args,
            vars,
            params: Vec::new(),
            frames: vec![Frame {
                table: base,
                alias: base_alias.into(),
                joins: Vec::new(),
                column_alias: HashMap::new(),
            }],
            join_count: 0,
            next_positional: 0,
        }
    }

    pub fn base(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn base_mut(&mut self) -> &mut Frame {
        &mut self.frames[0]
    }

    /// Index of the innermost frame.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn push_frame(&mut self, table: Arc<Table>, alias: impl Into<String>) -> usize {
        self.frames.push(Frame {
            table,
            alias: alias.into(),
            joins: Vec::new(),
            column_alias: HashMap::new(),
        });
        self.frames.len() - 1
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Pop the innermost frame, moving its joins into `into` so they are
    /// still emitted with the enclosing FROM clause. Used for ACL filters
    /// compiled against a joined table's alias.
    pub fn pop_frame_merge(&mut self, into: usize) {
        if let Some(frame) = self.frames.pop() {
            self.frames[into].joins.extend(frame.joins);
        }
    }

    /// Equality sugar for mapping filters: `column = <param>`.
    pub fn compile_eq(
        &mut self,
        frame: usize,
        column: &str,
        value: Value,
        out: &mut String,
    ) -> Result<()> {
        let (alias, column) = self.resolve(frame, column)?;
        self.writer.write_column_ref(out, &alias, &column);
        out.push_str(" = ");
        self.push_param(value, out);
        Ok(())
    }

    /// Seed a frame with a pre-rendered join (alias already allocated via
    /// [`Compiler::next_join_alias`]), so later path resolution reuses its
    /// alias instead of emitting a fresh join.
    pub fn seed_join(&mut self, frame: usize, join: JoinSpec) {
        self.frames[frame].joins.push(join);
    }

    pub fn next_join_alias(&mut self, table: &str) -> String {
        let alias = format!("{}_{}", table, self.join_count);
        self.join_count += 1;
        alias
    }

    /// Resolve a dotted path rooted at `frame` into `(alias, column)`,
    /// registering any joins it needs on the way.
    pub fn resolve(&mut self, frame: usize, path: &str) -> Result<(String, String)> {
        let mut table = self.frames[frame].table.clone();
        let mut forced: Option<String> = None;
        let mut rest = path;
        loop {
            match rest.split_once('.') {
                None => {
                    let column = table.column(rest)?;
                    if column.ctype.is_virtual() {
                        return Err(Error::resolve(&table.name, path));
                    }
                    let alias = forced.unwrap_or_else(|| self.base_alias(frame, rest));
                    return Ok((alias, rest.to_string()));
                }
                Some((head, tail)) => {
                    let column = table.column(head).map_err(|_| {
                        Error::resolve(&self.frames[frame].table.name, path)
                    })?;
                    let (target_name, left_col, right_col) = match &column.ctype {
                        ColumnType::M2o {
                            table: target,
                            column: remote,
                        } => (target.clone(), head.to_string(), remote.clone()),
                        ColumnType::O2m {
                            table: source,
                            column: back,
                        } => {
                            // The back column is an m2o pointing at us; join
                            // on the column it references.
                            let source_table = self.registry.get(source)?;
                            let pointed = match &source_table.column(back)?.ctype {
                                ColumnType::M2o { column, .. } => column.clone(),
                                _ => return Err(Error::resolve(&table.name, path)),
                            };
                            (source.clone(), pointed, back.clone())
                        }
                        _ => return Err(Error::resolve(&table.name, path)),
                    };
                    let left_alias = forced.unwrap_or_else(|| self.base_alias(frame, head));
                    let target = self.registry.get(&target_name)?.clone();
                    forced = Some(self.add_join(frame, left_alias, &target_name, left_col, right_col));
                    table = target;
                    rest = tail;
                }
            }
        }
    }

    fn base_alias(&self, frame: usize, column: &str) -> String {
        let frame = &self.frames[frame];
        frame
            .column_alias
            .get(column)
            .cloned()
            .unwrap_or_else(|| frame.alias.clone())
    }

    fn add_join(
        &mut self,
        frame: usize,
        left_alias: String,
        table: &str,
        left_col: String,
        right_col: String,
    ) -> String {
        let key = (left_alias, table.to_string(), left_col, right_col);
        if let Some(existing) = self.frames[frame].joins.iter().find(|j| j.key == key) {
            return existing.alias.clone();
        }
        let alias = self.next_join_alias(table);
        let mut on_sql = String::new();
        self.writer.write_column_ref(&mut on_sql, &key.0, &key.2);
        on_sql.push_str(" = ");
        self.writer.write_column_ref(&mut on_sql, &alias, &key.3);
        self.frames[frame].joins.push(JoinSpec {
            table: key.1.clone(),
            key,
            alias: alias.clone(),
            on_sql,
        });
        alias
    }

    pub fn write_frame_joins(&self, frame: usize, out: &mut String) {
        for join in &self.frames[frame].joins {
            out.push(' ');
            write_join(self.writer, join, out);
        }
    }

    pub fn compile(&mut self, frame: usize, ast: &Ast, out: &mut String) -> Result<()> {
        match ast {
            Ast::Sym(symbol) => self.compile_symbol(frame, symbol, out),
            Ast::Str(text) => {
                self.writer.write_string_literal(out, text);
                Ok(())
            }
            Ast::Int(v) => {
                let _ = write!(out, "{}", v);
                Ok(())
            }
            Ast::Float(v) => {
                let _ = write!(out, "{}", v);
                Ok(())
            }
            Ast::Param(placeholder) => self.compile_param(placeholder, out),
            Ast::List(items) => self.compile_list(frame, items, out),
        }
    }

    fn compile_symbol(&mut self, frame: usize, symbol: &str, out: &mut String) -> Result<()> {
        if symbol.eq_ignore_ascii_case("null") {
            out.push_str("NULL");
            return Ok(());
        }
        // `_parent.` climbs one frame per repetition, resolving inside the
        // enclosing compilation (correlated sub-views).
        let mut frame = frame;
        let mut path = symbol;
        while let Some(tail) = path.strip_prefix("_parent.") {
            frame = frame.checked_sub(1).ok_or_else(|| {
                Error::parse(format!("`{}` has no parent view to refer to", symbol))
            })?;
            path = tail;
        }
        let (alias, column) = self.resolve(frame, path)?;
        self.writer.write_column_ref(out, &alias, &column);
        Ok(())
    }

    fn compile_list(&mut self, frame: usize, items: &[Ast], out: &mut String) -> Result<()> {
        let Some(first) = items.first() else {
            return Err(Error::parse("empty expression `()`"));
        };
        let Ast::Sym(name) = first else {
            return Err(Error::parse(format!(
                "expression head must be a symbol, got `{:?}`",
                first
            )));
        };
        let head = *self
            .heads
            .get(name)
            .ok_or_else(|| Error::parse(format!("unknown head `{}`", name)))?;
        let args = &items[1..];
        match head {
            Head::Infix(op) => {
                if args.is_empty() {
                    return Err(Error::parse(format!("`{}` expects at least one argument", name)));
                }
                if args.len() == 1 && op == "-" {
                    out.push_str("- ");
                    return self.compile(frame, &args[0], out);
                }
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                        out.push_str(op);
                        out.push(' ');
                    }
                    self.compile(frame, arg, out)?;
                }
                out.push(')');
                Ok(())
            }
            Head::Compare(op) => {
                if args.len() != 2 {
                    return Err(Error::parse(format!(
                        "`{}` expects two arguments, got {}",
                        name,
                        args.len()
                    )));
                }
                self.compile(frame, &args[0], out)?;
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                self.compile(frame, &args[1], out)
            }
            Head::Unary(op) => {
                if args.len() != 1 {
                    return Err(Error::parse(format!("`{}` expects one argument", name)));
                }
                out.push_str(op);
                out.push_str(" (");
                self.compile(frame, &args[0], out)?;
                out.push(')');
                Ok(())
            }
            Head::Func { name: func, .. } => {
                out.push_str(func);
                out.push('(');
                if func == "count" && (args.is_empty() || args == [Ast::Sym("*".to_string())]) {
                    out.push('*');
                } else {
                    separated(self, frame, args, ", ", out)?;
                }
                out.push(')');
                Ok(())
            }
            Head::Custom(lower) => lower(self, frame, args, out),
        }
    }

    fn compile_param(&mut self, placeholder: &Placeholder, out: &mut String) -> Result<()> {
        let args = self.args;
        let vars = self.vars;
        let mut value: &ArgValue = if placeholder.key.is_empty() {
            let index = self.next_positional;
            self.next_positional += 1;
            args.positional.get(index).ok_or_else(|| {
                Error::arg(format!("missing positional argument {}", index))
            })?
        } else if let Ok(index) = placeholder.key.parse::<usize>() {
            args.positional.get(index).ok_or_else(|| {
                Error::arg(format!("missing positional argument {}", index))
            })?
        } else {
            args.named
                .get(&placeholder.key)
                .or_else(|| vars.get(&placeholder.key))
                .ok_or_else(|| {
                    Error::arg(format!("no argument named `{}`", placeholder.key))
                })?
        };
        for attr in &placeholder.path {
            value = value.attr(attr)?;
        }
        match value {
            ArgValue::Scalar(scalar) => {
                let scalar = scalar.clone();
                self.push_param(scalar, out);
                Ok(())
            }
            ArgValue::List(items) => {
                let scalars = items
                    .iter()
                    .map(|item| match item {
                        ArgValue::Scalar(scalar) => Ok(scalar.clone()),
                        _ => Err(Error::arg(
                            "list arguments must contain scalar values only",
                        )),
                    })
                    .collect::<Result<Vec<_>>>()?;
                for (i, scalar) in scalars.into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.push_param(scalar, out);
                }
                Ok(())
            }
            ArgValue::Map(..) => Err(Error::arg(format!(
                "cannot bind map argument `{}` directly",
                placeholder.key
            ))),
        }
    }

    fn push_param(&mut self, value: Value, out: &mut String) {
        self.params.push(value);
        self.writer.write_placeholder(out, self.params.len());
    }
}

pub fn write_join(writer: &dyn SqlWriter, join: &JoinSpec, out: &mut String) {
    out.push_str("LEFT JOIN ");
    writer.write_identifier(out, &join.table);
    out.push_str(" AS ");
    writer.write_identifier(out, &join.alias);
    out.push_str(" ON (");
    out.push_str(&join.on_sql);
    out.push(')');
}

/// Compile a slice of expressions joined by a separator.
pub fn separated(
    c: &mut Compiler<'_>,
    frame: usize,
    items: &[Ast],
    separator: &str,
    out: &mut String,
) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        c.compile(frame, item, out)?;
    }
    Ok(())
}
