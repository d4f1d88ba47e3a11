use crate::{
    ArgValue, Args, Config, Driver, FieldKind, FilterSpec, HeadRegistry, Query, Result,
    ResultSet, Scope, SortOrder, SqlWriter, Value, View,
    expr::{self, Compiler, write_join},
};
use std::fmt::Write;

/// Builder for one SELECT over a view. Compilation is pure: the same
/// builder state always yields the same SQL text and parameter list.
pub struct ReadQuery<'v> {
    view: &'v View,
    filters: Vec<FilterSpec>,
    args: Args,
    order: Vec<(String, SortOrder)>,
    groupby: Option<Vec<String>>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    disable_acl: bool,
    heads: HeadRegistry,
}

impl<'v> ReadQuery<'v> {
    pub(crate) fn new(view: &'v View) -> ReadQuery<'v> {
        ReadQuery {
            view,
            filters: Vec::new(),
            args: Args::new(),
            order: Vec::new(),
            groupby: None,
            limit: None,
            offset: None,
            distinct: false,
            disable_acl: false,
            heads: HeadRegistry::standard(),
        }
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filters.push(FilterSpec::Expr(expr.into()));
        self
    }

    /// Mapping sugar: conjoin `column = value`.
    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FilterSpec::Eq(column.into(), value.into()));
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.set(name, value);
        self
    }

    /// Positional argument, consumed by bare `{}` placeholders in order.
    pub fn bind(mut self, value: impl Into<ArgValue>) -> Self {
        self.args.bind(value);
        self
    }

    pub fn order(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortOrder::Asc)
    }

    pub fn order_desc(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortOrder::Desc)
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortOrder) -> Self {
        self.order.push((field.into(), direction));
        self
    }

    /// Explicit GROUP BY, overriding aggregate inference.
    pub fn groupby(mut self, fields: &[&str]) -> Self {
        self.groupby = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn disable_acl(mut self) -> Self {
        self.disable_acl = true;
        self
    }

    /// Swap in an extended head registry before compiling.
    pub fn heads(mut self, heads: HeadRegistry) -> Self {
        self.heads = heads;
        self
    }

    /// Compile to a single SELECT without touching the database.
    pub fn to_query(&self, config: &Config, writer: &dyn SqlWriter) -> Result<Query> {
        let view = self.view;
        let mut c = Compiler::new(
            &view.registry,
            writer,
            &self.heads,
            &self.args,
            &config.vars,
            view.table.clone(),
            view.table.name.clone(),
        );

        // Projections first, noting which ones aggregate.
        let mut selects = Vec::with_capacity(view.fields.len());
        let mut aggregated = Vec::with_capacity(view.fields.len());
        for field in &view.fields {
            let mut sql = String::new();
            match &field.kind {
                FieldKind::Expression(ast) => {
                    c.compile(0, ast, &mut sql)?;
                    aggregated.push(expr::is_aggregate(ast, &self.heads));
                }
                _ => {
                    let (alias, column) = c.resolve(0, &field.desc)?;
                    writer.write_column_ref(&mut sql, &alias, &column);
                    aggregated.push(false);
                }
            }
            selects.push(sql);
        }

        let mut where_parts = compile_filters(&mut c, &self.filters)?;

        // ACL-read filters for the base table and every joined table.
        if !self.disable_acl {
            let mut targets = vec![(view.table.name.clone(), view.table.name.clone())];
            targets.extend(
                c.base()
                    .joins
                    .iter()
                    .map(|j| (j.alias.clone(), j.table.clone())),
            );
            for (alias, table_name) in targets {
                let Some(acl) = config.acl_read.get(&table_name) else {
                    continue;
                };
                for filter in acl {
                    let ast = expr::parse(filter)?;
                    let mut sql = String::new();
                    if table_name == view.table.name && alias == view.table.name {
                        c.compile(0, &ast, &mut sql)?;
                    } else {
                        let table = view.registry.get(&table_name)?.clone();
                        let frame = c.push_frame(table, alias.clone());
                        c.compile(frame, &ast, &mut sql)?;
                        c.pop_frame_merge(0);
                    }
                    where_parts.push(sql);
                }
            }
        }

        // Order clauses; bare paths parse as symbols and resolve normally.
        let mut order_parts = Vec::new();
        for (field, direction) in &self.order {
            let ast = expr::parse(field)?;
            let mut sql = String::new();
            c.compile(0, &ast, &mut sql)?;
            if *direction == SortOrder::Desc {
                sql.push_str(" DESC");
            }
            order_parts.push(sql);
        }

        // Group by: explicit, or inferred from mixed aggregate projections.
        let group_parts: Vec<String> = match &self.groupby {
            Some(fields) => {
                let mut parts = Vec::with_capacity(fields.len());
                for field in fields {
                    let ast = expr::parse(field)?;
                    let mut sql = String::new();
                    c.compile(0, &ast, &mut sql)?;
                    parts.push(sql);
                }
                parts
            }
            None if aggregated.iter().any(|a| *a) => selects
                .iter()
                .zip(&aggregated)
                .filter(|(_, aggregate)| !**aggregate)
                .map(|(sql, _)| sql.clone())
                .collect(),
            None => Vec::new(),
        };

        let mut sql = String::new();
        sql.push_str(if self.distinct {
            "SELECT DISTINCT "
        } else {
            "SELECT "
        });
        sql.push_str(&selects.join(", "));
        sql.push_str(" FROM ");
        writer.write_identifier(&mut sql, &view.table.name);
        for join in &c.base().joins {
            sql.push(' ');
            write_join(writer, join, &mut sql);
        }
        if !where_parts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_parts.join(" AND "));
        }
        if !group_parts.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&group_parts.join(", "));
        }
        if !order_parts.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_parts.join(", "));
        }
        if let Some(limit) = self.limit {
            let _ = write!(sql, " LIMIT {}", limit);
        }
        if let Some(offset) = self.offset {
            let _ = write!(sql, " OFFSET {}", offset);
        }
        Ok(Query::with_params(sql, c.params))
    }

    /// Compile and run, collecting the rows under the view's field names.
    pub async fn fetch<D: Driver>(self, scope: &mut Scope<D>) -> Result<ResultSet> {
        let query = {
            let writer = scope.writer()?;
            self.to_query(scope.config(), &writer)?
        };
        let rows = scope.fetch_all(query).await?;
        Ok(ResultSet::new(
            self.view.field_names().into(),
            rows.into_iter().map(|row| row.values).collect(),
        ))
    }
}

/// Compile a filter list into conjoined WHERE fragments.
pub(crate) fn compile_filters(
    c: &mut Compiler<'_>,
    filters: &[FilterSpec],
) -> Result<Vec<String>> {
    let mut parts = Vec::with_capacity(filters.len());
    for filter in filters {
        let mut sql = String::new();
        match filter {
            FilterSpec::Expr(text) => {
                let ast = expr::parse(text)?;
                c.compile(0, &ast, &mut sql)?;
            }
            FilterSpec::Eq(column, value) => {
                c.compile_eq(0, column, value.clone(), &mut sql)?;
            }
        }
        parts.push(sql);
    }
    Ok(parts)
}
