use crate::{
    ArgValue, Args, ColumnType, Driver, Error, FieldKind, FilterSpec, HeadRegistry, Query,
    Registry, Result, Row, Scope, SqlWriter, Table, Value, View,
    expr::{Compiler, JoinSpec, write_join},
    schema::coerce_value,
    view::read::compile_filters,
};
use std::{collections::HashMap, sync::Arc};

const TMP: &str = "tmp";

/// Outcome of a write: rows rejected by write filters / ACL, and rows
/// deleted by a purge.
#[derive(Debug, Default, PartialEq)]
pub struct WriteResult {
    pub filtered: u64,
    pub deleted: u64,
}

/// How one target column gets its value from the staged rows.
enum EntrySource {
    /// Copied straight from the staged column.
    Plain { desc: String },
    /// Resolved through a join chain ending on the referenced table.
    Fk(FkGroup),
}

struct FkGroup {
    /// Referenced table and the unique column the fk stores.
    target: String,
    remote_column: String,
    /// (remaining path, staged column name) pairs under this fk.
    members: Vec<(String, String)>,
}

struct PlanEntry {
    column: String,
    source: EntrySource,
}

/// Field separation for the write side: one entry per target column, plus
/// the staged layout of the temporary table.
struct WritePlan {
    entries: Vec<PlanEntry>,
    staged_columns: Vec<String>,
    staged_types: Vec<ColumnType>,
    staged_key: Vec<bool>,
    key_columns: Vec<String>,
    has_id_field: bool,
}

impl WritePlan {
    fn new(view: &View) -> Result<WritePlan> {
        view.validate_key()?;
        let mut entries: Vec<PlanEntry> = Vec::new();
        let mut staged_columns = Vec::new();
        let mut staged_types = Vec::new();
        let mut staged_key = Vec::new();
        let key_columns = view.key_columns();
        for field in &view.fields {
            let Some(column) = field.target_column() else {
                return Err(Error::schema(format!(
                    "cannot write through expression field `{}`",
                    field.name
                )));
            };
            staged_columns.push(field.desc.clone());
            staged_types.push(field.ftype.clone().expect("non-expression field is typed"));
            staged_key.push(key_columns.iter().any(|k| k == column));
            match &field.kind {
                FieldKind::Column => {
                    entries.push(PlanEntry {
                        column: column.to_string(),
                        source: EntrySource::Plain {
                            desc: field.desc.clone(),
                        },
                    });
                }
                FieldKind::Path { column } => {
                    let declared = view.table.column(column)?;
                    let Some((target, remote_column)) = declared.relation() else {
                        return Err(Error::resolve(&view.table.name, &field.desc));
                    };
                    if declared.ctype.is_virtual() {
                        return Err(Error::schema(format!(
                            "cannot write through one-to-many path `{}`",
                            field.desc
                        )));
                    }
                    let rest = field.desc[column.len() + 1..].to_string();
                    let member = (rest, field.desc.clone());
                    match entries.iter_mut().find(|e| e.column == *column) {
                        Some(PlanEntry {
                            source: EntrySource::Fk(group),
                            ..
                        }) => group.members.push(member),
                        Some(..) => {
                            return Err(Error::schema(format!(
                                "column `{}` is written both directly and through `{}`",
                                column, field.desc
                            )));
                        }
                        None => entries.push(PlanEntry {
                            column: column.to_string(),
                            source: EntrySource::Fk(FkGroup {
                                target: target.to_string(),
                                remote_column: remote_column.to_string(),
                                members: vec![member],
                            }),
                        }),
                    }
                }
                FieldKind::Expression(..) => unreachable!(),
            }
        }
        Ok(WritePlan {
            has_id_field: entries.iter().any(|e| e.column == "id"),
            entries,
            staged_columns,
            staged_types,
            staged_key,
            key_columns,
        })
    }

    /// Coerce one input row to the staged column types.
    fn format_row(&self, row: Vec<Value>) -> Result<Row> {
        if row.len() != self.staged_columns.len() {
            return Err(Error::arg(format!(
                "expected {} values per row, got {}",
                self.staged_columns.len(),
                row.len()
            )));
        }
        row.into_iter()
            .zip(self.staged_columns.iter().zip(&self.staged_types))
            .map(|(value, (column, ctype))| coerce_value(value, ctype, column))
            .collect()
    }
}

/// The rendered fk-resolution joins for one statement, mapping each fk
/// column to the alias carrying its resolved id.
struct FkJoins {
    joins: Vec<JoinSpec>,
    resolved: HashMap<String, (String, String)>,
}

fn build_fk_joins(
    plan: &WritePlan,
    registry: &Registry,
    writer: &dyn SqlWriter,
    c: &mut Compiler<'_>,
) -> Result<FkJoins> {
    let mut joins = Vec::new();
    let mut resolved = HashMap::new();
    for entry in &plan.entries {
        let EntrySource::Fk(group) = &entry.source else {
            continue;
        };
        let target = registry.get(&group.target)?.clone();
        let alias = join_target(
            registry,
            writer,
            c,
            &mut joins,
            TMP,
            &entry.column,
            &group.remote_column,
            &target,
            &group.members,
        )?;
        resolved.insert(
            entry.column.clone(),
            (alias, group.remote_column.clone()),
        );
    }
    Ok(FkJoins { joins, resolved })
}

/// Join one referenced table, matching it on the staged columns that land
/// in it. Nested fk members recurse; deeper joins are emitted first so an
/// ON clause only ever refers to aliases already in scope.
#[allow(clippy::too_many_arguments)]
fn join_target(
    registry: &Registry,
    writer: &dyn SqlWriter,
    c: &mut Compiler<'_>,
    joins: &mut Vec<JoinSpec>,
    parent_alias: &str,
    link_column: &str,
    remote_column: &str,
    target: &Arc<Table>,
    members: &[(String, String)],
) -> Result<String> {
    let alias = c.next_join_alias(&target.name);
    let mut conditions: Vec<String> = Vec::new();
    let mut subgroups: Vec<(String, Vec<(String, String)>)> = Vec::new();
    let mut covered: Vec<&str> = Vec::new();
    for (rest, desc) in members {
        match rest.split_once('.') {
            None => {
                let column = target.column(rest)?;
                if column.ctype.is_virtual() {
                    return Err(Error::resolve(&target.name, desc));
                }
                covered.push(rest);
                let mut on = String::new();
                writer.write_column_ref(&mut on, &alias, rest);
                on.push_str(" = ");
                writer.write_column_ref(&mut on, TMP, desc);
                conditions.push(on);
            }
            Some((head, tail)) => {
                covered.push(head);
                match subgroups.iter_mut().find(|(h, _)| h == head) {
                    Some((_, submembers)) => {
                        submembers.push((tail.to_string(), desc.clone()))
                    }
                    None => subgroups
                        .push((head.to_string(), vec![(tail.to_string(), desc.clone())])),
                }
            }
        }
    }
    for (head, submembers) in &subgroups {
        let column = target.column(head)?;
        let Some((sub_table, sub_remote)) = column.relation() else {
            return Err(Error::resolve(&target.name, head));
        };
        if column.ctype.is_virtual() {
            return Err(Error::schema(format!(
                "cannot resolve rows of `{}` through one-to-many column `{}`",
                target.name, head
            )));
        }
        let sub_target = registry.get(sub_table)?.clone();
        let sub_alias = join_target(
            registry,
            writer,
            c,
            joins,
            &alias,
            head,
            sub_remote,
            &sub_target,
            submembers,
        )?;
        let mut on = String::new();
        writer.write_column_ref(&mut on, &alias, head);
        on.push_str(" = ");
        writer.write_column_ref(&mut on, &sub_alias, sub_remote);
        conditions.push(on);
    }
    // The match must pin exactly one row: require the natural key (or id).
    if !covered.contains(&"id") {
        for key_col in &target.key {
            if !covered.iter().any(|c| c == key_col) {
                return Err(Error::schema(format!(
                    "cannot resolve `{}` rows by natural key: column `{}` is not written",
                    target.name, key_col
                )));
            }
        }
    }
    joins.push(JoinSpec {
        key: (
            parent_alias.to_string(),
            target.name.clone(),
            link_column.to_string(),
            remote_column.to_string(),
        ),
        table: target.name.clone(),
        alias: alias.clone(),
        on_sql: conditions.join(" AND "),
    });
    Ok(alias)
}

/// Conditions matching staged rows against the target table on the view's
/// key columns.
fn key_conditions(
    plan: &WritePlan,
    fk: &FkJoins,
    writer: &dyn SqlWriter,
    main: &str,
) -> Result<Vec<String>> {
    let mut conditions = Vec::new();
    for key_col in &plan.key_columns {
        let mut on = String::new();
        let entry = plan
            .entries
            .iter()
            .find(|e| e.column == *key_col)
            .ok_or_else(|| {
                Error::schema(format!("key column `{}` is not part of the view", key_col))
            })?;
        match &entry.source {
            EntrySource::Plain { desc } => writer.write_column_ref(&mut on, TMP, desc),
            EntrySource::Fk(..) => {
                let (alias, remote) = &fk.resolved[key_col];
                writer.write_column_ref(&mut on, alias, remote);
            }
        }
        on.push_str(" = ");
        writer.write_column_ref(&mut on, main, key_col);
        conditions.push(on);
    }
    Ok(conditions)
}

/// Builder for one batched write: stage, resolve foreign keys, upsert.
pub struct WriteQuery<'v> {
    view: &'v View,
    purge: bool,
    insert: bool,
    update: bool,
    filters: Vec<FilterSpec>,
    args: Args,
    disable_acl: bool,
    heads: HeadRegistry,
}

impl<'v> WriteQuery<'v> {
    pub(crate) fn new(view: &'v View) -> WriteQuery<'v> {
        WriteQuery {
            view,
            purge: false,
            insert: true,
            update: true,
            filters: Vec::new(),
            args: Args::new(),
            disable_acl: false,
            heads: HeadRegistry::standard(),
        }
    }

    /// Also delete target rows absent from the staged data.
    pub fn purge(mut self) -> Self {
        self.purge = true;
        self
    }

    pub fn no_insert(mut self) -> Self {
        self.insert = false;
        self
    }

    pub fn no_update(mut self) -> Self {
        self.update = false;
        self
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filters.push(FilterSpec::Expr(expr.into()));
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.set(name, value);
        self
    }

    pub fn disable_acl(mut self) -> Self {
        self.disable_acl = true;
        self
    }

    pub fn heads(mut self, heads: HeadRegistry) -> Self {
        self.heads = heads;
        self
    }

    /// Rows as mappings from field name to value; absent keys stage NULL.
    pub async fn exec_maps<D: Driver>(
        self,
        scope: &mut Scope<D>,
        rows: Vec<HashMap<String, Value>>,
    ) -> Result<WriteResult> {
        let fields = self.view.field_names();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                fields
                    .iter()
                    .map(|f| row.remove(f).unwrap_or_default())
                    .collect()
            })
            .collect();
        self.exec(scope, rows).await
    }

    pub async fn exec<D: Driver>(
        self,
        scope: &mut Scope<D>,
        rows: Vec<Vec<Value>>,
    ) -> Result<WriteResult> {
        let view = self.view;
        let plan = WritePlan::new(view)?;
        let rows = rows
            .into_iter()
            .map(|row| plan.format_row(row))
            .collect::<Result<Vec<_>>>()?;

        stage(scope, &plan, rows).await?;

        let mut filters = self.filters.clone();
        if !self.disable_acl {
            if let Some(acl) = scope.config().acl_write.get(&view.table.name) {
                filters.extend(acl.iter().cloned().map(FilterSpec::Expr));
            }
        }
        let mut result = WriteResult::default();
        if !filters.is_empty() {
            // Rows that would newly violate the filters, then rows whose
            // stored counterpart already violates them: purged separately
            // so an insert-violation is never conflated with an update.
            result.filtered += purge_stage(scope, view, &plan, &filters, &self, StageSide::New)
                .await?;
            result.filtered += purge_stage(scope, view, &plan, &filters, &self, StageSide::Old)
                .await?;
        }

        upsert(scope, view, &plan, self.insert, self.update).await?;

        if self.purge {
            result.deleted = purge_main(scope, view, &plan, &filters, &self).await?;
        }

        scope
            .execute(Query::new(format!("DROP TABLE {}", TMP)))
            .await?;
        Ok(result)
    }
}

/// Create the temporary table and batch-load the staged rows.
async fn stage<D: Driver>(
    scope: &mut Scope<D>,
    plan: &WritePlan,
    rows: Vec<Row>,
) -> Result<()> {
    let writer = scope.writer()?;
    let mut sql = String::new();
    sql.push_str("CREATE TEMPORARY TABLE ");
    writer.write_identifier(&mut sql, TMP);
    sql.push_str(" (");
    for (i, (column, ctype)) in plan
        .staged_columns
        .iter()
        .zip(&plan.staged_types)
        .enumerate()
    {
        if i > 0 {
            sql.push_str(", ");
        }
        writer.write_identifier(&mut sql, column);
        sql.push(' ');
        writer.write_column_type(&mut sql, ctype);
        if plan.staged_key[i] {
            sql.push_str(" NOT NULL");
        }
    }
    if !plan.has_id_field {
        sql.push_str(", ");
        writer.write_identifier(&mut sql, "id");
        sql.push(' ');
        writer.write_id_column(&mut sql);
    }
    sql.push(')');
    scope.execute(Query::new(sql)).await?;
    scope
        .bulk_load(TMP, &plan.staged_columns, &plan.staged_types, rows)
        .await?;
    Ok(())
}

/// The single upsert statement: insert-select joining the staged rows
/// against the target, conflict-resolved on the key columns.
async fn upsert<D: Driver>(
    scope: &mut Scope<D>,
    view: &View,
    plan: &WritePlan,
    insert: bool,
    update: bool,
) -> Result<()> {
    let writer = scope.writer()?;
    let config = scope.config().clone();
    let args = Args::new();
    let heads = HeadRegistry::standard();
    let mut c = Compiler::new(
        &view.registry,
        &writer,
        &heads,
        &args,
        &config.vars,
        view.table.clone(),
        view.table.name.clone(),
    );
    let fk = build_fk_joins(plan, &view.registry, &writer, &mut c)?;
    let key_conds = key_conditions(plan, &fk, &writer, &view.table.name)?;

    let mut sql = String::new();
    sql.push_str("INSERT INTO ");
    writer.write_identifier(&mut sql, &view.table.name);
    sql.push_str(" (");
    for (i, entry) in plan.entries.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        writer.write_identifier(&mut sql, &entry.column);
    }
    sql.push_str(") SELECT ");
    for (i, entry) in plan.entries.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        match &entry.source {
            EntrySource::Plain { desc } => writer.write_column_ref(&mut sql, TMP, desc),
            EntrySource::Fk(..) => {
                let (alias, remote) = &fk.resolved[&entry.column];
                writer.write_column_ref(&mut sql, alias, remote);
            }
        }
    }
    sql.push_str(" FROM ");
    writer.write_identifier(&mut sql, TMP);
    for join in &fk.joins {
        sql.push(' ');
        write_join(&writer, join, &mut sql);
    }
    sql.push_str(if insert { " LEFT JOIN " } else { " INNER JOIN " });
    writer.write_identifier(&mut sql, &view.table.name);
    sql.push_str(" ON (");
    sql.push_str(&key_conds.join(" AND "));
    // The WHERE keeps the upsert clause unambiguous to parse on SQLite.
    sql.push_str(") WHERE ");
    writer.write_bool_literal(&mut sql, true);
    sql.push_str(" ON CONFLICT (");
    for (i, key_col) in plan.key_columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        writer.write_identifier(&mut sql, key_col);
    }
    sql.push(')');
    let updatable: Vec<&PlanEntry> = plan
        .entries
        .iter()
        .filter(|e| !plan.key_columns.contains(&e.column))
        .collect();
    if update && !updatable.is_empty() {
        sql.push_str(" DO UPDATE SET ");
        for (i, entry) in updatable.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            writer.write_identifier(&mut sql, &entry.column);
            sql.push_str(" = EXCLUDED.");
            writer.write_identifier(&mut sql, &entry.column);
        }
    } else {
        sql.push_str(" DO NOTHING");
    }
    scope.execute(Query::new(sql)).await?;
    Ok(())
}

enum StageSide {
    /// Filters evaluated against the staged values.
    New,
    /// Filters evaluated against the stored values of matching rows.
    Old,
}

/// Delete staged rows that fail the write filters, returning the count.
async fn purge_stage<D: Driver>(
    scope: &mut Scope<D>,
    view: &View,
    plan: &WritePlan,
    filters: &[FilterSpec],
    query: &WriteQuery<'_>,
    side: StageSide,
) -> Result<u64> {
    let writer = scope.writer()?;
    let config = scope.config().clone();
    let mut c = Compiler::new(
        &view.registry,
        &writer,
        &query.heads,
        &query.args,
        &config.vars,
        view.table.clone(),
        view.table.name.clone(),
    );
    if matches!(side, StageSide::New) {
        for entry in &plan.entries {
            c.base_mut()
                .column_alias
                .insert(entry.column.clone(), TMP.to_string());
        }
    }
    let fk = build_fk_joins(plan, &view.registry, &writer, &mut c)?;
    let key_conds = key_conditions(plan, &fk, &writer, &view.table.name)?;
    let seeded = fk.joins.len();
    for join in fk.joins.clone() {
        c.seed_join(0, join);
    }
    let where_parts = compile_filters(&mut c, filters)?;

    let mut sql = String::new();
    sql.push_str("DELETE FROM ");
    writer.write_identifier(&mut sql, TMP);
    sql.push_str(" WHERE ");
    writer.write_identifier(&mut sql, "id");
    sql.push_str(" IN (SELECT ");
    writer.write_column_ref(&mut sql, TMP, "id");
    sql.push_str(" FROM ");
    writer.write_identifier(&mut sql, TMP);
    for join in &c.base().joins[..seeded] {
        sql.push(' ');
        write_join(&writer, join, &mut sql);
    }
    sql.push_str(match side {
        StageSide::New => " LEFT JOIN ",
        StageSide::Old => " INNER JOIN ",
    });
    writer.write_identifier(&mut sql, &view.table.name);
    sql.push_str(" ON (");
    sql.push_str(&key_conds.join(" AND "));
    sql.push(')');
    for join in &c.base().joins[seeded..] {
        sql.push(' ');
        write_join(&writer, join, &mut sql);
    }
    sql.push_str(" WHERE NOT (");
    sql.push_str(&where_parts.join(" AND "));
    sql.push_str("))");
    let affected = scope
        .execute(Query::with_params(sql, c.params))
        .await?;
    Ok(affected.rows_affected)
}

/// Delete target rows absent from the staged data (and matching the write
/// filters, when there are any).
async fn purge_main<D: Driver>(
    scope: &mut Scope<D>,
    view: &View,
    plan: &WritePlan,
    filters: &[FilterSpec],
    query: &WriteQuery<'_>,
) -> Result<u64> {
    let writer = scope.writer()?;
    let config = scope.config().clone();
    let args = Args::new();
    let heads = HeadRegistry::standard();
    let mut matched = Compiler::new(
        &view.registry,
        &writer,
        &heads,
        &args,
        &config.vars,
        view.table.clone(),
        view.table.name.clone(),
    );
    let fk = build_fk_joins(plan, &view.registry, &writer, &mut matched)?;
    let key_conds = key_conditions(plan, &fk, &writer, &view.table.name)?;

    let mut sql = String::new();
    sql.push_str("DELETE FROM ");
    writer.write_identifier(&mut sql, &view.table.name);
    sql.push_str(" WHERE ");
    writer.write_identifier(&mut sql, "id");
    sql.push_str(" NOT IN (SELECT ");
    writer.write_column_ref(&mut sql, &view.table.name, "id");
    sql.push_str(" FROM ");
    writer.write_identifier(&mut sql, TMP);
    for join in &fk.joins {
        sql.push(' ');
        write_join(&writer, join, &mut sql);
    }
    sql.push_str(" INNER JOIN ");
    writer.write_identifier(&mut sql, &view.table.name);
    sql.push_str(" ON (");
    sql.push_str(&key_conds.join(" AND "));
    sql.push_str("))");

    let mut params = Vec::new();
    if !filters.is_empty() {
        let mut c = Compiler::new(
            &view.registry,
            &writer,
            &query.heads,
            &query.args,
            &config.vars,
            view.table.clone(),
            view.table.name.clone(),
        );
        let where_parts = compile_filters(&mut c, filters)?;
        sql.push_str(" AND ");
        writer.write_identifier(&mut sql, "id");
        sql.push_str(" IN (SELECT ");
        writer.write_column_ref(&mut sql, &view.table.name, "id");
        sql.push_str(" FROM ");
        writer.write_identifier(&mut sql, &view.table.name);
        for join in &c.base().joins {
            sql.push(' ');
            write_join(&writer, join, &mut sql);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&where_parts.join(" AND "));
        sql.push(')');
        params = c.params;
    }
    let affected = scope.execute(Query::with_params(sql, params)).await?;
    Ok(affected.rows_affected)
}

/// Builder for deletes by filter or by staged data.
pub struct DeleteQuery<'v> {
    view: &'v View,
    filters: Vec<FilterSpec>,
    args: Args,
    swap: bool,
    heads: HeadRegistry,
}

impl<'v> DeleteQuery<'v> {
    pub(crate) fn new(view: &'v View) -> DeleteQuery<'v> {
        DeleteQuery {
            view,
            filters: Vec::new(),
            args: Args::new(),
            swap: false,
            heads: HeadRegistry::standard(),
        }
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filters.push(FilterSpec::Expr(expr.into()));
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FilterSpec::Eq(column.into(), value.into()));
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.set(name, value);
        self
    }

    /// Delete the rows *not* matching instead.
    pub fn swap(mut self) -> Self {
        self.swap = true;
        self
    }

    pub fn heads(mut self, heads: HeadRegistry) -> Self {
        self.heads = heads;
        self
    }

    /// Delete rows matching the filters; with no filter, empty the table.
    pub async fn exec<D: Driver>(self, scope: &mut Scope<D>) -> Result<u64> {
        let view = self.view;
        view.validate_key()?;
        let writer = scope.writer()?;
        if self.filters.is_empty() {
            let mut sql = String::new();
            sql.push_str("DELETE FROM ");
            writer.write_identifier(&mut sql, &view.table.name);
            let affected = scope.execute(Query::new(sql)).await?;
            return Ok(affected.rows_affected);
        }
        let config = scope.config().clone();
        let mut c = Compiler::new(
            &view.registry,
            &writer,
            &self.heads,
            &self.args,
            &config.vars,
            view.table.clone(),
            view.table.name.clone(),
        );
        let where_parts = compile_filters(&mut c, &self.filters)?;
        let mut sql = String::new();
        sql.push_str("DELETE FROM ");
        writer.write_identifier(&mut sql, &view.table.name);
        sql.push_str(" WHERE ");
        writer.write_identifier(&mut sql, "id");
        sql.push_str(if self.swap { " NOT IN (SELECT " } else { " IN (SELECT " });
        writer.write_column_ref(&mut sql, &view.table.name, "id");
        sql.push_str(" FROM ");
        writer.write_identifier(&mut sql, &view.table.name);
        for join in &c.base().joins {
            sql.push(' ');
            write_join(&writer, join, &mut sql);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&where_parts.join(" AND "));
        sql.push(')');
        let affected = scope.execute(Query::with_params(sql, c.params)).await?;
        Ok(affected.rows_affected)
    }

    /// Delete rows matching the staged data on the key columns.
    pub async fn exec_data<D: Driver>(
        self,
        scope: &mut Scope<D>,
        rows: Vec<Vec<Value>>,
    ) -> Result<u64> {
        let view = self.view;
        if !self.filters.is_empty() {
            return Err(Error::arg(
                "deletion by both data and filter is not supported",
            ));
        }
        let plan = WritePlan::new(view)?;
        let rows = rows
            .into_iter()
            .map(|row| plan.format_row(row))
            .collect::<Result<Vec<_>>>()?;
        stage(scope, &plan, rows).await?;

        let writer = scope.writer()?;
        let config = scope.config().clone();
        let args = Args::new();
        let mut c = Compiler::new(
            &view.registry,
            &writer,
            &self.heads,
            &args,
            &config.vars,
            view.table.clone(),
            view.table.name.clone(),
        );
        let fk = build_fk_joins(&plan, &view.registry, &writer, &mut c)?;
        let key_conds = key_conditions(&plan, &fk, &writer, &view.table.name)?;
        let mut sql = String::new();
        sql.push_str("DELETE FROM ");
        writer.write_identifier(&mut sql, &view.table.name);
        sql.push_str(" WHERE ");
        writer.write_identifier(&mut sql, "id");
        sql.push_str(if self.swap { " NOT IN (SELECT " } else { " IN (SELECT " });
        writer.write_column_ref(&mut sql, &view.table.name, "id");
        sql.push_str(" FROM ");
        writer.write_identifier(&mut sql, TMP);
        for join in &fk.joins {
            sql.push(' ');
            write_join(&writer, join, &mut sql);
        }
        sql.push_str(" INNER JOIN ");
        writer.write_identifier(&mut sql, &view.table.name);
        sql.push_str(" ON (");
        sql.push_str(&key_conds.join(" AND "));
        sql.push_str("))");
        let affected = scope.execute(Query::new(sql)).await?;
        scope
            .execute(Query::new(format!("DROP TABLE {}", TMP)))
            .await?;
        Ok(affected.rows_affected)
    }
}
