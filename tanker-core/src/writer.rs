use crate::ColumnType;
use std::fmt::Write;

/// Dialect shim: how SQL fragments are spelled for a given database.
///
/// Defaults are the Postgres forms; drivers override what differs. The
/// compiler and the write engine only ever talk to this trait, so dialect
/// gaps (`ILIKE`, `EXTRACT`, array storage) never leak into them.
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    fn write_identifier(&self, out: &mut String, name: &str) {
        out.push('"');
        out.push_str(name);
        out.push('"');
    }

    fn write_column_ref(&self, out: &mut String, alias: &str, column: &str) {
        self.write_identifier(out, alias);
        out.push('.');
        self.write_identifier(out, column);
    }

    /// Positional parameter marker; `index` is 1-based.
    fn write_placeholder(&self, out: &mut String, index: usize) {
        let _ = write!(out, "${}", index);
    }

    fn write_string_literal(&self, out: &mut String, value: &str) {
        out.push('\'');
        for c in value.chars() {
            if c == '\'' {
                out.push('\'');
            }
            out.push(c);
        }
        out.push('\'');
    }

    fn write_bool_literal(&self, out: &mut String, value: bool) {
        out.push_str(if value { "true" } else { "false" });
    }

    fn write_ilike(&self, out: &mut String, lhs: &str, rhs: &str) {
        out.push_str(lhs);
        out.push_str(" ILIKE ");
        out.push_str(rhs);
    }

    /// Cast to BIGINT so the result decodes as an integer everywhere
    /// (Postgres reports EXTRACT as numeric).
    fn write_extract(&self, out: &mut String, unit: &str, operand: &str) {
        let _ = write!(out, "CAST(EXTRACT({} FROM {}) AS BIGINT)", unit, operand);
    }

    fn write_column_type(&self, out: &mut String, ctype: &ColumnType) {
        match ctype {
            ColumnType::Varchar => out.push_str("VARCHAR"),
            ColumnType::Integer => out.push_str("INTEGER"),
            ColumnType::BigInt => out.push_str("BIGINT"),
            ColumnType::Float => out.push_str("FLOAT"),
            ColumnType::Bool => out.push_str("BOOL"),
            ColumnType::Date => out.push_str("DATE"),
            ColumnType::Timestamp => out.push_str("TIMESTAMP"),
            ColumnType::TimestampTz => out.push_str("TIMESTAMPTZ"),
            ColumnType::Bytea => out.push_str("BYTEA"),
            ColumnType::Array(inner) => {
                self.write_column_type(out, inner);
                out.push_str("[]");
            }
            // Stored as a plain integer; the constraint is added separately.
            ColumnType::M2o { .. } | ColumnType::O2m { .. } => out.push_str("INTEGER"),
        }
    }

    /// Definition of the surrogate `id` column.
    fn write_id_column(&self, out: &mut String) {
        out.push_str("SERIAL PRIMARY KEY");
    }

    /// Whether `ALTER TABLE … ADD COLUMN` accepts NOT NULL without a
    /// default.
    fn alter_supports_not_null(&self) -> bool {
        true
    }

    /// Whether secondary unique column sets deploy as table constraints;
    /// otherwise they become unique indexes.
    fn supports_unique_constraints(&self) -> bool {
        true
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN");
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK");
    }

    fn write_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "SAVEPOINT {}", name);
    }

    fn write_release_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "RELEASE SAVEPOINT {}", name);
    }

    fn write_rollback_savepoint(&self, out: &mut String, name: &str) {
        let _ = write!(out, "ROLLBACK TO SAVEPOINT {}", name);
    }

    // Catalog queries used by the idempotent schema deployment and the
    // reverse introspection. Each returns rows in a fixed column order.

    /// Rows: (table_name)
    fn tables_query(&self, schema: Option<&str>) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = '{}'",
            schema.unwrap_or("public")
        )
    }

    /// Rows: (column_name, data_type)
    fn columns_query(&self, table: &str, schema: Option<&str>) -> String {
        format!(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_name = '{}' AND table_schema = '{}' ORDER BY ordinal_position",
            table,
            schema.unwrap_or("public")
        )
    }

    /// Rows: (index_name)
    fn indexes_query(&self, schema: Option<&str>) -> String {
        format!(
            "SELECT indexname FROM pg_indexes WHERE schemaname = '{}'",
            schema.unwrap_or("public")
        )
    }

    /// Rows: (constraint_name); `None` when the database has no constraint
    /// catalog worth reading.
    fn constraints_query(&self) -> Option<String> {
        Some("SELECT constraint_name FROM information_schema.table_constraints".to_string())
    }

    /// Rows: (column_name, foreign_table, foreign_column)
    fn foreign_keys_query(&self, table: &str) -> String {
        format!(
            "SELECT kcu.column_name, ccu.table_name, ccu.column_name \
             FROM information_schema.table_constraints AS tc \
             JOIN information_schema.key_column_usage AS kcu \
               ON tc.constraint_name = kcu.constraint_name \
             JOIN information_schema.constraint_column_usage AS ccu \
               ON ccu.constraint_name = tc.constraint_name \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_name = '{}'",
            table
        )
    }

    /// Rows: (index_name, column_name), unique non-primary indexes only,
    /// ordered by index then column position.
    fn unique_indexes_query(&self, table: &str) -> String {
        format!(
            "SELECT i.relname, a.attname \
             FROM pg_class t \
             JOIN pg_index ix ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             WHERE t.relname = '{}' AND ix.indisunique AND NOT ix.indisprimary \
             ORDER BY i.relname, array_position(ix.indkey, a.attnum)",
            table
        )
    }
}

/// Baseline writer with the default spellings; used by compiler unit tests.
#[derive(Default)]
pub struct GenericSqlWriter;

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
