use std::fmt::Write;
use tanker_core::SqlWriter;

pub struct SqliteSqlWriter {}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    /// Numbered markers so a fragment can repeat (e.g. in GROUP BY)
    /// without consuming extra parameters.
    fn write_placeholder(&self, out: &mut String, index: usize) {
        let _ = write!(out, "?{}", index);
    }

    fn write_bool_literal(&self, out: &mut String, value: bool) {
        out.push(if value { '1' } else { '0' });
    }

    /// SQLite LIKE is already case-insensitive for ASCII.
    fn write_ilike(&self, out: &mut String, lhs: &str, rhs: &str) {
        out.push_str(lhs);
        out.push_str(" LIKE ");
        out.push_str(rhs);
    }

    fn write_extract(&self, out: &mut String, unit: &str, operand: &str) {
        let format = match unit.to_ascii_lowercase().as_str() {
            "year" => "%Y",
            "month" => "%m",
            "day" => "%d",
            "hour" => "%H",
            "minute" => "%M",
            "second" => "%S",
            "dow" => "%w",
            "doy" => "%j",
            "epoch" => "%s",
            _ => {
                log::error!("unsupported extract unit `{}` on sqlite", unit);
                "%Y"
            }
        };
        let _ = write!(
            out,
            "CAST(strftime('{}', {}) AS INTEGER)",
            format, operand
        );
    }

    fn write_id_column(&self, out: &mut String) {
        out.push_str("INTEGER PRIMARY KEY");
    }

    fn alter_supports_not_null(&self) -> bool {
        false
    }

    fn supports_unique_constraints(&self) -> bool {
        false
    }

    fn tables_query(&self, _namespace: Option<&str>) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'"
            .to_string()
    }

    fn columns_query(&self, table: &str, _namespace: Option<&str>) -> String {
        format!("SELECT name, type FROM pragma_table_info('{}')", table)
    }

    fn indexes_query(&self, _namespace: Option<&str>) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'index'".to_string()
    }

    fn constraints_query(&self) -> Option<String> {
        None
    }

    fn foreign_keys_query(&self, table: &str) -> String {
        format!(
            "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list('{}')",
            table
        )
    }

    fn unique_indexes_query(&self, table: &str) -> String {
        format!(
            "SELECT il.name, ii.name FROM pragma_index_list('{}') AS il, \
             pragma_index_info(il.name) AS ii WHERE il.\"unique\" = 1 \
             ORDER BY il.seq, ii.seqno",
            table
        )
    }
}
