//! Script Set - the embedded day-2 revisions and the SQL file format
//!
//! Each revision is a `.sql` file compiled into the binary with an
//! `-- Up migration` section and a `-- Down migration` section.

use crate::error::{MigrateResult, MigrationError};

use super::definitions::RevisionUnit;

/// Metadata for a script compiled into the binary
struct EmbeddedScript {
    id: &'static str,
    down_revision: Option<&'static str>,
    description: &'static str,
    source: &'static str,
}

const DAY2_SCRIPTS: [EmbeddedScript; 4] = [
    EmbeddedScript {
        id: "001",
        down_revision: None,
        description: "Example day-2 operations migration",
        source: include_str!("../../scripts/001_day2_operations.sql"),
    },
    EmbeddedScript {
        id: "002",
        down_revision: Some("001"),
        description: "Create analytics schema and read-only user",
        source: include_str!("../../scripts/002_analytics_schema.sql"),
    },
    EmbeddedScript {
        id: "003",
        down_revision: Some("002"),
        description: "Create backup user and maintenance procedures",
        source: include_str!("../../scripts/003_backup_maintenance.sql"),
    },
    EmbeddedScript {
        id: "004",
        down_revision: Some("003"),
        description: "Create audit logging and compliance tables",
        source: include_str!("../../scripts/004_audit_compliance.sql"),
    },
];

/// An ordered collection of revision units
#[derive(Debug, Clone, Default)]
pub struct ScriptSet {
    units: Vec<RevisionUnit>,
}

impl ScriptSet {
    /// Build a set from arbitrary units
    pub fn new(units: Vec<RevisionUnit>) -> Self {
        Self { units }
    }

    /// The revisions shipped with this build
    pub fn day2() -> MigrateResult<Self> {
        let units = DAY2_SCRIPTS
            .iter()
            .map(|script| {
                let (up_sql, down_sql) = parse_migration_content(script.source).map_err(|e| {
                    MigrationError::Script(format!("revision {}: {}", script.id, e))
                })?;
                Ok(RevisionUnit::new(
                    script.id,
                    script.down_revision,
                    script.description,
                    up_sql,
                    down_sql,
                ))
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        Ok(Self { units })
    }

    pub fn units(&self) -> &[RevisionUnit] {
        &self.units
    }

    /// Look up a unit by identifier
    pub fn get(&self, id: &str) -> Option<&RevisionUnit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// `(id, description)` pairs in declaration order
    pub fn list(&self) -> Vec<(&str, &str)> {
        self.units
            .iter()
            .map(|unit| (unit.id.as_str(), unit.description.as_str()))
            .collect()
    }
}

/// Parse a revision file into its UP and DOWN SQL.
///
/// Comment-only and blank lines are dropped. Content before the first marker
/// is treated as a header and ignored.
pub fn parse_migration_content(content: &str) -> Result<(String, String), String> {
    #[derive(PartialEq)]
    enum Section {
        Header,
        Up,
        Down,
    }

    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut current_section = Section::Header;
    let mut saw_up = false;

    for line in content.lines() {
        let trimmed = line.trim();
        let marker = trimmed.to_lowercase();

        if marker == "-- up migration" {
            current_section = Section::Up;
            saw_up = true;
            continue;
        } else if marker == "-- down migration" {
            current_section = Section::Down;
            continue;
        }

        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        match current_section {
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
            Section::Header => {}
        }
    }

    if !saw_up {
        return Err("missing '-- Up migration' section".to_string());
    }

    Ok((
        up_sql.join("\n").trim().to_string(),
        down_sql.join("\n").trim().to_string(),
    ))
}

/// Split SQL text into statements on top-level semicolons.
///
/// Semicolons inside quoted literals, quoted identifiers, comments and
/// dollar-quoted bodies (`DO $$ ... $$`, `$tag$ ... $tag$`) do not split.
/// Every returned statement ends with a semicolon.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                has_code = true;
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        // Doubled quote is an escaped quote
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            b'$' => {
                has_code = true;
                match dollar_tag_at(sql, i) {
                    Some(tag) => {
                        let body_start = i + tag.len();
                        i = match sql[body_start..].find(tag) {
                            Some(offset) => body_start + offset + tag.len(),
                            None => bytes.len(),
                        };
                    }
                    None => i += 1,
                }
            }
            b';' => {
                if has_code {
                    statements.push(format!("{};", sql[start..i].trim()));
                }
                has_code = false;
                i += 1;
                start = i;
            }
            byte => {
                if !byte.is_ascii_whitespace() {
                    has_code = true;
                }
                i += 1;
            }
        }
    }

    if has_code && start < bytes.len() {
        statements.push(format!("{};", sql[start..].trim()));
    }

    statements
}

/// Dollar-quote opening tag at `pos`: `$$` or `$ident$`
fn dollar_tag_at(sql: &str, pos: usize) -> Option<&str> {
    let rest = &sql[pos + 1..];
    let end = rest.find('$')?;
    let ident = &rest[..end];

    let valid = ident.is_empty()
        || (ident
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
            && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));

    if valid {
        Some(&sql[pos..pos + end + 2])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_statements() {
        let statements = split_sql_statements("CREATE SCHEMA a;\nGRANT ALL ON SCHEMA a TO r;\n");
        assert_eq!(
            statements,
            vec!["CREATE SCHEMA a;", "GRANT ALL ON SCHEMA a TO r;"]
        );
    }

    #[test]
    fn test_split_keeps_do_blocks_whole() {
        let sql = "DO $$\nBEGIN\n    IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'r') THEN\n        CREATE ROLE r;\n    END IF;\nEND\n$$;\nCREATE SCHEMA s;";
        let statements = split_sql_statements(sql);

        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("DO $$"));
        assert!(statements[0].contains("CREATE ROLE r;"));
        assert!(statements[0].ends_with("$$;"));
        assert_eq!(statements[1], "CREATE SCHEMA s;");
    }

    #[test]
    fn test_split_named_dollar_tags_and_quotes() {
        let sql = "SELECT $fn$ a; b $fn$; SELECT 'x;''y'; SELECT \"odd;name\" FROM t; SELECT $1";
        let statements = split_sql_statements(sql);

        assert_eq!(
            statements,
            vec![
                "SELECT $fn$ a; b $fn$;",
                "SELECT 'x;''y';",
                "SELECT \"odd;name\" FROM t;",
                "SELECT $1;",
            ]
        );
    }

    #[test]
    fn test_split_ignores_comments() {
        let sql = "-- leading; comment\nCREATE SCHEMA a; /* block; comment */\n-- trailing only\n";
        let statements = split_sql_statements(sql);

        assert_eq!(statements.len(), 1);
        assert!(statements[0].ends_with("CREATE SCHEMA a;"));
    }

    #[test]
    fn test_parse_migration_content() {
        let content = "-- Revision: 010\n-- header\n\n-- Up migration\nCREATE SCHEMA x;\n-- inline note\n\n-- Down migration\nDROP SCHEMA x;\n";
        let (up, down) = parse_migration_content(content).unwrap();

        assert_eq!(up, "CREATE SCHEMA x;");
        assert_eq!(down, "DROP SCHEMA x;");
    }

    #[test]
    fn test_parse_requires_up_section() {
        assert!(parse_migration_content("-- Down migration\nDROP SCHEMA x;").is_err());
    }

    #[test]
    fn test_update_comment_is_not_a_marker() {
        let content = "-- Up migration\nCREATE SCHEMA x;\n-- update grants\nGRANT USAGE ON SCHEMA x TO r;\n";
        let (up, down) = parse_migration_content(content).unwrap();

        assert!(up.contains("GRANT USAGE"));
        assert!(down.is_empty());
    }

    #[test]
    fn test_day2_set() {
        let set = ScriptSet::day2().unwrap();

        assert_eq!(set.len(), 4);
        assert_eq!(
            set.list().iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec!["001", "002", "003", "004"]
        );

        let audit = set.get("004").unwrap();
        assert_eq!(audit.down_revision.as_deref(), Some("003"));
        let up = audit.upgrade_statements();
        assert!(up
            .iter()
            .any(|s| s.contains("CREATE TABLE IF NOT EXISTS audit.database_changes")));
        assert!(up
            .iter()
            .any(|s| s.contains("CREATE TABLE IF NOT EXISTS audit.compliance_events")));
        assert_eq!(
            audit.downgrade_statements(),
            vec!["DROP SCHEMA IF EXISTS audit CASCADE;", "DROP ROLE IF EXISTS audit_role;"]
        );
    }

    #[test]
    fn test_day2_role_creation_is_guarded() {
        let set = ScriptSet::day2().unwrap();

        for unit in set.units() {
            for statement in unit.upgrade_statements() {
                if statement.contains("CREATE ROLE") || statement.contains("CREATE USER") {
                    assert!(
                        statement.starts_with("DO $$") && statement.contains("IF NOT EXISTS"),
                        "unguarded role creation in {}: {}",
                        unit.id,
                        statement
                    );
                }
            }
        }
    }
}
